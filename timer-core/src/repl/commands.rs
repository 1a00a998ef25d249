//! High-level REPL command dispatcher.
//!
//! This module glues parsed grammar commands to the lifecycle operations of a
//! timer. It stays `no_std` friendly; time itself is owned by the host, so
//! `wait` is handed back as [`CommandOutcome::Wait`] for the caller to apply.

use core::fmt;
use core::time::Duration;

use crate::controller::{TimerHandle, TimerState};

use super::catalog::CommandTag;
use super::grammar::{self, Command, ResetCommand};
use super::status::{StatusProvider, StatusSnapshot};

/// Command execution successes.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandOutcome {
    Transition(TransitionAck),
    Wait(Duration),
    Status(StatusSnapshot),
}

/// Summary returned after applying a lifecycle command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TransitionAck {
    pub command: CommandTag,
    pub before: TimerState,
    pub after: TimerState,
    pub attempts: u32,
}

impl TransitionAck {
    /// Returns `true` when the command left the timer in the same state.
    #[must_use]
    pub fn is_noop(&self) -> bool {
        self.before == self.after
    }
}

/// Errors surfaced while executing a command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum CommandError<'a> {
    Parse(grammar::ParseError<'a>),
    Unsupported(&'static str),
}

impl<'a> From<grammar::ParseError<'a>> for CommandError<'a> {
    fn from(error: grammar::ParseError<'a>) -> Self {
        Self::Parse(error)
    }
}

impl fmt::Display for CommandError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandError::Parse(err) => err.fmt(f),
            CommandError::Unsupported(what) => write!(f, "`{what}` is not handled here"),
        }
    }
}

/// Dispatches REPL commands into a timer.
pub struct CommandExecutor<T> {
    timer: T,
}

impl<T> CommandExecutor<T> {
    /// Creates a new executor around the provided timer.
    pub const fn new(timer: T) -> Self {
        Self { timer }
    }

    pub fn timer(&self) -> &T {
        &self.timer
    }

    pub fn timer_mut(&mut self) -> &mut T {
        &mut self.timer
    }

    /// Consumes the executor and yields the inner timer.
    pub fn into_inner(self) -> T {
        self.timer
    }
}

impl<T> CommandExecutor<T>
where
    T: TimerHandle + StatusProvider,
{
    /// Parses and executes a REPL command.
    pub fn execute<'a>(&mut self, line: &'a str) -> Result<CommandOutcome, CommandError<'a>> {
        let command = grammar::parse(line)?;
        self.dispatch(command)
    }

    fn dispatch<'a>(&mut self, command: Command<'a>) -> Result<CommandOutcome, CommandError<'a>> {
        match command {
            Command::Start => Ok(self.transition(CommandTag::Start, TimerHandle::start)),
            Command::Stop => Ok(self.transition(CommandTag::Stop, TimerHandle::stop)),
            Command::Pause => Ok(self.transition(CommandTag::Pause, TimerHandle::pause)),
            Command::Resume => Ok(self.transition(CommandTag::Resume, TimerHandle::resume)),
            Command::Reset(action) => Ok(self.reset(action)),
            Command::Wait(duration) => Ok(CommandOutcome::Wait(duration)),
            Command::Status => Ok(CommandOutcome::Status(self.timer.snapshot())),
            Command::Help(_) => Err(CommandError::Unsupported("help")),
        }
    }

    fn reset(&mut self, action: ResetCommand) -> CommandOutcome {
        self.transition(CommandTag::Reset, |timer| {
            timer.reset(action.stop_after());
        })
    }

    fn transition(&mut self, command: CommandTag, apply: impl FnOnce(&mut T)) -> CommandOutcome {
        let before = self.timer.state();
        apply(&mut self.timer);
        CommandOutcome::Transition(TransitionAck {
            command,
            before,
            after: self.timer.state(),
            attempts: self.timer.attempts(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::TimerOptions;
    use heapless::Vec as HeaplessVec;

    #[derive(Clone, Copy, Debug, PartialEq, Eq)]
    enum Call {
        Start,
        Stop,
        Pause,
        Resume,
        Reset(bool),
    }

    struct MockTimer {
        state: TimerState,
        attempts: u32,
        options: TimerOptions,
        calls: HeaplessVec<Call, 8>,
    }

    impl MockTimer {
        fn new(state: TimerState) -> Self {
            Self {
                state,
                attempts: 4,
                options: TimerOptions::default(),
                calls: HeaplessVec::new(),
            }
        }

        fn log(&mut self, call: Call) {
            self.calls.push(call).expect("call log capacity");
        }
    }

    impl TimerHandle for MockTimer {
        fn state(&self) -> TimerState {
            self.state
        }

        fn attempts(&self) -> u32 {
            self.attempts
        }

        fn delay(&self) -> Duration {
            Duration::from_millis(1_000)
        }

        fn overed(&self) -> bool {
            false
        }

        fn options(&self) -> &TimerOptions {
            &self.options
        }

        fn start(&mut self) {
            self.log(Call::Start);
            self.state = TimerState::Running;
            self.attempts = 0;
        }

        fn stop(&mut self) {
            self.log(Call::Stop);
            self.state = TimerState::Stopped;
            self.attempts = 0;
        }

        fn pause(&mut self) {
            self.log(Call::Pause);
            if self.state == TimerState::Running {
                self.state = TimerState::Paused;
            }
        }

        fn resume(&mut self) {
            self.log(Call::Resume);
            if self.state == TimerState::Paused {
                self.state = TimerState::Running;
            }
        }

        fn reset(&mut self, stop_after: bool) {
            self.log(Call::Reset(stop_after));
            self.attempts = 0;
            if !stop_after {
                self.state = TimerState::Running;
            }
        }
    }

    impl StatusProvider for MockTimer {
        fn snapshot(&self) -> StatusSnapshot {
            StatusSnapshot {
                state: self.state,
                attempts: self.attempts,
                delay: self.delay(),
                overed: false,
                scheduled: self.state == TimerState::Running,
                options: self.options,
            }
        }
    }

    #[test]
    fn pause_reports_transition() {
        let mut executor = CommandExecutor::new(MockTimer::new(TimerState::Running));

        let outcome = executor.execute("pause").expect("dispatch should succeed");

        assert_eq!(
            outcome,
            CommandOutcome::Transition(TransitionAck {
                command: CommandTag::Pause,
                before: TimerState::Running,
                after: TimerState::Paused,
                attempts: 4,
            })
        );
        assert_eq!(executor.timer().calls.as_slice(), &[Call::Pause]);
    }

    #[test]
    fn ignored_command_is_acknowledged_as_noop() {
        let mut executor = CommandExecutor::new(MockTimer::new(TimerState::Stopped));

        let outcome = executor.execute("resume").expect("dispatch should succeed");

        match outcome {
            CommandOutcome::Transition(ack) => assert!(ack.is_noop()),
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn reset_variants_pass_stop_flag() {
        let mut executor = CommandExecutor::new(MockTimer::new(TimerState::Running));

        executor.execute("reset").expect("reset");
        executor.execute("reset stop").expect("reset stop");

        assert_eq!(
            executor.timer().calls.as_slice(),
            &[Call::Reset(false), Call::Reset(true)]
        );
    }

    #[test]
    fn start_and_stop_dispatch_to_timer() {
        let mut executor = CommandExecutor::new(MockTimer::new(TimerState::Stopped));

        executor.execute("start").expect("start");
        executor.execute("stop").expect("stop");

        assert_eq!(
            executor.into_inner().calls.as_slice(),
            &[Call::Start, Call::Stop]
        );
    }

    #[test]
    fn wait_is_returned_to_host() {
        let mut executor = CommandExecutor::new(MockTimer::new(TimerState::Running));
        let outcome = executor.execute("wait 2s").expect("wait");
        assert_eq!(outcome, CommandOutcome::Wait(Duration::from_secs(2)));
        assert!(executor.timer().calls.is_empty());
    }

    #[test]
    fn status_returns_snapshot() {
        let mut executor = CommandExecutor::new(MockTimer::new(TimerState::Paused));
        match executor.execute("status").expect("status") {
            CommandOutcome::Status(snapshot) => {
                assert_eq!(snapshot.state, TimerState::Paused);
                assert_eq!(snapshot.attempts, 4);
                assert!(!snapshot.scheduled);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn help_is_left_to_front_end() {
        let mut executor = CommandExecutor::new(MockTimer::new(TimerState::Stopped));
        let error = executor
            .execute("help")
            .expect_err("help should be unsupported");
        assert_eq!(error, CommandError::Unsupported("help"));
    }

    #[test]
    fn parse_error_is_returned() {
        let mut executor = CommandExecutor::new(MockTimer::new(TimerState::Stopped));
        let error = executor
            .execute("start later please")
            .expect_err("parse should fail");
        assert!(matches!(error, CommandError::Parse(_)));
    }
}
