//! Shared status surface for the REPL.
//!
//! Anything that can describe a timer implements [`StatusProvider`] so the
//! REPL `status` command can report it without knowing the concrete
//! controller type. [`StatusFormatter`] keeps the textual rendering consistent
//! across front-ends.

use core::fmt;
use core::time::Duration;

use crate::controller::{TimerController, TimerObserver, TimerState, WakeupScheduler};
use crate::options::TimerOptions;

/// Snapshot of the timer as reported by the `status` command.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StatusSnapshot {
    pub state: TimerState,
    pub attempts: u32,
    /// Delay that applies to the next tick.
    pub delay: Duration,
    pub overed: bool,
    /// Whether a wakeup is outstanding.
    pub scheduled: bool,
    pub options: TimerOptions,
}

/// Platform hook that supplies live status information.
pub trait StatusProvider {
    fn snapshot(&self) -> StatusSnapshot;
}

impl<S, O, const OBSERVERS: usize> StatusProvider for TimerController<S, O, OBSERVERS>
where
    S: WakeupScheduler,
    O: TimerObserver,
{
    fn snapshot(&self) -> StatusSnapshot {
        StatusSnapshot {
            state: self.state(),
            attempts: self.attempts(),
            delay: self.delay(),
            overed: self.overed(),
            scheduled: self.is_scheduled(),
            options: *self.options(),
        }
    }
}

/// Helper that renders a [`StatusSnapshot`] into human-readable lines.
#[derive(Clone, Copy, Debug)]
pub struct StatusFormatter<'a> {
    snapshot: &'a StatusSnapshot,
}

impl<'a> StatusFormatter<'a> {
    #[must_use]
    pub const fn new(snapshot: &'a StatusSnapshot) -> Self {
        Self { snapshot }
    }

    /// Writes the timer line (e.g. `timer state=running attempts=3 next=8s overed=false`).
    pub fn write_timer_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        let snapshot = self.snapshot;
        write!(
            writer,
            "timer state={} attempts={} next=",
            snapshot.state, snapshot.attempts
        )?;
        write_duration(
            writer,
            if snapshot.scheduled {
                Some(snapshot.delay)
            } else {
                None
            },
        )?;
        write!(writer, " overed={}", snapshot.overed)
    }

    /// Writes the options line (e.g. `options strategy=dayan seed=1s delay=1s max-attempts=141 max-delay=unbounded overrun=overload`).
    pub fn write_options_line<W: fmt::Write>(&self, writer: &mut W) -> fmt::Result {
        let options = &self.snapshot.options;
        write!(writer, "options strategy={} seed=", options.strategy())?;
        write_duration(writer, Some(options.seed()))?;
        writer.write_str(" delay=")?;
        write_duration(writer, Some(options.delay()))?;
        write!(writer, " max-attempts={} max-delay=", options.max_attempts())?;
        match options.max_delay() {
            Some(cap) => write_duration(writer, Some(cap))?,
            None => writer.write_str("unbounded")?,
        }
        write!(writer, " overrun={}", options.overrun())
    }
}

fn write_duration<W: fmt::Write>(writer: &mut W, duration: Option<Duration>) -> fmt::Result {
    match duration {
        None => writer.write_str("n/a"),
        Some(value) if value.subsec_nanos() % 1_000_000 != 0 => {
            write!(writer, "{}us", value.as_micros())
        }
        Some(value) if value >= Duration::from_secs(1) => {
            let millis = value.as_millis();
            let seconds = millis / 1_000;
            match millis % 1_000 {
                0 => write!(writer, "{seconds}s"),
                rest if rest % 100 == 0 => write!(writer, "{seconds}.{}s", rest / 100),
                _ => write!(writer, "{millis}ms"),
            }
        }
        Some(value) => write!(writer, "{}ms", value.as_millis()),
    }
}
