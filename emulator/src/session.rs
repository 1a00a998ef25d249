use std::cell::RefCell;
use std::fs::{self, OpenOptions};
use std::io::{self, BufWriter, Write};
use std::path::Path;
use std::rc::Rc;
use std::time::Duration;

use dyntimer_core::controller::{
    EventKind, SubscribeError, TimerController, TimerEvent, TimerHandle, TimerObserver,
    WakeupScheduler,
};
use dyntimer_core::options::{TimerOptions, parse_options};
use dyntimer_core::repl::catalog::{self, CommandTag};
use dyntimer_core::repl::commands::{CommandError, CommandExecutor, CommandOutcome, TransitionAck};
use dyntimer_core::repl::grammar::LexError;
use dyntimer_core::repl::status::{StatusFormatter, StatusProvider, StatusSnapshot};
use dyntimer_core::strategy::{Strategy, series_value};
use dyntimer_core::telemetry::TelemetryRecorder;

/// Upper bound on wakeups delivered by a single `wait`; a zero delay under
/// the overload policy would otherwise never let the clock move.
pub const MAX_TICKS_PER_WAIT: usize = 10_000;

const SERIES_TABLE_ROWS: u32 = 20;

type HostTimer = TimerController<VirtualScheduler, Box<dyn TimerObserver>>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum TranscriptProfile {
    Basic,
    Advantage,
    Series,
}

impl TranscriptProfile {
    pub const ALL: [Self; 3] = [Self::Basic, Self::Advantage, Self::Series];

    pub fn log_path(self) -> &'static str {
        match self {
            TranscriptProfile::Basic => "transcripts/emulator-basic.log",
            TranscriptProfile::Advantage => "transcripts/emulator-advantage.log",
            TranscriptProfile::Series => "transcripts/emulator-series.log",
        }
    }

    pub fn header(self) -> &'static str {
        match self {
            TranscriptProfile::Basic => "Dynamic Timer Emulator basic transcript",
            TranscriptProfile::Advantage => "Dynamic Timer Emulator capped procession transcript",
            TranscriptProfile::Series => "Dynamic Timer Emulator series transcript",
        }
    }

    /// Option line applied before any user overrides.
    pub fn preset(self) -> &'static str {
        match self {
            TranscriptProfile::Basic | TranscriptProfile::Series => "",
            TranscriptProfile::Advantage => {
                "strategy=procession seed=1000 max-attempts=10 max-delay=4000 overrun=stop"
            }
        }
    }

    pub fn from_tag(tag: &str) -> Result<Self, String> {
        Self::ALL
            .into_iter()
            .find(|profile| profile.tag().eq_ignore_ascii_case(tag))
            .ok_or_else(|| format!("Unknown profile '{tag}'. Use basic, advantage, or series."))
    }

    pub fn tag(self) -> &'static str {
        match self {
            TranscriptProfile::Basic => "basic",
            TranscriptProfile::Advantage => "advantage",
            TranscriptProfile::Series => "series",
        }
    }

    /// Layers `overrides` (a `key=value` option line) on top of the preset.
    pub fn options_with(self, overrides: &str) -> Result<TimerOptions, LexError> {
        let mut raw = parse_options(self.preset())?;
        raw.merge(&parse_options(overrides)?);
        Ok(raw.normalize())
    }

    pub fn options(self) -> TimerOptions {
        self.options_with("").unwrap_or_default()
    }
}

/// Wakeup scheduler driven by a virtual clock.
///
/// Nothing fires on its own; the session walks the clock forward and fires
/// due wakeups in deadline order.
#[derive(Debug, Default)]
pub struct VirtualScheduler {
    now: Duration,
    next_id: u64,
    pending: Vec<(u64, Duration)>,
}

impl VirtualScheduler {
    pub fn now(&self) -> Duration {
        self.now
    }

    pub fn next_deadline(&self) -> Option<Duration> {
        self.pending.iter().map(|(_, deadline)| *deadline).min()
    }

    /// Earliest wakeup due at or before `limit`.
    pub fn next_due(&self, limit: Duration) -> Option<(u64, Duration)> {
        self.pending
            .iter()
            .copied()
            .filter(|(_, deadline)| *deadline <= limit)
            .min_by_key(|(id, deadline)| (*deadline, *id))
    }

    /// Retires `id` and moves the clock to its deadline.
    pub fn complete(&mut self, id: u64, at: Duration) {
        self.pending.retain(|(pending, _)| *pending != id);
        self.advance_to(at);
    }

    pub fn advance_to(&mut self, at: Duration) {
        self.now = self.now.max(at);
    }
}

impl WakeupScheduler for VirtualScheduler {
    type Handle = u64;

    fn schedule(&mut self, after: Duration) -> u64 {
        self.next_id += 1;
        self.pending
            .push((self.next_id, self.now.saturating_add(after)));
        self.next_id
    }

    fn cancel(&mut self, handle: u64) {
        self.pending.retain(|(pending, _)| *pending != handle);
    }
}

/// Queues every delivered event for the session to print.
struct EventTap {
    events: Rc<RefCell<Vec<TimerEvent>>>,
}

impl TimerObserver for EventTap {
    fn notify(&mut self, event: &TimerEvent, _timer: &mut dyn TimerHandle) {
        self.events.borrow_mut().push(*event);
    }
}

pub struct Session {
    executor: CommandExecutor<HostTimer>,
    events: Rc<RefCell<Vec<TimerEvent>>>,
    telemetry: Rc<RefCell<TelemetryRecorder>>,
    transcript: TranscriptLogger,
    profile: TranscriptProfile,
}

impl Session {
    pub fn new(profile: TranscriptProfile, options: TimerOptions) -> io::Result<Self> {
        let transcript = TranscriptLogger::new(profile)?;
        let events = Rc::new(RefCell::new(Vec::new()));
        let telemetry = Rc::new(RefCell::new(TelemetryRecorder::new()));

        let mut timer = HostTimer::new(options, VirtualScheduler::default());
        for kind in EventKind::ALL {
            timer
                .subscribe(
                    kind,
                    Box::new(EventTap {
                        events: Rc::clone(&events),
                    }),
                )
                .map_err(registry_error)?;
            timer
                .subscribe(kind, Box::new(Rc::clone(&telemetry)))
                .map_err(registry_error)?;
        }

        Ok(Self {
            executor: CommandExecutor::new(timer),
            events,
            telemetry,
            transcript,
            profile,
        })
    }

    pub fn now(&self) -> Duration {
        self.executor.timer().scheduler().now()
    }

    /// Opening lines: the series table for the series profile, the effective
    /// options otherwise.
    pub fn banner(&mut self) -> io::Result<Vec<String>> {
        let lines = match self.profile {
            TranscriptProfile::Series => series_table(),
            TranscriptProfile::Basic | TranscriptProfile::Advantage => {
                let snapshot = self.snapshot();
                let mut line = String::new();
                StatusFormatter::new(&snapshot)
                    .write_options_line(&mut line)
                    .map_err(io::Error::other)?;
                vec![line]
            }
        };
        self.record_output(&lines)?;
        Ok(lines)
    }

    pub fn handle_command(&mut self, line: &str) -> io::Result<Vec<String>> {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            return Ok(Vec::new());
        }

        self.transcript
            .append_line(self.now(), TranscriptRole::Host, trimmed)?;

        if trimmed.eq_ignore_ascii_case("help") {
            return self.handle_help(None);
        }
        if let Some(rest) = trimmed
            .get(..5)
            .filter(|head| head.eq_ignore_ascii_case("help "))
            .and_then(|_| trimmed.get(5..))
        {
            return self.handle_help(Some(rest.trim()));
        }

        let lines = match self.executor.execute(trimmed) {
            Ok(CommandOutcome::Transition(ack)) => self.describe_transition(ack),
            Ok(CommandOutcome::Wait(duration)) => self.advance(duration),
            Ok(CommandOutcome::Status(snapshot)) => self.describe_status(&snapshot)?,
            Err(CommandError::Parse(err)) => vec![format!("ERR syntax {err}")],
            Err(CommandError::Unsupported(topic)) => vec![format!("ERR unsupported {topic}")],
        };

        self.record_output(&lines)?;
        Ok(lines)
    }

    fn handle_help(&mut self, topic: Option<&str>) -> io::Result<Vec<String>> {
        let lines = match topic {
            Some(target) if !target.is_empty() => match catalog::find(target) {
                Some(spec) => vec![spec.to_string()],
                None => vec![
                    format!("No help available for `{target}`."),
                    format!("Available topics: {}", help_topic_list()),
                ],
            },
            _ => {
                let mut lines = vec!["Available commands:".to_string()];
                lines.extend(
                    catalog::commands()
                        .iter()
                        .map(|spec| format!("  {spec}")),
                );
                lines.push("  exit | quit                - leave the emulator".to_string());
                lines.push("Type `help <command>` for details on a single command.".to_string());
                lines
            }
        };

        self.record_output(&lines)?;
        Ok(lines)
    }

    fn describe_transition(&mut self, ack: TransitionAck) -> Vec<String> {
        let events = self.drain_events(self.now());
        let name = catalog::command(ack.command).name;
        let head = if ack.is_noop() && events.is_empty() && ack.command != CommandTag::Reset {
            format!("OK {name} ignored state={}", ack.before)
        } else {
            format!(
                "OK {name} {} -> {} attempts={}",
                ack.before, ack.after, ack.attempts
            )
        };

        let mut lines = Vec::with_capacity(events.len() + 1);
        lines.push(head);
        lines.extend(events);
        lines
    }

    /// Walks the virtual clock forward by `duration`, firing every wakeup
    /// that falls due on the way.
    pub fn advance(&mut self, duration: Duration) -> Vec<String> {
        let target = self.now().saturating_add(duration);
        let mut lines = Vec::new();
        let mut fired = 0usize;

        while let Some((handle, deadline)) = self.executor.timer().scheduler().next_due(target) {
            if fired == MAX_TICKS_PER_WAIT {
                lines.push(format!(
                    "WARN tick limit {MAX_TICKS_PER_WAIT} reached; clock held at +{}ms",
                    self.now().as_millis()
                ));
                return lines;
            }

            let timer = self.executor.timer_mut();
            timer.scheduler_mut().complete(handle, deadline);
            if timer.fire(handle) {
                fired += 1;
            }
            lines.extend(self.drain_events(deadline));
        }

        self.executor
            .timer_mut()
            .scheduler_mut()
            .advance_to(target);
        lines.push(format!(
            "OK waited {} now=+{}ms ticks={fired}",
            format_duration_short(duration),
            target.as_millis()
        ));
        lines
    }

    fn describe_status(&self, snapshot: &StatusSnapshot) -> io::Result<Vec<String>> {
        let formatter = StatusFormatter::new(snapshot);
        let mut timer_line = String::new();
        formatter
            .write_timer_line(&mut timer_line)
            .map_err(io::Error::other)?;
        let mut options_line = String::new();
        formatter
            .write_options_line(&mut options_line)
            .map_err(io::Error::other)?;

        let scheduler = self.executor.timer().scheduler();
        let clock_line = match scheduler.next_deadline() {
            Some(deadline) => format!(
                "clock now=+{}ms next-due=+{}ms",
                scheduler.now().as_millis(),
                deadline.as_millis()
            ),
            None => format!("clock now=+{}ms next-due=none", scheduler.now().as_millis()),
        };

        let telemetry = self.telemetry.borrow();
        let telemetry_line = match telemetry.latest() {
            Some(record) => format!(
                "telemetry recorded={} last={record}",
                telemetry.total_recorded()
            ),
            None => "telemetry recorded=0".to_string(),
        };

        let mut lines = vec![timer_line, options_line, clock_line, telemetry_line];
        let dropped = self.executor.timer().dropped_events();
        if dropped > 0 {
            lines.push(format!("WARN dropped-events={dropped}"));
        }
        Ok(lines)
    }

    fn snapshot(&self) -> StatusSnapshot {
        self.executor.timer().snapshot()
    }

    fn drain_events(&self, at: Duration) -> Vec<String> {
        self.events
            .borrow_mut()
            .drain(..)
            .map(|event| format!("[+{}ms] {event}", at.as_millis()))
            .collect()
    }

    fn record_output(&mut self, lines: &[String]) -> io::Result<()> {
        let now = self.now();
        for line in lines {
            self.transcript
                .append_line(now, TranscriptRole::Emulator, line)?;
        }
        Ok(())
    }
}

fn registry_error(err: SubscribeError) -> io::Error {
    io::Error::other(err.to_string())
}

fn series_table() -> Vec<String> {
    let mut lines = Vec::with_capacity(SERIES_TABLE_ROWS as usize + 1);
    let mut header = format!("{:>3}", "n");
    for strategy in Strategy::ALL {
        header.push_str(&format!(" {:>11}", strategy.name()));
    }
    lines.push(header);

    for n in 1..=SERIES_TABLE_ROWS {
        let mut row = format!("{n:>3}");
        for strategy in Strategy::ALL {
            row.push_str(&format!(" {:>11}", series_value(strategy, n)));
        }
        lines.push(row);
    }
    lines
}

struct TranscriptLogger {
    writer: BufWriter<std::fs::File>,
}

impl TranscriptLogger {
    fn new(profile: TranscriptProfile) -> io::Result<Self> {
        let path = Path::new(profile.log_path());
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .write(true)
            .truncate(true)
            .open(path)?;
        let mut logger = Self {
            writer: BufWriter::new(file),
        };
        logger.write_header(profile)?;
        Ok(logger)
    }

    fn write_header(&mut self, profile: TranscriptProfile) -> io::Result<()> {
        writeln!(self.writer, "# {}", profile.header())?;
        writeln!(
            self.writer,
            "# Timestamps are virtual milliseconds since session start"
        )?;
        writeln!(self.writer)?;
        self.writer.flush()
    }

    fn append_line(&mut self, at: Duration, role: TranscriptRole, line: &str) -> io::Result<()> {
        writeln!(
            self.writer,
            "[+{:>6} ms] {} {}",
            at.as_millis(),
            role.prefix(),
            line
        )?;
        self.writer.flush()
    }
}

#[derive(Clone, Copy)]
enum TranscriptRole {
    Host,
    Emulator,
}

impl TranscriptRole {
    fn prefix(self) -> &'static str {
        match self {
            TranscriptRole::Host => "HOST>",
            TranscriptRole::Emulator => "EMU <",
        }
    }
}

fn help_topic_list() -> String {
    catalog::commands()
        .iter()
        .map(|spec| spec.name)
        .collect::<Vec<_>>()
        .join(", ")
}

fn format_duration_short(duration: Duration) -> String {
    if duration < Duration::from_millis(1) {
        format!("{}us", duration.as_micros())
    } else if duration.as_secs() == 0 {
        format!("{}ms", duration.as_millis())
    } else {
        format!("{:.3}s", duration.as_secs_f64())
    }
}
