//! Lifecycle history recorded from timer events.
//!
//! [`TelemetryRecorder`] subscribes to a timer like any other observer and
//! keeps the most recent events in a fixed-size ring. Event kinds map onto
//! compact numeric codes so records can be forwarded over diagnostics
//! channels and decoded on the other side.

use core::{fmt, time::Duration};

use heapless::{HistoryBuf, OldestOrdered};

use crate::controller::{TimerEvent, TimerHandle, TimerObserver, TimerState};

/// Identifier assigned to each recorded event.
pub type EventId = u32;

/// Total number of telemetry entries retained in memory.
pub const TELEMETRY_RING_CAPACITY: usize = 64;

/// Discriminated telemetry events.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TelemetryEventKind {
    Tick,
    Toll(TimerState),
}

impl fmt::Display for TelemetryEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TelemetryEventKind::Tick => f.write_str("tick"),
            TelemetryEventKind::Toll(state) => write!(f, "toll {state}"),
        }
    }
}

impl TelemetryEventKind {
    const TICK_CODE: u16 = 0x0001;
    const TOLL_BASE: u16 = 0x0010;

    /// Encodes the event into a compact transport-friendly discriminant.
    #[must_use]
    pub const fn to_raw(self) -> u16 {
        match self {
            TelemetryEventKind::Tick => Self::TICK_CODE,
            TelemetryEventKind::Toll(state) => Self::TOLL_BASE + state.as_index() as u16,
        }
    }

    /// Decodes a raw discriminant; `None` for codes no event maps to.
    #[must_use]
    pub const fn from_raw(code: u16) -> Option<Self> {
        match code {
            Self::TICK_CODE => Some(TelemetryEventKind::Tick),
            value if value >= Self::TOLL_BASE => {
                match TimerState::from_index((value - Self::TOLL_BASE) as usize) {
                    Some(state) => Some(TelemetryEventKind::Toll(state)),
                    None => None,
                }
            }
            _ => None,
        }
    }
}

impl From<&TimerEvent> for TelemetryEventKind {
    fn from(event: &TimerEvent) -> Self {
        match event {
            TimerEvent::Tick(_) => TelemetryEventKind::Tick,
            TimerEvent::Toll(state) => TelemetryEventKind::Toll(*state),
        }
    }
}

/// Counters sampled from the timer when an event was recorded.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TimerTelemetry {
    pub attempts: u32,
    pub delay: Duration,
    pub overed: bool,
}

/// Telemetry record stored in the ring buffer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub struct TelemetryRecord {
    pub id: EventId,
    pub event: TelemetryEventKind,
    pub details: TimerTelemetry,
}

impl fmt::Display for TelemetryRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[{}] {} attempts={} delay={}ms",
            self.id,
            self.event,
            self.details.attempts,
            self.details.delay.as_millis()
        )?;
        if self.details.overed {
            f.write_str(" overed")?;
        }
        Ok(())
    }
}

/// Telemetry ring buffer type alias.
pub type TelemetryRing<const CAPACITY: usize = TELEMETRY_RING_CAPACITY> =
    HistoryBuf<TelemetryRecord, CAPACITY>;

/// Records timer events into a fixed-size ring buffer.
pub struct TelemetryRecorder<const CAPACITY: usize = TELEMETRY_RING_CAPACITY> {
    ring: TelemetryRing<CAPACITY>,
    next_event_id: EventId,
}

impl<const CAPACITY: usize> TelemetryRecorder<CAPACITY> {
    /// Creates a new telemetry recorder with an empty history.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            ring: HistoryBuf::new(),
            next_event_id: 0,
        }
    }

    /// Returns an iterator over the recorded telemetry in chronological order.
    pub fn oldest_first(&self) -> OldestOrdered<'_, TelemetryRecord> {
        self.ring.oldest_ordered()
    }

    /// Returns the most recent telemetry record, if available.
    #[must_use]
    pub fn latest(&self) -> Option<&TelemetryRecord> {
        self.ring.recent()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ring.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ring.is_empty()
    }

    /// Total number of events recorded, including those evicted from the ring.
    #[must_use]
    pub const fn total_recorded(&self) -> EventId {
        self.next_event_id
    }

    /// Drops every retained record; event ids keep counting.
    pub fn clear(&mut self) {
        self.ring.clear();
    }

    fn record(&mut self, event: TelemetryEventKind, details: TimerTelemetry) -> EventId {
        let id = self.next_event_id;
        self.next_event_id = self.next_event_id.wrapping_add(1);

        self.ring.write(TelemetryRecord { id, event, details });

        id
    }

    /// Records a timer event together with the timer counters at that moment.
    pub fn record_event(&mut self, event: &TimerEvent, timer: &dyn TimerHandle) -> EventId {
        let details = match event {
            TimerEvent::Tick(tick) => TimerTelemetry {
                attempts: tick.attempts,
                delay: tick.delay,
                overed: timer.overed(),
            },
            TimerEvent::Toll(_) => TimerTelemetry {
                attempts: timer.attempts(),
                delay: timer.delay(),
                overed: timer.overed(),
            },
        };

        self.record(TelemetryEventKind::from(event), details)
    }
}

impl<const CAPACITY: usize> Default for TelemetryRecorder<CAPACITY> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const CAPACITY: usize> TimerObserver for TelemetryRecorder<CAPACITY> {
    fn notify(&mut self, event: &TimerEvent, timer: &mut dyn TimerHandle) {
        self.record_event(event, timer);
    }
}
