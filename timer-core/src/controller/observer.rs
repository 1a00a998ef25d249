//! Events emitted by the timer and the observer contract that receives them.

use core::fmt;
use core::time::Duration;

#[cfg(feature = "alloc")]
use alloc::{boxed::Box, rc::Rc};
#[cfg(feature = "alloc")]
use core::cell::RefCell;

use super::{TimerHandle, TimerState};

/// Event channels observers can subscribe to.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum EventKind {
    /// One firing of the scheduled wakeup.
    Tick,
    /// Lifecycle transition announcement.
    Toll,
}

impl EventKind {
    pub const ALL: [EventKind; 2] = [EventKind::Tick, EventKind::Toll];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            EventKind::Tick => "tick",
            EventKind::Toll => "toll",
        }
    }

    /// Looks up an event channel by name, ignoring ASCII case.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.name().eq_ignore_ascii_case(name.trim()))
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Counters captured when a tick fires.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TickEvent {
    /// Ticks fired since the last start or reset, including this one.
    pub attempts: u32,
    /// Delay that applies to the following tick.
    pub delay: Duration,
}

/// Notification delivered to observers.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum TimerEvent {
    Tick(TickEvent),
    Toll(TimerState),
}

impl TimerEvent {
    /// Channel this event is delivered on.
    #[must_use]
    pub const fn kind(&self) -> EventKind {
        match self {
            TimerEvent::Tick(_) => EventKind::Tick,
            TimerEvent::Toll(_) => EventKind::Toll,
        }
    }
}

impl fmt::Display for TimerEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TimerEvent::Tick(tick) => write!(
                f,
                "#{}, next after {} ms",
                tick.attempts,
                tick.delay.as_millis()
            ),
            TimerEvent::Toll(state) => write!(f, "toll {state}"),
        }
    }
}

/// Receives timer events synchronously.
///
/// The timer is handed back as a [`TimerHandle`] so an observer can react by
/// pausing, stopping, or resetting it. Events raised by those reactions are
/// queued and delivered after the current notification returns.
pub trait TimerObserver {
    fn notify(&mut self, event: &TimerEvent, timer: &mut dyn TimerHandle);
}

/// Observer that ignores every event.
#[derive(Copy, Clone, Debug, Default)]
pub struct NoopObserver;

impl TimerObserver for NoopObserver {
    fn notify(&mut self, _event: &TimerEvent, _timer: &mut dyn TimerHandle) {}
}

impl<T: TimerObserver + ?Sized> TimerObserver for &mut T {
    fn notify(&mut self, event: &TimerEvent, timer: &mut dyn TimerHandle) {
        (**self).notify(event, timer);
    }
}

#[cfg(feature = "alloc")]
impl<T: TimerObserver + ?Sized> TimerObserver for Box<T> {
    fn notify(&mut self, event: &TimerEvent, timer: &mut dyn TimerHandle) {
        (**self).notify(event, timer);
    }
}

#[cfg(feature = "alloc")]
impl<T: TimerObserver + ?Sized> TimerObserver for Rc<RefCell<T>> {
    fn notify(&mut self, event: &TimerEvent, timer: &mut dyn TimerHandle) {
        self.borrow_mut().notify(event, timer);
    }
}

/// Identifier returned by [`TimerController::subscribe`](super::TimerController::subscribe).
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Ord, PartialOrd)]
pub struct ObserverId(u32);

impl ObserverId {
    pub(crate) const fn new(raw: u32) -> Self {
        Self(raw)
    }

    /// Raw numeric value of the identifier.
    #[must_use]
    pub const fn get(self) -> u32 {
        self.0
    }
}

impl fmt::Display for ObserverId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "observer#{}", self.0)
    }
}

/// Errors returned when registering an observer.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum SubscribeError {
    /// Every observer slot is in use.
    RegistryFull,
}

impl fmt::Display for SubscribeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SubscribeError::RegistryFull => f.write_str("observer registry is full"),
        }
    }
}
