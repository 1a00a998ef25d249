//! Timer state machine.
//!
//! [`TimerController`] owns the lifecycle state, the attempt counter, and the
//! single outstanding wakeup. Deferred callbacks come from an injected
//! [`WakeupScheduler`]; the host calls [`TimerController::fire`] with the
//! handle once the requested delay has elapsed. Ticks and lifecycle tolls are
//! delivered synchronously to registered [`TimerObserver`]s.

use core::fmt;
use core::mem;
use core::time::Duration;

use heapless::{Deque, Vec};

use crate::options::{OverrunAction, TimerOptions};
use crate::strategy;

mod observer;

pub use observer::{
    EventKind, NoopObserver, ObserverId, SubscribeError, TickEvent, TimerEvent, TimerObserver,
};

/// Default number of observer slots per controller.
pub const MAX_OBSERVERS: usize = 8;

/// Events raised while observers are being notified wait here.
const OUTBOX_CAPACITY: usize = 16;

/// Lifecycle states of a timer.
///
/// `Resumed` and `Reset` are announced through a toll and immediately give
/// way to `Running`.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum TimerState {
    Stopped,
    Running,
    Paused,
    Resumed,
    Reset,
}

impl TimerState {
    pub const ALL: [TimerState; 5] = [
        TimerState::Stopped,
        TimerState::Running,
        TimerState::Paused,
        TimerState::Resumed,
        TimerState::Reset,
    ];

    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            TimerState::Stopped => "stopped",
            TimerState::Running => "running",
            TimerState::Paused => "paused",
            TimerState::Resumed => "resumed",
            TimerState::Reset => "reset",
        }
    }

    #[must_use]
    pub const fn as_index(self) -> usize {
        match self {
            TimerState::Stopped => 0,
            TimerState::Running => 1,
            TimerState::Paused => 2,
            TimerState::Resumed => 3,
            TimerState::Reset => 4,
        }
    }

    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(TimerState::Stopped),
            1 => Some(TimerState::Running),
            2 => Some(TimerState::Paused),
            3 => Some(TimerState::Resumed),
            4 => Some(TimerState::Reset),
            _ => None,
        }
    }
}

impl fmt::Display for TimerState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Host facility that runs a callback after a delay.
///
/// The controller keeps at most one handle outstanding and cancels it before
/// every state change. When the delay elapses the host passes the handle back
/// through [`TimerController::fire`].
pub trait WakeupScheduler {
    type Handle: Copy + Eq;

    /// Requests a wakeup `after` the given delay.
    fn schedule(&mut self, after: Duration) -> Self::Handle;

    /// Withdraws a previously scheduled wakeup.
    fn cancel(&mut self, handle: Self::Handle);
}

/// Object-safe view of a timer handed to observers.
pub trait TimerHandle {
    fn state(&self) -> TimerState;
    fn attempts(&self) -> u32;
    fn delay(&self) -> Duration;
    fn overed(&self) -> bool;
    fn options(&self) -> &TimerOptions;
    fn start(&mut self);
    fn stop(&mut self);
    fn pause(&mut self);
    fn resume(&mut self);
    /// `reset(true)` leaves a running timer [`TimerState::Stopped`].
    fn reset(&mut self, stop_after: bool);
}

struct Subscription<O> {
    id: ObserverId,
    kind: EventKind,
    observer: O,
}

/// Backoff timer driven by a [`WakeupScheduler`].
pub struct TimerController<S, O = NoopObserver, const OBSERVERS: usize = MAX_OBSERVERS>
where
    S: WakeupScheduler,
    O: TimerObserver,
{
    options: TimerOptions,
    scheduler: S,
    state: TimerState,
    attempts: u32,
    delay: Duration,
    overed: bool,
    pending: Option<S::Handle>,
    observers: Vec<Subscription<O>, OBSERVERS>,
    next_observer_id: u32,
    outbox: Deque<TimerEvent, OUTBOX_CAPACITY>,
    dispatching: bool,
    dropped_events: u32,
}

impl<S, O, const OBSERVERS: usize> TimerController<S, O, OBSERVERS>
where
    S: WakeupScheduler,
    O: TimerObserver,
{
    /// Creates a stopped timer, starting it right away when
    /// [`TimerOptions::autostart`] is set.
    pub fn new(options: TimerOptions, scheduler: S) -> Self {
        let mut timer = Self {
            options,
            scheduler,
            state: TimerState::Stopped,
            attempts: 0,
            delay: options.delay(),
            overed: false,
            pending: None,
            observers: Vec::new(),
            next_observer_id: 0,
            outbox: Deque::new(),
            dispatching: false,
            dropped_events: 0,
        };

        if options.autostart() {
            timer.start();
        }

        timer
    }

    #[must_use]
    pub const fn options(&self) -> &TimerOptions {
        &self.options
    }

    #[must_use]
    pub const fn state(&self) -> TimerState {
        self.state
    }

    /// Ticks fired since the last start or reset.
    #[must_use]
    pub const fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Delay that applies to the next tick.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Whether a tick in the current cycle observed the attempt or delay ceiling.
    #[must_use]
    pub const fn overed(&self) -> bool {
        self.overed
    }

    /// Returns `true` while a wakeup is outstanding.
    #[must_use]
    pub const fn is_scheduled(&self) -> bool {
        self.pending.is_some()
    }

    /// Handle of the outstanding wakeup, if any.
    #[must_use]
    pub fn pending_wakeup(&self) -> Option<S::Handle> {
        self.pending
    }

    /// Number of events discarded because the dispatch queue was full.
    #[must_use]
    pub const fn dropped_events(&self) -> u32 {
        self.dropped_events
    }

    #[must_use]
    pub fn scheduler(&self) -> &S {
        &self.scheduler
    }

    pub fn scheduler_mut(&mut self) -> &mut S {
        &mut self.scheduler
    }

    /// Registers an observer for one event channel.
    pub fn subscribe(&mut self, kind: EventKind, observer: O) -> Result<ObserverId, SubscribeError> {
        let id = ObserverId::new(self.next_observer_id);
        self.observers
            .push(Subscription { id, kind, observer })
            .map_err(|_| SubscribeError::RegistryFull)?;
        self.next_observer_id = self.next_observer_id.wrapping_add(1);
        Ok(id)
    }

    /// Removes an observer and hands it back.
    pub fn unsubscribe(&mut self, id: ObserverId) -> Option<O> {
        let index = self.observers.iter().position(|sub| sub.id == id)?;
        Some(self.observers.remove(index).observer)
    }

    #[must_use]
    pub fn observer(&self, id: ObserverId) -> Option<&O> {
        self.observers
            .iter()
            .find(|sub| sub.id == id)
            .map(|sub| &sub.observer)
    }

    pub fn observer_mut(&mut self, id: ObserverId) -> Option<&mut O> {
        self.observers
            .iter_mut()
            .find(|sub| sub.id == id)
            .map(|sub| &mut sub.observer)
    }

    /// Number of registered observers across both channels.
    #[must_use]
    pub fn observer_count(&self) -> usize {
        self.observers.len()
    }

    /// Zeroes the counters and begins ticking after the configured delay.
    ///
    /// Does nothing when the timer is already running.
    pub fn start(&mut self) {
        if self.state == TimerState::Running {
            return;
        }

        self.clear_cycle();
        self.state = TimerState::Running;
        self.schedule_next();
    }

    /// Cancels the pending tick and clears the counters.
    ///
    /// Announces [`TimerState::Stopped`]; does nothing when already stopped.
    pub fn stop(&mut self) {
        if self.state == TimerState::Stopped {
            return;
        }

        self.clear_cycle();
        self.state = TimerState::Stopped;
        self.emit(TimerEvent::Toll(TimerState::Stopped));
    }

    /// Suspends a running timer while keeping its attempt count.
    pub fn pause(&mut self) {
        if self.state != TimerState::Running {
            return;
        }

        let attempts = self.attempts;
        self.clear_cycle();
        self.attempts = attempts;
        self.state = TimerState::Paused;
        self.emit(TimerEvent::Toll(TimerState::Paused));
    }

    /// Continues a paused timer from its preserved attempt count.
    ///
    /// Announces [`TimerState::Resumed`] before scheduling. If an observer
    /// moves the timer elsewhere while the toll is delivered, that transition
    /// wins and nothing is scheduled.
    pub fn resume(&mut self) {
        if self.state != TimerState::Paused {
            return;
        }

        self.state = TimerState::Resumed;
        self.emit(TimerEvent::Toll(TimerState::Resumed));
        if self.state != TimerState::Resumed {
            return;
        }

        self.delay = strategy::next_delay(&self.options, self.attempts.saturating_add(1));
        self.state = TimerState::Running;
        self.schedule_next();
    }

    /// Cancels the pending tick and zeroes the cycle counters.
    ///
    /// With `stop_after == false` the timer announces [`TimerState::Reset`]
    /// and restarts from the configured delay. With `stop_after == true` no
    /// toll is emitted and the timer is left idle; a running timer becomes
    /// [`TimerState::Stopped`] since it no longer has a wakeup outstanding.
    pub fn reset(&mut self, stop_after: bool) {
        self.clear_cycle();

        if stop_after {
            if self.state == TimerState::Running {
                self.state = TimerState::Stopped;
            }
            return;
        }

        self.state = TimerState::Reset;
        self.emit(TimerEvent::Toll(TimerState::Reset));
        if self.state != TimerState::Reset {
            return;
        }

        self.state = TimerState::Running;
        self.schedule_next();
    }

    /// Delivers an elapsed wakeup.
    ///
    /// Returns `false` and does nothing when `handle` is not the outstanding
    /// wakeup, which covers wakeups that raced a cancellation.
    pub fn fire(&mut self, handle: S::Handle) -> bool {
        if self.state != TimerState::Running || self.pending != Some(handle) {
            return false;
        }
        self.pending = None;

        self.attempts = self.attempts.saturating_add(1);
        self.delay = strategy::next_delay(&self.options, self.attempts.saturating_add(1));

        let attempts_exhausted = self.attempts >= self.options.max_attempts();
        let delay_exhausted = self
            .options
            .max_delay()
            .is_some_and(|cap| self.delay >= cap);
        self.overed |= attempts_exhausted || delay_exhausted;

        let tick = TimerEvent::Tick(TickEvent {
            attempts: self.attempts,
            delay: self.delay,
        });

        if self.overed {
            match self.options.overrun() {
                OverrunAction::Stop => {
                    self.emit(tick);
                    if self.state == TimerState::Running {
                        self.stop();
                    }
                    return true;
                }
                OverrunAction::Reset => {
                    self.emit(tick);
                    if self.state == TimerState::Running {
                        self.reset(false);
                    }
                    return true;
                }
                OverrunAction::Overload => {}
            }
        }

        self.schedule_next();
        self.emit(tick);
        true
    }

    fn clear_cycle(&mut self) {
        if let Some(handle) = self.pending.take() {
            self.scheduler.cancel(handle);
        }
        self.attempts = 0;
        self.overed = false;
        self.delay = self.options.delay();
    }

    fn schedule_next(&mut self) {
        if let Some(handle) = self.pending.take() {
            self.scheduler.cancel(handle);
        }
        self.pending = Some(self.scheduler.schedule(self.delay));
    }

    fn emit(&mut self, event: TimerEvent) {
        if self.outbox.push_back(event).is_err() {
            self.dropped_events = self.dropped_events.saturating_add(1);
        }
        if self.dispatching {
            return;
        }

        self.dispatching = true;
        let mut observers = mem::take(&mut self.observers);
        while let Some(event) = self.outbox.pop_front() {
            let kind = event.kind();
            for sub in observers.iter_mut().filter(|sub| sub.kind == kind) {
                sub.observer.notify(&event, self);
            }
        }
        self.observers = observers;
        self.dispatching = false;
    }
}

impl<S, O, const OBSERVERS: usize> TimerHandle for TimerController<S, O, OBSERVERS>
where
    S: WakeupScheduler,
    O: TimerObserver,
{
    fn state(&self) -> TimerState {
        self.state
    }

    fn attempts(&self) -> u32 {
        self.attempts
    }

    fn delay(&self) -> Duration {
        self.delay
    }

    fn overed(&self) -> bool {
        self.overed
    }

    fn options(&self) -> &TimerOptions {
        &self.options
    }

    fn start(&mut self) {
        TimerController::start(self);
    }

    fn stop(&mut self) {
        TimerController::stop(self);
    }

    fn pause(&mut self) {
        TimerController::pause(self);
    }

    fn resume(&mut self) {
        TimerController::resume(self);
    }

    fn reset(&mut self, stop_after: bool) {
        TimerController::reset(self, stop_after);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::Strategy;

    #[derive(Default)]
    struct StubScheduler {
        next: u32,
        scheduled: Vec<(u32, Duration), 16>,
        cancelled: Vec<u32, 16>,
    }

    impl WakeupScheduler for StubScheduler {
        type Handle = u32;

        fn schedule(&mut self, after: Duration) -> u32 {
            self.next += 1;
            self.scheduled.push((self.next, after)).expect("schedule log");
            self.next
        }

        fn cancel(&mut self, handle: u32) {
            self.cancelled.push(handle).expect("cancel log");
        }
    }

    #[derive(Default)]
    struct Recorder {
        events: Vec<TimerEvent, 16>,
    }

    impl TimerObserver for Recorder {
        fn notify(&mut self, event: &TimerEvent, _timer: &mut dyn TimerHandle) {
            self.events.push(*event).expect("event log");
        }
    }

    fn timer(options: TimerOptions) -> TimerController<StubScheduler, Recorder> {
        TimerController::new(options, StubScheduler::default())
    }

    fn fire_pending(timer: &mut TimerController<StubScheduler, Recorder>) -> bool {
        let handle = timer.pending_wakeup().expect("wakeup pending");
        timer.fire(handle)
    }

    #[test]
    fn new_timer_is_stopped_unless_autostarted() {
        let idle = timer(TimerOptions::default());
        assert_eq!(idle.state(), TimerState::Stopped);
        assert!(!idle.is_scheduled());

        let running = timer(TimerOptions::builder().autostart(true).build());
        assert_eq!(running.state(), TimerState::Running);
        assert_eq!(
            running.scheduler().scheduled.as_slice(),
            &[(1, Duration::from_millis(1000))]
        );
    }

    #[test]
    fn first_tick_follows_configured_delay_then_series() {
        let options = TimerOptions::builder()
            .strategy(Strategy::Procession)
            .seed(Duration::from_millis(10))
            .delay(Duration::from_millis(5))
            .build();
        let mut timer = timer(options);
        timer.start();
        assert_eq!(timer.delay(), Duration::from_millis(5));

        assert!(fire_pending(&mut timer));
        assert_eq!(timer.attempts(), 1);
        assert_eq!(timer.delay(), Duration::from_millis(30));
        assert_eq!(
            timer.scheduler().scheduled.last(),
            Some(&(2, Duration::from_millis(30)))
        );
    }

    #[test]
    fn stale_handles_are_ignored() {
        let mut timer = timer(TimerOptions::default());
        timer.start();
        let stale = timer.pending_wakeup().expect("wakeup pending");
        timer.pause();
        timer.resume();

        assert!(!timer.fire(stale));
        assert_eq!(timer.attempts(), 0);
        assert_eq!(timer.scheduler().cancelled.as_slice(), &[stale]);
    }

    #[test]
    fn pending_wakeup_tracks_running_state() {
        let mut timer = timer(TimerOptions::default());
        timer.start();
        assert!(timer.is_scheduled());
        timer.pause();
        assert!(!timer.is_scheduled());
        timer.resume();
        assert!(timer.is_scheduled());
        timer.reset(true);
        assert_eq!(timer.state(), TimerState::Stopped);
        assert!(!timer.is_scheduled());
    }

    #[test]
    fn subscribers_only_receive_their_channel() {
        let mut timer = timer(TimerOptions::default());
        let ticks = timer
            .subscribe(EventKind::Tick, Recorder::default())
            .expect("slot");
        let tolls = timer
            .subscribe(EventKind::Toll, Recorder::default())
            .expect("slot");

        timer.start();
        fire_pending(&mut timer);
        timer.stop();

        let tick_log = &timer.observer(ticks).expect("tick observer").events;
        assert_eq!(
            tick_log.as_slice(),
            &[TimerEvent::Tick(TickEvent {
                attempts: 1,
                delay: Duration::from_millis(2000),
            })]
        );
        let toll_log = &timer.observer(tolls).expect("toll observer").events;
        assert_eq!(toll_log.as_slice(), &[TimerEvent::Toll(TimerState::Stopped)]);
    }

    #[test]
    fn registry_reports_capacity_and_returns_unsubscribed_observer() {
        let mut timer: TimerController<StubScheduler, Recorder, 1> =
            TimerController::new(TimerOptions::default(), StubScheduler::default());
        let id = timer
            .subscribe(EventKind::Toll, Recorder::default())
            .expect("slot");
        assert_eq!(
            timer.subscribe(EventKind::Tick, Recorder::default()),
            Err(SubscribeError::RegistryFull)
        );

        assert!(timer.unsubscribe(id).is_some());
        assert!(timer.unsubscribe(id).is_none());
        assert_eq!(timer.observer_count(), 0);
    }

    #[test]
    fn event_kinds_resolve_by_name() {
        assert_eq!(EventKind::from_name("TICK"), Some(EventKind::Tick));
        assert_eq!(EventKind::from_name("toll"), Some(EventKind::Toll));
        assert_eq!(EventKind::from_name("tock"), None);
    }

    #[test]
    fn states_round_trip_through_index() {
        for state in TimerState::ALL {
            assert_eq!(TimerState::from_index(state.as_index()), Some(state));
        }
        assert_eq!(TimerState::from_index(TimerState::ALL.len()), None);
    }
}
