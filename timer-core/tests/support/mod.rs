#![allow(dead_code)]

use core::cell::RefCell;
use core::time::Duration;

use dyntimer_core::controller::{
    EventKind, TimerController, TimerEvent, TimerHandle, TimerObserver, TimerState,
    WakeupScheduler,
};
use dyntimer_core::options::TimerOptions;

/// Scheduler that only records requests; tests fire wakeups by hand.
#[derive(Default)]
pub struct ManualScheduler {
    next: u64,
    pub outstanding: Vec<u64>,
    pub requested: Vec<Duration>,
    pub cancelled: usize,
}

impl WakeupScheduler for ManualScheduler {
    type Handle = u64;

    fn schedule(&mut self, after: Duration) -> u64 {
        self.next += 1;
        self.outstanding.push(self.next);
        self.requested.push(after);
        self.next
    }

    fn cancel(&mut self, handle: u64) {
        self.outstanding.retain(|pending| *pending != handle);
        self.cancelled += 1;
    }
}

pub type Reaction = fn(&TimerEvent, &mut dyn TimerHandle);

/// Observer appending every event, and the timer state seen at delivery, to a
/// shared log.
pub struct LogObserver<'log> {
    log: &'log RefCell<Vec<(TimerEvent, TimerState)>>,
    reaction: Option<Reaction>,
}

impl TimerObserver for LogObserver<'_> {
    fn notify(&mut self, event: &TimerEvent, timer: &mut dyn TimerHandle) {
        self.log.borrow_mut().push((*event, timer.state()));
        if let Some(reaction) = self.reaction {
            reaction(event, timer);
        }
    }
}

pub type TestTimer<'log> = TimerController<ManualScheduler, LogObserver<'log>>;

pub type EventLog = RefCell<Vec<(TimerEvent, TimerState)>>;

pub fn new_timer<'log>(options: TimerOptions) -> TestTimer<'log> {
    TimerController::new(options, ManualScheduler::default())
}

/// Subscribes a log observer to both channels; `reaction` runs on ticks only.
pub fn watch<'log>(timer: &mut TestTimer<'log>, log: &'log EventLog, reaction: Option<Reaction>) {
    timer
        .subscribe(EventKind::Tick, LogObserver { log, reaction })
        .expect("tick slot");
    timer
        .subscribe(EventKind::Toll, LogObserver { log, reaction: None })
        .expect("toll slot");
}

/// Subscribes a log observer to tolls only, running `reaction` on each one.
pub fn watch_tolls<'log>(timer: &mut TestTimer<'log>, log: &'log EventLog, reaction: Reaction) {
    timer
        .subscribe(
            EventKind::Toll,
            LogObserver {
                log,
                reaction: Some(reaction),
            },
        )
        .expect("toll slot");
}

/// Fires the outstanding wakeup, if any.
pub fn fire_next(timer: &mut TestTimer<'_>) -> bool {
    let Some(handle) = timer.pending_wakeup() else {
        return false;
    };
    timer
        .scheduler_mut()
        .outstanding
        .retain(|pending| *pending != handle);
    timer.fire(handle)
}

/// Fires wakeups until the timer stops scheduling them or `limit` is reached.
pub fn run_until_idle(timer: &mut TestTimer<'_>, limit: usize) -> usize {
    let mut fired = 0;
    while fired < limit && fire_next(timer) {
        fired += 1;
    }
    fired
}

pub fn events(log: &EventLog) -> Vec<TimerEvent> {
    log.borrow().iter().map(|(event, _)| *event).collect()
}

pub fn tolls(log: &EventLog) -> Vec<TimerState> {
    log.borrow()
        .iter()
        .filter_map(|(event, _)| match event {
            TimerEvent::Toll(state) => Some(*state),
            TimerEvent::Tick(_) => None,
        })
        .collect()
}

pub fn tick_attempts(log: &EventLog) -> Vec<u32> {
    log.borrow()
        .iter()
        .filter_map(|(event, _)| match event {
            TimerEvent::Tick(tick) => Some(tick.attempts),
            TimerEvent::Toll(_) => None,
        })
        .collect()
}

pub fn millis(value: u64) -> Duration {
    Duration::from_millis(value)
}
