#![no_std]

#[cfg(feature = "alloc")]
extern crate alloc;

// Shared logic for the dynamic backoff timer.
//
// The crate stays portable across embedded and host targets by avoiding the
// Rust standard library. Hosts inject the deferred-wakeup facility through
// `controller::WakeupScheduler` and drive the timer by reporting elapsed
// wakeups back to it.

pub mod controller;
pub mod options;
pub mod repl;
pub mod strategy;
pub mod telemetry;
