//! Timer configuration and its normalization rules.
//!
//! Configuration is never rejected. Missing, zero, out-of-range, or otherwise
//! malformed values collapse onto documented defaults so that every
//! [`TimerOptions`] value describes a working timer. Two entry points feed the
//! same rules: the typed [`TimerOptionsBuilder`] and the loosely typed
//! [`RawOptions`] produced by [`parse_options`] from `key=value` text.

use core::fmt;
use core::time::Duration;

use crate::strategy::Strategy;

mod parser;

pub use parser::{OptionKey, parse_options};

/// Multiplier applied to series values when none is configured.
pub const DEFAULT_SEED: Duration = Duration::from_millis(1000);
/// Delay before the first tick when none is configured.
pub const DEFAULT_DELAY: Duration = Duration::from_millis(1000);
/// Strategy used when none (or an unknown one) is configured.
pub const DEFAULT_STRATEGY: Strategy = Strategy::Dayan;
/// Overrun behavior used when none (or an unknown one) is configured.
pub const DEFAULT_OVERRUN: OverrunAction = OverrunAction::Overload;

/// Behavior applied once a tick observes the attempt or delay ceiling.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum OverrunAction {
    /// Emit the tick, then stop the timer.
    Stop,
    /// Emit the tick, then restart the cycle from attempt zero.
    Reset,
    /// Keep ticking with the delay pinned at its ceiling.
    Overload,
}

impl OverrunAction {
    /// Every overrun action in catalog order.
    pub const ALL: [OverrunAction; 3] = [
        OverrunAction::Stop,
        OverrunAction::Reset,
        OverrunAction::Overload,
    ];

    /// Canonical lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            OverrunAction::Stop => "stop",
            OverrunAction::Reset => "reset",
            OverrunAction::Overload => "overload",
        }
    }

    /// Looks up an overrun action by name, ignoring ASCII case.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        Self::ALL
            .iter()
            .copied()
            .find(|action| action.name().eq_ignore_ascii_case(name))
    }
}

impl fmt::Display for OverrunAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Normalized, immutable timer configuration.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct TimerOptions {
    seed: Duration,
    delay: Duration,
    strategy: Strategy,
    max_attempts: u32,
    max_delay: Option<Duration>,
    overrun: OverrunAction,
    autostart: bool,
}

impl TimerOptions {
    /// Starts a typed builder seeded with the defaults.
    #[must_use]
    pub const fn builder() -> TimerOptionsBuilder {
        TimerOptionsBuilder::new()
    }

    /// Normalizes loosely typed options.
    ///
    /// Values that cannot be interpreted for their key fall back to the
    /// default for that key; this never fails.
    #[must_use]
    pub fn from_raw(raw: &RawOptions<'_>) -> Self {
        let mut builder = TimerOptionsBuilder::new();

        if let Some(seed) = raw.seed.and_then(OptionValue::as_duration) {
            builder = builder.seed(seed);
        }
        if let Some(delay) = raw.delay.and_then(OptionValue::as_duration) {
            builder = builder.delay(delay);
        }
        if let Some(strategy) = raw
            .strategy
            .and_then(OptionValue::as_text)
            .and_then(Strategy::from_name)
        {
            builder = builder.strategy(strategy);
        }
        if let Some(max_attempts) = raw
            .max_attempts
            .and_then(OptionValue::as_integer)
            .and_then(|value| u32::try_from(value).ok())
        {
            builder = builder.max_attempts(max_attempts);
        }
        if let Some(max_delay) = raw.max_delay.and_then(OptionValue::as_duration) {
            builder = builder.max_delay(max_delay);
        }
        if let Some(overrun) = raw
            .overrun
            .and_then(OptionValue::as_text)
            .and_then(OverrunAction::from_name)
        {
            builder = builder.overrun(overrun);
        }
        if let Some(autostart) = raw.autostart.and_then(OptionValue::as_flag) {
            builder = builder.autostart(autostart);
        }

        builder.build()
    }

    /// Multiplier applied to each series value.
    #[must_use]
    pub const fn seed(&self) -> Duration {
        self.seed
    }

    /// Delay before the first tick of every cycle.
    #[must_use]
    pub const fn delay(&self) -> Duration {
        self.delay
    }

    /// Series used to grow the delay.
    #[must_use]
    pub const fn strategy(&self) -> Strategy {
        self.strategy
    }

    /// Attempt ceiling; always within `1..=strategy.default_max_attempts()`.
    #[must_use]
    pub const fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Hard cap on computed delays, or `None` when unbounded.
    #[must_use]
    pub const fn max_delay(&self) -> Option<Duration> {
        self.max_delay
    }

    /// Behavior once the attempt or delay ceiling is reached.
    #[must_use]
    pub const fn overrun(&self) -> OverrunAction {
        self.overrun
    }

    /// Whether constructing a controller immediately starts it.
    #[must_use]
    pub const fn autostart(&self) -> bool {
        self.autostart
    }
}

impl Default for TimerOptions {
    fn default() -> Self {
        TimerOptionsBuilder::new().build()
    }
}

/// Typed construction path for [`TimerOptions`].
///
/// Every setter accepts any value; [`TimerOptionsBuilder::build`] applies the
/// normalization rules.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct TimerOptionsBuilder {
    seed: Option<Duration>,
    delay: Option<Duration>,
    strategy: Option<Strategy>,
    max_attempts: Option<u32>,
    max_delay: Option<Duration>,
    overrun: Option<OverrunAction>,
    autostart: bool,
}

impl TimerOptionsBuilder {
    /// Creates a builder with nothing configured.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            seed: None,
            delay: None,
            strategy: None,
            max_attempts: None,
            max_delay: None,
            overrun: None,
            autostart: false,
        }
    }

    #[must_use]
    pub const fn seed(mut self, seed: Duration) -> Self {
        self.seed = Some(seed);
        self
    }

    #[must_use]
    pub const fn delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    #[must_use]
    pub const fn strategy(mut self, strategy: Strategy) -> Self {
        self.strategy = Some(strategy);
        self
    }

    #[must_use]
    pub const fn max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    #[must_use]
    pub const fn max_delay(mut self, max_delay: Duration) -> Self {
        self.max_delay = Some(max_delay);
        self
    }

    #[must_use]
    pub const fn overrun(mut self, overrun: OverrunAction) -> Self {
        self.overrun = Some(overrun);
        self
    }

    #[must_use]
    pub const fn autostart(mut self, autostart: bool) -> Self {
        self.autostart = autostart;
        self
    }

    /// Applies the normalization rules and produces the final options.
    #[must_use]
    pub fn build(self) -> TimerOptions {
        let strategy = self.strategy.unwrap_or(DEFAULT_STRATEGY);
        let ceiling = strategy.default_max_attempts();

        TimerOptions {
            seed: positive_or(self.seed, DEFAULT_SEED),
            delay: positive_or(self.delay, DEFAULT_DELAY),
            strategy,
            max_attempts: match self.max_attempts {
                Some(value) if value > 0 && value <= ceiling => value,
                _ => ceiling,
            },
            max_delay: self.max_delay.filter(|cap| !cap.is_zero()),
            overrun: self.overrun.unwrap_or(DEFAULT_OVERRUN),
            autostart: self.autostart,
        }
    }
}

fn positive_or(value: Option<Duration>, default: Duration) -> Duration {
    value
        .filter(|duration| !duration.is_zero())
        .unwrap_or(default)
}

/// Loosely typed value attached to an option key.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub enum OptionValue<'a> {
    /// Unsuffixed integer literal.
    Integer(u64),
    /// Duration literal such as `250ms` or `2.5s`, or a fractional number of
    /// milliseconds such as `1.5`.
    Duration(Duration),
    /// Anything else, verbatim.
    Text(&'a str),
}

impl<'a> OptionValue<'a> {
    /// Interprets integers as milliseconds; text never converts.
    #[must_use]
    pub fn as_duration(self) -> Option<Duration> {
        match self {
            OptionValue::Integer(millis) => Some(Duration::from_millis(millis)),
            OptionValue::Duration(duration) => Some(duration),
            OptionValue::Text(_) => None,
        }
    }

    #[must_use]
    pub fn as_integer(self) -> Option<u64> {
        match self {
            OptionValue::Integer(value) => Some(value),
            _ => None,
        }
    }

    #[must_use]
    pub fn as_text(self) -> Option<&'a str> {
        match self {
            OptionValue::Text(text) => Some(text),
            _ => None,
        }
    }

    /// Interprets `true`/`yes`/`on`/non-zero integers as enabled and
    /// `false`/`no`/`off`/`0` as disabled.
    #[must_use]
    pub fn as_flag(self) -> Option<bool> {
        match self {
            OptionValue::Integer(value) => Some(value != 0),
            OptionValue::Duration(_) => None,
            OptionValue::Text(text) => {
                if ["true", "yes", "on"]
                    .iter()
                    .any(|word| word.eq_ignore_ascii_case(text))
                {
                    Some(true)
                } else if ["false", "no", "off"]
                    .iter()
                    .any(|word| word.eq_ignore_ascii_case(text))
                {
                    Some(false)
                } else {
                    None
                }
            }
        }
    }
}

/// Recognized option keys with whatever value was supplied for each.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct RawOptions<'a> {
    pub seed: Option<OptionValue<'a>>,
    pub delay: Option<OptionValue<'a>>,
    pub strategy: Option<OptionValue<'a>>,
    pub max_attempts: Option<OptionValue<'a>>,
    pub max_delay: Option<OptionValue<'a>>,
    pub overrun: Option<OptionValue<'a>>,
    pub autostart: Option<OptionValue<'a>>,
}

impl<'a> RawOptions<'a> {
    /// Creates an empty set of raw options.
    #[must_use]
    pub const fn new() -> Self {
        Self {
            seed: None,
            delay: None,
            strategy: None,
            max_attempts: None,
            max_delay: None,
            overrun: None,
            autostart: None,
        }
    }

    /// Stores `value` under `key`, replacing any previous value.
    pub fn set(&mut self, key: OptionKey, value: OptionValue<'a>) {
        let slot = match key {
            OptionKey::Seed => &mut self.seed,
            OptionKey::Delay => &mut self.delay,
            OptionKey::Strategy => &mut self.strategy,
            OptionKey::MaxAttempts => &mut self.max_attempts,
            OptionKey::MaxDelay => &mut self.max_delay,
            OptionKey::Overrun => &mut self.overrun,
            OptionKey::Autostart => &mut self.autostart,
        };
        *slot = Some(value);
    }

    /// Overlays every value present in `other`, keeping ours where it has none.
    pub fn merge(&mut self, other: &RawOptions<'a>) {
        self.seed = other.seed.or(self.seed);
        self.delay = other.delay.or(self.delay);
        self.strategy = other.strategy.or(self.strategy);
        self.max_attempts = other.max_attempts.or(self.max_attempts);
        self.max_delay = other.max_delay.or(self.max_delay);
        self.overrun = other.overrun.or(self.overrun);
        self.autostart = other.autostart.or(self.autostart);
    }

    /// Normalizes these values into [`TimerOptions`].
    #[must_use]
    pub fn normalize(&self) -> TimerOptions {
        TimerOptions::from_raw(self)
    }
}
