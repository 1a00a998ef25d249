//! Series strategies used to grow the delay between ticks.
//!
//! Every strategy maps a 1-based attempt index onto a value of its numeric
//! series. The controller multiplies that value by the configured seed to get
//! the next delay. Nothing in this module holds state, so the same functions
//! back the controller, the REPL `status` output, and the emulator tables.

use core::fmt;
use core::time::Duration;

use crate::options::TimerOptions;

/// Total number of distinct [`Strategy`] variants.
pub const STRATEGY_COUNT: usize = 4;

/// Attempt ceiling applied when the configured strategy is [`Strategy::Procession`].
pub const PROCESSION_MAX_ATTEMPTS: u32 = 5000;
/// Attempt ceiling applied when the configured strategy is [`Strategy::Dayan`].
pub const DAYAN_MAX_ATTEMPTS: u32 = 141;
/// Attempt ceiling applied when the configured strategy is [`Strategy::Fibonacci`].
pub const FIBONACCI_MAX_ATTEMPTS: u32 = 20;
/// Attempt ceiling applied when the configured strategy is [`Strategy::Lucas`].
pub const LUCAS_MAX_ATTEMPTS: u32 = 19;

/// Numeric series used to grow the delay.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum Strategy {
    /// Odd numbers: `2n - 1`.
    Procession,
    /// Da Yan series: `(n^2 - n mod 2) / 2`.
    Dayan,
    /// Fibonacci numbers.
    Fibonacci,
    /// Lucas numbers.
    Lucas,
}

impl Strategy {
    /// Every strategy in catalog order.
    pub const ALL: [Strategy; STRATEGY_COUNT] = [
        Strategy::Procession,
        Strategy::Dayan,
        Strategy::Fibonacci,
        Strategy::Lucas,
    ];

    /// Canonical lowercase name.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Strategy::Procession => "procession",
            Strategy::Dayan => "dayan",
            Strategy::Fibonacci => "fibonacci",
            Strategy::Lucas => "lucas",
        }
    }

    /// Looks up a strategy by name, ignoring ASCII case.
    ///
    /// `da yan` and `da-yan` are accepted as spellings of [`Strategy::Dayan`].
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.trim();
        if name.eq_ignore_ascii_case("da yan") || name.eq_ignore_ascii_case("da-yan") {
            return Some(Strategy::Dayan);
        }

        Self::ALL
            .iter()
            .copied()
            .find(|strategy| strategy.name().eq_ignore_ascii_case(name))
    }

    /// Deterministic index for lookups into [`Strategy::ALL`].
    #[must_use]
    pub const fn as_index(self) -> usize {
        match self {
            Strategy::Procession => 0,
            Strategy::Dayan => 1,
            Strategy::Fibonacci => 2,
            Strategy::Lucas => 3,
        }
    }

    /// Attempts to construct a [`Strategy`] from a raw index.
    #[must_use]
    pub const fn from_index(index: usize) -> Option<Self> {
        match index {
            0 => Some(Strategy::Procession),
            1 => Some(Strategy::Dayan),
            2 => Some(Strategy::Fibonacci),
            3 => Some(Strategy::Lucas),
            _ => None,
        }
    }

    /// Highest attempt index evaluated for this series when the configuration
    /// does not supply a smaller one.
    ///
    /// Past these indices the resulting delay no longer fits practical
    /// scheduling ranges.
    #[must_use]
    pub const fn default_max_attempts(self) -> u32 {
        match self {
            Strategy::Procession => PROCESSION_MAX_ATTEMPTS,
            Strategy::Dayan => DAYAN_MAX_ATTEMPTS,
            Strategy::Fibonacci => FIBONACCI_MAX_ATTEMPTS,
            Strategy::Lucas => LUCAS_MAX_ATTEMPTS,
        }
    }

    /// Evaluates the series at the 1-based index `n`.
    ///
    /// See [`series_value`].
    #[must_use]
    pub const fn series_value(self, n: u32) -> u64 {
        series_value(self, n)
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Number of Fibonacci numbers, starting at index 0, that fit in a `u64`.
const FIBONACCI_TABLE_LEN: usize = 94;
/// Number of Lucas numbers, starting at index 0, that fit in a `u64`.
const LUCAS_TABLE_LEN: usize = 93;

const FIBONACCI: [u64; FIBONACCI_TABLE_LEN] = fibonacci_table();
const LUCAS: [u64; LUCAS_TABLE_LEN] = lucas_table();

const fn fibonacci_table() -> [u64; FIBONACCI_TABLE_LEN] {
    let mut table = [0u64; FIBONACCI_TABLE_LEN];
    table[1] = 1;
    let mut index = 2;
    while index < FIBONACCI_TABLE_LEN {
        table[index] = table[index - 1] + table[index - 2];
        index += 1;
    }
    table
}

const fn lucas_table() -> [u64; LUCAS_TABLE_LEN] {
    let mut table = [0u64; LUCAS_TABLE_LEN];
    table[0] = 2;
    table[1] = 1;
    let mut index = 2;
    while index < LUCAS_TABLE_LEN {
        table[index] = table[index - 1] + table[index - 2];
        index += 1;
    }
    table
}

/// Evaluates `strategy` at the 1-based index `n`.
///
/// Callers clamp `n` to the configured attempt ceiling first; this function
/// does no clamping of its own. Fibonacci and Lucas values come from exact
/// tables that agree with the rounded closed forms
/// `round(((1+√5)^n − (1−√5)^n) / (2^n·√5))` and
/// `round(((1+√5)/2)^n + ((1−√5)/2)^n)`; indices whose value no longer fits a
/// `u64` saturate to `u64::MAX`.
///
/// An index of `0` is treated as `1`.
#[must_use]
pub const fn series_value(strategy: Strategy, n: u32) -> u64 {
    let n = if n == 0 { 1 } else { n as u64 };
    match strategy {
        Strategy::Procession => 2 * n - 1,
        Strategy::Dayan => (n.saturating_mul(n) - n % 2) / 2,
        Strategy::Fibonacci => {
            if n < FIBONACCI_TABLE_LEN as u64 {
                FIBONACCI[n as usize]
            } else {
                u64::MAX
            }
        }
        Strategy::Lucas => {
            if n < LUCAS_TABLE_LEN as u64 {
                LUCAS[n as usize]
            } else {
                u64::MAX
            }
        }
    }
}

/// Computes the delay for the 1-based attempt index `n`.
///
/// The index is clamped to `options.max_attempts()`, the series value is
/// scaled by the seed at nanosecond precision, and the product is capped by
/// `options.max_delay()`.
#[must_use]
pub fn next_delay(options: &TimerOptions, n: u32) -> Duration {
    let index = n.clamp(1, options.max_attempts());
    let delay = scale(options.seed(), series_value(options.strategy(), index));
    options.max_delay().map_or(delay, |cap| delay.min(cap))
}

/// `unit * factor`, saturating at [`Duration::MAX`].
fn scale(unit: Duration, factor: u64) -> Duration {
    const NANOS_PER_SEC: u128 = 1_000_000_000;

    let nanos = unit.as_nanos().saturating_mul(u128::from(factor));
    match u64::try_from(nanos / NANOS_PER_SEC) {
        Ok(secs) => Duration::new(secs, u32::try_from(nanos % NANOS_PER_SEC).unwrap_or(0)),
        Err(_) => Duration::MAX,
    }
}

/// Whole milliseconds in `duration`, saturating at `u64::MAX`.
#[must_use]
pub fn duration_millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}
