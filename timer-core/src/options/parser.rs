//! `key=value` option parsing on top of the REPL lexer.
//!
//! The parser is deliberately forgiving: unknown keys and malformed pairs are
//! skipped, and a value made of several adjacent tokens (for example `-3` or
//! `1e3`) is kept as text so normalization replaces it with the default.
//! Bare numbers with a fraction, such as `1.5`, are read as milliseconds.

use core::time::Duration;

use crate::repl::grammar::{self, LexError, Token, TokenKind};

use super::{OptionValue, RawOptions};

/// Option keys recognized by [`parse_options`].
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash)]
pub enum OptionKey {
    Seed,
    Delay,
    Strategy,
    MaxAttempts,
    MaxDelay,
    Overrun,
    Autostart,
}

impl OptionKey {
    /// Every key in catalog order.
    pub const ALL: [OptionKey; 7] = [
        OptionKey::Seed,
        OptionKey::Delay,
        OptionKey::Strategy,
        OptionKey::MaxAttempts,
        OptionKey::MaxDelay,
        OptionKey::Overrun,
        OptionKey::Autostart,
    ];

    /// Canonical kebab-case spelling.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            OptionKey::Seed => "seed",
            OptionKey::Delay => "delay",
            OptionKey::Strategy => "strategy",
            OptionKey::MaxAttempts => "max-attempts",
            OptionKey::MaxDelay => "max-delay",
            OptionKey::Overrun => "overrun",
            OptionKey::Autostart => "autostart",
        }
    }

    /// Finds a key by name, ignoring ASCII case and `-`/`_` separators so
    /// that `max-attempts`, `max_attempts`, and `maxAttempts` all match.
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|key| loose_eq(key.name(), name))
    }
}

fn loose_eq(canonical: &str, candidate: &str) -> bool {
    let mut left = canonical.bytes().filter(|byte| !matches!(byte, b'-' | b'_'));
    let mut right = candidate.bytes().filter(|byte| !matches!(byte, b'-' | b'_'));
    loop {
        match (left.next(), right.next()) {
            (None, None) => return true,
            (Some(a), Some(b)) if a.eq_ignore_ascii_case(&b) => {}
            _ => return false,
        }
    }
}

/// Parses whitespace- or comma-separated `key=value` pairs.
///
/// Only lexer capacity exhaustion is reported as an error; every other
/// irregularity is absorbed so the resulting [`RawOptions`] can be normalized.
pub fn parse_options(line: &str) -> Result<RawOptions<'_>, LexError> {
    let tokens = grammar::lex(line)?;
    let mut raw = RawOptions::new();
    let mut rest = tokens.as_slice();

    while let Some((token, remaining)) = rest.split_first() {
        rest = remaining;
        if token.kind != TokenKind::Word {
            continue;
        }

        let Some((equals, after_equals)) = rest.split_first() else {
            break;
        };
        if equals.kind != TokenKind::Equals {
            continue;
        }

        let (value_tokens, after_value) = split_adjacent(after_equals, equals.span.end);
        rest = after_value;

        let (Some(key), Some(value)) = (
            OptionKey::from_name(token.text),
            option_value(line, value_tokens),
        ) else {
            continue;
        };
        raw.set(key, value);
    }

    Ok(raw)
}

/// Splits off the run of tokens that directly follows byte offset `end`
/// without intervening whitespace.
fn split_adjacent<'src, 'slice>(
    tokens: &'slice [Token<'src>],
    mut end: usize,
) -> (&'slice [Token<'src>], &'slice [Token<'src>]) {
    let mut count = 0;
    for token in tokens {
        if token.span.start != end || matches!(token.kind, TokenKind::Comma | TokenKind::Newline) {
            break;
        }
        end = token.span.end;
        count += 1;
    }
    tokens.split_at(count)
}

fn option_value<'src>(line: &'src str, tokens: &[Token<'src>]) -> Option<OptionValue<'src>> {
    match tokens {
        [] => None,
        [single] => Some(match single.kind {
            TokenKind::Number if single.text.contains('.') => {
                grammar::millis_literal(single.text)
                    .map_or(OptionValue::Text(single.text), OptionValue::Duration)
            }
            TokenKind::Number => single
                .text
                .parse::<u64>()
                .map_or(OptionValue::Text(single.text), OptionValue::Integer),
            TokenKind::Duration => grammar::duration_literal(single.text)
                .map_or(OptionValue::Text(single.text), OptionValue::Duration),
            _ => OptionValue::Text(single.text),
        }),
        [first, .., last] => Some(OptionValue::Text(&line[first.span.start..last.span.end])),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::TimerOptions;
    use crate::strategy::Strategy;

    #[test]
    fn parses_every_recognized_key() {
        let raw = parse_options(
            "seed=500 delay=2s strategy=lucas max-attempts=10 max-delay=4000 overrun=stop autostart=true",
        )
        .expect("options should lex");

        assert_eq!(raw.seed, Some(OptionValue::Integer(500)));
        assert_eq!(raw.delay, Some(OptionValue::Duration(Duration::from_secs(2))));
        assert_eq!(raw.strategy, Some(OptionValue::Text("lucas")));
        assert_eq!(raw.max_attempts, Some(OptionValue::Integer(10)));
        assert_eq!(raw.max_delay, Some(OptionValue::Integer(4000)));
        assert_eq!(raw.overrun, Some(OptionValue::Text("stop")));
        assert_eq!(raw.autostart, Some(OptionValue::Text("true")));
    }

    #[test]
    fn accepts_camel_case_keys_and_commas() {
        let raw = parse_options("maxAttempts=3,maxDelay=250ms").expect("options should lex");
        assert_eq!(raw.max_attempts, Some(OptionValue::Integer(3)));
        assert_eq!(
            raw.max_delay,
            Some(OptionValue::Duration(Duration::from_millis(250)))
        );
    }

    #[test]
    fn fractional_values_become_durations() {
        let raw = parse_options("seed=1.5 delay=2.5s max-delay=0.25").expect("options should lex");
        assert_eq!(
            raw.seed,
            Some(OptionValue::Duration(Duration::from_micros(1_500)))
        );
        assert_eq!(
            raw.delay,
            Some(OptionValue::Duration(Duration::from_millis(2_500)))
        );
        assert_eq!(
            raw.max_delay,
            Some(OptionValue::Duration(Duration::from_micros(250)))
        );

        let options = TimerOptions::from_raw(&raw);
        assert_eq!(options.seed(), Duration::from_micros(1_500));
        assert_eq!(options.delay(), Duration::from_millis(2_500));
    }

    #[test]
    fn fragmented_values_are_kept_as_text() {
        let raw = parse_options("seed=-3 delay=1e3").expect("options should lex");
        assert_eq!(raw.seed, Some(OptionValue::Text("-3")));
        assert_eq!(raw.delay, Some(OptionValue::Text("1e3")));

        let options = TimerOptions::from_raw(&raw);
        assert_eq!(options, TimerOptions::default());
    }

    #[test]
    fn skips_unknown_keys_and_dangling_pairs() {
        let raw = parse_options("color=blue strategy=fibonacci seed= overrun").expect("lex");
        assert_eq!(raw.strategy, Some(OptionValue::Text("fibonacci")));
        assert_eq!(raw.seed, None);
        assert_eq!(raw.overrun, None);
        assert_eq!(
            TimerOptions::from_raw(&raw).strategy(),
            Strategy::Fibonacci
        );
    }

    #[test]
    fn key_lookup_ignores_separators() {
        assert_eq!(OptionKey::from_name("max_delay"), Some(OptionKey::MaxDelay));
        assert_eq!(OptionKey::from_name("MAXATTEMPTS"), Some(OptionKey::MaxAttempts));
        assert_eq!(OptionKey::from_name("max"), None);
    }
}
