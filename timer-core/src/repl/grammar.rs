//! Tokenizer and command parser for the timer REPL.
//!
//! A line goes through a `regal` lexer into a fixed-size token buffer, then a
//! few `winnow` parsers over that buffer read one command. Operand shapes
//! come from [`catalog`]. [`crate::options::parse_options`] reads `key=value`
//! lines from the same tokens.

use core::fmt;
use core::ops::Range;
use core::time::Duration;

use heapless::Vec;
use regal::{IncrementalError, TokenCache};
use regal_macros::RegalLexer;
use winnow::combinator::{cut_err, opt};
#[allow(deprecated)]
use winnow::error::ErrorKind;
use winnow::error::{ErrMode, ParserError};
use winnow::prelude::*;
use winnow::stream::Stream;

use super::catalog::{self, CommandTag, Operand};

/// Tokens kept per line.
pub const MAX_TOKENS: usize = 32;
const CACHE_RECORDS: usize = MAX_TOKENS * 2;

const NANOS_PER_MILLI: u64 = 1_000_000;
const NANOS_PER_SEC: u64 = 1_000_000_000;

#[derive(RegalLexer, Clone, Copy, Debug, PartialEq, Eq, Default)]
pub enum TokenKind {
    /// Number with a unit, e.g. `250ms` or `1.5s`.
    #[regex(r"[0-9]+(?:\.[0-9]+)?(?:ms|s)", priority = 2)]
    Duration,
    /// Bare number, e.g. `500` or `2.5`.
    #[regex(r"[0-9]+(?:\.[0-9]+)?")]
    Number,
    #[regex(r"[A-Za-z][A-Za-z0-9_-]*")]
    Word,
    #[token("=")]
    Equals,
    #[token(",")]
    Comma,
    #[regex(r"[ \t]+", skip)]
    Blank,
    #[token("\r\n")]
    #[token("\n")]
    #[token("\r")]
    Newline,
    /// Any character no other rule accepts.
    #[default]
    #[regex(r".", priority = 1024)]
    Stray,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Token<'a> {
    pub kind: TokenKind,
    pub text: &'a str,
    /// Byte range of `text` within the line.
    pub span: Range<usize>,
}

pub type Tokens<'a> = Vec<Token<'a>, MAX_TOKENS>;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LexError {
    /// The line holds more than [`MAX_TOKENS`] tokens.
    Overflow,
    Engine,
}

impl fmt::Display for LexError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LexError::Overflow => write!(f, "line holds more than {MAX_TOKENS} tokens"),
            LexError::Engine => f.write_str("tokenizer failed"),
        }
    }
}

/// Why a line is not a command.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ParseError<'a> {
    Lex(LexError),
    Empty,
    UnknownCommand {
        word: &'a str,
        span: Range<usize>,
    },
    Stray {
        text: &'a str,
        span: Range<usize>,
    },
    Expected {
        what: &'static str,
        found: Option<&'a str>,
    },
    BadKeyword {
        text: &'a str,
        choices: &'static [&'static str],
    },
    InvalidDuration {
        text: &'a str,
    },
    Trailing {
        text: &'a str,
        span: Range<usize>,
    },
}

impl<'a> ParseError<'a> {
    fn expected(what: &'static str, next: Option<&Token<'a>>) -> Self {
        ParseError::Expected {
            what,
            found: next
                .filter(|token| token.kind != TokenKind::Newline)
                .map(|token| token.text),
        }
    }
}

impl fmt::Display for ParseError<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseError::Lex(err) => err.fmt(f),
            ParseError::Empty => f.write_str("empty command"),
            ParseError::UnknownCommand { word, .. } => write!(f, "unknown command `{word}`"),
            ParseError::Stray { text, span } => {
                write!(f, "unsupported character `{text}` at column {}", span.start + 1)
            }
            ParseError::Expected {
                what,
                found: Some(text),
            } => write!(f, "expected {what}, found `{text}`"),
            ParseError::Expected { what, found: None } => {
                write!(f, "expected {what} at end of line")
            }
            ParseError::BadKeyword { text, choices } => {
                write!(f, "`{text}` is not one of ")?;
                for (index, choice) in choices.iter().enumerate() {
                    if index > 0 {
                        f.write_str("|")?;
                    }
                    f.write_str(choice)?;
                }
                Ok(())
            }
            ParseError::InvalidDuration { text } => {
                write!(f, "`{text}` is not a usable duration")
            }
            ParseError::Trailing { text, .. } => write!(f, "unexpected `{text}` after command"),
        }
    }
}

type Input<'src, 'slice> = &'slice [Token<'src>];

#[allow(deprecated)]
impl<'src, 'slice> ParserError<Input<'src, 'slice>> for ParseError<'src>
where
    'src: 'slice,
{
    fn from_error_kind(input: &Input<'src, 'slice>, _kind: ErrorKind) -> Self {
        ParseError::expected("token", input.first())
    }

    fn append(
        self,
        _input: &Input<'src, 'slice>,
        _token_start: &<Input<'src, 'slice> as Stream>::Checkpoint,
        _kind: ErrorKind,
    ) -> Self {
        self
    }

    fn or(self, other: Self) -> Self {
        other
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Command<'a> {
    Start,
    Stop,
    Pause,
    Resume,
    Reset(ResetCommand),
    Wait(Duration),
    Status,
    Help(HelpCommand<'a>),
}

/// What the timer does after `reset` zeroes its counters.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ResetCommand {
    Restart,
    Stop,
}

impl ResetCommand {
    fn from_keyword(keyword: &str) -> Self {
        if keyword.eq_ignore_ascii_case("stop") {
            ResetCommand::Stop
        } else {
            ResetCommand::Restart
        }
    }

    /// Value of the `stop_after` flag passed to the timer.
    #[must_use]
    pub const fn stop_after(self) -> bool {
        matches!(self, ResetCommand::Stop)
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct HelpCommand<'a> {
    pub topic: Option<&'a str>,
}

/// Splits `line` into tokens, dropping blanks.
///
/// Input the lexer cannot classify comes back as [`TokenKind::Stray`] tokens
/// rather than an error.
pub fn lex(line: &str) -> Result<Tokens<'_>, LexError> {
    let mut cache: TokenCache<TokenKind, CACHE_RECORDS> = TokenCache::new();
    let leftover = cache
        .rebuild(TokenKind::lexer(), line)
        .map_err(lex_failure)?;

    let mut tokens = Tokens::new();
    for record in cache.tokens().filter(|record| !record.skipped) {
        let span = record.start..record.end;
        push_token(
            &mut tokens,
            Token {
                kind: record.token,
                text: &line[span.clone()],
                span,
            },
        )?;
    }

    if let Some(rest) = leftover.filter(|rest| !rest.fragment.is_empty()) {
        push_token(
            &mut tokens,
            Token {
                kind: TokenKind::Stray,
                text: rest.fragment,
                span: rest.start..rest.start + rest.fragment.len(),
            },
        )?;
    }

    Ok(tokens)
}

fn push_token<'a>(tokens: &mut Tokens<'a>, token: Token<'a>) -> Result<(), LexError> {
    tokens.push(token).map_err(|_| LexError::Overflow)
}

fn lex_failure(error: IncrementalError) -> LexError {
    match error {
        IncrementalError::TokenOverflow => LexError::Overflow,
        _ => LexError::Engine,
    }
}

/// Reads one command from `line`; anything after it other than a line break
/// is an error.
pub fn parse(line: &str) -> Result<Command<'_>, ParseError<'_>> {
    let tokens = lex(line).map_err(ParseError::Lex)?;
    if let Some(stray) = tokens.iter().find(|token| token.kind == TokenKind::Stray) {
        return Err(ParseError::Stray {
            text: stray.text,
            span: stray.span.clone(),
        });
    }
    if tokens.iter().all(|token| token.kind == TokenKind::Newline) {
        return Err(ParseError::Empty);
    }

    let mut input = tokens.as_slice();
    let command = command(&mut input).map_err(|error| match error {
        ErrMode::Backtrack(error) | ErrMode::Cut(error) => error,
        ErrMode::Incomplete(_) => ParseError::expected("command", None),
    })?;

    match input.iter().find(|token| token.kind != TokenKind::Newline) {
        Some(extra) => Err(ParseError::Trailing {
            text: extra.text,
            span: extra.span.clone(),
        }),
        None => Ok(command),
    }
}

type Step<'src, T> = Result<T, ErrMode<ParseError<'src>>>;

fn command<'src, 'slice>(input: &mut Input<'src, 'slice>) -> Step<'src, Command<'src>>
where
    'src: 'slice,
{
    let word = token_of(TokenKind::Word, "command").parse_next(input)?;
    let spec = catalog::find(word.text).ok_or_else(|| {
        ErrMode::Cut(ParseError::UnknownCommand {
            word: word.text,
            span: word.span.clone(),
        })
    })?;

    Ok(match spec.tag {
        CommandTag::Start => Command::Start,
        CommandTag::Stop => Command::Stop,
        CommandTag::Pause => Command::Pause,
        CommandTag::Resume => Command::Resume,
        CommandTag::Status => Command::Status,
        CommandTag::Reset => {
            Command::Reset(ResetCommand::from_keyword(keyword(input, spec.operand)?))
        }
        CommandTag::Wait => Command::Wait(duration(input)?),
        CommandTag::Help => Command::Help(HelpCommand {
            topic: opt(token_of(TokenKind::Word, "command name"))
                .parse_next(input)?
                .map(|token| token.text),
        }),
    })
}

/// Optional keyword from the operand's list; the first entry when omitted.
fn keyword<'src, 'slice>(
    input: &mut Input<'src, 'slice>,
    operand: Operand,
) -> Step<'src, &'static str>
where
    'src: 'slice,
{
    let Operand::Keyword(choices) = operand else {
        return Ok("");
    };

    match opt(token_of(TokenKind::Word, "keyword")).parse_next(input)? {
        None => Ok(choices.first().copied().unwrap_or("")),
        Some(word) => choices
            .iter()
            .copied()
            .find(|choice| choice.eq_ignore_ascii_case(word.text))
            .ok_or(ErrMode::Cut(ParseError::BadKeyword {
                text: word.text,
                choices,
            })),
    }
}

fn duration<'src, 'slice>(input: &mut Input<'src, 'slice>) -> Step<'src, Duration>
where
    'src: 'slice,
{
    let literal = cut_err(token_of(TokenKind::Duration, "a duration such as 3s or 250ms"))
        .parse_next(input)?;
    duration_literal(literal.text)
        .ok_or(ErrMode::Cut(ParseError::InvalidDuration { text: literal.text }))
}

fn token_of<'src, 'slice>(
    kind: TokenKind,
    what: &'static str,
) -> impl Parser<Input<'src, 'slice>, Token<'src>, ParseError<'src>>
where
    'src: 'slice,
{
    move |input: &mut Input<'src, 'slice>| match input.split_first() {
        Some((token, rest)) if token.kind == kind => {
            *input = rest;
            Ok(token.clone())
        }
        next => Err(ErrMode::Backtrack(ParseError::expected(
            what,
            next.map(|(token, _)| token),
        ))),
    }
}

/// Reads `<number>ms` or `<number>s`, where the number may carry a fraction.
pub(crate) fn duration_literal(text: &str) -> Option<Duration> {
    if let Some(number) = text.strip_suffix("ms") {
        scaled(number, NANOS_PER_MILLI)
    } else if let Some(number) = text.strip_suffix('s') {
        scaled(number, NANOS_PER_SEC)
    } else {
        None
    }
}

/// Reads a bare, possibly fractional, number of milliseconds.
pub(crate) fn millis_literal(text: &str) -> Option<Duration> {
    scaled(text, NANOS_PER_MILLI)
}

/// `number` units of `unit_nanos` each. Fraction digits finer than a
/// nanosecond are ignored.
fn scaled(number: &str, unit_nanos: u64) -> Option<Duration> {
    let (whole, fraction) = number.split_once('.').unwrap_or((number, ""));
    if whole.is_empty() || !whole.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }

    let mut nanos = whole.parse::<u64>().ok()?.checked_mul(unit_nanos)?;
    let mut place = unit_nanos;
    for digit in fraction.bytes() {
        if !digit.is_ascii_digit() {
            return None;
        }
        place /= 10;
        nanos = nanos.checked_add(u64::from(digit - b'0') * place)?;
    }
    Some(Duration::from_nanos(nanos))
}
