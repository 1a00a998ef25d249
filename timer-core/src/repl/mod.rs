//! REPL tooling for driving a timer from text commands.
//!
//! The REPL grammar lives in [`grammar`] and is implemented with a
//! token/parse pipeline that stays compatible with `no_std`. The same lexer
//! backs `key=value` option parsing in [`crate::options`].

pub mod catalog;
pub mod commands;
pub mod grammar;
pub mod status;
