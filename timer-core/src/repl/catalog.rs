//! Command table shared by the parser and the emulator help screen.

use core::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandTag {
    Start,
    Stop,
    Pause,
    Resume,
    Reset,
    Wait,
    Status,
    Help,
}

/// What may follow the command word.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operand {
    None,
    /// One optional keyword; the first entry applies when it is omitted.
    Keyword(&'static [&'static str]),
    /// A mandatory duration literal.
    Duration,
    /// An optional command name.
    Topic,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct CommandSpec {
    pub name: &'static str,
    pub tag: CommandTag,
    pub operand: Operand,
    pub synopsis: &'static str,
    pub summary: &'static str,
}

impl fmt::Display for CommandSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:<26} - {}", self.synopsis, self.summary)
    }
}

/// Keywords accepted after `reset`, default first.
pub const RESET_MODES: [&str; 2] = ["restart", "stop"];

const fn bare(name: &'static str, tag: CommandTag, summary: &'static str) -> CommandSpec {
    CommandSpec {
        name,
        tag,
        operand: Operand::None,
        synopsis: name,
        summary,
    }
}

// Indexed by `CommandTag` discriminant.
static COMMANDS: [CommandSpec; 8] = [
    bare("start", CommandTag::Start, "reset counters and begin ticking"),
    bare("stop", CommandTag::Stop, "cancel the pending tick and stop"),
    bare("pause", CommandTag::Pause, "suspend ticking, keeping attempts"),
    bare("resume", CommandTag::Resume, "continue from the paused attempt"),
    CommandSpec {
        name: "reset",
        tag: CommandTag::Reset,
        operand: Operand::Keyword(&RESET_MODES),
        synopsis: "reset [restart|stop]",
        summary: "zero attempts, then restart or idle",
    },
    CommandSpec {
        name: "wait",
        tag: CommandTag::Wait,
        operand: Operand::Duration,
        synopsis: "wait <duration>",
        summary: "let time pass (e.g. wait 3s, wait 1.5s)",
    },
    bare("status", CommandTag::Status, "display timer state and options"),
    CommandSpec {
        name: "help",
        tag: CommandTag::Help,
        operand: Operand::Topic,
        synopsis: "help [command]",
        summary: "show help for a command",
    },
];

#[must_use]
pub fn commands() -> &'static [CommandSpec] {
    &COMMANDS
}

#[must_use]
pub fn command(tag: CommandTag) -> &'static CommandSpec {
    &COMMANDS[tag as usize]
}

/// Finds a command by name, ignoring ASCII case.
#[must_use]
pub fn find(name: &str) -> Option<&'static CommandSpec> {
    COMMANDS
        .iter()
        .find(|command| command.name.eq_ignore_ascii_case(name))
}
