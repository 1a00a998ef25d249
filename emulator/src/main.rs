mod session;

use std::env;
use std::io::{self, BufRead, Write};
use std::process;

use crossterm::style::Stylize;
use crossterm::tty::IsTty;
use dyntimer_core::options::TimerOptions;

use session::{Session, TranscriptProfile};

const USAGE: &str = "Usage: dyntimer-emulator [--profile <basic|advantage|series>] [key=value ...]";

struct EmulatorConfig {
    profile: TranscriptProfile,
    options: TimerOptions,
}

fn main() -> io::Result<()> {
    let config = parse_args().unwrap_or_else(|err| {
        eprintln!("{err}");
        eprintln!("{USAGE}");
        process::exit(2);
    });

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let stdout = io::stdout();
    let color = stdout.is_tty();
    let mut writer = stdout.lock();
    let mut session = Session::new(config.profile, config.options)?;
    let mut line = String::new();

    writeln!(
        writer,
        "Dynamic Timer Emulator ready. Type `help` for commands or `exit` to quit."
    )?;
    for banner in session.banner()? {
        print_line(&mut writer, &banner, color)?;
    }

    loop {
        line.clear();
        write!(writer, "> ")?;
        writer.flush()?;

        let bytes_read = reader.read_line(&mut line)?;
        if bytes_read == 0 {
            writeln!(writer)?;
            break;
        }

        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        if should_terminate(trimmed) {
            writeln!(writer, "Session closed.")?;
            break;
        }

        let responses = session.handle_command(trimmed)?;
        for response in responses {
            print_line(&mut writer, &response, color)?;
        }
    }

    Ok(())
}

fn print_line(writer: &mut impl Write, line: &str, color: bool) -> io::Result<()> {
    if !color {
        return writeln!(writer, "{line}");
    }

    if line.starts_with("ERR") {
        writeln!(writer, "{}", line.red())
    } else if line.starts_with("WARN") {
        writeln!(writer, "{}", line.yellow())
    } else if line.contains("] toll ") {
        writeln!(writer, "{}", line.cyan())
    } else if line.contains("] #") {
        writeln!(writer, "{}", line.green())
    } else {
        writeln!(writer, "{line}")
    }
}

fn should_terminate(input: &str) -> bool {
    input.eq_ignore_ascii_case("exit") || input.eq_ignore_ascii_case("quit")
}

fn parse_args() -> Result<EmulatorConfig, String> {
    let mut profile = TranscriptProfile::Basic;
    let mut overrides = Vec::new();
    let mut args = env::args().skip(1);

    while let Some(arg) = args.next() {
        if let Some(value) = arg.strip_prefix("--profile=") {
            profile = TranscriptProfile::from_tag(value)?;
        } else if arg == "--profile" {
            let value = args
                .next()
                .ok_or_else(|| "Expected value after --profile".to_string())?;
            profile = TranscriptProfile::from_tag(&value)?;
        } else if arg.contains('=') {
            overrides.push(arg);
        } else {
            profile = TranscriptProfile::from_tag(&arg)?;
        }
    }

    let options = profile
        .options_with(&overrides.join(" "))
        .map_err(|err| format!("Invalid options: {err}"))?;
    Ok(EmulatorConfig { profile, options })
}
