use std::io;

#[allow(dead_code)]
#[path = "../session.rs"]
mod session;

use session::{Session, TranscriptProfile};

fn main() -> io::Result<()> {
    for profile in TranscriptProfile::ALL {
        record_profile(profile)?;
    }
    Ok(())
}

fn record_profile(profile: TranscriptProfile) -> io::Result<()> {
    let mut session = Session::new(profile, profile.options())?;
    let _ = session.banner()?;
    match profile {
        TranscriptProfile::Basic => record_basic(&mut session),
        TranscriptProfile::Advantage => record_advantage(&mut session),
        TranscriptProfile::Series => record_series(&mut session),
    }
}

fn replay(session: &mut Session, script: &[&str]) -> io::Result<()> {
    for line in script {
        let _ = session.handle_command(line)?;
    }
    Ok(())
}

fn record_basic(session: &mut Session) -> io::Result<()> {
    replay(
        session,
        &[
            "status",
            "start",
            "wait 10s",
            "status",
            "pause",
            "wait 5s",
            "start",
            "wait 3s",
            "stop",
            "stop",
        ],
    )
}

/// Pause at 3s, resume at 6s, a redundant resume at 10s, then stop well
/// after the attempt cap has stopped the timer.
fn record_advantage(session: &mut Session) -> io::Result<()> {
    replay(
        session,
        &[
            "start",
            "wait 3s",
            "pause",
            "wait 3s",
            "resume",
            "wait 4s",
            "resume",
            "wait 21s",
            "stop",
            "wait 1s",
            "stop",
            "status",
        ],
    )
}

fn record_series(session: &mut Session) -> io::Result<()> {
    replay(
        session,
        &[
            "help",
            "help wait",
            "start",
            "wait 5s",
            "reset stop",
            "status",
            "reset",
            "wait 2500ms",
            "reset restart",
            "wait 1s",
            "launch",
            "stop",
        ],
    )
}
