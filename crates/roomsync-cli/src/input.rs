//! Line commands read from stdin.
//!
//! Plain lines are sent to the active room. Lines starting with `/` are
//! commands:
//!
//! - `/open kind:id`: switch to another room
//! - `/close`: leave the active room
//! - `/older`: load the next older page
//! - `/retry`: retry a failed history load
//! - `/quit`: leave and exit

use roomsync_core::RoomKey;

/// A parsed input line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Send a message to the active room.
    Send(String),
    /// Switch to a room.
    Open(RoomKey),
    /// Leave the active room.
    Close,
    /// Scroll to the top of the transcript.
    Older,
    /// Retry a failed history load.
    Retry,
    /// Leave and exit.
    Quit,
}

/// Parse one input line.
///
/// # Errors
///
/// Returns a message for the user when a `/` command is unknown or
/// malformed.
pub fn parse(line: &str) -> Result<Command, String> {
    let Some(rest) = line.trim().strip_prefix('/') else {
        return Ok(Command::Send(line.to_string()));
    };

    let (name, arg) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
    let arg = arg.trim();

    match (name, arg) {
        ("open", "") => Err("usage: /open kind:id".to_string()),
        ("open", room) => room.parse().map(Command::Open),
        ("close", "") => Ok(Command::Close),
        ("older", "") => Ok(Command::Older),
        ("retry", "") => Ok(Command::Retry),
        ("quit", "") => Ok(Command::Quit),
        ("close" | "older" | "retry" | "quit", _) => Err(format!("/{name} takes no argument")),
        _ => Err(format!("unknown command /{name}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_lines_are_sent_verbatim() {
        assert_eq!(parse("  hello there "), Ok(Command::Send("  hello there ".into())));
        assert_eq!(parse(""), Ok(Command::Send(String::new())));
    }

    #[test]
    fn open_parses_room_key() {
        assert_eq!(parse("/open clan:42"), Ok(Command::Open(RoomKey::clan("42"))));
        assert!(parse("/open").is_err());
        assert!(parse("/open guild:1").is_err());
    }

    #[test]
    fn bare_commands() {
        assert_eq!(parse("/close"), Ok(Command::Close));
        assert_eq!(parse("/older"), Ok(Command::Older));
        assert_eq!(parse("/retry"), Ok(Command::Retry));
        assert_eq!(parse(" /quit "), Ok(Command::Quit));
        assert!(parse("/quit now").is_err());
        assert!(parse("/shrug").is_err());
    }
}
