//! Local slash commands typed into the input line
//!
//! Lines starting with `/` are handled by the client itself. `//` escapes a
//! leading slash so it reaches the server.

/// A recognized local command
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LocalCommand {
    /// `/connect [host] [port]`; missing parts fall back to the defaults
    Connect {
        host: Option<String>,
        port: Option<String>,
    },
    Disconnect,
    Pueblo(Option<bool>),
    Reconnect(Option<bool>),
    Colors(Option<bool>),
    /// `/log on [file]` or `/log off`
    Log {
        enabled: bool,
        filename: Option<String>,
    },
    /// `/history [query]`
    History(Option<String>),
    Clear,
    Help,
    Quit,
}

/// What the input line holds
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Parsed {
    /// Text for the server
    Command(String),
    Local(LocalCommand),
    /// A `/word` that is not a known command
    Unknown(String),
}

pub const HELP: &[&str] = &[
    "Local commands:",
    "  /connect [host] [port]   Connect (defaults from config)",
    "  /disconnect              Close the connection",
    "  /pueblo [on|off]         Toggle Pueblo HTML support (F2)",
    "  /reconnect [on|off]      Toggle auto-reconnect (F3)",
    "  /colors [on|off]         Toggle ANSI colors (F4)",
    "  /log on [file] | off     Auto-log on connect",
    "  /history [query]         Show command history",
    "  /clear                   Clear the output (Ctrl+L)",
    "  /quit                    Exit (Ctrl+C)",
    "  //text                   Send text starting with /",
];

pub fn parse(input: &str) -> Parsed {
    let trimmed = input.trim_start();
    let Some(rest) = trimmed.strip_prefix('/') else {
        return Parsed::Command(input.to_string());
    };
    if rest.starts_with('/') {
        return Parsed::Command(rest.to_string());
    }

    let mut words = rest.split_whitespace();
    let name = words.next().unwrap_or("").to_lowercase();
    let args: Vec<&str> = words.collect();

    let command = match name.as_str() {
        "connect" | "c" => LocalCommand::Connect {
            host: args.first().map(|s| s.to_string()),
            port: args.get(1).map(|s| s.to_string()),
        },
        "disconnect" | "dc" => LocalCommand::Disconnect,
        "pueblo" => LocalCommand::Pueblo(switch(args.first())),
        "reconnect" => LocalCommand::Reconnect(switch(args.first())),
        "colors" | "colours" => LocalCommand::Colors(switch(args.first())),
        "log" => match switch(args.first()) {
            Some(enabled) => LocalCommand::Log {
                enabled,
                filename: if enabled {
                    args.get(1).map(|s| s.to_string())
                } else {
                    None
                },
            },
            None => return Parsed::Unknown(trimmed.to_string()),
        },
        "history" | "hist" => {
            let query = args.join(" ");
            LocalCommand::History(if query.is_empty() { None } else { Some(query) })
        }
        "clear" | "cls" => LocalCommand::Clear,
        "help" | "?" => LocalCommand::Help,
        "quit" | "exit" | "q" => LocalCommand::Quit,
        _ => return Parsed::Unknown(trimmed.to_string()),
    };
    Parsed::Local(command)
}

/// `on`/`off` argument; `None` means toggle
fn switch(arg: Option<&&str>) -> Option<bool> {
    match arg.map(|s| s.to_lowercase()).as_deref() {
        Some("on") | Some("1") | Some("yes") | Some("true") => Some(true),
        Some("off") | Some("0") | Some("no") | Some("false") => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_text_goes_to_server() {
        assert_eq!(parse("look"), Parsed::Command("look".to_string()));
        assert_eq!(parse("//me waves"), Parsed::Command("/me waves".to_string()));
    }

    #[test]
    fn test_connect_arguments() {
        assert_eq!(
            parse("/connect mush.example.org 4201"),
            Parsed::Local(LocalCommand::Connect {
                host: Some("mush.example.org".to_string()),
                port: Some("4201".to_string()),
            })
        );
        assert_eq!(
            parse("/c"),
            Parsed::Local(LocalCommand::Connect { host: None, port: None })
        );
    }

    #[test]
    fn test_switches() {
        assert_eq!(parse("/pueblo on"), Parsed::Local(LocalCommand::Pueblo(Some(true))));
        assert_eq!(parse("/reconnect OFF"), Parsed::Local(LocalCommand::Reconnect(Some(false))));
        assert_eq!(parse("/colors"), Parsed::Local(LocalCommand::Colors(None)));
        assert_eq!(
            parse("/log on game.log"),
            Parsed::Local(LocalCommand::Log {
                enabled: true,
                filename: Some("game.log".to_string())
            })
        );
        assert_eq!(parse("/log maybe"), Parsed::Unknown("/log maybe".to_string()));
    }

    #[test]
    fn test_history_query_and_unknown() {
        assert_eq!(
            parse("/history page bob"),
            Parsed::Local(LocalCommand::History(Some("page bob".to_string())))
        );
        assert_eq!(parse("/history"), Parsed::Local(LocalCommand::History(None)));
        assert_eq!(parse("/frobnicate"), Parsed::Unknown("/frobnicate".to_string()));
    }
}
