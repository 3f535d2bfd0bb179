//! Input handling for the interactive `gsmterm` terminal

use crate::atcommands::{self, Category};

/// What a line typed at the terminal asks for
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Input {
    Empty,
    /// `help`, `help CMD`, `?CMD` or `CMD??`
    Help(Option<String>),
    /// `ls` or `ls <category>`
    List(Option<Category>),
    /// `lscat`
    Categories,
    /// `PREFIX*`
    Matching(String),
    /// `load FILE`: run the AT commands in a file
    Load(String),
    /// `AT+CMGS=...`: the message body is typed on the next line
    SendSms(String),
    Exit,
    Command(String),
}

impl Input {
    pub fn parse(line: &str) -> Input {
        let line = line.trim();
        let lower = line.to_ascii_lowercase();
        if line.is_empty() {
            return Input::Empty;
        }
        if lower == "exit" || lower == "quit" {
            return Input::Exit;
        }
        if lower == "help" {
            return Input::Help(None);
        }
        if let Some(command) = lower.strip_prefix("help ") {
            return Input::Help(Some(command.trim().to_ascii_uppercase()));
        }
        if line.len() > 2 {
            if let Some(command) = line.strip_prefix('?') {
                return Input::Help(Some(command.to_string()));
            }
            if let Some(command) = line.strip_suffix("??") {
                let command = command.strip_suffix('=').unwrap_or(command);
                return Input::Help(Some(command.to_string()));
            }
        }
        if lower == "lscat" {
            return Input::Categories;
        }
        if lower == "ls" {
            return Input::List(None);
        }
        if let Some(category) = lower.strip_prefix("ls ") {
            if let Some(category) = Category::from_name(category) {
                return Input::List(Some(category));
            }
        }
        if let Some(path) = line.strip_prefix("load ") {
            return Input::Load(path.trim().to_string());
        }
        if let Some(prefix) = line.strip_suffix('*') {
            return Input::Matching(prefix.to_string());
        }
        if lower.starts_with("at+cmgs=") {
            return Input::SendSms(line.to_string());
        }
        Input::Command(line.to_string())
    }
}

/// Response text for the help-style inputs; `None` for anything sent to the modem
pub fn local_response(input: &Input) -> Option<String> {
    let text = match input {
        Input::Help(None) => general_help(),
        Input::Help(Some(command)) => match atcommands::lookup(command) {
            Some(command) => atcommands::help_text(command),
            None => format!("No help available for: {}\n", command),
        },
        Input::List(category) => {
            let commands: Vec<_> = match category {
                Some(category) => atcommands::in_category(*category).collect(),
                None => atcommands::AT_COMMANDS.iter().collect(),
            };
            commands
                .iter()
                .map(|c| format!("{:<12} - {}\n", c.command, c.name))
                .collect()
        }
        Input::Categories => Category::ALL.iter().map(|c| format!("{}\n", c.name())).collect(),
        Input::Matching(prefix) => {
            let matches = atcommands::matching(prefix);
            if matches.is_empty() {
                format!("No commands start with {}\n", prefix)
            } else {
                matches.iter().map(|c| format!(" {} ", c.command)).collect::<String>() + "\n"
            }
        }
        _ => return None,
    };
    Some(text)
}

/// Lines of a command file: blank lines and `#` comments are skipped
pub fn command_file_lines(contents: &str) -> impl Iterator<Item = &str> {
    contents
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
}

fn general_help() -> String {
    [
        "Type AT commands and press enter to send them to the modem.",
        "",
        "Command documentation:",
        "  <COMMAND>??, ?<COMMAND> or help <COMMAND>   describe a command",
        "  <PREFIX>*                                   list commands starting with PREFIX",
        "  ls [<category>]                             list documented commands",
        "  lscat                                       list command categories",
        "",
        "Other:",
        "  load <file>   send the AT commands in a file, one per line",
        "  exit          leave the terminal",
        "",
        "After AT+CMGS=..., type the message body on the next line.",
        "",
    ]
    .join("\n")
}
