//! Command parser.
//!
//! Classifies one complete line (terminator already stripped) by its literal
//! keyword prefix. Keywords are case-sensitive and checked in a fixed order:
//! `NICK `, `MSG `, `PING`, `PROFILE `. The parser never looks at connection
//! state; every variant borrows from the input line.

/// Parsed client command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Command<'a> {
    /// Set nickname to the full remainder of the line.
    Nick(&'a str),
    /// Chat text.
    Msg(&'a str),
    /// Liveness check.
    Ping,
    /// Set a profile field. The field name is not yet validated.
    ProfileSet { field: &'a str, value: &'a str },
    /// Request another client's profile.
    ProfileGet(&'a str),
    /// `PROFILE` line that matched neither form.
    ProfileSyntax,
    /// Anything else.
    Unknown,
}

/// Parse a single line.
pub fn parse(line: &str) -> Command<'_> {
    if let Some(name) = line.strip_prefix("NICK ") {
        Command::Nick(name)
    } else if let Some(rest) = line.strip_prefix("MSG ") {
        // Text starts after the first colon, if there is one.
        let text = match rest.find(':') {
            Some(pos) => &rest[pos + 1..],
            None => rest,
        };
        Command::Msg(text)
    } else if line == "PING" {
        Command::Ping
    } else if let Some(args) = line.strip_prefix("PROFILE ") {
        parse_profile(args)
    } else {
        Command::Unknown
    }
}

fn parse_profile(args: &str) -> Command<'_> {
    let args = args.trim_start_matches(' ');

    if let Some(rest) = args.strip_prefix("SET ") {
        let rest = rest.trim_start_matches(' ');
        let field_end = rest.find([' ', ':']).unwrap_or(rest.len());
        let (field, rest) = rest.split_at(field_end);

        match rest.find(':') {
            Some(pos) => Command::ProfileSet {
                field,
                value: rest[pos + 1..].trim_start_matches(' '),
            },
            None => Command::ProfileSyntax,
        }
    } else if let Some(rest) = args.strip_prefix("GET ") {
        let rest = rest.trim_start_matches(' ');
        let end = rest.find([' ', '\r', '\n']).unwrap_or(rest.len());
        let nick = &rest[..end];

        if nick.is_empty() {
            Command::ProfileSyntax
        } else {
            Command::ProfileGet(nick)
        }
    } else {
        Command::ProfileSyntax
    }
}
