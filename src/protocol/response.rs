//! Outbound line builders.
//!
//! Every builder returns the line body without its terminator; the registry
//! appends `\r\n` when queueing.

use super::{ProfileField, VERSION};

/// Server-to-client line constructors.
pub struct Response;

impl Response {
    pub fn welcome() -> String {
        format!("WELCOME {VERSION}")
    }

    pub fn server_full() -> &'static str {
        "ERR :server full"
    }

    pub fn unknown_command() -> &'static str {
        "ERR :unknown command"
    }

    pub fn pong() -> &'static str {
        "PONG"
    }

    /// System notice.
    pub fn sys(text: &str) -> String {
        format!("SYS :{text}")
    }

    pub fn joined(nick: &str) -> String {
        Self::sys(&format!("{nick} joined"))
    }

    pub fn nickname_set() -> &'static str {
        "SYS :nickname set"
    }

    /// Attributed chat line.
    pub fn msg(nick: &str, text: &str) -> String {
        format!("MSG @{nick} :{text}")
    }

    pub fn profile_ok(field: ProfileField) -> String {
        format!("PROFILE OK {}", field.name())
    }

    pub fn profile_syntax() -> &'static str {
        "PROFILE ERR SYNTAX"
    }

    pub fn profile_field() -> &'static str {
        "PROFILE ERR FIELD"
    }

    pub fn profile_too_long() -> &'static str {
        "PROFILE ERR VALUE_TOO_LONG"
    }

    pub fn profile_not_found(nick: &str) -> String {
        format!("PROFILE ERR NOTFOUND {nick}")
    }

    pub fn profile_data(nick: &str, field: ProfileField, value: &str) -> String {
        format!("PROFILE DATA {nick} {} :{value}", field.name())
    }

    pub fn profile_end(nick: &str) -> String {
        format!("PROFILE END {nick}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_formatted_lines() {
        assert_eq!(Response::welcome(), "WELCOME CAVE/0.1");
        assert_eq!(Response::joined("bob"), "SYS :bob joined");
        assert_eq!(Response::msg("bob", "hi"), "MSG @bob :hi");
        assert_eq!(
            Response::profile_ok(ProfileField::Pronouns),
            "PROFILE OK PRONOUNS"
        );
        assert_eq!(
            Response::profile_data("bob", ProfileField::DisplayName, "Bob"),
            "PROFILE DATA bob DISPLAYNAME :Bob"
        );
        assert_eq!(Response::profile_end("bob"), "PROFILE END bob");
        assert_eq!(
            Response::profile_not_found("ghost"),
            "PROFILE ERR NOTFOUND ghost"
        );
    }
}
