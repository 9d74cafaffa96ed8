//! CAVE line protocol.
//!
//! Newline-terminated text lines. Clients may terminate with `\r\n` or `\n`;
//! the server always emits `\r\n`.
//!
//! ```text
//! C->S  NICK <name>
//! C->S  MSG [:]<text>
//! C->S  PING
//! C->S  PROFILE SET <FIELD> :<value>
//! C->S  PROFILE GET <nick>
//!
//! S->C  WELCOME CAVE/0.1
//! S->C  SYS :<text>
//! S->C  MSG @<nick> :<text>
//! S->C  PONG
//! S->C  PROFILE OK <FIELD>
//! S->C  PROFILE ERR SYNTAX|FIELD|VALUE_TOO_LONG|NOTFOUND <nick>
//! S->C  PROFILE DATA <nick> <FIELD> :<value>
//! S->C  PROFILE END <nick>
//! S->C  ERR :unknown command
//! ```

pub mod parser;
pub mod response;

pub use parser::{parse, Command};
pub use response::Response;

/// Protocol banner sent once after accept.
pub const VERSION: &str = "CAVE/0.1";

/// Default server port.
pub const DEFAULT_PORT: u16 = 7777;

/// Nickname capacity in bytes, inclusive of terminator.
pub const NICK_MAX: usize = 32;

/// Display name capacity in bytes, inclusive of terminator.
pub const DISPLAY_NAME_MAX: usize = 64;

/// Bio capacity in bytes, inclusive of terminator.
pub const BIO_MAX: usize = 512;

/// Pronouns capacity in bytes, inclusive of terminator.
pub const PRONOUNS_MAX: usize = 32;

/// A settable profile field.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileField {
    DisplayName,
    Bio,
    Pronouns,
}

impl ProfileField {
    /// Order in which fields are reported by `PROFILE GET`.
    pub const REPORT_ORDER: [ProfileField; 3] = [
        ProfileField::DisplayName,
        ProfileField::Pronouns,
        ProfileField::Bio,
    ];

    /// Resolve a wire field name, ignoring ASCII case.
    pub fn from_name(name: &str) -> Option<Self> {
        [
            ProfileField::DisplayName,
            ProfileField::Bio,
            ProfileField::Pronouns,
        ]
        .into_iter()
        .find(|field| field.name().eq_ignore_ascii_case(name))
    }

    /// Canonical wire name.
    pub fn name(self) -> &'static str {
        match self {
            ProfileField::DisplayName => "DISPLAYNAME",
            ProfileField::Bio => "BIO",
            ProfileField::Pronouns => "PRONOUNS",
        }
    }

    /// Values must be strictly shorter than this many bytes.
    pub fn capacity(self) -> usize {
        match self {
            ProfileField::DisplayName => DISPLAY_NAME_MAX,
            ProfileField::Bio => BIO_MAX,
            ProfileField::Pronouns => PRONOUNS_MAX,
        }
    }
}

/// Truncate `s` to fit a field of `capacity` bytes (terminator included),
/// backing off to the nearest char boundary.
pub fn truncate_to_capacity(s: &str, capacity: usize) -> &str {
    let max = capacity.saturating_sub(1);
    if s.len() <= max {
        return s;
    }
    let mut end = max;
    while !s.is_char_boundary(end) {
        end -= 1;
    }
    &s[..end]
}
