//! cave: a minimal line-oriented chat server.
//!
//! One thread multiplexes every TCP connection over a mio event loop. Each
//! connection's byte stream is framed into lines, parsed into commands and
//! executed against a bounded registry of clients with nicknames and
//! profiles (display name, bio, pronouns).
//!
//! The `client` module holds the terminal client's session logic.

pub mod client;
pub mod config;
pub mod protocol;
pub mod runtime;
