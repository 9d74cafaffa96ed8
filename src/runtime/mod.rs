//! Single-threaded server runtime.
//!
//! - `LineBuffer`: per-connection framing of the input stream
//! - `ClientRegistry`: fixed-capacity table of connected clients
//! - `request`: command execution against the registry
//! - `Server`: mio readiness loop tying it all together

mod buffer;
mod connection;
mod event_loop;
pub mod request;

pub use buffer::{FrameError, LineBuffer};
pub use connection::{Client, ClientRegistry, Profile};
pub use event_loop::Server;

use crate::config::Config;
use tracing::info;

/// Bind the configured address and serve until a fatal poll error.
pub fn run(config: Config) -> std::io::Result<()> {
    let mut server = Server::bind(&config)?;
    info!(addr = %server.local_addr(), "CAVE server listening");
    server.run()
}
