//! Client state and the fixed-capacity client registry.
//!
//! Each live connection owns one `Client`: its I/O handle, identity,
//! profile, input framer and outbound queue. The registry is the single
//! owner of all clients and is only touched from the event loop thread.

use crate::protocol::ProfileField;
use crate::runtime::buffer::LineBuffer;
use bytes::BytesMut;
use slab::Slab;

/// Profile fields. Empty means unset.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Profile {
    pub display_name: String,
    pub bio: String,
    pub pronouns: String,
}

impl Profile {
    pub fn get(&self, field: ProfileField) -> &str {
        match field {
            ProfileField::DisplayName => &self.display_name,
            ProfileField::Bio => &self.bio,
            ProfileField::Pronouns => &self.pronouns,
        }
    }

    pub fn set(&mut self, field: ProfileField, value: &str) {
        let slot = match field {
            ProfileField::DisplayName => &mut self.display_name,
            ProfileField::Bio => &mut self.bio,
            ProfileField::Pronouns => &mut self.pronouns,
        };
        slot.clear();
        slot.push_str(value);
    }
}

/// A single connected client.
///
/// `S` is the connection handle; the event loop uses a mio `TcpStream`.
#[derive(Debug)]
pub struct Client<S> {
    /// Connection handle, owned for the client's lifetime.
    pub conn: S,
    /// Nickname; empty until set by `NICK`.
    pub nick: String,
    pub profile: Profile,
    /// Bytes received but not yet resolved into lines.
    pub input: LineBuffer,
    /// Encoded lines waiting to be written.
    pub output: BytesMut,
    /// Whether the handle is currently registered for writable readiness.
    pub(crate) write_interest: bool,
    /// Peer has shut down its sending side; read until EOF.
    pub(crate) read_closed: bool,
}

impl<S> Client<S> {
    /// Create a client with all identity and profile fields empty.
    pub fn new(conn: S, max_line: usize) -> Self {
        Self {
            conn,
            nick: String::new(),
            profile: Profile::default(),
            input: LineBuffer::new(max_line),
            output: BytesMut::new(),
            write_interest: false,
            read_closed: false,
        }
    }

    /// Queue one line, appending the `\r\n` terminator.
    pub fn queue_line(&mut self, line: &str) {
        self.output.reserve(line.len() + 2);
        self.output.extend_from_slice(line.as_bytes());
        self.output.extend_from_slice(b"\r\n");
    }
}

/// Registry of connected clients using slab allocation.
///
/// Capacity is fixed at construction; inserting into a full registry fails
/// rather than growing.
#[derive(Debug)]
pub struct ClientRegistry<S> {
    clients: Slab<Client<S>>,
    max_clients: usize,
    max_line: usize,
}

impl<S> ClientRegistry<S> {
    /// Create a registry holding at most `max_clients` clients whose input
    /// lines are bounded by `max_line` bytes.
    pub fn new(max_clients: usize, max_line: usize) -> Self {
        Self {
            clients: Slab::with_capacity(max_clients),
            max_clients,
            max_line,
        }
    }

    /// Register a new connection.
    ///
    /// Returns the handle back if the registry is full.
    pub fn insert(&mut self, conn: S) -> Result<usize, S> {
        if self.is_full() {
            return Err(conn);
        }
        Ok(self.clients.insert(Client::new(conn, self.max_line)))
    }

    pub fn get(&self, id: usize) -> Option<&Client<S>> {
        self.clients.get(id)
    }

    pub fn get_mut(&mut self, id: usize) -> Option<&mut Client<S>> {
        self.clients.get_mut(id)
    }

    pub fn remove(&mut self, id: usize) -> Option<Client<S>> {
        self.clients.try_remove(id)
    }

    pub fn contains(&self, id: usize) -> bool {
        self.clients.contains(id)
    }

    pub fn len(&self) -> usize {
        self.clients.len()
    }

    pub fn is_empty(&self) -> bool {
        self.clients.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.clients.len() >= self.max_clients
    }

    pub fn capacity(&self) -> usize {
        self.max_clients
    }

    /// First client, in slot order, whose nickname is exactly `nick`.
    ///
    /// Nicknames are not unique; duplicates resolve to the lowest slot.
    pub fn find_by_nick(&self, nick: &str) -> Option<usize> {
        self.clients
            .iter()
            .find(|(_, client)| !client.nick.is_empty() && client.nick == nick)
            .map(|(id, _)| id)
    }

    /// Queue a line for one client. Unknown ids are ignored.
    pub fn send(&mut self, id: usize, line: &str) {
        if let Some(client) = self.clients.get_mut(id) {
            client.queue_line(line);
        }
    }

    /// Queue a line for every client except `from`.
    pub fn broadcast(&mut self, from: usize, line: &str) {
        for (id, client) in self.clients.iter_mut() {
            if id != from {
                client.queue_line(line);
            }
        }
    }

    /// Ids of clients with queued output.
    pub fn pending_output(&self) -> Vec<usize> {
        self.clients
            .iter()
            .filter(|(_, client)| !client.output.is_empty())
            .map(|(id, _)| id)
            .collect()
    }
}
