//! mio event loop implementation.
//!
//! Readiness-based model: poll tells us when sockets are ready, then we
//! perform non-blocking read/write syscalls. Uses epoll on Linux, kqueue on
//! macOS.
//!
//! Everything runs on one thread. Each iteration:
//! 1. drains the listener (accept until `WouldBlock`),
//! 2. flushes clients that became writable,
//! 3. reads at most one chunk from every readable client and runs each
//!    complete line through the parser and executor,
//! 4. flushes all queued output.
//!
//! A client whose read filled the whole chunk may have more data waiting; it
//! is serviced again on the next iteration, which then polls without
//! blocking. A single busy client therefore cannot starve the others.

use crate::config::Config;
use crate::protocol::Response;
use crate::runtime::connection::ClientRegistry;
use crate::runtime::request::process_line;
use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token};
use std::io::{self, Read, Write};
use std::net::SocketAddr;
use std::time::Duration;
use tracing::{debug, error, info, warn};

const LISTENER_TOKEN: Token = Token(usize::MAX);

/// Bytes read from a client per service.
const READ_CHUNK: usize = 4096;

const EVENTS_CAPACITY: usize = 256;

const LISTEN_BACKLOG: i32 = 1024;

/// Chat server bound to a listening socket.
pub struct Server {
    poll: Poll,
    listener: TcpListener,
    local_addr: SocketAddr,
    registry: ClientRegistry<TcpStream>,
    max_pending_output: usize,
    /// Clients to read again next iteration.
    backlog: Vec<usize>,
}

impl Server {
    /// Bind the listening socket described by `config`.
    pub fn bind(config: &Config) -> io::Result<Self> {
        let addr: SocketAddr = config
            .listen
            .parse()
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidInput, e))?;

        let poll = Poll::new()?;
        let mut listener = TcpListener::from_std(create_listener(addr)?);
        let local_addr = listener.local_addr()?;
        poll.registry()
            .register(&mut listener, LISTENER_TOKEN, Interest::READABLE)?;

        Ok(Self {
            poll,
            listener,
            local_addr,
            registry: ClientRegistry::new(config.max_clients, config.max_line_length),
            max_pending_output: config.max_pending_output,
            backlog: Vec::new(),
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Run the event loop. Only returns on a poll failure.
    pub fn run(&mut self) -> io::Result<()> {
        let mut events = Events::with_capacity(EVENTS_CAPACITY);

        info!(
            addr = %self.local_addr,
            max_clients = self.registry.capacity(),
            "Event loop started"
        );

        loop {
            let timeout = if self.backlog.is_empty() {
                None
            } else {
                Some(Duration::ZERO)
            };

            if let Err(e) = self.poll.poll(&mut events, timeout) {
                if e.kind() == io::ErrorKind::Interrupted {
                    continue;
                }
                return Err(e);
            }

            let mut accept = false;
            let mut readable = std::mem::take(&mut self.backlog);
            let mut writable = Vec::new();

            for event in events.iter() {
                match event.token() {
                    LISTENER_TOKEN => accept = true,
                    Token(conn_id) => {
                        if event.is_read_closed() {
                            if let Some(client) = self.registry.get_mut(conn_id) {
                                client.read_closed = true;
                            }
                        }
                        if (event.is_readable() || event.is_read_closed() || event.is_error())
                            && !readable.contains(&conn_id)
                        {
                            readable.push(conn_id);
                        }
                        if event.is_writable() {
                            writable.push(conn_id);
                        }
                    }
                }
            }

            if accept {
                self.accept_connections();
            }

            for conn_id in writable {
                if let Err(e) = self.flush(conn_id) {
                    self.close(conn_id, &e);
                }
            }

            for conn_id in readable {
                if let Err(e) = self.handle_readable(conn_id) {
                    self.close(conn_id, &e);
                }
            }

            self.flush_pending();
        }
    }

    fn accept_connections(&mut self) {
        loop {
            match self.listener.accept() {
                Ok((stream, peer)) => match self.registry.insert(stream) {
                    Ok(conn_id) => {
                        if let Err(e) = self.register(conn_id) {
                            self.close(conn_id, &e);
                            continue;
                        }
                        self.registry.send(conn_id, &Response::welcome());
                        debug!(conn_id, peer = %peer, "Accepted connection");
                    }
                    Err(mut stream) => {
                        warn!(peer = %peer, "Server full, rejecting connection");
                        let line = format!("{}\r\n", Response::server_full());
                        if let Err(e) = stream.write_all(line.as_bytes()) {
                            debug!(peer = %peer, error = %e, "Failed to send rejection");
                        }
                        // Dropping the stream closes it.
                    }
                },
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => {
                    error!(error = %e, "Accept error");
                    break;
                }
            }
        }
    }

    fn register(&mut self, conn_id: usize) -> io::Result<()> {
        let client = self
            .registry
            .get_mut(conn_id)
            .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "connection not found"))?;
        self.poll
            .registry()
            .register(&mut client.conn, Token(conn_id), Interest::READABLE)
    }

    fn handle_readable(&mut self, conn_id: usize) -> io::Result<()> {
        let Some(client) = self.registry.get_mut(conn_id) else {
            return Ok(());
        };

        let mut buf = [0u8; READ_CHUNK];
        let n = loop {
            match client.conn.read(&mut buf) {
                Ok(0) => {
                    return Err(io::Error::new(io::ErrorKind::ConnectionReset, "EOF"));
                }
                Ok(n) => break n,
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => return Ok(()),
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        };

        let framed = client.input.feed(&buf[..n]);
        // No further readable edge follows a FIN, so keep reading until EOF.
        let read_again = n == READ_CHUNK || client.read_closed;

        while let Some(line) = self
            .registry
            .get_mut(conn_id)
            .and_then(|client| client.input.next_line())
        {
            process_line(&mut self.registry, conn_id, &line);
        }

        if let Err(e) = framed {
            warn!(conn_id, error = %e, "Protocol violation");
            return Err(io::Error::new(io::ErrorKind::InvalidData, e));
        }

        if read_again && self.registry.contains(conn_id) {
            self.backlog.push(conn_id);
        }

        Ok(())
    }

    /// Write as much queued output as the socket accepts.
    fn flush(&mut self, conn_id: usize) -> io::Result<()> {
        let Some(client) = self.registry.get_mut(conn_id) else {
            return Ok(());
        };

        while !client.output.is_empty() {
            match client.conn.write(&client.output) {
                Ok(0) => {
                    return Err(io::Error::new(io::ErrorKind::WriteZero, "write returned 0"));
                }
                Ok(n) => {
                    let _ = client.output.split_to(n);
                }
                Err(ref e) if e.kind() == io::ErrorKind::WouldBlock => break,
                Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }

        if client.output.len() > self.max_pending_output {
            warn!(
                conn_id,
                pending = client.output.len(),
                "Outbound queue overflow"
            );
            return Err(io::Error::other("outbound queue overflow"));
        }

        // Only ask for writable readiness while output remains.
        let want_write = !client.output.is_empty();
        if want_write != client.write_interest {
            let interest = if want_write {
                Interest::READABLE | Interest::WRITABLE
            } else {
                Interest::READABLE
            };
            self.poll
                .registry()
                .reregister(&mut client.conn, Token(conn_id), interest)?;
            client.write_interest = want_write;
        }

        Ok(())
    }

    fn flush_pending(&mut self) {
        for conn_id in self.registry.pending_output() {
            if let Err(e) = self.flush(conn_id) {
                self.close(conn_id, &e);
            }
        }
    }

    fn close(&mut self, conn_id: usize, reason: &io::Error) {
        if let Some(mut client) = self.registry.remove(conn_id) {
            let _ = self.poll.registry().deregister(&mut client.conn);
            self.backlog.retain(|&id| id != conn_id);
            debug!(conn_id, reason = %reason, "Connection closed");
        }
    }
}

/// Create a non-blocking TCP listener with `SO_REUSEADDR`.
fn create_listener(addr: SocketAddr) -> io::Result<std::net::TcpListener> {
    let socket = socket2::Socket::new(
        match addr {
            SocketAddr::V4(_) => socket2::Domain::IPV4,
            SocketAddr::V6(_) => socket2::Domain::IPV6,
        },
        socket2::Type::STREAM,
        Some(socket2::Protocol::TCP),
    )?;

    socket.set_reuse_address(true)?;
    socket.set_nonblocking(true)?;
    socket.bind(&addr.into())?;
    socket.listen(LISTEN_BACKLOG)?;

    Ok(socket.into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{BufRead, BufReader};
    use std::net::TcpStream as StdTcpStream;
    use std::thread;

    fn test_config(max_clients: usize) -> Config {
        Config {
            listen: "127.0.0.1:0".to_string(),
            max_clients,
            max_line_length: 256,
            max_pending_output: 64 * 1024,
            log_level: "info".to_string(),
        }
    }

    fn start(max_clients: usize) -> SocketAddr {
        let mut server = Server::bind(&test_config(max_clients)).unwrap();
        let addr = server.local_addr();
        thread::spawn(move || server.run());
        addr
    }

    struct TestClient {
        reader: BufReader<StdTcpStream>,
        writer: StdTcpStream,
    }

    impl TestClient {
        /// Connect and consume the welcome banner.
        fn connect(addr: SocketAddr) -> Self {
            let mut client = Self::connect_raw(addr);
            assert_eq!(client.recv(), "WELCOME CAVE/0.1");
            client
        }

        fn connect_raw(addr: SocketAddr) -> Self {
            let stream = StdTcpStream::connect(addr).unwrap();
            stream
                .set_read_timeout(Some(Duration::from_secs(5)))
                .unwrap();
            Self {
                reader: BufReader::new(stream.try_clone().unwrap()),
                writer: stream,
            }
        }

        fn send(&mut self, line: &str) {
            self.writer.write_all(line.as_bytes()).unwrap();
            self.writer.write_all(b"\r\n").unwrap();
        }

        fn send_raw(&mut self, bytes: &[u8]) {
            self.writer.write_all(bytes).unwrap();
        }

        fn recv(&mut self) -> String {
            let mut line = String::new();
            self.reader.read_line(&mut line).unwrap();
            assert!(line.ends_with("\r\n"), "unterminated line: {line:?}");
            line.truncate(line.len() - 2);
            line
        }

        /// True once the server has closed the connection.
        fn closed(&mut self) -> bool {
            let mut line = String::new();
            matches!(self.reader.read_line(&mut line), Ok(0) | Err(_))
        }
    }

    #[test]
    fn test_nick_and_profile_scenario() {
        let addr = start(8);
        let mut bob = TestClient::connect(addr);
        let mut other = TestClient::connect(addr);

        bob.send("NICK bob");
        assert_eq!(bob.recv(), "SYS :nickname set");
        assert_eq!(other.recv(), "SYS :bob joined");

        bob.send("PROFILE SET DISPLAYNAME :Bob The Builder");
        assert_eq!(bob.recv(), "PROFILE OK DISPLAYNAME");

        other.send("PROFILE GET bob");
        assert_eq!(other.recv(), "PROFILE DATA bob DISPLAYNAME :Bob The Builder");
        assert_eq!(other.recv(), "PROFILE END bob");

        other.send("PROFILE GET ghost");
        assert_eq!(other.recv(), "PROFILE ERR NOTFOUND ghost");
        other.send("PING");
        assert_eq!(other.recv(), "PONG");
    }

    #[test]
    fn test_broadcast_exclusion() {
        let addr = start(8);
        let mut a = TestClient::connect(addr);
        let mut b = TestClient::connect(addr);
        let mut c = TestClient::connect(addr);

        a.send("NICK A");
        assert_eq!(a.recv(), "SYS :nickname set");
        assert_eq!(b.recv(), "SYS :A joined");
        assert_eq!(c.recv(), "SYS :A joined");

        a.send("MSG :hi");
        for client in [&mut a, &mut b, &mut c] {
            assert_eq!(client.recv(), "MSG @A :hi");
            // Nothing else was queued ahead of the pong.
            client.send("PING");
            assert_eq!(client.recv(), "PONG");
        }
    }

    #[test]
    fn test_split_and_batched_lines() {
        let addr = start(8);
        let mut a = TestClient::connect(addr);

        a.send_raw(b"PI");
        thread::sleep(Duration::from_millis(20));
        a.send_raw(b"NG\r\n\r\nMSG :one\nMSG :two\r\n");

        assert_eq!(a.recv(), "PONG");
        assert_eq!(a.recv(), "MSG @anon :one");
        assert_eq!(a.recv(), "MSG @anon :two");
    }

    #[test]
    fn test_server_full() {
        let addr = start(2);
        let mut a = TestClient::connect(addr);
        let mut b = TestClient::connect(addr);

        let mut rejected = TestClient::connect_raw(addr);
        assert_eq!(rejected.recv(), "ERR :server full");
        assert!(rejected.closed());

        a.send("MSG :still here");
        assert_eq!(a.recv(), "MSG @anon :still here");
        assert_eq!(b.recv(), "MSG @anon :still here");
    }

    #[test]
    fn test_slot_freed_on_disconnect() {
        let addr = start(1);
        let a = TestClient::connect(addr);
        drop(a);

        // The slot comes back once the server notices the close.
        let mut attempts = 0;
        let mut b = loop {
            let mut candidate = TestClient::connect_raw(addr);
            if candidate.recv() == "WELCOME CAVE/0.1" {
                break candidate;
            }
            attempts += 1;
            assert!(attempts < 50, "slot was never released");
            thread::sleep(Duration::from_millis(20));
        };

        b.send("PING");
        assert_eq!(b.recv(), "PONG");
    }

    #[test]
    fn test_half_close_with_data_in_flight_frees_slot() {
        let addr = start(1);
        let mut a = TestClient::connect(addr);

        a.send("PING");
        a.writer.shutdown(std::net::Shutdown::Write).unwrap();
        assert_eq!(a.recv(), "PONG");
        assert!(a.closed());

        let mut b = TestClient::connect(addr);
        b.send("PING");
        assert_eq!(b.recv(), "PONG");
    }

    #[test]
    fn test_overlong_line_disconnects_only_offender() {
        let addr = start(8);
        let mut good = TestClient::connect(addr);
        let mut bad = TestClient::connect(addr);

        bad.send_raw(&[b'x'; 300]);
        assert!(bad.closed());

        good.send("PING");
        assert_eq!(good.recv(), "PONG");
    }
}
