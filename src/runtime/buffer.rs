//! Per-connection line framing.
//!
//! A `LineBuffer` turns an arbitrarily chunked byte stream into complete
//! protocol lines. Lines end at `\n`; one trailing `\r` is stripped and empty
//! lines are dropped. Bytes after the last `\n` are held back until the next
//! chunk arrives.
//!
//! The buffer is bounded: a pending line must stay strictly shorter than the
//! configured limit. Reaching the limit is a protocol violation and the owning
//! connection is expected to be closed.

use bytes::{Bytes, BytesMut};
use std::collections::VecDeque;
use std::fmt;

/// Framing failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameError {
    /// A line reached the buffer bound before its terminator arrived.
    LineTooLong { limit: usize },
}

impl fmt::Display for FrameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FrameError::LineTooLong { limit } => {
                write!(f, "line exceeds {limit} byte limit")
            }
        }
    }
}

impl std::error::Error for FrameError {}

/// Bounded accumulator for one connection's input.
#[derive(Debug)]
pub struct LineBuffer {
    /// Bytes of the line currently being assembled.
    pending: BytesMut,
    /// Complete lines not yet taken by the caller.
    ready: VecDeque<Bytes>,
    /// Maximum line size, inclusive of the `\n` terminator.
    max_line: usize,
}

impl LineBuffer {
    /// Create an empty buffer accepting lines shorter than `max_line` bytes.
    pub fn new(max_line: usize) -> Self {
        Self {
            pending: BytesMut::with_capacity(max_line.min(4096)),
            ready: VecDeque::new(),
            max_line,
        }
    }

    /// Append a chunk of received bytes.
    ///
    /// Every line completed by the chunk is queued in order, even when a later
    /// part of the same chunk overflows the bound. On error the buffer should
    /// not be fed again.
    pub fn feed(&mut self, mut chunk: &[u8]) -> Result<(), FrameError> {
        while let Some(pos) = chunk.iter().position(|&b| b == b'\n') {
            self.append(&chunk[..pos])?;

            let mut line = self.pending.split().freeze();
            if line.last() == Some(&b'\r') {
                line.truncate(line.len() - 1);
            }
            if !line.is_empty() {
                self.ready.push_back(line);
            }

            chunk = &chunk[pos + 1..];
        }

        self.append(chunk)
    }

    /// Take the next complete line, oldest first.
    pub fn next_line(&mut self) -> Option<Bytes> {
        self.ready.pop_front()
    }

    /// Bytes held back waiting for a terminator.
    pub fn pending_len(&self) -> usize {
        self.pending.len()
    }

    /// Configured line bound.
    pub fn limit(&self) -> usize {
        self.max_line
    }

    fn append(&mut self, bytes: &[u8]) -> Result<(), FrameError> {
        // The terminator needs a byte of its own.
        if self.pending.len() + bytes.len() >= self.max_line {
            return Err(FrameError::LineTooLong {
                limit: self.max_line,
            });
        }
        self.pending.extend_from_slice(bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn drain(buf: &mut LineBuffer) -> Vec<Vec<u8>> {
        std::iter::from_fn(|| buf.next_line())
            .map(|line| line.to_vec())
            .collect()
    }

    /// Reference framing: split the whole stream at once.
    fn reference(stream: &[u8]) -> Vec<Vec<u8>> {
        let mut lines: Vec<Vec<u8>> = stream
            .split(|&b| b == b'\n')
            .map(|line| line.strip_suffix(b"\r").unwrap_or(line).to_vec())
            .collect();
        // Trailing segment is unterminated.
        lines.pop();
        lines.retain(|line| !line.is_empty());
        lines
    }

    #[test]
    fn test_single_chunk_multiple_lines() {
        let mut buf = LineBuffer::new(64);
        buf.feed(b"NICK bob\r\nPING\nMSG :hi\r\n").unwrap();

        assert_eq!(
            drain(&mut buf),
            vec![b"NICK bob".to_vec(), b"PING".to_vec(), b"MSG :hi".to_vec()]
        );
        assert_eq!(buf.pending_len(), 0);
    }

    #[test]
    fn test_line_split_across_chunks() {
        let mut buf = LineBuffer::new(64);
        buf.feed(b"MSG :hel").unwrap();
        assert!(buf.next_line().is_none());
        assert_eq!(buf.pending_len(), 8);

        buf.feed(b"lo\r").unwrap();
        assert!(buf.next_line().is_none());

        buf.feed(b"\nPI").unwrap();
        assert_eq!(drain(&mut buf), vec![b"MSG :hello".to_vec()]);
        assert_eq!(buf.pending_len(), 2);
    }

    #[test]
    fn test_empty_lines_dropped() {
        let mut buf = LineBuffer::new(64);
        buf.feed(b"\n\r\n\nPING\n\n").unwrap();
        assert_eq!(drain(&mut buf), vec![b"PING".to_vec()]);
    }

    #[test]
    fn test_only_one_carriage_return_stripped() {
        let mut buf = LineBuffer::new(64);
        buf.feed(b"MSG :a\r\r\n").unwrap();
        assert_eq!(drain(&mut buf), vec![b"MSG :a\r".to_vec()]);
    }

    #[test]
    fn test_framing_independent_of_chunk_boundaries() {
        let stream: &[u8] =
            b"NICK bob\r\n\nMSG :one: two\nPROFILE GET alice\r\n\r\nPING\nMSG :tail";
        let expected = reference(stream);

        // Every two-way and three-way split of the stream.
        for i in 0..=stream.len() {
            for j in i..=stream.len() {
                let mut buf = LineBuffer::new(128);
                for chunk in [&stream[..i], &stream[i..j], &stream[j..]] {
                    buf.feed(chunk).unwrap();
                }
                assert_eq!(drain(&mut buf), expected, "split at {i}/{j}");
                assert_eq!(buf.pending_len(), b"MSG :tail".len());
            }
        }

        // Byte at a time.
        let mut buf = LineBuffer::new(128);
        for byte in stream {
            buf.feed(std::slice::from_ref(byte)).unwrap();
        }
        assert_eq!(drain(&mut buf), expected);
    }

    #[test]
    fn test_overflow_without_terminator() {
        let mut buf = LineBuffer::new(8);
        buf.feed(b"1234567").unwrap();
        assert_eq!(buf.feed(b"8"), Err(FrameError::LineTooLong { limit: 8 }));
    }

    #[test]
    fn test_line_at_bound_is_accepted() {
        // Seven bytes plus the terminator fill an 8 byte buffer exactly.
        let mut buf = LineBuffer::new(8);
        buf.feed(b"1234567\n").unwrap();
        assert_eq!(drain(&mut buf), vec![b"1234567".to_vec()]);
    }

    #[test]
    fn test_large_chunk_of_short_lines_is_not_overflow() {
        let mut buf = LineBuffer::new(8);
        buf.feed(b"PING\nPING\nPING\nPING\nPING\n").unwrap();
        assert_eq!(drain(&mut buf).len(), 5);
    }

    #[test]
    fn test_lines_before_overflow_are_kept() {
        let mut buf = LineBuffer::new(8);
        let result = buf.feed(b"PING\n0123456789");
        assert!(result.is_err());
        assert_eq!(drain(&mut buf), vec![b"PING".to_vec()]);
    }
}
