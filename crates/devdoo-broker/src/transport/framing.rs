//! JSONL framing shared by inbound and backend sockets.

use super::TransportError;

/// Accumulates stream bytes and yields complete newline-terminated frames.
///
/// Frames are returned without their terminator (a trailing `\r` is also
/// dropped). Blank lines are skipped. A frame, or an unterminated remainder,
/// longer than the limit is an error.
#[derive(Debug)]
pub(crate) struct LineBuffer {
    pending: Vec<u8>,
    limit: usize,
}

impl LineBuffer {
    pub(crate) const fn new(limit: usize) -> Self {
        Self {
            pending: Vec::new(),
            limit,
        }
    }

    pub(crate) fn extend(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Pops the next complete frame, if one is buffered.
    pub(crate) fn next_line(&mut self) -> Result<Option<Vec<u8>>, TransportError> {
        while let Some(pos) = self.pending.iter().position(|byte| *byte == b'\n') {
            let size = pos + 1;
            enforce_limit(size, self.limit)?;
            let mut line: Vec<u8> = self.pending.drain(..size).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            if line.iter().all(u8::is_ascii_whitespace) {
                continue;
            }
            return Ok(Some(line));
        }
        enforce_limit(self.pending.len(), self.limit)?;
        Ok(None)
    }

    /// Takes an unterminated final frame once the peer has stopped writing.
    pub(crate) fn take_remainder(&mut self) -> Option<Vec<u8>> {
        let remainder = std::mem::take(&mut self.pending);
        if remainder.iter().all(u8::is_ascii_whitespace) {
            None
        } else {
            Some(remainder)
        }
    }

    pub(crate) fn clear(&mut self) {
        self.pending.clear();
    }

    /// Number of bytes received but not yet handed out as frames.
    pub(crate) const fn pending_len(&self) -> usize {
        self.pending.len()
    }
}

fn enforce_limit(size: usize, max_size: usize) -> Result<(), TransportError> {
    if size > max_size {
        return Err(TransportError::FrameTooLarge { size, max_size });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn yields_frames_split_across_reads() {
        let mut buffer = LineBuffer::new(64);
        buffer.extend(b"{\"service\":");
        assert!(buffer.next_line().expect("within limit").is_none());
        buffer.extend(b"\"users\"}\r\n{\"service\":\"orders\"}\n");

        let first = buffer.next_line().expect("within limit").expect("first frame");
        let second = buffer.next_line().expect("within limit").expect("second frame");
        assert_eq!(first, br#"{"service":"users"}"#);
        assert_eq!(second, br#"{"service":"orders"}"#);
        assert!(buffer.next_line().expect("within limit").is_none());
    }

    #[test]
    fn skips_blank_lines() {
        let mut buffer = LineBuffer::new(64);
        buffer.extend(b"\n  \n{}\n");
        assert_eq!(buffer.next_line().expect("within limit"), Some(b"{}".to_vec()));
    }

    #[test]
    fn rejects_oversized_terminated_frames() {
        let mut buffer = LineBuffer::new(4);
        buffer.extend(b"12345\n");
        let error = buffer.next_line().expect_err("frame is too large");
        assert!(matches!(error, TransportError::FrameTooLarge { size: 6, max_size: 4 }));
    }

    #[test]
    fn rejects_oversized_partial_frames() {
        let mut buffer = LineBuffer::new(4);
        buffer.extend(b"123456");
        assert!(buffer.next_line().is_err());
    }

    #[test]
    fn reports_bytes_still_pending() {
        let mut buffer = LineBuffer::new(64);
        buffer.extend(b"{}\n{\"extra\"");
        assert_eq!(buffer.next_line().expect("within limit"), Some(b"{}".to_vec()));
        assert_eq!(buffer.pending_len(), 8);
        buffer.clear();
        assert_eq!(buffer.pending_len(), 0);
    }

    #[test]
    fn returns_unterminated_remainder() {
        let mut buffer = LineBuffer::new(64);
        buffer.extend(b"{\"service\":\"users\"}");
        assert!(buffer.next_line().expect("within limit").is_none());
        assert_eq!(
            buffer.take_remainder(),
            Some(br#"{"service":"users"}"#.to_vec())
        );
        assert_eq!(buffer.take_remainder(), None);
    }
}
