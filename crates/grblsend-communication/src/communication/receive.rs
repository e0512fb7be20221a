//! Receive-side line assembly

/// Accumulates received bytes and yields newline-terminated lines.
///
/// Bytes after the last delimiter stay buffered until the rest of the line
/// arrives.
#[derive(Debug, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Create an empty buffer
    pub fn new() -> Self {
        Self::default()
    }

    /// Append received bytes
    pub fn push(&mut self, data: &[u8]) {
        self.pending.extend_from_slice(data);
    }

    /// Take the next complete, non-empty line without its terminator
    pub fn next_line(&mut self) -> Option<String> {
        while let Some(pos) = self.pending.iter().position(|&b| b == b'\n') {
            let raw: Vec<u8> = self.pending.drain(..=pos).collect();
            let line = String::from_utf8_lossy(&raw);
            let line = line.trim();
            if !line.is_empty() {
                return Some(line.to_string());
            }
        }
        None
    }

    /// Number of bytes waiting for a delimiter
    pub fn partial_len(&self) -> usize {
        self.pending.len()
    }

    /// Discard everything buffered
    pub fn clear(&mut self) {
        self.pending.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_partial_line_is_kept() {
        let mut buf = LineBuffer::new();
        buf.push(b"o");
        assert_eq!(buf.next_line(), None);
        assert_eq!(buf.partial_len(), 1);
        buf.push(b"k\r\n<Idle|MPos:0.000");
        assert_eq!(buf.next_line().as_deref(), Some("ok"));
        assert_eq!(buf.next_line(), None);
        buf.push(b",0.000,0.000>\n");
        assert_eq!(
            buf.next_line().as_deref(),
            Some("<Idle|MPos:0.000,0.000,0.000>")
        );
        assert_eq!(buf.partial_len(), 0);
    }

    #[test]
    fn test_blank_lines_are_skipped() {
        let mut buf = LineBuffer::new();
        buf.push(b"\r\n\n  \nok\n");
        assert_eq!(buf.next_line().as_deref(), Some("ok"));
        assert_eq!(buf.next_line(), None);
    }

    #[test]
    fn test_several_lines_in_one_chunk() {
        let mut buf = LineBuffer::new();
        buf.push(b"[VER:1.1h.20190825:]\r\n[OPT:V,15,128]\r\nok\r\n");
        assert_eq!(buf.next_line().as_deref(), Some("[VER:1.1h.20190825:]"));
        assert_eq!(buf.next_line().as_deref(), Some("[OPT:V,15,128]"));
        assert_eq!(buf.next_line().as_deref(), Some("ok"));
    }

    #[test]
    fn test_invalid_utf8_is_replaced() {
        let mut buf = LineBuffer::new();
        buf.push(&[0xff, b'o', b'k', b'\n']);
        let line = buf.next_line().unwrap();
        assert!(line.ends_with("ok"));
    }
}
