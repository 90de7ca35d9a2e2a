use bytes::{Buf, Bytes};
use std::io::{self, Read};

/// Request body that can be read once and replayed at will.
///
/// All replays share the same immutable bytes; each [`Body`] carries its own
/// read position, so reading one never moves another.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Body {
    source: Bytes,
    pos: usize,
}

impl Body {
    /// Zero-length body; reads return 0 and every replay is empty too.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn from_bytes(bytes: impl Into<Bytes>) -> Self {
        Self {
            source: bytes.into(),
            pos: 0,
        }
    }

    /// Fresh, unread stream over the same bytes.
    pub fn replay(&self) -> Self {
        Self {
            source: self.source.clone(),
            pos: 0,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.source.is_empty()
    }

    /// Total length regardless of how much was read.
    pub fn len(&self) -> usize {
        self.source.len()
    }

    pub fn remaining(&self) -> usize {
        self.source.len() - self.pos
    }

    /// The whole underlying buffer, ignoring the read position.
    pub fn bytes(&self) -> &Bytes {
        &self.source
    }

    pub fn into_bytes(self) -> Bytes {
        self.source
    }
}

impl Read for Body {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        let mut unread = &self.source[self.pos..];
        let n = unread.remaining().min(buf.len());
        unread.copy_to_slice(&mut buf[..n]);
        self.pos += n;
        Ok(n)
    }
}

impl From<Vec<u8>> for Body {
    fn from(bytes: Vec<u8>) -> Self {
        Self::from_bytes(bytes)
    }
}

impl From<&'static str> for Body {
    fn from(s: &'static str) -> Self {
        Self::from_bytes(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn read_all(body: &mut Body) -> Vec<u8> {
        let mut out = Vec::new();
        body.read_to_end(&mut out).unwrap();
        out
    }

    #[test]
    fn test_empty_body() {
        let mut body = Body::empty();
        assert!(body.is_empty());
        assert_eq!(body.len(), 0);
        assert!(read_all(&mut body).is_empty());
        assert!(read_all(&mut body.replay()).is_empty());
    }

    #[test]
    fn test_read_to_exhaustion() {
        let mut body = Body::from("Hello World");
        assert_eq!(read_all(&mut body), b"Hello World");
        assert_eq!(body.remaining(), 0);
        assert!(read_all(&mut body).is_empty());
        assert_eq!(body.len(), 11);
    }

    #[test]
    fn test_replay_does_not_share_cursor() {
        let mut body = Body::from("{ \"name\": \"Tobi\" }");

        let mut head = [0u8; 4];
        body.read_exact(&mut head).unwrap();
        assert_eq!(&head, b"{ \"n");

        let mut replay = body.replay();
        assert_eq!(read_all(&mut replay), b"{ \"name\": \"Tobi\" }");
        assert_eq!(body.remaining(), 14);
        assert_eq!(read_all(&mut body), b"ame\": \"Tobi\" }");
    }

    #[test]
    fn test_small_reads() {
        let mut body = Body::from(vec![1, 2, 3, 4, 5]);
        let mut buf = [0u8; 2];
        assert_eq!(body.read(&mut buf).unwrap(), 2);
        assert_eq!(body.read(&mut buf).unwrap(), 2);
        assert_eq!(body.read(&mut buf).unwrap(), 1);
        assert_eq!(buf[0], 5);
        assert_eq!(body.read(&mut buf).unwrap(), 0);
    }
}
