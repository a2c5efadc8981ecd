//! Line framing over a telnet byte stream.

use bytes::BytesMut;
use memchr::memchr;
use tokio::io::{AsyncRead, AsyncReadExt};

use mud_shared::MAX_LINE_LEN;

use super::telnet::IacParser;

/// Buffers a reader and yields one line at a time with telnet commands
/// removed. Negotiation replies pile up until `take_replies` is called.
#[derive(Debug)]
pub struct LineReader<R> {
    inner: R,
    buf: BytesMut,
    iac: IacParser,
    replies: Vec<u8>,
    max_line_len: usize,
}

impl<R> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self {
            inner,
            buf: BytesMut::with_capacity(1024),
            iac: IacParser::new(),
            replies: Vec::new(),
            max_line_len: MAX_LINE_LEN,
        }
    }

    pub fn max_line_len(mut self, max: usize) -> Self {
        self.max_line_len = max.max(1);
        self
    }

    /// Telnet replies owed to the peer.
    pub fn take_replies(&mut self) -> Vec<u8> {
        std::mem::take(&mut self.replies)
    }
}

impl<R: AsyncRead + Unpin> LineReader<R> {
    /// Next line with the terminator stripped and surrounding whitespace
    /// trimmed. `Ok(None)` on a clean close.
    pub async fn read_line(&mut self) -> std::io::Result<Option<String>> {
        Ok(self.read_raw_line().await?.map(|l| l.trim().to_string()))
    }

    /// Next line with only the `\n` / `\r\n` terminator removed, for the
    /// editor where leading whitespace matters.
    ///
    /// Cancel safe: bytes are only moved out of the socket and into the
    /// buffer between awaits.
    pub async fn read_raw_line(&mut self) -> std::io::Result<Option<String>> {
        let mut chunk = [0u8; 1024];
        loop {
            if let Some(i) = memchr(b'\n', &self.buf) {
                let raw = self.buf.split_to(i + 1);
                let mut end = raw.len() - 1;
                if end > 0 && raw[end - 1] == b'\r' {
                    end -= 1;
                }
                return Ok(Some(String::from_utf8_lossy(&raw[..end]).into_owned()));
            }

            if self.buf.len() > self.max_line_len {
                return Err(std::io::Error::new(std::io::ErrorKind::InvalidData, "line too long"));
            }

            let n = self.inner.read(&mut chunk).await?;
            if n == 0 {
                if self.buf.is_empty() {
                    return Ok(None);
                }
                // last line without a terminator
                let rest = self.buf.split();
                return Ok(Some(String::from_utf8_lossy(&rest).trim_end_matches('\r').to_string()));
            }
            let (data, replies) = self.iac.parse(&chunk[..n]);
            self.buf.extend_from_slice(&data);
            self.replies.extend_from_slice(&replies);
        }
    }
}
