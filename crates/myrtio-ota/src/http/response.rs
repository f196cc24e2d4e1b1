use crate::error::OtaError;

pub const HEADER_CAPACITY: usize = 1024;

const TERMINATOR: &[u8] = b"\r\n\r\n";
const STATUS_OFFSET: usize = 9;

/// Result of feeding bytes to a [`HeaderAccumulator`].
#[derive(Debug, PartialEq, Eq)]
pub enum HeaderProgress<'a> {
    /// Terminator not seen yet, everything was buffered
    Incomplete,
    /// Header parsed; `body` holds the payload bytes that followed it
    Complete { content_length: u32, body: &'a [u8] },
}

/// Collects the response header across receive events.
#[derive(Debug, Default)]
pub struct HeaderAccumulator {
    buf: heapless::Vec<u8, HEADER_CAPACITY>,
}

impl HeaderAccumulator {
    pub const fn new() -> Self {
        Self {
            buf: heapless::Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.buf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.is_empty()
    }

    pub fn push<'a>(&mut self, chunk: &'a [u8]) -> Result<HeaderProgress<'a>, OtaError> {
        let old_len = self.buf.len();
        let take = (HEADER_CAPACITY - old_len).min(chunk.len());
        self.buf
            .extend_from_slice(&chunk[..take])
            .map_err(|()| OtaError::ProtocolError)?;

        // The terminator may straddle the previous chunk
        let search_from = old_len.saturating_sub(TERMINATOR.len() - 1);
        let found = self.buf[search_from..]
            .windows(TERMINATOR.len())
            .position(|window| window == TERMINATOR);

        let Some(position) = found else {
            if self.buf.is_full() {
                log::warn!("ota: response header exceeds {} bytes", HEADER_CAPACITY);
                return Err(OtaError::ProtocolError);
            }
            return Ok(HeaderProgress::Incomplete);
        };

        let header_end = search_from + position + TERMINATOR.len();
        let content_length = parse_header(&self.buf[..header_end])?;
        Ok(HeaderProgress::Complete {
            content_length,
            body: &chunk[header_end - old_len..],
        })
    }
}

/// Validates the status line and returns the announced content length.
pub fn parse_header(header: &[u8]) -> Result<u32, OtaError> {
    if header.get(STATUS_OFFSET..STATUS_OFFSET + 3) != Some(b"200".as_slice()) {
        log::warn!("ota: unexpected response status");
        return Err(OtaError::ProtocolError);
    }
    let text = core::str::from_utf8(header).map_err(|_| OtaError::ProtocolError)?;
    find_content_length(text).ok_or(OtaError::ProtocolError)
}

/// Find the content length in the header string.
///
/// The header name is matched case-insensitively.
pub fn find_content_length(header: &str) -> Option<u32> {
    const TARGET: &str = "content-length:";
    for line in header.lines() {
        let Some(name) = line.get(..TARGET.len()) else {
            continue;
        };
        if name.eq_ignore_ascii_case(TARGET) {
            return line[TARGET.len()..].trim().parse::<u32>().ok();
        }
    }
    None
}
