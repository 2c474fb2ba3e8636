//! Timeout-chunked stream reader.
//!
//! Cluster nodes send text in bursts of partial lines and stop to wait at a
//! prompt without a trailing newline. [`ChunkReader`] coalesces everything that
//! arrives back-to-back into one decoded unit and hands it out once the wire
//! has been quiet for the configured period.

use std::io;
use std::time::Duration;
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::time::timeout;

/// Size of the buffer used for each physical read.
pub const READ_BUFFER_SIZE: usize = 10 * 1024;

/// Default quiet period after which accumulated bytes are flushed.
pub const DEFAULT_QUIET_PERIOD: Duration = Duration::from_millis(100);

/// Terminal failures of the underlying stream.
#[derive(Debug, Error)]
pub enum ReadError {
    #[error("end of stream")]
    EndOfStream,

    #[error("read failed: {0}")]
    Failure(#[from] io::Error),
}

/// Reads decoded text units from a byte stream, one per quiet period.
#[derive(Debug)]
pub struct ChunkReader<R> {
    inner: R,
    buf: Vec<u8>,
    quiet_period: Duration,
}

impl<R: AsyncRead + Unpin> ChunkReader<R> {
    /// Wrap a stream with the given quiet period.
    pub fn new(inner: R, quiet_period: Duration) -> Self {
        Self {
            inner,
            buf: vec![0; READ_BUFFER_SIZE],
            quiet_period,
        }
    }

    /// Read the next text unit.
    ///
    /// Keeps reading until a read attempt sees no data for one quiet period,
    /// then returns everything accumulated so far (possibly an empty string).
    /// An orderly close or I/O error discards the partial unit.
    pub async fn read_chunk(&mut self) -> Result<String, ReadError> {
        let mut acc = Vec::new();

        loop {
            match timeout(self.quiet_period, self.inner.read(&mut self.buf)).await {
                Err(_elapsed) => return Ok(String::from_utf8_lossy(&acc).into_owned()),
                Ok(Ok(0)) => return Err(ReadError::EndOfStream),
                Ok(Ok(n)) => acc.extend_from_slice(&self.buf[..n]),
                Ok(Err(e)) => return Err(ReadError::Failure(e)),
            }
        }
    }
}
