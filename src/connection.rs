// Framed SMPP I/O over a TCP stream: accumulate bytes until a whole PDU is
// buffered, then hand the parsed frame up. Writes go through a BufWriter so
// a PDU reaches the socket in one flush.

use crate::codec::CodecError;
use crate::frame::Frame;
use bytes::{Buf, BytesMut};
use std::io::{self, Cursor};
use tokio::io::{AsyncReadExt, AsyncWriteExt, BufWriter};
use tokio::net::TcpStream;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    #[error("malformed PDU: {0}")]
    Codec(#[from] CodecError),

    #[error("connection reset by peer mid-frame")]
    ResetByPeer,
}

#[derive(Debug)]
pub struct Connection {
    stream: BufWriter<TcpStream>,
    buffer: BytesMut,
}

impl Connection {
    pub fn new(socket: TcpStream) -> Connection {
        Connection {
            stream: BufWriter::new(socket),
            buffer: BytesMut::with_capacity(4 * 1024),
        }
    }

    /// Read a single frame from the underlying stream.
    ///
    /// Waits until enough data for a whole PDU has been buffered. Returns
    /// `None` on a clean close (stream ended on a frame boundary); a close
    /// mid-frame is an error.
    ///
    /// Cancel safety: a partially received frame stays in the internal
    /// buffer, so this future may be dropped and re-created freely inside
    /// `select!` loops.
    pub async fn read_frame(&mut self) -> Result<Option<Frame>, ConnectionError> {
        loop {
            if let Some(frame) = self.parse_frame()? {
                return Ok(Some(frame));
            }

            if 0 == self.stream.read_buf(&mut self.buffer).await? {
                return if self.buffer.is_empty() {
                    Ok(None)
                } else {
                    Err(ConnectionError::ResetByPeer)
                };
            }
        }
    }

    /// Try to cut one frame out of the buffer. `Ok(None)` means more data
    /// is needed; decode errors are fatal for the connection.
    fn parse_frame(&mut self) -> Result<Option<Frame>, ConnectionError> {
        let mut cursor = Cursor::new(&self.buffer[..]);

        match Frame::check(&mut cursor) {
            Ok(len) => {
                // Parse from a cursor bounded to exactly this PDU so field
                // decoding cannot run into a following frame's bytes.
                let mut pdu = Cursor::new(&self.buffer[..len]);
                let frame = Frame::parse(&mut pdu)?;

                self.buffer.advance(len);
                Ok(Some(frame))
            }
            Err(CodecError::Incomplete) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Write a single frame and flush it to the socket.
    pub async fn write_frame(&mut self, frame: &Frame) -> io::Result<()> {
        self.stream.write_all(&frame.to_bytes()).await?;
        self.stream.flush().await
    }
}
