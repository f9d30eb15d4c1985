// SMPP v3.4 wire codec: the 16-byte PDU header, field-level helpers and
// the errors shared by every PDU decoder.
//
// The per-command body layouts live in `crate::pdu`; this module only knows
// about the framing rules common to all of them: big-endian integers,
// null-terminated C-octet strings and the command_length envelope.

use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::Cursor;
use thiserror::Error;

/// Maximum accepted command_length. Anything larger is treated as a
/// malformed PDU rather than an allocation request.
pub const MAX_PDU_SIZE: u32 = 64 * 1024;

/// SMPP v3.4 PDU header (16 bytes, common to all PDUs).
///
/// `command_id` and `command_status` are kept as raw `u32`s: remote peers
/// are free to send command ids we do not implement and vendor-specific
/// status codes, and both must survive a round trip through the bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PduHeader {
    pub command_length: u32,
    pub command_id: u32,
    pub command_status: u32,
    pub sequence_number: u32,
}

impl PduHeader {
    pub const SIZE: usize = 16;

    /// Decode and length-validate a header from the buffer.
    pub fn decode(buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        if buf.remaining() < Self::SIZE {
            return Err(CodecError::Incomplete);
        }

        let command_length = buf.get_u32();
        let command_id = buf.get_u32();
        let command_status = buf.get_u32();
        let sequence_number = buf.get_u32();

        if command_length < Self::SIZE as u32 || command_length > MAX_PDU_SIZE {
            return Err(CodecError::InvalidPduLength {
                length: command_length,
            });
        }

        Ok(PduHeader {
            command_length,
            command_id,
            command_status,
            sequence_number,
        })
    }

    pub fn encode(&self, buf: &mut BytesMut) {
        buf.put_u32(self.command_length);
        buf.put_u32(self.command_id);
        buf.put_u32(self.command_status);
        buf.put_u32(self.sequence_number);
    }

    /// Whether bit 31 marks this PDU as a response.
    pub fn is_response(&self) -> bool {
        self.command_id & 0x8000_0000 != 0
    }
}

/// Types that can serialize themselves as a complete PDU.
pub trait Encodable {
    /// Encode the full PDU (header and body) into the buffer. The
    /// command_length written may be a placeholder; `to_bytes` fixes it up.
    fn encode(&self, buf: &mut BytesMut);

    /// Serialize to owned bytes with a correct command_length field.
    fn to_bytes(&self) -> Bytes {
        let mut buf = BytesMut::new();
        self.encode(&mut buf);

        let length = buf.len() as u32;
        buf[0..4].copy_from_slice(&length.to_be_bytes());

        buf.freeze()
    }
}

/// Codec failures. `Incomplete` is an expected runtime condition while a
/// frame is still arriving; everything else is a malformed PDU and closes
/// the offending connection.
#[derive(Debug, Error)]
pub enum CodecError {
    #[error("incomplete PDU: need more data")]
    Incomplete,

    #[error("invalid command_length {length} (accepted range 16-{MAX_PDU_SIZE})")]
    InvalidPduLength { length: u32 },

    #[error("C-octet string '{field}' not terminated within the PDU body")]
    UnterminatedCString { field: &'static str },

    #[error("PDU body truncated while reading '{field}'")]
    Truncated { field: &'static str },
}

/// Read a variable-length null-terminated C-octet string. The terminator
/// must appear within the declared body; `max_len` includes it.
pub fn get_cstring(
    buf: &mut Cursor<&[u8]>,
    max_len: usize,
    field: &'static str,
) -> Result<String, CodecError> {
    let start = buf.position() as usize;
    let data = *buf.get_ref();
    let window = &data[start..data.len().min(start + max_len)];

    let end = window
        .iter()
        .position(|&b| b == 0)
        .ok_or(CodecError::UnterminatedCString { field })?;

    let value = String::from_utf8_lossy(&window[..end]).into_owned();
    buf.set_position((start + end + 1) as u64);
    Ok(value)
}

/// Append a string as a null-terminated C-octet string.
pub fn put_cstring(buf: &mut BytesMut, value: &str) {
    buf.put_slice(value.as_bytes());
    buf.put_u8(0);
}

pub fn get_u8(buf: &mut Cursor<&[u8]>, field: &'static str) -> Result<u8, CodecError> {
    if buf.remaining() < 1 {
        return Err(CodecError::Truncated { field });
    }
    Ok(buf.get_u8())
}

/// Read exactly `len` opaque octets (the short_message payload).
pub fn get_octets(
    buf: &mut Cursor<&[u8]>,
    len: usize,
    field: &'static str,
) -> Result<Bytes, CodecError> {
    if buf.remaining() < len {
        return Err(CodecError::Truncated { field });
    }
    Ok(buf.copy_to_bytes(len))
}
