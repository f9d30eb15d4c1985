// Link-management PDUs: enquire_link keepalives, unbind and generic_nack.
// All of them are header-only.

use crate::codec::{CodecError, Encodable, PduHeader};
use crate::pdu::CommandId;
use bytes::BytesMut;
use std::io::Cursor;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnquireLink {
    pub sequence_number: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct EnquireLinkResponse {
    pub sequence_number: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Unbind {
    pub sequence_number: u32,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnbindResponse {
    pub command_status: u32,
    pub sequence_number: u32,
}

/// generic_nack (Section 4.3.1): the reply to a PDU that could not be
/// handled, echoing the offender's sequence number.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GenericNack {
    pub command_status: u32,
    pub sequence_number: u32,
}

fn encode_header_only(command_id: CommandId, command_status: u32, sequence_number: u32, buf: &mut BytesMut) {
    PduHeader {
        command_length: PduHeader::SIZE as u32,
        command_id: command_id as u32,
        command_status,
        sequence_number,
    }
    .encode(buf);
}

impl EnquireLink {
    pub fn decode(header: &PduHeader, _buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Ok(EnquireLink {
            sequence_number: header.sequence_number,
        })
    }
}

impl Encodable for EnquireLink {
    fn encode(&self, buf: &mut BytesMut) {
        encode_header_only(CommandId::EnquireLink, 0, self.sequence_number, buf);
    }
}

impl EnquireLinkResponse {
    pub fn decode(header: &PduHeader, _buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Ok(EnquireLinkResponse {
            sequence_number: header.sequence_number,
        })
    }
}

impl Encodable for EnquireLinkResponse {
    fn encode(&self, buf: &mut BytesMut) {
        encode_header_only(CommandId::EnquireLinkResp, 0, self.sequence_number, buf);
    }
}

impl Unbind {
    pub fn decode(header: &PduHeader, _buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Ok(Unbind {
            sequence_number: header.sequence_number,
        })
    }
}

impl Encodable for Unbind {
    fn encode(&self, buf: &mut BytesMut) {
        encode_header_only(CommandId::Unbind, 0, self.sequence_number, buf);
    }
}

impl UnbindResponse {
    pub fn decode(header: &PduHeader, _buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Ok(UnbindResponse {
            command_status: header.command_status,
            sequence_number: header.sequence_number,
        })
    }
}

impl Encodable for UnbindResponse {
    fn encode(&self, buf: &mut BytesMut) {
        encode_header_only(
            CommandId::UnbindResp,
            self.command_status,
            self.sequence_number,
            buf,
        );
    }
}

impl GenericNack {
    pub fn new(sequence_number: u32, command_status: u32) -> Self {
        GenericNack {
            command_status,
            sequence_number,
        }
    }

    pub fn decode(header: &PduHeader, _buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        Ok(GenericNack {
            command_status: header.command_status,
            sequence_number: header.sequence_number,
        })
    }
}

impl Encodable for GenericNack {
    fn encode(&self, buf: &mut BytesMut) {
        encode_header_only(
            CommandId::GenericNack,
            self.command_status,
            self.sequence_number,
            buf,
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;
    use crate::pdu::CommandStatus;

    #[test]
    fn enquire_link_roundtrip() {
        let original = EnquireLink { sequence_number: 42 };
        let bytes = original.to_bytes();
        assert_eq!(bytes.len(), 16);

        let mut cursor = Cursor::new(bytes.as_ref());
        match Frame::parse(&mut cursor).unwrap() {
            Frame::EnquireLink(decoded) => assert_eq!(decoded, original),
            other => panic!("expected EnquireLink, got {other:?}"),
        }
    }

    #[test]
    fn enquire_link_resp_roundtrip() {
        let original = EnquireLinkResponse { sequence_number: 42 };
        let bytes = original.to_bytes();

        let mut cursor = Cursor::new(bytes.as_ref());
        match Frame::parse(&mut cursor).unwrap() {
            Frame::EnquireLinkResp(decoded) => assert_eq!(decoded, original),
            other => panic!("expected EnquireLinkResp, got {other:?}"),
        }
    }

    #[test]
    fn generic_nack_carries_status_and_sequence() {
        let nack = GenericNack::new(7, CommandStatus::InvalidBindStatus as u32);
        let bytes = nack.to_bytes();

        assert_eq!(&bytes[4..8], &0x8000_0000u32.to_be_bytes());
        assert_eq!(&bytes[8..12], &0x0000_0004u32.to_be_bytes());
        assert_eq!(&bytes[12..16], &7u32.to_be_bytes());
    }

    #[test]
    fn unbind_roundtrip() {
        let original = Unbind { sequence_number: 99 };
        let bytes = original.to_bytes();

        let mut cursor = Cursor::new(bytes.as_ref());
        match Frame::parse(&mut cursor).unwrap() {
            Frame::Unbind(decoded) => assert_eq!(decoded, original),
            other => panic!("expected Unbind, got {other:?}"),
        }
    }
}
