// Bind PDUs. The three bind flavours (transmitter, receiver, transceiver)
// share one body layout and differ only in command_id, so the gateway
// models them as a single `Bind`/`BindResponse` pair tagged with a
// `BindKind`.

use crate::codec::{self, CodecError, Encodable, PduHeader};
use crate::pdu::{CommandId, MAX_ADDRESS_RANGE_LEN, MAX_PASSWORD_LEN, MAX_SYSTEM_ID_LEN, MAX_SYSTEM_TYPE_LEN};
use bytes::{Buf, BufMut, BytesMut};
use std::io::Cursor;

/// SMPP v3.4 interface_version octet.
pub const INTERFACE_VERSION_34: u8 = 0x34;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BindKind {
    Transmitter,
    Receiver,
    Transceiver,
}

impl BindKind {
    pub fn request_id(self) -> CommandId {
        match self {
            BindKind::Transmitter => CommandId::BindTransmitter,
            BindKind::Receiver => CommandId::BindReceiver,
            BindKind::Transceiver => CommandId::BindTransceiver,
        }
    }

    pub fn response_id(self) -> CommandId {
        match self {
            BindKind::Transmitter => CommandId::BindTransmitterResp,
            BindKind::Receiver => CommandId::BindReceiverResp,
            BindKind::Transceiver => CommandId::BindTransceiverResp,
        }
    }

    pub fn from_request_id(id: CommandId) -> Option<Self> {
        match id {
            CommandId::BindTransmitter => Some(BindKind::Transmitter),
            CommandId::BindReceiver => Some(BindKind::Receiver),
            CommandId::BindTransceiver => Some(BindKind::Transceiver),
            _ => None,
        }
    }

    pub fn from_response_id(id: CommandId) -> Option<Self> {
        match id {
            CommandId::BindTransmitterResp => Some(BindKind::Transmitter),
            CommandId::BindReceiverResp => Some(BindKind::Receiver),
            CommandId::BindTransceiverResp => Some(BindKind::Transceiver),
            _ => None,
        }
    }
}

/// bind_transmitter / bind_receiver / bind_transceiver (Sections 4.1.1,
/// 4.1.3, 4.2.5).
#[derive(Clone, Debug, PartialEq)]
pub struct Bind {
    pub kind: BindKind,
    pub sequence_number: u32,
    pub system_id: String,
    pub password: String,
    pub system_type: String,
    pub interface_version: u8,
    pub addr_ton: u8,
    pub addr_npi: u8,
    pub address_range: String,
}

impl Bind {
    /// A transceiver bind the way the gateway issues it: v3.4, empty
    /// address range, unknown TON/NPI.
    pub fn transceiver(
        sequence_number: u32,
        system_id: &str,
        password: &str,
        system_type: &str,
    ) -> Self {
        Bind {
            kind: BindKind::Transceiver,
            sequence_number,
            system_id: system_id.to_owned(),
            password: password.to_owned(),
            system_type: system_type.to_owned(),
            interface_version: INTERFACE_VERSION_34,
            addr_ton: 0,
            addr_npi: 0,
            address_range: String::new(),
        }
    }

    pub fn decode(
        kind: BindKind,
        header: &PduHeader,
        buf: &mut Cursor<&[u8]>,
    ) -> Result<Self, CodecError> {
        let system_id = codec::get_cstring(buf, MAX_SYSTEM_ID_LEN, "system_id")?;
        let password = codec::get_cstring(buf, MAX_PASSWORD_LEN, "password")?;
        let system_type = codec::get_cstring(buf, MAX_SYSTEM_TYPE_LEN, "system_type")?;
        let interface_version = codec::get_u8(buf, "interface_version")?;
        let addr_ton = codec::get_u8(buf, "addr_ton")?;
        let addr_npi = codec::get_u8(buf, "addr_npi")?;
        let address_range = codec::get_cstring(buf, MAX_ADDRESS_RANGE_LEN, "address_range")?;

        Ok(Bind {
            kind,
            sequence_number: header.sequence_number,
            system_id,
            password,
            system_type,
            interface_version,
            addr_ton,
            addr_npi,
            address_range,
        })
    }
}

impl Encodable for Bind {
    fn encode(&self, buf: &mut BytesMut) {
        PduHeader {
            command_length: 0,
            command_id: self.kind.request_id() as u32,
            command_status: 0,
            sequence_number: self.sequence_number,
        }
        .encode(buf);

        codec::put_cstring(buf, &self.system_id);
        codec::put_cstring(buf, &self.password);
        codec::put_cstring(buf, &self.system_type);
        buf.put_u8(self.interface_version);
        buf.put_u8(self.addr_ton);
        buf.put_u8(self.addr_npi);
        codec::put_cstring(buf, &self.address_range);
    }
}

/// bind_*_resp. On rejection (non-zero status) the system_id body is
/// still carried, possibly empty.
#[derive(Clone, Debug, PartialEq)]
pub struct BindResponse {
    pub kind: BindKind,
    pub command_status: u32,
    pub sequence_number: u32,
    pub system_id: String,
}

impl BindResponse {
    pub fn decode(
        kind: BindKind,
        header: &PduHeader,
        buf: &mut Cursor<&[u8]>,
    ) -> Result<Self, CodecError> {
        // An error response may omit the body entirely.
        let system_id = if buf.has_remaining() {
            codec::get_cstring(buf, MAX_SYSTEM_ID_LEN, "system_id")?
        } else {
            String::new()
        };

        Ok(BindResponse {
            kind,
            command_status: header.command_status,
            sequence_number: header.sequence_number,
            system_id,
        })
    }
}

impl Encodable for BindResponse {
    fn encode(&self, buf: &mut BytesMut) {
        PduHeader {
            command_length: 0,
            command_id: self.kind.response_id() as u32,
            command_status: self.command_status,
            sequence_number: self.sequence_number,
        }
        .encode(buf);

        codec::put_cstring(buf, &self.system_id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;

    #[test]
    fn bind_transceiver_to_bytes() {
        let bind = Bind {
            kind: BindKind::Transceiver,
            sequence_number: 1,
            system_id: "SMPP3TEST".into(),
            password: "secret08".into(),
            system_type: "SUBMIT1".into(),
            interface_version: INTERFACE_VERSION_34,
            addr_ton: 1,
            addr_npi: 1,
            address_range: String::new(),
        };

        let bytes = bind.to_bytes();

        let expected: Vec<u8> = vec![
            // Header
            0x00, 0x00, 0x00, 0x2F, // command_length
            0x00, 0x00, 0x00, 0x09, // command_id (bind_transceiver)
            0x00, 0x00, 0x00, 0x00, // command_status
            0x00, 0x00, 0x00, 0x01, // sequence_number
            // Body
            0x53, 0x4D, 0x50, 0x50, 0x33, 0x54, 0x45, 0x53, 0x54, 0x00, // system_id
            0x73, 0x65, 0x63, 0x72, 0x65, 0x74, 0x30, 0x38, 0x00, // password
            0x53, 0x55, 0x42, 0x4D, 0x49, 0x54, 0x31, 0x00, // system_type
            0x34, // interface_version
            0x01, // addr_ton
            0x01, // addr_npi
            0x00, // address_range
        ];

        assert_eq!(bytes.as_ref(), expected.as_slice());
    }

    #[test]
    fn bind_response_to_bytes() {
        let resp = BindResponse {
            kind: BindKind::Transceiver,
            command_status: 0,
            sequence_number: 1,
            system_id: "SMPP-GATEWAY".into(),
        };

        let bytes = resp.to_bytes();
        assert_eq!(&bytes[..4], &29u32.to_be_bytes());
        assert_eq!(&bytes[4..8], &0x8000_0009u32.to_be_bytes());
        assert_eq!(&bytes[16..], b"SMPP-GATEWAY\0");
    }

    #[test]
    fn bind_roundtrip_all_kinds() {
        for kind in [BindKind::Transmitter, BindKind::Receiver, BindKind::Transceiver] {
            let original = Bind {
                kind,
                sequence_number: 7,
                system_id: "esme".into(),
                password: "pw".into(),
                system_type: "VMS".into(),
                interface_version: INTERFACE_VERSION_34,
                addr_ton: 1,
                addr_npi: 1,
                address_range: "49".into(),
            };

            let bytes = original.to_bytes();
            let mut cursor = Cursor::new(bytes.as_ref());
            match Frame::parse(&mut cursor).unwrap() {
                Frame::Bind(decoded) => assert_eq!(decoded, original),
                other => panic!("expected Bind frame, got {other:?}"),
            }
        }
    }

    #[test]
    fn error_bind_response_without_body_decodes() {
        // bind_transceiver_resp with ESME_RBINDFAIL and no system_id body.
        let raw: Vec<u8> = vec![
            0x00, 0x00, 0x00, 0x10, // command_length = 16
            0x80, 0x00, 0x00, 0x09, // bind_transceiver_resp
            0x00, 0x00, 0x00, 0x0D, // ESME_RBINDFAIL
            0x00, 0x00, 0x00, 0x02, // sequence_number
        ];

        let mut cursor = Cursor::new(raw.as_slice());
        match Frame::parse(&mut cursor).unwrap() {
            Frame::BindResp(resp) => {
                assert_eq!(resp.command_status, 0x0D);
                assert_eq!(resp.sequence_number, 2);
                assert_eq!(resp.system_id, "");
            }
            other => panic!("expected BindResp frame, got {other:?}"),
        }
    }
}
