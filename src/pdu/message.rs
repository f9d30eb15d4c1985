// Message-carrying PDUs: submit_sm (Section 4.4) and deliver_sm
// (Section 4.6) with their responses.
//
// Only the mandatory body is modelled. Optional TLVs that a peer appends
// after the mandatory fields are skipped on decode; the bridge forwards
// the short_message octets opaquely and has no use for them.

use crate::codec::{self, CodecError, Encodable, PduHeader};
use crate::pdu::{CommandId, MAX_ADDR_LEN, MAX_DATETIME_LEN, MAX_MESSAGE_ID_LEN, MAX_SERVICE_TYPE_LEN};
use bytes::{Buf, BufMut, Bytes, BytesMut};
use std::io::Cursor;

/// esm_class bit marking a delivery receipt in a deliver_sm (Section 5.2.12).
pub const ESM_CLASS_DELIVERY_RECEIPT: u8 = 0x04;

/// Mandatory submit_sm / deliver_sm body. The two commands share the
/// layout; `command_id` picks the direction.
#[derive(Clone, Debug, PartialEq)]
pub struct ShortMessagePdu {
    pub sequence_number: u32,
    pub service_type: String,
    pub source_addr_ton: u8,
    pub source_addr_npi: u8,
    pub source_addr: String,
    pub dest_addr_ton: u8,
    pub dest_addr_npi: u8,
    pub destination_addr: String,
    pub esm_class: u8,
    pub protocol_id: u8,
    pub priority_flag: u8,
    pub schedule_delivery_time: String,
    pub validity_period: String,
    pub registered_delivery: u8,
    pub replace_if_present_flag: u8,
    pub data_coding: u8,
    pub sm_default_msg_id: u8,
    pub short_message: Bytes,
}

impl ShortMessagePdu {
    /// Whether the esm_class flags this message as a delivery receipt.
    pub fn is_delivery_receipt(&self) -> bool {
        self.esm_class & ESM_CLASS_DELIVERY_RECEIPT != 0
    }

    fn decode(header: &PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        let service_type = codec::get_cstring(buf, MAX_SERVICE_TYPE_LEN, "service_type")?;
        let source_addr_ton = codec::get_u8(buf, "source_addr_ton")?;
        let source_addr_npi = codec::get_u8(buf, "source_addr_npi")?;
        let source_addr = codec::get_cstring(buf, MAX_ADDR_LEN, "source_addr")?;
        let dest_addr_ton = codec::get_u8(buf, "dest_addr_ton")?;
        let dest_addr_npi = codec::get_u8(buf, "dest_addr_npi")?;
        let destination_addr = codec::get_cstring(buf, MAX_ADDR_LEN, "destination_addr")?;
        let esm_class = codec::get_u8(buf, "esm_class")?;
        let protocol_id = codec::get_u8(buf, "protocol_id")?;
        let priority_flag = codec::get_u8(buf, "priority_flag")?;
        let schedule_delivery_time =
            codec::get_cstring(buf, MAX_DATETIME_LEN, "schedule_delivery_time")?;
        let validity_period = codec::get_cstring(buf, MAX_DATETIME_LEN, "validity_period")?;
        let registered_delivery = codec::get_u8(buf, "registered_delivery")?;
        let replace_if_present_flag = codec::get_u8(buf, "replace_if_present_flag")?;
        let data_coding = codec::get_u8(buf, "data_coding")?;
        let sm_default_msg_id = codec::get_u8(buf, "sm_default_msg_id")?;
        let sm_length = codec::get_u8(buf, "sm_length")?;
        let short_message = codec::get_octets(buf, sm_length as usize, "short_message")?;

        // Skip any optional TLVs trailing the mandatory body.
        let remaining = buf.remaining();
        buf.advance(remaining);

        Ok(ShortMessagePdu {
            sequence_number: header.sequence_number,
            service_type,
            source_addr_ton,
            source_addr_npi,
            source_addr,
            dest_addr_ton,
            dest_addr_npi,
            destination_addr,
            esm_class,
            protocol_id,
            priority_flag,
            schedule_delivery_time,
            validity_period,
            registered_delivery,
            replace_if_present_flag,
            data_coding,
            sm_default_msg_id,
            short_message,
        })
    }

    fn encode_with(&self, command_id: CommandId, buf: &mut BytesMut) {
        PduHeader {
            command_length: 0,
            command_id: command_id as u32,
            command_status: 0,
            sequence_number: self.sequence_number,
        }
        .encode(buf);

        codec::put_cstring(buf, &self.service_type);
        buf.put_u8(self.source_addr_ton);
        buf.put_u8(self.source_addr_npi);
        codec::put_cstring(buf, &self.source_addr);
        buf.put_u8(self.dest_addr_ton);
        buf.put_u8(self.dest_addr_npi);
        codec::put_cstring(buf, &self.destination_addr);
        buf.put_u8(self.esm_class);
        buf.put_u8(self.protocol_id);
        buf.put_u8(self.priority_flag);
        codec::put_cstring(buf, &self.schedule_delivery_time);
        codec::put_cstring(buf, &self.validity_period);
        buf.put_u8(self.registered_delivery);
        buf.put_u8(self.replace_if_present_flag);
        buf.put_u8(self.data_coding);
        buf.put_u8(self.sm_default_msg_id);
        buf.put_u8(self.short_message.len() as u8);
        buf.put_slice(&self.short_message);
    }
}

/// submit_sm (Section 4.4.1).
#[derive(Clone, Debug, PartialEq)]
pub struct SubmitSm(pub ShortMessagePdu);

impl SubmitSm {
    pub fn decode(header: &PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        ShortMessagePdu::decode(header, buf).map(SubmitSm)
    }
}

impl Encodable for SubmitSm {
    fn encode(&self, buf: &mut BytesMut) {
        self.0.encode_with(CommandId::SubmitSm, buf);
    }
}

impl std::ops::Deref for SubmitSm {
    type Target = ShortMessagePdu;

    fn deref(&self) -> &ShortMessagePdu {
        &self.0
    }
}

/// deliver_sm (Section 4.6.1).
#[derive(Clone, Debug, PartialEq)]
pub struct DeliverSm(pub ShortMessagePdu);

impl DeliverSm {
    pub fn decode(header: &PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        ShortMessagePdu::decode(header, buf).map(DeliverSm)
    }
}

impl Encodable for DeliverSm {
    fn encode(&self, buf: &mut BytesMut) {
        self.0.encode_with(CommandId::DeliverSm, buf);
    }
}

impl std::ops::Deref for DeliverSm {
    type Target = ShortMessagePdu;

    fn deref(&self) -> &ShortMessagePdu {
        &self.0
    }
}

/// submit_sm_resp (Section 4.4.2). The message_id body is present only on
/// success; error responses are header-only.
#[derive(Clone, Debug, PartialEq)]
pub struct SubmitSmResponse {
    pub command_status: u32,
    pub sequence_number: u32,
    pub message_id: String,
}

impl SubmitSmResponse {
    pub fn ok(sequence_number: u32, message_id: impl Into<String>) -> Self {
        SubmitSmResponse {
            command_status: 0,
            sequence_number,
            message_id: message_id.into(),
        }
    }

    pub fn error(sequence_number: u32, command_status: u32) -> Self {
        SubmitSmResponse {
            command_status,
            sequence_number,
            message_id: String::new(),
        }
    }

    pub fn decode(header: &PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        let message_id = if buf.has_remaining() {
            codec::get_cstring(buf, MAX_MESSAGE_ID_LEN, "message_id")?
        } else {
            String::new()
        };

        Ok(SubmitSmResponse {
            command_status: header.command_status,
            sequence_number: header.sequence_number,
            message_id,
        })
    }
}

impl Encodable for SubmitSmResponse {
    fn encode(&self, buf: &mut BytesMut) {
        PduHeader {
            command_length: 0,
            command_id: CommandId::SubmitSmResp as u32,
            command_status: self.command_status,
            sequence_number: self.sequence_number,
        }
        .encode(buf);

        if self.command_status == 0 {
            codec::put_cstring(buf, &self.message_id);
        }
    }
}

/// deliver_sm_resp (Section 4.6.2). The message_id field is unused and
/// set to NULL per specification.
#[derive(Clone, Debug, PartialEq)]
pub struct DeliverSmResponse {
    pub command_status: u32,
    pub sequence_number: u32,
}

impl DeliverSmResponse {
    pub fn ok(sequence_number: u32) -> Self {
        DeliverSmResponse {
            command_status: 0,
            sequence_number,
        }
    }

    pub fn decode(header: &PduHeader, buf: &mut Cursor<&[u8]>) -> Result<Self, CodecError> {
        if buf.has_remaining() {
            codec::get_cstring(buf, MAX_MESSAGE_ID_LEN, "message_id")?;
        }

        Ok(DeliverSmResponse {
            command_status: header.command_status,
            sequence_number: header.sequence_number,
        })
    }
}

impl Encodable for DeliverSmResponse {
    fn encode(&self, buf: &mut BytesMut) {
        PduHeader {
            command_length: 0,
            command_id: CommandId::DeliverSmResp as u32,
            command_status: self.command_status,
            sequence_number: self.sequence_number,
        }
        .encode(buf);

        codec::put_cstring(buf, "");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frame::Frame;

    fn sample_body(sequence_number: u32) -> ShortMessagePdu {
        ShortMessagePdu {
            sequence_number,
            service_type: String::new(),
            source_addr_ton: 1,
            source_addr_npi: 1,
            source_addr: "100".into(),
            dest_addr_ton: 1,
            dest_addr_npi: 1,
            destination_addr: "200".into(),
            esm_class: 0,
            protocol_id: 0,
            priority_flag: 0,
            schedule_delivery_time: String::new(),
            validity_period: String::new(),
            registered_delivery: 1,
            replace_if_present_flag: 0,
            data_coding: 0,
            sm_default_msg_id: 0,
            short_message: Bytes::from_static(b"hi"),
        }
    }

    #[test]
    fn submit_sm_roundtrip_is_bit_identical() {
        let original = SubmitSm(sample_body(3));
        let bytes = original.to_bytes();

        let mut cursor = Cursor::new(bytes.as_ref());
        let decoded = match Frame::parse(&mut cursor).unwrap() {
            Frame::SubmitSm(pdu) => pdu,
            other => panic!("expected SubmitSm, got {other:?}"),
        };

        assert_eq!(*decoded, original);
        assert_eq!(decoded.to_bytes(), bytes);
    }

    #[test]
    fn deliver_sm_roundtrip() {
        let mut body = sample_body(9);
        body.esm_class = ESM_CLASS_DELIVERY_RECEIPT;
        body.short_message = Bytes::from_static(b"id:A1 stat:DELIVRD");
        let original = DeliverSm(body);

        let bytes = original.to_bytes();
        let mut cursor = Cursor::new(bytes.as_ref());
        match Frame::parse(&mut cursor).unwrap() {
            Frame::DeliverSm(decoded) => {
                assert!(decoded.is_delivery_receipt());
                assert_eq!(*decoded, original);
            }
            other => panic!("expected DeliverSm, got {other:?}"),
        }
    }

    #[test]
    fn deliver_sm_with_trailing_tlvs_decodes() {
        let original = DeliverSm(sample_body(4));
        let mut raw = BytesMut::from(original.to_bytes().as_ref());

        // Append a receipted_message_id TLV (tag 0x001E) and fix the length.
        raw.put_u16(0x001E);
        raw.put_u16(3);
        raw.put_slice(b"A1\0");
        let length = raw.len() as u32;
        raw[0..4].copy_from_slice(&length.to_be_bytes());

        let mut cursor = Cursor::new(raw.as_ref());
        match Frame::parse(&mut cursor).unwrap() {
            Frame::DeliverSm(decoded) => assert_eq!(*decoded, original),
            other => panic!("expected DeliverSm, got {other:?}"),
        }
    }

    #[test]
    fn submit_sm_resp_success_carries_message_id() {
        let resp = SubmitSmResponse::ok(5, "A1");
        let bytes = resp.to_bytes();
        assert_eq!(&bytes[16..], b"A1\0");

        let mut cursor = Cursor::new(bytes.as_ref());
        match Frame::parse(&mut cursor).unwrap() {
            Frame::SubmitSmResp(decoded) => assert_eq!(decoded, resp),
            other => panic!("expected SubmitSmResp, got {other:?}"),
        }
    }

    #[test]
    fn submit_sm_resp_error_is_header_only() {
        let resp = SubmitSmResponse::error(6, 0x08);
        let bytes = resp.to_bytes();
        assert_eq!(bytes.len(), 16);

        let mut cursor = Cursor::new(bytes.as_ref());
        match Frame::parse(&mut cursor).unwrap() {
            Frame::SubmitSmResp(decoded) => {
                assert_eq!(decoded.command_status, 0x08);
                assert_eq!(decoded.message_id, "");
            }
            other => panic!("expected SubmitSmResp, got {other:?}"),
        }
    }

    #[test]
    fn deliver_sm_resp_roundtrip() {
        let resp = DeliverSmResponse::ok(11);
        let bytes = resp.to_bytes();
        assert_eq!(bytes.len(), 17); // header + NULL message_id

        let mut cursor = Cursor::new(bytes.as_ref());
        match Frame::parse(&mut cursor).unwrap() {
            Frame::DeliverSmResp(decoded) => assert_eq!(decoded, resp),
            other => panic!("expected DeliverSmResp, got {other:?}"),
        }
    }
}
