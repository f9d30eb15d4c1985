//! A type representing one SMPP PDU on the wire, plus the check/parse
//! utilities the connection layer uses to cut frames out of a byte stream.

use crate::codec::{CodecError, Encodable, PduHeader};
use crate::pdu::{
    Bind, BindKind, BindResponse, CommandId, DeliverSm, DeliverSmResponse, EnquireLink,
    EnquireLinkResponse, GenericNack, SubmitSm, SubmitSmResponse, Unbind, UnbindResponse,
};
use bytes::{Buf, Bytes, BytesMut};
use std::io::Cursor;

#[derive(Clone, Debug)]
pub enum Frame {
    Bind(Bind),
    BindResp(BindResponse),
    SubmitSm(Box<SubmitSm>),
    SubmitSmResp(SubmitSmResponse),
    DeliverSm(Box<DeliverSm>),
    DeliverSmResp(DeliverSmResponse),
    EnquireLink(EnquireLink),
    EnquireLinkResp(EnquireLinkResponse),
    Unbind(Unbind),
    UnbindResp(UnbindResponse),
    GenericNack(GenericNack),
    /// A command_id the gateway does not implement. Preserved so ingress
    /// can answer generic_nack with the original sequence number.
    Unknown { header: PduHeader, body: Bytes },
}

impl Frame {
    /// Checks whether a complete PDU is buffered in `src`, returning its
    /// command_length. Fails fast on lengths outside the accepted range so
    /// a malformed header never stalls the read loop waiting for bytes
    /// that will not come.
    pub fn check(src: &mut Cursor<&[u8]>) -> Result<usize, CodecError> {
        if src.remaining() < 4 {
            return Err(CodecError::Incomplete);
        }

        let pos = src.position();
        let command_length = src.get_u32();
        src.set_position(pos);

        if command_length < PduHeader::SIZE as u32 || command_length > crate::codec::MAX_PDU_SIZE {
            return Err(CodecError::InvalidPduLength {
                length: command_length,
            });
        }

        if src.remaining() < command_length as usize {
            return Err(CodecError::Incomplete);
        }

        Ok(command_length as usize)
    }

    /// Parse one PDU from a cursor holding exactly the frame's bytes
    /// (`check` has validated the length).
    pub fn parse(src: &mut Cursor<&[u8]>) -> Result<Frame, CodecError> {
        let header = PduHeader::decode(src)?;

        let Ok(command_id) = CommandId::try_from(header.command_id) else {
            let body_len = header.command_length as usize - PduHeader::SIZE;
            let body = crate::codec::get_octets(src, body_len, "body")?;
            return Ok(Frame::Unknown { header, body });
        };

        let frame = match command_id {
            CommandId::BindTransmitter => {
                Frame::Bind(Bind::decode(BindKind::Transmitter, &header, src)?)
            }
            CommandId::BindReceiver => {
                Frame::Bind(Bind::decode(BindKind::Receiver, &header, src)?)
            }
            CommandId::BindTransceiver => {
                Frame::Bind(Bind::decode(BindKind::Transceiver, &header, src)?)
            }
            CommandId::BindTransmitterResp => {
                Frame::BindResp(BindResponse::decode(BindKind::Transmitter, &header, src)?)
            }
            CommandId::BindReceiverResp => {
                Frame::BindResp(BindResponse::decode(BindKind::Receiver, &header, src)?)
            }
            CommandId::BindTransceiverResp => {
                Frame::BindResp(BindResponse::decode(BindKind::Transceiver, &header, src)?)
            }
            CommandId::SubmitSm => Frame::SubmitSm(Box::new(SubmitSm::decode(&header, src)?)),
            CommandId::SubmitSmResp => Frame::SubmitSmResp(SubmitSmResponse::decode(&header, src)?),
            CommandId::DeliverSm => Frame::DeliverSm(Box::new(DeliverSm::decode(&header, src)?)),
            CommandId::DeliverSmResp => {
                Frame::DeliverSmResp(DeliverSmResponse::decode(&header, src)?)
            }
            CommandId::EnquireLink => Frame::EnquireLink(EnquireLink::decode(&header, src)?),
            CommandId::EnquireLinkResp => {
                Frame::EnquireLinkResp(EnquireLinkResponse::decode(&header, src)?)
            }
            CommandId::Unbind => Frame::Unbind(Unbind::decode(&header, src)?),
            CommandId::UnbindResp => Frame::UnbindResp(UnbindResponse::decode(&header, src)?),
            CommandId::GenericNack => Frame::GenericNack(GenericNack::decode(&header, src)?),
        };

        Ok(frame)
    }

    pub fn sequence_number(&self) -> u32 {
        match self {
            Frame::Bind(pdu) => pdu.sequence_number,
            Frame::BindResp(pdu) => pdu.sequence_number,
            Frame::SubmitSm(pdu) => pdu.sequence_number,
            Frame::SubmitSmResp(pdu) => pdu.sequence_number,
            Frame::DeliverSm(pdu) => pdu.sequence_number,
            Frame::DeliverSmResp(pdu) => pdu.sequence_number,
            Frame::EnquireLink(pdu) => pdu.sequence_number,
            Frame::EnquireLinkResp(pdu) => pdu.sequence_number,
            Frame::Unbind(pdu) => pdu.sequence_number,
            Frame::UnbindResp(pdu) => pdu.sequence_number,
            Frame::GenericNack(pdu) => pdu.sequence_number,
            Frame::Unknown { header, .. } => header.sequence_number,
        }
    }

    /// Serialize for the wire. `Unknown` frames are re-emitted verbatim.
    pub fn to_bytes(&self) -> Bytes {
        match self {
            Frame::Bind(pdu) => pdu.to_bytes(),
            Frame::BindResp(pdu) => pdu.to_bytes(),
            Frame::SubmitSm(pdu) => pdu.to_bytes(),
            Frame::SubmitSmResp(pdu) => pdu.to_bytes(),
            Frame::DeliverSm(pdu) => pdu.to_bytes(),
            Frame::DeliverSmResp(pdu) => pdu.to_bytes(),
            Frame::EnquireLink(pdu) => pdu.to_bytes(),
            Frame::EnquireLinkResp(pdu) => pdu.to_bytes(),
            Frame::Unbind(pdu) => pdu.to_bytes(),
            Frame::UnbindResp(pdu) => pdu.to_bytes(),
            Frame::GenericNack(pdu) => pdu.to_bytes(),
            Frame::Unknown { header, body } => {
                let mut buf = BytesMut::with_capacity(PduHeader::SIZE + body.len());
                header.encode(&mut buf);
                buf.extend_from_slice(body);
                buf.freeze()
            }
        }
    }
}
