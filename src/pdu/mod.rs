mod bind;
mod command;
mod link;
mod message;

pub use bind::{Bind, BindKind, BindResponse, INTERFACE_VERSION_34};
pub use command::{describe_status, CommandId, CommandStatus};
pub use link::{EnquireLink, EnquireLinkResponse, GenericNack, Unbind, UnbindResponse};
pub use message::{
    DeliverSm, DeliverSmResponse, ShortMessagePdu, SubmitSm, SubmitSmResponse,
    ESM_CLASS_DELIVERY_RECEIPT,
};

// SMPP v3.4 field width limits, terminator included (Section 5.2).
pub(crate) const MAX_SYSTEM_ID_LEN: usize = 16;
pub(crate) const MAX_PASSWORD_LEN: usize = 9;
pub(crate) const MAX_SYSTEM_TYPE_LEN: usize = 13;
pub(crate) const MAX_ADDRESS_RANGE_LEN: usize = 41;
pub(crate) const MAX_SERVICE_TYPE_LEN: usize = 6;
pub(crate) const MAX_ADDR_LEN: usize = 21;
pub(crate) const MAX_DATETIME_LEN: usize = 17;
pub(crate) const MAX_MESSAGE_ID_LEN: usize = 65;

/// Longest short_message payload carried in the mandatory body.
pub const MAX_SHORT_MESSAGE_LEN: usize = 254;
