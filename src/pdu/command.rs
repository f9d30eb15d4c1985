// SMPP v3.4 command_id and command_status values used by the gateway.

use num_enum::TryFromPrimitive;

/// Command identifiers for the PDU set the gateway speaks (SMPP v3.4
/// Table 4-1). Bit 31 marks a response.
#[derive(TryFromPrimitive)]
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum CommandId {
    GenericNack = 0x8000_0000,
    BindReceiver = 0x0000_0001,
    BindReceiverResp = 0x8000_0001,
    BindTransmitter = 0x0000_0002,
    BindTransmitterResp = 0x8000_0002,
    SubmitSm = 0x0000_0004,
    SubmitSmResp = 0x8000_0004,
    DeliverSm = 0x0000_0005,
    DeliverSmResp = 0x8000_0005,
    Unbind = 0x0000_0006,
    UnbindResp = 0x8000_0006,
    BindTransceiver = 0x0000_0009,
    BindTransceiverResp = 0x8000_0009,
    EnquireLink = 0x0000_0015,
    EnquireLinkResp = 0x8000_0015,
}

/// The command_status values the gateway generates itself. Statuses
/// received from remote peers are carried as raw `u32` and may fall
/// outside this set.
#[repr(u32)]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum CommandStatus {
    Ok = 0x0000_0000,
    /// ESME_RINVCMDLEN
    InvalidCommandLength = 0x0000_0002,
    /// ESME_RINVCMDID
    InvalidCommandId = 0x0000_0003,
    /// ESME_RINVBNDSTS: PDU not allowed in the current bind state
    InvalidBindStatus = 0x0000_0004,
    /// ESME_RSYSERR
    SystemError = 0x0000_0008,
    /// ESME_RBINDFAIL
    BindFailed = 0x0000_000D,
    /// ESME_RINVPASWD
    InvalidPassword = 0x0000_000E,
}

/// Human-readable name for a status code, for log output. Covers the
/// codes the gateway cares to distinguish; everything else is rendered
/// numerically by the caller.
pub fn describe_status(status: u32) -> &'static str {
    match status {
        0x0000_0000 => "ESME_ROK",
        0x0000_0002 => "ESME_RINVCMDLEN (invalid command length)",
        0x0000_0003 => "ESME_RINVCMDID (invalid command id)",
        0x0000_0004 => "ESME_RINVBNDSTS (incorrect bind status)",
        0x0000_0005 => "ESME_RALYBND (already bound)",
        0x0000_0008 => "ESME_RSYSERR (system error)",
        0x0000_000D => "ESME_RBINDFAIL (bind failed)",
        0x0000_000E => "ESME_RINVPASWD (invalid password)",
        0x0000_000F => "ESME_RINVSYSID (invalid system id)",
        _ => "unrecognized status",
    }
}
