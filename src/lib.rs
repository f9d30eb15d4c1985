pub mod codec;
pub mod config;
pub mod connection;
pub mod egress;
pub mod frame;
pub mod ingress;
pub mod pdu;
pub mod peer;
pub mod server;

pub use codec::{CodecError, Encodable, PduHeader, MAX_PDU_SIZE};
pub use config::{ConfigError, GatewayConfig};
pub use connection::{Connection, ConnectionError};
pub use egress::{EgressClient, EgressError, SmsForward};
pub use frame::Frame;
pub use peer::{PeerHandle, PeerPool, Router, SessionError, SessionState};
pub use server::{SmppServer, SERVER_SYSTEM_ID};
