mod pool;
mod router;
mod session;

pub use pool::PeerPool;
pub use router::Router;
pub use session::{spawn, PeerHandle, SessionError, SessionState};
