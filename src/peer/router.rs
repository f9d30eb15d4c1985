// Destination-based peer selection.
//
// Peers are tried in configuration order: the first BOUND peer whose
// compiled route_regex matches the destination wins; with no regex match,
// a BOUND default peer is used; otherwise there is no route.

use crate::peer::pool::PeerPool;
use crate::peer::session::PeerHandle;
use std::sync::Arc;
use tracing::debug;

#[derive(Clone)]
pub struct Router {
    pool: Arc<PeerPool>,
}

impl Router {
    pub fn new(pool: Arc<PeerPool>) -> Self {
        Router { pool }
    }

    /// Select a bound peer for the destination address, or `None` when no
    /// bound peer routes it.
    pub fn route(&self, destination: &str) -> Option<&PeerHandle> {
        for peer in self.pool.iter() {
            if !peer.is_bound() {
                continue;
            }
            if let Some(re) = &peer.config().route {
                if re.is_match(destination) {
                    debug!(peer = %peer.id(), destination, "routed by regex");
                    return Some(peer);
                }
            }
        }

        let fallback = self
            .pool
            .iter()
            .find(|p| p.config().is_default && p.is_bound());
        if let Some(peer) = &fallback {
            debug!(peer = %peer.id(), destination, "routed to default peer");
        }
        fallback
    }
}
