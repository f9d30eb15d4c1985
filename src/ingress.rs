// HTTP ingress: the send_sms endpoint the SMSC control plane calls to
// push an MT message towards an SMPP peer, plus a health view of the pool.

use crate::pdu::{ShortMessagePdu, SubmitSm, MAX_SHORT_MESSAGE_LEN};
use crate::peer::{PeerPool, Router, SessionError};
use axum::extract::{Query, State};
use axum::http::StatusCode;
use axum::routing::get;
use axum::Json;
use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

const DEFAULT_WAIT_FOR_PEER: Duration = Duration::from_secs(15);

pub struct AppState {
    pub pool: Arc<PeerPool>,
    pub router: Router,
    /// How long send_sms waits for any peer to come BOUND before giving up.
    pub wait_for_peer: Duration,
}

impl AppState {
    pub fn new(pool: Arc<PeerPool>, router: Router) -> Self {
        AppState {
            pool,
            router,
            wait_for_peer: DEFAULT_WAIT_FOR_PEER,
        }
    }
}

/// Build the ingress application.
pub fn app(state: Arc<AppState>) -> axum::Router {
    axum::Router::new()
        .route("/send_sms", get(send_sms))
        .route("/health", get(health))
        .with_state(state)
}

#[derive(Debug, Deserialize)]
struct SendSmsParams {
    from: Option<String>,
    to: Option<String>,
    text: Option<String>,
    dcs: Option<u8>,
}

async fn send_sms(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SendSmsParams>,
) -> (StatusCode, String) {
    let mut missing = Vec::new();
    if params.from.is_none() {
        missing.push("from");
    }
    if params.to.is_none() {
        missing.push("to");
    }
    if params.text.is_none() {
        missing.push("text");
    }
    if !missing.is_empty() {
        return (
            StatusCode::BAD_REQUEST,
            format!("Error: missing parameter(s): {}", missing.join(", ")),
        );
    }

    let from = params.from.unwrap_or_default();
    let to = params.to.unwrap_or_default();
    let text = params.text.unwrap_or_default();
    let dcs = params.dcs.unwrap_or(0);

    if text.len() > MAX_SHORT_MESSAGE_LEN {
        return (
            StatusCode::BAD_REQUEST,
            format!("Error: text exceeds {MAX_SHORT_MESSAGE_LEN} octets"),
        );
    }

    if !state.pool.wait_for_any_bound(state.wait_for_peer).await {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            "No SMPP peer available".to_owned(),
        );
    }

    let Some(peer) = state.router.route(&to) else {
        return (
            StatusCode::SERVICE_UNAVAILABLE,
            "No SMPP peer available".to_owned(),
        );
    };

    let peer_config = peer.config();
    let submit = SubmitSm(ShortMessagePdu {
        // Assigned by the session when the PDU is written.
        sequence_number: 0,
        service_type: String::new(),
        source_addr_ton: peer_config.source_addr_ton,
        source_addr_npi: peer_config.source_addr_npi,
        source_addr: from.clone(),
        dest_addr_ton: peer_config.dest_addr_ton,
        dest_addr_npi: peer_config.dest_addr_npi,
        destination_addr: to.clone(),
        esm_class: 0,
        protocol_id: 0,
        priority_flag: 0,
        schedule_delivery_time: String::new(),
        validity_period: String::new(),
        // Request a delivery receipt for every MT message.
        registered_delivery: 1,
        replace_if_present_flag: 0,
        data_coding: dcs,
        sm_default_msg_id: 0,
        short_message: Bytes::from(text.into_bytes()),
    });

    match peer.submit(submit).await {
        Ok(resp) if resp.command_status == 0 => {
            info!(peer = %peer.id(), to = %to, message_id = %resp.message_id, "MT submitted");
            (
                StatusCode::OK,
                format!("OK - message_id={}", resp.message_id),
            )
        }
        Ok(resp) => {
            warn!(peer = %peer.id(), to = %to, status = resp.command_status, "submit_sm rejected");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                format!("Error: SMPP submit_sm failed ({})", resp.command_status),
            )
        }
        Err(SessionError::ResponseTimeout) => (
            StatusCode::GATEWAY_TIMEOUT,
            "Error: SMPP submit_sm timed out".to_owned(),
        ),
        Err(e) => {
            warn!(peer = %peer.id(), to = %to, error = %e, "submit_sm failed");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "No SMPP peer available".to_owned(),
            )
        }
    }
}

#[derive(Debug, Serialize)]
struct PeerStatus {
    id: String,
    state: &'static str,
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Vec<PeerStatus>> {
    let peers = state
        .pool
        .iter()
        .map(|p| PeerStatus {
            id: p.id().to_owned(),
            state: p.state().name(),
        })
        .collect();
    Json(peers)
}
