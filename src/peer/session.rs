// Client session to one upstream SMPP peer.
//
// Each peer is driven by a single task owning the TCP connection: it runs
// the connect → bind_transceiver → bound loop lifecycle, correlates
// responses by sequence number, keeps the link alive with enquire_link and
// reconnects on a fixed interval after any loss. Submissions arrive over an
// mpsc channel; deliver_sm handling runs concurrently and funnels its acks
// back through the task so write order on the socket is preserved.

use crate::config::PeerConfig;
use crate::connection::Connection;
use crate::egress::EgressClient;
use crate::frame::Frame;
use crate::pdu::{
    describe_status, Bind, CommandStatus, DeliverSmResponse, EnquireLink, EnquireLinkResponse,
    GenericNack, SubmitSm, SubmitSmResponse, Unbind, UnbindResponse,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::TcpStream;
use tokio::sync::{mpsc, oneshot, watch};
use tokio::time::{self, Instant};
use tracing::{debug, info, warn};

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);

/// Largest sequence number issued (2^31-1); the counter wraps back to 1
/// past it and never yields 0.
const MAX_SEQUENCE: u32 = 0x7FFF_FFFF;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Disconnected,
    Connecting,
    Binding,
    Bound,
    Closing,
}

impl SessionState {
    pub fn name(self) -> &'static str {
        match self {
            SessionState::Disconnected => "DISCONNECTED",
            SessionState::Connecting => "CONNECTING",
            SessionState::Binding => "BINDING",
            SessionState::Bound => "BOUND",
            SessionState::Closing => "CLOSING",
        }
    }
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("peer did not answer within the response timeout")]
    ResponseTimeout,

    #[error("peer session is not bound")]
    NotBound,

    #[error("peer connection closed while the request was in flight")]
    ConnectionClosed,
}

/// Handle to a running peer session, shared by pool, router and ingress.
#[derive(Clone)]
pub struct PeerHandle {
    config: Arc<PeerConfig>,
    cmd_tx: mpsc::Sender<SubmitRequest>,
    state_rx: watch::Receiver<SessionState>,
}

impl PeerHandle {
    pub fn id(&self) -> &str {
        &self.config.id
    }

    pub fn config(&self) -> &PeerConfig {
        &self.config
    }

    pub fn state(&self) -> SessionState {
        *self.state_rx.borrow()
    }

    pub fn is_bound(&self) -> bool {
        self.state() == SessionState::Bound
    }

    /// Submit a message on this session and wait for the correlated
    /// submit_sm_resp. The session assigns the sequence number.
    pub async fn submit(&self, pdu: SubmitSm) -> Result<SubmitSmResponse, SessionError> {
        if !self.is_bound() {
            return Err(SessionError::NotBound);
        }

        let (reply_tx, reply_rx) = oneshot::channel();
        self.cmd_tx
            .send(SubmitRequest { pdu, reply: reply_tx })
            .await
            .map_err(|_| SessionError::NotBound)?;

        reply_rx.await.map_err(|_| SessionError::ConnectionClosed)?
    }
}

struct SubmitRequest {
    pdu: SubmitSm,
    reply: oneshot::Sender<Result<SubmitSmResponse, SessionError>>,
}

/// Spawn the session task for one configured peer and return its handle.
pub fn spawn(
    config: PeerConfig,
    egress: Arc<EgressClient>,
    shutdown: watch::Receiver<bool>,
) -> PeerHandle {
    let config = Arc::new(config);
    let (state_tx, state_rx) = watch::channel(SessionState::Disconnected);
    let (cmd_tx, cmd_rx) = mpsc::channel(32);

    tokio::spawn(run_session(
        Arc::clone(&config),
        egress,
        state_tx,
        cmd_rx,
        shutdown,
    ));

    PeerHandle {
        config,
        cmd_tx,
        state_rx,
    }
}

async fn run_session(
    config: Arc<PeerConfig>,
    egress: Arc<EgressClient>,
    state_tx: watch::Sender<SessionState>,
    mut cmd_rx: mpsc::Receiver<SubmitRequest>,
    mut shutdown: watch::Receiver<bool>,
) {
    while !*shutdown.borrow() {
        state_tx.send_replace(SessionState::Connecting);
        debug!(peer = %config.id, address = %config.address(), "connecting");

        let connected = tokio::select! {
            result = time::timeout(CONNECT_TIMEOUT, TcpStream::connect(config.address())) => result,
            _ = shutdown.changed() => break,
        };

        match connected {
            Ok(Ok(stream)) => {
                let mut conn = Connection::new(stream);
                let mut sequence = Sequence::default();

                state_tx.send_replace(SessionState::Binding);
                match bind_transceiver(&mut conn, &config, &mut sequence).await {
                    Ok(system_id) => {
                        state_tx.send_replace(SessionState::Bound);
                        info!(peer = %config.id, remote_system_id = %system_id, "bound as transceiver");

                        let exit = bound_loop(
                            &mut conn,
                            &config,
                            &egress,
                            &mut sequence,
                            &mut cmd_rx,
                            &mut shutdown,
                        )
                        .await;
                        info!(peer = %config.id, reason = exit.reason(), "session ended");

                        if matches!(exit, BoundExit::Shutdown) {
                            break;
                        }
                    }
                    Err(e) => warn!(peer = %config.id, error = %e, "bind failed"),
                }
            }
            Ok(Err(e)) => warn!(peer = %config.id, error = %e, "connect failed"),
            Err(_) => warn!(peer = %config.id, "connect timed out"),
        }

        if *shutdown.borrow() {
            break;
        }

        state_tx.send_replace(SessionState::Disconnected);
        debug!(peer = %config.id, delay_ms = config.reconnect_interval, "reconnect scheduled");

        // Sleep out the reconnect interval, rejecting submissions that
        // arrive while the peer is down.
        let reconnect_at = Instant::now() + config.reconnect_interval();
        loop {
            tokio::select! {
                _ = time::sleep_until(reconnect_at) => break,
                _ = shutdown.changed() => break,
                Some(request) = cmd_rx.recv() => {
                    let _ = request.reply.send(Err(SessionError::NotBound));
                }
            }
            if *shutdown.borrow() {
                break;
            }
        }
    }

    state_tx.send_replace(SessionState::Closing);
    debug!(peer = %config.id, "session task stopped");
}

#[derive(Debug, Error)]
enum BindError {
    #[error("transport: {0}")]
    Transport(#[from] crate::connection::ConnectionError),

    #[error("write: {0}")]
    Write(#[from] std::io::Error),

    #[error("peer rejected bind: status {status:#010X} {}", describe_status(*status))]
    Rejected { status: u32 },

    #[error("no bind response within the response timeout")]
    Timeout,

    #[error("connection closed during bind")]
    Closed,
}

/// Issue the bind_transceiver and wait for its response. Frames other than
/// the awaited bind response are tolerated (a peer may probe with
/// enquire_link before answering the bind).
async fn bind_transceiver(
    conn: &mut Connection,
    config: &PeerConfig,
    sequence: &mut Sequence,
) -> Result<String, BindError> {
    let bind_seq = sequence.next();
    let bind = Bind::transceiver(
        bind_seq,
        &config.system_id,
        &config.password,
        &config.system_type,
    );
    conn.write_frame(&Frame::Bind(bind)).await?;

    let deadline = Instant::now() + config.response_timeout();
    loop {
        let frame = tokio::select! {
            result = conn.read_frame() => result?,
            _ = time::sleep_until(deadline) => return Err(BindError::Timeout),
        };

        match frame {
            Some(Frame::BindResp(resp)) if resp.sequence_number == bind_seq => {
                if resp.command_status == 0 {
                    return Ok(resp.system_id);
                }
                return Err(BindError::Rejected {
                    status: resp.command_status,
                });
            }
            Some(Frame::EnquireLink(el)) => {
                conn.write_frame(&Frame::EnquireLinkResp(EnquireLinkResponse {
                    sequence_number: el.sequence_number,
                }))
                .await?;
            }
            Some(other) => {
                debug!(peer = %config.id, frame = ?other, "ignoring frame while binding");
            }
            None => return Err(BindError::Closed),
        }
    }
}

enum BoundExit {
    PeerClosed,
    TransportError,
    KeepaliveTimeout,
    UnbindRequested,
    Shutdown,
}

impl BoundExit {
    fn reason(&self) -> &'static str {
        match self {
            BoundExit::PeerClosed => "peer closed the connection",
            BoundExit::TransportError => "transport error",
            BoundExit::KeepaliveTimeout => "enquire_link went unanswered",
            BoundExit::UnbindRequested => "peer requested unbind",
            BoundExit::Shutdown => "shutdown",
        }
    }
}

enum PendingKind {
    Submit(oneshot::Sender<Result<SubmitSmResponse, SessionError>>),
    EnquireLink,
}

struct PendingResponse {
    kind: PendingKind,
    deadline: Instant,
}

enum Event {
    Frame(Option<Frame>),
    ReadError(crate::connection::ConnectionError),
    Command(SubmitRequest),
    Ack(Frame),
    Timer,
    Shutdown,
}

async fn bound_loop(
    conn: &mut Connection,
    config: &PeerConfig,
    egress: &Arc<EgressClient>,
    sequence: &mut Sequence,
    cmd_rx: &mut mpsc::Receiver<SubmitRequest>,
    shutdown: &mut watch::Receiver<bool>,
) -> BoundExit {
    let mut pending: HashMap<u32, PendingResponse> = HashMap::new();
    let mut last_tx = Instant::now();
    // Acks produced by concurrent deliver_sm handling; funnelled through
    // this loop so they join the connection's single write order.
    let (ack_tx, mut ack_rx) = mpsc::unbounded_channel::<Frame>();

    loop {
        let enquire_at = last_tx + config.enquire_link_interval();
        let wake = pending
            .values()
            .map(|p| p.deadline)
            .min()
            .map_or(enquire_at, |d| d.min(enquire_at));

        let event = tokio::select! {
            result = conn.read_frame() => match result {
                Ok(frame) => Event::Frame(frame),
                Err(e) => Event::ReadError(e),
            },
            Some(request) = cmd_rx.recv() => Event::Command(request),
            Some(frame) = ack_rx.recv() => Event::Ack(frame),
            _ = time::sleep_until(wake) => Event::Timer,
            _ = shutdown.changed() => Event::Shutdown,
        };

        match event {
            Event::Frame(Some(frame)) => match frame {
                Frame::EnquireLink(el) => {
                    let resp = Frame::EnquireLinkResp(EnquireLinkResponse {
                        sequence_number: el.sequence_number,
                    });
                    if conn.write_frame(&resp).await.is_err() {
                        fail_pending(&mut pending);
                        return BoundExit::TransportError;
                    }
                    last_tx = Instant::now();
                }
                Frame::DeliverSm(pdu) => {
                    // Ack only after egress returns; egress failure is
                    // logged, never propagated to the peer.
                    let egress = Arc::clone(egress);
                    let ack_tx = ack_tx.clone();
                    let peer_id = config.id.clone();
                    tokio::spawn(async move {
                        let sequence_number = pdu.sequence_number;
                        if let Err(e) = egress.forward_deliver(&pdu).await {
                            warn!(
                                peer = %peer_id,
                                sequence_number,
                                error = %e,
                                "egress failed; acking deliver_sm anyway"
                            );
                        }
                        let _ = ack_tx.send(Frame::DeliverSmResp(DeliverSmResponse::ok(
                            sequence_number,
                        )));
                    });
                }
                Frame::SubmitSmResp(resp) => {
                    match pending.remove(&resp.sequence_number) {
                        Some(PendingResponse {
                            kind: PendingKind::Submit(reply),
                            ..
                        }) => {
                            let _ = reply.send(Ok(resp));
                        }
                        Some(other) => {
                            pending.insert(resp.sequence_number, other);
                            warn!(peer = %config.id, sequence_number = resp.sequence_number, "submit_sm_resp for a non-submit request");
                        }
                        None => {
                            warn!(peer = %config.id, sequence_number = resp.sequence_number, "unmatched submit_sm_resp");
                        }
                    }
                }
                Frame::EnquireLinkResp(resp) => {
                    if pending.remove(&resp.sequence_number).is_none() {
                        debug!(peer = %config.id, sequence_number = resp.sequence_number, "unmatched enquire_link_resp");
                    }
                }
                Frame::GenericNack(nack) => {
                    // A nack correlates like a response to whatever request
                    // carried that sequence number.
                    match pending.remove(&nack.sequence_number) {
                        Some(PendingResponse {
                            kind: PendingKind::Submit(reply),
                            ..
                        }) => {
                            let _ = reply.send(Ok(SubmitSmResponse::error(
                                nack.sequence_number,
                                nack.command_status,
                            )));
                        }
                        Some(_) | None => {
                            warn!(peer = %config.id, status = nack.command_status, "generic_nack from peer");
                        }
                    }
                }
                Frame::Unbind(unbind) => {
                    let resp = Frame::UnbindResp(UnbindResponse {
                        command_status: 0,
                        sequence_number: unbind.sequence_number,
                    });
                    let _ = conn.write_frame(&resp).await;
                    fail_pending(&mut pending);
                    return BoundExit::UnbindRequested;
                }
                Frame::Unknown { header, .. } => {
                    debug!(
                        peer = %config.id,
                        command_id = %format!("{:#010X}", header.command_id),
                        "unknown command_id; answering generic_nack"
                    );
                    let nack = Frame::GenericNack(GenericNack::new(
                        header.sequence_number,
                        CommandStatus::InvalidCommandId as u32,
                    ));
                    if conn.write_frame(&nack).await.is_err() {
                        fail_pending(&mut pending);
                        return BoundExit::TransportError;
                    }
                    last_tx = Instant::now();
                }
                other => {
                    debug!(peer = %config.id, frame = ?other, "unexpected frame in bound state");
                }
            },
            Event::Frame(None) => {
                fail_pending(&mut pending);
                return BoundExit::PeerClosed;
            }
            Event::ReadError(e) => {
                warn!(peer = %config.id, error = %e, "read failed");
                fail_pending(&mut pending);
                return BoundExit::TransportError;
            }
            Event::Command(SubmitRequest { mut pdu, reply }) => {
                let seq = sequence.next();
                pdu.0.sequence_number = seq;

                if conn.write_frame(&Frame::SubmitSm(Box::new(pdu))).await.is_err() {
                    let _ = reply.send(Err(SessionError::ConnectionClosed));
                    fail_pending(&mut pending);
                    return BoundExit::TransportError;
                }
                last_tx = Instant::now();

                pending.insert(
                    seq,
                    PendingResponse {
                        kind: PendingKind::Submit(reply),
                        deadline: Instant::now() + config.response_timeout(),
                    },
                );
            }
            Event::Ack(frame) => {
                if conn.write_frame(&frame).await.is_err() {
                    fail_pending(&mut pending);
                    return BoundExit::TransportError;
                }
                last_tx = Instant::now();
            }
            Event::Timer => {
                let now = Instant::now();

                let expired: Vec<u32> = pending
                    .iter()
                    .filter(|(_, p)| p.deadline <= now)
                    .map(|(&seq, _)| seq)
                    .collect();
                for seq in expired {
                    match pending.remove(&seq) {
                        Some(PendingResponse {
                            kind: PendingKind::Submit(reply),
                            ..
                        }) => {
                            warn!(peer = %config.id, sequence_number = seq, "submit_sm response timed out");
                            let _ = reply.send(Err(SessionError::ResponseTimeout));
                        }
                        Some(PendingResponse {
                            kind: PendingKind::EnquireLink,
                            ..
                        }) => {
                            fail_pending(&mut pending);
                            return BoundExit::KeepaliveTimeout;
                        }
                        None => {}
                    }
                }

                if now >= last_tx + config.enquire_link_interval() {
                    let seq = sequence.next();
                    let enquire = Frame::EnquireLink(EnquireLink { sequence_number: seq });
                    if conn.write_frame(&enquire).await.is_err() {
                        fail_pending(&mut pending);
                        return BoundExit::TransportError;
                    }
                    last_tx = Instant::now();
                    pending.insert(
                        seq,
                        PendingResponse {
                            kind: PendingKind::EnquireLink,
                            deadline: Instant::now() + config.response_timeout(),
                        },
                    );
                }
            }
            Event::Shutdown => {
                let unbind = Frame::Unbind(Unbind {
                    sequence_number: sequence.next(),
                });
                let _ = conn.write_frame(&unbind).await;
                fail_pending(&mut pending);
                return BoundExit::Shutdown;
            }
        }
    }
}

fn fail_pending(pending: &mut HashMap<u32, PendingResponse>) {
    for (_, entry) in pending.drain() {
        if let PendingKind::Submit(reply) = entry.kind {
            let _ = reply.send(Err(SessionError::ConnectionClosed));
        }
    }
}

/// Monotonic sequence counter, wrapping to 1 past 2^31-1 and never 0.
#[derive(Debug, Default)]
struct Sequence(u32);

impl Sequence {
    fn next(&mut self) -> u32 {
        if self.0 >= MAX_SEQUENCE {
            self.0 = 1;
        } else {
            self.0 += 1;
        }
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sequence_starts_at_one() {
        let mut seq = Sequence::default();
        assert_eq!(seq.next(), 1);
        assert_eq!(seq.next(), 2);
    }

    #[test]
    fn sequence_wraps_past_max_to_one() {
        let mut seq = Sequence(MAX_SEQUENCE - 1);
        assert_eq!(seq.next(), MAX_SEQUENCE);
        assert_eq!(seq.next(), 1);
        assert_eq!(seq.next(), 2);
    }

    #[test]
    fn sequence_never_yields_zero() {
        let mut seq = Sequence(MAX_SEQUENCE);
        assert_eq!(seq.next(), 1);
    }
}
