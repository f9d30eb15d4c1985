// Local SMPP server: accepts ESME binds and submit_sm, forwarding accepted
// messages to the SMSC over HTTP egress.

use crate::config::{AuthCredential, ServerConfig};
use crate::connection::Connection;
use crate::egress::{EgressClient, SmsForward};
use crate::frame::Frame;
use crate::pdu::{
    BindKind, BindResponse, CommandStatus, EnquireLinkResponse, GenericNack, SubmitSm,
    SubmitSmResponse, UnbindResponse,
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Semaphore, TryAcquireError};
use tracing::{debug, info, warn};

/// system_id the server presents in bind responses.
pub const SERVER_SYSTEM_ID: &str = "SMPP-GATEWAY";

/// Bind status of one accepted connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ServerSessionState {
    Unbound,
    BoundTx,
    BoundRx,
    BoundTrx,
}

impl ServerSessionState {
    fn can_submit(self) -> bool {
        matches!(self, ServerSessionState::BoundTx | ServerSessionState::BoundTrx)
    }

    fn is_bound(self) -> bool {
        self != ServerSessionState::Unbound
    }

    fn for_bind(kind: BindKind) -> Self {
        match kind {
            BindKind::Transmitter => ServerSessionState::BoundTx,
            BindKind::Receiver => ServerSessionState::BoundRx,
            BindKind::Transceiver => ServerSessionState::BoundTrx,
        }
    }
}

pub struct SmppServer {
    auth: Vec<AuthCredential>,
    egress: Arc<EgressClient>,
    sessions: Arc<Semaphore>,
}

impl SmppServer {
    pub fn new(config: &ServerConfig, egress: Arc<EgressClient>) -> Self {
        SmppServer {
            auth: config.auth.clone(),
            egress,
            sessions: Arc::new(Semaphore::new(config.max_sessions)),
        }
    }

    /// Accept loop. Each connection gets its own task; the semaphore caps
    /// how many run at once.
    pub async fn run(
        self: Arc<Self>,
        listener: TcpListener,
        mut shutdown: watch::Receiver<bool>,
    ) {
        info!(address = ?listener.local_addr().ok(), "SMPP server listening");

        loop {
            let accepted = tokio::select! {
                result = listener.accept() => result,
                _ = shutdown.changed() => {
                    info!("SMPP server stopping");
                    return;
                }
            };

            match accepted {
                Ok((socket, addr)) => {
                    let server = Arc::clone(&self);
                    match Arc::clone(&self.sessions).try_acquire_owned() {
                        Ok(permit) => {
                            tokio::spawn(async move {
                                let _permit = permit;
                                server.process(socket, addr).await;
                            });
                        }
                        Err(TryAcquireError::NoPermits) => {
                            warn!(%addr, "refusing connection: session cap reached");
                        }
                        Err(TryAcquireError::Closed) => return,
                    }
                }
                Err(e) => warn!(error = %e, "accept failed"),
            }
        }
    }

    async fn process(&self, socket: TcpStream, addr: SocketAddr) {
        info!(%addr, "ESME connected");
        let closed_by_us = self.process_loop(Connection::new(socket), addr).await;
        match closed_by_us {
            Ok(true) => info!(%addr, "connection closed by us"),
            Ok(false) => info!(%addr, "connection closed by ESME"),
            Err(e) => warn!(%addr, error = %e, "connection closed on error"),
        }
    }

    async fn process_loop(
        &self,
        mut conn: Connection,
        addr: SocketAddr,
    ) -> Result<bool, crate::connection::ConnectionError> {
        let mut state = ServerSessionState::Unbound;
        let mut system_id: Option<String> = None;

        loop {
            let frame = match conn.read_frame().await? {
                Some(frame) => frame,
                None => return Ok(false),
            };

            match frame {
                Frame::Bind(bind) => {
                    if state.is_bound() {
                        // Re-binding an already bound session is a bind
                        // state violation, not a reason to drop it.
                        let nack = GenericNack::new(
                            bind.sequence_number,
                            CommandStatus::InvalidBindStatus as u32,
                        );
                        conn.write_frame(&Frame::GenericNack(nack)).await?;
                        continue;
                    }

                    if self.authenticate(&bind.system_id, &bind.password) {
                        let resp = BindResponse {
                            kind: bind.kind,
                            command_status: 0,
                            sequence_number: bind.sequence_number,
                            system_id: SERVER_SYSTEM_ID.to_owned(),
                        };
                        conn.write_frame(&Frame::BindResp(resp)).await?;
                        state = ServerSessionState::for_bind(bind.kind);
                        info!(%addr, system_id = %bind.system_id, state = ?state, "ESME bound");
                        system_id = Some(bind.system_id);
                    } else {
                        warn!(%addr, system_id = %bind.system_id, "bind authentication failed");
                        let resp = BindResponse {
                            kind: bind.kind,
                            command_status: CommandStatus::BindFailed as u32,
                            sequence_number: bind.sequence_number,
                            system_id: String::new(),
                        };
                        conn.write_frame(&Frame::BindResp(resp)).await?;
                        return Ok(true);
                    }
                }
                Frame::SubmitSm(submit) => {
                    if !state.can_submit() {
                        let nack = GenericNack::new(
                            submit.sequence_number,
                            CommandStatus::InvalidBindStatus as u32,
                        );
                        conn.write_frame(&Frame::GenericNack(nack)).await?;
                        continue;
                    }

                    let resp = self.handle_submit(&submit, system_id.as_deref(), addr).await;
                    conn.write_frame(&Frame::SubmitSmResp(resp)).await?;
                }
                Frame::EnquireLink(el) => {
                    let resp = EnquireLinkResponse {
                        sequence_number: el.sequence_number,
                    };
                    conn.write_frame(&Frame::EnquireLinkResp(resp)).await?;
                }
                Frame::Unbind(unbind) => {
                    let resp = UnbindResponse {
                        command_status: 0,
                        sequence_number: unbind.sequence_number,
                    };
                    conn.write_frame(&Frame::UnbindResp(resp)).await?;
                    return Ok(true);
                }
                Frame::Unknown { header, .. } => {
                    debug!(
                        %addr,
                        command_id = %format!("{:#010X}", header.command_id),
                        "unknown command_id from ESME"
                    );
                    let nack = GenericNack::new(
                        header.sequence_number,
                        CommandStatus::InvalidCommandId as u32,
                    );
                    conn.write_frame(&Frame::GenericNack(nack)).await?;
                }
                other => {
                    // Anything else (deliver_sm towards the server, stray
                    // responses) is invalid in every server session state.
                    debug!(%addr, frame = ?other, "PDU not allowed in this state");
                    let nack = GenericNack::new(
                        other.sequence_number(),
                        CommandStatus::InvalidBindStatus as u32,
                    );
                    conn.write_frame(&Frame::GenericNack(nack)).await?;
                }
            }
        }
    }

    fn authenticate(&self, system_id: &str, password: &str) -> bool {
        self.auth
            .iter()
            .any(|c| c.system_id == system_id && c.password == password)
    }

    async fn handle_submit(
        &self,
        submit: &SubmitSm,
        system_id: Option<&str>,
        addr: SocketAddr,
    ) -> SubmitSmResponse {
        debug!(
            %addr,
            system_id = system_id.unwrap_or(""),
            from = %submit.source_addr,
            to = %submit.destination_addr,
            "submit_sm from ESME"
        );

        match self.egress.forward(&SmsForward::from_pdu(submit)).await {
            Ok(()) => {
                let message_id = format!("msg-{}", unix_millis());
                SubmitSmResponse::ok(submit.sequence_number, message_id)
            }
            Err(e) => {
                warn!(%addr, error = %e, "egress failed for ESME submit_sm");
                SubmitSmResponse::error(
                    submit.sequence_number,
                    CommandStatus::SystemError as u32,
                )
            }
        }
    }
}

fn unix_millis() -> u128 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_millis())
        .unwrap_or(0)
}
