// Shared harness for the loopback integration tests: a scriptable SMPP
// peer, a scriptable HTTP SMSC endpoint and helpers to wire gateway
// components together on ephemeral ports.

#![allow(dead_code)]

use axum::extract::RawQuery;
use axum::http::StatusCode;
use axum::routing::get;
use smpp_gateway::config::PeerConfig;
use smpp_gateway::frame::Frame;
use smpp_gateway::ingress::{self, AppState};
use smpp_gateway::pdu::{
    BindResponse, DeliverSm, EnquireLinkResponse, ShortMessagePdu, SubmitSmResponse,
};
use smpp_gateway::peer::{PeerHandle, PeerPool, Router};
use smpp_gateway::Connection;
use std::collections::VecDeque;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::net::TcpListener;
use tokio::sync::mpsc;
use tokio::time::{sleep, timeout, Instant};

/// Behaviour switches for a scripted SMPP peer.
pub struct StubPeerOptions {
    pub accept_bind: bool,
    pub respond_to_submit: bool,
    pub submit_status: u32,
    pub message_id: String,
}

impl Default for StubPeerOptions {
    fn default() -> Self {
        StubPeerOptions {
            accept_bind: true,
            respond_to_submit: true,
            submit_status: 0,
            message_id: "A1".to_owned(),
        }
    }
}

/// A loopback SMSC stub the gateway's client sessions connect to. Every
/// frame it reads is echoed on `events`; frames pushed into `inject` are
/// written to the currently connected gateway session.
pub struct StubPeer {
    pub addr: SocketAddr,
    pub events: mpsc::UnboundedReceiver<Frame>,
    pub inject: mpsc::UnboundedSender<Frame>,
}

impl StubPeer {
    pub async fn start(options: StubPeerOptions) -> StubPeer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (event_tx, events) = mpsc::unbounded_channel();
        let (inject, mut inject_rx) = mpsc::unbounded_channel::<Frame>();

        tokio::spawn(async move {
            loop {
                let Ok((socket, _)) = listener.accept().await else {
                    return;
                };
                let mut conn = Connection::new(socket);

                loop {
                    tokio::select! {
                        result = conn.read_frame() => {
                            let frame = match result {
                                Ok(Some(frame)) => frame,
                                Ok(None) | Err(_) => break,
                            };
                            if event_tx.send(frame.clone()).is_err() {
                                return;
                            }

                            let reply = match frame {
                                Frame::Bind(bind) => {
                                    if options.accept_bind {
                                        Some(Frame::BindResp(BindResponse {
                                            kind: bind.kind,
                                            command_status: 0,
                                            sequence_number: bind.sequence_number,
                                            system_id: "STUB".to_owned(),
                                        }))
                                    } else {
                                        Some(Frame::BindResp(BindResponse {
                                            kind: bind.kind,
                                            command_status: 0x0D,
                                            sequence_number: bind.sequence_number,
                                            system_id: String::new(),
                                        }))
                                    }
                                }
                                Frame::EnquireLink(el) => {
                                    Some(Frame::EnquireLinkResp(EnquireLinkResponse {
                                        sequence_number: el.sequence_number,
                                    }))
                                }
                                Frame::SubmitSm(submit) if options.respond_to_submit => {
                                    Some(Frame::SubmitSmResp(SubmitSmResponse {
                                        command_status: options.submit_status,
                                        sequence_number: submit.sequence_number,
                                        message_id: if options.submit_status == 0 {
                                            options.message_id.clone()
                                        } else {
                                            String::new()
                                        },
                                    }))
                                }
                                _ => None,
                            };

                            if let Some(reply) = reply {
                                if conn.write_frame(&reply).await.is_err() {
                                    break;
                                }
                            }
                        }
                        Some(frame) = inject_rx.recv() => {
                            if conn.write_frame(&frame).await.is_err() {
                                break;
                            }
                        }
                    }
                }
            }
        });

        StubPeer {
            addr,
            events,
            inject,
        }
    }

    /// Next frame the stub read from the gateway, within 5 seconds.
    pub async fn expect_frame(&mut self) -> Frame {
        timeout(Duration::from_secs(5), self.events.recv())
            .await
            .expect("timed out waiting for a frame from the gateway")
            .expect("stub peer stopped")
    }

    /// Skip frames until one matches the predicate.
    pub async fn expect_frame_matching(
        &mut self,
        mut predicate: impl FnMut(&Frame) -> bool,
    ) -> Frame {
        let deadline = Instant::now() + Duration::from_secs(5);
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            let frame = timeout(remaining, self.events.recv())
                .await
                .expect("timed out waiting for a matching frame")
                .expect("stub peer stopped");
            if predicate(&frame) {
                return frame;
            }
        }
    }
}

/// A scriptable HTTP SMSC endpoint. Answers with the scripted statuses in
/// order (repeating 200 once drained) and records each raw query string.
pub struct StubSmsc {
    pub url: String,
    pub queries: mpsc::UnboundedReceiver<String>,
}

pub async fn start_stub_smsc(statuses: Vec<u16>) -> StubSmsc {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (query_tx, queries) = mpsc::unbounded_channel();
    let statuses = Arc::new(Mutex::new(VecDeque::from(statuses)));

    let app = axum::Router::new().route(
        "/sms",
        get({
            move |RawQuery(query): RawQuery| {
                let query_tx = query_tx.clone();
                let statuses = Arc::clone(&statuses);
                async move {
                    let _ = query_tx.send(query.unwrap_or_default());
                    let status = statuses.lock().unwrap().pop_front().unwrap_or(200);
                    StatusCode::from_u16(status).unwrap()
                }
            }
        }),
    );

    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });

    StubSmsc {
        url: format!("http://{addr}/sms"),
        queries,
    }
}

impl StubSmsc {
    pub async fn expect_query(&mut self) -> String {
        timeout(Duration::from_secs(25), self.queries.recv())
            .await
            .expect("timed out waiting for an egress call")
            .expect("stub SMSC stopped")
    }
}

/// Peer configuration with test-friendly timers pointed at `addr`.
pub fn peer_config(id: &str, addr: SocketAddr) -> PeerConfig {
    PeerConfig {
        id: id.to_owned(),
        ipaddress: addr.ip().to_string(),
        port: addr.port(),
        system_id: "bridge".to_owned(),
        password: "secret".to_owned(),
        system_type: String::new(),
        source_addr_ton: 1,
        source_addr_npi: 1,
        dest_addr_ton: 1,
        dest_addr_npi: 1,
        reconnect_interval: 50,
        enquire_link_interval: 30_000,
        response_timeout: 500,
        route_regex: None,
        is_default: true,
        route: None,
    }
}

pub fn with_route(mut config: PeerConfig, pattern: &str) -> PeerConfig {
    config.route_regex = Some(pattern.to_owned());
    config.route = Some(regex::Regex::new(pattern).unwrap());
    config
}

/// Poll until the handle reports BOUND.
pub async fn wait_until_bound(handle: &PeerHandle) {
    let deadline = Instant::now() + Duration::from_secs(5);
    while !handle.is_bound() {
        assert!(
            Instant::now() < deadline,
            "peer {} did not bind in time",
            handle.id()
        );
        sleep(Duration::from_millis(10)).await;
    }
}

/// Serve the HTTP ingress for a pool on an ephemeral port, returning the
/// base URL.
pub async fn start_ingress(pool: Arc<PeerPool>, wait_for_peer: Duration) -> String {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = Router::new(Arc::clone(&pool));
    let state = Arc::new(AppState {
        pool,
        router,
        wait_for_peer,
    });

    tokio::spawn(async move {
        axum::serve(listener, ingress::app(state)).await.unwrap();
    });

    format!("http://{addr}")
}

/// An address nothing listens on: bind an ephemeral port and release it.
pub async fn dead_addr() -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    listener.local_addr().unwrap()
}

/// A deliver_sm body as an upstream peer would send it.
pub fn deliver_sm(sequence_number: u32, from: &str, to: &str, text: &[u8]) -> DeliverSm {
    DeliverSm(ShortMessagePdu {
        sequence_number,
        service_type: String::new(),
        source_addr_ton: 1,
        source_addr_npi: 1,
        source_addr: from.to_owned(),
        dest_addr_ton: 1,
        dest_addr_npi: 1,
        destination_addr: to.to_owned(),
        esm_class: 0,
        protocol_id: 0,
        priority_flag: 0,
        schedule_delivery_time: String::new(),
        validity_period: String::new(),
        registered_delivery: 0,
        replace_if_present_flag: 0,
        data_coding: 0,
        sm_default_msg_id: 0,
        short_message: bytes::Bytes::copy_from_slice(text),
    })
}
