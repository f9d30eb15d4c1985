// HTTP egress towards the SMSC control plane.
//
// Every inbound message (deliver_sm from upstream peers, submit_sm from
// locally bound ESMEs) becomes a GET against the configured kamailio_url
// with url-encoded query parameters. Attempts are bounded: transport
// errors and non-2xx responses are retried up to the attempt limit with a
// fixed delay in between.

use crate::pdu::ShortMessagePdu;
use std::time::Duration;
use thiserror::Error;
use tokio::time;
use tracing::{debug, warn};

const DEFAULT_ATTEMPTS: u32 = 3;
const DEFAULT_ATTEMPT_TIMEOUT: Duration = Duration::from_secs(5);
const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

#[derive(Debug, Error)]
pub enum EgressError {
    #[error("SMSC egress failed after {attempts} attempts")]
    AttemptsExhausted { attempts: u32 },

    #[error("egress client construction failed: {0}")]
    Client(#[from] reqwest::Error),
}

/// One message on its way to the SMSC, already reduced to the fields the
/// egress URL carries.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SmsForward {
    pub from: String,
    pub to: String,
    pub text: String,
    pub dcs: u8,
    /// Set when the esm_class marked the message as a delivery receipt.
    pub report: bool,
}

impl SmsForward {
    /// Reduce a deliver_sm/submit_sm body to egress parameters. The
    /// short_message octets stay opaque: with the default data coding they
    /// are forwarded as (lossy) UTF-8 text, for any other coding they are
    /// hex-encoded and the dcs travels alongside for downstream decoding.
    pub fn from_pdu(pdu: &ShortMessagePdu) -> Self {
        let text = if pdu.data_coding == 0 {
            String::from_utf8_lossy(&pdu.short_message).into_owned()
        } else {
            hex_encode(&pdu.short_message)
        };

        SmsForward {
            from: pdu.source_addr.clone(),
            to: pdu.destination_addr.clone(),
            text,
            dcs: pdu.data_coding,
            report: pdu.is_delivery_receipt(),
        }
    }

    fn query(&self) -> Vec<(&'static str, String)> {
        let mut params = vec![
            ("from", self.from.clone()),
            ("to", self.to.clone()),
            ("text", self.text.clone()),
            ("dcs", self.dcs.to_string()),
        ];
        if self.report {
            params.push(("report", "1".to_owned()));
        }
        params
    }
}

pub struct EgressClient {
    http: reqwest::Client,
    url: String,
    attempts: u32,
    retry_delay: Duration,
}

impl EgressClient {
    pub fn new(kamailio_url: &str) -> Result<Self, EgressError> {
        Self::with_policy(
            kamailio_url,
            DEFAULT_ATTEMPTS,
            DEFAULT_ATTEMPT_TIMEOUT,
            DEFAULT_RETRY_DELAY,
        )
    }

    pub fn with_policy(
        kamailio_url: &str,
        attempts: u32,
        attempt_timeout: Duration,
        retry_delay: Duration,
    ) -> Result<Self, EgressError> {
        let http = reqwest::Client::builder().timeout(attempt_timeout).build()?;
        Ok(EgressClient {
            http,
            url: kamailio_url.to_owned(),
            attempts,
            retry_delay,
        })
    }

    /// Forward a message, retrying until a 2xx arrives or the attempt
    /// budget is spent.
    pub async fn forward(&self, message: &SmsForward) -> Result<(), EgressError> {
        let query = message.query();

        for attempt in 1..=self.attempts {
            match self.http.get(&self.url).query(&query).send().await {
                Ok(response) if response.status().is_success() => {
                    debug!(to = %message.to, attempt, "forwarded to SMSC");
                    return Ok(());
                }
                Ok(response) => {
                    warn!(
                        to = %message.to,
                        attempt,
                        status = %response.status(),
                        "SMSC returned non-success"
                    );
                }
                Err(e) => {
                    warn!(to = %message.to, attempt, error = %e, "SMSC request failed");
                }
            }

            if attempt < self.attempts {
                time::sleep(self.retry_delay).await;
            }
        }

        Err(EgressError::AttemptsExhausted {
            attempts: self.attempts,
        })
    }

    /// Forward an inbound deliver_sm (MO SMS or delivery receipt).
    pub async fn forward_deliver(&self, pdu: &ShortMessagePdu) -> Result<(), EgressError> {
        self.forward(&SmsForward::from_pdu(pdu)).await
    }
}

fn hex_encode(octets: &[u8]) -> String {
    use std::fmt::Write;

    octets.iter().fold(
        String::with_capacity(octets.len() * 2),
        |mut out, byte| {
            let _ = write!(out, "{byte:02x}");
            out
        },
    )
}
