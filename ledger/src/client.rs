//! The ledger client trait and its HTTP implementation.

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use docket_types::{AnchorPayload, CaseId, PayloadHash, Timestamp, TxHash};

use crate::error::LedgerError;
use crate::event::LedgerEvent;

/// What the ledger returns for an accepted submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SubmitReceipt {
    pub tx_hash: TxHash,
}

/// Everything the node needs from the ledger.
#[async_trait]
pub trait LedgerClient: Send + Sync {
    /// Anchor a payload. The content hash is the idempotency key: the
    /// ledger returns the original receipt for a hash it has seen.
    async fn submit(&self, payload: &AnchorPayload) -> Result<SubmitReceipt, LedgerError>;

    /// Record an SLA escalation for a case.
    async fn escalate(&self, case_id: &CaseId) -> Result<SubmitReceipt, LedgerError>;

    /// Whether an escalation entry already exists for a case.
    async fn is_escalated(&self, case_id: &CaseId) -> Result<bool, LedgerError>;

    /// Anchored entries with sequence strictly greater than `after`, in
    /// sequence order, at most `limit`.
    async fn events_since(&self, after: u64, limit: usize)
        -> Result<Vec<LedgerEvent>, LedgerError>;
}

// ── Wire format ─────────────────────────────────────────────────────────

#[derive(Serialize)]
struct SubmitRequest<'a> {
    payload_hash: String,
    payload: &'a AnchorPayload,
}

#[derive(Deserialize)]
struct ReceiptResponse {
    tx_hash: String,
}

#[derive(Deserialize)]
struct EscalationResponse {
    escalated: bool,
}

#[derive(Deserialize)]
struct EventsResponse {
    events: Vec<WireEvent>,
}

#[derive(Deserialize)]
struct WireEvent {
    sequence: u64,
    tx_hash: String,
    payload_hash: String,
    payload: AnchorPayload,
    anchored_at: u64,
}

fn parse_tx_hash(s: &str) -> Result<TxHash, LedgerError> {
    TxHash::from_hex(s).ok_or_else(|| LedgerError::Decode(format!("bad tx hash '{}'", s)))
}

// ── HTTP client ─────────────────────────────────────────────────────────

/// Ledger gateway over HTTP.
pub struct HttpLedgerClient {
    base_url: String,
    client: reqwest::Client,
    timeout: Duration,
}

impl HttpLedgerClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client: reqwest::Client::new(),
            timeout,
        }
    }

    async fn check(&self, resp: reqwest::Response) -> Result<reqwest::Response, LedgerError> {
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        // 4xx carries the ledger's rejection reason in the body.
        if status.is_client_error() {
            let body = resp.text().await.unwrap_or_default();
            let reason = if body.is_empty() {
                format!("HTTP {}", status.as_u16())
            } else {
                body
            };
            return Err(LedgerError::Rejected(reason));
        }
        Err(LedgerError::Http(status.as_u16()))
    }
}

#[async_trait]
impl LedgerClient for HttpLedgerClient {
    async fn submit(&self, payload: &AnchorPayload) -> Result<SubmitReceipt, LedgerError> {
        let hash = payload.content_hash();
        let url = format!("{}/anchors", self.base_url);
        debug!(payload_hash = %hash, case_id = %payload.case_id, "submitting anchor");
        let resp = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .json(&SubmitRequest {
                payload_hash: hash.to_string(),
                payload,
            })
            .send()
            .await?;
        let resp = self.check(resp).await?;
        let receipt: ReceiptResponse = resp.json().await?;
        Ok(SubmitReceipt {
            tx_hash: parse_tx_hash(&receipt.tx_hash)?,
        })
    }

    async fn escalate(&self, case_id: &CaseId) -> Result<SubmitReceipt, LedgerError> {
        let url = format!("{}/cases/{}/escalations", self.base_url, case_id);
        debug!(%case_id, "recording escalation");
        let resp = self
            .client
            .post(&url)
            .timeout(self.timeout)
            .send()
            .await?;
        let resp = self.check(resp).await?;
        let receipt: ReceiptResponse = resp.json().await?;
        Ok(SubmitReceipt {
            tx_hash: parse_tx_hash(&receipt.tx_hash)?,
        })
    }

    async fn is_escalated(&self, case_id: &CaseId) -> Result<bool, LedgerError> {
        let url = format!("{}/cases/{}/escalations", self.base_url, case_id);
        let resp = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await?;
        if resp.status().as_u16() == 404 {
            return Ok(false);
        }
        let resp = self.check(resp).await?;
        let body: EscalationResponse = resp.json().await?;
        Ok(body.escalated)
    }

    async fn events_since(
        &self,
        after: u64,
        limit: usize,
    ) -> Result<Vec<LedgerEvent>, LedgerError> {
        let url = format!("{}/events?after={}&limit={}", self.base_url, after, limit);
        let resp = self
            .client
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await?;
        let resp = self.check(resp).await?;
        let body: EventsResponse = resp.json().await?;
        body.events
            .into_iter()
            .map(|ev| {
                Ok(LedgerEvent {
                    sequence: ev.sequence,
                    tx_hash: parse_tx_hash(&ev.tx_hash)?,
                    payload_hash: PayloadHash::from_hex(&ev.payload_hash).ok_or_else(|| {
                        LedgerError::Decode(format!("bad payload hash '{}'", ev.payload_hash))
                    })?,
                    payload: ev.payload,
                    anchored_at: Timestamp::new(ev.anchored_at),
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_url_is_normalised() {
        let client = HttpLedgerClient::new("http://ledger:8080/", Duration::from_secs(5));
        assert_eq!(client.base_url, "http://ledger:8080");
    }

    #[test]
    fn bad_tx_hash_decodes_to_error() {
        assert!(matches!(
            parse_tx_hash("not-hex"),
            Err(LedgerError::Decode(_))
        ));
        assert!(parse_tx_hash(&"ab".repeat(32)).is_ok());
    }
}
