//! # HTTP messaging gateway adapter.
//!
//! Drives a messaging gateway that keeps the actual chat client logged in and exposes a
//! small HTTP API per named session:
//!
//! ```text
//! POST {base}/sessions/{name}/start      open (or attach to) the session
//! GET  {base}/sessions/{name}/status     {"status": "CONNECTED" | ...}
//! POST {base}/sessions/{name}/messages   {"to": "<recipient>", "text": "<text>"}
//! POST {base}/sessions/{name}/close      close the session
//! ```
//!
//! ## Send classification
//! | Outcome                      | Result             |
//! |------------------------------|--------------------|
//! | 2xx                          | `Ok`               |
//! | 401, 403, 409, 410           | `SessionLost`      |
//! | any other status             | `MessageRejected`  |
//! | connection / transport error | `SessionLost`      |
//!
//! ## Heartbeat
//! After `connect` a background task polls `status` every `heartbeat`. A poll that gets
//! no answer within one `heartbeat` counts as failed. A status other than `CONNECTED`,
//! or two failed polls in a row, terminate the session.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, StatusCode};
use serde::{Deserialize, Serialize};

use super::{Session, SessionConfig, Transport};
use crate::config::GatewayConfig;
use crate::error::{ConnectError, SendError};

const HEARTBEAT_MAX_FAILURES: u32 = 2;

#[derive(Serialize)]
struct SendBody<'a> {
    to: &'a str,
    text: &'a str,
}

#[derive(Deserialize)]
struct StatusBody {
    status: String,
}

/// Messaging gateway client.
#[derive(Clone)]
pub struct HttpGateway {
    client: Client,
    cfg: GatewayConfig,
}

impl HttpGateway {
    /// Creates an adapter with a default `reqwest` client.
    pub fn new(cfg: GatewayConfig) -> Self {
        Self::with_client(cfg, Client::new())
    }

    /// Creates an adapter with a caller-provided client.
    pub fn with_client(cfg: GatewayConfig, client: Client) -> Self {
        Self { client, cfg }
    }

    fn url(&self, session: &str, action: &str) -> String {
        format!(
            "{}/sessions/{}/{}",
            self.cfg.base_url.trim_end_matches('/'),
            session,
            action
        )
    }

    fn authorized(&self, req: RequestBuilder) -> RequestBuilder {
        if self.cfg.token.is_empty() {
            req
        } else {
            req.bearer_auth(&self.cfg.token)
        }
    }

    fn spawn_heartbeat(&self, session: &Session) {
        if self.cfg.heartbeat.is_zero() {
            return;
        }
        let me = self.clone();
        let session = session.clone();
        let period = self.cfg.heartbeat;

        tokio::spawn(async move {
            let token = session.token();
            let mut failures = 0u32;
            loop {
                tokio::select! {
                    _ = token.cancelled() => break,
                    _ = tokio::time::sleep(period) => {}
                }
                match me.poll_status(session.name()).await {
                    Ok(status) if status.eq_ignore_ascii_case("CONNECTED") => failures = 0,
                    Ok(status) => {
                        session.terminate(format!("gateway reports session {status}"));
                        break;
                    }
                    Err(reason) => {
                        failures += 1;
                        tracing::warn!(session = session.id(), failures, %reason, "heartbeat failed");
                        if failures >= HEARTBEAT_MAX_FAILURES {
                            session.terminate(format!("heartbeat failed: {reason}"));
                            break;
                        }
                    }
                }
            }
        });
    }

    async fn poll_status(&self, name: &str) -> Result<String, String> {
        let limit = self.cfg.heartbeat;
        let poll = async {
            let resp = self
                .authorized(self.client.get(self.url(name, "status")))
                .send()
                .await
                .map_err(|e| e.to_string())?;
            if !resp.status().is_success() {
                return Err(format!("HTTP {}", resp.status()));
            }
            let body: StatusBody = resp.json().await.map_err(|e| e.to_string())?;
            Ok(body.status)
        };
        match tokio::time::timeout(limit, poll).await {
            Ok(res) => res,
            Err(_elapsed) => Err(format!("no status answer within {limit:?}")),
        }
    }
}

/// Maps a send response status onto the send result.
pub(crate) fn classify_send_status(
    status: StatusCode,
    recipient: &str,
    body: &str,
) -> Result<(), SendError> {
    if status.is_success() {
        return Ok(());
    }
    let reason = if body.trim().is_empty() {
        format!("HTTP {status}")
    } else {
        format!("HTTP {status}: {}", body.trim())
    };
    match status {
        StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN | StatusCode::CONFLICT | StatusCode::GONE => {
            Err(SendError::SessionLost { reason })
        }
        _ => Err(SendError::MessageRejected {
            address: recipient.to_string(),
            reason,
        }),
    }
}

#[async_trait]
impl Transport for HttpGateway {
    fn name(&self) -> &'static str {
        "http-gateway"
    }

    async fn connect(&self, cfg: &SessionConfig) -> Result<Session, ConnectError> {
        let resp = self
            .authorized(self.client.post(self.url(&cfg.name, "start")))
            .send()
            .await
            .map_err(|e| ConnectError::Unreachable {
                reason: e.to_string(),
            })?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(ConnectError::Rejected {
                reason: format!("HTTP {status}: {}", body.trim()),
            });
        }

        let session = Session::open(cfg.name.clone());
        self.spawn_heartbeat(&session);
        Ok(session)
    }

    async fn send(&self, session: &Session, recipient: &str, text: &str) -> Result<(), SendError> {
        if !session.is_alive() {
            return Err(SendError::SessionLost {
                reason: session
                    .termination_reason()
                    .unwrap_or("session terminated")
                    .to_string(),
            });
        }

        let resp = self
            .authorized(self.client.post(self.url(session.name(), "messages")))
            .json(&SendBody { to: recipient, text })
            .send()
            .await
            .map_err(|e| SendError::SessionLost {
                reason: format!("gateway request failed: {e}"),
            })?;

        let status = resp.status();
        let body = if status.is_success() {
            String::new()
        } else {
            resp.text().await.unwrap_or_default()
        };
        classify_send_status(status, recipient, &body)
    }

    async fn disconnect(&self, session: &Session) {
        let close = self
            .authorized(self.client.post(self.url(session.name(), "close")))
            .timeout(Duration::from_secs(5))
            .send()
            .await;
        if let Err(e) = close {
            tracing::debug!(session = session.id(), error = %e, "gateway close failed");
        }
        session.terminate("disconnected by supervisor");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classification_table() {
        let r = "919876543210";
        assert!(classify_send_status(StatusCode::OK, r, "").is_ok());
        assert!(classify_send_status(StatusCode::CREATED, r, "").is_ok());

        for code in [400u16, 404, 422, 429, 500, 503] {
            let err = classify_send_status(StatusCode::from_u16(code).unwrap(), r, "nope")
                .unwrap_err();
            assert!(!err.is_session_fatal(), "{code} must be message-local");
        }
        for code in [401u16, 403, 409, 410] {
            let err =
                classify_send_status(StatusCode::from_u16(code).unwrap(), r, "").unwrap_err();
            assert!(err.is_session_fatal(), "{code} must be session-fatal");
        }
    }
}
