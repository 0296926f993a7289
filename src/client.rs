//! Request/response wrapper around the remote lock authority.
//!
//! Every route is a POST with a JSON body and an `Authorization` header.
//! Status handling:
//! - 200 and 400 carry a JSON envelope (`{result}` or `{error}`)
//! - 401 is [`Error::NotAuthorized`], recovered only by the session probe
//! - anything else is fatal
//!
//! Nothing here retries. A failed request surfaces immediately so the user
//! re-runs the command instead of silently hammering the authority.

use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use serde_json::Value;

use crate::config::ServerConfig;
use crate::error::{Error, Result};
use crate::output::Console;

/// Raw status and body of an HTTP exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: String,
}

impl RawResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Sends one POST to the lock authority.
pub trait Transport {
    fn post(&self, path: &str, body: &Value, authorization: &str) -> Result<RawResponse>;
}

/// [`Transport`] over HTTP(S) with a fixed host, port, and timeout.
pub struct HttpTransport {
    client: Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(server: &ServerConfig) -> Result<Self> {
        let base_url = server.base_url();
        let client = Client::builder()
            .timeout(Duration::from_secs(server.timeout_secs))
            .user_agent(concat!("softlock/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|source| Error::Transport {
                endpoint: base_url.clone(),
                source,
            })?;
        Ok(Self { client, base_url })
    }
}

impl Transport for HttpTransport {
    fn post(&self, path: &str, body: &Value, authorization: &str) -> Result<RawResponse> {
        let url = format!("{}{}", self.base_url, path);
        let transport_error = |source| Error::Transport {
            endpoint: url.clone(),
            source,
        };

        let response = self
            .client
            .post(&url)
            .header(CONTENT_TYPE, "application/json")
            .header(AUTHORIZATION, authorization)
            .body(serde_json::to_vec(body)?)
            .send()
            .map_err(transport_error)?;

        let status = response.status().as_u16();
        let body = response.text().map_err(transport_error)?;
        Ok(RawResponse { status, body })
    }
}

/// Parsed JSON reply from the lock authority.
#[derive(Debug, Clone, PartialEq)]
pub struct Envelope {
    raw: Value,
}

impl Envelope {
    pub fn new(raw: Value) -> Self {
        Self { raw }
    }

    /// Business error reported by the server, if any.
    pub fn error(&self) -> Option<&str> {
        self.raw.get("error").and_then(Value::as_str)
    }

    /// The `result` payload, if present.
    pub fn result(&self) -> Option<&Value> {
        self.raw.get("result")
    }

    /// The `result` payload as a string, if it is one.
    pub fn result_str(&self) -> Option<&str> {
        self.result().and_then(Value::as_str)
    }

    pub fn into_value(self) -> Value {
        self.raw
    }
}

/// Lock authority client: applies the status/envelope rules on top of a
/// [`Transport`].
pub struct LockServiceClient<'a> {
    transport: &'a dyn Transport,
    console: &'a Console,
}

impl<'a> LockServiceClient<'a> {
    pub fn new(transport: &'a dyn Transport, console: &'a Console) -> Self {
        Self { transport, console }
    }

    /// POST `body` to `path`.
    ///
    /// With `tolerate_payload_error`, an envelope carrying a string `error`
    /// is returned for the caller to branch on; otherwise it becomes
    /// [`Error::Rejected`].
    pub fn post(
        &self,
        path: &str,
        body: &Value,
        authorization: &str,
        tolerate_payload_error: bool,
    ) -> Result<Envelope> {
        self.console.note(format!("requesting {path}"));
        let response = self.transport.post(path, body, authorization)?;
        tracing::debug!(path, status = response.status, "lock authority replied");

        match response.status {
            200 | 400 => {}
            401 => return Err(Error::NotAuthorized),
            status => {
                return Err(Error::ServerStatus {
                    status,
                    body: response.body,
                })
            }
        }

        let envelope = Envelope::new(serde_json::from_str(&response.body)?);
        if let Some(message) = envelope.error() {
            if !tolerate_payload_error {
                return Err(Error::Rejected(message.to_string()));
            }
        }

        Ok(envelope)
    }
}
