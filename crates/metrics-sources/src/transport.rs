//! Blocking HTTP transport seam for the remote data source.
//!
//! The remote source talks to the measurement service through the
//! [`Transport`] trait rather than a concrete client, so the token state
//! machine and the retry policy can be exercised in tests with a scripted
//! in-memory transport. Production code uses [`UreqTransport`].

use std::time::Duration;

use metrics_core::{MetricsError, Result};

/// Status code and body of one completed HTTP exchange.
///
/// Any status the server produced is data, not an error; only failing to
/// complete the exchange at all surfaces as [`MetricsError::Transport`].
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

/// Minimal blocking HTTP surface needed by the remote source.
pub trait Transport {
    /// Issue a GET request with the given headers.
    fn get(
        &mut self,
        url: &str,
        headers: &[(&str, &str)],
        timeout: Option<Duration>,
    ) -> Result<HttpResponse>;

    /// Issue a POST request with a url-encoded form body.
    fn post_form(
        &mut self,
        url: &str,
        form: &[(&str, &str)],
        timeout: Option<Duration>,
    ) -> Result<HttpResponse>;
}

// ── UreqTransport ─────────────────────────────────────────────────────────────

/// Production transport backed by a persistent [`ureq::Agent`].
///
/// The agent reuses connections across calls and lives exactly as long as
/// the data source that owns it; nothing is process-global.
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        Self {
            agent: ureq::AgentBuilder::new().build(),
        }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn get(
        &mut self,
        url: &str,
        headers: &[(&str, &str)],
        timeout: Option<Duration>,
    ) -> Result<HttpResponse> {
        let mut request = self.agent.get(url);
        if let Some(t) = timeout {
            request = request.timeout(t);
        }
        for (name, value) in headers {
            request = request.set(name, value);
        }
        to_response(request.call())
    }

    fn post_form(
        &mut self,
        url: &str,
        form: &[(&str, &str)],
        timeout: Option<Duration>,
    ) -> Result<HttpResponse> {
        let mut request = self.agent.post(url);
        if let Some(t) = timeout {
            request = request.timeout(t);
        }
        to_response(request.send_form(form))
    }
}

/// Map a ureq outcome onto [`HttpResponse`], keeping HTTP error statuses
/// as plain responses.
fn to_response(
    outcome: std::result::Result<ureq::Response, ureq::Error>,
) -> Result<HttpResponse> {
    match outcome {
        Ok(response) => {
            let status = response.status();
            let body = response
                .into_string()
                .map_err(|e| MetricsError::Transport(e.to_string()))?;
            Ok(HttpResponse { status, body })
        }
        Err(ureq::Error::Status(status, response)) => Ok(HttpResponse {
            status,
            body: response.into_string().unwrap_or_default(),
        }),
        Err(e) => Err(MetricsError::Transport(e.to_string())),
    }
}

/// Clamp a response body for inclusion in error messages.
pub(crate) fn truncate_body(body: &str) -> String {
    body.chars().take(200).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_body_short_input_unchanged() {
        assert_eq!(truncate_body("short"), "short");
    }

    #[test]
    fn test_truncate_body_clamps_to_200_chars() {
        let long = "x".repeat(500);
        assert_eq!(truncate_body(&long).chars().count(), 200);
    }
}
