//! Test doubles shared by the source tests.

use std::collections::VecDeque;
use std::time::Duration;

use metrics_core::{MetricsError, Result};

use crate::transport::{HttpResponse, Transport};

/// One request observed by [`FakeTransport`].
#[derive(Debug, Clone)]
pub(crate) struct RecordedCall {
    pub method: &'static str,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub form: Vec<(String, String)>,
}

impl RecordedCall {
    /// Value of a recorded header, if present.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v.as_str())
    }
}

/// Scripted in-memory transport.
///
/// Pops one canned outcome per request, in order, and records every request
/// it was asked to perform. Running out of scripted outcomes yields a
/// transport error, which keeps mis-scripted tests failing loudly.
#[derive(Debug)]
pub(crate) struct FakeTransport {
    responses: VecDeque<Result<HttpResponse>>,
    pub calls: Vec<RecordedCall>,
}

impl FakeTransport {
    pub fn new(responses: Vec<Result<HttpResponse>>) -> Self {
        Self {
            responses: responses.into(),
            calls: Vec::new(),
        }
    }

    /// Canned response with the given status and body.
    pub fn reply(status: u16, body: &str) -> Result<HttpResponse> {
        Ok(HttpResponse {
            status,
            body: body.to_string(),
        })
    }

    /// Canned network-level failure.
    pub fn network_error() -> Result<HttpResponse> {
        Err(MetricsError::Transport("connection refused".to_string()))
    }

    /// Recorded calls with the given method.
    pub fn calls_with_method(&self, method: &str) -> Vec<&RecordedCall> {
        self.calls.iter().filter(|c| c.method == method).collect()
    }

    fn next(&mut self) -> Result<HttpResponse> {
        self.responses.pop_front().unwrap_or_else(|| {
            Err(MetricsError::Transport(
                "no scripted response left".to_string(),
            ))
        })
    }
}

impl Transport for FakeTransport {
    fn get(
        &mut self,
        url: &str,
        headers: &[(&str, &str)],
        _timeout: Option<Duration>,
    ) -> Result<HttpResponse> {
        self.calls.push(RecordedCall {
            method: "GET",
            url: url.to_string(),
            headers: headers
                .iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect(),
            form: Vec::new(),
        });
        self.next()
    }

    fn post_form(
        &mut self,
        url: &str,
        form: &[(&str, &str)],
        _timeout: Option<Duration>,
    ) -> Result<HttpResponse> {
        self.calls.push(RecordedCall {
            method: "POST",
            url: url.to_string(),
            headers: Vec::new(),
            form: form
                .iter()
                .map(|(n, v)| (n.to_string(), v.to_string()))
                .collect(),
        });
        self.next()
    }
}
