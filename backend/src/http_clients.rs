use std::time::Duration;

use crate::config::Settings;

const ERROR_BODY_LIMIT: usize = 300;

/// Connection pools for every outbound provider.
///
/// Built once at startup; providers hold cheap clones. Call
/// [`HttpClients::shutdown`] after the server stops so the pools are
/// released once the last provider clone is gone.
#[derive(Clone)]
pub struct HttpClients {
    pub geocoder: reqwest::Client,
    pub directions: reqwest::Client,
    pub model: reqwest::Client,
}

impl HttpClients {
    pub fn new(timeout: Duration, connect_timeout: Duration) -> Result<Self, reqwest::Error> {
        let build = || {
            reqwest::Client::builder()
                .timeout(timeout)
                .connect_timeout(connect_timeout)
                .build()
        };
        Ok(Self {
            geocoder: build()?,
            directions: build()?,
            model: build()?,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, reqwest::Error> {
        Self::new(settings.http_timeout(), settings.http_connect_timeout())
    }

    pub fn shutdown(self) {
        drop(self);
        tracing::info!("outbound HTTP clients released");
    }
}

/// Caller-facing text for a failed upstream call: the JSON `message`
/// field when there is one, otherwise the body cut to a readable length.
pub fn upstream_error_message(body: &str) -> String {
    match serde_json::from_str::<serde_json::Value>(body) {
        Ok(json) => match json.get("message").and_then(|m| m.as_str()) {
            Some(message) if !message.is_empty() => message.to_string(),
            _ => truncate_chars(&json.to_string(), ERROR_BODY_LIMIT),
        },
        Err(_) => truncate_chars(body, ERROR_BODY_LIMIT),
    }
}

fn truncate_chars(text: &str, limit: usize) -> String {
    text.chars().take(limit).collect()
}
