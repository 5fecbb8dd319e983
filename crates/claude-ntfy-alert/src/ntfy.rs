//! ntfy wire format.
//!
//! One JSON document POSTed to `{server}/{topic}` per notification. Any 2xx
//! response counts as delivered; everything else is the caller's problem to
//! log and forget.

use serde::Serialize;

/// The JSON body ntfy expects.
#[derive(Debug, Serialize)]
pub struct Payload<'a> {
    pub topic: &'a str,
    pub title: &'a str,
    pub message: &'a str,
}

/// Join server base URL and topic into the publish endpoint.
pub fn publish_url(server: &str, topic: &str) -> String {
    format!("{}/{}", server.trim_end_matches('/'), topic)
}
