//! Errors surfaced at the inter-node RPC boundary (§7).

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    #[error("request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned status {status}: {body}")]
    Status { url: String, status: u16, body: String },

    #[error("response from {url} did not decode: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}
