use thiserror::Error;

#[derive(Debug, Error)]
pub enum StationSourceError {
    #[error("Network request failed for {0}")]
    NetworkRequest(String, #[source] reqwest::Error),

    #[error("HTTP request failed for {url} with status {status}")]
    HttpStatus {
        url: String,
        status: reqwest::StatusCode,
        #[source]
        source: reqwest::Error,
    },

    #[error("Failed to parse response from {url}")]
    JsonParse {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    // Every request of the step failed; individual failures were logged
    #[error("Station source unavailable: {0}")]
    Unavailable(String),
}
