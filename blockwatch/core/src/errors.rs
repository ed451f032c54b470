#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The connected gateway client exposes none of the known block event
    /// subscription conventions. Reconnecting under different conditions may
    /// resolve a client/version mismatch, so listeners still retry, but this
    /// is logged louder than a plain transport failure.
    #[error("connected gateway client exposes no known block events API")]
    UnsupportedSubscription,
    #[error("transport failure: {0}")]
    Transport(String),
    #[error("malformed block event: {0}")]
    Extraction(String),
    #[error("no block data recorded for organization `{0}`")]
    OrganizationNotFound(String),
    #[error("unknown organization `{0}`")]
    UnknownOrganization(String),
    #[error(transparent)]
    Reqwest(#[from] reqwest::Error),
    #[error(transparent)]
    SerdeJson(#[from] serde_json::Error),
    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    UrlParse(#[from] url::ParseError),
}
