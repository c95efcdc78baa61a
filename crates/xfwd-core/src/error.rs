use thiserror::Error;

/// Errors produced by the X11 forwarding subsystem.
#[derive(Debug, Error)]
pub enum XfwdError {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),

    #[error("invalid hex credential: {0}")]
    InvalidHexCredential(#[from] hex::FromHexError),

    #[error("host name unavailable: {0}")]
    HostResolution(String),

    #[error("no free display port after {attempts} attempts: {source}")]
    PortExhaustion {
        attempts: u16,
        #[source]
        source: std::io::Error,
    },

    #[error("authority record write failed: {0}")]
    RecordWrite(#[source] std::io::Error),

    #[error("channel open failed: {0}")]
    ChannelOpen(String),

    #[error("stream relay failed: {0}")]
    StreamRelay(#[source] std::io::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type XfwdResult<T> = Result<T, XfwdError>;
