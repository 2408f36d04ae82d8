use thiserror::Error;

// Bind and send failures stay at the transport seam: `init` reports a
// failed bind through its boolean return and egress failures are logged
// and swallowed per receiver, so neither needs an error variant here.
#[derive(Debug, Error)]
pub enum RtpSessionError {
    #[error("RTP format error: {0}")]
    Format(#[from] efflux_formats::errors::RtpFormatError),
    #[error("invalid session configuration: {0}")]
    InvalidConfiguration(String),
}

pub type RtpSessionResult<T> = Result<T, RtpSessionError>;
