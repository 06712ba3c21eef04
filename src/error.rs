use std::{
    error,
    fmt::{self, Debug, Display, Formatter},
};

use http::StatusCode;
use tracing::error;

/// Body ingestion error surfaced to the client as an http status.
///
/// `Again` is not an error. Asynchronous continuation is reported through
/// [ReadOutcome::Again](crate::body::ReadOutcome::Again) instead.
pub enum Error {
    /// Client closed the connection mid body, or the socket failed.
    BadRequest,
    /// The read deadline fired before the body was complete.
    RequestTimeout,
    /// Allocation, spill file or filter misuse failure.
    Internal,
    /// Special response requested by the input filter chain.
    Status(StatusCode),
}

impl Error {
    pub fn status_code(&self) -> StatusCode {
        match *self {
            Self::BadRequest => StatusCode::BAD_REQUEST,
            Self::RequestTimeout => StatusCode::REQUEST_TIMEOUT,
            Self::Internal => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Status(code) => code,
        }
    }

    pub(crate) fn from_status(code: StatusCode) -> Self {
        match code {
            StatusCode::BAD_REQUEST => Self::BadRequest,
            StatusCode::REQUEST_TIMEOUT => Self::RequestTimeout,
            StatusCode::INTERNAL_SERVER_ERROR => Self::Internal,
            code => Self::Status(code),
        }
    }

    pub fn log(self) -> Self {
        error!(target: "h1_body", "request body error: {}", self);
        self
    }
}

impl Debug for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        match *self {
            Self::BadRequest => f.write_str("BadRequest"),
            Self::RequestTimeout => f.write_str("RequestTimeout"),
            Self::Internal => f.write_str("Internal"),
            Self::Status(ref code) => write!(f, "Status({})", code),
        }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.status_code())
    }
}

impl error::Error for Error {}

impl PartialEq for Error {
    fn eq(&self, other: &Self) -> bool {
        self.status_code() == other.status_code()
    }
}
