use std::io;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug, PartialEq)]
#[non_exhaustive]
pub enum Error {
    #[error("buffer: short")]
    ErrBufferShort,
    #[error("out of memory")]
    ErrOutOfMemory,
    #[error("max receive buffer size reached")]
    ErrMaxRecvBufSize,

    //DNS codec
    #[error("dns: message shorter than header")]
    ErrShortMessage,
    #[error("dns: message larger than 512 bytes")]
    ErrMessageTooLarge,
    #[error("dns: insufficient data for base length type")]
    ErrBaseLen,
    #[error("dns: segment length too long")]
    ErrSegTooLong,
    #[error("dns: zero length segment")]
    ErrZeroSegLen,
    #[error("dns: name too long")]
    ErrNameTooLong,
    #[error("dns: too many compression pointers")]
    ErrTooManyPtr,
    #[error("dns: insufficient data for resource body length")]
    ErrResourceLen,
    #[error("dns: too many questions")]
    ErrTooManyQuestions,
    #[error("dns: too many answers")]
    ErrTooManyAnswers,

    //Resolver
    #[error("{0} DNS lookup failed")]
    ErrDnsLookupFailed(String),
    #[error("{0} DNS lookup failed: timeout")]
    ErrDnsTimeout(String),
    #[error("DNS error")]
    ErrResolverClosed,
    #[error("resolver address {0} must be a udp:// IP literal")]
    ErrInvalidResolver(String),

    //Connection
    #[error("invalid url: {0}")]
    ErrInvalidUrl(String),
    #[error("connection closed")]
    ErrConnectionClosed,
    #[error("socket error: {0}")]
    ErrSocketError(String),
    #[error("tls: {0}")]
    ErrTls(String),

    //Third Party Error
    #[error("{0}")]
    Io(#[source] IoError),

    #[error("{0}")]
    Other(String),
}

#[derive(Debug, Error)]
#[error("io error: {0}")]
pub struct IoError(#[from] pub io::Error);

// Workaround for wanting PartialEq for io::Error.
impl PartialEq for IoError {
    fn eq(&self, other: &Self) -> bool {
        self.0.kind() == other.0.kind()
    }
}

impl From<io::Error> for Error {
    fn from(e: io::Error) -> Self {
        Error::Io(IoError(e))
    }
}

impl Error {
    /// Returns true if this error wraps an i/o error of kind `WouldBlock`.
    pub fn is_would_block(&self) -> bool {
        matches!(self, Error::Io(IoError(e)) if e.kind() == io::ErrorKind::WouldBlock)
    }
}
