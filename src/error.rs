use std::io;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Reading from the byte source failed
    #[error("source unavailable: {0}")]
    SourceUnavailable(#[source] io::Error),

    /// Writing to the byte sink failed
    #[error("sink unavailable: {0}")]
    SinkUnavailable(#[source] io::Error),

    /// A bit or byte was requested after the source ran dry
    #[error("end of stream")]
    EndOfStream,

    /// The tree stream ended before the tree was complete
    #[error("tree stream ended before the tree was complete")]
    TruncatedTree,

    /// The payload stream ended inside the padding prefix
    #[error("payload stream ended inside the padding prefix")]
    MalformedPadding,

    /// The input contained a byte the tree has no code for,
    /// which happens when the input changes between encode passes
    #[error("no code for byte 0x{0:02x}")]
    UnknownSymbol(u8),

    #[error("invalid tree: {0}")]
    InvalidTree(&'static str),
}
