use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProtocolError {
    #[error("frame exceeds the maximum allowed length ({len} > {max})")]
    FrameTooLarge { len: u32, max: u32 },

    #[error("I/O error on protocol stream: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed frame payload: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("stream ended before a value was read")]
    UnexpectedEof,

    #[error("worker received a non-starting command first: {0}")]
    UnexpectedStartingCommand(String),
}
