use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("{0}")]
    InvalidEntry(String),

    #[error("entry already exists")]
    AlreadyExists,

    #[error("entry not found")]
    NotFound,

    #[error("failed to read from kernel: {0}")]
    KernelRead(String),

    #[error("failed to write to kernel: {0}")]
    KernelWrite(String),

    #[error("network namespace error: {0}")]
    Namespace(#[from] netns_rs::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T, E = Error> = std::result::Result<T, E>;

impl Error {
    /// `AlreadyExists` on add and `NotFound` on delete leave the kernel in the
    /// requested state.
    pub fn is_idempotent_success(&self) -> bool {
        matches!(self, Error::AlreadyExists | Error::NotFound)
    }
}

impl From<static_routing_common::Error> for Error {
    fn from(err: static_routing_common::Error) -> Self {
        Self::InvalidEntry(err.to_string())
    }
}
