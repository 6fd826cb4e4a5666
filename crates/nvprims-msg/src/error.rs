/// Errors that can occur while exchanging list messages.
#[derive(Debug, thiserror::Error)]
pub enum MsgError {
    /// The list could not be packed, or the received bytes did not unpack.
    #[error("nvlist error: {0}")]
    Nv(#[from] nvprims_nv::NvError),

    /// Transport-level error.
    #[error("transport error: {0}")]
    Transport(#[from] nvprims_transport::TransportError),

    /// The packed list exceeds the configured size limit.
    #[error("message size {size} exceeds maximum {max}")]
    MessageTooLarge { size: u64, max: usize },

    /// The list carries more descriptors than the configured limit.
    #[error("{count} descriptors exceed maximum {max}")]
    TooManyDescriptors { count: u64, max: usize },
}

impl MsgError {
    /// The closest errno value for this error.
    pub fn errno(&self) -> i32 {
        match self {
            MsgError::Nv(err) => err.errno(),
            MsgError::Transport(err) => err.errno(),
            MsgError::MessageTooLarge { .. } => libc::EMSGSIZE,
            MsgError::TooManyDescriptors { .. } => libc::EINVAL,
        }
    }
}

pub type Result<T> = std::result::Result<T, MsgError>;
