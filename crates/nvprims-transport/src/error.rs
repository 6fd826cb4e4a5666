use std::io;

/// Failures moving bytes or descriptors over a connected Unix-domain stream.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("socket I/O: {0}")]
    Io(#[from] io::Error),

    /// The peer went away before a full buffer was exchanged.
    #[error("peer closed the stream mid-message")]
    ConnectionClosed,

    /// MSG_CTRUNC was set on a descriptor batch.
    #[error("descriptor control message truncated")]
    ControlTruncated,

    #[error("expected {expected} descriptors, received {received}")]
    DescriptorCount { expected: usize, received: usize },
}

impl TransportError {
    /// The errno a C caller would have seen.
    pub fn errno(&self) -> i32 {
        match self {
            TransportError::Io(source) => source.raw_os_error().unwrap_or(libc::EIO),
            TransportError::ConnectionClosed => libc::ENOTCONN,
            TransportError::ControlTruncated | TransportError::DescriptorCount { .. } => {
                libc::EINVAL
            }
        }
    }
}

pub type Result<T> = std::result::Result<T, TransportError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn errno_prefers_os_code() {
        let err = TransportError::Io(io::Error::from_raw_os_error(libc::EPIPE));
        assert_eq!(err.errno(), libc::EPIPE);
        let err = TransportError::Io(io::Error::new(io::ErrorKind::Other, "synthetic"));
        assert_eq!(err.errno(), libc::EIO);
        assert_eq!(TransportError::ConnectionClosed.errno(), libc::ENOTCONN);
    }
}
