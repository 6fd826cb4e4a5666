use std::time::Duration;

use nvprims_transport::IpcStream;

/// Default maximum packed message size (16 MiB).
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 16 * 1024 * 1024;

/// Default maximum number of descriptors per message (Linux `SCM_MAX_FD`).
pub const DEFAULT_MAX_DESCRIPTORS: usize = 253;

/// Limits and timeouts for message exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MsgConfig {
    /// Largest packed list accepted in either direction, header included.
    pub max_message_size: usize,
    /// Largest descriptor array accepted in either direction.
    pub max_descriptors: usize,
    /// Read timeout (None = blocking).
    pub read_timeout: Option<Duration>,
    /// Write timeout (None = blocking).
    pub write_timeout: Option<Duration>,
}

impl Default for MsgConfig {
    fn default() -> Self {
        Self {
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
            max_descriptors: DEFAULT_MAX_DESCRIPTORS,
            read_timeout: None,
            write_timeout: None,
        }
    }
}

impl MsgConfig {
    /// Apply the timeouts to `stream`.
    pub fn apply(&self, stream: &IpcStream) -> nvprims_transport::Result<()> {
        stream.set_read_timeout(self.read_timeout)?;
        stream.set_write_timeout(self.write_timeout)
    }
}

#[cfg(test)]
mod tests {
    use std::io::Read;

    use super::*;

    #[test]
    fn defaults() {
        let config = MsgConfig::default();
        assert_eq!(config.max_message_size, 16 * 1024 * 1024);
        assert_eq!(config.max_descriptors, 253);
        assert!(config.read_timeout.is_none());
        assert!(config.write_timeout.is_none());
    }

    #[test]
    fn apply_sets_read_timeout() {
        let (mut a, _b) = IpcStream::pair().unwrap();
        let config = MsgConfig {
            read_timeout: Some(Duration::from_millis(20)),
            ..MsgConfig::default()
        };
        config.apply(&a).unwrap();

        let mut buf = [0u8; 1];
        let err = a.read(&mut buf).unwrap_err();
        assert!(matches!(
            err.kind(),
            std::io::ErrorKind::WouldBlock | std::io::ErrorKind::TimedOut
        ));
    }
}
