//! Message exchange of packed name/value lists.
//!
//! A message is one packed [`NvList`] written to a [`DescriptorChannel`],
//! followed by the list's descriptors as an out-of-band array when it holds
//! any. The receiver learns the length and descriptor count from the list
//! header, so no extra framing is needed.
//!
//! [`NvList`]: nvprims_nv::NvList
//! [`DescriptorChannel`]: nvprims_transport::DescriptorChannel

pub mod config;
pub mod error;
pub mod msgio;

pub use config::{MsgConfig, DEFAULT_MAX_DESCRIPTORS, DEFAULT_MAX_MESSAGE_SIZE};
pub use error::{MsgError, Result};
pub use msgio::{recv, recv_with_config, send, send_with_config, xfer, xfer_with_config};
