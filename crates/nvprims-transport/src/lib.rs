//! Unix-domain stream transport with out-of-band descriptor passing.
//!
//! This is the lowest layer of nvprims. It provides:
//! - a connected byte stream ([`IpcStream`]) with exact-length reads and writes
//! - descriptor arrays carried as `SCM_RIGHTS` control messages
//!
//! Everything that moves packed name/value lists between processes builds on
//! the [`DescriptorChannel`] trait defined here.

#[cfg(not(unix))]
compile_error!("nvprims-transport requires a unix target");

pub mod error;
pub mod fdpass;
pub mod traits;

pub use error::{Result, TransportError};
pub use fdpass::{recv_descriptors, send_descriptors, MAX_DESCRIPTORS_PER_MESSAGE};
pub use traits::{DescriptorChannel, IpcStream};
