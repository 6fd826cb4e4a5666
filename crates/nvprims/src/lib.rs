//! Self-describing name/value lists with descriptor passing for Unix IPC.
//!
//! # Crate Structure
//!
//! - [`nv`]: lists, pairs, the binary codec, and default-value getters
//! - [`msg`]: sending and receiving packed lists with their descriptors
//! - [`transport`]: Unix domain sockets and `SCM_RIGHTS` descriptor passing
//! - [`json`]: conversion between lists and JSON (behind the `json` feature)

/// Re-export list types.
pub mod nv {
    pub use nvprims_nv::*;
}

/// Re-export message exchange.
pub mod msg {
    pub use nvprims_msg::*;
}

/// Re-export transport types.
pub mod transport {
    pub use nvprims_transport::*;
}

#[cfg(feature = "json")]
pub mod json;
