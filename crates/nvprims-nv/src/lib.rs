//! Self-describing name/value lists with a canonical binary encoding.
//!
//! An [`NvList`] is an ordered collection of uniquely named, typed
//! [`NvPair`]s. Lists nest, carry OS descriptors, and pack to a flat,
//! versioned byte stream that any receiver can validate and unpack.
//!
//! Mutations never return errors. The first failure is stored in the list
//! (see [`NvList::error`]) and every later mutation becomes a no-op, so a
//! builder can issue a batch of `add_*` calls and check once at the end:
//!
//! ```
//! use nvprims_nv::NvList;
//!
//! let mut nvl = NvList::new();
//! nvl.add_string("driver", "ixl");
//! nvl.add_number("num_vfs", 4);
//! nvl.add_number("num_vfs", 8); // duplicate: sticky EEXIST
//! assert_eq!(nvl.errno(), libc::EEXIST);
//! ```
//!
//! Strict getters (`get_*`, `take_*`, `free_*`) panic on a missing or
//! mistyped key; the `*_or` getters in [`dnv`] substitute a default instead.

pub mod codec;
pub mod dnv;
pub mod dump;
pub mod error;
pub mod nvlist;
pub mod nvpair;
pub mod types;

pub use codec::{
    ByteOrder, NvListHeader, PackOptions, PackedNvList, NVLIST_HEADER_MAGIC, NVLIST_HEADER_SIZE,
    NVLIST_HEADER_VERSION, NVPAIR_HEADER_SIZE,
};
pub use error::{clear_last_errno, last_errno, NvError, Result};
pub use nvlist::{Cookie, NvList};
pub use nvpair::{NvPair, NvValue};
pub use types::{NvFlags, NvType, NVLIST_MAX_LEVEL, NV_NAME_MAX};
