//! Type tags, list flags, and format limits.

use std::fmt;

/// Maximum size of a pair name including its NUL terminator.
pub const NV_NAME_MAX: usize = 2048;

/// Maximum number of list levels, counting the top-level list as 1.
///
/// Enforced when a nested list is inserted and when a packed buffer is
/// unpacked, so every traversal is bounded by it.
pub const NVLIST_MAX_LEVEL: usize = 6;

/// Type tag of a pair.
///
/// The discriminants are the values used on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum NvType {
    /// Lookup filter matching any type. Never stored in a pair.
    None = 0,
    Null = 1,
    Bool = 2,
    Number = 3,
    String = 4,
    NvList = 5,
    Descriptor = 6,
    Binary = 7,
}

impl NvType {
    /// Decode a stored type tag. `None` (0) is a filter, not a stored type.
    pub fn from_wire(tag: u8) -> Option<Self> {
        match tag {
            1 => Some(NvType::Null),
            2 => Some(NvType::Bool),
            3 => Some(NvType::Number),
            4 => Some(NvType::String),
            5 => Some(NvType::NvList),
            6 => Some(NvType::Descriptor),
            7 => Some(NvType::Binary),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            NvType::None => "NONE",
            NvType::Null => "NULL",
            NvType::Bool => "BOOL",
            NvType::Number => "NUMBER",
            NvType::String => "STRING",
            NvType::NvList => "NVLIST",
            NvType::Descriptor => "DESCRIPTOR",
            NvType::Binary => "BINARY",
        }
    }

    /// True if `self` used as a lookup filter accepts `other`.
    pub fn matches(self, other: NvType) -> bool {
        self == NvType::None || self == other
    }
}

impl fmt::Display for NvType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

bitflags::bitflags! {
    /// List flags, as carried in the packed header.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct NvFlags: u8 {
        /// The writer encoded multi-byte integers big-endian. Set by the codec only.
        const BIG_ENDIAN = 0x01;
        /// Name lookups ignore ASCII case.
        const IGNORE_CASE = 0x02;
    }
}

impl NvFlags {
    /// Flags a caller may pass to [`crate::NvList::with_flags`].
    pub const PUBLIC: NvFlags = NvFlags::IGNORE_CASE;
}
