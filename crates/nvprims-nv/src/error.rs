use std::cell::Cell;

/// Errors produced by name/value list operations.
///
/// Mutations record these as the list's sticky error; the codec and clone
/// paths return them directly. [`NvError::errno`] gives the errno value a C
/// caller would have observed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum NvError {
    /// A pair with this name already exists in the list.
    #[error("element '{0}' already exists")]
    Exists(String),

    /// The pair name is longer than the format allows.
    #[error("name too long ({len} bytes, max {max})")]
    NameTooLong { len: usize, max: usize },

    /// The pair name is empty or contains a NUL byte.
    #[error("invalid name: {0}")]
    InvalidName(&'static str),

    /// The value cannot be stored (embedded NUL, empty binary, ...).
    #[error("invalid value: {0}")]
    InvalidValue(&'static str),

    /// A packed buffer failed validation.
    #[error("malformed packed nvlist: {0}")]
    Malformed(&'static str),

    /// A payload buffer could not be allocated.
    #[error("cannot allocate {0} bytes")]
    NoMemory(usize),

    /// Duplicating a descriptor failed.
    #[error("descriptor duplication failed (errno {0})")]
    Descriptor(i32),

    /// The list holds descriptors but was packed without a descriptor array.
    #[error("operation not supported: {0}")]
    NotSupported(&'static str),

    /// Nesting would exceed the maximum number of list levels.
    #[error("nesting exceeds {max} levels")]
    TooDeep { max: usize },
}

impl NvError {
    /// The errno value corresponding to this error.
    pub fn errno(&self) -> i32 {
        match self {
            NvError::Exists(_) => libc::EEXIST,
            NvError::NameTooLong { .. } => libc::ENAMETOOLONG,
            NvError::InvalidName(_) | NvError::InvalidValue(_) | NvError::Malformed(_) => {
                libc::EINVAL
            }
            NvError::NoMemory(_) => libc::ENOMEM,
            NvError::Descriptor(errno) => *errno,
            NvError::NotSupported(_) => libc::EOPNOTSUPP,
            NvError::TooDeep { .. } => libc::ELOOP,
        }
    }
}

pub type Result<T> = std::result::Result<T, NvError>;

thread_local! {
    static LAST_ERRNO: Cell<i32> = const { Cell::new(0) };
}

/// errno of the most recent failure on this thread, or 0.
///
/// Updated by every failing operation, including no-op mutations on a list
/// that already carries a sticky error.
pub fn last_errno() -> i32 {
    LAST_ERRNO.with(Cell::get)
}

/// Reset the value returned by [`last_errno`].
pub fn clear_last_errno() {
    LAST_ERRNO.with(|cell| cell.set(0));
}

pub(crate) fn record(err: &NvError) {
    LAST_ERRNO.with(|cell| cell.set(err.errno()));
}

/// Record `err` as the last failure and return it.
pub(crate) fn fail<T>(err: NvError) -> Result<T> {
    record(&err);
    Err(err)
}
