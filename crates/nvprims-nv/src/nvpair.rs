//! Typed name/value pairs.
//!
//! A pair is built on its own and then handed to a list with
//! [`NvList::move_nvpair`](crate::NvList::move_nvpair). `create_*`
//! constructors copy their value; `move_*` constructors adopt it. A failed
//! constructor drops whatever it was given.

use std::os::fd::{AsFd, BorrowedFd, OwnedFd};

use crate::error::{fail, NvError, Result};
use crate::nvlist::NvList;
use crate::types::{NvType, NVLIST_MAX_LEVEL, NV_NAME_MAX};

/// Payload of a pair. The variant is the pair's type.
#[derive(Debug)]
pub enum NvValue {
    Null,
    Bool(bool),
    Number(u64),
    String(String),
    NvList(NvList),
    Descriptor(OwnedFd),
    Binary(Vec<u8>),
}

impl NvValue {
    pub fn nv_type(&self) -> NvType {
        match self {
            NvValue::Null => NvType::Null,
            NvValue::Bool(_) => NvType::Bool,
            NvValue::Number(_) => NvType::Number,
            NvValue::String(_) => NvType::String,
            NvValue::NvList(_) => NvType::NvList,
            NvValue::Descriptor(_) => NvType::Descriptor,
            NvValue::Binary(_) => NvType::Binary,
        }
    }
}

/// A named, typed value.
#[derive(Debug)]
pub struct NvPair {
    name: String,
    value: NvValue,
}

impl NvPair {
    pub fn create_null(name: &str) -> Result<Self> {
        Ok(Self::from_parts(checked_name(name)?, NvValue::Null))
    }

    pub fn create_bool(name: &str, value: bool) -> Result<Self> {
        Ok(Self::from_parts(checked_name(name)?, NvValue::Bool(value)))
    }

    pub fn create_number(name: &str, value: u64) -> Result<Self> {
        Ok(Self::from_parts(checked_name(name)?, NvValue::Number(value)))
    }

    /// Copy `value` into a new string pair. Embedded NUL bytes are rejected.
    pub fn create_string(name: &str, value: &str) -> Result<Self> {
        let name = checked_name(name)?;
        check_string(value)?;
        Ok(Self::from_parts(name, NvValue::String(copy_str(value)?)))
    }

    /// Deep-copy `value` into a new nested-list pair.
    ///
    /// Fails with the source's sticky error if it has one, and with
    /// [`NvError::TooDeep`] if nesting it would exceed [`NVLIST_MAX_LEVEL`].
    pub fn create_nvlist(name: &str, value: &NvList) -> Result<Self> {
        let name = checked_name(name)?;
        check_height(value)?;
        Ok(Self::from_parts(name, NvValue::NvList(value.try_clone()?)))
    }

    /// Duplicate `fd` into a new descriptor pair. The duplicate is close-on-exec.
    pub fn create_descriptor(name: &str, fd: impl AsFd) -> Result<Self> {
        let name = checked_name(name)?;
        Ok(Self::from_parts(name, NvValue::Descriptor(dup(fd.as_fd())?)))
    }

    /// Copy `value` into a new binary pair. Empty buffers are rejected.
    pub fn create_binary(name: &str, value: &[u8]) -> Result<Self> {
        let name = checked_name(name)?;
        check_binary(value)?;
        Ok(Self::from_parts(name, NvValue::Binary(copy_bytes(value)?)))
    }

    // The move constructors drop `value` on every error path.

    pub fn move_string(name: &str, value: String) -> Result<Self> {
        let name = checked_name(name)?;
        check_string(&value)?;
        Ok(Self::from_parts(name, NvValue::String(value)))
    }

    /// Adopt `value` as a nested list. A list with a sticky error is refused
    /// with that error.
    pub fn move_nvlist(name: &str, value: NvList) -> Result<Self> {
        if let Some(err) = value.error() {
            return fail(err.clone());
        }
        let name = checked_name(name)?;
        check_height(&value)?;
        Ok(Self::from_parts(name, NvValue::NvList(value)))
    }

    pub fn move_descriptor(name: &str, fd: OwnedFd) -> Result<Self> {
        Ok(Self::from_parts(checked_name(name)?, NvValue::Descriptor(fd)))
    }

    pub fn move_binary(name: &str, value: Vec<u8>) -> Result<Self> {
        let name = checked_name(name)?;
        check_binary(&value)?;
        Ok(Self::from_parts(name, NvValue::Binary(value)))
    }

    /// Assemble a pair whose name and value were already validated.
    pub(crate) fn from_parts(name: String, value: NvValue) -> Self {
        Self { name, value }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn nv_type(&self) -> NvType {
        self.value.nv_type()
    }

    pub fn value(&self) -> &NvValue {
        &self.value
    }

    pub fn into_value(self) -> NvValue {
        self.value
    }

    /// Size in bytes of the packed payload.
    ///
    /// For a nested list this is the packed size of the list as it is now.
    pub fn datasize(&self) -> usize {
        match &self.value {
            NvValue::Null => 0,
            NvValue::Bool(_) => 1,
            NvValue::Number(_) => 8,
            NvValue::String(s) => s.len() + 1,
            NvValue::NvList(nvl) => nvl.size(),
            NvValue::Descriptor(_) => 8,
            NvValue::Binary(b) => b.len(),
        }
    }

    /// Deep copy. Nested lists are cloned and descriptors duplicated.
    pub fn try_clone(&self) -> Result<Self> {
        let value = match &self.value {
            NvValue::Null => NvValue::Null,
            NvValue::Bool(b) => NvValue::Bool(*b),
            NvValue::Number(n) => NvValue::Number(*n),
            NvValue::String(s) => NvValue::String(copy_str(s)?),
            NvValue::NvList(nvl) => NvValue::NvList(nvl.try_clone()?),
            NvValue::Descriptor(fd) => NvValue::Descriptor(dup(fd.as_fd())?),
            NvValue::Binary(b) => NvValue::Binary(copy_bytes(b)?),
        };
        Ok(Self {
            name: copy_str(&self.name)?,
            value,
        })
    }

    #[track_caller]
    pub fn get_bool(&self) -> bool {
        match &self.value {
            NvValue::Bool(b) => *b,
            _ => self.wrong_type(NvType::Bool),
        }
    }

    #[track_caller]
    pub fn get_number(&self) -> u64 {
        match &self.value {
            NvValue::Number(n) => *n,
            _ => self.wrong_type(NvType::Number),
        }
    }

    #[track_caller]
    pub fn get_string(&self) -> &str {
        match &self.value {
            NvValue::String(s) => s,
            _ => self.wrong_type(NvType::String),
        }
    }

    #[track_caller]
    pub fn get_nvlist(&self) -> &NvList {
        match &self.value {
            NvValue::NvList(nvl) => nvl,
            _ => self.wrong_type(NvType::NvList),
        }
    }

    #[track_caller]
    pub fn get_descriptor(&self) -> BorrowedFd<'_> {
        match &self.value {
            NvValue::Descriptor(fd) => fd.as_fd(),
            _ => self.wrong_type(NvType::Descriptor),
        }
    }

    #[track_caller]
    pub fn get_binary(&self) -> &[u8] {
        match &self.value {
            NvValue::Binary(b) => b,
            _ => self.wrong_type(NvType::Binary),
        }
    }

    #[cold]
    #[track_caller]
    fn wrong_type(&self, expected: NvType) -> ! {
        panic!(
            "nvpair '{}' has type {}, not {}",
            self.name,
            self.nv_type(),
            expected
        )
    }
}

/// Validate `name` and copy it for the new pair.
fn checked_name(name: &str) -> Result<String> {
    if name.is_empty() {
        return fail(NvError::InvalidName("empty name"));
    }
    if name.len() >= NV_NAME_MAX {
        return fail(NvError::NameTooLong {
            len: name.len(),
            max: NV_NAME_MAX - 1,
        });
    }
    if name.as_bytes().contains(&0) {
        return fail(NvError::InvalidName("name contains a NUL byte"));
    }
    copy_str(name)
}

fn check_string(value: &str) -> Result<()> {
    if value.as_bytes().contains(&0) {
        return fail(NvError::InvalidValue("string contains a NUL byte"));
    }
    Ok(())
}

fn check_binary(value: &[u8]) -> Result<()> {
    if value.is_empty() {
        return fail(NvError::InvalidValue("binary value is empty"));
    }
    Ok(())
}

fn check_height(value: &NvList) -> Result<()> {
    if value.height() + 1 > NVLIST_MAX_LEVEL {
        return fail(NvError::TooDeep {
            max: NVLIST_MAX_LEVEL,
        });
    }
    Ok(())
}

fn dup(fd: BorrowedFd<'_>) -> Result<OwnedFd> {
    match fd.try_clone_to_owned() {
        Ok(owned) => Ok(owned),
        Err(err) => fail(NvError::Descriptor(err.raw_os_error().unwrap_or(libc::EBADF))),
    }
}

pub(crate) fn copy_str(value: &str) -> Result<String> {
    let mut copy = String::new();
    if copy.try_reserve_exact(value.len()).is_err() {
        return fail(NvError::NoMemory(value.len()));
    }
    copy.push_str(value);
    Ok(copy)
}

pub(crate) fn copy_bytes(value: &[u8]) -> Result<Vec<u8>> {
    let mut copy = Vec::new();
    if copy.try_reserve_exact(value.len()).is_err() {
        return fail(NvError::NoMemory(value.len()));
    }
    copy.extend_from_slice(value);
    Ok(copy)
}

#[cfg(test)]
mod tests {
    use std::os::fd::AsRawFd;

    use super::*;
    use crate::error::last_errno;

    #[test]
    fn create_copies_string_and_binary() {
        let text = String::from("59525");
        let pair = NvPair::create_string("string", &text).unwrap();
        assert_eq!(pair.get_string(), "59525");
        assert_ne!(pair.get_string().as_ptr(), text.as_ptr());

        let blob = vec![1u8, 2, 3];
        let pair = NvPair::create_binary("blob", &blob).unwrap();
        assert_eq!(pair.get_binary(), &[1, 2, 3]);
        assert_ne!(pair.get_binary().as_ptr(), blob.as_ptr());
    }

    #[test]
    fn move_adopts_the_allocation() {
        let text = String::from("owned");
        let ptr = text.as_ptr();
        let pair = NvPair::move_string("s", text).unwrap();
        assert_eq!(pair.get_string().as_ptr(), ptr);
    }

    #[test]
    fn rejects_bad_names() {
        assert_eq!(
            NvPair::create_null("").unwrap_err(),
            NvError::InvalidName("empty name")
        );
        assert_eq!(last_errno(), libc::EINVAL);

        let long = "n".repeat(NV_NAME_MAX);
        assert!(matches!(
            NvPair::create_null(&long),
            Err(NvError::NameTooLong { .. })
        ));
        assert_eq!(last_errno(), libc::ENAMETOOLONG);

        let longest = "n".repeat(NV_NAME_MAX - 1);
        assert!(NvPair::create_null(&longest).is_ok());

        assert!(NvPair::create_bool("a\0b", true).is_err());
    }

    #[test]
    fn name_is_checked_before_the_value() {
        let mut errored = NvList::new();
        errored.set_error(NvError::NoMemory(8));
        assert_eq!(
            NvPair::create_nvlist("", &errored).unwrap_err(),
            NvError::InvalidName("empty name")
        );
        assert_eq!(
            NvPair::create_string("a\0b", "x\0y").unwrap_err(),
            NvError::InvalidName("name contains a NUL byte")
        );
        assert_eq!(
            NvPair::move_binary("", Vec::new()).unwrap_err(),
            NvError::InvalidName("empty name")
        );
    }

    #[test]
    fn rejects_bad_values() {
        assert!(NvPair::create_string("s", "a\0b").is_err());
        assert!(NvPair::create_binary("b", &[]).is_err());
        assert!(NvPair::move_binary("b", Vec::new()).is_err());
    }

    #[test]
    fn datasize_per_type() {
        assert_eq!(NvPair::create_null("n").unwrap().datasize(), 0);
        assert_eq!(NvPair::create_bool("b", true).unwrap().datasize(), 1);
        assert_eq!(NvPair::create_number("n", 1).unwrap().datasize(), 8);
        assert_eq!(NvPair::create_string("s", "abc").unwrap().datasize(), 4);
        assert_eq!(NvPair::create_binary("b", &[0; 5]).unwrap().datasize(), 5);
    }

    #[test]
    fn descriptor_is_duplicated() {
        let file = std::fs::File::open("/dev/null").unwrap();
        let pair = NvPair::create_descriptor("fd", &file).unwrap();
        assert_ne!(pair.get_descriptor().as_raw_fd(), file.as_raw_fd());

        let cloned = pair.try_clone().unwrap();
        assert_ne!(
            cloned.get_descriptor().as_raw_fd(),
            pair.get_descriptor().as_raw_fd()
        );
    }

    #[test]
    fn move_nvlist_refuses_errored_list() {
        let mut nvl = NvList::new();
        nvl.add_null("k");
        nvl.add_null("k");
        let err = NvPair::move_nvlist("child", nvl).unwrap_err();
        assert_eq!(err.errno(), libc::EEXIST);
    }

    #[test]
    #[should_panic(expected = "has type NUMBER, not STRING")]
    fn getter_on_wrong_type_panics() {
        let pair = NvPair::create_number("n", 7).unwrap();
        let _ = pair.get_string();
    }
}
