//! Lookups that fall back to a default instead of panicking.
//!
//! The default is used when the key is absent and also when it is present
//! with a different type. `take_*_or` leaves a mistyped pair in place.

use std::os::fd::{BorrowedFd, OwnedFd};

use crate::nvlist::NvList;
use crate::types::NvType;

impl NvList {
    pub fn get_bool_or(&self, name: &str, default: bool) -> bool {
        self.find(name, NvType::Bool)
            .map_or(default, |pair| pair.get_bool())
    }

    pub fn get_number_or(&self, name: &str, default: u64) -> u64 {
        self.find(name, NvType::Number)
            .map_or(default, |pair| pair.get_number())
    }

    pub fn get_string_or<'a>(&'a self, name: &str, default: &'a str) -> &'a str {
        self.find(name, NvType::String)
            .map_or(default, |pair| pair.get_string())
    }

    pub fn get_nvlist_or<'a>(&'a self, name: &str, default: &'a NvList) -> &'a NvList {
        self.find(name, NvType::NvList)
            .map_or(default, |pair| pair.get_nvlist())
    }

    /// `None` stands for "no descriptor".
    pub fn get_descriptor_or<'a>(
        &'a self,
        name: &str,
        default: Option<BorrowedFd<'a>>,
    ) -> Option<BorrowedFd<'a>> {
        match self.find(name, NvType::Descriptor) {
            Some(pair) => Some(pair.get_descriptor()),
            None => default,
        }
    }

    pub fn get_binary_or<'a>(&'a self, name: &str, default: &'a [u8]) -> &'a [u8] {
        self.find(name, NvType::Binary)
            .map_or(default, |pair| pair.get_binary())
    }

    pub fn take_bool_or(&mut self, name: &str, default: bool) -> bool {
        if self.exists_bool(name) {
            self.take_bool(name)
        } else {
            default
        }
    }

    pub fn take_number_or(&mut self, name: &str, default: u64) -> u64 {
        if self.exists_number(name) {
            self.take_number(name)
        } else {
            default
        }
    }

    pub fn take_string_or(&mut self, name: &str, default: String) -> String {
        if self.exists_string(name) {
            self.take_string(name)
        } else {
            default
        }
    }

    pub fn take_nvlist_or(&mut self, name: &str, default: NvList) -> NvList {
        if self.exists_nvlist(name) {
            self.take_nvlist(name)
        } else {
            default
        }
    }

    pub fn take_descriptor_or(&mut self, name: &str, default: Option<OwnedFd>) -> Option<OwnedFd> {
        if self.exists_descriptor(name) {
            Some(self.take_descriptor(name))
        } else {
            default
        }
    }

    pub fn take_binary_or(&mut self, name: &str, default: Vec<u8>) -> Vec<u8> {
        if self.exists_binary(name) {
            self.take_binary(name)
        } else {
            default
        }
    }
}

#[cfg(test)]
mod tests {
    use std::os::fd::AsRawFd;

    use super::*;

    #[test]
    fn present_values_win() {
        let mut nvl = NvList::new();
        nvl.add_bool("b", true);
        nvl.add_number("n", 9);
        nvl.add_string("s", "set");
        nvl.add_binary("bin", &[7]);
        assert!(nvl.get_bool_or("b", false));
        assert_eq!(nvl.get_number_or("n", 0), 9);
        assert_eq!(nvl.get_string_or("s", "default"), "set");
        assert_eq!(nvl.get_binary_or("bin", &[]), &[7]);
    }

    #[test]
    fn missing_keys_give_default() {
        let nvl = NvList::new();
        let fallback = NvList::new();
        assert!(nvl.get_bool_or("b", true));
        assert_eq!(nvl.get_number_or("n", 42), 42);
        assert_eq!(nvl.get_string_or("s", "default"), "default");
        assert!(std::ptr::eq(nvl.get_nvlist_or("l", &fallback), &fallback));
        assert!(nvl.get_descriptor_or("fd", None).is_none());
        assert_eq!(nvl.get_binary_or("bin", b"dflt"), b"dflt");
    }

    #[test]
    fn mistyped_keys_give_default() {
        let mut nvl = NvList::new();
        nvl.add_string("num_vfs", "four");
        assert_eq!(nvl.get_number_or("num_vfs", 4), 4);
        assert_eq!(nvl.take_number_or("num_vfs", 4), 4);
        assert!(nvl.exists_string("num_vfs"), "mistyped pair stays");
    }

    #[test]
    fn take_or_detaches_present_values() {
        let file = std::fs::File::open("/dev/null").unwrap();
        let mut nested = NvList::new();
        nested.add_null("x");

        let mut nvl = NvList::new();
        nvl.add_string("s", "v");
        nvl.add_nvlist("l", &nested);
        nvl.add_descriptor("fd", &file);
        nvl.add_binary("b", &[1, 2]);

        assert_eq!(nvl.take_string_or("s", String::new()), "v");
        assert!(nvl.take_nvlist_or("l", NvList::new()).exists_null("x"));
        let fd = nvl.take_descriptor_or("fd", None).unwrap();
        assert_ne!(fd.as_raw_fd(), file.as_raw_fd());
        assert_eq!(nvl.take_binary_or("b", Vec::new()), [1, 2]);
        assert!(nvl.is_empty());

        assert!(nvl.take_bool_or("gone", true));
        assert_eq!(nvl.take_string_or("gone", "d".into()), "d");
    }
}
