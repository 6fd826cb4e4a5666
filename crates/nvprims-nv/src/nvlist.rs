use std::fmt;
use std::os::fd::{AsFd, BorrowedFd, OwnedFd};

use tracing::debug;

use crate::error::{fail, record, NvError, Result};
use crate::nvpair::{NvPair, NvValue};
use crate::types::{NvFlags, NvType};

/// Ordered collection of uniquely named pairs.
///
/// Mutators never fail loudly: the first error is kept as the list's sticky
/// error and every later mutation is a no-op. Queries on a list with a sticky
/// error are a caller bug and panic.
#[derive(Debug, Default)]
pub struct NvList {
    error: Option<NvError>,
    flags: NvFlags,
    pairs: Vec<NvPair>,
}

/// Iteration position for [`NvList::next`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Cookie(usize);

impl Cookie {
    pub fn new() -> Self {
        Self::default()
    }

    /// Rewind to the first pair.
    pub fn reset(&mut self) {
        self.0 = 0;
    }
}

impl NvList {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty list with `flags`.
    ///
    /// # Panics
    ///
    /// If `flags` contains anything outside [`NvFlags::PUBLIC`].
    pub fn with_flags(flags: NvFlags) -> Self {
        assert!(
            NvFlags::PUBLIC.contains(flags),
            "invalid nvlist flags {:#04x}",
            flags.bits()
        );
        Self {
            flags,
            ..Self::default()
        }
    }

    pub fn flags(&self) -> NvFlags {
        self.flags
    }

    /// The sticky error, if any mutation has failed.
    pub fn error(&self) -> Option<&NvError> {
        self.error.as_ref()
    }

    /// errno of the sticky error, or 0.
    pub fn errno(&self) -> i32 {
        self.error.as_ref().map_or(0, NvError::errno)
    }

    /// Set the sticky error. Only the first error is kept.
    pub fn set_error(&mut self, err: NvError) {
        record(&err);
        if self.error.is_none() {
            debug!(%err, "nvlist entered error state");
            self.error = Some(err);
        }
    }

    #[track_caller]
    fn check_healthy(&self) {
        if let Some(err) = &self.error {
            panic!("nvlist queried while in error state ({err})");
        }
    }

    pub fn is_empty(&self) -> bool {
        self.check_healthy();
        self.pairs.is_empty()
    }

    pub fn len(&self) -> usize {
        self.check_healthy();
        self.pairs.len()
    }

    fn position(&self, name: &str, ty: NvType) -> Option<usize> {
        let ignore_case = self.flags.contains(NvFlags::IGNORE_CASE);
        self.pairs.iter().position(|pair| {
            let same = if ignore_case {
                pair.name().eq_ignore_ascii_case(name)
            } else {
                pair.name() == name
            };
            same && ty.matches(pair.nv_type())
        })
    }

    /// First pair named `name` whose type passes the `ty` filter.
    #[track_caller]
    pub fn find(&self, name: &str, ty: NvType) -> Option<&NvPair> {
        self.check_healthy();
        self.position(name, ty).map(|idx| &self.pairs[idx])
    }

    #[track_caller]
    pub fn get_nvpair(&self, name: &str) -> Option<&NvPair> {
        self.find(name, NvType::None)
    }

    #[track_caller]
    pub fn exists(&self, name: &str) -> bool {
        self.find(name, NvType::None).is_some()
    }

    #[track_caller]
    pub fn exists_type(&self, name: &str, ty: NvType) -> bool {
        self.find(name, ty).is_some()
    }

    #[track_caller]
    pub fn exists_null(&self, name: &str) -> bool {
        self.exists_type(name, NvType::Null)
    }

    #[track_caller]
    pub fn exists_bool(&self, name: &str) -> bool {
        self.exists_type(name, NvType::Bool)
    }

    #[track_caller]
    pub fn exists_number(&self, name: &str) -> bool {
        self.exists_type(name, NvType::Number)
    }

    #[track_caller]
    pub fn exists_string(&self, name: &str) -> bool {
        self.exists_type(name, NvType::String)
    }

    #[track_caller]
    pub fn exists_nvlist(&self, name: &str) -> bool {
        self.exists_type(name, NvType::NvList)
    }

    #[track_caller]
    pub fn exists_descriptor(&self, name: &str) -> bool {
        self.exists_type(name, NvType::Descriptor)
    }

    #[track_caller]
    pub fn exists_binary(&self, name: &str) -> bool {
        self.exists_type(name, NvType::Binary)
    }

    /// Insert `pair`, the primitive every adder funnels through.
    ///
    /// On a list that already has a sticky error the pair is dropped. A
    /// nested list carrying its own sticky error passes that error on to this
    /// list. A duplicate name sets [`NvError::Exists`].
    pub fn move_nvpair(&mut self, pair: NvPair) {
        if self.refuse() {
            return;
        }
        if let NvValue::NvList(child) = pair.value() {
            if let Some(err) = child.error() {
                self.set_error(err.clone());
                return;
            }
        }
        if self.position(pair.name(), NvType::None).is_some() {
            self.set_error(NvError::Exists(pair.name().to_owned()));
            return;
        }
        self.pairs.push(pair);
    }

    /// True (and errno refreshed) when the list is already in error state.
    fn refuse(&self) -> bool {
        match &self.error {
            Some(err) => {
                record(err);
                true
            }
            None => false,
        }
    }

    fn absorb(&mut self, pair: Result<NvPair>) {
        match pair {
            Ok(pair) => self.move_nvpair(pair),
            Err(err) => self.set_error(err),
        }
    }

    pub fn add_null(&mut self, name: &str) {
        if !self.refuse() {
            self.absorb(NvPair::create_null(name));
        }
    }

    pub fn add_bool(&mut self, name: &str, value: bool) {
        if !self.refuse() {
            self.absorb(NvPair::create_bool(name, value));
        }
    }

    pub fn add_number(&mut self, name: &str, value: u64) {
        if !self.refuse() {
            self.absorb(NvPair::create_number(name, value));
        }
    }

    pub fn add_string(&mut self, name: &str, value: &str) {
        if !self.refuse() {
            self.absorb(NvPair::create_string(name, value));
        }
    }

    /// Add a string built from format arguments.
    ///
    /// ```
    /// # use nvprims_nv::NvList;
    /// let mut nvl = NvList::new();
    /// nvl.add_stringf("path", format_args!("/dev/{}{}", "ixl", 0));
    /// assert_eq!(nvl.get_string("path"), "/dev/ixl0");
    /// ```
    pub fn add_stringf(&mut self, name: &str, args: fmt::Arguments<'_>) {
        if !self.refuse() {
            self.absorb(NvPair::move_string(name, fmt::format(args)));
        }
    }

    /// Add a deep copy of `value`.
    pub fn add_nvlist(&mut self, name: &str, value: &NvList) {
        if !self.refuse() {
            self.absorb(NvPair::create_nvlist(name, value));
        }
    }

    /// Add a close-on-exec duplicate of `fd`.
    pub fn add_descriptor(&mut self, name: &str, fd: impl AsFd) {
        if !self.refuse() {
            self.absorb(NvPair::create_descriptor(name, fd));
        }
    }

    pub fn add_binary(&mut self, name: &str, value: &[u8]) {
        if !self.refuse() {
            self.absorb(NvPair::create_binary(name, value));
        }
    }

    pub fn move_string(&mut self, name: &str, value: String) {
        if !self.refuse() {
            self.absorb(NvPair::move_string(name, value));
        }
    }

    pub fn move_nvlist(&mut self, name: &str, value: NvList) {
        if !self.refuse() {
            self.absorb(NvPair::move_nvlist(name, value));
        }
    }

    pub fn move_descriptor(&mut self, name: &str, fd: OwnedFd) {
        if !self.refuse() {
            self.absorb(NvPair::move_descriptor(name, fd));
        }
    }

    pub fn move_binary(&mut self, name: &str, value: Vec<u8>) {
        if !self.refuse() {
            self.absorb(NvPair::move_binary(name, value));
        }
    }

    #[track_caller]
    fn lookup(&self, name: &str, ty: NvType) -> &NvPair {
        match self.find(name, ty) {
            Some(pair) => pair,
            None => report_missing(name, ty),
        }
    }

    #[track_caller]
    pub fn get_bool(&self, name: &str) -> bool {
        self.lookup(name, NvType::Bool).get_bool()
    }

    #[track_caller]
    pub fn get_number(&self, name: &str) -> u64 {
        self.lookup(name, NvType::Number).get_number()
    }

    #[track_caller]
    pub fn get_string(&self, name: &str) -> &str {
        self.lookup(name, NvType::String).get_string()
    }

    #[track_caller]
    pub fn get_nvlist(&self, name: &str) -> &NvList {
        self.lookup(name, NvType::NvList).get_nvlist()
    }

    #[track_caller]
    pub fn get_descriptor(&self, name: &str) -> BorrowedFd<'_> {
        self.lookup(name, NvType::Descriptor).get_descriptor()
    }

    #[track_caller]
    pub fn get_binary(&self, name: &str) -> &[u8] {
        self.lookup(name, NvType::Binary).get_binary()
    }

    /// Detach the pair named `name`, if present.
    #[track_caller]
    pub fn take_nvpair(&mut self, name: &str) -> Option<NvPair> {
        self.check_healthy();
        let idx = self.position(name, NvType::None)?;
        Some(self.pairs.remove(idx))
    }

    #[track_caller]
    fn detach(&mut self, name: &str, ty: NvType) -> NvValue {
        self.check_healthy();
        match self.position(name, ty) {
            Some(idx) => self.pairs.remove(idx).into_value(),
            None => report_missing(name, ty),
        }
    }

    #[track_caller]
    pub fn take_bool(&mut self, name: &str) -> bool {
        match self.detach(name, NvType::Bool) {
            NvValue::Bool(b) => b,
            _ => unreachable!("lookup filtered on BOOL"),
        }
    }

    #[track_caller]
    pub fn take_number(&mut self, name: &str) -> u64 {
        match self.detach(name, NvType::Number) {
            NvValue::Number(n) => n,
            _ => unreachable!("lookup filtered on NUMBER"),
        }
    }

    #[track_caller]
    pub fn take_string(&mut self, name: &str) -> String {
        match self.detach(name, NvType::String) {
            NvValue::String(s) => s,
            _ => unreachable!("lookup filtered on STRING"),
        }
    }

    #[track_caller]
    pub fn take_nvlist(&mut self, name: &str) -> NvList {
        match self.detach(name, NvType::NvList) {
            NvValue::NvList(nvl) => nvl,
            _ => unreachable!("lookup filtered on NVLIST"),
        }
    }

    #[track_caller]
    pub fn take_descriptor(&mut self, name: &str) -> OwnedFd {
        match self.detach(name, NvType::Descriptor) {
            NvValue::Descriptor(fd) => fd,
            _ => unreachable!("lookup filtered on DESCRIPTOR"),
        }
    }

    #[track_caller]
    pub fn take_binary(&mut self, name: &str) -> Vec<u8> {
        match self.detach(name, NvType::Binary) {
            NvValue::Binary(b) => b,
            _ => unreachable!("lookup filtered on BINARY"),
        }
    }

    /// Remove and destroy the pair named `name`, whatever its type.
    #[track_caller]
    pub fn free(&mut self, name: &str) {
        self.free_type(name, NvType::None);
    }

    #[track_caller]
    pub fn free_type(&mut self, name: &str, ty: NvType) {
        drop(self.detach(name, ty));
    }

    #[track_caller]
    pub fn free_null(&mut self, name: &str) {
        self.free_type(name, NvType::Null);
    }

    #[track_caller]
    pub fn free_bool(&mut self, name: &str) {
        self.free_type(name, NvType::Bool);
    }

    #[track_caller]
    pub fn free_number(&mut self, name: &str) {
        self.free_type(name, NvType::Number);
    }

    #[track_caller]
    pub fn free_string(&mut self, name: &str) {
        self.free_type(name, NvType::String);
    }

    #[track_caller]
    pub fn free_nvlist(&mut self, name: &str) {
        self.free_type(name, NvType::NvList);
    }

    #[track_caller]
    pub fn free_descriptor(&mut self, name: &str) {
        self.free_type(name, NvType::Descriptor);
    }

    #[track_caller]
    pub fn free_binary(&mut self, name: &str) {
        self.free_type(name, NvType::Binary);
    }

    /// Advance `cookie` and return the next pair's name and type.
    ///
    /// Start from [`Cookie::default`]. Mutating the list between calls
    /// leaves the cookie pointing at an unspecified position.
    #[track_caller]
    pub fn next(&self, cookie: &mut Cookie) -> Option<(&str, NvType)> {
        self.check_healthy();
        let pair = self.pairs.get(cookie.0)?;
        cookie.0 += 1;
        Some((pair.name(), pair.nv_type()))
    }

    /// Pairs in insertion order.
    #[track_caller]
    pub fn iter(&self) -> std::slice::Iter<'_, NvPair> {
        self.check_healthy();
        self.pairs.iter()
    }

    /// Deep copy: nested lists are cloned and descriptors duplicated.
    ///
    /// A list with a sticky error is not cloned; its error is returned.
    pub fn try_clone(&self) -> Result<NvList> {
        if let Some(err) = &self.error {
            return fail(err.clone());
        }
        let mut pairs = Vec::with_capacity(self.pairs.len());
        for pair in &self.pairs {
            pairs.push(pair.try_clone()?);
        }
        Ok(NvList {
            error: None,
            flags: self.flags,
            pairs,
        })
    }

    /// Number of descriptors held by this list and every nested list.
    pub fn ndescriptors(&self) -> usize {
        self.walk()
            .filter(|step| {
                matches!(step, Step::Pair { pair, .. } if pair.nv_type() == NvType::Descriptor)
            })
            .count()
    }

    /// Every descriptor held by this list, in depth-first pair order.
    ///
    /// This is the order in which a packed list references them.
    pub fn descriptors(&self) -> Vec<BorrowedFd<'_>> {
        self.walk()
            .filter_map(|step| match step {
                Step::Pair { pair, .. } => match pair.value() {
                    NvValue::Descriptor(fd) => Some(fd.as_fd()),
                    _ => None,
                },
                Step::Up => None,
            })
            .collect()
    }

    /// Number of list levels, 1 for a list without nested lists.
    pub fn height(&self) -> usize {
        // a list held by a pair at depth d sits at level d + 2
        self.walk()
            .filter_map(|step| match step {
                Step::Pair { pair, depth } if pair.nv_type() == NvType::NvList => Some(depth + 2),
                _ => None,
            })
            .max()
            .unwrap_or(1)
    }

    /// Depth-first traversal of every pair, with a [`Step::Up`] after the
    /// last pair of each nested list.
    pub(crate) fn walk(&self) -> Walk<'_> {
        Walk {
            stack: vec![self.pairs.iter()],
        }
    }
}

impl<'a> IntoIterator for &'a NvList {
    type Item = &'a NvPair;
    type IntoIter = std::slice::Iter<'a, NvPair>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}

#[cold]
#[track_caller]
fn report_missing(name: &str, ty: NvType) -> ! {
    panic!("Element '{name}' of type {ty} doesn't exist.")
}

pub(crate) enum Step<'a> {
    /// A pair, with the nesting depth of the list holding it (0 for the root).
    Pair { pair: &'a NvPair, depth: usize },
    /// End of a nested list; the walk continues in its parent.
    Up,
}

pub(crate) struct Walk<'a> {
    stack: Vec<std::slice::Iter<'a, NvPair>>,
}

impl<'a> Iterator for Walk<'a> {
    type Item = Step<'a>;

    fn next(&mut self) -> Option<Step<'a>> {
        let depth = self.stack.len().checked_sub(1)?;
        let next = self.stack.last_mut()?.next();
        match next {
            Some(pair) => {
                if let NvValue::NvList(child) = pair.value() {
                    self.stack.push(child.pairs.iter());
                }
                Some(Step::Pair { pair, depth })
            }
            None => {
                self.stack.pop();
                if self.stack.is_empty() {
                    None
                } else {
                    Some(Step::Up)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::os::fd::AsRawFd;
    use std::os::unix::fs::MetadataExt;

    use super::*;
    use crate::error::{clear_last_errno, last_errno};
    use crate::types::NVLIST_MAX_LEVEL;

    #[test]
    fn new_list_is_empty_and_healthy() {
        let nvl = NvList::new();
        assert_eq!(nvl.errno(), 0);
        assert!(nvl.error().is_none());
        assert!(nvl.is_empty());
        assert_eq!(nvl.len(), 0);
    }

    #[test]
    fn null_pair_iterates_once() {
        let mut nvl = NvList::new();
        nvl.add_null("key");
        assert_eq!(nvl.errno(), 0);
        assert!(!nvl.is_empty());
        assert!(nvl.exists("key"));
        assert!(nvl.exists_null("key"));
        assert!(!nvl.exists_bool("key"));

        let mut cookie = Cookie::new();
        assert_eq!(nvl.next(&mut cookie), Some(("key", NvType::Null)));
        assert_eq!(nvl.next(&mut cookie), None);

        cookie.reset();
        assert_eq!(nvl.next(&mut cookie), Some(("key", NvType::Null)));
    }

    #[test]
    fn iteration_preserves_insertion_order() {
        let mut nvl = NvList::new();
        nvl.add_number("zeta", 1);
        nvl.add_bool("alpha", true);
        nvl.add_string("mid", "m");
        let names: Vec<&str> = nvl.iter().map(NvPair::name).collect();
        assert_eq!(names, ["zeta", "alpha", "mid"]);
    }

    #[test]
    fn typed_getters_return_values() {
        let mut nvl = NvList::new();
        nvl.add_bool("b", true);
        nvl.add_number("foo123", 71965);
        nvl.add_string("s", "text");
        nvl.add_binary("bin", &[0xde, 0xad]);
        assert!(nvl.get_bool("b"));
        assert_eq!(nvl.get_number("foo123"), 71965);
        assert_eq!(nvl.get_string("s"), "text");
        assert_eq!(nvl.get_binary("bin"), &[0xde, 0xad]);
    }

    #[test]
    fn duplicate_name_sets_exists_and_keeps_content() {
        let mut nvl = NvList::new();
        nvl.add_number("n", 1);
        nvl.add_string("n", "second");
        assert_eq!(nvl.errno(), libc::EEXIST);
        assert_eq!(nvl.error(), Some(&NvError::Exists("n".into())));
        assert_eq!(nvl.pairs.len(), 1);
        assert_eq!(nvl.pairs[0].get_number(), 1);
    }

    #[test]
    fn sticky_error_makes_mutations_no_ops() {
        let mut nvl = NvList::new();
        nvl.add_null("a");
        nvl.add_null("a");
        assert_eq!(nvl.errno(), libc::EEXIST);

        clear_last_errno();
        nvl.add_number("b", 2);
        assert_eq!(last_errno(), libc::EEXIST);
        nvl.move_string("c", "moved".into());
        nvl.add_binary("", &[]);
        assert_eq!(nvl.pairs.len(), 1);
        assert_eq!(nvl.errno(), libc::EEXIST, "first error wins");
    }

    #[test]
    fn first_error_wins() {
        let mut nvl = NvList::new();
        nvl.set_error(NvError::NoMemory(8));
        nvl.set_error(NvError::Malformed("later"));
        assert_eq!(nvl.errno(), libc::ENOMEM);
    }

    #[test]
    fn invalid_value_becomes_sticky() {
        let mut nvl = NvList::new();
        nvl.add_string("s", "nul\0inside");
        assert_eq!(nvl.errno(), libc::EINVAL);
    }

    #[test]
    fn ignore_case_lookup_and_uniqueness() {
        let mut nvl = NvList::with_flags(NvFlags::IGNORE_CASE);
        nvl.add_number("Speed", 100);
        assert!(nvl.exists("speed"));
        assert_eq!(nvl.get_number("SPEED"), 100);
        nvl.add_number("SPEED", 1);
        assert_eq!(nvl.errno(), libc::EEXIST);

        let mut strict = NvList::new();
        strict.add_number("Speed", 100);
        assert!(!strict.exists("speed"));
        strict.add_number("speed", 1);
        assert_eq!(strict.errno(), 0);
    }

    #[test]
    #[should_panic(expected = "invalid nvlist flags")]
    fn private_flags_are_refused() {
        let _ = NvList::with_flags(NvFlags::BIG_ENDIAN);
    }

    #[test]
    #[should_panic(expected = "Element 'missing' of type NUMBER doesn't exist.")]
    fn strict_getter_panics_on_missing_key() {
        let nvl = NvList::new();
        let _ = nvl.get_number("missing");
    }

    #[test]
    #[should_panic(expected = "Element 'n' of type STRING doesn't exist.")]
    fn strict_getter_panics_on_wrong_type() {
        let mut nvl = NvList::new();
        nvl.add_number("n", 1);
        let _ = nvl.get_string("n");
    }

    #[test]
    #[should_panic(expected = "error state")]
    fn queries_on_errored_list_panic() {
        let mut nvl = NvList::new();
        nvl.set_error(NvError::Malformed("x"));
        let _ = nvl.exists("anything");
    }

    #[test]
    fn take_transfers_ownership() {
        let mut nvl = NvList::new();
        nvl.move_string("s", String::from("payload"));
        let ptr = nvl.get_string("s").as_ptr();
        let taken = nvl.take_string("s");
        assert_eq!(taken.as_ptr(), ptr);
        assert!(!nvl.exists("s"));
        assert!(nvl.is_empty());
    }

    #[test]
    fn take_nvpair_and_reinsert() {
        let mut src = NvList::new();
        src.add_number("n", 5);
        let pair = src.take_nvpair("n").unwrap();
        assert!(src.take_nvpair("n").is_none());

        let mut dst = NvList::new();
        dst.move_nvpair(pair);
        assert_eq!(dst.get_number("n"), 5);
    }

    #[test]
    fn free_removes_pairs() {
        let mut nvl = NvList::new();
        nvl.add_null("a");
        nvl.add_bool("b", false);
        nvl.add_string("c", "x");
        nvl.free("a");
        nvl.free_bool("b");
        nvl.free_type("c", NvType::String);
        assert!(nvl.is_empty());
    }

    #[test]
    #[should_panic(expected = "Element 'b' of type NUMBER doesn't exist.")]
    fn free_with_wrong_type_panics() {
        let mut nvl = NvList::new();
        nvl.add_bool("b", false);
        nvl.free_number("b");
    }

    #[test]
    fn clone_is_deep() {
        let mut inner = NvList::new();
        inner.add_string("string", "59525");
        let mut outer = NvList::new();
        outer.add_nvlist("nested", &inner);

        let copy = outer.try_clone().unwrap();
        let original_nested = outer.get_nvlist("nested");
        let cloned_nested = copy.get_nvlist("nested");
        assert!(!std::ptr::eq(original_nested, cloned_nested));
        assert_eq!(cloned_nested.get_string("string"), "59525");
        assert_ne!(
            cloned_nested.get_string("string").as_ptr(),
            original_nested.get_string("string").as_ptr()
        );
        assert!(!std::ptr::eq(original_nested, &inner));
    }

    #[test]
    fn clone_of_errored_list_fails() {
        let mut nvl = NvList::new();
        nvl.set_error(NvError::NoMemory(1));
        assert_eq!(nvl.try_clone().unwrap_err(), NvError::NoMemory(1));
    }

    #[test]
    fn move_errored_nvlist_propagates() {
        let mut child = NvList::new();
        child.add_null("x");
        child.add_null("x");

        let mut parent = NvList::new();
        parent.move_nvlist("child", child);
        assert_eq!(parent.errno(), libc::EEXIST);
    }

    #[test]
    fn nesting_is_bounded() {
        let mut nvl = NvList::new();
        nvl.add_null("leaf");
        for level in 1..NVLIST_MAX_LEVEL {
            assert_eq!(nvl.height(), level);
            let mut parent = NvList::new();
            parent.move_nvlist("child", nvl);
            assert_eq!(parent.errno(), 0);
            nvl = parent;
        }
        assert_eq!(nvl.height(), NVLIST_MAX_LEVEL);

        let mut too_deep = NvList::new();
        too_deep.add_nvlist("child", &nvl);
        assert_eq!(too_deep.errno(), libc::ELOOP);
    }

    #[test]
    fn height_counts_empty_nested_lists() {
        let mut nvl = NvList::new();
        nvl.add_nvlist("empty", &NvList::new());
        assert_eq!(nvl.height(), 2);
    }

    #[test]
    fn descriptors_follow_depth_first_order() {
        let first = std::fs::File::open("/dev/null").unwrap();
        let second = std::fs::File::open("/dev/zero").unwrap();

        let mut inner = NvList::new();
        inner.add_descriptor("inner", &second);
        let mut nvl = NvList::new();
        nvl.add_descriptor("a", &first);
        nvl.add_nvlist("nested", &inner);
        nvl.add_descriptor("b", &first);

        assert_eq!(nvl.ndescriptors(), 3);
        let fds: Vec<i32> = nvl.descriptors().iter().map(|fd| fd.as_raw_fd()).collect();
        assert_eq!(
            fds,
            [
                nvl.get_descriptor("a").as_raw_fd(),
                nvl.get_nvlist("nested").get_descriptor("inner").as_raw_fd(),
                nvl.get_descriptor("b").as_raw_fd(),
            ]
        );
    }

    fn scratch_fd(tag: &str) -> (OwnedFd, u64) {
        let path = std::env::temp_dir().join(format!(
            "nvprims-nvlist-{tag}-{}.tmp",
            std::process::id()
        ));
        let file = std::fs::File::create(&path).unwrap();
        std::fs::remove_file(&path).unwrap();
        let ino = file.metadata().unwrap().ino();
        (OwnedFd::from(file), ino)
    }

    /// Whether `raw` still refers to the file with inode `ino`.
    fn still_open(raw: i32, ino: u64) -> bool {
        let mut st = std::mem::MaybeUninit::<libc::stat>::uninit();
        // SAFETY: fstat only writes into `st`.
        let rc = unsafe { libc::fstat(raw, st.as_mut_ptr()) };
        // SAFETY: `st` is initialised when fstat succeeds.
        rc == 0 && unsafe { st.assume_init() }.st_ino as u64 == ino
    }

    #[test]
    fn move_descriptor_adopts_the_handle() {
        let (fd, ino) = scratch_fd("adopt");
        let raw = fd.as_raw_fd();
        let mut nvl = NvList::new();
        nvl.move_descriptor("fd", fd);
        assert_eq!(nvl.get_descriptor("fd").as_raw_fd(), raw);

        let fd = nvl.take_descriptor("fd");
        assert_eq!(fd.as_raw_fd(), raw);
        assert!(still_open(raw, ino));
    }

    #[test]
    fn move_descriptor_onto_taken_name_closes_it() {
        let mut nvl = NvList::new();
        nvl.add_null("fd");
        let (fd, ino) = scratch_fd("dup-name");
        let raw = fd.as_raw_fd();

        nvl.move_descriptor("fd", fd);
        assert_eq!(nvl.errno(), libc::EEXIST);
        assert!(!still_open(raw, ino));
    }

    #[test]
    fn move_descriptor_into_errored_list_closes_it() {
        let mut nvl = NvList::new();
        nvl.set_error(NvError::NoMemory(1));
        let (fd, ino) = scratch_fd("errored");
        let raw = fd.as_raw_fd();

        nvl.move_descriptor("fd", fd);
        assert_eq!(nvl.errno(), libc::ENOMEM);
        assert!(!still_open(raw, ino));
    }

    #[test]
    fn move_descriptor_with_bad_name_closes_it() {
        let mut nvl = NvList::new();
        let (fd, ino) = scratch_fd("bad-name");
        let raw = fd.as_raw_fd();

        nvl.move_descriptor("", fd);
        assert_eq!(nvl.errno(), libc::EINVAL);
        assert!(!still_open(raw, ino));
    }

    #[test]
    fn add_stringf_formats() {
        let mut nvl = NvList::new();
        nvl.add_stringf("vf", format_args!("vf-{}", 3));
        assert_eq!(nvl.get_string("vf"), "vf-3");
    }
}
