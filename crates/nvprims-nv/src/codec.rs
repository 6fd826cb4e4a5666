//! Binary encoding of name/value lists.
//!
//! ```text
//! list    := header pair*                    (19-byte header)
//! header  := magic:u8 version:u8 flags:u8 descriptors:u64 size:u64
//! pair    := type:u8 namesize:u16 datasize:u64 name NUL payload
//! nested  := pair(type=NVLIST, payload=header) pair* pop
//! pop     := pair(type=255, name="", datasize=0)
//! ```
//!
//! Integers are little-endian unless the header carries
//! [`NvFlags::BIG_ENDIAN`]. A header's `size` counts every byte that follows
//! it up to the end of the buffer, nested headers included. Descriptors are
//! never written in-band; a descriptor pair holds an index into the array
//! returned alongside the buffer.

use std::os::fd::{AsFd, BorrowedFd, OwnedFd};

use bytes::{Buf, BufMut, Bytes, BytesMut};
use tracing::debug;

use crate::error::{fail, record, NvError, Result};
use crate::nvlist::{NvList, Step};
use crate::nvpair::{copy_bytes, copy_str, NvPair, NvValue};
use crate::types::{NvFlags, NvType, NVLIST_MAX_LEVEL, NV_NAME_MAX};

pub const NVLIST_HEADER_MAGIC: u8 = 0x6c;
pub const NVLIST_HEADER_VERSION: u8 = 0x00;
pub const NVLIST_HEADER_SIZE: usize = 19;
pub const NVPAIR_HEADER_SIZE: usize = 11;

/// Pseudo type tag closing a nested list.
const NV_TYPE_NVLIST_UP: u8 = 255;
/// Pair header plus the empty, NUL-terminated name.
const POP_MARKER_SIZE: usize = NVPAIR_HEADER_SIZE + 1;

/// Byte order of multi-byte integers in a packed list.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ByteOrder {
    #[default]
    Little,
    Big,
}

/// Writer-side packing options.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PackOptions {
    pub byte_order: ByteOrder,
}

/// A packed list together with the descriptors its index fields refer to.
#[derive(Debug)]
pub struct PackedNvList<'a> {
    pub data: Bytes,
    /// Descriptors in index order: descriptor pair `i` on the wire is `descriptors[i]`.
    pub descriptors: Vec<BorrowedFd<'a>>,
}

/// Decoded list header.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NvListHeader {
    pub magic: u8,
    pub version: u8,
    pub flags: NvFlags,
    pub descriptors: u64,
    pub size: u64,
}

impl NvListHeader {
    /// Parse and validate the header at the start of `buf`.
    ///
    /// Checks magic, version and flag bits. Whether `size` and `descriptors`
    /// agree with the rest of the buffer is up to the caller.
    pub fn parse(buf: &[u8]) -> Result<Self> {
        if buf.len() < NVLIST_HEADER_SIZE {
            return fail(NvError::Malformed("truncated list header"));
        }
        let mut cur = &buf[..NVLIST_HEADER_SIZE];
        let magic = cur.get_u8();
        if magic != NVLIST_HEADER_MAGIC {
            return fail(NvError::Malformed("bad list header magic"));
        }
        let version = cur.get_u8();
        if version != NVLIST_HEADER_VERSION {
            return fail(NvError::Malformed("unsupported list header version"));
        }
        let Some(flags) = NvFlags::from_bits(cur.get_u8()) else {
            return fail(NvError::Malformed("unknown list header flags"));
        };
        let order = order_of(flags);
        Ok(Self {
            magic,
            version,
            flags,
            descriptors: get_u64(&mut cur, order),
            size: get_u64(&mut cur, order),
        })
    }

    pub fn byte_order(&self) -> ByteOrder {
        order_of(self.flags)
    }

    /// Length of the whole packed buffer this header starts.
    pub fn total_size(&self) -> u64 {
        self.size.saturating_add(NVLIST_HEADER_SIZE as u64)
    }

    fn encode(&self, dst: &mut BytesMut) {
        let order = self.byte_order();
        dst.put_u8(self.magic);
        dst.put_u8(self.version);
        dst.put_u8(self.flags.bits());
        put_u64(dst, self.descriptors, order);
        put_u64(dst, self.size, order);
    }
}

fn order_of(flags: NvFlags) -> ByteOrder {
    if flags.contains(NvFlags::BIG_ENDIAN) {
        ByteOrder::Big
    } else {
        ByteOrder::Little
    }
}

fn get_u16(cur: &mut &[u8], order: ByteOrder) -> u16 {
    match order {
        ByteOrder::Little => cur.get_u16_le(),
        ByteOrder::Big => cur.get_u16(),
    }
}

fn get_u64(cur: &mut &[u8], order: ByteOrder) -> u64 {
    match order {
        ByteOrder::Little => cur.get_u64_le(),
        ByteOrder::Big => cur.get_u64(),
    }
}

fn get_i64(cur: &mut &[u8], order: ByteOrder) -> i64 {
    match order {
        ByteOrder::Little => cur.get_i64_le(),
        ByteOrder::Big => cur.get_i64(),
    }
}

fn put_u16(dst: &mut BytesMut, value: u16, order: ByteOrder) {
    match order {
        ByteOrder::Little => dst.put_u16_le(value),
        ByteOrder::Big => dst.put_u16(value),
    }
}

fn put_u64(dst: &mut BytesMut, value: u64, order: ByteOrder) {
    match order {
        ByteOrder::Little => dst.put_u64_le(value),
        ByteOrder::Big => dst.put_u64(value),
    }
}

fn put_i64(dst: &mut BytesMut, value: i64, order: ByteOrder) {
    match order {
        ByteOrder::Little => dst.put_i64_le(value),
        ByteOrder::Big => dst.put_i64(value),
    }
}

fn put_pair_header(dst: &mut BytesMut, tag: u8, name: &str, datasize: u64, order: ByteOrder) {
    dst.put_u8(tag);
    // names are shorter than NV_NAME_MAX, so this fits
    put_u16(dst, (name.len() + 1) as u16, order);
    put_u64(dst, datasize, order);
    dst.put_slice(name.as_bytes());
    dst.put_u8(0);
}

impl NvList {
    /// Exact length of the packed form of this list.
    pub fn size(&self) -> usize {
        let mut size = NVLIST_HEADER_SIZE;
        for step in self.walk() {
            if let Step::Pair { pair, .. } = step {
                size += NVPAIR_HEADER_SIZE + pair.name().len() + 1;
                size += match pair.value() {
                    // nested pairs are counted as the walk reaches them
                    NvValue::NvList(_) => NVLIST_HEADER_SIZE + POP_MARKER_SIZE,
                    _ => pair.datasize(),
                };
            }
        }
        size
    }

    /// Pack a list that holds no descriptors, little-endian.
    pub fn pack(&self) -> Result<Bytes> {
        self.pack_with_options(PackOptions::default())
    }

    /// Pack a list that holds no descriptors.
    ///
    /// Fails with the sticky error if the list has one, and with
    /// [`NvError::NotSupported`] if it holds descriptors: those can only be
    /// packed with [`NvList::pack_with_descriptors`].
    pub fn pack_with_options(&self, opts: PackOptions) -> Result<Bytes> {
        if let Some(err) = self.error() {
            return fail(err.clone());
        }
        if self.ndescriptors() > 0 {
            return fail(NvError::NotSupported(
                "list holds descriptors; pack them out of band",
            ));
        }
        Ok(self.pack_with_descriptors(opts)?.data)
    }

    /// Pack the list and collect its descriptors in index order.
    pub fn pack_with_descriptors(&self, opts: PackOptions) -> Result<PackedNvList<'_>> {
        if let Some(err) = self.error() {
            return fail(err.clone());
        }
        let order = opts.byte_order;
        let order_flag = match order {
            ByteOrder::Little => NvFlags::empty(),
            ByteOrder::Big => NvFlags::BIG_ENDIAN,
        };
        let total = self.size();
        let mut dst = BytesMut::with_capacity(total);
        let mut descriptors = Vec::new();

        let header = |nvl: &NvList, written: usize| NvListHeader {
            magic: NVLIST_HEADER_MAGIC,
            version: NVLIST_HEADER_VERSION,
            flags: nvl.flags() | order_flag,
            descriptors: nvl.ndescriptors() as u64,
            size: (total - written - NVLIST_HEADER_SIZE) as u64,
        };
        header(self, 0).encode(&mut dst);

        for step in self.walk() {
            let pair = match step {
                Step::Pair { pair, .. } => pair,
                Step::Up => {
                    put_pair_header(&mut dst, NV_TYPE_NVLIST_UP, "", 0, order);
                    continue;
                }
            };
            let tag = pair.nv_type() as u8;
            put_pair_header(&mut dst, tag, pair.name(), pair.datasize() as u64, order);
            match pair.value() {
                NvValue::Null => {}
                NvValue::Bool(b) => dst.put_u8(u8::from(*b)),
                NvValue::Number(n) => put_u64(&mut dst, *n, order),
                NvValue::String(s) => {
                    dst.put_slice(s.as_bytes());
                    dst.put_u8(0);
                }
                NvValue::NvList(child) => header(child, dst.len()).encode(&mut dst),
                NvValue::Descriptor(fd) => {
                    put_i64(&mut dst, descriptors.len() as i64, order);
                    descriptors.push(fd.as_fd());
                }
                NvValue::Binary(b) => dst.put_slice(b),
            }
        }
        debug_assert_eq!(dst.len(), total);

        Ok(PackedNvList {
            data: dst.freeze(),
            descriptors,
        })
    }

    /// Unpack a buffer that references no descriptors.
    pub fn unpack(buf: &[u8]) -> Result<NvList> {
        Self::unpack_with_descriptors(buf, Vec::new())
    }

    /// Unpack `buf`, resolving descriptor indices against `fds`.
    ///
    /// Structural problems are returned as errors. A duplicate name yields a
    /// list whose sticky error is [`NvError::Exists`]. Descriptors that no
    /// pair references are closed.
    pub fn unpack_with_descriptors(buf: &[u8], fds: Vec<OwnedFd>) -> Result<NvList> {
        let mut unpacker = Unpacker {
            cur: buf,
            order: ByteOrder::Little,
            fds: fds.into_iter().map(Some).collect(),
        };
        match unpacker.run() {
            Ok(nvl) => {
                if let Some(err) = nvl.error() {
                    record(err);
                    debug!(%err, "unpacked nvlist carries an error");
                }
                Ok(nvl)
            }
            Err(err) => {
                record(&err);
                debug!(%err, len = buf.len(), "rejected packed nvlist");
                Err(err)
            }
        }
    }
}

struct Unpacker<'b> {
    cur: &'b [u8],
    order: ByteOrder,
    fds: Vec<Option<OwnedFd>>,
}

impl<'b> Unpacker<'b> {
    fn run(&mut self) -> Result<NvList> {
        let header = self.header()?;
        self.order = header.byte_order();
        let mut current = NvList::with_flags(header.flags & NvFlags::PUBLIC);
        // parent lists waiting for `current`, with the name it will go under
        let mut stack: Vec<(NvList, String)> = Vec::new();

        while !self.cur.is_empty() {
            let (tag, name, datasize) = self.pair_header()?;

            if tag == NV_TYPE_NVLIST_UP {
                if !name.is_empty() || datasize != 0 {
                    return Err(NvError::Malformed("malformed pop marker"));
                }
                let Some((mut parent, child_name)) = stack.pop() else {
                    return Err(NvError::Malformed("pop marker outside a nested list"));
                };
                parent.move_nvpair(NvPair::from_parts(child_name, NvValue::NvList(current)));
                current = parent;
                continue;
            }

            if name.is_empty() {
                return Err(NvError::Malformed("empty pair name"));
            }
            let Some(ty) = NvType::from_wire(tag) else {
                return Err(NvError::Malformed("unknown pair type"));
            };
            let name = copy_str(name)?;

            if ty == NvType::NvList {
                if datasize < NVLIST_HEADER_SIZE as u64 {
                    return Err(NvError::Malformed("nested list datasize too small"));
                }
                if stack.len() + 2 > NVLIST_MAX_LEVEL {
                    return Err(NvError::TooDeep {
                        max: NVLIST_MAX_LEVEL,
                    });
                }
                let header = self.header()?;
                if header.byte_order() != self.order {
                    return Err(NvError::Malformed("nested list changes byte order"));
                }
                let child = NvList::with_flags(header.flags & NvFlags::PUBLIC);
                stack.push((std::mem::replace(&mut current, child), name));
                continue;
            }

            let (payload, rest) = self.cur.split_at(datasize as usize);
            self.cur = rest;
            let value = self.value(ty, payload)?;
            current.move_nvpair(NvPair::from_parts(name, value));
        }

        if !stack.is_empty() {
            return Err(NvError::Malformed("buffer ends inside a nested list"));
        }
        Ok(current)
    }

    fn header(&mut self) -> Result<NvListHeader> {
        let header = NvListHeader::parse(self.cur)?;
        self.cur.advance(NVLIST_HEADER_SIZE);
        if header.size != self.cur.len() as u64 {
            return Err(NvError::Malformed("header size does not match buffer"));
        }
        if header.descriptors > self.fds.len() as u64 {
            return Err(NvError::Malformed(
                "header references more descriptors than supplied",
            ));
        }
        Ok(header)
    }

    /// Read a pair header and its name. `datasize` is known to fit in the buffer.
    fn pair_header(&mut self) -> Result<(u8, &'b str, u64)> {
        if self.cur.len() < NVPAIR_HEADER_SIZE {
            return Err(NvError::Malformed("truncated pair header"));
        }
        let tag = self.cur.get_u8();
        let namesize = get_u16(&mut self.cur, self.order) as usize;
        let datasize = get_u64(&mut self.cur, self.order);

        if namesize == 0 || namesize > NV_NAME_MAX {
            return Err(NvError::Malformed("invalid name size"));
        }
        let cur: &'b [u8] = self.cur;
        if cur.len() < namesize {
            return Err(NvError::Malformed("truncated pair name"));
        }
        let raw = &cur[..namesize];
        if raw.iter().position(|&b| b == 0) != Some(namesize - 1) {
            return Err(NvError::Malformed(
                "name is not terminated at its declared size",
            ));
        }
        let name = std::str::from_utf8(&raw[..namesize - 1])
            .map_err(|_| NvError::Malformed("name is not valid UTF-8"))?;
        self.cur.advance(namesize);

        if datasize > self.cur.len() as u64 {
            return Err(NvError::Malformed("payload exceeds buffer"));
        }
        Ok((tag, name, datasize))
    }

    fn value(&mut self, ty: NvType, mut payload: &[u8]) -> Result<NvValue> {
        let value = match ty {
            NvType::Null => {
                if !payload.is_empty() {
                    return Err(NvError::Malformed("null payload is not empty"));
                }
                NvValue::Null
            }
            NvType::Bool => match payload {
                [0] => NvValue::Bool(false),
                [1] => NvValue::Bool(true),
                _ => return Err(NvError::Malformed("invalid bool payload")),
            },
            NvType::Number => {
                if payload.len() != 8 {
                    return Err(NvError::Malformed("number payload is not 8 bytes"));
                }
                NvValue::Number(get_u64(&mut payload, self.order))
            }
            NvType::String => {
                let Some((&0, text)) = payload.split_last() else {
                    return Err(NvError::Malformed("string is not NUL-terminated"));
                };
                if text.contains(&0) {
                    return Err(NvError::Malformed("string contains a NUL byte"));
                }
                let text = std::str::from_utf8(text)
                    .map_err(|_| NvError::Malformed("string is not valid UTF-8"))?;
                NvValue::String(copy_str(text)?)
            }
            NvType::Binary => {
                if payload.is_empty() {
                    return Err(NvError::Malformed("binary payload is empty"));
                }
                NvValue::Binary(copy_bytes(payload)?)
            }
            NvType::Descriptor => {
                if payload.len() != 8 {
                    return Err(NvError::Malformed("descriptor payload is not 8 bytes"));
                }
                let idx = get_i64(&mut payload, self.order);
                let slot = usize::try_from(idx)
                    .ok()
                    .and_then(|idx| self.fds.get_mut(idx))
                    .ok_or(NvError::Malformed("descriptor index out of range"))?;
                let fd = slot
                    .take()
                    .ok_or(NvError::Malformed("descriptor index used twice"))?;
                NvValue::Descriptor(fd)
            }
            NvType::NvList | NvType::None => {
                return Err(NvError::Malformed("unexpected pair type"));
            }
        };
        Ok(value)
    }
}
