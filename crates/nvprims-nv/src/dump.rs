//! Human-readable rendering for diagnostics.

use std::fmt;
use std::io;
use std::os::fd::AsRawFd;

use crate::nvlist::{NvList, Step};
use crate::nvpair::NvValue;

impl NvList {
    /// Write the [`Display`](fmt::Display) rendering of the list to `out`.
    pub fn dump<W: io::Write>(&self, out: &mut W) -> io::Result<()> {
        write!(out, "{self}")?;
        out.flush()
    }
}

/// One line per pair, `name (TYPE): value`, nested lists indented by four
/// spaces per level. A list with a sticky error renders as `error: <errno>`.
impl fmt::Display for NvList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.error().is_some() {
            return writeln!(f, "error: {}", self.errno());
        }
        for step in self.walk() {
            let Step::Pair { pair, depth } = step else {
                continue;
            };
            write!(
                f,
                "{:indent$}{} ({}):",
                "",
                pair.name(),
                pair.nv_type(),
                indent = depth * 4
            )?;
            match pair.value() {
                NvValue::Null => writeln!(f, " null")?,
                NvValue::Bool(b) => writeln!(f, " {}", if *b { "TRUE" } else { "FALSE" })?,
                NvValue::Number(n) => writeln!(f, " {n} ({}) ({n:#x})", *n as i64)?,
                NvValue::String(s) => writeln!(f, " [{s}]")?,
                NvValue::NvList(_) => writeln!(f)?,
                NvValue::Descriptor(fd) => writeln!(f, " {}", fd.as_raw_fd())?,
                NvValue::Binary(bytes) => {
                    write!(f, " {} ", bytes.len())?;
                    for byte in bytes {
                        write!(f, "{byte:02x}")?;
                    }
                    writeln!(f)?;
                }
            }
        }
        Ok(())
    }
}
