use std::path::{Path, PathBuf};

use clap::{Args, Subcommand};
use nvprims::nv::NvList;
use tracing::debug;

use crate::exit::{io_error, nv_error, CliResult};
use crate::output::OutputFormat;

pub mod dump;
pub mod info;
pub mod pack;
pub mod unpack;
pub mod version;

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Print the debug dump of a packed nvlist.
    Dump(FileArgs),
    /// Show header fields and pair counts of a packed nvlist.
    Info(FileArgs),
    /// Build an nvlist from JSON and write its packed form.
    Pack(PackArgs),
    /// Print a packed nvlist as JSON.
    Unpack(FileArgs),
    /// Show version information.
    Version(VersionArgs),
}

pub fn run(command: Command, format: OutputFormat) -> CliResult<i32> {
    match command {
        Command::Dump(args) => dump::run(args),
        Command::Info(args) => info::run(args, format),
        Command::Pack(args) => pack::run(args, format),
        Command::Unpack(args) => unpack::run(args, format),
        Command::Version(args) => version::run(args),
    }
}

#[derive(Args, Debug)]
pub struct FileArgs {
    /// Packed nvlist file.
    pub path: PathBuf,
}

#[derive(Args, Debug)]
pub struct PackArgs {
    /// JSON object, or @PATH to read it from a file.
    pub json: String,
    /// Output file.
    #[arg(long, short = 'o', value_name = "FILE")]
    pub output: PathBuf,
    /// Encode integers big-endian.
    #[arg(long)]
    pub big_endian: bool,
}

#[derive(Args, Debug)]
pub struct VersionArgs {
    /// Show extended build provenance.
    #[arg(long)]
    pub extended: bool,
}

pub(crate) fn read_file(path: &Path) -> CliResult<Vec<u8>> {
    let data =
        std::fs::read(path).map_err(|err| io_error(&format!("read {}", path.display()), err))?;
    debug!(path = %path.display(), size = data.len(), "read packed nvlist");
    Ok(data)
}

/// Read and unpack `path`.
pub(crate) fn load(path: &Path) -> CliResult<NvList> {
    unpack_bytes(&read_file(path)?)
}

/// Unpack `data`. A sticky error in the result is a failure.
pub(crate) fn unpack_bytes(data: &[u8]) -> CliResult<NvList> {
    let nvl = NvList::unpack(data).map_err(|err| nv_error("unpack", err))?;
    if let Some(err) = nvl.error() {
        return Err(nv_error("unpack", err.clone()));
    }
    Ok(nvl)
}
