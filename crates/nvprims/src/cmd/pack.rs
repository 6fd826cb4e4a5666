use nvprims::nv::{ByteOrder, PackOptions};
use serde::Serialize;
use tracing::info;

use crate::cmd::PackArgs;
use crate::exit::{io_error, json_error, nv_error, CliError, CliResult, SUCCESS, USAGE};
use crate::output::{print_json, OutputFormat};

#[derive(Serialize)]
struct PackOutput {
    path: String,
    size: usize,
    pairs: usize,
    byte_order: &'static str,
}

pub fn run(args: PackArgs, format: OutputFormat) -> CliResult<i32> {
    let text = json_source(&args.json)?;
    let nvl = nvprims::json::from_str(&text).map_err(|err| json_error("parse", err))?;

    let byte_order = if args.big_endian {
        ByteOrder::Big
    } else {
        ByteOrder::Little
    };
    let packed = nvl
        .pack_with_options(PackOptions { byte_order })
        .map_err(|err| nv_error("pack", err))?;
    std::fs::write(&args.output, &packed)
        .map_err(|err| io_error(&format!("write {}", args.output.display()), err))?;
    info!(path = %args.output.display(), size = packed.len(), "wrote packed nvlist");

    let out = PackOutput {
        path: args.output.display().to_string(),
        size: packed.len(),
        pairs: nvl.len(),
        byte_order: if args.big_endian { "big" } else { "little" },
    };
    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table | OutputFormat::Pretty => {
            println!(
                "wrote {} bytes ({} pairs, {}-endian) to {}",
                out.size, out.pairs, out.byte_order, out.path
            );
        }
    }
    Ok(SUCCESS)
}

/// Inline JSON, or the contents of the file after `@`.
fn json_source(arg: &str) -> CliResult<String> {
    match arg.strip_prefix('@') {
        Some("") => Err(CliError::new(USAGE, "expected a path after '@'")),
        Some(path) => std::fs::read_to_string(path)
            .map_err(|err| io_error(&format!("read {path}"), err)),
        None => Ok(arg.to_string()),
    }
}
