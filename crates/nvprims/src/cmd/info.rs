use nvprims::nv::{ByteOrder, NvFlags, NvListHeader, NvType};
use serde::Serialize;

use crate::cmd::{read_file, unpack_bytes, FileArgs};
use crate::exit::{nv_error, CliResult, SUCCESS};
use crate::output::{print_fields, print_json, OutputFormat};

#[derive(Serialize)]
struct InfoOutput {
    path: String,
    version: u8,
    byte_order: &'static str,
    ignore_case: bool,
    descriptors: u64,
    size: u64,
    pairs: usize,
    nested_lists: usize,
    height: usize,
}

pub fn run(args: FileArgs, format: OutputFormat) -> CliResult<i32> {
    let data = read_file(&args.path)?;
    let header = NvListHeader::parse(&data).map_err(|err| nv_error("header", err))?;
    let nvl = unpack_bytes(&data)?;

    let out = InfoOutput {
        path: args.path.display().to_string(),
        version: header.version,
        byte_order: match header.byte_order() {
            ByteOrder::Little => "little",
            ByteOrder::Big => "big",
        },
        ignore_case: header.flags.contains(NvFlags::IGNORE_CASE),
        descriptors: header.descriptors,
        size: header.total_size(),
        pairs: nvl.len(),
        nested_lists: nvl
            .iter()
            .filter(|pair| pair.nv_type() == NvType::NvList)
            .count(),
        height: nvl.height(),
    };

    match format {
        OutputFormat::Json => print_json(&out),
        OutputFormat::Table => print_fields(&fields(&out)),
        OutputFormat::Pretty => {
            println!("Packed nvlist:");
            for (name, value) in fields(&out) {
                println!("  {:<14}{value}", format!("{name}:"));
            }
        }
    }
    Ok(SUCCESS)
}

fn fields(out: &InfoOutput) -> Vec<(&'static str, String)> {
    vec![
        ("path", out.path.clone()),
        ("version", out.version.to_string()),
        ("byte order", out.byte_order.to_string()),
        ("ignore case", out.ignore_case.to_string()),
        ("descriptors", out.descriptors.to_string()),
        ("size", out.size.to_string()),
        ("pairs", out.pairs.to_string()),
        ("nested lists", out.nested_lists.to_string()),
        ("height", out.height.to_string()),
    ]
}
