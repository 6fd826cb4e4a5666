use crate::cmd::{load, FileArgs};
use crate::exit::{CliResult, SUCCESS};
use crate::output::{print_json, print_json_pretty, print_pairs, OutputFormat};

pub fn run(args: FileArgs, format: OutputFormat) -> CliResult<i32> {
    let nvl = load(&args.path)?;
    match format {
        OutputFormat::Json => print_json(&nvprims::json::to_value(&nvl)),
        OutputFormat::Pretty => print_json_pretty(&nvprims::json::to_value(&nvl)),
        OutputFormat::Table => print_pairs(&nvl),
    }
    Ok(SUCCESS)
}
