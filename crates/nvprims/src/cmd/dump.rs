use crate::cmd::{load, FileArgs};
use crate::exit::{io_error, CliResult, SUCCESS};

pub fn run(args: FileArgs) -> CliResult<i32> {
    let nvl = load(&args.path)?;
    nvl.dump(&mut std::io::stdout().lock())
        .map_err(|err| io_error("write dump", err))?;
    Ok(SUCCESS)
}
