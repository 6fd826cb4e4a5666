use crate::cmd::VersionArgs;
use crate::exit::{CliResult, SUCCESS};

pub fn run(args: VersionArgs) -> CliResult<i32> {
    if !args.extended {
        println!("nvprims {}", env!("CARGO_PKG_VERSION"));
        return Ok(SUCCESS);
    }

    println!("name: nvprims");
    println!("version: {}", env!("CARGO_PKG_VERSION"));
    println!(
        "target: {}",
        option_env!("NVPRIMS_BUILD_TARGET").unwrap_or("unknown")
    );
    println!("target_os: {}", std::env::consts::OS);
    println!("target_arch: {}", std::env::consts::ARCH);
    println!(
        "nvlist: header v{}, max nesting {}, max name {} bytes",
        nvprims::nv::NVLIST_HEADER_VERSION,
        nvprims::nv::NVLIST_MAX_LEVEL,
        nvprims::nv::NV_NAME_MAX - 1
    );

    Ok(SUCCESS)
}
