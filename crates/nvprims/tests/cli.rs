#![cfg(all(unix, feature = "cli"))]

use std::path::{Path, PathBuf};
use std::process::{Command, Output};

use nvprims::nv::{NvList, NvListHeader};

fn unique_temp_dir(tag: &str) -> PathBuf {
    let dir = std::env::temp_dir().join(format!(
        "nvcli-{tag}-{}-{}",
        std::process::id(),
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .expect("time should be after epoch")
            .as_nanos()
    ));
    std::fs::create_dir_all(&dir).expect("temp dir should be creatable");
    dir
}

fn nvprims(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_nvprims"))
        .arg("--log-level")
        .arg("error")
        .args(args)
        .output()
        .expect("nvprims should run")
}

fn path_str(path: &Path) -> &str {
    path.to_str().expect("temp path should be UTF-8")
}

const CONFIG: &str = r#"{
    "device": "ixl0",
    "num_vfs": 4,
    "VF-0": { "passthrough": true, "mac-addr": [2, 0, 0, 0, 0, 1] }
}"#;

#[test]
fn pack_writes_a_buffer_the_library_reads() {
    let dir = unique_temp_dir("pack");
    let out = dir.join("config.nv");

    let output = nvprims(&["--format", "json", "pack", CONFIG, "-o", path_str(&out)]);
    assert!(output.status.success(), "{output:?}");
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("\"pairs\":3"));

    let data = std::fs::read(&out).expect("packed file should exist");
    let nvl = NvList::unpack(&data).expect("packed file should unpack");
    assert_eq!(nvl.get_string("device"), "ixl0");
    assert_eq!(nvl.get_number("num_vfs"), 4);
    assert!(nvl.get_nvlist("VF-0").get_bool("passthrough"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn big_endian_flag_sets_header_bit() {
    let dir = unique_temp_dir("be");
    let out = dir.join("be.nv");

    let output = nvprims(&["pack", CONFIG, "-o", path_str(&out), "--big-endian"]);
    assert!(output.status.success(), "{output:?}");

    let data = std::fs::read(&out).unwrap();
    let header = NvListHeader::parse(&data).unwrap();
    assert_eq!(header.flags.bits() & 0x01, 0x01);

    let info = nvprims(&["--format", "json", "info", path_str(&out)]);
    assert!(info.status.success());
    let stdout = String::from_utf8_lossy(&info.stdout);
    assert!(stdout.contains("\"byte_order\":\"big\""));
    assert!(stdout.contains("\"pairs\":3"));
    assert!(stdout.contains("\"height\":2"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn dump_prints_indented_pairs() {
    let dir = unique_temp_dir("dump");
    let out = dir.join("dump.nv");
    assert!(nvprims(&["pack", CONFIG, "-o", path_str(&out)]).status.success());

    let output = nvprims(&["dump", path_str(&out)]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("device (STRING): [ixl0]\n"));
    assert!(stdout.contains("num_vfs (NUMBER): 4 (4) (0x4)\n"));
    assert!(stdout.contains("VF-0 (NVLIST):\n    passthrough (BOOL): TRUE\n"));
    assert!(stdout.contains("    mac-addr (BINARY): 6 020000000001\n"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn unpack_round_trips_json() {
    let dir = unique_temp_dir("unpack");
    let out = dir.join("rt.nv");
    assert!(nvprims(&["pack", CONFIG, "-o", path_str(&out)]).status.success());

    let output = nvprims(&["--format", "json", "unpack", path_str(&out)]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout.trim(),
        r#"{"device":"ixl0","num_vfs":4,"VF-0":{"passthrough":true,"mac-addr":[2,0,0,0,0,1]}}"#
    );

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn pack_reads_json_from_file() {
    let dir = unique_temp_dir("at-path");
    let src = dir.join("config.json");
    let out = dir.join("config.nv");
    std::fs::write(&src, CONFIG).unwrap();

    let arg = format!("@{}", src.display());
    let output = nvprims(&["pack", &arg, "-o", path_str(&out)]);
    assert!(output.status.success(), "{output:?}");
    assert!(out.exists());

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn malformed_file_exits_60() {
    let dir = unique_temp_dir("malformed");
    let bad = dir.join("bad.nv");
    std::fs::write(&bad, b"definitely not an nvlist").unwrap();

    let output = nvprims(&["dump", path_str(&bad)]);
    assert_eq!(output.status.code(), Some(60));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("malformed packed nvlist"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn duplicate_keys_in_file_exit_60() {
    let dir = unique_temp_dir("dup");
    let path = dir.join("dup.nv");

    let mut nvl = NvList::new();
    nvl.add_null("ka");
    nvl.add_null("kb");
    let mut data = nvl.pack().unwrap().to_vec();
    let pos = data.windows(3).position(|w| w == b"kb\0").unwrap();
    data[pos + 1] = b'a';
    std::fs::write(&path, &data).unwrap();

    let output = nvprims(&["unpack", path_str(&path)]);
    assert_eq!(output.status.code(), Some(60));
    assert!(String::from_utf8_lossy(&output.stderr).contains("already exists"));

    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn unsupported_json_exits_60() {
    let dir = unique_temp_dir("badjson");
    let out = dir.join("x.nv");
    let output = nvprims(&["pack", r#"{"n": -5}"#, "-o", path_str(&out)]);
    assert_eq!(output.status.code(), Some(60));
    assert!(!out.exists());
    let _ = std::fs::remove_dir_all(&dir);
}

#[test]
fn missing_file_exits_1() {
    let output = nvprims(&["info", "/nonexistent/nvprims/file.nv"]);
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn unknown_subcommand_exits_64() {
    let output = nvprims(&["frobnicate"]);
    assert_eq!(output.status.code(), Some(64));
}

#[test]
fn version_prints_package_version() {
    let output = nvprims(&["version"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout.trim(),
        format!("nvprims {}", env!("CARGO_PKG_VERSION"))
    );

    let extended = nvprims(&["version", "--extended"]);
    assert!(String::from_utf8_lossy(&extended.stdout).contains("max nesting 6"));
}
