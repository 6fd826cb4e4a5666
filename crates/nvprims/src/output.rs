use std::io::IsTerminal;

use clap::ValueEnum;
use comfy_table::{presets::UTF8_FULL, ContentArrangement, Table};
use nvprims::nv::{NvList, NvValue};
use serde::Serialize;

#[derive(Clone, Debug, Copy, ValueEnum)]
pub enum OutputFormat {
    Json,
    Table,
    Pretty,
}

impl OutputFormat {
    pub fn default_for_stdout() -> Self {
        if std::io::stdout().is_terminal() {
            Self::Table
        } else {
            Self::Json
        }
    }
}

pub fn print_json<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string(value).unwrap_or_else(|_| "{}".to_string())
    );
}

pub fn print_json_pretty<T: Serialize + ?Sized>(value: &T) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| "{}".to_string())
    );
}

/// Two-column key/value table.
pub fn print_fields(fields: &[(&str, String)]) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["FIELD", "VALUE"]);
    for (name, value) in fields {
        table.add_row(vec![name.to_string(), value.clone()]);
    }
    println!("{table}");
}

/// One row per top-level pair.
pub fn print_pairs(nvl: &NvList) {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["NAME", "TYPE", "VALUE"]);
    for pair in nvl {
        table.add_row(vec![
            pair.name().to_string(),
            pair.nv_type().to_string(),
            value_preview(pair.value()),
        ]);
    }
    println!("{table}");
}

fn value_preview(value: &NvValue) -> String {
    match value {
        NvValue::Null => "null".to_string(),
        NvValue::Bool(b) => b.to_string(),
        NvValue::Number(n) => n.to_string(),
        NvValue::String(s) => s.clone(),
        NvValue::NvList(child) => format!("<{} pairs>", child.len()),
        NvValue::Descriptor(_) => "<descriptor>".to_string(),
        NvValue::Binary(bytes) => format!("<binary {} bytes>", bytes.len()),
    }
}
