//! # Rendering
//!
//! Handlers return an [`Output`] value; this module turns it into text or JSON.
//! Styling goes through `console`, which drops colors when stdout is not a terminal,
//! so piped text output stays plain.

use attrdir::container::ObjectInfo;
use attrdir::model::AttrInfo;
use console::style;
use serde::Serialize;
use serde_json::{json, Value};
use std::fmt::Write;

/// Attribute metadata as shown by `attrdir info`.
#[derive(Debug, Clone, Serialize)]
pub struct AttrReport {
    pub name: String,
    pub creation_order: Option<u64>,
    pub charset: String,
    pub data_size: u64,
    pub element_size: usize,
    pub dims: Vec<u64>,
}

#[derive(Debug, Clone)]
pub enum Output {
    Message(String),
    Objects(Vec<ObjectInfo>),
    Attributes {
        object: String,
        entries: Vec<(String, AttrInfo)>,
    },
    Value {
        name: String,
        bytes: Vec<u8>,
    },
    Info(AttrReport),
    Exists {
        name: String,
        exists: bool,
    },
    Count {
        object: String,
        count: usize,
        mode: String,
    },
}

pub fn render(output: &Output, as_json: bool) -> String {
    if as_json {
        let mut text = serde_json::to_string_pretty(&to_json(output)).unwrap_or_default();
        text.push('\n');
        text
    } else {
        render_text(output)
    }
}

fn to_json(output: &Output) -> Value {
    match output {
        Output::Message(msg) => json!({ "message": msg }),
        Output::Objects(objects) => json!({ "objects": objects }),
        Output::Attributes { object, entries } => json!({
            "object": object,
            "attributes": entries
                .iter()
                .map(|(name, info)| json!({
                    "name": name,
                    "creation_order": info.corder_valid.then_some(info.creation_order),
                    "charset": info.charset,
                    "data_size": info.data_size,
                }))
                .collect::<Vec<_>>(),
        }),
        Output::Value { name, bytes } => json!({ "name": name, "hex": to_hex(bytes) }),
        Output::Info(report) => json!(report),
        Output::Exists { name, exists } => json!({ "name": name, "exists": exists }),
        Output::Count {
            object,
            count,
            mode,
        } => json!({ "object": object, "count": count, "storage": mode }),
    }
}

fn render_text(output: &Output) -> String {
    let mut out = String::new();
    match output {
        Output::Message(msg) => {
            let _ = writeln!(out, "{}", msg);
        }
        Output::Objects(objects) => {
            for obj in objects {
                let _ = writeln!(
                    out,
                    "{:<10} {} {}",
                    style(obj.kind.to_string()).dim(),
                    style(&obj.path).bold(),
                    style(format!("({} attributes)", obj.attributes)).dim()
                );
            }
        }
        Output::Attributes { object, entries } => {
            if entries.is_empty() {
                let _ = writeln!(out, "No attributes on {}", object);
            }
            for (name, info) in entries {
                let order = if info.corder_valid {
                    format!("#{}", info.creation_order)
                } else {
                    "-".to_string()
                };
                let _ = writeln!(
                    out,
                    "{:>5}  {}  {}",
                    style(order).yellow(),
                    name,
                    style(format!("{} bytes", info.data_size)).dim()
                );
            }
        }
        Output::Value { bytes, .. } => {
            let _ = writeln!(out, "{}", to_hex(bytes));
        }
        Output::Info(report) => {
            let order = report
                .creation_order
                .map(|o| o.to_string())
                .unwrap_or_else(|| "untracked".to_string());
            let dims = if report.dims.is_empty() {
                "scalar".to_string()
            } else {
                report
                    .dims
                    .iter()
                    .map(u64::to_string)
                    .collect::<Vec<_>>()
                    .join("x")
            };
            let _ = writeln!(out, "{}", style(&report.name).bold());
            let _ = writeln!(out, "  creation order: {}", order);
            let _ = writeln!(out, "  charset:        {}", report.charset);
            let _ = writeln!(out, "  element size:   {}", report.element_size);
            let _ = writeln!(out, "  dims:           {}", dims);
            let _ = writeln!(out, "  data size:      {}", report.data_size);
        }
        Output::Exists { exists, .. } => {
            let _ = writeln!(out, "{}", exists);
        }
        Output::Count { count, .. } => {
            let _ = writeln!(out, "{}", count);
        }
    }
    out
}

pub fn to_hex(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

pub fn from_hex(text: &str) -> Result<Vec<u8>, String> {
    let text = text.trim().trim_start_matches("0x");
    hex::decode(text).map_err(|e| format!("Invalid hex value {}: {}", text, e))
}
