//! Directory envelope for events relayed from a single-workspace endpoint.

use serde_json::{json, Value};

use super::codec::{decode_block, DATA_PREFIX};

/// Rewrap each block's data as `{directory, payload}`, the shape global
/// event consumers expect. Non-data lines and block order are preserved.
pub fn wrap_global_scope(blocks: Vec<String>, directory: &str) -> Vec<String> {
    blocks
        .into_iter()
        .map(|block| wrap_block(&block, directory))
        .collect()
}

fn wrap_block(block: &str, directory: &str) -> String {
    let payload = decode_block(block).map_or(Value::Null, Value::Object);
    let wrapped = json!({
        "directory": directory,
        "payload": payload,
    });
    let data_line = format!("{DATA_PREFIX} {wrapped}");

    let mut lines: Vec<&str> = block
        .split('\n')
        .filter(|line| !line.starts_with(DATA_PREFIX))
        .collect();
    lines.push(&data_line);
    lines.join("\n")
}
