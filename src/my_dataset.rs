use std::path::Path;

use anyhow::{anyhow, Result};
use serde::Deserialize;

use crate::my_logger::prelude::*;

#[derive(Debug, Clone, Eq, PartialEq)]
pub struct LabeledMessage {
    pub text: String,
    pub label: String,
}

const LABEL_COLUMN: &str = "target";

/// Raw message text in the first column, label in the "target" column.
pub fn load_csv_dataset(path: &Path) -> Result<Vec<LabeledMessage>> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_path(path)
        .map_err(|e| anyhow!("can not open {}: {}", path.display(), e))?;
    let label_index = reader.headers()?
        .iter()
        .position(|name| name == LABEL_COLUMN)
        .ok_or_else(|| anyhow!("{} has no \"{}\" column", path.display(), LABEL_COLUMN))?;

    let mut messages = Vec::new();
    for (i, record) in reader.records().enumerate() {
        let record = record?;
        let text = record.get(0).unwrap_or_default();
        let label = record.get(label_index)
            .ok_or_else(|| anyhow!("row {} of {} has no label", i + 1, path.display()))?;
        messages.push(LabeledMessage {
            text: text.to_string(),
            label: label.to_string(),
        });
    }
    info!("{} messages are loaded from {}", messages.len(), path.display());
    Ok(messages)
}

#[derive(Debug, Deserialize)]
struct JsonMessage {
    text: String,
}

/// One JSON object with a "text" field per file, all labelled as spam.
pub fn load_json_dir_dataset(dir: &Path) -> Result<Vec<LabeledMessage>> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| anyhow!("can not read directory {}: {}", dir.display(), e))? {
        let path = entry?.path();
        if path.is_file() {
            paths.push(path);
        }
    }
    paths.sort(); // directory order is not reproducible

    let mut messages = Vec::with_capacity(paths.len());
    for path in paths {
        let s = std::fs::read_to_string(&path)
            .map_err(|e| anyhow!("can not read {}: {}", path.display(), e))?;
        let json: JsonMessage = serde_json::from_str(&s)
            .map_err(|e| anyhow!("invalid JSON in {}: {}", path.display(), e))?;
        messages.push(LabeledMessage {
            text: json.text,
            label: "1".to_string(),
        });
    }
    info!("{} messages are loaded from {}", messages.len(), dir.display());
    Ok(messages)
}

/// A directory is read as JSON files, anything else as CSV.
pub fn load_dataset(path: &Path) -> Result<Vec<LabeledMessage>> {
    if path.is_dir() {
        load_json_dir_dataset(path)
    } else {
        load_csv_dataset(path)
    }
}
