//! Format configuration file (`format.json`) loading and validation.
//!
//! The schema is closed: unknown keys anywhere in the document are rejected.
//! Defaults are merged in only after the user's document validates.

use std::path::Path;

use serde_json::{Value, json};
use tracing::{debug, trace};

use crate::frontend::CanonicalStyle;

macro_rules! schema_check {
    ($cond:expr, $what:expr) => {
        if !($cond) {
            debug!("Invalid format configuration: schema check failed: {}", $what);
            return false;
        }
    };
}

fn validate_comment_style(value: &Value, convert_key: &str) -> bool {
    schema_check!(value.is_object(), "comment style is not an object");

    for (key, entry) in value.as_object().unwrap() {
        match key.as_str() {
            "start" | "end" => {
                schema_check!(entry.is_string(), "comment marker");
            }
            key if key == convert_key => {
                schema_check!(entry.is_boolean(), "comment conversion flag");
            }
            other => {
                debug!("Invalid format configuration: unknown comment key \"{other}\"");
                return false;
            }
        }
    }

    true
}

/// Validate a parsed configuration document against the closed schema.
pub fn validate_config(document: &Value) -> bool {
    trace!("Validating the format configuration document");

    schema_check!(document.is_object(), "root is not an object");

    {
        let Some(version) = document.get("version") else {
            debug!("Invalid format configuration: missing \"version\"");
            return false;
        };
        schema_check!(version.is_object(), "version is not an object");
        schema_check!(
            version.get("major").is_some_and(Value::is_u64),
            "version major"
        );
        schema_check!(
            version.get("minor").is_some_and(Value::is_u64),
            "version minor"
        );
        schema_check!(version["major"].as_u64() == Some(1), "supported major version");
        schema_check!(version["minor"].as_u64() == Some(0), "supported minor version");
    }

    for (key, value) in document.as_object().unwrap() {
        match key.as_str() {
            "version" => {}
            "whitespace" => {
                schema_check!(value.is_object(), "whitespace is not an object");
                for (key, entry) in value.as_object().unwrap() {
                    schema_check!(key == "indentation", "unknown whitespace key");
                    schema_check!(entry.is_object(), "indentation is not an object");
                    schema_check!(
                        entry.get("size").is_some_and(Value::is_u64),
                        "indentation size"
                    );
                    schema_check!(
                        entry.get("byte").is_some_and(Value::is_string),
                        "indentation byte"
                    );
                }
            }
            "comments" => {
                schema_check!(value.is_object(), "comments is not an object");
                for (key, entry) in value.as_object().unwrap() {
                    match key.as_str() {
                        "line" => {
                            if !validate_comment_style(entry, "convert-to-block") {
                                return false;
                            }
                        }
                        "block" => {
                            if !validate_comment_style(entry, "convert-to-line") {
                                return false;
                            }
                        }
                        other => {
                            debug!("Invalid format configuration: unknown comments key \"{other}\"");
                            return false;
                        }
                    }
                }
            }
            other => {
                debug!("Invalid format configuration: unknown key \"{other}\"");
                return false;
            }
        }
    }

    trace!("The format configuration document is valid");

    true
}

fn merge_defaults(document: &mut Value) {
    let defaults = json!({
        "whitespace": {
            "indentation": { "size": 2, "byte": " " }
        },
        "comments": {
            "line": { "start": "//", "end": "", "convert-to-block": true },
            "block": { "start": "/*", "end": "*/", "convert-to-line": false }
        }
    });

    fn merge(target: &mut Value, defaults: &Value) {
        if let (Some(target), Some(defaults)) = (target.as_object_mut(), defaults.as_object()) {
            for (key, default_value) in defaults {
                match target.get_mut(key) {
                    Some(existing) => merge(existing, default_value),
                    None => {
                        target.insert(key.clone(), default_value.clone());
                    }
                }
            }
        }
    }

    merge(document, &defaults);
}

/// A validated format configuration with defaults applied.
#[derive(Debug, Clone)]
pub struct FormatConfig {
    document: Value,
}

impl Default for FormatConfig {
    fn default() -> Self {
        let mut document = json!({ "version": { "major": 1, "minor": 0 } });
        merge_defaults(&mut document);
        Self { document }
    }
}

impl FormatConfig {
    /// Parse and validate a configuration document from text. None on
    /// malformed JSON or schema failure.
    pub fn from_text(text: &str) -> Option<Self> {
        let mut document: Value = match serde_json::from_str(text) {
            Ok(document) => document,
            Err(e) => {
                debug!("Failed to parse the format configuration: {e}");
                return None;
            }
        };

        if !validate_config(&document) {
            return None;
        }

        merge_defaults(&mut document);

        Some(Self { document })
    }

    pub fn from_file(path: &Path) -> Option<Self> {
        trace!("Loading the format configuration file: {}", path.display());

        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                debug!(
                    "Failed to read the format configuration file {}: {e}",
                    path.display()
                );
                return None;
            }
        };

        Self::from_text(&text)
    }

    /// Indentation settings for the canonical emitter.
    pub fn canonical_style(&self) -> CanonicalStyle {
        let indentation = &self.document["whitespace"]["indentation"];
        let size = indentation["size"].as_u64().unwrap_or(2) as usize;
        let byte = indentation["byte"].as_str().unwrap_or(" ");

        CanonicalStyle { indent_unit: byte.repeat(size) }
    }
}
