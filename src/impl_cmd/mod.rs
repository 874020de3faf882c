//! Developer-facing `impl` subcommands: manifest round-trip checking and
//! parse-tree dumps.

use std::io::Write;
use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::driver::Driver;
use crate::frontend::{FrontendError, ParseContext};
use crate::package::Manifest;

#[derive(Debug, Error)]
pub enum ImplError {
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Manifest file schema is incorrect: {0}")]
    InvalidManifest(PathBuf),

    #[error("Unknown output format: {0:?}")]
    UnknownFormat(String),

    #[error("Failed to parse {failed} of {total} source file(s)")]
    SomeFilesFailed { failed: usize, total: usize },
}

/// Serialized parse-tree representations for `impl parse`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputFormat {
    #[default]
    Json,
    Protobuf,
    Minify,
}

impl OutputFormat {
    pub fn from_str(value: &str) -> Result<Self, ImplError> {
        match value {
            "json" => Ok(OutputFormat::Json),
            "protobuf" => Ok(OutputFormat::Protobuf),
            "minify" => Ok(OutputFormat::Minify),
            other => Err(ImplError::UnknownFormat(other.to_string())),
        }
    }
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> ImplError + '_ {
    move |source| ImplError::Io { path: path.to_path_buf(), source }
}

/// Writer for `--output`: `-` is stdout, anything else a truncated file.
fn open_output(output: &str) -> Result<Box<dyn Write>, ImplError> {
    if output == "-" {
        return Ok(Box::new(std::io::stdout().lock()));
    }

    let path = PathBuf::from(output);
    let file = std::fs::File::create(&path).map_err(io_error(&path))?;
    Ok(Box::new(file))
}

/// Parse + validate a manifest file, then re-encode it to the output.
pub fn config_check(manifest_file: &Path, minify: bool, output: &str) -> Result<(), ImplError> {
    let text = std::fs::read_to_string(manifest_file).map_err(io_error(manifest_file))?;

    let Some(manifest) = Manifest::from_json(&text) else {
        return Err(ImplError::InvalidManifest(manifest_file.to_path_buf()));
    };

    let encoded = manifest.to_json(minify);
    if !encoded.correct_schema {
        return Err(ImplError::InvalidManifest(manifest_file.to_path_buf()));
    }

    let mut out = open_output(output)?;
    out.write_all(encoded.text.as_bytes())
        .and_then(|_| out.write_all(b"\n"))
        .map_err(io_error(Path::new(output)))?;

    debug!("Manifest file schema is correct: {}", manifest_file.display());

    Ok(())
}

fn dump_tree(
    driver: &Driver,
    source_path: &Path,
    format: OutputFormat,
    tracking: bool,
    out: &mut dyn Write,
) -> Result<(), ImplError> {
    let source = std::fs::read_to_string(source_path).map_err(io_error(source_path))?;

    let context =
        ParseContext::for_file(source_path.display().to_string()).with_tracking(tracking);
    let tree = driver.frontend().parse(&source, &context).map_err(|e| match e {
        FrontendError::Io(source) => ImplError::Io { path: source_path.to_path_buf(), source },
        other => {
            warn!("{other}");
            ImplError::SomeFilesFailed { failed: 1, total: 1 }
        }
    })?;

    match format {
        OutputFormat::Json => {
            serde_json::to_writer_pretty(&mut *out, &tree.to_json_value())
                .map_err(|e| ImplError::Io {
                    path: source_path.to_path_buf(),
                    source: e.into(),
                })?;
            out.write_all(b"\n").map_err(io_error(source_path))?;
        }
        OutputFormat::Protobuf => {
            out.write_all(&tree.to_protobuf()).map_err(io_error(source_path))?;
        }
        OutputFormat::Minify => {
            tree.write_minified(out).map_err(|e| match e {
                FrontendError::Io(source) => {
                    ImplError::Io { path: source_path.to_path_buf(), source }
                }
                other => {
                    warn!("{other}");
                    ImplError::SomeFilesFailed { failed: 1, total: 1 }
                }
            })?;
            out.write_all(b"\n").map_err(io_error(source_path))?;
        }
    }

    Ok(())
}

/// Parse each source file and dump its tree. Per-file failures are logged;
/// the command fails if any file failed.
pub fn parse_sources(
    driver: &Driver,
    sources: &[PathBuf],
    format: OutputFormat,
    tracking: bool,
    output: &str,
) -> Result<(), ImplError> {
    let mut out = open_output(output)?;
    let mut failed = 0usize;

    for source_path in sources {
        match dump_tree(driver, source_path, format, tracking, out.as_mut()) {
            Ok(()) => info!("Parsed {}", source_path.display()),
            Err(e) => {
                warn!("Unable to parse {}: {e}", source_path.display());
                failed += 1;
            }
        }
    }

    if failed > 0 {
        return Err(ImplError::SomeFilesFailed { failed, total: sources.len() });
    }

    Ok(())
}
