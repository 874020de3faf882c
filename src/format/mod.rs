//! The format/minify/deflate pipeline: maps source files to outputs, drives
//! the frontend, and dispatches to the emit back-ends.

mod config;

pub use config::{FormatConfig, validate_config};

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use flate2::Compression;
use flate2::write::DeflateEncoder;
use sha2::{Digest, Sha256};
use thiserror::Error;
use tracing::{debug, info, trace, warn};
use walkdir::WalkDir;

use crate::frontend::{Frontend, FrontendError, ParseContext};
use crate::package::Manifest;

/// Source-file extension the pipeline picks up when walking a directory.
pub const SOURCE_EXTENSION: &str = "nit";

/// Self-unpacking prefix emitted before a deflated body. The inflater is told
/// to skip exactly this many bytes, so the length is load-bearing.
pub const DEFLATE_PREAMBLE: &str = "@(n.emit(n.raw_inflate(n.source_slice(44))))";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FormatMode {
    #[default]
    Standard,
    Minify,
    Deflate,
}

#[derive(Debug, Clone)]
pub struct FormatOptions {
    pub mode: FormatMode,
    pub source_path: PathBuf,
    pub output_path: PathBuf,
    pub config_path: Option<PathBuf>,
}

#[derive(Debug, Error)]
pub enum FormatError {
    #[error("Source path does not exist: {0}")]
    SourceMissing(PathBuf),

    #[error("Failed to load the format configuration: {0}")]
    Config(PathBuf),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: FrontendError,
    },

    #[error("Failed to format {path}: {source}")]
    Emit {
        path: PathBuf,
        #[source]
        source: FrontendError,
    },

    #[error("Temporary file already exists: {0}")]
    TemporaryExists(PathBuf),

    #[error("Unable to format {failed} of {total} source file(s)")]
    SomeFilesFailed { failed: usize, total: usize },
}

fn io_error(path: &Path) -> impl FnOnce(std::io::Error) -> FormatError + '_ {
    move |source| FormatError::Io { path: path.to_path_buf(), source }
}

/// The resolved work list: absolute (source, destination) pairs plus the
/// import name of the enclosing package, if one was found.
#[derive(Debug)]
pub struct FileMapping {
    pub pairs: Vec<(PathBuf, PathBuf)>,
    pub import_name: Option<String>,
}

/// A process-unique 16-hex-character suffix for temporary sibling files.
fn temporary_suffix(path: &Path) -> String {
    static COUNTER: AtomicU64 = AtomicU64::new(0);

    let mut hasher = Sha256::new();
    hasher.update(std::process::id().to_le_bytes());
    hasher.update(COUNTER.fetch_add(1, Ordering::Relaxed).to_le_bytes());
    hasher.update(
        std::time::SystemTime::now()
            .duration_since(std::time::UNIX_EPOCH)
            .unwrap_or_default()
            .as_nanos()
            .to_le_bytes(),
    );
    hasher.update(path.as_os_str().as_encoded_bytes());

    let digest = hasher.finalize();
    digest[..8].iter().map(|b| format!("{b:02x}")).collect()
}

fn deflate(data: &[u8]) -> Result<Vec<u8>, std::io::Error> {
    let mut encoder = DeflateEncoder::new(Vec::new(), Compression::new(9));
    encoder.write_all(data)?;
    encoder.finish()
}

/// Render one parsed source into its output bytes for the given mode.
fn render(
    tree: &crate::frontend::SyntaxTree,
    mode: FormatMode,
    config: &FormatConfig,
    src: &Path,
) -> Result<Vec<u8>, FormatError> {
    match mode {
        FormatMode::Standard => {
            let mut out = Vec::new();
            tree.write_canonical(&mut out, &config.canonical_style())
                .map_err(|source| FormatError::Emit { path: src.to_path_buf(), source })?;
            Ok(out)
        }

        FormatMode::Minify => {
            debug!("Format configuration is unused for code minification");
            Ok(tree.minified_to_vec())
        }

        FormatMode::Deflate => {
            let minified = tree.minified_to_vec();
            let deflated = deflate(&minified).map_err(io_error(src))?;

            if deflated.len() + DEFLATE_PREAMBLE.len() < minified.len() {
                let mut out = Vec::with_capacity(DEFLATE_PREAMBLE.len() + deflated.len());
                out.extend_from_slice(DEFLATE_PREAMBLE.as_bytes());
                out.extend_from_slice(&deflated);
                Ok(out)
            } else {
                // Compression did not pay for the preamble; ship the
                // minified source as-is.
                Ok(minified)
            }
        }
    }
}

fn format_file(
    frontend: &dyn Frontend,
    src: &Path,
    dst: &Path,
    mode: FormatMode,
    config: &FormatConfig,
    import_name: Option<&str>,
) -> Result<(), FormatError> {
    trace!("Formatting file: {} => {}", src.display(), dst.display());

    let source = std::fs::read_to_string(src).map_err(io_error(src))?;

    let context = ParseContext::for_file(src.display().to_string())
        .with_import_name(import_name.map(str::to_string));
    let tree = frontend
        .parse(&source, &context)
        .map_err(|source| FormatError::Parse { path: src.to_path_buf(), source })?;

    let rendered = render(&tree, mode, config, src)?;

    if let Some(parent) = dst.parent() {
        std::fs::create_dir_all(parent).map_err(io_error(dst))?;
    }

    if src == dst {
        // Rewriting in place: stage into a sibling temp file, then rename
        // over the original so readers never observe a torn file.
        let temporary = dst.with_file_name(format!(
            "{}.{}.fmt.tmp",
            dst.file_name().unwrap_or_default().to_string_lossy(),
            temporary_suffix(dst)
        ));

        if temporary.exists() {
            return Err(FormatError::TemporaryExists(temporary));
        }

        if let Err(e) = std::fs::write(&temporary, &rendered) {
            let _ = std::fs::remove_file(&temporary);
            return Err(FormatError::Io { path: temporary, source: e });
        }

        if let Err(e) = std::fs::rename(&temporary, dst) {
            warn!(
                "Failed to move the temporary file into place: {} => {}",
                temporary.display(),
                dst.display()
            );
            let _ = std::fs::remove_file(&temporary);
            return Err(FormatError::Io { path: dst.to_path_buf(), source: e });
        }

        trace!("Moved temporary file into place: {}", dst.display());
    } else {
        std::fs::write(dst, &rendered).map_err(io_error(dst))?;
    }

    debug!("Successfully formatted the source file: {}", src.display());

    Ok(())
}

/// Resolve the source path into the (source, destination) work list.
pub fn build_file_mapping(options: &FormatOptions) -> Result<FileMapping, FormatError> {
    if !options.source_path.exists() {
        return Err(FormatError::SourceMissing(options.source_path.clone()));
    }

    let source_path = options
        .source_path
        .canonicalize()
        .map_err(io_error(&options.source_path))?;

    if !source_path.is_dir() {
        trace!("Source path is a file: {}", source_path.display());

        // Resolve the destination so that formatting a file onto itself is
        // recognized as an in-place rewrite.
        let output_path = options
            .output_path
            .canonicalize()
            .unwrap_or_else(|_| options.output_path.clone());

        return Ok(FileMapping {
            pairs: vec![(source_path, output_path)],
            import_name: None,
        });
    }

    trace!("Source path is a directory: {}", source_path.display());

    std::fs::create_dir_all(&options.output_path).map_err(io_error(&options.output_path))?;
    let output_path = options
        .output_path
        .canonicalize()
        .map_err(io_error(&options.output_path))?;

    // A valid manifest at the source root names the package the files
    // belong to; the frontend resolves imports against it.
    let import_name = std::fs::read_to_string(source_path.join("no3.json"))
        .ok()
        .and_then(|text| Manifest::from_json(&text))
        .map(|manifest| manifest.name);

    let mut pairs = Vec::new();
    for entry in WalkDir::new(&source_path) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("Failed to access directory entry: {e}");
                continue;
            }
        };

        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(SOURCE_EXTENSION) {
            trace!("Skipping non-source file: {}", path.display());
            continue;
        }

        let relative = path.strip_prefix(&source_path).unwrap_or(path);
        pairs.push((path.to_path_buf(), output_path.join(relative)));
    }

    pairs.sort();

    for (src, dst) in &pairs {
        trace!("Mapping [{}] = {}", dst.display(), src.display());
    }

    Ok(FileMapping { pairs, import_name })
}

fn resolve_config(
    options: &FormatOptions,
    source_is_dir: bool,
) -> Result<FormatConfig, FormatError> {
    let mut config_path = options.config_path.clone();

    // A format.json at the source root applies when no explicit config was
    // given on the command line.
    if config_path.is_none() && source_is_dir {
        let implicit = options.source_path.join("format.json");
        if implicit.exists() {
            debug!(
                "Using the format configuration file in the source directory: {}",
                implicit.display()
            );
            config_path = Some(implicit);
        }
    }

    match config_path {
        Some(path) => FormatConfig::from_file(&path).ok_or(FormatError::Config(path)),
        None => Ok(FormatConfig::default()),
    }
}

/// Run the whole pipeline. Per-file failures are logged and counted; the
/// command fails if any file failed.
pub fn run(frontend: &dyn Frontend, options: &FormatOptions) -> Result<(), FormatError> {
    let config = resolve_config(options, options.source_path.is_dir())?;
    let mapping = build_file_mapping(options)?;

    if mapping.pairs.is_empty() {
        warn!("No source files found to format.");
        return Ok(());
    }

    debug!("Formatting {} source file(s)", mapping.pairs.len());
    if let Some(import_name) = &mapping.import_name {
        trace!("Current package name: {import_name}");
    }

    let total = mapping.pairs.len();
    let mut failed = 0usize;

    for (src, dst) in &mapping.pairs {
        match format_file(
            frontend,
            src,
            dst,
            options.mode,
            &config,
            mapping.import_name.as_deref(),
        ) {
            Ok(()) => {
                info!("Formatted {} => {}", src.display(), dst.display());
            }
            Err(e) => {
                warn!("Unable to format {}: {e}", src.display());
                failed += 1;
            }
        }
    }

    if failed > 0 {
        return Err(FormatError::SomeFilesFailed { failed, total });
    }

    info!("Successfully formatted {total} source file(s)");

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontend::TokenFrontend;
    use std::io::Read;

    #[test]
    fn test_preamble_is_exactly_44_bytes() {
        assert_eq!(DEFLATE_PREAMBLE.len(), 44);
    }

    #[test]
    fn test_temporary_suffix_shape() {
        let a = temporary_suffix(Path::new("/tmp/a.nit"));
        let b = temporary_suffix(Path::new("/tmp/a.nit"));
        assert_eq!(a.len(), 16);
        assert!(a.bytes().all(|c| c.is_ascii_hexdigit()));
        assert_ne!(a, b);
    }

    fn render_source(source: &str, mode: FormatMode) -> Vec<u8> {
        let tree = TokenFrontend
            .parse(source, &ParseContext::for_file("t.nit"))
            .unwrap();
        render(&tree, mode, &FormatConfig::default(), Path::new("t.nit")).unwrap()
    }

    #[test]
    fn test_deflate_small_input_falls_back_to_minified() {
        // Too small for compression to beat the 44-byte preamble.
        let out = render_source("ret 0;", FormatMode::Deflate);
        assert_eq!(out, render_source("ret 0;", FormatMode::Minify));
    }

    #[test]
    fn test_deflate_large_input_gets_preamble() {
        let source = "fn f() { print(\"aaaaaaaaaaaaaaaa\"); }\n".repeat(64);
        let out = render_source(&source, FormatMode::Deflate);
        assert!(out.starts_with(DEFLATE_PREAMBLE.as_bytes()));
        assert!(out.len() < render_source(&source, FormatMode::Minify).len());

        // The body after the preamble is raw deflate of the minified source.
        let mut inflater = flate2::read::DeflateDecoder::new(&out[44..]);
        let mut inflated = Vec::new();
        inflater.read_to_end(&mut inflated).unwrap();
        assert_eq!(inflated, render_source(&source, FormatMode::Minify));
    }

    #[test]
    fn test_format_file_in_place_is_atomic() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("a.nit");
        std::fs::write(&path, "fn main(){ret 0;}").unwrap();

        format_file(
            &TokenFrontend,
            &path,
            &path,
            FormatMode::Standard,
            &FormatConfig::default(),
            None,
        )
        .unwrap();

        let formatted = std::fs::read_to_string(&path).unwrap();
        assert_eq!(formatted, "fn main() {\n  ret 0;\n}\n");

        // No temp file left behind.
        let leftovers: Vec<_> = std::fs::read_dir(dir.path())
            .unwrap()
            .map(|e| e.unwrap().file_name())
            .collect();
        assert_eq!(leftovers, ["a.nit"]);
    }

    #[test]
    fn test_parse_failure_removes_nothing_and_fails(){
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.nit");
        std::fs::write(&path, "\"unterminated").unwrap();

        let err = format_file(
            &TokenFrontend,
            &path,
            &path,
            FormatMode::Standard,
            &FormatConfig::default(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, FormatError::Parse { .. }));

        // Original content untouched.
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "\"unterminated");
    }

    #[test]
    fn test_directory_mapping_and_run() {
        let dir = tempfile::tempdir().unwrap();
        let src_root = dir.path().join("pkg");
        std::fs::create_dir_all(src_root.join("src/nested")).unwrap();
        std::fs::write(src_root.join("src/main.nit"), "fn main(){ret 0;}").unwrap();
        std::fs::write(src_root.join("src/nested/util.nit"), "fn u(){}").unwrap();
        std::fs::write(src_root.join("README.md"), "not source").unwrap();

        let out_root = dir.path().join("out");
        let options = FormatOptions {
            mode: FormatMode::Standard,
            source_path: src_root.clone(),
            output_path: out_root.clone(),
            config_path: None,
        };

        let mapping = build_file_mapping(&options).unwrap();
        assert_eq!(mapping.pairs.len(), 2);
        assert!(mapping.import_name.is_none());

        run(&TokenFrontend, &options).unwrap();
        assert!(out_root.join("src/main.nit").exists());
        assert!(out_root.join("src/nested/util.nit").exists());
        assert!(!out_root.join("README.md").exists());
    }

    #[test]
    fn test_directory_manifest_supplies_import_name() {
        let dir = tempfile::tempdir().unwrap();
        let src_root = dir.path().join("pkg");
        std::fs::create_dir_all(&src_root).unwrap();

        let manifest = crate::package::Manifest::new(
            "@gh-user/example",
            crate::package::Category::Library,
        )
        .with_license("MIT");
        std::fs::write(src_root.join("no3.json"), manifest.to_json(false).text).unwrap();

        let options = FormatOptions {
            mode: FormatMode::Minify,
            source_path: src_root.clone(),
            output_path: src_root.clone(),
            config_path: None,
        };
        let mapping = build_file_mapping(&options).unwrap();
        assert_eq!(mapping.import_name.as_deref(), Some("@gh-user/example"));
    }

    #[test]
    fn test_per_file_failures_are_counted() {
        let dir = tempfile::tempdir().unwrap();
        let src_root = dir.path().join("pkg");
        std::fs::create_dir_all(&src_root).unwrap();
        std::fs::write(src_root.join("good.nit"), "ret 0;").unwrap();
        std::fs::write(src_root.join("bad.nit"), "/* open").unwrap();

        let options = FormatOptions {
            mode: FormatMode::Minify,
            source_path: src_root.clone(),
            output_path: dir.path().join("out"),
            config_path: None,
        };

        let err = run(&TokenFrontend, &options).unwrap_err();
        match err {
            FormatError::SomeFilesFailed { failed, total } => {
                assert_eq!((failed, total), (1, 2));
            }
            other => panic!("unexpected error: {other}"),
        }

        // The good file was still written.
        assert!(dir.path().join("out/good.nit").exists());
    }

    #[test]
    fn test_missing_source_is_an_error() {
        let options = FormatOptions {
            mode: FormatMode::Standard,
            source_path: PathBuf::from("/nonexistent/path.nit"),
            output_path: PathBuf::from("/nonexistent/out.nit"),
            config_path: None,
        };
        assert!(matches!(
            build_file_mapping(&options),
            Err(FormatError::SourceMissing(_))
        ));
    }
}
