//! The "initialize new package" workflow: materialize the on-disk layout,
//! write the manifest, and create a fresh Git repository.

pub mod scaffold;

use std::path::{Path, PathBuf};

use thiserror::Error;
use tracing::{trace, warn};

use crate::package::{Category, Version, spdx};

#[derive(Debug, Clone)]
pub struct InitOptions {
    pub package_name: String,
    pub package_description: String,
    pub package_license: String,
    pub package_version: Version,
    pub package_category: Category,
}

#[derive(Debug, Error)]
pub enum InitError {
    #[error("The package directory already exists: {0}")]
    AlreadyExists(PathBuf),

    #[error("A file scheduled for creation already exists: {0}")]
    FileExists(PathBuf),

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("The generated package manifest failed schema validation")]
    ManifestSchema,

    #[error("Failed to initialize a git repository: {0}")]
    Git(#[from] git2::Error),

    #[error("Could not find a free directory name for the package")]
    NoFreeDirectory,
}

/// Where the LICENSE body comes from. The lookup is an external collaborator
/// (a web service in the default implementation), so it sits behind a trait.
#[cfg_attr(test, mockall::automock)]
pub trait LicenseTextSource {
    fn license_text(&self, spdx_id: &str) -> Option<String>;
}

/// Fetches license bodies from the public license database.
#[derive(Debug, Default)]
pub struct OnlineLicenseSource;

impl LicenseTextSource for OnlineLicenseSource {
    fn license_text(&self, spdx_id: &str) -> Option<String> {
        spdx::get_spdx_license_text(spdx_id)
    }
}

fn create_local_file(path: &Path, contents: &str) -> Result<(), InitError> {
    trace!("Creating a local file at: {}", path.display());

    if path.exists() {
        warn!("The file already exists: {}", path.display());
        return Err(InitError::FileExists(path.to_path_buf()));
    }

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)
            .map_err(|source| InitError::Io { path: parent.to_path_buf(), source })?;
    }

    std::fs::write(path, contents)
        .map_err(|source| InitError::Io { path: path.to_path_buf(), source })?;

    trace!("Wrote {} bytes to the file: {}", contents.len(), path.display());

    Ok(())
}

fn write_package_tree(
    package_path: &Path,
    options: &InitOptions,
    license_source: &dyn LicenseTextSource,
) -> Result<(), InitError> {
    trace!("Initializing the default package files at: {}", package_path.display());

    create_local_file(&package_path.join("docs/.gitkeep"), scaffold::git_keep())?;

    match options.package_category {
        Category::Library | Category::StandardLibrary => {
            create_local_file(
                &package_path.join("src/lib.nit"),
                scaffold::default_library_source(),
            )?;
        }
        Category::Executable => {
            create_local_file(
                &package_path.join("src/main.nit"),
                scaffold::default_main_source(),
            )?;
        }
    }

    create_local_file(&package_path.join("README.md"), &scaffold::readme(options))?;

    let license_text = license_source
        .license_text(&options.package_license)
        .unwrap_or_default();
    create_local_file(&package_path.join("LICENSE"), &license_text)?;

    create_local_file(
        &package_path.join("CODE_OF_CONDUCT.md"),
        scaffold::code_of_conduct(),
    )?;
    create_local_file(
        &package_path.join("CONTRIBUTING.md"),
        &scaffold::contributing_policy(options),
    )?;
    create_local_file(
        &package_path.join("SECURITY.md"),
        &scaffold::security_policy(&options.package_name),
    )?;
    create_local_file(&package_path.join(".gitignore"), scaffold::git_ignore())?;
    create_local_file(&package_path.join(".dockerignore"), scaffold::docker_ignore())?;
    create_local_file(
        &package_path.join("CMakeLists.txt"),
        &scaffold::cmake_lists(&options.package_name),
    )?;

    let encoded = scaffold::initial_manifest(options).to_json(false);
    if !encoded.correct_schema {
        return Err(InitError::ManifestSchema);
    }
    create_local_file(&package_path.join("no3.json"), &encoded.text)?;

    trace!(
        "Successfully initialized the package directory structure at: {}",
        package_path.display()
    );

    Ok(())
}

fn init_repository(package_path: &Path) -> Result<(), InitError> {
    trace!("Initializing a git repository in: {}", package_path.display());
    git2::Repository::init(package_path)?;
    trace!("Successfully created package repository in: {}", package_path.display());
    Ok(())
}

/// Create a new package at `package_path`. Fails if the path already exists.
/// Atomicity is per-file: a failure midway leaves a partial tree behind.
pub fn create_package(
    package_path: &Path,
    options: &InitOptions,
    license_source: &dyn LicenseTextSource,
) -> Result<(), InitError> {
    trace!("Initializing a new package at: {}", package_path.display());

    if package_path.exists() {
        warn!("The package directory already exists: {}", package_path.display());
        return Err(InitError::AlreadyExists(package_path.to_path_buf()));
    }

    write_package_tree(package_path, options, license_source)?;
    init_repository(package_path)?;

    trace!("Successfully initialized package contents at: {}", package_path.display());

    Ok(())
}

/// Pick a directory for the new package under `directory`: the package tail,
/// or a `-N` suffixed variant when taken.
pub fn new_package_path(directory: &Path, package_name: &str) -> Result<PathBuf, InitError> {
    let tail = scaffold::package_tail(package_name);

    for attempt in 0..0x10000u32 {
        let folder = if attempt == 0 {
            tail.to_string()
        } else {
            format!("{tail}-{attempt}")
        };
        let candidate = directory.join(folder);

        if candidate.exists() {
            warn!(
                "The package directory already exists: {}. Trying again with a suffix.",
                candidate.display()
            );
            continue;
        }

        return Ok(candidate);
    }

    Err(InitError::NoFreeDirectory)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::package::Manifest;

    fn options() -> InitOptions {
        InitOptions {
            package_name: "@gh-jane/my-pkg".to_string(),
            package_description: "Test package.".to_string(),
            package_license: "MIT".to_string(),
            package_version: Version::default(),
            package_category: Category::Executable,
        }
    }

    fn stub_license_source() -> MockLicenseTextSource {
        let mut source = MockLicenseTextSource::new();
        source
            .expect_license_text()
            .returning(|_| Some("LICENSE BODY\n".to_string()));
        source
    }

    #[test]
    fn test_create_package_writes_full_tree() {
        let dir = tempfile::tempdir().unwrap();
        let package_path = dir.path().join("my-pkg");

        create_package(&package_path, &options(), &stub_license_source()).unwrap();

        for file in [
            "docs/.gitkeep",
            "src/main.nit",
            "README.md",
            "LICENSE",
            "CODE_OF_CONDUCT.md",
            "CONTRIBUTING.md",
            "SECURITY.md",
            ".gitignore",
            ".dockerignore",
            "CMakeLists.txt",
            "no3.json",
        ] {
            assert!(package_path.join(file).exists(), "missing {file}");
        }

        assert!(package_path.join(".git").exists());
        assert_eq!(
            std::fs::read_to_string(package_path.join("LICENSE")).unwrap(),
            "LICENSE BODY\n"
        );

        // The written manifest parses back as valid.
        let manifest_text = std::fs::read_to_string(package_path.join("no3.json")).unwrap();
        let manifest = Manifest::from_json(&manifest_text).expect("valid manifest on disk");
        assert_eq!(manifest.name, "@gh-jane/my-pkg");
        assert_eq!(manifest.license, "MIT");
    }

    #[test]
    fn test_library_package_gets_lib_source() {
        let dir = tempfile::tempdir().unwrap();
        let package_path = dir.path().join("my-pkg");
        let mut opts = options();
        opts.package_category = Category::Library;

        create_package(&package_path, &opts, &stub_license_source()).unwrap();
        assert!(package_path.join("src/lib.nit").exists());
        assert!(!package_path.join("src/main.nit").exists());
    }

    #[test]
    fn test_existing_directory_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let err = create_package(dir.path(), &options(), &stub_license_source()).unwrap_err();
        assert!(matches!(err, InitError::AlreadyExists(_)));
    }

    #[test]
    fn test_missing_license_text_leaves_empty_file() {
        let dir = tempfile::tempdir().unwrap();
        let package_path = dir.path().join("my-pkg");

        let mut source = MockLicenseTextSource::new();
        source.expect_license_text().returning(|_| None);

        create_package(&package_path, &options(), &source).unwrap();
        assert_eq!(std::fs::read_to_string(package_path.join("LICENSE")).unwrap(), "");
    }

    #[test]
    fn test_new_package_path_suffixes_taken_names() {
        let dir = tempfile::tempdir().unwrap();

        let first = new_package_path(dir.path(), "@gh-jane/my-pkg").unwrap();
        assert_eq!(first, dir.path().join("my-pkg"));

        std::fs::create_dir(&first).unwrap();
        let second = new_package_path(dir.path(), "@gh-jane/my-pkg").unwrap();
        assert_eq!(second, dir.path().join("my-pkg-1"));
    }
}
