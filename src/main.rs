use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use tracing::{error, info};

use no3::driver::Driver;
use no3::format::{FormatMode, FormatOptions};
use no3::impl_cmd::OutputFormat;
use no3::init::{InitOptions, OnlineLicenseSource};
use no3::logging::{LogConfig, init_logging};
use no3::lsp::{Connection, Server};
use no3::package::{Category, Manifest, Version, spdx};

/// Toolchain driver for the Nitrate language
#[derive(Parser, Debug)]
#[command(name = "no3", version, about, long_about = None)]
struct Cli {
    /// Log level (overrides NCC_LOG_LEVEL)
    #[arg(long, value_name = "LEVEL", global = true)]
    log_level: Option<String>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Initialize a new source package
    Init(InitArgs),

    /// Format source files
    Format(FormatArgs),

    /// Host a language server against the compiler frontend
    Lsp(LspArgs),

    /// Implementation utilities
    #[command(subcommand)]
    Impl(ImplCommand),
}

#[derive(Args, Debug)]
struct InitArgs {
    /// The name of the package to initialize
    package_name: String,

    /// Create a library package
    #[arg(long, short = 'c', conflicts_with_all = ["standard_lib", "exe"])]
    lib: bool,

    /// Create a standard library package
    #[arg(long, short = 's', conflicts_with = "exe")]
    standard_lib: bool,

    /// Create an executable package
    #[arg(long, short = 'e')]
    exe: bool,

    /// Set the package's SPDX license
    #[arg(long, short = 'l', default_value = "MIT", value_name = "SPDX")]
    license: String,

    /// Output directory for the package
    #[arg(long, short = 'o', default_value = ".", value_name = "DIR")]
    output: PathBuf,
}

#[derive(Args, Debug)]
struct FormatArgs {
    /// Source file or directory to format
    path: PathBuf,

    /// Canonical source format
    #[arg(long = "std", short = 's', conflicts_with_all = ["minify", "deflate"])]
    standard: bool,

    /// Source minification (human readable)
    #[arg(long, short = 'm', conflicts_with = "deflate")]
    minify: bool,

    /// Source minification (non-human readable)
    #[arg(long, short = 'd')]
    deflate: bool,

    /// Format configuration file
    #[arg(long, short = 'c', value_name = "FILE")]
    config: Option<PathBuf>,

    /// Output file or directory
    #[arg(long, short = 'o', value_name = "PATH")]
    output: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct LspArgs {
    /// Connect via stdin/stdout
    #[arg(long, short = 's', conflicts_with = "port")]
    stdio: bool,

    /// Listen for exactly one connection on a TCP port
    #[arg(long, short = 'p', value_name = "PORT")]
    port: Option<u16>,

    /// Log output file
    #[arg(long, short = 'o', default_value = "nitrate-lsp.log", value_name = "FILE")]
    log: PathBuf,
}

#[derive(Subcommand, Debug)]
enum ImplCommand {
    /// Package manifest file parsing and validation
    ConfigCheck {
        /// Path to the package manifest file
        manifest_file: PathBuf,

        /// Minify the output
        #[arg(long, short = 'm')]
        minify: bool,

        /// Output file (- for stdout)
        #[arg(long, short = 'o', default_value = "-")]
        output: String,
    },

    /// Parse source files into serialized parse trees
    Parse {
        /// Source files to parse
        #[arg(required = true)]
        sources: Vec<PathBuf>,

        /// Output format: json, protobuf, or minify
        #[arg(long, short = 'f', default_value = "json")]
        format: String,

        /// Retain source location information
        #[arg(long, short = 't')]
        tracking: bool,

        /// Destination of the serialized parse trees (- for stdout)
        #[arg(long, short = 'o', default_value = "-")]
        output: String,
    },
}

fn explain_name_rejection(package_name: &str) {
    eprintln!("Sorry, the specified package name is not acceptable.");
    eprintln!();
    eprintln!("Package names must satisfy the following regular expression:");
    eprintln!("\t{}", Manifest::name_regex());
    eprintln!("\tAlso, there must be no duplicate hyphens.");
    eprintln!();
    eprintln!("The package name you provided was: \"{package_name}\"");
    eprintln!();
    eprintln!("Here is a breakdown of the package name format:");
    eprintln!("\t- Package names must start with '@'.");
    eprintln!("\t- Immediately following the '@' symbol is the Git hosting provider's");
    eprintln!("\t  prefix, e.g. \"gh-\" for GitHub or \"gl-\" for GitLab. The prefix");
    eprintln!("\t  always ends with a hyphen.");
    eprintln!("\t- Then comes the username of the package owner on that provider,");
    eprintln!("\t  followed by a forward slash.");
    eprintln!("\t- Finally the package's actual name: 3 to 32 characters, alphanumeric");
    eprintln!("\t  and hyphens, starting and ending with an alphanumeric character.");
    eprintln!("\t- Optionally, a colon followed by a positive integer specifies the");
    eprintln!("\t  package generation (major version).");
    eprintln!();
    eprintln!("Here are some examples of valid package names:");
    eprintln!("\t- @gh-openssl/openssl:2");
    eprintln!("\t- @gh-gpg/gpg");
    eprintln!("\t- @gh-john-doe/my-package");
    eprintln!("\t- @gl-we-use-gitlab/super-useful-package:1");
    eprintln!("\t- @std/core\t// Some approved packages don't have a prefix.");
}

fn run_init(args: &InitArgs) -> bool {
    if !Manifest::is_valid_name(&args.package_name) {
        explain_name_rejection(&args.package_name);
        return false;
    }

    if !Manifest::is_valid_license(&args.license) {
        error!("Sorry, the specified license is not a valid SPDX license identifier.");
        info!(
            "Did you mean to use '{}'?",
            spdx::find_closest_spdx_license(&args.license)
        );
        info!("For a complete list of valid SPDX license identifiers, visit https://spdx.org/licenses/");
        return false;
    }

    let category = if args.standard_lib {
        Category::StandardLibrary
    } else if args.lib {
        Category::Library
    } else {
        Category::Executable
    };

    let options = InitOptions {
        package_name: args.package_name.clone(),
        package_description: "No description was provided by the package creator.".to_string(),
        package_license: args.license.clone(),
        package_version: Version::default(),
        package_category: category,
    };

    let package_path = match no3::init::new_package_path(&args.output, &args.package_name) {
        Ok(path) => path,
        Err(e) => {
            error!("{e}");
            return false;
        }
    };

    match no3::init::create_package(&package_path, &options, &OnlineLicenseSource) {
        Ok(()) => {
            info!("Successfully created package at: {}", package_path.display());
            true
        }
        Err(e) => {
            error!("Failed to create package: {e}");

            // Atomicity is per-file, so a failure midway leaves a partial
            // tree; unlink it here.
            if package_path.exists() {
                if let Err(e) = std::fs::remove_dir_all(&package_path) {
                    tracing::warn!(
                        "Failed to remove the partially created package directory {}: {e}",
                        package_path.display()
                    );
                }
            }

            false
        }
    }
}

fn run_format(driver: &Driver, args: &FormatArgs) -> bool {
    let mode = if args.minify {
        FormatMode::Minify
    } else if args.deflate {
        FormatMode::Deflate
    } else {
        FormatMode::Standard
    };

    let output_path = args.output.clone().unwrap_or_else(|| args.path.clone());
    if output_path == args.path {
        tracing::warn!("The output path is the same as the source path. The source will be overwritten.");
    }

    let options = FormatOptions {
        mode,
        source_path: args.path.clone(),
        output_path,
        config_path: args.config.clone(),
    };

    match no3::format::run(driver.frontend(), &options) {
        Ok(()) => true,
        Err(e) => {
            error!("{e}");
            false
        }
    }
}

fn run_lsp(args: &LspArgs) -> bool {
    let connection = match args.port {
        Some(port) => match Connection::tcp(port) {
            Ok(connection) => connection,
            Err(e) => {
                error!("Failed to open a TCP connection on port {port}: {e}");
                return false;
            }
        },
        None => Connection::stdio(),
    };

    info!("Starting LSP server");
    Server::new(connection).run();
    info!("LSP server exited");

    true
}

fn run_impl(driver: &Driver, command: &ImplCommand) -> bool {
    let result = match command {
        ImplCommand::ConfigCheck { manifest_file, minify, output } => {
            no3::impl_cmd::config_check(manifest_file, *minify, output)
        }
        ImplCommand::Parse { sources, format, tracking, output } => {
            match OutputFormat::from_str(format) {
                Ok(format) => {
                    no3::impl_cmd::parse_sources(driver, sources, format, *tracking, output)
                }
                Err(e) => Err(e),
            }
        }
    };

    match result {
        Ok(()) => true,
        Err(e) => {
            error!("{e}");
            false
        }
    }
}

fn main() {
    let cli = Cli::parse();

    let log_config = match &cli.command {
        Command::Lsp(args) => LogConfig::from_env()
            .with_overrides(cli.log_level.clone(), None)
            .for_lsp_server(args.log.clone(), args.port.is_none()),
        _ => LogConfig::from_env().with_overrides(cli.log_level.clone(), None),
    };

    if let Err(e) = init_logging(log_config) {
        eprintln!("Failed to initialize logging: {e}");
        std::process::exit(1);
    }

    let driver = Driver::new();

    let ok = match &cli.command {
        Command::Init(args) => run_init(args),
        Command::Format(args) => run_format(&driver, args),
        Command::Lsp(args) => run_lsp(args),
        Command::Impl(command) => run_impl(&driver, command),
    };

    std::process::exit(if ok { 0 } else { 1 });
}
