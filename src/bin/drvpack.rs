//! drvpack command-line tool

use clap::{Parser, Subcommand};
use drvpack::exit_codes::{EXIT_INVALID_ARGS, EXIT_PANIC, EXIT_SIGNATURE_ERROR, EXIT_SUCCESS, exit_code_for};
use drvpack::{BuildOptions, Config, PackageStore};
use serde::Serialize;
use std::{env, fs, panic, path::PathBuf, process};

const VERSION: &str = drvpack::version::VERSION;

#[derive(Parser, Debug)]
#[command(version = VERSION, about = "Printer driver packaging and storage")]
struct Cli {
    /// Log level (trace, debug, info, warn, error, json:<level>)
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Storage root for the package store (overrides DRVPACK_STORAGE_ROOT)
    #[arg(long, global = true)]
    storage_root: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Build a .pd package from a driver source tree
    Build {
        /// Driver source directory
        #[arg(short, long)]
        source: PathBuf,

        /// Output path for the .pd package
        #[arg(short, long)]
        output: PathBuf,

        /// Recorded as packageInfo.createdBy
        #[arg(long)]
        actor: Option<String>,

        /// Path to private key (PEM format)
        #[arg(long)]
        private_key: Option<PathBuf>,

        /// Path to public key (PEM format, optional if private key provided)
        #[arg(long)]
        public_key: Option<PathBuf>,

        /// Seed for deterministic key generation
        #[arg(long)]
        key_seed: Option<String>,

        /// Fail when files referenced by the INF are missing
        #[arg(long)]
        strict: bool,
    },

    /// Check that a source tree contains a usable INF descriptor
    Validate {
        source: PathBuf,
    },

    /// Print the metadata extracted from an INF file
    Inspect {
        inf: PathBuf,
    },

    /// Verify a .pd package's structure, content hash and signature
    Verify {
        package: PathBuf,

        /// Hex Ed25519 public key the package must be signed with
        #[arg(long)]
        trusted_key: Option<String>,
    },

    /// Content-addressed package store
    Store {
        #[command(subcommand)]
        command: StoreCommand,
    },
}

#[derive(Subcommand, Debug)]
enum StoreCommand {
    /// Store a package (deduplicated by content hash)
    Save {
        package: PathBuf,

        /// Uploader recorded on the index row
        #[arg(long)]
        actor: Option<String>,

        /// Expected content hash (hex, optional sha256: prefix)
        #[arg(long)]
        content_hash: Option<String>,
    },

    /// Delete a stored package by row id
    Delete {
        id: u64,

        /// Delete the index row even if the blob is already missing
        #[arg(long)]
        force: bool,
    },

    /// List stored packages
    List,

    /// List supported printer models
    Models,
}

fn main() {
    // Set up panic handler to return specific exit code
    panic::set_hook(Box::new(|panic_info| {
        eprintln!("PANIC: {}", panic_info);
        process::exit(EXIT_PANIC);
    }));

    let result = panic::catch_unwind(run);

    match result {
        Ok(exit_code) => process::exit(exit_code),
        Err(_) => {
            eprintln!("Fatal: Unhandled panic in drvpack");
            process::exit(EXIT_PANIC);
        }
    }
}

fn run() -> i32 {
    // Handle --version before clap
    if env::args().nth(1).as_deref() == Some("--version") {
        println!("{} {}", drvpack::version::TOOL_NAME, drvpack::version::full_version());
        return EXIT_SUCCESS;
    }

    let cli = Cli::parse();

    if let Some(ref level) = cli.log_level {
        drvpack::logger::JsonLogger::init_with_level(level, "CLI --log-level");
    } else {
        drvpack::logger::JsonLogger::init();
    }

    let mut config = match Config::from_env() {
        Ok(config) => config,
        Err(e) => {
            eprintln!("❌ {e}");
            return exit_code_for(&e);
        }
    };
    if let Some(root) = cli.storage_root {
        config.storage_root = root;
    }

    match dispatch(cli.command, &config) {
        Ok(code) => code,
        Err(e) => {
            eprintln!("❌ {e}");
            exit_code_for(&e)
        }
    }
}

fn dispatch(command: Command, config: &Config) -> drvpack::Result<i32> {
    match command {
        Command::Build {
            source,
            output,
            actor,
            private_key,
            public_key,
            key_seed,
            strict,
        } => {
            let defaults = BuildOptions::from_config(config);
            let options = BuildOptions {
                key_seed: key_seed.or(defaults.key_seed),
                private_key_path: private_key.or(defaults.private_key_path),
                public_key_path: public_key.or(defaults.public_key_path),
                strict_dependencies: strict,
                ..defaults
            };
            let actor = actor.unwrap_or_else(default_actor);
            let built = drvpack::build_package(&source, &output, &actor, &options)?;
            println!("{}", built.content_hash);
            Ok(EXIT_SUCCESS)
        }
        Command::Validate { source } => {
            let validation = drvpack::validate_source(&source);
            print_json(&validation)?;
            Ok(if validation.valid { EXIT_SUCCESS } else { EXIT_INVALID_ARGS })
        }
        Command::Inspect { inf } => {
            print_json(&drvpack::inspect_inf(&inf)?)?;
            Ok(EXIT_SUCCESS)
        }
        Command::Verify { package, trusted_key } => {
            let result = drvpack::verify_package(&package, trusted_key.as_deref())?;
            print_json(&result)?;
            Ok(if !result.signed || result.signature_valid {
                EXIT_SUCCESS
            } else {
                EXIT_SIGNATURE_ERROR
            })
        }
        Command::Store { command } => run_store(command, config),
    }
}

fn run_store(command: StoreCommand, config: &Config) -> drvpack::Result<i32> {
    let store = PackageStore::open(config)?;
    match command {
        StoreCommand::Save {
            package,
            actor,
            content_hash,
        } => {
            let bytes = fs::read(&package)?;
            let name = package
                .file_name()
                .map(|n| n.to_string_lossy().into_owned())
                .unwrap_or_default();
            let actor = actor.unwrap_or_else(default_actor);
            let outcome = store.save(&bytes, &name, &actor, content_hash.as_deref())?;
            if outcome.is_duplicate {
                eprintln!("♻️ Already stored as #{}", outcome.record.id);
            }
            print_json(&outcome.record)?;
        }
        StoreCommand::Delete { id, force } => print_json(&store.delete(id, force)?)?,
        StoreCommand::List => print_json(&store.list_packages()?)?,
        StoreCommand::Models => print_json(&store.list_models()?)?,
    }
    Ok(EXIT_SUCCESS)
}

fn print_json<T: Serialize>(value: &T) -> drvpack::Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn default_actor() -> String {
    env::var("USER")
        .or_else(|_| env::var("USERNAME"))
        .unwrap_or_else(|_| "drvpack".to_string())
}
