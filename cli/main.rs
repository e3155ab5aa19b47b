use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::{self, Write};
use std::path::PathBuf;
use tokio::fs;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};
use vaultcrypt::config::Config;
use vaultcrypt::workflow::{Engine, Operation};

/// vaultcrypt - Password-based file and folder encryption with XChaCha20-Poly1305
#[derive(Parser)]
#[command(name = "vaultcrypt")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to configuration file
    #[arg(short, long, default_value = "config.json")]
    config: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Initialize vaultcrypt (write config and create store directories)
    Init {
        /// Directory holding encrypted artifacts
        #[arg(long, default_value = "./Admin/EncStore")]
        enc_store: String,

        /// Directory holding decrypted artifacts
        #[arg(long, default_value = "./Admin/DecStore")]
        dec_store: String,
    },

    /// Encrypt a file or directory (the source is consumed on success)
    Encrypt {
        /// Path to encrypt
        source: PathBuf,

        /// Password (prompted if omitted)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Decrypt a file or directory (the source is consumed on success)
    Decrypt {
        /// Path to decrypt
        source: PathBuf,

        /// Password (prompted if omitted)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Decrypt, open in the editor, then re-encrypt
    Edit {
        /// Encrypted path to edit
        source: PathBuf,

        /// Password (prompted if omitted)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Compress into a tar.gz archive, then encrypt the archive
    TarEncrypt {
        /// Path to compress and encrypt
        source: PathBuf,

        /// Password (prompted if omitted)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Decrypt a tar.gz archive, then extract it
    TarDecrypt {
        /// Encrypted archive to decrypt and extract
        source: PathBuf,

        /// Password (prompted if omitted)
        #[arg(short, long)]
        password: Option<String>,
    },

    /// Decrypt and extract, edit, then compress and re-encrypt
    TarEdit {
        /// Encrypted archive to edit
        source: PathBuf,

        /// Password (prompted if omitted)
        #[arg(short, long)]
        password: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize structured logging
    // Use RUST_LOG environment variable to control log level (e.g., RUST_LOG=info,vaultcrypt=debug)
    fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(true)
        .with_thread_ids(false)
        .init();

    let cli = Cli::parse();
    info!(command = ?cli.command, "vaultcrypt starting");

    match cli.command {
        Commands::Init {
            enc_store,
            dec_store,
        } => cmd_init(&cli.config, &enc_store, &dec_store).await,

        Commands::Encrypt { source, password } => {
            cmd_run(&cli.config, Operation::Encrypt, &source, password).await
        }
        Commands::Decrypt { source, password } => {
            cmd_run(&cli.config, Operation::Decrypt, &source, password).await
        }
        Commands::Edit { source, password } => {
            cmd_run(&cli.config, Operation::TempEdit, &source, password).await
        }
        Commands::TarEncrypt { source, password } => {
            cmd_run(&cli.config, Operation::ArchiveEncrypt, &source, password).await
        }
        Commands::TarDecrypt { source, password } => {
            cmd_run(&cli.config, Operation::ArchiveDecrypt, &source, password).await
        }
        Commands::TarEdit { source, password } => {
            cmd_run(&cli.config, Operation::ArchiveTempEdit, &source, password).await
        }
    }
}

/// Create a spinner for operations whose length is not known up front
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::default_spinner()
            .template("{spinner:.green} {msg}")
            .unwrap(),
    );
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Read the password from the terminal when it was not passed as a flag
fn obtain_password(password: Option<String>) -> Result<String> {
    if let Some(p) = password {
        return Ok(p);
    }
    print!("Password: ");
    io::stdout().flush()?;

    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    let password = line.trim_end_matches(['\r', '\n']).to_string();
    if password.is_empty() {
        anyhow::bail!("password must not be empty");
    }
    Ok(password)
}

/// Write the initial config file and create the store directories
async fn cmd_init(config_path: &str, enc_store: &str, dec_store: &str) -> Result<()> {
    println!("Initializing vaultcrypt...");

    if fs::try_exists(config_path).await.unwrap_or(false) {
        anyhow::bail!(
            "Configuration file '{}' already exists. Remove it first or use a different path.",
            config_path
        );
    }

    let cfg = Config {
        enc_store: enc_store.to_string(),
        dec_store: dec_store.to_string(),
        ..Config::default()
    };
    cfg.validate()?;

    fs::create_dir_all(&cfg.enc_store)
        .await
        .with_context(|| format!("creating encrypt store '{}'", cfg.enc_store))?;
    fs::create_dir_all(&cfg.dec_store)
        .await
        .with_context(|| format!("creating decrypt store '{}'", cfg.dec_store))?;

    let config_json = serde_json::to_string_pretty(&cfg)?;
    fs::write(config_path, config_json)
        .await
        .with_context(|| format!("writing config to '{}'", config_path))?;

    println!("Initialization complete!");
    println!("Config:        {}", config_path);
    println!("Encrypt store: {}", cfg.enc_store);
    println!("Decrypt store: {}", cfg.dec_store);
    println!();
    println!("IMPORTANT: Encrypt and decrypt are destructive moves.");
    println!("The source is deleted once an operation succeeds.");

    Ok(())
}

/// Run one engine operation end to end
async fn cmd_run(
    config_path: &str,
    operation: Operation,
    source: &PathBuf,
    password: Option<String>,
) -> Result<()> {
    let cfg = Config::load_with_env(Some(config_path))?;
    let engine = Engine::new(cfg).context("crypto engine failed to start")?;
    let password = obtain_password(password)?;

    // The interactive operations own the terminal while the editor runs
    let interactive = matches!(operation, Operation::TempEdit | Operation::ArchiveTempEdit);
    let spinner = if interactive {
        None
    } else {
        Some(create_spinner(&format!(
            "Processing {}...",
            source.display()
        )))
    };

    match engine.try_run(operation, source, &password).await {
        Ok(target) => {
            if let Some(pb) = spinner {
                pb.finish_with_message(format!("{} -> {}", source.display(), target.display()));
            } else {
                println!("{} -> {}", source.display(), target.display());
            }
            Ok(())
        }
        Err(e) => {
            if let Some(pb) = spinner {
                pb.finish_and_clear();
            }
            Err(anyhow::Error::new(e).context(format!("operation on {} failed", source.display())))
        }
    }
}
