use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::time::Duration;

use studymode::config::Config;
use studymode::lookup;
use studymode::store::{Store, StoreError};
use studymode::transfer;

/// Get the config directory path (~/.config/studymode/)
fn config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("studymode"))
}

#[derive(Parser, Debug)]
#[command(
    name = "studymode",
    about = "Allow-list study filter for YouTube-style video pages"
)]
struct Cli {
    /// Path to the state database (defaults to the config directory)
    #[arg(long, value_name = "FILE")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show the mode flag and study list size
    Status,
    /// Turn study filtering on
    Enable,
    /// Turn study filtering off
    Disable,
    /// Print the study list in display order
    List,
    /// Add a channel by identifier; display metadata is resolved
    /// automatically (placeholder on lookup failure)
    Add { channel_id: String },
    /// Remove a channel by identifier
    Remove { channel_id: String },
    /// Remove every channel from the study list
    Clear {
        /// Skip the confirmation requirement
        #[arg(long)]
        yes: bool,
    },
    /// Write the study list to a JSON file
    Export { file: PathBuf },
    /// Merge channels from a JSON file into the study list
    Import { file: PathBuf },
    /// Open a channel page in the default browser
    Open { channel_id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .init();

    let cli = Cli::parse();

    let config_dir = config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
    }

    // User-only access on Unix; the list is personal state.
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(metadata) = std::fs::metadata(&config_dir) {
            let mut perms = metadata.permissions();
            perms.set_mode(0o700);
            if let Err(e) = std::fs::set_permissions(&config_dir, perms) {
                tracing::warn!(
                    path = %config_dir.display(),
                    error = %e,
                    "Failed to set config directory permissions to 0700"
                );
            }
        }
    }

    let config = Config::load(&config_dir.join("config.toml"))
        .context("Failed to load configuration")?;

    let db_path = cli.db.unwrap_or_else(|| config_dir.join("studymode.db"));
    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let store = match Store::open(db_path_str).await {
        Ok(store) => store,
        Err(StoreError::Locked) => {
            eprintln!("Error: {}", StoreError::Locked);
            std::process::exit(1);
        }
        Err(e) => return Err(anyhow::anyhow!("Failed to open state database: {}", e)),
    };

    match cli.command {
        Command::Status => {
            let enabled = store.mode_enabled().await;
            let channels = store.channels().await;
            println!(
                "Study mode: {}",
                if enabled { "enabled" } else { "disabled" }
            );
            println!("Channels on the study list: {}", channels.len());
        }

        Command::Enable => {
            store.set_mode_enabled(true).await?;
            println!("Study mode enabled.");
        }

        Command::Disable => {
            store.set_mode_enabled(false).await?;
            println!("Study mode disabled.");
        }

        Command::List => {
            let channels = store.channels().await;
            if channels.is_empty() {
                println!("No channels added yet.");
            } else {
                for channel in channels {
                    println!("{}\t{}", channel.id, channel.name);
                }
            }
        }

        Command::Add { channel_id } => {
            let client = http_client(&config)?;
            let details = lookup::channel_details(
                &client,
                &store,
                &channel_id,
                config.lookup_base_url.as_deref(),
                Some(config.details_cache_ttl_hours),
            )
            .await;
            let name = details.name.clone();
            let grew = store
                .add_channel(studymode::store::ChannelRecord {
                    id: channel_id.clone(),
                    name: details.name,
                    thumbnail: details.thumbnail,
                })
                .await?;
            if grew {
                println!("Added {} ({}).", name, channel_id);
            } else {
                println!("{} is already on the study list.", channel_id);
            }
        }

        Command::Remove { channel_id } => {
            if store.remove_channel(&channel_id).await? {
                println!("Removed {}.", channel_id);
            } else {
                println!("{} is not on the study list.", channel_id);
            }
        }

        Command::Clear { yes } => {
            let count = store.channels().await.len();
            if !yes {
                eprintln!(
                    "This would remove {} channel(s). Re-run with --yes to confirm.",
                    count
                );
                std::process::exit(1);
            }
            store.clear_channels().await?;
            println!("Cleared {} channel(s).", count);
        }

        Command::Export { file } => {
            let channels = store.channels().await;
            let json = transfer::export_json(&channels).context("Failed to encode study list")?;
            std::fs::write(&file, json)
                .with_context(|| format!("Failed to write '{}'", file.display()))?;
            println!(
                "Exported {} channel(s) to {}.",
                channels.len(),
                file.display()
            );
        }

        Command::Import { file } => {
            let content = std::fs::read_to_string(&file)
                .with_context(|| format!("Failed to read '{}'", file.display()))?;
            let records = transfer::parse_import(&content)?;
            let added = store.import_channels(records).await?;
            println!("Import successful: added {} new channel(s).", added);
        }

        Command::Open { channel_id } => {
            let url = format!("{}/channel/{}", lookup::DEFAULT_BASE_URL, channel_id);
            open::that(&url).with_context(|| format!("Failed to open '{}'", url))?;
            println!("Opened {}.", url);
        }
    }

    Ok(())
}

fn http_client(config: &Config) -> Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(Duration::from_secs(config.fetch_timeout_secs))
        .build()
        .context("Failed to build HTTP client")
}
