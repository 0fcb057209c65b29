//! `grabbit`: search, grab and purge against a qBittorrent WebUI.

mod output;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use grabbit_core::{
    crypt, load_config, CancelHandle, CancelToken, GrabOutcome, OperationError, PluginSelector,
    PurgeOptions, SearchQuery, TorrentService,
};

use output::OutputFormat;

/// Application version
const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Parser)]
#[command(
    name = "grabbit",
    version,
    about = "Search, grab and purge torrents through a qBittorrent WebUI"
)]
struct Cli {
    /// Configuration file (default: grabbit.toml in the working directory)
    #[arg(long, short, global = true, env = "GRABBIT_CONFIG")]
    config: Option<PathBuf>,
    #[arg(long, global = true, value_enum, default_value_t = OutputFormat::Table)]
    format: OutputFormat,
    /// Log JSON lines to stderr
    #[arg(long, global = true, env = "GRABBIT_LOG_JSON")]
    log_json: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Encrypt or decrypt credential values
    #[command(subcommand)]
    Crypt(CryptCommand),
    #[command(flatten)]
    Remote(RemoteCommand),
}

/// Commands that talk to qBittorrent.
#[derive(Debug, Subcommand)]
enum RemoteCommand {
    /// Run a search job and print its results
    Search(SearchArgs),
    /// Search and add the first result
    Grab(GrabArgs),
    /// List installed search plugins
    Plugins,
    /// Remove torrents completed more than DAYS days ago
    Purge(PurgeArgs),
    /// Add a torrent from a magnet link, URL or local .torrent file
    AddTorrent(AddTorrentArgs),
    /// List torrents known to the client
    Torrents,
    /// Print the RSS auto-download rules
    RssRules,
    /// Print grabbit and qBittorrent versions
    Version,
}

#[derive(Debug, Args)]
struct SearchArgs {
    term: String,
    /// Search plugin to use (repeatable; "all" or "enabled" also accepted)
    #[arg(long = "plugin")]
    plugins: Vec<String>,
    #[arg(long)]
    category: Option<String>,
    /// Token appended to the pattern, e.g. "*1080p*"
    #[arg(long)]
    suffix: Option<String>,
}

#[derive(Debug, Args)]
struct GrabArgs {
    term: String,
    /// Token appended to the pattern, e.g. "*1080p*"
    #[arg(long)]
    suffix: Option<String>,
}

#[derive(Debug, Args)]
struct PurgeArgs {
    days: u32,
    /// Only report what would be removed
    #[arg(long)]
    dry_run: bool,
    /// Remove torrents but leave downloaded data on disk
    #[arg(long)]
    keep_files: bool,
}

#[derive(Debug, Args)]
struct AddTorrentArgs {
    /// Magnet link, http(s) URL or path to a .torrent file
    torrent: String,
}

#[derive(Debug, Subcommand)]
enum CryptCommand {
    /// Encrypt a value; prefix the output with "enc:" in the config
    Encrypt { key: String, plaintext: String },
    /// Decrypt a token produced by `encrypt`
    Decrypt { key: String, token: String },
    /// Print a fresh random key
    GenerateKey,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_logging(cli.log_json);

    if let Err(e) = run(cli).await {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn init_logging(json: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "info".into());
    tracing_subscriber::registry()
        .with(filter)
        .with(json.then(|| {
            tracing_subscriber::fmt::layer()
                .json()
                .with_writer(std::io::stderr)
        }))
        .with((!json).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .init();
}

async fn run(cli: Cli) -> Result<()> {
    let format = cli.format;

    // Cipher helpers work without a configuration
    let command = match cli.command {
        Command::Crypt(command) => return run_crypt(command),
        Command::Remote(command) => command,
    };

    let config = load_config(cli.config.as_deref()).context("Failed to load configuration")?;
    let service = TorrentService::connect(config).context("Failed to create qBittorrent client")?;

    match command {
        RemoteCommand::Search(args) => {
            let query = search_query(&service, &args)?;
            let results = service.search_with(&query, interrupt_token()).await?;
            println!("{}", output::render_search(&results, format)?);
        }
        RemoteCommand::Grab(args) => {
            let query = service.query(&args.term)?.with_suffix(args.suffix.as_deref());
            let outcome = service.grab_with(&query, interrupt_token()).await?;
            if let GrabOutcome::NoResults { pattern } = &outcome {
                warn!(pattern = %pattern, "No results found to grab");
            }
            println!("{}", output::render_grab(&outcome, format)?);
        }
        RemoteCommand::Plugins => {
            let plugins = service.plugins().await?;
            println!("{}", output::render_plugins(&plugins, format)?);
        }
        RemoteCommand::Purge(args) => {
            let options = PurgeOptions::new(args.days)
                .with_dry_run(args.dry_run)
                .with_delete_files(!args.keep_files);
            let report = service.purge(&options).await?;
            println!("{}", output::render_purge(&report, format)?);
        }
        RemoteCommand::AddTorrent(args) => {
            let torrent = service.add_torrent(&args.torrent).await?;
            println!("{}", output::render_added(&torrent, format)?);
        }
        RemoteCommand::Torrents => {
            let torrents = service.torrents().await?;
            println!("{}", output::render_torrents(&torrents, format)?);
        }
        RemoteCommand::RssRules => {
            let rules = service.rss_rules().await?;
            println!("{}", output::to_json(&rules)?);
        }
        RemoteCommand::Version => {
            let build = service.build_info().await?;
            println!("{}", output::render_build_info(VERSION, &build, format)?);
        }
    }

    Ok(())
}

fn run_crypt(command: CryptCommand) -> Result<()> {
    match command {
        CryptCommand::Encrypt { key, plaintext } => {
            println!("{}", crypt::encode(&key, &plaintext)?);
        }
        CryptCommand::Decrypt { key, token } => {
            println!("{}", crypt::decode(&key, &token)?);
        }
        CryptCommand::GenerateKey => println!("{}", crypt::generate_key()),
    }
    Ok(())
}

/// Query for `search`, with flag overrides on top of the configured defaults.
fn search_query(service: &TorrentService, args: &SearchArgs) -> Result<SearchQuery, OperationError> {
    let mut query = service.query(&args.term)?;
    if !args.plugins.is_empty() {
        query = query.with_plugins(PluginSelector::from_names(args.plugins.clone()));
    }
    if let Some(category) = &args.category {
        query = query.with_category(category.as_str());
    }
    Ok(query.with_suffix(args.suffix.as_deref()))
}

/// Token cancelled by Ctrl+C.
fn interrupt_token() -> CancelToken {
    let (handle, token) = CancelHandle::new();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupted, abandoning search");
            handle.cancel();
        }
    });
    token
}

#[cfg(test)]
mod tests {
    use super::*;
    use grabbit_core::{load_config_from_str, testing::MockTorrentClient};
    use std::sync::Arc;

    fn service() -> TorrentService {
        let config = load_config_from_str(
            r#"
[qbittorrent]
host = "localhost"

[search]
plugins = { named = ["yts_mx"] }
"#,
        )
        .unwrap();
        TorrentService::new(Arc::new(MockTorrentClient::new()), config)
    }

    #[test]
    fn test_parse_search_flags() {
        let cli = Cli::try_parse_from([
            "grabbit", "search", "Heat 1995", "--plugin", "eztv", "--plugin", "piratebay",
            "--category", "movies", "--suffix", "*1080p*", "--format", "json",
        ])
        .unwrap();

        assert_eq!(cli.format, OutputFormat::Json);
        let Command::Remote(RemoteCommand::Search(args)) = cli.command else {
            panic!("expected search");
        };
        assert_eq!(args.term, "Heat 1995");
        assert_eq!(args.plugins, vec!["eztv", "piratebay"]);

        let query = search_query(&service(), &args).unwrap();
        assert_eq!(query.pattern, "Heat 1995*1080p*");
        assert_eq!(
            query.plugins,
            PluginSelector::Named(vec!["eztv".into(), "piratebay".into()])
        );
        assert_eq!(query.category, "movies");
    }

    #[test]
    fn test_search_without_flags_uses_config() {
        let cli = Cli::try_parse_from(["grabbit", "search", "Heat"]).unwrap();
        let Command::Remote(RemoteCommand::Search(args)) = cli.command else {
            panic!("expected search");
        };

        let query = search_query(&service(), &args).unwrap();
        assert_eq!(query.pattern, "Heat");
        assert_eq!(query.plugins, PluginSelector::Named(vec!["yts_mx".into()]));
        assert_eq!(query.category, "all");
    }

    #[test]
    fn test_parse_purge() {
        let cli = Cli::try_parse_from(["grabbit", "purge", "30", "--dry-run"]).unwrap();
        let Command::Remote(RemoteCommand::Purge(args)) = cli.command else {
            panic!("expected purge");
        };
        assert_eq!(args.days, 30);
        assert!(args.dry_run);
        assert!(!args.keep_files);
    }

    #[test]
    fn test_negative_purge_days_rejected() {
        assert!(Cli::try_parse_from(["grabbit", "purge", "-3"]).is_err());
    }

    #[test]
    fn test_parse_crypt() {
        let cli =
            Cli::try_parse_from(["grabbit", "crypt", "decrypt", "KEY", "TOKEN"]).unwrap();
        assert!(matches!(
            cli.command,
            Command::Crypt(CryptCommand::Decrypt { .. })
        ));
    }

    #[test]
    fn test_crypt_round_trip_through_commands() {
        let key = crypt::generate_key();
        let token = crypt::encode(&key, "adminadmin").unwrap();
        assert!(run_crypt(CryptCommand::Decrypt {
            key: key.clone(),
            token
        })
        .is_ok());
        assert!(run_crypt(CryptCommand::Decrypt {
            key,
            token: "not-a-token".into()
        })
        .is_err());
    }

    #[test]
    fn test_cli_definition_is_consistent() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
