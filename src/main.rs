use anyhow::{Context, Result};
use clap::Parser;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;

#[cfg(unix)]
use tokio::signal::unix::{signal, SignalKind};

use quotebox::app::App;
use quotebox::config::Config;
use quotebox::quote::{QuoteStore, StdRandom, EXPORT_FILE_NAME};
use quotebox::remote::{build_client, HttpQuoteSource, RemoteQuoteSource, SyncEvent, SyncPoller};
use quotebox::storage::{Database, DatabaseError, MemoryStore};
use quotebox::ui::TerminalRenderer;
use quotebox::util::validate_endpoint;

type CliApp = App<Database, TerminalRenderer<std::io::Stdout>>;

/// Get the config directory path (~/.config/quotebox/)
fn get_config_dir() -> Result<PathBuf> {
    let home = std::env::var("HOME").context("HOME environment variable not set")?;
    Ok(PathBuf::from(home).join(".config").join("quotebox"))
}

#[derive(Parser, Debug)]
#[command(name = "quotebox", about = "Random quote manager with server sync")]
struct Args {
    /// Add a quote (requires --category)
    #[arg(long, value_name = "TEXT", requires = "category")]
    add: Option<String>,

    /// Category for --add
    #[arg(long, value_name = "CAT", requires = "add")]
    category: Option<String>,

    /// Show a random quote under the current filter
    #[arg(long)]
    random: bool,

    /// Select and save the category filter ("all" for every category)
    #[arg(long, value_name = "CAT")]
    filter: Option<String>,

    /// List every quote under the current filter
    #[arg(long)]
    list: bool,

    /// Export all quotes to a JSON file
    #[arg(long, value_name = "FILE", num_args = 0..=1, default_missing_value = EXPORT_FILE_NAME)]
    export: Option<PathBuf>,

    /// Import quotes from a JSON file (appended to the collection)
    #[arg(long, value_name = "FILE")]
    import: Option<PathBuf>,

    /// Reconcile with the server once
    #[arg(long)]
    sync: bool,

    /// Keep running and reconcile with the server periodically
    #[arg(long)]
    watch: bool,

    /// Reset database (delete and recreate)
    #[arg(long)]
    reset_db: bool,

    /// Config file (defaults to ~/.config/quotebox/config.toml)
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
}

impl Args {
    fn has_action(&self) -> bool {
        self.add.is_some()
            || self.random
            || self.filter.is_some()
            || self.list
            || self.export.is_some()
            || self.import.is_some()
            || self.sync
            || self.watch
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let config_dir = get_config_dir()?;
    if !config_dir.exists() {
        std::fs::create_dir_all(&config_dir).context("Failed to create config directory")?;
        eprintln!("Created config directory: {}", config_dir.display());
    }

    // User-only access to the directory holding the database
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        match std::fs::metadata(&config_dir) {
            Ok(metadata) => {
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
            Err(e) => {
                tracing::warn!(
                    path = %config_dir.display(),
                    error = %e,
                    "Failed to read config directory metadata"
                );
            }
        }
    }

    let config_path = args
        .config
        .clone()
        .unwrap_or_else(|| config_dir.join("config.toml"));
    let config = Config::load(&config_path)
        .with_context(|| format!("Failed to load config from {}", config_path.display()))?;

    let db_path = config_dir.join("quotes.db");
    if args.reset_db && db_path.exists() {
        std::fs::remove_file(&db_path).context("Failed to delete database")?;
        eprintln!("Database reset.");
    }

    let db_path_str = db_path
        .to_str()
        .ok_or_else(|| anyhow::anyhow!("Invalid UTF-8 in database path"))?;
    let db = match Database::open(db_path_str).await {
        Ok(db) => db,
        Err(DatabaseError::InstanceLocked) => {
            eprintln!(
                "Error: Another instance of quotebox appears to be running. Please close it and try again."
            );
            std::process::exit(1);
        }
        Err(e) => {
            return Err(anyhow::anyhow!("Failed to open database: {}", e));
        }
    };

    let store = QuoteStore::load(db, Box::new(StdRandom::new()))
        .await
        .into_shared();
    let renderer = TerminalRenderer::new(std::io::stdout(), config.display_width);
    let mut app = App::new(store, MemoryStore::new(), renderer);

    match remote_source(&config) {
        Ok(source) => app = app.with_remote(source, config.publish_new_quotes),
        Err(e) => {
            tracing::warn!(endpoint = %config.endpoint, error = %e, "Remote sync disabled");
        }
    }

    app.init().await;
    run_actions(&mut app, &args).await?;

    if args.watch {
        watch(&mut app, &config).await?;
    }
    Ok(())
}

fn remote_source(config: &Config) -> Result<Arc<dyn RemoteQuoteSource>> {
    let endpoint = validate_endpoint(&config.endpoint)?;
    let client = build_client(config.request_timeout())?;
    let source = HttpQuoteSource::new(client, endpoint)
        .with_category(config.server_category.clone())
        .with_limit(config.remote_limit)
        .with_timeout(config.request_timeout());
    Ok(Arc::new(source))
}

/// Run the one-shot actions in a fixed order: import, add, filter, sync,
/// export, list, random.
async fn run_actions(app: &mut CliApp, args: &Args) -> Result<()> {
    if let Some(path) = &args.import {
        app.import_from(path).await?;
    }
    if let Some(text) = &args.add {
        let category = args.category.as_deref().unwrap_or_default();
        app.add_quote(text, category).await?;
    }
    if let Some(category) = &args.filter {
        if !app.select_filter(category).await {
            anyhow::bail!("Unknown category: {}", category);
        }
    }
    if args.sync {
        app.sync_now().await?;
    }
    if let Some(path) = &args.export {
        app.export_to(path).await?;
    }
    if args.list {
        app.list().await;
    }
    if args.random || !args.has_action() {
        app.show_random().await;
    }
    Ok(())
}

/// Poll the server until SIGINT or SIGTERM, printing each sync result.
async fn watch(app: &mut CliApp, config: &Config) -> Result<()> {
    let Some(period) = config.poll_interval() else {
        anyhow::bail!("Polling is disabled (poll_interval_secs = 0)");
    };
    let source = remote_source(config).context("Cannot watch without a valid endpoint")?;

    let (event_tx, mut event_rx) = mpsc::channel::<SyncEvent>(16);
    let poller = SyncPoller::spawn(app.store().clone(), source, period, Some(event_tx));
    tracing::info!(period_secs = period.as_secs(), "Watching for server quotes");

    #[cfg(unix)]
    let mut sigterm = signal(SignalKind::terminate())?;

    loop {
        #[cfg(unix)]
        let sigterm_fut = sigterm.recv();
        #[cfg(not(unix))]
        let sigterm_fut = std::future::pending::<Option<()>>();

        tokio::select! {
            biased;

            _ = sigterm_fut => {
                tracing::info!("Received SIGTERM, shutting down gracefully");
                break;
            }

            _ = tokio::signal::ctrl_c() => {
                tracing::info!("Received SIGINT, shutting down gracefully");
                break;
            }

            event = event_rx.recv() => match event {
                Some(event) => app.handle_sync_event(event).await,
                None => break,
            },
        }
    }

    poller.shutdown().await;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_args_verify() {
        use clap::CommandFactory;
        Args::command().debug_assert();
    }

    #[test]
    fn test_no_flags_means_show_random() {
        let args = Args::parse_from(["quotebox"]);
        assert!(!args.has_action());
    }

    #[test]
    fn test_add_requires_category() {
        assert!(Args::try_parse_from(["quotebox", "--add", "Carpe diem"]).is_err());
        let args =
            Args::try_parse_from(["quotebox", "--add", "Carpe diem", "--category", "Life"]).unwrap();
        assert_eq!(args.category.as_deref(), Some("Life"));
        assert!(args.has_action());
    }

    #[test]
    fn test_category_requires_add() {
        assert!(Args::try_parse_from(["quotebox", "--category", "Life"]).is_err());
    }

    #[test]
    fn test_export_default_file_name() {
        let args = Args::parse_from(["quotebox", "--export"]);
        assert_eq!(args.export, Some(PathBuf::from(EXPORT_FILE_NAME)));
    }
}
