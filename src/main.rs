//! critsync - Egerie → Cyberwatch criticality synchronization
//!
//! A one-shot CLI that reads business-impact (sigma) scores of supporting
//! assets from Egerie risk analyses and applies the matching criticality
//! to every server of the Cyberwatch group with the same name.
//!
//! Exit codes:
//!   0 - Success (per-server failures are reported, not fatal)
//!   1 - Fatal error (configuration, authentication, upstream, IO)
//!   2 - A server update or group listing failed and --fail-on-error was set

mod cli;
mod config;
mod error;
mod models;
mod report;
mod sources;
mod sync;

use anyhow::{Context, Result};
use cli::{Args, OutputFormat};
use config::Config;
use sources::{CyberwatchClient, EgerieClient};
use sync::ReconcileOptions;
use tracing::{debug, error, info};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    // Parse command-line arguments
    let args = Args::parse_args();

    // Validate arguments
    if let Err(e) = args.validate() {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    // Handle --init-config early (no logging needed)
    if args.init_config {
        return handle_init_config();
    }

    init_logging(&args);

    info!("critsync v{}", env!("CARGO_PKG_VERSION"));
    debug!(
        "Config: {:?}, dry run: {}, format: {:?}",
        args.config, args.dry_run, args.format
    );

    match run_sync(args).await {
        Ok(exit_code) => {
            std::process::exit(exit_code);
        }
        Err(e) => {
            error!("Synchronization failed: {}", e);
            eprintln!("\n❌ Error: {:#}", e);
            std::process::exit(1);
        }
    }
}

/// Handle --init-config: generate a default .critsync.toml.
fn handle_init_config() -> Result<()> {
    let path = std::path::Path::new(config::DEFAULT_CONFIG_FILE);

    if path.exists() {
        eprintln!(
            "⚠️  {} already exists. Remove it first or edit it manually.",
            config::DEFAULT_CONFIG_FILE
        );
        std::process::exit(1);
    }

    let content = Config::default_toml();
    std::fs::write(path, &content)
        .with_context(|| format!("Failed to write {}", config::DEFAULT_CONFIG_FILE))?;

    println!(
        "✅ Created {} with default settings.",
        config::DEFAULT_CONFIG_FILE
    );
    println!("   Fill in the endpoints, credentials and at least one Egerie analysis id.");
    Ok(())
}

/// Initialize logging based on verbosity settings.
fn init_logging(args: &Args) {
    let level = args.log_level();

    let subscriber = FmtSubscriber::builder()
        .with_max_level(level)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .compact()
        .finish();

    if let Err(e) = tracing::subscriber::set_global_default(subscriber) {
        eprintln!("Failed to set tracing subscriber: {}", e);
    }
}

/// Run the complete synchronization. Returns exit code (0 or 2).
async fn run_sync(args: Args) -> Result<i32> {
    // Load and check configuration before touching the network
    let mut config = load_config(&args)?;
    config.merge_with_args(&args);
    config.validate()?;

    let timeout = config.sync.timeout_seconds;
    let sink = CyberwatchClient::new(&config.cyberwatch, timeout)?;
    let mut source = EgerieClient::new(&config.egerie.url, timeout)?;

    // Banners would corrupt JSON on stdout
    let chatty = !args.quiet && args.format == OutputFormat::Text;

    // Step 1: Connectivity
    if chatty {
        if !args.skip_ping {
            println!("🔌 Checking Cyberwatch API connection: {}", config.cyberwatch.url);
        }
        println!("🔑 Authenticating against Egerie: {}", config.egerie.url);
    }
    let credentials = sources::Credentials {
        username: config.egerie.username.clone(),
        password: config.egerie.password.clone(),
    };
    sync::connect(&mut source, &sink, &credentials, !args.skip_ping).await?;

    // Step 2: Pipeline
    if chatty {
        println!(
            "🔄 Synchronizing {} analyses ({} threshold bands){}...",
            config.sync.analyses.len(),
            config.sync.bands.len(),
            if args.dry_run { " [dry run]" } else { "" }
        );
    }

    let options = ReconcileOptions {
        dry_run: args.dry_run,
        show_progress: chatty,
    };
    let summary = sync::run_pipeline(&source, &sink, &config.sync, options).await?;

    // Step 3: Report
    match args.format {
        OutputFormat::Text => println!("\n{}", report::generate_text_summary(&summary)),
        OutputFormat::Json => println!("{}", report::generate_json_summary(&summary)?),
    }

    if let Some(ref output) = args.output {
        report::write_json_summary(&summary, output)?;
        info!("Summary written to {}", output.display());
    }

    if args.fail_on_error && (summary.failed > 0 || summary.group_failures > 0) {
        eprintln!(
            "\n⛔ {} server updates and {} group listings failed. Failing (exit code 2).",
            summary.failed, summary.group_failures
        );
        return Ok(2);
    }

    if chatty {
        println!("✅ Done.");
    }
    Ok(0)
}

/// Load configuration from file or use defaults.
fn load_config(args: &Args) -> Result<Config> {
    // Try explicit config path
    if let Some(ref config_path) = args.config {
        info!("Loading config from: {}", config_path.display());
        return Config::load(config_path);
    }

    // Try default location; a present but broken file is fatal
    match Config::load_default()? {
        Some(config) => {
            info!("Loaded default config from {}", config::DEFAULT_CONFIG_FILE);
            Ok(config)
        }
        None => {
            debug!("No config file found, using defaults");
            Ok(Config::default())
        }
    }
}
