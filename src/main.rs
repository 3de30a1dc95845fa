use anyhow::Result;
use clap::Parser;
use hyprtask::services::badges::BadgeCounter;
use hyprtask::services::detector::WindowStateDetector;
use hyprtask::services::hyprctl::HyprctlClient;
use hyprtask::services::icons::IconResolver;
use hyprtask::services::registry::DesktopFileRegistry;
use hyprtask::Config;
use std::sync::Arc;
use tokio::signal;
use tracing::{error, info};

#[derive(Parser, Debug)]
#[command(name = "hyprtask")]
#[command(about = "Window-state watcher for a Hyprland taskbar")]
struct Args {
    /// Path to the configuration file
    #[arg(short, long, default_value = "hyprtask.toml")]
    config: String,

    /// Log level
    #[arg(long, default_value = "info")]
    log_level: String,

    /// Print the current state once and exit
    #[arg(long)]
    oneshot: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    init_tracing(&args.log_level)?;

    info!("Starting hyprtask v{}", env!("CARGO_PKG_VERSION"));

    let config = Config::load(&args.config)?;
    info!("Configuration loaded from: {}", args.config);

    let source = match &config.detector.command_socket_path {
        Some(path) => HyprctlClient::new(path.clone()),
        None => HyprctlClient::from_env()?,
    };
    let detector = WindowStateDetector::new(
        Arc::new(source),
        Arc::new(DesktopFileRegistry::new()),
        Arc::new(IconResolver::new()),
        config.detector.clone(),
        config.matcher.clone(),
    );
    let badges = Arc::new(BadgeCounter::new());

    if args.oneshot {
        detector.refresh().await;
        let state = detector.current_state();
        for badge in badges.compute_running(&state, false) {
            println!("{} ({}): {} windows", badge.app.name, badge.app.id, badge.count);
        }
        return Ok(());
    }

    let badges_cb = badges.clone();
    let subscription = detector.subscribe(move |state| {
        for badge in badges_cb.compute_running(&state, false) {
            info!(
                "{} ({}): {} windows",
                badge.app.name, badge.app.id, badge.count
            );
        }
    })?;
    detector.refresh().await;

    info!("Watching for window changes, Ctrl+C to stop");

    match signal::ctrl_c().await {
        Ok(()) => info!("Shutdown signal received"),
        Err(err) => error!("Failed to wait for shutdown signal: {}", err),
    }

    detector.unsubscribe(subscription);
    detector.cleanup();

    info!("hyprtask stopped");
    Ok(())
}

fn init_tracing(level: &str) -> Result<()> {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().or_else(|_| EnvFilter::try_new(level))?;

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().compact())
        .init();

    Ok(())
}
