use std::{path::PathBuf, time::Duration};

use anyhow::Context as _;
use clap::Parser;
use panomask::{
    AssetLayout, CancelToken, DEFAULT_LANDSCAPES_DIR, DEFAULT_RESULTS_DIR, DEFAULT_STATE_LOG,
    FrameSize, MaskConfig, MaskSession, MonitorSettings, PanoramaMapping, discover_config,
    load_mask_configs,
};

/// Watch a panorama's state log and re-render its index masks on every change.
#[derive(Parser, Debug)]
#[command(name = "panomask", version, about)]
struct Cli {
    /// Panorama whose assets live under `<landscapes>/<panorama_id>`.
    panorama_id: String,

    /// Directory holding one asset directory per panorama.
    #[arg(long, default_value = DEFAULT_LANDSCAPES_DIR)]
    landscapes: PathBuf,

    /// JSON file mapping gray values to output indexes, keyed by panorama id.
    #[arg(long, default_value = "mask_mapping.json")]
    mapping: PathBuf,

    /// JSON array of explicit mask configurations; replaces mapping-based discovery.
    #[arg(long)]
    masks: Option<PathBuf>,

    /// Directory receiving numbered result images.
    #[arg(long, default_value = DEFAULT_RESULTS_DIR)]
    results: PathBuf,

    /// Append-only state log to watch.
    #[arg(long, default_value = DEFAULT_STATE_LOG)]
    state_log: PathBuf,

    /// Delay between polls, in milliseconds.
    #[arg(long, default_value_t = 10)]
    interval_ms: u64,

    /// Render mask configurations in parallel.
    #[arg(long)]
    parallel: bool,

    /// Poll once, render if the log holds a state, and exit.
    #[arg(long)]
    once: bool,

    /// Log level used when `RUST_LOG` is unset (trace, debug, info, warn, error).
    #[arg(long, default_value = "info")]
    log_level: String,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level);

    let layout = AssetLayout::under_landscapes(&cli.landscapes, cli.panorama_id.clone());
    let configs = resolve_configs(&cli, &layout)?;

    let settings = MonitorSettings {
        state_log: cli.state_log.clone(),
        results_dir: cli.results.clone(),
        poll_interval: Duration::from_millis(cli.interval_ms),
        frame_size: FrameSize::CANONICAL,
        parallel: cli.parallel,
    };
    let mut session = MaskSession::initialize(configs, &layout, settings)?;
    for pipeline in session.pipelines() {
        let dir = pipeline.compositor().results_dir();
        std::fs::create_dir_all(dir)
            .with_context(|| format!("create results dir '{}'", dir.display()))?;
    }

    if cli.once {
        let report = session.poll_once()?;
        for outcome in &report.rendered {
            eprintln!("wrote {}", outcome.path.display());
        }
        return Ok(());
    }

    let cancel = CancelToken::new();
    install_shutdown_handler(cancel.clone())?;
    let interval = session.settings().poll_interval;
    session.run_forever(interval, &cancel);
    Ok(())
}

fn resolve_configs(cli: &Cli, layout: &AssetLayout) -> anyhow::Result<Vec<MaskConfig>> {
    if let Some(path) = &cli.masks {
        return Ok(load_mask_configs(path)?);
    }
    let mapping = PanoramaMapping::load(&cli.mapping, layout.panorama_id())?;
    Ok(vec![discover_config(layout, &mapping)?])
}

fn init_logging(level: &str) {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(format!("panomask={level}")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .init();
}

/// Cancel `token` on SIGINT (and SIGTERM on unix) from a dedicated signal thread.
fn install_shutdown_handler(token: CancelToken) -> anyhow::Result<()> {
    let runtime = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .context("build signal runtime")?;

    std::thread::Builder::new()
        .name("panomask-signals".to_string())
        .spawn(move || {
            runtime.block_on(wait_for_shutdown());
            tracing::info!("shutdown requested");
            token.cancel();
        })
        .context("spawn signal thread")?;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown() {
    use tokio::signal::unix::{SignalKind, signal};

    match signal(SignalKind::terminate()) {
        Ok(mut sigterm) => {
            tokio::select! {
                _ = ctrl_c_or_pending() => {}
                _ = sigterm.recv() => {}
            }
        }
        Err(err) => {
            tracing::warn!(error = %err, "SIGTERM handler unavailable");
            ctrl_c_or_pending().await;
        }
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown() {
    ctrl_c_or_pending().await;
}

async fn ctrl_c_or_pending() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %err, "SIGINT handler unavailable");
        std::future::pending::<()>().await;
    }
}
