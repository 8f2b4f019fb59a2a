use anyhow::{anyhow, Context};
use clap::Parser;
use log::info;
use server_traffic_monitor::aggregation::AggregationEngine;
use server_traffic_monitor::app::App;
use server_traffic_monitor::capture::{CaptureDriver, PcapEngine};
use server_traffic_monitor::headless;
use server_traffic_monitor::settings::Config;
use std::io;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "server-traffic-monitor")]
#[command(about = "Windowed per-peer traffic statistics for one monitored server")]
struct Cli {
    #[arg(short, long, help = "Configuration file path")]
    config: Option<PathBuf>,

    #[arg(short, long, env = "SERVER_IP", help = "Address whose traffic is tracked")]
    server_ip: Option<String>,

    #[arg(short, long, env = "IFACE", help = "Network interface to capture on")]
    interface: Option<String>,

    #[arg(long, env = "PCAP_FILE", help = "Replay a pcap file instead of capturing live")]
    pcap_file: Option<PathBuf>,

    #[arg(long, env = "WINDOW_SIZE", help = "Window width in seconds")]
    window_size: Option<u64>,

    #[arg(long, env = "KEEP_WINDOWS", help = "Number of windows kept in memory")]
    keep_windows: Option<usize>,

    #[arg(long, help = "Print JSON lines instead of starting the dashboard")]
    headless: bool,

    #[arg(long, help = "Refresh / report interval in milliseconds")]
    interval_ms: Option<u64>,

    #[arg(long, help = "Initial dashboard view (peers, protocols, windows)")]
    view: Option<String>,

    #[arg(long, value_name = "PATH", help = "Write the effective configuration and exit")]
    write_config: Option<PathBuf>,

    #[arg(short, long, help = "Enable debug logging")]
    debug: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging(&cli);

    let mut config = match &cli.config {
        Some(path) => Config::load_from_file(path)
            .with_context(|| format!("cannot load {}", path.display()))?,
        None => Config::default(),
    };
    apply_overrides(&cli, &mut config);
    config.validate().context("invalid configuration")?;

    if let Some(path) = &cli.write_config {
        config
            .save_to_file(path)
            .with_context(|| format!("cannot write {}", path.display()))?;
        println!("Wrote configuration to {}", path.display());
        return Ok(());
    }

    let engine = AggregationEngine::new(
        config.aggregation.window_size_secs,
        config.aggregation.keep_windows,
    )?;

    let pcap = PcapEngine::from_config(&config.capture).context("cannot start packet capture")?;
    let monitored = config.capture.server_ip.clone();
    info!("Capturing from {}", pcap.name());
    let capture = CaptureDriver::spawn(pcap, engine.clone(), monitored.clone())
        .context("cannot start capture thread")?;

    info!(
        "Monitoring {} with {}s windows, keeping {}",
        monitored, config.aggregation.window_size_secs, config.aggregation.keep_windows
    );

    let refresh = Duration::from_millis(config.ui.refresh_rate_ms);

    if cli.headless {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .context("cannot start async runtime")?;
        runtime.block_on(headless::run(
            engine.query(),
            Some(capture),
            monitored,
            refresh,
            io::stdout().lock(),
        ))?;
    } else {
        let mut app = App::new(engine.query(), Some(capture), monitored)
            .with_refresh(refresh, config.ui.max_rows)
            .with_view(&config.ui.default_view);
        app.run().map_err(|e| anyhow!("dashboard error: {}", e))?;
    }

    Ok(())
}

fn init_logging(cli: &Cli) {
    // The dashboard owns the terminal, so it only logs when asked to
    let level = if cli.debug {
        "debug"
    } else if cli.headless {
        "info"
    } else {
        return;
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

/// CLI flags and environment variables win over the config file.
fn apply_overrides(cli: &Cli, config: &mut Config) {
    if let Some(server_ip) = cli.server_ip.as_ref().filter(|s| !s.trim().is_empty()) {
        config.capture.server_ip = server_ip.clone();
    }
    if let Some(interface) = cli.interface.as_ref().filter(|s| !s.trim().is_empty()) {
        config.capture.interface = Some(interface.clone());
    }
    if let Some(pcap_file) = cli.pcap_file.as_ref().filter(|p| !p.as_os_str().is_empty()) {
        config.capture.pcap_file = Some(pcap_file.clone());
    }
    if let Some(window_size) = cli.window_size {
        config.aggregation.window_size_secs = window_size;
    }
    if let Some(keep_windows) = cli.keep_windows {
        config.aggregation.keep_windows = keep_windows;
    }
    if let Some(interval_ms) = cli.interval_ms {
        config.ui.refresh_rate_ms = interval_ms;
    }
    if let Some(view) = &cli.view {
        config.ui.default_view = view.clone();
    }
}
