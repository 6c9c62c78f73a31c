use clap::Parser;
use devpulse::collectors::profile::ProfileProbe;
use devpulse::collectors::system::SystemProbe;
use devpulse::collectors::HostProbe;
use devpulse::config::{Config, ProbeKind};
use devpulse::render::{JsonPresenter, TextPresenter};
use devpulse::{Dashboard, EnvironmentGate, PageLocation, Presenter};
use std::sync::Arc;
use tracing::{error, info};
use tracing_subscriber::EnvFilter;

#[derive(Parser, Debug)]
#[command(name = "devpulse")]
#[command(version)]
struct Cli {
    #[arg(long, default_value = "./devpulse.yaml")]
    config: String,
    #[arg(long)]
    print_default_config: bool,
    /// Page address to evaluate instead of `page_url` from the config.
    #[arg(long)]
    url: Option<String>,
    #[arg(long, conflicts_with = "disable")]
    enable: bool,
    #[arg(long, conflicts_with = "enable")]
    disable: bool,
    /// Print one JSON document per refresh instead of text cards.
    #[arg(long)]
    json: bool,
}

#[tokio::main]
async fn main() {
    init_tracing();

    let cli = Cli::parse();
    if cli.print_default_config {
        println!("{}", Config::example_yaml());
        return;
    }

    let mut cfg = match Config::load_from_file(&cli.config) {
        Ok(cfg) => cfg,
        Err(err) => {
            error!(error = %err, "failed to load configuration");
            std::process::exit(1);
        }
    };
    if let Some(url) = cli.url {
        cfg.page_url = url;
    }
    if cli.enable {
        cfg.enabled = Some(true);
    } else if cli.disable {
        cfg.enabled = Some(false);
    }

    let location = match PageLocation::parse(&cfg.page_url) {
        Ok(location) => location,
        Err(err) => {
            error!(error = %err, "invalid page address");
            std::process::exit(1);
        }
    };

    let probe: Arc<dyn HostProbe> = match cfg.probe {
        ProbeKind::System => Arc::new(SystemProbe::new()),
        ProbeKind::Profile => Arc::new(ProfileProbe::new(cfg.host_profile.clone())),
    };
    let presenter: Arc<dyn Presenter> = if cli.json {
        Arc::new(JsonPresenter)
    } else {
        Arc::new(TextPresenter)
    };

    info!(
        page_url = %cfg.page_url,
        probe = ?cfg.probe,
        interval_ms = cfg.interval_ms,
        "starting devpulse"
    );

    let mut dashboard = Dashboard::new(
        EnvironmentGate::evaluate(&location),
        probe,
        Some(presenter),
        cfg.dashboard_options(),
    );
    if let Some(enabled) = cfg.enabled {
        dashboard.set_enabled(enabled);
    }

    if !dashboard.open().await {
        info!("dashboard disabled for this page, nothing to do");
        return;
    }

    if let Err(err) = tokio::signal::ctrl_c().await {
        error!(error = %err, "failed to wait for Ctrl+C");
    }
    info!("received Ctrl+C, shutting down");

    dashboard.close();
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
