use std::path::PathBuf;
use std::sync::Arc;

use chrono::Local;
use clap::Parser;
use healthmon::{
    collect_all, generate_alerts,
    config::read_config_file,
    report::{Report, print_summary, save_report},
    util::get_log_level,
};
use tracing::{error, info, trace};
use tracing_subscriber::{filter, layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Clone, Parser)]
#[command(version, about = "Single-shot host health check")]
struct Args {
    /// Config file
    #[arg(short, long, default_value = "config.json")]
    config: String,

    /// Override the report output directory from the config file
    #[arg(short, long)]
    output_dir: Option<PathBuf>,
}

fn init() {
    dotenv::dotenv().ok();

    let filter = filter::Targets::new().with_target("healthmon", get_log_level());
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .compact()
                .with_ansi(false),
        )
        .with(filter)
        .init();
}

#[tokio::main]
async fn main() {
    init();
    let args = Args::parse();
    trace!("started with args: {args:?}");

    let exit_code = tokio::select! {
        code = run(&args) => code,
        _ = tokio::signal::ctrl_c() => {
            // no partial artifact on interrupt
            eprintln!();
            eprintln!("⚠️  health check interrupted");
            130
        }
    };

    std::process::exit(exit_code);
}

async fn run(args: &Args) -> i32 {
    let mut config = match read_config_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("fatal: {e:#}");
            return 1;
        }
    };

    if let Some(output_dir) = &args.output_dir {
        config.output_dir = output_dir.clone();
    }
    let config = Arc::new(config);

    let captured_at = Local::now();
    let snapshot = collect_all(&config).await;

    info!("generating alerts");
    let alerts = generate_alerts(&snapshot, &config.thresholds);

    let report = Report::assemble(snapshot, alerts, captured_at);

    match save_report(&report, &config.output_dir) {
        Ok(path) => info!("report saved to {}", path.display()),
        Err(e) => {
            error!("fatal: {e:#}");
            return 1;
        }
    }

    print_summary(&report);

    report.summary.health_status.exit_code()
}
