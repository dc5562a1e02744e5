//! offroute-monitor entry point.
//!
//! Loads the configuration, builds the route profile and participant
//! roster, then polls the position source forever. `--test-sms` sends a
//! single message through the configured gateway and exits, which is the
//! quickest way to verify gateway settings before an event.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use log::{error, info};

use offroute_monitor::config::MonitorConfig;
use offroute_monitor::daemon::Daemon;
use offroute_monitor::error::Result;
use offroute_monitor::http::send_sms;

#[derive(Parser, Debug)]
#[command(
    name = "offroute-monitor",
    about = "Route deviation monitor with SMS alerts"
)]
struct Args {
    /// Config file path
    #[arg(short, long, default_value = "config.json")]
    config: PathBuf,
    /// Send a single test SMS to this phone number, then exit
    #[arg(long, value_name = "PHONE")]
    test_sms: Option<String>,
    /// Message body for --test-sms
    #[arg(long)]
    test_message: Option<String>,
    /// Log alerts instead of calling the SMS gateway
    #[arg(long)]
    dry_run: bool,
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();
    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!("{}", err);
            ExitCode::FAILURE
        }
    }
}

async fn run(args: Args) -> Result<()> {
    let config = MonitorConfig::load(&args.config)?;
    config.validate_source()?;

    if let Some(phone) = args.test_sms.as_deref() {
        let message = args
            .test_message
            .as_deref()
            .unwrap_or("Test message from the off-route monitor.");
        if args.dry_run {
            info!("Dry run: would send test SMS to {}: {}", phone, message);
        } else {
            send_sms(&config.sms_gateway, phone, message).await?;
            info!("Sent test SMS to {}: {}", phone, message);
        }
        return Ok(());
    }

    let mut daemon = Daemon::from_config(config, args.dry_run)?;
    daemon.run().await
}
