use clap::Parser;
use gsgmail_connector::{setup_logging, GmailConnector, TestBundle};
use log::{debug, error, info, LevelFilter};
use std::path::PathBuf;

#[derive(Parser)]
#[clap(name = "gsgmail-connector")]
#[clap(version)]
#[clap(about = "Run G Suite Gmail connector actions from a test JSON file", long_about = None)]
struct Cli {
    /// Input test JSON file
    input_test_json: PathBuf,

    /// Write logs to this file instead of stderr
    #[clap(long)]
    log_file: Option<String>,

    /// Enable debug logging
    #[clap(long, short, action)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let level = if cli.verbose {
        LevelFilter::Debug
    } else {
        LevelFilter::Info
    };

    match cli.log_file.as_deref() {
        Some(path) => {
            let log_path = setup_logging(level, Some(path))?;
            eprintln!("Logs will be saved to {}", log_path);
        }
        None => env_logger::builder().filter_level(level).init(),
    }

    let bundle = TestBundle::from_path(&cli.input_test_json)?;
    debug!("Loaded test bundle for action {}", bundle.identifier);
    println!("{}", serde_json::to_string_pretty(&bundle.parameters)?);

    let config = bundle.asset_config()?;
    let connector = match GmailConnector::initialize(&config) {
        Ok(connector) => connector,
        Err(e) => {
            error!("Initialization failed: {}", e);
            eprintln!("Initialization failed: {}", e);
            std::process::exit(1);
        }
    };

    info!("Running {} with {} parameter set(s)", bundle.identifier, bundle.parameters.len());
    let results = connector.run_bundle(&bundle).await;

    println!("{}", serde_json::to_string_pretty(&results)?);
    Ok(())
}
