use clap::Parser;
use permit_trends::adapters::http::{ArchiveFetcher, STATBEL_PERMITS_URL};
use permit_trends::utils::logger;
use permit_trends::utils::validation::{validate_path, validate_url};
use std::path::PathBuf;
use std::time::Duration;

#[derive(Parser)]
#[command(name = "fetch-permits")]
#[command(about = "Download the Statbel building-permits archive and unpack its data file")]
struct Args {
    #[arg(long, default_value = STATBEL_PERMITS_URL)]
    url: String,

    /// Directory the data file is written to
    #[arg(long, default_value = "data")]
    data_dir: String,

    /// Request timeout in seconds
    #[arg(long, default_value_t = 120)]
    timeout: u64,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    let checked = validate_url("url", &args.url).and_then(|_| validate_path("data_dir", &args.data_dir));
    if let Err(e) = checked {
        tracing::error!("❌ Invalid arguments: {}", e);
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let fetcher = ArchiveFetcher::new(args.url).with_timeout(Duration::from_secs(args.timeout));
    tracing::info!("🚀 Fetching permits archive from {}", fetcher.url());

    match fetcher.fetch_into(&PathBuf::from(&args.data_dir)).await {
        Ok(path) => {
            tracing::info!("✅ Data file saved to {}", path.display());
            println!("✅ Data file saved to: {}", path.display());
        }
        Err(e) => {
            tracing::error!(
                "❌ Download failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
            std::process::exit(e.severity().exit_code());
        }
    }
}
