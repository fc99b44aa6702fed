use clap::Parser;
use permit_trends::domain::ports::ConfigProvider;
use permit_trends::utils::logger;
use permit_trends::utils::validation::Validate;
use permit_trends::{EtlEngine, LocalStorage, PermitPipeline, TomlConfig};

#[derive(Parser)]
#[command(name = "permit-report")]
#[command(about = "Permit trend run driven by a TOML configuration file")]
struct Args {
    /// Path to TOML configuration file
    #[arg(short, long, default_value = "permit-report.toml")]
    config: String,

    /// Enable verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Override monitoring setting from config
    #[arg(long)]
    monitor: Option<bool>,

    /// Show what would be processed without reading or writing data
    #[arg(long)]
    dry_run: bool,
}

fn main() {
    let args = Args::parse();

    let config = match TomlConfig::from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            logger::init_cli_logger(args.verbose);
            tracing::error!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("❌ Failed to load config file '{}': {}", args.config, e);
            eprintln!("💡 Make sure the file exists and is valid TOML format");
            std::process::exit(1);
        }
    };

    match config.log_level() {
        Some(level) if !args.verbose => logger::init_with_level(level),
        _ => logger::init_cli_logger(args.verbose),
    }

    tracing::info!("📁 Loaded configuration from: {}", args.config);

    if let Err(e) = config.validate() {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    display_config_summary(&config, &args);

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - No actual processing will occur");
        return;
    }

    let monitor_enabled = args.monitor.unwrap_or_else(|| config.monitoring_enabled());
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let output = LocalStorage::new(config.output_path().to_string());
    let pipeline = PermitPipeline::new(LocalStorage::new(""), output, config);
    let engine = EtlEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run() {
        Ok(outcome) => {
            tracing::info!("✅ Report completed successfully!");
            println!("✅ Report completed successfully!");
            println!(
                "📊 {} rows read, {} skipped",
                outcome.analysis.report.rows_seen, outcome.analysis.report.rows_skipped
            );
            println!("📁 Output saved to: {}", outcome.export.output_dir);
        }
        Err(e) => {
            tracing::error!(
                "❌ Report failed: {} (Category: {:?}, Severity: {:?})",
                e,
                e.category(),
                e.severity()
            );
            tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

            eprintln!("❌ {}", e.user_friendly_message());
            eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

            std::process::exit(e.severity().exit_code());
        }
    }
}

fn display_config_summary(config: &TomlConfig, args: &Args) {
    let source = config.source();
    let export = config.export();
    let regions: Vec<&str> = config.regions().iter().map(|r| r.slug()).collect();

    println!("📋 Configuration Summary:");
    println!("  Pipeline: {}", config.pipeline.name);
    if !config.pipeline.description.is_empty() {
        println!("  Description: {}", config.pipeline.description);
    }
    println!(
        "  Source: {} ({:?} layout, delimiter '{}')",
        config.input_path(),
        source.layout,
        source.delimiter()
    );
    println!("  Regions: {}", regions.join(", "));
    println!("  Trend window: {} months", config.trend_window());
    println!(
        "  Output: {} ({:?} tables, shares as {:?})",
        config.output_path(),
        export.layout,
        export.share_scale
    );
    println!(
        "  Absent marker: '{}', decimals: {}",
        export.absent_marker, export.decimals
    );

    if args.dry_run {
        println!("  🔍 DRY RUN MODE ENABLED");
    }

    println!();
}
