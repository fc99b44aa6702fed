use clap::Parser;
use permit_trends::config::validate_provider;
use permit_trends::utils::error::EtlError;
use permit_trends::utils::logger;
use permit_trends::{CliConfig, EtlEngine, LocalStorage, PermitPipeline};

fn main() {
    let config = CliConfig::parse();

    if config.json_logs {
        logger::init_json_logger(config.verbose);
    } else {
        logger::init_cli_logger(config.verbose);
    }

    tracing::info!("Starting permit-trends CLI");
    if config.verbose {
        tracing::debug!("CLI config: {:?}", config);
    }

    if let Err(e) = validate_provider(&config) {
        tracing::error!("❌ Configuration validation failed: {}", e);
        tracing::error!("💡 Suggestion: {}", e.recovery_suggestion());
        eprintln!("❌ {}", e.user_friendly_message());
        std::process::exit(1);
    }

    let monitor_enabled = config.monitor;
    if monitor_enabled {
        tracing::info!("🔍 System monitoring enabled");
    }

    let input = LocalStorage::new("");
    let output = LocalStorage::new(config.output_path.clone());
    let pipeline = PermitPipeline::new(input, output, config);
    let engine = EtlEngine::new_with_monitoring(pipeline, monitor_enabled);

    match engine.run() {
        Ok(outcome) => {
            let report = &outcome.analysis.report;
            tracing::info!("✅ Run completed successfully!");
            println!("✅ Run completed successfully!");
            println!(
                "📊 {} rows read, {} skipped, {} records",
                report.rows_seen, report.rows_skipped, report.records
            );
            println!("📁 Output saved to: {}", outcome.export.output_dir);
            for file in &outcome.export.files {
                println!("   - {}", file);
            }
        }
        Err(e) => exit_with(e),
    }
}

fn exit_with(e: EtlError) -> ! {
    tracing::error!(
        "❌ Run failed: {} (Category: {:?}, Severity: {:?})",
        e,
        e.category(),
        e.severity()
    );
    tracing::error!("💡 Recovery suggestion: {}", e.recovery_suggestion());

    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());

    std::process::exit(e.severity().exit_code());
}
