use anyhow::Context;
use clap::Parser;
use fire_risk_etl::config::toml_config::FireRiskConfig;
use fire_risk_etl::domain::model::Region;
use fire_risk_etl::utils::error::ErrorSeverity;
use fire_risk_etl::utils::{logger, validation::Validate};
use fire_risk_etl::{
    AnalysisParams, CliConfig, CompletionPoller, DriveClient, EarthEngineClient, ExportDispatcher,
    FireRiskError, FireRiskWorkflow, LocalStorage, MapProjection, PollSettings, RegionSelector,
    RiskLayerBuilder, RunReport,
};
use std::path::Path;
use tokio_util::sync::CancellationToken;

const DEFAULT_CONFIG_PATH: &str = "fire-risk.toml";
/// 128 + SIGINT
const EXIT_CANCELLED: i32 = 130;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = CliConfig::parse();

    if args.json_logs {
        logger::init_json_logger();
    } else {
        logger::init_cli_logger(args.verbose);
    }
    tracing::info!("🚀 Starting fire-risk");

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => exit_with(&e, "❌ Configuration validation failed"),
    };

    let selector = RegionSelector::new(
        MapProjection::new(config.map),
        config.analysis.buffer_meters,
    );

    if args.list_provinces {
        print_provinces(&selector);
        return Ok(());
    }

    let region = match resolve_region(&args, &config, &selector) {
        Ok(region) => region,
        Err(e) => exit_with(&e, "❌ Region selection failed"),
    };
    tracing::info!("📍 Region: {}", region.name);

    let date_range = config.date_range()?;
    let platform = EarthEngineClient::new(&config.platform, config.platform_token().map(str::to_string))?;
    let drive = DriveClient::new(&config.drive, config.drive_token().map(str::to_string))?;
    if config.platform_token().is_none() {
        tracing::warn!("⚠️ No platform access token configured (EE_ACCESS_TOKEN)");
    }

    let workflow = FireRiskWorkflow::new_with_monitoring(
        platform,
        drive,
        RiskLayerBuilder::new(AnalysisParams::from_config(&config.analysis, date_range)),
        ExportDispatcher::new(config.export.clone()),
        CompletionPoller::new(
            LocalStorage::new(&config.download.output_dir),
            PollSettings {
                interval: config.poll_interval(),
                timeout: config.overall_timeout(),
            },
        ),
        args.monitor,
    );

    if args.dry_run {
        tracing::info!("🔍 DRY RUN MODE - nothing will be submitted");
        let requests = match workflow.plan(&region).await {
            Ok(requests) => requests,
            Err(e) => exit_with(&e, "❌ Building layer requests failed"),
        };
        let json = serde_json::to_string_pretty(&requests).context("serializing layer requests")?;
        println!("{}", json);
        return Ok(());
    }

    // Ctrl-C 只停止輪詢，已下載的檔案保留
    let cancel = CancellationToken::new();
    let ctrl_c_token = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("🛑 Interrupt received, stopping");
            ctrl_c_token.cancel();
        }
    });

    let report = match workflow.run(region, &cancel).await {
        Ok(report) => report,
        Err(e) => exit_with(&e, "❌ Fire risk analysis failed"),
    };

    print_report(&report, &config.download.output_dir);

    if report.was_cancelled() {
        tracing::warn!("🛑 Run cancelled before all layers finished");
        std::process::exit(EXIT_CANCELLED);
    }

    let worst = report
        .layers
        .iter()
        .filter_map(|l| l.result.as_ref().err())
        .map(|e| e.severity())
        .max();
    if let Some(severity) = worst {
        let code = exit_code(severity);
        if code > 0 {
            std::process::exit(code);
        }
    }

    Ok(())
}

fn load_config(args: &CliConfig) -> fire_risk_etl::Result<FireRiskConfig> {
    let path = Path::new(&args.config);
    let mut config = if path.exists() {
        tracing::info!("📁 Loading configuration from: {}", args.config);
        FireRiskConfig::from_file(path)?
    } else if args.config == DEFAULT_CONFIG_PATH {
        tracing::info!("📁 No {} found, using defaults", DEFAULT_CONFIG_PATH);
        let mut config = FireRiskConfig::default();
        config.apply_env_defaults();
        config
    } else {
        return Err(FireRiskError::ConfigError {
            message: format!("config file '{}' does not exist", args.config),
        });
    };

    args.apply_overrides(&mut config);
    config.validate()?;
    tracing::info!("✅ Configuration loaded and validated successfully");
    Ok(config)
}

fn resolve_region(
    args: &CliConfig,
    config: &FireRiskConfig,
    selector: &RegionSelector,
) -> fire_risk_etl::Result<Region> {
    if let Some(name) = &args.province {
        return selector.select_by_name(name);
    }
    if let Some(click) = &args.click {
        return match click.as_slice() {
            [x, y] => selector.select_at_pixel(*x, *y),
            _ => Err(FireRiskError::SelectionError {
                message: format!("--click expects X,Y but got {} values", click.len()),
            }),
        };
    }
    if let (Some(lon), Some(lat)) = (args.lon, args.lat) {
        return selector.custom_point(lon, lat);
    }
    selector.select_by_name(&config.analysis.default_region)
}

fn print_provinces(selector: &RegionSelector) {
    println!("{:<28} {:>9} {:>9} {:>6} {:>6}", "Province", "Lat", "Lon", "X", "Y");
    for province in selector.provinces() {
        let (x, y) = selector.projection().geo_to_pixel(province.lat, province.lon);
        println!(
            "{:<28} {:>9.4} {:>9.4} {:>6} {:>6}",
            province.name, province.lat, province.lon, x, y
        );
    }
}

fn print_report(report: &RunReport, output_dir: &str) {
    println!("📋 Fire risk layers for {}:", report.region.name);
    for layer in &report.layers {
        match &layer.result {
            Ok(artifact) => println!(
                "  ✅ {:<14} {} ({} bytes)",
                layer.kind.to_string(),
                artifact.path.display(),
                artifact.bytes
            ),
            Err(e) => println!("  ❌ {:<14} {}", layer.kind.to_string(), e.user_friendly_message()),
        }
    }
    if report.is_complete() {
        println!("✅ All files downloaded to {}", output_dir);
    }
}

fn exit_code(severity: ErrorSeverity) -> i32 {
    match severity {
        ErrorSeverity::Low => 0,
        ErrorSeverity::Medium => 2,   // 可重試
        ErrorSeverity::High => 1,     // 處理錯誤
        ErrorSeverity::Critical => 3, // 認證、設定或檔案系統
    }
}

fn exit_with(e: &FireRiskError, context: &str) -> ! {
    tracing::error!(
        "{}: {} (Category: {:?}, Severity: {:?})",
        context,
        e,
        e.category(),
        e.severity()
    );
    eprintln!("❌ {}", e.user_friendly_message());
    eprintln!("💡 Suggestion: {}", e.recovery_suggestion());
    std::process::exit(exit_code(e.severity()).max(1))
}
