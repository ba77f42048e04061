use std::path::PathBuf;

use anyhow::{Context, Result};
use chrono::Utc;
use clap::Parser;
use smcbot::gateway::{paper_gateway, BridgeGateway, Gateway};
use smcbot::{Engine, Pipeline, StrategyConfig, Variant};

#[derive(Parser)]
#[command(
    name = "smcbot",
    about = "Multi-timeframe structure/liquidity trading bot for a terminal bridge"
)]
struct Cli {
    /// TOML file layered over the variant preset (skipped if missing).
    #[arg(long, default_value = "smcbot.toml")]
    config: PathBuf,

    /// Preset: structure, swing, scalper or trend.
    #[arg(long, default_value = "structure")]
    variant: Variant,

    /// Trade against an in-memory paper terminal with synthetic candles.
    #[arg(long, default_value_t = false)]
    paper: bool,

    /// Run a single cycle and exit.
    #[arg(long, default_value_t = false)]
    once: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    setup_logging();

    let cli = Cli::parse();

    let config = StrategyConfig::load(cli.variant, Some(&cli.config))
        .with_context(|| format!("loading {}", cli.config.display()))?;
    log_configuration(&config);

    let pipeline = Pipeline::new(config).context("building signal pipeline")?;

    if cli.paper {
        tracing::info!("📝 Paper mode: synthetic candles, no orders leave this process");
        let gateway = paper_gateway(pipeline.config(), seed_from_clock(), Utc::now());
        drive(Engine::new(gateway, pipeline), cli.once).await;
    } else {
        let gateway = BridgeGateway::connect(&pipeline.config().bridge)
            .await
            .context("terminal bridge unavailable")?;
        drive(Engine::new(gateway, pipeline), cli.once).await;
    }

    tracing::info!("👋 smcbot stopped");
    Ok(())
}

fn setup_logging() {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("smcbot=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn log_configuration(config: &StrategyConfig) {
    tracing::info!("🚀 smcbot starting ({} variant)", config.variant);
    tracing::info!("📊 Configuration:");
    tracing::info!("  Symbol: {}", config.symbol);
    if let Some(correlated) = &config.correlated_symbol {
        tracing::info!("  Correlated: {}", correlated);
    }
    tracing::info!(
        "  Timeframes: HTF {} / ITF {} / LTF {}",
        config.timeframes.htf,
        config.timeframes.itf,
        config.timeframes.ltf
    );
    tracing::info!("  Risk: {}% per trade, min RR {}", config.risk_percent, config.min_reward_risk);
    if !config.sessions.is_empty() {
        tracing::info!(
            "  Sessions: {} window(s), {} clock",
            config.sessions.len(),
            config.session_timezone.name()
        );
    }
    let gates: Vec<String> = config.gates.iter().map(|g| g.to_string()).collect();
    tracing::info!("  Gates: {}", gates.join(" → "));
}

fn seed_from_clock() -> u64 {
    Utc::now().timestamp() as u64
}

async fn drive<G: Gateway>(mut engine: Engine<G>, once: bool) {
    if once {
        engine.run_cycle(Utc::now()).await;
        return;
    }

    tracing::info!("Press Ctrl+C to stop...");
    engine
        .run(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for Ctrl+C: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;
}
