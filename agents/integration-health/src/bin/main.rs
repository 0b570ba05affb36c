//! Integration Health Agent entry point
//!
//! Adaptive throttling, quarantine and policy gates with mitigation_signal emission.

use clap::{Parser, Subcommand};
use colored::Colorize;
use integration_health::contracts::*;
use integration_health::handler::{create_router, AppState};
use integration_health::telemetry::TelemetryConfig;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use synapse_core::gates::templates::{default_gates, flavor_gates, load_catalog, Flavor};
use synapse_core::{
    CommitAnalyzer, DebtBrake, DebtCalculator, DebtInputs, EnforcementPoint, GateScope,
    LockLevel, MitigationConfig, MobilePlatform, PolicyGateEvaluator, Severity,
};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "integration-health")]
#[command(about = "Integration Health Agent - adaptive mitigation and policy gates")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8085", env = "PORT")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "0.0.0.0")]
        host: String,

        /// Mitigation config file (YAML/TOML/JSON)
        #[arg(short, long, env = "SYNAPSE_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Score integration debt for one component
    Debt {
        /// Days since the last integration (PR age for cloud, hours since apply for infra)
        #[arg(short, long)]
        days: i64,

        /// Lines changed (changed files, resources, breaking changes or screens per flavor)
        #[arg(short, long)]
        lines: i64,

        /// Number of dependencies (services, modules, environments or consumers per flavor)
        #[arg(long, default_value = "1")]
        deps: i64,

        /// Score with a discipline's own index (iot, cloud, embedded, infra, data, mobile)
        #[arg(long)]
        flavor: Option<String>,

        /// Mobile release target (ios, android, cross_platform, web_mobile)
        #[arg(long)]
        platform: Option<String>,

        /// Forecast the score this many days ahead
        #[arg(long)]
        horizon: Option<u32>,

        /// Lines changed per day for the forecast
        #[arg(long)]
        daily_rate: Option<f64>,

        /// Mitigation config file (YAML/TOML/JSON)
        #[arg(short, long, env = "SYNAPSE_CONFIG")]
        config: Option<PathBuf>,
    },

    /// Evaluate reported metrics against a gate catalogue
    Gates {
        /// Metrics file (JSON/YAML/TOML map of metric key to value)
        #[arg(short, long)]
        metrics: PathBuf,

        /// Enforcement point to consult
        #[arg(short = 'e', long, default_value = "pre_commit")]
        point: String,

        /// Gate catalogue file; defaults to the built-in catalogue
        #[arg(long)]
        catalog: Option<PathBuf>,

        /// Add a discipline catalogue (iot, cloud, embedded, infra, data, mobile)
        #[arg(long)]
        flavor: Option<String>,

        /// Project the metrics belong to
        #[arg(long)]
        project: Option<String>,
    },

    /// Check a commit message against the integration lock
    CommitCheck {
        /// Commit message
        #[arg(short, long)]
        message: String,

        /// Current debt score of the component
        #[arg(short, long)]
        debt: f64,

        /// Mitigation config file (YAML/TOML/JSON)
        #[arg(short, long, env = "SYNAPSE_CONFIG")]
        config: Option<PathBuf>,
    },
}

fn load_config(path: Option<&Path>) -> anyhow::Result<MitigationConfig> {
    match path {
        Some(path) => Ok(MitigationConfig::from_file(path)?),
        None => Ok(MitigationConfig::default()),
    }
}

fn load_metrics(path: &Path) -> anyhow::Result<HashMap<String, f64>> {
    let content = std::fs::read_to_string(path)?;
    let metrics = match path.extension().and_then(|e| e.to_str()) {
        Some("yaml") | Some("yml") => serde_yaml::from_str(&content)?,
        Some("toml") => toml::from_str(&content)?,
        _ => serde_json::from_str(&content)?,
    };
    Ok(metrics)
}

fn print_debt_label(metric: &str, severity: Severity, value: f64, lock: LockLevel) {
    let label = format!("{} ({:.2})", severity, value);
    let label = match lock {
        LockLevel::None => label.green(),
        LockLevel::Soft => label.yellow(),
        LockLevel::Hard | LockLevel::Total => label.red().bold(),
    };
    eprintln!("{}: {}", metric, label);
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "info".into()),
        ))
        .with(tracing_subscriber::fmt::layer().json())
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Serve { port, host, config } => {
            let addr: SocketAddr = format!("{}:{}", host, port).parse()?;
            let config = load_config(config.as_deref())?;
            let state = Arc::new(AppState::new(config, TelemetryConfig::from_env())?);
            let router = create_router(state);

            tracing::info!("Starting Integration Health Agent on {}", addr);
            tracing::info!(
                "Agent ID: {}, Version: {}",
                MitigationSignal::AGENT_ID,
                MitigationSignal::AGENT_VERSION
            );

            let listener = tokio::net::TcpListener::bind(addr).await?;
            axum::serve(listener, router).await?;
        }

        Commands::Debt {
            days,
            lines,
            deps,
            flavor: Some(flavor),
            platform,
            horizon,
            ..
        } => {
            let flavor: Flavor = flavor.parse().map_err(anyhow::Error::msg)?;
            let mut inputs = flavor.inputs(days, lines, deps);
            if let Some(platform) = platform {
                let platform: MobilePlatform = platform.parse().map_err(anyhow::Error::msg)?;
                inputs = inputs.on_platform(platform);
            }

            let calculator = DebtCalculator::for_flavor(flavor);
            let bands = *calculator.bands();
            let score = calculator.score(&inputs)?;
            let lock = LockLevel::from_debt(score.value, &bands);
            let forecast = horizon
                .map(|h| calculator.predict(&inputs, h))
                .transpose()?;

            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "flavor": flavor,
                    "inputs": inputs,
                    "metric": score.metric,
                    "debt_score": score.value,
                    "severity": score.severity,
                    "throttle": DebtBrake::new(bands).throttle_from_debt(score.value),
                    "lock_level": lock,
                    "forecast": forecast,
                }))?
            );
            print_debt_label(&score.metric, score.severity, score.value, lock);
        }

        Commands::Debt {
            days,
            lines,
            deps,
            horizon,
            daily_rate,
            config,
            ..
        } => {
            let config = load_config(config.as_deref())?;
            let calculator = DebtCalculator::new(config.bands);
            let brake = DebtBrake::new(config.bands);
            let inputs = DebtInputs::new("cli", days, lines, deps);

            let score = calculator.score(&inputs);
            let lock = LockLevel::from_debt(score.value, &config.bands);
            let forecast = horizon.map(|h| calculator.predict(&inputs, h, daily_rate));

            println!(
                "{}",
                serde_json::to_string_pretty(&serde_json::json!({
                    "debt_score": score.value,
                    "severity": score.severity,
                    "throttle": brake.throttle_from_debt(score.value),
                    "lock_level": lock,
                    "forecast": forecast,
                }))?
            );

            print_debt_label("debt", score.severity, score.value, lock);
        }

        Commands::Gates {
            metrics,
            point,
            catalog,
            flavor,
            project,
        } => {
            let point: EnforcementPoint = point.parse().map_err(anyhow::Error::msg)?;
            let mut gates = match catalog {
                Some(path) => load_catalog(path)?,
                None => default_gates(),
            };
            if let Some(flavor) = flavor {
                let flavor: Flavor = flavor.parse().map_err(anyhow::Error::msg)?;
                gates.extend(flavor_gates(flavor));
            }

            let values = load_metrics(&metrics)?;
            let mut builder = PolicyGateEvaluator::builder().gates(gates);
            for (key, value) in values {
                builder = builder.resolver(key, move |_: &GateScope| Some(value));
            }
            let evaluator = builder.build()?;

            let scope = GateScope {
                project_id: project,
                ..Default::default()
            };
            let verdict = evaluator.check(point, &scope)?;

            println!("{}", serde_json::to_string_pretty(&verdict)?);
            for result in &verdict.results {
                let icon = if result.passed { "✓".green() } else { "✗".red() };
                eprintln!("{} {}", icon, result.message);
            }
            for skipped in &verdict.skipped {
                eprintln!("{} {} (no value reported)", "-".dimmed(), skipped);
            }

            if !verdict.allowed {
                eprintln!("{}", format!("{} blocked", point.as_str()).red().bold());
                std::process::exit(1);
            }
        }

        Commands::CommitCheck {
            message,
            debt,
            config,
        } => {
            let config = load_config(config.as_deref())?;
            let level = LockLevel::from_debt(debt, &config.bands);
            let decision = CommitAnalyzer::analyze(&message, level);

            println!("{}", serde_json::to_string_pretty(&decision)?);

            if decision.allowed {
                eprintln!("{} {}", "allowed".green(), decision.reason);
            } else {
                eprintln!("{} {}", "denied".red().bold(), decision.reason);
                for suggestion in &decision.suggestions {
                    eprintln!("  {}", suggestion.yellow());
                }
                std::process::exit(1);
            }
        }
    }

    Ok(())
}
