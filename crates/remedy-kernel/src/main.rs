use chrono::Utc;
use clap::{value_parser, Arg, ArgAction, Command};
use parking_lot::Mutex;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use remedy_core::error::TelemetryError;
use remedy_core::{ComplianceScore, RemedyConfig, SourceReading, TelemetrySource};
use remedy_kernel::{ControlLoopBuilder, LoopState};
use std::sync::Arc;

/// Drifting synthetic telemetry for demo runs: compliance wanders in the
/// high nineties with the occasional dip below the floor.
struct SyntheticTelemetry {
    name: String,
    rng: Mutex<StdRng>,
}

impl SyntheticTelemetry {
    fn new(name: &str, seed: u64) -> Self {
        Self {
            name: name.to_string(),
            rng: Mutex::new(StdRng::seed_from_u64(seed)),
        }
    }
}

#[async_trait::async_trait]
impl TelemetrySource for SyntheticTelemetry {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<SourceReading, TelemetryError> {
        let mut rng = self.rng.lock();
        let compliance = if rng.gen_bool(0.1) {
            rng.gen_range(88.0..95.0)
        } else {
            rng.gen_range(95.5..99.5)
        };
        Ok(SourceReading {
            compliance: Some(ComplianceScore::new(compliance)),
            latency_ms: Some(rng.gen_range(20.0..80.0)),
            throughput_rps: Some(rng.gen_range(800.0..1500.0)),
            error_rate: Some(rng.gen_range(0.0..0.01)),
            sampled_at: Utc::now(),
        })
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Command::new("remedy-kernel")
        .version("0.1.0")
        .about("Autonomous remediation control plane")
        .arg_required_else_help(true)
        .arg(
            Arg::new("log-level")
                .long("log-level")
                .global(true)
                .default_value("info")
                .help("Log filter when RUST_LOG is unset"),
        )
        .subcommand(
            Command::new("run")
                .about("Run the control loop")
                .arg(
                    Arg::new("config")
                        .long("config")
                        .help("Path to a TOML config file"),
                )
                .arg(
                    Arg::new("ticks")
                        .long("ticks")
                        .default_value("10")
                        .value_parser(value_parser!(u64))
                        .help("Number of ticks to run"),
                )
                .arg(
                    Arg::new("seed")
                        .long("seed")
                        .default_value("42")
                        .value_parser(value_parser!(u64))
                        .help("Seed for the synthetic telemetry source"),
                ),
        )
        .subcommand(
            Command::new("classify")
                .about("Classify one operation through the Safety Gateway")
                .arg(Arg::new("operation").required(true).help("Operation text"))
                .arg(
                    Arg::new("confirmed")
                        .long("confirmed")
                        .action(ArgAction::SetTrue)
                        .help("Treat the operation as operator-confirmed"),
                ),
        );

    let matches = cli.get_matches();
    let log_level = matches
        .get_one::<String>("log-level")
        .map(String::as_str)
        .unwrap_or("info");
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .init();

    match matches.subcommand() {
        Some(("run", args)) => {
            let config = match args.get_one::<String>("config") {
                Some(path) => RemedyConfig::load(path)?,
                None => RemedyConfig::default(),
            };
            let ticks = *args.get_one::<u64>("ticks").unwrap();
            let seed = *args.get_one::<u64>("seed").unwrap();

            let interval = config.tick_interval();
            let mut control = ControlLoopBuilder::new(config)
                .with_source(Arc::new(SyntheticTelemetry::new("synthetic", seed)))
                .build();

            for tick in 0..ticks {
                match control.tick().await {
                    Ok(report) => {
                        tracing::info!(
                            tick,
                            compliance = %report.snapshot.compliance,
                            held = report.held,
                            outcome = ?report.execution.outcome,
                            "tick complete"
                        );
                    }
                    Err(err) => tracing::error!(tick, error = %err, "tick failed"),
                }
                if control.state() == LoopState::Paused {
                    tracing::error!("loop paused; stopping demo run");
                    break;
                }
                tokio::time::sleep(interval).await;
            }

            let report = control.gateway().report(10, 5);
            println!("{}", serde_json::to_string_pretty(&report)?);
            println!(
                "attestation chain: {} links, verified: {}",
                control.rollback().attestation_export().len(),
                control.rollback().verify_chain().is_ok()
            );
        }
        Some(("classify", args)) => {
            let operation = args.get_one::<String>("operation").unwrap();
            let mut context = remedy_gateway::OperationContext::new("cli");
            if args.get_flag("confirmed") {
                context = context.confirmed();
            }
            let gateway = remedy_gateway::SafetyGateway::new();
            let verdict = gateway.classify(operation, &context);
            println!("{}", serde_json::to_string_pretty(&verdict)?);
        }
        _ => {}
    }

    Ok(())
}
