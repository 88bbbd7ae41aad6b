//! PoPAI CLI
//!
//! Usage:
//!   popai                                   # Interactive flow (start / retry / reset / quit)
//!   popai --auto                            # One attempt, exit code reports the outcome
//!   popai --serve                           # Mock verifier HTTP API
//!   popai --verifier-url http://host:3000   # Flow against a remote verifier
//!   popai --auto --json                     # JSON lines output

use clap::Parser;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;

use popai::config::VerifierMode;
use popai::core::{
    run_server, ChallengeFlow, FlowHandle, HttpVerifier, MockCapture, MockVerifier,
    StaticDeviceAccess, Verifier,
};
use popai::logging::{init_logging, LogFormat};
use popai::types::FlowUpdate;
use popai::{ConfigError, FlowConfig, VerifierError, VERSION};

#[derive(Parser, Debug)]
#[command(
    name = "popai",
    version = VERSION,
    about = "PoPAI - client-side liveness challenge flow",
    long_about = "Runs the PoPAI liveness challenge flow: capability probe, timed\n\
                  challenge, response submission and outcome routing.\n\n\
                  Interactive commands:\n  \
                  start  - Request a challenge\n  \
                  retry  - Return to idle after a failure\n  \
                  reset  - Abandon the current attempt\n  \
                  quit   - Leave\n\n\
                  States:\n  \
                  IDLE               - Ready to start\n  \
                  AWAITING_CHALLENGE - Waiting for the verifier\n  \
                  COUNTING           - Perform the prompt before zero\n  \
                  SUBMITTING         - Response sent for verification\n  \
                  SUCCEEDED          - Verified, token minted\n  \
                  FAILED             - Rejected or unreachable, retry available"
)]
struct Args {
    /// Run the mock verifier as an HTTP API server
    #[arg(short, long)]
    serve: bool,

    /// Server address
    #[arg(long, default_value = "127.0.0.1:3000")]
    addr: String,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Use a remote verifier at this base URL
    #[arg(long)]
    verifier_url: Option<String>,

    /// Simulate a denied camera permission
    #[arg(long)]
    deny_camera: bool,

    /// Simulate a denied microphone permission
    #[arg(long)]
    deny_mic: bool,

    /// Mock verifier pass rate in [0, 1]
    #[arg(long)]
    pass_rate: Option<f64>,

    /// Seed for the mock verifier
    #[arg(long)]
    seed: Option<u64>,

    /// Start immediately and leave after one outcome
    #[arg(short, long)]
    auto: bool,

    /// Output as JSON
    #[arg(long)]
    json: bool,

    /// Disable colors in output
    #[arg(long)]
    no_color: bool,
}

#[tokio::main]
async fn main() {
    let args = Args::parse();

    let config = match load_config(&args) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Config error: {}", e);
            std::process::exit(2);
        }
    };

    init_logging(LogFormat::from_name(&config.log_format), &config.log_level);
    if args.no_color {
        colored::control::set_override(false);
    }

    if args.serve {
        run_serve(&args, &config).await;
    } else {
        let code = run_flow(&args, config).await;
        std::process::exit(code);
    }
}

/// Config file (or defaults) with command-line overrides applied
fn load_config(args: &Args) -> Result<FlowConfig, ConfigError> {
    let mut config = match &args.config {
        Some(path) => FlowConfig::from_toml_file(path)?,
        None => FlowConfig::default(),
    };

    if let Some(rate) = args.pass_rate {
        config.mock.pass_rate = rate;
    }
    if args.seed.is_some() {
        config.mock.seed = args.seed;
    }
    if let Some(url) = &args.verifier_url {
        config.verifier.mode = VerifierMode::Http;
        config.verifier.base_url = Some(url.clone());
    }

    config.validate()?;
    Ok(config)
}

fn build_verifier(config: &FlowConfig) -> Result<Arc<dyn Verifier>, VerifierError> {
    match (config.verifier.mode, &config.verifier.base_url) {
        (VerifierMode::Http, Some(url)) => {
            Ok(Arc::new(HttpVerifier::new(url.clone(), config.request_timeout())?))
        }
        _ => Ok(Arc::new(mock_verifier(config))),
    }
}

fn mock_verifier(config: &FlowConfig) -> MockVerifier {
    MockVerifier::new(config.mock.pass_rate, config.mock.seed)
        .with_challenge_ttl(config.challenge_ttl())
}

/// Run the flow until quit (interactive) or one outcome (auto)
async fn run_flow(args: &Args, config: FlowConfig) -> i32 {
    let verifier = match build_verifier(&config) {
        Ok(verifier) => verifier,
        Err(e) => {
            eprintln!("Verifier error: {}", e);
            return 2;
        }
    };

    let access = Arc::new(StaticDeviceAccess::new(!args.deny_camera, !args.deny_mic));
    let flow = ChallengeFlow::new(config, access, verifier, Arc::new(MockCapture));
    let mut updates = flow.subscribe();
    let handle = flow.spawn();

    if !args.json {
        print_header();
        if !args.auto {
            println!("Commands: start, retry, reset, quit");
            println!();
        }
    }
    if args.auto {
        handle.start();
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut succeeded = false;

    loop {
        tokio::select! {
            update = updates.recv() => match update {
                Ok(update) => {
                    print_update(&update, args);
                    if update.exit {
                        succeeded = true;
                        break;
                    }
                    if args.auto && update.ends_attempt() {
                        break;
                    }
                }
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(skipped, "output fell behind, updates dropped");
                }
                Err(RecvError::Closed) => break,
            },
            line = lines.next_line(), if !args.auto => match line {
                Ok(Some(line)) => {
                    if !dispatch(line.trim(), &handle) {
                        break;
                    }
                }
                Ok(None) | Err(_) => break,
            },
        }
    }

    match handle.shutdown().await {
        Ok(phase) => tracing::debug!(%phase, "flow finished"),
        Err(e) => tracing::error!(error = %e, "flow task failed"),
    }

    if succeeded || !args.auto {
        0
    } else {
        1
    }
}

/// Apply one interactive command; `false` means quit
fn dispatch(command: &str, handle: &FlowHandle) -> bool {
    match command.to_ascii_lowercase().as_str() {
        "start" | "s" => {
            handle.start();
        }
        "retry" | "r" => {
            handle.retry();
        }
        "reset" => {
            handle.reset();
        }
        "quit" | "q" | "exit" => return false,
        "" => {}
        other => println!("Unknown command: {}", other),
    }
    true
}

fn print_update(update: &FlowUpdate, args: &Args) {
    if args.json {
        match serde_json::to_string(update) {
            Ok(line) => println!("{}", line),
            Err(e) => eprintln!("Failed to encode update: {}", e),
        }
    } else if args.no_color {
        println!("{}", update.to_parseable_string());
    } else {
        println!("{}", update.to_terminal_string());
        if update.exit {
            println!("{}", "  ✓ VERIFIED - you may continue".green().bold());
        } else if update.can_retry {
            println!("{}", "  ⚠ Type 'retry' to try again".yellow());
        }
    }
}

fn print_header() {
    println!("{}", "========================================".bold());
    println!("{}", format!("  PoPAI v{} - Liveness Challenge", VERSION).bold());
    println!("{}", "========================================".bold());
    println!();
}

/// Run the mock verifier API
async fn run_serve(args: &Args, config: &FlowConfig) {
    let verifier = Arc::new(mock_verifier(config));
    if let Err(e) = run_server(&args.addr, verifier).await {
        eprintln!("Server error: {}", e);
        std::process::exit(1);
    }
}
