use std::io::Read;
use std::sync::Arc;

use anyhow::{Context, bail};
use clap::{Parser, Subcommand};
use tracing::{debug, info, warn};

use garry_pow::codec::{self, decode_hash};
use garry_pow::config::Config;
use garry_pow::error_handling::ErrorHandler;
use garry_pow::logging::init_log;
use garry_pow::metrics::MetricsCollector;
use garry_pow::prometheus_metrics::PrometheusMetrics;
use garry_pow::{
    AuxBindings, CancelToken, Difficulty, Entropy, GatewayClient, HashKind, Miner, Poster,
    Progress, SubmissionRecord,
};

#[derive(Parser)]
#[command(name = "garry-pow", version, about = "Mine and post proof-of-work content to a garry gateway")]
struct Cli {
    /// Gateway base URL (overrides GATEWAY_URL)
    #[arg(long, global = true)]
    gateway: Option<String>,

    /// Print Prometheus metrics to stdout on exit
    #[arg(long, global = true)]
    metrics: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Mine a value and submit it
    Post {
        val: String,
        #[arg(short, long)]
        difficulty: Option<Difficulty>,
        #[arg(long)]
        tag: Option<String>,
        /// Do not bind a timestamp
        #[arg(long)]
        no_time: bool,
    },
    /// Mine a value and print the request body without sending it
    Mine {
        val: String,
        #[arg(short, long)]
        difficulty: Option<Difficulty>,
        #[arg(long)]
        tag: Option<String>,
        #[arg(long)]
        no_time: bool,
        /// 32 hex chars; makes the search reproducible
        #[arg(long)]
        seed: Option<String>,
    },
    /// List values matching a prefix, newest first
    List {
        #[arg(default_value = "")]
        prefix: String,
    },
    /// Fetch content by work hash and check its proof
    Get {
        work: String,
        #[arg(short, long)]
        difficulty: Option<Difficulty>,
        #[arg(long)]
        no_verify: bool,
    },
    /// Check a submission record (JSON argument, or "-" for stdin)
    Verify {
        record: String,
        #[arg(short, long)]
        difficulty: Option<Difficulty>,
    },
}

fn aux_for(tag: Option<String>, no_time: bool) -> AuxBindings {
    match (tag, no_time) {
        (None, true) => AuxBindings::None,
        (Some(tag), true) => AuxBindings::tagged(tag),
        (tag, false) => AuxBindings::timed_now(tag.unwrap_or_default()),
    }
}

fn build_miner(config: &Config, entropy: Entropy) -> Miner<HashKind> {
    Miner::with_hasher(config.hash)
        .entropy(entropy)
        .workers(config.workers)
        .progress(
            config.progress_interval,
            Arc::new(|p: Progress| debug!(worker = p.worker, trials = p.trials, "mining")),
        )
}

fn cancel_token(config: &Config) -> CancelToken {
    let token = match config.mine_timeout() {
        Some(timeout) => CancelToken::new().with_timeout(timeout),
        None => CancelToken::new(),
    };
    let on_interrupt = token.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("interrupted, cancelling");
            on_interrupt.cancel();
        }
    });
    token
}

fn parse_seed(seed: &str) -> anyhow::Result<[u8; 16]> {
    let mut out = [0u8; 16];
    hex::decode_to_slice(seed, &mut out).context("--seed must be 32 hex characters")?;
    Ok(out)
}

async fn run(
    command: Command,
    config: &Config,
    metrics: Arc<MetricsCollector>,
    prometheus: Arc<PrometheusMetrics>,
) -> anyhow::Result<()> {
    let handler = ErrorHandler::new(metrics.clone())
        .with_retry_config(config.retry())
        .with_prometheus(prometheus.clone());

    match command {
        Command::Post { val, difficulty, tag, no_time } => {
            let difficulty = difficulty.unwrap_or(config.difficulty);
            let gateway = GatewayClient::new(&config.gateway())?;
            let poster = Poster::new(build_miner(config, Entropy::Secure), gateway, metrics)
                .with_prometheus(prometheus)
                .with_retry_config(config.retry());

            let aux = aux_for(tag, no_time);
            let token = cancel_token(config);
            info!(
                %difficulty,
                workers = poster.miner().worker_count(),
                expected_trials = difficulty.expected_trials(),
                "mining"
            );
            let posted = poster.post(&val, &aux, difficulty, &token).await?;
            println!("{}", posted.url);
        }
        Command::Mine { val, difficulty, tag, no_time, seed } => {
            let difficulty = difficulty.unwrap_or(config.difficulty);
            let entropy = match seed {
                Some(seed) => Entropy::Seeded(parse_seed(&seed)?),
                None => Entropy::Secure,
            };
            let gateway = GatewayClient::new(&config.gateway())?;
            let poster = Poster::new(build_miner(config, entropy), gateway, metrics)
                .with_prometheus(prometheus);
            let aux = aux_for(tag, no_time);
            let token = cancel_token(config);
            let solution = poster.mine(&val, &aux, difficulty, &token).await?;

            let record = codec::encode_submission(&val, &aux, &solution.nonce, &solution.work_hash);
            let body = codec::to_wire(&record, config.wire_schema);
            println!("{}", serde_json::to_string_pretty(&body)?);
        }
        Command::List { prefix } => {
            let gateway = GatewayClient::new(&config.gateway())?;
            let entries = handler.execute_with_retry(|| gateway.list(&prefix)).await?;
            for entry in entries {
                println!("{}\t{}", entry.added, entry.val);
            }
        }
        Command::Get { work, difficulty, no_verify } => {
            let work_hash = decode_hash("work", &work)?;
            let gateway = GatewayClient::new(&config.gateway())?;
            let content = handler.execute_with_retry(|| gateway.fetch(&work_hash)).await?;

            if !no_verify {
                let difficulty = difficulty.unwrap_or(config.difficulty);
                if !content.verify(&config.hash, &work_hash, difficulty) {
                    bail!("content does not match work hash {work} at difficulty {difficulty}");
                }
            }
            println!("{}", String::from_utf8_lossy(&content.val));
        }
        Command::Verify { record, difficulty } => {
            let raw = if record == "-" {
                let mut buf = String::new();
                std::io::stdin().read_to_string(&mut buf)?;
                buf
            } else {
                record
            };
            let record: SubmissionRecord =
                serde_json::from_str(&raw).context("record is not a valid submission")?;
            let difficulty = difficulty.unwrap_or(config.difficulty);
            if !codec::verify_submission(&config.hash, &record, difficulty)? {
                bail!("invalid work at difficulty {difficulty}");
            }
            println!("valid");
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let mut config = Config::from_env()?;
    if let Some(url) = cli.gateway {
        config.gateway_url = url;
    }
    if cli.metrics {
        config.metrics_enabled = true;
    }
    config.validate()?;
    init_log(&config.log_level);

    let metrics = Arc::new(MetricsCollector::new());
    let prometheus = Arc::new(PrometheusMetrics::new());
    let result = run(cli.command, &config, metrics.clone(), prometheus.clone()).await;

    if config.metrics_enabled {
        prometheus.update_from_metrics(&metrics.get_metrics());
        print!("{}", prometheus.export_metrics()?);
    }
    result
}
