use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use clap::{Parser, ValueEnum};
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt, BufReader};
use tokio::signal;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use turnstile::config::{LogFormat, TurnstileConfig};
use turnstile::ratelimit::{Clock, ManualClock, MonotonicClock, RateLimiter};

/// Replay request lines from stdin through a rate limiter.
///
/// Each input line is `<client_id>` or, with `--replay`, `<client_id> <timestamp_ms>`.
/// Each decision is printed as `<client_id> allowed|rejected`.
#[derive(Debug, Parser)]
#[command(name = "turnstile", version, about)]
struct Args {
    /// YAML or JSON configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Strategy tag, overriding the configuration
    #[arg(long)]
    strategy: Option<String>,

    /// Requests per window, overriding the configuration
    #[arg(long, allow_negative_numbers = true)]
    capacity: Option<i64>,

    /// Window length in milliseconds, overriding the configuration
    #[arg(long, allow_negative_numbers = true)]
    window_ms: Option<i64>,

    /// Take request instants from the input instead of the live clock
    #[arg(long)]
    replay: bool,

    /// Log output format, overriding the configuration
    #[arg(long, value_enum)]
    log_format: Option<LogFormatArg>,
}

#[derive(Debug, Clone, Copy, ValueEnum)]
enum LogFormatArg {
    Text,
    Json,
}

impl From<LogFormatArg> for LogFormat {
    fn from(arg: LogFormatArg) -> Self {
        match arg {
            LogFormatArg::Text => LogFormat::Text,
            LogFormatArg::Json => LogFormat::Json,
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = match &args.config {
        Some(path) => TurnstileConfig::from_file(path)
            .with_context(|| format!("failed to load {}", path.display()))?,
        None => TurnstileConfig::default(),
    };
    if let Some(strategy) = &args.strategy {
        config.limiter.strategy = strategy.clone();
    }
    config.limiter.override_rule(args.capacity, args.window_ms);
    if let Some(format) = args.log_format {
        config.log.format = format.into();
    }

    init_tracing(&config);

    info!("Starting Turnstile");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let manual_clock = Arc::new(ManualClock::new());
    let clock: Arc<dyn Clock> = if args.replay {
        manual_clock.clone()
    } else {
        Arc::new(MonotonicClock::new())
    };
    let limiter = config.build_limiter_with_clock(clock)?;
    info!(
        strategy = %limiter.strategy(),
        capacity = limiter.rule().capacity(),
        window = ?limiter.rule().window(),
        replay = args.replay,
        "Rate limiter initialized"
    );

    let mut stdout = tokio::io::stdout();
    tokio::select! {
        result = replay_lines(
            &limiter,
            args.replay.then_some(manual_clock.as_ref()),
            BufReader::new(tokio::io::stdin()),
            &mut stdout,
        ) => result?,
        _ = shutdown_signal() => {}
    }

    info!(clients = limiter.client_count(), "Turnstile stopped");
    Ok(())
}

fn init_tracing(config: &TurnstileConfig) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log.level));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(true)
        .with_writer(std::io::stderr);

    match config.log.format {
        LogFormat::Text => builder.init(),
        LogFormat::Json => builder.json().init(),
    }
}

/// Feed every input line through the limiter until end of input.
async fn replay_lines<R, W>(
    limiter: &RateLimiter,
    replay_clock: Option<&ManualClock>,
    input: R,
    output: &mut W,
) -> anyhow::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    let mut line_no = 0usize;

    while let Some(line) = lines.next_line().await? {
        line_no += 1;
        let mut fields = line.split_whitespace();
        let Some(client_id) = fields.next() else {
            continue;
        };

        if let Some(clock) = replay_clock {
            let Some(timestamp) = fields.next() else {
                bail!("line {line_no}: missing timestamp in replay mode");
            };
            let millis: u64 = timestamp
                .parse()
                .with_context(|| format!("line {line_no}: invalid timestamp {timestamp:?}"))?;
            clock.set(Duration::from_millis(millis));
        } else if fields.next().is_some() {
            warn!(line = line_no, "Ignoring timestamp outside replay mode");
        }

        let allowed = limiter.handle_request(client_id)?;
        let decision = if allowed { "allowed" } else { "rejected" };
        output
            .write_all(format!("{} {}\n", client_id, decision).as_bytes())
            .await?;
        output.flush().await?;
    }

    Ok(())
}

/// Wait for a shutdown signal (Ctrl+C or SIGTERM).
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        }
        _ = terminate => {
            info!("Received SIGTERM, shutting down");
        }
    }
}
