use clap::{Parser, Subcommand};
use serial_link::config::{Config, ConfigLoader};
use serial_link::error::{parse_hex, to_hex, AppError, AppResult};
use serial_link::logging;
use serial_link::transport::{Batch, IoBuffer, SerialTransport};
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::signal;
use tracing::{info, warn};

// Command-line arguments
#[derive(Parser, Debug)]
#[command(
    version,
    about = "Queued, rate-limited serial transport for microcontroller links.",
    long_about = "Opens a tty, configures it raw 8N1 and exchanges byte buffers with a microcontroller. Outbound payloads are queued and flushed by a worker thread at a capped rate."
)]
struct Args {
    /// Device node (overrides config; aliases from the config are resolved).
    #[arg(short, long, global = true)]
    device: Option<String>,

    /// Baud rate (overrides config). Unsupported rates are clamped to 230400.
    #[arg(short, long, global = true, allow_negative_numbers = true)]
    baud: Option<i64>,

    /// Explicit configuration file.
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Queue hex payloads and wait until the worker has flushed them.
    Send {
        /// Payload in hex, e.g. `01ff7e`. Repeat for several buffers.
        #[arg(long = "hex", required = true)]
        payloads: Vec<String>,

        /// Send every payload this many times.
        #[arg(long, default_value_t = 1)]
        repeat: u32,

        /// Enqueue all payloads as one batch instead of one batch each.
        #[arg(long)]
        batch: bool,
    },
    /// Perform timed reads and print what arrived.
    Read {
        /// Bytes per read (defaults to the read capacity).
        #[arg(long)]
        bytes: Option<usize>,

        /// Number of reads.
        #[arg(long, default_value_t = 10)]
        count: u32,
    },
    /// Print incoming data until Ctrl-C, recovering the device when it drops.
    Monitor,
    /// Open the device, run one recovery cycle and report status.
    Probe {
        /// Print the status as JSON.
        #[arg(long)]
        json: bool,
    },
}

// --- Main Application Entry Point ---
#[tokio::main]
async fn main() -> AppResult<()> {
    let args = Args::parse();
    let config = load_config(&args)?;
    logging::init(&config.logging);

    let device = config.serial.resolve_device(&config.serial.device);
    let baud = config.serial.baud_rate;
    let transport = SerialTransport::with_opener(
        serial_link::SystemOpener,
        config.transport.to_options(),
    );

    match args.command {
        Command::Send {
            payloads,
            repeat,
            batch,
        } => {
            let payloads = payloads
                .iter()
                .map(|p| parse_hex(p))
                .collect::<AppResult<Vec<_>>>()?;
            run_send(&transport, &device, baud, payloads, repeat, batch)
        }
        Command::Read { bytes, count } => run_read(&transport, &device, baud, bytes, count),
        Command::Monitor => run_monitor(transport, device, baud).await,
        Command::Probe { json } => run_probe(&transport, &device, baud, json),
    }
}

fn load_config(args: &Args) -> AppResult<Config> {
    let mut config = match &args.config {
        Some(path) => ConfigLoader::load_from(path)?.into_config(),
        None => ConfigLoader::load()?.into_config(),
    };
    if let Some(device) = &args.device {
        config.serial.device = device.clone();
    }
    if let Some(baud) = args.baud {
        config.serial.baud_rate = baud;
    }
    config.validate()?;
    Ok(config)
}

fn run_send(
    transport: &SerialTransport,
    device: &str,
    baud: i64,
    payloads: Vec<Vec<u8>>,
    repeat: u32,
    as_batch: bool,
) -> AppResult<()> {
    transport.open(device, baud)?;
    transport.start()?;

    let buffers: Vec<IoBuffer> = payloads.into_iter().map(IoBuffer::from).collect();
    let per_round = if as_batch { 1 } else { buffers.len() as u64 };
    let expected = per_round * u64::from(repeat);

    for _ in 0..repeat {
        if as_batch {
            transport.enqueue_batch(Batch::from(buffers.clone()));
        } else {
            for buffer in &buffers {
                transport.enqueue_data(buffer.clone());
            }
        }
    }

    let period = Duration::from_secs(1) / transport.options().max_update_rate_hz.max(1);
    let deadline = Instant::now() + drain_budget(period, expected);
    while transport.stats().batches_sent < expected && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    transport.stop();

    let stats = transport.stats();
    println!(
        "sent {} batch(es), {} byte(s), {} failed write(s)",
        stats.batches_sent, stats.bytes_written, stats.writes_failed
    );
    Ok(())
}

/// Time to wait for `batches` paced batches to drain, plus slack.
fn drain_budget(period: Duration, batches: u64) -> Duration {
    let cycles = u32::try_from(batches).unwrap_or(u32::MAX).saturating_add(1);
    period
        .saturating_mul(cycles)
        .saturating_add(Duration::from_secs(2))
}

fn run_read(
    transport: &SerialTransport,
    device: &str,
    baud: i64,
    bytes: Option<usize>,
    count: u32,
) -> AppResult<()> {
    transport.open(device, baud)?;
    let n = bytes.unwrap_or_else(|| transport.read_capacity());

    for _ in 0..count {
        let outcome = transport.read_data(n)?;
        if outcome.is_timeout() {
            println!("(no data)");
        } else {
            println!("{}", to_hex(outcome.data()));
        }
    }
    Ok(())
}

async fn run_monitor(transport: SerialTransport, device: String, baud: i64) -> AppResult<()> {
    if let Err(e) = transport.open(&device, baud) {
        warn!(error = %e, "initial open failed; will keep retrying");
    }

    let transport = Arc::new(transport);
    let running = Arc::new(AtomicBool::new(true));

    let reader = {
        let transport = Arc::clone(&transport);
        let running = Arc::clone(&running);
        tokio::task::spawn_blocking(move || monitor_loop(&transport, &running))
    };

    shutdown_signal().await?;
    running.store(false, Ordering::SeqCst);
    reader
        .await
        .map_err(|e| AppError::Runtime(std::io::Error::other(e)))?;
    Ok(())
}

fn monitor_loop(transport: &SerialTransport, running: &AtomicBool) {
    let capacity = transport.read_capacity();
    while running.load(Ordering::SeqCst) {
        if !transport.is_open() && !transport.recover() {
            std::thread::sleep(Duration::from_millis(500));
            continue;
        }

        match transport.read_data(capacity) {
            Ok(outcome) if !outcome.is_empty() => println!("{}", to_hex(outcome.data())),
            Ok(_) => {}
            Err(e) => {
                warn!(error = %e, "read failed; recovering");
                transport.recover();
            }
        }
    }
}

fn run_probe(transport: &SerialTransport, device: &str, baud: i64, json: bool) -> AppResult<()> {
    let descriptor = transport
        .open(device, baud)
        .map_err(|_| AppError::OpenFailed(device.to_string()))?;
    let recovered = transport.recover();
    info!(%descriptor, recovered, "probe finished");

    if json {
        let status = serde_json::json!({
            "device": device,
            "baud_rate": baud,
            "applied_baud": serial_link::map_baud(baud).bits_per_second(),
            "open": transport.is_open(),
            "recovered": recovered,
            "descriptor": transport.descriptor().map(|d| d.id()),
        });
        println!("{status}");
    } else {
        println!(
            "{device}: open={} recovered={recovered} baud={}",
            transport.is_open(),
            serial_link::map_baud(baud)
        );
    }
    Ok(())
}

// --- Graceful Shutdown Handler ---
async fn shutdown_signal() -> std::io::Result<()> {
    let ctrl_c = signal::ctrl_c();

    #[cfg(unix)]
    {
        let mut terminate = signal::unix::signal(signal::unix::SignalKind::terminate())?;
        tokio::select! {
            res = ctrl_c => res?,
            _ = terminate.recv() => {},
        }
    }

    #[cfg(not(unix))]
    ctrl_c.await?;

    eprintln!("\nSignal received, shutting down...");
    Ok(())
}
