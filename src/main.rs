use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use clap::{Parser, Subcommand, ValueEnum};
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

mod config;
mod demux;
mod device;
mod io;
mod panic_handler;
mod platform;
mod ring;
mod session;
mod supervisor;
mod test_sequence;
mod transcode;
mod wav;
mod workers;

use config::Config;
use session::TransferResult;
use supervisor::Supervisor;

#[derive(Parser)]
#[command(name = "rfcapture")]
#[command(author, version, about = "Real-time RF capture for LaserDisc duplication hardware", long_about = None)]
struct Cli {
    /// Enable verbose (debug) logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Default, ValueEnum)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Subcommand)]
enum Commands {
    /// Start a capture session and run until interrupted or the
    /// optional duration elapses
    Start {
        /// Path the RF stream is written to. The two audio WAV files are
        /// written alongside it, named after its stem.
        #[arg(short, long)]
        output: PathBuf,

        /// Stop automatically after this many seconds
        #[arg(long)]
        duration: Option<u64>,

        /// Output format for the final result summary
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },

    /// Inspect or initialize the persisted configuration
    Config {
        /// Print the effective configuration and exit
        #[arg(long)]
        show: bool,

        /// Write the default configuration to disk if it doesn't exist yet
        #[arg(long)]
        init: bool,

        /// Output format for --show
        #[arg(long, value_enum, default_value_t = OutputFormat::Text)]
        format: OutputFormat,
    },
}

struct LogGuard {
    _guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

fn init_logging(verbose: bool, config_level: Option<&str>) -> LogGuard {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        let level = if verbose { "debug" } else { config_level.unwrap_or("info") };
        EnvFilter::new(format!("rfcapture={level}"))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(true))
        .init();

    LogGuard { _guard: None }
}

static STOP_REQUESTED: AtomicBool = AtomicBool::new(false);

#[cfg(unix)]
extern "C" fn handle_interrupt(_signal: libc::c_int) {
    STOP_REQUESTED.store(true, Ordering::SeqCst);
}

#[cfg(unix)]
fn install_signal_handlers() {
    unsafe {
        libc::signal(libc::SIGINT, handle_interrupt as libc::sighandler_t);
        libc::signal(libc::SIGTERM, handle_interrupt as libc::sighandler_t);
    }
}

#[cfg(target_os = "windows")]
unsafe extern "system" fn handle_console_event(_ctrl_type: u32) -> i32 {
    STOP_REQUESTED.store(true, Ordering::SeqCst);
    1
}

#[cfg(target_os = "windows")]
fn install_signal_handlers() {
    use windows_sys::Win32::System::Console::SetConsoleCtrlHandler;
    unsafe {
        SetConsoleCtrlHandler(Some(handle_console_event), 1);
    }
}

fn main() -> anyhow::Result<()> {
    panic_handler::install();

    let cli = Cli::parse();
    let config_log_level = Config::load().ok().map(|c| c.log_level);
    let _log_guard = init_logging(cli.verbose, config_log_level.as_deref());

    match cli.command {
        Commands::Config { show, init, format } => run_config(show, init, format),
        Commands::Start { output, duration, format } => run_start(output, duration, format),
    }
}

fn run_config(show: bool, init: bool, format: OutputFormat) -> anyhow::Result<()> {
    if init {
        let config = Config::default();
        config.save()?;
        println!("wrote default config to {}", Config::config_path()?.display());
        return Ok(());
    }

    let config = Config::load()?;
    if show {
        match format {
            OutputFormat::Text => println!("{}", toml::to_string_pretty(&config)?),
            OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&config)?),
        }
    }
    Ok(())
}

fn run_start(output: PathBuf, duration: Option<u64>, format: OutputFormat) -> anyhow::Result<()> {
    let config = Config::load()?;
    config.validate()?;

    let session_config = config.to_session_config(output);
    info!(?session_config, "starting capture session");

    let supervisor = Supervisor::start(session_config)?;

    install_signal_handlers();
    let deadline = duration.map(|secs| Instant::now() + Duration::from_secs(secs));

    loop {
        if STOP_REQUESTED.load(Ordering::SeqCst) {
            info!("interrupt received, stopping capture");
            break;
        }
        if supervisor.result() != TransferResult::Running {
            info!("capture ended on its own");
            break;
        }
        if let Some(deadline) = deadline {
            if Instant::now() >= deadline {
                info!("configured duration elapsed, stopping capture");
                break;
            }
        }
        std::thread::sleep(Duration::from_millis(100));
    }

    let telemetry = summarize_telemetry(supervisor.telemetry());
    let result = supervisor.stop();

    match format {
        OutputFormat::Text => {
            println!("capture finished: {result:?}");
            println!(
                "buffers written: {}, bytes written: {}, audio frames: {}",
                telemetry.buffers_written, telemetry.bytes_written, telemetry.audio_frame_count
            );
        }
        OutputFormat::Json => {
            let summary = serde_json::json!({
                "result": format!("{result:?}"),
                "buffers_written": telemetry.buffers_written,
                "bytes_written": telemetry.bytes_written,
                "audio_frame_count": telemetry.audio_frame_count,
                "clipped_min_count": telemetry.clipped_min_count,
                "clipped_max_count": telemetry.clipped_max_count,
            });
            println!("{}", serde_json::to_string_pretty(&summary)?);
        }
    }

    if result != TransferResult::Success {
        std::process::exit(1);
    }
    Ok(())
}

struct TelemetrySummary {
    buffers_written: u64,
    bytes_written: u64,
    audio_frame_count: u64,
    clipped_min_count: u64,
    clipped_max_count: u64,
}

fn summarize_telemetry(telemetry: &session::Telemetry) -> TelemetrySummary {
    TelemetrySummary {
        buffers_written: telemetry.buffers_written.load(Ordering::Relaxed),
        bytes_written: telemetry.bytes_written.load(Ordering::Relaxed),
        audio_frame_count: telemetry.audio_frame_count.load(Ordering::Relaxed),
        clipped_min_count: telemetry.clipped_min_count.load(Ordering::Relaxed),
        clipped_max_count: telemetry.clipped_max_count.load(Ordering::Relaxed),
    }
}
