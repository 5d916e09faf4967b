//! Pacer entrypoint: hosts the workout runtime against a wall clock.
//!
//! Two producer threads feed one channel: a tick source at the configured
//! cadence and a stdin reader translating command lines (`next`, `pause`,
//! `resume`, `cancel`, `complete:<name>`, `quit`). The main loop drains the
//! channel into the engine and streams new output records and runtime
//! events as JSON lines.

use std::fs::File;
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::rc::Rc;
use std::thread;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use crossbeam_channel::{Receiver, Sender, bounded};
use tracing::{error, info, warn};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

use core_compiler::JitCompiler;
use core_runtime::{Clock, Runtime, RuntimeEvent, RuntimeSettings, WallClock};
use core_script::Script;

/// Events produced by the host threads; the engine's own taxonomy is
/// derived from these on the main thread.
#[derive(Debug)]
enum HostEvent {
    Tick,
    Command(String),
}

/// Producer backpressure: with one tick source and one stdin reader a
/// bounded channel keeps memory flat; blocking sends preserve command
/// ordering over lossy dropping.
const EVENT_CHANNEL_CAP: usize = 1024;

/// CLI arguments.
#[derive(Parser, Debug)]
#[command(name = "pacer", version, about = "Workout script runtime")]
struct Args {
    /// Workout script (JSON statement tree).
    pub script: PathBuf,
    /// Configuration file path (overrides discovery of `pacer.toml`).
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
    /// Write the output log here instead of stdout.
    #[arg(long = "output")]
    pub output: Option<PathBuf>,
    /// Tick cadence override in milliseconds.
    #[arg(long = "tick-ms")]
    pub tick_ms: Option<u64>,
}

fn configure_logging(config: &core_config::Config) -> Result<Option<WorkerGuard>> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(
            config
                .file
                .logging
                .filter
                .as_deref()
                .unwrap_or("info"),
        )
    });
    if let Some(dir) = &config.file.logging.directory {
        let appender = tracing_appender::rolling::daily(dir, "pacer.log");
        let (writer, guard) = tracing_appender::non_blocking(appender);
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(writer)
            .with_ansi(false)
            .init();
        Ok(Some(guard))
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_writer(io::stderr)
            .init();
        Ok(None)
    }
}

fn install_panic_hook() {
    let default_hook = std::panic::take_hook();
    std::panic::set_hook(Box::new(move |info| {
        error!(target: "runtime", panic = %info, "panic");
        default_hook(info);
    }));
}

fn spawn_tick_source(tx: Sender<HostEvent>, interval: Duration) {
    thread::Builder::new()
        .name("tick-source".to_string())
        .spawn(move || {
            loop {
                thread::sleep(interval);
                if tx.send(HostEvent::Tick).is_err() {
                    break;
                }
            }
        })
        .expect("spawn tick source");
}

fn spawn_stdin_reader(tx: Sender<HostEvent>) {
    thread::Builder::new()
        .name("stdin-reader".to_string())
        .spawn(move || {
            let stdin = io::stdin();
            for line in stdin.lock().lines() {
                let Ok(line) = line else { break };
                if tx.send(HostEvent::Command(line)).is_err() {
                    break;
                }
            }
        })
        .expect("spawn stdin reader");
}

/// Translate one command line into an engine event. Unknown commands are
/// logged and dropped; `quit` ends the host loop.
fn parse_command(line: &str) -> Option<RuntimeEvent> {
    match line.trim() {
        "" => None,
        "next" | "n" => Some(RuntimeEvent::Next),
        "pause" => Some(RuntimeEvent::TimerPause),
        "resume" => Some(RuntimeEvent::TimerResume),
        "cancel" => Some(RuntimeEvent::Cancel),
        custom if custom.starts_with("complete:") => Some(RuntimeEvent::Completion {
            name: custom.to_string(),
        }),
        other => {
            warn!(target: "runtime.host", command = other, "unknown_command");
            None
        }
    }
}

/// Stream everything the sink appended since the last call.
fn stream_outputs(
    runtime: &Runtime,
    record_cursor: &mut usize,
    event_cursor: &mut usize,
    out: &mut dyn Write,
) -> Result<()> {
    let sink = runtime.sink();
    for record in &sink.records()[*record_cursor..] {
        serde_json::to_writer(&mut *out, &serde_json::json!({"kind": "record", "data": record}))?;
        out.write_all(b"\n")?;
    }
    *record_cursor = sink.records().len();
    for event in &sink.events()[*event_cursor..] {
        serde_json::to_writer(&mut *out, &serde_json::json!({"kind": "event", "data": event}))?;
        out.write_all(b"\n")?;
    }
    *event_cursor = sink.events().len();
    out.flush()?;
    Ok(())
}

fn run(args: Args) -> Result<()> {
    let config = core_config::load_from(args.config.clone())?;
    let _log_guard = configure_logging(&config)?;
    install_panic_hook();
    info!(target: "runtime", script = %args.script.display(), "startup");

    let text = std::fs::read_to_string(&args.script)
        .with_context(|| format!("reading script {}", args.script.display()))?;
    let script = Script::from_json(&text).context("parsing workout script")?;

    let mut out: Box<dyn Write> = match &args.output {
        Some(path) => Box::new(File::create(path).context("creating output file")?),
        None => Box::new(io::stdout().lock()),
    };

    let clock = Rc::new(WallClock);
    let settings = RuntimeSettings {
        max_depth: config.effective_max_depth(),
    };
    let mut runtime = Runtime::new(
        script,
        Box::new(JitCompiler::with_default_strategies()),
        clock,
        settings,
    );

    let (tx, rx): (Sender<HostEvent>, Receiver<HostEvent>) = bounded(EVENT_CHANNEL_CAP);
    let tick_interval = Duration::from_millis(args.tick_ms.unwrap_or(config.tick_interval_ms()));
    spawn_tick_source(tx.clone(), tick_interval);
    spawn_stdin_reader(tx.clone());
    drop(tx);

    let mut record_cursor = 0;
    let mut event_cursor = 0;
    runtime.start()?;
    stream_outputs(&runtime, &mut record_cursor, &mut event_cursor, out.as_mut())?;

    while !runtime.is_finished() {
        let Ok(host_event) = rx.recv() else { break };
        match host_event {
            HostEvent::Tick => {
                let timestamp = WallClock.now();
                runtime.handle(RuntimeEvent::Tick { timestamp });
            }
            HostEvent::Command(line) => {
                if line.trim() == "quit" || line.trim() == "q" {
                    info!(target: "runtime.host", "quit");
                    break;
                }
                if let Some(event) = parse_command(&line) {
                    runtime.handle(event);
                }
            }
        }
        stream_outputs(&runtime, &mut record_cursor, &mut event_cursor, out.as_mut())?;
    }

    let history_count = runtime.sink().history().count();
    info!(
        target: "runtime",
        records = runtime.sink().records().len(),
        history = history_count,
        finished = runtime.is_finished(),
        "shutdown"
    );
    Ok(())
}

fn main() -> Result<()> {
    run(Args::parse())
}
