use anyhow::Result;
use clap::Parser;
use moodlens::{
    spawn_handler, AggregationEngine, CameraFrame, CapturedImage, DetectionPipeline, EventBus,
    EventBusError, EventHandler, FrameFormat, FrameGate, GateDecision, MoodEvent, MoodlensConfig,
    PipelineState, ScriptedPresence, SystemClock,
};
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Frames offered to the gate per capture before giving up on a face
const MAX_FRAMES_PER_CAPTURE: u64 = 8;

#[derive(Parser, Debug)]
#[command(name = "moodlens")]
#[command(about = "Emotion journal detection core running on synthetic camera frames")]
#[command(version)]
#[command(long_about = "Runs the frame gate, detection pipeline and aggregation engine \
against synthetic camera frames and a deterministic classifier, saves the resulting \
journal entries and prints the per-day summaries as JSON.")]
struct Args {
    /// Path to configuration file
    #[arg(short, long, default_value = "moodlens.toml", help = "Path to TOML configuration file")]
    config: String,

    /// Enable debug logging (most verbose)
    #[arg(short, long, help = "Enable debug level logging")]
    debug: bool,

    /// Enable verbose logging (info level)
    #[arg(short, long, help = "Enable verbose info level logging")]
    verbose: bool,

    /// Enable quiet mode (errors only)
    #[arg(short, long, help = "Enable quiet mode - only log errors")]
    quiet: bool,

    /// Validate configuration and exit
    #[arg(long, help = "Validate configuration file and exit")]
    validate_config: bool,

    /// Print default configuration and exit
    #[arg(long, help = "Print default configuration in TOML format and exit")]
    print_config: bool,

    /// Override log format (json, pretty, compact)
    #[arg(long, value_name = "FORMAT", help = "Log output format: json, pretty, or compact")]
    log_format: Option<String>,

    /// Number of entries to capture and save
    #[arg(long, default_value_t = 3)]
    captures: u32,

    /// Context tag attached to every saved entry
    #[arg(long = "tag", value_name = "TAG")]
    tags: Vec<String>,

    /// Mood note attached to every saved entry
    #[arg(long, default_value = "")]
    note: String,
}

/// Logs every event on the bus
struct EventLogger {
    seen: u64,
}

#[async_trait::async_trait]
impl EventHandler for EventLogger {
    async fn handle_event(&mut self, event: MoodEvent) -> Result<(), EventBusError> {
        self.seen += 1;
        info!("[event {}] {}", self.seen, event.description());
        Ok(())
    }

    fn handler_name(&self) -> &str {
        "event_logger"
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if args.print_config {
        print_default_config()?;
        return Ok(());
    }

    init_logging(&args)?;

    info!("Starting moodlens v{}", env!("CARGO_PKG_VERSION"));
    info!("Configuration file: {}", args.config);

    let config = match MoodlensConfig::load_from_file(&args.config) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {}", e);
            return Err(e.into());
        }
    };

    match config.validate() {
        Ok(()) if args.validate_config => {
            println!("✓ Configuration is valid");
            return Ok(());
        }
        Ok(()) => {}
        Err(e) => {
            error!("Configuration validation failed: {}", e);
            eprintln!("✗ Configuration validation failed: {}", e);
            std::process::exit(1);
        }
    }

    run(&config, &args).await
}

async fn run(config: &MoodlensConfig, args: &Args) -> Result<()> {
    let event_bus = EventBus::new(config.system.event_bus_capacity);
    let _logger = spawn_handler(&event_bus, EventLogger { seen: 0 });

    let engine = Arc::new(AggregationEngine::new().with_event_bus(event_bus.clone()));

    // No model asset ships with the demo, so the pipeline runs degraded.
    // The first frame shows no face to exercise the gate.
    let pipeline = DetectionPipeline::builder()
        .config(config.pipeline.clone())
        .face_presence(ScriptedPresence::new(vec![Ok(false)], true))
        .engine(Arc::clone(&engine))
        .clock(Arc::new(SystemClock::from_timezone_name(
            &config.journal.timezone,
        )))
        .event_bus(event_bus.clone())
        .build()?;

    let gate = FrameGate::new(&config.gate, pipeline.clone()).with_event_bus(event_bus.clone());

    let started = Instant::now();
    let mut frame_id = 0u64;
    let mut saved = 0u32;

    for capture in 1..=args.captures {
        let mut framed = None;
        for _ in 0..MAX_FRAMES_PER_CAPTURE {
            frame_id += 1;
            // Pretend the camera delivered one frame per analysis interval
            let frame = synthetic_frame(frame_id, started + gate.analysis_interval() * frame_id as u32);
            let decision = gate.process_frame(frame.clone()).await;
            debug!("Frame {} -> {:?}", frame_id, decision);

            if matches!(decision, GateDecision::Analyzed(_)) && gate.is_capture_enabled() {
                framed = Some(frame);
                break;
            }
        }

        let frame = match framed {
            Some(frame) => frame,
            None => {
                warn!("No face framed for capture {}, skipping", capture);
                continue;
            }
        };

        let image = CapturedImage::from_frame(&frame)
            .with_storage_ref(format!("captures/{:04}.rgba", frame.id));
        pipeline.request_classification(image)?.wait().await;

        match pipeline.state() {
            PipelineState::Success(result) => {
                info!("Capture {} classified as {}", capture, result.dominant_emotion);
                match pipeline.confirm_save(&args.tags, args.note.as_str(), &config.journal.user_id) {
                    Ok(entry) => {
                        saved += 1;
                        info!("Saved entry {}", entry.id());
                    }
                    Err(e) => warn!("Capture {} not saved: {}", capture, e),
                }
            }
            other => warn!("Capture {} ended in {}", capture, other),
        }

        // Skip the confirmation display between captures
        pipeline.reset();
    }

    info!(
        "Saved {} of {} captures, pipeline stats: {:?}, gate stats: {:?}",
        saved,
        args.captures,
        pipeline.stats(),
        gate.stats()
    );

    gate.stop().await;
    pipeline.prepare_for_destroy().await;

    let summaries: Vec<_> = engine.summaries().into_values().collect();
    println!("{}", serde_json::to_string_pretty(&summaries)?);

    Ok(())
}

/// Build an RGBA frame whose pixels vary with `id`, so the fallback
/// classifier sees a different image each time
fn synthetic_frame(id: u64, captured_at: Instant) -> CameraFrame {
    const WIDTH: u32 = 8;
    const HEIGHT: u32 = 8;

    let data = (0..WIDTH * HEIGHT * 4)
        .map(|i| (i as u64).wrapping_mul(31).wrapping_add(id * 97) as u8)
        .collect();
    CameraFrame::new(id, captured_at, data, WIDTH, HEIGHT, FrameFormat::Rgba8)
}

fn init_logging(args: &Args) -> Result<()> {
    use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

    let log_level = if args.debug {
        "debug"
    } else if args.verbose {
        "info"
    } else if args.quiet {
        "error"
    } else {
        "warn"
    };

    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("moodlens={}", log_level)));

    let fmt_layer = match args.log_format.as_deref() {
        Some("json") => fmt::layer()
            .json()
            .with_target(true)
            .with_thread_ids(true)
            .with_file(true)
            .with_line_number(true)
            .boxed(),
        Some("compact") => fmt::layer()
            .compact()
            .with_target(false)
            .with_thread_ids(false)
            .boxed(),
        Some("pretty") | None => fmt::layer()
            .pretty()
            .with_target(true)
            .with_thread_ids(args.debug)
            .with_file(args.debug)
            .with_line_number(args.debug)
            .boxed(),
        Some(format) => {
            eprintln!("Warning: Unknown log format '{}', using default", format);
            fmt::layer().with_target(true).boxed()
        }
    };

    tracing_subscriber::registry()
        .with(fmt_layer)
        .with(env_filter)
        .try_init()?;

    Ok(())
}

/// Print default configuration in TOML format
fn print_default_config() -> Result<()> {
    println!("# Moodlens configuration file");
    println!("# Every key is optional; environment variables override the file,");
    println!("# e.g. MOODLENS_GATE__ANALYSIS_INTERVAL_MS=500");
    println!();
    println!("{}", MoodlensConfig::default().to_toml()?);
    Ok(())
}
