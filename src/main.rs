use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use rand::SeedableRng;
use rand::rngs::StdRng;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

use rust_slideshow::config::Configuration;
use rust_slideshow::engine::{EngineSettings, PlaybackEngine};
use rust_slideshow::events::ConsumerId;
use rust_slideshow::pool::ItemPool;
use rust_slideshow::presenter::TracingPresenter;
use rust_slideshow::session::SessionDescriptor;
use rust_slideshow::source::{ContentSource, PoolSink};
use rust_slideshow::tasks::manager;

#[derive(Debug, Parser)]
#[command(name = "slideshow", version, about = "randomized photo and video slideshow")]
struct Args {
    /// Saved session descriptor (JSON)
    #[arg(value_name = "SESSION")]
    session: PathBuf,
    /// Optional YAML engine configuration
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Deterministic RNG seed for draws and duration jitter
    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,
    /// Number of display slots of the logging presenter
    #[arg(long, value_name = "N", default_value_t = 1)]
    slots: usize,
    /// Enumerate once and print the first N draws without playing
    #[arg(long = "dry-run", value_name = "ITERATIONS")]
    dry_run: Option<usize>,
    /// Increase log verbosity (repeatable)
    #[arg(short = 'v', long = "verbose", action = clap::ArgAction::Count)]
    verbose: u8,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let default_level = match args.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .compact()
        .init();

    let mut cfg = match &args.config {
        Some(path) => Configuration::from_yaml_file(path)
            .with_context(|| format!("failed to load configuration from {}", path.display()))?,
        None => Configuration::default(),
    }
    .validated()
    .context("invalid configuration values")?;
    if args.seed.is_some() {
        cfg.seed = args.seed;
    }

    let session = SessionDescriptor::load(&args.session)
        .with_context(|| format!("failed to load session {}", args.session.display()))?;
    let source = ContentSource::from_session(&session, &cfg).context("session has no source")?;
    tracing::info!(
        session = session.name.as_deref().unwrap_or_default(),
        source = %source,
        "session loaded"
    );

    if let Some(iterations) = args.dry_run {
        return run_dry_run(source, iterations, cfg.seed).await;
    }

    let cancel = CancellationToken::new();
    {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if let Err(err) = tokio::signal::ctrl_c().await {
                tracing::warn!("ctrl-c handler failed: {err}");
                return;
            }
            tracing::info!("ctrl-c received; initiating shutdown");
            cancel.cancel();
        });
    }

    let settings = EngineSettings::from_session(&session, &cfg);
    tracing::info!(
        slide_seconds = settings.durations.slide_seconds,
        video_buffer = %humantime::format_duration(settings.video_buffer),
        history = settings.history_capacity,
        "starting playback"
    );
    let (mut engine, source_rx) = PlaybackEngine::new(source, settings);
    engine.attach(ConsumerId(0), Box::new(TracingPresenter::new(args.slots.max(1))));
    let (handle, task) = manager::spawn(engine, source_rx, cancel);

    match task.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => tracing::error!("engine error: {e:?}"),
        Err(e) => tracing::error!("join error: {e}"),
    }
    drop(handle);
    Ok(())
}

/// Enumerate once and print the draw order.
async fn run_dry_run(source: ContentSource, iterations: usize, seed: Option<u64>) -> Result<()> {
    let pool = Arc::new(ItemPool::new());
    let cycle = pool.begin_cycle();
    // Nobody listens to progress here.
    let (events, events_rx) = mpsc::channel(1);
    drop(events_rx);

    let total = {
        let pool = Arc::clone(&pool);
        tokio::task::spawn_blocking(move || {
            let mut sink = PoolSink::new(pool, cycle, events);
            source.enumerate(&mut sink);
            sink.finish()
        })
        .await
        .context("enumeration worker failed")?
    };

    println!(
        "# dry run\n# items: {}\n# iterations: {}\n# seed: {}\n",
        total,
        iterations,
        seed.map_or_else(|| "(random)".to_string(), |s| s.to_string())
    );
    if total == 0 {
        println!("(no media found)");
        return Ok(());
    }

    let mut rng = match seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    for step in 0..iterations {
        let Some((item, index)) = pool.draw(&mut rng) else {
            println!("# cycle exhausted after {step} draws");
            break;
        };
        println!("{:>4} [{index}/{total}] {} {}", step + 1, item.kind, item.locator);
    }
    Ok(())
}
