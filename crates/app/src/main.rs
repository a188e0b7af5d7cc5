use std::{
    f32::consts::TAU,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread,
    time::{Duration, Instant},
};

use audio_sphere_core::{
    loader::handlers::default_handlers, AppConfig, AudioInput, Experience, FrameRecorder,
    ResourcesEvent,
};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

const FRAME_INTERVAL: Duration = Duration::from_millis(16);
const TONE_BLOCK: usize = 512;

fn main() -> audio_sphere_core::Result<()> {
    init_tracing();

    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            frames,
            tone_hz,
        } => run(config.as_deref(), frames, tone_hz),
        Commands::Groups { config } => list_groups(&config),
    }
}

fn load_config(path: Option<&Path>) -> audio_sphere_core::Result<AppConfig> {
    match path {
        Some(path) => AppConfig::from_path(path),
        None => Ok(AppConfig::live_defaults()),
    }
}

fn run(config: Option<&Path>, frames: u64, tone_hz: Option<f32>) -> audio_sphere_core::Result<()> {
    let config = load_config(config)?;
    let base_dir = config
        .loader
        .base_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));
    tracing::info!(?base_dir, frames, ?tone_hz, "starting headless run");

    let audio = config.audio.clone();
    let mut experience = Experience::new(
        config,
        default_handlers(base_dir),
        FrameRecorder::with_capacity(1),
    );
    log_progress(&experience);

    let tone = match tone_hz {
        Some(frequency) => {
            let input = AudioInput::new(&audio)?;
            experience.attach_microphone(input.clone())?;
            Some(spawn_tone(input, frequency))
        }
        None => None,
    };

    experience.start();
    for _ in 0..frames {
        thread::sleep(FRAME_INTERVAL);
        experience.update(Instant::now())?;
    }

    if let Some((running, handle)) = tone {
        running.store(false, Ordering::Relaxed);
        if handle.join().is_err() {
            tracing::warn!("tone generator panicked");
        }
    }

    let resources = experience.resources();
    tracing::info!(
        frames = experience.frame_count(),
        loaded_groups = ?resources.loaded_groups(),
        items = resources.item_count(),
        phase = ?resources.phase(),
        "run finished"
    );
    if let Some(frame) = experience.surface().last_frame() {
        tracing::info!(
            time = frame.time,
            displacement = frame.displacement_strength,
            distortion = frame.distortion_strength,
            fresnel = frame.fresnel_multiplier,
            "last frame"
        );
    }

    Ok(())
}

fn log_progress(experience: &Experience<FrameRecorder>) {
    let events = experience.resources().events();
    events.on("progress.cli", |event: &ResourcesEvent| {
        if let ResourcesEvent::Progress {
            group,
            resource,
            data,
        } = event
        {
            let (loaded, to_load) = group
                .as_ref()
                .map_or((0, 0), |group| (group.loaded, group.to_load));
            tracing::info!(
                resource = %resource.name,
                kind = data.kind(),
                loaded,
                to_load,
                "resource loaded"
            );
        }
    });
    events.on("groupEnd.cli", |event: &ResourcesEvent| {
        if let ResourcesEvent::GroupEnd { group: Some(group) } = event {
            tracing::info!(group = %group.name, "group loaded");
        }
    });
    events.on("end.cli", |_: &ResourcesEvent| {
        tracing::info!("all groups loaded");
    });
}

/// Feeds a sine tone into `input` in real time until the flag is cleared.
fn spawn_tone(input: AudioInput, frequency: f32) -> (Arc<AtomicBool>, thread::JoinHandle<()>) {
    let running = Arc::new(AtomicBool::new(true));
    let flag = Arc::clone(&running);
    let sample_rate = input.sample_rate() as f32;
    let block_time = Duration::from_secs_f32(TONE_BLOCK as f32 / sample_rate);

    let handle = thread::spawn(move || {
        let mut phase = 0.0_f32;
        let step = TAU * frequency / sample_rate;
        let mut block = vec![0.0; TONE_BLOCK];

        while flag.load(Ordering::Relaxed) {
            for sample in block.iter_mut() {
                *sample = phase.sin() * 0.5;
                phase = (phase + step) % TAU;
            }
            if let Err(error) = input.push_samples(&block) {
                tracing::warn!(%error, "stopping tone generator");
                return;
            }
            thread::sleep(block_time);
        }
    });

    (running, handle)
}

fn list_groups(path: &Path) -> audio_sphere_core::Result<()> {
    let config = AppConfig::from_path(path)?;
    let base_dir = config
        .loader
        .base_dir
        .clone()
        .unwrap_or_else(|| PathBuf::from("."));
    let handlers = default_handlers(base_dir);

    for (index, group) in config.assets.iter().enumerate() {
        println!("{index}: {} ({} items)", group.name, group.items.len());
        for resource in &group.items {
            let routed = resource
                .extension()
                .is_some_and(|extension| handlers.iter().any(|h| h.handles(extension)));
            let status = if routed { "ok" } else { "no loader" };
            println!("    {} <- {} [{}] {status}", resource.name, resource.source, resource.kind);
        }
    }

    Ok(())
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .try_init();
}

#[derive(Parser, Debug)]
#[command(author, version, about = "Audio-reactive sphere visualiser", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Load the configured asset groups and drive the frame loop headlessly.
    Run {
        /// JSON configuration file; built-in defaults when omitted.
        #[arg(short, long)]
        config: Option<PathBuf>,
        /// Number of frames to run.
        #[arg(short, long, default_value_t = 120)]
        frames: u64,
        /// Feed a synthetic sine tone of this frequency into the microphone.
        #[arg(long)]
        tone_hz: Option<f32>,
    },
    /// Print the asset groups of a configuration and how each resource routes.
    Groups {
        #[arg(short, long)]
        config: PathBuf,
    },
}
