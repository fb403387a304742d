//! Tendrils - audio-reactive particle respawning
//!
//! Headless runner: acquires the track, microphone and camera stand-in,
//! then drives the reactive core at the configured tick rate.

mod cli;
mod headless;

use std::thread;
use std::time::{Duration, Instant};

use clap::Parser;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use cli::Args;
use headless::HeadlessSimulation;
use tendrils_media::{
    acquire_camera, acquire_microphone, acquire_track, AnalyserSettings, Shutdown,
};
use tendrils_reactive::{
    DecisionCascade, FlowLine, Session, SessionConfig, Simulation, SourceId, TickOrchestrator,
};

fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let args = Args::parse();
    let mut config = match args.config {
        Some(ref path) => SessionConfig::load_from(path)?,
        None => SessionConfig::load()?,
    };
    args.apply(&mut config);

    if args.save_config {
        config.save()?;
        info!(path = %SessionConfig::config_path().display(), "config saved");
    }

    let mut session = Session::new(config.track_layout(), config.microphone_layout());
    let cascade = DecisionCascade::for_session(config.policy(), &session)?;
    let mut orchestrator = TickOrchestrator::new(cascade)
        .with_flow_margin(config.flow_margin)
        .with_camera_sweep(config.respawn_interval_ms);

    // Shutdown flag shared with every capture thread
    let shutdown = Shutdown::new();
    start_sources(&mut session, &config, &args, &shutdown);

    let result = run(&mut session, &mut orchestrator, &config, &args);

    shutdown.trigger();
    result
}

fn start_sources(
    session: &mut Session,
    config: &SessionConfig,
    args: &Args,
    shutdown: &Shutdown,
) {
    match config.track_path.clone() {
        Some(path) => {
            let settings =
                AnalyserSettings::new(config.track_fft_size).with_smoothing(config.smoothing);
            session.request(SourceId::Track, acquire_track(path, settings, shutdown.clone()));
        }
        None => warn!("no track configured, the track source stays unready"),
    }

    if args.no_microphone {
        info!("microphone disabled");
    } else {
        let settings =
            AnalyserSettings::new(config.microphone_fft_size).with_smoothing(config.smoothing);
        session.request(
            SourceId::Microphone,
            acquire_microphone(settings, shutdown.clone()),
        );
    }

    if let Some(path) = config.camera_image.clone() {
        session.request_camera(acquire_camera(path));
    }
}

fn run(
    session: &mut Session,
    orchestrator: &mut TickOrchestrator,
    config: &SessionConfig,
    args: &Args,
) -> anyhow::Result<()> {
    let frame_duration = Duration::from_secs_f64(1.0 / config.tick_rate.max(1) as f64);
    let deadline = args.run_for().map(|length| Instant::now() + length);

    let mut simulation = HeadlessSimulation::new(config.flow_decay);
    let mut flow = FlowLine::new();

    info!(
        tick_rate = config.tick_rate,
        fallback_only = config.microphone_is_fallback_only,
        "tendrils running"
    );

    loop {
        let frame_start = Instant::now();
        if deadline.is_some_and(|at| frame_start >= at) {
            break;
        }

        flow.push(simulation.time(), simulation.pointer());
        orchestrator.tick(session, &mut simulation, &mut flow);

        thread::sleep(frame_duration.saturating_sub(frame_start.elapsed()));
    }

    let stats = simulation.stats();
    info!(
        ticks = orchestrator.ticks(),
        camera_respawns = stats.camera,
        flow_respawns = stats.flow,
        track = ?session.track.phase(),
        microphone = ?session.microphone.phase(),
        "session ended"
    );
    Ok(())
}
