//! Command-line entry point: wires the simulated hardware into a full rig
//! and runs one survey end to end.
//!
//! On a bench without the physical rig attached this exercises the entire
//! stack — alignment, zero reference, sequencing, capture — against the
//! in-memory GPIO bus and camera host, writing synthetic frames to disk.

use std::sync::Arc;
use std::time::Duration;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use toolscan::config::Settings;
use toolscan::controller::SessionController;
use toolscan::hardware::gpio::{GpioBus, PinAddressing};
use toolscan::hardware::mock::{MockCameraHost, SimulatedGpio};
use toolscan::motion::{RotaryStepper, StepSequence, VerticalActuator};
use toolscan::survey::bank::CameraBank;
use toolscan::survey::sequencer::{CaptureSequencer, SweepTuning};
use toolscan::survey::session::CaptureJob;

#[derive(Parser, Debug)]
#[command(author, version, about = "Cutting-tool imaging rig (simulated hardware)")]
struct Args {
    /// Path to a TOML settings file; defaults apply when omitted.
    #[arg(long)]
    config: Option<String>,

    /// Tool identifier stamped on every output file.
    #[arg(long, default_value = "demo")]
    tool: String,

    /// Number of cutting flutes (angular positions per layer).
    #[arg(long, default_value_t = 4)]
    flutes: u32,

    /// Number of height layers to survey.
    #[arg(long, default_value_t = 2)]
    layers: u32,

    /// Output directory, overriding the configured one.
    #[arg(long)]
    output: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(env_filter).init();

    let args = Args::parse();
    let mut settings = Settings::new(args.config.as_deref())?;
    if let Some(output) = args.output {
        settings.storage.base_dir = output.into();
    }

    let gpio: Arc<dyn GpioBus> = Arc::new(SimulatedGpio::new());
    gpio.set_mode(PinAddressing::Bcm)?;

    let stepper = Arc::new(RotaryStepper::new(
        gpio.clone(),
        settings.gpio.rotary_pins,
        StepSequence::full_step(),
        settings.motion.steps_per_revolution,
        Duration::from_millis(settings.motion.rotary_phase_delay_ms),
    )?);
    let actuator = Arc::new(VerticalActuator::new(
        gpio.clone(),
        settings.gpio.vertical_pins,
        StepSequence::full_step(),
        settings.motion.steps_per_revolution,
        settings.motion.gear_ratio,
        Duration::from_millis(settings.motion.vertical_phase_delay_ms),
    )?);

    let host = MockCameraHost::new();
    let bank = Arc::new(
        CameraBank::initialize(&host, &settings.cameras, settings.storage.base_dir.clone()).await,
    );
    info!(cameras = bank.open_count(), "camera bank ready");

    let sequencer = Arc::new(CaptureSequencer::new(
        actuator.clone(),
        stepper,
        bank,
        SweepTuning::from(&settings.sweep),
    ));
    let mut controller = SessionController::new(actuator, sequencer, &settings.motion);

    // Operator flow: jog upward briefly, accept the position as the top
    // reference, then run the automated survey.
    controller.align_up().await?;
    tokio::time::sleep(Duration::from_millis(200)).await;
    controller.align_up().await?;
    controller.set_top()?;

    let job = CaptureJob::new(args.tool, args.flutes, args.layers);
    let report = controller.start_job(job)?.join().await?;

    info!(
        session = %report.session_id,
        files = report.files.len(),
        elapsed_s = report.elapsed.as_secs_f64(),
        "survey finished"
    );
    for file in &report.files {
        println!("{}", file.display());
    }
    gpio.release_all()?;
    Ok(())
}
