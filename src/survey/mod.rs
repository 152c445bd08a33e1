//! Survey layer: camera bank, session bookkeeping, and the capture
//! sequencer that drives the full flute-survey trajectory.

pub mod bank;
pub mod sequencer;
pub mod session;

pub use bank::{CameraBank, CameraSelector};
pub use sequencer::{CaptureSequencer, SequencerPhase, SweepTuning};
pub use session::{CaptureJob, SurveyReport, SurveySession};
