// Monopitch - real-time monophonic feature extraction
//
// One synchronous call per sample block turns raw audio into a PitchFrame:
// fundamental frequency, loudness, articulation state, and timbre
// descriptors, each finite and bounded. Audio capture, synthesis, and
// visualization live outside this crate; the core consumes a sample block,
// a sample rate, and a monotonic timestamp, and returns a frame.

// Module declarations
pub mod analysis;
pub mod config;
pub mod error;
pub mod frame;

// Re-exports for convenience
pub use analysis::{FeaturePipeline, StageTimings};
pub use config::PipelineConfig;
pub use error::ConfigError;
pub use frame::{Articulation, PitchFrame};

/// Initialize env_logger for binaries and examples
///
/// Library consumers with their own `log` backend should skip this.
pub fn init_logging() {
    let _ = env_logger::Builder::from_default_env()
        .format_timestamp_millis()
        .try_init();
}
