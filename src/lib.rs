//! Steptally - On-device step counting with a local daily history
//!
//! Steptally turns a stream of 3-axis accelerometer readings into step events
//! and keeps the resulting tallies: sensor readings → detector → running count
//! → (on commit) daily store → (on demand) chart series.
//!
//! ## Modules
//!
//! - **Detection**: threshold, cooldown and rising-edge step rule
//! - **Persistence**: running count file and SQLite daily history
//! - **Session**: ties detection and persistence to user actions (reset, commit)

pub mod chart;
pub mod config;
pub mod detector;
pub mod error;
pub mod prefs;
pub mod sensor;
pub mod session;
pub mod store;
pub mod types;

// FFI bindings for C interop (always available for cdylib/staticlib builds)
pub mod ffi;

pub use chart::{ChartPoint, ChartSeries};
pub use config::{DetectorConfig, TallyConfig};
pub use detector::{detect_step, StepDetector};
pub use error::{StoreError, TallyError};
pub use session::StepSession;
pub use store::DailyStepStore;
pub use types::{AccelerationSample, DetectorState, RecordId, StepEvent, StepRecord};

/// Steptally version
pub const TALLY_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Producer name reported by diagnostics
pub const PRODUCER_NAME: &str = "steptally";
