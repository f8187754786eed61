//! Incremental log-likelihood engine for piecewise-constant range processes.
//!
//! A set of ranges (origination to termination, with observed first and last
//! occurrences) is scored under a fossilized birth-death range process whose
//! origination, termination and sampling rates are constant within time
//! intervals. The engine caches the per-interval renewal solution and the
//! pairwise range overlaps, and re-evaluates after a proposal by refreshing
//! only what the proposal invalidated.
//!
//! ```ignore
//! use pcr_config::{ProcessConfig, Range};
//! use pcr_core::RangeProcessEngine;
//!
//! let config = ProcessConfig::from_file(path)?;
//! let mut engine = RangeProcessEngine::new(config, ranges)?;
//! let current = engine.evaluate();
//! engine.set_range(3, 4.2, 0.0)?;
//! if accept(engine.evaluate(), current) {
//!     engine.keep();
//! } else {
//!     engine.restore();
//! }
//! ```

pub mod engine;
pub mod error;
pub mod intervals;
pub mod likelihood;
pub mod logging;
pub mod observations;
pub mod overlap;

pub use engine::RangeProcessEngine;
pub use error::{EngineError, EngineResult};
pub use intervals::IntervalCache;
pub use likelihood::{LikelihoodBreakdown, LikelihoodInputs};
pub use observations::{ObservationModel, PresenceData, PresenceSpan};
pub use overlap::{starts_within, OverlapCache};

pub use pcr_config::{Condition, ParameterKind, ProcessConfig, Range, RateKind, RateSpec};
