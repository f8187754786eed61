//! Piecewise-constant range process configuration loading and resolution.
//!
//! This crate provides:
//! - Typed serde structs for the process description and observed ranges
//! - The parameter resolver (homogeneous vs per-interval rates, timeline order,
//!   observation data regime)
//! - Configuration errors with stable codes

pub mod model;
pub mod resolve;
pub mod validate;

pub use model::{Condition, ObservationInputs, ProcessConfig, Range, RateParameters, RateSpec};
pub use resolve::{
    resolve_rate, DataRegime, ParameterKind, RateKind, ResolvedModel, ResolvedRates, Timeline,
};
pub use validate::{ConfigError, ConfigResult};
