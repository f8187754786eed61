//! Piecewise-constant range process math utilities.

pub mod math;

pub use math::renewal::{IntervalRates, RenewalSolution};
pub use math::stable::*;
