//! Core math modules.

pub mod renewal;
pub mod stable;
