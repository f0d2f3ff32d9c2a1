//! Core types for missa.

mod celebration;
mod intention;

pub use celebration::*;
pub use intention::*;
