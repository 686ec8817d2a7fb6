//! Common types, traits, and error definitions for footstep_planning
//!
//! This module provides the foundational building blocks shared by the
//! footstep search and the swing trajectory expander.

pub mod types;
pub mod traits;
pub mod error;

pub use types::*;
pub use traits::*;
pub use error::*;
