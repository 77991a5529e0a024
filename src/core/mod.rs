// FILE: src/core/mod.rs

pub mod constants;
pub mod properties;
pub mod types;

pub use constants::*;
pub use properties::*;
pub use types::*;
