// crates/types/src/lib.rs
//! Wire types shared by every syncwatch crate.

pub mod error;
pub mod snapshot;

pub use error::*;
pub use snapshot::*;
