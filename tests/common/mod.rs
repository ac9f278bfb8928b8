//! Common test infrastructure
//!
//! Builds zip archives of call analysis files in a temporary directory and
//! opens a fresh SQLite document store next to them. Tests should only import
//! from this module, not from internal submodules.

mod constants;
mod fixtures;

#[allow(unused_imports)]
pub use constants::*;
#[allow(unused_imports)]
pub use fixtures::{FlakyStore, TestEnv};
