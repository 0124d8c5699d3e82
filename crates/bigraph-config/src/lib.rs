// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Configuration for bigraph tools: a storage port, a JSON service on top of
//! it, filesystem and in-memory stores, and a repository for the
//! model-checking options.

pub mod config;
mod fs;
mod memory;
mod options;

pub use config::{ConfigError, ConfigService, ConfigStore};
pub use fs::FsConfigStore;
pub use memory::InMemoryConfigStore;
pub use options::{OptionsRepository, OPTIONS_KEY};
