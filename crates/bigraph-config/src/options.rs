// SPDX-License-Identifier: Apache-2.0
// © James Ross Ω FLYING•ROBOTS <https://github.com/flyingrobots>
//! Persistence of [`ModelCheckingOptions`].

use bigraph_core::ModelCheckingOptions;

use crate::config::{ConfigError, ConfigService, ConfigStore};

/// Key the options are stored under.
pub const OPTIONS_KEY: &str = "model-checking";

/// Loads and saves model-checking options through a [`ConfigService`].
#[derive(Debug, Clone)]
pub struct OptionsRepository<S> {
    service: ConfigService<S>,
}

impl<S: ConfigStore> OptionsRepository<S> {
    /// Repository over `store`.
    pub fn new(store: S) -> Self {
        Self {
            service: ConfigService::new(store),
        }
    }

    /// Stored options, or the defaults when nothing is stored.
    pub fn load(&self) -> Result<ModelCheckingOptions, ConfigError> {
        Ok(self.service.load(OPTIONS_KEY)?.unwrap_or_default())
    }

    /// Persists `options`.
    pub fn save(&self, options: &ModelCheckingOptions) -> Result<(), ConfigError> {
        self.service.save(OPTIONS_KEY, options)
    }

    /// Underlying service.
    pub fn service(&self) -> &ConfigService<S> {
        &self.service
    }
}
