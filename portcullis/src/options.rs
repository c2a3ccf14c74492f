//! Configuration of a token access controller
//!
//! A controller needs four settings:
//!
//! | key              | meaning                                               |
//! |------------------|-------------------------------------------------------|
//! | `realm`          | where clients are told to obtain a token              |
//! | `issuer`         | the only issuer whose tokens are accepted             |
//! | `service`        | this server's name, required as the token audience    |
//! | `rootCertBundle` | path to a PEM bundle of token signing certificates    |
//!
//! They may come from an untyped map, as handed over by a plugin
//! registry, or from any `serde` source through [`Options`].

use std::{collections::HashMap, hash::BuildHasher, path::PathBuf};

use serde::Deserialize;
use serde_json::Value;

use crate::{controller::TokenAccessController, error::ConfigError};

/// Settings for a [`TokenAccessController`]
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Options {
    /// Where clients are told to obtain a token
    pub realm: String,
    /// The only issuer whose tokens are accepted
    pub issuer: String,
    /// This server's name, required as the token audience
    pub service: String,
    /// Path to a PEM bundle of token signing certificates
    pub root_cert_bundle: PathBuf,
}

impl Options {
    /// Reads the options from an untyped map
    ///
    /// The keys are checked in the order `realm`, `issuer`, `service`,
    /// `rootCertBundle`.
    ///
    /// # Errors
    ///
    /// Names the first key that is missing or whose value is not a string.
    pub fn from_map<S: BuildHasher>(map: &HashMap<String, Value, S>) -> Result<Self, ConfigError> {
        let get = |key: &'static str| {
            map.get(key)
                .and_then(Value::as_str)
                .map(str::to_owned)
                .ok_or(ConfigError::MissingOption(key))
        };

        Ok(Self {
            realm: get("realm")?,
            issuer: get("issuer")?,
            service: get("service")?,
            root_cert_bundle: get("rootCertBundle")?.into(),
        })
    }
}

/// Builds a token access controller from an untyped options map
///
/// This is the entry point for plugin registries that hand over
/// configuration as a generic map.
///
/// # Errors
///
/// Returns an error if an option is missing or if the root certificate
/// bundle cannot be loaded.
pub fn new_access_controller<S: BuildHasher>(
    map: &HashMap<String, Value, S>,
) -> Result<TokenAccessController, ConfigError> {
    let options = Options::from_map(map)?;
    TokenAccessController::from_options(&options)
}
