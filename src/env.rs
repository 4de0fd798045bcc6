// src/env.rs

//! Environment maps for build and run steps.
//!
//! Resolution order for one step:
//! 1. the step's own `envs`,
//! 2. schema-wide `envs` for keys the step did not set,
//! 3. the step's `env_file`, overwriting whatever it defines.

use std::collections::BTreeMap;
use std::path::Path;

use tracing::debug;

use crate::errors::{Result, RewatchError};

/// Set in every spawned step so a nested instance can refuse to start.
pub const LOCK_VAR: &str = "REWATCH_LOCKED";

/// Set in multi-schema children; those are allowed to run under a lock.
pub const SUB_VAR: &str = "REWATCH_SUB";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EnvMap(BTreeMap<String, String>);

impl EnvMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Add entries from `defaults` whose keys are not present yet.
    pub fn insert_missing(&mut self, defaults: &EnvMap) {
        for (key, value) in defaults.0.iter() {
            self.0.entry(key.clone()).or_insert_with(|| value.clone());
        }
    }

    /// Add every entry from `other`, replacing existing values.
    pub fn merge_overwrite(&mut self, other: EnvMap) {
        self.0.extend(other.0);
    }

    /// Merge the contents of an env file, replacing existing values.
    pub fn merge_env_file(&mut self, path: &Path) -> Result<()> {
        let vars = read_env_file(path)?;
        debug!(path = ?path, count = vars.len(), "merged env file");
        self.merge_overwrite(vars);
        Ok(())
    }

    /// `(key, value)` pairs with trimmed values, ready for `Command::envs`.
    ///
    /// A key whose value is blank is a configuration error.
    pub fn to_vars(&self) -> Result<Vec<(String, String)>> {
        self.0
            .iter()
            .map(|(key, value)| {
                let value = value.trim();
                if value.is_empty() {
                    return Err(RewatchError::Config(format!(
                        "env: value is empty for {key}"
                    )));
                }
                Ok((key.clone(), value.to_string()))
            })
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl From<BTreeMap<String, String>> for EnvMap {
    fn from(map: BTreeMap<String, String>) -> Self {
        Self(map)
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for EnvMap {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

/// Read a dotenv-style file into a map.
pub fn read_env_file(path: &Path) -> Result<EnvMap> {
    let to_err = |source| RewatchError::EnvFile {
        path: path.to_path_buf(),
        source,
    };

    let mut vars = EnvMap::new();
    for item in dotenvy::from_path_iter(path).map_err(to_err)? {
        let (key, value) = item.map_err(to_err)?;
        vars.insert(key, value);
    }
    Ok(vars)
}

/// Resolve the final environment of one step.
pub fn resolve_step_env(
    schema_env: &EnvMap,
    step_env: &BTreeMap<String, String>,
    step_env_file: Option<&Path>,
) -> Result<EnvMap> {
    let mut env = EnvMap::from(step_env.clone());
    env.insert_missing(schema_env);
    if let Some(path) = step_env_file {
        env.merge_env_file(path)?;
    }
    Ok(env)
}
