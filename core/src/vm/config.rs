use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

/// Stack bounds and pool sizing for an `Environment`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct VmConfig {
    /// Bound on nested calls; shared by the address stack and the stack of scope stacks.
    pub max_call_depth: usize,
    pub max_data_stack: usize,
    /// Bound on run loops nested through `apply` (native callbacks, macros).
    pub max_reentry_depth: usize,
    pub initial_data_stack: usize,
    pub initial_call_stack: usize,
    pub initial_scope_stacks: usize,
    /// How many recycled buffers each pool keeps around.
    pub pool_limit: usize,
}

impl Default for VmConfig {
    fn default() -> Self {
        Self {
            max_call_depth: 10_000,
            max_data_stack: 1_000_000,
            max_reentry_depth: 128,
            initial_data_stack: 100,
            initial_call_stack: 25,
            initial_scope_stacks: 5,
            pool_limit: crate::util::pool::DEFAULT_POOL_LIMIT,
        }
    }
}

impl VmConfig {
    pub fn from_toml_str(src: &str) -> Result<Self> {
        toml::from_str(src).context("invalid vm config")
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let src = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config '{}'", path.display()))?;
        Self::from_toml_str(&src)
    }

    /// Override fields from `KELP_MAX_CALL_DEPTH`, `KELP_MAX_DATA_STACK`,
    /// `KELP_MAX_REENTRY_DEPTH` and `KELP_POOL_LIMIT`.
    pub fn apply_env(mut self) -> Result<Self> {
        self.apply_vars(|key| std::env::var(key).ok())?;
        Ok(self)
    }

    fn apply_vars(&mut self, get: impl Fn(&str) -> Option<String>) -> Result<()> {
        let fields: [(&str, &mut usize); 4] = [
            ("KELP_MAX_CALL_DEPTH", &mut self.max_call_depth),
            ("KELP_MAX_DATA_STACK", &mut self.max_data_stack),
            ("KELP_MAX_REENTRY_DEPTH", &mut self.max_reentry_depth),
            ("KELP_POOL_LIMIT", &mut self.pool_limit),
        ];
        for (key, slot) in fields {
            if let Some(raw) = get(key) {
                *slot = raw
                    .trim()
                    .parse()
                    .with_context(|| format!("{} must be a non-negative integer, got '{}'", key, raw))?;
            }
        }
        Ok(())
    }
}
