//! Generator configuration

use crate::error::{GeneratorError, Result};
use serde::Deserialize;

/// Default bound on expansion depth
pub const DEFAULT_MAX_DEPTH: usize = 64;

/// Hard ceiling on [`GeneratorOptions::max_depth`]
///
/// Expansion recurses once per level and must fit a host thread's stack.
/// Levels must also fit the `u8` the export dump stores.
pub const MAX_DEPTH_LIMIT: usize = 128;

/// Environment variable overriding [`GeneratorOptions::max_depth`]
pub const ENV_MAX_DEPTH: &str = "TYPETREE_MAX_DEPTH";
/// Environment variable overriding [`GeneratorOptions::cache_trees`]
pub const ENV_CACHE: &str = "TYPETREE_CACHE";
/// Environment variable overriding [`GeneratorOptions::respect_serialization_attributes`]
pub const ENV_STRICT_SERIALIZATION: &str = "TYPETREE_STRICT_SERIALIZATION";

/// Options controlling tree generation
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneratorOptions {
    /// Deepest node level expansion may reach, at most [`MAX_DEPTH_LIMIT`]
    pub max_depth: usize,
    /// Memoize finished trees until the next assembly load
    pub cache_trees: bool,
    /// Apply the engine's field and type serialization rules
    pub respect_serialization_attributes: bool,
    /// File extensions picked up by directory loading
    pub assembly_extensions: Vec<String>,
}

impl Default for GeneratorOptions {
    fn default() -> Self {
        Self {
            max_depth: DEFAULT_MAX_DEPTH,
            cache_trees: true,
            respect_serialization_attributes: true,
            assembly_extensions: vec!["dll".to_string()],
        }
    }
}

impl GeneratorOptions {
    /// Defaults overlaid with the `TYPETREE_*` environment variables
    pub fn from_env() -> Self {
        Self::default().overlay(|key| std::env::var(key).ok())
    }

    /// Parse options from a JSON document; missing keys keep their defaults
    pub fn from_json_str(json: &str) -> Result<Self> {
        let options: Self = serde_json::from_str(json)
            .map_err(|e| GeneratorError::InvalidArgument(format!("invalid options: {}", e)))?;
        if options.max_depth == 0 {
            return Err(GeneratorError::InvalidArgument(
                "max_depth must be positive".to_string(),
            ));
        }
        if options.max_depth > MAX_DEPTH_LIMIT {
            return Err(GeneratorError::InvalidArgument(format!(
                "max_depth {} exceeds the limit of {}",
                options.max_depth, MAX_DEPTH_LIMIT
            )));
        }
        Ok(options)
    }

    /// Depth bound the builder enforces
    pub fn depth_limit(&self) -> usize {
        self.max_depth.clamp(1, MAX_DEPTH_LIMIT)
    }

    /// Apply overrides from a variable lookup
    ///
    /// Values that do not parse are ignored with a warning. A depth above
    /// [`MAX_DEPTH_LIMIT`] is clamped to it.
    pub fn overlay(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(value) = lookup(ENV_MAX_DEPTH) {
            match value.trim().parse::<usize>() {
                Ok(depth) if depth > MAX_DEPTH_LIMIT => {
                    tracing::warn!(
                        variable = ENV_MAX_DEPTH,
                        %value,
                        limit = MAX_DEPTH_LIMIT,
                        "clamping depth to limit"
                    );
                    self.max_depth = MAX_DEPTH_LIMIT;
                }
                Ok(depth) if depth > 0 => self.max_depth = depth,
                _ => tracing::warn!(variable = ENV_MAX_DEPTH, %value, "ignoring invalid value"),
            }
        }
        if let Some(value) = lookup(ENV_CACHE) {
            match parse_bool(&value) {
                Some(flag) => self.cache_trees = flag,
                None => tracing::warn!(variable = ENV_CACHE, %value, "ignoring invalid value"),
            }
        }
        if let Some(value) = lookup(ENV_STRICT_SERIALIZATION) {
            match parse_bool(&value) {
                Some(flag) => self.respect_serialization_attributes = flag,
                None => tracing::warn!(
                    variable = ENV_STRICT_SERIALIZATION,
                    %value,
                    "ignoring invalid value"
                ),
            }
        }
        self
    }

    /// Whether a path has one of the configured assembly extensions
    pub fn matches_extension(&self, path: &std::path::Path) -> bool {
        path.extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| {
                self.assembly_extensions
                    .iter()
                    .any(|wanted| wanted.eq_ignore_ascii_case(ext))
            })
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
