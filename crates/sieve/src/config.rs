//! Search service configuration.

use serde::Deserialize;
use sieve_core::CompilerConfig;

/// Search service configuration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct SieveConfig {
    /// Log every compiled plan at info level.
    pub debug: bool,

    /// Compiler settings.
    pub compiler: CompilerConfig,
}

impl SieveConfig {
    /// Create a configuration with default values.
    pub fn new() -> Self {
        Self::default()
    }

    /// Read configuration from JSON; absent keys keep their defaults.
    pub fn from_json(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Enable or disable plan logging.
    pub fn with_debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    /// Set the compiler settings.
    pub fn with_compiler(mut self, compiler: CompilerConfig) -> Self {
        self.compiler = compiler;
        self
    }
}
