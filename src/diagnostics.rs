//! Non-fatal build warnings.
//!
//! A patch that cannot find its insertion point must not fail the build; the
//! developer may need to add the integration by hand. Such problems are
//! collected here and logged once, through `tracing`, as they arrive.

use std::fmt;
use tracing::warn;

/// Platform a warning concerns. Only iOS sources are patched today.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Platform {
    Ios,
}

impl fmt::Display for Platform {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Platform::Ios => write!(f, "ios"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    pub platform: Platform,
    /// Usually the package that requested the patch.
    pub scope: String,
    pub message: String,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}] {}: {}", self.platform, self.scope, self.message)
    }
}

#[derive(Debug, Default)]
pub struct WarningAggregator {
    warnings: Vec<Warning>,
}

impl WarningAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_warning_ios(&mut self, scope: impl Into<String>, message: impl Into<String>) {
        self.add(Platform::Ios, scope.into(), message.into());
    }

    fn add(&mut self, platform: Platform, scope: String, message: String) {
        warn!(%platform, scope = %scope, "{message}");
        self.warnings.push(Warning {
            platform,
            scope,
            message,
        });
    }

    pub fn warnings(&self) -> &[Warning] {
        &self.warnings
    }

    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty()
    }

    /// Take all collected warnings, leaving the aggregator empty.
    pub fn drain(&mut self) -> Vec<Warning> {
        std::mem::take(&mut self.warnings)
    }
}
