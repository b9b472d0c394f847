//! Patch sets shipped with the binary.

use crate::config::loader::{load_preset, ConfigError};
use crate::config::schema::PatchConfig;

const FIREBASE_APP: &str = include_str!("../../presets/firebase-app.toml");

/// Built-in presets by name.
pub const PRESETS: &[&str] = &["firebase-app"];

/// Firebase app: `[FIRApp configure]` in the application delegate.
pub fn firebase_app() -> Result<PatchConfig, ConfigError> {
    load_preset("firebase-app", FIREBASE_APP)
}

/// Look up a built-in preset. `None` for unknown names.
pub fn preset(name: &str) -> Option<Result<PatchConfig, ConfigError>> {
    match name {
        "firebase-app" => Some(firebase_app()),
        _ => None,
    }
}
