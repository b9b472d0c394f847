use std::fmt;
use std::path::Path;

/// Source language of a native iOS file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Dialect {
    /// `.m`, `.mm` and `.h`; the only dialect the patcher understands.
    ObjectiveC,
    Swift,
    /// Anything else, keyed by extension (empty when there is none).
    Other(String),
}

impl Dialect {
    pub fn from_path(path: &Path) -> Self {
        let ext = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        match ext.as_str() {
            "m" | "mm" | "h" => Dialect::ObjectiveC,
            "swift" => Dialect::Swift,
            _ => Dialect::Other(ext),
        }
    }

    pub fn is_supported(&self) -> bool {
        matches!(self, Dialect::ObjectiveC)
    }

    /// Preference when a project ships more than one application delegate.
    pub(crate) fn rank(&self) -> u8 {
        match self {
            Dialect::ObjectiveC => 0,
            Dialect::Swift => 1,
            Dialect::Other(_) => 2,
        }
    }
}

impl fmt::Display for Dialect {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Dialect::ObjectiveC => write!(f, "objc"),
            Dialect::Swift => write!(f, "swift"),
            Dialect::Other(ext) if ext.is_empty() => write!(f, "unknown"),
            Dialect::Other(ext) => write!(f, "{ext}"),
        }
    }
}
