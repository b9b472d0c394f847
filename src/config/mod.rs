pub mod applicator;
pub mod loader;
pub mod preset;
pub mod schema;
pub mod version;

pub use applicator::{
    apply_patches, check_patches, ApplicationError, ApplyReport, FileChange, PatchResult,
};
pub use loader::{load_from_path, load_from_str, ConfigError, ConfigOrigin};
pub use schema::{
    AnchorSpec, FallbackSpec, ImportSpec, InsertDefinition, Metadata, PatchConfig,
    ValidationError, ValidationIssue,
};
pub use version::{check_range, RangeCheck, VersionError};
