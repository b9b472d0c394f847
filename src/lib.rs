//! Native Patcher: idempotent source patching for mobile app projects
//!
//! SDK packages often need a line of native code in the host app, such as a
//! configure call in the iOS application delegate. This crate inserts such
//! fragments between generated begin/end markers so that repeated runs
//! converge on one copy, stale copies are replaced, and files where no
//! insertion point can be found are left untouched with a warning.
//!
//! # Architecture
//!
//! Every insertion compiles down to one primitive: [`merge::apply`], a pure
//! function from source text and an [`InsertionRequest`] to a
//! [`PatchOutcome`]. Choosing *where* to insert lives in [`Anchor`]s and
//! the primary/fallback tiers of [`tiered`]; reading and writing files
//! lives behind [`SourceStore`].
//!
//! # Safety
//!
//! - Writes verify the file is unchanged since it was read
//! - Atomic file writes (tempfile + fsync + rename)
//! - Project boundary enforcement
//! - Only Objective-C application delegates are edited
//! - Idempotent operations
//!
//! # Example
//!
//! ```
//! use native_patcher::{Anchor, InsertionRequest, PatchOutcome};
//!
//! let source = "- (BOOL)application:(UIApplication *)application\n{\n  return YES;\n}\n";
//! let request = InsertionRequest::new(
//!     "@acme/sdk-start",
//!     "[ACME start];",
//!     Anchor::literal("return YES;").unwrap(),
//! );
//!
//! let PatchOutcome::Patched(patched) = native_patcher::merge::apply(source, &request) else {
//!     panic!("anchor should match");
//! };
//! assert!(patched.contains("[ACME start];"));
//! assert_eq!(native_patcher::merge::apply(&patched, &request), PatchOutcome::Unchanged);
//! ```

pub mod anchor;
pub mod cache;
pub mod config;
pub mod diagnostics;
pub mod ios;
pub mod logging;
pub mod merge;
pub mod project;
pub mod safety;
pub mod store;
pub mod tiered;

// Re-exports
pub use anchor::{Anchor, AnchorError, AnchorMatch};
pub use config::{
    apply_patches, check_patches, check_range, load_from_path, load_from_str, ApplicationError,
    ApplyReport, ConfigError, PatchConfig, PatchResult, RangeCheck, VersionError,
};
pub use diagnostics::{Warning, WarningAggregator};
pub use ios::{Dialect, IosHook};
pub use merge::{InsertionRequest, PatchOutcome};
pub use safety::{ProjectGuard, SafetyError};
pub use store::{DryRunStore, FsStore, SourceStore, StoreError};
pub use tiered::{apply_tiered, Fallback, Tier, TieredOutcome, TieredRequest};
