//! iOS application delegate wiring.

pub mod app_delegate;
pub mod dialect;

pub use app_delegate::{
    ensure_import, locate_app_delegate, modify_objc_app_delegate, AppDelegate, ImportLine,
    IosHook, LocateError, ModifyResult,
};
pub use dialect::Dialect;
