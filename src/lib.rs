//! Workspace facade crate.
//!
//! Re-exports the library synchronization crates so host applications can
//! depend on `library-sync-workspace` alone. The `desktop-shims` feature
//! (default) also pulls in the desktop bridge implementations.

pub use core_library as library;
pub use core_metadata as metadata;
pub use core_runtime as runtime;
pub use core_service as service;
pub use core_sync as sync;

#[cfg(feature = "desktop-shims")]
pub use bridge_desktop as desktop;
