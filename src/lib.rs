//! # bookmark-sync
//!
//! Keeps a bookmark tree consistent between browsers through a shared WebDAV
//! store.
//!
//! ## Overview
//!
//! Each device uploads its whole tree as a versioned, gzip-compressed backup
//! file and applies the newest backup written by others. Chromium-style and
//! Firefox-style trees are bridged by mapping their system roots onto
//! canonical roles, and by identifying ordinary nodes by content (bookmarks)
//! or by position (folders) instead of by local id. Applying a backup is a
//! minimal in-place reconciliation: matching nodes are kept, moved or
//! renamed, so local ids survive a pull.
//!
//! ## Architecture
//!
//! - Tree model, identity and comparison ([`tree`])
//! - Applying a remote tree to the local one ([`reconcile`], [`repository`])
//! - Remote protocol and backup files ([`remote`], [`backup`])
//! - Coordination between devices ([`lock`], [`state`], [`store`])
//! - Strategies and scheduling ([`sync`], [`scheduler`])
//! - Local safety nets ([`snapshot`], [`history`])
//! - Host plumbing ([`config`], [`settings`], [`logger`], [`handlers`])

/// Versioned backup files in the remote directory: naming, window
/// replacement, retention, listing cache and download deduplication.
pub mod backup;

/// Platform-specific configuration directory layout.
pub mod config;

/// Error taxonomy shared by the whole library.
pub mod error;

/// Command handlers behind the `bookmark-sync` binary.
pub mod handlers;

/// Operation history tracking and persistence.
pub mod history;

/// Console and file logging.
pub mod logger;

/// Cooperative lock over the shared key-value store.
pub mod lock;

/// Three-phase per-folder reconciliation of a remote tree onto the local one.
pub mod reconcile;

/// The WebDAV surface the engine needs, plus an in-memory stand-in.
pub mod remote;

/// Packing the local tree for upload and restoring backups into it.
pub mod repository;

/// Periodic and debounced automatic sync.
pub mod scheduler;

/// User settings persisted as TOML.
pub mod settings;

/// Local safety-net snapshots taken before every mutation.
pub mod snapshot;

/// Last-sync bookkeeping per endpoint.
pub mod state;

/// Key-value store collaborator and its implementations.
pub mod store;

/// Push, pull, smart sync and status.
pub mod sync;

/// Bookmark tree model, normalization, hashing, indexing and comparison.
pub mod tree;

pub use error::{SyncError, SyncResult};
pub use repository::{RemoteSnapshot, Repository, RestoreMode};
pub use sync::{EngineOptions, SyncAction, SyncEngine, SyncOutcome, SyncPhase, Trigger};
