//! # ovpn-store
//!
//! Safe read-modify-write access to the OpenVPN server config file.
//!
//! [`ConfigFileStore`] owns reading (with charset detection and fallbacks),
//! writing (backup first, per-line charset checks, atomic replace) and the
//! backup/default lifecycle. [`ConfigLineEditor`] layers line-level edits on
//! top, each one a single locked transaction.

pub mod diff;
pub mod editor;
pub mod error;
pub mod lock;
pub mod routes;
pub mod store;

pub use diff::BackupDiff;
pub use editor::ConfigLineEditor;
pub use error::StoreError;
pub use routes::{host_route_line, resolve_ipv4, subnet_route_line, RouteAdded};
pub use store::{
    BackupInfo, BackupOutcome, ConfigDocument, ConfigFileStore, Mutation, WriteReport,
};
