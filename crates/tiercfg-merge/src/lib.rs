//! Tiercfg Merge Engine
//!
//! Pure, deterministic combination of configuration fragments collected
//! root-to-leaf along an organization tree. Everything in this crate is free
//! of I/O so the same inputs always produce the same effective document.

pub mod diff;
pub mod error;
pub mod merge;
pub mod path;
pub mod policy;
pub mod schema;
pub mod value;

pub use diff::{diff, Change, ChangeKind};
pub use error::{SchemaViolation, ViolationReason};
pub use merge::{merge, merge_all, MergeEngine};
pub use path::KeyPath;
pub use policy::{flag, disabled_flags, Permission, PermissionGate};
pub use schema::{PathPattern, Schema, Shape, ShapeRule, MAX_DOCUMENT_DEPTH};
pub use value::{Mapping, Scalar, Value, ValueKind};
