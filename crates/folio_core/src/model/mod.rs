//! Content records whose persisted shape this layer owns.
//!
//! # Responsibility
//! - Define the version snapshot written on every page/area mutation.
//!
//! # Invariants
//! - Version records are immutable once stored.

pub mod version;
