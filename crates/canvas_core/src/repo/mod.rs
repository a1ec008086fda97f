//! Repository layer for the SQLite reference collaborators.
//!
//! # Responsibility
//! - Keep SQL details behind the store's persistence traits.
//!
//! # Invariants
//! - Repositories refuse connections that are not fully migrated.
//! - Repository APIs return semantic errors (`Unauthorized`, `NotFound`) in
//!   addition to DB transport errors.

pub mod canvas_repo;
