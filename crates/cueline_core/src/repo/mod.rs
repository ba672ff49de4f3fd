//! Repository layer abstractions and persistence implementations.
//!
//! # Responsibility
//! - Define use-case oriented data access contracts.
//! - Isolate SQLite query details from service/business orchestration.
//! - Wrap every ordering lifecycle event in one transaction and invoke the
//!   ordering engine at its defined entry points.
//!
//! # Invariants
//! - Repository writes must enforce `Track::validate()` before persistence.
//! - Repository APIs return semantic errors (`NotFound`) in addition to DB
//!   transport errors.

pub mod track_repo;
