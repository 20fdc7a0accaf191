//! Tutorial entity model: members belonging to teams.
//!
//! # Responsibility
//! - Define the persistent entities and their static table mapping.
//! - Define value objects assembled by projection queries.
//!
//! # Invariants
//! - Every entity is identified by an integer primary key assigned on
//!   first save.
//! - Property names in `EntityMeta` are the names used by method grammar
//!   and sort specs; column names never leak into declarations.

pub mod member;
pub mod team;
