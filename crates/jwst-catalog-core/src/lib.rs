//! # JWST Catalog Core
//!
//! Pure filename decoding and metadata resolution for JWST pipeline output:
//! data models, the positional filename grammar, association membership
//! indexing, suffix → stage metadata resolution and the enrichment
//! pipeline that composes them.
//!
//! This crate contains no tokio, sqlx or filesystem I/O. Directory
//! scanning, reference-table storage and persistence live in the
//! `jwst-catalog` application crate.

pub mod decode;
pub mod diagnostics;
pub mod enrich;
pub mod index;
pub mod manifest;
pub mod models;
pub mod reference;
pub mod resolve;
