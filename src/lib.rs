//! # JWST Catalog
//!
//! Scans a directory of JWST pipeline output, decodes product and
//! association filenames, links products to the association that claims
//! them, resolves each product's suffix against per-stage reference tables
//! and stores the result as a SQLite catalog partitioned by program.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐   ┌──────────────────────┐   ┌──────────┐
//! │ Scan root   │──▶│  jwst-catalog-core    │──▶│  SQLite   │
//! │ .fits/.json │   │ decode+index+resolve │   │ catalog   │
//! └─────────────┘   └──────────┬───────────┘   └────┬─────┘
//!                              │                    │
//!                      ┌───────┴──────┐             ▼
//!                      │  reference   │       ┌──────────┐
//!                      │ SQLite/TOML  │       │   CLI    │
//!                      └──────────────┘       │ (jwscan) │
//!                                             └──────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```bash
//! jwscan init                        # create catalog database
//! jwscan scan --root /data/jwst      # scan, resolve, store
//! jwscan programs                    # list programs
//! jwscan get jw00001001001_01101_00001_nrca1_cal.fits
//! ```
//!
//! ## Modules
//!
//! | Module | Purpose |
//! |--------|---------|
//! | [`config`] | TOML configuration parsing |
//! | [`scan`] | Directory walk and input loading |
//! | [`fits_header`] | FITS primary-header keywords |
//! | [`reference`] | Suffix reference tables from SQLite or TOML |
//! | [`ingest`] | Scan orchestration |
//! | [`store`] | Catalog persistence and queries |
//! | [`db`] | Database connection |
//! | [`migrate`] | Schema creation |

pub mod config;
pub mod db;
pub mod decode_cmd;
pub mod export;
pub mod fits_header;
pub mod get;
pub mod ingest;
pub mod migrate;
pub mod reference;
pub mod scan;
pub mod stats;
pub mod store;
