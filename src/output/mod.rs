//! Output formatters for run results.
//!
//! The text summary is the `Display` form of
//! [`CatalogStats`](crate::catalog::CatalogStats); this module adds the
//! JSON form for automation.
//!
//! # Example
//!
//! ```no_run
//! use dicomcat::catalog::{CatalogConfig, Indexer};
//! use dicomcat::error::ExitCode;
//! use dicomcat::output::JsonOutput;
//! use std::path::Path;
//!
//! let root = Path::new("/archive");
//! let catalog = Indexer::with_defaults(CatalogConfig::default()).verify(root).unwrap();
//! let output = JsonOutput::new("verify", root, &catalog.stats, ExitCode::Success);
//! println!("{}", output.to_json_pretty().unwrap());
//! ```

pub mod json;

pub use json::{JsonOutput, JsonSummary};
