#![doc = include_str!("../README.md")]
//!
//! # Module Structure
//!
//! - [`error`]: Domain error types (`ScannerError`)
//! - [`config`]: Scanner configuration (`ScannerConfig`, builder)
//! - [`types`]: Domain types (`ScannerKind`, `ScanSummary`, `VulnerabilityRecord`)
//! - [`report`]: trivy / grype report parsers (`ScanReport`)
//! - [`normalize`]: Summary normalizer
//! - [`row`]: Storage row codec (`ScanRow`, `encode`, `decode`)
//! - [`latest`]: Latest-scan selector and report
//! - [`store`]: Analytical store (`ScanStore` trait, `JsonlStore`)
//! - [`runner`]: External scanner invocation (`ScanRunner`)
//! - [`attest`]: In-toto predicate and cosign attestation

pub mod attest;
pub mod config;
pub mod error;
pub mod latest;
pub mod normalize;
pub mod report;
pub mod row;
pub mod runner;
pub mod store;
pub mod types;

// --- Public API Re-exports ---

// Configuration
pub use config::{ScannerConfig, ScannerConfigBuilder};

// Error
pub use error::ScannerError;

// Types
pub use types::{
    ScanSummary, ScannerKind, SeverityBucket, SeverityCounts, Suppression, VulnerabilityRecord,
};

// Parsing / normalization
pub use normalize::{extract_vulnerabilities, normalize};
pub use report::{ReportBody, ScanReport, ScannerVersion};

// Storage
pub use latest::{
    ImageSeverityEntry, LatestScanReport, RowFailure, latest_scan_report, query_latest, select_latest,
};
pub use row::ScanRow;
pub use store::{FetchedScans, JsonlStore, ScanStore, persist_scan};

// Collaborators
pub use attest::{CosignAttestor, InTotoStatement, Invocation};
pub use runner::{ReportFormat, ScanOutput, ScanRunner};
