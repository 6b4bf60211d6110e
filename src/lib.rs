//! # Orgload - education-NGO data migration into Strapi
//!
//! Orgload reads an Excel workbook of Chinese education-sector
//! organizations, normalizes each row into the Strapi content schema,
//! and pushes the records to a Strapi instance in throttled batches.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ Excel File  │────▶│   Parser    │────▶│  Transform  │────▶│   Strapi    │
//! │   (.xlsx)   │     │ (rows→maps) │     │ (normalize) │     │ (batched)   │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use orgload::{read_excel_file, transform_row, Importer};
//!
//! let rows = read_excel_file("data.xlsx", None)?;
//! let records: Vec<_> = rows.iter().map(transform_row).collect();
//! let stats = importer.run(&records).await;
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`config`] - Environment-driven runtime configuration
//! - [`models`] - Wire-level domain models
//! - [`parser`] - Excel workbook reading
//! - [`transform`] - Row normalization and contact-user derivation
//! - [`api`] - Strapi REST client
//! - [`import`] - Batch driver, dedup, and audit logging
//! - [`logs`] - Console progress output

// Core modules
pub mod config;
pub mod error;
pub mod logs;
pub mod models;

// Parsing
pub mod parser;

// Transformation
pub mod transform;

// Strapi client
pub mod api;

// Import driver
pub mod import;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    ApiError,
    ConfigError,
    ExcelError,
    ImportError,
    ImportResult,
};

// =============================================================================
// Re-exports - Config
// =============================================================================

pub use config::Config;

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    ContactUserDraft,
    EntityType,
    ImportRecord,
    ImportStats,
    OrganizationData,
    RegistrationCountry,
    ServiceCategory,
};

// =============================================================================
// Re-exports - Parsing
// =============================================================================

pub use parser::{read_excel_file, ExcelRow};

// =============================================================================
// Re-exports - Transformation
// =============================================================================

pub use transform::{derive_contact_user, transform_organization, transform_row};

// =============================================================================
// Re-exports - API Client
// =============================================================================

pub use api::StrapiClient;

// =============================================================================
// Re-exports - Import Driver
// =============================================================================

pub use import::audit::ImportLogger;
pub use import::{print_stats, Importer};
