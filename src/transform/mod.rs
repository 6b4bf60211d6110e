//! Row transformation: field normalizers, the organization mapper, and
//! the contact-user deriver.
//!
//! - [`fields`] - value-level normalizers and static keyword tables
//! - [`organization`] - source row → [`crate::models::OrganizationData`]
//! - [`user`] - source row → optional [`crate::models::ContactUserDraft`]

pub mod fields;
pub mod organization;
pub mod user;

pub use organization::{transform_organization, transform_row};
pub use user::{derive_contact_user, is_valid_username, sanitize_username};
