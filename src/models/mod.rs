//! Domain models for the Orgload import pipeline.
//!
//! This module contains the wire-level data structures sent to Strapi:
//!
//! - [`OrganizationData`] - the normalized organization record
//! - [`Address`] / [`Service`] / [`Qualification`] / [`InternetContact`] - sub-objects
//! - [`ContactUserDraft`] - login-disabled contact user synthesized per row
//! - [`ImportStats`] - per-run counters
//!
//! Field names serialize in camelCase to match the Strapi content types;
//! enum values serialize as the snake_case strings the schema expects.

use serde::{Deserialize, Serialize};

// =============================================================================
// Entity Type
// =============================================================================

/// Legal form of the organization.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum EntityType {
    Foundation,
    Ngo,
    Association,
    Company,
    Government,
    School,
    #[default]
    Other,
}

// =============================================================================
// Registration Country
// =============================================================================

/// Where the organization is registered.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationCountry {
    #[default]
    China,
    International,
}

// =============================================================================
// Service
// =============================================================================

/// Category of an education-related service.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ServiceCategory {
    EarlyEducation,
    PrimaryEducation,
    SecondaryEducation,
    HigherEducation,
    VocationalEducation,
    ContinuingEducation,
    SpecialEducation,
    CommunityEducation,
    PolicyResearch,
    TeacherDevelopment,
    EducationalContent,
    EducationalHardware,
    StudentSupport,
    LiteracyPrograms,
    OrganizationSupport,
    #[default]
    Other,
}

/// Lifecycle status of a service project.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum ProjectStatus {
    #[default]
    Ongoing,
    Completed,
    Planned,
}

/// One service the organization provides.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Service {
    pub service_category: ServiceCategory,
    pub service_content: String,
    /// Semicolon-joined target group descriptions.
    pub service_targets: String,
    pub support_methods: String,
    pub project_status: ProjectStatus,
    pub serves_all_population: bool,
}

// =============================================================================
// Qualification
// =============================================================================

/// Certification / legal status held by the organization.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum QualificationType {
    #[default]
    NoSpecialQualification,
    TaxDeductionEligible,
    PublicFundraisingQualified,
    TaxExemptQualified,
}

/// One qualification entry.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Qualification {
    pub qualification_type: QualificationType,
    pub certificate_name: String,
    pub issuing_authority: String,
}

// =============================================================================
// Address
// =============================================================================

/// Hierarchical address; missing parts default to empty strings.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Address {
    pub country: String,
    pub province: String,
    pub city: String,
    pub district: String,
    pub street: String,
    pub building: String,
    pub floor: String,
    pub room: String,
}

impl Default for Address {
    fn default() -> Self {
        Self {
            country: "中国".to_string(),
            province: String::new(),
            city: String::new(),
            district: String::new(),
            street: String::new(),
            building: String::new(),
            floor: String::new(),
            room: String::new(),
        }
    }
}

// =============================================================================
// Internet Contact
// =============================================================================

/// Online presence of the organization; every field is independently optional.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
#[serde(rename_all = "camelCase")]
pub struct InternetContact {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub website: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub wechat_public: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub weibo: Option<String>,
}

impl InternetContact {
    pub fn is_empty(&self) -> bool {
        self.website.is_none() && self.wechat_public.is_none() && self.weibo.is_none()
    }
}

// =============================================================================
// Organization
// =============================================================================

/// The normalized organization record posted to `/api/organizations`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrganizationData {
    /// Organization name; the dedup key. Never empty by the time it reaches
    /// the import driver.
    pub name: String,
    /// External registration / credit code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    pub entity_type: EntityType,
    pub registration_country: RegistrationCountry,
    /// `YYYY-MM-DD`, or null if the source date was unparseable.
    pub established_date: Option<String>,
    /// Single geographic keyword extracted from the description, or empty.
    pub coverage_area: String,
    /// Whitespace-collapsed description, at most 2000 characters.
    pub description: String,
    pub staff_count: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<Address>,
    pub services: Vec<Service>,
    pub internet_contact: InternetContact,
    pub qualifications: Vec<Qualification>,
    /// Resolved contact-user ID. Attached by the import driver just before
    /// the create request; never serialized as an unresolved draft.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contact_user: Option<i64>,
    /// Publication timestamp, set at transform time.
    pub published_at: String,
}

// =============================================================================
// Contact User Draft
// =============================================================================

/// A login-disabled user record carrying an organization's contact info.
///
/// Posted as-is to `/api/users`. `confirmed=false` and `blocked=true` are
/// always set: these accounts exist only to store contact details.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ContactUserDraft {
    pub username: String,
    /// Real email, or a synthesized `<digits>@system.local` placeholder.
    pub email: String,
    pub password: String,
    pub confirmed: bool,
    pub blocked: bool,
    pub provider: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub role: u32,
}

// =============================================================================
// Import Record
// =============================================================================

/// One transformed row: the organization plus its optional contact user.
#[derive(Debug, Clone)]
pub struct ImportRecord {
    pub organization: OrganizationData,
    pub contact_user: Option<ContactUserDraft>,
}

// =============================================================================
// Import Stats
// =============================================================================

/// Per-run counters, printed in the final summary.
///
/// Organization failures and user failures are tracked separately: a user
/// failure never counts against the organization.
#[derive(Debug, Clone, Default, Serialize)]
pub struct ImportStats {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub user_failed: usize,
    pub skipped: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_enum_wire_values() {
        assert_eq!(
            serde_json::to_string(&EntityType::Foundation).unwrap(),
            "\"foundation\""
        );
        assert_eq!(serde_json::to_string(&EntityType::Ngo).unwrap(), "\"ngo\"");
        assert_eq!(
            serde_json::to_string(&ServiceCategory::EarlyEducation).unwrap(),
            "\"early_education\""
        );
        assert_eq!(
            serde_json::to_string(&QualificationType::NoSpecialQualification).unwrap(),
            "\"no_special_qualification\""
        );
        assert_eq!(
            serde_json::to_string(&QualificationType::TaxDeductionEligible).unwrap(),
            "\"tax_deduction_eligible\""
        );
        assert_eq!(
            serde_json::to_string(&RegistrationCountry::China).unwrap(),
            "\"china\""
        );
        assert_eq!(
            serde_json::to_string(&ProjectStatus::Ongoing).unwrap(),
            "\"ongoing\""
        );
    }

    #[test]
    fn test_address_default_country() {
        let addr = Address::default();
        assert_eq!(addr.country, "中国");
        assert!(addr.province.is_empty());
    }

    #[test]
    fn test_organization_serialization() {
        let org = OrganizationData {
            name: "测试基金会".into(),
            code: Some("123".into()),
            entity_type: EntityType::Foundation,
            registration_country: RegistrationCountry::China,
            established_date: Some("2015-06-03".into()),
            coverage_area: "全国".into(),
            description: "desc".into(),
            staff_count: 20,
            address: None,
            services: vec![],
            internet_contact: InternetContact::default(),
            qualifications: vec![],
            contact_user: Some(42),
            published_at: "2024-01-01T00:00:00Z".into(),
        };
        let json = serde_json::to_value(&org).unwrap();
        assert_eq!(json["entityType"], "foundation");
        assert_eq!(json["establishedDate"], "2015-06-03");
        assert_eq!(json["contactUser"], 42);
        assert_eq!(json["staffCount"], 20);
        // Empty internet contact serializes as an empty object.
        assert_eq!(json["internetContact"], serde_json::json!({}));
    }

    #[test]
    fn test_contact_user_omits_missing_phone() {
        let draft = ContactUserDraft {
            username: "张三".into(),
            email: "a@b.cn".into(),
            password: "x".into(),
            confirmed: false,
            blocked: true,
            provider: "local".into(),
            phone: None,
            role: 1,
        };
        let json = serde_json::to_value(&draft).unwrap();
        assert!(json.get("phone").is_none());
        assert_eq!(json["blocked"], true);
        assert_eq!(json["provider"], "local");
    }
}
