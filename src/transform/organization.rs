//! Source row → normalized organization record.
//!
//! Composes the field normalizers over the fixed set of source columns.
//! Each field reads its Chinese label first and falls back to the English
//! alias where the source data carries one. The whole mapping is total:
//! a row of garbage still produces a record (possibly with an empty name,
//! which the importer then rejects).

use chrono::{SecondsFormat, Utc};

use crate::models::{
    Address, ImportRecord, InternetContact, OrganizationData, Qualification,
    QualificationType, ProjectStatus, Service, ServiceCategory,
};
use crate::parser::ExcelRow;
use crate::transform::fields::{
    clean_description, extract_city, extract_coverage, extract_district,
    extract_province, map_entity_type, map_registration_country, parse_date,
    parse_staff_count, EDUCATION_FIELDS, QUALIFICATION_INDICATORS,
    TARGET_GROUP_FIELDS,
};
use crate::transform::user::derive_contact_user;

/// Industry-type service-object column. The leading space is present in
/// the source workbook's header.
const INDUSTRY_SERVICE_FIELD: &str = " 关于行业类服务对象";

/// Column marking that services cover the whole population.
const SERVES_ALL_FIELD: &str = "关于人群类服务对象服务全部人群";

/// Registering-authority column, used for the fallback qualification.
const REGISTRY_AUTHORITY_FIELD: &str = "登记管理机关";

/// Transform one spreadsheet row into an import record: the normalized
/// organization plus, when the row carries contact details, a contact-user
/// draft for the import driver to resolve.
pub fn transform_row(row: &ExcelRow) -> ImportRecord {
    ImportRecord {
        organization: transform_organization(row),
        contact_user: derive_contact_user(row),
    }
}

/// Build the normalized organization record for one row.
pub fn transform_organization(row: &ExcelRow) -> OrganizationData {
    let description = row
        .text_any(&["机构／项目简介", "description"])
        .unwrap_or_default();

    OrganizationData {
        name: row
            .text_any(&["常用名称", "name"])
            .unwrap_or_default()
            .trim()
            .to_string(),
        code: row.text_any(&["机构信用代码", "code"]),
        entity_type: map_entity_type(
            &row.text_any(&["实体类型", "entityType"]).unwrap_or_default(),
        ),
        registration_country: map_registration_country(
            &row.text_any(&["注册国籍", "registrationCountry"])
                .unwrap_or_default(),
        ),
        established_date: row
            .text_any(&["成立时间", "establishedDate"])
            .and_then(|raw| parse_date(&raw)),
        coverage_area: extract_coverage(&description),
        description: clean_description(&description),
        staff_count: row
            .text_any(&["机构／项目全职人数", "staffCount"])
            .map(|raw| parse_staff_count(&raw))
            .unwrap_or(0),
        address: Some(transform_address(row)),
        services: transform_services(row),
        internet_contact: transform_contacts(row),
        qualifications: transform_qualifications(row),
        contact_user: None,
        published_at: Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true),
    }
}

// =============================================================================
// Address
// =============================================================================

/// Decompose the registered-address hierarchy, falling back to the street
/// address column when the hierarchy is missing.
fn transform_address(row: &ExcelRow) -> Address {
    let hierarchy = row.text_any(&["注册地", "具体地址"]).unwrap_or_default();

    Address {
        province: extract_province(&hierarchy),
        city: extract_city(&hierarchy),
        district: extract_district(&hierarchy),
        street: row.text_any(&["具体地址", "street"]).unwrap_or_default(),
        ..Address::default()
    }
}

// =============================================================================
// Services
// =============================================================================

/// Build the services list from the education-related columns.
///
/// The category comes from keyword hints in the column name itself; every
/// entry carries the aggregated target-group text. A row with none of the
/// education columns but an industry service object yields exactly one
/// fallback `other` service.
fn transform_services(row: &ExcelRow) -> Vec<Service> {
    let mut services = Vec::new();
    let targets = extract_target_groups(row);
    let serves_all = row.is_yes(SERVES_ALL_FIELD);

    for field in EDUCATION_FIELDS {
        let Some(value) = row.text(field) else {
            continue;
        };
        services.push(Service {
            service_category: infer_category_from_field(field),
            service_content: value.clone(),
            service_targets: targets.clone(),
            support_methods: value,
            project_status: ProjectStatus::Ongoing,
            serves_all_population: serves_all,
        });
    }

    if services.is_empty() {
        if let Some(value) = row.text(INDUSTRY_SERVICE_FIELD) {
            services.push(Service {
                service_category: ServiceCategory::Other,
                service_content: value.clone(),
                service_targets: value,
                support_methods: String::new(),
                project_status: ProjectStatus::Ongoing,
                serves_all_population: false,
            });
        }
    }

    services
}

/// Category hints embedded in the education column names; first match wins.
fn infer_category_from_field(field: &str) -> ServiceCategory {
    const HINTS: &[(&str, ServiceCategory)] = &[
        ("早教", ServiceCategory::EarlyEducation),
        ("义务教育", ServiceCategory::PrimaryEducation),
        ("高等教育", ServiceCategory::HigherEducation),
        ("特殊教育", ServiceCategory::SpecialEducation),
        ("支教", ServiceCategory::TeacherDevelopment),
        ("助学", ServiceCategory::StudentSupport),
        ("技术支持", ServiceCategory::EducationalHardware),
    ];
    for (hint, category) in HINTS {
        if field.contains(hint) {
            return *category;
        }
    }
    ServiceCategory::Other
}

/// Semicolon-joined values of the designated target-group columns.
fn extract_target_groups(row: &ExcelRow) -> String {
    TARGET_GROUP_FIELDS
        .iter()
        .filter_map(|field| row.text(field))
        .collect::<Vec<_>>()
        .join("; ")
}

// =============================================================================
// Internet Contact
// =============================================================================

/// Copy website / WeChat / Weibo verbatim; each is independently optional.
fn transform_contacts(row: &ExcelRow) -> InternetContact {
    InternetContact {
        website: row.text_any(&["机构官网", "website"]),
        wechat_public: row.text("机构微信公众号"),
        weibo: row.text("机构微博"),
    }
}

// =============================================================================
// Qualifications
// =============================================================================

/// Scan the qualification indicator columns; any non-empty indicator yields
/// an entry whose type is inferred from the indicator label. A row without
/// any indicator but with a registering authority gets one generic entry
/// naming that authority.
fn transform_qualifications(row: &ExcelRow) -> Vec<Qualification> {
    let mut qualifications = Vec::new();

    for indicator in QUALIFICATION_INDICATORS {
        if row.text(indicator).is_none() {
            continue;
        }
        qualifications.push(Qualification {
            qualification_type: infer_qualification_type(indicator),
            certificate_name: (*indicator).to_string(),
            issuing_authority: "相关主管部门".to_string(),
        });
    }

    if qualifications.is_empty() {
        if let Some(authority) = row.text(REGISTRY_AUTHORITY_FIELD) {
            qualifications.push(Qualification {
                qualification_type: QualificationType::NoSpecialQualification,
                certificate_name: "社会组织登记证书".to_string(),
                issuing_authority: authority,
            });
        }
    }

    qualifications
}

fn infer_qualification_type(indicator: &str) -> QualificationType {
    if indicator.contains("免税") || indicator.contains("税前扣除") {
        QualificationType::TaxDeductionEligible
    } else if indicator.contains("公开募捐") {
        QualificationType::PublicFundraisingQualified
    } else if indicator.contains("慈善组织") {
        QualificationType::TaxExemptQualified
    } else {
        QualificationType::NoSpecialQualification
    }
}
