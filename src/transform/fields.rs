//! Field normalizers and the static keyword tables they consult.
//!
//! Every function here is total: valid input produces a value, anything
//! else produces the documented default. Nothing panics and nothing
//! returns an error, so a malformed cell can never take down a row.

use chrono::{Duration, NaiveDate};
use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{EntityType, RegistrationCountry, ServiceCategory};

// =============================================================================
// Keyword Tables
// =============================================================================

/// Entity-type keywords in priority order; first substring match wins.
pub const ENTITY_TYPE_KEYWORDS: &[(&str, EntityType)] = &[
    ("基金会", EntityType::Foundation),
    ("社会服务机构（民非/NGO）", EntityType::Ngo),
    ("民办非企业单位", EntityType::Ngo),
    ("社会团体", EntityType::Association),
    ("企业", EntityType::Company),
    ("政府机构", EntityType::Government),
    ("学校", EntityType::School),
];

/// Exact service-category labels.
pub const SERVICE_CATEGORY_LABELS: &[(&str, ServiceCategory)] = &[
    ("学前教育", ServiceCategory::EarlyEducation),
    ("小学教育", ServiceCategory::PrimaryEducation),
    ("中学教育", ServiceCategory::SecondaryEducation),
    ("高等教育", ServiceCategory::HigherEducation),
    ("职业教育", ServiceCategory::VocationalEducation),
    ("继续教育", ServiceCategory::ContinuingEducation),
    ("特殊教育", ServiceCategory::SpecialEducation),
    ("社区教育", ServiceCategory::CommunityEducation),
    ("政策研究", ServiceCategory::PolicyResearch),
    ("教师发展", ServiceCategory::TeacherDevelopment),
    ("教育内容", ServiceCategory::EducationalContent),
    ("教育硬件", ServiceCategory::EducationalHardware),
    ("学生支持", ServiceCategory::StudentSupport),
    ("扫盲项目", ServiceCategory::LiteracyPrograms),
    ("组织支持", ServiceCategory::OrganizationSupport),
    ("其他", ServiceCategory::Other),
];

/// Education-related source columns scanned for services.
pub const EDUCATION_FIELDS: &[&str] = &[
    "关于人群类服务对象早教",
    "关于人群类服务对象义务教育",
    "关于人群类服务对象高等教育",
    "关于人群类服务对象 对服务人群的支持方向",
    "教育专业／行业／平台发展与技术支持",
    "特殊教育",
    "支教",
    "助学",
    "成长多样化需求",
];

/// Columns aggregated into each service's target-group text.
pub const TARGET_GROUP_FIELDS: &[&str] = &[
    "关于人群类服务对象早教",
    "关于人群类服务对象义务教育",
    "关于人群类服务对象高等教育",
    "关于人群类服务对象 对服务人群的支持方向",
];

/// Indicator columns that trigger a qualification entry.
pub const QUALIFICATION_INDICATORS: &[&str] = &[
    "免税资格",
    "税前扣除资格",
    "公开募捐资格",
    "公益性捐赠税前扣除资格",
    "慈善组织认定",
    "社会组织评估等级",
];

/// Region keywords scanned against the description, in priority order.
pub const COVERAGE_KEYWORDS: &[&str] = &[
    "全国", "北京", "上海", "广东", "浙江", "江苏", "山东", "河南", "湖北",
    "湖南", "四川", "重庆", "陕西", "甘肃", "青海", "西藏", "新疆", "内蒙古",
    "黑龙江", "吉林", "辽宁", "河北", "山西", "安徽", "江西", "福建", "台湾",
    "海南", "广西", "云南", "贵州", "宁夏",
];

/// Maximum kept description length, in characters.
pub const DESCRIPTION_MAX_LEN: usize = 2000;

/// Smallest numeric value interpreted as an Excel day serial.
const EXCEL_SERIAL_MIN: i64 = 25000;

// =============================================================================
// Date Parsing
// =============================================================================

static DIGITS_ONLY: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\d+$").unwrap());
static CHINESE_FULL: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})年(\d{1,2})月(\d{1,2})日").unwrap());
static CHINESE_YEAR_MONTH: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(\d{4})年(\d{1,2})月").unwrap());
static CHINESE_YEAR: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d{4})年").unwrap());

/// Parse a heterogeneous establishment date into `YYYY-MM-DD`.
///
/// Accepts Chinese formats (`2015年6月3日`, `2011年5月`, `2014年`), bare
/// 4-digit years in 1900–2100 (→ January 1st), Excel 1900-epoch day
/// serials above 25000, and a handful of plain numeric formats.
/// Anything else is `None`.
pub fn parse_date(raw: &str) -> Option<String> {
    let s = raw.trim();
    if s.is_empty() {
        return None;
    }

    if DIGITS_ONLY.is_match(s) {
        if let Ok(num) = s.parse::<i64>() {
            if (1900..=2100).contains(&num) {
                return Some(format!("{num}-01-01"));
            }
            if num > EXCEL_SERIAL_MIN {
                return excel_serial_to_date(num);
            }
        }
    }

    // First matching pattern wins; an impossible month/day yields None
    // rather than falling through to a looser pattern.
    if let Some(caps) = CHINESE_FULL.captures(s) {
        return ymd(&caps[1], &caps[2], &caps[3]);
    }

    if let Some(caps) = CHINESE_YEAR_MONTH.captures(s) {
        return ymd(&caps[1], &caps[2], "1");
    }

    if let Some(caps) = CHINESE_YEAR.captures(s) {
        return Some(format!("{}-01-01", &caps[1]));
    }

    parse_plain_date(s)
}

/// Convert an Excel 1900-epoch day serial to a calendar date.
///
/// Excel treats the nonexistent 1900-02-29 as a real day, so the offset
/// is `serial - 2` from 1900-01-01.
fn excel_serial_to_date(serial: i64) -> Option<String> {
    let epoch = NaiveDate::from_ymd_opt(1900, 1, 1)?;
    let date = epoch.checked_add_signed(Duration::days(serial - 2))?;
    Some(date.format("%Y-%m-%d").to_string())
}

fn ymd(year: &str, month: &str, day: &str) -> Option<String> {
    let date = NaiveDate::from_ymd_opt(
        year.parse().ok()?,
        month.parse().ok()?,
        day.parse().ok()?,
    )?;
    Some(date.format("%Y-%m-%d").to_string())
}

/// Last-resort parse of common plain date spellings.
fn parse_plain_date(s: &str) -> Option<String> {
    for format in ["%Y-%m-%d", "%Y/%m/%d", "%Y.%m.%d"] {
        if let Ok(date) = NaiveDate::parse_from_str(s, format) {
            return Some(date.format("%Y-%m-%d").to_string());
        }
    }
    None
}

// =============================================================================
// Staff Count
// =============================================================================

static STAFF_RANGE: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)-(\d+)").unwrap());
static FIRST_INT: Lazy<Regex> = Lazy::new(|| Regex::new(r"\d+").unwrap());

/// Parse a free-text staff count.
///
/// A `start-end` range returns the floor of the arithmetic mean, a bare
/// number returns that number, anything else returns 0.
pub fn parse_staff_count(raw: &str) -> u32 {
    if let Some(caps) = STAFF_RANGE.captures(raw) {
        let bounds = (caps[1].parse::<u64>().ok(), caps[2].parse::<u64>().ok());
        if let (Some(start), Some(end)) = bounds {
            if let Some(sum) = start.checked_add(end) {
                return ((sum) / 2).min(u32::MAX as u64) as u32;
            }
        }
        // Absurd range bounds fall through to the first-integer path.
    }
    if let Some(m) = FIRST_INT.find(raw) {
        return m.as_str().parse().unwrap_or(0);
    }
    0
}

// =============================================================================
// Description
// =============================================================================

/// Collapse whitespace runs to single spaces, trim, and cap the length
/// at [`DESCRIPTION_MAX_LEN`] characters.
pub fn clean_description(raw: &str) -> String {
    let collapsed = raw.split_whitespace().collect::<Vec<_>>().join(" ");
    collapsed.chars().take(DESCRIPTION_MAX_LEN).collect()
}

// =============================================================================
// Address Decomposition
// =============================================================================

/// Province from a dash-separated hierarchy, e.g. `甘肃省-兰州市-` → `甘肃`.
pub fn extract_province(raw: &str) -> String {
    segment(raw, 0)
        .map(|s| strip_one_suffix(s, &['市', '省']))
        .unwrap_or_default()
}

/// City segment, with a trailing `市` removed.
pub fn extract_city(raw: &str) -> String {
    segment(raw, 1)
        .map(|s| strip_one_suffix(s, &['市']))
        .unwrap_or_default()
}

/// District segment, with a trailing `区` or `县` removed.
pub fn extract_district(raw: &str) -> String {
    segment(raw, 2)
        .map(|s| strip_one_suffix(s, &['区', '县']))
        .unwrap_or_default()
}

fn segment(raw: &str, index: usize) -> Option<&str> {
    raw.split('-').nth(index)
}

fn strip_one_suffix(s: &str, suffixes: &[char]) -> String {
    for suffix in suffixes {
        if let Some(stripped) = s.strip_suffix(*suffix) {
            return stripped.to_string();
        }
    }
    s.to_string()
}

// =============================================================================
// Keyword Mapping
// =============================================================================

/// Entity type from substring keywords; no match means [`EntityType::Other`].
pub fn map_entity_type(raw: &str) -> EntityType {
    for (keyword, entity_type) in ENTITY_TYPE_KEYWORDS {
        if raw.contains(keyword) {
            return *entity_type;
        }
    }
    EntityType::Other
}

/// `国际` anywhere in the value means international; everything else
/// (including absence) is China.
pub fn map_registration_country(raw: &str) -> RegistrationCountry {
    if raw.contains("国际") {
        RegistrationCountry::International
    } else {
        RegistrationCountry::China
    }
}

/// First region keyword found in the description, or empty.
pub fn extract_coverage(description: &str) -> String {
    for keyword in COVERAGE_KEYWORDS {
        if description.contains(keyword) {
            return (*keyword).to_string();
        }
    }
    String::new()
}

/// Exact service-category label lookup; unknown labels map to `other`.
pub fn map_service_category(label: &str) -> ServiceCategory {
    for (name, category) in SERVICE_CATEGORY_LABELS {
        if *name == label {
            return *category;
        }
    }
    ServiceCategory::Other
}
