//! Contact-person user derivation.
//!
//! A row with a contact email or phone gets a synthesized, login-disabled
//! user record (`confirmed=false`, `blocked=true`) that exists purely to
//! carry contact information alongside the organization. Rows without any
//! contact channel produce no user at all.

use chrono::Utc;
use rand::{distr::Alphanumeric, Rng};

use crate::models::ContactUserDraft;
use crate::parser::ExcelRow;

const CONTACT_NAME_FIELD: &str = "机构联系人联系人姓名";
const CONTACT_PHONE_FIELD: &str = "机构联系人联系人电话";
const CONTACT_EMAIL_FIELD: &str = "机构联系人联系人邮箱";
const PRINCIPAL_FIELD: &str = "负责人";

/// Characters Strapi rejects in usernames.
const FORBIDDEN_USERNAME_CHARS: &[char] = &[
    '｜', '（', '）', '(', ')', '【', '】', '[', ']', '{', '}', '"', '\'', '`',
];

/// Strapi's username length limit.
pub const USERNAME_MAX_LEN: usize = 50;

/// Domain for placeholder emails synthesized from phone numbers.
const PLACEHOLDER_EMAIL_DOMAIN: &str = "system.local";

/// Derive a contact-user draft from a source row, or `None` when the row
/// has neither a valid email (contains `@`) nor a phone number.
pub fn derive_contact_user(row: &ExcelRow) -> Option<ContactUserDraft> {
    let contact_name = row.text(CONTACT_NAME_FIELD).unwrap_or_default();
    let contact_phone = row.text(CONTACT_PHONE_FIELD).unwrap_or_default();
    let contact_email = row.text(CONTACT_EMAIL_FIELD).unwrap_or_default();
    let principal_name = row.text(PRINCIPAL_FIELD).unwrap_or_default();

    let has_valid_email = contact_email.contains('@');
    let has_valid_phone = !contact_phone.is_empty();

    if !has_valid_email && !has_valid_phone {
        return None;
    }

    // Prefer the real email; otherwise synthesize an obviously fake one
    // from the phone digits so the record still passes email validation.
    let email = if has_valid_email {
        contact_email
    } else {
        let digits: String = contact_phone
            .chars()
            .filter(|c| c.is_ascii_digit())
            .collect();
        format!("{digits}@{PLACEHOLDER_EMAIL_DOMAIN}")
    };

    let organization_name = row.text_any(&["常用名称", "name"]).unwrap_or_default();
    let candidate = [contact_name, principal_name, organization_name]
        .into_iter()
        .find(|s| !s.is_empty())
        .unwrap_or_else(|| format!("user_{}", Utc::now().timestamp_millis()));

    let mut username = sanitize_username(&candidate);
    if username.is_empty() {
        username = email
            .split('@')
            .next()
            .filter(|local| !local.is_empty())
            .map(|local| local.chars().take(USERNAME_MAX_LEN).collect())
            .unwrap_or_else(|| format!("user_{}", random_token(8)));
    }

    Some(ContactUserDraft {
        username,
        email,
        password: random_password(),
        confirmed: false,
        blocked: true,
        provider: "local".to_string(),
        phone: if has_valid_phone { Some(contact_phone) } else { None },
        role: 1,
    })
}

/// Strip whitespace and forbidden characters, then cap at
/// [`USERNAME_MAX_LEN`] characters.
pub fn sanitize_username(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace() && !FORBIDDEN_USERNAME_CHARS.contains(c))
        .take(USERNAME_MAX_LEN)
        .collect()
}

/// Whether a username is acceptable to the remote store as-is.
pub fn is_valid_username(username: &str) -> bool {
    !username.is_empty()
        && username.chars().count() <= USERNAME_MAX_LEN
        && !username
            .chars()
            .any(|c| c.is_whitespace() || FORBIDDEN_USERNAME_CHARS.contains(&c))
}

/// Fresh random password for a created user. Never echoed anywhere:
/// these accounts are blocked from logging in anyway.
pub fn random_password() -> String {
    random_token(12)
}

fn random_token(len: usize) -> String {
    rand::rng()
        .sample_iter(&Alphanumeric)
        .take(len)
        .map(char::from)
        .collect()
}
