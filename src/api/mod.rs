//! Strapi REST client.
//!
//! Thin wrapper over `reqwest` for the four calls the importer needs:
//! organization lookup/create and user lookup/create. All requests carry
//! the bearer token; 4xx/5xx responses surface as
//! [`ApiError::Status`] with the raw body preserved for the audit log.
//!
//! Strapi quirk: `/api/organizations` wraps results in `{ "data": ... }`,
//! while `/api/users` (users-permissions plugin) returns bare objects.

use serde::Deserialize;
use serde_json::json;

use crate::error::{ApiError, ApiResult};
use crate::models::{ContactUserDraft, OrganizationData};

// =============================================================================
// Response Shapes
// =============================================================================

/// A created or matched remote record; only the ID matters to the importer.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteRecord {
    pub id: i64,
}

/// A user record from the users-permissions endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct RemoteUser {
    pub id: i64,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub email: String,
}

#[derive(Debug, Deserialize)]
struct ListEnvelope {
    data: Vec<RemoteRecord>,
}

#[derive(Debug, Deserialize)]
struct RecordEnvelope {
    data: RemoteRecord,
}

// =============================================================================
// Client
// =============================================================================

/// Authenticated client for one Strapi instance.
#[derive(Clone)]
pub struct StrapiClient {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl StrapiClient {
    /// Create a client for `base_url` (no trailing `/api`).
    pub fn new(base_url: &str, token: &str) -> Self {
        Self {
            http: reqwest::Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: token.to_string(),
        }
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/api/{}", self.base_url, path)
    }

    /// Look up an organization by exact name. `Ok(None)` means the name is
    /// free; an `Err` means the existence is unknown and the caller must
    /// not create (it might duplicate).
    pub async fn find_organization_by_name(
        &self,
        name: &str,
    ) -> ApiResult<Option<RemoteRecord>> {
        let response = self
            .http
            .get(self.endpoint("organizations"))
            .bearer_auth(&self.token)
            .query(&[("filters[name][$eq]", name)])
            .send()
            .await?;

        let body: ListEnvelope = Self::check(response).await?.json().await?;
        Ok(body.data.into_iter().next())
    }

    /// Create an organization; the body is wrapped in `{ "data": ... }`.
    pub async fn create_organization(
        &self,
        organization: &OrganizationData,
    ) -> ApiResult<RemoteRecord> {
        let response = self
            .http
            .post(self.endpoint("organizations"))
            .bearer_auth(&self.token)
            .json(&json!({ "data": organization }))
            .send()
            .await?;

        let body: RecordEnvelope = Self::check(response).await?.json().await?;
        Ok(body.data)
    }

    /// Look up a user by exact email.
    pub async fn find_user_by_email(&self, email: &str) -> ApiResult<Option<RemoteUser>> {
        let response = self
            .http
            .get(self.endpoint("users"))
            .bearer_auth(&self.token)
            .query(&[("filters[email][$eq]", email)])
            .send()
            .await?;

        let body: Vec<RemoteUser> = Self::check(response).await?.json().await?;
        Ok(body.into_iter().next())
    }

    /// Create a user; the users endpoint takes the object unwrapped.
    pub async fn create_user(&self, draft: &ContactUserDraft) -> ApiResult<RemoteUser> {
        let response = self
            .http
            .post(self.endpoint("users"))
            .bearer_auth(&self.token)
            .json(draft)
            .send()
            .await?;

        let user: RemoteUser = Self::check(response).await?.json().await?;
        Ok(user)
    }

    /// Turn a 4xx/5xx response into [`ApiError::Status`], keeping the body.
    async fn check(response: reqwest::Response) -> ApiResult<reqwest::Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(ApiError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

// =============================================================================
// Strapi Error Classification
// =============================================================================

/// Whether a create-user failure is a username uniqueness conflict
/// (retryable with a suffixed username).
pub fn is_username_conflict(err: &ApiError) -> bool {
    matches!(err, ApiError::Status { status, body }
        if *status < 500 && body.to_lowercase().contains("username"))
}

/// Whether a create-user failure means the email is already registered
/// (the existing record can be reused instead).
pub fn is_email_taken(err: &ApiError) -> bool {
    matches!(err, ApiError::Status { status, body }
        if *status < 500
            && (body.contains("Email already taken")
                || body.to_lowercase().contains("email")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_building() {
        let client = StrapiClient::new("http://localhost:1337/", "token");
        assert_eq!(
            client.endpoint("organizations"),
            "http://localhost:1337/api/organizations"
        );
        assert_eq!(client.endpoint("users"), "http://localhost:1337/api/users");
    }

    #[test]
    fn test_username_conflict_detection() {
        let err = ApiError::Status {
            status: 400,
            body: r#"{"error":{"message":"username must be unique"}}"#.into(),
        };
        assert!(is_username_conflict(&err));

        let err = ApiError::Status {
            status: 500,
            body: "username".into(),
        };
        assert!(!is_username_conflict(&err));

        let err = ApiError::InvalidResponse("whatever".into());
        assert!(!is_username_conflict(&err));
    }

    #[test]
    fn test_email_taken_detection() {
        let err = ApiError::Status {
            status: 400,
            body: r#"{"error":{"message":"Email already taken"}}"#.into(),
        };
        assert!(is_email_taken(&err));

        let err = ApiError::Status {
            status: 400,
            body: r#"{"error":{"message":"username must be unique"}}"#.into(),
        };
        assert!(!is_email_taken(&err));
    }
}
