//! Batch import driver.
//!
//! Consumes transformed [`ImportRecord`]s and pushes them to Strapi:
//!
//! - Batches run sequentially; rows inside a batch run concurrently and
//!   all-settled (one row's failure never aborts its batch).
//! - Duplicate names within the run are skipped before any network call.
//! - An organization whose name already exists remotely is skipped, not
//!   updated.
//! - Contact users are created (or reused by email) before the
//!   organization, so the create request can reference the user ID. A
//!   user failure downgrades the row to an organization without contact
//!   user; it never fails the organization itself.
//!
//! Every failure and skip lands in the durable audit log alongside the
//! console output.

pub mod audit;

use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::join_all;

use crate::api::{is_email_taken, is_username_conflict, StrapiClient};
use crate::config::Config;
use crate::error::ApiError;
use crate::import::audit::ImportLogger;
use crate::logs::{log_error, log_info, log_success, log_warning};
use crate::models::{ImportRecord, ImportStats, OrganizationData};
use crate::transform::is_valid_username;
use crate::transform::user::USERNAME_MAX_LEN;

/// Maximum `_N` suffixes tried when a username collides remotely.
const USERNAME_RETRY_LIMIT: u32 = 10;

/// Batch import driver; shared by reference across concurrent row tasks.
pub struct Importer {
    client: StrapiClient,
    logger: Arc<ImportLogger>,
    stats: Mutex<ImportStats>,
    /// Lowercased names already handled in this run.
    seen_names: Mutex<HashSet<String>>,
    /// email → user ID, so one email never creates two users.
    user_cache: Mutex<HashMap<String, i64>>,
    batch_size: usize,
    batch_delay: Duration,
    dry_run: bool,
}

impl Importer {
    pub fn new(client: StrapiClient, logger: Arc<ImportLogger>, config: &Config) -> Self {
        Self {
            client,
            logger,
            stats: Mutex::new(ImportStats::default()),
            seen_names: Mutex::new(HashSet::new()),
            user_cache: Mutex::new(HashMap::new()),
            batch_size: config.batch_size.max(1),
            batch_delay: Duration::from_secs(config.batch_delay_secs),
            dry_run: config.dry_run,
        }
    }

    /// Current counters; cheap to call from a signal handler.
    pub fn stats(&self) -> ImportStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }

    /// Import all records batch by batch and return the final counters.
    ///
    /// Rows without a name are rejected up front; they never enter a
    /// batch and never trigger a network call.
    pub async fn run(&self, records: &[ImportRecord]) -> ImportStats {
        let mut queue: Vec<&ImportRecord> = Vec::with_capacity(records.len());
        for record in records {
            if record.organization.name.trim().is_empty() {
                self.bump(|s| {
                    s.total += 1;
                    s.skipped += 1;
                });
                self.logger.log_skipped(&record.organization, "无名称");
                log_warning("跳过无名称记录");
            } else {
                queue.push(record);
            }
        }

        let batch_count = queue.len().div_ceil(self.batch_size);
        log_info(format!(
            "🚀 开始导入 {} 条记录 (每批 {} 条，共 {} 批)",
            queue.len(),
            self.batch_size,
            batch_count
        ));

        for (index, batch) in queue.chunks(self.batch_size).enumerate() {
            log_info(format!(
                "📦 批次 {}/{} ({} 条记录)",
                index + 1,
                batch_count,
                batch.len()
            ));

            join_all(batch.iter().map(|record| self.process(record))).await;

            if index + 1 < batch_count && !self.batch_delay.is_zero() {
                log_info(format!("⏳ 等待 {} 秒...", self.batch_delay.as_secs()));
                tokio::time::sleep(self.batch_delay).await;
            }
        }

        self.stats()
    }

    /// Handle one record end to end. Never returns an error: every outcome
    /// is absorbed into the counters and the audit log.
    async fn process(&self, record: &ImportRecord) {
        self.bump(|s| s.total += 1);
        let org = &record.organization;
        let name = org.name.trim();

        // Check-and-insert under one lock, so two concurrent rows with the
        // same name cannot both pass.
        let is_new = match self.seen_names.lock() {
            Ok(mut seen) => seen.insert(name.to_lowercase()),
            Err(poisoned) => poisoned.into_inner().insert(name.to_lowercase()),
        };
        if !is_new {
            self.bump(|s| s.skipped += 1);
            self.logger.log_skipped(org, "批次内重复");
            log_warning(format!("跳过批次内重复: {name}"));
            return;
        }

        if self.dry_run {
            self.bump(|s| s.success += 1);
            log_success(format!("[DRY RUN] 将创建组织: {name}"));
            return;
        }

        match self.client.find_organization_by_name(name).await {
            Ok(Some(existing)) => {
                self.bump(|s| s.skipped += 1);
                self.logger.log_skipped(org, "组织已存在");
                log_warning(format!("组织已存在，跳过: {name} (ID: {})", existing.id));
                return;
            }
            Ok(None) => {}
            Err(e) => {
                // Unknown existence: creating now could duplicate.
                self.bump(|s| s.failed += 1);
                self.logger
                    .log_failed(org, &format!("检查组织是否存在失败: {e}"), &detail(&e));
                log_error(format!("检查组织失败: {name} - {e}"));
                return;
            }
        }

        let mut org = org.clone();
        if let Some(draft) = &record.contact_user {
            org.contact_user = self.resolve_contact_user(&org, draft).await;
        }

        match self.client.create_organization(&org).await {
            Ok(created) => {
                self.bump(|s| s.success += 1);
                log_success(format!("成功创建组织: {name} (ID: {})", created.id));
            }
            Err(e) => {
                self.bump(|s| s.failed += 1);
                self.logger
                    .log_failed(&org, &format!("创建组织失败: {e}"), &detail(&e));
                log_error(format!("创建组织失败: {name} - {e}"));
            }
        }
    }

    /// Find or create the contact user and return its ID, or `None` when
    /// the user cannot be obtained. `None` is never fatal to the caller.
    async fn resolve_contact_user(
        &self,
        org: &OrganizationData,
        draft: &crate::models::ContactUserDraft,
    ) -> Option<i64> {
        if !is_valid_username(&draft.username) {
            self.logger.log_skipped(
                org,
                &format!("用户名无效，跳过用户创建: {}", draft.username),
            );
            log_warning(format!("用户名无效，跳过用户创建: {}", draft.username));
            return None;
        }

        if let Some(id) = self.cached_user(&draft.email) {
            return Some(id);
        }

        match self.client.find_user_by_email(&draft.email).await {
            Ok(Some(user)) => {
                log_info(format!("复用已有用户: {} (ID: {})", user.email, user.id));
                self.cache_user(&draft.email, user.id);
                return Some(user.id);
            }
            Ok(None) => {}
            Err(e) => {
                self.user_failure(org, &format!("查询用户失败: {e}"), &e);
                return None;
            }
        }

        for attempt in 0..=USERNAME_RETRY_LIMIT {
            let mut draft = draft.clone();
            draft.username = suffixed_username(&draft.username, attempt);

            match self.client.create_user(&draft).await {
                Ok(user) => {
                    log_success(format!("创建用户: {} (ID: {})", draft.username, user.id));
                    self.cache_user(&draft.email, user.id);
                    return Some(user.id);
                }
                Err(e) if is_username_conflict(&e) && attempt < USERNAME_RETRY_LIMIT => {
                    log_warning(format!("用户名冲突，重试: {}", draft.username));
                }
                Err(e) if is_email_taken(&e) => {
                    // Created by a concurrent row, or lookup missed it.
                    match self.client.find_user_by_email(&draft.email).await {
                        Ok(Some(user)) => {
                            log_info(format!(
                                "邮箱已注册，复用用户: {} (ID: {})",
                                user.email, user.id
                            ));
                            self.cache_user(&draft.email, user.id);
                            return Some(user.id);
                        }
                        _ => {
                            self.user_failure(org, &format!("创建用户失败: {e}"), &e);
                            return None;
                        }
                    }
                }
                Err(e) => {
                    self.user_failure(org, &format!("创建用户失败: {e}"), &e);
                    return None;
                }
            }
        }

        None
    }

    fn user_failure(&self, org: &OrganizationData, error: &str, cause: &ApiError) {
        self.bump(|s| s.user_failed += 1);
        self.logger.log_user_failed(org, error, &detail(cause));
        log_warning(format!("{} ({})", error, org.name));
    }

    fn cached_user(&self, email: &str) -> Option<i64> {
        match self.user_cache.lock() {
            Ok(cache) => cache.get(email).copied(),
            Err(poisoned) => poisoned.into_inner().get(email).copied(),
        }
    }

    fn cache_user(&self, email: &str, id: i64) {
        match self.user_cache.lock() {
            Ok(mut cache) => {
                cache.insert(email.to_string(), id);
            }
            Err(poisoned) => {
                poisoned.into_inner().insert(email.to_string(), id);
            }
        }
    }

    fn bump(&self, update: impl FnOnce(&mut ImportStats)) {
        match self.stats.lock() {
            Ok(mut stats) => update(&mut stats),
            Err(poisoned) => update(&mut poisoned.into_inner()),
        }
    }
}

/// Print the final summary block.
pub fn print_stats(stats: &ImportStats) {
    print!("{}", format_stats(stats));
}

fn format_stats(stats: &ImportStats) -> String {
    format!(
        "\n=== 导入统计 ===\n\
         总计: {}\n\
         成功: {}\n\
         失败: {}\n\
         用户创建失败: {}\n\
         跳过: {}\n\
         ================\n",
        stats.total, stats.success, stats.failed, stats.user_failed, stats.skipped
    )
}

/// `base` unchanged for attempt 0, otherwise `base_N` with the base
/// truncated so the whole username stays within the length limit.
fn suffixed_username(base: &str, attempt: u32) -> String {
    if attempt == 0 {
        return base.to_string();
    }
    let suffix = format!("_{attempt}");
    let keep = USERNAME_MAX_LEN.saturating_sub(suffix.chars().count());
    let mut name: String = base.chars().take(keep).collect();
    name.push_str(&suffix);
    name
}

/// Server diagnostics for the audit log: raw body when there is one,
/// the error text otherwise.
fn detail(err: &ApiError) -> String {
    err.response_body()
        .map(str::to_string)
        .unwrap_or_else(|| err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{ContactUserDraft, EntityType, InternetContact, RegistrationCountry};
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};

    /// Minimal in-process Strapi stand-in. Organization lookups report no
    /// match and organization creates succeed with ID 1; user creates pop
    /// canned responses (exhausted → success with ID 7). Every request's
    /// first line and body are captured for assertions.
    struct StubServer {
        base_url: String,
        requests: Arc<Mutex<Vec<(String, String)>>>,
    }

    async fn spawn_stub(user_create_responses: Vec<(u16, &'static str)>) -> StubServer {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let base_url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(Vec::new()));
        let seen = Arc::clone(&requests);

        tokio::spawn(async move {
            let mut user_responses = user_create_responses.into_iter();
            loop {
                let (mut socket, _) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(_) => return,
                };
                let (head, body) = read_request(&mut socket).await;
                seen.lock().unwrap().push((head.clone(), body));

                let (status, payload) = if head.starts_with("POST /api/users") {
                    user_responses.next().unwrap_or((200, r#"{"id":7}"#))
                } else if head.starts_with("POST /api/organizations") {
                    (200, r#"{"data":{"id":1}}"#)
                } else if head.starts_with("GET /api/organizations") {
                    (200, r#"{"data":[]}"#)
                } else {
                    (200, "[]")
                };
                let response = format!(
                    "HTTP/1.1 {status} X\r\nContent-Type: application/json\r\n\
                     Content-Length: {}\r\nConnection: close\r\n\r\n{payload}",
                    payload.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });

        StubServer { base_url, requests }
    }

    async fn read_request(socket: &mut TcpStream) -> (String, String) {
        let mut data = Vec::new();
        let mut buf = [0u8; 1024];
        loop {
            let n = socket.read(&mut buf).await.unwrap_or(0);
            if n == 0 {
                return (String::new(), String::new());
            }
            data.extend_from_slice(&buf[..n]);
            let Some(pos) = data.windows(4).position(|w| w == b"\r\n\r\n") else {
                continue;
            };
            let headers = String::from_utf8_lossy(&data[..pos]).to_string();
            let content_length = headers
                .lines()
                .filter_map(|l| l.split_once(':'))
                .find(|(name, _)| name.eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            while data.len() < pos + 4 + content_length {
                let n = socket.read(&mut buf).await.unwrap_or(0);
                if n == 0 {
                    break;
                }
                data.extend_from_slice(&buf[..n]);
            }
            let head = headers.lines().next().unwrap_or("").to_string();
            let body = String::from_utf8_lossy(&data[pos + 4..]).to_string();
            return (head, body);
        }
    }

    fn contact_draft(username: &str, email: &str) -> ContactUserDraft {
        ContactUserDraft {
            username: username.into(),
            email: email.into(),
            password: "secret".into(),
            confirmed: false,
            blocked: true,
            provider: "local".into(),
            phone: None,
            role: 1,
        }
    }

    fn record(name: &str) -> ImportRecord {
        ImportRecord {
            organization: OrganizationData {
                name: name.into(),
                code: None,
                entity_type: EntityType::Other,
                registration_country: RegistrationCountry::China,
                established_date: None,
                coverage_area: String::new(),
                description: String::new(),
                staff_count: 0,
                address: None,
                services: vec![],
                internet_contact: InternetContact::default(),
                qualifications: vec![],
                contact_user: None,
                published_at: "2024-01-01T00:00:00.000Z".into(),
            },
            contact_user: None,
        }
    }

    fn dry_run_importer(dir: &std::path::Path) -> Importer {
        let config = Config {
            dry_run: true,
            batch_size: 2,
            ..Config::default()
        };
        Importer::new(
            StrapiClient::new("http://localhost:1337", ""),
            Arc::new(ImportLogger::with_dir(dir).unwrap()),
            &config,
        )
    }

    #[test]
    fn test_suffixed_username() {
        assert_eq!(suffixed_username("张三", 0), "张三");
        assert_eq!(suffixed_username("张三", 1), "张三_1");
        assert_eq!(suffixed_username("张三", 10), "张三_10");

        let long = "名".repeat(50);
        let suffixed = suffixed_username(&long, 3);
        assert_eq!(suffixed.chars().count(), 50);
        assert!(suffixed.ends_with("_3"));
    }

    #[test]
    fn test_detail_prefers_response_body() {
        let err = ApiError::Status {
            status: 400,
            body: r#"{"error":"bad"}"#.into(),
        };
        assert_eq!(detail(&err), r#"{"error":"bad"}"#);

        let err = ApiError::InvalidResponse("not json".into());
        assert!(detail(&err).contains("not json"));
    }

    #[tokio::test]
    async fn test_dry_run_counts_without_network() {
        let dir = tempfile::tempdir().unwrap();
        let importer = dry_run_importer(dir.path());

        let records = vec![record("机构A"), record("机构B"), record("机构A")];
        let stats = importer.run(&records).await;

        assert_eq!(stats.total, 3);
        assert_eq!(stats.success, 2);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.failed, 0);
        assert_eq!(importer.logger.skipped_count(), 1);
    }

    #[tokio::test]
    async fn test_duplicate_detection_ignores_case_and_whitespace() {
        let dir = tempfile::tempdir().unwrap();
        let importer = dry_run_importer(dir.path());

        let records = vec![record("Hope Foundation"), record("  hope foundation ")];
        let stats = importer.run(&records).await;

        assert_eq!(stats.success, 1);
        assert_eq!(stats.skipped, 1);
    }

    #[tokio::test]
    async fn test_empty_name_skipped() {
        let dir = tempfile::tempdir().unwrap();
        let importer = dry_run_importer(dir.path());

        let records = vec![record("   "), record("机构")];
        let stats = importer.run(&records).await;

        assert_eq!(stats.total, 2);
        assert_eq!(stats.success, 1);
        assert_eq!(stats.skipped, 1);
    }

    #[tokio::test]
    async fn test_empty_name_never_reaches_network() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config {
            batch_size: 2,
            ..Config::default()
        };
        // Port 1 refuses connections, so any attempted request would
        // surface as a failed row rather than a skip.
        let importer = Importer::new(
            StrapiClient::new("http://127.0.0.1:1", "token"),
            Arc::new(ImportLogger::with_dir(dir.path()).unwrap()),
            &config,
        );

        let stats = importer.run(&[record("  ")]).await;

        assert_eq!(stats.total, 1);
        assert_eq!(stats.skipped, 1);
        assert_eq!(stats.failed, 0);
    }

    #[tokio::test]
    async fn test_user_failure_never_blocks_organization() {
        let dir = tempfile::tempdir().unwrap();
        let stub = spawn_stub(vec![(500, r#"{"error":{"message":"boom"}}"#)]).await;
        let config = Config {
            batch_size: 5,
            ..Config::default()
        };
        let importer = Importer::new(
            StrapiClient::new(&stub.base_url, "token"),
            Arc::new(ImportLogger::with_dir(dir.path()).unwrap()),
            &config,
        );

        let mut rec = record("机构A");
        rec.contact_user = Some(contact_draft("张三", "zhang@example.org"));
        let stats = importer.run(&[rec]).await;

        assert_eq!(stats.success, 1);
        assert_eq!(stats.user_failed, 1);
        assert_eq!(stats.failed, 0);
        assert_eq!(importer.logger.user_failed_count(), 1);

        // The organization was created without a contact-user reference.
        let requests = stub.requests.lock().unwrap();
        let org_create = requests
            .iter()
            .find(|(head, _)| head.starts_with("POST /api/organizations"))
            .unwrap();
        assert!(!org_create.1.contains("contactUser"));
    }

    #[tokio::test]
    async fn test_username_conflict_retries_with_suffix() {
        let conflict = r#"{"error":{"message":"username must be unique"}}"#;
        let dir = tempfile::tempdir().unwrap();
        let stub = spawn_stub(vec![(400, conflict), (400, conflict)]).await;
        let config = Config {
            batch_size: 5,
            ..Config::default()
        };
        let importer = Importer::new(
            StrapiClient::new(&stub.base_url, "token"),
            Arc::new(ImportLogger::with_dir(dir.path()).unwrap()),
            &config,
        );

        let mut rec = record("机构B");
        rec.contact_user = Some(contact_draft("张三", "zhang@example.org"));
        let stats = importer.run(&[rec]).await;

        assert_eq!(stats.success, 1);
        assert_eq!(stats.user_failed, 0);

        let requests = stub.requests.lock().unwrap();
        let user_creates: Vec<&String> = requests
            .iter()
            .filter(|(head, _)| head.starts_with("POST /api/users"))
            .map(|(_, body)| body)
            .collect();
        assert_eq!(user_creates.len(), 3);
        assert!(user_creates[0].contains(r#""username":"张三""#));
        assert!(user_creates[1].contains(r#""username":"张三_1""#));
        assert!(user_creates[2].contains(r#""username":"张三_2""#));

        // The third attempt's user ID ends up on the organization.
        let org_create = requests
            .iter()
            .find(|(head, _)| head.starts_with("POST /api/organizations"))
            .unwrap();
        assert!(org_create.1.contains(r#""contactUser":7"#));
    }

    #[test]
    fn test_format_stats_block() {
        let stats = ImportStats {
            total: 5,
            success: 3,
            failed: 1,
            user_failed: 0,
            skipped: 1,
        };
        let block = format_stats(&stats);
        assert!(block.contains("=== 导入统计 ==="));
        assert!(block.contains("总计: 5"));
        assert!(block.contains("成功: 3"));
        assert!(block.contains("失败: 1"));
        assert!(block.contains("跳过: 1"));
        assert!(block.ends_with("================\n"));
    }
}
