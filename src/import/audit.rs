//! Durable audit trail for failed and skipped rows.
//!
//! Three append-only files per run under the logs directory, named with
//! the run timestamp:
//!
//! - `import-failed-<ts>.log` - organization-level failures
//! - `user-import-failed-<ts>.log` - contact-user failures
//! - `import-skipped-<ts>.log` - skipped rows with reason
//!
//! Files are created eagerly with a header when the logger is built, so
//! an interrupted run still leaves a file behind. Every entry is written
//! and flushed immediately; [`ImportLogger::finalize`] appends a summary
//! footer exactly once.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex;

use chrono::{SecondsFormat, Utc};

use crate::logs::{log_error, log_info};
use crate::models::OrganizationData;

/// Default directory for audit logs.
const DEFAULT_LOG_DIR: &str = "logs";

const FAILED_PREFIX: &str = "import-failed-";
const USER_FAILED_PREFIX: &str = "user-import-failed-";
const SKIPPED_PREFIX: &str = "import-skipped-";

/// One append-only log stream with its entry counter.
struct LogStream {
    path: PathBuf,
    file: Mutex<File>,
    count: AtomicUsize,
}

impl LogStream {
    fn create(path: PathBuf, title: &str, timestamp: &str) -> std::io::Result<Self> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)?;
        writeln!(file, "# {title}")?;
        writeln!(file, "# Import Log - {timestamp}")?;
        writeln!(file, "# Format: [timestamp] organization_name | error/reason")?;
        writeln!(file)?;
        file.flush()?;
        Ok(Self {
            path,
            file: Mutex::new(file),
            count: AtomicUsize::new(0),
        })
    }

    /// Append one entry and flush it to disk. Best effort: a write error
    /// is reported on the console but never fails the row being logged.
    fn append(&self, headline: &str, detail: &str) {
        self.count.fetch_add(1, Ordering::SeqCst);
        let mut file = match self.file.lock() {
            Ok(f) => f,
            Err(poisoned) => poisoned.into_inner(),
        };
        let entry = format!("{headline}\n   {}\n\n", detail.replace('\n', "\n   "));
        if let Err(e) = file.write_all(entry.as_bytes()).and_then(|_| file.flush()) {
            log_error(format!("写入日志失败 ({}): {e}", self.path.display()));
        }
    }

    fn append_footer(&self, footer: &str) {
        let mut file = match self.file.lock() {
            Ok(f) => f,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Err(e) = file.write_all(footer.as_bytes()).and_then(|_| file.flush()) {
            log_error(format!("写入日志失败 ({}): {e}", self.path.display()));
        }
    }

    fn count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }
}

/// Append-only audit logger for one import run.
pub struct ImportLogger {
    failed: LogStream,
    user_failed: LogStream,
    skipped: LogStream,
    finalized: AtomicBool,
}

impl ImportLogger {
    /// Create the logger and its files under the default `logs/` directory.
    pub fn new() -> std::io::Result<Self> {
        Self::with_dir(DEFAULT_LOG_DIR)
    }

    /// Create the logger with files under a custom directory.
    pub fn with_dir(dir: impl AsRef<Path>) -> std::io::Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let now = Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true);
        let file_stamp = now.replace([':', '.'], "-");

        let failed = LogStream::create(
            dir.join(format!("{FAILED_PREFIX}{file_stamp}.log")),
            "组织失败记录",
            &now,
        )?;
        let user_failed = LogStream::create(
            dir.join(format!("{USER_FAILED_PREFIX}{file_stamp}.log")),
            "用户失败记录",
            &now,
        )?;
        let skipped = LogStream::create(
            dir.join(format!("{SKIPPED_PREFIX}{file_stamp}.log")),
            "跳过记录",
            &now,
        )?;

        log_info("📝 日志文件已初始化:");
        log_info(format!("   组织失败记录: {}", failed.path.display()));
        log_info(format!("   用户失败记录: {}", user_failed.path.display()));
        log_info(format!("   跳过记录: {}", skipped.path.display()));

        Ok(Self {
            failed,
            user_failed,
            skipped,
            finalized: AtomicBool::new(false),
        })
    }

    /// Record an organization-create failure with the server's diagnostics.
    pub fn log_failed(&self, org: &OrganizationData, error: &str, details: &str) {
        self.failed.append(
            &format!("[{}] {} | {error}", now(), org.name),
            &format!("详细错误: {details}"),
        );
    }

    /// Record a contact-user failure. Kept separate from organization
    /// failures: these never block the organization itself.
    pub fn log_user_failed(&self, org: &OrganizationData, error: &str, details: &str) {
        self.user_failed.append(
            &format!("[{}] {} | {error}", now(), org.name),
            &format!("详细错误: {details}"),
        );
    }

    /// Record a skipped row with its reason and identifying fields.
    pub fn log_skipped(&self, org: &OrganizationData, reason: &str) {
        let identity = serde_json::json!({
            "name": org.name,
            "code": org.code,
            "entityType": org.entity_type,
            "registrationCountry": org.registration_country,
        });
        let identity = serde_json::to_string_pretty(&identity).unwrap_or_default();
        self.skipped.append(
            &format!("[{}] {} | {reason}", now(), org.name),
            &format!("详细信息: {identity}"),
        );
    }

    /// Append the summary footer to every non-empty stream. Subsequent
    /// calls are no-ops, so the signal handler and the normal exit path
    /// can both call this safely.
    pub fn finalize(&self) {
        if self.finalized.swap(true, Ordering::SeqCst) {
            return;
        }
        let stamp = now();

        if self.failed.count() > 0 {
            self.failed.append_footer(&format!(
                "\n# 导入完成统计 - {stamp}\n# 组织失败数: {}\n",
                self.failed.count()
            ));
            log_error(format!(
                "组织失败记录已保存: {} ({} 条)",
                self.failed.path.display(),
                self.failed.count()
            ));
        }

        if self.user_failed.count() > 0 {
            self.user_failed.append_footer(&format!(
                "\n# 导入完成统计 - {stamp}\n# 用户失败数: {}\n",
                self.user_failed.count()
            ));
            log_error(format!(
                "用户失败记录已保存: {} ({} 条)",
                self.user_failed.path.display(),
                self.user_failed.count()
            ));
        }

        if self.skipped.count() > 0 {
            self.skipped.append_footer(&format!(
                "\n# 导入完成统计 - {stamp}\n# 总跳过数: {}\n",
                self.skipped.count()
            ));
            log_info(format!(
                "📝 跳过记录已保存: {} ({} 条)",
                self.skipped.path.display(),
                self.skipped.count()
            ));
        }
    }

    pub fn failed_count(&self) -> usize {
        self.failed.count()
    }

    pub fn user_failed_count(&self) -> usize {
        self.user_failed.count()
    }

    pub fn skipped_count(&self) -> usize {
        self.skipped.count()
    }
}

fn now() -> String {
    Utc::now().to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{EntityType, InternetContact, RegistrationCountry};

    fn sample_org(name: &str) -> OrganizationData {
        OrganizationData {
            name: name.into(),
            code: Some("CODE-1".into()),
            entity_type: EntityType::Foundation,
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
        }
    }

    fn read_logs(dir: &Path) -> Vec<(String, String)> {
        let mut files: Vec<_> = fs::read_dir(dir)
            .unwrap()
            .map(|e| e.unwrap().path())
            .collect();
        files.sort();
        files
            .into_iter()
            .map(|p| {
                (
                    p.file_name().unwrap().to_string_lossy().into_owned(),
                    fs::read_to_string(p).unwrap(),
                )
            })
            .collect()
    }

    #[test]
    fn test_files_created_eagerly_with_headers() {
        let dir = tempfile::tempdir().unwrap();
        let _logger = ImportLogger::with_dir(dir.path()).unwrap();

        let files = read_logs(dir.path());
        assert_eq!(files.len(), 3);
        for (name, content) in &files {
            assert!(name.ends_with(".log"));
            assert!(content.contains("# Import Log - "));
        }
        assert!(files.iter().any(|(n, _)| n.starts_with("import-failed-")));
        assert!(files
            .iter()
            .any(|(n, _)| n.starts_with("user-import-failed-")));
        assert!(files.iter().any(|(n, _)| n.starts_with("import-skipped-")));
    }

    #[test]
    fn test_entries_and_summary_footer() {
        let dir = tempfile::tempdir().unwrap();
        let logger = ImportLogger::with_dir(dir.path()).unwrap();

        logger.log_failed(&sample_org("机构A"), "HTTP 400: bad", "{\"error\":1}");
        logger.log_skipped(&sample_org("机构B"), "组织已存在");
        logger.log_skipped(&sample_org("机构C"), "批次内重复");
        logger.finalize();

        assert_eq!(logger.failed_count(), 1);
        assert_eq!(logger.user_failed_count(), 0);
        assert_eq!(logger.skipped_count(), 2);

        let files = read_logs(dir.path());
        let failed = &files
            .iter()
            .find(|(n, _)| n.starts_with("import-failed-"))
            .unwrap()
            .1;
        assert!(failed.contains("机构A | HTTP 400: bad"));
        assert!(failed.contains("# 组织失败数: 1"));

        let skipped = &files
            .iter()
            .find(|(n, _)| n.starts_with("import-skipped-"))
            .unwrap()
            .1;
        assert!(skipped.contains("机构B | 组织已存在"));
        assert!(skipped.contains("机构C | 批次内重复"));
        assert!(skipped.contains("# 总跳过数: 2"));

        // No user failures: that file keeps only its header.
        let user_failed = &files
            .iter()
            .find(|(n, _)| n.starts_with("user-import-failed-"))
            .unwrap()
            .1;
        assert!(!user_failed.contains("导入完成统计"));
    }

    #[test]
    fn test_finalize_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let logger = ImportLogger::with_dir(dir.path()).unwrap();
        logger.log_skipped(&sample_org("机构"), "无名称");
        logger.finalize();
        logger.finalize();

        let files = read_logs(dir.path());
        let skipped = &files
            .iter()
            .find(|(n, _)| n.starts_with("import-skipped-"))
            .unwrap()
            .1;
        assert_eq!(skipped.matches("导入完成统计").count(), 1);
    }
}
