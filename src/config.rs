//! Runtime configuration loaded from environment variables.
//!
//! Recognized variables (all optional except `STRAPI_TOKEN` outside dry runs):
//!
//! | Variable      | Default                        | Meaning                      |
//! |---------------|--------------------------------|------------------------------|
//! | `STRAPI_URL`  | `http://localhost:1337`        | Strapi base URL              |
//! | `STRAPI_TOKEN`| *(empty)*                      | API bearer token             |
//! | `EXCEL_FILE`  | `教育公益开放式数据库.xlsx`      | Input spreadsheet            |
//! | `SHEET_NAME`  | *(first sheet)*                | Worksheet to read            |
//! | `BATCH_SIZE`  | `10`                           | Rows per batch               |
//! | `BATCH_DELAY` | `0`                            | Seconds to sleep between batches |
//! | `DRY_RUN`     | `false`                        | Simulate, no remote mutation |
//! | `MAX_ROWS`    | `0`                            | Row cap (0 = unlimited)      |

use std::env;
use std::path::{Path, PathBuf};

use crate::error::{ConfigError, ConfigResult};

/// Default Strapi server address.
const DEFAULT_STRAPI_URL: &str = "http://localhost:1337";

/// Default input workbook.
const DEFAULT_EXCEL_FILE: &str = "教育公益开放式数据库.xlsx";

/// Default batch size.
const DEFAULT_BATCH_SIZE: usize = 10;

/// Explicit runtime configuration; passed into the client and the importer
/// at startup instead of living in an ambient global.
#[derive(Debug, Clone)]
pub struct Config {
    pub strapi_url: String,
    pub strapi_token: String,
    pub excel_file: PathBuf,
    /// `None` means "use the first sheet".
    pub sheet_name: Option<String>,
    pub batch_size: usize,
    /// Seconds to sleep between batches (throttling).
    pub batch_delay_secs: u64,
    pub dry_run: bool,
    /// Stop after this many rows; 0 imports everything.
    pub max_rows: usize,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            strapi_url: DEFAULT_STRAPI_URL.to_string(),
            strapi_token: String::new(),
            excel_file: PathBuf::from(DEFAULT_EXCEL_FILE),
            sheet_name: None,
            batch_size: DEFAULT_BATCH_SIZE,
            batch_delay_secs: 0,
            dry_run: false,
            max_rows: 0,
        }
    }
}

impl Config {
    /// Load configuration from the process environment.
    pub fn from_env() -> ConfigResult<Self> {
        let defaults = Config::default();

        Ok(Self {
            strapi_url: env::var("STRAPI_URL").unwrap_or(defaults.strapi_url),
            strapi_token: env::var("STRAPI_TOKEN").unwrap_or_default(),
            excel_file: env::var("EXCEL_FILE")
                .map(PathBuf::from)
                .unwrap_or(defaults.excel_file),
            sheet_name: env::var("SHEET_NAME").ok().filter(|s| !s.is_empty()),
            batch_size: parse_var("BATCH_SIZE", DEFAULT_BATCH_SIZE)?,
            batch_delay_secs: parse_var("BATCH_DELAY", 0)?,
            dry_run: env::var("DRY_RUN").map(|v| v == "true").unwrap_or(false),
            max_rows: parse_var("MAX_ROWS", 0)?,
        })
    }

    /// Validate the configuration before any row is touched.
    ///
    /// A missing token is only acceptable in dry-run mode; the input
    /// file must exist either way.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.strapi_token.is_empty() && !self.dry_run {
            return Err(ConfigError::MissingToken);
        }
        if !Path::new(&self.excel_file).exists() {
            return Err(ConfigError::MissingInputFile(
                self.excel_file.display().to_string(),
            ));
        }
        Ok(())
    }
}

/// Parse a numeric environment variable, falling back to a default when unset.
fn parse_var<T: std::str::FromStr>(name: &str, default: T) -> ConfigResult<T> {
    match env::var(name) {
        Ok(raw) => raw.parse().map_err(|_| ConfigError::InvalidValue {
            name: name.to_string(),
            value: raw,
        }),
        Err(_) => Ok(default),
    }
}
