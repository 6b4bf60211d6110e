//! Excel reading with loose-typed row access.
//!
//! The input workbook has a header row of Chinese field labels; every
//! following row becomes an [`ExcelRow`]: an ordered map from label to a
//! loosely-typed cell value. Absent cells are a valid, expected state,
//! so all accessors return `Option`.

use calamine::{open_workbook, Data, Reader, Xlsx};
use serde_json::{json, Map, Value};
use std::path::Path;

use crate::error::{ExcelError, ExcelResult};
use crate::logs::{log_info, log_success};

// =============================================================================
// Excel Row
// =============================================================================

/// One spreadsheet row, keyed by header label.
///
/// Immutable once read; the transform stage only ever reads from it.
#[derive(Debug, Clone)]
pub struct ExcelRow {
    fields: Map<String, Value>,
}

impl ExcelRow {
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Raw cell value for a label.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Cell value rendered as trimmed text. Integral numbers render without
    /// a decimal point (Excel stores most numerals as floats). Empty cells
    /// and whitespace-only strings are `None`.
    pub fn text(&self, key: &str) -> Option<String> {
        let rendered = match self.fields.get(key)? {
            Value::String(s) => s.trim().to_string(),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    i.to_string()
                } else {
                    n.to_string()
                }
            }
            Value::Bool(b) => b.to_string(),
            _ => return None,
        };
        if rendered.is_empty() {
            None
        } else {
            Some(rendered)
        }
    }

    /// First non-empty text value among several candidate labels
    /// (Chinese label first, then English alias).
    pub fn text_any(&self, keys: &[&str]) -> Option<String> {
        keys.iter().find_map(|key| self.text(key))
    }

    /// Whether a cell holds the affirmative marker `是`.
    pub fn is_yes(&self, key: &str) -> bool {
        self.text(key).as_deref() == Some("是")
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// =============================================================================
// Cell Conversion
// =============================================================================

/// Convert an Excel cell to a JSON value. Empty strings and error cells
/// become null; whole-number floats become integers so day-serial dates
/// and counts keep their exact value.
fn cell_to_value(cell: &Data) -> Value {
    match cell {
        Data::Empty => Value::Null,
        Data::String(s) if s.trim().is_empty() => Value::Null,
        Data::String(s) => Value::String(s.clone()),
        Data::Int(i) => json!(*i),
        Data::Float(f) => {
            if f.fract() == 0.0 && *f >= i64::MIN as f64 && *f <= i64::MAX as f64 {
                json!(*f as i64)
            } else {
                json!(*f)
            }
        }
        Data::Bool(b) => Value::Bool(*b),
        Data::DateTime(dt) => Value::String(format!("{}", dt)),
        Data::DateTimeIso(s) => Value::String(s.clone()),
        Data::DurationIso(s) => Value::String(s.clone()),
        Data::Error(_) => Value::Null,
    }
}

// =============================================================================
// Workbook Reading
// =============================================================================

/// Read one sheet of a workbook into rows.
///
/// With `sheet_name = None` the first sheet is used; a named sheet that is
/// not present is an error. The first row is the header; rows whose every
/// cell is empty are dropped.
pub fn read_excel_file(path: &Path, sheet_name: Option<&str>) -> ExcelResult<Vec<ExcelRow>> {
    log_info(format!("读取 Excel 文件: {}", path.display()));

    let mut workbook: Xlsx<_> = open_workbook(path)?;
    let sheet_names: Vec<String> = workbook.sheet_names().to_vec();

    if sheet_names.is_empty() {
        return Err(ExcelError::NoSheets);
    }
    log_info(format!("发现工作表: {}", sheet_names.join(", ")));

    let target = match sheet_name {
        Some(name) => {
            if !sheet_names.iter().any(|s| s == name) {
                return Err(ExcelError::SheetNotFound(name.to_string()));
            }
            name.to_string()
        }
        None => sheet_names[0].clone(),
    };
    log_info(format!("使用工作表: {}", target));

    let range = workbook.worksheet_range(&target)?;
    let mut rows_iter = range.rows();

    let headers: Vec<String> = match rows_iter.next() {
        Some(header_row) => header_row
            .iter()
            .map(|c| match c {
                Data::String(s) => s.to_string(),
                other => cell_to_value(other)
                    .as_str()
                    .map(str::to_string)
                    .unwrap_or_default(),
            })
            .collect(),
        None => return Err(ExcelError::NoHeaders(target)),
    };

    let mut rows = Vec::new();
    for row in rows_iter {
        let mut fields = Map::new();
        for (i, cell) in row.iter().enumerate() {
            let header = match headers.get(i) {
                Some(h) if !h.is_empty() => h,
                _ => continue,
            };
            let value = cell_to_value(cell);
            if value.is_null() {
                continue;
            }
            fields.insert(header.clone(), value);
        }
        if !fields.is_empty() {
            rows.push(ExcelRow::new(fields));
        }
    }

    log_success(format!("成功读取 {} 行数据", rows.len()));
    if let Some(first) = rows.first() {
        log_info(format!("数据字段: {} 个", first.len()));
    }

    Ok(rows)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(pairs: &[(&str, Value)]) -> ExcelRow {
        let mut map = Map::new();
        for (k, v) in pairs {
            map.insert(k.to_string(), v.clone());
        }
        ExcelRow::new(map)
    }

    #[test]
    fn test_cell_to_value() {
        assert_eq!(cell_to_value(&Data::Empty), Value::Null);
        assert_eq!(cell_to_value(&Data::String("  ".into())), Value::Null);
        assert_eq!(
            cell_to_value(&Data::String("北京".into())),
            json!("北京")
        );
        assert_eq!(cell_to_value(&Data::Float(44000.0)), json!(44000));
        assert_eq!(cell_to_value(&Data::Float(1.5)), json!(1.5));
        assert_eq!(cell_to_value(&Data::Int(7)), json!(7));
    }

    #[test]
    fn test_text_renders_numbers_without_decimal() {
        let r = row(&[("成立时间", json!(44000))]);
        assert_eq!(r.text("成立时间").as_deref(), Some("44000"));
    }

    #[test]
    fn test_text_any_prefers_first_key() {
        let r = row(&[("name", json!("English")), ("常用名称", json!("中文"))]);
        assert_eq!(r.text_any(&["常用名称", "name"]).as_deref(), Some("中文"));

        let r = row(&[("name", json!("English"))]);
        assert_eq!(
            r.text_any(&["常用名称", "name"]).as_deref(),
            Some("English")
        );
    }

    #[test]
    fn test_is_yes() {
        let r = row(&[("关于人群类服务对象服务全部人群", json!("是"))]);
        assert!(r.is_yes("关于人群类服务对象服务全部人群"));
        assert!(!r.is_yes("不存在的字段"));
    }
}
