//! Spreadsheet reading: maps workbook rows onto typed report rows by
//! header name. The reports come with exact Cyrillic column headers and the
//! column order is not guaranteed, so every field is resolved through the
//! header row rather than by position.

use std::collections::HashMap;
use std::path::Path;

use calamine::{open_workbook_auto, Data, Range, Reader};
use log::warn;

use crate::error_handling::types::ImportError;
use crate::import::rows::{DetailedRow, IntegralRow};

pub const COL_SID: &str = "Процесс sid";
pub const COL_PROCESS_NAME: &str = "Наименование процесса";
pub const COL_RISK_LABEL: &str = "Метка риска";
pub const COL_OWNER_BLOCK: &str = "Блок - владелец процесса";
pub const COL_DEPARTMENT: &str = "Подразделение";
pub const COL_RATING: &str = "Рейтинг";
pub const COL_THREAT_TYPE: &str = "Тип угрозы";
pub const COL_THREAT_SCENARIO: &str = "Сценарий угрозы";
pub const COL_INTEGRAL_LEVEL: &str = "Итоговый интегральный уровень риска процесса";
pub const COL_HIGHEST_LEVEL: &str = "Уровень наиболее высокого риска процесса /угрозы";
pub const COL_HIGH_RISK_COUNT: &str = "Количество высоких рисков (числитель метки)";
pub const COL_TOTAL_RISK_COUNT: &str = "Количество рисков (знаменатель метки)";
pub const COL_PROCESS_THREAT_RATING: &str =
    "Рейтинг процесса для угрозы = по максимальным рискам =";
pub const COL_AS_RESERVED: &str = "АС зарезервирована в РЦОД";
pub const COL_AS_RESERVED_COMMENT: &str = "АС зарезервирована в РЦОД (комментарий)";

pub const COL_IMPACT_TYPE: &str = "Тип влияния";
pub const COL_RISK_SUBCATEGORY: &str = "Подкатегория риска";
pub const COL_RISK_GROUP: &str = "Группа риска";
pub const COL_RISK_SUBGROUP: &str = "Подгруппа риска";
pub const COL_ASSESSMENT_RESULT: &str = "Результат оценки рисков";
pub const COL_THREAT_RATING: &str = "Рейтинг угрозы";
pub const COL_REPUTATIONAL_RISK: &str = "Репутационный риск";
pub const COL_REGULATORY_RISK: &str = "Регуляторный риск";
pub const COL_FINANCIAL_RISK: &str = "Финансовый риск";
pub const COL_RISK_IMPACT: &str = "Воздействие риска";
pub const COL_PROBABILITY: &str = "Оценка вероятности";
pub const COL_CONTROL: &str = "Оценка контроля";
pub const COL_RTO: &str = "RTO процесса, ч.";
pub const COL_MTPD: &str = "MTPD процесса";
pub const COL_TR: &str = "TR";
pub const COL_EXPLANATION: &str = "Автопояснение по результату оценки рисков";

/// Header-name to column-index lookup built from the first sheet row.
pub struct HeaderMap {
    columns: HashMap<String, usize>,
}

impl HeaderMap {
    pub fn from_row(header_row: &[Data]) -> Self {
        let mut columns = HashMap::new();
        for (index, cell) in header_row.iter().enumerate() {
            let name = cell_to_string(cell);
            if !name.is_empty() {
                // First occurrence wins on duplicate headers.
                columns.entry(name).or_insert(index);
            }
        }
        Self { columns }
    }

    /// Cleaned cell value under the named header, empty when the column or
    /// the cell is absent (missing columns behave like all-empty ones).
    pub fn field(&self, row: &[Data], name: &str) -> String {
        self.columns
            .get(name)
            .and_then(|&index| row.get(index))
            .map(cell_to_string)
            .unwrap_or_default()
    }

    pub fn has(&self, name: &str) -> bool {
        self.columns.contains_key(name)
    }
}

/// Renders a cell the way the reports are keyed: trimmed text, whole
/// numbers without a decimal tail (SIDs and counts are often numeric cells).
pub fn cell_to_string(cell: &Data) -> String {
    match cell {
        Data::String(s) => s.trim().to_string(),
        Data::Float(f) => render_float(*f),
        Data::Int(i) => i.to_string(),
        Data::Bool(b) => b.to_string(),
        Data::DateTime(dt) => render_float(dt.as_f64()),
        Data::DateTimeIso(s) | Data::DurationIso(s) => s.trim().to_string(),
        Data::Error(_) | Data::Empty => String::new(),
    }
}

fn render_float(f: f64) -> String {
    if f.fract() == 0.0 && f.abs() < 1e15 {
        format!("{}", f as i64)
    } else {
        f.to_string()
    }
}

pub fn load_integral_rows(path: &Path) -> Result<Vec<IntegralRow>, ImportError> {
    let range = first_sheet(path)?;
    let mut rows_iter = range.rows();
    let headers = match rows_iter.next() {
        Some(header_row) => HeaderMap::from_row(header_row),
        None => return Ok(Vec::new()),
    };
    require_sid_column(&headers, path)?;
    warn_missing(&headers, path, &[COL_THREAT_TYPE, COL_THREAT_SCENARIO, COL_INTEGRAL_LEVEL]);

    let mut rows = Vec::new();
    for row in rows_iter {
        rows.push(IntegralRow {
            process_sid: headers.field(row, COL_SID),
            process_name: headers.field(row, COL_PROCESS_NAME),
            risk_label: headers.field(row, COL_RISK_LABEL),
            owner_block: headers.field(row, COL_OWNER_BLOCK),
            department: headers.field(row, COL_DEPARTMENT),
            rating: headers.field(row, COL_RATING),
            threat_type: headers.field(row, COL_THREAT_TYPE),
            threat_scenario: headers.field(row, COL_THREAT_SCENARIO),
            integral_risk_level: headers.field(row, COL_INTEGRAL_LEVEL),
            highest_risk_level: headers.field(row, COL_HIGHEST_LEVEL),
            high_risk_count: headers.field(row, COL_HIGH_RISK_COUNT),
            total_risk_count: headers.field(row, COL_TOTAL_RISK_COUNT),
            process_threat_rating: headers.field(row, COL_PROCESS_THREAT_RATING),
            as_reserved: headers.field(row, COL_AS_RESERVED),
            as_reserved_comment: headers.field(row, COL_AS_RESERVED_COMMENT),
        });
    }
    Ok(rows)
}

pub fn load_detailed_rows(path: &Path) -> Result<Vec<DetailedRow>, ImportError> {
    let range = first_sheet(path)?;
    let mut rows_iter = range.rows();
    let headers = match rows_iter.next() {
        Some(header_row) => HeaderMap::from_row(header_row),
        None => return Ok(Vec::new()),
    };
    require_sid_column(&headers, path)?;
    warn_missing(&headers, path, &[COL_THREAT_TYPE, COL_THREAT_SCENARIO, COL_ASSESSMENT_RESULT]);

    let mut rows = Vec::new();
    for row in rows_iter {
        rows.push(DetailedRow {
            process_sid: headers.field(row, COL_SID),
            process_name: headers.field(row, COL_PROCESS_NAME),
            threat_type: headers.field(row, COL_THREAT_TYPE),
            threat_scenario: headers.field(row, COL_THREAT_SCENARIO),
            impact_type: headers.field(row, COL_IMPACT_TYPE),
            risk_subcategory: headers.field(row, COL_RISK_SUBCATEGORY),
            risk_group: headers.field(row, COL_RISK_GROUP),
            risk_subgroup: headers.field(row, COL_RISK_SUBGROUP),
            assessment_result: headers.field(row, COL_ASSESSMENT_RESULT),
            threat_rating: headers.field(row, COL_THREAT_RATING),
            reputational_risk: headers.field(row, COL_REPUTATIONAL_RISK),
            regulatory_risk: headers.field(row, COL_REGULATORY_RISK),
            financial_risk: headers.field(row, COL_FINANCIAL_RISK),
            risk_impact: headers.field(row, COL_RISK_IMPACT),
            probability_assessment: headers.field(row, COL_PROBABILITY),
            control_assessment: headers.field(row, COL_CONTROL),
            risk_label: headers.field(row, COL_RISK_LABEL),
            rto_hours: headers.field(row, COL_RTO),
            mtpd: headers.field(row, COL_MTPD),
            tr: headers.field(row, COL_TR),
            explanation: headers.field(row, COL_EXPLANATION),
            as_reserved: headers.field(row, COL_AS_RESERVED),
        });
    }
    Ok(rows)
}

fn first_sheet(path: &Path) -> Result<Range<Data>, ImportError> {
    let mut workbook = open_workbook_auto(path)
        .map_err(|e| ImportError::WorkbookError(format!("{}: {}", path.display(), e)))?;
    workbook
        .worksheet_range_at(0)
        .ok_or_else(|| ImportError::WorkbookError(format!("{}: workbook has no sheets", path.display())))?
        .map_err(|e| ImportError::WorkbookError(format!("{}: {}", path.display(), e)))
}

fn require_sid_column(headers: &HeaderMap, path: &Path) -> Result<(), ImportError> {
    if headers.has(COL_SID) {
        Ok(())
    } else {
        Err(ImportError::MissingColumn(format!(
            "{} in {}",
            COL_SID,
            path.display()
        )))
    }
}

fn warn_missing(headers: &HeaderMap, path: &Path, expected: &[&str]) {
    for name in expected {
        if !headers.has(name) {
            warn!("{}: column {:?} not found, fields default to empty", path.display(), name);
        }
    }
}
