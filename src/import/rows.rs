//! Typed report rows and the text normalization rules applied to them.
//!
//! Both source reports arrive with free-form spreadsheet values. Display
//! fields keep their trimmed original casing; key fields are additionally
//! lowercased so the two reports join on the same
//! (SID, type, scenario) tuple regardless of case drift between them.

use log::warn;

/// Colors for rating labels, matched by substring in this priority order.
const RATING_COLORS: [(&str, &str); 4] = [
    ("критический", "#dc3545"),
    ("высокий", "#ffc107"),
    ("средний", "#fd7e14"),
    ("низкий", "#28a745"),
];

/// Fallback color when no rating vocabulary matches.
pub const DEFAULT_COLOR: &str = "#6c757d";

pub const RESERVED_YES: &str = "да";
pub const RESERVED_NO: &str = "нет";
pub const RESERVED_UNKNOWN: &str = "нет данных";

/// One row of the integral risk rating report, cleaned but not lowercased.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct IntegralRow {
    pub process_sid: String,
    pub process_name: String,
    pub risk_label: String,
    pub owner_block: String,
    pub department: String,
    pub rating: String,
    pub threat_type: String,
    pub threat_scenario: String,
    pub integral_risk_level: String,
    pub highest_risk_level: String,
    pub high_risk_count: String,
    pub total_risk_count: String,
    pub process_threat_rating: String,
    pub as_reserved: String,
    pub as_reserved_comment: String,
}

/// One row of the detailed risk calculation report, cleaned but not lowercased.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetailedRow {
    pub process_sid: String,
    pub process_name: String,
    pub threat_type: String,
    pub threat_scenario: String,
    pub impact_type: String,
    pub risk_subcategory: String,
    pub risk_group: String,
    pub risk_subgroup: String,
    pub assessment_result: String,
    pub threat_rating: String,
    pub reputational_risk: String,
    pub regulatory_risk: String,
    pub financial_risk: String,
    pub risk_impact: String,
    pub probability_assessment: String,
    pub control_assessment: String,
    pub risk_label: String,
    pub rto_hours: String,
    pub mtpd: String,
    pub tr: String,
    pub explanation: String,
    pub as_reserved: String,
}

impl IntegralRow {
    /// Join key shared with the detailed report.
    pub fn key(&self) -> (String, String, String) {
        (
            self.process_sid.clone(),
            normalize_text(&self.threat_type),
            normalize_text(&self.threat_scenario),
        )
    }

    /// Reservation flag with the comment-column fallback: when the primary
    /// column yields no data and the comment is non-empty, the comment is
    /// normalized instead.
    pub fn reserved_flag(&self) -> String {
        let primary = normalize_reserved_flag(&self.as_reserved);
        if primary == RESERVED_UNKNOWN && !self.as_reserved_comment.trim().is_empty() {
            return normalize_reserved_flag(&self.as_reserved_comment);
        }
        primary
    }
}

impl DetailedRow {
    pub fn key(&self) -> (String, String, String) {
        (
            self.process_sid.clone(),
            normalize_text(&self.threat_type),
            normalize_text(&self.threat_scenario),
        )
    }
}

/// Trims a display value.
pub fn clean_value(value: &str) -> String {
    value.trim().to_string()
}

/// Lowercased trim, used for key comparisons only.
pub fn normalize_text(value: &str) -> String {
    value.trim().to_lowercase()
}

/// Maps the RCOD reservation vocabulary onto its three logical states.
pub fn normalize_reserved_flag(value: &str) -> String {
    match value.trim().to_lowercase().as_str() {
        "в плане" => RESERVED_YES.to_string(),
        "не в плане" => RESERVED_NO.to_string(),
        _ => RESERVED_UNKNOWN.to_string(),
    }
}

/// Display color for a rating label: case-insensitive substring match in
/// fixed priority order, first match wins.
pub fn color_for_rating(rating: &str) -> &'static str {
    let rating = rating.to_lowercase();
    for (needle, color) in RATING_COLORS {
        if rating.contains(needle) {
            return color;
        }
    }
    DEFAULT_COLOR
}

/// Parses the process rating. Empty or malformed values default to 0.0 and
/// are reported as a warning so the bad cell can be traced to its SID.
pub fn parse_rating(sid: &str, raw: &str) -> (f64, bool) {
    let raw = raw.trim();
    if raw.is_empty() {
        return (0.0, false);
    }
    match raw.parse::<f64>() {
        Ok(value) => (value, false),
        Err(_) => {
            warn!("Process {}: unparseable rating {:?}, defaulting to 0", sid, raw);
            (0.0, true)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_and_normalize() {
        assert_eq!(clean_value("  Отказ ЦОД  "), "Отказ ЦОД");
        assert_eq!(normalize_text("  Отказ ЦОД "), "отказ цод");
        assert_eq!(normalize_text(""), "");
    }

    #[test]
    fn test_reserved_flag_vocabulary() {
        assert_eq!(normalize_reserved_flag("В плане"), "да");
        assert_eq!(normalize_reserved_flag("  в ПЛАНЕ "), "да");
        assert_eq!(normalize_reserved_flag("Не в плане"), "нет");
        assert_eq!(normalize_reserved_flag(""), "нет данных");
        assert_eq!(normalize_reserved_flag("что-то ещё"), "нет данных");
    }

    #[test]
    fn test_reserved_flag_comment_fallback() {
        let row = IntegralRow {
            as_reserved: String::new(),
            as_reserved_comment: "В плане".into(),
            ..IntegralRow::default()
        };
        assert_eq!(row.reserved_flag(), "да");

        let row = IntegralRow {
            as_reserved: "Не в плане".into(),
            as_reserved_comment: "В плане".into(),
            ..IntegralRow::default()
        };
        // Primary column answered, comment is ignored.
        assert_eq!(row.reserved_flag(), "нет");

        let row = IntegralRow {
            as_reserved: String::new(),
            as_reserved_comment: "неизвестно".into(),
            ..IntegralRow::default()
        };
        assert_eq!(row.reserved_flag(), "нет данных");
    }

    #[test]
    fn test_color_priority_order() {
        assert_eq!(color_for_rating("Критический риск"), "#dc3545");
        assert_eq!(color_for_rating("ВЫСОКИЙ"), "#ffc107");
        assert_eq!(color_for_rating("средний риск"), "#fd7e14");
        assert_eq!(color_for_rating("низкий"), "#28a745");
        assert_eq!(color_for_rating("нет оценки"), DEFAULT_COLOR);
        assert_eq!(color_for_rating(""), DEFAULT_COLOR);
        // Both substrings present: "критический" is checked first.
        assert_eq!(color_for_rating("Критический/Высокий"), "#dc3545");
    }

    #[test]
    fn test_parse_rating() {
        assert_eq!(parse_rating("P1", "4.5"), (4.5, false));
        assert_eq!(parse_rating("P1", " 3 "), (3.0, false));
        assert_eq!(parse_rating("P1", ""), (0.0, false));
        assert_eq!(parse_rating("P1", "n/a"), (0.0, true));
    }

    #[test]
    fn test_join_key_case_insensitive() {
        let integral = IntegralRow {
            process_sid: "P1".into(),
            threat_type: "Отказ ИТ-систем".into(),
            threat_scenario: "Отказ ЦОД".into(),
            ..IntegralRow::default()
        };
        let detailed = DetailedRow {
            process_sid: "P1".into(),
            threat_type: "ОТКАЗ ИТ-СИСТЕМ".into(),
            threat_scenario: "отказ цод ".into(),
            ..DetailedRow::default()
        };
        assert_eq!(integral.key(), detailed.key());
    }
}
