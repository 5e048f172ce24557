use crate::admin::parse_maybe_json;
use crate::catalog::{self, BandLevel, CategoryId, Interpretation, DIAGNOSTIC_DEPARTMENT};
use crate::db::{self, StoredResponse};
use crate::report::DiagnosticReport;
use crate::scoring::{self, CategoryScores};
use crate::session::{format_audit_number, ContactInfo};
use chrono::{DateTime, NaiveDate};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;

/// A diagnostic submission read back from storage.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredDiagnostic {
    pub response_id: String,
    pub audit_number: i64,
    pub audit_number_formatted: String,
    pub total_score: u8,
    pub category_scores: CategoryScores,
    pub average_score: f64,
    pub warnings: Vec<CategoryId>,
    pub interpretation: Interpretation,
    pub contact_info: ContactInfo,
    pub completed_at: String,
}

/// Stored level first, then stored title, then the band for the total.
fn resolve_interpretation(answers: &Value, total: u8) -> Interpretation {
    if let Some(level) = answers
        .get("level")
        .and_then(|v| v.as_str())
        .and_then(BandLevel::parse)
    {
        return catalog::interpretation_for(level);
    }
    if let Some(title) = answers.get("interpretation").and_then(|v| v.as_str()) {
        if let Some(i) = catalog::interpretations()
            .into_iter()
            .find(|i| i.title == title)
        {
            return i;
        }
    }
    catalog::interpretation_for(scoring::band_for_total(total))
}

fn stored_scores(answers: &Value) -> Option<CategoryScores> {
    if let Some(scores) = answers
        .get("categoryScores")
        .and_then(|v| serde_json::from_value::<CategoryScores>(v.clone()).ok())
    {
        return Some(scores);
    }
    let responses = scoring::parse_responses(answers.get("responses")).ok()?;
    scoring::category_scores(&responses).ok()
}

/// `None` when the row has no audit number or no usable diagnostic payload.
pub fn from_row(row: &StoredResponse) -> Option<StoredDiagnostic> {
    let audit_number = row.audit_number?;
    let answers = parse_maybe_json(&Value::String(row.answers.clone()));
    from_answers(&answers, audit_number, &row.id, &row.completed_at)
}

/// Reads `{categoryScores | responses, totalScore?, level?, interpretation?,
/// contactInfo?}`.
pub fn from_answers(
    answers: &Value,
    audit_number: i64,
    response_id: &str,
    completed_at: &str,
) -> Option<StoredDiagnostic> {
    if !answers.is_object() {
        return None;
    }
    let category_scores = stored_scores(answers)?;
    let total_score = answers
        .get("totalScore")
        .and_then(|v| v.as_u64())
        .map(|t| t.min(scoring::MAX_TOTAL_SCORE as u64) as u8)
        .unwrap_or_else(|| category_scores.total());
    let contact_info = answers
        .get("contactInfo")
        .and_then(|v| serde_json::from_value::<ContactInfo>(v.clone()).ok())
        .unwrap_or_default();
    Some(StoredDiagnostic {
        response_id: response_id.to_string(),
        audit_number,
        audit_number_formatted: format_audit_number(audit_number),
        total_score,
        average_score: category_scores.average(),
        warnings: category_scores.warnings(),
        interpretation: resolve_interpretation(answers, total_score),
        category_scores,
        contact_info,
        completed_at: completed_at.to_string(),
    })
}

#[derive(Debug)]
pub enum Lookup {
    Found(StoredDiagnostic),
    Missing,
    Unreadable,
}

pub fn lookup(conn: &Connection, audit_number: i64) -> anyhow::Result<Lookup> {
    let Some(row) = db::find_by_audit_number(conn, audit_number, DIAGNOSTIC_DEPARTMENT)? else {
        return Ok(Lookup::Missing);
    };
    Ok(match from_row(&row) {
        Some(d) => Lookup::Found(d),
        None => {
            log::warn!("audit {} has an unreadable payload", audit_number);
            Lookup::Unreadable
        }
    })
}

impl StoredDiagnostic {
    pub fn to_report(&self, generated_on: NaiveDate) -> DiagnosticReport {
        let completed_on = DateTime::parse_from_rfc3339(&self.completed_at)
            .map(|d| d.date_naive())
            .unwrap_or(generated_on);
        DiagnosticReport {
            audit_number: self.audit_number,
            completed_on,
            generated_on,
            total_score: self.total_score,
            category_scores: self.category_scores,
            interpretation: self.interpretation.clone(),
            contact: self.contact_info.clone(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn row(answers: Value) -> StoredResponse {
        StoredResponse {
            id: "r1".into(),
            department: DIAGNOSTIC_DEPARTMENT.into(),
            position: "diagnostic".into(),
            questions: "[]".into(),
            answers: answers.to_string(),
            completed_at: "2025-03-04T10:20:30+00:00".into(),
            created_at: "2025-03-04T10:20:30+00:00".into(),
            archived: Some(false),
            audit_number: Some(3),
        }
    }

    #[test]
    fn stored_level_wins_over_title() {
        let r = row(json!({
            "totalScore": 12,
            "categoryScores": { "data": 3, "processes": 3, "people": 3, "results": 3 },
            "interpretation": "Зона готовности",
            "level": "preparation",
            "contactInfo": { "name": "Анна", "email": "a@b.c" }
        }));
        let d = from_row(&r).expect("diagnostic");
        assert_eq!(d.interpretation.level, BandLevel::Preparation);
        assert_eq!(d.audit_number_formatted, "000003");
        assert_eq!(d.contact_info.name, "Анна");
        assert!(!d.contact_info.wants_deep_audit);
    }

    #[test]
    fn title_then_total_are_fallbacks() {
        let by_title = row(json!({
            "totalScore": 12,
            "categoryScores": { "data": 3, "processes": 3, "people": 3, "results": 3 },
            "interpretation": "Зона высокого риска"
        }));
        assert_eq!(
            from_row(&by_title).expect("diagnostic").interpretation.level,
            BandLevel::HighRisk
        );

        let by_total = row(json!({
            "responses": [
                { "questionId": 1, "rating": 5 },
                { "questionId": 5, "rating": 5 },
                { "questionId": 9, "rating": 5 },
                { "questionId": 13, "rating": 5 }
            ]
        }));
        let d = from_row(&by_total).expect("diagnostic");
        assert_eq!(d.total_score, 20);
        assert_eq!(d.interpretation.level, BandLevel::Ready);
    }

    #[test]
    fn report_uses_completion_date() {
        let r = row(json!({
            "totalScore": 12,
            "categoryScores": { "data": 3, "processes": 3, "people": 3, "results": 3 }
        }));
        let today = NaiveDate::from_ymd_opt(2025, 5, 1).expect("date");
        let report = from_row(&r).expect("diagnostic").to_report(today);
        assert_eq!(report.completed_on, NaiveDate::from_ymd_opt(2025, 3, 4).expect("date"));
        assert_eq!(report.generated_on, today);
    }

    #[test]
    fn survey_rows_are_not_diagnostics() {
        let mut r = row(json!([{ "questionText": "Q", "answer": "A" }]));
        assert!(from_row(&r).is_none());
        r.audit_number = None;
        assert!(from_row(&r).is_none());
    }
}
