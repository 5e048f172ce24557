use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, optional_str, required_i64, required_str};
use crate::ipc::types::{AppState, Request};
use crate::report::{self, ReportOptions};
use crate::results::{self, Lookup, StoredDiagnostic};
use chrono::Local;
use serde_json::json;
use std::path::PathBuf;

/// Either a stored diagnostic by audit number or an inline results object.
fn load_diagnostic(state: &AppState, req: &Request) -> Result<StoredDiagnostic, serde_json::Value> {
    if let Some(inline) = req.params.get("results") {
        let audit_number = inline
            .get("auditNumber")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| err(&req.id, "bad_params", "missing results.auditNumber", None))?;
        let completed_at = inline
            .get("completedAt")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        return results::from_answers(inline, audit_number, "", completed_at).ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                "results need categoryScores or responses",
                None,
            )
        });
    }

    let conn = db_conn(state, req)?;
    let audit_number = required_i64(req, "auditNumber")?;
    match results::lookup(conn, audit_number) {
        Ok(Lookup::Found(d)) => Ok(d),
        Ok(Lookup::Missing) | Ok(Lookup::Unreadable) => Err(err(
            &req.id,
            "not_found",
            "no diagnostic with that audit number",
            Some(json!({ "auditNumber": audit_number })),
        )),
        Err(e) => Err(err(&req.id, "db_query_failed", e.to_string(), None)),
    }
}

fn handle_diagnostic_pdf(state: &mut AppState, req: &Request) -> serde_json::Value {
    let out_dir = match required_str(req, "outDir") {
        Ok(v) => PathBuf::from(v),
        Err(e) => return e,
    };
    let diagnostic = match load_diagnostic(state, req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    let opts = ReportOptions {
        out_dir,
        template: optional_str(req, "templatePath")
            .map(PathBuf::from)
            .or_else(|| state.config.report_template.clone()),
        font: optional_str(req, "fontPath")
            .map(PathBuf::from)
            .or_else(|| state.config.report_font.clone()),
    };
    let today = Local::now().date_naive();
    match report::generate_diagnostic_pdf(&diagnostic.to_report(today), &opts) {
        Ok(out) => ok(
            &req.id,
            json!({
                "path": out.path.to_string_lossy(),
                "fileName": out.file_name,
                "pageCount": out.page_count,
                "byteLen": out.byte_len,
                "auditNumber": diagnostic.audit_number,
            }),
        ),
        Err(e) => {
            log::error!("diagnostic report failed: {} ({})", e.message, e.code);
            err(&req.id, e.code, e.message, None)
        }
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "reports.diagnosticPdf" => Some(handle_diagnostic_pdf(state, req)),
        _ => None,
    }
}
