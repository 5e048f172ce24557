use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{db_conn, required_i64};
use crate::ipc::types::{AppState, Request};
use crate::results::{self, Lookup};
use serde_json::json;

fn handle_results_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let audit_number = match required_i64(req, "auditNumber") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match results::lookup(conn, audit_number) {
        Ok(Lookup::Found(d)) => ok(&req.id, json!(d)),
        Ok(Lookup::Missing) => err(
            &req.id,
            "not_found",
            "no diagnostic with that audit number",
            Some(json!({ "auditNumber": audit_number })),
        ),
        Ok(Lookup::Unreadable) => err(
            &req.id,
            "not_found",
            "stored diagnostic could not be read",
            Some(json!({ "auditNumber": audit_number })),
        ),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "results.get" => Some(handle_results_get(state, req)),
        _ => None,
    }
}
