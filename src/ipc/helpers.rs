use crate::admin;
use crate::ipc::error::err;
use crate::ipc::types::{AppState, Request};
use rusqlite::Connection;
use serde_json::json;

pub fn required_str(req: &Request, key: &str) -> Result<String, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|v| v.to_string())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing params.{}", key), None))
}

pub fn optional_str(req: &Request, key: &str) -> Option<String> {
    req.params
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

pub fn required_bool(req: &Request, key: &str) -> Result<bool, serde_json::Value> {
    req.params
        .get(key)
        .and_then(|v| v.as_bool())
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing params.{}", key), None))
}

pub fn required_i64(req: &Request, key: &str) -> Result<i64, serde_json::Value> {
    let v = req.params.get(key);
    // Audit numbers arrive as numbers or as the zero-padded string.
    v.and_then(|v| v.as_i64())
        .or_else(|| v.and_then(|v| v.as_str()).and_then(|s| s.trim().parse().ok()))
        .ok_or_else(|| err(&req.id, "bad_params", format!("missing params.{}", key), None))
}

pub fn string_list(req: &Request, key: &str) -> Result<Vec<String>, serde_json::Value> {
    let Some(arr) = req.params.get(key).and_then(|v| v.as_array()) else {
        return Err(err(&req.id, "bad_params", format!("params.{} must be an array", key), None));
    };
    let mut out = Vec::with_capacity(arr.len());
    for (i, v) in arr.iter().enumerate() {
        let Some(s) = v.as_str() else {
            return Err(err(
                &req.id,
                "bad_params",
                format!("params.{} must contain strings", key),
                Some(json!({ "index": i })),
            ));
        };
        out.push(s.to_string());
    }
    Ok(out)
}

pub fn db_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, serde_json::Value> {
    state
        .db
        .as_ref()
        .ok_or_else(|| err(&req.id, "no_workspace", "select a workspace first", None))
}

/// Workspace connection, only while the admin flag is set.
pub fn admin_conn<'a>(state: &'a AppState, req: &Request) -> Result<&'a Connection, serde_json::Value> {
    let conn = db_conn(state, req)?;
    match admin::is_authorized(conn, &state.config.admin_password) {
        Ok(true) => Ok(conn),
        Ok(false) => Err(err(&req.id, "unauthorized", "admin login required", None)),
        Err(e) => Err(err(&req.id, "db_query_failed", e.to_string(), None)),
    }
}
