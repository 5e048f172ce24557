use crate::admin::{self, ArchiveFilter};
use crate::db;
use crate::export;
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{admin_conn, db_conn, optional_str, required_bool, required_str, string_list};
use crate::ipc::types::{AppState, Request};
use chrono::Local;
use serde_json::json;
use std::path::PathBuf;

fn parse_filter(req: &Request, default: ArchiveFilter) -> Result<ArchiveFilter, serde_json::Value> {
    match req.params.get("filter").and_then(|v| v.as_str()) {
        None => Ok(default),
        Some(raw) => ArchiveFilter::parse(raw).ok_or_else(|| {
            err(
                &req.id,
                "bad_params",
                "filter must be one of: active, archived, all",
                Some(json!({ "filter": raw })),
            )
        }),
    }
}

fn handle_login(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let attempt = req
        .params
        .get("password")
        .or_else(|| req.params.get("pw"))
        .and_then(|v| v.as_str())
        .unwrap_or("");
    match admin::login(conn, &state.config.admin_password, attempt) {
        Ok(true) => {
            log::info!("admin login accepted");
            ok(&req.id, json!({ "authorized": true }))
        }
        Ok(false) => {
            log::warn!("admin login rejected");
            err(&req.id, "unauthorized", "wrong password", None)
        }
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_logout(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    match admin::logout(conn) {
        Ok(()) => ok(&req.id, json!({ "authorized": false })),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_status(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match db_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    match admin::is_authorized(conn, &state.config.admin_password) {
        Ok(authorized) => ok(&req.id, json!({ "authorized": authorized })),
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn archive_storage(conn: &rusqlite::Connection) -> &'static str {
    match db::responses_have_archived_column(conn) {
        Ok(true) => "column",
        _ => "settings",
    }
}

fn handle_list(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match admin_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let filter = match parse_filter(req, ArchiveFilter::Active) {
        Ok(f) => f,
        Err(e) => return e,
    };
    let department = optional_str(req, "department");
    let views = match admin::load_views(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = admin::filter_views(views, filter, department.as_deref());
    ok(
        &req.id,
        json!({
            "responses": rows,
            "total": rows.len(),
            "archiveStorage": archive_storage(conn),
        }),
    )
}

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match admin_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let id = match required_str(req, "id") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let views = match admin::load_views(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    match views.into_iter().find(|v| v.id == id) {
        Some(v) => ok(&req.id, json!(v)),
        None => err(&req.id, "not_found", "response not found", Some(json!({ "id": id }))),
    }
}

fn handle_set_archived(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match admin_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let id = match required_str(req, "id") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let archived = match required_bool(req, "archived") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match admin::set_archived(conn, &id, archived) {
        Ok(Some(storage)) => ok(
            &req.id,
            json!({ "id": id, "archived": archived, "storage": storage }),
        ),
        Ok(None) => err(&req.id, "not_found", "response not found", Some(json!({ "id": id }))),
        Err(e) => err(&req.id, "db_update_failed", e.to_string(), None),
    }
}

fn handle_bulk_archive(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match admin_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let ids = match string_list(req, "ids") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let archived = match required_bool(req, "archived") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let mut updated = 0usize;
    let mut missing = Vec::new();
    for id in &ids {
        match admin::set_archived(conn, id, archived) {
            Ok(Some(_)) => updated += 1,
            Ok(None) => missing.push(id.clone()),
            Err(e) => {
                return err(
                    &req.id,
                    "db_update_failed",
                    e.to_string(),
                    Some(json!({ "id": id, "updated": updated })),
                )
            }
        }
    }
    ok(
        &req.id,
        json!({
            "updated": updated,
            "missing": missing,
            "archived": archived,
            "storage": archive_storage(conn),
        }),
    )
}

fn handle_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match admin_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let id = match required_str(req, "id") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match admin::delete(conn, std::slice::from_ref(&id)) {
        Ok(0) => err(&req.id, "not_found", "response not found", Some(json!({ "id": id }))),
        Ok(n) => {
            log::info!("deleted response {}", id);
            ok(&req.id, json!({ "deleted": n }))
        }
        Err(e) => err(&req.id, "db_delete_failed", e.to_string(), None),
    }
}

fn handle_bulk_delete(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match admin_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let ids = match string_list(req, "ids") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match admin::delete(conn, &ids) {
        Ok(n) => {
            log::info!("bulk delete removed {} of {} responses", n, ids.len());
            ok(&req.id, json!({ "deleted": n }))
        }
        Err(e) => err(&req.id, "db_delete_failed", e.to_string(), None),
    }
}

fn handle_stats(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match admin_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let filter = match parse_filter(req, ArchiveFilter::All) {
        Ok(f) => f,
        Err(e) => return e,
    };
    match admin::load_views(conn) {
        Ok(views) => {
            let rows = admin::filter_views(views, filter, None);
            ok(&req.id, json!(admin::stats(&rows)))
        }
        Err(e) => err(&req.id, "db_query_failed", e.to_string(), None),
    }
}

fn handle_export_csv(state: &mut AppState, req: &Request) -> serde_json::Value {
    let conn = match admin_conn(state, req) {
        Ok(c) => c,
        Err(e) => return e,
    };
    let filter = match parse_filter(req, ArchiveFilter::All) {
        Ok(f) => f,
        Err(e) => return e,
    };
    let views = match admin::load_views(conn) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let rows = admin::filter_views(views, filter, None);
    let csv = export::responses_csv(&rows);
    let file_name = export::csv_file_name(Local::now().date_naive());

    let mut result = json!({
        "fileName": file_name,
        "rowCount": rows.len(),
        "content": csv,
    });
    if let Some(dir) = optional_str(req, "outDir").map(PathBuf::from) {
        let path = dir.join(&file_name);
        let written = std::fs::create_dir_all(&dir).and_then(|_| std::fs::write(&path, csv.as_bytes()));
        if let Err(e) = written {
            return err(
                &req.id,
                "io_failed",
                e.to_string(),
                Some(json!({ "path": path.to_string_lossy() })),
            );
        }
        log::info!("exported {} responses to {}", rows.len(), path.display());
        result["path"] = json!(path.to_string_lossy());
    }
    ok(&req.id, result)
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "admin.login" => Some(handle_login(state, req)),
        "admin.logout" => Some(handle_logout(state, req)),
        "admin.status" => Some(handle_status(state, req)),
        "responses.list" => Some(handle_list(state, req)),
        "responses.get" => Some(handle_get(state, req)),
        "responses.setArchived" => Some(handle_set_archived(state, req)),
        "responses.bulkArchive" => Some(handle_bulk_archive(state, req)),
        "responses.delete" => Some(handle_delete(state, req)),
        "responses.bulkDelete" => Some(handle_bulk_delete(state, req)),
        "responses.stats" => Some(handle_stats(state, req)),
        "responses.exportCsv" => Some(handle_export_csv(state, req)),
        _ => None,
    }
}
