use crate::db::{self, StoredResponse};
use rusqlite::Connection;
use serde::Serialize;
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, BTreeSet};

pub const AUTH_KEY: &str = "admin.authorized";
pub const ARCHIVED_FALLBACK_KEY: &str = "admin.archivedResponses";

/// Nested JSON strings deeper than this are returned as the last decoded string.
const MAX_DECODE_DEPTH: usize = 4;

pub fn password_digest(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hasher
        .finalize()
        .iter()
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Compares the trimmed attempt with the configured password and stores the
/// authorized flag on success.
pub fn login(conn: &Connection, configured: &str, attempt: &str) -> anyhow::Result<bool> {
    if attempt.trim() != configured {
        return Ok(false);
    }
    db::settings_set_json(conn, AUTH_KEY, &Value::String(password_digest(configured)))?;
    Ok(true)
}

pub fn logout(conn: &Connection) -> anyhow::Result<()> {
    db::settings_delete(conn, AUTH_KEY)
}

/// A stored flag only counts while it matches the current password.
pub fn is_authorized(conn: &Connection, configured: &str) -> anyhow::Result<bool> {
    let stored = db::settings_get_json(conn, AUTH_KEY)?;
    Ok(stored.as_ref().and_then(|v| v.as_str()) == Some(password_digest(configured).as_str()))
}

/// Decodes values that may have been JSON-encoded more than once. Null becomes
/// an empty list; strings that are not JSON come back unchanged.
pub fn parse_maybe_json(v: &Value) -> Value {
    let mut cur = v.clone();
    for _ in 0..MAX_DECODE_DEPTH {
        let Value::String(s) = &cur else {
            break;
        };
        match serde_json::from_str::<Value>(s) {
            Ok(next) => cur = next,
            Err(_) => break,
        }
    }
    if cur.is_null() {
        Value::Array(Vec::new())
    } else {
        cur
    }
}

fn parse_stored_text(raw: &str) -> Value {
    parse_maybe_json(&Value::String(raw.to_string()))
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseView {
    pub id: String,
    pub department: String,
    pub position: String,
    pub questions: Value,
    pub answers: Value,
    pub completed_at: String,
    pub created_at: String,
    pub archived: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audit_number: Option<i64>,
}

impl ResponseView {
    fn from_stored(row: StoredResponse, fallback: &BTreeSet<String>) -> Self {
        let archived = match row.archived {
            Some(flag) => flag,
            None => fallback.contains(&row.id),
        };
        Self {
            questions: parse_stored_text(&row.questions),
            answers: parse_stored_text(&row.answers),
            archived,
            id: row.id,
            department: row.department,
            position: row.position,
            completed_at: row.completed_at,
            created_at: row.created_at,
            audit_number: row.audit_number,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArchiveFilter {
    Active,
    Archived,
    All,
}

impl ArchiveFilter {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "active" => Some(ArchiveFilter::Active),
            "archived" => Some(ArchiveFilter::Archived),
            "all" => Some(ArchiveFilter::All),
            _ => None,
        }
    }

    fn admits(self, archived: bool) -> bool {
        match self {
            ArchiveFilter::Active => !archived,
            ArchiveFilter::Archived => archived,
            ArchiveFilter::All => true,
        }
    }
}

pub fn archived_fallback_ids(conn: &Connection) -> anyhow::Result<BTreeSet<String>> {
    let Some(v) = db::settings_get_json(conn, ARCHIVED_FALLBACK_KEY)? else {
        return Ok(BTreeSet::new());
    };
    Ok(v.as_array()
        .map(|arr| {
            arr.iter()
                .filter_map(|x| x.as_str().map(|s| s.to_string()))
                .collect()
        })
        .unwrap_or_default())
}

fn archived_fallback_store(conn: &Connection, ids: &BTreeSet<String>) -> anyhow::Result<()> {
    if ids.is_empty() {
        return db::settings_delete(conn, ARCHIVED_FALLBACK_KEY);
    }
    let arr: Vec<Value> = ids.iter().map(|s| Value::String(s.clone())).collect();
    db::settings_set_json(conn, ARCHIVED_FALLBACK_KEY, &Value::Array(arr))
}

pub fn archived_fallback_set(conn: &Connection, id: &str, archived: bool) -> anyhow::Result<()> {
    let mut ids = archived_fallback_ids(conn)?;
    if archived {
        ids.insert(id.to_string());
    } else {
        ids.remove(id);
    }
    archived_fallback_store(conn, &ids)
}

/// Loads every row with normalized payloads. When the archived column exists a
/// leftover fallback list is dropped.
pub fn load_views(conn: &Connection) -> anyhow::Result<Vec<ResponseView>> {
    let has_column = db::responses_have_archived_column(conn)?;
    let fallback = if has_column {
        if db::settings_get_json(conn, ARCHIVED_FALLBACK_KEY)?.is_some() {
            log::info!("archived column present; clearing settings fallback list");
            db::settings_delete(conn, ARCHIVED_FALLBACK_KEY)?;
        }
        BTreeSet::new()
    } else {
        archived_fallback_ids(conn)?
    };
    let rows = db::list_responses(conn)?;
    Ok(rows
        .into_iter()
        .map(|r| ResponseView::from_stored(r, &fallback))
        .collect())
}

pub fn filter_views(
    views: Vec<ResponseView>,
    filter: ArchiveFilter,
    department: Option<&str>,
) -> Vec<ResponseView> {
    views
        .into_iter()
        .filter(|v| filter.admits(v.archived))
        .filter(|v| department.map(|d| v.department == d).unwrap_or(true))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum ArchiveStorage {
    Column,
    Settings,
}

/// Returns `None` when no row has that id.
pub fn set_archived(
    conn: &Connection,
    id: &str,
    archived: bool,
) -> anyhow::Result<Option<ArchiveStorage>> {
    match db::set_archived_column(conn, id, archived)? {
        Some(0) => Ok(None),
        Some(_) => Ok(Some(ArchiveStorage::Column)),
        None => {
            if db::get_response(conn, id)?.is_none() {
                return Ok(None);
            }
            log::warn!("quiz_responses has no archived column; storing archive flag in settings");
            archived_fallback_set(conn, id, archived)?;
            Ok(Some(ArchiveStorage::Settings))
        }
    }
}

/// Deletes rows and forgets their ids in the fallback list.
pub fn delete(conn: &Connection, ids: &[String]) -> anyhow::Result<usize> {
    let n = db::delete_responses(conn, ids)?;
    let mut fallback = archived_fallback_ids(conn)?;
    let before = fallback.len();
    for id in ids {
        fallback.remove(id);
    }
    if fallback.len() != before {
        archived_fallback_store(conn, &fallback)?;
    }
    Ok(n)
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Stats {
    pub total: usize,
    pub by_department: BTreeMap<String, usize>,
    pub by_position: BTreeMap<String, usize>,
}

pub fn stats(views: &[ResponseView]) -> Stats {
    let mut out = Stats {
        total: views.len(),
        ..Stats::default()
    };
    for v in views {
        *out.by_department.entry(v.department.clone()).or_insert(0) += 1;
        *out.by_position.entry(v.position.clone()).or_insert(0) += 1;
    }
    out
}
