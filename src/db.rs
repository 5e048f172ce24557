use rusqlite::{params_from_iter, Connection, OptionalExtension};
use serde::Serialize;
use std::path::Path;

pub const DB_FILE: &str = "quizd.sqlite3";

pub fn open_db(workspace: &Path) -> anyhow::Result<Connection> {
    std::fs::create_dir_all(workspace)?;
    let db_path = workspace.join(DB_FILE);
    let conn = Connection::open(db_path)?;

    // Workspaces created by older deployments may carry a quiz_responses table
    // without the archived column. That table is left as-is; archive state then
    // lives in settings (see archived_fallback_*).
    conn.execute(
        "CREATE TABLE IF NOT EXISTS quiz_responses(
            id TEXT PRIMARY KEY,
            department TEXT NOT NULL,
            position TEXT NOT NULL,
            questions TEXT NOT NULL,
            answers TEXT NOT NULL,
            completed_at TEXT NOT NULL,
            created_at TEXT NOT NULL,
            archived INTEGER NOT NULL DEFAULT 0,
            audit_number INTEGER
        )",
        [],
    )?;
    conn.execute(
        "CREATE INDEX IF NOT EXISTS idx_quiz_responses_completed ON quiz_responses(completed_at)",
        [],
    )?;
    if table_has_column(&conn, "quiz_responses", "audit_number")? {
        conn.execute(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_quiz_responses_audit
             ON quiz_responses(audit_number)",
            [],
        )?;
    }

    // Highest audit number ever issued. Deleting rows never lowers it.
    conn.execute(
        "CREATE TABLE IF NOT EXISTS audit_sequence(
            id INTEGER PRIMARY KEY CHECK (id = 1),
            last_value INTEGER NOT NULL
        )",
        [],
    )?;

    conn.execute(
        "CREATE TABLE IF NOT EXISTS settings(
            key TEXT PRIMARY KEY,
            value_json TEXT NOT NULL
        )",
        [],
    )?;

    Ok(conn)
}

pub fn settings_get_json(conn: &Connection, key: &str) -> anyhow::Result<Option<serde_json::Value>> {
    let raw: Option<String> = conn
        .query_row(
            "SELECT value_json FROM settings WHERE key = ?",
            [key],
            |r| r.get(0),
        )
        .optional()?;
    match raw {
        Some(s) => Ok(Some(serde_json::from_str(&s)?)),
        None => Ok(None),
    }
}

pub fn settings_set_json(conn: &Connection, key: &str, value: &serde_json::Value) -> anyhow::Result<()> {
    conn.execute(
        "INSERT INTO settings(key, value_json) VALUES(?, ?)
         ON CONFLICT(key) DO UPDATE SET value_json = excluded.value_json",
        (key, serde_json::to_string(value)?),
    )?;
    Ok(())
}

pub fn settings_delete(conn: &Connection, key: &str) -> anyhow::Result<()> {
    conn.execute("DELETE FROM settings WHERE key = ?", [key])?;
    Ok(())
}

#[derive(Debug, Clone)]
pub struct NewResponse {
    pub id: String,
    pub department: String,
    pub position: String,
    pub questions_json: String,
    pub answers_json: String,
    pub completed_at: String,
    pub assign_audit_number: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredResponse {
    pub id: String,
    pub department: String,
    pub position: String,
    pub questions: String,
    pub answers: String,
    pub completed_at: String,
    pub created_at: String,
    /// `None` when the table has no archived column.
    pub archived: Option<bool>,
    pub audit_number: Option<i64>,
}

/// Bumps the audit counter and returns the new value. Rows numbered before the
/// counter existed are taken into account so upgraded workspaces continue
/// their sequence.
fn next_audit_number(conn: &Connection) -> anyhow::Result<i64> {
    let issued: Option<i64> = conn
        .query_row("SELECT last_value FROM audit_sequence WHERE id = 1", [], |r| r.get(0))
        .optional()?;
    let stored: i64 = conn.query_row(
        "SELECT COALESCE(MAX(audit_number), 0) FROM quiz_responses",
        [],
        |r| r.get(0),
    )?;
    let next = issued.unwrap_or(0).max(stored) + 1;
    conn.execute(
        "INSERT INTO audit_sequence(id, last_value) VALUES(1, ?)
         ON CONFLICT(id) DO UPDATE SET last_value = excluded.last_value",
        [next],
    )?;
    Ok(next)
}

/// Inserts one submission. Diagnostic rows get the next audit number inside the
/// same transaction.
pub fn insert_response(conn: &Connection, row: &NewResponse) -> anyhow::Result<Option<i64>> {
    let has_audit = table_has_column(conn, "quiz_responses", "audit_number")?;
    if row.assign_audit_number && !has_audit {
        anyhow::bail!("quiz_responses has no audit_number column");
    }
    let tx = conn.unchecked_transaction()?;
    let audit_number = if row.assign_audit_number {
        Some(next_audit_number(&tx)?)
    } else {
        None
    };
    let created_at = chrono::Utc::now().to_rfc3339();
    if has_audit {
        tx.execute(
            "INSERT INTO quiz_responses(
                id, department, position, questions, answers, completed_at, created_at, audit_number
             ) VALUES(?, ?, ?, ?, ?, ?, ?, ?)",
            (
                &row.id,
                &row.department,
                &row.position,
                &row.questions_json,
                &row.answers_json,
                &row.completed_at,
                &created_at,
                audit_number,
            ),
        )?;
    } else {
        tx.execute(
            "INSERT INTO quiz_responses(
                id, department, position, questions, answers, completed_at, created_at
             ) VALUES(?, ?, ?, ?, ?, ?, ?)",
            (
                &row.id,
                &row.department,
                &row.position,
                &row.questions_json,
                &row.answers_json,
                &row.completed_at,
                &created_at,
            ),
        )?;
    }
    tx.commit()?;
    Ok(audit_number)
}

fn select_columns(conn: &Connection) -> anyhow::Result<(bool, bool)> {
    Ok((
        table_has_column(conn, "quiz_responses", "archived")?,
        table_has_column(conn, "quiz_responses", "audit_number")?,
    ))
}

fn row_sql(has_archived: bool, has_audit: bool) -> String {
    format!(
        "SELECT id, department, position, questions, answers, completed_at, created_at, {}, {}
         FROM quiz_responses",
        if has_archived { "archived" } else { "NULL" },
        if has_audit { "audit_number" } else { "NULL" },
    )
}

fn map_row(r: &rusqlite::Row<'_>) -> rusqlite::Result<StoredResponse> {
    let archived: Option<i64> = r.get(7)?;
    Ok(StoredResponse {
        id: r.get(0)?,
        department: r.get(1)?,
        position: r.get(2)?,
        questions: r.get(3)?,
        answers: r.get(4)?,
        completed_at: r.get(5)?,
        created_at: r.get(6)?,
        archived: archived.map(|v| v != 0),
        audit_number: r.get(8)?,
    })
}

/// All rows, newest completion first.
pub fn list_responses(conn: &Connection) -> anyhow::Result<Vec<StoredResponse>> {
    let (has_archived, has_audit) = select_columns(conn)?;
    let sql = format!(
        "{} ORDER BY completed_at DESC, created_at DESC",
        row_sql(has_archived, has_audit)
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt
        .query_map([], map_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

pub fn get_response(conn: &Connection, id: &str) -> anyhow::Result<Option<StoredResponse>> {
    let (has_archived, has_audit) = select_columns(conn)?;
    let sql = format!("{} WHERE id = ?", row_sql(has_archived, has_audit));
    Ok(conn.query_row(&sql, [id], map_row).optional()?)
}

pub fn find_by_audit_number(
    conn: &Connection,
    audit_number: i64,
    department: &str,
) -> anyhow::Result<Option<StoredResponse>> {
    let (has_archived, has_audit) = select_columns(conn)?;
    if !has_audit {
        return Ok(None);
    }
    let sql = format!(
        "{} WHERE audit_number = ? AND department = ?",
        row_sql(has_archived, has_audit)
    );
    Ok(conn
        .query_row(&sql, (audit_number, department), map_row)
        .optional()?)
}

/// `Ok(None)` when the table has no archived column; the caller falls back to
/// the settings-backed list. Otherwise the number of rows touched.
pub fn set_archived_column(conn: &Connection, id: &str, archived: bool) -> anyhow::Result<Option<usize>> {
    if !table_has_column(conn, "quiz_responses", "archived")? {
        return Ok(None);
    }
    let n = conn.execute(
        "UPDATE quiz_responses SET archived = ? WHERE id = ?",
        (archived as i64, id),
    )?;
    Ok(Some(n))
}

pub fn delete_responses(conn: &Connection, ids: &[String]) -> anyhow::Result<usize> {
    if ids.is_empty() {
        return Ok(0);
    }
    let placeholders = vec!["?"; ids.len()].join(", ");
    let sql = format!("DELETE FROM quiz_responses WHERE id IN ({})", placeholders);
    let tx = conn.unchecked_transaction()?;
    let n = tx.execute(&sql, params_from_iter(ids.iter()))?;
    tx.commit()?;
    Ok(n)
}

pub fn responses_have_archived_column(conn: &Connection) -> anyhow::Result<bool> {
    table_has_column(conn, "quiz_responses", "archived")
}

pub fn table_has_column(conn: &Connection, table: &str, column: &str) -> anyhow::Result<bool> {
    let sql = format!("PRAGMA table_info({})", table);
    let mut stmt = conn.prepare(&sql)?;
    let mut rows = stmt.query([])?;
    while let Some(row) = rows.next()? {
        let name: String = row.get(1)?;
        if name == column {
            return Ok(true);
        }
    }
    Ok(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn workspace(tag: &str) -> std::path::PathBuf {
        let dir = std::env::temp_dir().join(format!("quizd-db-{}-{}", tag, uuid::Uuid::new_v4()));
        std::fs::create_dir_all(&dir).expect("temp dir");
        dir
    }

    fn diagnostic_row(id: &str) -> NewResponse {
        NewResponse {
            id: id.to_string(),
            department: "diagnostic".to_string(),
            position: "ООО Ромашка".to_string(),
            questions_json: "[]".to_string(),
            answers_json: "{}".to_string(),
            completed_at: "2025-01-01T00:00:00+00:00".to_string(),
            assign_audit_number: true,
        }
    }

    #[test]
    fn audit_numbers_are_not_reused_after_delete() {
        let dir = workspace("audit");
        let conn = open_db(&dir).expect("open");
        assert_eq!(insert_response(&conn, &diagnostic_row("a")).expect("a"), Some(1));
        assert_eq!(insert_response(&conn, &diagnostic_row("b")).expect("b"), Some(2));
        delete_responses(&conn, &["b".to_string()]).expect("delete");
        assert_eq!(insert_response(&conn, &diagnostic_row("c")).expect("c"), Some(3));

        delete_responses(&conn, &["a".to_string(), "c".to_string()]).expect("delete all");
        assert_eq!(insert_response(&conn, &diagnostic_row("d")).expect("d"), Some(4));
    }

    #[test]
    fn counter_continues_from_rows_numbered_before_it_existed() {
        let dir = workspace("audit-upgrade");
        let conn = open_db(&dir).expect("open");
        conn.execute(
            "INSERT INTO quiz_responses(
                id, department, position, questions, answers, completed_at, created_at, audit_number
             ) VALUES('old', 'diagnostic', '', '[]', '{}', '2024-01-01', '2024-01-01', 41)",
            [],
        )
        .expect("seed");
        assert_eq!(insert_response(&conn, &diagnostic_row("new")).expect("new"), Some(42));
    }
}
