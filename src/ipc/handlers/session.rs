use crate::db::{self, NewResponse};
use crate::ipc::error::{err, ok};
use crate::ipc::helpers::{required_str, string_list};
use crate::ipc::types::{AppState, Request};
use crate::scoring;
use crate::session::{Answer, ContactInfo, Flow, Progress, QuizSession, SessionError, PROGRESS_KEY};
use chrono::Utc;
use rusqlite::Connection;
use serde_json::json;

fn session_err(req: &Request, e: SessionError) -> serde_json::Value {
    err(&req.id, e.code, e.message, None)
}

fn unknown_session(req: &Request, id: &str) -> serde_json::Value {
    err(
        &req.id,
        "not_found",
        "unknown session",
        Some(json!({ "sessionId": id })),
    )
}

/// Best effort: a failed write only costs the resume point.
fn save_progress(conn: Option<&Connection>, s: &QuizSession) {
    let Some(conn) = conn else {
        return;
    };
    let Some(progress) = s.progress(Utc::now()) else {
        return;
    };
    if progress.responses.is_empty() {
        return;
    }
    if let Err(e) = db::settings_set_json(conn, PROGRESS_KEY, &json!(progress)) {
        log::warn!("saving quiz progress failed: {e:?}");
    }
}

fn clear_progress(conn: &Connection) {
    if let Err(e) = db::settings_delete(conn, PROGRESS_KEY) {
        log::warn!("clearing quiz progress failed: {e:?}");
    }
}

/// True only for a snapshot `session.restore` would accept. Unreadable or
/// expired snapshots are dropped here.
fn has_saved_progress(conn: Option<&Connection>) -> bool {
    let Some(conn) = conn else {
        return false;
    };
    let Some(saved) = db::settings_get_json(conn, PROGRESS_KEY).ok().flatten() else {
        return false;
    };
    match serde_json::from_value::<Progress>(saved) {
        Ok(p) if !p.is_expired(Utc::now()) => true,
        Ok(_) => {
            clear_progress(conn);
            false
        }
        Err(e) => {
            log::warn!("discarding unreadable quiz progress: {}", e);
            clear_progress(conn);
            false
        }
    }
}

fn handle_start(state: &mut AppState, req: &Request) -> serde_json::Value {
    let flow_raw = req
        .params
        .get("flow")
        .and_then(|v| v.as_str())
        .unwrap_or("diagnostic");
    let Some(flow) = Flow::parse(flow_raw) else {
        return err(
            &req.id,
            "bad_params",
            "flow must be one of: diagnostic, survey",
            Some(json!({ "flow": flow_raw })),
        );
    };
    let id = uuid::Uuid::new_v4().to_string();
    let s = QuizSession::new(id.clone(), flow);
    let mut view = s.view();
    if flow == Flow::Diagnostic {
        view["hasSavedProgress"] = json!(has_saved_progress(state.db.as_ref()));
    }
    state.sessions.insert(id, s);
    ok(&req.id, view)
}

fn handle_get(state: &mut AppState, req: &Request) -> serde_json::Value {
    let id = match required_str(req, "sessionId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match state.sessions.get(&id) {
        Some(s) => ok(&req.id, s.view()),
        None => unknown_session(req, &id),
    }
}

/// Runs one state transition and answers with the new view.
fn with_session(
    state: &mut AppState,
    req: &Request,
    f: impl FnOnce(&mut QuizSession) -> Result<(), SessionError>,
) -> serde_json::Value {
    let id = match required_str(req, "sessionId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let AppState { db, sessions, .. } = state;
    let Some(s) = sessions.get_mut(&id) else {
        return unknown_session(req, &id);
    };
    if let Err(e) = f(s) {
        return session_err(req, e);
    }
    if s.flow == Flow::Diagnostic {
        save_progress(db.as_ref(), s);
    }
    ok(&req.id, s.view())
}

fn parse_answer(req: &Request) -> Result<Answer, serde_json::Value> {
    if let Some(r) = req.params.get("rating") {
        let Some(n) = r.as_i64() else {
            return Err(err(&req.id, "bad_params", "params.rating must be an integer", None));
        };
        let value = scoring::validate_rating(n).map_err(|e| err(&req.id, &e.code, e.message, None))?;
        return Ok(Answer::Rating { value });
    }
    if req.params.get("selected").is_some() {
        let selected = string_list(req, "selected")?;
        let custom = req
            .params
            .get("custom")
            .and_then(|v| v.as_str())
            .unwrap_or("")
            .to_string();
        return Ok(Answer::Choice { selected, custom });
    }
    Err(err(
        &req.id,
        "bad_params",
        "params.rating or params.selected is required",
        None,
    ))
}

fn handle_answer(state: &mut AppState, req: &Request) -> serde_json::Value {
    let answer = match parse_answer(req) {
        Ok(v) => v,
        Err(e) => return e,
    };
    with_session(state, req, |s| s.answer(answer))
}

fn handle_select_department(state: &mut AppState, req: &Request) -> serde_json::Value {
    let department_id = match required_str(req, "departmentId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    with_session(state, req, |s| s.select_department(&department_id))
}

fn handle_select_position(state: &mut AppState, req: &Request) -> serde_json::Value {
    let position = match required_str(req, "position") {
        Ok(v) => v,
        Err(e) => return e,
    };
    with_session(state, req, |s| s.select_position(&position))
}

fn handle_set_contact(state: &mut AppState, req: &Request) -> serde_json::Value {
    let raw = req.params.get("contact").cloned().unwrap_or(json!({}));
    let contact: ContactInfo = match serde_json::from_value(raw) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "bad_params", format!("bad contact: {}", e), None),
    };
    with_session(state, req, |s| s.set_contact(contact))
}

fn handle_submit(state: &mut AppState, req: &Request) -> serde_json::Value {
    let id = match required_str(req, "sessionId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let AppState { db, sessions, .. } = state;
    let Some(conn) = db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let Some(s) = sessions.get_mut(&id) else {
        return unknown_session(req, &id);
    };

    let submission = match s.build_submission(Utc::now()) {
        Ok(v) => v,
        Err(e) => return session_err(req, e),
    };
    let row = NewResponse {
        id: uuid::Uuid::new_v4().to_string(),
        department: submission.department.clone(),
        position: submission.position.clone(),
        questions_json: submission.questions.to_string(),
        answers_json: submission.answers.to_string(),
        completed_at: submission.completed_at.to_rfc3339(),
        assign_audit_number: submission.diagnostic.is_some(),
    };

    let audit_number = match db::insert_response(conn, &row) {
        Ok(v) => v,
        Err(e) => {
            log::error!("submission insert failed for session {}: {e:?}", id);
            return err(&req.id, "db_insert_failed", e.to_string(), None);
        }
    };
    s.mark_submitted(row.id.clone(), audit_number);
    if s.flow == Flow::Diagnostic {
        clear_progress(conn);
    }
    log::info!(
        "submission stored: department={} audit={:?} band={}",
        row.department,
        audit_number,
        submission.diagnostic.as_ref().map(|o| o.band.as_str()).unwrap_or("-")
    );

    let mut view = s.view();
    if let Some(outcome) = submission.diagnostic {
        view["outcome"] = json!(outcome);
    }
    ok(&req.id, view)
}

fn handle_reset(state: &mut AppState, req: &Request) -> serde_json::Value {
    let id = match required_str(req, "sessionId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    let AppState { db, sessions, .. } = state;
    let Some(s) = sessions.get_mut(&id) else {
        return unknown_session(req, &id);
    };
    s.reset();
    if s.flow == Flow::Diagnostic {
        if let Some(conn) = db.as_ref() {
            clear_progress(conn);
        }
    }
    ok(&req.id, s.view())
}

fn handle_restore(state: &mut AppState, req: &Request) -> serde_json::Value {
    let Some(conn) = state.db.as_ref() else {
        return err(&req.id, "no_workspace", "select a workspace first", None);
    };
    let saved = match db::settings_get_json(conn, PROGRESS_KEY) {
        Ok(v) => v,
        Err(e) => return err(&req.id, "db_query_failed", e.to_string(), None),
    };
    let Some(saved) = saved else {
        return err(&req.id, "not_found", "no saved progress", None);
    };
    let progress: Progress = match serde_json::from_value(saved) {
        Ok(v) => v,
        Err(e) => {
            log::warn!("discarding unreadable quiz progress: {}", e);
            clear_progress(conn);
            return err(&req.id, "not_found", "no saved progress", None);
        }
    };
    let id = uuid::Uuid::new_v4().to_string();
    match QuizSession::restore(id.clone(), &progress, Utc::now()) {
        Ok(s) => {
            let view = s.view();
            state.sessions.insert(id, s);
            ok(&req.id, view)
        }
        Err(e) => {
            if e.code == "expired" {
                clear_progress(conn);
            }
            session_err(req, e)
        }
    }
}

fn handle_close(state: &mut AppState, req: &Request) -> serde_json::Value {
    let id = match required_str(req, "sessionId") {
        Ok(v) => v,
        Err(e) => return e,
    };
    match state.sessions.remove(&id) {
        Some(_) => ok(&req.id, json!({ "closed": true })),
        None => unknown_session(req, &id),
    }
}

pub fn try_handle(state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "session.start" => Some(handle_start(state, req)),
        "session.get" => Some(handle_get(state, req)),
        "session.begin" => Some(with_session(state, req, |s| s.begin())),
        "session.selectDepartment" => Some(handle_select_department(state, req)),
        "session.selectPosition" => Some(handle_select_position(state, req)),
        "session.answer" => Some(handle_answer(state, req)),
        "session.next" => Some(with_session(state, req, |s| s.next().map(|_| ()))),
        "session.back" => Some(with_session(state, req, |s| s.back().map(|_| ()))),
        "session.setContact" => Some(handle_set_contact(state, req)),
        "session.submit" => Some(handle_submit(state, req)),
        "session.reset" => Some(handle_reset(state, req)),
        "session.restore" => Some(handle_restore(state, req)),
        "session.close" => Some(handle_close(state, req)),
        _ => None,
    }
}
