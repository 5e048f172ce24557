#![allow(dead_code)]

use serde_json::json;
use std::io::{BufRead, BufReader, Write};
use std::path::PathBuf;
use std::process::{Child, ChildStdin, ChildStdout, Command, Stdio};
use std::time::{SystemTime, UNIX_EPOCH};

pub const ADMIN_PASSWORD: &str = "125690";

/// Ratings for the 16 diagnostic questions: data 4, processes 2, people 5,
/// results 4, total 15.
pub const READY_RATINGS: [u8; 16] = [4, 5, 3, 4, 2, 2, 3, 1, 5, 5, 4, 5, 3, 4, 3, 4];

pub fn temp_dir(prefix: &str) -> PathBuf {
    let p = std::env::temp_dir().join(format!(
        "{}-{}",
        prefix,
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .expect("clock")
            .as_nanos()
    ));
    std::fs::create_dir_all(&p).expect("create temp dir");
    p
}

pub fn spawn_sidecar() -> (Child, ChildStdin, BufReader<ChildStdout>) {
    spawn_sidecar_with(&[])
}

/// Starts the binary with a clean QUIZD_* environment plus `envs`.
pub fn spawn_sidecar_with(envs: &[(&str, &str)]) -> (Child, ChildStdin, BufReader<ChildStdout>) {
    let exe = env!("CARGO_BIN_EXE_quizd");
    let mut cmd = Command::new(exe);
    for key in [
        "QUIZD_WORKSPACE",
        "QUIZD_ADMIN_PASSWORD",
        "QUIZD_REPORT_TEMPLATE",
        "QUIZD_REPORT_FONT",
    ] {
        cmd.env_remove(key);
    }
    for (k, v) in envs {
        cmd.env(k, v);
    }
    let mut child = cmd
        .stdin(Stdio::piped())
        .stdout(Stdio::piped())
        .stderr(Stdio::null())
        .spawn()
        .expect("spawn quizd");
    let stdin = child.stdin.take().expect("child stdin");
    let stdout = child.stdout.take().expect("child stdout");
    (child, stdin, BufReader::new(stdout))
}

pub fn request(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let payload = json!({
        "id": id,
        "method": method,
        "params": params,
    });
    writeln!(stdin, "{}", payload).expect("write request");
    stdin.flush().expect("flush request");

    let mut line = String::new();
    reader.read_line(&mut line).expect("read response line");
    assert!(!line.trim().is_empty(), "empty response for {}", method);
    let value: serde_json::Value = serde_json::from_str(line.trim()).expect("parse response json");
    assert_eq!(value.get("id").and_then(|v| v.as_str()), Some(id));
    value
}

pub fn request_ok(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> serde_json::Value {
    let value = request(stdin, reader, id, method, params);
    assert!(
        value.get("ok").and_then(|v| v.as_bool()).unwrap_or(false),
        "{} failed: {}",
        method,
        value
            .get("error")
            .and_then(|e| e.get("message"))
            .and_then(|v| v.as_str())
            .unwrap_or("unknown error")
    );
    value.get("result").cloned().unwrap_or_else(|| json!({}))
}

/// Expects an error envelope and returns its code.
pub fn request_err(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    id: &str,
    method: &str,
    params: serde_json::Value,
) -> String {
    let value = request(stdin, reader, id, method, params);
    assert_eq!(
        value.get("ok").and_then(|v| v.as_bool()),
        Some(false),
        "{} unexpectedly succeeded: {}",
        method,
        value
    );
    value
        .get("error")
        .and_then(|e| e.get("code"))
        .and_then(|v| v.as_str())
        .unwrap_or("")
        .to_string()
}

pub fn select_workspace(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    workspace: &std::path::Path,
) {
    let _ = request_ok(
        stdin,
        reader,
        "ws",
        "workspace.select",
        json!({ "path": workspace.to_string_lossy() }),
    );
}

/// Drives a diagnostic session up to the contact step and returns its id.
pub fn answer_diagnostic(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    ratings: &[u8],
) -> String {
    let start = request_ok(stdin, reader, "start", "session.start", json!({ "flow": "diagnostic" }));
    let sid = start["sessionId"].as_str().expect("session id").to_string();
    let _ = request_ok(stdin, reader, "begin", "session.begin", json!({ "sessionId": sid }));
    for (i, r) in ratings.iter().enumerate() {
        let _ = request_ok(
            stdin,
            reader,
            &format!("a{}", i),
            "session.answer",
            json!({ "sessionId": sid, "rating": r }),
        );
        let _ = request_ok(
            stdin,
            reader,
            &format!("n{}", i),
            "session.next",
            json!({ "sessionId": sid }),
        );
    }
    sid
}

pub fn contact(name: &str, wants_deep_audit: bool) -> serde_json::Value {
    json!({
        "name": name,
        "company": "ООО Ромашка",
        "phone": "+7 900 000-00-00",
        "email": "anna@example.com",
        "telegram": "",
        "wantsDeepAudit": wants_deep_audit,
    })
}

/// Full diagnostic submission; returns the submit result.
pub fn submit_diagnostic(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    ratings: &[u8],
    name: &str,
) -> serde_json::Value {
    let sid = answer_diagnostic(stdin, reader, ratings);
    let _ = request_ok(
        stdin,
        reader,
        "contact",
        "session.setContact",
        json!({ "sessionId": sid, "contact": contact(name, false) }),
    );
    request_ok(stdin, reader, "submit", "session.submit", json!({ "sessionId": sid }))
}

/// Completes one survey submission for `department` / `position`, picking the
/// first option of every question.
pub fn submit_survey(
    stdin: &mut ChildStdin,
    reader: &mut BufReader<ChildStdout>,
    department: &str,
    position: &str,
) -> serde_json::Value {
    let start = request_ok(stdin, reader, "s-start", "session.start", json!({ "flow": "survey" }));
    let sid = start["sessionId"].as_str().expect("session id").to_string();
    let _ = request_ok(
        stdin,
        reader,
        "s-dept",
        "session.selectDepartment",
        json!({ "sessionId": sid, "departmentId": department }),
    );
    let mut view = request_ok(
        stdin,
        reader,
        "s-pos",
        "session.selectPosition",
        json!({ "sessionId": sid, "position": position }),
    );
    while view["step"] == "questions" {
        let first = view["currentQuestion"]["options"][0]
            .as_str()
            .expect("option")
            .to_string();
        let _ = request_ok(
            stdin,
            reader,
            "s-ans",
            "session.answer",
            json!({ "sessionId": sid, "selected": [first] }),
        );
        view = request_ok(stdin, reader, "s-next", "session.next", json!({ "sessionId": sid }));
    }
    assert_eq!(view["step"], "review");
    request_ok(stdin, reader, "s-submit", "session.submit", json!({ "sessionId": sid }))
}

pub fn login(stdin: &mut ChildStdin, reader: &mut BufReader<ChildStdout>) {
    let r = request_ok(
        stdin,
        reader,
        "login",
        "admin.login",
        json!({ "password": ADMIN_PASSWORD }),
    );
    assert_eq!(r["authorized"], true);
}
