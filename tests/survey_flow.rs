mod test_support;

use serde_json::json;
use test_support::{request_err, request_ok, select_workspace, spawn_sidecar, submit_survey, temp_dir};

#[test]
fn survey_department_position_and_custom_answers() {
    let workspace = temp_dir("quizd-survey");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);

    let start = request_ok(&mut stdin, &mut reader, "1", "session.start", json!({ "flow": "survey" }));
    assert_eq!(start["step"], "department");
    assert!(start.get("hasSavedProgress").is_none());
    let sid = start["sessionId"].as_str().expect("sid").to_string();

    let code = request_err(&mut stdin, &mut reader, "2", "session.begin", json!({ "sessionId": sid }));
    assert_eq!(code, "invalid_state");
    let code = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "session.selectDepartment",
        json!({ "sessionId": sid, "departmentId": "finance" }),
    );
    assert_eq!(code, "not_found");

    let view = request_ok(
        &mut stdin,
        &mut reader,
        "4",
        "session.selectDepartment",
        json!({ "sessionId": sid, "departmentId": "it" }),
    );
    assert_eq!(view["step"], "position");
    assert_eq!(view["department"]["name"], "IT отдел");
    assert_eq!(view["positions"], json!(["Руководитель", "Сотрудник"]));

    // Back to department and pick again.
    let view = request_ok(&mut stdin, &mut reader, "5", "session.back", json!({ "sessionId": sid }));
    assert_eq!(view["step"], "department");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "6",
        "session.selectDepartment",
        json!({ "sessionId": sid, "departmentId": "analytics" }),
    );

    let view = request_ok(
        &mut stdin,
        &mut reader,
        "7",
        "session.selectPosition",
        json!({ "sessionId": sid, "position": "Руководитель" }),
    );
    assert_eq!(view["step"], "questions");
    assert_eq!(view["questionCount"], 3);
    assert_eq!(view["currentQuestion"]["multiple"], true);

    let code = request_err(
        &mut stdin,
        &mut reader,
        "8",
        "session.answer",
        json!({ "sessionId": sid, "selected": ["Полёт на Марс"] }),
    );
    assert_eq!(code, "bad_params");

    let view = request_ok(
        &mut stdin,
        &mut reader,
        "9",
        "session.answer",
        json!({ "sessionId": sid, "selected": ["Анализ данных", "Свой вариант"], "custom": "" }),
    );
    assert_eq!(view["canAdvance"], false, "custom option needs text");

    let view = request_ok(
        &mut stdin,
        &mut reader,
        "10",
        "session.answer",
        json!({
            "sessionId": sid,
            "selected": ["Анализ данных", "Свой вариант", "Анализ данных"],
            "custom": "Прогноз спроса",
        }),
    );
    assert_eq!(view["canAdvance"], true);
    assert_eq!(
        view["currentAnswer"]["selected"],
        json!(["Анализ данных", "Свой вариант"])
    );
    let _ = request_ok(&mut stdin, &mut reader, "11", "session.next", json!({ "sessionId": sid }));

    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "12",
        "session.answer",
        json!({ "sessionId": sid, "selected": ["Нет компетенций"] }),
    );
    let _ = request_ok(&mut stdin, &mut reader, "13", "session.next", json!({ "sessionId": sid }));

    let code = request_err(
        &mut stdin,
        &mut reader,
        "14",
        "session.answer",
        json!({ "sessionId": sid, "selected": ["Низкая", "Высокая"] }),
    );
    assert_eq!(code, "bad_params");
    let _ = request_ok(
        &mut stdin,
        &mut reader,
        "15",
        "session.answer",
        json!({ "sessionId": sid, "selected": ["Средняя"] }),
    );
    let view = request_ok(&mut stdin, &mut reader, "16", "session.next", json!({ "sessionId": sid }));
    assert_eq!(view["step"], "review");

    let done = request_ok(&mut stdin, &mut reader, "17", "session.submit", json!({ "sessionId": sid }));
    assert_eq!(done["step"], "complete");
    assert!(done["auditNumber"].is_null());
    assert!(done.get("outcome").is_none());
    let response_id = done["responseId"].as_str().expect("response id").to_string();

    let conn = rusqlite::Connection::open(workspace.join("quizd.sqlite3")).expect("open db");
    let (department, position, answers, audit): (String, String, String, Option<i64>) = conn
        .query_row(
            "SELECT department, position, answers, audit_number FROM quiz_responses WHERE id = ?",
            [&response_id],
            |r| Ok((r.get(0)?, r.get(1)?, r.get(2)?, r.get(3)?)),
        )
        .expect("stored row");
    assert_eq!(department, "analytics");
    assert_eq!(position, "Руководитель");
    assert!(audit.is_none());
    let answers: serde_json::Value = serde_json::from_str(&answers).expect("answers json");
    assert_eq!(answers[0]["customAnswers"], json!(["Прогноз спроса"]));
    assert_eq!(answers[2]["answers"], json!(["Средняя"]));

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn survey_rows_do_not_consume_audit_numbers() {
    let workspace = temp_dir("quizd-survey-audit");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);

    let _ = submit_survey(&mut stdin, &mut reader, "hr", "Сотрудник");
    let _ = submit_survey(&mut stdin, &mut reader, "legal", "Руководитель");
    let diag = test_support::submit_diagnostic(
        &mut stdin,
        &mut reader,
        &test_support::READY_RATINGS,
        "Анна",
    );
    assert_eq!(diag["auditNumber"], 1);

    drop(stdin);
    let _ = child.wait();
}
