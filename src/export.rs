use crate::admin::ResponseView;
use chrono::{DateTime, Local, NaiveDate};
use serde_json::Value;

pub const CSV_HEADERS: [&str; 5] = [
    "ID",
    "Отдел",
    "Позиция",
    "Дата завершения",
    "Вопросы и ответы",
];

const ANSWER_SEPARATOR: &str = "\n---\n";

/// Every field is quoted so multi-line answer text survives spreadsheet import.
pub fn csv_field(s: &str) -> String {
    format!("\"{}\"", s.replace('"', "\"\""))
}

fn display(v: Option<&Value>) -> String {
    match v {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(Value::Array(items)) => items
            .iter()
            .map(|x| display(Some(x)))
            .filter(|s| !s.is_empty())
            .collect::<Vec<_>>()
            .join(", "),
        Some(other) => other.to_string(),
    }
}

fn string_list(v: Option<&Value>) -> Vec<String> {
    v.and_then(|v| v.as_array())
        .map(|arr| {
            arr.iter()
                .map(|x| display(Some(x)))
                .filter(|s| !s.trim().is_empty())
                .collect()
        })
        .unwrap_or_default()
}

fn flatten_survey_item(n: usize, item: &Value) -> String {
    let question = display(item.get("questionText"));
    let answer = if item.get("answers").map(|a| a.is_array()).unwrap_or(false) {
        let mut text = string_list(item.get("answers")).join(", ");
        let custom = string_list(item.get("customAnswers"));
        if !custom.is_empty() {
            text.push_str(&format!(" (Свой: {})", custom.join(", ")));
        }
        text
    } else {
        let mut text = display(item.get("answer"));
        let custom = display(item.get("customAnswer"));
        if !custom.trim().is_empty() {
            text.push_str(&format!(" ({})", custom));
        }
        text
    };
    format!("Q{}: {}\nA: {}", n, question, answer)
}

fn flatten_diagnostic(obj: &Value, responses: &[Value]) -> String {
    let mut parts: Vec<String> = responses
        .iter()
        .enumerate()
        .map(|(i, r)| {
            format!(
                "Q{}: {}\nA: {}",
                i + 1,
                display(r.get("questionText")),
                display(r.get("rating"))
            )
        })
        .collect();
    if let Some(total) = obj.get("totalScore") {
        parts.push(format!(
            "Итог: {}/20 ({})",
            display(Some(total)),
            display(obj.get("interpretation"))
        ));
    }
    if let Some(contact) = obj.get("contactInfo").filter(|c| c.is_object()) {
        let fields = [
            ("Имя", "name"),
            ("Компания", "company"),
            ("Телефон", "phone"),
            ("Email", "email"),
            ("Telegram", "telegram"),
        ];
        let lines: Vec<String> = fields
            .iter()
            .filter_map(|(label, key)| {
                let v = display(contact.get(*key));
                (!v.trim().is_empty()).then(|| format!("{}: {}", label, v))
            })
            .collect();
        if !lines.is_empty() {
            parts.push(lines.join("\n"));
        }
    }
    parts.join(ANSWER_SEPARATOR)
}

/// Flattens any stored answer shape into `Q{n}: question\nA: answer` blocks.
pub fn flatten_answers(answers: &Value) -> String {
    match answers {
        Value::Array(items) => items
            .iter()
            .enumerate()
            .map(|(i, item)| flatten_survey_item(i + 1, item))
            .collect::<Vec<_>>()
            .join(ANSWER_SEPARATOR),
        Value::Object(_) => match answers.get("responses").and_then(|r| r.as_array()) {
            Some(responses) => flatten_diagnostic(answers, responses),
            None => answers.to_string(),
        },
        other => display(Some(other)),
    }
}

pub fn format_completed_at(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(dt) => dt
            .with_timezone(&Local)
            .format("%d.%m.%Y, %H:%M:%S")
            .to_string(),
        Err(_) => raw.to_string(),
    }
}

pub fn responses_csv(views: &[ResponseView]) -> String {
    let mut lines = Vec::with_capacity(views.len() + 1);
    lines.push(
        CSV_HEADERS
            .iter()
            .map(|h| csv_field(h))
            .collect::<Vec<_>>()
            .join(","),
    );
    for v in views {
        let row = [
            v.id.clone(),
            v.department.clone(),
            v.position.clone(),
            format_completed_at(&v.completed_at),
            flatten_answers(&v.answers),
        ];
        lines.push(row.iter().map(|f| csv_field(f)).collect::<Vec<_>>().join(","));
    }
    lines.join("\n")
}

pub fn csv_file_name(date: NaiveDate) -> String {
    format!("quiz-responses-{}.csv", date.format("%Y-%m-%d"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    /// Quoted-field CSV reader that keeps newlines inside quotes.
    fn parse_csv(text: &str) -> Vec<Vec<String>> {
        let mut rows = Vec::new();
        let mut row = Vec::new();
        let mut buf = String::new();
        let mut in_quotes = false;
        let mut chars = text.chars().peekable();
        while let Some(ch) = chars.next() {
            match ch {
                '"' if in_quotes && chars.peek() == Some(&'"') => {
                    buf.push('"');
                    chars.next();
                }
                '"' => in_quotes = !in_quotes,
                ',' if !in_quotes => row.push(std::mem::take(&mut buf)),
                '\n' if !in_quotes => {
                    row.push(std::mem::take(&mut buf));
                    rows.push(std::mem::take(&mut row));
                }
                _ => buf.push(ch),
            }
        }
        row.push(buf);
        rows.push(row);
        rows
    }

    fn view(id: &str, answers: Value) -> ResponseView {
        ResponseView {
            id: id.into(),
            department: "it".into(),
            position: "Руководитель".into(),
            questions: json!([]),
            answers,
            completed_at: "2025-03-04T10:20:30Z".into(),
            created_at: "2025-03-04T10:20:30Z".into(),
            archived: false,
            audit_number: None,
        }
    }

    #[test]
    fn quotes_and_newlines_survive_a_reader() {
        let answers = json!([
            { "questionText": "Say \"hi\", please", "answer": "line one\nline two" },
            { "questionText": "Pick", "answers": ["A", "Свой вариант"], "customAnswers": ["mine"] }
        ]);
        let csv = responses_csv(&[view("r1", answers)]);
        let rows = parse_csv(&csv);
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0], CSV_HEADERS.iter().map(|s| s.to_string()).collect::<Vec<_>>());
        assert_eq!(rows[1][0], "r1");
        assert_eq!(
            rows[1][4],
            "Q1: Say \"hi\", please\nA: line one\nline two\n---\nQ2: Pick\nA: A, Свой вариант (Свой: mine)"
        );
    }

    #[test]
    fn single_answer_custom_text_is_appended_in_parentheses() {
        let answers = json!([
            { "questionText": "Роль", "answer": "Свой вариант", "customAnswer": "Аудитор" },
            { "questionText": "Опыт", "answer": "Нет", "customAnswer": "  " }
        ]);
        assert_eq!(
            flatten_answers(&answers),
            "Q1: Роль\nA: Свой вариант (Аудитор)\n---\nQ2: Опыт\nA: Нет"
        );
    }

    #[test]
    fn diagnostic_answers_flatten_with_summary_and_contact() {
        let answers = json!({
            "responses": [
                { "questionId": 1, "questionText": "Сбор", "rating": 4, "category": "data" },
                { "questionId": 2, "questionText": "Качество", "rating": 2, "category": "data" }
            ],
            "totalScore": 12,
            "interpretation": "Зона подготовки",
            "contactInfo": { "name": "Анна", "email": "a@b.c", "phone": "" }
        });
        let text = flatten_answers(&answers);
        assert_eq!(
            text,
            "Q1: Сбор\nA: 4\n---\nQ2: Качество\nA: 2\n---\nИтог: 12/20 (Зона подготовки)\n---\nИмя: Анна\nEmail: a@b.c"
        );
    }

    #[test]
    fn empty_export_is_header_only() {
        let csv = responses_csv(&[]);
        assert!(!csv.contains('\n'));
        assert_eq!(parse_csv(&csv)[0].len(), 5);
    }

    #[test]
    fn file_name_uses_iso_date() {
        let d = NaiveDate::from_ymd_opt(2025, 1, 9).expect("date");
        assert_eq!(csv_file_name(d), "quiz-responses-2025-01-09.csv");
    }
}
