use crate::catalog::{self, Department, Question, SurveyQuestion, SurveySection, CUSTOM_OPTION};
use crate::scoring::{self, DiagnosticOutcome, RatingResponse};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;

/// Saved diagnostic progress is discarded after this many days.
pub const PROGRESS_EXPIRY_DAYS: i64 = 7;

/// Settings key holding the diagnostic progress snapshot.
pub const PROGRESS_KEY: &str = "quiz.progress";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Flow {
    Diagnostic,
    Survey,
}

impl Flow {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "diagnostic" => Some(Flow::Diagnostic),
            "survey" => Some(Flow::Survey),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Step {
    Intro,
    Department,
    Position,
    Questions,
    Contact,
    Review,
    Complete,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "camelCase")]
pub enum Answer {
    Rating {
        value: u8,
    },
    Choice {
        selected: Vec<String>,
        #[serde(default)]
        custom: String,
    },
}

impl Answer {
    fn is_complete(&self) -> bool {
        match self {
            Answer::Rating { value } => (1..=scoring::MAX_CATEGORY_SCORE).contains(value),
            Answer::Choice { selected, custom } => {
                if selected.is_empty() {
                    return false;
                }
                if selected.iter().any(|s| s == CUSTOM_OPTION) {
                    return !custom.trim().is_empty();
                }
                true
            }
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ContactInfo {
    pub name: String,
    pub company: String,
    pub phone: String,
    pub email: String,
    pub telegram: String,
    pub wants_deep_audit: bool,
}

impl ContactInfo {
    pub fn validate(&self) -> Result<(), SessionError> {
        if self.name.trim().is_empty() {
            return Err(SessionError::new("contact_invalid", "name is required"));
        }
        let reachable = [&self.phone, &self.email, &self.telegram]
            .iter()
            .any(|v| !v.trim().is_empty());
        if !reachable {
            return Err(SessionError::new(
                "contact_invalid",
                "one of phone, email or telegram is required",
            ));
        }
        let email = self.email.trim();
        if !email.is_empty() && !email.contains('@') {
            return Err(SessionError::new("contact_invalid", "email must contain @"));
        }
        Ok(())
    }

    fn trimmed(&self) -> Self {
        Self {
            name: self.name.trim().to_string(),
            company: self.company.trim().to_string(),
            phone: self.phone.trim().to_string(),
            email: self.email.trim().to_string(),
            telegram: self.telegram.trim().to_string(),
            wants_deep_audit: self.wants_deep_audit,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct SessionError {
    pub code: &'static str,
    pub message: String,
}

impl SessionError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }

    fn state(expected: &str, actual: Step) -> Self {
        Self::new(
            "invalid_state",
            format!("expected step {}, session is at {:?}", expected, actual),
        )
    }
}

/// Diagnostic progress persisted between visits.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Progress {
    pub current_question_index: usize,
    pub responses: Vec<RatingResponse>,
    pub timestamp: i64,
}

impl Progress {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now.timestamp_millis() - self.timestamp
            > Duration::days(PROGRESS_EXPIRY_DAYS).num_milliseconds()
    }
}

/// Row-ready data produced by the terminal step.
#[derive(Debug, Clone)]
pub struct Submission {
    pub department: String,
    pub position: String,
    pub questions: serde_json::Value,
    pub answers: serde_json::Value,
    pub completed_at: DateTime<Utc>,
    pub diagnostic: Option<DiagnosticOutcome>,
}

#[derive(Debug, Clone)]
pub struct QuizSession {
    pub id: String,
    pub flow: Flow,
    step: Step,
    department: Option<Department>,
    section: Option<SurveySection>,
    diagnostic: Vec<Question>,
    index: usize,
    answers: Vec<Option<Answer>>,
    contact: Option<ContactInfo>,
    audit_number: Option<i64>,
    response_id: Option<String>,
}

impl QuizSession {
    pub fn new(id: impl Into<String>, flow: Flow) -> Self {
        let diagnostic = match flow {
            Flow::Diagnostic => catalog::diagnostic_questions(),
            Flow::Survey => Vec::new(),
        };
        let answers = vec![None; diagnostic.len()];
        Self {
            id: id.into(),
            flow,
            step: initial_step(flow),
            department: None,
            section: None,
            diagnostic,
            index: 0,
            answers,
            contact: None,
            audit_number: None,
            response_id: None,
        }
    }

    pub fn step(&self) -> Step {
        self.step
    }

    pub fn question_count(&self) -> usize {
        match self.flow {
            Flow::Diagnostic => self.diagnostic.len(),
            Flow::Survey => self.section.as_ref().map(|s| s.questions.len()).unwrap_or(0),
        }
    }

    fn survey_question(&self, i: usize) -> Option<&SurveyQuestion> {
        self.section.as_ref().and_then(|s| s.questions.get(i))
    }

    fn require(&self, step: Step, label: &str) -> Result<(), SessionError> {
        if self.step == step {
            Ok(())
        } else {
            Err(SessionError::state(label, self.step))
        }
    }

    /// Intro → first question (diagnostic only).
    pub fn begin(&mut self) -> Result<(), SessionError> {
        if self.flow != Flow::Diagnostic {
            return Err(SessionError::new(
                "invalid_state",
                "survey sessions start with department selection",
            ));
        }
        self.require(Step::Intro, "intro")?;
        self.step = Step::Questions;
        self.index = 0;
        Ok(())
    }

    pub fn select_department(&mut self, department_id: &str) -> Result<(), SessionError> {
        if self.flow != Flow::Survey {
            return Err(SessionError::new(
                "invalid_state",
                "departments apply to survey sessions only",
            ));
        }
        if !matches!(self.step, Step::Department | Step::Position) {
            return Err(SessionError::state("department", self.step));
        }
        let Some(dept) = catalog::department(department_id) else {
            return Err(SessionError::new(
                "not_found",
                format!("unknown department: {}", department_id),
            ));
        };
        self.department = Some(dept);
        self.section = None;
        self.step = Step::Position;
        Ok(())
    }

    pub fn select_position(&mut self, position: &str) -> Result<(), SessionError> {
        self.require(Step::Position, "position")?;
        let Some(dept) = self.department.as_ref() else {
            return Err(SessionError::state("department", self.step));
        };
        let Some(section) = dept.sections.iter().find(|s| s.position == position).cloned() else {
            return Err(SessionError::new(
                "not_found",
                format!("unknown position: {}", position),
            ));
        };
        self.answers = vec![None; section.questions.len()];
        self.section = Some(section);
        self.index = 0;
        self.step = Step::Questions;
        Ok(())
    }

    /// Records the draft answer for the current question. An empty selection is
    /// stored but keeps `can_advance` false.
    pub fn answer(&mut self, answer: Answer) -> Result<(), SessionError> {
        self.require(Step::Questions, "questions")?;
        let answer = match (self.flow, answer) {
            (Flow::Diagnostic, Answer::Rating { value }) => {
                let value = scoring::validate_rating(value as i64)
                    .map_err(|e| SessionError::new("bad_params", e.message))?;
                Answer::Rating { value }
            }
            (Flow::Survey, Answer::Choice { selected, custom }) => {
                let Some(q) = self.survey_question(self.index) else {
                    return Err(SessionError::state("questions", self.step));
                };
                if let Some(unknown) = selected.iter().find(|s| !q.options.contains(s)) {
                    return Err(SessionError::new(
                        "bad_params",
                        format!("unknown option: {}", unknown),
                    ));
                }
                if !q.multiple && selected.len() > 1 {
                    return Err(SessionError::new(
                        "bad_params",
                        "question accepts a single option",
                    ));
                }
                let mut deduped: Vec<String> = Vec::with_capacity(selected.len());
                for s in selected {
                    if !deduped.contains(&s) {
                        deduped.push(s);
                    }
                }
                let custom = if deduped.iter().any(|s| s == CUSTOM_OPTION) {
                    custom
                } else {
                    String::new()
                };
                Answer::Choice {
                    selected: deduped,
                    custom,
                }
            }
            (Flow::Diagnostic, _) => {
                return Err(SessionError::new(
                    "bad_params",
                    "diagnostic questions take a rating",
                ))
            }
            (Flow::Survey, _) => {
                return Err(SessionError::new(
                    "bad_params",
                    "survey questions take selected options",
                ))
            }
        };
        if let Some(slot) = self.answers.get_mut(self.index) {
            *slot = Some(answer);
        }
        Ok(())
    }

    pub fn can_advance(&self) -> bool {
        self.step == Step::Questions
            && self
                .answers
                .get(self.index)
                .and_then(|a| a.as_ref())
                .map(Answer::is_complete)
                .unwrap_or(false)
    }

    pub fn next(&mut self) -> Result<Step, SessionError> {
        self.require(Step::Questions, "questions")?;
        if !self.can_advance() {
            return Err(SessionError::new(
                "answer_required",
                "answer the current question first",
            ));
        }
        if self.index + 1 < self.question_count() {
            self.index += 1;
        } else {
            self.step = match self.flow {
                Flow::Diagnostic => Step::Contact,
                Flow::Survey => Step::Review,
            };
        }
        Ok(self.step)
    }

    pub fn back(&mut self) -> Result<Step, SessionError> {
        match self.step {
            Step::Questions if self.index > 0 => {
                self.index -= 1;
            }
            Step::Questions => {
                self.step = match self.flow {
                    Flow::Diagnostic => Step::Intro,
                    Flow::Survey => Step::Position,
                };
            }
            Step::Position => {
                self.step = Step::Department;
            }
            Step::Contact | Step::Review => {
                self.step = Step::Questions;
                self.index = self.question_count().saturating_sub(1);
            }
            Step::Intro | Step::Department | Step::Complete => {
                return Err(SessionError::new(
                    "invalid_state",
                    format!("cannot go back from {:?}", self.step),
                ))
            }
        }
        Ok(self.step)
    }

    pub fn set_contact(&mut self, contact: ContactInfo) -> Result<(), SessionError> {
        self.require(Step::Contact, "contact")?;
        contact.validate()?;
        self.contact = Some(contact.trimmed());
        Ok(())
    }

    pub fn reset(&mut self) {
        *self = QuizSession::new(self.id.clone(), self.flow);
    }

    pub fn rating_responses(&self) -> Vec<RatingResponse> {
        self.diagnostic
            .iter()
            .zip(self.answers.iter())
            .filter_map(|(q, a)| match a {
                Some(Answer::Rating { value }) => Some(RatingResponse {
                    question_id: q.id,
                    rating: *value,
                    category: q.category,
                }),
                _ => None,
            })
            .collect()
    }

    /// Builds the row for the terminal insert without changing state; the
    /// caller commits with `mark_submitted` once the insert succeeds.
    pub fn build_submission(&self, now: DateTime<Utc>) -> Result<Submission, SessionError> {
        match self.flow {
            Flow::Diagnostic => {
                self.require(Step::Contact, "contact")?;
                let Some(contact) = self.contact.as_ref() else {
                    return Err(SessionError::new(
                        "contact_invalid",
                        "contact details are required before submitting",
                    ));
                };
                let responses = self.rating_responses();
                if responses.len() != self.diagnostic.len() {
                    return Err(SessionError::new(
                        "answer_required",
                        "every question needs a rating",
                    ));
                }
                let outcome = scoring::evaluate(&responses)
                    .map_err(|e| SessionError::new("bad_params", e.message))?;
                let answered: Vec<serde_json::Value> = self
                    .diagnostic
                    .iter()
                    .zip(responses.iter())
                    .map(|(q, r)| {
                        json!({
                            "questionId": q.id,
                            "questionText": q.text,
                            "rating": r.rating,
                            "category": q.category,
                        })
                    })
                    .collect();
                let answers = json!({
                    "responses": answered,
                    "totalScore": outcome.total_score,
                    "categoryScores": outcome.category_scores,
                    "interpretation": outcome.interpretation.title,
                    "level": outcome.band,
                    "contactInfo": contact,
                });
                let position = if contact.company.is_empty() {
                    catalog::DIAGNOSTIC_DEPARTMENT.to_string()
                } else {
                    contact.company.clone()
                };
                Ok(Submission {
                    department: catalog::DIAGNOSTIC_DEPARTMENT.to_string(),
                    position,
                    questions: json!(self.diagnostic),
                    answers,
                    completed_at: now,
                    diagnostic: Some(outcome),
                })
            }
            Flow::Survey => {
                self.require(Step::Review, "review")?;
                let (Some(dept), Some(section)) = (self.department.as_ref(), self.section.as_ref())
                else {
                    return Err(SessionError::state("review", self.step));
                };
                let mut answered = Vec::with_capacity(section.questions.len());
                for (q, a) in section.questions.iter().zip(self.answers.iter()) {
                    let Some(Answer::Choice { selected, custom }) = a else {
                        return Err(SessionError::new(
                            "answer_required",
                            format!("question {} has no answer", q.id),
                        ));
                    };
                    let custom_answers: Vec<&str> = if custom.trim().is_empty() {
                        Vec::new()
                    } else {
                        vec![custom.trim()]
                    };
                    answered.push(json!({
                        "questionId": q.id,
                        "questionText": q.text,
                        "answers": selected,
                        "customAnswers": custom_answers,
                    }));
                }
                Ok(Submission {
                    department: dept.id.clone(),
                    position: section.position.clone(),
                    questions: json!(section.questions),
                    answers: json!(answered),
                    completed_at: now,
                    diagnostic: None,
                })
            }
        }
    }

    pub fn mark_submitted(&mut self, response_id: String, audit_number: Option<i64>) {
        self.response_id = Some(response_id);
        self.audit_number = audit_number;
        self.step = Step::Complete;
    }

    pub fn progress(&self, now: DateTime<Utc>) -> Option<Progress> {
        if self.flow != Flow::Diagnostic || self.step == Step::Complete {
            return None;
        }
        Some(Progress {
            current_question_index: self.index,
            responses: self.rating_responses(),
            timestamp: now.timestamp_millis(),
        })
    }

    /// Rebuilds a diagnostic session from saved progress. Stale snapshots are
    /// rejected with `expired`.
    pub fn restore(
        id: impl Into<String>,
        progress: &Progress,
        now: DateTime<Utc>,
    ) -> Result<Self, SessionError> {
        if progress.is_expired(now) {
            return Err(SessionError::new("expired", "saved progress has expired"));
        }
        let mut s = QuizSession::new(id, Flow::Diagnostic);
        for r in &progress.responses {
            let Some(pos) = s.diagnostic.iter().position(|q| q.id == r.question_id) else {
                continue;
            };
            let value = scoring::validate_rating(r.rating as i64)
                .map_err(|e| SessionError::new("bad_params", e.message))?;
            s.answers[pos] = Some(Answer::Rating { value });
        }
        s.index = progress
            .current_question_index
            .min(s.diagnostic.len().saturating_sub(1));
        s.step = Step::Questions;
        Ok(s)
    }

    pub fn view(&self) -> serde_json::Value {
        let total = self.question_count();
        let current_question = if self.step == Step::Questions {
            match self.flow {
                Flow::Diagnostic => self.diagnostic.get(self.index).map(|q| json!(q)),
                Flow::Survey => self.survey_question(self.index).map(|q| json!(q)),
            }
        } else {
            None
        };
        let answered = self.answers.iter().filter(|a| a.is_some()).count();
        let progress_percent = if total > 0 && self.step == Step::Questions {
            ((self.index + 1) as f64 / total as f64 * 100.0).round()
        } else if self.step == Step::Complete {
            100.0
        } else {
            0.0
        };
        json!({
            "sessionId": self.id,
            "flow": self.flow,
            "step": self.step,
            "questionIndex": self.index,
            "questionCount": total,
            "currentQuestion": current_question,
            "currentAnswer": self.answers.get(self.index).cloned().flatten(),
            "canAdvance": self.can_advance(),
            "answeredCount": answered,
            "progressPercent": progress_percent,
            "department": self.department.as_ref().map(|d| json!({ "id": d.id, "name": d.name, "emoji": d.emoji })),
            "positions": self.department.as_ref().map(|d| d.sections.iter().map(|s| s.position.clone()).collect::<Vec<_>>()),
            "position": self.section.as_ref().map(|s| s.position.clone()),
            "contact": self.contact,
            "responseId": self.response_id,
            "auditNumber": self.audit_number,
            "auditNumberFormatted": self.audit_number.map(format_audit_number),
        })
    }
}

fn initial_step(flow: Flow) -> Step {
    match flow {
        Flow::Diagnostic => Step::Intro,
        Flow::Survey => Step::Department,
    }
}

pub fn format_audit_number(n: i64) -> String {
    format!("{:06}", n)
}
