use crate::catalog::{self, BandLevel, CategoryId, Interpretation};
use serde::{Deserialize, Serialize};

pub const MAX_CATEGORY_SCORE: u8 = 5;
pub const MAX_TOTAL_SCORE: u8 = 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RatingResponse {
    pub question_id: u32,
    pub rating: u8,
    pub category: CategoryId,
}

#[derive(Debug, Clone, Serialize)]
pub struct ScoringError {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ScoringError {
    pub fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            details: None,
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CategoryScores {
    pub data: u8,
    pub processes: u8,
    pub people: u8,
    pub results: u8,
}

impl CategoryScores {
    pub fn get(&self, id: CategoryId) -> u8 {
        match id {
            CategoryId::Data => self.data,
            CategoryId::Processes => self.processes,
            CategoryId::People => self.people,
            CategoryId::Results => self.results,
        }
    }

    fn set(&mut self, id: CategoryId, v: u8) {
        match id {
            CategoryId::Data => self.data = v,
            CategoryId::Processes => self.processes = v,
            CategoryId::People => self.people = v,
            CategoryId::Results => self.results = v,
        }
    }

    pub fn total(&self) -> u8 {
        CategoryId::ALL.iter().map(|c| self.get(*c)).sum()
    }

    /// Mean of the four category scores, rounded to one decimal.
    pub fn average(&self) -> f64 {
        round_off_1_decimal(self.total() as f64 / CategoryId::ALL.len() as f64)
    }

    /// Lowest-scoring category; ties keep the first one in catalog order.
    pub fn weakest(&self) -> (CategoryId, u8) {
        let mut best = (CategoryId::Data, self.data);
        for c in CategoryId::ALL {
            if self.get(c) < best.1 {
                best = (c, self.get(c));
            }
        }
        best
    }

    /// Highest-scoring category; ties keep the last one in catalog order.
    pub fn strongest(&self) -> (CategoryId, u8) {
        let mut best = (CategoryId::Data, self.data);
        for c in CategoryId::ALL {
            if self.get(c) >= best.1 {
                best = (c, self.get(c));
            }
        }
        best
    }

    pub fn warnings(&self) -> Vec<CategoryId> {
        CategoryId::ALL
            .into_iter()
            .filter(|c| is_warning(*c, self.get(*c)))
            .collect()
    }
}

/// `Int(10*x + 0.5) / 10`
pub fn round_off_1_decimal(x: f64) -> f64 {
    ((10.0 * x) + 0.5).floor() / 10.0
}

/// Integer mean rounded to nearest, ties up. Empty input yields 0.
pub fn rounded_mean(sum: u32, count: u32) -> u8 {
    if count == 0 {
        return 0;
    }
    ((2 * sum + count) / (2 * count)) as u8
}

pub fn is_warning(category: CategoryId, score: u8) -> bool {
    score < category.warning_below()
}

pub fn validate_rating(rating: i64) -> Result<u8, ScoringError> {
    if (1..=MAX_CATEGORY_SCORE as i64).contains(&rating) {
        Ok(rating as u8)
    } else {
        Err(ScoringError::new(
            "bad_params",
            format!("rating must be between 1 and 5, got {}", rating),
        ))
    }
}

pub fn category_scores(responses: &[RatingResponse]) -> Result<CategoryScores, ScoringError> {
    let mut sums = [0u32; 4];
    let mut counts = [0u32; 4];
    for r in responses {
        validate_rating(r.rating as i64)?;
        let idx = CategoryId::ALL
            .iter()
            .position(|c| *c == r.category)
            .unwrap_or_default();
        sums[idx] += r.rating as u32;
        counts[idx] += 1;
    }

    let mut out = CategoryScores::default();
    for (i, c) in CategoryId::ALL.iter().enumerate() {
        out.set(*c, rounded_mean(sums[i], counts[i]));
    }
    Ok(out)
}

pub fn band_for_total(total: u8) -> BandLevel {
    match total {
        0..=8 => BandLevel::HighRisk,
        9..=14 => BandLevel::Preparation,
        _ => BandLevel::Ready,
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DiagnosticOutcome {
    pub category_scores: CategoryScores,
    pub total_score: u8,
    pub band: BandLevel,
    pub interpretation: Interpretation,
    pub average_score: f64,
    pub warnings: Vec<CategoryId>,
}

pub fn evaluate(responses: &[RatingResponse]) -> Result<DiagnosticOutcome, ScoringError> {
    let category_scores = category_scores(responses)?;
    Ok(outcome_from_scores(category_scores))
}

pub fn outcome_from_scores(category_scores: CategoryScores) -> DiagnosticOutcome {
    let total_score = category_scores.total();
    let band = band_for_total(total_score);
    DiagnosticOutcome {
        category_scores,
        total_score,
        band,
        interpretation: catalog::interpretation_for(band),
        average_score: category_scores.average(),
        warnings: category_scores.warnings(),
    }
}

/// Parses `[{questionId, rating, category}]`. When `category` is missing it is
/// looked up from the diagnostic catalog by question id.
pub fn parse_responses(v: Option<&serde_json::Value>) -> Result<Vec<RatingResponse>, ScoringError> {
    let Some(arr) = v.and_then(|v| v.as_array()) else {
        return Err(ScoringError::new("bad_params", "responses must be an array"));
    };
    let questions = catalog::diagnostic_questions();
    let mut out = Vec::with_capacity(arr.len());
    for (i, item) in arr.iter().enumerate() {
        let Some(question_id) = item.get("questionId").and_then(|v| v.as_u64()) else {
            let mut e = ScoringError::new("bad_params", "response is missing questionId");
            e.details = Some(serde_json::json!({ "index": i }));
            return Err(e);
        };
        let rating = item
            .get("rating")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| ScoringError::new("bad_params", "response is missing rating"))?;
        let rating = validate_rating(rating)?;
        let category = match item.get("category").and_then(|v| v.as_str()) {
            Some(raw) => CategoryId::parse(raw).ok_or_else(|| {
                ScoringError::new("bad_params", format!("unknown category: {}", raw))
            })?,
            None => questions
                .iter()
                .find(|q| q.id as u64 == question_id)
                .map(|q| q.category)
                .ok_or_else(|| {
                    ScoringError::new("bad_params", format!("unknown question: {}", question_id))
                })?,
        };
        out.push(RatingResponse {
            question_id: question_id as u32,
            rating,
            category,
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn responses(data: &[u8], processes: &[u8], people: &[u8], results: &[u8]) -> Vec<RatingResponse> {
        let mut out = Vec::new();
        let mut id = 1;
        for (cat, ratings) in [
            (CategoryId::Data, data),
            (CategoryId::Processes, processes),
            (CategoryId::People, people),
            (CategoryId::Results, results),
        ] {
            for r in ratings {
                out.push(RatingResponse {
                    question_id: id,
                    rating: *r,
                    category: cat,
                });
                id += 1;
            }
        }
        out
    }

    #[test]
    fn reference_example_lands_in_ready_band() {
        let rs = responses(&[4, 5, 3, 4], &[2, 2, 3, 1], &[5, 5, 4, 5], &[3, 4, 3, 4]);
        let outcome = evaluate(&rs).expect("evaluate");
        assert_eq!(
            outcome.category_scores,
            CategoryScores {
                data: 4,
                processes: 2,
                people: 5,
                results: 4
            }
        );
        assert_eq!(outcome.total_score, 15);
        assert_eq!(outcome.band, BandLevel::Ready);
        assert_eq!(outcome.interpretation.title, "Зона готовности");
        assert_eq!(outcome.warnings, vec![CategoryId::Processes]);
    }

    #[test]
    fn ties_round_up() {
        assert_eq!(rounded_mean(14, 4), 4); // 3.5
        assert_eq!(rounded_mean(10, 4), 3); // 2.5
        assert_eq!(rounded_mean(13, 4), 3); // 3.25
        assert_eq!(rounded_mean(15, 4), 4); // 3.75
        assert_eq!(rounded_mean(0, 0), 0);
    }

    #[test]
    fn empty_category_scores_zero() {
        let rs = responses(&[5, 5], &[], &[], &[1]);
        let s = category_scores(&rs).expect("scores");
        assert_eq!(s.data, 5);
        assert_eq!(s.processes, 0);
        assert_eq!(s.people, 0);
        assert_eq!(s.results, 1);
        assert_eq!(s.total(), 6);
    }

    #[test]
    fn scores_stay_within_bounds_for_every_uniform_rating_set() {
        for a in 1..=5u8 {
            for b in 1..=5u8 {
                let rs = responses(&[a, b, a, b], &[b, b, a], &[a], &[b, a]);
                let s = category_scores(&rs).expect("scores");
                for c in CategoryId::ALL {
                    assert!(s.get(c) <= MAX_CATEGORY_SCORE);
                }
                assert!(s.total() <= MAX_TOTAL_SCORE);
            }
        }
    }

    #[test]
    fn band_partition_is_exhaustive_and_contiguous() {
        let interps = catalog::interpretations();
        for total in 0..=MAX_TOTAL_SCORE {
            let band = band_for_total(total);
            let matching: Vec<_> = interps
                .iter()
                .filter(|i| total >= i.min && total <= i.max)
                .collect();
            assert_eq!(matching.len(), 1, "total {} matched {:?}", total, matching);
            assert_eq!(matching[0].level, band);
        }
        assert_eq!(band_for_total(8), BandLevel::HighRisk);
        assert_eq!(band_for_total(9), BandLevel::Preparation);
        assert_eq!(band_for_total(14), BandLevel::Preparation);
        assert_eq!(band_for_total(15), BandLevel::Ready);
    }

    #[test]
    fn out_of_range_rating_is_rejected() {
        let rs = responses(&[6], &[], &[], &[]);
        let e = category_scores(&rs).expect_err("rating 6 must fail");
        assert_eq!(e.code, "bad_params");
        assert!(validate_rating(0).is_err());
    }

    #[test]
    fn weakest_and_strongest_follow_catalog_order_on_ties() {
        let s = CategoryScores {
            data: 3,
            processes: 2,
            people: 2,
            results: 5,
        };
        assert_eq!(s.weakest(), (CategoryId::Processes, 2));
        assert_eq!(s.strongest(), (CategoryId::Results, 5));
        assert_eq!(s.average(), 3.0);

        let tied = CategoryScores {
            data: 5,
            processes: 1,
            people: 5,
            results: 1,
        };
        assert_eq!(tied.weakest(), (CategoryId::Processes, 1));
        assert_eq!(tied.strongest(), (CategoryId::People, 5));
    }

    #[test]
    fn parse_responses_fills_category_from_catalog() {
        let raw = serde_json::json!([
            { "questionId": 1, "rating": 4 },
            { "questionId": 9, "rating": 2, "category": "people" }
        ]);
        let parsed = parse_responses(Some(&raw)).expect("parse");
        assert_eq!(parsed[0].category, CategoryId::Data);
        assert_eq!(parsed[1].category, CategoryId::People);

        let bad = serde_json::json!([{ "questionId": 99, "rating": 3 }]);
        assert!(parse_responses(Some(&bad)).is_err());
    }
}
