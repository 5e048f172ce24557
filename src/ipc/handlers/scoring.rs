use crate::ipc::error::{err, ok};
use crate::ipc::types::{AppState, Request};
use crate::scoring;
use serde_json::json;

fn handle_evaluate(req: &Request) -> serde_json::Value {
    let outcome = match scoring::parse_responses(req.params.get("responses"))
        .and_then(|rs| scoring::evaluate(&rs))
    {
        Ok(v) => v,
        Err(e) => return err(&req.id, &e.code, e.message, e.details),
    };
    let (weakest, weakest_score) = outcome.category_scores.weakest();
    let (strongest, strongest_score) = outcome.category_scores.strongest();
    let mut result = json!(outcome);
    result["weakest"] = json!({ "category": weakest, "score": weakest_score });
    result["strongest"] = json!({ "category": strongest, "score": strongest_score });
    ok(&req.id, result)
}

pub fn try_handle(_state: &mut AppState, req: &Request) -> Option<serde_json::Value> {
    match req.method.as_str() {
        "scoring.evaluate" => Some(handle_evaluate(req)),
        _ => None,
    }
}
