use serde_json::{Map, Value};

use super::{EvaluationError, ScorePayload};

const FLAT_PRIMARY_KEYS: &[&str] = &["dev_score", "development_score", "primaryScore"];
const FLAT_RISK_KEYS: &[&str] = &["brainrot_index", "riskScore"];
const NESTED_SCORES_KEY: &str = "overall_scores";
const NESTED_PRIMARY_KEYS: &[&str] = &["development_score", "dev_score"];
const NESTED_RISK_KEYS: &[&str] = &["brainrot_index"];

/// Extracts the two headline scores from an evaluator response.
///
/// Both the flat shape (`dev_score`, `brainrot_index` at the top level) and
/// the nested `overall_scores` shape are accepted. The payload itself is kept
/// verbatim for rendering.
pub fn parse_payload(raw: Value) -> Result<ScorePayload, EvaluationError> {
    let object = raw
        .as_object()
        .ok_or_else(|| EvaluationError::BadPayload("response is not a JSON object".into()))?;

    let nested = object.get(NESTED_SCORES_KEY).and_then(Value::as_object);

    let primary = score(
        object,
        FLAT_PRIMARY_KEYS,
        nested,
        NESTED_PRIMARY_KEYS,
        "development score",
    )?;
    let risk = score(object, FLAT_RISK_KEYS, nested, NESTED_RISK_KEYS, "brainrot index")?;

    Ok(ScorePayload {
        primary_score: primary,
        risk_score: risk,
        raw,
    })
}

/// Flat keys are consulted before the nested ones. The first key present
/// decides: a value that is not a finite number rejects the payload.
fn score(
    object: &Map<String, Value>,
    flat_keys: &[&str],
    nested: Option<&Map<String, Value>>,
    nested_keys: &[&str],
    what: &str,
) -> Result<f64, EvaluationError> {
    if let Some(value) = first_number(object, flat_keys)? {
        return Ok(value);
    }
    if let Some(scores) = nested {
        if let Some(value) = first_number(scores, nested_keys)? {
            return Ok(value);
        }
    }
    Err(EvaluationError::BadPayload(format!("missing numeric {what}")))
}

fn first_number(object: &Map<String, Value>, keys: &[&str]) -> Result<Option<f64>, EvaluationError> {
    let Some((key, value)) = keys
        .iter()
        .find_map(|key| object.get(*key).filter(|value| !value.is_null()).map(|value| (key, value)))
    else {
        return Ok(None);
    };
    value
        .as_f64()
        .filter(|number| number.is_finite())
        .map(Some)
        .ok_or_else(|| EvaluationError::BadPayload(format!("{key} is not a number: {value}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn accepts_flat_shape() {
        let payload = parse_payload(json!({
            "dev_score": 68.4,
            "brainrot_index": 20.5,
            "dimension_scores": { "Language": 70.0 }
        }))
        .unwrap();

        assert_eq!(payload.primary_score, 68.4);
        assert_eq!(payload.risk_score, 20.5);
        assert_eq!(payload.raw["dimension_scores"]["Language"], 70.0);
    }

    #[test]
    fn accepts_nested_overall_scores_shape() {
        let payload = parse_payload(json!({
            "overall_scores": { "development_score": 55.0, "brainrot_index": 41.0 },
            "interpretations": { "overall": "Acceptable with supervision" }
        }))
        .unwrap();

        assert_eq!(payload.primary_score, 55.0);
        assert_eq!(payload.risk_score, 41.0);
    }

    #[test]
    fn accepts_camel_case_scores() {
        let payload = parse_payload(json!({ "primaryScore": 68.4, "riskScore": 20.5 })).unwrap();
        assert_eq!(payload.primary_score, 68.4);
        assert_eq!(payload.risk_score, 20.5);
    }

    #[test]
    fn flat_fields_win_over_nested_ones() {
        let payload = parse_payload(json!({
            "dev_score": 10.0,
            "brainrot_index": 90.0,
            "overall_scores": { "development_score": 99.0, "brainrot_index": 1.0 }
        }))
        .unwrap();

        assert_eq!(payload.primary_score, 10.0);
        assert_eq!(payload.risk_score, 90.0);
    }

    #[test]
    fn string_scores_are_rejected() {
        let err = parse_payload(json!({ "dev_score": "68", "brainrot_index": 20 })).unwrap_err();
        assert!(matches!(err, EvaluationError::BadPayload(_)));
    }

    #[test]
    fn string_flat_score_is_rejected_even_with_nested_fallback() {
        let err = parse_payload(json!({
            "dev_score": "68",
            "brainrot_index": 20,
            "overall_scores": { "development_score": 68.0, "brainrot_index": 20.0 }
        }))
        .unwrap_err();
        assert_eq!(
            err,
            EvaluationError::BadPayload("dev_score is not a number: \"68\"".into())
        );
    }

    #[test]
    fn null_flat_score_falls_through_to_nested() {
        let payload = parse_payload(json!({
            "dev_score": null,
            "brainrot_index": 20,
            "overall_scores": { "development_score": 61.0 }
        }))
        .unwrap();
        assert_eq!(payload.primary_score, 61.0);
    }

    #[test]
    fn missing_risk_score_is_rejected() {
        let err = parse_payload(json!({ "overall_scores": { "development_score": 50 } })).unwrap_err();
        assert!(matches!(err, EvaluationError::BadPayload(message) if message.contains("brainrot")));
    }

    #[test]
    fn non_object_payload_is_rejected() {
        let err = parse_payload(json!([1, 2, 3])).unwrap_err();
        assert!(matches!(err, EvaluationError::BadPayload(_)));
    }
}
