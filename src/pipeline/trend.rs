use serde_json::Value;

/// Drops zero-traffic points from a `{ "result": [...] }` trend response.
///
/// Points whose `traffic` is zero or not numeric are removed; everything else,
/// including every field outside `result`, passes through unchanged. A value
/// of any other shape is returned as is.
pub fn clean_trend_response(response: &Value) -> Value {
    let Some(points) = response.get("result").and_then(Value::as_array) else {
        return response.clone();
    };

    let kept: Vec<Value> = points
        .iter()
        .filter(|point| traffic_of(point).is_some_and(|t| !t.is_nan() && t != 0.0))
        .cloned()
        .collect();

    let mut cleaned = response.clone();
    if let Some(object) = cleaned.as_object_mut() {
        object.insert("result".to_string(), Value::Array(kept));
    }
    cleaned
}

// Mirrors loose numeric coercion: numeric strings count, blank and null read as zero.
fn traffic_of(point: &Value) -> Option<f64> {
    match point.get("traffic")? {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return Some(0.0);
            }
            // Only the exact spelling `Infinity` may parse to a non-finite value.
            let parsed = trimmed.parse::<f64>().ok()?;
            let exact_infinity = trimmed.trim_start_matches(['+', '-']) == "Infinity";
            (parsed.is_finite() || exact_infinity).then_some(parsed)
        }
        Value::Bool(b) => Some(if *b { 1.0 } else { 0.0 }),
        Value::Null => Some(0.0),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample() -> Value {
        json!({
            "id": "7",
            "jsonrpc": "2.0",
            "result": [
                {"date": "2024-01", "traffic": 0},
                {"date": "2024-02", "traffic": 120},
                {"date": "2024-03", "traffic": "abc"},
                {"date": "2024-04", "traffic": "35"},
                {"date": "2024-05"},
                {"date": "2024-06", "traffic": 8.5}
            ]
        })
    }

    #[test]
    fn removes_zero_and_non_numeric_points_in_order() {
        let cleaned = clean_trend_response(&sample());
        let dates: Vec<&str> = cleaned["result"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["date"].as_str().unwrap())
            .collect();
        assert_eq!(dates, vec!["2024-02", "2024-04", "2024-06"]);
    }

    #[test]
    fn preserves_other_fields() {
        let cleaned = clean_trend_response(&sample());
        assert_eq!(cleaned["id"], "7");
        assert_eq!(cleaned["jsonrpc"], "2.0");
        assert_eq!(cleaned.as_object().unwrap().len(), 3);
    }

    #[test]
    fn only_exact_infinity_spelling_is_traffic() {
        let response = json!({
            "result": [
                {"date": "a", "traffic": "inf"},
                {"date": "b", "traffic": "infinity"},
                {"date": "c", "traffic": "NaN"},
                {"date": "d", "traffic": "-INF"},
                {"date": "e", "traffic": "Infinity"},
                {"date": "f", "traffic": "-Infinity"}
            ]
        });
        let cleaned = clean_trend_response(&response);
        let dates: Vec<&str> = cleaned["result"]
            .as_array()
            .unwrap()
            .iter()
            .map(|p| p["date"].as_str().unwrap())
            .collect();
        assert_eq!(dates, vec!["e", "f"]);
    }

    #[test]
    fn cleaning_is_idempotent() {
        let once = clean_trend_response(&sample());
        let twice = clean_trend_response(&once);
        assert_eq!(once, twice);
    }

    #[test]
    fn other_shapes_pass_through() {
        for value in [
            Value::Null,
            json!("raw text"),
            json!([1, 2, 3]),
            json!({"result": {"traffic": 0}}),
            json!({"error": "nope"}),
        ] {
            assert_eq!(clean_trend_response(&value), value);
        }
    }
}
