use serde_json::Value;

use super::{trend::clean_trend_response, whitelist::Whitelist};
use crate::domain::{Accepted, CaptureEvent, ClassificationResult, MatchReason};

/// Interprets a captured body as JSON when it arrived as text.
///
/// Text that is not valid JSON is kept verbatim; empty text reads as `null`.
pub fn parse_body(raw: &Value) -> Value {
    match raw {
        Value::String(text) if text.is_empty() => Value::Null,
        Value::String(text) => serde_json::from_str(text).unwrap_or_else(|_| raw.clone()),
        other => other.clone(),
    }
}

pub fn classify_event(whitelist: &Whitelist, event: &CaptureEvent) -> ClassificationResult {
    classify(
        whitelist,
        &event.url,
        &event.request_body,
        &event.response_body,
    )
}

pub fn classify(
    whitelist: &Whitelist,
    url: &str,
    request_body: &Value,
    response_body: &Value,
) -> ClassificationResult {
    let request = parse_body(request_body);
    let response = parse_body(response_body);

    if let Some(marker) = whitelist.url_marker(url) {
        return ClassificationResult::Accepted(Accepted {
            request,
            response,
            reason: MatchReason::Url(marker.to_string()),
        });
    }

    match &request {
        Value::Array(items) => classify_batch(whitelist, items, &response),
        Value::Object(_) => classify_single(whitelist, request.clone(), response),
        _ => ClassificationResult::Rejected,
    }
}

fn classify_batch(
    whitelist: &Whitelist,
    items: &[Value],
    response: &Value,
) -> ClassificationResult {
    let kept: Vec<&Value> = items
        .iter()
        .filter(|item| method_of(item).is_some_and(|m| whitelist.allows_method(m)))
        .collect();
    if kept.is_empty() {
        return ClassificationResult::Rejected;
    }

    let accepted_ids: Vec<&Value> = kept
        .iter()
        .filter_map(|item| item.get("id"))
        .filter(|id| is_truthy(id))
        .collect();

    let responses: Vec<Value> = match response {
        Value::Array(entries) => entries
            .iter()
            .filter_map(|entry| {
                let id = entry.get("id").filter(|id| is_truthy(id))?;
                if !accepted_ids.contains(&id) {
                    return None;
                }
                let is_trend = kept
                    .iter()
                    .find(|item| item.get("id") == Some(id))
                    .and_then(|item| method_of(item))
                    .is_some_and(|m| whitelist.is_trend_method(m));
                Some(if is_trend {
                    clean_trend_response(entry)
                } else {
                    entry.clone()
                })
            })
            .collect(),
        _ => Vec::new(),
    };

    ClassificationResult::Accepted(Accepted {
        request: Value::Array(kept.into_iter().cloned().collect()),
        response: Value::Array(responses),
        reason: MatchReason::RpcBatch,
    })
}

fn classify_single(whitelist: &Whitelist, request: Value, response: Value) -> ClassificationResult {
    let Some(method) = method_of(&request)
        .filter(|m| whitelist.allows_method(m))
        .map(str::to_string)
    else {
        return ClassificationResult::Rejected;
    };

    let response = if whitelist.is_trend_method(&method) {
        clean_trend_response(&response)
    } else {
        response
    };

    ClassificationResult::Accepted(Accepted {
        request,
        response,
        reason: MatchReason::Rpc(method),
    })
}

fn method_of(item: &Value) -> Option<&str> {
    item.get("method").and_then(Value::as_str)
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(_) | Value::Object(_) => true,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn whitelist() -> Whitelist {
        Whitelist::default()
    }

    fn accept(result: ClassificationResult) -> Accepted {
        result.accepted().expect("expected acceptance")
    }

    #[test]
    fn url_gate_accepts_regardless_of_body() {
        let wl = whitelist();
        for (req, res) in [
            (Value::Null, Value::Null),
            (json!("not json {"), json!(42)),
            (json!([{"method": "currency.Rates", "id": 1}]), json!([])),
        ] {
            let accepted = accept(classify(
                &wl,
                "https://s1.example/backlinks/webapi2/overview/counters?x=1",
                &req,
                &res,
            ));
            assert!(accepted.reason.to_string().starts_with("URL:"));
        }
    }

    #[test]
    fn url_gate_keeps_parsed_bodies_without_filtering() {
        let wl = whitelist();
        let req = json!(r#"[{"method":"currency.Rates","id":"1"}]"#);
        let res = json!(r#"{"result":[{"traffic":0}]}"#);
        let accepted = accept(classify(&wl, "https://x/?action=report", &req, &res));
        assert_eq!(accepted.reason, MatchReason::Url("action=report".into()));
        assert_eq!(accepted.request, json!([{"method": "currency.Rates", "id": "1"}]));
        assert_eq!(accepted.response, json!({"result": [{"traffic": 0}]}));
    }

    #[test]
    fn rejects_missing_or_scalar_requests() {
        let wl = whitelist();
        let url = "https://x/y?action=invite-button";
        assert_eq!(classify(&wl, url, &Value::Null, &Value::Null), ClassificationResult::Rejected);
        assert_eq!(
            classify(&wl, url, &json!("plain text"), &Value::Null),
            ClassificationResult::Rejected
        );
        assert_eq!(classify(&wl, url, &json!("12"), &Value::Null), ClassificationResult::Rejected);
        assert_eq!(classify(&wl, url, &json!(""), &Value::Null), ClassificationResult::Rejected);
    }

    #[test]
    fn batch_without_whitelisted_methods_is_rejected() {
        let wl = whitelist();
        let req = json!([
            {"method": "currency.Rates", "id": "1"},
            {"method": "user.Info", "id": "2"}
        ]);
        let res = json!([{"id": "1", "result": {}}, {"id": "2", "result": {}}]);
        assert_eq!(classify(&wl, "https://x/rpc", &req, &res), ClassificationResult::Rejected);
        assert_eq!(
            classify(&wl, "https://x/rpc", &json!([]), &res),
            ClassificationResult::Rejected
        );
    }

    #[test]
    fn batch_keeps_only_matching_responses() {
        let wl = whitelist();
        let req = json!([
            {"method": "backlinks.Summary", "id": "X"},
            {"method": "currency.Rates", "id": "Y"}
        ]);
        let res = json!([
            {"id": "Y", "result": {"usd": 1}},
            {"id": "X", "result": {"total": 5}},
            {"id": "Z", "result": {}},
            {"result": "no id"}
        ]);
        let accepted = accept(classify(&wl, "https://x/rpc", &req, &res));
        assert_eq!(accepted.reason, MatchReason::RpcBatch);
        assert_eq!(accepted.request, json!([{"method": "backlinks.Summary", "id": "X"}]));
        assert_eq!(accepted.response, json!([{"id": "X", "result": {"total": 5}}]));
    }

    #[test]
    fn batch_ids_compare_by_type() {
        let wl = whitelist();
        let req = json!([{"method": "backlinks.Overview", "id": 3}]);
        let res = json!([{"id": "3", "result": 1}, {"id": 3, "result": 2}]);
        let accepted = accept(classify(&wl, "https://x/rpc", &req, &res));
        assert_eq!(accepted.response, json!([{"id": 3, "result": 2}]));
    }

    #[test]
    fn batch_with_non_array_response_keeps_requests() {
        let wl = whitelist();
        let req = json!([{"method": "backlinks.Summary", "id": "1"}]);
        let accepted = accept(classify(&wl, "https://x/rpc", &req, &json!({"oops": true})));
        assert_eq!(accepted.response, json!([]));
        assert_eq!(accepted.request.as_array().unwrap().len(), 1);
    }

    #[test]
    fn batch_trend_responses_are_cleaned() {
        let wl = whitelist();
        let req = json!([
            {"method": "organic.OverviewTrend", "id": "t"},
            {"method": "backlinks.Summary", "id": "s"}
        ]);
        let res = json!([
            {"id": "t", "result": [{"traffic": 0}, {"traffic": 9}]},
            {"id": "s", "result": [{"traffic": 0}]}
        ]);
        let accepted = accept(classify(&wl, "https://x/rpc", &req, &res));
        assert_eq!(
            accepted.response,
            json!([
                {"id": "t", "result": [{"traffic": 9}]},
                {"id": "s", "result": [{"traffic": 0}]}
            ])
        );
    }

    #[test]
    fn batch_bodies_may_arrive_as_text() {
        let wl = whitelist();
        let req = json!(r#"[{"method":"backlinks.Summary","id":"1"}]"#);
        let res = json!(r#"[{"id":"1","result":{"ok":true}}]"#);
        let accepted = accept(classify(&wl, "https://x/rpc", &req, &res));
        assert_eq!(accepted.response, json!([{"id": "1", "result": {"ok": true}}]));
    }

    #[test]
    fn single_request_is_gated_by_method() {
        let wl = whitelist();
        let accepted = accept(classify(
            &wl,
            "https://x/rpc",
            &json!({"method": "backlinks.Overview", "params": {}}),
            &json!({"result": [{"traffic": 0}]}),
        ));
        assert_eq!(accepted.reason.to_string(), "RPC:backlinks.Overview");
        assert_eq!(accepted.response, json!({"result": [{"traffic": 0}]}));

        assert_eq!(
            classify(&wl, "https://x/rpc", &json!({"method": "currency.Rates"}), &Value::Null),
            ClassificationResult::Rejected
        );
        assert_eq!(
            classify(&wl, "https://x/rpc", &json!({"params": {}}), &Value::Null),
            ClassificationResult::Rejected
        );
    }

    #[test]
    fn single_trend_request_is_cleaned() {
        let wl = whitelist();
        let accepted = accept(classify(
            &wl,
            "https://x/rpc",
            &json!({"method": "organic.OverviewTrend"}),
            &json!({"id": 1, "result": [{"traffic": 0}, {"traffic": "4"}]}),
        ));
        assert_eq!(accepted.response, json!({"id": 1, "result": [{"traffic": "4"}]}));
    }

    #[test]
    fn reclassifying_accepted_output_is_stable() {
        let wl = whitelist();
        let req = json!([
            {"method": "organic.OverviewTrend", "id": "t"},
            {"method": "user.Info", "id": "u"}
        ]);
        let res = json!([
            {"id": "t", "result": [{"traffic": 0}, {"traffic": 2}]},
            {"id": "u", "result": {}}
        ]);
        let first = accept(classify(&wl, "https://x/rpc", &req, &res));
        let second = accept(classify(&wl, "https://x/rpc", &first.request, &first.response));
        assert_eq!(first, second);
    }
}
