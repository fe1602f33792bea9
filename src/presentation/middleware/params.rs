//! HTTP parameter pollution guard.
//!
//! A repeated query key (`?sort=a&sort=b`) is collapsed to its last value
//! before handlers see it. The collapsed keys are recorded in a
//! [`PollutedParams`] request extension.

use std::collections::HashMap;

use axum::{
    extract::Request,
    http::{uri::PathAndQuery, Uri},
    middleware::Next,
    response::Response,
};

/// Query keys that appeared more than once in the original request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PollutedParams(pub Vec<String>);

pub async fn parameter_pollution_guard(mut request: Request, next: Next) -> Response {
    let rewritten = request
        .uri()
        .query()
        .and_then(dedupe_query)
        .and_then(|(query, polluted)| {
            let uri = with_query(request.uri(), &query)?;
            Some((uri, polluted))
        });

    if let Some((uri, polluted)) = rewritten {
        tracing::debug!(params = ?polluted, "Collapsed repeated query parameters");
        *request.uri_mut() = uri;
        request.extensions_mut().insert(PollutedParams(polluted));
    }

    next.run(request).await
}

/// Collapse repeated keys to their last value, keeping first-seen order.
/// Returns `None` when nothing is repeated.
pub fn dedupe_query(query: &str) -> Option<(String, Vec<String>)> {
    let mut order: Vec<(&str, &str)> = Vec::new();
    let mut index: HashMap<&str, usize> = HashMap::new();
    let mut polluted: Vec<String> = Vec::new();

    for pair in query.split('&').filter(|p| !p.is_empty()) {
        let key = pair.split_once('=').map_or(pair, |(k, _)| k);
        match index.get(key) {
            Some(&i) => {
                order[i].1 = pair;
                if !polluted.iter().any(|p| p == key) {
                    polluted.push(key.to_string());
                }
            }
            None => {
                index.insert(key, order.len());
                order.push((key, pair));
            }
        }
    }

    if polluted.is_empty() {
        return None;
    }

    let query = order.iter().map(|(_, pair)| *pair).collect::<Vec<_>>().join("&");
    Some((query, polluted))
}

fn with_query(uri: &Uri, query: &str) -> Option<Uri> {
    let mut parts = uri.clone().into_parts();
    let path_and_query = format!("{}?{}", uri.path(), query);
    parts.path_and_query = Some(PathAndQuery::try_from(path_and_query).ok()?);
    Uri::from_parts(parts).ok()
}
