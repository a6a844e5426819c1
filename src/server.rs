use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use axum::{
    extract::{Query, State},
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::get,
    Router,
};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tower_http::{services::ServeDir, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{error, info};

use crate::{
    probe::Prober,
    scanner::{self, ScanConfig},
};

/// Target scanned when the request does not name one.
pub const DEFAULT_TARGET: &str = "localhost";

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ScanConfig>,
    pub prober: Arc<dyn Prober>,
    pub ui_dir: PathBuf,
}

/// Build the HTTP app: `GET /scan` plus the static UI for everything else.
///
/// `/scan` answers GET only. axum routes HEAD to GET handlers, so HEAD gets
/// its own 405 handler.
pub fn router(state: AppState) -> Router {
    let static_svc = ServeDir::new(&state.ui_dir).append_index_html_on_directories(true);

    let api = Router::new()
        .route("/scan", get(get_scan).head(method_not_allowed))
        .layer(SetResponseHeaderLayer::overriding(
            header::CACHE_CONTROL,
            HeaderValue::from_static("no-store"),
        ))
        .with_state(state);

    Router::new()
        .merge(api)
        .fallback_service(static_svc)
        .layer(TraceLayer::new_for_http())
}

pub async fn spawn_server(bind: &str, state: AppState) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("failed to bind {bind}"))?;
    info!(addr = %listener.local_addr()?, "serving UI");
    axum::serve(listener, router(state))
        .await
        .context("HTTP server error")?;
    Ok(())
}

async fn get_scan(
    State(app): State<AppState>,
    Query(params): Query<Vec<(String, String)>>,
) -> Response {
    let target = target_from_query(&params);

    let results = scanner::scan_with(
        &target,
        app.prober.clone(),
        &app.config,
        CancellationToken::new(),
    )
    .await;
    json_response(&results)
}

async fn method_not_allowed() -> StatusCode {
    StatusCode::METHOD_NOT_ALLOWED
}

/// First non-blank `target` parameter, or [`DEFAULT_TARGET`]. Repeated
/// `target` keys are not an error; later ones are ignored.
pub fn target_from_query(params: &[(String, String)]) -> String {
    params
        .iter()
        .find(|(k, _)| k == "target")
        .map(|(_, v)| v.trim())
        .filter(|t| !t.is_empty())
        .unwrap_or(DEFAULT_TARGET)
        .to_string()
}

/// Encode `body` as a JSON response, or a 500 if encoding fails.
pub fn json_response<T: Serialize + ?Sized>(body: &T) -> Response {
    match serde_json::to_vec(body) {
        Ok(bytes) => (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            bytes,
        )
            .into_response(),
        Err(e) => {
            error!(error = %e, "failed to encode scan results");
            (StatusCode::INTERNAL_SERVER_ERROR, "failed to encode response").into_response()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::ser::Error as _;

    struct Unencodable;

    impl Serialize for Unencodable {
        fn serialize<S: serde::Serializer>(&self, _s: S) -> std::result::Result<S::Ok, S::Error> {
            Err(S::Error::custom("boom"))
        }
    }

    fn pairs(raw: &[(&str, &str)]) -> Vec<(String, String)> {
        raw.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn first_target_wins() {
        let params = pairs(&[("target", "a"), ("target", "b")]);
        assert_eq!(target_from_query(&params), "a");
    }

    #[test]
    fn blank_or_missing_target_falls_back() {
        assert_eq!(target_from_query(&[]), DEFAULT_TARGET);
        assert_eq!(target_from_query(&pairs(&[("target", "  ")])), DEFAULT_TARGET);
        assert_eq!(target_from_query(&pairs(&[("port", "22")])), DEFAULT_TARGET);
    }

    #[test]
    fn encode_failure_is_internal_error() {
        let resp = json_response(&Unencodable);
        assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    }

    #[test]
    fn encoded_results_are_json() {
        let resp = json_response(&[crate::types::ProbeOutcome::open(22)]);
        assert_eq!(resp.status(), StatusCode::OK);
        assert_eq!(
            resp.headers().get(header::CONTENT_TYPE).unwrap(),
            "application/json"
        );
    }
}
