//! Serving the bundle over HTTP
//!
//! Every request rebuilds through the shared package, so edits show up on
//! reload while unchanged files come from the compile cache. Failures are
//! delivered as a script that throws, which makes them visible in the page
//! that loads the bundle.

use std::{net::SocketAddr, sync::Arc};

use anyhow::{Context, Result};
use axum::{Router, extract::State, routing::get};
use http::{Response, StatusCode, header};
use log::{error, info};
use tokio::sync::Mutex;

use crate::{error::BundleError, package::Package};

pub const CONTENT_TYPE: &str = "text/javascript";

/// HTTP response for the outcome of one build
pub fn respond(outcome: Result<String, BundleError>) -> Response<String> {
    let (status, body) = match outcome {
        Ok(bundle) => (StatusCode::OK, bundle),
        Err(err) => {
            error!("Build failed during {}: {err}", err.stage());
            (StatusCode::INTERNAL_SERVER_ERROR, throwing_script(&err))
        }
    };
    let mut response = Response::new(body);
    *response.status_mut() = status;
    response.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static(CONTENT_TYPE),
    );
    response
}

/// Script that raises `err` when evaluated
pub fn throwing_script(err: &BundleError) -> String {
    let message = serde_json::Value::from(err.to_string());
    format!("throw new Error({message});")
}

type SharedPackage = Arc<Mutex<Package>>;

async fn bundle(State(package): State<SharedPackage>) -> Response<String> {
    // Builds on one package must not overlap
    let mut package = package.lock().await;
    respond(package.build().await)
}

/// Router serving the bundle at `route`
pub fn router(package: Package, route: &str) -> Router {
    Router::new()
        .route(route, get(bundle))
        .with_state(Arc::new(Mutex::new(package)))
}

/// Serve until the process is stopped
pub async fn serve(package: Package, addr: SocketAddr, route: &str) -> Result<()> {
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("failed to bind {addr}"))?;
    info!("Serving bundle at http://{addr}{route}");
    axum::serve(listener, router(package, route))
        .await
        .context("server error")
}

#[cfg(test)]
mod tests {
    use std::path::PathBuf;

    use super::*;

    #[test]
    fn test_success_response() {
        let response = respond(Ok("var a;".to_owned()));
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[header::CONTENT_TYPE], CONTENT_TYPE);
        assert_eq!(response.body(), "var a;");
    }

    #[test]
    fn test_failure_response_throws() {
        let response = respond(Err(BundleError::Translation {
            path: PathBuf::from("lib/app.coffee"),
            message: "missing \"".to_owned(),
        }));
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(response.headers()[header::CONTENT_TYPE], CONTENT_TYPE);
        assert_eq!(
            response.body(),
            r#"throw new Error("can't compile lib/app.coffee\nmissing \"");"#
        );
    }
}
