//! API handlers module

pub mod ask;
pub mod health;

use axum::response::Redirect;

/// `GET /` sends browsers to the frontend
pub async fn root_redirect() -> Redirect {
    Redirect::temporary("/app/")
}

#[cfg(test)]
pub(crate) mod test_support {
    //! Stub pipeline components and request helpers for handler tests

    use crate::AppState;
    use async_trait::async_trait;
    use axum::{body::Body, http::Request, response::Response, Router};
    use reviewqa_common::{
        errors::{AppError, Result},
        retrieval::Metadata,
        Answerer, ReviewDocument, Retriever,
    };
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tower::ServiceExt;

    /// Returns a fixed list of documents, or fails when `fail` is set
    #[derive(Default)]
    pub struct StubRetriever {
        pub documents: Vec<ReviewDocument>,
        pub fail: Option<fn() -> AppError>,
        pub calls: AtomicUsize,
        pub last_question: std::sync::Mutex<Option<String>>,
    }

    #[async_trait]
    impl Retriever for StubRetriever {
        async fn retrieve(&self, question: &str) -> Result<Vec<ReviewDocument>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            *self.last_question.lock().unwrap() = Some(question.to_string());
            match self.fail {
                Some(make_err) => Err(make_err()),
                None => Ok(self.documents.clone()),
            }
        }

        async fn ping(&self) -> Result<()> {
            match self.fail {
                Some(make_err) => Err(make_err()),
                None => Ok(()),
            }
        }
    }

    /// Returns a fixed answer, or fails when `fail` is set
    pub struct StubAnswerer {
        pub answer: String,
        pub fail: Option<fn() -> AppError>,
        pub calls: AtomicUsize,
        pub seen_reviews: AtomicUsize,
    }

    impl StubAnswerer {
        pub fn new(answer: &str) -> Self {
            Self {
                answer: answer.to_string(),
                fail: None,
                calls: AtomicUsize::new(0),
                seen_reviews: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait]
    impl Answerer for StubAnswerer {
        async fn answer(&self, _question: &str, reviews: &[ReviewDocument]) -> Result<String> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.seen_reviews.store(reviews.len(), Ordering::SeqCst);
            match self.fail {
                Some(make_err) => Err(make_err()),
                None => Ok(self.answer.clone()),
            }
        }

        fn model_name(&self) -> &str {
            "stub-model"
        }
    }

    pub fn review(content: &str, metadata: serde_json::Value) -> ReviewDocument {
        let metadata = match metadata {
            serde_json::Value::Object(map) => map,
            _ => Metadata::new(),
        };
        ReviewDocument::new(content, metadata)
    }

    pub fn router(retriever: Arc<StubRetriever>, answerer: Arc<StubAnswerer>) -> Router {
        router_with_static(retriever, answerer, "does-not-exist")
    }

    pub fn router_with_static(
        retriever: Arc<StubRetriever>,
        answerer: Arc<StubAnswerer>,
        static_dir: &str,
    ) -> Router {
        let state = AppState { retriever, answerer };
        crate::create_router(state, static_dir)
    }

    pub async fn send(app: Router, request: Request<Body>) -> Response {
        app.oneshot(request).await.unwrap()
    }

    pub async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    pub fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use axum::{
        body::Body,
        http::{header, Method, Request, StatusCode},
    };
    use std::sync::Arc;

    #[tokio::test]
    async fn test_root_redirects_to_frontend() {
        let app = router(Arc::default(), Arc::new(StubAnswerer::new("unused")));
        let response = send(app, get("/")).await;

        assert_eq!(response.status(), StatusCode::TEMPORARY_REDIRECT);
        assert_eq!(response.headers()[header::LOCATION], "/app/");
    }

    #[tokio::test]
    async fn test_frontend_served_under_app() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("index.html"), "<h1>Reviews</h1>").unwrap();

        let app = router_with_static(
            Arc::default(),
            Arc::new(StubAnswerer::new("unused")),
            dir.path().to_str().unwrap(),
        );
        let response = send(app, get("/app/")).await;

        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"<h1>Reviews</h1>");
    }

    #[tokio::test]
    async fn test_request_id_header_is_set() {
        let app = router(Arc::default(), Arc::new(StubAnswerer::new("unused")));
        let response = send(app, get("/api/health")).await;
        assert!(response.headers().contains_key("x-request-id"));
    }

    #[tokio::test]
    async fn test_caller_request_id_is_echoed() {
        let app = router(Arc::default(), Arc::new(StubAnswerer::new("unused")));
        let request = Request::builder()
            .uri("/api/health")
            .header("x-request-id", "abc")
            .body(Body::empty())
            .unwrap();

        let response = send(app, request).await;

        assert_eq!(response.headers()["x-request-id"], "abc");
    }

    #[tokio::test]
    async fn test_cors_preflight_allows_any_origin() {
        let app = router(Arc::default(), Arc::new(StubAnswerer::new("unused")));
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/api/ask")
            .header(header::ORIGIN, "http://localhost:3000")
            .header(header::ACCESS_CONTROL_REQUEST_METHOD, "POST")
            .header(header::ACCESS_CONTROL_REQUEST_HEADERS, "content-type")
            .body(Body::empty())
            .unwrap();

        let response = send(app, request).await;

        assert_eq!(response.status(), StatusCode::OK);
        let headers = response.headers();
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_METHODS], "*");
        assert_eq!(headers[header::ACCESS_CONTROL_ALLOW_HEADERS], "*");
    }

    #[tokio::test]
    async fn test_cors_header_on_simple_request() {
        let app = router(Arc::default(), Arc::new(StubAnswerer::new("unused")));
        let request = Request::builder()
            .uri("/api/health")
            .header(header::ORIGIN, "https://reviews.example")
            .body(Body::empty())
            .unwrap();

        let response = send(app, request).await;

        assert_eq!(response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN], "*");
    }
}
