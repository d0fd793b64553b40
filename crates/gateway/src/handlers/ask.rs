//! Question answering handler
//!
//! `POST /api/ask`: validate, retrieve reviews, generate an answer,
//! and echo everything back to the caller.

use axum::{
    extract::{rejection::JsonRejection, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::time::Instant;

use crate::AppState;
use reviewqa_common::{
    errors::{AppError, Result},
    metrics,
    retrieval::{Document, Metadata},
};

/// Ask request
#[derive(Debug, Deserialize)]
pub struct AskRequest {
    /// Missing is treated the same as empty
    #[serde(default)]
    pub question: String,
}

/// Ask response
#[derive(Debug, Serialize)]
pub struct AskResponse {
    pub answer: String,
    pub question: String,
    pub reviews: Vec<SerializedReview>,
}

/// A retrieved review as returned to the caller
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SerializedReview {
    pub content: String,
    pub metadata: Metadata,
}

impl SerializedReview {
    /// Never fails: every [`Document`] has content and metadata
    pub fn from_document(doc: &dyn Document) -> Self {
        Self {
            content: doc.content().to_string(),
            metadata: doc.metadata().clone(),
        }
    }
}

/// Answer a question about the restaurant
pub async fn ask(
    State(state): State<AppState>,
    payload: std::result::Result<Json<AskRequest>, JsonRejection>,
) -> Result<Json<AskResponse>> {
    let result = answer_question(&state, payload).await;

    metrics::record_ask(match &result {
        Ok(_) => 200,
        Err(e) => e.status_code().as_u16(),
    });

    result.map(Json)
}

async fn answer_question(
    state: &AppState,
    payload: std::result::Result<Json<AskRequest>, JsonRejection>,
) -> Result<AskResponse> {
    let Json(request) = payload.map_err(|e| AppError::InvalidFormat {
        message: e.body_text(),
    })?;

    let question = request.question.trim();
    if question.is_empty() {
        return Err(AppError::question_required());
    }

    let start = Instant::now();
    let reviews = state.retriever.retrieve(question).await?;
    let retrieval_secs = start.elapsed().as_secs_f64();
    metrics::record_retrieval(retrieval_secs, reviews.len());

    let start = Instant::now();
    let answer = state.answerer.answer(question, &reviews).await?;
    let generation_secs = start.elapsed().as_secs_f64();
    metrics::record_generation(generation_secs, state.answerer.model_name());

    tracing::info!(
        question_len = question.len(),
        reviews = reviews.len(),
        retrieval_ms = (retrieval_secs * 1000.0) as u64,
        generation_ms = (generation_secs * 1000.0) as u64,
        "Question answered"
    );

    Ok(AskResponse {
        answer,
        question: question.to_string(),
        reviews: reviews
            .iter()
            .map(|doc| SerializedReview::from_document(doc))
            .collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::handlers::test_support::*;
    use axum::{
        body::Body,
        http::{Request, StatusCode},
    };
    use serde_json::json;
    use std::sync::atomic::Ordering;
    use std::sync::Arc;

    fn post_ask(body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/ask")
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn steak_reviews() -> Vec<reviewqa_common::ReviewDocument> {
        vec![
            review(
                "Best steak frites in town The ribeye was cooked perfectly.",
                json!({ "rating": 5, "date": "2024-02-11" }),
            ),
            review(
                "Disappointing steak The bavette was chewy and overcooked.",
                json!({ "rating": 2, "date": "2023-11-30" }),
            ),
        ]
    }

    #[tokio::test]
    async fn test_ask_returns_answer_question_and_reviews() {
        let retriever = Arc::new(StubRetriever {
            documents: steak_reviews(),
            ..Default::default()
        });
        let answerer = Arc::new(StubAnswerer::new("Most diners love the steak."));
        let app = router(retriever.clone(), answerer.clone());

        let response = send(app, post_ask(r#"{"question": "What do people say about the steak?"}"#)).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(
            body,
            json!({
                "answer": "Most diners love the steak.",
                "question": "What do people say about the steak?",
                "reviews": [
                    {
                        "content": "Best steak frites in town The ribeye was cooked perfectly.",
                        "metadata": { "rating": 5, "date": "2024-02-11" }
                    },
                    {
                        "content": "Disappointing steak The bavette was chewy and overcooked.",
                        "metadata": { "rating": 2, "date": "2023-11-30" }
                    }
                ]
            })
        );
        assert_eq!(answerer.seen_reviews.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_ask_trims_question() {
        let retriever = Arc::new(StubRetriever::default());
        let answerer = Arc::new(StubAnswerer::new("Yes."));
        let app = router(retriever.clone(), answerer);

        let response = send(app, post_ask(r#"{"question": "  Is there a terrace?\n"}"#)).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["question"], "Is there a terrace?");
        assert_eq!(
            retriever.last_question.lock().unwrap().as_deref(),
            Some("Is there a terrace?")
        );
    }

    #[tokio::test]
    async fn test_ask_with_no_matches_returns_empty_reviews() {
        let app = router(Arc::default(), Arc::new(StubAnswerer::new("No reviews mention that.")));

        let response = send(app, post_ask(r#"{"question": "Do they serve sushi?"}"#)).await;

        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body["answer"], "No reviews mention that.");
        assert_eq!(body["reviews"], json!([]));
    }

    #[tokio::test]
    async fn test_blank_question_rejected_without_invoking_pipeline() {
        for body in [r#"{"question": "   "}"#, r#"{"question": ""}"#, r#"{"question": "\t\n"}"#, "{}"] {
            let retriever = Arc::new(StubRetriever::default());
            let answerer = Arc::new(StubAnswerer::new("unused"));
            let app = router(retriever.clone(), answerer.clone());

            let response = send(app, post_ask(body)).await;

            assert_eq!(response.status(), StatusCode::BAD_REQUEST, "body: {body}");
            assert_eq!(body_json(response).await, json!({ "error": "Question is required" }));
            assert_eq!(retriever.calls.load(Ordering::SeqCst), 0);
            assert_eq!(answerer.calls.load(Ordering::SeqCst), 0);
        }
    }

    #[tokio::test]
    async fn test_malformed_json_is_bad_request() {
        let retriever = Arc::new(StubRetriever::default());
        let app = router(retriever.clone(), Arc::new(StubAnswerer::new("unused")));

        let response = send(app, post_ask(r#"{"question": "#)).await;

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["error"].is_string());
        assert_eq!(retriever.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_retrieval_failure_skips_answerer() {
        let retriever = Arc::new(StubRetriever {
            fail: Some(|| AppError::EmbeddingError { message: "connection refused".into() }),
            ..Default::default()
        });
        let answerer = Arc::new(StubAnswerer::new("unused"));
        let app = router(retriever, answerer.clone());

        let response = send(app, post_ask(r#"{"question": "How is the service?"}"#)).await;

        assert_eq!(response.status(), StatusCode::BAD_GATEWAY);
        let body = body_json(response).await;
        assert_eq!(body["code"], "EMBEDDING_ERROR");
        assert_eq!(answerer.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_vector_store_failure_is_unavailable() {
        let retriever = Arc::new(StubRetriever {
            fail: Some(|| AppError::DatabaseConnection { message: "refused".into() }),
            ..Default::default()
        });
        let app = router(retriever, Arc::new(StubAnswerer::new("unused")));

        let response = send(app, post_ask(r#"{"question": "Is it expensive?"}"#)).await;

        assert_eq!(response.status(), StatusCode::SERVICE_UNAVAILABLE);
    }

    #[tokio::test]
    async fn test_model_timeout_is_gateway_timeout() {
        let mut answerer = StubAnswerer::new("unused");
        answerer.fail = Some(|| AppError::LlmTimeout { timeout_ms: 120_000 });
        let app = router(Arc::default(), Arc::new(answerer));

        let response = send(app, post_ask(r#"{"question": "Any desserts?"}"#)).await;

        assert_eq!(response.status(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body_json(response).await["code"], "LLM_TIMEOUT");
    }

    #[test]
    fn test_serialized_review_copies_content_and_metadata() {
        let doc = review("Lovely onion soup", json!({ "rating": 4 }));
        let serialized = SerializedReview::from_document(&doc);
        assert_eq!(serialized.content, "Lovely onion soup");
        assert_eq!(serialized.metadata["rating"], json!(4));
    }

    #[test]
    fn test_serialized_review_without_metadata() {
        let doc = review("No attributes", json!(null));
        let json = serde_json::to_value(SerializedReview::from_document(&doc)).unwrap();
        assert_eq!(json, json!({ "content": "No attributes", "metadata": {} }));
    }
}
