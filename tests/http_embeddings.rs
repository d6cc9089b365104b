//! HTTP embedding provider tests against a mock inference server.

use httpmock::prelude::*;
use serde_json::json;

use ragvault::embeddings::{EmbeddingProvider, HttpEmbeddingProvider};
use ragvault::types::RagError;

#[tokio::test]
async fn parses_indexed_data_responses() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/embed");
            then.status(200).json_body(json!({
                "data": [
                    { "embedding": [0.4, 0.5, 0.6], "index": 1 },
                    { "embedding": [0.1, 0.2, 0.3], "index": 0 }
                ]
            }));
        })
        .await;

    let provider = HttpEmbeddingProvider::new(&server.url("/embed"), "test-model", 3).unwrap();
    let vectors = provider
        .embed_batch(&["first".to_string(), "second".to_string()])
        .await
        .unwrap();

    assert_eq!(vectors, vec![vec![0.1, 0.2, 0.3], vec![0.4, 0.5, 0.6]]);
    mock.assert_async().await;
}

#[tokio::test]
async fn parses_flat_embedding_responses() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/embed");
            then.status(200)
                .json_body(json!({ "embeddings": [[1.0, 0.0, 0.0]] }));
        })
        .await;

    let provider = HttpEmbeddingProvider::new(&server.url("/embed"), "test-model", 3).unwrap();
    let vectors = provider.embed_batch(&["only".to_string()]).await.unwrap();
    assert_eq!(vectors, vec![vec![1.0, 0.0, 0.0]]);
}

#[tokio::test]
async fn server_errors_surface_as_embedding_failures() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/embed");
            then.status(503).body("model loading");
        })
        .await;

    let provider = HttpEmbeddingProvider::new(&server.url("/embed"), "test-model", 3).unwrap();
    let err = provider
        .embed_batch(&["text".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::Embedding(_)));
}

#[tokio::test]
async fn count_mismatch_is_an_error_not_a_padded_result() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/embed");
            then.status(200)
                .json_body(json!({ "embeddings": [[0.1, 0.2, 0.3]] }));
        })
        .await;

    let provider = HttpEmbeddingProvider::new(&server.url("/embed"), "test-model", 3).unwrap();
    let err = provider
        .embed_batch(&["one".to_string(), "two".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::Embedding(_)));
}

#[tokio::test]
async fn wrong_dimension_vectors_are_rejected() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(POST).path("/embed");
            then.status(200)
                .json_body(json!({ "embeddings": [[0.1, 0.2]] }));
        })
        .await;

    let provider = HttpEmbeddingProvider::new(&server.url("/embed"), "test-model", 3).unwrap();
    let err = provider
        .embed_batch(&["text".to_string()])
        .await
        .unwrap_err();
    assert!(matches!(err, RagError::Embedding(_)));
}

#[tokio::test]
async fn empty_batch_never_hits_the_network() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(POST).path("/embed");
            then.status(200).json_body(json!({ "embeddings": [] }));
        })
        .await;

    let provider = HttpEmbeddingProvider::new(&server.url("/embed"), "test-model", 3).unwrap();
    let vectors = provider.embed_batch(&[]).await.unwrap();
    assert!(vectors.is_empty());
    assert_eq!(mock.hits_async().await, 0);
}
