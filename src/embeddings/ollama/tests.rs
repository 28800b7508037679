use super::*;
use crate::embeddings::embedder::{Embedding, embed_query};
use serde_json::json;
use std::sync::Arc;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn config_for(server: &MockServer, dimension: u32) -> OllamaConfig {
    let address = server.address();
    OllamaConfig {
        host: address.ip().to_string(),
        port: address.port(),
        embedding_dimension: dimension,
        model: "all-minilm".to_string(),
        ..OllamaConfig::default()
    }
}

async fn mount_tags(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [
                { "name": "nomic-embed-text:latest" },
                { "name": "all-minilm:latest", "size": 45_960_996_u64 }
            ]
        })))
        .mount(server)
        .await;
}

#[test]
fn client_configuration() {
    let config = OllamaConfig {
        protocol: "http".to_string(),
        host: "test-host".to_string(),
        port: 1234,
        model: "test-model".to_string(),
        ..OllamaConfig::default()
    };
    let client = OllamaClient::new(&config).expect("Failed to create client");

    assert_eq!(client.model, "test-model");
    assert_eq!(client.dimension, DEFAULT_EMBEDDING_DIMENSION as usize);
    assert_eq!(client.base_url.host_str(), Some("test-host"));
    assert_eq!(client.base_url.port(), Some(1234));
    assert!(client.model_ready.get().is_none());
}

#[test]
fn tagged_model_names_match() {
    assert!(model_matches("all-minilm:latest", "all-minilm"));
    assert!(model_matches("all-minilm:latest", "all-minilm:latest"));
    assert!(!model_matches("all-minilm:l6-v2", "all-minilm"));
    assert!(!model_matches("all-minilm:latest", "all-minilm:l6-v2"));
    assert!(!model_matches("nomic-embed-text:latest", "all-minilm"));
}

#[tokio::test(flavor = "multi_thread")]
async fn embeds_batch_through_api() {
    let server = MockServer::start().await;
    mount_tags(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .and(body_partial_json(json!({ "model": "all-minilm", "input": ["first", "second"] })))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "model": "all-minilm",
            "embeddings": [[0.1, 0.2, 0.3], [0.4, 0.5, 0.6]]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = OllamaClient::new(&config_for(&server, 3)).expect("should create client");
    let vectors = tokio::task::spawn_blocking(move || {
        client.embed_batch(&["first".to_string(), "second".to_string()])
    })
    .await
    .expect("blocking task should complete")
    .expect("embedding should succeed");

    assert_eq!(vectors, vec![vec![0.1, 0.2, 0.3], vec![0.4, 0.5, 0.6]]);
}

#[tokio::test(flavor = "multi_thread")]
async fn model_availability_is_checked_once() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{ "name": "all-minilm:latest" }]
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[1.0, 0.0]]
        })))
        .expect(2)
        .mount(&server)
        .await;

    let client = OllamaClient::new(&config_for(&server, 2)).expect("should create client");
    tokio::task::spawn_blocking(move || {
        client
            .embed_batch(&["a".to_string()])
            .expect("first call should succeed");
        client
            .embed_batch(&["b".to_string()])
            .expect("second call should succeed");
    })
    .await
    .expect("blocking task should complete");
}

#[tokio::test(flavor = "multi_thread")]
async fn missing_model_degrades_query() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "models": [{ "name": "nomic-embed-text:latest" }]
        })))
        .mount(&server)
        .await;

    let client = Arc::new(OllamaClient::new(&config_for(&server, 384)).expect("should create client"));
    let embedding = tokio::task::spawn_blocking(move || embed_query(&client, "test query"))
        .await
        .expect("blocking task should complete");

    assert!(embedding.is_degraded());
    assert_eq!(embedding.vector().len(), 384);
    assert!(embedding.vector().iter().all(|&x| x == 0.0));
}

#[tokio::test(flavor = "multi_thread")]
async fn server_error_is_not_retried() {
    let server = MockServer::start().await;
    mount_tags(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(500))
        .expect(1)
        .mount(&server)
        .await;

    let client = OllamaClient::new(&config_for(&server, 3)).expect("should create client");
    let result = tokio::task::spawn_blocking(move || client.embed_batch(&["x".to_string()]))
        .await
        .expect("blocking task should complete");

    let error = result.expect_err("server error should fail the batch");
    assert!(format!("{:#}", error).contains("500"));
}

#[test]
fn unreachable_server_degrades_query() {
    let config = OllamaConfig {
        host: "127.0.0.1".to_string(),
        port: 9,
        ..OllamaConfig::default()
    };
    let client = OllamaClient::new(&config)
        .expect("should create client")
        .with_timeout(Duration::from_secs(2));

    let embedding = embed_query(&client, "anything");

    assert!(embedding.is_degraded());
    assert_eq!(
        embedding.vector().len(),
        DEFAULT_EMBEDDING_DIMENSION as usize
    );
}

#[test]
fn empty_batch_skips_the_server() {
    let config = OllamaConfig {
        host: "127.0.0.1".to_string(),
        port: 9,
        ..OllamaConfig::default()
    };
    let client = OllamaClient::new(&config).expect("should create client");

    let vectors = client.embed_batch(&[]).expect("empty batch should succeed");

    assert!(vectors.is_empty());
    assert!(client.model_ready.get().is_none());
}

#[tokio::test(flavor = "multi_thread")]
async fn failed_model_check_is_retried_on_next_call() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/tags"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_tags(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/embed"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "embeddings": [[0.6, 0.8]]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = Arc::new(OllamaClient::new(&config_for(&server, 2)).expect("should create client"));
    let (first, second, ready) = tokio::task::spawn_blocking(move || {
        let first = embed_query(&client, "during outage");
        let second = embed_query(&client, "after recovery");
        (first, second, client.model_ready.get().is_some())
    })
    .await
    .expect("blocking task should complete");

    assert!(first.is_degraded());
    assert_eq!(second, Embedding::Model(vec![0.6, 0.8]));
    assert!(ready);
}
