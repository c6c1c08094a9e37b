mod common;

use common::*;
use docsearch::error::GatewayError;
use docsearch::get::get_document;
use docsearch::models::Document;
use std::sync::Arc;

#[tokio::test]
async fn test_insert_then_search_finds_document() {
    let h = harness().await;
    h.engine.create_index(DIMS).await.unwrap();

    let id = h
        .services
        .ingestor
        .insert_document(doc("A", "greeting", "Hello world"))
        .await
        .unwrap();

    let hits = h.services.pipeline.retrieve("hello", 10).await.unwrap();
    assert_eq!(hits.len(), 1);
    assert_eq!(hits[0].id, id.id);
    assert_eq!(hits[0].document.name.as_deref(), Some("A"));
    assert!(hits[0].blended_score > 0.0);
}

#[tokio::test]
async fn test_reindex_then_search_ranks_lexical_match_first() {
    let h = harness().await;
    let path = write_corpus(&h);

    let report = h.services.ingestor.reindex(&path).await;
    assert!(report.is_success(), "{:?}", report);
    assert_eq!(report.processed, 3);
    assert_eq!(report.succeeded, 3);

    let hits = h
        .services
        .pipeline
        .retrieve("reset password", 3)
        .await
        .unwrap();
    assert_eq!(hits[0].document.name.as_deref(), Some("Password Reset"));
    assert!(hits[0].lexical_score.is_some());
}

#[tokio::test]
async fn test_search_before_index_exists_is_engine_unavailable() {
    let h = harness().await;
    let err = h.services.pipeline.retrieve("anything", 5).await.unwrap_err();
    assert!(matches!(err, GatewayError::SearchEngineUnavailable(_)));
}

#[tokio::test]
async fn test_results_are_ordered_and_bounded() {
    let h = harness().await;
    let path = write_corpus(&h);
    h.services.ingestor.reindex(&path).await;

    for top_k in 1..=4 {
        let hits = h.services.pipeline.retrieve("support open", top_k).await.unwrap();
        assert!(hits.len() <= top_k as usize);
        for pair in hits.windows(2) {
            assert!(pair[0].blended_score >= pair[1].blended_score);
        }
    }
}

#[tokio::test]
async fn test_search_page_reports_total_and_offsets() {
    let h = harness().await;
    let path = write_corpus(&h);
    h.services.ingestor.reindex(&path).await;

    let first = h.services.pipeline.search_page("support", 0).await.unwrap();
    assert_eq!(first.total, 3);
    assert_eq!(first.hits.len(), 3);
    assert_eq!(first.size, 5);

    let tail = h.services.pipeline.search_page("support", 2).await.unwrap();
    assert_eq!(tail.hits.len(), 1);
    assert_eq!(tail.hits[0].id, first.hits[2].id);
}

#[tokio::test]
async fn test_blank_query_is_validation_error() {
    let h = harness().await;
    h.engine.create_index(DIMS).await.unwrap();
    let err = h.services.pipeline.retrieve(" \t", 5).await.unwrap_err();
    assert_eq!(err.code(), "bad_request");
}

#[tokio::test]
async fn test_embedding_outage_fails_search() {
    let h = harness_with(Arc::new(DownEmbedder), None).await;
    h.engine.create_index(DIMS).await.unwrap();
    let err = h.services.pipeline.retrieve("hello", 5).await.unwrap_err();
    assert!(matches!(err, GatewayError::EmbeddingUnavailable(_)));
}

// ============ Ingestion ============

#[tokio::test]
async fn test_bad_file_leaves_index_untouched() {
    let h = harness().await;
    let path = write_corpus(&h);
    h.services.ingestor.reindex(&path).await;

    let bad = h.tmp.path().join("bad.json");
    std::fs::write(&bad, r#"{"not": "an array"}"#).unwrap();
    let report = h.services.ingestor.reindex(&bad).await;
    assert_eq!(report.processed, 0);
    assert_eq!(report.error.as_ref().unwrap().code, "ingestion_format");

    let hits = h.services.pipeline.retrieve("invoices", 3).await.unwrap();
    assert_eq!(hits.len(), 3);
}

#[tokio::test]
async fn test_missing_file_is_reported_not_raised() {
    let h = harness().await;
    let report = h
        .services
        .ingestor
        .reindex(&h.tmp.path().join("missing.json"))
        .await;
    assert_eq!(report.error.unwrap().code, "ingestion_format");
}

#[tokio::test]
async fn test_reindex_with_embedder_down_reports_error() {
    let h = harness_with(Arc::new(DownEmbedder), None).await;
    let path = write_corpus(&h);
    let report = h.services.ingestor.reindex(&path).await;
    assert_eq!(report.processed, 0);
    assert_eq!(report.error.unwrap().code, "embedding_unavailable");
}

#[tokio::test]
async fn test_reindex_replaces_previous_contents() {
    let h = harness().await;
    h.engine.create_index(DIMS).await.unwrap();
    let old = h
        .services
        .ingestor
        .insert_document(doc("Zebra", "striped animal", "Zebras live in herds."))
        .await
        .unwrap();

    let path = write_corpus(&h);
    let report = h.services.ingestor.reindex(&path).await;
    assert_eq!(report.succeeded, 3);

    let err = get_document(h.engine.as_ref(), &old.id).await.unwrap_err();
    assert!(matches!(err, GatewayError::NotFound(_)));
}

#[tokio::test]
async fn test_reindex_empty_array() {
    let h = harness().await;
    let path = h.tmp.path().join("empty.json");
    std::fs::write(&path, "[]").unwrap();

    let report = h.services.ingestor.reindex(&path).await;
    assert!(report.is_success());
    assert_eq!(report.processed, 0);

    let hits = h.services.pipeline.retrieve("anything", 5).await.unwrap();
    assert!(hits.is_empty());
}

// ============ Lookup ============

#[tokio::test]
async fn test_get_round_trip_preserves_fields() {
    let h = harness().await;
    h.engine.create_index(DIMS).await.unwrap();

    let document = Document {
        name: Some("Policy".to_string()),
        summary: Some("Access policy".to_string()),
        content: "Line one\nLine two".to_string(),
        url: Some("https://example.com/policy".to_string()),
        category: Some("security".to_string()),
        role_permissions: Some(vec!["admin".to_string(), "auditor".to_string()]),
        ..Default::default()
    };
    let id = h
        .services
        .ingestor
        .insert_document(document.clone())
        .await
        .unwrap();

    let stored = get_document(h.engine.as_ref(), &id.id).await.unwrap();
    assert_eq!(stored.id, id.id);
    assert_eq!(stored.document, document);
}

#[tokio::test]
async fn test_get_unknown_id_is_not_found() {
    let h = harness().await;
    h.engine.create_index(DIMS).await.unwrap();
    let err = get_document(h.engine.as_ref(), "nope").await.unwrap_err();
    assert_eq!(err, GatewayError::NotFound("nope".to_string()));
}

#[tokio::test]
async fn test_embedding_dimension_mismatch_is_rejected() {
    let h = harness().await;
    h.engine.create_index(DIMS + 1).await.unwrap();
    let err = h
        .services
        .ingestor
        .insert_document(doc("A", "s", "c"))
        .await
        .unwrap_err();
    assert!(matches!(err, GatewayError::SearchEngineUnavailable(_)));
}

// ============ Chat ============

#[tokio::test]
async fn test_chat_grounds_on_top_document() {
    let h = harness().await;
    let path = write_corpus(&h);
    h.services.ingestor.reindex(&path).await;

    let reply = h
        .services
        .chat
        .ask("How do I reset my password?")
        .await
        .unwrap();
    assert_eq!(reply.answer, "Because of the documents.\n\nSOURCES: Doc");
    assert_eq!(reply.sources.len(), 1);
    assert_eq!(
        reply.sources[0].document.name.as_deref(),
        Some("Password Reset")
    );

    let prompts = h.generator.prompts.lock().unwrap();
    assert_eq!(prompts.len(), 1);
    assert!(prompts[0].contains("NAME: Password Reset\nDOCUMENT:\nOpen settings."));
    assert!(prompts[0].ends_with("Question: How do I reset my password?\nResponse:"));
}

#[tokio::test]
async fn test_chat_with_empty_index_still_asks_model() {
    let h = harness().await;
    h.engine.create_index(DIMS).await.unwrap();

    let reply = h.services.chat.ask("Anything?").await.unwrap();
    assert!(reply.sources.is_empty());
    let prompts = h.generator.prompts.lock().unwrap();
    assert!(!prompts[0].contains("---"));
}

#[tokio::test]
async fn test_chat_without_context_sends_raw_question() {
    let h = harness().await;
    h.services.chat.answer("Just the question").await.unwrap();
    let prompts = h.generator.prompts.lock().unwrap();
    assert_eq!(prompts[0], "Just the question");
}

#[tokio::test]
async fn test_chat_generation_outage() {
    let h = harness_with(Arc::new(HashEmbedder), Some(Arc::new(DownGenerator))).await;
    h.engine.create_index(DIMS).await.unwrap();
    let err = h.services.chat.ask("Anything?").await.unwrap_err();
    assert!(matches!(err, GatewayError::GenerationUnavailable(_)));
}

#[tokio::test]
async fn test_chat_blank_question_rejected() {
    let h = harness().await;
    let err = h.services.chat.ask("  ").await.unwrap_err();
    assert!(matches!(err, GatewayError::Validation(_)));
    assert!(h.generator.prompts.lock().unwrap().is_empty());
}
