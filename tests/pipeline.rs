mod support;

use std::sync::Arc;
use std::sync::atomic::Ordering;

use docqa::pipeline::{IndexError, PipelineApi, PipelineState, QueryError};
use docqa::synthesis::INSUFFICIENT_CONTEXT_ANSWER;
use support::{Harness, corpus, minimal_pdf, page};

#[tokio::test]
async fn query_before_indexing_is_rejected_without_downstream_calls() {
    let harness = Harness::new(corpus());
    let pipeline = harness.pipeline().await;

    assert_eq!(pipeline.state().await, PipelineState::Unindexed);
    assert!(matches!(
        pipeline.query("What is attention?").await,
        Err(QueryError::NotReady)
    ));
    assert!(matches!(
        pipeline.query("   ").await,
        Err(QueryError::EmptyQuestion)
    ));
    assert_eq!(harness.embedder.calls(), 0);
    assert_eq!(harness.generator.calls(), 0);
}

#[tokio::test]
async fn indexing_an_empty_directory_reports_no_documents() {
    let harness = Harness::new(Vec::new());
    let pipeline = harness.pipeline().await;

    let err = pipeline.index(None).await.expect_err("nothing to index");
    assert!(matches!(err, IndexError::NoDocumentsFound(_)));

    let status = pipeline.status().await;
    assert_eq!(status.state, PipelineState::Unindexed);
    assert!(!status.index_exists);
    assert_eq!(harness.embedder.calls(), 0);

    let dirs = harness.loader.dirs.lock().expect("dirs").clone();
    assert_eq!(dirs, vec![harness.settings().source_dir]);
}

#[tokio::test]
async fn index_then_query_returns_grounded_answer_with_sources() {
    let harness = Harness::new(corpus());
    let pipeline = harness.pipeline().await;

    let outcome = pipeline.index(None).await.expect("index succeeds");
    assert_eq!(outcome.documents, 2);
    assert_eq!(outcome.pages, 3);
    assert!(outcome.chunk_count >= 3);
    assert_eq!(outcome.dimension, support::VOCABULARY.len());
    assert_eq!(harness.embedder.calls(), outcome.chunk_count.div_ceil(2));
    assert_eq!(pipeline.state().await, PipelineState::Ready);

    let calls_before = harness.embedder.calls();
    let result = pipeline
        .query("How does attention work in the transformer?")
        .await
        .expect("query succeeds");
    assert_eq!(harness.embedder.calls(), calls_before + 1);
    assert_eq!(harness.generator.calls(), 1);

    assert_eq!(result.answer, "Grounded answer from stub-llm [1]");
    assert!(result.error.is_none());
    assert!(!result.sources.is_empty() && result.sources.len() <= 3);

    let top = &result.sources[0];
    assert_eq!(top.provenance.source, "attention.pdf");
    assert_eq!(top.provenance.page_start, 1);
    assert!(top.text_preview.ends_with("..."));
    assert_eq!(top.text_preview.chars().count(), 43);
    assert!(
        result
            .sources
            .iter()
            .all(|source| source.provenance.source != "resnet.pdf")
    );
    assert!(
        result
            .sources
            .windows(2)
            .all(|pair| pair[0].score >= pair[1].score)
    );

    let prompt = harness.generator.last_prompt().expect("prompt recorded");
    assert!(prompt.contains("[1] The transformer relies entirely on attention."));
    assert!(prompt.contains("How does attention work in the transformer?"));

    let metrics = pipeline.metrics_snapshot();
    assert_eq!(metrics.index_runs, 1);
    assert_eq!(metrics.documents_indexed, 2);
    assert_eq!(metrics.queries_served, 1);
    assert_eq!(metrics.degraded_answers, 0);
}

#[tokio::test]
async fn unrelated_question_gets_insufficient_context_answer() {
    let harness = Harness::new(corpus());
    let pipeline = harness.pipeline().await;
    pipeline.index(None).await.expect("index succeeds");

    let result = pipeline
        .query("What is the capital of France?")
        .await
        .expect("query succeeds");

    assert_eq!(result.answer, INSUFFICIENT_CONTEXT_ANSWER);
    assert!(result.sources.is_empty());
    assert!(result.error.is_none());
    assert_eq!(harness.generator.calls(), 0);
}

#[tokio::test]
async fn reindex_replaces_previous_generation() {
    let harness = Harness::new(corpus());
    let pipeline = harness.pipeline().await;
    pipeline.index(None).await.expect("first index");

    harness.loader.set_pages(vec![page(
        "diffusion.pdf",
        1,
        "Latent diffusion models synthesize image samples by iterative denoising.",
    )]);
    let outcome = pipeline.index(None).await.expect("second index");
    assert_eq!(outcome.documents, 1);
    assert_eq!(outcome.chunk_count, 1);

    let status = pipeline.status().await;
    assert_eq!(status.indexed_chunks, 1);
    assert_eq!(status.embedding_model.as_deref(), Some("keyword-test"));

    let stale = pipeline
        .query("attention transformer")
        .await
        .expect("query succeeds");
    assert!(stale.sources.is_empty());

    let fresh = pipeline
        .query("Explain diffusion")
        .await
        .expect("query succeeds");
    assert_eq!(fresh.sources.len(), 1);
    assert_eq!(fresh.sources[0].provenance.source, "diffusion.pdf");
    assert_eq!(pipeline.metrics_snapshot().index_runs, 2);
}

#[tokio::test]
async fn embedding_failure_during_reindex_keeps_serving_previous_index() {
    let harness = Harness::new(corpus());
    let pipeline = harness.pipeline().await;
    let first = pipeline.index(None).await.expect("first index");

    harness.loader.set_pages(vec![page("other.pdf", 1, "alpha alpha")]);
    harness.embedder.fail.store(true, Ordering::SeqCst);
    let err = pipeline.index(None).await.expect_err("embedding fails");
    assert!(matches!(err, IndexError::Embedding(_)));

    let status = pipeline.status().await;
    assert_eq!(status.state, PipelineState::Ready);
    assert_eq!(status.indexed_chunks, first.chunk_count);

    harness.embedder.fail.store(false, Ordering::SeqCst);
    let result = pipeline
        .query("attention please")
        .await
        .expect("query succeeds");
    assert_eq!(result.sources[0].provenance.source, "attention.pdf");

    let restarted = harness.pipeline().await;
    assert_eq!(restarted.status().await.indexed_chunks, first.chunk_count);
}

#[tokio::test]
async fn generation_failure_degrades_to_sources_with_error() {
    let harness = Harness::new(corpus());
    let pipeline = harness.pipeline().await;
    pipeline.index(None).await.expect("index succeeds");
    harness.generator.fail.store(true, Ordering::SeqCst);

    let result = pipeline
        .query("residual image networks")
        .await
        .expect("degraded result is still Ok");

    assert!(result.answer.starts_with("Error processing question:"));
    assert!(result.answer.contains("model not loaded"));
    assert!(result.error.as_deref().is_some_and(|e| e.contains("model not loaded")));
    assert_eq!(result.sources[0].provenance.source, "resnet.pdf");

    let metrics = pipeline.metrics_snapshot();
    assert_eq!(metrics.queries_served, 1);
    assert_eq!(metrics.degraded_answers, 1);
}

#[tokio::test]
async fn restart_reloads_persisted_index() {
    let harness = Harness::new(corpus());
    {
        let pipeline = harness.pipeline().await;
        pipeline.index(None).await.expect("index succeeds");
    }

    let pipeline = harness.pipeline().await;
    let status = pipeline.status().await;
    assert_eq!(status.state, PipelineState::Ready);
    assert!(status.index_exists);
    assert!(status.built_at.is_some());

    let result = pipeline
        .query("transformer language")
        .await
        .expect("query succeeds");
    assert_eq!(result.sources[0].provenance.source, "attention.pdf");
    assert_eq!(harness.loader.dirs.lock().expect("dirs").len(), 1);
}

#[tokio::test]
async fn tiny_windows_chunk_with_overlap() {
    let harness = Harness::new(vec![page("tiny.pdf", 1, "A B C D")]);
    let mut settings = harness.settings();
    settings.chunk_size = 3;
    settings.chunk_overlap = 1;
    let pipeline = harness.pipeline_with(settings).await;

    let outcome = pipeline.index(None).await.expect("index succeeds");
    assert_eq!(outcome.chunk_count, 3);
    assert_eq!(outcome.pages, 1);
}

#[tokio::test]
async fn index_override_directory_is_passed_to_loader() {
    let harness = Harness::new(corpus());
    let pipeline = harness.pipeline().await;
    let other = harness.root.path().join("elsewhere");

    pipeline.index(Some(other.clone())).await.expect("index");

    let dirs = harness.loader.dirs.lock().expect("dirs").clone();
    assert_eq!(dirs, vec![other]);
}

#[tokio::test]
async fn queries_run_while_reindexing() {
    let harness = Harness::new(corpus());
    let pipeline = Arc::new(harness.pipeline().await);
    pipeline.index(None).await.expect("first index");

    let indexer = {
        let pipeline = Arc::clone(&pipeline);
        tokio::spawn(async move { pipeline.index(None).await })
    };
    let mut readers = Vec::new();
    for _ in 0..8 {
        let pipeline = Arc::clone(&pipeline);
        readers.push(tokio::spawn(async move {
            pipeline.query("attention").await
        }));
    }

    indexer.await.expect("join").expect("reindex succeeds");
    for reader in readers {
        let result = reader.await.expect("join").expect("query succeeds");
        assert_eq!(result.sources[0].provenance.source, "attention.pdf");
    }
}

#[tokio::test]
async fn uploaded_pdfs_are_indexed_and_answerable() {
    let harness = Harness::new(Vec::new());
    let pipeline = harness.pdf_pipeline().await;

    let bytes = minimal_pdf(&[
        "Scaled dot product attention drives the transformer",
        "Residual connections wrap every sublayer",
    ]);
    let saved = pipeline
        .save_document("transformer.pdf", bytes)
        .await
        .expect("upload");
    assert_eq!(saved.filename, "transformer.pdf");
    assert_eq!(pipeline.list_documents().await.expect("list").len(), 1);

    let outcome = pipeline.index(None).await.expect("index succeeds");
    assert_eq!(outcome.documents, 1);
    assert_eq!(outcome.pages, 2);

    let result = pipeline
        .query("what drives the transformer attention")
        .await
        .expect("query succeeds");
    assert_eq!(result.sources[0].provenance.source, "transformer.pdf");

    pipeline
        .delete_document("transformer.pdf")
        .await
        .expect("delete");
    assert_eq!(pipeline.state().await, PipelineState::Ready);
    assert!(pipeline.list_documents().await.expect("list").is_empty());
}
