//! Application flows exercised directly, without HTTP.

mod common;

use common::{app_with_model, pdf_with_pages};
use pdf_qa::ingest::{self, UploadFile};
use pdf_qa::{ask, history};

fn pdf_upload(name: &str, bytes: Vec<u8>) -> UploadFile {
    UploadFile {
        filename: name.to_string(),
        content_type: None,
        bytes,
    }
}

#[tokio::test]
async fn concurrent_questions_build_the_index_once() {
    let t = app_with_model(|c| {
        c.chunking.max_chars = 40;
        c.chunking.overlap_chars = 10;
    })
    .await;
    let pdf = pdf_with_pages(&[
        Some("Revenue grew 10% in the third quarter."),
        Some("Operating costs fell by 4% over the same period."),
    ]);
    let doc = ingest::ingest_file(&t.app, pdf_upload("q3.pdf", pdf))
        .await
        .unwrap();

    let mut handles = Vec::new();
    for i in 0..6 {
        let app = t.app.clone();
        handles.push(tokio::spawn(async move {
            ask::ask(&app, doc.id, &format!("question {}", i)).await
        }));
    }
    for h in handles {
        h.await.unwrap().unwrap();
    }

    // Chunks are embedded in a single batch; every other call is a query embedding.
    assert_eq!(t.embedder.calls(), 1 + 6);
    assert_eq!(t.app.cache().len(), 1);

    let sessions = history::document_history(&t.app, doc.id).await.unwrap();
    assert_eq!(sessions.len(), 6);
    for s in &sessions {
        assert_eq!(s.messages.len(), 2);
    }
    let summary = history::list_documents(&t.app).await.unwrap();
    assert_eq!(summary[0].question_count, 6);
    assert!(summary[0].chunk_count.unwrap() > 1);
}

#[tokio::test]
async fn retrieval_sends_top_k_chunks() {
    let t = app_with_model(|c| {
        c.chunking.max_chars = 30;
        c.chunking.overlap_chars = 0;
        c.retrieval.top_k = 2;
    })
    .await;
    let text = "aaaa aaaa aaaa aaaa aaaa aaaa bbbb bbbb bbbb bbbb bbbb bbbb cccc cccc cccc cccc cccc cccc";
    let doc = ingest::ingest_file(&t.app, pdf_upload("letters.pdf", pdf_with_pages(&[Some(text)])))
        .await
        .unwrap();

    ask::ask(&t.app, doc.id, "bbbb bbbb?").await.unwrap();

    let prompts = t.completer.as_ref().unwrap().prompts();
    let user = &prompts[0].user;
    assert!(user.contains("[Excerpt 1]"));
    assert!(user.contains("[Excerpt 2]"));
    assert!(!user.contains("[Excerpt 3]"));
    let first = user.split("[Excerpt 1]").nth(1).unwrap();
    assert!(first.trim_start().starts_with("bbbb"));
}

#[tokio::test]
async fn clear_drops_cached_indexes() {
    let t = app_with_model(|_| {}).await;
    let doc = ingest::ingest_file(&t.app, pdf_upload("r.pdf", common::report_pdf()))
        .await
        .unwrap();
    ask::ask(&t.app, doc.id, "Growth?").await.unwrap();
    assert!(t.app.cache().contains(doc.id));

    let report = history::clear_all(&t.app).await.unwrap();
    assert_eq!(report.documents_removed, 1);
    assert_eq!(report.files_removed, 2);
    assert!(t.app.cache().is_empty());

    let err = ask::ask(&t.app, doc.id, "Growth?").await.unwrap_err();
    assert_eq!(err.code(), "not_found");
}
