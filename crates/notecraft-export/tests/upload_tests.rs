mod common;

use common::*;
use notecraft_export::*;
use std::sync::Arc;

fn request() -> UploadRequest {
    UploadRequest {
        filename: "Notes-NoteCraft-2024-01-01.pdf".to_string(),
        bytes: b"%PDF-1.7".to_vec(),
    }
}

fn uploader(transport: &Arc<FakeTransport>, store: &Arc<TokenStore>) -> Uploader {
    Uploader::new(transport.clone(), store.clone())
}

#[tokio::test]
async fn test_created_on_first_attempt() {
    let transport = Arc::new(FakeTransport::replying(&[201]));
    let store = token_store();
    let refresher = FakeRefresher::new(true, store.clone());

    uploader(&transport, &store)
        .upload(&request(), &refresher)
        .await
        .unwrap();

    assert_eq!(refresher.calls(), 0);
    let sent = transport.sent();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].0, "Notes-NoteCraft-2024-01-01.pdf");
    assert_eq!(sent[0].1.as_deref(), Some("stale-token"));
}

#[tokio::test]
async fn test_unauthorized_refreshes_and_retries_once_with_new_token() {
    let transport = Arc::new(FakeTransport::replying(&[401, 201]));
    let store = token_store();
    let refresher = FakeRefresher::new(true, store.clone());

    uploader(&transport, &store)
        .upload(&request(), &refresher)
        .await
        .unwrap();

    assert_eq!(refresher.calls(), 1);
    let tokens: Vec<_> = transport.sent().into_iter().map(|(_, t)| t).collect();
    assert_eq!(
        tokens,
        vec![Some("stale-token".to_string()), Some("fresh-token".to_string())]
    );
}

#[tokio::test]
async fn test_failed_refresh_means_session_expired_without_retry() {
    let transport = Arc::new(FakeTransport::replying(&[401]));
    let store = token_store();
    let refresher = FakeRefresher::new(false, store.clone());

    let err = uploader(&transport, &store)
        .upload(&request(), &refresher)
        .await
        .unwrap_err();

    assert!(matches!(err, ExportError::SessionExpired));
    assert_eq!(err.to_string(), "Session expired. Please login again.");
    assert_eq!(refresher.calls(), 1);
    assert_eq!(transport.sent().len(), 1);
}

#[tokio::test]
async fn test_second_unauthorized_is_not_refreshed_again() {
    let transport = Arc::new(FakeTransport::replying(&[401, 401]));
    let store = token_store();
    let refresher = FakeRefresher::new(true, store.clone());

    let err = uploader(&transport, &store)
        .upload(&request(), &refresher)
        .await
        .unwrap_err();

    assert!(matches!(err, ExportError::UploadStatus(401)));
    assert_eq!(refresher.calls(), 1);
    assert_eq!(transport.sent().len(), 2);
}

#[tokio::test]
async fn test_other_statuses_fail_without_refresh() {
    for status in [200, 400, 500] {
        let transport = Arc::new(FakeTransport::replying(&[status]));
        let store = token_store();
        let refresher = FakeRefresher::new(true, store.clone());

        let err = uploader(&transport, &store)
            .upload(&request(), &refresher)
            .await
            .unwrap_err();

        assert!(matches!(err, ExportError::UploadStatus(s) if s == status));
        assert_eq!(refresher.calls(), 0);
        assert_eq!(transport.sent().len(), 1);
    }
}
