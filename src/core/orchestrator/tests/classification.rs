use crate::core::error::StatusClass;
use crate::core::images::ImageStore;
use crate::core::orchestrator::{TaskOutput, classify_output};

#[tokio::test]
async fn image_marker_resolves_to_stored_payload() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("x.txt"), "ABC123").unwrap();
    let store = ImageStore::new(dir.path());

    let out = classify_output(r#"{"type":"image","image_file_name":"x.txt"}"#, &store)
        .await
        .unwrap();
    assert_eq!(out, TaskOutput::Image("ABC123".to_string()));
    assert_eq!(
        serde_json::to_value(&out).unwrap(),
        serde_json::json!({"type": "image", "data": "ABC123"})
    );
}

#[tokio::test]
async fn plain_text_is_returned_unchanged() {
    let dir = tempfile::tempdir().unwrap();
    let store = ImageStore::new(dir.path());
    let out = classify_output("The answer is 42", &store).await.unwrap();
    assert_eq!(out, TaskOutput::Text("The answer is 42".to_string()));
    assert_eq!(
        serde_json::to_value(&out).unwrap(),
        serde_json::json!({"type": "text", "data": "The answer is 42"})
    );
}

#[tokio::test]
async fn json_without_marker_is_text() {
    let dir = tempfile::tempdir().unwrap();
    let store = ImageStore::new(dir.path());
    for raw in ["42", "[1, 2]", r#"{"score": 10}"#, "{not json", r#"{"image_file_name": 7}"#] {
        let out = classify_output(raw, &store).await.unwrap();
        assert_eq!(out, TaskOutput::Text(raw.to_string()), "raw = {}", raw);
    }
}

#[tokio::test]
async fn missing_image_file_is_a_run_error() {
    let dir = tempfile::tempdir().unwrap();
    let store = ImageStore::new(dir.path());
    let err = classify_output(r#"{"type":"image","image_file_name":"gone.txt"}"#, &store)
        .await
        .unwrap_err();
    assert_eq!(err.status_class(), StatusClass::InternalError);
    assert!(err.to_string().contains("gone.txt"));
}

#[tokio::test]
async fn marker_cannot_escape_the_store() {
    let dir = tempfile::tempdir().unwrap();
    let store = ImageStore::new(dir.path().join("images"));
    std::fs::write(dir.path().join("secret.txt"), "hidden").unwrap();
    let err = classify_output(r#"{"image_file_name":"../secret.txt"}"#, &store)
        .await
        .unwrap_err();
    assert_eq!(err.status_class(), StatusClass::InternalError);
}
