mod common;

use chroma_local_search::config::Config;
use chroma_local_search::error::StoreError;
use chroma_local_search::models::Metadata;
use chroma_local_search::search::flatten_results;
use chroma_local_search::store::chroma::ChromaClient;
use chroma_local_search::store::StoreClient;

use common::start_mock;

fn client_for(url: &str) -> ChromaClient {
    let mut config = Config::default();
    config.store.url = url.to_string();
    config.store.timeout_secs = 5;
    config.embedding.url = url.to_string();
    config.embedding.max_retries = 0;
    ChromaClient::from_config(&config).unwrap()
}

fn meta(filename: &str) -> Metadata {
    let mut m = Metadata::new();
    m.insert("filename".into(), filename.into());
    m.insert("path".into(), format!("/docs/{}", filename).into());
    m
}

#[tokio::test]
async fn test_add_and_query_round_trip() {
    let mock = start_mock();
    let client = client_for(&mock.url);

    let coll = client.get_or_create_collection("files").await.unwrap();
    assert_eq!(coll.name(), "files");
    coll.add(
        &["/docs/a.md".into(), "/docs/b.md".into()],
        &["kubernetes deployment".into(), "zebra quiz".into()],
        &[meta("a.md"), meta("b.md")],
    )
    .await
    .unwrap();
    assert_eq!(mock.state.count("files"), 2);

    let response = coll.query("kubernetes deployment", 1).await.unwrap();
    let results = flatten_results(&response);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].filename, "a.md");
    assert_eq!(results[0].path, "/docs/a.md");
    assert_eq!(results[0].content, "kubernetes deployment");
}

#[tokio::test]
async fn test_get_or_create_is_idempotent() {
    let mock = start_mock();
    let client = client_for(&mock.url);
    client.get_or_create_collection("files").await.unwrap();
    client.get_or_create_collection("files").await.unwrap();
    let coll = client.get_collection("files").await.unwrap();
    assert_eq!(coll.name(), "files");
}

#[tokio::test]
async fn test_new_collection_records_embedding_model() {
    let mock = start_mock();
    let client = client_for(&mock.url);
    client.get_or_create_collection("files").await.unwrap();

    let metadata = mock.state.collection_metadata("files").unwrap();
    assert_eq!(metadata["embedding_model"], "nomic-embed-text");
}

#[tokio::test]
async fn test_missing_collection_maps_to_not_found() {
    let mock = start_mock();
    let client = client_for(&mock.url);

    let err = client.get_collection("ghost").await.err().unwrap();
    assert!(matches!(err, StoreError::NotFound(ref name) if name == "ghost"));

    let err = client.delete_collection("ghost").await.unwrap_err();
    assert!(matches!(err, StoreError::NotFound(_)));
}

#[tokio::test]
async fn test_refused_connection_maps_to_unavailable() {
    let dead = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let url = format!("http://{}", dead.local_addr().unwrap());
    drop(dead);

    let client = client_for(&url);
    let err = client.get_or_create_collection("files").await.err().unwrap();
    assert!(err.is_unavailable(), "unexpected error: {}", err);
}
