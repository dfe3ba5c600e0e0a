//! Query path: fetch matches from a collection and flatten them for display.

use anyhow::{Context, Result};

use crate::config::Config;
use crate::models::{Metadata, QueryResult};
use crate::store::{QueryResponse, StoreClient};

/// Flatten the first result group into an ordered list.
///
/// Missing documents or metadata fields become empty strings. An empty or
/// absent group yields an empty list.
pub fn flatten_results(response: &QueryResponse) -> Vec<QueryResult> {
    let Some(documents) = response.documents.as_ref().and_then(|g| g.first()) else {
        return Vec::new();
    };
    let metadatas = response.metadatas.as_ref().and_then(|g| g.first());

    documents
        .iter()
        .enumerate()
        .map(|(i, doc)| {
            let metadata = metadatas.and_then(|m| m.get(i)).and_then(Option::as_ref);
            QueryResult {
                filename: metadata_str(metadata, "filename"),
                path: metadata_str(metadata, "path"),
                content: doc.clone().unwrap_or_default(),
            }
        })
        .collect()
}

fn metadata_str(metadata: Option<&Metadata>, key: &str) -> String {
    metadata
        .and_then(|m| m.get(key))
        .and_then(|v| v.as_str())
        .unwrap_or_default()
        .to_string()
}

/// Query a collection by name. Fails if the collection does not exist.
pub async fn search_collection(
    client: &dyn StoreClient,
    collection: &str,
    query: &str,
    n: usize,
) -> Result<Vec<QueryResult>> {
    let coll = client
        .get_collection(collection)
        .await
        .with_context(|| format!("Failed to get collection '{}'", collection))?;
    let response = coll
        .query(query, n)
        .await
        .with_context(|| format!("Failed to query collection '{}'", collection))?;
    Ok(flatten_results(&response))
}

/// Render results least relevant first, so the best match ends up next to
/// the prompt.
pub fn format_results(results: &[QueryResult]) -> String {
    let mut out = format!("Found {} results:\n\n", results.len());
    for result in results.iter().rev() {
        out.push_str(&format!("File: {}\n", result.filename));
        out.push_str(&format!("Path: {}\n", result.path));
        out.push_str(&format!("Content:\n{}\n", result.content));
        out.push_str(&"-".repeat(50));
        out.push('\n');
    }
    out
}

pub async fn run_search(
    client: &dyn StoreClient,
    config: &Config,
    query: &str,
    limit: Option<usize>,
) -> Result<()> {
    if query.trim().is_empty() {
        println!("No results found");
        return Ok(());
    }

    let n = limit.unwrap_or(config.query.results);
    let results = search_collection(client, &config.store.collection, query, n).await?;

    if results.is_empty() {
        println!("No results found");
        return Ok(());
    }
    print!("{}", format_results(&results));
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::store::memory::MemoryClient;
    use serde_json::json;

    fn meta(value: serde_json::Value) -> Metadata {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_flatten_full_response() {
        let response = QueryResponse {
            ids: vec![vec!["1".into(), "2".into()]],
            documents: Some(vec![vec![Some("first".into()), Some("second".into())]]),
            metadatas: Some(vec![vec![
                Some(meta(json!({"filename": "a.txt", "path": "/r/a.txt"}))),
                Some(meta(json!({"filename": "b.md", "path": "/r/b.md"}))),
            ]]),
            distances: None,
        };
        let results = flatten_results(&response);
        assert_eq!(
            results,
            vec![
                QueryResult {
                    filename: "a.txt".into(),
                    path: "/r/a.txt".into(),
                    content: "first".into(),
                },
                QueryResult {
                    filename: "b.md".into(),
                    path: "/r/b.md".into(),
                    content: "second".into(),
                },
            ]
        );
    }

    #[test]
    fn test_flatten_missing_fields_become_empty() {
        let response = QueryResponse {
            ids: vec![vec!["1".into(), "2".into(), "3".into()]],
            documents: Some(vec![vec![Some("one".into()), None, Some("three".into())]]),
            metadatas: Some(vec![vec![
                Some(meta(json!({"path": "/r/one"}))),
                None,
            ]]),
            distances: None,
        };
        let results = flatten_results(&response);
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].filename, "");
        assert_eq!(results[0].path, "/r/one");
        assert_eq!(results[1].content, "");
        assert_eq!(results[1].path, "");
        assert_eq!(results[2].path, "");
        assert_eq!(results[2].content, "three");
    }

    #[test]
    fn test_flatten_empty_groups() {
        assert!(flatten_results(&QueryResponse::default()).is_empty());
        let response = QueryResponse {
            documents: Some(vec![vec![]]),
            ..Default::default()
        };
        assert!(flatten_results(&response).is_empty());
    }

    #[test]
    fn test_flatten_from_wire_json() {
        let response: QueryResponse = serde_json::from_value(json!({
            "ids": [["x"]],
            "documents": [["hello"]],
            "metadatas": [[{"filename": "x.txt", "path": "/x.txt", "size": 5}]],
            "distances": [[0.12]],
            "embeddings": null
        }))
        .unwrap();
        let results = flatten_results(&response);
        assert_eq!(results[0].filename, "x.txt");
        assert_eq!(results[0].content, "hello");
    }

    #[test]
    fn test_format_results_reverses_order() {
        let results = vec![
            QueryResult {
                filename: "best.md".into(),
                path: "/best.md".into(),
                content: "b".into(),
            },
            QueryResult {
                filename: "worse.md".into(),
                path: "/worse.md".into(),
                content: "w".into(),
            },
        ];
        let out = format_results(&results);
        assert!(out.starts_with("Found 2 results:"));
        let best = out.find("File: best.md").unwrap();
        let worse = out.find("File: worse.md").unwrap();
        assert!(worse < best);
    }

    #[tokio::test]
    async fn test_fewer_matches_than_requested() {
        let client = MemoryClient::new();
        let coll = client.get_or_create_collection("files").await.unwrap();
        let ids: Vec<String> = (0..4).map(|i| format!("/r/{}.txt", i)).collect();
        let texts = vec![
            "deploy the service".to_string(),
            "deploy with care".to_string(),
            "deploy again".to_string(),
            "unrelated notes".to_string(),
        ];
        let metas: Vec<Metadata> = ids.iter().map(|p| meta(json!({ "path": p }))).collect();
        coll.add(&ids, &texts, &metas).await.unwrap();

        let results = search_collection(&client, "files", "deploy", 5).await.unwrap();
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].path, "/r/0.txt");
    }

    #[tokio::test]
    async fn test_missing_collection_is_not_found() {
        let client = MemoryClient::new();
        let err = search_collection(&client, "ghost", "anything", 5)
            .await
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<StoreError>(),
            Some(StoreError::NotFound(_))
        ));
    }
}
