//! End-to-end coverage across the flush protocol and read path together.

use data_types::{ChunkIdGenerator, RowKey};
use segment_store::{
    flush_once, flush_with_retry, read_segment, FlushRequest, IncomingColumn, LengthPrefixedCodec,
    MemStore, PersistentStore, SegmentSummary,
};
use std::collections::HashMap;
use std::sync::Arc;

fn req(keys: &[&str], column: &str, values: &[&str]) -> FlushRequest {
    FlushRequest {
        partition: "p".to_string(),
        segment: "s".to_string(),
        keys: keys.iter().map(|k| RowKey::from(*k)).collect(),
        columns: vec![IncomingColumn {
            name: column.to_string(),
            row_values: values.iter().map(|v| v.as_bytes().to_vec()).collect(),
        }],
    }
}

fn row_map(rows: &[segment_store::RowView], column: &str) -> HashMap<String, String> {
    rows.iter()
        .map(|row| {
            let key = String::from_utf8(row.key.as_bytes().to_vec()).unwrap();
            let value = row
                .values
                .get(column)
                .map(|v| String::from_utf8(v.clone()).unwrap())
                .unwrap_or_default();
            (key, value)
        })
        .collect()
}

#[tokio::test]
async fn out_of_order_flush_then_in_order_read() {
    let store = MemStore::new();
    let ids = ChunkIdGenerator;
    let codec = LengthPrefixedCodec;

    let players = ["Rodney", "Ndamukong", "Khalil", "Terrance", "Jerry", "Peyton"];
    let request = req(&players, "name", &players);
    assert!(flush_once(&store, &request, &ids, &codec).await.unwrap());

    let rows = read_segment(&store, "p", "s", &["name".to_string()], &codec)
        .await
        .unwrap();
    let map = row_map(&rows, "name");
    for player in players {
        assert_eq!(map.get(player).unwrap(), player);
    }
    assert_eq!(map.len(), players.len());
}

#[tokio::test]
async fn overwrite_replaces_values_and_tracks_override_positions() {
    let store = MemStore::new();
    let ids = ChunkIdGenerator;
    let codec = LengthPrefixedCodec;

    let first = req(&["r1", "r2", "r3", "r4"], "score", &["10", "20", "30", "40"]);
    assert!(flush_once(&store, &first, &ids, &codec).await.unwrap());

    let second = req(&["r2", "r3"], "score", &["99", "88"]);
    assert!(flush_once(&store, &second, &ids, &codec).await.unwrap());

    let rows = read_segment(&store, "p", "s", &["score".to_string()], &codec)
        .await
        .unwrap();
    let map = row_map(&rows, "score");
    assert_eq!(map.get("r1").unwrap(), "10");
    assert_eq!(map.get("r2").unwrap(), "99");
    assert_eq!(map.get("r3").unwrap(), "88");
    assert_eq!(map.get("r4").unwrap(), "40");
    assert_eq!(map.len(), 4);

    let (_, bytes) = store.load_summary("p", "s").await.unwrap().unwrap();
    let summary = SegmentSummary::from_bytes(&bytes).unwrap();
    assert_eq!(summary.num_chunks(), 2);
}

#[tokio::test]
async fn column_projection_omits_unrequested_columns() {
    let store = MemStore::new();
    let ids = ChunkIdGenerator;
    let codec = LengthPrefixedCodec;

    let request = FlushRequest {
        partition: "p".to_string(),
        segment: "s".to_string(),
        keys: vec![RowKey::from("r1")],
        columns: vec![
            IncomingColumn {
                name: "name".to_string(),
                row_values: vec![b"Rodney".to_vec()],
            },
            IncomingColumn {
                name: "score".to_string(),
                row_values: vec![b"10".to_vec()],
            },
        ],
    };
    assert!(flush_once(&store, &request, &ids, &codec).await.unwrap());

    let rows = read_segment(&store, "p", "s", &["name".to_string()], &codec)
        .await
        .unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].values.contains_key("name"));
    assert!(!rows[0].values.contains_key("score"));
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_flushers_exactly_one_cas_wins_per_round() {
    let store = Arc::new(MemStore::new());
    let ids = Arc::new(ChunkIdGenerator);
    let codec = Arc::new(LengthPrefixedCodec);

    let mut handles = Vec::new();
    for i in 0..8 {
        let store = Arc::clone(&store);
        let ids = Arc::clone(&ids);
        let codec = Arc::clone(&codec);
        handles.push(tokio::spawn(async move {
            let key = format!("k{i}");
            let value = i.to_string();
            let request = req(&[key.as_str()], "v", &[value.as_str()]);
            flush_with_retry(
                store.as_ref(),
                &request,
                ids.as_ref(),
                codec.as_ref(),
                backoff::RetryConfig {
                    min_backoff: std::time::Duration::from_millis(1),
                    max_backoff: std::time::Duration::from_millis(5),
                    max_attempts: Some(20),
                    ..Default::default()
                },
            )
            .await
        }));
    }

    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    let (_, bytes) = store.load_summary("p", "s").await.unwrap().unwrap();
    let summary = SegmentSummary::from_bytes(&bytes).unwrap();
    assert_eq!(summary.num_chunks(), 8);

    let mut chunk_ids: Vec<_> = summary.chunks().map(|(id, _)| id).collect();
    chunk_ids.sort();
    chunk_ids.dedup();
    assert_eq!(chunk_ids.len(), 8, "every flusher must mint a distinct chunk id");

    let rows = read_segment(&*store, "p", "s", &["v".to_string()], &*codec)
        .await
        .unwrap();
    assert_eq!(rows.len(), 8);
}
