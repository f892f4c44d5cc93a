//! End-to-end tests for the write and read coordinators.
//!
//! Every test drives `BatchWriter` and `RunReader` against in-memory stores
//! wrapped in fault injectors (see `common`).

mod common;

use common::harness;
use runhouse_core::{BlobRef, PayloadField, RunIn};
use runhouse_metadata::{IndexRow, IndexStore};
use runhouse_storage::{Error, StorageConfig};
use serde_json::{json, Value};
use std::time::Duration;
use uuid::Uuid;

fn run(name: &str) -> RunIn {
    RunIn::new(Uuid::new_v4(), name)
}

fn full_run(name: &str) -> RunIn {
    run(name)
        .with_payload(PayloadField::Inputs, json!({"prompt": "What is 2+2?", "temperature": 0.5}))
        .with_payload(PayloadField::Outputs, json!({"answer": "4", "tokens": [1, 2, 3]}))
        .with_payload(PayloadField::Metadata, json!({"model": "test-model", "tags": ["a", "b"]}))
}

// ============================================================================
// Round Trip
// ============================================================================

#[tokio::test]
async fn test_round_trip_preserves_payloads() {
    let h = harness(StorageConfig::default()).await;
    let submitted = full_run("round-trip");
    let trace_id = Uuid::parse_str(&submitted.trace_id).unwrap();

    let ids = h.writer.write_runs(std::slice::from_ref(&submitted), 0).await.unwrap();
    let value = h.reader.read_run_value(ids[0]).await.unwrap();

    assert_eq!(value["id"], json!(ids[0].to_string()));
    assert_eq!(value["trace_id"], json!(trace_id.to_string()));
    assert_eq!(value["name"], "round-trip");
    for field in PayloadField::ALL {
        assert_eq!(Some(&value[field.as_str()]), submitted.payload(field));
    }
}

#[tokio::test]
async fn test_empty_fields_read_as_empty_object() {
    let h = harness(StorageConfig::default()).await;
    let mut submitted = run("no-metadata").with_payload(PayloadField::Inputs, json!({"x": 1}));
    submitted.outputs = Some(Value::Null);

    let ids = h.writer.write_runs(&[submitted], 0).await.unwrap();
    let value = h.reader.read_run_value(ids[0]).await.unwrap();

    assert_eq!(value["inputs"], json!({"x": 1}));
    assert_eq!(value["outputs"], json!({}));
    assert_eq!(value["metadata"], json!({}));
}

// ============================================================================
// Offsets and Ordering
// ============================================================================

#[tokio::test]
async fn test_stored_spans_slice_uploaded_blob() {
    let h = harness(StorageConfig::default()).await;
    let runs: Vec<_> = (0..20).map(|i| full_run(&format!("run-{i}"))).collect();

    let ids = h.writer.write_runs(&runs, 0).await.unwrap();
    let keys = h.store.keys().await;
    assert_eq!(keys.len(), 1);
    let blob = h.store.blob(&keys[0]).await;

    for (id, submitted) in ids.iter().zip(&runs) {
        let row = h.index.get_row(*id).await.unwrap().unwrap();
        for field in PayloadField::ALL {
            let reference = row.blob_ref(field).unwrap();
            assert_eq!(reference.key, keys[0]);
            let slice = &blob[reference.start as usize..reference.end as usize];
            let expected = serde_json::to_vec(submitted.payload(field).unwrap()).unwrap();
            assert_eq!(slice, expected.as_slice());
        }
    }
}

#[tokio::test]
async fn test_ids_returned_in_submission_order() {
    let h = harness(StorageConfig::default()).await;
    h.index.reverse_returned(true);

    let runs = vec![run("A"), run("B"), run("C")];
    let ids = h.writer.write_runs(&runs, 0).await.unwrap();

    let mut names = Vec::new();
    for id in ids {
        let value = h.reader.read_run_value(id).await.unwrap();
        names.push(value["name"].as_str().unwrap().to_string());
    }
    assert_eq!(names, ["A", "B", "C"]);
}

#[tokio::test]
async fn test_field_emission_order_independent_of_read_completion() {
    let h = harness(StorageConfig::default()).await;
    let ids = h.writer.write_runs(&[full_run("slow-inputs")], 0).await.unwrap();

    let row = h.index.get_row(ids[0]).await.unwrap().unwrap();
    let inputs_start = row.blob_ref(PayloadField::Inputs).unwrap().start as usize;
    h.store.delay_range(inputs_start, Duration::from_millis(100));

    let bytes = h.reader.read_run(ids[0]).await.unwrap().into_bytes().await;
    let text = std::str::from_utf8(&bytes).unwrap();

    let inputs = text.find("\"inputs\"").unwrap();
    let outputs = text.find("\"outputs\"").unwrap();
    let metadata = text.find("\"metadata\"").unwrap();
    assert!(inputs < outputs && outputs < metadata);

    let value: Value = serde_json::from_slice(&bytes).unwrap();
    assert_eq!(value["inputs"]["prompt"], "What is 2+2?");
}

#[tokio::test]
async fn test_name_with_json_syntax_round_trips() {
    let h = harness(StorageConfig::default()).await;
    let name = r#"{"inputs":{}} ", \u0000 ] ☃"#;
    let ids = h.writer.write_runs(&[full_run(name)], 0).await.unwrap();

    let value = h.reader.read_run_value(ids[0]).await.unwrap();
    assert_eq!(value["name"], name);
    assert_eq!(value["outputs"]["answer"], "4");
}

// ============================================================================
// Field Independence
// ============================================================================

#[tokio::test]
async fn test_truncated_reference_degrades_one_field() {
    let h = harness(StorageConfig::default()).await;
    let ids = h.writer.write_runs(&[full_run("intact")], 0).await.unwrap();
    let original = h.index.get_row(ids[0]).await.unwrap().unwrap();

    // Same blob, outputs span cut one byte short.
    let outputs = original.blob_ref(PayloadField::Outputs).unwrap();
    let corrupted = IndexRow {
        id: Uuid::new_v4(),
        outputs_ref: BlobRef::new(
            outputs.container,
            outputs.key,
            outputs.start,
            outputs.end - 1,
            outputs.field,
        )
        .encode(),
        ..original
    };
    h.index.insert_rows(std::slice::from_ref(&corrupted)).await.unwrap();

    let value = h.reader.read_run_value(corrupted.id).await.unwrap();
    assert_eq!(value["outputs"], json!({}));
    assert_eq!(value["inputs"]["prompt"], "What is 2+2?");
    assert_eq!(value["metadata"]["model"], "test-model");
}

#[tokio::test]
async fn test_failed_range_reads_degrade_to_empty_objects() {
    let h = harness(StorageConfig::default()).await;
    let ids = h.writer.write_runs(&[full_run("unreadable")], 0).await.unwrap();

    h.store.fail_ranges(true);
    let value = h.reader.read_run_value(ids[0]).await.unwrap();

    assert_eq!(value["name"], "unreadable");
    for field in PayloadField::ALL {
        assert_eq!(value[field.as_str()], json!({}));
    }
}

// ============================================================================
// Validation and Lookup
// ============================================================================

#[tokio::test]
async fn test_invalid_trace_id_persists_nothing() {
    let h = harness(StorageConfig::default()).await;
    let mut bad = full_run("bad");
    bad.trace_id = "definitely-not-a-uuid".to_string();
    let good = full_run("good").with_id(Uuid::new_v4());
    let good_id = Uuid::parse_str(good.id.as_deref().unwrap()).unwrap();

    let err = h.writer.write_runs(&[good, bad], 0).await.unwrap_err();
    assert_eq!(err.to_string(), "invalid trace_id at index 1");

    assert_eq!(h.store.put_count(), 0);
    assert!(h.store.keys().await.is_empty());
    assert!(h.index.get_row(good_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_non_object_payloads_persist_nothing() {
    let h = harness(StorageConfig::default()).await;
    let good = full_run("good").with_id(Uuid::new_v4());
    let good_id = Uuid::parse_str(good.id.as_deref().unwrap()).unwrap();
    let bad: RunIn = serde_json::from_value(json!({
        "trace_id": Uuid::new_v4().to_string(),
        "name": "shapes",
        "inputs": [1, 2],
        "outputs": "str",
        "metadata": 7
    }))
    .unwrap();

    let err = h.writer.write_runs(&[good, bad], 0).await.unwrap_err();
    assert!(matches!(err, Error::InvalidBatch(_)));
    assert_eq!(err.to_string(), "inputs at index 1 must be a JSON object");

    assert_eq!(h.store.put_count(), 0);
    assert!(h.store.keys().await.is_empty());
    assert!(h.index.get_row(good_id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_unknown_id_is_not_found() {
    let h = harness(StorageConfig::default()).await;
    let id = Uuid::new_v4();
    let err = h.reader.read_run(id).await.err().unwrap();
    assert!(matches!(err, Error::RunNotFound(_)));
}

#[tokio::test]
async fn test_index_lookup_failure_is_not_found() {
    let h = harness(StorageConfig::default()).await;
    let ids = h.writer.write_runs(&[full_run("hidden")], 0).await.unwrap();

    h.index.fail_lookups(true);
    let err = h.reader.read_run(ids[0]).await.err().unwrap();
    assert!(matches!(err, Error::RunNotFound(id) if id == ids[0]));
}

// ============================================================================
// Write Failures
// ============================================================================

#[tokio::test]
async fn test_upload_failure_fails_write() {
    let h = harness(StorageConfig::default()).await;
    h.store.fail_puts(true);

    let err = h.writer.write_runs(&[full_run("x")], 0).await.unwrap_err();
    let Error::WriteFailed(failure) = &err else {
        panic!("expected WriteFailed, got {err:?}");
    };
    assert!(failure.upload.is_some());
    assert!(failure.index.is_none());
    assert_eq!(failure.status(), "upload_failed");
    assert_eq!(h.store.put_count(), 1);
}

#[tokio::test]
async fn test_index_failure_leaves_orphaned_blob() {
    let h = harness(StorageConfig::default()).await;
    h.index.fail_inserts(true);

    let err = h.writer.write_runs(&[full_run("x")], 0).await.unwrap_err();
    let Error::WriteFailed(failure) = &err else {
        panic!("expected WriteFailed, got {err:?}");
    };
    assert!(failure.upload.is_none());
    assert_eq!(failure.status(), "index_failed");
    assert_eq!(h.store.keys().await.len(), 1);
}

#[tokio::test]
async fn test_both_failures_reported_together() {
    let h = harness(StorageConfig::default()).await;
    h.store.fail_puts(true);
    h.index.fail_inserts(true);

    let err = h.writer.write_runs(&[full_run("x")], 0).await.unwrap_err();
    let message = err.to_string();
    assert!(message.contains("injected upload failure"), "{message}");
    assert!(message.contains("injected insert failure"), "{message}");

    let Error::WriteFailed(failure) = err else {
        panic!("expected WriteFailed");
    };
    assert_eq!(failure.status(), "both_failed");
}

#[tokio::test]
async fn test_duplicate_id_is_reported_as_duplicate() {
    let h = harness(StorageConfig::default()).await;
    let id = Uuid::new_v4();
    h.writer.write_runs(&[full_run("first").with_id(id)], 0).await.unwrap();

    let err = h
        .writer
        .write_runs(&[full_run("second").with_id(id)], 0)
        .await
        .unwrap_err();
    let Error::WriteFailed(failure) = &err else {
        panic!("expected WriteFailed, got {err:?}");
    };
    assert!(failure.is_duplicate_id());

    // The original run is untouched.
    let value = h.reader.read_run_value(id).await.unwrap();
    assert_eq!(value["name"], "first");
}

// ============================================================================
// Buffer Pool
// ============================================================================

#[tokio::test]
async fn test_pooling_does_not_change_results() {
    let pooled = harness(StorageConfig::default()).await;
    let unpooled = harness(StorageConfig {
        buffer_pool_enabled: false,
        ..Default::default()
    })
    .await;

    for round in 0..5 {
        let runs: Vec<_> = (0..round + 1)
            .map(|i| full_run(&format!("round-{round}-run-{i}")))
            .collect();

        let pooled_ids = pooled.writer.write_runs(&runs, 256).await.unwrap();
        let unpooled_ids = unpooled.writer.write_runs(&runs, 256).await.unwrap();

        for (a, b) in pooled_ids.iter().zip(&unpooled_ids) {
            let mut left = pooled.reader.read_run_value(*a).await.unwrap();
            let mut right = unpooled.reader.read_run_value(*b).await.unwrap();
            for value in [&mut left, &mut right] {
                value["id"] = Value::Null;
            }
            assert_eq!(left, right);
        }
    }
}

#[tokio::test]
async fn test_concurrent_writes_and_reads() {
    let h = std::sync::Arc::new(harness(StorageConfig::default()).await);

    let mut handles = Vec::new();
    for t in 0..8 {
        let h = h.clone();
        handles.push(tokio::spawn(async move {
            let runs: Vec<_> = (0..5).map(|i| full_run(&format!("t{t}-r{i}"))).collect();
            let ids = h.writer.write_runs(&runs, 0).await.unwrap();
            for (i, id) in ids.iter().enumerate() {
                let value = h.reader.read_run_value(*id).await.unwrap();
                assert_eq!(value["name"], format!("t{t}-r{i}"));
                assert_eq!(value["outputs"]["tokens"], json!([1, 2, 3]));
            }
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    assert_eq!(h.store.keys().await.len(), 8);
}
