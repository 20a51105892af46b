mod common;

use std::fs;

use common::{settings, write_dataset, write_file, ByteCodec, RecordingLoader, TextRenderer};
use cxai::coordinator::{self, Coordinator};
use cxai::history::ArtifactStatus;
use cxai::Error;

fn open_coordinator(root: &std::path::Path, loader: RecordingLoader) -> Coordinator {
    Coordinator::new(&settings(root, &["A", "B"]), Box::new(loader))
        .unwrap()
        .with_codec(Box::new(ByteCodec))
        .with_renderer(Box::new(TextRenderer))
}

#[test]
fn classify_requires_a_selected_model() {
    let tmp = tempfile::tempdir().unwrap();
    let mut c = open_coordinator(tmp.path(), RecordingLoader::new(2));
    let image = write_file(&tmp.path().join("scan.png"), &[1]);

    assert!(matches!(c.classify(&image).unwrap_err(), Error::NotFound(_)));
    assert!(c.history().unwrap().is_empty());
}

#[test]
fn classify_logs_result_and_copies_image() {
    let tmp = tempfile::tempdir().unwrap();
    let mut c = open_coordinator(tmp.path(), RecordingLoader::new(2));
    let model = write_file(&tmp.path().join("net.onnx"), b"weights");
    let name = c.import(&model).unwrap();
    c.select(&name).unwrap();

    let image = write_file(&tmp.path().join("scan.png"), &[1]);
    let result = c.classify(&image).unwrap();

    assert_eq!(result.label, "B");
    assert_eq!(result.probabilities, vec![0.0, 1.0]);
    assert_eq!(fs::read(&result.artifact).unwrap(), vec![1]);

    let history = c.history().unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].record.result, "B");
    assert_eq!(history[0].record.model, "net");
    assert_eq!(history[0].record.probabilities, "A: 0.00%\nB: 100.00%");
    assert_eq!(history[0].artifact, ArtifactStatus::Available(result.artifact));
}

#[test]
fn evaluation_scenario_is_logged_with_chart() {
    let tmp = tempfile::tempdir().unwrap();
    let mut c = open_coordinator(tmp.path(), RecordingLoader::new(2));
    let model = write_file(&tmp.path().join("net.onnx"), b"weights");
    c.import(&model).unwrap();
    c.select("net").unwrap();

    let dataset = tmp.path().join("xrays");
    write_dataset(&dataset, &[("A", 0), ("A", 1), ("B", 1), ("B", 1)]);

    let mut seen = Vec::new();
    let report = c.evaluate(&dataset, &mut |scored| seen.push(scored.processed)).unwrap();

    assert_eq!(report.result.matrix.row(0), &[1, 1]);
    assert_eq!(report.result.matrix.row(1), &[0, 2]);
    assert!((report.result.metrics.accuracy - 0.75).abs() < 1e-9);
    assert_eq!(seen, vec![1, 2, 3, 4]);
    assert_eq!(fs::read_to_string(&report.artifact).unwrap(), "1 1\n0 2");

    let matrices = c.matrices().unwrap();
    assert_eq!(matrices.len(), 1);
    assert_eq!(matrices[0].record.dataset, "xrays");
    assert_eq!(matrices[0].record.model, "net");
    assert!((matrices[0].record.parsed_metrics().unwrap().accuracy - 0.75).abs() < 1e-9);
}

#[test]
fn selection_is_restored_on_restart() {
    let tmp = tempfile::tempdir().unwrap();
    {
        let mut c = open_coordinator(tmp.path(), RecordingLoader::new(2));
        c.import(&write_file(&tmp.path().join("first.onnx"), b"1")).unwrap();
        c.import(&write_file(&tmp.path().join("second.onnx"), b"2")).unwrap();
        c.select("first").unwrap();
        c.select("second").unwrap();
    }
    let c = open_coordinator(tmp.path(), RecordingLoader::new(2));
    assert_eq!(c.current_model(), Some("second"));
}

#[test]
fn selecting_or_removing_unknown_models_fails() {
    let tmp = tempfile::tempdir().unwrap();
    let mut c = open_coordinator(tmp.path(), RecordingLoader::new(2));
    assert!(matches!(c.select("ghost").unwrap_err(), Error::NotFound(_)));
    assert!(matches!(c.remove("ghost").unwrap_err(), Error::NotFound(_)));
    assert!(matches!(c.info("ghost").unwrap_err(), Error::NotFound(_)));
}

#[tokio::test]
async fn handle_serves_requests_from_the_coordinator_thread() {
    let tmp = tempfile::tempdir().unwrap();
    let loader = RecordingLoader::new(2);
    let c = open_coordinator(tmp.path(), loader.clone());
    let (handle, worker) = coordinator::spawn(c).unwrap();

    let model = write_file(&tmp.path().join("net.onnx"), b"weights");
    assert_eq!(handle.import(model).await.unwrap(), "net");
    handle.select("net").await.unwrap();

    let listing = handle.models().await.unwrap();
    assert_eq!(listing.current.as_deref(), Some("net"));
    assert_eq!(listing.resident, vec!["net"]);
    assert_eq!(loader.loads(), vec!["net"]);

    let dataset = tmp.path().join("xrays");
    write_dataset(&dataset, &[("A", 0), ("B", 1)]);
    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let report = handle.evaluate(&dataset, Some(tx)).await.unwrap();
    assert_eq!(report.result.matrix.trace(), 2);
    let mut progress = Vec::new();
    while let Some(scored) = rx.recv().await {
        progress.push(scored.processed);
    }
    assert_eq!(progress, vec![1, 2]);

    handle.clear_matrices().await.unwrap();
    assert!(handle.matrices().await.unwrap().is_empty());

    drop(handle);
    worker.join().unwrap();
}
