mod common;

use std::fs;
use std::path::Path;

use common::{write_file, RecordingLoader};
use cxai::inference::{InferenceEngine, ModelRegistry};
use cxai::Error;

fn engine_with(models_dir: &Path, loader: RecordingLoader, names: &[&str]) -> InferenceEngine {
    let mut registry = ModelRegistry::open(models_dir).unwrap();
    for name in names {
        let path = write_file(&models_dir.join(format!("{}.onnx", name)), name.as_bytes());
        registry.register(&path).unwrap();
    }
    InferenceEngine::new(registry, Box::new(loader), 2)
}

#[test]
fn cache_holds_the_two_most_recent_models() {
    let tmp = tempfile::tempdir().unwrap();
    let loader = RecordingLoader::new(2);
    let mut engine = engine_with(tmp.path(), loader.clone(), &["a", "b", "c"]);

    engine.load("a").unwrap();
    engine.load("b").unwrap();
    engine.load("a").unwrap();
    engine.load("c").unwrap();

    assert_eq!(engine.resident_sessions(), vec!["a", "c"]);
    assert_eq!(loader.loads(), vec!["a", "b", "c"]);

    // b was evicted, so it is constructed again and displaces a.
    engine.load("b").unwrap();
    assert_eq!(engine.resident_sessions(), vec!["c", "b"]);
    assert_eq!(loader.loads().len(), 4);
}

#[test]
fn usage_is_recorded_per_construction() {
    let tmp = tempfile::tempdir().unwrap();
    let mut engine = engine_with(tmp.path(), RecordingLoader::new(2), &["a"]);

    engine.load("a").unwrap();
    engine.load("a").unwrap();

    let record = engine.info("a").unwrap();
    assert_eq!(record.use_count, 1);
    assert!(record.last_used.is_some());
}

#[test]
fn unregistered_name_leaves_cache_untouched() {
    let tmp = tempfile::tempdir().unwrap();
    let loader = RecordingLoader::new(2);
    let mut engine = engine_with(tmp.path(), loader.clone(), &["a", "b"]);
    engine.load("a").unwrap();
    engine.load("b").unwrap();

    let err = engine.load("missing").err().unwrap();
    assert!(matches!(err, Error::NotFound(_)));
    assert_eq!(engine.resident_sessions(), vec!["a", "b"]);
    assert_eq!(loader.loads().len(), 2);
}

#[test]
fn deleted_model_file_is_not_found() {
    let tmp = tempfile::tempdir().unwrap();
    let mut engine = engine_with(tmp.path(), RecordingLoader::new(2), &["a"]);
    fs::remove_file(tmp.path().join("a.onnx")).unwrap();

    assert!(matches!(engine.load("a").err().unwrap(), Error::NotFound(_)));
    assert!(engine.resident_sessions().is_empty());
}

#[test]
fn loader_failures_surface_as_load_errors() {
    let tmp = tempfile::tempdir().unwrap();
    let mut loader = RecordingLoader::new(2);
    loader.fail_with = Some(|| Error::Inference("bad graph".to_string()));
    let mut engine = engine_with(tmp.path(), loader, &["a"]);

    match engine.load("a").err().unwrap() {
        Error::Load { name, reason } => {
            assert_eq!(name, "a");
            assert!(reason.contains("bad graph"));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!engine.ensure_loaded("a"));
}

#[test]
fn importing_twice_keeps_one_entry() {
    let tmp = tempfile::tempdir().unwrap();
    let models_dir = tmp.path().join("models");
    let source = write_file(&tmp.path().join("downloads").join("net.onnx"), b"weights");
    let mut engine = engine_with(&models_dir, RecordingLoader::new(2), &[]);

    let first = engine.import(&source).unwrap();
    let before = engine.info(&first).unwrap();
    let second = engine.import(&source).unwrap();
    let after = engine.info(&second).unwrap();

    assert_eq!(first, "net");
    assert_eq!(second, "net");
    assert_eq!(engine.list_names(), vec!["net"]);
    assert_eq!(before.hash, after.hash);
    assert_eq!(before.registered_at, after.registered_at);
    assert!(models_dir.join("net.onnx").is_file());
}

#[test]
fn importing_a_file_already_in_place_does_not_copy() {
    let tmp = tempfile::tempdir().unwrap();
    let models_dir = tmp.path().join("models");
    let mut engine = engine_with(&models_dir, RecordingLoader::new(2), &["net"]);

    assert_eq!(engine.import(&models_dir.join("net.onnx")).unwrap(), "net");
    assert_eq!(engine.list_names(), vec!["net"]);
}

#[test]
fn registry_persists_across_reopen() {
    let tmp = tempfile::tempdir().unwrap();
    {
        let mut engine = engine_with(tmp.path(), RecordingLoader::new(2), &["a", "b"]);
        engine.load("a").unwrap();
    }
    let registry = ModelRegistry::open(tmp.path()).unwrap();
    assert_eq!(registry.names(), vec!["a", "b"]);
    assert_eq!(registry.get("a").unwrap().use_count, 1);
}

#[test]
fn current_model_loads_lazily_and_clears_on_remove() {
    let tmp = tempfile::tempdir().unwrap();
    let loader = RecordingLoader::new(2);
    let mut engine = engine_with(tmp.path(), loader.clone(), &["a", "b"]);

    assert!(!engine.set_current("nope"));
    assert!(engine.set_current("a"));
    assert!(loader.loads().is_empty());

    assert!(engine.current().is_some());
    assert_eq!(loader.loads(), vec!["a"]);

    engine.remove("a");
    assert_eq!(engine.current_name(), None);
    assert!(engine.current().is_none());
    assert!(engine.resident_sessions().is_empty());
    assert!(tmp.path().join("a.onnx").is_file());
}

#[test]
fn prune_drops_entries_without_files() {
    let tmp = tempfile::tempdir().unwrap();
    let mut engine = engine_with(tmp.path(), RecordingLoader::new(2), &["a", "b"]);
    engine.load("b").unwrap();
    fs::remove_file(tmp.path().join("b.onnx")).unwrap();

    assert_eq!(engine.prune_orphans(), vec!["b"]);
    assert_eq!(engine.list_names(), vec!["a"]);
    assert!(engine.resident_sessions().is_empty());
}
