use std::fs;
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, SyncSender};
use std::thread;

use tracing::{debug, info, warn};

use crate::error::{Error, Result};
use crate::evaluation::metrics::{ConfusionMatrix, EvaluationResult};
use crate::inference::{argmax, InferenceSession};
use crate::preprocess::{has_image_extension, Tensor, TensorCodec};

/// Default number of decoded samples buffered ahead of inference.
pub const DEFAULT_BUFFER_CAPACITY: usize = 4;

/// Messages flowing from the image loader to the inference loop.
enum Message {
    Sample { class_index: usize, tensor: Tensor },
    EndOfStream,
}

/// Reported to the progress observer after each sample is scored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SampleScored {
    /// Samples scored so far, including this one
    pub processed: usize,
    pub true_class: usize,
    pub predicted: usize,
}

/// Evaluates `session` over `dataset_root/<class_name>/*` images.
///
/// See [`evaluate_with_progress`].
pub fn evaluate(
    session: &dyn InferenceSession,
    codec: &dyn TensorCodec,
    dataset_root: &Path,
    class_names: &[String],
    buffer_capacity: usize,
) -> Result<EvaluationResult> {
    evaluate_with_progress(session, codec, dataset_root, class_names, buffer_capacity, &mut |_| {})
}

/// Streams the dataset through a bounded buffer and scores every sample.
///
/// A loader thread walks the class directories in index order and decodes
/// images into the buffer, blocking while it holds `buffer_capacity` samples.
/// The calling thread runs inference and takes the arg-max as prediction.
/// Missing class directories and undecodable files are logged and skipped;
/// a failed inference counts as a prediction of class 0.
pub fn evaluate_with_progress(
    session: &dyn InferenceSession,
    codec: &dyn TensorCodec,
    dataset_root: &Path,
    class_names: &[String],
    buffer_capacity: usize,
    on_sample: &mut dyn FnMut(SampleScored),
) -> Result<EvaluationResult> {
    if !dataset_root.is_dir() {
        return Err(Error::NotFound(format!("dataset directory not found: {}", dataset_root.display())));
    }

    let num_classes = class_names.len();
    let (tx, rx) = mpsc::sync_channel::<Message>(buffer_capacity.max(1));
    info!(
        "Evaluating {} with {} classes (buffer {})",
        dataset_root.display(),
        num_classes,
        buffer_capacity.max(1)
    );

    let (matrix, skipped) = thread::scope(|scope| {
        let loader = scope.spawn(move || load_samples(codec, dataset_root, class_names, tx));

        let mut matrix = ConfusionMatrix::new(num_classes);
        let mut processed = 0;
        // A closed channel without EndOfStream means the loader died; stop either way.
        while let Ok(message) = rx.recv() {
            let (true_class, tensor) = match message {
                Message::EndOfStream => break,
                Message::Sample { class_index, tensor } => (class_index, tensor),
            };
            let predicted = predict(session, &tensor, num_classes);
            matrix.record(true_class, predicted);
            processed += 1;
            on_sample(SampleScored { processed, true_class, predicted });
        }
        drop(rx);

        match loader.join() {
            Ok(skipped) => (matrix, skipped),
            Err(payload) => std::panic::resume_unwind(payload),
        }
    });

    let result = EvaluationResult::new(class_names.to_vec(), matrix, skipped);
    info!(
        "Evaluation finished: {} samples, {} skipped, accuracy {:.4}",
        result.matrix.total(),
        result.skipped,
        result.metrics.accuracy
    );
    Ok(result)
}

/// Producer side: decodes every sample and pushes it into the buffer.
/// Returns the number of files that failed to decode.
fn load_samples(
    codec: &dyn TensorCodec,
    dataset_root: &Path,
    class_names: &[String],
    tx: SyncSender<Message>,
) -> usize {
    let mut skipped = 0;
    for (class_index, class_name) in class_names.iter().enumerate() {
        for path in class_samples(dataset_root, class_name) {
            match codec.decode(&path) {
                Ok(tensor) => {
                    if tx.send(Message::Sample { class_index, tensor }).is_err() {
                        debug!("Inference loop went away; stopping loader");
                        return skipped;
                    }
                }
                Err(e) => {
                    warn!("[Skip] {}: {}", path.display(), e);
                    skipped += 1;
                }
            }
        }
    }
    // Ignored: the receiver only disappears once it has stopped reading.
    let _ = tx.send(Message::EndOfStream);
    skipped
}

/// Image files directly inside `dataset_root/class_name`. A missing folder
/// is logged and yields nothing.
fn class_samples(dataset_root: &Path, class_name: &str) -> Vec<PathBuf> {
    let folder = dataset_root.join(class_name);
    if !folder.is_dir() {
        warn!("Missing folder: {}", folder.display());
        return Vec::new();
    }
    match fs::read_dir(&folder) {
        Ok(entries) => entries
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && has_image_extension(path))
            .collect(),
        Err(e) => {
            warn!("Cannot read {}: {}", folder.display(), e);
            Vec::new()
        }
    }
}

/// Counts the samples an evaluation would visit, without decoding them.
pub fn count_samples(dataset_root: &Path, class_names: &[String]) -> usize {
    class_names
        .iter()
        .map(|class_name| class_samples(dataset_root, class_name).len())
        .sum()
}

fn predict(session: &dyn InferenceSession, tensor: &Tensor, num_classes: usize) -> usize {
    match session.infer(tensor) {
        Ok(probabilities) => match argmax(&probabilities) {
            Some(index) if index < num_classes => index,
            Some(index) => {
                warn!("Prediction index {} outside {} classes; using 0", index, num_classes);
                0
            }
            None => {
                warn!("Model returned no usable probabilities; using 0");
                0
            }
        },
        Err(e) => {
            warn!("Inference failed: {}; using 0", e);
            0
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Codec that encodes the file's first byte into the tensor and records
    /// how far ahead of the consumer it has run.
    struct ByteCodec {
        decoded: Arc<AtomicUsize>,
    }

    impl TensorCodec for ByteCodec {
        fn decode(&self, path: &Path) -> Result<Tensor> {
            let bytes = fs::read(path)?;
            let first = *bytes.first().ok_or_else(|| Error::Decode {
                path: path.to_path_buf(),
                reason: "empty".into(),
            })?;
            self.decoded.fetch_add(1, Ordering::SeqCst);
            let mut tensor = Tensor::zeros((1, 1, 1, 1));
            tensor[[0, 0, 0, 0]] = first as f32;
            Ok(tensor)
        }
    }

    /// Predicts the class stored in the tensor; 255 means "fail".
    struct EchoSession;

    impl InferenceSession for EchoSession {
        fn infer(&self, input: &Tensor) -> Result<Vec<f32>> {
            let class = input[[0, 0, 0, 0]] as usize;
            if class == 255 {
                return Err(Error::Inference("boom".into()));
            }
            let mut probs = vec![0.0; 3];
            if class < probs.len() {
                probs[class] = 1.0;
            }
            Ok(probs)
        }
    }

    fn write(dir: &Path, class: &str, name: &str, bytes: &[u8]) {
        let folder = dir.join(class);
        fs::create_dir_all(&folder).unwrap();
        fs::write(folder.join(name), bytes).unwrap();
    }

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn predicts_into_matrix_and_skips_bad_files() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "A", "a1.png", &[0]);
        write(tmp.path(), "A", "a2.JPG", &[1]);
        write(tmp.path(), "B", "b1.jpeg", &[1]);
        write(tmp.path(), "B", "b2.png", &[1]);
        write(tmp.path(), "B", "empty.png", &[]);
        write(tmp.path(), "B", "notes.txt", &[0]);

        let codec = ByteCodec { decoded: Arc::new(AtomicUsize::new(0)) };
        let result = evaluate(&EchoSession, &codec, tmp.path(), &names(&["A", "B"]), 4).unwrap();

        assert_eq!(result.matrix.row(0), &[1, 1]);
        assert_eq!(result.matrix.row(1), &[0, 2]);
        assert_eq!(result.skipped, 1);
        assert!((result.metrics.accuracy - 0.75).abs() < 1e-9);
    }

    #[test]
    fn missing_class_folder_contributes_nothing() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "A", "a.png", &[0]);

        let codec = ByteCodec { decoded: Arc::new(AtomicUsize::new(0)) };
        let result = evaluate(&EchoSession, &codec, tmp.path(), &names(&["A", "B", "C"]), 2).unwrap();
        assert_eq!(result.matrix.total(), 1);
        assert_eq!(result.matrix.row_sum(1), 0);
        assert_eq!(result.matrix.class_metrics(2).recall, 0.0);
    }

    #[test]
    fn failed_and_out_of_range_inference_defaults_to_class_zero() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "B", "fails.png", &[255]);
        write(tmp.path(), "B", "far.png", &[2]);

        let codec = ByteCodec { decoded: Arc::new(AtomicUsize::new(0)) };
        let result = evaluate(&EchoSession, &codec, tmp.path(), &names(&["A", "B"]), 1).unwrap();
        assert_eq!(result.matrix.row(1), &[2, 0]);
    }

    #[test]
    fn loader_respects_buffer_capacity() {
        let tmp = tempfile::tempdir().unwrap();
        for i in 0..12 {
            write(tmp.path(), "A", &format!("{i}.png"), &[0]);
        }
        let decoded = Arc::new(AtomicUsize::new(0));
        let codec = ByteCodec { decoded: Arc::clone(&decoded) };
        let capacity = 2;
        let mut max_lead = 0;

        evaluate_with_progress(&EchoSession, &codec, tmp.path(), &names(&["A"]), capacity, &mut |p| {
            let lead = decoded.load(Ordering::SeqCst) - p.processed;
            max_lead = max_lead.max(lead);
        })
        .unwrap();

        // Buffered samples plus the one the loader is blocked on.
        assert!(max_lead <= capacity + 1, "loader ran {} samples ahead", max_lead);
    }

    #[test]
    fn progress_reports_every_sample() {
        let tmp = tempfile::tempdir().unwrap();
        write(tmp.path(), "A", "x.png", &[0]);
        write(tmp.path(), "B", "y.png", &[1]);
        let codec = ByteCodec { decoded: Arc::new(AtomicUsize::new(0)) };
        let mut seen = Vec::new();

        evaluate_with_progress(&EchoSession, &codec, tmp.path(), &names(&["A", "B"]), 4, &mut |p| seen.push(p)).unwrap();
        assert_eq!(seen.len(), 2);
        assert_eq!(seen[1].processed, 2);
        assert_eq!(count_samples(tmp.path(), &names(&["A", "B"])), 2);
    }

    #[test]
    fn missing_dataset_root_is_not_found() {
        let tmp = tempfile::tempdir().unwrap();
        let codec = ByteCodec { decoded: Arc::new(AtomicUsize::new(0)) };
        let err = evaluate(&EchoSession, &codec, &tmp.path().join("nope"), &names(&["A"]), 4).unwrap_err();
        assert!(matches!(err, Error::NotFound(_)));
    }
}
