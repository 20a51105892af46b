use std::path::{Path, PathBuf};

use tracing::{info, warn};

use crate::config::Settings;
use crate::error::{Error, Result};
use crate::evaluation::{evaluate_with_progress, EvaluationResult, SampleScored};
use crate::history::{
    ArtifactStatus, ArtifactStore, ClassificationEntry, ClassificationHistory, ClassificationRecord, ConfusionHistory, CopiedFile,
    EvaluationEntry, EvaluationRecord, HeatmapRenderer, HistoryRecord, MatrixRenderer, RenderedMatrix,
};
use crate::inference::{argmax, InferenceEngine, ModelRecord, ModelRegistry, SelectionLog, SessionLoader};
use crate::preprocess::{ImageTensorCodec, TensorCodec};

/// Outcome of classifying a single image.
#[derive(Debug, Clone)]
pub struct Classification {
    pub model: String,
    pub label: String,
    pub class_index: usize,
    /// One probability per configured class
    pub probabilities: Vec<f32>,
    /// Copy of the image kept in the classification history
    pub artifact: PathBuf,
}

/// Outcome of evaluating a dataset.
#[derive(Debug, Clone)]
pub struct EvaluationReport {
    pub model: String,
    pub dataset: PathBuf,
    pub result: EvaluationResult,
    /// Rendered confusion matrix kept in the confusion history
    pub artifact: PathBuf,
}

/// Registered models together with the cache state.
#[derive(Debug, Clone)]
pub struct ModelListing {
    pub records: Vec<ModelRecord>,
    pub current: Option<String>,
    /// Names with a live session, least recently used first
    pub resident: Vec<String>,
}

/// A history record and whether its artifact is still on disk.
#[derive(Debug, Clone)]
pub struct Listed<R> {
    pub record: R,
    pub artifact: ArtifactStatus,
}

/// Single owner of the engine and both history stores.
///
/// All mutations of the registry, the session cache and the stores go
/// through one `Coordinator`. Run it on its own thread with
/// [`spawn`](crate::coordinator::spawn) to serve several callers.
pub struct Coordinator {
    engine: InferenceEngine,
    selection: SelectionLog,
    codec: Box<dyn TensorCodec>,
    renderer: Box<dyn MatrixRenderer>,
    history: ClassificationHistory,
    matrices: ConfusionHistory,
    class_names: Vec<String>,
    buffer_capacity: usize,
}

impl Coordinator {
    /// Opens the registry and both stores described by `settings` and
    /// restores the last selected model.
    pub fn new(settings: &Settings, loader: Box<dyn SessionLoader>) -> Result<Self> {
        let registry = ModelRegistry::open(settings.models.directory.clone())?;
        let selection = SelectionLog::new(&registry.models_dir);
        let engine = InferenceEngine::new(registry, loader, settings.models.max_loaded);

        let history = ClassificationHistory::open(settings.history.directory.clone(), settings.history.max_records)?;
        let matrices = ConfusionHistory::open(
            settings.confusion_history.directory.clone(),
            settings.confusion_history.max_records,
        )?;

        let mut coordinator = Self {
            engine,
            selection,
            codec: Box::new(ImageTensorCodec::new(settings.preprocessing.channel_order)),
            renderer: Box::new(HeatmapRenderer),
            history,
            matrices,
            class_names: settings.evaluation.class_names.clone(),
            buffer_capacity: settings.evaluation.buffer_capacity,
        };
        coordinator.restore_selection();
        Ok(coordinator)
    }

    /// Replaces the image codec.
    pub fn with_codec(mut self, codec: Box<dyn TensorCodec>) -> Self {
        self.codec = codec;
        self
    }

    /// Replaces the confusion matrix renderer.
    pub fn with_renderer(mut self, renderer: Box<dyn MatrixRenderer>) -> Self {
        self.renderer = renderer;
        self
    }

    pub fn class_names(&self) -> &[String] {
        &self.class_names
    }

    pub fn current_model(&self) -> Option<&str> {
        self.engine.current_name()
    }

    fn restore_selection(&mut self) {
        let Some(name) = self.selection.last() else {
            return;
        };
        if self.engine.set_current(&name) {
            info!("Restored model selection: {}", name);
        } else {
            warn!("Last selected model {} is no longer registered", name);
        }
    }

    pub fn models(&self) -> ModelListing {
        ModelListing {
            records: self.engine.registry().records().cloned().collect(),
            current: self.engine.current_name().map(str::to_string),
            resident: self.engine.resident_sessions(),
        }
    }

    /// Copies a model file into the models directory and registers it.
    pub fn import(&mut self, path: &Path) -> Result<String> {
        self.engine.import(path)
    }

    /// Makes `name` the current model, loads its session if possible and
    /// records the choice for the next start.
    pub fn select(&mut self, name: &str) -> Result<()> {
        if !self.engine.set_current(name) {
            return Err(Error::NotFound(format!("model {} is not registered", name)));
        }
        self.engine.ensure_loaded(name);
        self.selection.append(name);
        info!("Selected model {}", name);
        Ok(())
    }

    pub fn remove(&mut self, name: &str) -> Result<()> {
        if self.engine.info(name).is_none() {
            return Err(Error::NotFound(format!("model {} is not registered", name)));
        }
        self.engine.remove(name);
        info!("Removed model {}", name);
        Ok(())
    }

    /// Unregisters models whose files are gone. Returns their names.
    pub fn prune(&mut self) -> Vec<String> {
        self.engine.prune_orphans()
    }

    pub fn info(&self, name: &str) -> Result<ModelRecord> {
        self.engine
            .info(name)
            .ok_or_else(|| Error::NotFound(format!("model {} is not registered", name)))
    }

    fn current_name(&self) -> Result<String> {
        self.engine
            .current_name()
            .map(str::to_string)
            .ok_or_else(|| Error::NotFound("no model selected".to_string()))
    }

    /// Classifies one image with the current model and logs it.
    pub fn classify(&mut self, image: &Path) -> Result<Classification> {
        let model = self.current_name()?;
        let tensor = self.codec.decode(image)?;
        let probabilities = self.engine.load(&model)?.infer(&tensor)?;

        let class_index = argmax(&probabilities)
            .ok_or_else(|| Error::Inference("model returned no probabilities".to_string()))?;
        let label = self.class_names.get(class_index).cloned().ok_or_else(|| {
            Error::Inference(format!(
                "predicted class {} but only {} classes are configured",
                class_index,
                self.class_names.len()
            ))
        })?;

        let entry = ClassificationEntry {
            model: model.clone(),
            result: label.clone(),
            probabilities: ClassificationEntry::format_probabilities(&self.class_names, &probabilities),
        };
        let artifact = self.history.append(&CopiedFile(image), entry)?;
        info!("Classified {} as {} with {}", image.display(), label, model);

        Ok(Classification { model, label, class_index, probabilities, artifact })
    }

    /// Evaluates the current model over `dataset` and logs the rendered
    /// confusion matrix.
    pub fn evaluate(&mut self, dataset: &Path, on_sample: &mut dyn FnMut(SampleScored)) -> Result<EvaluationReport> {
        let model = self.current_name()?;
        let session = self.engine.load(&model)?;
        let result = evaluate_with_progress(
            session,
            self.codec.as_ref(),
            dataset,
            &self.class_names,
            self.buffer_capacity,
            on_sample,
        )?;

        let chart = RenderedMatrix {
            renderer: self.renderer.as_ref(),
            matrix: &result.matrix,
            class_names: &self.class_names,
        };
        let entry = EvaluationEntry::new(&result.metrics, &model, Some(dataset));
        let artifact = self.matrices.append(&chart, entry)?;
        info!(
            "Evaluated {} on {}: accuracy {:.4}",
            model,
            dataset.display(),
            result.metrics.accuracy
        );

        Ok(EvaluationReport { model, dataset: dataset.to_path_buf(), result, artifact })
    }

    /// Classification history, newest first.
    pub fn history(&self) -> Result<Vec<Listed<ClassificationRecord>>> {
        Ok(self
            .history
            .load_newest_first()?
            .into_iter()
            .map(|record| listed(&self.history, record))
            .collect())
    }

    /// Confusion-matrix history, newest first.
    pub fn matrices(&self) -> Result<Vec<Listed<EvaluationRecord>>> {
        Ok(self
            .matrices
            .load_newest_first()?
            .into_iter()
            .map(|record| listed(&self.matrices, record))
            .collect())
    }

    pub fn clear_history(&mut self) -> Result<()> {
        self.history.clear()
    }

    pub fn clear_matrices(&mut self) -> Result<()> {
        self.matrices.clear()
    }
}

fn listed<R: HistoryRecord>(store: &ArtifactStore<R>, record: R) -> Listed<R> {
    let artifact = store.artifact_status(&record);
    Listed { record, artifact }
}
