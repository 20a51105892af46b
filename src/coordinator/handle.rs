use std::path::PathBuf;
use std::thread::{self, JoinHandle};

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info};

use crate::coordinator::coordinator::{
    Classification, Coordinator, EvaluationReport, Listed, ModelListing,
};
use crate::error::{Error, Result};
use crate::evaluation::SampleScored;
use crate::history::{ClassificationRecord, EvaluationRecord};
use crate::inference::ModelRecord;

const COMMAND_QUEUE: usize = 32;

pub type Reply<T> = oneshot::Sender<Result<T>>;

/// Requests served by the coordinator thread.
pub enum Command {
    Models(Reply<ModelListing>),
    Import { path: PathBuf, reply: Reply<String> },
    Select { name: String, reply: Reply<()> },
    Remove { name: String, reply: Reply<()> },
    Prune(Reply<Vec<String>>),
    Info { name: String, reply: Reply<ModelRecord> },
    Classify { image: PathBuf, reply: Reply<Classification> },
    Evaluate {
        dataset: PathBuf,
        progress: Option<mpsc::UnboundedSender<SampleScored>>,
        reply: Reply<EvaluationReport>,
    },
    History(Reply<Vec<Listed<ClassificationRecord>>>),
    Matrices(Reply<Vec<Listed<EvaluationRecord>>>),
    ClearHistory(Reply<()>),
    ClearMatrices(Reply<()>),
}

/// Starts `coordinator` on a dedicated thread.
///
/// The thread exits once every handle has been dropped.
pub fn spawn(coordinator: Coordinator) -> Result<(CoordinatorHandle, JoinHandle<()>)> {
    let (tx, rx) = mpsc::channel(COMMAND_QUEUE);
    let join = thread::Builder::new()
        .name("coordinator".to_string())
        .spawn(move || run(coordinator, rx))?;
    Ok((CoordinatorHandle { tx }, join))
}

fn run(mut coordinator: Coordinator, mut rx: mpsc::Receiver<Command>) {
    info!("Coordinator started");
    while let Some(command) = rx.blocking_recv() {
        dispatch(&mut coordinator, command);
    }
    info!("Coordinator stopped");
}

fn dispatch(c: &mut Coordinator, command: Command) {
    // A send error only means the caller stopped waiting.
    match command {
        Command::Models(reply) => {
            let _ = reply.send(Ok(c.models()));
        }
        Command::Import { path, reply } => {
            let _ = reply.send(c.import(&path));
        }
        Command::Select { name, reply } => {
            let _ = reply.send(c.select(&name));
        }
        Command::Remove { name, reply } => {
            let _ = reply.send(c.remove(&name));
        }
        Command::Prune(reply) => {
            let _ = reply.send(Ok(c.prune()));
        }
        Command::Info { name, reply } => {
            let _ = reply.send(c.info(&name));
        }
        Command::Classify { image, reply } => {
            let _ = reply.send(c.classify(&image));
        }
        Command::Evaluate { dataset, progress, reply } => {
            let mut on_sample = |scored: SampleScored| {
                if let Some(progress) = &progress {
                    let _ = progress.send(scored);
                }
            };
            let _ = reply.send(c.evaluate(&dataset, &mut on_sample));
        }
        Command::History(reply) => {
            let _ = reply.send(c.history());
        }
        Command::Matrices(reply) => {
            let _ = reply.send(c.matrices());
        }
        Command::ClearHistory(reply) => {
            let _ = reply.send(c.clear_history());
        }
        Command::ClearMatrices(reply) => {
            let _ = reply.send(c.clear_matrices());
        }
    }
}

/// Async front for a running coordinator. Cheap to clone.
#[derive(Clone)]
pub struct CoordinatorHandle {
    tx: mpsc::Sender<Command>,
}

impl CoordinatorHandle {
    async fn request<T>(&self, make: impl FnOnce(Reply<T>) -> Command) -> Result<T> {
        let (reply, response) = oneshot::channel();
        self.tx
            .send(make(reply))
            .await
            .map_err(|_| Error::Disconnected("command channel closed".to_string()))?;
        let result = response
            .await
            .map_err(|_| Error::Disconnected("no reply from coordinator".to_string()))?;
        debug!("Coordinator replied (ok: {})", result.is_ok());
        result
    }

    pub async fn models(&self) -> Result<ModelListing> {
        self.request(Command::Models).await
    }

    pub async fn import(&self, path: impl Into<PathBuf>) -> Result<String> {
        let path = path.into();
        self.request(|reply| Command::Import { path, reply }).await
    }

    pub async fn select(&self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        self.request(|reply| Command::Select { name, reply }).await
    }

    pub async fn remove(&self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        self.request(|reply| Command::Remove { name, reply }).await
    }

    pub async fn prune(&self) -> Result<Vec<String>> {
        self.request(Command::Prune).await
    }

    pub async fn info(&self, name: impl Into<String>) -> Result<ModelRecord> {
        let name = name.into();
        self.request(|reply| Command::Info { name, reply }).await
    }

    pub async fn classify(&self, image: impl Into<PathBuf>) -> Result<Classification> {
        let image = image.into();
        self.request(|reply| Command::Classify { image, reply }).await
    }

    /// Runs an evaluation; each scored sample is forwarded to `progress`.
    pub async fn evaluate(
        &self,
        dataset: impl Into<PathBuf>,
        progress: Option<mpsc::UnboundedSender<SampleScored>>,
    ) -> Result<EvaluationReport> {
        let dataset = dataset.into();
        self.request(|reply| Command::Evaluate { dataset, progress, reply }).await
    }

    pub async fn history(&self) -> Result<Vec<Listed<ClassificationRecord>>> {
        self.request(Command::History).await
    }

    pub async fn matrices(&self) -> Result<Vec<Listed<EvaluationRecord>>> {
        self.request(Command::Matrices).await
    }

    pub async fn clear_history(&self) -> Result<()> {
        self.request(Command::ClearHistory).await
    }

    pub async fn clear_matrices(&self) -> Result<()> {
        self.request(Command::ClearMatrices).await
    }
}
