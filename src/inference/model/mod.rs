mod types;
mod registry;

pub use types::ModelRecord;
pub use registry::{ModelRegistry, REGISTRY_FILE, file_sha256, model_name};
