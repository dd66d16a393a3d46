use thiserror::Error;

use super::JobId;

#[derive(Debug, Error)]
pub enum RegistryError {
    #[error("job {job_id} still had {refs} live guards after {waited_ms}ms")]
    DrainTimeout {
        job_id: JobId,
        refs: usize,
        waited_ms: u128,
    },
}

pub type Result<T> = std::result::Result<T, RegistryError>;
