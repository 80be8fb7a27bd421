use crate::Utils::plots::RenderError;
use crate::Utils::task_parser::TaskError;
use crate::numerical::NonStiff_api::IvpError;

/// Failures that end a request. Symbolic-side problems never show up here: they become the
/// text of the symbolic solution instead.
#[derive(Debug, thiserror::Error)]
pub enum DualSolverError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),
    #[error("numerical integration failed: {0}")]
    Integration(#[from] IvpError),
    #[error("cannot render the trajectory: {0}")]
    Render(#[from] RenderError),
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error("cannot export the trajectory: {0}")]
    Export(#[from] csv::Error),
}

impl DualSolverError {
    pub(crate) fn invalid(message: impl Into<String>) -> Self {
        DualSolverError::InvalidRequest(message.into())
    }
}
