use mocap_core::SkeletonError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SolverError {
    #[error("expected {expected} keypoints, got {got}")]
    KeypointCountMismatch { expected: usize, got: usize },
    #[error("expected {expected} validity flags, got {got}")]
    ValidityCountMismatch { expected: usize, got: usize },
    #[error("no fitted frames in history")]
    EmptyHistory,
    #[error("expected angles for {expected} optimizable bones, got {got}")]
    AngleCountMismatch { expected: usize, got: usize },
    #[error(transparent)]
    Skeleton(#[from] SkeletonError),
    #[error("invalid solver configuration: {0}")]
    Config(String),
    #[error(transparent)]
    Problem(#[from] anyhow::Error),
}
