use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum GestureError {
    #[error("invalid argument: need at least {needed} touch points, got {got}")]
    InvalidArgument { needed: usize, got: usize },
}

pub type Result<T> = std::result::Result<T, GestureError>;
