//! Error types for instance pools and the pool registry

use thiserror::Error;

/// Caller errors raised by [`Pool`](crate::Pool) and
/// [`PoolRegistry`](crate::PoolRegistry).
///
/// Running out of capacity is not one of them: an exhausted pool answers
/// `acquire` with `None`.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Pool for template {0} does not exist")]
    NotFound(String),

    #[error("Pool for template {0} already exists")]
    AlreadyExists(String),
}

impl PoolError {
    pub(crate) fn not_found(template: &impl std::fmt::Debug) -> Self {
        PoolError::NotFound(format!("{:?}", template))
    }

    pub(crate) fn already_exists(template: &impl std::fmt::Debug) -> Self {
        PoolError::AlreadyExists(format!("{:?}", template))
    }

    pub(crate) fn invalid_template(template: &impl std::fmt::Debug) -> Self {
        PoolError::InvalidArgument(format!("template {:?} is not valid", template))
    }
}

pub type PoolResult<T> = Result<T, PoolError>;
