use thiserror::Error;

#[derive(Debug, Error)]
pub enum RegistryError {
  #[error("function '{name}' is already registered")]
  DuplicateFunction { name: String },
}

/// Failure reported by a registered function.
///
/// The engine records these verbatim; retry, if desired, is a concern of the
/// function implementation or an external supervisor.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FunctionError {
  #[error("invalid input: {message}")]
  InvalidInput { message: String },

  #[error("{message}")]
  Failed { message: String },
}

impl FunctionError {
  pub fn invalid_input(message: impl Into<String>) -> Self {
    Self::InvalidInput {
      message: message.into(),
    }
  }

  pub fn failed(message: impl Into<String>) -> Self {
    Self::Failed {
      message: message.into(),
    }
  }
}
