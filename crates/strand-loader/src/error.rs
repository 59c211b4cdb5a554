use strand_flow::FlowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LoadError {
  /// No flow file matched the requested name.
  #[error("flow '{name}' not found; available flows: {}", format_available(available))]
  NotFound { name: String, available: Vec<String> },

  #[error("failed to read flow '{name}'")]
  Io {
    name: String,
    #[source]
    source: std::io::Error,
  },

  #[error("flow '{name}' is not valid JSON")]
  InvalidJson {
    name: String,
    #[source]
    source: serde_json::Error,
  },

  /// The definition parsed but failed validation.
  #[error(transparent)]
  Flow(#[from] FlowError),
}

fn format_available(available: &[String]) -> String {
  if available.is_empty() {
    "(none)".to_string()
  } else {
    available.join(", ")
  }
}
