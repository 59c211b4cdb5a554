use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::SystemTime;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::{debug, info};

use strand_flow::{Flow, FlowDef};

use crate::error::LoadError;

/// Parse and validate an inline flow definition.
///
/// Used when the caller already has the JSON in hand and no name resolution
/// is wanted.
pub fn parse_flow(source: &str) -> Result<Flow, LoadError> {
  let def: FlowDef = serde_json::from_str(source).map_err(|e| LoadError::InvalidJson {
    name: "<inline>".to_string(),
    source: e,
  })?;
  Ok(Flow::from_def(def)?)
}

/// Resolves a flow name to a validated flow.
#[async_trait]
pub trait FlowProvider: Send + Sync {
  async fn load(&self, name: &str) -> Result<Arc<Flow>, LoadError>;
}

struct CachedFlow {
  modified: SystemTime,
  flow: Arc<Flow>,
}

/// Loads flows from `<dir>/<name>.json`.
///
/// Parsed flows are cached keyed by the file's modification time, so an
/// edited file is re-read on the next lookup without restarting the process.
pub struct FsFlowProvider {
  dir: PathBuf,
  cache: RwLock<HashMap<String, CachedFlow>>,
}

impl FsFlowProvider {
  pub fn new(dir: impl Into<PathBuf>) -> Self {
    Self {
      dir: dir.into(),
      cache: RwLock::new(HashMap::new()),
    }
  }

  fn path_for(&self, name: &str) -> PathBuf {
    self.dir.join(format!("{name}.json"))
  }

  /// Names of the flow files currently present, sorted.
  pub async fn available(&self) -> Vec<String> {
    let mut names = Vec::new();
    let Ok(mut entries) = tokio::fs::read_dir(&self.dir).await else {
      return names;
    };
    while let Ok(Some(entry)) = entries.next_entry().await {
      let path = entry.path();
      if path.extension().is_some_and(|ext| ext == "json") {
        if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
          names.push(stem.to_string());
        }
      }
    }
    names.sort();
    names
  }
}

#[async_trait]
impl FlowProvider for FsFlowProvider {
  async fn load(&self, name: &str) -> Result<Arc<Flow>, LoadError> {
    let path = self.path_for(name);

    let metadata = match tokio::fs::metadata(&path).await {
      Ok(metadata) => metadata,
      Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
        return Err(LoadError::NotFound {
          name: name.to_string(),
          available: self.available().await,
        });
      }
      Err(e) => {
        return Err(LoadError::Io {
          name: name.to_string(),
          source: e,
        });
      }
    };
    let modified = metadata.modified().map_err(|e| LoadError::Io {
      name: name.to_string(),
      source: e,
    })?;

    {
      let cache = self.cache.read().await;
      if let Some(cached) = cache.get(name) {
        if cached.modified == modified {
          debug!(flow = name, "flow_cache_hit");
          return Ok(cached.flow.clone());
        }
      }
    }

    let source = tokio::fs::read_to_string(&path)
      .await
      .map_err(|e| LoadError::Io {
        name: name.to_string(),
        source: e,
      })?;
    let def: FlowDef = serde_json::from_str(&source).map_err(|e| LoadError::InvalidJson {
      name: name.to_string(),
      source: e,
    })?;
    let flow = Arc::new(Flow::from_def(def)?);

    info!(flow = name, "flow_loaded");
    let mut cache = self.cache.write().await;
    cache.insert(
      name.to_string(),
      CachedFlow {
        modified,
        flow: flow.clone(),
      },
    );

    Ok(flow)
  }
}
