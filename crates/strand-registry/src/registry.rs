use std::collections::HashMap;
use std::sync::Arc;

use crate::error::RegistryError;
use crate::function::FlowFunction;

/// Maps function names to implementations.
///
/// Built once by the embedding process, then shared read-only across
/// concurrent flow runs.
#[derive(Default)]
pub struct FunctionRegistry {
  functions: HashMap<String, Arc<dyn FlowFunction>>,
}

impl FunctionRegistry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Register a function under a unique name.
  pub fn register(
    &mut self,
    name: impl Into<String>,
    function: Arc<dyn FlowFunction>,
  ) -> Result<(), RegistryError> {
    let name = name.into();
    if self.functions.contains_key(&name) {
      return Err(RegistryError::DuplicateFunction { name });
    }
    self.functions.insert(name, function);
    Ok(())
  }

  /// Look up a function by name.
  pub fn get(&self, name: &str) -> Option<Arc<dyn FlowFunction>> {
    self.functions.get(name).cloned()
  }

  pub fn contains(&self, name: &str) -> bool {
    self.functions.contains_key(name)
  }

  /// Registered function names, sorted.
  pub fn names(&self) -> Vec<String> {
    let mut names: Vec<String> = self.functions.keys().cloned().collect();
    names.sort();
    names
  }

  pub fn len(&self) -> usize {
    self.functions.len()
  }

  pub fn is_empty(&self) -> bool {
    self.functions.is_empty()
  }
}
