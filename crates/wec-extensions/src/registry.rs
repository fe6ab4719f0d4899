use std::collections::HashMap;
use std::sync::Arc;

use crate::bash::BashExtension;
use crate::extension::{Extension, ToolDefinition};

/// Registry of known extensions, keyed by name (§4.5).
///
/// In the original prototype an extension was a `source` module path
/// resolved via `importlib`; here it is an in-process trait object, so
/// `discover` returns the already-loaded instances rather than lazy
/// descriptors.
pub struct Registry {
    extensions: HashMap<String, Arc<dyn Extension>>,
}

impl Registry {
    pub fn new() -> Self {
        Self {
            extensions: HashMap::new(),
        }
    }

    /// A registry pre-populated with the built-in extensions.
    pub fn with_default_extensions() -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(BashExtension::new()));
        registry
    }

    pub fn register(&mut self, extension: Arc<dyn Extension>) {
        self.extensions.insert(extension.name().to_string(), extension);
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Extension>> {
        self.extensions.get(name).cloned()
    }

    pub fn contains(&self, name: &str) -> bool {
        self.extensions.contains_key(name)
    }

    /// List the names and tool definitions of every registered extension.
    pub fn discover(&self) -> Vec<(String, ToolDefinition)> {
        self.extensions
            .iter()
            .map(|(name, ext)| (name.clone(), ext.describe()))
            .collect()
    }
}

impl Default for Registry {
    fn default() -> Self {
        Self::with_default_extensions()
    }
}
