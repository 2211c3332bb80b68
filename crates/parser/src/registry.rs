use std::collections::HashMap;
use std::path::Path;

use repodex_core::Entity;

#[derive(Debug, thiserror::Error)]
pub enum ParseError {
  #[error("file content is not valid UTF-8")]
  InvalidEncoding,
  #[error("no parser registered for this file type")]
  Unsupported,
}

/// Given a path and its bytes, returns a finite sequence of entities. Must
/// be pure over content: identical bytes always yield identical entities.
pub trait Parser: Send + Sync {
  fn parse(&self, path: &Path, content: &[u8]) -> Result<Vec<Entity>, ParseError>;
}

/// Process-wide registry resolving a parser by file extension. Populated
/// with a minimal reference set of line-oriented parsers at construction;
/// additional parsers can be registered without touching the indexer.
pub struct ParserRegistry {
  by_extension: HashMap<String, Box<dyn Parser>>,
}

impl ParserRegistry {
  pub fn new() -> Self {
    Self { by_extension: HashMap::new() }
  }

  /// The default registry: reference line-oriented parsers for a small set
  /// of common source extensions.
  pub fn with_reference_parsers() -> Self {
    let mut registry = Self::new();
    registry.register("rs", crate::lines::RustLineParser::boxed());
    registry.register("py", crate::lines::PythonLineParser::boxed());
    registry.register("pyi", crate::lines::PythonLineParser::boxed());
    registry.register("js", crate::lines::JavaScriptLineParser::boxed());
    registry.register("jsx", crate::lines::JavaScriptLineParser::boxed());
    registry.register("ts", crate::lines::JavaScriptLineParser::boxed());
    registry.register("tsx", crate::lines::JavaScriptLineParser::boxed());
    registry.register("go", crate::lines::GoLineParser::boxed());
    registry
  }

  /// Registers (or replaces) the parser for an extension, without requiring
  /// any change elsewhere in the pipeline.
  pub fn register(&mut self, extension: &str, parser: Box<dyn Parser>) {
    self.by_extension.insert(extension.to_lowercase(), parser);
  }

  pub fn resolve(&self, path: &Path) -> Option<&dyn Parser> {
    let ext = path.extension()?.to_str()?.to_lowercase();
    self.by_extension.get(&ext).map(|p| p.as_ref())
  }

  pub fn parse(&self, path: &Path, content: &[u8]) -> Result<Vec<Entity>, ParseError> {
    let parser = self.resolve(path).ok_or(ParseError::Unsupported)?;
    parser.parse(path, content)
  }

  pub fn is_supported(&self, path: &Path) -> bool {
    self.resolve(path).is_some()
  }
}

impl Default for ParserRegistry {
  fn default() -> Self {
    Self::with_reference_parsers()
  }
}
