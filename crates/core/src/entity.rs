use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::language::Language;

/// A semantic unit extracted from a file by a parser: a class, function,
/// method, or other named construct. Parsers are pure over file content —
/// the same bytes must always yield the same entities.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Entity {
  pub name: String,
  pub kind: String,
  pub language: Language,
  pub start_line: u32,
  pub end_line: u32,
  pub text: String,
  #[serde(default)]
  pub metadata: HashMap<String, String>,
}

impl Entity {
  pub fn new(
    name: impl Into<String>,
    kind: impl Into<String>,
    language: Language,
    start_line: u32,
    end_line: u32,
    text: impl Into<String>,
  ) -> Self {
    Self {
      name: name.into(),
      kind: kind.into(),
      language,
      start_line,
      end_line,
      text: text.into(),
      metadata: HashMap::new(),
    }
  }

  pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
    self.metadata.insert(key.into(), value.into());
    self
  }

  /// Stable identifier for documents derived from this entity: a short hash
  /// of its qualifying fields, since entities themselves carry no id.
  pub fn entity_id(&self) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(self.name.as_bytes());
    hasher.update(b"|");
    hasher.update(self.kind.as_bytes());
    hasher.update(b"|");
    hasher.update(self.start_line.to_le_bytes());
    hasher.update(b"|");
    hasher.update(self.end_line.to_le_bytes());
    hex::encode(hasher.finalize())
  }
}
