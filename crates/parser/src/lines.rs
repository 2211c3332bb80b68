use std::path::Path;

use repodex_core::{Entity, Language};

use crate::registry::{ParseError, Parser};

/// Scans source text line by line for declarations matching a fixed set of
/// keyword prefixes, closing each entity at the next top-level declaration
/// or end of file. This is deliberately shallow — no brace matching, no
/// scoping — trading precision for being simple enough to audit and extend.
struct LineOrientedParser {
  language: Language,
  declarations: &'static [(&'static str, &'static str)],
}

impl LineOrientedParser {
  fn extract(&self, text: &str) -> Vec<Entity> {
    let lines: Vec<&str> = text.lines().collect();
    let mut entities = Vec::new();
    let mut open: Option<(usize, String, String)> = None;

    for (idx, line) in lines.iter().enumerate() {
      let trimmed = line.trim_start();
      if let Some((kind, name)) = self.match_declaration(trimmed) {
        if let Some((start, kind, name)) = open.take() {
          entities.push(self.build_entity(&name, &kind, start, idx.saturating_sub(1), &lines));
        }
        open = Some((idx, kind.to_string(), name));
      }
    }

    if let Some((start, kind, name)) = open {
      entities.push(self.build_entity(&name, &kind, start, lines.len().saturating_sub(1), &lines));
    }

    entities
  }

  fn match_declaration(&self, trimmed: &str) -> Option<(&'static str, String)> {
    for (prefix, kind) in self.declarations {
      if let Some(rest) = trimmed.strip_prefix(prefix) {
        let name = rest
          .split(|c: char| !(c.is_alphanumeric() || c == '_'))
          .find(|s| !s.is_empty())
          .unwrap_or("anonymous")
          .to_string();
        return Some((kind, name));
      }
    }
    None
  }

  fn build_entity(&self, name: &str, kind: &str, start: usize, end: usize, lines: &[&str]) -> Entity {
    let text = lines[start..=end.max(start)].join("\n");
    Entity::new(name, kind, self.language, start as u32 + 1, end as u32 + 1, text)
  }
}

macro_rules! line_parser {
  ($name:ident, $language:expr, $declarations:expr) => {
    pub struct $name(LineOrientedParser);

    impl $name {
      pub fn new() -> Self {
        Self(LineOrientedParser { language: $language, declarations: $declarations })
      }

      pub fn boxed() -> Box<dyn Parser> {
        Box::new(Self::new())
      }
    }

    impl Default for $name {
      fn default() -> Self {
        Self::new()
      }
    }

    impl Parser for $name {
      fn parse(&self, _path: &Path, content: &[u8]) -> Result<Vec<Entity>, ParseError> {
        let text = std::str::from_utf8(content).map_err(|_| ParseError::InvalidEncoding)?;
        Ok(self.0.extract(text))
      }
    }
  };
}

line_parser!(
  RustLineParser,
  Language::Rust,
  &[("fn ", "function"), ("pub fn ", "function"), ("struct ", "struct"), ("enum ", "enum"), ("trait ", "trait"), ("impl ", "impl")]
);

line_parser!(PythonLineParser, Language::Python, &[("def ", "function"), ("class ", "class")]);

line_parser!(
  JavaScriptLineParser,
  Language::JavaScript,
  &[("function ", "function"), ("class ", "class"), ("const ", "const"), ("export function ", "function"), ("export class ", "class")]
);

line_parser!(GoLineParser, Language::Go, &[("func ", "function"), ("type ", "type")]);
