use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Language {
  TypeScript,
  JavaScript,
  Tsx,
  Jsx,
  Html,
  Css,
  Scss,
  Sass,
  Less,
  Rust,
  Python,
  Go,
  Java,
  Kotlin,
  Scala,
  CSharp,
  Cpp,
  C,
  Swift,
  Ruby,
  Php,
  Lua,
  Elixir,
  Haskell,
  Ocaml,
  Clojure,
  Zig,
  Nim,
  Json,
  Yaml,
  Toml,
  Xml,
  Markdown,
  Shell,
  Sql,
  Dockerfile,
  GraphQL,
  Proto,
  /// File has no recognized extension, or the extension maps to no parser.
  PlainText,
}

impl Language {
  pub fn from_extension(ext: &str) -> Self {
    match ext.to_lowercase().as_str() {
      "ts" | "mts" => Language::TypeScript,
      "js" | "mjs" | "cjs" => Language::JavaScript,
      "tsx" => Language::Tsx,
      "jsx" => Language::Jsx,
      "html" | "htm" => Language::Html,
      "css" => Language::Css,
      "scss" => Language::Scss,
      "sass" => Language::Sass,
      "less" => Language::Less,
      "rs" => Language::Rust,
      "py" | "pyi" | "pyw" => Language::Python,
      "go" => Language::Go,
      "java" => Language::Java,
      "kt" | "kts" => Language::Kotlin,
      "scala" | "sc" => Language::Scala,
      "cs" => Language::CSharp,
      "cpp" | "cc" | "cxx" | "hpp" | "hxx" | "h" => Language::Cpp,
      "c" => Language::C,
      "swift" => Language::Swift,
      "rb" | "rake" => Language::Ruby,
      "php" => Language::Php,
      "lua" => Language::Lua,
      "ex" | "exs" => Language::Elixir,
      "hs" => Language::Haskell,
      "ml" | "mli" => Language::Ocaml,
      "clj" | "cljs" | "cljc" | "edn" => Language::Clojure,
      "zig" => Language::Zig,
      "nim" => Language::Nim,
      "json" | "jsonc" => Language::Json,
      "yaml" | "yml" => Language::Yaml,
      "toml" => Language::Toml,
      "xml" | "xsd" | "xsl" | "svg" => Language::Xml,
      "md" | "markdown" => Language::Markdown,
      "sh" | "bash" | "zsh" | "fish" => Language::Shell,
      "sql" => Language::Sql,
      "dockerfile" => Language::Dockerfile,
      "graphql" | "gql" => Language::GraphQL,
      "proto" => Language::Proto,
      _ => Language::PlainText,
    }
  }

  pub fn from_path(path: &std::path::Path) -> Self {
    match path.file_name().and_then(|n| n.to_str()) {
      Some(name) if name.eq_ignore_ascii_case("dockerfile") => return Language::Dockerfile,
      _ => {}
    }
    path.extension().and_then(|e| e.to_str()).map(Language::from_extension).unwrap_or(Language::PlainText)
  }

  pub fn as_str(&self) -> &'static str {
    match self {
      Language::TypeScript => "typescript",
      Language::JavaScript => "javascript",
      Language::Tsx => "tsx",
      Language::Jsx => "jsx",
      Language::Html => "html",
      Language::Css => "css",
      Language::Scss => "scss",
      Language::Sass => "sass",
      Language::Less => "less",
      Language::Rust => "rust",
      Language::Python => "python",
      Language::Go => "go",
      Language::Java => "java",
      Language::Kotlin => "kotlin",
      Language::Scala => "scala",
      Language::CSharp => "csharp",
      Language::Cpp => "cpp",
      Language::C => "c",
      Language::Swift => "swift",
      Language::Ruby => "ruby",
      Language::Php => "php",
      Language::Lua => "lua",
      Language::Elixir => "elixir",
      Language::Haskell => "haskell",
      Language::Ocaml => "ocaml",
      Language::Clojure => "clojure",
      Language::Zig => "zig",
      Language::Nim => "nim",
      Language::Json => "json",
      Language::Yaml => "yaml",
      Language::Toml => "toml",
      Language::Xml => "xml",
      Language::Markdown => "markdown",
      Language::Shell => "shell",
      Language::Sql => "sql",
      Language::Dockerfile => "dockerfile",
      Language::GraphQL => "graphql",
      Language::Proto => "proto",
      Language::PlainText => "plaintext",
    }
  }
}
