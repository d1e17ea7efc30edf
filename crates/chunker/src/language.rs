use crate::error::{ChunkerError, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Recognized input language
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum Language {
    Rust,
    Python,
    JavaScript,
    TypeScript,
    Go,
    Java,
    C,
    Cpp,
    CSharp,
    Ruby,
    Swift,
    Kotlin,
    Markdown,
    Text,
    Unknown,
}

impl Language {
    /// Detect language from file extension
    pub fn from_extension(ext: &str) -> Self {
        match ext.to_lowercase().as_str() {
            "rs" => Self::Rust,
            "py" | "pyw" => Self::Python,
            "js" | "mjs" | "cjs" | "jsx" => Self::JavaScript,
            "ts" | "tsx" => Self::TypeScript,
            "go" => Self::Go,
            "java" => Self::Java,
            "c" | "h" => Self::C,
            "cpp" | "cc" | "cxx" | "hpp" | "hh" | "hxx" => Self::Cpp,
            "cs" => Self::CSharp,
            "rb" => Self::Ruby,
            "swift" => Self::Swift,
            "kt" | "kts" => Self::Kotlin,
            "md" | "markdown" | "mdx" => Self::Markdown,
            "txt" | "text" | "rst" | "adoc" => Self::Text,
            _ => Self::Unknown,
        }
    }

    /// Detect language from file path
    pub fn from_path(path: impl AsRef<Path>) -> Self {
        path.as_ref()
            .extension()
            .and_then(|ext| ext.to_str())
            .map_or(Self::Unknown, Self::from_extension)
    }

    /// Sniff language from content when the extension gives nothing.
    /// Covers shebang lines and a few unmistakable first-line markers.
    pub fn sniff(content: &str) -> Self {
        let first = content.lines().next().unwrap_or("").trim();
        if let Some(interp) = first.strip_prefix("#!") {
            if interp.contains("python") {
                return Self::Python;
            }
            if interp.contains("node") {
                return Self::JavaScript;
            }
            if interp.contains("ruby") {
                return Self::Ruby;
            }
            return Self::Text;
        }
        if first.starts_with("# ") || first.starts_with("## ") {
            return Self::Markdown;
        }
        Self::Unknown
    }

    /// Detect language from path, falling back to content sniffing.
    pub fn detect(path: impl AsRef<Path>, content: &str) -> Self {
        match Self::from_path(path) {
            Self::Unknown => Self::sniff(content),
            lang => lang,
        }
    }

    /// Get language name as string
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Rust => "rust",
            Self::Python => "python",
            Self::JavaScript => "javascript",
            Self::TypeScript => "typescript",
            Self::Go => "go",
            Self::Java => "java",
            Self::C => "c",
            Self::Cpp => "cpp",
            Self::CSharp => "csharp",
            Self::Ruby => "ruby",
            Self::Swift => "swift",
            Self::Kotlin => "kotlin",
            Self::Markdown => "markdown",
            Self::Text => "text",
            Self::Unknown => "unknown",
        }
    }

    /// True for programming languages (as opposed to prose formats).
    pub const fn is_code(self) -> bool {
        !matches!(self, Self::Markdown | Self::Text | Self::Unknown)
    }

    /// Check if this language is supported for AST parsing
    pub const fn supports_ast(self) -> bool {
        matches!(
            self,
            Self::Rust | Self::Python | Self::JavaScript | Self::TypeScript
        )
    }

    /// Get Tree-sitter language instance
    pub fn tree_sitter_language(self) -> Result<tree_sitter::Language> {
        match self {
            Self::Rust => Ok(tree_sitter_rust::LANGUAGE.into()),
            Self::Python => Ok(tree_sitter_python::LANGUAGE.into()),
            Self::JavaScript => Ok(tree_sitter_javascript::LANGUAGE.into()),
            Self::TypeScript => Ok(tree_sitter_typescript::LANGUAGE_TYPESCRIPT.into()),
            _ => Err(ChunkerError::unsupported_language(self.as_str())),
        }
    }

    /// Get typical comment prefixes for this language
    pub fn comment_prefixes(self) -> Vec<&'static str> {
        match self {
            Self::Rust
            | Self::JavaScript
            | Self::TypeScript
            | Self::Go
            | Self::Java
            | Self::C
            | Self::Cpp
            | Self::CSharp
            | Self::Swift
            | Self::Kotlin => vec!["///", "/**", "//", "/*"],
            Self::Python | Self::Ruby => vec!["#", "\"\"\"", "'''"],
            Self::Markdown | Self::Text | Self::Unknown => vec![],
        }
    }

    /// Get import/use statement patterns for this language
    pub fn import_patterns(self) -> Vec<&'static str> {
        match self {
            Self::Rust => vec!["use ", "extern crate "],
            Self::Python => vec!["import ", "from "],
            Self::JavaScript | Self::TypeScript => vec!["import ", "require("],
            Self::Go | Self::Java | Self::Swift | Self::Kotlin => vec!["import "],
            Self::CSharp => vec!["using "],
            Self::Ruby => vec!["require ", "include "],
            Self::C | Self::Cpp => vec!["#include "],
            Self::Markdown | Self::Text | Self::Unknown => vec![],
        }
    }
}

/// Coarse content classification driving strategy selection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Code,
    Doc,
    Hybrid,
}

impl ContentType {
    /// Classify a document from its detected language and content.
    /// Markdown with a high share of fenced code counts as hybrid.
    pub fn classify(language: Language, content: &str) -> Self {
        match language {
            lang if lang.is_code() => Self::Code,
            Language::Markdown => {
                if fenced_code_density(content) > 0.4 {
                    Self::Hybrid
                } else {
                    Self::Doc
                }
            }
            _ => Self::Doc,
        }
    }

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Code => "code",
            Self::Doc => "doc",
            Self::Hybrid => "hybrid",
        }
    }
}

/// Share of lines sitting inside fenced code blocks, in `[0.0, 1.0]`.
fn fenced_code_density(content: &str) -> f64 {
    let mut total = 0usize;
    let mut fenced = 0usize;
    let mut in_fence = false;
    for line in content.lines() {
        total += 1;
        if line.trim_start().starts_with("```") {
            in_fence = !in_fence;
            continue;
        }
        if in_fence {
            fenced += 1;
        }
    }
    if total == 0 {
        0.0
    } else {
        fenced as f64 / total as f64
    }
}
