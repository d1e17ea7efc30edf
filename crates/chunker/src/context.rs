//! Import/declaration context for code chunks. The code chunker prepends a
//! filtered header of the file's imports so a chunk stays interpretable in
//! isolation; the relation index reuses the same extraction.

use crate::language::Language;
use std::collections::HashSet;

/// Collect distinct import lines from `content`, first line of each
/// statement only, trailing semicolons removed.
pub fn extract_import_lines(language: Language, content: &str, limit: usize) -> Vec<String> {
    if limit == 0 {
        return Vec::new();
    }

    let mut out = Vec::new();
    let mut seen: HashSet<String> = HashSet::new();

    for line in content.lines() {
        if out.len() >= limit {
            break;
        }
        let trimmed = line.trim();
        if trimmed.is_empty() || !is_import_line(language, trimmed) {
            continue;
        }
        let cleaned = trimmed.trim_end_matches(';').trim().to_string();
        if cleaned.is_empty() {
            continue;
        }
        if seen.insert(cleaned.clone()) {
            out.push(cleaned);
        }
    }

    out
}

/// Keep the imports whose introduced identifiers actually appear in `code`,
/// bounded by `limit`. Languages without an identifier heuristic keep the
/// first `limit` imports.
pub fn filter_relevant_imports(
    language: Language,
    file_imports: &[String],
    code: &str,
    limit: usize,
) -> Vec<String> {
    if limit == 0 || file_imports.is_empty() || code.is_empty() {
        return Vec::new();
    }

    if !matches!(
        language,
        Language::Rust | Language::Python | Language::JavaScript | Language::TypeScript
    ) {
        return file_imports.iter().take(limit).cloned().collect();
    }

    let mut relevant = Vec::new();
    for import in file_imports {
        let identifiers = import_identifiers(language, import);
        if identifiers
            .iter()
            .any(|ident| !ident.is_empty() && code.contains(ident.as_str()))
        {
            relevant.push(import.clone());
        }
        if relevant.len() >= limit {
            break;
        }
    }

    relevant
}

/// Identifiers an import statement introduces into scope.
pub fn import_identifiers(language: Language, import: &str) -> Vec<String> {
    let mut identifiers = Vec::new();

    match language {
        Language::Rust => {
            // use std::collections::HashMap -> HashMap
            // use crate::error::{Result, Error} -> Result, Error
            if let Some(last_part) = import.split("::").last() {
                if let Some(inner) = last_part.trim().strip_prefix('{') {
                    let inner = inner.trim_end().trim_end_matches('}');
                    for ident in inner.split(',') {
                        push_ident(&mut identifiers, ident);
                    }
                } else {
                    push_ident(&mut identifiers, last_part);
                }
            }
        }
        Language::Python => {
            // from x import A, B -> A, B; import x -> x
            if let Some(after_import) = import.split("import").nth(1) {
                for ident in after_import.split(',') {
                    push_ident(&mut identifiers, ident);
                }
            }
        }
        Language::JavaScript | Language::TypeScript => {
            // import { A, B } from 'x' -> A, B
            if let (Some(open), Some(close)) = (import.find('{'), import.find('}')) {
                if close > open + 1 {
                    for ident in import[open + 1..close].split(',') {
                        push_ident(&mut identifiers, ident);
                    }
                }
            }
        }
        _ => {}
    }

    identifiers
}

fn push_ident(out: &mut Vec<String>, raw: &str) {
    let ident = raw.trim();
    if !ident.is_empty() {
        out.push(ident.to_string());
    }
}

pub fn is_import_line(language: Language, line: &str) -> bool {
    let line = if language == Language::Rust {
        line.strip_prefix("pub ").unwrap_or(line)
    } else {
        line
    };
    language.import_patterns().iter().any(|pattern| {
        if *pattern == "require(" {
            line.contains(pattern)
        } else {
            line.starts_with(pattern)
        }
    })
}
