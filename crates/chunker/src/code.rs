//! Code-aware chunking: cut points fall on structural boundaries only.
//!
//! Languages with a bundled tree-sitter grammar are parsed and chunk edges
//! align to item starts and ends (functions, types, impl blocks, class
//! methods); other code languages fall back to a definition-keyword line
//! scan. A function body is never cut: an item over the target becomes a
//! single chunk flagged oversized. Chunks after the first carry the file's
//! relevant imports prepended as a header, accounted for in `overlap_len`.

use crate::context;
use crate::error::{ChunkerError, Result};
use crate::fixed;
use crate::language::Language;
use crate::token::estimate_tokens;
use crate::types::{Chunk, ChunkConfig, SourceDocument};

/// Cap on import lines scanned per file before relevance filtering.
const IMPORT_SCAN_LIMIT: usize = 64;

/// One structural item: its byte span and symbol path within the file.
#[derive(Debug, Clone)]
pub(crate) struct Item {
    pub start: usize,
    pub end: usize,
    pub path: Vec<String>,
}

pub fn split(doc: &SourceDocument, config: &ChunkConfig) -> Result<Vec<Chunk>> {
    config.validate()?;
    if doc.content.is_empty() {
        return Ok(Vec::new());
    }

    let items = outline(doc);
    if items.is_empty() {
        // No recognizable structure; fixed windows keep the file indexable.
        log::debug!(
            "no structural items in {}, falling back to fixed windows",
            doc.path
        );
        return Ok(fixed::split_range(&doc.content, 0, 0, config));
    }

    let file_imports = context::extract_import_lines(doc.language, &doc.content, IMPORT_SCAN_LIMIT);
    let groups = group_items(&doc.content, &items, config.target_tokens);
    Ok(assemble(doc, config, &file_imports, &groups))
}

/// Structural items in document order. AST-backed when the grammar is
/// available; parse failures degrade to the line scanner rather than
/// erroring the document.
pub(crate) fn outline(doc: &SourceDocument) -> Vec<Item> {
    if doc.language.supports_ast() {
        match ast_outline(doc) {
            Ok(items) if !items.is_empty() => return items,
            Ok(_) => {}
            Err(e) => {
                log::warn!("AST outline failed for {}: {e}, using line boundaries", doc.path);
            }
        }
    }
    pattern_outline(doc)
}

fn ast_outline(doc: &SourceDocument) -> Result<Vec<Item>> {
    let mut parser = tree_sitter::Parser::new();
    parser
        .set_language(&doc.language.tree_sitter_language()?)
        .map_err(|e| ChunkerError::parse(&doc.path, e.to_string()))?;
    let tree = parser
        .parse(&doc.content, None)
        .ok_or_else(|| ChunkerError::parse(&doc.path, "parser produced no tree"))?;

    let mut items = Vec::new();
    collect_items(
        doc.language,
        &doc.content,
        tree.root_node(),
        &mut Vec::new(),
        &mut items,
    );
    items.sort_by_key(|item| item.start);
    Ok(items)
}

fn collect_items(
    language: Language,
    src: &str,
    node: tree_sitter::Node<'_>,
    scope: &mut Vec<String>,
    out: &mut Vec<Item>,
) {
    let mut cursor = node.walk();
    for child in node.children(&mut cursor) {
        let kind = child.kind();
        if is_leaf_item(language, kind) {
            let mut path = scope.clone();
            if let Some(name) = node_name(src, child) {
                path.push(name);
            }
            out.push(Item {
                start: child.start_byte(),
                end: child.end_byte(),
                path,
            });
        } else if is_container(language, kind) {
            let name = node_name(src, child);
            if let Some(name) = name {
                scope.push(name);
                collect_items(language, src, child, scope, out);
                scope.pop();
            } else {
                collect_items(language, src, child, scope, out);
            }
        } else if is_transparent(kind) {
            collect_items(language, src, child, scope, out);
        }
    }
}

/// Items we descend into with an extended symbol scope.
fn is_container(language: Language, kind: &str) -> bool {
    match language {
        Language::Rust => matches!(kind, "mod_item" | "impl_item" | "trait_item"),
        Language::Python => matches!(kind, "class_definition"),
        Language::JavaScript | Language::TypeScript => matches!(
            kind,
            "class_declaration" | "abstract_class_declaration" | "internal_module"
        ),
        _ => false,
    }
}

/// Items emitted whole; a cut never lands inside one.
fn is_leaf_item(language: Language, kind: &str) -> bool {
    match language {
        Language::Rust => matches!(
            kind,
            "function_item"
                | "function_signature_item"
                | "struct_item"
                | "enum_item"
                | "union_item"
                | "const_item"
                | "static_item"
                | "type_item"
                | "macro_definition"
                | "macro_invocation"
                | "associated_type"
        ),
        Language::Python => matches!(kind, "function_definition" | "decorated_definition"),
        Language::JavaScript | Language::TypeScript => matches!(
            kind,
            "function_declaration"
                | "generator_function_declaration"
                | "method_definition"
                | "lexical_declaration"
                | "variable_declaration"
                | "interface_declaration"
                | "type_alias_declaration"
                | "enum_declaration"
        ),
        _ => false,
    }
}

/// Wrapper nodes traversed without affecting scope (bodies, export wrappers).
fn is_transparent(kind: &str) -> bool {
    matches!(
        kind,
        "declaration_list" | "class_body" | "block" | "statement_block" | "export_statement"
    )
}

fn node_name(src: &str, node: tree_sitter::Node<'_>) -> Option<String> {
    let named = match node.kind() {
        "impl_item" => node.child_by_field_name("type"),
        "decorated_definition" => node
            .child_by_field_name("definition")
            .and_then(|def| def.child_by_field_name("name")),
        "lexical_declaration" | "variable_declaration" => {
            let mut cursor = node.walk();
            let declarator_name = node
                .children(&mut cursor)
                .find(|c| c.kind() == "variable_declarator")
                .and_then(|d| d.child_by_field_name("name"));
            declarator_name
        }
        _ => node.child_by_field_name("name"),
    };
    named
        .and_then(|n| n.utf8_text(src.as_bytes()).ok())
        .map(|text| text.trim().to_string())
        .filter(|text| !text.is_empty())
}

/// Definition-keyword line scan for languages without a bundled grammar.
/// An item opens at a shallow definition line and runs to the next one, so
/// the items tile the scanned region with no gaps.
fn pattern_outline(doc: &SourceDocument) -> Vec<Item> {
    let content = doc.content.as_str();
    let mut starts: Vec<(usize, String)> = Vec::new();
    let mut offset = 0usize;
    for line in content.split_inclusive('\n') {
        let trimmed = line.trim_start();
        let indent = line.len() - trimmed.len();
        // One nesting level: catches methods inside classes without
        // treating every inner block as a boundary.
        if indent <= 4 && !trimmed.is_empty() {
            if let Some(name) = boundary_name(doc.language, trimmed.trim_end()) {
                starts.push((offset, name));
            }
        }
        offset += line.len();
    }

    let mut items = Vec::with_capacity(starts.len());
    for (i, (start, name)) in starts.iter().enumerate() {
        let end = starts.get(i + 1).map_or(content.len(), |(next, _)| *next);
        items.push(Item {
            start: *start,
            end,
            path: vec![name.clone()],
        });
    }
    items
}

const MODIFIERS: &[&str] = &[
    "pub(crate) ",
    "pub(super) ",
    "pub ",
    "public ",
    "private ",
    "protected ",
    "internal ",
    "static ",
    "final ",
    "abstract ",
    "sealed ",
    "partial ",
    "override ",
    "virtual ",
    "export ",
    "default ",
    "unsafe ",
    "extern ",
    "inline ",
    "constexpr ",
    "async ",
];

fn strip_modifiers(mut line: &str) -> &str {
    loop {
        let mut stripped = false;
        for modifier in MODIFIERS {
            if let Some(rest) = line.strip_prefix(modifier) {
                line = rest.trim_start();
                stripped = true;
            }
        }
        if !stripped {
            return line;
        }
    }
}

fn boundary_name(language: Language, line: &str) -> Option<String> {
    let line = strip_modifiers(line);
    match language {
        Language::Rust => [
            "fn ", "struct ", "enum ", "union ", "trait ", "impl ", "mod ", "macro_rules! ",
            "type ", "const ",
        ]
        .iter()
        .find_map(|kw| named_after(line, kw)),
        Language::Python => ["def ", "class "].iter().find_map(|kw| named_after(line, kw)),
        Language::JavaScript | Language::TypeScript => [
            "function ", "class ", "interface ", "enum ", "type ", "const ", "let ", "var ",
        ]
        .iter()
        .find_map(|kw| named_after(line, kw)),
        Language::Go => {
            if let Some(rest) = line.strip_prefix("func ") {
                return go_func_name(rest);
            }
            ["type ", "var ", "const "].iter().find_map(|kw| named_after(line, kw))
        }
        Language::Java | Language::CSharp => {
            if let Some(name) = ["class ", "interface ", "enum ", "record ", "struct "]
                .iter()
                .find_map(|kw| named_after(line, kw))
            {
                return Some(name);
            }
            method_like_name(line)
        }
        Language::C | Language::Cpp => {
            if let Some(name) = ["struct ", "enum ", "union ", "class ", "namespace "]
                .iter()
                .find_map(|kw| named_after(line, kw))
            {
                return Some(name);
            }
            method_like_name(line)
        }
        Language::Ruby => ["def ", "class ", "module "].iter().find_map(|kw| named_after(line, kw)),
        Language::Swift => ["func ", "class ", "struct ", "enum ", "protocol ", "extension "]
            .iter()
            .find_map(|kw| named_after(line, kw)),
        Language::Kotlin => ["fun ", "class ", "object ", "interface "]
            .iter()
            .find_map(|kw| named_after(line, kw)),
        Language::Markdown | Language::Text | Language::Unknown => None,
    }
}

fn named_after(line: &str, keyword: &str) -> Option<String> {
    let rest = line.strip_prefix(keyword)?;
    leading_identifier(rest.trim_start())
}

/// `func (r *Receiver) Name(` needs the receiver skipped first.
fn go_func_name(rest: &str) -> Option<String> {
    let rest = rest.trim_start();
    let rest = if let Some(stripped) = rest.strip_prefix('(') {
        let close = stripped.find(')')?;
        stripped[close + 1..].trim_start()
    } else {
        rest
    };
    leading_identifier(rest)
}

/// A brace-opened signature line: `ReturnType name(args...) {`. Control-flow
/// keywords and statement lines (which end in `;`) are excluded.
fn method_like_name(line: &str) -> Option<String> {
    let paren = line.find('(')?;
    if !(line.ends_with('{') || line.ends_with(')')) {
        return None;
    }
    if line.starts_with('}') || line.starts_with(')') || line.starts_with('.') {
        return None;
    }
    let name = trailing_identifier(line[..paren].trim_end())?;
    const CONTROL: &[&str] = &[
        "if", "else", "for", "while", "switch", "catch", "do", "return", "new",
    ];
    if CONTROL.contains(&name.as_str()) {
        return None;
    }
    Some(name)
}

fn leading_identifier(text: &str) -> Option<String> {
    let name: String = text
        .chars()
        .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == '$')
        .collect();
    if name.is_empty() || name.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        None
    } else {
        Some(name)
    }
}

fn trailing_identifier(head: &str) -> Option<String> {
    let tail: Vec<char> = head
        .chars()
        .rev()
        .take_while(|c| c.is_alphanumeric() || *c == '_' || *c == '$')
        .collect();
    let name: String = tail.into_iter().rev().collect();
    if name.is_empty() || name.chars().next().is_some_and(|c| c.is_ascii_digit()) {
        None
    } else {
        Some(name)
    }
}

#[derive(Debug)]
struct Group {
    start: usize,
    end: usize,
    path: Vec<String>,
    oversized: bool,
}

/// Merge consecutive items into chunk spans up to the token target. A group
/// starts where the previous group ended, so inter-item gap bytes (comments,
/// attributes, blank lines) travel with the following chunk and stay glued
/// to the item they precede. The first group starts at byte zero, and
/// trailing bytes extend the last group.
fn group_items(content: &str, items: &[Item], target: usize) -> Vec<Group> {
    let mut groups: Vec<Group> = Vec::new();
    let mut cursor = 0usize;
    let mut i = 0usize;
    while i < items.len() {
        let path = items[i].path.clone();
        let first_tokens = estimate_tokens(&content[cursor..items[i].end]);
        if first_tokens > target {
            groups.push(Group {
                start: cursor,
                end: items[i].end,
                path,
                oversized: true,
            });
            cursor = items[i].end;
            i += 1;
            continue;
        }
        let mut end = items[i].end;
        let mut j = i + 1;
        while j < items.len() {
            if estimate_tokens(&content[cursor..items[j].end]) > target {
                break;
            }
            end = items[j].end;
            j += 1;
        }
        groups.push(Group {
            start: cursor,
            end,
            path,
            oversized: false,
        });
        cursor = end;
        i = j;
    }
    if let Some(last) = groups.last_mut() {
        if last.end < content.len() {
            last.end = content.len();
        }
    }
    groups
}

fn assemble(
    doc: &SourceDocument,
    config: &ChunkConfig,
    file_imports: &[String],
    groups: &[Group],
) -> Vec<Chunk> {
    let mut chunks = Vec::with_capacity(groups.len());
    for (i, group) in groups.iter().enumerate() {
        let body = &doc.content[group.start..group.end];
        let mut header = String::new();
        if i > 0 && !group.oversized && config.max_context_imports > 0 {
            let budget = config.target_tokens.saturating_sub(estimate_tokens(body));
            header = import_header(
                doc.language,
                file_imports,
                body,
                config.max_context_imports,
                budget,
            );
        }
        let overlap_len = header.len();
        let mut text = header;
        text.push_str(body);
        let mut chunk = Chunk::new(i, group.start, group.end, text)
            .with_overlap(overlap_len)
            .with_symbol_path(group.path.clone());
        if chunk.token_estimate > config.target_tokens {
            chunk = chunk.flag_oversized();
        }
        chunks.push(chunk);
    }
    chunks
}

/// Relevant-import header for a chunk body, kept within both the line cap
/// and the remaining token budget. Empty when nothing fits.
fn import_header(
    language: Language,
    file_imports: &[String],
    body: &str,
    limit: usize,
    token_budget: usize,
) -> String {
    if token_budget == 0 {
        return String::new();
    }
    let relevant = context::filter_relevant_imports(language, file_imports, body, limit);
    let mut header = String::new();
    let mut used = 0usize;
    for import in &relevant {
        let line_tokens = estimate_tokens(import);
        if used + line_tokens > token_budget {
            break;
        }
        used += line_tokens;
        header.push_str(import);
        header.push('\n');
    }
    if !header.is_empty() {
        header.push('\n');
    }
    header
}
