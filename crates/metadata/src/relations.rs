//! Corpus-wide import/dependency index on a petgraph directed graph.
//!
//! Built once per run from every scanned document, then read-only behind an
//! `Arc`. Imports are extracted with the chunker's language pattern tables
//! and resolved to corpus-internal paths by module-stem matching: an edge
//! `a -> b` means a's imports mention a module name that file b claims.

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::Direction;
use std::collections::{BTreeSet, HashMap, HashSet};
use uplink_chunker::{extract_import_lines, SourceDocument};

/// Cap on import lines scanned per file.
const IMPORT_SCAN_LIMIT: usize = 64;

#[derive(Debug, Default)]
pub struct RelationIndex {
    graph: DiGraph<String, ()>,
    nodes: HashMap<String, NodeIndex>,
    imports: HashMap<String, Vec<String>>,
    degraded: HashSet<String>,
}

impl RelationIndex {
    /// Build the index over the full document set.
    pub fn build(documents: &[SourceDocument]) -> Self {
        let mut graph = DiGraph::new();
        let mut nodes = HashMap::new();
        for doc in documents {
            let idx = graph.add_node(doc.path.clone());
            nodes.insert(doc.path.clone(), idx);
        }

        // Module stem -> paths claiming it ("src/config.rs" claims "config",
        // "src/store/mod.rs" claims "store").
        let mut stems: HashMap<String, Vec<String>> = HashMap::new();
        for doc in documents {
            if let Some(stem) = module_stem(&doc.path) {
                stems.entry(stem).or_default().push(doc.path.clone());
            }
        }

        let mut imports = HashMap::new();
        let mut edges: BTreeSet<(String, String)> = BTreeSet::new();
        for doc in documents {
            if !doc.language.is_code() {
                continue;
            }
            let lines = extract_import_lines(doc.language, &doc.content, IMPORT_SCAN_LIMIT);
            for line in &lines {
                for token in import_tokens(line) {
                    let Some(targets) = stems.get(&token) else {
                        continue;
                    };
                    for target in targets {
                        if target != &doc.path {
                            edges.insert((doc.path.clone(), target.clone()));
                        }
                    }
                }
            }
            imports.insert(doc.path.clone(), lines);
        }

        for (from, to) in &edges {
            if let (Some(&a), Some(&b)) = (nodes.get(from), nodes.get(to)) {
                graph.add_edge(a, b, ());
            }
        }

        log::debug!(
            "relation index: {} files, {} edges",
            graph.node_count(),
            graph.edge_count()
        );

        Self {
            graph,
            nodes,
            imports,
            degraded: HashSet::new(),
        }
    }

    /// Raw import lines extracted from a file (empty for prose files).
    pub fn imports(&self, path: &str) -> &[String] {
        self.imports.get(path).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Corpus-internal files this one imports, sorted.
    pub fn depends_on(&self, path: &str) -> Vec<String> {
        self.neighbors(path, Direction::Outgoing)
    }

    /// Corpus-internal files importing this one, sorted.
    pub fn dependents(&self, path: &str) -> Vec<String> {
        self.neighbors(path, Direction::Incoming)
    }

    fn neighbors(&self, path: &str, direction: Direction) -> Vec<String> {
        let Some(&idx) = self.nodes.get(path) else {
            return Vec::new();
        };
        let mut out: Vec<String> = self
            .graph
            .neighbors_directed(idx, direction)
            .map(|n| self.graph[n].clone())
            .collect();
        out.sort();
        out
    }

    /// Record a file whose structural extraction failed. The metadata
    /// generator gives such files file-level fields only.
    pub fn mark_degraded(&mut self, path: impl Into<String>) {
        self.degraded.insert(path.into());
    }

    #[must_use]
    pub fn is_degraded(&self, path: &str) -> bool {
        self.degraded.contains(path)
    }

    #[must_use]
    pub fn file_count(&self) -> usize {
        self.graph.node_count()
    }

    #[must_use]
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }
}

/// Module name a file claims: its stem, or the parent directory for
/// directory-module files (`mod.rs`, `__init__.py`, `index.ts`). Crate
/// roots (`lib.rs`, `main.rs`) claim nothing.
fn module_stem(path: &str) -> Option<String> {
    let normalized = path.replace('\\', "/");
    let mut parts = normalized.rsplit('/');
    let file = parts.next()?;
    let stem = file.split_once('.').map_or(file, |(s, _)| s);
    match stem {
        "" => None,
        "lib" | "main" => None,
        "mod" | "__init__" | "index" => parts
            .next()
            .filter(|dir| !dir.is_empty())
            .map(str::to_string),
        _ => Some(stem.to_string()),
    }
}

/// Candidate module tokens in an import line, matched against corpus stems.
/// Language keywords and path noise are dropped.
fn import_tokens(line: &str) -> Vec<String> {
    const SKIP: &[&str] = &[
        "use", "pub", "import", "from", "require", "include", "using", "extern", "crate", "self",
        "super", "std", "as", "const", "let", "var", "type", "default", "export",
    ];
    line.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .filter(|t| !t.is_empty() && !SKIP.contains(t))
        .map(str::to_string)
        .collect()
}
