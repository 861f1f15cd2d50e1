//! Syntax-tree capability for structurally addressed edits.
//!
//! An edit can target `"ns-Class-method"` instead of a line range. The edit
//! engine parses the file once per batch through a [`SyntaxProvider`] and
//! resolves each address to `(start, end)` lines (1-based, end exclusive).
//!
//! [`OutlineSyntax`] is a lightweight provider: it recognises declarations
//! with regexes and finds their extent by brace matching (or by indentation
//! for Python). It does not build a full AST, which is all the edit engine
//! needs.

use std::path::Path;
use std::sync::OnceLock;

use regex::Regex;
use serde::Serialize;

use crate::errors::PfgError;

/// Separator between names in an AST path.
pub const AST_PATH_SEPARATOR: char = '-';

/// A declaration and the lines it spans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SyntaxNode {
    /// Enclosing names joined with [`AST_PATH_SEPARATOR`].
    pub path: String,
    /// 1-based first line.
    pub start: usize,
    /// 1-based line after the last one.
    pub end: usize,
}

/// Outline of one file.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyntaxTree {
    pub nodes: Vec<SyntaxNode>,
}

impl SyntaxTree {
    /// Declaration addresses in source order.
    pub fn paths(&self) -> Vec<&str> {
        self.nodes.iter().map(|n| n.path.as_str()).collect()
    }
}

/// Capability consumed by AST-addressed edits.
pub trait SyntaxProvider: Send + Sync {
    /// Parse `content` (the text of `path`).
    fn parse(&self, path: &Path, content: &str) -> Result<SyntaxTree, PfgError>;

    /// Resolve an AST path to `(start, end)` lines.
    fn lookup(&self, tree: &SyntaxTree, ast_path: &str) -> Option<(usize, usize)> {
        if let Some(node) = tree.nodes.iter().find(|n| n.path == ast_path) {
            return Some((node.start, node.end));
        }
        // Accept a unique suffix on a separator boundary ("Class-method").
        let suffix = format!("{}{}", AST_PATH_SEPARATOR, ast_path);
        let mut matches = tree.nodes.iter().filter(|n| n.path.ends_with(&suffix));
        match (matches.next(), matches.next()) {
            (Some(node), None) => Some((node.start, node.end)),
            _ => None,
        }
    }
}

// ============================================================================
// OutlineSyntax
// ============================================================================

/// Regex and brace-matching outline provider.
#[derive(Debug, Default, Clone, Copy)]
pub struct OutlineSyntax;

const MODIFIERS: &str = r#"(?:(?:pub(?:\([^)]*\))?|public|private|protected|internal|static|abstract|async|export|default|unsafe|const|extern(?:\s+"[^"]*")?|override|virtual|sealed|partial|final|inline|signal)\s+)*"#;

fn keyword_decl() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"^\s*{}(?:namespace|mod|class|struct|enum|trait|interface|impl|fn|function|def)\b(?:\s*<[^>]*>)?\s+([A-Za-z_][A-Za-z0-9_.]*)",
            MODIFIERS
        ))
        .expect("Invalid regex")
    })
}

fn method_decl() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(&format!(
            r"^\s*{}([A-Za-z_][\w<>\[\],.?]*)\s+([A-Za-z_]\w*)\s*\(",
            MODIFIERS
        ))
        .expect("Invalid regex")
    })
}

fn python_decl() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^(\s*)(?:async\s+)?(?:def|class)\s+([A-Za-z_]\w*)").expect("Invalid regex")
    })
}

/// Words that look like a return type or name but start control flow.
const CONTROL_WORDS: &[&str] = &[
    "if", "else", "while", "for", "foreach", "switch", "catch", "return", "new", "throw",
    "using", "lock", "match", "loop", "await", "yield", "do", "case", "let",
];

/// Name declared on `line`, if any.
fn declared_name(line: &str) -> Option<String> {
    if let Some(caps) = keyword_decl().captures(line) {
        let name = caps.get(1)?.as_str();
        // `impl Trait for Type` is addressed by the implementing type.
        let rest = &line[caps.get(0)?.end()..];
        if let Some(ty) = rest.trim_start().strip_prefix("for ") {
            let ty: String = ty
                .trim_start()
                .chars()
                .take_while(|c| c.is_alphanumeric() || *c == '_')
                .collect();
            if !ty.is_empty() {
                return Some(ty);
            }
        }
        return Some(name.to_string());
    }
    let caps = method_decl().captures(line)?;
    let ty = caps.get(1)?.as_str();
    let name = caps.get(2)?.as_str();
    if CONTROL_WORDS.contains(&ty) || CONTROL_WORDS.contains(&name) {
        return None;
    }
    Some(name.to_string())
}

struct Open {
    path: String,
    start: usize,
    depth: usize,
}

impl OutlineSyntax {
    fn parse_braces(content: &str) -> SyntaxTree {
        let mut nodes: Vec<SyntaxNode> = Vec::new();
        let mut open: Vec<Open> = Vec::new();
        let mut pending: Option<(String, usize)> = None;
        let mut depth = 0usize;
        let mut in_block_comment = false;

        for (index, line) in content.lines().enumerate() {
            let line_no = index + 1;

            if pending.is_none() && !in_block_comment {
                if let Some(name) = declared_name(line) {
                    let path = match open.last() {
                        Some(parent) => format!("{}{}{}", parent.path, AST_PATH_SEPARATOR, name),
                        None => name,
                    };
                    pending = Some((path, line_no));
                }
            }

            let mut chars = line.chars().peekable();
            let mut in_string = false;
            while let Some(c) = chars.next() {
                if in_block_comment {
                    if c == '*' && chars.peek() == Some(&'/') {
                        chars.next();
                        in_block_comment = false;
                    }
                    continue;
                }
                if in_string {
                    match c {
                        '\\' => {
                            chars.next();
                        }
                        '"' => in_string = false,
                        _ => {}
                    }
                    continue;
                }
                match c {
                    '"' => in_string = true,
                    '/' if chars.peek() == Some(&'/') => break,
                    '/' if chars.peek() == Some(&'*') => {
                        chars.next();
                        in_block_comment = true;
                    }
                    '{' => {
                        depth += 1;
                        if let Some((path, start)) = pending.take() {
                            open.push(Open { path, start, depth });
                        }
                    }
                    '}' => {
                        if open.last().is_some_and(|o| o.depth == depth) {
                            if let Some(done) = open.pop() {
                                nodes.push(SyntaxNode {
                                    path: done.path,
                                    start: done.start,
                                    end: line_no + 1,
                                });
                            }
                        }
                        depth = depth.saturating_sub(1);
                    }
                    ';' => {
                        if let Some((path, start)) = pending.take() {
                            nodes.push(SyntaxNode {
                                path,
                                start,
                                end: line_no + 1,
                            });
                        }
                    }
                    _ => {}
                }
            }
        }

        nodes.sort_by_key(|n| n.start);
        SyntaxTree { nodes }
    }

    fn parse_indented(content: &str) -> SyntaxTree {
        let lines: Vec<&str> = content.lines().collect();
        let mut nodes = Vec::new();
        // (path, start, indent, last non-blank line)
        let mut open: Vec<(String, usize, usize, usize)> = Vec::new();

        let indent_of = |line: &str| line.len() - line.trim_start().len();

        for (index, line) in lines.iter().enumerate() {
            let line_no = index + 1;
            if line.trim().is_empty() {
                continue;
            }
            let indent = indent_of(line);
            while open.last().is_some_and(|o| indent <= o.2) {
                if let Some((path, start, _, last)) = open.pop() {
                    nodes.push(SyntaxNode {
                        path,
                        start,
                        end: last + 1,
                    });
                }
            }
            for entry in open.iter_mut() {
                entry.3 = line_no;
            }
            if let Some(caps) = python_decl().captures(line) {
                if let Some(name) = caps.get(2) {
                    let path = match open.last() {
                        Some(parent) => format!("{}{}{}", parent.0, AST_PATH_SEPARATOR, name.as_str()),
                        None => name.as_str().to_string(),
                    };
                    open.push((path, line_no, indent, line_no));
                }
            }
        }
        while let Some((path, start, _, last)) = open.pop() {
            nodes.push(SyntaxNode {
                path,
                start,
                end: last + 1,
            });
        }

        nodes.sort_by_key(|n| n.start);
        SyntaxTree { nodes }
    }
}

impl SyntaxProvider for OutlineSyntax {
    fn parse(&self, path: &Path, content: &str) -> Result<SyntaxTree, PfgError> {
        if content.contains('\0') {
            return Err(PfgError::ParseFailed {
                path: path.to_path_buf(),
                reason: "binary content".to_string(),
            });
        }
        let is_python = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e.eq_ignore_ascii_case("py"));
        let tree = if is_python {
            Self::parse_indented(content)
        } else {
            Self::parse_braces(content)
        };
        tracing::debug!(
            "Outlined {} declarations in {}",
            tree.nodes.len(),
            path.display()
        );
        Ok(tree)
    }
}
