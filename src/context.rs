// SPDX-License-Identifier: MIT
// Context retrieval collaborator.
//
// The hole-filling prompt embeds related code as opaque formatted text
// blocks. Hosts with a real retrieval subsystem implement the trait;
// `CurrentFileContext` covers the common case of mining the file being
// edited for its imports and the nearest enclosing definition.

use crate::model::CursorContext;

const MAX_SNIPPET_CHARS: usize = 2048;

/// A formatted context block for prompt embedding.
#[derive(Debug, Clone)]
pub struct Snippet {
    /// Path the block was extracted from (shown in the prompt header).
    pub file_path: String,
    /// Pre-formatted block content.
    pub content: String,
}

/// Supplies related code snippets and a workspace-directory listing.
pub trait ContextRetriever: Send + Sync {
    fn related_snippets(&self, ctx: &CursorContext) -> Vec<Snippet>;
    fn workspace_directories(&self) -> Vec<String>;
}

/// Retriever that supplies nothing. For fill-in-middle-only hosts and tests.
#[derive(Debug, Default)]
pub struct NoContext;

impl ContextRetriever for NoContext {
    fn related_snippets(&self, _ctx: &CursorContext) -> Vec<Snippet> {
        Vec::new()
    }

    fn workspace_directories(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Mines the current file for import statements and the nearest enclosing
/// definition above the cursor, capped at [`MAX_SNIPPET_CHARS`].
pub struct CurrentFileContext {
    file_content: String,
    cursor_line: usize,
}

impl CurrentFileContext {
    pub fn new(file_content: impl Into<String>, cursor_line: usize) -> Self {
        Self {
            file_content: file_content.into(),
            cursor_line,
        }
    }
}

impl ContextRetriever for CurrentFileContext {
    fn related_snippets(&self, ctx: &CursorContext) -> Vec<Snippet> {
        let lines: Vec<&str> = self.file_content.lines().collect();
        if lines.is_empty() {
            return Vec::new();
        }

        let mut parts: Vec<String> = Vec::new();

        let imports: Vec<&str> = lines
            .iter()
            .filter(|l| is_import_line(l, &ctx.language_id))
            .copied()
            .collect();
        if !imports.is_empty() {
            parts.push(imports.join("\n"));
        }

        let cursor = self.cursor_line.min(lines.len() - 1);
        if let Some(signature) = (0..=cursor)
            .rev()
            .map(|i| lines[i])
            .find(|l| is_definition_line(l.trim(), &ctx.language_id))
        {
            parts.push(signature.to_string());
        }

        if parts.is_empty() {
            return Vec::new();
        }

        let mut content = parts.join("\n");
        if content.len() > MAX_SNIPPET_CHARS {
            let mut end = MAX_SNIPPET_CHARS;
            while !content.is_char_boundary(end) {
                end -= 1;
            }
            content.truncate(end);
        }

        vec![Snippet {
            file_path: ctx.file_path.clone(),
            content,
        }]
    }

    fn workspace_directories(&self) -> Vec<String> {
        Vec::new()
    }
}

/// Import/use/require detection per language.
fn is_import_line(line: &str, language_id: &str) -> bool {
    let trimmed = line.trim();
    match language_id {
        "rust" => trimmed.starts_with("use "),
        "typescript" | "typescriptreact" | "javascript" | "javascriptreact" => {
            trimmed.starts_with("import ")
                || (trimmed.starts_with("const ") && trimmed.contains("require("))
        }
        "python" => trimmed.starts_with("import ") || trimmed.starts_with("from "),
        "go" | "java" | "kotlin" | "dart" => trimmed.starts_with("import "),
        "csharp" => trimmed.starts_with("using "),
        "c" | "cpp" => trimmed.starts_with("#include"),
        "ruby" => trimmed.starts_with("require"),
        "php" => trimmed.starts_with("use ") || trimmed.starts_with("require"),
        _ => false,
    }
}

/// Function/class/struct definition detection per language.
fn is_definition_line(line: &str, language_id: &str) -> bool {
    match language_id {
        "rust" => {
            line.starts_with("pub fn ")
                || line.starts_with("fn ")
                || line.starts_with("pub struct ")
                || line.starts_with("struct ")
                || line.starts_with("pub enum ")
                || line.starts_with("enum ")
                || line.starts_with("impl ")
                || line.starts_with("trait ")
                || line.starts_with("pub trait ")
        }
        "typescript" | "typescriptreact" | "javascript" | "javascriptreact" => {
            line.starts_with("function ")
                || line.starts_with("async function ")
                || line.starts_with("export function ")
                || line.starts_with("export async function ")
                || line.starts_with("class ")
                || line.starts_with("export class ")
                || (line.starts_with("const ") && line.contains("=>"))
        }
        "python" => {
            line.starts_with("def ") || line.starts_with("async def ") || line.starts_with("class ")
        }
        "go" => line.starts_with("func ") || line.starts_with("type "),
        "java" | "kotlin" => {
            line.contains("class ") || line.contains("fun ") || line.contains("interface ")
        }
        _ => false,
    }
}

// ─── Tests ────────────────────────────────────────────────────────────────────
