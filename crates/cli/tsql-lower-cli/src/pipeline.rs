//! Loading a syntax tree and lowering it

use crate::report::SourceFile;
use anyhow::{Context, Result};
use std::path::Path;
use tracing::info;
use tsql_lower::{LowerOptions, LoweringOutput, lower_tree_with};
use tsql_syntax::SyntaxNode;

/// Outcome of lowering one tree file
#[derive(Debug)]
pub struct Session {
    pub output: LoweringOutput,
    pub source: Option<SourceFile>,
}

/// Read a JSON syntax tree, fill node text from `source`, and lower it
pub fn lower_file(tree: &Path, source: Option<&Path>, options: LowerOptions) -> Result<Session> {
    let contents = std::fs::read_to_string(tree)
        .with_context(|| format!("Failed to read syntax tree: {}", tree.display()))?;
    let mut root: SyntaxNode = serde_json::from_str(&contents)
        .with_context(|| format!("Failed to parse syntax tree: {}", tree.display()))?;

    let source = source
        .map(|path| {
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read source file: {}", path.display()))
                .map(|text| SourceFile {
                    name: path.display().to_string(),
                    text,
                })
        })
        .transpose()?;
    if let Some(source) = &source {
        root.fill_text(&source.text);
    }

    info!(nodes = root.node_count(), "syntax tree loaded");
    let output = lower_tree_with(&root, options);
    info!(
        tables = ?output.schema.table_names().collect::<Vec<_>>(),
        "schema registered"
    );
    Ok(Session { output, source })
}

/// AST as JSON
pub fn ast_json(output: &LoweringOutput, pretty: bool) -> serde_json::Result<String> {
    if pretty {
        serde_json::to_string_pretty(&output.ast)
    } else {
        serde_json::to_string(&output.ast)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use tempfile::NamedTempFile;

    const SOURCE: &str = "CREATE PROCEDURE usp_Ping AS PRINT 'pong'";

    const TREE: &str = r#"{
        "kind": "create_procedure",
        "span": { "start": 0, "end": 41 },
        "children": [
            { "kind": "procedure_name", "span": { "start": 17, "end": 25 } },
            { "kind": "print_statement", "span": { "start": 29, "end": 41 } }
        ]
    }"#;

    fn temp_file(contents: &str) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    #[test]
    fn test_lower_file_fills_text_from_source() {
        let tree = temp_file(TREE);
        let source = temp_file(SOURCE);
        let session = lower_file(tree.path(), Some(source.path()), LowerOptions::default()).unwrap();

        assert!(session.output.faults.is_empty());
        let json = ast_json(&session.output, false).unwrap();
        assert_eq!(
            json,
            r#"[{"type":"PROCEDURE","proc_name":"usp_Ping","params":[],"variables":[],"return_type":"VOID","statements":[{"type":"RAISE","level":"INFO","message":"pong"}]}]"#
        );
    }

    #[test]
    fn test_bad_tree_is_an_input_error() {
        let tree = temp_file("{ not json");
        let error = lower_file(tree.path(), None, LowerOptions::default()).unwrap_err();
        assert!(error.to_string().starts_with("Failed to parse syntax tree"));
    }

    #[test]
    fn test_missing_source_is_an_input_error() {
        let tree = temp_file(TREE);
        let error = lower_file(
            tree.path(),
            Some(Path::new("/definitely/not/here.sql")),
            LowerOptions::default(),
        )
        .unwrap_err();
        assert!(error.to_string().starts_with("Failed to read source file"));
    }
}
