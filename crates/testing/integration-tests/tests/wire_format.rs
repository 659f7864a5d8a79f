//! The serialized AST and the adapter tree format

use expect_test::expect;
use integration_tests::*;

#[test]
fn test_procedure_json_shape() {
    let tree = procedure_with_params(
        "usp_Wire",
        &["@Id INT", "@Total DECIMAL(10,2) OUTPUT"],
        [
            leaf(SyntaxKind::DeclareStatement, "DECLARE @Count INT = 0"),
            if_statement(
                "@Count=0",
                [leaf(SyntaxKind::SetStatement, "SET @Count = 1")],
                None,
            ),
            leaf(SyntaxKind::ReturnStatement, "RETURN @Count"),
        ],
    );
    let output = lower_tree(&tree);
    assert!(output.faults.is_empty(), "{:?}", output.faults);

    let json = serde_json::to_string_pretty(&output.ast).unwrap();
    expect![[r#"
        [
          {
            "type": "PROCEDURE",
            "proc_name": "usp_Wire",
            "params": [
              {
                "name": "@Id",
                "type": "INT",
                "mode": "IN"
              },
              {
                "name": "@Total",
                "type": "DECIMAL(10,2)",
                "mode": "OUT"
              }
            ],
            "variables": [
              {
                "name": "@Count",
                "type": "INT",
                "default": "0"
              }
            ],
            "return_type": "VOID",
            "statements": [
              {
                "type": "IF",
                "condition": "@Count = 0",
                "then": [
                  {
                    "type": "SET",
                    "name": "@Count",
                    "value": "1"
                  }
                ],
                "else": []
              },
              {
                "type": "RETURN",
                "expression": "@Count"
              }
            ]
          }
        ]
    "#]]
    .assert_eq(&format!("{json}\n"));
}

#[test]
fn test_schema_and_cursor_loop_json() {
    let root = script([
        leaf(SyntaxKind::CreateSchema, "CREATE SCHEMA payroll"),
        procedure(
            "usp_Loop",
            [
                leaf(SyntaxKind::DeclareCursor, "DECLARE c CURSOR FOR SELECT Id FROM t"),
                leaf(SyntaxKind::OpenCursor, "OPEN c"),
                leaf(SyntaxKind::FetchCursor, "FETCH NEXT FROM c INTO @Id"),
                while_loop(
                    "@@FETCH_STATUS = 0",
                    [leaf(SyntaxKind::FetchCursor, "FETCH NEXT FROM c INTO @Id")],
                ),
            ],
        ),
    ]);
    let output = lower_tree(&root);
    let value = serde_json::to_value(&output.ast).unwrap();

    assert_eq!(
        value[0],
        serde_json::json!({ "type": "CREATE_SCHEMA", "schema_name": "payroll" })
    );
    assert_eq!(
        value[1]["statements"][0],
        serde_json::json!({
            "type": "CURSOR_LOOP",
            "cursor_name": "c",
            "condition": "@@FETCH_STATUS = 0",
            "fetch_into": ["@Id"],
            "body": [
                { "type": "FETCH", "cursor_name": "c", "fetch_into": ["@Id"] }
            ]
        })
    );

    let back: Vec<TopLevel> = serde_json::from_value(value).unwrap();
    assert_eq!(back, output.ast);
}

#[test]
fn test_adapter_tree_with_spans_only() {
    let source = "CREATE PROCEDURE usp_Span AS SET @n = 42 PRINT 'ok'";
    let tree = r#"{
        "kind": "create_or_alter_procedure",
        "span": { "start": 0, "end": 51 },
        "children": [
            { "kind": "procedure_name", "span": { "start": 17, "end": 25 } },
            { "kind": "set_statement", "span": { "start": 29, "end": 40 } },
            { "kind": "print_statement", "span": { "start": 41, "end": 51 } }
        ]
    }"#;
    let mut root: SyntaxNode = serde_json::from_str(tree).unwrap();
    root.fill_text(source);

    let output = lower_tree(&root);
    assert!(output.faults.is_empty(), "{:?}", output.faults);
    let procedure = single_procedure(&output);

    assert_eq!(procedure.name, "usp_Span");
    assert_eq!(
        procedure.statements,
        [
            Statement::Set {
                name: "@n".to_string(),
                value: "42".to_string(),
            },
            Statement::Raise {
                level: RaiseLevel::Info,
                message: "ok".to_string(),
            },
        ]
    );
    assert_eq!(procedure.variables[0].ty, SqlType::int());
}

#[test]
fn test_unknown_rule_names_are_walked_through() {
    let tree = r#"{
        "kind": "create_procedure",
        "span": { "start": 0, "end": 0 },
        "text": "CREATE PROCEDURE usp_Wrapped AS",
        "children": [
            {
                "kind": "sql_clause_wrapper",
                "span": { "start": 0, "end": 0 },
                "children": [
                    {
                        "kind": "commit_transaction",
                        "span": { "start": 0, "end": 0 },
                        "text": "COMMIT"
                    }
                ]
            }
        ]
    }"#;
    let root: SyntaxNode = serde_json::from_str(tree).unwrap();
    let output = lower_tree(&root);
    let procedure = single_procedure(&output);

    assert_eq!(procedure.name, "usp_Wrapped");
    assert_eq!(procedure.statements, [Statement::Commit]);
}
