//! Trees handed over as JSON by an external parser.

mod support;

use jet_compiler::ast::{ExprKind, Expression};
use jet_compiler::{CompileError, CompilerOptions, compile};
use support::{Machine, Value};

const PROGRAM: &str = r#"
{
  "line": 1,
  "kind": {
    "Block": [
      {
        "line": 1,
        "kind": {
          "Assign": {
            "target": { "line": 1, "kind": { "Name": { "name": "x" } } },
            "value": { "line": 1, "kind": { "Integer": 40 } }
          }
        }
      },
      {
        "line": 2,
        "kind": {
          "CompoundAssign": {
            "operator": "Add",
            "target": { "line": 2, "kind": { "Name": { "name": "x" } } },
            "value": { "line": 2, "kind": { "Integer": 2 } }
          }
        }
      },
      {
        "line": 3,
        "kind": {
          "While": {
            "condition": { "line": 3, "kind": { "Name": { "name": "x" } } },
            "body": {
              "line": 3,
              "kind": {
                "Scope": [
                  { "line": 4, "kind": { "Assign": {
                    "target": { "line": 4, "kind": { "Name": { "name": "y" } } },
                    "value": { "line": 4, "kind": { "Name": { "name": "x" } } }
                  } } },
                  { "line": 5, "kind": "Break" }
                ]
              }
            }
          }
        }
      }
    ]
  }
}
"#;

#[test]
fn test_json_tree_compiles_and_runs() {
    let mut tree: Expression = serde_json::from_str(PROGRAM).unwrap();
    assert!(!tree.verify_links());
    let nodes = tree.link_parents();
    assert_eq!(nodes, 14);
    assert!(tree.verify_links());

    let module = compile(&tree, CompilerOptions::default()).unwrap();
    assert_eq!(module.main().lines.len(), module.main().instructions.len());
    assert!(module.main().lines.contains(&5));

    let mut machine = Machine::new(&module);
    machine.run();
    assert_eq!(machine.global("x"), Value::Int(42));
    assert_eq!(machine.global("y"), Value::Int(42));
}

#[test]
fn test_json_serialization_skips_link_state() {
    let mut tree: Expression = serde_json::from_str(PROGRAM).unwrap();
    tree.link_parents();
    let json = serde_json::to_string(&tree).unwrap();
    assert!(!json.contains("parent"));

    let reloaded: Expression = serde_json::from_str(&json).unwrap();
    assert_eq!(reloaded.node_count(), tree.node_count());
    assert!(matches!(reloaded.kind, ExprKind::Block(ref statements) if statements.len() == 3));
}

#[test]
fn test_json_assignment_to_literal_reports_line() {
    let source = r#"
    { "line": 7, "kind": { "Assign": {
        "target": { "line": 7, "kind": { "Integer": 1 } },
        "value": { "line": 7, "kind": "Null" }
    } } }"#;
    let mut tree: Expression = serde_json::from_str(source).unwrap();
    tree.link_parents();
    let err = compile(&tree, CompilerOptions::default()).unwrap_err();
    assert_eq!(
        err,
        CompileError::NotStorable {
            node: "integer",
            line: 7
        }
    );
    assert_eq!(err.line(), Some(7));
}
