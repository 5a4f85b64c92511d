#![allow(clippy::unwrap_used, clippy::expect_used)]

use conductor_core::*;

// ---------------------------------------------------------------------------
// 1. Every taxonomy variant maps to its own kind
// ---------------------------------------------------------------------------

#[test]
fn taxonomy_kinds_are_distinct() {
    let errors = vec![
        ConductorError::Planning("empty".into()),
        ConductorError::ToolDiscovery("nothing matched".into()),
        ConductorError::Validation("missing field".into()),
        ConductorError::TransientExecution("timeout".into()),
        ConductorError::PermanentExecution("not found".into()),
        ConductorError::AuthResolution {
            user_id: "u".into(),
            domain: "asana".into(),
        },
        ConductorError::BudgetExceeded {
            scope: BudgetScope::Global,
            limit: 1,
        },
    ];

    let mut names: Vec<String> = errors.iter().map(|e| e.kind().to_string()).collect();
    names.sort();
    names.dedup();
    assert_eq!(names.len(), errors.len());
    assert!(names.contains(&"PlanningError".to_string()));
    assert!(names.contains(&"AuthResolutionError".to_string()));
}

// ---------------------------------------------------------------------------
// 2. Io errors convert through `?`
// ---------------------------------------------------------------------------

fn read_missing() -> ConductorResult<String> {
    Ok(std::fs::read_to_string("/definitely/not/here/conductor.toml")?)
}

#[test]
fn io_error_converts() {
    let err = read_missing().unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Io);
    assert!(err.to_string().starts_with("IO error:"));
}

// ---------------------------------------------------------------------------
// 3. ToolCall serialization keeps arguments intact
// ---------------------------------------------------------------------------

#[test]
fn tool_call_serialization() {
    let call = ToolCall::new("create_issue", serde_json::json!({"title": "Bug"}));
    let json = serde_json::to_string(&call).unwrap();
    let parsed: ToolCall = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, call);
}
