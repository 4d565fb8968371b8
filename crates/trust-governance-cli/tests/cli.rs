use clap::Parser;
use serde_json::Value;
use trust_governance_cli::{run_cli, Cli};
use ulid::Ulid;

fn must<T, E: std::fmt::Display>(result: Result<T, E>) -> T {
    match result {
        Ok(value) => value,
        Err(err) => panic!("expected Ok(..), got error: {err}"),
    }
}

fn must_str(value: &Value) -> &str {
    match value.as_str() {
        Some(text) => text,
        None => panic!("expected a JSON string, got {value}"),
    }
}

fn must_array(value: &Value) -> &Vec<Value> {
    match value.as_array() {
        Some(items) => items,
        None => panic!("expected a JSON array, got {value}"),
    }
}

fn temp_db() -> String {
    let path = std::env::temp_dir().join(format!("tg-cli-test-{}.db", Ulid::new()));
    path.to_string_lossy().into_owned()
}

fn run(db: &str, args: &[&str]) -> Value {
    must(try_run(db, args))
}

fn try_run(db: &str, args: &[&str]) -> anyhow::Result<Value> {
    let mut argv = vec!["tg"];
    argv.extend_from_slice(args);
    argv.push("--db");
    argv.push(db);
    let cli = Cli::try_parse_from(argv)?;
    run_cli(cli)
}

#[test]
fn outcome_recording_promotes_and_reports_the_transition() {
    let db = temp_db();
    let mut last = Value::Null;
    for index in 0..5 {
        last = run(
            &db,
            &[
                "outcome",
                "record",
                "--capability",
                "cap-weather",
                "--action",
                "fetch_forecast",
                "--event-id",
                &format!("evt-{index}"),
                "--outcome",
                "success",
                "--at",
                &format!("2026-01-01T00:00:0{index}Z"),
            ],
        );
    }
    assert_eq!(last["state"]["trajectory"], "stable");
    assert_eq!(last["transition"]["new_state"], "stable");

    let state = run(
        &db,
        &[
            "outcome", "state", "--capability", "cap-weather", "--action", "fetch_forecast",
        ],
    );
    assert_eq!(state["consecutive_successes"], 5);

    let transitions = run(
        &db,
        &[
            "outcome",
            "transitions",
            "--capability",
            "cap-weather",
            "--action",
            "fetch_forecast",
        ],
    );
    assert_eq!(transitions.as_array().map(Vec::len), Some(1));
}

#[test]
fn promotion_decision_flows_through_review() {
    let db = temp_db();
    for index in 0..5 {
        run(
            &db,
            &[
                "outcome",
                "record",
                "--capability",
                "cap-db",
                "--action",
                "query",
                "--event-id",
                &format!("evt-{index}"),
                "--outcome",
                "success",
                "--at",
                &format!("2026-01-01T00:00:0{index}Z"),
            ],
        );
    }

    run(
        &db,
        &[
            "risk", "assess", "--capability", "cap-db", "--action", "query", "--score", "0.5",
            "--reason", "broad surface", "--at", "2026-01-01T00:01:00Z",
        ],
    );
    let baseline = run(
        &db,
        &[
            "evolution", "evaluate", "--capability", "cap-db", "--action", "query", "--at",
            "2026-01-01T00:01:01Z",
        ],
    );
    assert_eq!(baseline["action"], "none");

    run(
        &db,
        &[
            "risk", "assess", "--capability", "cap-db", "--action", "query", "--score", "0.2",
            "--reason", "surface narrowed", "--at", "2026-01-01T00:02:00Z",
        ],
    );
    let decision = run(
        &db,
        &[
            "evolution", "evaluate", "--capability", "cap-db", "--action", "query", "--at",
            "2026-01-01T00:02:01Z",
        ],
    );
    assert_eq!(decision["action"], "promote");
    assert_eq!(decision["status"], "proposed");

    let decision_id = must_str(&decision["decision_id"]).to_string();
    let approved = run(
        &db,
        &[
            "evolution", "set-status", "--decision-id", &decision_id, "--status", "approved",
            "--actor", "reviewer-1", "--at", "2026-01-01T00:03:00Z",
        ],
    );
    assert_eq!(approved["status"], "executed");
}

#[test]
fn gate_enforces_budget_and_executions_close() {
    let db = temp_db();
    run(
        &db,
        &[
            "gate", "grant", "--capability", "cap-mail", "--action", "send", "--scope", "global",
            "--max-executions", "1", "--at", "2026-01-01T00:00:00Z",
        ],
    );

    let first = run(
        &db,
        &[
            "gate", "check", "--capability", "cap-mail", "--action", "send", "--at",
            "2026-01-01T00:00:01Z",
        ],
    );
    assert_eq!(first["allowed"], true);
    let execution_id = must_str(&first["execution"]["execution_id"]).to_string();

    let second = run(
        &db,
        &[
            "gate", "check", "--capability", "cap-mail", "--action", "send", "--at",
            "2026-01-01T00:00:02Z",
        ],
    );
    assert_eq!(second["allowed"], false);
    assert_eq!(second["deny_reason"], "execution_budget_exhausted");

    let closed = run(
        &db,
        &[
            "gate", "complete", "--execution-id", &execution_id, "--result", "success", "--at",
            "2026-01-01T00:00:03Z",
        ],
    );
    assert_eq!(closed["status"], "success");

    let executions = run(
        &db,
        &["gate", "executions", "--capability", "cap-mail", "--action", "send"],
    );
    assert_eq!(executions.as_array().map(Vec::len), Some(2));
}

#[test]
fn federation_lifecycle_is_downgrade_only_and_revocation_is_terminal() {
    let db = temp_db();
    let established = run(
        &db,
        &[
            "federation", "establish", "--remote", "node-42", "--level", "standard", "--ttl-ms",
            "86400000", "--at", "2026-01-01T00:00:00Z",
        ],
    );
    assert_eq!(established["status"], "active");

    let renewed = run(
        &db,
        &[
            "federation", "renew", "--remote", "node-42", "--extend-ms", "86400000", "--at",
            "2026-01-01T01:00:00Z",
        ],
    );
    assert_eq!(renewed["expires_at"], "2026-01-03T00:00:00Z");

    let downgraded = run(
        &db,
        &[
            "federation", "downgrade", "--remote", "node-42", "--level", "minimal", "--reason",
            "behavioral anomalies", "--at", "2026-01-01T02:00:00Z",
        ],
    );
    assert_eq!(downgraded["trust_level"], "minimal");
    assert_eq!(downgraded["status"], "degraded");

    run(
        &db,
        &[
            "federation", "revoke", "--remote", "node-42", "--reason", "compromise suspected",
            "--at", "2026-01-01T03:00:00Z",
        ],
    );
    assert!(try_run(
        &db,
        &[
            "federation", "renew", "--remote", "node-42", "--extend-ms", "1000", "--at",
            "2026-01-01T04:00:00Z",
        ],
    )
    .is_err());

    let history = run(&db, &["federation", "history", "--remote", "node-42"]);
    let actions: Vec<&str> = must_array(&history)
        .iter()
        .map(|entry| must_str(&entry["action"]))
        .collect();
    assert_eq!(actions, vec!["establish", "renew", "downgrade", "revoke"]);
}

#[test]
fn decision_evidence_replays_and_accepts_one_signoff() {
    let db = temp_db();
    for index in 0..3 {
        run(
            &db,
            &[
                "outcome",
                "record",
                "--capability",
                "cap-fs",
                "--action",
                "delete",
                "--event-id",
                &format!("evt-{index}"),
                "--outcome",
                "failure",
                "--at",
                &format!("2026-01-01T00:00:0{index}Z"),
            ],
        );
    }
    run(
        &db,
        &[
            "risk", "assess", "--capability", "cap-fs", "--action", "delete", "--score", "0.5",
            "--reason", "destructive action", "--at", "2026-01-01T00:01:00Z",
        ],
    );
    let decision = run(
        &db,
        &[
            "evolution", "evaluate", "--capability", "cap-fs", "--action", "delete", "--at",
            "2026-01-01T00:01:01Z",
        ],
    );
    assert_eq!(decision["action"], "freeze");

    let evidence = run(
        &db,
        &["evidence", "list", "--operation-type", "evolution-decided", "--limit", "5"],
    );
    let evidence_id = must_str(&evidence[0]["evidence_id"]).to_string();

    let report = run(
        &db,
        &["evidence", "replay", "--evidence-id", &evidence_id, "--mode", "validate"],
    );
    assert_eq!(report["matches"], "matches");

    let decision_id = must_str(&decision["decision_id"]).to_string();
    run(
        &db,
        &[
            "evidence", "signoff", "--decision-id", &decision_id, "--signed-by", "reviewer-1",
            "--note", "verified the freeze", "--at", "2026-01-01T00:02:00Z",
        ],
    );
    assert!(try_run(
        &db,
        &[
            "evidence", "signoff", "--decision-id", &decision_id, "--signed-by", "reviewer-2",
            "--note", "me too", "--at", "2026-01-01T00:03:00Z",
        ],
    )
    .is_err());

    let gaps = run(&db, &["evidence", "gaps"]);
    assert_eq!(gaps["evidence_gap_count"], 0);
}
