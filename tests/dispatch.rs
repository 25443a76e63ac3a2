//! End-to-end dispatch tests over a scripted gateway

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;

use beacon_nodes::dispatch::CommandRequest;
use beacon_nodes::gateway::types::{InvokeCommandParams, NodeInvokeParams};
use beacon_nodes::{AskMode, Error, GatewayClient};

mod common;
use common::MockTransport;

fn run_request() -> CommandRequest {
    CommandRequest::new("mac-1", "system.run").with_argv(["echo", "hi"])
}

/// Scenario A: the node declares its command set and omits the prepare
/// phase. The doomed prepare never goes out; the node sees exactly one
/// `system.run`.
#[tokio::test]
async fn declared_set_omitting_prepare_falls_back_without_a_round_trip() {
    let transport = Arc::new(
        MockTransport::new()
            .on("node.list", |_| {
                Ok(common::nodes_result(vec![common::node_with_commands(&[
                    "system.run",
                ])]))
            })
            .on("node.invoke", |params| {
                if params["command"] == "system.run.prepare" {
                    Err(common::prepare_rejection())
                } else {
                    Ok(common::run_result())
                }
            })
            .on("exec.approvals.node.get", |_| {
                Ok(common::policy_result("allowlist", "off", "deny"))
            }),
    );

    let dispatcher = common::dispatcher_over(&transport);
    let result = dispatcher.dispatch(&run_request()).await.unwrap();

    assert!(result.success);
    assert_eq!(transport.invoke_commands(), vec!["system.run"]);
}

/// Scenario B: the node declared no commands at all. Absence of the
/// advertisement is not evidence of absence, so prepare is attempted once,
/// then the classified rejection downgrades to a single-phase run.
#[tokio::test]
async fn undeclared_command_set_attempts_prepare_once_then_falls_back() {
    let transport = Arc::new(
        MockTransport::new()
            .on("node.list", |_| {
                Ok(common::nodes_result(vec![common::node_without_commands()]))
            })
            .on("node.invoke", |params| {
                if params["command"] == "system.run.prepare" {
                    Err(Error::Gateway(
                        "node command not allowed: the node did not declare any supported commands"
                            .to_string(),
                    ))
                } else {
                    Ok(common::run_result())
                }
            })
            .on("exec.approvals.node.get", |_| {
                Ok(common::policy_result("allowlist", "off", "deny"))
            }),
    );

    let dispatcher = common::dispatcher_over(&transport);
    let result = dispatcher.dispatch(&run_request()).await.unwrap();

    assert!(result.success);
    assert_eq!(
        transport.invoke_commands(),
        vec!["system.run.prepare", "system.run"]
    );
}

/// Scenario C: ask on-miss with an allow-once decision. The approval request
/// carries the literal command and no run plan (the plan fell back), and the
/// invocation params carry the audit fields.
#[tokio::test]
async fn approval_decision_rides_into_the_invocation_params() {
    let transport = Arc::new(
        MockTransport::new()
            .on("node.list", |_| {
                Ok(common::nodes_result(vec![common::node_with_commands(&[
                    "system.run",
                ])]))
            })
            .on("node.invoke", |params| {
                if params["command"] == "system.run.prepare" {
                    Err(common::prepare_rejection())
                } else {
                    Ok(common::run_result())
                }
            })
            .on("exec.approvals.node.get", |_| {
                Ok(common::policy_result("allowlist", "off", "deny"))
            })
            .on("exec.approval.request", |_| {
                Ok(json!({ "decision": "allow-once" }))
            }),
    );

    let dispatcher = common::dispatcher_over(&transport);
    let request = run_request().with_ask(AskMode::OnMiss);
    let result = dispatcher.dispatch(&request).await.unwrap();
    assert!(result.success);

    let approvals = transport.calls_for("exec.approval.request");
    assert_eq!(approvals.len(), 1);
    let approval = &approvals[0].params;
    assert_eq!(approval["command"], "echo hi");
    assert_eq!(approval["commandArgv"], json!(["echo", "hi"]));
    assert_eq!(approval["host"], "node");
    assert_eq!(approval["agentId"], "main");
    // a fallback plan never surfaces run-plan details to the approver
    assert!(approval.get("systemRunPlanV2").is_none());

    let invokes = transport.calls_for("node.invoke");
    assert_eq!(invokes.len(), 1);
    let params = &invokes[0].params["params"];
    assert_eq!(params["command"], json!(["echo", "hi"]));
    assert!(params["rawCommand"].is_null());
    assert_eq!(params["agentId"], "main");
    assert_eq!(params["approved"], true);
    assert_eq!(params["approvalDecision"], "allow-once");
    assert!(params["runId"].is_string());
    assert!(!params["runId"].as_str().unwrap().is_empty());
}

/// An explicit deny terminates the dispatch before any invocation
#[tokio::test]
async fn deny_means_zero_invocations() {
    let transport = Arc::new(
        MockTransport::new()
            .on("node.list", |_| {
                Ok(common::nodes_result(vec![common::node_with_commands(&[
                    "system.run",
                ])]))
            })
            .on("exec.approvals.node.get", |_| {
                Ok(common::policy_result("allowlist", "always", "deny"))
            })
            .on("exec.approval.request", |_| {
                Ok(json!({ "decision": "deny" }))
            }),
    );

    let dispatcher = common::dispatcher_over(&transport);
    let err = dispatcher.dispatch(&run_request()).await.unwrap_err();

    assert!(matches!(err, Error::ApprovalDenied(_)));
    assert!(transport.invoke_commands().is_empty());
}

/// A prepare failure that is not a capability rejection (here: a timeout)
/// must not downgrade to a run; it fails the dispatch verbatim.
#[tokio::test]
async fn unclassified_prepare_failure_does_not_fall_back() {
    let transport = Arc::new(
        MockTransport::new()
            .on("node.list", |_| {
                Ok(common::nodes_result(vec![common::node_without_commands()]))
            })
            .on("node.invoke", |params| {
                if params["command"] == "system.run.prepare" {
                    Err(Error::timeout("gateway call node.invoke timed out"))
                } else {
                    Ok(common::run_result())
                }
            })
            .on("exec.approvals.node.get", |_| {
                Ok(common::policy_result("allowlist", "off", "deny"))
            }),
    );

    let dispatcher = common::dispatcher_over(&transport);
    let err = dispatcher.dispatch(&run_request()).await.unwrap_err();

    assert!(err.is_timeout());
    assert_eq!(transport.invoke_commands(), vec!["system.run.prepare"]);
}

/// Preflight rejects an over-limit recording before any RPC call is made
#[tokio::test]
async fn over_limit_screen_record_never_reaches_the_network() {
    for request in [
        CommandRequest::new("ios-1", "screen.record").with_duration_ms(3_600_000),
        CommandRequest::new("ios-1", "screen.record").with_duration("1h"),
    ] {
        let transport = Arc::new(MockTransport::new());
        let dispatcher = common::dispatcher_over(&transport);

        let err = dispatcher.dispatch(&request).await.unwrap_err();

        assert!(matches!(err, Error::Validation(_)));
        assert!(err.to_string().contains("must be at most 60000"));
        assert!(transport.calls().is_empty());
    }
}

/// A successful prepare stages a run plan: the approver sees it, the run
/// invocation carries it, and the two steps use distinct idempotency keys.
#[tokio::test]
async fn two_phase_success_carries_the_staged_plan() {
    let transport = Arc::new(
        MockTransport::new()
            .on("node.list", |_| {
                Ok(common::nodes_result(vec![common::node_with_commands(&[
                    "system.run",
                    "system.run.prepare",
                ])]))
            })
            .on("node.invoke", |params| {
                if params["command"] == "system.run.prepare" {
                    Ok(json!({
                        "payload": { "systemRunPlanV2": { "version": 2, "steps": ["echo hi"] } }
                    }))
                } else {
                    Ok(common::run_result())
                }
            })
            .on("exec.approvals.node.get", |_| {
                Ok(common::policy_result("allowlist", "always", "deny"))
            })
            .on("exec.approval.request", |_| {
                Ok(json!({ "decision": "allow-always" }))
            }),
    );

    let dispatcher = common::dispatcher_over(&transport);
    let result = dispatcher.dispatch(&run_request()).await.unwrap();
    assert!(result.success);

    assert_eq!(
        transport.invoke_commands(),
        vec!["system.run.prepare", "system.run"]
    );

    let approval = &transport.calls_for("exec.approval.request")[0].params;
    assert_eq!(approval["systemRunPlanV2"]["version"], 2);

    let invokes = transport.calls_for("node.invoke");
    assert_eq!(invokes[1].params["systemRunPlanV2"]["version"], 2);
    assert_eq!(invokes[1].params["params"]["approvalDecision"], "allow-always");

    // prepare and run are separate attempts with separate keys
    let prepare_key = invokes[0].idempotency_key.as_deref().unwrap();
    let run_key = invokes[1].idempotency_key.as_deref().unwrap();
    assert!(!prepare_key.is_empty());
    assert_ne!(prepare_key, run_key);
}

/// A capability rejection is remembered: the next dispatch in the same
/// process skips the doomed prepare round trip entirely.
#[tokio::test]
async fn rejected_prepare_is_cached_across_dispatches() {
    let transport = Arc::new(
        MockTransport::new()
            .on("node.list", |_| {
                Ok(common::nodes_result(vec![common::node_without_commands()]))
            })
            .on("node.invoke", |params| {
                if params["command"] == "system.run.prepare" {
                    Err(Error::Gateway(
                        "node command not allowed: the node did not declare any supported commands"
                            .to_string(),
                    ))
                } else {
                    Ok(common::run_result())
                }
            })
            .on("exec.approvals.node.get", |_| {
                Ok(common::policy_result("allowlist", "off", "deny"))
            }),
    );

    let dispatcher = common::dispatcher_over(&transport);
    dispatcher.dispatch(&run_request()).await.unwrap();
    dispatcher.dispatch(&run_request()).await.unwrap();

    assert_eq!(
        transport.invoke_commands(),
        vec!["system.run.prepare", "system.run", "system.run"]
    );
}

/// When the approval round trip itself fails, `askFallback` decides
#[tokio::test]
async fn ask_fallback_applies_when_the_round_trip_fails() {
    let scripted = |ask_fallback: &'static str| {
        Arc::new(
            MockTransport::new()
                .on("node.list", |_| {
                    Ok(common::nodes_result(vec![common::node_with_commands(&[
                        "system.run",
                    ])]))
                })
                .on("node.invoke", |params| {
                    if params["command"] == "system.run.prepare" {
                        Err(common::prepare_rejection())
                    } else {
                        Ok(common::run_result())
                    }
                })
                .on("exec.approvals.node.get", move |_| {
                    Ok(common::policy_result("allowlist", "always", ask_fallback))
                })
                .on("exec.approval.request", |_| {
                    Err(Error::timeout("approval wait expired"))
                }),
        )
    };

    // fallback allow: dispatch proceeds, but without explicit audit fields
    let transport = scripted("allow");
    let dispatcher = common::dispatcher_over(&transport);
    let result = dispatcher.dispatch(&run_request()).await.unwrap();
    assert!(result.success);
    let invoke = &transport.calls_for("node.invoke")[0].params;
    assert!(invoke["params"].get("approved").is_none());
    assert!(invoke["params"].get("approvalDecision").is_none());

    // fallback deny: dispatch terminates with zero invocations
    let transport = scripted("deny");
    let dispatcher = common::dispatcher_over(&transport);
    let err = dispatcher.dispatch(&run_request()).await.unwrap_err();
    assert!(matches!(err, Error::ApprovalDenied(_)));
    assert!(transport.invoke_commands().is_empty());
}

/// Resolution failures surface before planning or approval
#[tokio::test]
async fn unknown_node_fails_the_dispatch() {
    let transport = Arc::new(
        MockTransport::new().on("node.list", |_| Ok(common::nodes_result(vec![]))),
    );

    let dispatcher = common::dispatcher_over(&transport);
    let err = dispatcher.dispatch(&run_request()).await.unwrap_err();

    assert!(matches!(err, Error::NodeNotFound(id) if id == "mac-1"));
    assert!(transport.invoke_commands().is_empty());
    assert!(transport.calls_for("exec.approvals.node.get").is_empty());
}

/// A command the node ran but that failed is a result, not an error
#[tokio::test]
async fn execution_failure_is_a_result_not_an_error() {
    let transport = Arc::new(
        MockTransport::new()
            .on("node.list", |_| {
                Ok(common::nodes_result(vec![common::node_with_commands(&[
                    "system.run",
                ])]))
            })
            .on("node.invoke", |params| {
                if params["command"] == "system.run.prepare" {
                    Err(common::prepare_rejection())
                } else {
                    Ok(json!({
                        "payload": {
                            "stdout": "",
                            "stderr": "ls: no such file\n",
                            "exitCode": 2,
                            "success": false,
                            "timedOut": false
                        }
                    }))
                }
            })
            .on("exec.approvals.node.get", |_| {
                Ok(common::policy_result("allowlist", "off", "deny"))
            }),
    );

    let dispatcher = common::dispatcher_over(&transport);
    let request = CommandRequest::new("mac-1", "system.run").with_argv(["ls", "/missing"]);
    let result = dispatcher.dispatch(&request).await.unwrap();

    assert!(!result.success);
    assert_eq!(result.exit_code, 2);
    assert_eq!(result.stderr, "ls: no such file\n");
}

/// Same-attempt retries must propagate the caller's idempotency key
/// unchanged so the remote can deduplicate.
#[tokio::test]
async fn retries_reuse_the_supplied_idempotency_key() {
    let transport = Arc::new(
        MockTransport::new().on("node.invoke", |_| Ok(common::run_result())),
    );
    let client = GatewayClient::new(transport.clone());

    let params = NodeInvokeParams {
        id: "mac-1".to_string(),
        command: "system.run".to_string(),
        command_argv: vec!["echo".to_string(), "hi".to_string()],
        system_run_plan_v2: None,
        host: "node".to_string(),
        agent_id: "main".to_string(),
        params: InvokeCommandParams {
            command: vec!["echo".to_string(), "hi".to_string()],
            raw_command: None,
            agent_id: "main".to_string(),
            approved: None,
            approval_decision: None,
            run_id: "run-1".to_string(),
            duration_ms: None,
        },
    };

    let key = GatewayClient::idempotency_key();
    let timeout = Duration::from_secs(5);
    client.invoke_node(&params, &key, timeout).await.unwrap();
    client.invoke_node(&params, &key, timeout).await.unwrap();

    let invokes = transport.calls_for("node.invoke");
    assert_eq!(invokes.len(), 2);
    assert_eq!(invokes[0].idempotency_key.as_deref(), Some(key.as_str()));
    assert_eq!(invokes[1].idempotency_key.as_deref(), Some(key.as_str()));
}
