//! Suspension tests
//!
//! A host frame suspends into an auxiliary framer, is cut back to its head
//! while the auxiliary runs, and resumes its full outline once the auxiliary
//! is done.

mod common;

use common::{frame, framer, hits, runtime, set, tally, when};
use serde_json::{Value, json};
use strata::runtime::Runtime;

fn helper() -> Value {
    json!({
        "name": "helper",
        "schedule": "aux",
        "frames": [
            {"name": "wait", "next": "finish", "acts": [
                {"context": "precur", "behavior": "go", "needs": [when(".release")]}
            ]},
            {"name": "finish", "acts": [
                {"context": "enter", "behavior": "done"}
            ]}
        ]
    })
}

fn host() -> Value {
    json!({
        "name": "host",
        "frames": [
            {"name": "main", "acts": [
                {"context": "precur", "behavior": "go", "parms": {"far": "other"}, "needs": [when(".leave")]},
                {"context": "precur", "behavior": "suspend", "parms": {"aux": "helper"}, "needs": [when(".call")]}
            ]},
            {"name": "child", "over": "main", "acts": [
                tally("recur", ".tally.child"),
                tally("enter", ".tally.child_enter"),
                tally("exit", ".tally.child_exit")
            ]},
            {"name": "other"}
        ]
    })
}

fn actives(runtime: &Runtime, name: &str) -> Vec<String> {
    runtime
        .hierarchy
        .framer(framer(runtime, name))
        .actives
        .iter()
        .map(|&frame| runtime.hierarchy.frame(frame).name.clone())
        .collect()
}

fn suspended() -> Runtime {
    let mut runtime = runtime(json!({"framers": [helper(), host()]}));
    runtime.start().unwrap();
    assert_eq!(actives(&runtime, "host"), vec!["main", "child"]);
    set(&mut runtime, ".call", json!(true));
    runtime.tick().unwrap();
    runtime
}

#[test]
fn suspension_truncates_host_to_head() {
    let runtime = suspended();
    let helper = runtime.hierarchy.framer(framer(&runtime, "helper"));

    assert_eq!(actives(&runtime, "host"), vec!["main"]);
    assert_eq!(actives(&runtime, "helper"), vec!["wait"]);
    assert!(!helper.done);
    assert_eq!(helper.main, Some(frame(&runtime, "host", "main")));
    assert_eq!(hits(&runtime, ".tally.child"), 0);
}

#[test]
fn host_stays_suspended_while_auxiliary_runs() {
    let mut runtime = suspended();
    runtime.tick().unwrap();
    runtime.tick().unwrap();
    assert_eq!(actives(&runtime, "host"), vec!["main"]);
    assert_eq!(hits(&runtime, ".tally.child"), 0);
}

#[test]
fn finished_auxiliary_restores_host_outline() {
    let mut runtime = suspended();
    set(&mut runtime, ".release", json!(true));
    set(&mut runtime, ".call", json!(false));
    runtime.tick().unwrap();

    let helper = runtime.hierarchy.framer(framer(&runtime, "helper"));
    assert!(helper.done);
    assert!(helper.main.is_none());
    assert!(helper.actives.is_empty());
    assert_eq!(actives(&runtime, "host"), vec!["main", "child"]);

    runtime.tick().unwrap();
    assert_eq!(hits(&runtime, ".tally.child"), 1);
}

#[test]
fn leaving_the_host_frame_finishes_the_auxiliary() {
    let mut runtime = suspended();
    set(&mut runtime, ".leave", json!(true));
    runtime.tick().unwrap();

    let helper = runtime.hierarchy.framer(framer(&runtime, "helper"));
    assert!(helper.done);
    assert!(helper.main.is_none());
    assert!(helper.actives.is_empty());
    assert_eq!(actives(&runtime, "host"), vec!["other"]);
}

#[test]
fn owned_auxiliary_is_not_shared() {
    let rival = json!({
        "name": "rival",
        "frames": [{"name": "desk", "acts": [
            {"context": "precur", "behavior": "suspend", "parms": {"aux": "helper"}, "needs": [when(".call")]}
        ]}]
    });
    let mut runtime = runtime(json!({"framers": [helper(), host(), rival]}));
    runtime.start().unwrap();
    set(&mut runtime, ".call", json!(true));
    runtime.tick().unwrap();
    runtime.tick().unwrap();

    let helper = runtime.hierarchy.framer(framer(&runtime, "helper"));
    assert_eq!(helper.main, Some(frame(&runtime, "host", "main")));
    assert_eq!(actives(&runtime, "helper"), vec!["wait"]);
    assert_eq!(actives(&runtime, "rival"), vec!["desk"]);
}

#[test]
fn truncated_frames_exit_and_reenter() {
    let mut runtime = suspended();
    assert_eq!(hits(&runtime, ".tally.child_enter"), 1);
    assert_eq!(hits(&runtime, ".tally.child_exit"), 1);

    set(&mut runtime, ".release", json!(true));
    set(&mut runtime, ".call", json!(false));
    runtime.tick().unwrap();
    assert_eq!(hits(&runtime, ".tally.child_enter"), 2);
    assert_eq!(hits(&runtime, ".tally.child_exit"), 1);
}

#[test]
fn leaving_mid_suspension_exits_truncated_frames_once() {
    let mut runtime = suspended();
    set(&mut runtime, ".leave", json!(true));
    runtime.tick().unwrap();

    assert_eq!(actives(&runtime, "host"), vec!["other"]);
    assert_eq!(hits(&runtime, ".tally.child_enter"), 1);
    assert_eq!(hits(&runtime, ".tally.child_exit"), 1);
}
