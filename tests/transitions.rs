//! Transition tests
//!
//! A refused transition must leave no trace: no exit or enter hooks run and
//! the actives stay as they were.

mod common;

use common::{frame, framer, hits, runtime, set, tally, when};
use serde_json::{Value, json};
use strata::runtime::{Context, Outcome, Runtime};

fn plant() -> Value {
    json!({
        "framers": [{
            "name": "plant",
            "frames": [
                {"name": "root"},
                {"name": "idle", "over": "root", "next": "run", "acts": [
                    {"context": "precur", "behavior": "go", "needs": [when(".gate")]},
                    tally("exit", ".tally.idle_exit"),
                    tally("rexit", ".tally.idle_rexit"),
                    tally("renter", ".tally.idle_renter")
                ]},
                {"name": "run", "over": "root", "acts": [
                    {"context": "preact", "behavior": "need.compare",
                     "parms": {"share": ".permit", "goal": true}},
                    tally("enter", ".tally.run_enter")
                ]}
            ]
        }]
    })
}

fn actives(runtime: &Runtime) -> Vec<String> {
    let plant = framer(runtime, "plant");
    runtime
        .hierarchy
        .framer(plant)
        .actives
        .iter()
        .map(|&frame| runtime.hierarchy.frame(frame).name.clone())
        .collect()
}

#[test]
fn start_enters_the_first_outline() {
    let mut runtime = runtime(plant());
    runtime.start().unwrap();
    assert_eq!(actives(&runtime), vec!["root", "idle"]);
    assert!(!runtime.hierarchy.framer(framer(&runtime, "plant")).done);
}

#[test]
fn guard_blocks_transition() {
    let mut runtime = runtime(plant());
    runtime.start().unwrap();
    runtime.tick().unwrap();
    assert_eq!(actives(&runtime), vec!["root", "idle"]);
    assert_eq!(runtime.ticks(), 1);
}

#[test]
fn refused_entry_runs_no_hooks() {
    let mut runtime = runtime(plant());
    runtime.start().unwrap();
    set(&mut runtime, ".gate", json!(true));
    set(&mut runtime, ".permit", json!(false));

    let idle = frame(&runtime, "plant", "idle");
    let go = runtime.hierarchy.frame(idle).acts(Context::Precur)[0];
    assert_eq!(runtime.run_act(go).unwrap(), Outcome::Continue);
    runtime.tick().unwrap();

    assert_eq!(actives(&runtime), vec!["root", "idle"]);
    assert_eq!(hits(&runtime, ".tally.idle_exit"), 0);
    assert_eq!(hits(&runtime, ".tally.run_enter"), 0);
}

#[test]
fn accepted_transition_exits_and_enters() {
    let mut runtime = runtime(plant());
    runtime.start().unwrap();
    set(&mut runtime, ".gate", json!(true));
    set(&mut runtime, ".permit", json!(true));

    let idle = frame(&runtime, "plant", "idle");
    let run = frame(&runtime, "plant", "run");
    let go = runtime.hierarchy.frame(idle).acts(Context::Precur)[0];
    assert_eq!(runtime.run_act(go).unwrap(), Outcome::Transit(run));

    assert_eq!(actives(&runtime), vec!["root", "run"]);
    assert_eq!(runtime.hierarchy.framer(framer(&runtime, "plant")).active, Some(run));
    assert_eq!(hits(&runtime, ".tally.idle_exit"), 1);
    assert_eq!(hits(&runtime, ".tally.run_enter"), 1);
    assert_eq!(hits(&runtime, ".tally.idle_rexit"), 0);
}

#[test]
fn self_transition_reenters() {
    let mut runtime = runtime(json!({
        "framers": [{
            "name": "plant",
            "frames": [{"name": "idle", "acts": [
                {"context": "precur", "behavior": "go", "parms": {"far": "me"}, "needs": [when(".again")]},
                tally("enter", ".tally.enter"),
                tally("exit", ".tally.exit"),
                tally("rexit", ".tally.rexit"),
                tally("renter", ".tally.renter")
            ]}]
        }]
    }));
    runtime.start().unwrap();
    assert_eq!(hits(&runtime, ".tally.enter"), 1);

    set(&mut runtime, ".again", json!(true));
    runtime.tick().unwrap();
    assert_eq!(hits(&runtime, ".tally.rexit"), 1);
    assert_eq!(hits(&runtime, ".tally.renter"), 1);
    assert_eq!(hits(&runtime, ".tally.enter"), 1);
    assert_eq!(hits(&runtime, ".tally.exit"), 0);
}

#[test]
fn interrupting_transition_skips_recur() {
    let mut runtime = runtime(json!({
        "framers": [{
            "name": "plant",
            "frames": [
                {"name": "idle", "next": "run", "acts": [
                    {"context": "precur", "behavior": "go", "needs": [{"behavior": "need.always"}]},
                    tally("recur", ".tally.idle_recur")
                ]},
                {"name": "run"}
            ]
        }]
    }));
    runtime.start().unwrap();
    runtime.tick().unwrap();
    assert_eq!(hits(&runtime, ".tally.idle_recur"), 0);
    let plant = framer(&runtime, "plant");
    assert_eq!(
        runtime.hierarchy.framer(plant).active,
        Some(frame(&runtime, "plant", "run"))
    );
}
