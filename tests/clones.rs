//! Clone spawning and destruction tests

mod common;

use common::{framer, runtime};
use serde_json::{Value, json};
use strata::runtime::act::Act;
use strata::runtime::error::{CloneErrorKind, ResolveError, ResolveErrorKind};
use strata::runtime::{ActId, Context, FramerId, Runtime, RuntimeConfig, RuntimeError, Schedule};

fn worker() -> Value {
    json!({
        "name": "worker",
        "schedule": "moot",
        "frames": [{"name": "work", "acts": [
            {"behavior": "tally", "inits": {"name": "counter"}, "ioinits": {"hits": {"path": "actor.me.hits", "value": 0}}}
        ]}]
    })
}

fn plant() -> Value {
    let rear = json!({"context": "enter", "behavior": "rear",
                      "parms": {"original": "worker", "frame": "pool"}});
    json!({
        "framers": [worker(), {
            "name": "plant",
            "frames": [
                {"name": "root"},
                {"name": "stage", "over": "root", "acts": [
                    rear.clone(),
                    rear,
                    {"context": "precur", "behavior": "go", "parms": {"far": "pool"},
                     "needs": [{"behavior": "need.always"}]}
                ]},
                {"name": "pool", "over": "root"}
            ]
        }]
    })
}

fn hits_of(runtime: &Runtime, clone: &str) -> Option<Value> {
    common::value(
        runtime,
        &format!("framer.{clone}.frame.work.actor.counter.hits"),
    )
}

fn resolve_kind(err: RuntimeError) -> ResolveErrorKind {
    match err {
        RuntimeError::Resolve(ResolveError { kind, .. }) => kind,
        other => panic!("expected a resolve error, got {other}"),
    }
}

#[test]
fn reared_clones_run_on_their_own_data() {
    let mut runtime = runtime(plant());
    runtime.start().unwrap();
    runtime.tick().unwrap();
    runtime.tick().unwrap();

    let plant = framer(&runtime, "plant");
    let pool = runtime.hierarchy.framer(plant).frame_named("pool").unwrap();
    let clones: Vec<String> = runtime
        .hierarchy
        .frame(pool)
        .auxes
        .iter()
        .map(|&clone| runtime.hierarchy.framer(clone).name.clone())
        .collect();
    assert_eq!(clones.len(), 2);
    assert_ne!(clones[0], clones[1]);

    for (name, &id) in clones.iter().zip(&runtime.hierarchy.frame(pool).auxes) {
        assert!(name.starts_with("worker_"));
        let clone = runtime.hierarchy.framer(id);
        assert_eq!(clone.schedule, Schedule::Aux);
        assert!(!clone.original && clone.insular && clone.razeable);
        assert_eq!(clone.main, Some(pool));
        assert_eq!(hits_of(&runtime, name), Some(json!(1)));
    }
    assert!(runtime.resolvables().is_empty());
}

#[test]
fn template_resolves_to_its_own_share() {
    let mut runtime = runtime(plant());
    runtime.start().unwrap();
    runtime.tick().unwrap();

    let worker = framer(&runtime, "worker");
    runtime.resolve_framer(worker).unwrap();
    assert_eq!(hits_of(&runtime, "worker"), Some(json!(0)));
}

#[test]
fn rearing_a_bound_template_fails() {
    let mut runtime = runtime(plant());
    let worker = framer(&runtime, "worker");
    runtime.resolve_framer(worker).unwrap();
    let names = runtime.hierarchy.name_count();

    match runtime.start().unwrap_err() {
        RuntimeError::Clone(err) => assert_eq!(err.kind, CloneErrorKind::Behavior),
        other => panic!("expected a clone error, got {other}"),
    }
    assert_eq!(runtime.hierarchy.name_count(), names);
}

fn staged(parms: Value) -> (Runtime, ActId) {
    let mut runtime = Runtime::new(RuntimeConfig::default(), common::registry());
    let template = runtime.hierarchy.add_framer("worker", Schedule::Moot).unwrap();
    runtime.hierarchy.add_frame(template, "work", None).unwrap();
    runtime.hierarchy.add_framer("helper", Schedule::Aux).unwrap();

    let plant = runtime.hierarchy.add_framer("plant", Schedule::Active).unwrap();
    let root = runtime.hierarchy.add_frame(plant, "root", None).unwrap();
    let stage = runtime.hierarchy.add_frame(plant, "stage", Some(root)).unwrap();
    let act = runtime
        .hierarchy
        .add_act(stage, Context::Enter, Act::new("rear").with_parms(parms));
    (runtime, act)
}

#[test]
fn rearing_into_own_outline_is_rejected() {
    for target in ["root", "me"] {
        let (mut runtime, act) = staged(json!({"original": "worker", "frame": target}));
        let names = runtime.hierarchy.name_count();
        assert_eq!(
            resolve_kind(runtime.resolve_act(act).unwrap_err()),
            ResolveErrorKind::SelfRecursion
        );
        assert_eq!(runtime.hierarchy.name_count(), names);
        assert!(runtime.resolvables().is_empty());
    }
}

#[test]
fn rearing_requires_aux_schedule_and_template() {
    let (mut runtime, act) =
        staged(json!({"original": "worker", "frame": "pool", "schedule": "active"}));
    assert_eq!(
        resolve_kind(runtime.resolve_act(act).unwrap_err()),
        ResolveErrorKind::InvalidSchedule
    );

    let (mut runtime, act) = staged(json!({"original": "helper", "frame": "pool"}));
    assert_eq!(
        resolve_kind(runtime.resolve_act(act).unwrap_err()),
        ResolveErrorKind::InvalidRole
    );
}

fn razeable(who: &str) -> (Runtime, ActId, [FramerId; 3]) {
    let mut runtime = Runtime::new(RuntimeConfig::default(), common::registry());
    let host = runtime.hierarchy.add_framer("host", Schedule::Active).unwrap();
    let base = runtime.hierarchy.add_frame(host, "base", None).unwrap();

    let mut auxes = Vec::new();
    for (name, spawned) in [("a", true), ("b", false), ("c", true)] {
        let aux = runtime.hierarchy.add_framer(name, Schedule::Aux).unwrap();
        runtime.hierarchy.add_frame(aux, "only", None).unwrap();
        let framer = runtime.hierarchy.framer_mut(aux);
        framer.insular = spawned;
        framer.razeable = spawned;
        runtime.hierarchy.attach_aux(base, aux);
        auxes.push(aux);
    }
    let act = runtime
        .hierarchy
        .add_act(base, Context::Recur, Act::new("raze").with_parm("who", who));
    (runtime, act, [auxes[0], auxes[1], auxes[2]])
}

fn hosted(runtime: &Runtime) -> Vec<FramerId> {
    let host = framer(runtime, "host");
    let base = runtime.hierarchy.framer(host).frame_named("base").unwrap();
    runtime.hierarchy.frame(base).auxes.clone()
}

#[test]
fn razer_selects_first_last_or_all() {
    let (mut runtime, act, [a, b, c]) = razeable("first");
    runtime.run_act(act).unwrap();
    assert_eq!(hosted(&runtime), vec![b, c]);
    assert!(runtime.hierarchy.framer(a).pruned);
    assert!(!runtime.hierarchy.has_name("a"));

    let (mut runtime, act, [a, b, c]) = razeable("last");
    runtime.run_act(act).unwrap();
    assert_eq!(hosted(&runtime), vec![a, b]);
    assert!(runtime.hierarchy.framer(c).pruned);

    let (mut runtime, act, [a, b, c]) = razeable("all");
    runtime.run_act(act).unwrap();
    assert_eq!(hosted(&runtime), vec![b]);
    assert!(runtime.hierarchy.framer(a).pruned && runtime.hierarchy.framer(c).pruned);
    assert!(!runtime.hierarchy.framer(b).pruned);
}

#[test]
fn razer_rejects_unknown_selector() {
    let (mut runtime, act, _) = razeable("middle");
    assert_eq!(
        resolve_kind(runtime.resolve_act(act).unwrap_err()),
        ResolveErrorKind::InvalidTarget
    );
}

#[test]
fn rearing_and_razing_in_a_loop_reuses_arena_slots() {
    let mut runtime = runtime(json!({
        "framers": [worker(), {
            "name": "plant",
            "frames": [
                {"name": "root"},
                {"name": "stage", "over": "root", "acts": [
                    {"behavior": "rear", "parms": {"original": "worker", "frame": "pool"}},
                    {"behavior": "raze", "parms": {"frame": "pool", "who": "all"}}
                ]},
                {"name": "pool", "over": "root"}
            ]
        }]
    }));
    runtime.start().unwrap();
    let plant = framer(&runtime, "plant");
    let pool = runtime.hierarchy.framer(plant).frame_named("pool").unwrap();

    for _ in 0..3 {
        runtime.tick().unwrap();
    }
    let framers = runtime.hierarchy.framer_slots();
    let acts = runtime.hierarchy.act_slots();

    for _ in 0..200 {
        runtime.tick().unwrap();
    }
    assert_eq!(runtime.hierarchy.framer_slots(), framers);
    assert_eq!(runtime.hierarchy.act_slots(), acts);
    assert!(framers <= 4);
    assert_eq!(runtime.hierarchy.framer_ids().count(), 2);
    assert_eq!(runtime.hierarchy.name_count(), 2);
    assert!(runtime.hierarchy.frame(pool).auxes.is_empty());
}
