//! Shared fixtures for the integration tests

#![allow(dead_code)]

use serde_json::{Value, json};
use strata::runtime::error::Result;
use strata::runtime::plan::Plan;
use strata::runtime::registry::BehaviorRegistry;
use strata::runtime::{Behavior, BehaviorCatalog, Call, Outcome, Runtime, RuntimeConfig};

/// Counts its own invocations in the share wired to `hits`
pub struct Tally(String);

impl Behavior for Tally {
    fn name(&self) -> &str {
        &self.0
    }

    fn act(&self, runtime: &mut Runtime, call: &Call<'_>) -> Result<Outcome> {
        let share = call.share("hits").cloned().expect("tally needs a hits share");
        let count = runtime
            .store
            .get(&share)
            .and_then(|share| share.value())
            .and_then(Value::as_u64)
            .unwrap_or(0);
        runtime
            .store
            .update(&share, json!({"value": count + 1}).as_object().unwrap());
        Ok(Outcome::Continue)
    }
}

/// Catalog of the built-in behaviors plus `tally`
pub fn catalog() -> BehaviorCatalog {
    let catalog = BehaviorCatalog::with_builtins();
    catalog.register("tally", |construction| {
        Ok(Box::new(Tally(construction.name.clone())))
    });
    catalog
}

/// Snapshot of `catalog`
pub fn registry() -> BehaviorRegistry {
    catalog().snapshot()
}

/// Build a runtime from a JSON plan
pub fn runtime(plan: Value) -> Runtime {
    let plan: Plan = serde_json::from_value(plan).unwrap();
    Runtime::from_plan(RuntimeConfig::default(), registry(), &plan).unwrap()
}

/// A `tally` descriptor counting into an absolute share path
pub fn tally(context: &str, path: &str) -> Value {
    json!({"context": context, "behavior": "tally", "ioinits": {"hits": path}})
}

/// Current `value` field of a share, if any
pub fn value(runtime: &Runtime, path: &str) -> Option<Value> {
    let share = runtime.store.find(path)?;
    runtime.store.get(&share)?.value().cloned()
}

/// Count recorded by a `tally`; zero when it never ran
pub fn hits(runtime: &Runtime, path: &str) -> u64 {
    value(runtime, path).and_then(|value| value.as_u64()).unwrap_or(0)
}

/// Set the `value` field of a share, creating it if needed
pub fn set(runtime: &mut Runtime, path: &str, value: Value) {
    let share = runtime.store.create(path);
    runtime
        .store
        .update(&share, json!({"value": value}).as_object().unwrap());
}

/// A guard that holds once the share at `path` equals `true`
pub fn when(path: &str) -> Value {
    json!({"behavior": "need.compare", "parms": {"share": path, "goal": true}})
}

/// Look up a frame by framer and frame name
pub fn frame(runtime: &Runtime, framer: &str, frame: &str) -> strata::runtime::FrameId {
    let framer = runtime.hierarchy.framer_named(framer).unwrap();
    runtime.hierarchy.framer(framer).frame_named(frame).unwrap()
}

/// Look up a framer by name
pub fn framer(runtime: &Runtime, name: &str) -> strata::runtime::FramerId {
    runtime.hierarchy.framer_named(name).unwrap()
}
