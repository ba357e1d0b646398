//! Built-in behaviors
//!
//! Scheduling behaviors (transitions, suspensions, clone spawning and
//! destruction) plus the small utilities and guard conditions plans are
//! written with.

use serde::Deserialize;
use serde_json::json;

use crate::runtime::BehaviorCatalog;
use crate::runtime::behavior::Construction;
use crate::runtime::error::Result;
use crate::runtime::registry::BehaviorDefaults;

pub mod clone;
pub mod suspender;
pub mod transiter;
pub mod utility;

pub use clone::{Razer, Rearer};
pub use suspender::{Suspender, SuspenderCloser};
pub use transiter::Transiter;

/// Initializers of behaviors configured only by their name
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct NameOnly {
    name: String,
}

fn actor_name(construction: &Construction) -> Result<String> {
    let NameOnly { name } = construction.parse()?;
    Ok(name)
}

/// Register every built-in behavior
pub fn register_builtins(catalog: &BehaviorCatalog) {
    catalog.register_with_defaults(
        "go",
        BehaviorDefaults::default().parms(json!({"near": "me", "far": "next"})),
        |c| Ok(Box::new(Transiter::new(actor_name(c)?))),
    );
    catalog.register_with_defaults(
        "suspend",
        BehaviorDefaults::default().parms(json!({"main": "me"})),
        |c| Ok(Box::new(Suspender::new(actor_name(c)?))),
    );
    catalog.register_with_defaults(
        "rear",
        BehaviorDefaults::default().parms(json!({"schedule": "aux"})),
        |c| Ok(Box::new(Rearer::new(actor_name(c)?))),
    );
    catalog.register_with_defaults(
        "raze",
        BehaviorDefaults::default().parms(json!({"who": "all", "frame": "me"})),
        |c| Ok(Box::new(Razer::new(actor_name(c)?))),
    );

    catalog.register("print", |c| Ok(Box::new(utility::Printer::new(actor_name(c)?))));
    catalog.register_with_defaults(
        "mark",
        BehaviorDefaults::default().inits(json!({"kind": "update"})),
        |c| Ok(Box::new(utility::Marker::new(c)?)),
    );
    catalog.register_with_defaults(
        "done",
        BehaviorDefaults::default().parms(json!({"targets": "me"})),
        |c| Ok(Box::new(utility::Done::new(actor_name(c)?))),
    );

    catalog.register("need.always", |c| {
        Ok(Box::new(utility::Constant::new(actor_name(c)?, true)))
    });
    catalog.register("need.never", |c| {
        Ok(Box::new(utility::Constant::new(actor_name(c)?, false)))
    });
    catalog.register_with_defaults(
        "need.compare",
        BehaviorDefaults::default().parms(json!({"field": "value", "comparator": "=="})),
        |c| Ok(Box::new(utility::Compare::new(actor_name(c)?))),
    );
    catalog.register("need.updated", |c| {
        Ok(Box::new(utility::MarkNeed::updated(actor_name(c)?)))
    });
    catalog.register("need.changed", |c| {
        Ok(Box::new(utility::MarkNeed::changed(actor_name(c)?)))
    });
    catalog.register_with_defaults(
        "need.done",
        BehaviorDefaults::default().parms(json!({"framer": "me"})),
        |c| Ok(Box::new(utility::DoneNeed::new(actor_name(c)?))),
    );
}
