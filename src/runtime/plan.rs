//! Plans: already-parsed descriptor records grouped per frame
//!
//! A plan is the JSON form of a framer hierarchy as a script compiler would
//! emit it. `Runtime::from_plan` builds the arena from it; nothing is
//! resolved until the runtime starts.

use anyhow::Context as _;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fs;
use std::path::Path;

use super::act::{Act, Prerefs, args_from};
use super::error::{Result, RuntimeError};
use super::hierarchy::{ActId, Aspects, Context, FrameId, FramerId, Schedule};
use super::registry::BehaviorRegistry;
use super::{Runtime, RuntimeConfig};

/// A complete hierarchy description
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Plan {
    /// Framers in declaration order
    pub framers: Vec<FramerPlan>,
}

/// One framer
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FramerPlan {
    /// Globally unique name
    pub name: String,
    /// Role
    pub schedule: Schedule,
    /// Starting frame; defaults to the first frame declared
    pub first: Option<String>,
    /// Start and end messages
    pub aspects: Aspects,
    /// Frames, parents before children
    pub frames: Vec<FramePlan>,
}

/// One frame
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FramePlan {
    /// Name, unique within the framer
    pub name: String,
    /// Parent frame
    pub over: Option<String>,
    /// Static successor
    pub next: Option<String>,
    /// Names of hosted auxiliary framers
    pub auxes: Vec<String>,
    /// Descriptors in the order they run
    pub acts: Vec<ActPlan>,
}

/// One descriptor record
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ActPlan {
    /// Scheduling context; `recur` when absent
    pub context: Option<Context>,
    /// Registrar name of the behavior
    pub behavior: String,
    /// Construction initializers
    pub inits: Option<Map<String, Value>>,
    /// I/O-initializers
    pub ioinits: Option<Map<String, Value>>,
    /// Parameters
    pub parms: Map<String, Value>,
    /// Guard sub-descriptors
    pub needs: Vec<ActPlan>,
    /// Pre-references
    pub prerefs: Option<Prerefs>,
    /// Source text
    pub human: Option<String>,
    /// Source line count
    pub count: usize,
}

impl ActPlan {
    fn to_act(&self) -> Act {
        let mut act = Act::new(&self.behavior);
        act.parms = args_from(&self.parms);
        act.inits = self.inits.clone();
        act.ioinits = self.ioinits.clone();
        act.prerefs = self.prerefs.clone();
        if let Some(human) = &self.human {
            act = act.with_human(human, self.count);
        } else {
            act.count = self.count;
        }
        act
    }
}

impl Plan {
    /// Load a plan from a JSON file
    pub fn load(path: &Path) -> anyhow::Result<Self> {
        let data =
            fs::read(path).with_context(|| format!("Failed to read plan file: {:?}", path))?;
        serde_json::from_slice(&data)
            .with_context(|| format!("Failed to parse plan file: {:?}", path))
    }
}

fn frame_of(runtime: &Runtime, framer: FramerId, name: &str) -> Result<FrameId> {
    runtime.hierarchy.framer(framer).frame_named(name).ok_or_else(|| {
        RuntimeError::Config(format!(
            "unknown frame '{name}' in framer '{}'",
            runtime.hierarchy.framer(framer).name
        ))
    })
}

impl Runtime {
    /// Build a runtime holding the hierarchy a plan describes
    pub fn from_plan(config: RuntimeConfig, registry: BehaviorRegistry, plan: &Plan) -> Result<Self> {
        let mut runtime = Runtime::new(config, registry);

        let mut framers = Vec::with_capacity(plan.framers.len());
        for framer_plan in &plan.framers {
            let framer = runtime
                .hierarchy
                .add_framer(framer_plan.name.as_str(), framer_plan.schedule)?;
            runtime.hierarchy.framer_mut(framer).aspects = framer_plan.aspects.clone();
            for frame_plan in &framer_plan.frames {
                let over = frame_plan
                    .over
                    .as_deref()
                    .map(|over| frame_of(&runtime, framer, over))
                    .transpose()?;
                runtime
                    .hierarchy
                    .add_frame(framer, frame_plan.name.as_str(), over)?;
            }
            framers.push(framer);
        }

        for (framer_plan, &framer) in plan.framers.iter().zip(&framers) {
            if let Some(first) = &framer_plan.first {
                let first = frame_of(&runtime, framer, first)?;
                runtime.hierarchy.set_first(framer, first);
            }
            for frame_plan in &framer_plan.frames {
                let frame = frame_of(&runtime, framer, &frame_plan.name)?;
                if let Some(next) = &frame_plan.next {
                    let next = frame_of(&runtime, framer, next)?;
                    runtime.hierarchy.set_next(frame, next);
                }
                for aux in &frame_plan.auxes {
                    let aux = runtime.hierarchy.framer_named(aux).ok_or_else(|| {
                        RuntimeError::Config(format!("unknown auxiliary framer '{aux}'"))
                    })?;
                    runtime.hierarchy.attach_aux(frame, aux);
                }
                for act_plan in &frame_plan.acts {
                    let context = act_plan.context.unwrap_or(Context::Recur);
                    let act = runtime.hierarchy.add_act(frame, context, act_plan.to_act());
                    runtime.add_needs(act, &act_plan.needs);
                }
            }
        }
        Ok(runtime)
    }

    fn add_needs(&mut self, parent: ActId, needs: &[ActPlan]) {
        for need in needs {
            let child = self.hierarchy.add_sub_act(parent, "needs", need.to_act());
            self.add_needs(child, &need.needs);
        }
    }
}
