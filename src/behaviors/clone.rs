//! Spawning and destroying auxiliary clones at run time

use tracing::info;

use crate::runtime::act::{Arg, Args};
use crate::runtime::behavior::{Behavior, Call, Outcome, ResolveScope};
use crate::runtime::error::{ResolveErrorKind, Result};
use crate::runtime::hierarchy::{FramerId, Schedule};
use crate::runtime::Runtime;

/// Spawns an insular, razeable clone of a template framer into a frame.
///
/// Parameters: `original` names a `moot` template framer, `schedule` must be
/// `aux`, and `frame` is `me` or a frame name outside the spawning frame's
/// outline.
#[derive(Debug, Clone)]
pub struct Rearer {
    name: String,
}

impl Rearer {
    /// Create an unresolved rearer
    pub fn new(name: String) -> Self {
        Self { name }
    }
}

impl Behavior for Rearer {
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve(&mut self, scope: &mut ResolveScope<'_>, parms: &mut Args) -> Result<()> {
        let original = scope.text_parm(parms, "original", "")?.to_string();
        let original = scope.framer_named(&original)?;
        if scope.runtime.hierarchy.framer(original).schedule != Schedule::Moot {
            let name = &scope.runtime.hierarchy.framer(original).name;
            return Err(scope.error(ResolveErrorKind::InvalidRole, name).into());
        }

        let schedule = scope.text_parm(parms, "schedule", "aux")?;
        if schedule != "aux" {
            return Err(scope.error(ResolveErrorKind::InvalidSchedule, schedule).into());
        }

        let frame = scope.text_parm(parms, "frame", "")?.to_string();
        if frame.is_empty() {
            return Err(scope.error(ResolveErrorKind::InvalidTarget, "frame").into());
        }
        let frame = scope.frame_named(&frame)?;
        if scope.runtime.hierarchy.outline(scope.frame).contains(&frame) {
            let name = &scope.runtime.hierarchy.frame(frame).name;
            return Err(scope.error(ResolveErrorKind::SelfRecursion, name).into());
        }

        parms.insert("original".to_string(), Arg::Framer(original));
        parms.insert("frame".to_string(), Arg::Frame(frame));
        Ok(())
    }

    fn act(&self, runtime: &mut Runtime, call: &Call<'_>) -> Result<Outcome> {
        let (Some(original), Some(frame)) = (call.framer_parm("original"), call.frame_parm("frame"))
        else {
            return Ok(Outcome::Continue);
        };

        let name = runtime
            .hierarchy
            .name_uid(&runtime.hierarchy.framer(original).name);
        let clone = runtime.hierarchy.clone_framer(original, name)?;
        let spawned = runtime.hierarchy.framer_mut(clone);
        spawned.schedule = Schedule::Aux;
        spawned.original = false;
        spawned.insular = true;
        spawned.razeable = true;
        runtime.hierarchy.attach_aux(frame, clone);
        runtime.add_resolvable(clone);
        info!(
            actor = %self.name,
            clone = %runtime.hierarchy.framer(clone).name,
            frame = %runtime.hierarchy.frame(frame).name,
            "reared"
        );
        Ok(Outcome::Continue)
    }
}

/// Which razeable auxiliaries a razer destroys
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Who {
    /// Every one
    All,
    /// The first in declaration order
    First,
    /// The last in declaration order
    Last,
}

/// Destroys insular, razeable auxiliaries of a frame.
#[derive(Debug, Clone)]
pub struct Razer {
    name: String,
    who: Who,
}

impl Razer {
    /// Create an unresolved razer
    pub fn new(name: String) -> Self {
        Self { name, who: Who::All }
    }
}

impl Behavior for Razer {
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve(&mut self, scope: &mut ResolveScope<'_>, parms: &mut Args) -> Result<()> {
        self.who = match scope.text_parm(parms, "who", "all")? {
            "all" => Who::All,
            "first" => Who::First,
            "last" => Who::Last,
            other => return Err(scope.error(ResolveErrorKind::InvalidTarget, other).into()),
        };
        let frame = scope.text_parm(parms, "frame", "me")?.to_string();
        let frame = scope.frame_named(&frame)?;
        parms.insert("frame".to_string(), Arg::Frame(frame));
        Ok(())
    }

    fn act(&self, runtime: &mut Runtime, call: &Call<'_>) -> Result<Outcome> {
        let Some(frame) = call.frame_parm("frame") else {
            return Ok(Outcome::Continue);
        };
        let candidates: Vec<FramerId> = runtime
            .hierarchy
            .frame(frame)
            .auxes
            .iter()
            .copied()
            .filter(|&aux| {
                let aux = runtime.hierarchy.framer(aux);
                aux.insular && aux.razeable && !aux.pruned
            })
            .collect();
        let selected: Vec<FramerId> = match self.who {
            Who::All => candidates,
            Who::First => candidates.first().copied().into_iter().collect(),
            Who::Last => candidates.last().copied().into_iter().collect(),
        };

        for aux in selected {
            runtime.prune_framer(aux)?;
            runtime.hierarchy.detach_aux(frame, aux);
            info!(
                actor = %self.name,
                aux = %runtime.hierarchy.framer(aux).name,
                "razed"
            );
        }
        Ok(Outcome::Continue)
    }
}
