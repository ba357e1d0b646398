//! Guarded transitions between frames

use tracing::debug;

use crate::runtime::act::{Arg, Args};
use crate::runtime::behavior::{Behavior, BehaviorKind, Call, Outcome, ResolveScope};
use crate::runtime::error::{ResolveErrorKind, Result};
use crate::runtime::Runtime;

/// Moves control from `near` to `far` once every guard in `needs` holds.
///
/// `near` is `me` (the owning frame) or a frame name. `far` is `next` (the
/// static successor of `near`), `me` (`near` itself) or a frame name.
#[derive(Debug, Clone)]
pub struct Transiter {
    name: String,
}

impl Transiter {
    /// Create an unresolved transiter
    pub fn new(name: String) -> Self {
        Self { name }
    }
}

impl Behavior for Transiter {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BehaviorKind {
        BehaviorKind::Interrupter
    }

    fn resolve(&mut self, scope: &mut ResolveScope<'_>, parms: &mut Args) -> Result<()> {
        let near = scope.text_parm(parms, "near", "me")?.to_string();
        let near = scope.frame_named(&near)?;

        let far = scope.text_parm(parms, "far", "next")?.to_string();
        let hierarchy = &scope.runtime.hierarchy;
        let far = match far.as_str() {
            "next" => hierarchy.frame(near).next,
            "me" => Some(near),
            name => hierarchy.framer(scope.framer).frame_named(name),
        }
        .ok_or_else(|| scope.error(ResolveErrorKind::InvalidTarget, &far))?;

        parms.insert("near".to_string(), Arg::Frame(near));
        parms.insert("far".to_string(), Arg::Frame(far));
        Ok(())
    }

    fn act(&self, runtime: &mut Runtime, call: &Call<'_>) -> Result<Outcome> {
        let (Some(near), Some(far)) = (call.frame_parm("near"), call.frame_parm("far")) else {
            return Ok(Outcome::Continue);
        };
        if !runtime.check_needs(call.needs())? {
            return Ok(Outcome::Continue);
        }
        if !runtime.hierarchy.framer(call.framer).actives.contains(&near) {
            debug!(actor = %self.name, "near frame is not active");
            return Ok(Outcome::Continue);
        }
        if runtime.transit(call.framer, near, far)? {
            Ok(Outcome::Transit(far))
        } else {
            Ok(Outcome::Continue)
        }
    }
}
