//! Auxiliary call/return
//!
//! A suspender runs an auxiliary framer as a sub-machine of its host frame.
//! While the auxiliary runs, the host's actives are cut back to the head of
//! the host frame and the suspender keeps interrupting the host's step. The
//! auxiliary's `main` link is the ownership flag that stops two hosts from
//! suspending into it at once.

use std::sync::Arc;
use tracing::info;

use crate::runtime::act::{Act, Arg, Args};
use crate::runtime::behavior::{Behavior, BehaviorKind, Call, Outcome, ResolveScope};
use crate::runtime::error::{ResolveErrorKind, Result};
use crate::runtime::hierarchy::{Context, FrameId, FramerId, Schedule};
use crate::runtime::Runtime;

/// Suspends the host frame while an auxiliary framer runs.
#[derive(Debug, Clone)]
pub struct Suspender {
    name: String,
}

impl Suspender {
    /// Create an unresolved suspender
    pub fn new(name: String) -> Self {
        Self { name }
    }

    fn start(
        &self,
        runtime: &mut Runtime,
        call: &Call<'_>,
        main: FrameId,
        aux: FramerId,
    ) -> Result<Outcome> {
        if !runtime.check_needs(call.needs())? {
            return Ok(Outcome::Continue);
        }
        if !runtime.check_start(aux)? {
            return Ok(Outcome::Continue);
        }

        if runtime.hierarchy.framer(aux).original {
            runtime.hierarchy.framer_mut(aux).main = Some(main);
        }
        runtime.enter_all(aux)?;
        if !runtime.hierarchy.framer(aux).done {
            runtime.run_step(aux)?;
        }
        if runtime.hierarchy.framer(aux).done {
            runtime.release_aux(aux)?;
            return Ok(Outcome::Continue);
        }

        runtime.truncate_to_head(call.framer, main)?;
        info!(
            actor = %self.name,
            aux = %runtime.hierarchy.framer(aux).name,
            "suspended"
        );
        Ok(Outcome::Suspend(aux))
    }
}

impl Behavior for Suspender {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> BehaviorKind {
        BehaviorKind::Interrupter
    }

    fn resolve(&mut self, scope: &mut ResolveScope<'_>, parms: &mut Args) -> Result<()> {
        let main = scope.text_parm(parms, "main", "me")?.to_string();
        let main = scope.frame_named(&main)?;

        let aux = scope.text_parm(parms, "aux", "")?.to_string();
        if aux.is_empty() {
            return Err(scope.error(ResolveErrorKind::InvalidTarget, "aux").into());
        }
        let aux = scope.framer_named(&aux)?;
        let schedule = scope.runtime.hierarchy.framer(aux).schedule;
        if schedule != Schedule::Aux {
            let name = &scope.runtime.hierarchy.framer(aux).name;
            return Err(scope
                .error(ResolveErrorKind::InvalidRole, format!("{name} is {schedule:?}"))
                .into());
        }

        parms.insert("main".to_string(), Arg::Frame(main));
        parms.insert("aux".to_string(), Arg::Framer(aux));

        let closer = SuspenderCloser {
            name: format!("{}.closer", self.name),
            aux,
        };
        let act = Act::bound(Arc::new(closer), scope.framer, main)
            .with_human(scope.diag.human.clone(), scope.diag.count);
        scope.runtime.hierarchy.add_act(main, Context::Exit, act);
        Ok(())
    }

    fn act(&self, runtime: &mut Runtime, call: &Call<'_>) -> Result<Outcome> {
        let (Some(main), Some(aux)) = (call.frame_parm("main"), call.framer_parm("aux")) else {
            return Ok(Outcome::Continue);
        };
        // another host owns the auxiliary
        if runtime.hierarchy.framer(aux).main.is_some_and(|owner| owner != main) {
            return Ok(Outcome::Continue);
        }
        if runtime.hierarchy.framer(aux).done {
            return self.start(runtime, call, main, aux);
        }

        runtime.run_step(aux)?;
        if !runtime.hierarchy.framer(aux).done {
            return Ok(Outcome::Suspend(aux));
        }
        runtime.release_aux(aux)?;
        runtime.restore_outline(call.framer)?;
        info!(
            actor = %self.name,
            aux = %runtime.hierarchy.framer(aux).name,
            "resumed"
        );
        Ok(Outcome::Continue)
    }
}

/// Exit act registered on the host frame by a suspender. Finishes the
/// auxiliary if the host is left while it is still running.
#[derive(Debug, Clone)]
pub struct SuspenderCloser {
    name: String,
    aux: FramerId,
}

impl Behavior for SuspenderCloser {
    fn name(&self) -> &str {
        &self.name
    }

    fn act(&self, runtime: &mut Runtime, _call: &Call<'_>) -> Result<Outcome> {
        if !runtime.hierarchy.framer(self.aux).done {
            runtime.release_aux(self.aux)?;
            info!(
                actor = %self.name,
                aux = %runtime.hierarchy.framer(self.aux).name,
                "forced auxiliary to finish"
            );
        }
        Ok(Outcome::Continue)
    }
}
