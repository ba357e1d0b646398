//! Framer mechanics
//!
//! Entry, exit and stepping of framers. A framer's `actives` list is its
//! running outline, top-down. Each step runs the precur acts of every
//! active frame (stopping at the first interrupting outcome), then the recur
//! acts and the auxiliaries hosted by those frames.

use tracing::{debug, info};

use super::Runtime;
use super::behavior::{BehaviorKind, Call, Outcome};
use super::error::{Result, RuntimeError};
use super::hierarchy::{ActId, Context, FrameId, FramerId};

impl Runtime {
    /// Run a descriptor once, binding it first if needed
    pub fn run_act(&mut self, id: ActId) -> Result<Outcome> {
        if !self.hierarchy.act(id).is_bound() {
            self.resolve_act(id)?;
        }
        let act = self.hierarchy.act(id);
        let (Some(behavior), Some(framer), Some(frame)) =
            (act.behavior().cloned(), act.framer, act.frame_id())
        else {
            return Err(RuntimeError::Config(format!("{id} ran without being bound")));
        };
        let parms = act.parms.clone();
        let call = Call {
            act: id,
            framer,
            frame,
            parms: &parms,
        };
        behavior.act(self, &call)
    }

    /// Whether every guard holds; stops at the first one that does not
    pub fn check_needs(&mut self, needs: &[ActId]) -> Result<bool> {
        for &need in needs {
            if !self.run_act(need)?.holds() {
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Whether every preact of the given frames holds
    pub fn check_enter(&mut self, frames: &[FrameId]) -> Result<bool> {
        for &frame in frames {
            let preacts = self.hierarchy.frame(frame).acts(Context::Preact).to_vec();
            if !self.check_needs(&preacts)? {
                debug!(frame = %self.hierarchy.frame(frame).name, "entry refused");
                return Ok(false);
            }
        }
        Ok(true)
    }

    /// Whether a framer may be started in its first frame
    pub fn check_start(&mut self, framer: FramerId) -> Result<bool> {
        let Some(first) = self.hierarchy.framer(framer).first else {
            return Ok(false);
        };
        let outline = self.hierarchy.outline(first);
        self.check_enter(&outline)
    }

    fn run_context(&mut self, frames: &[FrameId], context: Context) -> Result<()> {
        for &frame in frames {
            for act in self.hierarchy.frame(frame).acts(context).to_vec() {
                self.run_act(act)?;
            }
        }
        Ok(())
    }

    /// Run the enter acts of frames, in the given order
    pub fn enter(&mut self, frames: &[FrameId]) -> Result<()> {
        self.run_context(frames, Context::Enter)
    }

    /// Run the re-enter acts of frames, in the given order
    pub fn renter(&mut self, frames: &[FrameId]) -> Result<()> {
        self.run_context(frames, Context::Renter)
    }

    /// Run the re-exit acts of frames, in the given order
    pub fn rexit(&mut self, frames: &[FrameId]) -> Result<()> {
        self.run_context(frames, Context::Rexit)
    }

    /// Exit frames in the given order. Running auxiliaries hosted by a frame
    /// are exited before the frame's own exit acts run.
    pub fn exit(&mut self, frames: &[FrameId]) -> Result<()> {
        for &frame in frames {
            for aux in self.hierarchy.frame(frame).auxes.clone() {
                if !self.hierarchy.framer(aux).actives.is_empty() {
                    self.exit_all(aux)?;
                }
            }
            self.run_context(&[frame], Context::Exit)?;
        }
        Ok(())
    }

    /// Make a frame the active one; the framer's actives become its outline
    pub fn activate(&mut self, framer: FramerId, frame: FrameId) {
        let outline = self.hierarchy.outline(frame);
        let running = self.hierarchy.framer_mut(framer);
        running.active = Some(frame);
        running.actives = outline;
    }

    fn log_aspects(&self, framer: FramerId, start: bool) {
        let name = &self.hierarchy.framer(framer).name;
        for text in self.aspects_for(framer, start) {
            info!(framer = %name, "{text}");
        }
    }

    /// Start a framer: enter the outline of its first frame
    pub fn enter_all(&mut self, framer: FramerId) -> Result<()> {
        let first = self.hierarchy.framer(framer).first.ok_or_else(|| {
            RuntimeError::Config(format!(
                "framer '{}' has no frames",
                self.hierarchy.framer(framer).name
            ))
        })?;
        self.log_aspects(framer, true);
        self.hierarchy.framer_mut(framer).done = false;
        let outline = self.hierarchy.outline(first);
        self.activate(framer, first);
        self.enter(&outline)?;
        debug!(framer = %self.hierarchy.framer(framer).name, "entered");
        Ok(())
    }

    /// Stop a framer: exit its actives bottom-up and mark it done
    pub fn exit_all(&mut self, framer: FramerId) -> Result<()> {
        let mut actives = std::mem::take(&mut self.hierarchy.framer_mut(framer).actives);
        actives.reverse();
        self.exit(&actives)?;
        let stopped = self.hierarchy.framer_mut(framer);
        stopped.actives.clear();
        stopped.active = None;
        stopped.done = true;
        self.log_aspects(framer, false);
        debug!(framer = %self.hierarchy.framer(framer).name, "exited");
        Ok(())
    }

    /// Run one step of a framer
    pub fn run_step(&mut self, framer: FramerId) -> Result<()> {
        let actives = self.hierarchy.framer(framer).actives.clone();
        for &frame in &actives {
            for act in self.hierarchy.frame(frame).acts(Context::Precur).to_vec() {
                let outcome = self.run_act(act)?;
                let interrupter = self
                    .hierarchy
                    .act(act)
                    .behavior()
                    .is_some_and(|behavior| behavior.kind() == BehaviorKind::Interrupter);
                if interrupter && matches!(outcome, Outcome::Transit(_) | Outcome::Suspend(_)) {
                    return Ok(());
                }
            }
        }

        if self.hierarchy.framer(framer).done {
            return Ok(());
        }
        for &frame in &actives {
            for act in self.hierarchy.frame(frame).acts(Context::Recur).to_vec() {
                self.run_act(act)?;
            }
            for aux in self.hierarchy.frame(frame).auxes.clone() {
                self.step_hosted(aux)?;
            }
        }
        Ok(())
    }

    fn step_hosted(&mut self, aux: FramerId) -> Result<()> {
        let hosted = self.hierarchy.framer(aux);
        if hosted.pruned {
            return Ok(());
        }
        if hosted.actives.is_empty() {
            if !self.check_start(aux)? {
                return Ok(());
            }
            self.enter_all(aux)?;
        }
        if !self.hierarchy.framer(aux).done {
            self.run_step(aux)?;
        }
        Ok(())
    }

    /// Move a framer's control from `near` to `far`.
    ///
    /// Nothing is exited or entered unless the frames to be entered accept
    /// entry. Returns whether the transition happened.
    pub fn transit(&mut self, framer: FramerId, near: FrameId, far: FrameId) -> Result<bool> {
        let actives = self.hierarchy.framer(framer).actives.clone();
        let outline = self.hierarchy.outline(far);

        let exits: Vec<FrameId> = actives
            .iter()
            .filter(|frame| !outline.contains(frame))
            .copied()
            .collect();
        let enters: Vec<FrameId> = outline
            .iter()
            .filter(|frame| !actives.contains(frame))
            .copied()
            .collect();
        let renters: Vec<FrameId> = match actives.iter().position(|&frame| frame == near) {
            Some(at) => actives[at..]
                .iter()
                .filter(|frame| outline.contains(frame))
                .copied()
                .collect(),
            None => Vec::new(),
        };

        if !self.check_enter(&enters)? {
            info!(
                framer = %self.hierarchy.framer(framer).name,
                far = %self.hierarchy.frame(far).name,
                "transition refused"
            );
            return Ok(false);
        }

        let bottom_up = |frames: &[FrameId]| frames.iter().rev().copied().collect::<Vec<_>>();
        self.exit(&bottom_up(&exits))?;
        self.rexit(&bottom_up(&renters))?;
        self.renter(&renters)?;
        self.enter(&enters)?;
        self.activate(framer, far);
        info!(
            framer = %self.hierarchy.framer(framer).name,
            near = %self.hierarchy.frame(near).name,
            far = %self.hierarchy.frame(far).name,
            "transitioned"
        );
        Ok(true)
    }

    /// Cut a framer's actives back to the head of `frame`. The frames cut
    /// off are exited bottom-up.
    pub fn truncate_to_head(&mut self, framer: FramerId, frame: FrameId) -> Result<()> {
        let head = self.hierarchy.head(frame);
        let cut: Vec<FrameId> = self
            .hierarchy
            .framer(framer)
            .actives
            .iter()
            .rev()
            .filter(|frame| !head.contains(frame))
            .copied()
            .collect();
        self.exit(&cut)?;
        self.hierarchy.framer_mut(framer).actives = head;
        Ok(())
    }

    /// Restore a framer's actives to the outline of its active frame. Frames
    /// added back are entered top-down.
    pub fn restore_outline(&mut self, framer: FramerId) -> Result<()> {
        let running = self.hierarchy.framer(framer);
        let Some(active) = running.active.or(running.first) else {
            return Ok(());
        };
        let before = running.actives.clone();
        self.activate(framer, active);
        let added: Vec<FrameId> = self
            .hierarchy
            .framer(framer)
            .actives
            .iter()
            .filter(|frame| !before.contains(frame))
            .copied()
            .collect();
        self.enter(&added)
    }

    /// Finish an auxiliary and give up its host. Clones stay attached to the
    /// frame that spawned them.
    pub fn release_aux(&mut self, aux: FramerId) -> Result<()> {
        self.exit_all(aux)?;
        let released = self.hierarchy.framer_mut(aux);
        if released.original {
            released.main = None;
        }
        Ok(())
    }

    /// Stop and tear down a framer and everything it hosts
    pub fn prune_framer(&mut self, framer: FramerId) -> Result<()> {
        if !self.hierarchy.framer(framer).actives.is_empty() {
            self.exit_all(framer)?;
        }
        self.hierarchy.prune(framer);
        Ok(())
    }

    /// Start (or end) aspect messages that apply to a framer
    pub fn aspects_for(&self, framer: FramerId, start: bool) -> Vec<String> {
        let running = self.hierarchy.framer(framer);
        let aspects = if start {
            &running.aspects.start
        } else {
            &running.aspects.end
        };
        aspects
            .iter()
            .filter(|(applicability, _)| applicability.applies(running.original))
            .map(|(_, text)| text.clone())
            .collect()
    }
}
