//! Framers, frames and descriptors held in one arena
//!
//! Framers own trees of frames; frames own descriptors grouped by scheduling
//! context and may host auxiliary framers. Everything is addressed by index
//! so a framer can be structurally cloned by remapping ids, and so the
//! uniqueness and recursion checks used when spawning clones are plain
//! lookups. Slots of pruned framers are retired, then reclaimed at a tick
//! boundary and reused by later additions and clones.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use uuid::Uuid;

use super::act::{Act, Arg, FrameRef};
use super::error::{CloneError, CloneErrorKind, Result, RuntimeError};

macro_rules! arena_id {
    ($(#[$meta:meta])* $name:ident, $prefix:literal) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        pub struct $name(pub usize);

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, concat!($prefix, "#{}"), self.0)
            }
        }
    };
}

arena_id!(
    /// Framer identifier
    FramerId,
    "framer"
);
arena_id!(
    /// Frame identifier
    FrameId,
    "frame"
);
arena_id!(
    /// Descriptor identifier
    ActId,
    "act"
);

/// Scheduling context of a descriptor within its frame
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Context {
    /// Run every tick before recur; may interrupt (transitions, suspensions)
    Precur,
    /// Run every tick
    Recur,
    /// Run when the frame is entered
    Enter,
    /// Run when the frame is re-entered by a transition
    Renter,
    /// Run when the frame is exited
    Exit,
    /// Run when the frame is exited for re-entry
    Rexit,
    /// Entry precondition; all must hold for the frame to be entered
    Preact,
}

/// Role of a framer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Schedule {
    /// Entered on start and stepped every tick
    #[default]
    Active,
    /// Never run
    Inactive,
    /// Run by a host frame or a suspender
    Aux,
    /// Template for clones; never resolved or run
    Moot,
}

/// Which framers an aspect applies to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Applicability {
    /// Every framer
    #[default]
    All,
    /// Only framers that are not clones
    Original,
    /// Only clones
    Clone,
}

impl Applicability {
    /// Whether the aspect applies to a framer with the given origin
    pub fn applies(self, original: bool) -> bool {
        match self {
            Applicability::All => true,
            Applicability::Original => original,
            Applicability::Clone => !original,
        }
    }
}

/// Messages emitted when a framer starts and ends
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Aspects {
    /// Emitted by `enter_all`
    pub start: Vec<(Applicability, String)>,
    /// Emitted by `exit_all`
    pub end: Vec<(Applicability, String)>,
}

/// Node of a framer's tree
#[derive(Debug, Clone)]
pub struct Frame {
    /// Name, unique within the framer
    pub name: String,
    /// Owning framer
    pub framer: FramerId,
    /// Parent frame
    pub over: Option<FrameId>,
    /// Default child entered along with this frame
    pub under: Option<FrameId>,
    /// Statically declared successor
    pub next: Option<FrameId>,
    /// Auxiliary framers hosted by this frame, in declaration order
    pub auxes: Vec<FramerId>,
    acts: HashMap<Context, Vec<ActId>>,
}

impl Frame {
    /// Descriptors registered under a context, in order
    pub fn acts(&self, context: Context) -> &[ActId] {
        self.acts.get(&context).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Hierarchical state machine
#[derive(Debug, Clone)]
pub struct Framer {
    /// Globally unique name
    pub name: String,
    /// Role
    pub schedule: Schedule,
    /// Frame entered by `enter_all`
    pub first: Option<FrameId>,
    /// Frame most recently activated
    pub active: Option<FrameId>,
    /// Frames currently run each tick, top-down
    pub actives: Vec<FrameId>,
    /// Not running, or finished
    pub done: bool,
    /// Host frame that owns this framer
    pub main: Option<FrameId>,
    /// Not a clone
    pub original: bool,
    /// Private to a single host
    pub insular: bool,
    /// Eligible for forced destruction
    pub razeable: bool,
    /// Torn down
    pub pruned: bool,
    /// Start and end messages
    pub aspects: Aspects,
    frames: IndexMap<String, FrameId>,
}

impl Framer {
    fn new(name: String, schedule: Schedule) -> Self {
        Self {
            name,
            schedule,
            first: None,
            active: None,
            actives: Vec::new(),
            done: true,
            main: None,
            original: true,
            insular: false,
            razeable: false,
            pruned: false,
            aspects: Aspects::default(),
            frames: IndexMap::new(),
        }
    }

    /// Look up a frame of this framer by name
    pub fn frame_named(&self, name: &str) -> Option<FrameId> {
        self.frames.get(name).copied()
    }

    /// Frames in declaration order
    pub fn frames(&self) -> impl Iterator<Item = FrameId> + '_ {
        self.frames.values().copied()
    }
}

#[derive(Debug, Default)]
struct Slots {
    framers: Vec<FramerId>,
    frames: Vec<FrameId>,
    acts: Vec<ActId>,
}

/// Arena of framers, frames and descriptors plus the global framer names
#[derive(Debug, Default)]
pub struct Hierarchy {
    framers: Vec<Framer>,
    frames: Vec<Frame>,
    acts: Vec<Act>,
    names: IndexMap<String, FramerId>,
    // Pruned since the last reclaim; ids may still sit in step snapshots.
    retired: Slots,
    free: Slots,
}

impl Hierarchy {
    /// Create an empty hierarchy
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a framer under a globally unique name
    pub fn add_framer(&mut self, name: impl Into<String>, schedule: Schedule) -> Result<FramerId> {
        let name = name.into();
        if self.names.contains_key(&name) {
            return Err(RuntimeError::Config(format!("duplicate framer name '{name}'")));
        }
        let id = self.alloc_framer(Framer::new(name.clone(), schedule));
        self.names.insert(name, id);
        Ok(id)
    }

    fn alloc_framer(&mut self, framer: Framer) -> FramerId {
        match self.free.framers.pop() {
            Some(id) => {
                self.framers[id.0] = framer;
                id
            }
            None => {
                self.framers.push(framer);
                FramerId(self.framers.len() - 1)
            }
        }
    }

    fn alloc_frame(&mut self, frame: Frame) -> FrameId {
        match self.free.frames.pop() {
            Some(id) => {
                self.frames[id.0] = frame;
                id
            }
            None => {
                self.frames.push(frame);
                FrameId(self.frames.len() - 1)
            }
        }
    }

    fn alloc_act(&mut self, act: Act) -> ActId {
        match self.free.acts.pop() {
            Some(id) => {
                self.acts[id.0] = act;
                id
            }
            None => {
                self.acts.push(act);
                ActId(self.acts.len() - 1)
            }
        }
    }

    /// Add a frame to a framer, optionally under a parent frame.
    ///
    /// The first frame added becomes the framer's first frame and the first
    /// child added under a parent becomes its default child.
    pub fn add_frame(
        &mut self,
        framer: FramerId,
        name: impl Into<String>,
        over: Option<FrameId>,
    ) -> Result<FrameId> {
        let name = name.into();
        if self.framers[framer.0].frames.contains_key(&name) {
            return Err(RuntimeError::Config(format!(
                "duplicate frame name '{name}' in framer '{}'",
                self.framers[framer.0].name
            )));
        }
        let id = self.alloc_frame(Frame {
            name: name.clone(),
            framer,
            over,
            under: None,
            next: None,
            auxes: Vec::new(),
            acts: HashMap::new(),
        });
        if let Some(parent) = over {
            self.frames[parent.0].under.get_or_insert(id);
        }
        let owner = &mut self.framers[framer.0];
        owner.first.get_or_insert(id);
        owner.frames.insert(name, id);
        Ok(id)
    }

    /// Set a frame's static successor
    pub fn set_next(&mut self, frame: FrameId, next: FrameId) {
        self.frames[frame.0].next = Some(next);
    }

    /// Set a frame's default child
    pub fn set_under(&mut self, frame: FrameId, under: FrameId) {
        self.frames[frame.0].under = Some(under);
    }

    /// Set the frame a framer starts in
    pub fn set_first(&mut self, framer: FramerId, frame: FrameId) {
        self.framers[framer.0].first = Some(frame);
    }

    /// Attach a descriptor to a frame under a scheduling context
    pub fn add_act(&mut self, frame: FrameId, context: Context, mut act: Act) -> ActId {
        let owner = &self.frames[frame.0];
        act.framer = Some(owner.framer);
        if !act.is_bound() {
            act.frame = FrameRef::Name(owner.name.clone());
        }
        act.context = Some(context);
        let id = self.alloc_act(act);
        self.frames[frame.0].acts.entry(context).or_default().push(id);
        id
    }

    /// Attach a sub-descriptor to the list parameter `key` of `parent`
    pub fn add_sub_act(&mut self, parent: ActId, key: &str, mut act: Act) -> ActId {
        act.enclosing = Some(parent);
        act.framer = self.acts[parent.0].framer;
        let id = self.alloc_act(act);
        let parms = &mut self.acts[parent.0].parms;
        match parms.get_mut(key) {
            Some(Arg::Acts(list)) => list.push(id),
            _ => {
                parms.insert(key.to_string(), Arg::Acts(vec![id]));
            }
        }
        id
    }

    /// Host an auxiliary framer in a frame
    pub fn attach_aux(&mut self, frame: FrameId, aux: FramerId) {
        self.frames[frame.0].auxes.push(aux);
        self.framers[aux.0].main = Some(frame);
    }

    /// Remove an auxiliary framer from its host frame
    pub fn detach_aux(&mut self, frame: FrameId, aux: FramerId) {
        self.frames[frame.0].auxes.retain(|&hosted| hosted != aux);
    }

    /// Access a framer
    pub fn framer(&self, id: FramerId) -> &Framer {
        &self.framers[id.0]
    }

    /// Access a framer mutably
    pub fn framer_mut(&mut self, id: FramerId) -> &mut Framer {
        &mut self.framers[id.0]
    }

    /// Access a frame
    pub fn frame(&self, id: FrameId) -> &Frame {
        &self.frames[id.0]
    }

    /// Access a descriptor
    pub fn act(&self, id: ActId) -> &Act {
        &self.acts[id.0]
    }

    /// Access a descriptor mutably
    pub fn act_mut(&mut self, id: ActId) -> &mut Act {
        &mut self.acts[id.0]
    }

    /// Look up a live framer by name
    pub fn framer_named(&self, name: &str) -> Option<FramerId> {
        self.names.get(name).copied()
    }

    /// Whether a framer name is registered
    pub fn has_name(&self, name: &str) -> bool {
        self.names.contains_key(name)
    }

    /// Number of registered framer names
    pub fn name_count(&self) -> usize {
        self.names.len()
    }

    /// Framers that have not been pruned, in slot order
    pub fn framer_ids(&self) -> impl Iterator<Item = FramerId> + '_ {
        self.framers
            .iter()
            .enumerate()
            .filter(|(_, framer)| !framer.pruned)
            .map(|(slot, _)| FramerId(slot))
    }

    /// Number of framer slots in the arena, live or not
    pub fn framer_slots(&self) -> usize {
        self.framers.len()
    }

    /// Number of descriptor slots in the arena, live or not
    pub fn act_slots(&self) -> usize {
        self.acts.len()
    }

    /// Every descriptor attached to a framer's frames, by context order
    pub fn framer_acts(&self, framer: FramerId) -> Vec<ActId> {
        self.framers[framer.0]
            .frames()
            .flat_map(|frame| {
                let frame = &self.frames[frame.0];
                [
                    Context::Preact,
                    Context::Enter,
                    Context::Renter,
                    Context::Precur,
                    Context::Recur,
                    Context::Exit,
                    Context::Rexit,
                ]
                .into_iter()
                .flat_map(move |context| frame.acts(context).iter().copied())
            })
            .collect()
    }

    /// Ancestors of a frame from the top down, ending with the frame itself
    pub fn head(&self, frame: FrameId) -> Vec<FrameId> {
        let mut head = vec![frame];
        let mut current = self.frames[frame.0].over;
        while let Some(over) = current {
            head.push(over);
            current = self.frames[over.0].over;
        }
        head.reverse();
        head
    }

    /// Head of a frame followed by its chain of default children
    pub fn outline(&self, frame: FrameId) -> Vec<FrameId> {
        let mut outline = self.head(frame);
        let mut current = self.frames[frame.0].under;
        while let Some(under) = current {
            if outline.contains(&under) {
                break;
            }
            outline.push(under);
            current = self.frames[under.0].under;
        }
        outline
    }

    /// Generate a framer name with the given prefix that is not registered
    pub fn name_uid(&self, prefix: &str) -> String {
        loop {
            let uid = Uuid::new_v4().simple().to_string();
            let candidate = format!("{prefix}_{}", &uid[..8]);
            if !self.names.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    /// Mark a framer and the auxiliaries hosted by its frames as torn down,
    /// release their names and retire their slots
    pub fn prune(&mut self, framer: FramerId) {
        if self.framers[framer.0].pruned {
            return;
        }
        let auxes: Vec<FramerId> = self.framers[framer.0]
            .frames()
            .flat_map(|frame| self.frames[frame.0].auxes.clone())
            .collect();
        for aux in auxes {
            self.prune(aux);
        }
        let pruned = &mut self.framers[framer.0];
        pruned.pruned = true;
        pruned.actives.clear();
        pruned.active = None;
        pruned.done = true;
        pruned.main = None;
        let name = pruned.name.clone();
        if self.names.get(&name) == Some(&framer) {
            self.names.shift_remove(&name);
        }

        let mut acts = Vec::new();
        for act in self.framer_acts(framer) {
            self.collect_act_tree(act, &mut acts);
        }
        self.retired.acts.extend(acts);
        let frames: Vec<FrameId> = self.framers[framer.0].frames().collect();
        self.retired.frames.extend(frames);
        self.retired.framers.push(framer);
    }

    fn collect_act_tree(&self, act: ActId, out: &mut Vec<ActId>) {
        out.push(act);
        for arg in self.acts[act.0].parms.values() {
            for &child in arg.sub_acts() {
                self.collect_act_tree(child, out);
            }
        }
    }

    /// Make slots retired by `prune` available for reuse. Call only when no
    /// ids of pruned framers are held elsewhere, such as between ticks.
    pub fn reclaim(&mut self) {
        let retired = std::mem::take(&mut self.retired);
        self.free.framers.extend(retired.framers);
        self.free.frames.extend(retired.frames);
        self.free.acts.extend(retired.acts);
    }

    /// Structurally clone an unbound framer under a new name.
    ///
    /// Frames, descriptors and hosted auxiliaries are copied with remapped
    /// ids. Nothing is committed unless every descriptor is still unbound.
    pub fn clone_framer(&mut self, source: FramerId, name: String) -> std::result::Result<FramerId, CloneError> {
        self.check_clonable(source)?;
        self.copy_framer(source, name)
    }

    fn check_clonable(&self, framer: FramerId) -> std::result::Result<(), CloneError> {
        for act in self.framer_acts(framer) {
            self.check_act_clonable(act, false)?;
        }
        for frame in self.framers[framer.0].frames() {
            for &aux in &self.frames[frame.0].auxes {
                self.check_clonable(aux)?;
            }
        }
        Ok(())
    }

    fn check_act_clonable(&self, id: ActId, sub: bool) -> std::result::Result<(), CloneError> {
        let act = &self.acts[id.0];
        let diag = act.diagnostic(id);
        if let Some(behavior) = act.behavior() {
            let kind = if sub { CloneErrorKind::SubAct } else { CloneErrorKind::Behavior };
            return Err(diag.clone_error(kind, behavior.name()));
        }
        if let Some(frame) = act.frame_id() {
            let kind = if sub { CloneErrorKind::SubAct } else { CloneErrorKind::FrameLink };
            return Err(diag.clone_error(kind, frame));
        }
        for arg in act.parms.values() {
            for &child in arg.sub_acts() {
                self.check_act_clonable(child, true)?;
            }
        }
        Ok(())
    }

    fn copy_framer(&mut self, source: FramerId, name: String) -> std::result::Result<FramerId, CloneError> {
        let template = &self.framers[source.0];
        let mut framer = Framer::new(name.clone(), template.schedule);
        framer.aspects = template.aspects.clone();
        framer.insular = template.insular;
        framer.razeable = template.razeable;
        let first = template.first;
        let sources: Vec<FrameId> = template.frames().collect();
        let id = self.alloc_framer(framer);
        self.names.insert(name, id);

        let mut mapping = HashMap::new();
        for &old in &sources {
            let name = self.frames[old.0].name.clone();
            let new = self.alloc_frame(Frame {
                name: name.clone(),
                framer: id,
                over: None,
                under: None,
                next: None,
                auxes: Vec::new(),
                acts: HashMap::new(),
            });
            self.framers[id.0].frames.insert(name, new);
            mapping.insert(old, new);
        }

        let remap = |frame: Option<FrameId>| frame.and_then(|f| mapping.get(&f).copied());
        self.framers[id.0].first = remap(first);
        for &old in &sources {
            let new = mapping[&old];
            let template = self.frames[old.0].clone();
            {
                let frame = &mut self.frames[new.0];
                frame.over = remap(template.over);
                frame.under = remap(template.under);
                frame.next = remap(template.next);
            }
            for (context, acts) in &template.acts {
                for &act in acts {
                    let copy = self.copy_act(act, id, None)?;
                    self.frames[new.0].acts.entry(*context).or_default().push(copy);
                }
            }
            for &aux in &template.auxes {
                let aux_name = self.name_uid(&self.framers[aux.0].name);
                let copy = self.copy_framer(aux, aux_name)?;
                self.framers[copy.0].original = false;
                self.attach_aux(new, copy);
            }
        }
        Ok(id)
    }

    fn copy_act(
        &mut self,
        source: ActId,
        framer: FramerId,
        enclosing: Option<ActId>,
    ) -> std::result::Result<ActId, CloneError> {
        let mut copy = self.acts[source.0].clone_unresolved(source, framer)?;
        copy.enclosing = enclosing;
        let parms = std::mem::take(&mut copy.parms);
        let id = self.alloc_act(copy);

        let mut remapped = parms.clone();
        for (key, arg) in parms {
            let arg = match arg {
                Arg::Act(child) => Arg::Act(self.copy_act(child, framer, Some(id))?),
                Arg::Acts(children) => Arg::Acts(
                    children
                        .into_iter()
                        .map(|child| self.copy_act(child, framer, Some(id)))
                        .collect::<std::result::Result<_, _>>()?,
                ),
                other => other,
            };
            remapped.insert(key, arg);
        }
        self.acts[id.0].parms = remapped;
        Ok(id)
    }
}
