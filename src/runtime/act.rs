//! Action descriptors
//!
//! An `Act` is the compiled, frame-scoped record of one action. It starts out
//! naming its behavior and frame by string and is bound exactly once by
//! `Runtime::resolve_act`, after which it holds the behavior instance and the
//! fully wired parameters.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::sync::Arc;

use super::behavior::Behavior;
use super::error::{CloneErrorKind, CloneError, Diagnostic};
use super::hierarchy::{ActId, Context, FrameId, FramerId};
use super::store::ShareId;

/// Parameter value passed to a behavior
#[derive(Debug, Clone, PartialEq)]
pub enum Arg {
    /// Plain data
    Value(Value),
    /// Sub-descriptor
    Act(ActId),
    /// Ordered sub-descriptors, e.g. guard conditions
    Acts(Vec<ActId>),
    /// Store value record
    Share(ShareId),
    /// Store namespace path
    Node(String),
    /// Resolved frame
    Frame(FrameId),
    /// Resolved framer
    Framer(FramerId),
}

impl Arg {
    /// String payload of a plain value
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Arg::Value(Value::String(text)) => Some(text),
            _ => None,
        }
    }

    /// Plain value payload
    pub fn as_value(&self) -> Option<&Value> {
        match self {
            Arg::Value(value) => Some(value),
            _ => None,
        }
    }

    /// Share handle payload
    pub fn as_share(&self) -> Option<&ShareId> {
        match self {
            Arg::Share(share) => Some(share),
            _ => None,
        }
    }

    /// Sub-descriptors held by this argument
    pub fn sub_acts(&self) -> &[ActId] {
        match self {
            Arg::Act(act) => std::slice::from_ref(act),
            Arg::Acts(acts) => acts,
            _ => &[],
        }
    }
}

impl From<Value> for Arg {
    fn from(value: Value) -> Self {
        Arg::Value(value)
    }
}

impl From<&str> for Arg {
    fn from(text: &str) -> Self {
        Arg::Value(Value::String(text.to_string()))
    }
}

/// Ordered parameter map
pub type Args = IndexMap<String, Arg>;

/// Convert a JSON object into parameters
pub fn args_from(map: &Map<String, Value>) -> Args {
    map.iter()
        .map(|(key, value)| (key.clone(), Arg::Value(value.clone())))
        .collect()
}

/// Frame link of a descriptor
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FrameRef {
    /// Frame name within the owning framer
    Name(String),
    /// Resolved frame
    Id(FrameId),
}

/// Behavior link of a descriptor
#[derive(Clone)]
pub enum Actor {
    /// Registrar name, not yet bound
    Named(String),
    /// Bound behavior instance
    Bound(Arc<dyn Behavior>),
}

impl fmt::Debug for Actor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Actor::Named(name) => f.debug_tuple("Named").field(name).finish(),
            Actor::Bound(behavior) => f.debug_tuple("Bound").field(&behavior.name()).finish(),
        }
    }
}

/// One-time copy of share fields into a descriptor's initializers
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Preref {
    /// Source share path
    pub path: String,
    /// Source field names
    pub fields: Vec<String>,
    /// Destination keys, one per source field; defaults to the field names
    #[serde(default)]
    pub keys: Option<Vec<String>>,
}

/// Pre-references grouped by destination
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Prerefs {
    /// Copied into construction initializers
    pub inits: Vec<Preref>,
    /// Copied into I/O-initializers
    pub ioinits: Vec<Preref>,
    /// Copied into parameters
    pub parms: Vec<Preref>,
}

/// Action descriptor
#[derive(Debug, Clone)]
pub struct Act {
    /// Owning framer
    pub framer: Option<FramerId>,
    /// Owning frame
    pub frame: FrameRef,
    /// Scheduling context within the frame
    pub context: Option<Context>,
    /// Enclosing descriptor for sub-clauses
    pub enclosing: Option<ActId>,
    /// Behavior link
    pub actor: Actor,
    /// Call parameters
    pub parms: Args,
    /// Construction initializers
    pub inits: Option<Map<String, Value>>,
    /// I/O-initializers
    pub ioinits: Option<Map<String, Value>>,
    /// Pre-references
    pub prerefs: Option<Prerefs>,
    /// Source text for diagnostics
    pub human: String,
    /// Source line count for diagnostics
    pub count: usize,
}

impl Act {
    /// Create an unbound descriptor for the named behavior
    pub fn new(behavior: impl Into<String>) -> Self {
        let behavior = behavior.into();
        Self {
            framer: None,
            frame: FrameRef::Name(String::new()),
            context: None,
            enclosing: None,
            human: behavior.clone(),
            actor: Actor::Named(behavior),
            parms: Args::new(),
            inits: None,
            ioinits: None,
            prerefs: None,
            count: 0,
        }
    }

    /// Create a descriptor already bound to a behavior instance
    pub fn bound(behavior: Arc<dyn Behavior>, framer: FramerId, frame: FrameId) -> Self {
        let mut act = Self::new(behavior.name());
        act.actor = Actor::Bound(behavior);
        act.framer = Some(framer);
        act.frame = FrameRef::Id(frame);
        act
    }

    /// Set a parameter
    pub fn with_parm(mut self, key: impl Into<String>, value: impl Into<Arg>) -> Self {
        self.parms.insert(key.into(), value.into());
        self
    }

    /// Set parameters from a JSON object; non-objects are ignored
    pub fn with_parms(mut self, parms: Value) -> Self {
        if let Value::Object(map) = parms {
            self.parms.extend(args_from(&map));
        }
        self
    }

    /// Set construction initializers
    pub fn with_inits(mut self, inits: Value) -> Self {
        self.inits = inits.as_object().cloned();
        self
    }

    /// Set I/O-initializers
    pub fn with_ioinits(mut self, ioinits: Value) -> Self {
        self.ioinits = ioinits.as_object().cloned();
        self
    }

    /// Set pre-references
    pub fn with_prerefs(mut self, prerefs: Prerefs) -> Self {
        self.prerefs = Some(prerefs);
        self
    }

    /// Set diagnostic source text and line count
    pub fn with_human(mut self, human: impl Into<String>, count: usize) -> Self {
        self.human = human.into();
        self.count = count;
        self
    }

    /// Whether the behavior has been bound
    pub fn is_bound(&self) -> bool {
        matches!(self.actor, Actor::Bound(_))
    }

    /// The bound behavior, if any
    pub fn behavior(&self) -> Option<&Arc<dyn Behavior>> {
        match &self.actor {
            Actor::Bound(behavior) => Some(behavior),
            Actor::Named(_) => None,
        }
    }

    /// Resolved frame, if the frame link has been resolved
    pub fn frame_id(&self) -> Option<FrameId> {
        match self.frame {
            FrameRef::Id(id) => Some(id),
            FrameRef::Name(_) => None,
        }
    }

    /// Diagnostic context for errors about this descriptor
    pub fn diagnostic(&self, id: ActId) -> Diagnostic {
        Diagnostic::new(self.human.clone(), self.count, Some(id))
    }

    /// Copy an unbound definition into another framer.
    ///
    /// Sub-descriptor ids in the parameters are copied as-is and must be
    /// remapped by the caller.
    pub fn clone_unresolved(&self, id: ActId, framer: FramerId) -> Result<Act, CloneError> {
        let diag = self.diagnostic(id);
        if let Actor::Bound(behavior) = &self.actor {
            return Err(diag.clone_error(CloneErrorKind::Behavior, behavior.name()));
        }
        if let FrameRef::Id(frame) = self.frame {
            return Err(diag.clone_error(CloneErrorKind::FrameLink, frame));
        }
        let mut copy = self.clone();
        copy.framer = Some(framer);
        Ok(copy)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_keeps_absent_distinct_from_empty() {
        let act = Act::new("print").with_inits(json!({}));
        assert_eq!(act.inits, Some(Map::new()));
        assert_eq!(act.ioinits, None);
        assert!(!act.is_bound());
    }

    #[test]
    fn test_parms_preserve_insertion_order() {
        let act = Act::new("go")
            .with_parm("near", "me")
            .with_parms(json!({"far": "next", "alpha": 1}));
        let keys: Vec<_> = act.parms.keys().cloned().collect();
        assert_eq!(keys, vec!["near", "far", "alpha"]);
    }

    #[test]
    fn test_clone_rejects_resolved_frame_link() {
        let mut act = Act::new("print");
        act.frame = FrameRef::Id(FrameId(3));
        let err = act.clone_unresolved(ActId(0), FramerId(1)).unwrap_err();
        assert_eq!(err.kind, CloneErrorKind::FrameLink);
    }
}
