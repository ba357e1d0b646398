//! Behaviors and the I/O-initializer hookup
//!
//! A behavior is the callable unit of work a descriptor binds to. It is
//! runnable (`act`), resolvable (`resolve`, plus field wiring for behaviors
//! that are not parameter driven) and exposable (`expose`). Behaviors are
//! shared through `Arc` once bound so the runner can invoke them while it
//! holds the runtime mutably.

use serde::de::DeserializeOwned;
use serde_json::{Map, Value, json};

use super::Runtime;
use super::act::{Arg, Args};
use super::error::{
    Diagnostic, InitError, InitErrorKind, ResolveError, ResolveErrorKind, Result,
};
use super::hierarchy::{ActId, FrameId, FramerId};
use super::path::{Initial, PathScope, resolve_path};
use super::resolve::path_scope;
use super::store::{SEPARATOR, ShareId, Store};

/// Capability tag the runner switches on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BehaviorKind {
    /// Return value never changes scheduling
    Plain,
    /// Return value may transition or suspend the owning framer
    Interrupter,
}

/// Result of running a behavior once
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// Nothing to report
    Continue,
    /// Condition result
    Truth(bool),
    /// Control moved to this frame
    Transit(FrameId),
    /// Host suspended while this auxiliary runs
    Suspend(FramerId),
}

impl Outcome {
    /// Whether the outcome satisfies a guard
    pub fn holds(&self) -> bool {
        match self {
            Outcome::Truth(truth) => *truth,
            Outcome::Transit(_) | Outcome::Suspend(_) => true,
            Outcome::Continue => false,
        }
    }
}

/// Everything a factory needs to build a behavior instance
#[derive(Debug, Clone)]
pub struct Construction {
    /// Actor name (the `name` initializer)
    pub name: String,
    /// Effective initializers, `name` included
    pub inits: Map<String, Value>,
    /// Owning framer
    pub framer: FramerId,
    /// Owning frame
    pub frame: FrameId,
    /// Location for error reporting
    pub diag: Diagnostic,
}

impl Construction {
    /// Deserialize the initializers into a typed struct.
    ///
    /// Unknown keys surface as `InitErrorKind::UnhandledKey` when the target
    /// denies unknown fields.
    pub fn parse<T: DeserializeOwned>(&self) -> std::result::Result<T, InitError> {
        serde_json::from_value(Value::Object(self.inits.clone())).map_err(|err| {
            let text = err.to_string();
            let kind = if text.starts_with("unknown field") {
                InitErrorKind::UnhandledKey
            } else {
                InitErrorKind::InvalidValue
            };
            self.diag.init(kind, text)
        })
    }
}

/// One invocation of a bound descriptor
#[derive(Debug, Clone, Copy)]
pub struct Call<'a> {
    /// Descriptor being run
    pub act: ActId,
    /// Owning framer
    pub framer: FramerId,
    /// Owning frame
    pub frame: FrameId,
    /// Resolved parameters
    pub parms: &'a Args,
}

impl Call<'_> {
    /// A parameter by name
    pub fn parm(&self, key: &str) -> Option<&Arg> {
        self.parms.get(key)
    }

    /// A resolved frame parameter
    pub fn frame_parm(&self, key: &str) -> Option<FrameId> {
        match self.parms.get(key) {
            Some(Arg::Frame(frame)) => Some(*frame),
            _ => None,
        }
    }

    /// A resolved framer parameter
    pub fn framer_parm(&self, key: &str) -> Option<FramerId> {
        match self.parms.get(key) {
            Some(Arg::Framer(framer)) => Some(*framer),
            _ => None,
        }
    }

    /// A share parameter
    pub fn share(&self, key: &str) -> Option<&ShareId> {
        self.parms.get(key).and_then(Arg::as_share)
    }

    /// Guard sub-descriptors
    pub fn needs(&self) -> &[ActId] {
        self.parms.get("needs").map(Arg::sub_acts).unwrap_or(&[])
    }
}

/// Context handed to a behavior's resolve hook
pub struct ResolveScope<'a> {
    /// The runtime being resolved against
    pub runtime: &'a mut Runtime,
    /// Descriptor being resolved
    pub act: ActId,
    /// Owning framer
    pub framer: FramerId,
    /// Owning frame
    pub frame: FrameId,
    /// Location for error reporting
    pub diag: Diagnostic,
}

impl ResolveScope<'_> {
    /// Build a resolve error for this descriptor
    pub fn error(&self, kind: ResolveErrorKind, value: impl ToString) -> ResolveError {
        self.diag.resolve(kind, value)
    }

    /// Resolve a frame named within the owning framer; `me` is the owning frame
    pub fn frame_named(&self, name: &str) -> std::result::Result<FrameId, ResolveError> {
        if name == "me" {
            return Ok(self.frame);
        }
        self.runtime
            .hierarchy
            .framer(self.framer)
            .frame_named(name)
            .ok_or_else(|| self.error(ResolveErrorKind::MissingFrame, name))
    }

    /// Resolve a framer by its global name; `me` is the owning framer
    pub fn framer_named(&self, name: &str) -> std::result::Result<FramerId, ResolveError> {
        if name == "me" {
            return Ok(self.framer);
        }
        self.runtime
            .hierarchy
            .framer_named(name)
            .ok_or_else(|| self.error(ResolveErrorKind::MissingFramer, name))
    }

    /// Resolve a share path relative to this descriptor and the named actor
    pub fn share(&mut self, path: &str, actor: &str) -> std::result::Result<ShareId, ResolveError> {
        let runtime = &mut *self.runtime;
        let scope = path_scope(&runtime.hierarchy, self.framer, Some(self.frame), Some(actor));
        match resolve_path(&mut runtime.store, path, &scope, None, &self.diag)? {
            Arg::Share(share) => Ok(share),
            _ => Err(self.diag.resolve(ResolveErrorKind::InvalidPath, path)),
        }
    }

    /// Read a string parameter, falling back to `default`
    pub fn text_parm<'p>(
        &self,
        parms: &'p Args,
        key: &str,
        default: &'p str,
    ) -> std::result::Result<&'p str, ResolveError> {
        match parms.get(key) {
            None => Ok(default),
            Some(arg) => arg
                .as_str()
                .ok_or_else(|| self.error(ResolveErrorKind::InvalidTarget, format!("{key}={arg:?}"))),
        }
    }
}

/// A bound unit of work
pub trait Behavior: Send + Sync {
    /// Actor name
    fn name(&self) -> &str;

    /// Scheduling capability
    fn kind(&self) -> BehaviorKind {
        BehaviorKind::Plain
    }

    /// Whether I/O hookups fold into parameters (true) or instance fields
    fn parametric(&self) -> bool {
        true
    }

    /// Whether the instance already has a field with this name
    fn has_field(&self, _key: &str) -> bool {
        false
    }

    /// Wire an I/O hookup into an instance field
    fn bind_field(&mut self, _key: &str, _arg: Arg) {}

    /// Finalize hook called once all parameters are wired
    fn resolve(&mut self, _scope: &mut ResolveScope<'_>, _parms: &mut Args) -> Result<()> {
        Ok(())
    }

    /// Run once
    fn act(&self, runtime: &mut Runtime, call: &Call<'_>) -> Result<Outcome>;

    /// Summary for inspection
    fn expose(&self) -> Value {
        json!({
            "name": self.name(),
            "interrupter": self.kind() == BehaviorKind::Interrupter,
            "parametric": self.parametric(),
        })
    }
}

/// Parsed I/O-initializer entry
#[derive(Debug, Clone, Default, PartialEq)]
struct IoInit {
    path: Option<String>,
    value: Option<Value>,
    own: bool,
}

impl IoInit {
    fn parse(entry: &Value, diag: &Diagnostic) -> std::result::Result<Self, InitError> {
        match entry {
            Value::String(path) => Ok(Self {
                path: Some(path.clone()).filter(|path| !path.is_empty()),
                ..Self::default()
            }),
            Value::Object(map) => {
                let mut ioinit = Self::default();
                for (key, value) in map {
                    match (key.as_str(), value) {
                        ("path", Value::String(path)) => {
                            ioinit.path = Some(path.clone()).filter(|path| !path.is_empty());
                        }
                        ("value", Value::Null) => {}
                        ("value", value) => ioinit.value = Some(value.clone()),
                        ("own", Value::Bool(own)) => ioinit.own = *own,
                        ("path" | "own", other) => {
                            return Err(diag.init(InitErrorKind::InvalidValue, format!("{key}={other}")));
                        }
                        (other, _) => return Err(diag.init(InitErrorKind::UnhandledKey, other)),
                    }
                }
                Ok(ioinit)
            }
            other => Err(diag.init(InitErrorKind::MalformedIoInit, other)),
        }
    }

    fn initial(&self) -> Option<Initial> {
        let fields = match self.value.as_ref()? {
            Value::Object(fields) if !fields.is_empty() => fields.clone(),
            other => {
                let mut fields = Map::new();
                fields.insert("value".to_string(), other.clone());
                fields
            }
        };
        Some(Initial {
            fields,
            own: self.own,
        })
    }
}

/// Turn I/O-initializers into store handles.
///
/// Each entry is a path string or an object with optional `path`, `value`
/// and `own` keys. Entries without a path land under the `inode` namespace,
/// which defaults to `default_inode` and is always returned as the `inode`
/// entry.
pub fn hookup(
    store: &mut Store,
    ioinits: &Map<String, Value>,
    scope: &PathScope<'_>,
    default_inode: &str,
    diag: &Diagnostic,
) -> Result<Args> {
    let mut inode = match ioinits.get("inode") {
        None => default_inode.to_string(),
        Some(Value::String(path)) => path.clone(),
        Some(other) => return Err(diag.init(InitErrorKind::MalformedIoInit, other).into()),
    };
    if !inode.ends_with(SEPARATOR) {
        inode.push(SEPARATOR);
    }
    let inode = resolve_path(store, &inode, scope, None, diag)?;
    let base = match &inode {
        Arg::Node(base) => base.clone(),
        other => return Err(diag.resolve(ResolveErrorKind::InvalidPath, format!("{other:?}")).into()),
    };

    let mut iois = Args::new();
    for (key, entry) in ioinits {
        if key == "inode" {
            continue;
        }
        let ioinit = IoInit::parse(entry, diag)?;
        let path = ioinit
            .path
            .clone()
            .unwrap_or_else(|| format!("{SEPARATOR}{base}{key}"));
        let arg = resolve_path(store, &path, scope, ioinit.initial().as_ref(), diag)?;
        iois.insert(key.clone(), arg);
    }
    iois.insert("inode".to_string(), inode);
    Ok(iois)
}
