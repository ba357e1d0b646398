//! Binding descriptors to behaviors
//!
//! `Runtime::resolve_act` turns a named descriptor into a bound one exactly
//! once. Every lookup and validation happens before the descriptor itself is
//! touched, so a failed resolve leaves it unbound with only its frame link
//! committed.

use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::debug;

use super::Runtime;
use super::act::{Actor, Arg, Args, FrameRef, Preref, args_from};
use super::behavior::{Construction, ResolveScope, hookup};
use super::error::{Diagnostic, InitErrorKind, ResolveErrorKind, Result};
use super::hierarchy::{ActId, FrameId, FramerId, Hierarchy};
use super::path::{MainScope, PathScope, resolve_path};
use super::store::SEPARATOR;

/// Names used to substitute relative store paths for a framer, frame and
/// actor.
pub fn path_scope<'a>(
    hierarchy: &'a Hierarchy,
    framer: FramerId,
    frame: Option<FrameId>,
    actor: Option<&'a str>,
) -> PathScope<'a> {
    let owner = hierarchy.framer(framer);
    let main = owner.main.map(|host| {
        let host = hierarchy.frame(host);
        MainScope {
            framer: hierarchy.framer(host.framer).name.as_str(),
            frame: host.name.as_str(),
        }
    });
    PathScope {
        framer: owner.name.as_str(),
        frame: frame.map(|frame| hierarchy.frame(frame).name.as_str()),
        actor,
        main,
    }
}

impl Runtime {
    /// Bind a descriptor to its behavior and wire its parameters.
    ///
    /// Resolving a bound descriptor only re-checks its frame link and
    /// performs no registry or store lookups.
    pub fn resolve_act(&mut self, id: ActId) -> Result<()> {
        self.inherit_enclosing(id);
        let (framer, frame) = self.resolve_frame_link(id)?;

        let act = self.hierarchy.act(id);
        let name = match &act.actor {
            Actor::Bound(_) => return Ok(()),
            Actor::Named(name) => name.clone(),
        };
        let diag = act.diagnostic(id);
        let declared_inits = act.inits.clone().unwrap_or_default();
        let declared_ioinits = act.ioinits.clone().unwrap_or_default();
        let declared_parms = act.parms.clone();
        let prerefs = act.prerefs.clone().unwrap_or_default();

        let entry = self
            .registry
            .fetch(&name)
            .ok_or_else(|| diag.resolve(ResolveErrorKind::UnknownBehavior, &name))?;

        let mut inits = entry.defaults.inits.clone();
        inits.extend(declared_inits);
        self.copy_prerefs(&mut inits, &prerefs.inits, framer, frame, &diag)?;
        // Default actor names must stay a single path segment
        let actor = match inits
            .entry("name")
            .or_insert_with(|| Value::String(name.replace(SEPARATOR, "_")))
        {
            Value::String(actor) => actor.clone(),
            other => return Err(diag.init(InitErrorKind::InvalidValue, format!("name={other}")).into()),
        };

        let construction = Construction {
            name: actor.clone(),
            inits,
            framer,
            frame,
            diag: diag.clone(),
        };
        let mut behavior = (entry.factory)(&construction)?;

        let mut parms = args_from(&entry.defaults.parms);
        parms.extend(declared_parms);
        let mut preref_parms = Map::new();
        self.copy_prerefs(&mut preref_parms, &prerefs.parms, framer, frame, &diag)?;
        parms.extend(args_from(&preref_parms));

        let mut ioinits = entry.defaults.ioinits.clone();
        ioinits.extend(declared_ioinits);
        self.copy_prerefs(&mut ioinits, &prerefs.ioinits, framer, frame, &diag)?;

        if !ioinits.is_empty() {
            let parametric = behavior.parametric();
            for key in ioinits.keys().filter(|key| *key != "inode") {
                let taken = if parametric {
                    parms.contains_key(key)
                } else {
                    behavior.has_field(key)
                };
                if taken {
                    return Err(diag.resolve(ResolveErrorKind::Collision, key).into());
                }
            }

            let scope = path_scope(&self.hierarchy, framer, Some(frame), Some(&actor));
            let iois = hookup(
                &mut self.store,
                &ioinits,
                &scope,
                &self.config.default_inode,
                &diag,
            )?;
            if parametric {
                parms.extend(iois);
            } else {
                for (key, arg) in iois {
                    behavior.bind_field(&key, arg);
                }
            }
        }

        let children: Vec<ActId> = parms
            .values()
            .flat_map(|arg| arg.sub_acts().iter().copied())
            .collect();
        for child in children {
            self.resolve_act(child)?;
        }

        let mut scope = ResolveScope {
            runtime: self,
            act: id,
            framer,
            frame,
            diag,
        };
        behavior.resolve(&mut scope, &mut parms)?;

        let act = self.hierarchy.act_mut(id);
        act.actor = Actor::Bound(Arc::from(behavior));
        act.parms = parms;
        debug!(act = %id, behavior = %name, actor = %actor, "resolved");
        Ok(())
    }

    fn inherit_enclosing(&mut self, id: ActId) {
        let act = self.hierarchy.act(id);
        let Some(enclosing) = act.enclosing else {
            return;
        };
        if act.frame_id().is_some() {
            return;
        }
        let parent = self.hierarchy.act(enclosing);
        let (frame, context) = (parent.frame.clone(), parent.context);
        let act = self.hierarchy.act_mut(id);
        act.frame = frame;
        act.context = context;
    }

    fn resolve_frame_link(&mut self, id: ActId) -> Result<(FramerId, FrameId)> {
        let act = self.hierarchy.act(id);
        let diag = act.diagnostic(id);
        let framer = act
            .framer
            .ok_or_else(|| diag.resolve(ResolveErrorKind::MissingFramer, &act.human))?;
        let frame = match &act.frame {
            FrameRef::Id(frame) => return Ok((framer, *frame)),
            FrameRef::Name(name) => self
                .hierarchy
                .framer(framer)
                .frame_named(name)
                .ok_or_else(|| diag.resolve(ResolveErrorKind::MissingFrame, name))?,
        };
        self.hierarchy.act_mut(id).frame = FrameRef::Id(frame);
        Ok((framer, frame))
    }

    fn copy_prerefs(
        &mut self,
        target: &mut Map<String, Value>,
        prerefs: &[Preref],
        framer: FramerId,
        frame: FrameId,
        diag: &Diagnostic,
    ) -> Result<()> {
        for preref in prerefs {
            let keys = match &preref.keys {
                Some(keys) if keys.len() != preref.fields.len() => {
                    return Err(diag
                        .resolve(
                            ResolveErrorKind::FieldCount,
                            format!("{} fields, {} keys", preref.fields.len(), keys.len()),
                        )
                        .into());
                }
                Some(keys) => keys,
                None => &preref.fields,
            };

            let scope = path_scope(&self.hierarchy, framer, Some(frame), None);
            let source = match resolve_path(&mut self.store, &preref.path, &scope, None, diag)? {
                Arg::Share(share) => share,
                other => {
                    return Err(diag
                        .resolve(ResolveErrorKind::InvalidPath, format!("{other:?}"))
                        .into());
                }
            };
            let Some(share) = self.store.get(&source) else {
                continue;
            };
            for (field, key) in preref.fields.iter().zip(keys) {
                if let Some(value) = share.get(field) {
                    target.insert(key.clone(), value.clone());
                }
            }
        }
        Ok(())
    }
}

/// Parameters of a bound descriptor, for inspection
pub fn bound_parms(hierarchy: &Hierarchy, id: ActId) -> Option<&Args> {
    let act = hierarchy.act(id);
    act.is_bound().then_some(&act.parms)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runtime::act::{Act, Prerefs};
    use crate::runtime::error::{ResolveError, RuntimeError};
    use crate::runtime::hierarchy::{Context, Schedule};
    use crate::runtime::{BehaviorCatalog, RuntimeConfig};
    use serde_json::json;

    fn runtime() -> (Runtime, FrameId) {
        let registry = BehaviorCatalog::with_builtins().snapshot();
        let mut runtime = Runtime::new(RuntimeConfig::default(), registry);
        let framer = runtime.hierarchy.add_framer("pump", Schedule::Active).unwrap();
        let frame = runtime.hierarchy.add_frame(framer, "idle", None).unwrap();
        (runtime, frame)
    }

    fn kind(err: RuntimeError) -> ResolveErrorKind {
        match err {
            RuntimeError::Resolve(ResolveError { kind, .. }) => kind,
            other => panic!("unexpected error {other}"),
        }
    }

    #[test]
    fn test_unknown_behavior() {
        let (mut runtime, frame) = runtime();
        let act = runtime
            .hierarchy
            .add_act(frame, Context::Recur, Act::new("warp").with_human("warp 9", 4));
        let err = runtime.resolve_act(act).unwrap_err();
        assert_eq!(kind(err), ResolveErrorKind::UnknownBehavior);
        assert!(!runtime.hierarchy.act(act).is_bound());
        assert_eq!(runtime.hierarchy.act(act).frame_id(), Some(frame));
    }

    #[test]
    fn test_missing_frame() {
        let (mut runtime, frame) = runtime();
        let act = runtime.hierarchy.add_act(frame, Context::Recur, Act::new("print"));
        runtime.hierarchy.act_mut(act).frame = FrameRef::Name("nowhere".to_string());
        assert_eq!(kind(runtime.resolve_act(act).unwrap_err()), ResolveErrorKind::MissingFrame);
    }

    #[test]
    fn test_ioinit_collides_with_parm() {
        let (mut runtime, frame) = runtime();
        let act = runtime.hierarchy.add_act(
            frame,
            Context::Recur,
            Act::new("print")
                .with_parm("message", "hi")
                .with_ioinits(json!({"message": ".greeting"})),
        );
        let revision = runtime.store.revision();
        assert_eq!(kind(runtime.resolve_act(act).unwrap_err()), ResolveErrorKind::Collision);
        assert!(!runtime.hierarchy.act(act).is_bound());
        assert!(runtime.store.find("greeting").is_none());
        assert_eq!(runtime.store.revision(), revision);
    }

    #[test]
    fn test_ioinits_fold_into_parms_with_inode() {
        let (mut runtime, frame) = runtime();
        let act = runtime.hierarchy.add_act(
            frame,
            Context::Recur,
            Act::new("print")
                .with_inits(json!({"name": "greeter"}))
                .with_ioinits(json!({"level": {"value": 3}})),
        );
        runtime.resolve_act(act).unwrap();
        let parms = bound_parms(&runtime.hierarchy, act).unwrap();
        let share = runtime
            .store
            .find("framer.pump.frame.idle.actor.greeter.level")
            .unwrap();
        assert_eq!(parms["level"], Arg::Share(share));
        assert_eq!(
            parms["inode"],
            Arg::Node("framer.pump.frame.idle.actor.greeter.".to_string())
        );
    }

    #[test]
    fn test_prerefs_copy_present_fields_only() {
        let (mut runtime, frame) = runtime();
        let source = runtime.store.create(".settings");
        runtime
            .store
            .update(&source, json!({"text": "from store"}).as_object().unwrap());
        let prerefs = Prerefs {
            parms: vec![Preref {
                path: ".settings".to_string(),
                fields: vec!["text".to_string(), "absent".to_string()],
                keys: Some(vec!["message".to_string(), "other".to_string()]),
            }],
            ..Prerefs::default()
        };
        let act = runtime.hierarchy.add_act(
            frame,
            Context::Recur,
            Act::new("print").with_parm("message", "authored").with_prerefs(prerefs),
        );
        runtime.resolve_act(act).unwrap();
        let parms = bound_parms(&runtime.hierarchy, act).unwrap();
        assert_eq!(parms["message"], Arg::from("from store"));
        assert!(!parms.contains_key("other"));
    }

    #[test]
    fn test_preref_key_count_mismatch() {
        let (mut runtime, frame) = runtime();
        let prerefs = Prerefs {
            inits: vec![Preref {
                path: ".settings".to_string(),
                fields: vec!["a".to_string(), "b".to_string()],
                keys: Some(vec!["a".to_string()]),
            }],
            ..Prerefs::default()
        };
        let act = runtime
            .hierarchy
            .add_act(frame, Context::Recur, Act::new("print").with_prerefs(prerefs));
        assert_eq!(kind(runtime.resolve_act(act).unwrap_err()), ResolveErrorKind::FieldCount);
    }

    #[test]
    fn test_sub_acts_inherit_frame_and_context() {
        let (mut runtime, frame) = runtime();
        let go = runtime
            .hierarchy
            .add_act(frame, Context::Precur, Act::new("go").with_parm("far", "me"));
        let need = runtime.hierarchy.add_sub_act(go, "needs", Act::new("need.always"));
        runtime.resolve_act(go).unwrap();
        let need = runtime.hierarchy.act(need);
        assert!(need.is_bound());
        assert_eq!(need.frame_id(), Some(frame));
        assert_eq!(need.context, Some(Context::Precur));
    }
}
