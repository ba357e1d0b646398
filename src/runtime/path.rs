//! Store path parsing and relative addressing
//!
//! A path that starts with the separator is absolute and used verbatim.
//! Anything else may open with lexically nested `framer.me|main`,
//! `frame.me|main` and `actor.me` prefixes that are substituted at resolve
//! time with the names of the resolving framer, frame and actor. Because the
//! substitution happens when a descriptor is bound rather than when it is
//! authored, a cloned framer's acts address their own data with the same
//! path text as the template they were copied from.

use serde_json::{Map, Value};
use std::fmt;
use tracing::warn;

use super::act::Arg;
use super::error::{Diagnostic, ResolveError, ResolveErrorKind};
use super::store::{SEPARATOR, Store};

/// One element of a parsed store path
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    /// Verbatim path component
    Literal(String),
    /// `framer.me`: the resolving framer
    FramerMe,
    /// `framer.main`: the framer owning the resolving framer's main frame
    FramerMain,
    /// `frame.me`: the resolving frame
    FrameMe,
    /// `frame.main`: the resolving framer's main frame
    FrameMain,
    /// `actor.me`: the resolving behavior
    ActorMe,
}

/// Parsed store path
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StorePath {
    /// Path began with the separator
    pub absolute: bool,
    /// Path ended with the separator and denotes a namespace node
    pub namespace: bool,
    /// Path elements
    pub segments: Vec<Segment>,
}

/// Main-frame context of a framer owned by a host frame
#[derive(Debug, Clone, Copy)]
pub struct MainScope<'a> {
    /// Name of the framer that owns the main frame
    pub framer: &'a str,
    /// Name of the main frame
    pub frame: &'a str,
}

/// Names substituted into relative paths
#[derive(Debug, Clone, Copy)]
pub struct PathScope<'a> {
    /// Resolving framer
    pub framer: &'a str,
    /// Resolving frame, if any
    pub frame: Option<&'a str>,
    /// Resolving actor, once named
    pub actor: Option<&'a str>,
    /// Main frame of the resolving framer, if owned
    pub main: Option<MainScope<'a>>,
}

/// Initial value applied to a share when it is resolved
#[derive(Debug, Clone, PartialEq)]
pub struct Initial {
    /// Field initializers
    pub fields: Map<String, Value>,
    /// Merge into existing values rather than only filling absent fields
    pub own: bool,
}

fn pair(parts: &[&str], at: usize, head: &str) -> Option<bool> {
    match (parts.get(at), parts.get(at + 1)) {
        (Some(h), Some(&"me")) if *h == head => Some(false),
        (Some(h), Some(&"main")) if *h == head => Some(true),
        _ => None,
    }
}

impl StorePath {
    /// Parse path text. Returns `None` for empty paths or empty components.
    pub fn parse(text: &str) -> Option<Self> {
        let absolute = text.starts_with(SEPARATOR);
        let body = text.strip_prefix(SEPARATOR).unwrap_or(text);
        let namespace = body.ends_with(SEPARATOR);
        let body = body.strip_suffix(SEPARATOR).unwrap_or(body);
        if body.is_empty() {
            return None;
        }
        let parts: Vec<&str> = body.split(SEPARATOR).collect();
        if parts.iter().any(|part| part.is_empty()) {
            return None;
        }

        let mut segments = Vec::new();
        let mut at = 0;
        if !absolute {
            let framer = pair(&parts, at, "framer");
            if framer.is_some() {
                at += 2;
            }
            let mut frame = pair(&parts, at, "frame");
            if frame.is_some() {
                at += 2;
            }
            let actor = pair(&parts, at, "actor") == Some(false);
            if actor {
                at += 2;
                // actor.me alone implies the frame of the same framer
                frame = frame.or(Some(framer == Some(true)));
            }

            match (framer, frame) {
                (Some(true), _) => segments.push(Segment::FramerMain),
                (Some(false), _) | (None, Some(_)) => segments.push(Segment::FramerMe),
                (None, None) => {}
            }
            match frame {
                Some(true) => segments.push(Segment::FrameMain),
                Some(false) => segments.push(Segment::FrameMe),
                None => {}
            }
            if actor {
                segments.push(Segment::ActorMe);
            }
        }
        segments.extend(parts[at..].iter().map(|part| Segment::Literal(part.to_string())));

        Some(Self {
            absolute,
            namespace,
            segments,
        })
    }

    /// Substitute the relative segments and produce a canonical store path
    pub fn render(&self, scope: &PathScope<'_>, diag: &Diagnostic) -> Result<String, ResolveError> {
        let mut parts: Vec<&str> = Vec::with_capacity(self.segments.len() * 2);
        for segment in &self.segments {
            match segment {
                Segment::Literal(text) => parts.push(text),
                Segment::FramerMe => parts.extend(["framer", scope.framer]),
                Segment::FramerMain => {
                    let main = scope
                        .main
                        .ok_or_else(|| diag.resolve(ResolveErrorKind::MissingMain, self))?;
                    parts.extend(["framer", main.framer]);
                }
                Segment::FrameMe => {
                    let frame = scope
                        .frame
                        .ok_or_else(|| diag.resolve(ResolveErrorKind::MissingFrame, self))?;
                    parts.extend(["frame", frame]);
                }
                Segment::FrameMain => {
                    let main = scope
                        .main
                        .ok_or_else(|| diag.resolve(ResolveErrorKind::MissingMain, self))?;
                    parts.extend(["frame", main.frame]);
                }
                Segment::ActorMe => {
                    let actor = scope
                        .actor
                        .ok_or_else(|| diag.resolve(ResolveErrorKind::UnresolvedActor, self))?;
                    parts.extend(["actor", actor]);
                }
            }
        }

        let mut rendered = parts.join(".");
        if self.namespace {
            rendered.push(SEPARATOR);
        }
        Ok(rendered)
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.absolute {
            write!(f, "{SEPARATOR}")?;
        }
        let parts: Vec<&str> = self
            .segments
            .iter()
            .map(|segment| match segment {
                Segment::Literal(text) => text.as_str(),
                Segment::FramerMe => "framer.me",
                Segment::FramerMain => "framer.main",
                Segment::FrameMe => "frame.me",
                Segment::FrameMain => "frame.main",
                Segment::ActorMe => "actor.me",
            })
            .collect();
        write!(f, "{}", parts.join("."))?;
        if self.namespace {
            write!(f, "{SEPARATOR}")?;
        }
        Ok(())
    }
}

/// Resolve path text into a store handle, creating the share or node.
pub fn resolve_path(
    store: &mut Store,
    text: &str,
    scope: &PathScope<'_>,
    initial: Option<&Initial>,
    diag: &Diagnostic,
) -> Result<Arg, ResolveError> {
    let path = StorePath::parse(text)
        .ok_or_else(|| diag.resolve(ResolveErrorKind::InvalidPath, text))?;
    let rendered = path.render(scope, diag)?;

    if path.namespace {
        let (node, created) = store.create_node(&rendered);
        if created {
            warn!(path = %node, human = %diag.human, "created missing namespace node");
        }
        return Ok(Arg::Node(node));
    }

    let share = store.create(&rendered);
    if let Some(initial) = initial {
        if initial.own {
            store.update(&share, &initial.fields);
        } else {
            store.create_fields(&share, &initial.fields);
        }
    }
    Ok(Arg::Share(share))
}
