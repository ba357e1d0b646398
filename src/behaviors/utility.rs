//! Printer, marker, completion setter and guard conditions

use serde::Deserialize;
use serde_json::Value;
use std::cmp::Ordering;
use tracing::info;

use crate::runtime::act::{Arg, Args};
use crate::runtime::behavior::{Behavior, Call, Construction, Outcome, ResolveScope};
use crate::runtime::error::{ResolveErrorKind, Result};
use crate::runtime::hierarchy::FramerId;
use crate::runtime::store::ShareId;
use crate::runtime::Runtime;

/// Logs its `message` parameter.
#[derive(Debug, Clone)]
pub struct Printer {
    name: String,
}

impl Printer {
    /// Create a printer
    pub fn new(name: String) -> Self {
        Self { name }
    }
}

impl Behavior for Printer {
    fn name(&self) -> &str {
        &self.name
    }

    fn act(&self, _runtime: &mut Runtime, call: &Call<'_>) -> Result<Outcome> {
        match call.parm("message") {
            Some(Arg::Value(Value::String(text))) => info!(actor = %self.name, "{text}"),
            Some(Arg::Value(value)) => info!(actor = %self.name, "{value}"),
            Some(other) => info!(actor = %self.name, "{other:?}"),
            None => info!(actor = %self.name, ""),
        }
        Ok(Outcome::Continue)
    }
}

/// What a marker records
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkKind {
    /// The share's update stamp
    #[default]
    Update,
    /// A copy of the share's fields
    Change,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct MarkInits {
    name: String,
    #[serde(default)]
    kind: MarkKind,
}

/// Records the state of a share in the mark kept for the current frame.
///
/// Wired through fields rather than parameters: the `share` I/O-initializer
/// binds the share to mark.
#[derive(Debug, Clone)]
pub struct Marker {
    name: String,
    kind: MarkKind,
    share: Option<ShareId>,
}

impl Marker {
    /// Build a marker from its initializers
    pub fn new(construction: &Construction) -> Result<Self> {
        let MarkInits { name, kind } = construction.parse()?;
        Ok(Self {
            name,
            kind,
            share: None,
        })
    }
}

impl Behavior for Marker {
    fn name(&self) -> &str {
        &self.name
    }

    fn parametric(&self) -> bool {
        false
    }

    fn has_field(&self, key: &str) -> bool {
        match key {
            "name" | "kind" => true,
            "share" => self.share.is_some(),
            _ => false,
        }
    }

    fn bind_field(&mut self, key: &str, arg: Arg) {
        if let ("share", Arg::Share(share)) = (key, arg) {
            self.share = Some(share);
        }
    }

    fn resolve(&mut self, scope: &mut ResolveScope<'_>, _parms: &mut Args) -> Result<()> {
        if self.share.is_none() {
            return Err(scope.error(ResolveErrorKind::InvalidTarget, "share").into());
        }
        Ok(())
    }

    fn act(&self, runtime: &mut Runtime, call: &Call<'_>) -> Result<Outcome> {
        let frame = runtime.hierarchy.frame(call.frame).name.clone();
        let Some(share) = self.share.as_ref().and_then(|id| runtime.store.get_mut(id)) else {
            return Ok(Outcome::Continue);
        };
        let stamp = share.stamp;
        let data = share.fields.clone();
        let mark = share.marks.entry(frame).or_default();
        match self.kind {
            MarkKind::Update => mark.stamp = stamp,
            MarkKind::Change => mark.data = Some(data),
        }
        Ok(Outcome::Continue)
    }

    fn expose(&self) -> Value {
        serde_json::json!({
            "name": self.name,
            "kind": format!("{:?}", self.kind).to_lowercase(),
            "share": self.share.as_ref().map(ShareId::as_str),
        })
    }
}

/// Marks framers as finished.
///
/// `targets` is a framer name or a list of them; `me` is the owning framer.
#[derive(Debug, Clone)]
pub struct Done {
    name: String,
    targets: Vec<FramerId>,
}

impl Done {
    /// Create an unresolved completion setter
    pub fn new(name: String) -> Self {
        Self {
            name,
            targets: Vec::new(),
        }
    }
}

impl Behavior for Done {
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve(&mut self, scope: &mut ResolveScope<'_>, parms: &mut Args) -> Result<()> {
        let names: Vec<String> = match parms.get("targets") {
            None => vec!["me".to_string()],
            Some(Arg::Value(Value::String(name))) => vec![name.clone()],
            Some(Arg::Value(Value::Array(names))) => names
                .iter()
                .map(|name| {
                    name.as_str()
                        .map(str::to_string)
                        .ok_or_else(|| scope.error(ResolveErrorKind::InvalidTarget, name))
                })
                .collect::<std::result::Result<_, _>>()?,
            Some(other) => {
                return Err(scope
                    .error(ResolveErrorKind::InvalidTarget, format!("{other:?}"))
                    .into());
            }
        };
        self.targets = names
            .iter()
            .map(|name| scope.framer_named(name))
            .collect::<std::result::Result<_, _>>()?;
        Ok(())
    }

    fn act(&self, runtime: &mut Runtime, _call: &Call<'_>) -> Result<Outcome> {
        for &target in &self.targets {
            let framer = runtime.hierarchy.framer_mut(target);
            framer.done = true;
            info!(actor = %self.name, framer = %framer.name, "done");
        }
        Ok(Outcome::Continue)
    }
}

/// Guard with a fixed result
#[derive(Debug, Clone)]
pub struct Constant {
    name: String,
    truth: bool,
}

impl Constant {
    /// Create a guard that always returns `truth`
    pub fn new(name: String, truth: bool) -> Self {
        Self { name, truth }
    }
}

impl Behavior for Constant {
    fn name(&self) -> &str {
        &self.name
    }

    fn act(&self, _runtime: &mut Runtime, _call: &Call<'_>) -> Result<Outcome> {
        Ok(Outcome::Truth(self.truth))
    }
}

/// Bind the `share` parameter, resolving a path string relative to the actor
fn share_parm(scope: &mut ResolveScope<'_>, parms: &mut Args, actor: &str) -> Result<ShareId> {
    let path = match parms.get("share") {
        Some(Arg::Share(share)) => return Ok(share.clone()),
        Some(Arg::Value(Value::String(path))) => path.clone(),
        other => {
            return Err(scope
                .error(ResolveErrorKind::InvalidTarget, format!("share={other:?}"))
                .into());
        }
    };
    let share = scope.share(&path, actor)?;
    parms.insert("share".to_string(), Arg::Share(share.clone()));
    Ok(share)
}

/// Comparison applied by `need.compare`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparator {
    /// `==`
    Eq,
    /// `!=`
    Ne,
    /// `<`
    Lt,
    /// `<=`
    Le,
    /// `>`
    Gt,
    /// `>=`
    Ge,
}

impl Comparator {
    /// Parse a comparison operator
    pub fn parse(text: &str) -> Option<Self> {
        Some(match text {
            "==" => Comparator::Eq,
            "!=" => Comparator::Ne,
            "<" => Comparator::Lt,
            "<=" => Comparator::Le,
            ">" => Comparator::Gt,
            ">=" => Comparator::Ge,
            _ => return None,
        })
    }

    /// Apply the comparison. Ordering comparisons need two numbers or two
    /// strings and are false otherwise.
    pub fn compare(self, left: &Value, right: &Value) -> bool {
        let ordering = || match (left, right) {
            (Value::Number(a), Value::Number(b)) => {
                a.as_f64().zip(b.as_f64()).and_then(|(a, b)| a.partial_cmp(&b))
            }
            (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
            _ => None,
        };
        match self {
            Comparator::Eq => left == right,
            Comparator::Ne => left != right,
            Comparator::Lt => ordering() == Some(Ordering::Less),
            Comparator::Le => matches!(ordering(), Some(Ordering::Less | Ordering::Equal)),
            Comparator::Gt => ordering() == Some(Ordering::Greater),
            Comparator::Ge => matches!(ordering(), Some(Ordering::Greater | Ordering::Equal)),
        }
    }
}

/// Compares a share field against `goal`
#[derive(Debug, Clone)]
pub struct Compare {
    name: String,
    comparator: Comparator,
}

impl Compare {
    /// Create an unresolved comparison guard
    pub fn new(name: String) -> Self {
        Self {
            name,
            comparator: Comparator::Eq,
        }
    }
}

impl Behavior for Compare {
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve(&mut self, scope: &mut ResolveScope<'_>, parms: &mut Args) -> Result<()> {
        let comparator = scope.text_parm(parms, "comparator", "==")?;
        self.comparator = Comparator::parse(comparator)
            .ok_or_else(|| scope.error(ResolveErrorKind::InvalidTarget, comparator))?;
        scope.text_parm(parms, "field", "value")?;
        share_parm(scope, parms, &self.name)?;
        Ok(())
    }

    fn act(&self, runtime: &mut Runtime, call: &Call<'_>) -> Result<Outcome> {
        let field = call.parm("field").and_then(Arg::as_str).unwrap_or("value");
        let goal = call.parm("goal").and_then(Arg::as_value).cloned().unwrap_or(Value::Null);
        let current = call
            .share("share")
            .and_then(|share| runtime.store.get(share))
            .and_then(|share| share.get(field));
        Ok(Outcome::Truth(
            current.is_some_and(|current| self.comparator.compare(current, &goal)),
        ))
    }
}

/// Which mark comparison a `MarkNeed` makes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum MarkTest {
    Updated,
    Changed,
}

/// Compares a share against the mark recorded for the current frame.
///
/// `need.updated` holds once the share was updated after its stamp was
/// marked; `need.changed` holds once its fields differ from the marked copy.
/// Without a mark neither holds.
#[derive(Debug, Clone)]
pub struct MarkNeed {
    name: String,
    test: MarkTest,
}

impl MarkNeed {
    /// Guard on share updates since the frame's mark
    pub fn updated(name: String) -> Self {
        Self {
            name,
            test: MarkTest::Updated,
        }
    }

    /// Guard on share changes since the frame's mark
    pub fn changed(name: String) -> Self {
        Self {
            name,
            test: MarkTest::Changed,
        }
    }
}

impl Behavior for MarkNeed {
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve(&mut self, scope: &mut ResolveScope<'_>, parms: &mut Args) -> Result<()> {
        share_parm(scope, parms, &self.name)?;
        Ok(())
    }

    fn act(&self, runtime: &mut Runtime, call: &Call<'_>) -> Result<Outcome> {
        let frame = &runtime.hierarchy.frame(call.frame).name;
        let Some(share) = call.share("share").and_then(|share| runtime.store.get(share)) else {
            return Ok(Outcome::Truth(false));
        };
        let Some(mark) = share.marks.get(frame) else {
            return Ok(Outcome::Truth(false));
        };
        let truth = match self.test {
            MarkTest::Updated => match (share.stamp, mark.stamp) {
                (Some(stamp), Some(marked)) => stamp > marked,
                (Some(_), None) => true,
                (None, _) => false,
            },
            MarkTest::Changed => mark.data.as_ref().is_some_and(|data| *data != share.fields),
        };
        Ok(Outcome::Truth(truth))
    }
}

/// Holds when the `framer` parameter's framer is done
#[derive(Debug, Clone)]
pub struct DoneNeed {
    name: String,
}

impl DoneNeed {
    /// Create an unresolved completion guard
    pub fn new(name: String) -> Self {
        Self { name }
    }
}

impl Behavior for DoneNeed {
    fn name(&self) -> &str {
        &self.name
    }

    fn resolve(&mut self, scope: &mut ResolveScope<'_>, parms: &mut Args) -> Result<()> {
        let framer = scope.text_parm(parms, "framer", "me")?.to_string();
        let framer = scope.framer_named(&framer)?;
        parms.insert("framer".to_string(), Arg::Framer(framer));
        Ok(())
    }

    fn act(&self, runtime: &mut Runtime, call: &Call<'_>) -> Result<Outcome> {
        let done = call
            .framer_parm("framer")
            .is_some_and(|framer| runtime.hierarchy.framer(framer).done);
        Ok(Outcome::Truth(done))
    }
}
