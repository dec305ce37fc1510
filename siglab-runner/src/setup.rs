//! Setup resolution — flattens a nested simulation setup into runnable units.
//!
//! A setup is a tree of mappings and sequences whose leaves are signal series,
//! signal generators or trackers. Resolution walks it depth-first in
//! declaration order and qualifies every unit with its slash-separated path.

use std::fmt;

use serde_json::Value;
use siglab_core::components::{Params, SignalGenerator, Tracker};
use siglab_core::domain::SignalFrame;
use thiserror::Error;
use tracing::warn;

/// One node of a setup tree.
#[derive(Debug)]
pub enum SetupNode {
    Series(SignalFrame),
    Generator(Box<dyn SignalGenerator>),
    Tracker(Box<dyn Tracker>),
    Sequence(Vec<SetupNode>),
    /// Entries keep their declaration order.
    Mapping(Vec<(String, SetupNode)>),
    /// Anything that is none of the above, with a description for diagnostics.
    Unknown(String),
}

/// Classification of a [`SetupNode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    Series,
    Generator,
    Tracker,
    Sequence,
    Mapping,
    Unknown,
}

impl NodeKind {
    pub fn is_signal_source(self) -> bool {
        matches!(self, NodeKind::Series | NodeKind::Generator)
    }
}

impl fmt::Display for NodeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NodeKind::Series => "series",
            NodeKind::Generator => "generator",
            NodeKind::Tracker => "tracker",
            NodeKind::Sequence => "sequence",
            NodeKind::Mapping => "mapping",
            NodeKind::Unknown => "unknown",
        };
        f.write_str(s)
    }
}

impl SetupNode {
    pub fn kind(&self) -> NodeKind {
        match self {
            SetupNode::Series(_) => NodeKind::Series,
            SetupNode::Generator(_) => NodeKind::Generator,
            SetupNode::Tracker(_) => NodeKind::Tracker,
            SetupNode::Sequence(_) => NodeKind::Sequence,
            SetupNode::Mapping(_) => NodeKind::Mapping,
            SetupNode::Unknown(_) => NodeKind::Unknown,
        }
    }

    pub fn generator(g: impl SignalGenerator + 'static) -> Self {
        SetupNode::Generator(Box::new(g))
    }

    pub fn tracker(t: impl Tracker + 'static) -> Self {
        SetupNode::Tracker(Box::new(t))
    }

    /// A `[signal, tracker]` pair.
    pub fn paired(signal: SetupNode, tracker: SetupNode) -> Self {
        SetupNode::Sequence(vec![signal, tracker])
    }

    pub fn mapping<K: Into<String>>(entries: impl IntoIterator<Item = (K, SetupNode)>) -> Self {
        SetupNode::Mapping(entries.into_iter().map(|(k, v)| (k.into(), v)).collect())
    }
}

/// Where a unit's signals come from.
#[derive(Debug)]
pub enum SignalSource {
    Series(SignalFrame),
    Generator(Box<dyn SignalGenerator>),
}

#[derive(Debug, Error)]
#[error("simulation unit '{0}' has neither a signal source nor a tracker")]
pub struct EmptyUnitError(pub String);

/// One resolved (signal source, tracker) pair ready for execution.
#[derive(Debug)]
pub struct SimulationUnit {
    name: String,
    signal_source: Option<SignalSource>,
    tracker: Option<Box<dyn Tracker>>,
}

impl SimulationUnit {
    pub fn new(
        name: impl Into<String>,
        signal_source: Option<SignalSource>,
        tracker: Option<Box<dyn Tracker>>,
    ) -> Result<Self, EmptyUnitError> {
        let name = name.into();
        if signal_source.is_none() && tracker.is_none() {
            return Err(EmptyUnitError(name));
        }
        Ok(Self {
            name,
            signal_source,
            tracker,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn signal_source(&self) -> Option<&SignalSource> {
        self.signal_source.as_ref()
    }

    pub fn signal_source_mut(&mut self) -> Option<&mut SignalSource> {
        self.signal_source.as_mut()
    }

    pub fn tracker(&self) -> Option<&dyn Tracker> {
        self.tracker.as_deref()
    }

    /// Free-form arguments recorded with the unit's results: the generator's
    /// parameters plus the tracker's, the latter prefixed with `tracker.`.
    pub fn args(&self) -> Params {
        let mut args = Params::new();
        match &self.signal_source {
            Some(SignalSource::Generator(g)) => {
                args.insert("signal".to_string(), Value::from(g.name()));
                args.extend(g.params());
            }
            Some(SignalSource::Series(_)) => {
                args.insert("signal".to_string(), Value::from("series"));
            }
            None => {}
        }
        if let Some(t) = &self.tracker {
            args.insert("tracker".to_string(), Value::from(t.name()));
            for (k, v) in t.params() {
                args.insert(format!("tracker.{k}"), v);
            }
        }
        args
    }
}

impl fmt::Display for SimulationUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let source = match &self.signal_source {
            Some(SignalSource::Generator(g)) => g.name().to_string(),
            Some(SignalSource::Series(s)) => format!("series[{}]", s.len()),
            None => "<no signal>".to_string(),
        };
        let tracker = self.tracker.as_ref().map_or("<no tracker>", |t| t.name());
        write!(f, "{} : {source} | {tracker}", self.name)
    }
}

/// A node that resolution dropped.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedNode {
    pub path: String,
    pub description: String,
}

/// Units produced by [`resolve`] plus the nodes it could not classify.
#[derive(Debug, Default)]
pub struct Resolution {
    pub units: Vec<SimulationUnit>,
    pub skipped: Vec<SkippedNode>,
}

/// Flatten `node` into simulation units named under `path`.
pub fn resolve(node: SetupNode, path: &str) -> Resolution {
    let mut resolution = Resolution::default();
    resolve_into(node, path, &mut resolution);
    resolution
}

fn resolve_into(node: SetupNode, path: &str, out: &mut Resolution) {
    match node {
        SetupNode::Mapping(entries) => {
            for (key, child) in entries {
                resolve_into(child, &format!("{path}/{key}"), out);
            }
        }
        SetupNode::Sequence(items) if is_pair(&items) => {
            let mut items = items.into_iter();
            let signal = items.next().and_then(into_source);
            let tracker = match items.next() {
                Some(SetupNode::Tracker(t)) => Some(t),
                _ => None,
            };
            push_unit(out, path, signal, tracker);
        }
        SetupNode::Sequence(items) => {
            for (i, child) in items.into_iter().enumerate() {
                resolve_into(child, &format!("{path}/{i}"), out);
            }
        }
        SetupNode::Tracker(t) => push_unit(out, path, None, Some(t)),
        SetupNode::Series(s) => push_unit(out, path, Some(SignalSource::Series(s)), None),
        SetupNode::Generator(g) => push_unit(out, path, Some(SignalSource::Generator(g)), None),
        SetupNode::Unknown(description) => {
            warn!(%path, %description, "skipping unrecognized setup node");
            out.skipped.push(SkippedNode {
                path: path.to_string(),
                description,
            });
        }
    }
}

fn is_pair(items: &[SetupNode]) -> bool {
    items.len() == 2 && items[0].kind().is_signal_source() && items[1].kind() == NodeKind::Tracker
}

fn into_source(node: SetupNode) -> Option<SignalSource> {
    match node {
        SetupNode::Series(s) => Some(SignalSource::Series(s)),
        SetupNode::Generator(g) => Some(SignalSource::Generator(g)),
        _ => None,
    }
}

fn push_unit(
    out: &mut Resolution,
    path: &str,
    signal: Option<SignalSource>,
    tracker: Option<Box<dyn Tracker>>,
) {
    // Every call site passes at least one half, so construction cannot fail.
    if let Ok(unit) = SimulationUnit::new(path, signal, tracker) {
        out.units.push(unit);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use siglab_core::components::signal::CrossingMovings;
    use siglab_core::components::tracker::{FixedStop, TimeExit};

    fn gen() -> SetupNode {
        SetupNode::generator(CrossingMovings::sma(2, 5).unwrap())
    }

    fn tracker() -> SetupNode {
        SetupNode::tracker(TimeExit::new(5).unwrap())
    }

    fn names(r: &Resolution) -> Vec<&str> {
        r.units.iter().map(|u| u.name()).collect()
    }

    #[test]
    fn mapping_pairs_and_singletons() {
        let setup = SetupNode::mapping([
            ("a", SetupNode::paired(gen(), tracker())),
            ("b", SetupNode::Sequence(vec![SetupNode::Series(SignalFrame::new())])),
        ]);
        let r = resolve(setup, "prj");
        assert_eq!(names(&r), vec!["prj/a", "prj/b/0"]);
        assert!(r.units[0].tracker().is_some());
        assert!(matches!(r.units[0].signal_source(), Some(SignalSource::Generator(_))));
        assert!(r.units[1].tracker().is_none());
        assert!(r.skipped.is_empty());
    }

    #[test]
    fn bare_series_takes_its_key_but_a_wrapped_one_keeps_the_index() {
        let setup = SetupNode::mapping([
            ("bare", SetupNode::Series(SignalFrame::new())),
            ("wrapped", SetupNode::Sequence(vec![SetupNode::Series(SignalFrame::new())])),
            ("held", SetupNode::Sequence(vec![tracker()])),
        ]);
        let r = resolve(setup, "prj");
        assert_eq!(names(&r), vec!["prj/bare", "prj/wrapped/0", "prj/held/0"]);
        assert!(r.units.iter().take(2).all(|u| u.tracker().is_none()));
        assert!(r.units[2].signal_source().is_none());
    }

    #[test]
    fn mapping_order_is_declaration_order() {
        let setup = SetupNode::mapping([("z", gen()), ("a", gen()), ("m", tracker())]);
        assert_eq!(names(&resolve(setup, "")), vec!["/z", "/a", "/m"]);
    }

    #[test]
    fn two_element_sequence_without_tracker_is_flattened() {
        let r = resolve(SetupNode::Sequence(vec![gen(), gen()]), "p");
        assert_eq!(names(&r), vec!["p/0", "p/1"]);
    }

    #[test]
    fn tracker_first_is_not_a_pair() {
        let r = resolve(SetupNode::Sequence(vec![tracker(), gen()]), "p");
        assert_eq!(names(&r), vec!["p/0", "p/1"]);
        assert!(r.units[0].signal_source().is_none());
    }

    #[test]
    fn unknown_nodes_are_counted() {
        let setup = SetupNode::mapping([
            ("ok", gen()),
            ("bad", SetupNode::Unknown("integer 42".into())),
            ("nested", SetupNode::Sequence(vec![SetupNode::Unknown("string".into())])),
        ]);
        let r = resolve(setup, "p");
        assert_eq!(names(&r), vec!["p/ok"]);
        assert_eq!(r.skipped.len(), 2);
        assert_eq!(r.skipped[1].path, "p/nested/0");
    }

    #[test]
    fn unit_requires_a_source_or_tracker() {
        assert!(SimulationUnit::new("x", None, None).is_err());
        let unit = SimulationUnit::new("x", None, Some(Box::new(FixedStop::new(Some(0.02), None).unwrap())))
            .unwrap();
        assert_eq!(unit.to_string(), "x : <no signal> | fixed_stop");
    }

    #[test]
    fn args_merge_generator_and_tracker_params() {
        let r = resolve(SetupNode::paired(gen(), tracker()), "p");
        let args = r.units[0].args();
        assert_eq!(args["signal"], "crossing_movings");
        assert_eq!(args["fast"], 2);
        assert_eq!(args["tracker"], "time_exit");
        assert!(args.contains_key("tracker.max_bars"));
    }

    #[test]
    fn kind_classifies_every_variant() {
        assert_eq!(gen().kind(), NodeKind::Generator);
        assert_eq!(tracker().kind(), NodeKind::Tracker);
        assert_eq!(SetupNode::Series(SignalFrame::new()).kind(), NodeKind::Series);
        assert_eq!(SetupNode::Unknown(String::new()).kind(), NodeKind::Unknown);
        assert!(NodeKind::Series.is_signal_source());
        assert!(!NodeKind::Tracker.is_signal_source());
    }
}
