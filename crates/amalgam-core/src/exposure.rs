//! Exposure analysis
//!
//! Computes which secondary-unit types must stay public after the merge: the
//! types the policy keeps public, plus everything transitively reachable from
//! them or from the primary unit's public surface (base types, interfaces,
//! public member signatures, generic arguments at any depth).
//!
//! Only names defined by secondary units (the whitelist) can ever be exposed.
//! The exposure set doubles as the visited set of the walk, so a name is
//! walked at most once and cyclic references terminate.

use std::collections::{HashMap, HashSet};
use std::fmt;

use petgraph::graph::{DiGraph, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::{Deserialize, Serialize};

use crate::model::{ReferenceModel, TypeDef, TypeRef};
use crate::policy::InternalizePolicy;

/// The kind of reference through which a type was reached
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExposureVia {
    BaseType,
    Interface,
    MethodReturn,
    MethodParameter,
    PropertyGetter,
    PropertySetter,
    Field,
    GenericArgument,
}

impl fmt::Display for ExposureVia {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            ExposureVia::BaseType => "base type",
            ExposureVia::Interface => "interface",
            ExposureVia::MethodReturn => "method return",
            ExposureVia::MethodParameter => "method parameter",
            ExposureVia::PropertyGetter => "property getter",
            ExposureVia::PropertySetter => "property setter",
            ExposureVia::Field => "field",
            ExposureVia::GenericArgument => "generic argument",
        };
        write!(f, "{}", s)
    }
}

/// Why a name is in the exposure set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum ExposureReason {
    /// The internalization policy keeps it public
    Policy,
    /// First reached from `from` through a `via` reference
    ReachedFrom { from: String, via: ExposureVia },
}

impl fmt::Display for ExposureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExposureReason::Policy => write!(f, "kept public by policy"),
            ExposureReason::ReachedFrom { from, via } => write!(f, "{} of {}", via, from),
        }
    }
}

/// One link of an exposure explanation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposureStep {
    pub name: String,
    pub reason: ExposureReason,
}

/// Full names defined by secondary units; the only names eligible for exposure
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct WhitelistSet {
    names: HashSet<String>,
}

impl WhitelistSet {
    pub fn from_model(model: &ReferenceModel) -> Self {
        Self {
            names: model
                .secondaries()
                .flat_map(|u| u.types.iter().map(|t| t.full_name.clone()))
                .collect(),
        }
    }

    pub fn contains(&self, full_name: &str) -> bool {
        self.names.contains(full_name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }
}

/// Monotonic set of names that must remain public, with the provenance of
/// each insertion kept as a graph of `exposer -> exposed` edges
#[derive(Debug, Clone, Default)]
pub struct ExposureSet {
    order: Vec<String>,
    members: HashSet<String>,
    graph: DiGraph<String, ExposureVia>,
    nodes: HashMap<String, NodeIndex>,
}

impl ExposureSet {
    pub fn contains(&self, full_name: &str) -> bool {
        self.members.contains(full_name)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    /// Exposed names in discovery order
    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.order.iter().map(String::as_str)
    }

    /// Why `full_name` was exposed, if it was
    pub fn reason(&self, full_name: &str) -> Option<ExposureReason> {
        if !self.contains(full_name) {
            return None;
        }
        let idx = *self.nodes.get(full_name)?;
        Some(self.incoming_reason(idx))
    }

    /// The chain of exposures leading to `full_name`, starting at its root: a
    /// policy-public secondary type, or the first step out of a type that is
    /// not itself exposed (a primary type).
    pub fn explain(&self, full_name: &str) -> Option<Vec<ExposureStep>> {
        if !self.contains(full_name) {
            return None;
        }

        let mut steps = Vec::new();
        let mut idx = *self.nodes.get(full_name)?;
        // Every exposed node has exactly one incoming edge, so the chain is a
        // path; the bound only guards against a corrupted graph.
        for _ in 0..=self.graph.node_count() {
            let name = self.graph[idx].clone();
            let reason = self.incoming_reason(idx);
            let parent = self
                .graph
                .edges_directed(idx, Direction::Incoming)
                .next()
                .map(|e| e.source());
            steps.push(ExposureStep { name, reason });

            match parent {
                Some(p) if self.contains(&self.graph[p]) => idx = p,
                _ => break,
            }
        }

        steps.reverse();
        Some(steps)
    }

    /// Names first exposed through a reference from `full_name`
    pub fn exposed_by(&self, full_name: &str) -> Vec<&str> {
        let Some(&idx) = self.nodes.get(full_name) else {
            return Vec::new();
        };
        let mut names: Vec<&str> = self
            .graph
            .neighbors_directed(idx, Direction::Outgoing)
            .map(|n| self.graph[n].as_str())
            .collect();
        names.sort_unstable();
        names
    }

    fn incoming_reason(&self, idx: NodeIndex) -> ExposureReason {
        match self.graph.edges_directed(idx, Direction::Incoming).next() {
            Some(edge) => ExposureReason::ReachedFrom {
                from: self.graph[edge.source()].clone(),
                via: *edge.weight(),
            },
            None => ExposureReason::Policy,
        }
    }

    fn node(&mut self, full_name: &str) -> NodeIndex {
        if let Some(&idx) = self.nodes.get(full_name) {
            return idx;
        }
        let idx = self.graph.add_node(full_name.to_string());
        self.nodes.insert(full_name.to_string(), idx);
        idx
    }

    /// Insert a policy-public name. Returns false if it was already present.
    fn insert_seed(&mut self, full_name: &str) -> bool {
        if !self.members.insert(full_name.to_string()) {
            return false;
        }
        self.node(full_name);
        self.order.push(full_name.to_string());
        true
    }

    /// Insert a reached name, recording the edge it was reached through.
    /// Returns false (and records nothing) if it was already present.
    fn insert_reached(&mut self, full_name: &str, from: &str, via: ExposureVia) -> bool {
        if !self.members.insert(full_name.to_string()) {
            return false;
        }
        let source = self.node(from);
        let target = self.node(full_name);
        self.graph.add_edge(source, target, via);
        self.order.push(full_name.to_string());
        true
    }
}

/// Set equality, ignoring discovery order and provenance
impl PartialEq for ExposureSet {
    fn eq(&self, other: &Self) -> bool {
        self.members == other.members
    }
}

impl Eq for ExposureSet {}

/// A name mentioned by a type, with the kind of reference that mentioned it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Mention<'m> {
    name: &'m str,
    via: ExposureVia,
}

pub struct ExposureAnalyzer<'a> {
    model: &'a ReferenceModel,
    policy: &'a InternalizePolicy,
    whitelist: WhitelistSet,
}

impl<'a> ExposureAnalyzer<'a> {
    pub fn new(model: &'a ReferenceModel, policy: &'a InternalizePolicy) -> Self {
        Self {
            model,
            policy,
            whitelist: WhitelistSet::from_model(model),
        }
    }

    pub fn whitelist(&self) -> &WhitelistSet {
        &self.whitelist
    }

    /// Run the analysis to its fixpoint
    pub fn analyze(&self) -> ExposureSet {
        let mut exposure = ExposureSet::default();

        for unit in self.model.secondaries() {
            for ty in &unit.types {
                if !self.policy.should_internalize(&ty.full_name) && exposure.insert_seed(&ty.full_name) {
                    tracing::debug!("{} kept public by policy", ty.full_name);
                    self.walk(ty, &mut exposure);
                }
            }
        }
        let seeded = exposure.len();

        for ty in &self.model.primary().types {
            self.walk(ty, &mut exposure);
        }

        tracing::info!(
            "Exposure analysis: {} of {} secondary types stay public ({} by policy, {} reached)",
            exposure.len(),
            self.whitelist.len(),
            seeded,
            exposure.len() - seeded
        );
        exposure
    }

    /// Depth-first closure from `start`. Whitelisted names are exposed and
    /// walked the first time they are seen. Base types outside the whitelist
    /// (primary types) are still followed so their surface is covered.
    fn walk(&self, start: &'a TypeDef, exposure: &mut ExposureSet) {
        let mut stack = vec![start];
        let mut followed: HashSet<&str> = HashSet::from([start.full_name.as_str()]);

        while let Some(ty) = stack.pop() {
            for mention in self.mentions(ty) {
                if self.whitelist.contains(mention.name) {
                    if !exposure.insert_reached(mention.name, &ty.full_name, mention.via) {
                        continue;
                    }
                    tracing::debug!("{} exposed as {} of {}", mention.name, mention.via, ty.full_name);
                } else if mention.via != ExposureVia::BaseType || followed.contains(mention.name) {
                    continue;
                }

                followed.insert(mention.name);
                match self.model.find_type(mention.name) {
                    Some(def) => stack.push(def),
                    None => tracing::trace!("{} is unresolved, not walking it", mention.name),
                }
            }
        }
    }

    /// Every name the public surface of `ty` mentions, in declaration order
    fn mentions(&self, ty: &'a TypeDef) -> Vec<Mention<'a>> {
        let mut out = Vec::new();

        if let Some(base) = &ty.base {
            Self::mention(base, ExposureVia::BaseType, &mut out);
        }
        for interface in &ty.interfaces {
            Self::mention(interface, ExposureVia::Interface, &mut out);
        }
        for method in ty.methods.iter().filter(|m| m.public) {
            if let Some(ret) = &method.return_type {
                Self::mention(ret, ExposureVia::MethodReturn, &mut out);
            }
            for param in &method.parameters {
                Self::mention(param, ExposureVia::MethodParameter, &mut out);
            }
        }
        for property in &ty.properties {
            // A public getter decides alone; the setter only counts for
            // write-only properties.
            if let Some(getter) = property.public_getter() {
                if let Some(ret) = &getter.return_type {
                    Self::mention(ret, ExposureVia::PropertyGetter, &mut out);
                }
            } else if let Some(setter) = property.public_setter() {
                for param in &setter.parameters {
                    Self::mention(param, ExposureVia::PropertySetter, &mut out);
                }
            }
        }
        for field in ty.fields.iter().filter(|f| f.public) {
            Self::mention(&field.field_type, ExposureVia::Field, &mut out);
        }

        out
    }

    /// The referenced element type, then every generic argument at any depth
    fn mention(reference: &'a TypeRef, via: ExposureVia, out: &mut Vec<Mention<'a>>) {
        if let Some(name) = reference.element_name() {
            out.push(Mention { name, via });
        }
        Self::mention_arguments(reference, out);
    }

    fn mention_arguments(reference: &'a TypeRef, out: &mut Vec<Mention<'a>>) {
        let mut pending = vec![reference];
        while let Some(current) = pending.pop() {
            let TypeRef::Generic { element, arguments } = current else {
                continue;
            };
            for arg in arguments.iter().filter(|a| !a.is_generic_parameter()) {
                if let Some(name) = arg.element_name() {
                    out.push(Mention {
                        name,
                        via: ExposureVia::GenericArgument,
                    });
                }
            }
            pending.extend(arguments.iter().rev());
            // Instantiated element types can nest too, e.g. Outer<A>.Inner<B>
            pending.push(&**element);
        }
    }
}
