//! Mapping registry collaborator
//!
//! Records where forwarded names point once their units are merged, so later
//! reference rewriting can redirect them.

use std::collections::{HashMap, HashSet};

use serde::{Deserialize, Serialize};

use crate::model::ForwardedType;

/// Reference to a forwarded type in the output's scope space. Nested entries
/// keep their declaring chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedirectReference {
    pub namespace: String,
    pub name: String,
    /// Unit the reference resolves in, after scope merging
    pub scope: String,
    #[serde(default)]
    pub declaring_type: Option<Box<RedirectReference>>,
}

impl RedirectReference {
    /// Build the redirect for `forwarded`, mapping its target unit (and that
    /// of every declaring entry) through `registry.merge_scope`
    pub fn for_forwarded<M: MappingRegistry + ?Sized>(forwarded: &ForwardedType, registry: &M) -> Self {
        Self {
            namespace: forwarded.namespace.clone(),
            name: forwarded.name.clone(),
            scope: registry.merge_scope(&forwarded.target_unit),
            declaring_type: forwarded
                .declaring_type
                .as_deref()
                .map(|declaring| Box::new(Self::for_forwarded(declaring, registry))),
        }
    }

    pub fn full_name(&self) -> String {
        match &self.declaring_type {
            Some(declaring) => format!("{}/{}", declaring.full_name(), self.name),
            None if self.namespace.is_empty() => self.name.clone(),
            None => format!("{}.{}", self.namespace, self.name),
        }
    }
}

pub trait MappingRegistry {
    fn store_exported_type(&mut self, origin_unit: &str, full_name: &str, redirect: RedirectReference);

    /// Map a unit scope from the inputs into the output's scope space
    fn merge_scope(&self, scope: &str) -> String;
}

/// In-memory registry. Scopes naming any merged unit collapse onto the output
/// unit; foreign scopes pass through unchanged.
#[derive(Debug, Clone, Default)]
pub struct MappingTable {
    output_unit: String,
    merged_units: HashSet<String>,
    exported: HashMap<(String, String), RedirectReference>,
}

impl MappingTable {
    pub fn new(output_unit: impl Into<String>, merged_units: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self {
            output_unit: output_unit.into(),
            merged_units: merged_units.into_iter().map(Into::into).collect(),
            exported: HashMap::new(),
        }
    }

    pub fn exported_type(&self, origin_unit: &str, full_name: &str) -> Option<&RedirectReference> {
        self.exported
            .get(&(origin_unit.to_string(), full_name.to_string()))
    }

    pub fn len(&self) -> usize {
        self.exported.len()
    }

    pub fn is_empty(&self) -> bool {
        self.exported.is_empty()
    }
}

impl MappingRegistry for MappingTable {
    fn store_exported_type(&mut self, origin_unit: &str, full_name: &str, redirect: RedirectReference) {
        self.exported
            .insert((origin_unit.to_string(), full_name.to_string()), redirect);
    }

    fn merge_scope(&self, scope: &str) -> String {
        if self.merged_units.contains(scope) {
            self.output_unit.clone()
        } else {
            scope.to_string()
        }
    }
}
