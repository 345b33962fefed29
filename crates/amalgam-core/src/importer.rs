//! Importer collaborator: copies definitions into the output unit
//!
//! The merge only decides whether each definition is submitted and with which
//! visibility; the importer performs the copy.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};

use crate::error::ImportError;
use crate::model::{ForwardedType, TypeDef, Unit};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    Public,
    Internal,
}

impl Visibility {
    pub fn from_internalize(internalize: bool) -> Self {
        if internalize {
            Visibility::Internal
        } else {
            Visibility::Public
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedType {
    pub full_name: String,
    pub origin_unit: String,
    pub visibility: Visibility,
    pub definition: TypeDef,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportedForward {
    pub full_name: String,
    pub origin_unit: String,
    pub target_unit: String,
    pub entry: ForwardedType,
}

/// The merged output unit
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergedUnit {
    pub name: String,
    pub types: Vec<ImportedType>,
    pub forwarded_types: Vec<ImportedForward>,
}

impl MergedUnit {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn find_type(&self, full_name: &str) -> Option<&ImportedType> {
        self.types.iter().find(|t| t.full_name == full_name)
    }

    pub fn find_forwarded(&self, full_name: &str) -> Option<&ImportedForward> {
        self.forwarded_types.iter().find(|f| f.full_name == full_name)
    }
}

pub trait Importer {
    /// Copy `ty` from `origin` into `dest`, internalizing it if asked to
    fn import_type(
        &mut self,
        ty: &TypeDef,
        origin: &Unit,
        dest: &mut MergedUnit,
        internalize: bool,
    ) -> Result<(), ImportError>;

    /// Copy a forwarded-type entry from `origin` into `dest`
    fn import_forwarded_type(
        &mut self,
        forwarded: &ForwardedType,
        origin: &Unit,
        dest: &mut MergedUnit,
    ) -> Result<(), ImportError>;
}

/// Importer that clones definitions as-is, applying only the visibility.
/// Submitting the same full name twice is an error.
#[derive(Debug, Default)]
pub struct CloneImporter {
    types: HashSet<String>,
    forwards: HashSet<String>,
}

impl CloneImporter {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Importer for CloneImporter {
    fn import_type(
        &mut self,
        ty: &TypeDef,
        origin: &Unit,
        dest: &mut MergedUnit,
        internalize: bool,
    ) -> Result<(), ImportError> {
        if !self.types.insert(ty.full_name.clone()) {
            return Err(ImportError::DuplicateType(ty.full_name.clone()));
        }

        dest.types.push(ImportedType {
            full_name: ty.full_name.clone(),
            origin_unit: origin.name.clone(),
            visibility: Visibility::from_internalize(internalize),
            definition: ty.clone(),
        });
        Ok(())
    }

    fn import_forwarded_type(
        &mut self,
        forwarded: &ForwardedType,
        origin: &Unit,
        dest: &mut MergedUnit,
    ) -> Result<(), ImportError> {
        let full_name = forwarded.full_name();
        if !self.forwards.insert(full_name.clone()) {
            return Err(ImportError::DuplicateForwardedType(full_name));
        }

        dest.forwarded_types.push(ImportedForward {
            full_name,
            origin_unit: origin.name.clone(),
            target_unit: forwarded.target_unit.clone(),
            entry: forwarded.clone(),
        });
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::UnitBuilder;

    #[test]
    fn test_clone_importer_applies_visibility() {
        let lib = UnitBuilder::secondary("Lib").add_type("Lib.A").add_type("Lib.B").build();
        let mut dest = MergedUnit::new("Out");
        let mut importer = CloneImporter::new();

        importer.import_type(&lib.types[0], &lib, &mut dest, true).unwrap();
        importer.import_type(&lib.types[1], &lib, &mut dest, false).unwrap();

        assert_eq!(dest.find_type("Lib.A").unwrap().visibility, Visibility::Internal);
        assert_eq!(dest.find_type("Lib.B").unwrap().visibility, Visibility::Public);
        assert_eq!(dest.find_type("Lib.B").unwrap().origin_unit, "Lib");
    }

    #[test]
    fn test_clone_importer_rejects_duplicates() {
        let lib = UnitBuilder::secondary("Lib")
            .add_type("Lib.A")
            .forward(ForwardedType::new("Legacy", "Thing", "Other"))
            .build();
        let mut dest = MergedUnit::new("Out");
        let mut importer = CloneImporter::new();

        importer.import_type(&lib.types[0], &lib, &mut dest, false).unwrap();
        assert_eq!(
            importer.import_type(&lib.types[0], &lib, &mut dest, true),
            Err(ImportError::DuplicateType("Lib.A".to_string()))
        );

        let fwd = &lib.forwarded_types[0];
        importer.import_forwarded_type(fwd, &lib, &mut dest).unwrap();
        assert_eq!(
            importer.import_forwarded_type(fwd, &lib, &mut dest),
            Err(ImportError::DuplicateForwardedType("Legacy.Thing".to_string()))
        );
        assert_eq!(dest.types.len(), 1);
        assert_eq!(dest.forwarded_types.len(), 1);
        assert_eq!(dest.find_forwarded("Legacy.Thing").unwrap().target_unit, "Other");
    }
}
