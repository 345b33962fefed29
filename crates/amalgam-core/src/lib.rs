//! Visibility-aware merging of compiled units
//!
//! A primary unit and any number of secondary units are merged into one
//! output unit. Secondary types that are not part of the combined public
//! surface can be internalized; everything reachable from that surface stays
//! public.

pub mod error;
pub mod exposure;
pub mod importer;
pub mod mapping;
pub mod model;
pub mod options;
pub mod orchestrator;
pub mod policy;

pub use error::{ImportError, MergeError, ModelError, OptionsError};
pub use exposure::{ExposureAnalyzer, ExposureReason, ExposureSet, ExposureStep, ExposureVia, WhitelistSet};
pub use importer::{CloneImporter, Importer, MergedUnit, Visibility};
pub use mapping::{MappingRegistry, MappingTable, RedirectReference};
pub use model::{ReferenceModel, TypeRef, Unit, UnitRole};
pub use options::MergeOptions;
pub use orchestrator::{merge_units, MergeOrchestrator, MergePhase, MergeReport, MergeRun};
pub use policy::InternalizePolicy;
