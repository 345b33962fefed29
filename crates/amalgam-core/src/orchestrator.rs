//! Merge orchestration
//!
//! A merge runs three phases, strictly in order and exactly once:
//!
//! 1. **Discover**: exposure analysis over the whole model.
//! 2. **Merge types**: every primary type is imported public; every secondary
//!    type is internalized unless the exposure set contains it.
//! 3. **Merge forwarded types**: redirects for every forwarded entry are
//!    registered, then primary forwards are imported and secondary forwards
//!    are imported only when their name was not exposed (an exposed name was
//!    already imported as a real definition).
//!
//! The first importer failure aborts the run.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::MergeError;
use crate::exposure::{ExposureAnalyzer, ExposureReason, ExposureSet};
use crate::importer::{CloneImporter, Importer, MergedUnit};
use crate::mapping::{MappingRegistry, MappingTable, RedirectReference};
use crate::model::{ReferenceModel, Unit, UnitRole};
use crate::options::MergeOptions;
use crate::policy::InternalizePolicy;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MergePhase {
    Discover,
    MergeTypes,
    MergeForwardedTypes,
}

impl fmt::Display for MergePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MergePhase::Discover => write!(f, "exposure discovery"),
            MergePhase::MergeTypes => write!(f, "type merge"),
            MergePhase::MergeForwardedTypes => write!(f, "forwarded type merge"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExposedType {
    pub full_name: String,
    #[serde(flatten)]
    pub reason: ExposureReason,
}

/// How one type definition was submitted to the importer
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TypeDecision {
    pub full_name: String,
    pub unit: String,
    pub role: UnitRole,
    /// The policy's own verdict, before exposure overrides it
    pub policy_internalize: bool,
    pub internalize: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForwardDecision {
    pub full_name: String,
    pub unit: String,
    pub role: UnitRole,
    pub imported: bool,
}

/// Everything a merge decided, in submission order
#[derive(Debug, Clone, Default, Serialize)]
pub struct MergeReport {
    pub policy: String,
    pub exposed: Vec<ExposedType>,
    pub types: Vec<TypeDecision>,
    pub forwarded: Vec<ForwardDecision>,
    #[serde(skip)]
    pub exposure: ExposureSet,
}

impl MergeReport {
    pub fn type_decision(&self, full_name: &str) -> Option<&TypeDecision> {
        self.types.iter().find(|d| d.full_name == full_name)
    }

    pub fn forward_decision(&self, unit: &str, full_name: &str) -> Option<&ForwardDecision> {
        self.forwarded
            .iter()
            .find(|d| d.unit == unit && d.full_name == full_name)
    }

    pub fn internalized_count(&self) -> usize {
        self.types.iter().filter(|d| d.internalize).count()
    }
}

pub struct MergeOrchestrator<'a, I: Importer, M: MappingRegistry> {
    model: &'a ReferenceModel,
    policy: &'a InternalizePolicy,
    importer: &'a mut I,
    mapping: &'a mut M,
}

impl<'a, I: Importer, M: MappingRegistry> MergeOrchestrator<'a, I, M> {
    pub fn new(
        model: &'a ReferenceModel,
        policy: &'a InternalizePolicy,
        importer: &'a mut I,
        mapping: &'a mut M,
    ) -> Self {
        Self {
            model,
            policy,
            importer,
            mapping,
        }
    }

    /// Run all three phases into `dest`. Consumes the orchestrator so a run
    /// cannot be repeated.
    pub fn perform(mut self, dest: &mut MergedUnit) -> Result<MergeReport, MergeError> {
        tracing::info!("Merging {} units into {} ({})", self.model.units().len(), dest.name, self.policy);

        let mut report = MergeReport {
            policy: self.policy.to_string(),
            ..Default::default()
        };

        let exposure = {
            let _span = tracing::info_span!("phase", name = %MergePhase::Discover).entered();
            ExposureAnalyzer::new(self.model, self.policy).analyze()
        };
        report.exposed = exposure
            .iter()
            .filter_map(|name| {
                exposure.reason(name).map(|reason| ExposedType {
                    full_name: name.to_string(),
                    reason,
                })
            })
            .collect();

        {
            let _span = tracing::info_span!("phase", name = %MergePhase::MergeTypes).entered();
            self.merge_types(&exposure, dest, &mut report)?;
        }
        {
            let _span = tracing::info_span!("phase", name = %MergePhase::MergeForwardedTypes).entered();
            self.merge_forwarded_types(&exposure, dest, &mut report)?;
        }

        report.exposure = exposure;
        Ok(report)
    }

    fn merge_types(
        &mut self,
        exposure: &ExposureSet,
        dest: &mut MergedUnit,
        report: &mut MergeReport,
    ) -> Result<(), MergeError> {
        let primary = self.model.primary();
        for ty in &primary.types {
            tracing::debug!("Importing {} from {} as public", ty.full_name, primary.name);
            self.importer
                .import_type(ty, primary, dest, false)
                .map_err(|source| MergeError::Import {
                    phase: MergePhase::MergeTypes,
                    source,
                })?;
            report.types.push(TypeDecision {
                full_name: ty.full_name.clone(),
                unit: primary.name.clone(),
                role: UnitRole::Primary,
                policy_internalize: false,
                internalize: false,
            });
        }

        for unit in self.model.secondaries() {
            for ty in &unit.types {
                let internalize = !exposure.contains(&ty.full_name);
                tracing::debug!(
                    "Importing {} from {} as {}",
                    ty.full_name,
                    unit.name,
                    if internalize { "internal" } else { "public" }
                );
                self.importer
                    .import_type(ty, unit, dest, internalize)
                    .map_err(|source| MergeError::Import {
                        phase: MergePhase::MergeTypes,
                        source,
                    })?;
                report.types.push(TypeDecision {
                    full_name: ty.full_name.clone(),
                    unit: unit.name.clone(),
                    role: UnitRole::Secondary,
                    policy_internalize: self.policy.should_internalize(&ty.full_name),
                    internalize,
                });
            }
        }

        tracing::info!(
            "Merged {} types ({} internalized)",
            report.types.len(),
            report.internalized_count()
        );
        Ok(())
    }

    fn merge_forwarded_types(
        &mut self,
        exposure: &ExposureSet,
        dest: &mut MergedUnit,
        report: &mut MergeReport,
    ) -> Result<(), MergeError> {
        for unit in self.model.units() {
            for forwarded in &unit.forwarded_types {
                let redirect = RedirectReference::for_forwarded(forwarded, &*self.mapping);
                self.mapping
                    .store_exported_type(&unit.name, &forwarded.full_name(), redirect);
            }
        }

        let primary = self.model.primary();
        self.import_forwards(primary, |_| true, dest, report)?;
        for unit in self.model.secondaries() {
            self.import_forwards(unit, |name| !exposure.contains(name), dest, report)?;
        }

        let imported = report.forwarded.iter().filter(|d| d.imported).count();
        tracing::info!(
            "Merged {} forwarded types ({} skipped)",
            imported,
            report.forwarded.len() - imported
        );
        Ok(())
    }

    fn import_forwards(
        &mut self,
        unit: &Unit,
        should_import: impl Fn(&str) -> bool,
        dest: &mut MergedUnit,
        report: &mut MergeReport,
    ) -> Result<(), MergeError> {
        for forwarded in &unit.forwarded_types {
            let full_name = forwarded.full_name();
            let imported = should_import(&full_name);
            if imported {
                self.importer
                    .import_forwarded_type(forwarded, unit, dest)
                    .map_err(|source| MergeError::Import {
                        phase: MergePhase::MergeForwardedTypes,
                        source,
                    })?;
            } else {
                tracing::debug!(
                    "Skipping forwarded type {} from {}: merged as a public definition",
                    full_name,
                    unit.name
                );
            }
            report.forwarded.push(ForwardDecision {
                full_name,
                unit: unit.name.clone(),
                role: unit.role,
                imported,
            });
        }
        Ok(())
    }
}

/// Output of [`merge_units`]
#[derive(Debug)]
pub struct MergeRun {
    pub output: MergedUnit,
    pub mappings: MappingTable,
    pub report: MergeReport,
}

/// Merge `units` with the default collaborators: [`CloneImporter`] and a
/// [`MappingTable`] that collapses every merged unit onto `output_name`.
pub fn merge_units(
    units: Vec<Unit>,
    options: &MergeOptions,
    output_name: &str,
) -> Result<MergeRun, MergeError> {
    let policy = InternalizePolicy::from_options(options)?;
    let model = ReferenceModel::new(units)?;

    let mut importer = CloneImporter::new();
    let mut mappings = MappingTable::new(output_name, model.units().iter().map(|u| u.name.clone()));
    let mut output = MergedUnit::new(output_name);

    let report = MergeOrchestrator::new(&model, &policy, &mut importer, &mut mappings).perform(&mut output)?;

    Ok(MergeRun {
        output,
        mappings,
        report,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ImportError;
    use crate::importer::Visibility;
    use crate::model::{ForwardedType, TypeBuilder, TypeDef, TypeRef, UnitBuilder};
    use pretty_assertions::assert_eq;

    fn units() -> Vec<Unit> {
        vec![
            UnitBuilder::primary("App")
                .add_type(TypeBuilder::new("App.Main").returns("Service", TypeRef::named("Lib.Service")))
                .forward(ForwardedType::new("App.Old", "Moved", "System.Runtime"))
                .build(),
            UnitBuilder::secondary("Lib")
                .add_type("Lib.Service")
                .add_type("Lib.Detail")
                .forward(ForwardedType::new("Lib", "Service", "Lib.Legacy"))
                .forward(ForwardedType::new("Lib", "Gone", "Lib.Legacy"))
                .build(),
        ]
    }

    #[test]
    fn test_three_phases() {
        let run = merge_units(units(), &MergeOptions::new(true), "Merged").unwrap();

        let visibilities: Vec<(&str, Visibility)> = run
            .output
            .types
            .iter()
            .map(|t| (t.full_name.as_str(), t.visibility))
            .collect();
        assert_eq!(
            visibilities,
            vec![
                ("App.Main", Visibility::Public),
                ("Lib.Service", Visibility::Public),
                ("Lib.Detail", Visibility::Internal),
            ]
        );

        let forwarded: Vec<&str> = run.output.forwarded_types.iter().map(|f| f.full_name.as_str()).collect();
        assert_eq!(forwarded, vec!["App.Old.Moved", "Lib.Gone"]);
        assert!(!run.report.forward_decision("Lib", "Lib.Service").unwrap().imported);

        // Redirects are registered even for skipped entries
        assert_eq!(run.mappings.len(), 3);
        assert_eq!(run.mappings.exported_type("Lib", "Lib.Service").unwrap().scope, "Lib.Legacy");
    }

    #[test]
    fn test_report_records_policy_verdict() {
        let run = merge_units(units(), &MergeOptions::new(true), "Merged").unwrap();
        let service = run.report.type_decision("Lib.Service").unwrap();
        assert!(service.policy_internalize);
        assert!(!service.internalize);
        assert_eq!(run.report.internalized_count(), 1);
        assert_eq!(run.report.policy, "internalize all");
        assert_eq!(run.report.exposed.len(), 1);
        assert!(run.report.exposure.contains("Lib.Service"));
    }

    #[test]
    fn test_redirect_scope_collapses_merged_units() {
        let units = vec![
            UnitBuilder::primary("App")
                .forward(ForwardedType::new("Ns", "Moved", "Lib"))
                .build(),
            UnitBuilder::secondary("Lib").build(),
        ];
        let run = merge_units(units, &MergeOptions::default(), "Merged").unwrap();
        assert_eq!(run.mappings.exported_type("App", "Ns.Moved").unwrap().scope, "Merged");
    }

    #[test]
    fn test_invalid_options_fail_before_merge() {
        let err = merge_units(units(), &MergeOptions::new(true).exclude("["), "Merged").unwrap_err();
        assert!(matches!(err, MergeError::Options(_)));
    }

    #[test]
    fn test_invalid_model_fails_before_merge() {
        let err = merge_units(vec![UnitBuilder::secondary("Lib").build()], &MergeOptions::default(), "Merged").unwrap_err();
        assert!(matches!(err, MergeError::Model(_)));
    }

    /// Importer that fails on a chosen name and counts calls
    #[derive(Default)]
    struct FailingImporter {
        fail_on: String,
        calls: usize,
    }

    impl Importer for FailingImporter {
        fn import_type(&mut self, ty: &TypeDef, _: &Unit, _: &mut MergedUnit, _: bool) -> Result<(), ImportError> {
            self.calls += 1;
            if ty.full_name == self.fail_on {
                return Err(ImportError::Rejected {
                    name: ty.full_name.clone(),
                    reason: "layout conflict".to_string(),
                });
            }
            Ok(())
        }

        fn import_forwarded_type(&mut self, _: &ForwardedType, _: &Unit, _: &mut MergedUnit) -> Result<(), ImportError> {
            self.calls += 1;
            Ok(())
        }
    }

    #[test]
    fn test_importer_failure_aborts_run() {
        let model = ReferenceModel::new(units()).unwrap();
        let policy = InternalizePolicy::All;
        let mut importer = FailingImporter {
            fail_on: "Lib.Service".to_string(),
            ..Default::default()
        };
        let mut mappings = MappingTable::new("Merged", ["App", "Lib"]);
        let mut dest = MergedUnit::new("Merged");

        let err = MergeOrchestrator::new(&model, &policy, &mut importer, &mut mappings)
            .perform(&mut dest)
            .unwrap_err();

        match err {
            MergeError::Import { phase, source } => {
                assert_eq!(phase, MergePhase::MergeTypes);
                assert_eq!(
                    source,
                    ImportError::Rejected {
                        name: "Lib.Service".to_string(),
                        reason: "layout conflict".to_string(),
                    }
                );
            }
            other => panic!("unexpected error: {other}"),
        }
        // App.Main, then the failing Lib.Service; nothing after it
        assert_eq!(importer.calls, 2);
        assert!(mappings.is_empty());
    }
}
