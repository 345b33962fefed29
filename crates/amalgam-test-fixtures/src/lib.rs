//! Test fixtures for amalgam merge testing
//!
//! Provides small, representative unit graphs, either in memory or written to
//! a temporary directory as unit JSON files plus a merge configuration.

use amalgam_core::model::{ForwardedType, Property, TypeBuilder, TypeRef, Unit, UnitBuilder};
use serde_json::json;
use std::fs;
use std::path::{Path, PathBuf};

/// Test fixture categories
pub enum FixtureType {
    /// One primary and one secondary unit, the primary exposing one type
    AppWithLibrary,
    /// A secondary unit forwarding a name that another secondary defines
    LegacyForward,
    /// Secondary types only reachable through nested generic arguments
    NestedGenerics,
}

/// Paths of the files written for a fixture
#[derive(Debug, Clone)]
pub struct FixturePaths {
    pub root: PathBuf,
    pub primary: PathBuf,
    pub secondaries: Vec<PathBuf>,
    pub config: PathBuf,
}

/// Main test fixtures provider
pub struct TestFixtures {
    temp_dir: Option<tempfile::TempDir>,
}

impl Default for TestFixtures {
    fn default() -> Self {
        Self::new()
    }
}

impl TestFixtures {
    pub fn new() -> Self {
        Self { temp_dir: None }
    }

    /// Write the fixture's units and an `internalize = true` configuration
    /// into a fresh temporary directory
    pub fn setup(&mut self, fixture_type: FixtureType) -> FixturePaths {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path().to_path_buf();

        let units = match fixture_type {
            FixtureType::AppWithLibrary => app_with_library(),
            FixtureType::LegacyForward => legacy_forward(),
            FixtureType::NestedGenerics => nested_generics(),
        };

        let paths = write_units(&root, &units);
        self.temp_dir = Some(dir);
        paths
    }
}

fn write_units(root: &Path, units: &[Unit]) -> FixturePaths {
    let mut primary = None;
    let mut secondaries = Vec::new();

    for unit in units {
        let path = root.join(format!("{}.json", unit.name));
        fs::write(&path, serde_json::to_string_pretty(unit).unwrap()).unwrap();
        if unit.is_primary() {
            primary = Some(path);
        } else {
            secondaries.push(path);
        }
    }

    let config = root.join("merge.toml");
    fs::write(&config, "internalize = true\n").unwrap();

    FixturePaths {
        root: root.to_path_buf(),
        primary: primary.expect("fixture has a primary unit"),
        secondaries,
        config,
    }
}

/// `App.Main` returns `Lib.Widget`; `Lib.Widget` exposes `Lib.Part` through a
/// property; `Lib.Internal` is unreachable.
pub fn app_with_library() -> Vec<Unit> {
    vec![
        UnitBuilder::primary("App")
            .add_type(TypeBuilder::new("App.Main").returns("CreateWidget", TypeRef::named("Lib.Widget")))
            .build(),
        UnitBuilder::secondary("Lib")
            .add_type(TypeBuilder::new("Lib.Widget").property(Property::get("Part", TypeRef::named("Lib.Part"))))
            .add_type("Lib.Part")
            .add_type(TypeBuilder::new("Lib.Internal").field("Widget", TypeRef::named("Lib.Widget")))
            .build(),
    ]
}

/// `Compat` forwards `Legacy.Thing` (and a nested `Legacy.Thing/Part`) to
/// `Legacy`; `Core` defines `Legacy.Thing` for real and the primary returns it.
pub fn legacy_forward() -> Vec<Unit> {
    let thing = ForwardedType::new("Legacy", "Thing", "Legacy");
    vec![
        UnitBuilder::primary("App")
            .add_type(TypeBuilder::new("App.Main").returns("GetThing", TypeRef::named("Legacy.Thing")))
            .build(),
        UnitBuilder::secondary("Compat")
            .forward(thing.clone())
            .forward(ForwardedType::new("", "Part", "Legacy").nested_in(thing))
            .forward(ForwardedType::new("Legacy", "Other", "Legacy"))
            .build(),
        UnitBuilder::secondary("Core").add_type("Legacy.Thing").build(),
    ]
}

/// `App.Main` returns `Lib.Box<Ext.List<Lib.Item<Lib.Deep>>>`
pub fn nested_generics() -> Vec<Unit> {
    let reference = TypeRef::generic(
        TypeRef::named("Lib.Box`1"),
        vec![TypeRef::generic(
            TypeRef::named("Ext.List`1"),
            vec![TypeRef::generic(TypeRef::named("Lib.Item`1"), vec![TypeRef::named("Lib.Deep")])],
        )],
    );
    vec![
        UnitBuilder::primary("App")
            .add_type(TypeBuilder::new("App.Main").returns("Get", reference))
            .build(),
        UnitBuilder::secondary("Lib")
            .add_type("Lib.Box`1")
            .add_type("Lib.Item`1")
            .add_type("Lib.Deep")
            .add_type("Lib.Unrelated")
            .build(),
    ]
}

/// Raw JSON for a secondary unit, for tests that exercise deserialization
pub fn raw_secondary_unit() -> serde_json::Value {
    json!({
        "name": "Lib",
        "role": "secondary",
        "types": [
            {
                "full_name": "Lib.Api",
                "methods": [
                    {
                        "name": "Run",
                        "public": true,
                        "return_type": { "kind": "named", "name": "Lib.Result" },
                        "parameters": []
                    }
                ]
            },
            { "full_name": "Lib.Result" }
        ]
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fixtures_are_valid() {
        for units in [app_with_library(), legacy_forward(), nested_generics()] {
            assert_eq!(units.iter().filter(|u| u.is_primary()).count(), 1);
        }

        let unit: Unit = serde_json::from_value(raw_secondary_unit()).unwrap();
        assert_eq!(unit.types.len(), 2);
    }

    #[test]
    fn setup_writes_files() {
        let mut fixtures = TestFixtures::new();
        let paths = fixtures.setup(FixtureType::LegacyForward);

        assert!(paths.primary.exists());
        assert_eq!(paths.secondaries.len(), 2);
        assert!(paths.config.exists());

        let written: Unit = serde_json::from_str(&fs::read_to_string(&paths.secondaries[0]).unwrap()).unwrap();
        assert_eq!(written.forwarded_types[1].full_name(), "Legacy.Thing/Part");
    }
}
