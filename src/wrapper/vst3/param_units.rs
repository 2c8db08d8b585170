//! Parameter hierarchies in VST3 requires you to define units, which are linearly indexed logical
//! units that have a name, a parent, and then a whole bunch of other data like note numbers and
//! MIDI program state. CLAP parameters instead have a slash-separated module path, so we'll
//! convert each unique path prefix to a unit the first time we encounter it.
//!
//! <https://steinbergmedia.github.io/vst3_doc/vstinterfaces/classSteinberg_1_1Vst_1_1IUnitInfo.html>

use std::collections::HashMap;

use vst3_sys::vst::kRootUnitId;

/// `kNoParentUnitId`, missing from vst3-sys.
pub const NO_PARENT_UNIT_ID: i32 = -1;

/// The units the parameters are grouped in. Index 0 is always the root unit, and a unit's ID is
/// always equal to its index.
#[derive(Debug, Clone, PartialEq)]
pub struct ParamUnits {
    /// The units in the order they were created.
    units: Vec<ParamUnit>,
    /// Maps a normalized module path prefix like `Filter/Cutoff` to the unit created for it.
    unit_id_by_path: HashMap<String, i32>,
}

/// A VST3 'unit'. Repurposed for a bunch of things, but we only care about parameter hierarchies.
///
/// <https://steinbergmedia.github.io/vst3_doc/vstinterfaces/structSteinberg_1_1Vst_1_1UnitInfo.html>
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParamUnit {
    pub id: i32,
    /// The ID of the parent unit, or `NO_PARENT_UNIT_ID` for the root unit.
    pub parent_id: i32,
    /// The name of the unit, without any of the proceeding components.
    pub name: String,
}

impl Default for ParamUnits {
    fn default() -> Self {
        Self::new()
    }
}

impl ParamUnits {
    /// A unit list containing only the root unit.
    pub fn new() -> Self {
        Self {
            units: vec![ParamUnit {
                id: kRootUnitId,
                parent_id: NO_PARENT_UNIT_ID,
                name: String::from("Root"),
            }],
            unit_id_by_path: HashMap::new(),
        }
    }

    /// Get the unit for a CLAP module path, creating it and any missing ancestors in the process.
    /// Leading slashes and empty components are ignored, so an empty path or `/` refers to the
    /// root unit.
    pub fn get_or_create_unit(&mut self, module: &str) -> i32 {
        let mut parent_id = kRootUnitId;
        let mut path = String::with_capacity(module.len());
        for component in module.split('/').filter(|component| !component.is_empty()) {
            if !path.is_empty() {
                path.push('/');
            }
            path.push_str(component);

            parent_id = match self.unit_id_by_path.get(&path) {
                Some(unit_id) => *unit_id,
                None => {
                    let unit_id = self.units.len() as i32;
                    self.units.push(ParamUnit {
                        id: unit_id,
                        parent_id,
                        name: component.to_owned(),
                    });
                    self.unit_id_by_path.insert(path.clone(), unit_id);

                    unit_id
                }
            };
        }

        parent_id
    }

    /// The number of units, including the root unit.
    pub fn len(&self) -> usize {
        self.units.len()
    }

    /// There's always a root unit, so this is never empty.
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Get the unit at `index`. Since IDs equal indices, this doubles as a lookup by ID.
    pub fn info(&self, index: usize) -> Option<&ParamUnit> {
        self.units.get(index)
    }

    pub fn unit(&self, unit_id: i32) -> Option<&ParamUnit> {
        usize::try_from(unit_id).ok().and_then(|index| self.units.get(index))
    }
}
