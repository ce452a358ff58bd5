// THEORY:
// The `module` file holds the most fundamental data of the system: a single
// physical calorimeter tile (`Module`) and the table that owns all of them
// (`ModuleTable`). Like a pixel in an image, a module is a "dumb" data
// container: it knows where it is and how big it is, nothing about clusters or
// nodes.
//
// Key principles:
// 1.  **Immutable after construction**: the table is built once by the layout
//     reader and only read afterwards. Every later stage borrows it.
// 2.  **Ordered by id**: the table is a `BTreeMap`, so iteration is always in
//     ascending id order. Any "first encountered" rule downstream therefore
//     means "lowest id", independent of file order or hashing.
// 3.  **Exact rows**: modules share a row when their center y-coordinates are
//     bit-for-bit equal. `RowKey` gives that comparison a total order.

use std::cmp::Ordering;
use std::collections::{BTreeMap, BTreeSet};

/// A position in millimetres.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

/// The three tile sizes the detector is built from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum SizeClass {
    S42,
    S40,
    S38,
}

impl SizeClass {
    pub const ALL: [SizeClass; 3] = [SizeClass::S42, SizeClass::S40, SizeClass::S38];

    /// Maps the `type` column of the layout file to a size class.
    pub fn from_type(value: i64) -> Option<Self> {
        match value {
            42 => Some(SizeClass::S42),
            40 => Some(SizeClass::S40),
            38 => Some(SizeClass::S38),
            _ => None,
        }
    }

    /// Side length of the square tile in millimetres.
    pub fn side(&self) -> f64 {
        match self {
            SizeClass::S42 => 42.0,
            SizeClass::S40 => 40.0,
            SizeClass::S38 => 38.0,
        }
    }

    pub fn label(&self) -> u32 {
        self.side() as u32
    }
}

/// A single detector tile.
#[derive(Debug, Clone, PartialEq)]
pub struct Module {
    pub id: u32,
    pub center: Point,
    /// Side of the square footprint in millimetres.
    pub size: f64,
    pub size_class: SizeClass,
}

impl Module {
    pub fn new(id: u32, center: Point, size_class: SizeClass) -> Self {
        Self {
            id,
            center,
            size: size_class.side(),
            size_class,
        }
    }

    pub fn half_size(&self) -> f64 {
        0.5 * self.size
    }

    pub fn row_key(&self) -> RowKey {
        RowKey::new(self.center.y)
    }
}

/// Totally ordered wrapper around a row's y-coordinate.
#[derive(Debug, Clone, Copy)]
pub struct RowKey(f64);

impl RowKey {
    pub fn new(y: f64) -> Self {
        // Adding 0.0 folds -0.0 into 0.0 so both land in the same row.
        Self(y + 0.0)
    }

    pub fn y(&self) -> f64 {
        self.0
    }
}

impl PartialEq for RowKey {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for RowKey {}

impl PartialOrd for RowKey {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for RowKey {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

/// Axis-aligned extent of the module centers.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min_x: f64,
    pub max_x: f64,
    pub min_y: f64,
    pub max_y: f64,
}

impl Bounds {
    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }
}

/// Counts printed in the detector summary and in the report header.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ModuleCounts {
    pub s42: usize,
    pub s40: usize,
    pub s38: usize,
}

impl ModuleCounts {
    pub fn total(&self) -> usize {
        self.s42 + self.s40 + self.s38
    }
}

/// The id-keyed table of every module in the detector.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ModuleTable {
    modules: BTreeMap<u32, Module>,
}

impl ModuleTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts a module. Returns `false` and leaves the table untouched if the id exists.
    pub fn insert(&mut self, module: Module) -> bool {
        if self.modules.contains_key(&module.id) {
            return false;
        }
        self.modules.insert(module.id, module);
        true
    }

    pub fn get(&self, id: u32) -> Option<&Module> {
        self.modules.get(&id)
    }

    pub fn contains(&self, id: u32) -> bool {
        self.modules.contains_key(&id)
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Modules in ascending id order.
    pub fn iter(&self) -> impl Iterator<Item = &Module> {
        self.modules.values()
    }

    /// Derives a region of the detector with the given cells removed.
    pub fn excluding(&self, excluded: &BTreeSet<u32>) -> ModuleTable {
        let modules = self
            .modules
            .iter()
            .filter(|(id, _)| !excluded.contains(id))
            .map(|(id, module)| (*id, module.clone()))
            .collect();
        ModuleTable { modules }
    }

    /// Extent of the module centers, `None` for an empty table.
    pub fn bounds(&self) -> Option<Bounds> {
        let mut iter = self.modules.values();
        let first = iter.next()?;
        let mut bounds = Bounds {
            min_x: first.center.x,
            max_x: first.center.x,
            min_y: first.center.y,
            max_y: first.center.y,
        };
        for module in iter {
            bounds.min_x = bounds.min_x.min(module.center.x);
            bounds.max_x = bounds.max_x.max(module.center.x);
            bounds.min_y = bounds.min_y.min(module.center.y);
            bounds.max_y = bounds.max_y.max(module.center.y);
        }
        Some(bounds)
    }

    pub fn counts(&self) -> ModuleCounts {
        let mut counts = ModuleCounts::default();
        for module in self.modules.values() {
            match module.size_class {
                SizeClass::S42 => counts.s42 += 1,
                SizeClass::S40 => counts.s40 += 1,
                SizeClass::S38 => counts.s38 += 1,
            }
        }
        counts
    }
}

impl FromIterator<Module> for ModuleTable {
    fn from_iter<I: IntoIterator<Item = Module>>(iter: I) -> Self {
        let mut table = ModuleTable::new();
        for module in iter {
            table.insert(module);
        }
        table
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn table() -> ModuleTable {
        vec![
            Module::new(3, Point::new(-84.0, 0.0), SizeClass::S42),
            Module::new(1, Point::new(0.0, 0.0), SizeClass::S42),
            Module::new(2, Point::new(40.0, 40.0), SizeClass::S40),
            Module::new(7, Point::new(78.0, -38.0), SizeClass::S38),
        ]
        .into_iter()
        .collect()
    }

    #[test]
    fn iterates_in_id_order() {
        let ids: Vec<u32> = table().iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![1, 2, 3, 7]);
    }

    #[test]
    fn rejects_duplicate_ids() {
        let mut table = table();
        assert!(!table.insert(Module::new(1, Point::new(500.0, 500.0), SizeClass::S38)));
        assert_eq!(table.get(1).map(|m| m.center), Some(Point::new(0.0, 0.0)));
    }

    #[test]
    fn bounds_and_counts() {
        let table = table();
        let bounds = table.bounds().expect("non-empty table");
        assert_eq!(bounds.min_x, -84.0);
        assert_eq!(bounds.max_x, 78.0);
        assert_eq!(bounds.min_y, -38.0);
        assert_eq!(bounds.max_y, 40.0);
        assert_eq!(table.counts(), ModuleCounts { s42: 2, s40: 1, s38: 1 });
        assert_eq!(table.counts().total(), 4);
        assert!(ModuleTable::new().bounds().is_none());
    }

    #[test]
    fn excluding_derives_a_region() {
        let excluded: BTreeSet<u32> = [2, 7, 99].into_iter().collect();
        let region = table().excluding(&excluded);
        assert_eq!(region.len(), 2);
        assert!(region.contains(1));
        assert!(!region.contains(7));
    }

    #[test]
    fn row_keys_fold_negative_zero() {
        assert_eq!(RowKey::new(-0.0), RowKey::new(0.0));
        assert!(RowKey::new(-40.0) < RowKey::new(0.0));
    }
}
