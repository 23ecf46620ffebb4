//! # Content Catalog
//!
//! Compiled-in table of content variants and the noise point each one is
//! "found at".
//!
//! An entry only targets the axes it cares about. Its distance to a sampled
//! [`NoisePoint`] is the weighted mean absolute difference over those axes.

use crate::content::{PopulationKind, StructureKind, TerrainKind};
use crate::noise::{NoiseAxis, NoisePoint};

/// Content layers, in resolution order.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Layer {
    /// Ground type.
    Terrain,
    /// Buildings on the ground.
    Structure,
    /// Who lives there.
    Population,
}

impl Layer {
    /// Every layer, in resolution order.
    pub const ALL: [Self; 3] = [Self::Terrain, Self::Structure, Self::Population];

    /// Lowercase name, also the tile record key.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Terrain => "terrain",
            Self::Structure => "structure",
            Self::Population => "population",
        }
    }
}

/// Target value and weight along one axis.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct AxisTarget {
    /// Axis this target applies to.
    pub axis: NoiseAxis,
    /// Ideal noise value.
    pub value: f64,
    /// Importance relative to the entry's other targets.
    pub weight: f64,
}

impl AxisTarget {
    /// Creates a target.
    #[must_use]
    pub const fn new(axis: NoiseAxis, value: f64, weight: f64) -> Self {
        Self {
            axis,
            value,
            weight,
        }
    }
}

/// One resolvable variant of a layer.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CatalogEntry<K> {
    /// The variant this entry produces.
    pub kind: K,
    /// Where in noise space the variant lives.
    pub targets: &'static [AxisTarget],
}

impl<K> CatalogEntry<K> {
    /// Weighted mean absolute difference between `point` and this entry's targets.
    ///
    /// An entry without targets (or with all-zero weights) is infinitely far away.
    #[must_use]
    pub fn distance(&self, point: &NoisePoint) -> f64 {
        let mut weighted = 0.0;
        let mut weight_sum = 0.0;
        for target in self.targets {
            weighted += target.weight * (point.get(target.axis) - target.value).abs();
            weight_sum += target.weight;
        }
        if weight_sum > 0.0 {
            weighted / weight_sum
        } else {
            f64::INFINITY
        }
    }
}

const fn at(axis: NoiseAxis, value: f64) -> AxisTarget {
    AxisTarget::new(axis, value, 1.0)
}

/// Terrain variants. Every tile gets the nearest one.
pub const TERRAIN: &[CatalogEntry<TerrainKind>] = &[
    CatalogEntry {
        kind: TerrainKind::Field,
        targets: &[at(NoiseAxis::Height, 0.5)],
    },
    CatalogEntry {
        kind: TerrainKind::Mountain,
        targets: &[at(NoiseAxis::Height, 0.8)],
    },
    CatalogEntry {
        kind: TerrainKind::Ocean,
        targets: &[at(NoiseAxis::Height, 0.2)],
    },
    CatalogEntry {
        kind: TerrainKind::Shore,
        targets: &[at(NoiseAxis::Height, 0.35)],
    },
];

/// Structure variants.
pub const STRUCTURE: &[CatalogEntry<StructureKind>] = &[
    CatalogEntry {
        kind: StructureKind::Village,
        targets: &[at(NoiseAxis::Population, 0.65), at(NoiseAxis::Hostility, 0.4)],
    },
    CatalogEntry {
        kind: StructureKind::Kingdom,
        targets: &[at(NoiseAxis::Population, 0.8), at(NoiseAxis::Hostility, 0.35)],
    },
    CatalogEntry {
        kind: StructureKind::BanditCamp,
        targets: &[at(NoiseAxis::Hostility, 0.75), at(NoiseAxis::Population, 0.5)],
    },
];

/// Population variants.
pub const POPULATION: &[CatalogEntry<PopulationKind>] = &[
    CatalogEntry {
        kind: PopulationKind::Human,
        targets: &[
            at(NoiseAxis::Height, 0.5),
            at(NoiseAxis::Temperature, 0.5),
            at(NoiseAxis::Humidity, 0.5),
            AxisTarget::new(NoiseAxis::Population, 0.7, 2.0),
        ],
    },
    CatalogEntry {
        kind: PopulationKind::Dwarf,
        targets: &[
            AxisTarget::new(NoiseAxis::Height, 0.8, 2.0),
            at(NoiseAxis::Population, 0.6),
        ],
    },
    CatalogEntry {
        kind: PopulationKind::Elf,
        targets: &[
            AxisTarget::new(NoiseAxis::Humidity, 0.7, 2.0),
            at(NoiseAxis::Population, 0.6),
        ],
    },
    CatalogEntry {
        kind: PopulationKind::Demon,
        targets: &[at(NoiseAxis::Temperature, 0.8), at(NoiseAxis::Hostility, 0.8)],
    },
];
