//! # Tile Content
//!
//! The three content layers of a tile, as closed enums carrying their mutable
//! substate.
//!
//! Each layer has a matching `*Kind` enum (the catalog's variant id) and a
//! visit hook. Hooks only touch their own layer's substate; everything else
//! about the tile reaches them as a read-only [`VisitContext`].

use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::catalog::{self, CatalogEntry, Layer};
use crate::random::SeededRandomStream;

/// Terrain variant ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum TerrainKind {
    /// Open land.
    Field,
    /// High ground.
    Mountain,
    /// Deep water.
    Ocean,
    /// Shallow water at the coast.
    Shore,
}

impl TerrainKind {
    /// Every terrain kind.
    pub const ALL: [Self; 4] = [Self::Field, Self::Mountain, Self::Ocean, Self::Shore];

    /// Record tag.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::Field => "field",
            Self::Mountain => "mountain",
            Self::Ocean => "ocean",
            Self::Shore => "shore",
        }
    }
}

/// Structure variant ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum StructureKind {
    /// Nothing built here.
    None,
    /// Small settlement.
    Village,
    /// Large settlement.
    Kingdom,
    /// Hostile camp.
    BanditCamp,
}

impl StructureKind {
    /// Every structure kind.
    pub const ALL: [Self; 4] = [Self::None, Self::Village, Self::Kingdom, Self::BanditCamp];

    /// Record tag.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Village => "village",
            Self::Kingdom => "kingdom",
            Self::BanditCamp => "bandit_camp",
        }
    }
}

/// Population variant ids.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum PopulationKind {
    /// Nobody.
    None,
    /// Humans.
    Human,
    /// Dwarves.
    Dwarf,
    /// Elves.
    Elf,
    /// Demons.
    Demon,
}

impl PopulationKind {
    /// Every population kind.
    pub const ALL: [Self; 5] = [Self::None, Self::Human, Self::Dwarf, Self::Elf, Self::Demon];

    /// Record tag.
    #[must_use]
    pub const fn name(self) -> &'static str {
        match self {
            Self::None => "none",
            Self::Human => "human",
            Self::Dwarf => "dwarf",
            Self::Elf => "elf",
            Self::Demon => "demon",
        }
    }
}

macro_rules! display_by_name {
    ($($kind:ty),*) => {
        $(
            impl fmt::Display for $kind {
                fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                    f.write_str(self.name())
                }
            }
        )*
    };
}

display_by_name!(TerrainKind, StructureKind, PopulationKind);

/// Terrain layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Terrain {
    /// Open land.
    Field,
    /// High ground.
    Mountain {
        /// Peak height in meters.
        height: u32,
    },
    /// Deep water.
    Ocean {
        /// Depth in meters.
        depth: u32,
    },
    /// Shallow water.
    Shore {
        /// Depth in meters.
        depth: u32,
    },
}

/// Structure layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Structure {
    /// Nothing built here.
    None,
    /// Small settlement.
    Village {
        /// Inhabitants.
        population: u32,
        /// Times a player came by.
        visitors: u32,
    },
    /// Large settlement.
    Kingdom {
        /// Inhabitants.
        population: u32,
        /// Times a player came by.
        visitors: u32,
    },
    /// Hostile camp.
    BanditCamp {
        /// Bandits in the camp.
        bandits: u32,
    },
}

/// Population layer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Population {
    /// Nobody.
    None,
    /// Humans.
    Human {
        /// Head count.
        amount: u32,
    },
    /// Dwarves.
    Dwarf {
        /// Head count.
        amount: u32,
    },
    /// Elves.
    Elf {
        /// Head count.
        amount: u32,
    },
    /// Demons.
    Demon {
        /// Head count.
        amount: u32,
    },
}

/// Read-only view of the visited tile handed to visit hooks.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct VisitContext {
    /// Position inside the chunk.
    pub relative_position: (i64, i64),
    /// Visit count, including the visit in progress.
    pub visited: u32,
    /// Terrain of the tile.
    pub terrain: TerrainKind,
    /// Structure on the tile.
    pub structure: StructureKind,
    /// Population of the tile.
    pub population: PopulationKind,
}

/// Something that happened while visiting a tile.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum VisitEvent {
    /// Climbed a mountain.
    MountainClimbed {
        /// Peak height.
        height: u32,
    },
    /// Crossed open water.
    WaterCrossed {
        /// Ocean or shore.
        terrain: TerrainKind,
        /// Water depth.
        depth: u32,
    },
    /// Entered a village or kingdom.
    SettlementEntered {
        /// Village or kingdom.
        kind: StructureKind,
        /// Inhabitants.
        population: u32,
        /// Visitor count after this visit.
        visitors: u32,
    },
    /// Walked into a bandit camp.
    BanditsEncountered {
        /// Bandits in the camp.
        bandits: u32,
    },
    /// Met the locals.
    PeopleMet {
        /// Who.
        kind: PopulationKind,
        /// How many.
        amount: u32,
        /// Whether they live in a structure.
        settled: bool,
    },
}

/// A content layer resolvable from the catalog.
pub trait ContentLayer: Clone + Serialize + DeserializeOwned + Sized {
    /// Catalog variant id.
    type Kind: Copy + Eq + fmt::Debug + fmt::Display + 'static;

    /// Which layer this is.
    const LAYER: Layer;

    /// Variant used when no catalog entry qualifies.
    const FALLBACK: Self::Kind;

    /// Default difference limit, `None` if the nearest entry always wins.
    const DIFFERENCE_LIMIT: Option<f64>;

    /// The layer's catalog entries, in declaration order.
    fn catalog() -> &'static [CatalogEntry<Self::Kind>];

    /// Variant id of this value.
    fn kind(&self) -> Self::Kind;

    /// Builds a fresh value of `kind`, drawing its substate from `stream`.
    fn generate(kind: Self::Kind, stream: &mut SeededRandomStream) -> Self;

    /// Runs this layer's visit hook.
    fn visit(&mut self, context: &VisitContext) -> Option<VisitEvent>;
}

impl ContentLayer for Terrain {
    type Kind = TerrainKind;

    const LAYER: Layer = Layer::Terrain;
    const FALLBACK: TerrainKind = TerrainKind::Field;
    const DIFFERENCE_LIMIT: Option<f64> = None;

    fn catalog() -> &'static [CatalogEntry<TerrainKind>] {
        catalog::TERRAIN
    }

    fn kind(&self) -> TerrainKind {
        match self {
            Self::Field => TerrainKind::Field,
            Self::Mountain { .. } => TerrainKind::Mountain,
            Self::Ocean { .. } => TerrainKind::Ocean,
            Self::Shore { .. } => TerrainKind::Shore,
        }
    }

    fn generate(kind: TerrainKind, stream: &mut SeededRandomStream) -> Self {
        match kind {
            TerrainKind::Field => Self::Field,
            TerrainKind::Mountain => Self::Mountain {
                height: stream.next_in_range(500, 10_000),
            },
            TerrainKind::Ocean => Self::Ocean {
                depth: stream.next_in_range(100, 10_000),
            },
            TerrainKind::Shore => Self::Shore {
                depth: stream.next_in_range(1, 100),
            },
        }
    }

    fn visit(&mut self, _context: &VisitContext) -> Option<VisitEvent> {
        match *self {
            Self::Field => None,
            Self::Mountain { height } => Some(VisitEvent::MountainClimbed { height }),
            Self::Ocean { depth } => Some(VisitEvent::WaterCrossed {
                terrain: TerrainKind::Ocean,
                depth,
            }),
            Self::Shore { depth } => Some(VisitEvent::WaterCrossed {
                terrain: TerrainKind::Shore,
                depth,
            }),
        }
    }
}

impl ContentLayer for Structure {
    type Kind = StructureKind;

    const LAYER: Layer = Layer::Structure;
    const FALLBACK: StructureKind = StructureKind::None;
    const DIFFERENCE_LIMIT: Option<f64> = Some(0.2);

    fn catalog() -> &'static [CatalogEntry<StructureKind>] {
        catalog::STRUCTURE
    }

    fn kind(&self) -> StructureKind {
        match self {
            Self::None => StructureKind::None,
            Self::Village { .. } => StructureKind::Village,
            Self::Kingdom { .. } => StructureKind::Kingdom,
            Self::BanditCamp { .. } => StructureKind::BanditCamp,
        }
    }

    fn generate(kind: StructureKind, stream: &mut SeededRandomStream) -> Self {
        match kind {
            StructureKind::None => Self::None,
            StructureKind::Village => Self::Village {
                population: stream.next_in_range(50, 1_000),
                visitors: 0,
            },
            StructureKind::Kingdom => Self::Kingdom {
                population: stream.next_in_range(1_000, 10_000),
                visitors: 0,
            },
            StructureKind::BanditCamp => Self::BanditCamp {
                bandits: stream.next_in_range(5, 50),
            },
        }
    }

    fn visit(&mut self, _context: &VisitContext) -> Option<VisitEvent> {
        match self {
            Self::None => None,
            Self::Village {
                population,
                visitors,
            } => {
                *visitors = visitors.saturating_add(1);
                Some(VisitEvent::SettlementEntered {
                    kind: StructureKind::Village,
                    population: *population,
                    visitors: *visitors,
                })
            }
            Self::Kingdom {
                population,
                visitors,
            } => {
                *visitors = visitors.saturating_add(1);
                Some(VisitEvent::SettlementEntered {
                    kind: StructureKind::Kingdom,
                    population: *population,
                    visitors: *visitors,
                })
            }
            Self::BanditCamp { bandits } => Some(VisitEvent::BanditsEncountered { bandits: *bandits }),
        }
    }
}

impl ContentLayer for Population {
    type Kind = PopulationKind;

    const LAYER: Layer = Layer::Population;
    const FALLBACK: PopulationKind = PopulationKind::None;
    const DIFFERENCE_LIMIT: Option<f64> = Some(0.15);

    fn catalog() -> &'static [CatalogEntry<PopulationKind>] {
        catalog::POPULATION
    }

    fn kind(&self) -> PopulationKind {
        match self {
            Self::None => PopulationKind::None,
            Self::Human { .. } => PopulationKind::Human,
            Self::Dwarf { .. } => PopulationKind::Dwarf,
            Self::Elf { .. } => PopulationKind::Elf,
            Self::Demon { .. } => PopulationKind::Demon,
        }
    }

    fn generate(kind: PopulationKind, stream: &mut SeededRandomStream) -> Self {
        match kind {
            PopulationKind::None => Self::None,
            PopulationKind::Human => Self::Human {
                amount: stream.next_in_range(1, 1_000),
            },
            PopulationKind::Dwarf => Self::Dwarf {
                amount: stream.next_in_range(1, 300),
            },
            PopulationKind::Elf => Self::Elf {
                amount: stream.next_in_range(1, 200),
            },
            PopulationKind::Demon => Self::Demon {
                amount: stream.next_in_range(1, 50),
            },
        }
    }

    fn visit(&mut self, context: &VisitContext) -> Option<VisitEvent> {
        let amount = match *self {
            Self::None => return None,
            Self::Human { amount }
            | Self::Dwarf { amount }
            | Self::Elf { amount }
            | Self::Demon { amount } => amount,
        };
        Some(VisitEvent::PeopleMet {
            kind: self.kind(),
            amount,
            settled: context.structure != StructureKind::None,
        })
    }
}
