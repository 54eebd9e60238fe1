// 🏷️ Tile Taxonomies
// Unit type and unit formation, the two independent classification dimensions.
// The string form of each category is also its template directory name.

use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::hash::Hash;

/// A closed set of categories that templates can be sorted into
pub trait Taxonomy: Copy + Eq + Hash + Debug + Send + Sync + 'static {
    /// Directory holding this taxonomy's templates
    const TEMPLATE_DIR: &'static str;

    fn all() -> &'static [Self];

    fn as_str(&self) -> &'static str;
}

// ============================================================================
// UNIT TYPE
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitType {
    Armor,
    Artillery,
    Headquarters,
    Infantry,
    Mechinf,
    Missile,
    Navy,
    Reconaissance,
    AmphibArmor,
    AmphibMechinf,
    AmphibRecon,
}

impl Taxonomy for UnitType {
    const TEMPLATE_DIR: &'static str = "unit_type_templates";

    fn all() -> &'static [Self] {
        &[
            UnitType::Armor,
            UnitType::Artillery,
            UnitType::Headquarters,
            UnitType::Infantry,
            UnitType::Mechinf,
            UnitType::Missile,
            UnitType::Navy,
            UnitType::Reconaissance,
            UnitType::AmphibArmor,
            UnitType::AmphibMechinf,
            UnitType::AmphibRecon,
        ]
    }

    fn as_str(&self) -> &'static str {
        match self {
            UnitType::Armor => "ARMOR",
            UnitType::Artillery => "ARTILLERY",
            UnitType::Headquarters => "HEADQUARTERS",
            UnitType::Infantry => "INFANTRY",
            UnitType::Mechinf => "MECHINF",
            UnitType::Missile => "MISSILE",
            UnitType::Navy => "NAVY",
            UnitType::Reconaissance => "RECONAISSANCE",
            UnitType::AmphibArmor => "AMPHIB_ARMOR",
            UnitType::AmphibMechinf => "AMPHIB_MECHINF",
            UnitType::AmphibRecon => "AMPHIB_RECON",
        }
    }
}

// ============================================================================
// UNIT FORMATION
// ============================================================================

/// Echelon, largest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum UnitFormation {
    Front,
    Army,
    Corps,
    Division,
    Brigade,
    Regiment,
    Battalion,
    Company,
}

impl UnitFormation {
    /// Default for typed tiles that show no formation pips
    pub const SMALLEST: UnitFormation = UnitFormation::Company;
}

impl Taxonomy for UnitFormation {
    const TEMPLATE_DIR: &'static str = "unit_formation_templates";

    fn all() -> &'static [Self] {
        &[
            UnitFormation::Front,
            UnitFormation::Army,
            UnitFormation::Corps,
            UnitFormation::Division,
            UnitFormation::Brigade,
            UnitFormation::Regiment,
            UnitFormation::Battalion,
            UnitFormation::Company,
        ]
    }

    fn as_str(&self) -> &'static str {
        match self {
            UnitFormation::Front => "FRONT",
            UnitFormation::Army => "ARMY",
            UnitFormation::Corps => "CORPS",
            UnitFormation::Division => "DIVISION",
            UnitFormation::Brigade => "BRIGADE",
            UnitFormation::Regiment => "REGIMENT",
            UnitFormation::Battalion => "BATTALION",
            UnitFormation::Company => "COMPANY",
        }
    }
}
