use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// The four record kinds handled by the sync engine.
///
/// They form a strict tree: Institution is the root, every Visit belongs to
/// one Institution, every Dish to one Visit and every Ingredient to one Dish.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityType {
    Institution,
    Visit,
    Dish,
    Ingredient,
}

impl EntityType {
    /// Root-to-leaf processing order. A type never precedes its parent.
    pub const SYNC_ORDER: [EntityType; 4] = [
        EntityType::Institution,
        EntityType::Visit,
        EntityType::Dish,
        EntityType::Ingredient,
    ];

    pub fn parent(&self) -> Option<EntityType> {
        match self {
            EntityType::Institution => None,
            EntityType::Visit => Some(EntityType::Institution),
            EntityType::Dish => Some(EntityType::Visit),
            EntityType::Ingredient => Some(EntityType::Dish),
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EntityType::Institution => "institution",
            EntityType::Visit => "visit",
            EntityType::Dish => "dish",
            EntityType::Ingredient => "ingredient",
        }
    }

    /// Human-readable label used in error summaries.
    pub fn label(&self) -> &'static str {
        match self {
            EntityType::Institution => "Institution",
            EntityType::Visit => "Visit",
            EntityType::Dish => "Dish",
            EntityType::Ingredient => "Ingredient",
        }
    }

    /// Collection name on the remote API (`/auditoria/<collection>/`).
    pub fn collection(&self) -> &'static str {
        match self {
            EntityType::Institution => "instituciones",
            EntityType::Visit => "visitas",
            EntityType::Dish => "platos",
            EntityType::Ingredient => "ingredientes",
        }
    }

    /// Name of the foreign-key field pointing at the parent in remote payloads.
    pub fn parent_field(&self) -> Option<&'static str> {
        match self {
            EntityType::Institution => None,
            EntityType::Visit => Some("institucion"),
            EntityType::Dish => Some("visita"),
            EntityType::Ingredient => Some("plato"),
        }
    }
}

impl fmt::Display for EntityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for EntityType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "institution" | "institutions" => Ok(EntityType::Institution),
            "visit" | "visits" => Ok(EntityType::Visit),
            "dish" | "dishes" => Ok(EntityType::Dish),
            "ingredient" | "ingredients" => Ok(EntityType::Ingredient),
            _ => Err(format!(
                "Invalid entity type '{}'. Valid options: institution, visit, dish, ingredient",
                s
            )),
        }
    }
}
