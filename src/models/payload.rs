use serde::{Deserialize, Serialize};
use std::fmt;

use super::{Dish, EntityType, Ingredient, Institution, LocalId, RemoteId, Visit};

/// Reference from a child record to its parent.
///
/// Starts out as the parent's local id; the resolver swaps it for the
/// parent's remote id before the child is pushed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "lowercase")]
pub enum ParentRef {
    Local(LocalId),
    Remote(RemoteId),
}

impl ParentRef {
    /// The integer sent to the remote API, whichever side it came from.
    pub fn wire_value(&self) -> i64 {
        match self {
            ParentRef::Local(id) => id.0,
            ParentRef::Remote(id) => id.0,
        }
    }

    pub fn is_resolved(&self) -> bool {
        matches!(self, ParentRef::Remote(_))
    }
}

impl fmt::Display for ParentRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParentRef::Local(id) => write!(f, "local:{}", id),
            ParentRef::Remote(id) => write!(f, "remote:{}", id),
        }
    }
}

/// A uniqueness key the remote system enforces independently of its ids.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NaturalKey {
    pub field: &'static str,
    pub value: String,
}

/// Entity body, one fixed shape per entity type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Payload {
    Institution(Institution),
    Visit(Visit),
    Dish(Dish),
    Ingredient(Ingredient),
}

impl Payload {
    pub fn entity_type(&self) -> EntityType {
        match self {
            Payload::Institution(_) => EntityType::Institution,
            Payload::Visit(_) => EntityType::Visit,
            Payload::Dish(_) => EntityType::Dish,
            Payload::Ingredient(_) => EntityType::Ingredient,
        }
    }

    pub fn parent_ref(&self) -> Option<ParentRef> {
        match self {
            Payload::Institution(_) => None,
            Payload::Visit(visit) => Some(visit.institution),
            Payload::Dish(dish) => Some(dish.visit),
            Payload::Ingredient(ingredient) => Some(ingredient.dish),
        }
    }

    /// Returns a copy pointing at `parent`. Institutions have no parent and
    /// are returned unchanged.
    pub fn with_parent(&self, parent: ParentRef) -> Payload {
        match self {
            Payload::Institution(_) => self.clone(),
            Payload::Visit(visit) => Payload::Visit(Visit {
                institution: parent,
                ..visit.clone()
            }),
            Payload::Dish(dish) => Payload::Dish(Dish {
                visit: parent,
                ..dish.clone()
            }),
            Payload::Ingredient(ingredient) => Payload::Ingredient(Ingredient {
                dish: parent,
                ..ingredient.clone()
            }),
        }
    }

    pub fn natural_key(&self) -> Option<NaturalKey> {
        match self {
            Payload::Institution(institution) => Some(NaturalKey {
                field: "codigo",
                value: institution.code.clone(),
            }),
            Payload::Visit(_) | Payload::Dish(_) | Payload::Ingredient(_) => None,
        }
    }
}

impl fmt::Display for Payload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Payload::Institution(institution) => write!(f, "{}", institution),
            Payload::Visit(visit) => write!(f, "{}", visit),
            Payload::Dish(dish) => write!(f, "{}", dish),
            Payload::Ingredient(ingredient) => write!(f, "{}", ingredient),
        }
    }
}

impl From<Institution> for Payload {
    fn from(value: Institution) -> Self {
        Payload::Institution(value)
    }
}

impl From<Visit> for Payload {
    fn from(value: Visit) -> Self {
        Payload::Visit(value)
    }
}

impl From<Dish> for Payload {
    fn from(value: Dish) -> Self {
        Payload::Dish(value)
    }
}

impl From<Ingredient> for Payload {
    fn from(value: Ingredient) -> Self {
        Payload::Ingredient(value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::MealType;
    use chrono::NaiveDate;

    fn visit() -> Visit {
        Visit::new(
            ParentRef::Local(LocalId(1)),
            NaiveDate::from_ymd_opt(2024, 5, 2).unwrap(),
            MealType::Lunch,
        )
    }

    #[test]
    fn test_with_parent_replaces_only_parent() {
        let payload = Payload::from(visit().with_notes("sin sal"));
        let rewritten = payload.with_parent(ParentRef::Remote(RemoteId(501)));

        assert_eq!(rewritten.parent_ref(), Some(ParentRef::Remote(RemoteId(501))));
        match rewritten {
            Payload::Visit(v) => assert_eq!(v.notes.as_deref(), Some("sin sal")),
            other => panic!("unexpected payload {:?}", other),
        }
    }

    #[test]
    fn test_with_parent_ignores_institution() {
        let payload = Payload::from(Institution::new("ESC001", "Escuela 1", "escuela"));
        let rewritten = payload.with_parent(ParentRef::Remote(RemoteId(9)));
        assert_eq!(payload, rewritten);
    }

    #[test]
    fn test_natural_key_only_for_institution() {
        let institution = Payload::from(Institution::new("ESC001", "Escuela 1", "escuela"));
        assert_eq!(
            institution.natural_key(),
            Some(NaturalKey {
                field: "codigo",
                value: "ESC001".to_string()
            })
        );
        assert_eq!(Payload::from(visit()).natural_key(), None);
    }

    #[test]
    fn test_parent_ref_wire_value() {
        assert_eq!(ParentRef::Local(LocalId(17)).wire_value(), 17);
        assert_eq!(ParentRef::Remote(RemoteId(501)).wire_value(), 501);
        assert!(!ParentRef::Local(LocalId(17)).is_resolved());
    }

    #[test]
    fn test_payload_json_is_tagged() {
        let payload = Payload::from(Dish::new(ParentRef::Local(LocalId(10)), "Guiso"));
        let json = serde_json::to_value(&payload).unwrap();
        assert_eq!(json["type"], "dish");
        assert_eq!(json["visit"]["kind"], "local");
        assert_eq!(json["visit"]["id"], 10);
    }
}
