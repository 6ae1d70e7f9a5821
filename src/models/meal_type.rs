use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Meal observed during an audit visit.
///
/// Serialized with the remote API's vocabulary.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum MealType {
    #[serde(rename = "desayuno")]
    Breakfast,
    #[serde(rename = "almuerzo")]
    Lunch,
    #[serde(rename = "merienda")]
    Snack,
    #[serde(rename = "cena")]
    Dinner,
    #[serde(rename = "vianda")]
    PackedMeal,
}

impl fmt::Display for MealType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MealType::Breakfast => write!(f, "desayuno"),
            MealType::Lunch => write!(f, "almuerzo"),
            MealType::Snack => write!(f, "merienda"),
            MealType::Dinner => write!(f, "cena"),
            MealType::PackedMeal => write!(f, "vianda"),
        }
    }
}

impl FromStr for MealType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "desayuno" | "breakfast" => Ok(MealType::Breakfast),
            "almuerzo" | "lunch" => Ok(MealType::Lunch),
            "merienda" | "snack" => Ok(MealType::Snack),
            "cena" | "dinner" => Ok(MealType::Dinner),
            "vianda" | "packed" => Ok(MealType::PackedMeal),
            _ => Err(format!(
                "Invalid meal type '{}'. Valid options: desayuno, almuerzo, merienda, cena, vianda",
                s
            )),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_meal_type_display() {
        assert_eq!(format!("{}", MealType::Breakfast), "desayuno");
        assert_eq!(format!("{}", MealType::Lunch), "almuerzo");
        assert_eq!(format!("{}", MealType::Snack), "merienda");
        assert_eq!(format!("{}", MealType::Dinner), "cena");
        assert_eq!(format!("{}", MealType::PackedMeal), "vianda");
    }

    #[test]
    fn test_meal_type_from_str() {
        assert_eq!(MealType::from_str("desayuno").unwrap(), MealType::Breakfast);
        assert_eq!(MealType::from_str("ALMUERZO").unwrap(), MealType::Lunch);
        assert_eq!(MealType::from_str("Dinner").unwrap(), MealType::Dinner);
        assert_eq!(MealType::from_str("vianda").unwrap(), MealType::PackedMeal);
    }

    #[test]
    fn test_meal_type_from_str_invalid() {
        assert!(MealType::from_str("brunch").is_err());
        assert!(MealType::from_str("").is_err());
    }

    #[test]
    fn test_meal_type_serializes_remote_vocabulary() {
        let json = serde_json::to_string(&MealType::Snack).unwrap();
        assert_eq!(json, "\"merienda\"");

        let parsed: MealType = serde_json::from_str("\"cena\"").unwrap();
        assert_eq!(parsed, MealType::Dinner);
    }
}
