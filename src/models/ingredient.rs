use serde::{Deserialize, Serialize};
use std::fmt;

use super::ParentRef;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Ingredient {
    pub dish: ParentRef,
    /// Food reference in the remote nutrition catalogue.
    pub food_code: i64,
    pub quantity: f64,
    pub unit: String,
}

impl Ingredient {
    pub fn new(dish: ParentRef, food_code: i64, quantity: f64, unit: impl Into<String>) -> Self {
        Self {
            dish,
            food_code,
            quantity,
            unit: unit.into(),
        }
    }

    /// Quantity in grams, the catalogue's default unit.
    pub fn grams(dish: ParentRef, food_code: i64, quantity: f64) -> Self {
        Self::new(dish, food_code, quantity, "g")
    }
}

impl fmt::Display for Ingredient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.unit.is_empty() {
            write!(f, "{} of food {}", self.quantity, self.food_code)?;
        } else {
            write!(f, "{} {} of food {}", self.quantity, self.unit, self.food_code)?;
        }
        write!(f, " (dish {})", self.dish)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::LocalId;

    #[test]
    fn test_ingredient_display() {
        let ingredient = Ingredient::grams(ParentRef::Local(LocalId(3)), 1042, 150.0);
        assert_eq!(format!("{}", ingredient), "150 g of food 1042 (dish local:3)");
    }

    #[test]
    fn test_ingredient_display_no_unit() {
        let ingredient = Ingredient::new(ParentRef::Local(LocalId(3)), 7, 2.0, "");
        assert_eq!(format!("{}", ingredient), "2 of food 7 (dish local:3)");
    }
}
