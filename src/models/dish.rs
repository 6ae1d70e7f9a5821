use serde::{Deserialize, Serialize};
use std::fmt;

use super::ParentRef;

/// Dish observed during a visit.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Dish {
    pub visit: ParentRef,
    pub name: String,
    /// principal, guarnicion, postre, bebida or otro.
    pub dish_type: Option<String>,
    pub servings: Option<i32>,
    pub notes: Option<String>,
}

impl Dish {
    pub fn new(visit: ParentRef, name: impl Into<String>) -> Self {
        Self {
            visit,
            name: name.into(),
            dish_type: None,
            servings: None,
            notes: None,
        }
    }

    pub fn with_dish_type(mut self, dish_type: impl Into<String>) -> Self {
        self.dish_type = Some(dish_type.into());
        self
    }

    pub fn with_servings(mut self, servings: i32) -> Self {
        self.servings = Some(servings);
        self
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

impl fmt::Display for Dish {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)?;
        if let Some(servings) = self.servings {
            write!(f, " x{}", servings)?;
        }
        write!(f, " (visit {})", self.visit)
    }
}
