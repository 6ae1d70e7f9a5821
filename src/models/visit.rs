use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::{MealType, ParentRef};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Visit {
    pub institution: ParentRef,
    pub date: NaiveDate,
    pub meal_type: MealType,
    pub notes: Option<String>,
}

impl Visit {
    pub fn new(institution: ParentRef, date: NaiveDate, meal_type: MealType) -> Self {
        Self {
            institution,
            date,
            meal_type,
            notes: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }
}

impl fmt::Display for Visit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} (institution {})",
            self.date, self.meal_type, self.institution
        )
    }
}
