mod dish;
mod entity_type;
mod ingredient;
mod institution;
mod meal_type;
mod payload;
mod record;
mod visit;

pub use dish::Dish;
pub use entity_type::EntityType;
pub use ingredient::Ingredient;
pub use institution::Institution;
pub use meal_type::MealType;
pub use payload::{NaturalKey, ParentRef, Payload};
pub use record::{LocalId, Record, RemoteId, SyncState};
pub use visit::Visit;
