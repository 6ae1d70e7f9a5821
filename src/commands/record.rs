use chrono::NaiveDate;
use clap::{Args, Subcommand, ValueEnum};

use fieldsync::db::RecordRepository;
use fieldsync::models::{
    Dish, EntityType, Ingredient, Institution, LocalId, MealType, ParentRef, Payload, Record,
    RemoteId, Visit,
};

#[derive(Clone, ValueEnum, Default)]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

#[derive(Args)]
pub struct RecordCommand {
    #[command(subcommand)]
    pub command: RecordSubcommand,
}

#[derive(Subcommand)]
pub enum RecordSubcommand {
    /// Register an institution
    AddInstitution {
        /// Institution code (unique on the server)
        code: String,

        /// Display name
        name: String,

        /// Kind of institution (escuela, hogar, comedor, ...)
        #[arg(long, default_value = "escuela")]
        kind: String,

        #[arg(long)]
        address: Option<String>,

        #[arg(long)]
        neighborhood: Option<String>,

        #[arg(long)]
        district: Option<String>,
    },

    /// Record a visit to an institution
    AddVisit {
        /// Institution: local id, or remote:<id> for one already on the server
        #[arg(long, value_parser = parse_parent)]
        institution: ParentRef,

        /// Visit date (YYYY-MM-DD)
        #[arg(long)]
        date: NaiveDate,

        /// Meal observed (desayuno, almuerzo, merienda, cena, vianda)
        #[arg(long, default_value = "almuerzo")]
        meal: MealType,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Record a dish served during a visit
    AddDish {
        /// Visit: local id, or remote:<id>
        #[arg(long, value_parser = parse_parent)]
        visit: ParentRef,

        /// Dish name
        name: String,

        #[arg(long)]
        dish_type: Option<String>,

        /// Number of servings
        #[arg(long)]
        servings: Option<i32>,

        #[arg(long)]
        notes: Option<String>,
    },

    /// Record an ingredient of a dish
    AddIngredient {
        /// Dish: local id, or remote:<id>
        #[arg(long, value_parser = parse_parent)]
        dish: ParentRef,

        /// Food composition table code
        #[arg(long)]
        food: i64,

        /// Quantity (amount)
        #[arg(long)]
        quantity: f64,

        /// Unit of measurement
        #[arg(long, default_value = "g")]
        unit: String,
    },

    /// List stored records
    List {
        /// Only this entity type
        #[arg(long = "type", value_name = "TYPE")]
        entity_type: Option<EntityType>,

        /// Only records not yet synced
        #[arg(long)]
        pending: bool,

        /// Output format
        #[arg(long, short, value_enum, default_value = "text")]
        format: OutputFormat,
    },
}

/// Accepts `3`, `local:3` or `remote:501`.
fn parse_parent(s: &str) -> Result<ParentRef, String> {
    let (kind, id) = s.split_once(':').unwrap_or(("local", s));
    let id: i64 = id
        .trim()
        .parse()
        .map_err(|_| format!("Invalid id '{}'", id))?;

    match kind {
        "local" => Ok(ParentRef::Local(LocalId(id))),
        "remote" => Ok(ParentRef::Remote(RemoteId(id))),
        other => Err(format!(
            "Unknown reference kind '{}'. Use local:<id> or remote:<id>",
            other
        )),
    }
}

impl RecordCommand {
    pub async fn run(&self, repo: &RecordRepository) -> Result<(), Box<dyn std::error::Error>> {
        match &self.command {
            RecordSubcommand::AddInstitution {
                code,
                name,
                kind,
                address,
                neighborhood,
                district,
            } => {
                if code.trim().is_empty() {
                    return Err("Institution code cannot be empty".into());
                }

                let mut institution = Institution::new(code.trim(), name.trim(), kind);
                if let Some(address) = address {
                    institution = institution.with_address(address);
                }
                if let Some(neighborhood) = neighborhood {
                    institution = institution.with_neighborhood(neighborhood);
                }
                if let Some(district) = district {
                    institution = institution.with_district(district);
                }

                self.save(repo, institution).await
            }

            RecordSubcommand::AddVisit {
                institution,
                date,
                meal,
                notes,
            } => {
                ensure_parent_exists(repo, EntityType::Institution, *institution).await?;

                let mut visit = Visit::new(*institution, *date, *meal);
                if let Some(notes) = notes {
                    visit = visit.with_notes(notes);
                }

                self.save(repo, visit).await
            }

            RecordSubcommand::AddDish {
                visit,
                name,
                dish_type,
                servings,
                notes,
            } => {
                if name.trim().is_empty() {
                    return Err("Dish name cannot be empty".into());
                }
                ensure_parent_exists(repo, EntityType::Visit, *visit).await?;

                let mut dish = Dish::new(*visit, name.trim());
                if let Some(dish_type) = dish_type {
                    dish = dish.with_dish_type(dish_type);
                }
                if let Some(servings) = servings {
                    dish = dish.with_servings(*servings);
                }
                if let Some(notes) = notes {
                    dish = dish.with_notes(notes);
                }

                self.save(repo, dish).await
            }

            RecordSubcommand::AddIngredient {
                dish,
                food,
                quantity,
                unit,
            } => {
                // Validate quantity
                if *quantity <= 0.0 {
                    return Err("Quantity must be a positive number".into());
                }
                ensure_parent_exists(repo, EntityType::Dish, *dish).await?;

                self.save(repo, Ingredient::new(*dish, *food, *quantity, unit))
                    .await
            }

            RecordSubcommand::List {
                entity_type,
                pending,
                format,
            } => {
                let types: Vec<EntityType> = match entity_type {
                    Some(t) => vec![*t],
                    None => EntityType::SYNC_ORDER.to_vec(),
                };

                let mut records: Vec<Record> = Vec::new();
                for t in types {
                    if *pending {
                        records.extend(repo.list_pending(t).await?);
                    } else {
                        records.extend(repo.list(t).await?);
                    }
                }

                if records.is_empty() {
                    println!("No records found");
                    return Ok(());
                }

                match format {
                    OutputFormat::Json => {
                        println!("{}", serde_json::to_string_pretty(&records)?);
                    }
                    OutputFormat::Text => {
                        println!(
                            "{:<12}  {:<14}  {:<9}  {:<8}  SUMMARY",
                            "TYPE", "LOCAL ID", "REMOTE ID", "STATE"
                        );
                        println!("{}", "-".repeat(80));
                        for record in &records {
                            let remote = record
                                .remote_id
                                .map(|id| id.to_string())
                                .unwrap_or_else(|| "-".to_string());
                            println!(
                                "{:<12}  {:<14}  {:<9}  {:<8}  {}",
                                record.entity_type().as_str(),
                                record.local_id.to_string(),
                                remote,
                                record.sync_state.to_string(),
                                record.payload
                            );
                        }
                        println!("\nTotal: {} record(s)", records.len());
                    }
                }
                Ok(())
            }
        }
    }

    async fn save(
        &self,
        repo: &RecordRepository,
        payload: impl Into<Payload>,
    ) -> Result<(), Box<dyn std::error::Error>> {
        let created = repo.create(payload).await?;
        println!("Created {} (pending sync):", created.entity_type());
        println!("{}", created);
        Ok(())
    }
}

/// Local parents must already be stored; remote ones are taken on trust.
async fn ensure_parent_exists(
    repo: &RecordRepository,
    parent_type: EntityType,
    parent: ParentRef,
) -> Result<(), Box<dyn std::error::Error>> {
    if let ParentRef::Local(local_id) = parent {
        if repo.get(parent_type, local_id).await?.is_none() {
            return Err(format!("{} not found: {}", parent_type.label(), local_id).into());
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_parent() {
        assert_eq!(parse_parent("3"), Ok(ParentRef::Local(LocalId(3))));
        assert_eq!(parse_parent("local:3"), Ok(ParentRef::Local(LocalId(3))));
        assert_eq!(
            parse_parent("remote:501"),
            Ok(ParentRef::Remote(RemoteId(501)))
        );
        assert!(parse_parent("server:1").is_err());
        assert!(parse_parent("abc").is_err());
    }
}
