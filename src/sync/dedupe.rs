use std::collections::HashSet;

use crate::models::Record;

/// Drops repeated records before a sync pass.
///
/// Local storage can hold several copies of one record (repeated form
/// submissions); only the first copy of each local id is pushed.
pub struct DuplicateGuard;

impl DuplicateGuard {
    pub fn dedupe(records: Vec<Record>) -> Vec<Record> {
        let before = records.len();
        let mut seen = HashSet::with_capacity(before);
        let unique: Vec<Record> = records
            .into_iter()
            .filter(|r| seen.insert(r.local_id))
            .collect();

        if unique.len() < before {
            tracing::warn!(
                dropped = before - unique.len(),
                "Dropped duplicate local records before sync"
            );
        }
        unique
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Institution, LocalId};

    fn institution(local_id: i64, name: &str) -> Record {
        Record::new(LocalId(local_id), Institution::new(format!("C{}", local_id), name, "escuela"))
    }

    #[test]
    fn test_dedupe_keeps_first_occurrence() {
        let records = vec![
            institution(7, "first"),
            institution(8, "other"),
            institution(7, "second"),
        ];

        let unique = DuplicateGuard::dedupe(records);
        assert_eq!(unique.len(), 2);
        assert_eq!(unique[0].local_id, LocalId(7));
        assert_eq!(unique[0].payload.to_string(), "first (C7)");
        assert_eq!(unique[1].local_id, LocalId(8));
    }

    #[test]
    fn test_dedupe_is_idempotent() {
        let records = vec![institution(1, "a"), institution(1, "b"), institution(2, "c")];
        let once = DuplicateGuard::dedupe(records);
        let twice = DuplicateGuard::dedupe(once.clone());
        assert_eq!(once, twice);
    }

    #[test]
    fn test_dedupe_empty() {
        assert!(DuplicateGuard::dedupe(Vec::new()).is_empty());
    }
}
