//! Position ordering shared by chapters, modules, lessons, blocks and quiz items.

use std::collections::HashSet;
use std::hash::Hash;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use learnhub_core::{DomainError, DomainResult};

/// `max(existing) + 1`, or `1` for the first item under a parent.
pub fn next_position<I>(existing: I) -> i32
where
    I: IntoIterator<Item = i32>,
{
    existing.into_iter().max().map_or(1, |max| max + 1)
}

/// One `(id, position)` pair of a bulk reorder request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PositionUpdate<Id> {
    pub id: Id,
    pub position: i32,
}

/// Validation applied to bulk reorder requests.
///
/// `Loose` accepts any list verbatim (the client is trusted to send a
/// consistent set). `Strict` rejects duplicate ids, duplicate or non-positive
/// positions, and gaps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReorderPolicy {
    #[default]
    Loose,
    Strict,
}

impl ReorderPolicy {
    pub fn validate<Id>(self, updates: &[PositionUpdate<Id>]) -> DomainResult<()>
    where
        Id: Eq + Hash,
    {
        if self == ReorderPolicy::Loose {
            return Ok(());
        }

        let mut ids = HashSet::with_capacity(updates.len());
        let mut positions = Vec::with_capacity(updates.len());
        for update in updates {
            if !ids.insert(&update.id) {
                return Err(DomainError::validation("Duplicate id in reorder list"));
            }
            if update.position < 1 {
                return Err(DomainError::validation("Positions must start at 1"));
            }
            positions.push(update.position);
        }

        positions.sort_unstable();
        for pair in positions.windows(2) {
            if pair[0] == pair[1] {
                return Err(DomainError::validation("Duplicate position in reorder list"));
            }
            if pair[1] != pair[0] + 1 {
                return Err(DomainError::validation("Positions must be contiguous"));
            }
        }
        Ok(())
    }
}

impl FromStr for ReorderPolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "loose" => Ok(ReorderPolicy::Loose),
            "strict" => Ok(ReorderPolicy::Strict),
            other => Err(DomainError::validation(format!(
                "unknown reorder policy '{other}' (expected loose or strict)"
            ))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn updates(pairs: &[(u8, i32)]) -> Vec<PositionUpdate<u8>> {
        pairs.iter().map(|&(id, position)| PositionUpdate { id, position }).collect()
    }

    #[test]
    fn first_position_is_one() {
        assert_eq!(next_position(Vec::new()), 1);
    }

    #[test]
    fn next_position_follows_the_maximum_not_the_count() {
        assert_eq!(next_position([1, 7, 3]), 8);
    }

    #[test]
    fn loose_policy_accepts_duplicates_and_gaps() {
        let list = updates(&[(1, 5), (2, 5), (2, -3)]);
        assert!(ReorderPolicy::Loose.validate(&list).is_ok());
    }

    #[test]
    fn strict_policy_accepts_a_permutation() {
        let list = updates(&[(1, 3), (2, 1), (3, 2)]);
        assert!(ReorderPolicy::Strict.validate(&list).is_ok());
    }

    #[test]
    fn strict_policy_rejects_duplicates_gaps_and_zero() {
        assert!(ReorderPolicy::Strict.validate(&updates(&[(1, 1), (2, 1)])).is_err());
        assert!(ReorderPolicy::Strict.validate(&updates(&[(1, 1), (2, 3)])).is_err());
        assert!(ReorderPolicy::Strict.validate(&updates(&[(1, 0), (2, 1)])).is_err());
        assert!(ReorderPolicy::Strict.validate(&updates(&[(1, 1), (1, 2)])).is_err());
    }

    #[test]
    fn policy_parses_from_config_strings() {
        assert_eq!("Strict".parse::<ReorderPolicy>().unwrap(), ReorderPolicy::Strict);
        assert_eq!("loose".parse::<ReorderPolicy>().unwrap(), ReorderPolicy::Loose);
        assert!("lenient".parse::<ReorderPolicy>().is_err());
    }

    mod proptest_tests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            /// Property: the next position is strictly greater than every existing one.
            #[test]
            fn next_position_exceeds_existing(existing in proptest::collection::vec(1i32..10_000, 0..50)) {
                let next = next_position(existing.iter().copied());
                prop_assert!(existing.iter().all(|&p| p < next));
                prop_assert!(next >= 1);
            }
        }
    }
}
