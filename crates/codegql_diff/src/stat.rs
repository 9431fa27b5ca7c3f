use serde::Serialize;
use std::iter::Sum;
use std::ops::{Add, AddAssign};

/// Added and deleted line counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiffStat {
    pub added: i32,
    pub deleted: i32,
}

impl Add for DiffStat {
    type Output = DiffStat;

    fn add(self, other: DiffStat) -> DiffStat {
        DiffStat {
            added: self.added + other.added,
            deleted: self.deleted + other.deleted,
        }
    }
}

impl AddAssign for DiffStat {
    fn add_assign(&mut self, other: DiffStat) {
        *self = *self + other;
    }
}

impl Sum for DiffStat {
    fn sum<I: Iterator<Item = DiffStat>>(iter: I) -> DiffStat {
        iter.fold(DiffStat::default(), Add::add)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sum() {
        let total: DiffStat = [
            DiffStat {
                added: 1,
                deleted: 2,
            },
            DiffStat {
                added: 3,
                deleted: 0,
            },
        ]
        .into_iter()
        .sum();
        assert_eq!(
            total,
            DiffStat {
                added: 4,
                deleted: 2
            }
        );
    }
}
