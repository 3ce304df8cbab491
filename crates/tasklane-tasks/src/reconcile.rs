//! Diff/merge of a desired collection against a persisted one.
//!
//! [`reconcile`] walks the desired items in order. Each one is paired with the
//! first still-unmatched persisted item the predicate accepts; a matched
//! persisted item leaves the pool, so it can never pair twice. Unpaired desired
//! items are created, and persisted items never paired are removed last, in
//! their original order.
//!
//! The engine does no I/O. All effects happen inside the callbacks, one at a
//! time. The first callback error stops the run and is returned unchanged;
//! undoing earlier effects is the enclosing transaction's job.

use std::ops::{Add, AddAssign};

use serde::Serialize;

/// How many of each callback a reconciliation invoked.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ReconcileSummary {
    /// `on_create` calls.
    pub created: usize,
    /// `on_update` calls.
    pub updated: usize,
    /// `on_remove` calls.
    pub removed: usize,
}

impl ReconcileSummary {
    /// Whether the run changed nothing but updates.
    pub fn is_structural_noop(&self) -> bool {
        self.created == 0 && self.removed == 0
    }
}

impl Add for ReconcileSummary {
    type Output = Self;

    fn add(self, rhs: Self) -> Self {
        Self {
            created: self.created + rhs.created,
            updated: self.updated + rhs.updated,
            removed: self.removed + rhs.removed,
        }
    }
}

impl AddAssign for ReconcileSummary {
    fn add_assign(&mut self, rhs: Self) {
        *self = *self + rhs;
    }
}

/// Reconcile `persisted` toward `desired`.
///
/// Neither input is mutated. On success
/// `created + updated == desired.len()` and `updated + removed == persisted.len()`.
pub fn reconcile<D, P, E, M, C, U, R>(
    desired: &[D],
    persisted: &[P],
    mut equal: M,
    mut on_create: C,
    mut on_update: U,
    mut on_remove: R,
) -> Result<ReconcileSummary, E>
where
    M: FnMut(&D, &P) -> bool,
    C: FnMut(&D) -> Result<(), E>,
    U: FnMut(&D, &P) -> Result<(), E>,
    R: FnMut(&P) -> Result<(), E>,
{
    let mut remaining: Vec<&P> = persisted.iter().collect();
    let mut summary = ReconcileSummary::default();

    for wanted in desired {
        match remaining.iter().position(|p| equal(wanted, *p)) {
            Some(index) => {
                let matched = remaining.remove(index);
                on_update(wanted, matched)?;
                summary.updated += 1;
            }
            None => {
                on_create(wanted)?;
                summary.created += 1;
            }
        }
    }

    for leftover in remaining {
        on_remove(leftover)?;
        summary.removed += 1;
    }

    Ok(summary)
}
