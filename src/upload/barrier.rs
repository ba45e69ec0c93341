//! Waiting for every upload of a batch before anything is decided.

use crate::error::{BatchError, FileFailure, UploadError};

use super::types::SignedIdSet;

/// Outcome of one file: its signed id or the error that stopped it.
pub type Settlement = Result<String, UploadError>;

/// Collects one settlement per file, indexed by input position.
///
/// Releases only once every slot is filled, whatever the outcomes and in
/// whatever order they arrive.
#[derive(Debug)]
pub struct SettlementBarrier {
    slots: Vec<Option<Settlement>>,
    remaining: usize,
}

impl SettlementBarrier {
    pub fn new(count: usize) -> Self {
        Self {
            slots: (0..count).map(|_| None).collect(),
            remaining: count,
        }
    }

    /// Records the outcome for `index`. Returns `true` once the barrier is
    /// released. Repeated or out-of-range indices are ignored.
    pub fn settle(&mut self, index: usize, outcome: Settlement) -> bool {
        if let Some(slot) = self.slots.get_mut(index) {
            if slot.is_none() {
                *slot = Some(outcome);
                self.remaining -= 1;
            }
        }
        self.is_released()
    }

    pub fn remaining(&self) -> usize {
        self.remaining
    }

    pub fn settled(&self) -> usize {
        self.slots.len() - self.remaining
    }

    pub fn is_released(&self) -> bool {
        self.remaining == 0
    }

    /// Hands back every outcome in input order, or the barrier itself if some
    /// file has not settled yet.
    pub fn release(self) -> Result<Vec<Settlement>, Self> {
        if !self.is_released() {
            return Err(self);
        }
        Ok(self.slots.into_iter().flatten().collect())
    }
}

impl SignedIdSet {
    /// Builds the id set only when every upload succeeded.
    ///
    /// `labels` holds `(id, filename)` per file in input order, matching
    /// `settlements`.
    pub fn from_settlements(
        labels: &[(String, String)],
        settlements: Vec<Settlement>,
    ) -> Result<SignedIdSet, BatchError> {
        let total = settlements.len();
        let mut ids = Vec::with_capacity(total);
        let mut failures = Vec::new();

        for ((id, filename), outcome) in labels.iter().zip(settlements) {
            match outcome {
                Ok(signed_id) => ids.push(signed_id),
                Err(error) => failures.push(FileFailure {
                    id: id.clone(),
                    filename: filename.clone(),
                    error,
                }),
            }
        }

        if failures.is_empty() {
            Ok(SignedIdSet::new(ids))
        } else {
            Err(BatchError::UploadsFailed { total, failures })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{FailureCause, TransportError};

    fn network(msg: &str) -> UploadError {
        UploadError::Transfer(FailureCause::Transport(TransportError::Network(msg.into())))
    }

    fn labels(names: &[&str]) -> Vec<(String, String)> {
        names
            .iter()
            .enumerate()
            .map(|(i, name)| (format!("id-{i}"), name.to_string()))
            .collect()
    }

    #[test]
    fn releases_only_after_every_slot_settles() {
        let mut barrier = SettlementBarrier::new(3);
        assert!(!barrier.settle(2, Ok("c".into())));
        assert!(!barrier.settle(0, Err(network("reset"))));
        assert_eq!(barrier.remaining(), 1);

        let barrier = barrier.release().unwrap_err();
        assert_eq!(barrier.settled(), 2);

        let mut barrier = barrier;
        assert!(barrier.settle(1, Ok("b".into())));
        let outcomes = barrier.release().unwrap();
        assert!(outcomes[0].is_err());
        assert_eq!(outcomes[1].as_deref().unwrap(), "b");
        assert_eq!(outcomes[2].as_deref().unwrap(), "c");
    }

    #[test]
    fn duplicate_and_out_of_range_settlements_are_ignored() {
        let mut barrier = SettlementBarrier::new(1);
        assert!(!barrier.settle(5, Ok("x".into())));
        assert!(barrier.settle(0, Ok("first".into())));
        assert!(barrier.settle(0, Ok("second".into())));

        let outcomes = barrier.release().unwrap();
        assert_eq!(outcomes.len(), 1);
        assert_eq!(outcomes[0].as_deref().unwrap(), "first");
    }

    #[test]
    fn empty_barrier_is_released_immediately() {
        assert!(SettlementBarrier::new(0).is_released());
    }

    #[test]
    fn all_successes_keep_input_order() {
        let set = SignedIdSet::from_settlements(
            &labels(&["a", "b", "c"]),
            vec![Ok("sa".into()), Ok("sb".into()), Ok("sc".into())],
        )
        .unwrap();
        assert_eq!(set.as_slice(), ["sa", "sb", "sc"]);
    }

    #[test]
    fn any_failure_blocks_the_set() {
        let err = SignedIdSet::from_settlements(
            &labels(&["a", "b", "c"]),
            vec![Ok("sa".into()), Err(network("eof")), Err(network("timeout"))],
        )
        .unwrap_err();

        let BatchError::UploadsFailed { total, failures } = &err else {
            panic!("unexpected error {err:?}");
        };
        assert_eq!(*total, 3);
        let names: Vec<&str> = failures.iter().map(|f| f.filename.as_str()).collect();
        assert_eq!(names, ["b", "c"]);
        assert_eq!(failures[0].id, "id-1");
    }
}
