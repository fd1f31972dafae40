//! Deterministic hash-based train/test assignment.

use super::CustomerRecord;

/// Which side of the holdout a record lands on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Split {
    Train,
    Test,
}

/// Assign a customer to a split from a seeded blake3 hash of its identifier.
///
/// Assignment only depends on `(seed, customer_id)`, so adding rows never moves
/// existing customers between splits.
pub fn split_for_customer(customer_id: &str, seed: &str, test_fraction: f64) -> Split {
    let hash = blake3::hash(format!("{seed}|{customer_id}").as_bytes());
    let mut prefix = [0u8; 8];
    prefix.copy_from_slice(&hash.as_bytes()[..8]);
    let frac = u64::from_le_bytes(prefix) as f64 / u64::MAX as f64;
    if frac < test_fraction.clamp(0.0, 1.0) {
        Split::Test
    } else {
        Split::Train
    }
}

/// Partition records into `(train, test)` index lists.
pub fn train_test_indices(
    records: &[CustomerRecord],
    seed: &str,
    test_fraction: f64,
) -> (Vec<usize>, Vec<usize>) {
    let mut train = Vec::new();
    let mut test = Vec::new();
    for (idx, record) in records.iter().enumerate() {
        match split_for_customer(&record.customer_id, seed, test_fraction) {
            Split::Train => train.push(idx),
            Split::Test => test.push(idx),
        }
    }
    (train, test)
}
