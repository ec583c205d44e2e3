//! Monotonic per-entity id sequences stored next to the data they number.

use crate::store::{Key, KvStore, StoreError, StoreResult, SEQUENCE};

/// Entity kinds with their own counter.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Sequence {
    Dividend,
    Payment,
}

impl Sequence {
    fn name(self) -> &'static str {
        match self {
            Self::Dividend => "dividend",
            Self::Payment => "payment",
        }
    }
}

/// Hands out ids starting at 1.
///
/// The counter lives in the same store as the records, so a rolled-back
/// invocation also rolls back every id it consumed.
pub struct SequenceGenerator;

impl SequenceGenerator {
    /// Reserve and return the next id.
    pub fn next<S: KvStore>(kv: &mut S, sequence: Sequence) -> StoreResult<u64> {
        let key = Key::new(SEQUENCE).str(sequence.name()).into_bytes()?;
        let next = Self::current(kv, sequence)?
            .checked_add(1)
            .ok_or_else(|| StoreError::Conflict(format!("{} sequence exhausted", sequence.name())))?;
        kv.set(key, next.to_be_bytes().to_vec())?;
        Ok(next)
    }

    /// Last id handed out, or zero.
    pub fn current<S: KvStore>(kv: &S, sequence: Sequence) -> StoreResult<u64> {
        let key = Key::new(SEQUENCE).str(sequence.name()).into_bytes()?;
        match kv.get(&key)? {
            Some(bytes) => {
                let raw = <[u8; 8]>::try_from(bytes.as_slice()).map_err(|_| {
                    StoreError::Corrupt {
                        key: sequence.name().to_string(),
                        message: format!("expected 8 bytes, found {}", bytes.len()),
                    }
                })?;
                Ok(u64::from_be_bytes(raw))
            }
            None => Ok(0),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryKvStore;

    #[test]
    fn sequences_are_independent_and_monotonic() {
        let mut kv = MemoryKvStore::new();
        assert_eq!(SequenceGenerator::next(&mut kv, Sequence::Dividend).unwrap(), 1);
        assert_eq!(SequenceGenerator::next(&mut kv, Sequence::Dividend).unwrap(), 2);
        assert_eq!(SequenceGenerator::next(&mut kv, Sequence::Payment).unwrap(), 1);
        assert_eq!(SequenceGenerator::current(&kv, Sequence::Dividend).unwrap(), 2);
    }

    #[test]
    fn discarded_store_discards_reserved_ids() {
        let mut kv = MemoryKvStore::new();
        SequenceGenerator::next(&mut kv, Sequence::Payment).unwrap();

        let mut scratch = kv.clone();
        SequenceGenerator::next(&mut scratch, Sequence::Payment).unwrap();
        drop(scratch);

        assert_eq!(SequenceGenerator::next(&mut kv, Sequence::Payment).unwrap(), 2);
    }
}
