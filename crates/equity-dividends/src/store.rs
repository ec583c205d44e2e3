//! Ordered key-value storage and the typed dividend collections on top of it.
//!
//! Every record is JSON-encoded under a binary key. Key components are
//! length-prefixed (strings) or big-endian (integers), so lexicographic key
//! order equals component order and any leading run of components is a
//! valid prefix for iteration.

use std::collections::{BTreeMap, BTreeSet};

use equity_types::{
    Address, BeneficialOwnership, CompanyId, DividendEscrow, DividendId, DividendPayment,
    DividendSnapshot, Dividend, Recipient, ReferenceType, ShareClassId, ShareholderSnapshot,
};
use serde::de::DeserializeOwned;
use serde::Serialize;
use thiserror::Error;

/// Result type for storage operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Storage-layer errors.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("serialization error: {0}")]
    Serialization(String),

    #[error("corrupt record under key {key}: {message}")]
    Corrupt { key: String, message: String },

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("key component of {len} bytes exceeds the {max} byte limit")]
    KeyTooLong { len: usize, max: usize },

    #[error("backend error: {0}")]
    Backend(String),
}

/// Persistent, ordered key-value store with prefix iteration.
pub trait KvStore {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>>;

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) -> StoreResult<()>;

    /// Remove a key; returns whether it existed.
    fn delete(&mut self, key: &[u8]) -> StoreResult<bool>;

    /// Entries whose key starts with `prefix`, in key order, skipping the
    /// first `offset` and returning at most `limit`.
    fn scan_prefix(
        &self,
        prefix: &[u8],
        offset: usize,
        limit: usize,
    ) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>>;
}

/// In-memory reference backend.
#[derive(Debug, Clone, Default)]
pub struct MemoryKvStore {
    entries: BTreeMap<Vec<u8>, Vec<u8>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        Ok(self.entries.get(key).cloned())
    }

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) -> StoreResult<()> {
        self.entries.insert(key, value);
        Ok(())
    }

    fn delete(&mut self, key: &[u8]) -> StoreResult<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    fn scan_prefix(
        &self,
        prefix: &[u8],
        offset: usize,
        limit: usize,
    ) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        Ok(self
            .entries
            .range(prefix.to_vec()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .skip(offset)
            .take(limit)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

// Collection prefixes.
const DIVIDEND: u8 = 0x01;
const COMPANY_DIVIDENDS: u8 = 0x02;
const PENDING: u8 = 0x03;
pub(crate) const ESCROW: u8 = 0x04;
const SNAPSHOT: u8 = 0x05;
const SNAPSHOT_ENTRY: u8 = 0x06;
const SNAPSHOT_POSITION: u8 = 0x07;
const PAYMENT: u8 = 0x08;
const OWNERSHIP: u8 = 0x09;
const OWNERSHIP_BY_OWNER: u8 = 0x0a;
const CUSTODIAN: u8 = 0x0b;
pub(crate) const SEQUENCE: u8 = 0x0c;

/// Binary key builder.
///
/// A string component longer than `u16::MAX` bytes cannot be length-prefixed;
/// the builder remembers it and [`Key::into_bytes`] refuses the whole key.
#[derive(Debug, Clone)]
pub(crate) struct Key {
    bytes: Vec<u8>,
    oversized: Option<usize>,
}

impl Key {
    pub(crate) fn new(prefix: u8) -> Self {
        Self {
            bytes: vec![prefix],
            oversized: None,
        }
    }

    pub(crate) fn u64(mut self, value: u64) -> Self {
        self.bytes.extend_from_slice(&value.to_be_bytes());
        self
    }

    pub(crate) fn str(mut self, value: &str) -> Self {
        match u16::try_from(value.len()) {
            Ok(len) => {
                self.bytes.extend_from_slice(&len.to_be_bytes());
                self.bytes.extend_from_slice(value.as_bytes());
            }
            Err(_) => {
                self.oversized.get_or_insert(value.len());
            }
        }
        self
    }

    fn class(self, class_id: Option<&ShareClassId>) -> Self {
        match class_id {
            Some(class) => self.u64(1).str(class.as_str()),
            None => self.u64(0),
        }
    }

    fn recipient(self, recipient: &Recipient) -> Self {
        match recipient {
            Recipient::DirectHolder(address) => self.u64(0).str(address.as_str()),
            Recipient::TreasuryHolder(company) => self.u64(1).u64(company.value()),
        }
    }

    pub(crate) fn into_bytes(self) -> StoreResult<Vec<u8>> {
        match self.oversized {
            Some(len) => Err(StoreError::KeyTooLong {
                len,
                max: usize::from(u16::MAX),
            }),
            None => Ok(self.bytes),
        }
    }
}

/// Key of one beneficial-ownership record.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct OwnershipKey {
    pub custodial_account: Address,
    pub company_id: CompanyId,
    pub class_id: ShareClassId,
    pub beneficial_owner: Address,
    pub reference_id: String,
}

impl OwnershipKey {
    pub fn of(record: &BeneficialOwnership) -> Self {
        Self {
            custodial_account: record.custodial_account.clone(),
            company_id: record.company_id,
            class_id: record.class_id.clone(),
            beneficial_owner: record.beneficial_owner.clone(),
            reference_id: record.reference_id.clone(),
        }
    }

    fn primary(&self) -> StoreResult<Vec<u8>> {
        Key::new(OWNERSHIP)
            .str(self.custodial_account.as_str())
            .u64(self.company_id.value())
            .str(self.class_id.as_str())
            .str(self.beneficial_owner.as_str())
            .str(&self.reference_id)
            .into_bytes()
    }

    fn by_owner(&self) -> StoreResult<Vec<u8>> {
        Key::new(OWNERSHIP_BY_OWNER)
            .str(self.beneficial_owner.as_str())
            .str(self.custodial_account.as_str())
            .u64(self.company_id.value())
            .str(self.class_id.as_str())
            .str(&self.reference_id)
            .into_bytes()
    }
}

/// Previous value of one written key.
type Undo = (Vec<u8>, Option<Vec<u8>>);

/// Typed collections of the dividend module over a [`KvStore`].
///
/// While a journal is open every write records the value it replaces, so an
/// aborted invocation is undone in proportion to what it wrote.
#[derive(Debug, Clone, Default)]
pub struct DividendStore<S> {
    kv: S,
    journal: Option<Vec<Undo>>,
}

impl<S: KvStore> DividendStore<S> {
    pub fn new(kv: S) -> Self {
        Self { kv, journal: None }
    }

    pub fn kv(&self) -> &S {
        &self.kv
    }

    #[cfg(test)]
    pub(crate) fn kv_mut(&mut self) -> &mut S {
        &mut self.kv
    }

    // --- Journal ---

    /// Start recording undo entries, discarding any earlier journal.
    pub(crate) fn begin(&mut self) {
        self.journal = Some(Vec::new());
    }

    /// Keep every write since [`DividendStore::begin`].
    pub(crate) fn commit(&mut self) {
        self.journal = None;
    }

    /// Undo every write since [`DividendStore::begin`], newest first.
    pub(crate) fn rollback(&mut self) -> StoreResult<()> {
        let Some(journal) = self.journal.take() else {
            return Ok(());
        };
        for (key, previous) in journal.into_iter().rev() {
            match previous {
                Some(value) => self.kv.set(key, value)?,
                None => {
                    self.kv.delete(&key)?;
                }
            }
        }
        Ok(())
    }

    fn record(&mut self, key: &[u8]) -> StoreResult<()> {
        if self.journal.is_some() {
            let previous = self.kv.get(key)?;
            if let Some(journal) = self.journal.as_mut() {
                journal.push((key.to_vec(), previous));
            }
        }
        Ok(())
    }

    fn put_raw(&mut self, key: Vec<u8>, value: Vec<u8>) -> StoreResult<()> {
        self.record(&key)?;
        self.kv.set(key, value)
    }

    fn remove_raw(&mut self, key: &[u8]) -> StoreResult<bool> {
        self.record(key)?;
        self.kv.delete(key)
    }

    // --- Dividends ---

    pub fn dividend(&self, id: DividendId) -> StoreResult<Option<Dividend>> {
        self.read(&Key::new(DIVIDEND).u64(id.value()).into_bytes()?)
    }

    pub fn put_dividend(&mut self, dividend: &Dividend) -> StoreResult<()> {
        self.write(
            Key::new(DIVIDEND).u64(dividend.id.value()).into_bytes()?,
            dividend,
        )?;
        self.put_raw(
            Key::new(COMPANY_DIVIDENDS)
                .u64(dividend.company_id.value())
                .u64(dividend.id.value())
                .into_bytes()?,
            Vec::new(),
        )
    }

    pub fn dividends_for_company(&self, company_id: CompanyId) -> StoreResult<Vec<Dividend>> {
        let prefix = Key::new(COMPANY_DIVIDENDS)
            .u64(company_id.value())
            .into_bytes()?;
        let mut dividends = Vec::new();
        for (key, _) in self.kv.scan_prefix(&prefix, 0, usize::MAX)? {
            let id = trailing_u64(&key)?;
            if let Some(dividend) = self.dividend(DividendId(id))? {
                dividends.push(dividend);
            }
        }
        Ok(dividends)
    }

    pub fn pending_dividend(
        &self,
        company_id: CompanyId,
        class_id: Option<&ShareClassId>,
    ) -> StoreResult<Option<DividendId>> {
        self.read(&pending_key(company_id, class_id)?)
    }

    pub fn set_pending_dividend(
        &mut self,
        company_id: CompanyId,
        class_id: Option<&ShareClassId>,
        dividend_id: DividendId,
    ) -> StoreResult<()> {
        self.write(pending_key(company_id, class_id)?, &dividend_id)
    }

    pub fn clear_pending_dividend(
        &mut self,
        company_id: CompanyId,
        class_id: Option<&ShareClassId>,
    ) -> StoreResult<()> {
        self.remove_raw(&pending_key(company_id, class_id)?)?;
        Ok(())
    }

    // --- Escrow ---

    pub fn escrow(&self, dividend_id: DividendId) -> StoreResult<Option<DividendEscrow>> {
        self.read(&Key::new(ESCROW).u64(dividend_id.value()).into_bytes()?)
    }

    pub fn put_escrow(&mut self, escrow: &DividendEscrow) -> StoreResult<()> {
        self.write(
            Key::new(ESCROW).u64(escrow.dividend_id.value()).into_bytes()?,
            escrow,
        )
    }

    // --- Snapshots ---

    pub fn snapshot(&self, dividend_id: DividendId) -> StoreResult<Option<DividendSnapshot>> {
        self.read(&Key::new(SNAPSHOT).u64(dividend_id.value()).into_bytes()?)
    }

    /// Write a snapshot header and its entries. Refuses to overwrite.
    pub fn insert_snapshot(
        &mut self,
        header: &DividendSnapshot,
        entries: &[ShareholderSnapshot],
    ) -> StoreResult<()> {
        let header_key = Key::new(SNAPSHOT)
            .u64(header.dividend_id.value())
            .into_bytes()?;
        if self.kv.get(&header_key)?.is_some() {
            return Err(StoreError::Conflict(format!(
                "snapshot for dividend {} already exists",
                header.dividend_id
            )));
        }

        for entry in entries {
            self.write(
                Key::new(SNAPSHOT_ENTRY)
                    .u64(entry.dividend_id.value())
                    .u64(entry.position)
                    .into_bytes()?,
                entry,
            )?;
            self.write(
                Key::new(SNAPSHOT_POSITION)
                    .u64(entry.dividend_id.value())
                    .recipient(&entry.recipient)
                    .into_bytes()?,
                &entry.position,
            )?;
        }
        self.write(header_key, header)
    }

    /// Snapshot entries in position order.
    pub fn snapshot_entries(
        &self,
        dividend_id: DividendId,
        offset: u64,
        limit: usize,
    ) -> StoreResult<Vec<ShareholderSnapshot>> {
        let prefix = Key::new(SNAPSHOT_ENTRY).u64(dividend_id.value()).into_bytes()?;
        let offset = usize::try_from(offset).unwrap_or(usize::MAX);
        self.kv
            .scan_prefix(&prefix, offset, limit)?
            .into_iter()
            .map(|(key, value)| decode(&key, &value))
            .collect()
    }

    pub fn snapshot_entry_for(
        &self,
        dividend_id: DividendId,
        recipient: &Recipient,
    ) -> StoreResult<Option<ShareholderSnapshot>> {
        let position: Option<u64> = self.read(
            &Key::new(SNAPSHOT_POSITION)
                .u64(dividend_id.value())
                .recipient(recipient)
                .into_bytes()?,
        )?;
        match position {
            Some(position) => self.read(
                &Key::new(SNAPSHOT_ENTRY)
                    .u64(dividend_id.value())
                    .u64(position)
                    .into_bytes()?,
            ),
            None => Ok(None),
        }
    }

    // --- Payments ---

    pub fn payment(
        &self,
        dividend_id: DividendId,
        recipient: &Recipient,
    ) -> StoreResult<Option<DividendPayment>> {
        self.read(&payment_key(dividend_id, recipient)?)
    }

    /// Persist a payment. A second payment for the same recipient is refused.
    pub fn insert_payment(&mut self, payment: &DividendPayment) -> StoreResult<()> {
        let key = payment_key(payment.dividend_id, &payment.recipient)?;
        if self.kv.get(&key)?.is_some() {
            return Err(StoreError::Conflict(format!(
                "payment for {} on dividend {} already exists",
                payment.recipient, payment.dividend_id
            )));
        }
        self.write(key, payment)
    }

    pub fn payments(&self, dividend_id: DividendId) -> StoreResult<Vec<DividendPayment>> {
        let prefix = Key::new(PAYMENT).u64(dividend_id.value()).into_bytes()?;
        self.kv
            .scan_prefix(&prefix, 0, usize::MAX)?
            .into_iter()
            .map(|(key, value)| decode(&key, &value))
            .collect()
    }

    // --- Beneficial ownership ---

    pub fn ownership(&self, key: &OwnershipKey) -> StoreResult<Option<BeneficialOwnership>> {
        self.read(&key.primary()?)
    }

    pub fn put_ownership(&mut self, record: &BeneficialOwnership) -> StoreResult<()> {
        let key = OwnershipKey::of(record);
        self.write(key.primary()?, record)?;
        self.put_raw(key.by_owner()?, Vec::new())
    }

    pub fn remove_ownership(&mut self, key: &OwnershipKey) -> StoreResult<bool> {
        let existed = self.remove_raw(&key.primary()?)?;
        self.remove_raw(&key.by_owner()?)?;
        Ok(existed)
    }

    pub fn ownership_for_module(
        &self,
        custodial_account: &Address,
        company_id: CompanyId,
        class_id: &ShareClassId,
    ) -> StoreResult<Vec<BeneficialOwnership>> {
        let prefix = Key::new(OWNERSHIP)
            .str(custodial_account.as_str())
            .u64(company_id.value())
            .str(class_id.as_str())
            .into_bytes()?;
        self.kv
            .scan_prefix(&prefix, 0, usize::MAX)?
            .into_iter()
            .map(|(key, value)| decode(&key, &value))
            .collect()
    }

    pub fn ownership_for_owner(&self, owner: &Address) -> StoreResult<Vec<BeneficialOwnership>> {
        let prefix = Key::new(OWNERSHIP_BY_OWNER)
            .str(owner.as_str())
            .into_bytes()?;
        let mut records = Vec::new();
        for (index_key, _) in self.kv.scan_prefix(&prefix, 0, usize::MAX)? {
            let primary = owner_index_to_primary(&index_key)?;
            let record: Option<BeneficialOwnership> = self.read(&primary)?;
            match record {
                Some(record) => records.push(record),
                None => {
                    return Err(StoreError::Corrupt {
                        key: hex::encode(&index_key),
                        message: "owner index points at a missing record".to_string(),
                    })
                }
            }
        }
        Ok(records)
    }

    // --- Custodian capability table ---

    pub fn custodian(&self, account: &Address) -> StoreResult<Option<BTreeSet<ReferenceType>>> {
        self.read(&Key::new(CUSTODIAN).str(account.as_str()).into_bytes()?)
    }

    pub fn put_custodian(
        &mut self,
        account: &Address,
        reference_types: &BTreeSet<ReferenceType>,
    ) -> StoreResult<()> {
        self.write(
            Key::new(CUSTODIAN).str(account.as_str()).into_bytes()?,
            reference_types,
        )
    }

    // --- Raw helpers ---

    fn read<T: DeserializeOwned>(&self, key: &[u8]) -> StoreResult<Option<T>> {
        match self.kv.get(key)? {
            Some(bytes) => decode(key, &bytes).map(Some),
            None => Ok(None),
        }
    }

    fn write<T: Serialize>(&mut self, key: Vec<u8>, value: &T) -> StoreResult<()> {
        let bytes =
            serde_json::to_vec(value).map_err(|e| StoreError::Serialization(e.to_string()))?;
        self.put_raw(key, bytes)
    }
}

/// Raw access for collaborators of the store, such as id sequences; writes
/// go through the journal.
impl<S: KvStore> KvStore for DividendStore<S> {
    fn get(&self, key: &[u8]) -> StoreResult<Option<Vec<u8>>> {
        self.kv.get(key)
    }

    fn set(&mut self, key: Vec<u8>, value: Vec<u8>) -> StoreResult<()> {
        self.put_raw(key, value)
    }

    fn delete(&mut self, key: &[u8]) -> StoreResult<bool> {
        self.remove_raw(key)
    }

    fn scan_prefix(
        &self,
        prefix: &[u8],
        offset: usize,
        limit: usize,
    ) -> StoreResult<Vec<(Vec<u8>, Vec<u8>)>> {
        self.kv.scan_prefix(prefix, offset, limit)
    }
}

fn pending_key(company_id: CompanyId, class_id: Option<&ShareClassId>) -> StoreResult<Vec<u8>> {
    Key::new(PENDING)
        .u64(company_id.value())
        .class(class_id)
        .into_bytes()
}

fn payment_key(dividend_id: DividendId, recipient: &Recipient) -> StoreResult<Vec<u8>> {
    Key::new(PAYMENT)
        .u64(dividend_id.value())
        .recipient(recipient)
        .into_bytes()
}

fn decode<T: DeserializeOwned>(key: &[u8], bytes: &[u8]) -> StoreResult<T> {
    serde_json::from_slice(bytes).map_err(|e| StoreError::Corrupt {
        key: hex::encode(key),
        message: e.to_string(),
    })
}

fn trailing_u64(key: &[u8]) -> StoreResult<u64> {
    let tail = key
        .len()
        .checked_sub(8)
        .and_then(|start| key.get(start..))
        .and_then(|bytes| <[u8; 8]>::try_from(bytes).ok())
        .ok_or_else(|| StoreError::Corrupt {
            key: hex::encode(key),
            message: "key too short for trailing id".to_string(),
        })?;
    Ok(u64::from_be_bytes(tail))
}

/// Rebuild the primary ownership key from an owner-index key.
fn owner_index_to_primary(index_key: &[u8]) -> StoreResult<Vec<u8>> {
    let corrupt = || StoreError::Corrupt {
        key: hex::encode(index_key),
        message: "malformed owner index key".to_string(),
    };
    let mut cursor = KeyReader::new(index_key.get(1..).ok_or_else(corrupt)?);
    let owner = cursor.str().ok_or_else(corrupt)?;
    let custodial = cursor.str().ok_or_else(corrupt)?;
    let company = cursor.u64().ok_or_else(corrupt)?;
    let class = cursor.str().ok_or_else(corrupt)?;
    let reference = cursor.str().ok_or_else(corrupt)?;

    Key::new(OWNERSHIP)
        .str(&custodial)
        .u64(company)
        .str(&class)
        .str(&owner)
        .str(&reference)
        .into_bytes()
}

struct KeyReader<'a> {
    bytes: &'a [u8],
}

impl<'a> KeyReader<'a> {
    fn new(bytes: &'a [u8]) -> Self {
        Self { bytes }
    }

    fn take(&mut self, n: usize) -> Option<&'a [u8]> {
        if self.bytes.len() < n {
            return None;
        }
        let (head, tail) = self.bytes.split_at(n);
        self.bytes = tail;
        Some(head)
    }

    fn u64(&mut self) -> Option<u64> {
        let bytes = <[u8; 8]>::try_from(self.take(8)?).ok()?;
        Some(u64::from_be_bytes(bytes))
    }

    fn str(&mut self) -> Option<String> {
        let len = <[u8; 2]>::try_from(self.take(2)?).ok()?;
        let raw = self.take(usize::from(u16::from_be_bytes(len)))?;
        String::from_utf8(raw.to_vec()).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use equity_types::Address;

    fn addr(s: &str) -> Address {
        Address::parse(s).unwrap()
    }

    fn ownership(custodial: &str, owner: &str, reference: &str, shares: u64) -> BeneficialOwnership {
        BeneficialOwnership {
            custodial_account: addr(custodial),
            company_id: CompanyId(1),
            class_id: ShareClassId::new("COMMON"),
            beneficial_owner: addr(owner),
            reference_id: reference.to_string(),
            reference_type: ReferenceType::Escrow,
            shares,
            locked_at: Utc::now(),
        }
    }

    #[test]
    fn prefix_scan_respects_bounds() {
        let mut kv = MemoryKvStore::new();
        kv.set(vec![1, 1], vec![1]).unwrap();
        kv.set(vec![1, 2], vec![2]).unwrap();
        kv.set(vec![1, 3], vec![3]).unwrap();
        kv.set(vec![2, 1], vec![4]).unwrap();

        let page = kv.scan_prefix(&[1], 1, 5).unwrap();
        assert_eq!(page.len(), 2);
        assert_eq!(page[0].1, vec![2]);
        assert_eq!(page[1].1, vec![3]);
    }

    #[test]
    fn string_components_do_not_bleed_into_longer_prefixes() {
        let mut store = DividendStore::new(MemoryKvStore::new());
        store.put_ownership(&ownership("esc", "bob", "r1", 10)).unwrap();
        store.put_ownership(&ownership("escrow", "bob", "r2", 20)).unwrap();

        let records = store
            .ownership_for_module(&addr("esc"), CompanyId(1), &ShareClassId::new("COMMON"))
            .unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].reference_id, "r1");
    }

    #[test]
    fn owner_index_resolves_primary_records() {
        let mut store = DividendStore::new(MemoryKvStore::new());
        store.put_ownership(&ownership("escrow", "bob", "r1", 10)).unwrap();
        store.put_ownership(&ownership("lending", "bob", "loan-7", 5)).unwrap();
        store.put_ownership(&ownership("escrow", "carol", "r2", 1)).unwrap();

        let records = store.ownership_for_owner(&addr("bob")).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records.iter().all(|r| r.beneficial_owner.as_str() == "bob"));

        let key = OwnershipKey::of(&records[0]);
        assert!(store.remove_ownership(&key).unwrap());
        assert_eq!(store.ownership_for_owner(&addr("bob")).unwrap().len(), 1);
    }

    #[test]
    fn pending_index_distinguishes_blank_class() {
        let mut store = DividendStore::new(MemoryKvStore::new());
        let common = ShareClassId::new("COMMON");
        store
            .set_pending_dividend(CompanyId(1), None, DividendId(4))
            .unwrap();

        assert_eq!(
            store.pending_dividend(CompanyId(1), None).unwrap(),
            Some(DividendId(4))
        );
        assert_eq!(
            store.pending_dividend(CompanyId(1), Some(&common)).unwrap(),
            None
        );

        store.clear_pending_dividend(CompanyId(1), None).unwrap();
        assert_eq!(store.pending_dividend(CompanyId(1), None).unwrap(), None);
    }

    #[test]
    fn oversized_key_components_are_refused() {
        let mut store = DividendStore::new(MemoryKvStore::new());
        let mut record = ownership("escrow", "bob", "r1", 10);
        record.class_id = ShareClassId::new("C".repeat(70_000));

        assert!(matches!(
            store.put_ownership(&record),
            Err(StoreError::KeyTooLong { len: 70_000, .. })
        ));
        assert!(store.kv().is_empty());
        assert!(matches!(
            store.pending_dividend(CompanyId(1), Some(&record.class_id)),
            Err(StoreError::KeyTooLong { .. })
        ));
    }

    #[test]
    fn corrupt_keys_are_reported_in_hex() {
        let mut store = DividendStore::new(MemoryKvStore::new());
        store
            .kv_mut()
            .set(vec![OWNERSHIP_BY_OWNER, 0x00, 0x03, b'b', b'o', b'b'], Vec::new())
            .unwrap();
        match store.ownership_for_owner(&addr("bob")) {
            Err(StoreError::Corrupt { key, .. }) => assert_eq!(key, "0a0003626f62"),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn rollback_restores_overwritten_and_removes_new_keys() {
        let mut store = DividendStore::new(MemoryKvStore::new());
        store.put_ownership(&ownership("escrow", "bob", "r1", 10)).unwrap();
        let committed = store.kv().clone();

        store.begin();
        store.put_ownership(&ownership("escrow", "bob", "r1", 99)).unwrap();
        store.put_ownership(&ownership("escrow", "carol", "r2", 5)).unwrap();
        store
            .remove_ownership(&OwnershipKey::of(&ownership("escrow", "bob", "r1", 0)))
            .unwrap();
        store.rollback().unwrap();

        assert_eq!(store.kv().len(), committed.len());
        let records = store.ownership_for_owner(&addr("bob")).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].shares, 10);
        assert!(store.ownership_for_owner(&addr("carol")).unwrap().is_empty());
    }

    #[test]
    fn committed_writes_survive_rollback() {
        let mut store = DividendStore::new(MemoryKvStore::new());
        store.begin();
        store.put_ownership(&ownership("escrow", "bob", "r1", 10)).unwrap();
        store.commit();
        store.rollback().unwrap();
        assert_eq!(store.ownership_for_owner(&addr("bob")).unwrap().len(), 1);
    }

    #[test]
    fn corrupt_values_surface_as_errors() {
        let mut store = DividendStore::new(MemoryKvStore::new());
        store
            .kv_mut()
            .set(Key::new(DIVIDEND).u64(1).into_bytes().unwrap(), b"not json".to_vec())
            .unwrap();
        assert!(matches!(
            store.dividend(DividendId(1)),
            Err(StoreError::Corrupt { .. })
        ));
    }
}
