//! JSON File Storage
//!
//! Each collection is one pretty-printed JSON array on disk, rewritten in
//! full on every mutation. Reads always go back to the file so manual edits
//! are picked up without a restart.
//!
//! All read-modify-write cycles of a store run under one async mutex, and
//! writes land in a sibling temp file that is renamed over the target.

use std::marker::PhantomData;
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::Mutex;

use crate::donation::Donation;
use crate::error::{RecordError, Result};
use crate::order::Order;

/// A record that can live in a [`JsonFileStore`]
pub trait Record: Clone + PartialEq + Serialize + DeserializeOwned + Send + Sync + 'static {
    fn id(&self) -> &str;

    /// Bump the `updated_at` timestamp
    fn touch(&mut self);
}

/// File-backed collection of records
pub struct JsonFileStore<T> {
    path: PathBuf,
    lock: Mutex<()>,
    _records: PhantomData<fn() -> T>,
}

pub type DonationStore = JsonFileStore<Donation>;
pub type OrderStore = JsonFileStore<Order>;

impl<T: Record> JsonFileStore<T> {
    /// Open a store at `path`. The file is created on first write.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock: Mutex::new(()),
            _records: PhantomData,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// All records in insertion order
    pub async fn list(&self) -> Result<Vec<T>> {
        let _guard = self.lock.lock().await;
        self.load().await
    }

    pub async fn get(&self, id: &str) -> Result<Option<T>> {
        self.find(|r| r.id() == id).await
    }

    /// First record matching `predicate`
    pub async fn find<P>(&self, predicate: P) -> Result<Option<T>>
    where
        P: Fn(&T) -> bool,
    {
        let _guard = self.lock.lock().await;
        Ok(self.load().await?.into_iter().find(|r| predicate(r)))
    }

    /// Append a new record
    pub async fn insert(&self, record: T) -> Result<T> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        if records.iter().any(|r| r.id() == record.id()) {
            return Err(RecordError::Duplicate(record.id().to_string()));
        }
        records.push(record.clone());
        self.persist(&records).await?;
        tracing::debug!(id = %record.id(), path = %self.path.display(), "Inserted record");
        Ok(record)
    }

    /// Mutate the record with `id`.
    ///
    /// Nothing is written if `mutate` fails.
    pub async fn update<F, R>(&self, id: &str, mutate: F) -> Result<(T, R)>
    where
        F: FnOnce(&mut T) -> Result<R>,
    {
        self.update_where(|r| r.id() == id, mutate)
            .await?
            .ok_or_else(|| RecordError::NotFound(id.to_string()))
    }

    /// Mutate the first record matching `predicate`; `None` if nothing matched.
    ///
    /// A mutation that leaves the record as it was is not written back.
    pub async fn update_where<P, F, R>(&self, predicate: P, mutate: F) -> Result<Option<(T, R)>>
    where
        P: Fn(&T) -> bool,
        F: FnOnce(&mut T) -> Result<R>,
    {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        let Some(record) = records.iter_mut().find(|r| predicate(r)) else {
            return Ok(None);
        };

        let before = record.clone();
        let outcome = mutate(record)?;
        if *record == before {
            return Ok(Some((before, outcome)));
        }
        record.touch();
        let updated = record.clone();

        self.persist(&records).await?;
        Ok(Some((updated, outcome)))
    }

    /// Remove exactly one record. Returns `false` if the id is unknown.
    pub async fn delete(&self, id: &str) -> Result<bool> {
        let _guard = self.lock.lock().await;
        let mut records = self.load().await?;
        let Some(index) = records.iter().position(|r| r.id() == id) else {
            return Ok(false);
        };
        records.remove(index);
        self.persist(&records).await?;
        tracing::info!(id, path = %self.path.display(), "Deleted record");
        Ok(true)
    }

    async fn load(&self) -> Result<Vec<T>> {
        let bytes = match tokio::fs::read(&self.path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        Ok(serde_json::from_slice(&bytes)?)
    }

    async fn persist(&self, records: &[T]) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_vec_pretty(records)?;

        let mut tmp = self.path.clone().into_os_string();
        tmp.push(".tmp");
        tokio::fs::write(&tmp, &json).await?;
        tokio::fs::rename(&tmp, &self.path).await?;
        Ok(())
    }
}

impl JsonFileStore<Donation> {
    pub async fn find_by_session(&self, session_id: &str) -> Result<Option<Donation>> {
        self.find(|d| d.stripe_session_id.as_deref() == Some(session_id))
            .await
    }

    pub async fn find_by_subscription(&self, subscription_id: &str) -> Result<Option<Donation>> {
        self.find(|d| d.stripe_subscription_id.as_deref() == Some(subscription_id))
            .await
    }
}

impl JsonFileStore<Order> {
    pub async fn find_by_session(&self, session_id: &str) -> Result<Option<Order>> {
        self.find(|o| o.stripe_session_id.as_deref() == Some(session_id))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::donation::{DonorInfo, NewDonation};
    use crate::status::RecordStatus;
    use rust_decimal_macros::dec;
    use std::sync::Arc;
    use tempfile::TempDir;

    fn donation(amount: rust_decimal::Decimal) -> Donation {
        Donation::new(NewDonation {
            amount,
            is_monthly: false,
            donor_info: DonorInfo {
                first_name: "Test".into(),
                last_name: "Donor".into(),
                email: "donor@example.org".into(),
                ..Default::default()
            },
            message: None,
            is_public: false,
        })
        .unwrap()
    }

    fn setup() -> (DonationStore, TempDir) {
        let dir = TempDir::new().unwrap();
        let store = DonationStore::open(dir.path().join("data").join("donations.json"));
        (store, dir)
    }

    #[tokio::test]
    async fn test_missing_file_is_empty() {
        let (store, _dir) = setup();
        assert!(store.list().await.unwrap().is_empty());
        assert!(store.get("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_insert_and_reopen() {
        let (store, _dir) = setup();
        let saved = store.insert(donation(dec!(20))).await.unwrap();

        let reopened = DonationStore::open(store.path().to_path_buf());
        let loaded = reopened.get(&saved.id).await.unwrap().unwrap();
        assert_eq!(loaded.amount, dec!(20));
        assert_eq!(loaded.status, RecordStatus::Pending);
    }

    #[tokio::test]
    async fn test_duplicate_insert_rejected() {
        let (store, _dir) = setup();
        let d = store.insert(donation(dec!(20))).await.unwrap();
        assert!(matches!(store.insert(d).await, Err(RecordError::Duplicate(_))));
    }

    #[tokio::test]
    async fn test_delete_removes_exactly_one() {
        let (store, _dir) = setup();
        let a = store.insert(donation(dec!(1))).await.unwrap();
        let b = store.insert(donation(dec!(2))).await.unwrap();
        let c = store.insert(donation(dec!(3))).await.unwrap();

        assert!(store.delete(&b.id).await.unwrap());
        assert!(!store.delete(&b.id).await.unwrap());

        let reopened = DonationStore::open(store.path().to_path_buf());
        let ids: Vec<_> = reopened.list().await.unwrap().into_iter().map(|d| d.id).collect();
        assert_eq!(ids, vec![a.id, c.id]);
    }

    #[tokio::test]
    async fn test_failed_update_persists_nothing() {
        let (store, _dir) = setup();
        let d = store.insert(donation(dec!(5))).await.unwrap();
        store.update(&d.id, |d| d.cancel()).await.unwrap();

        let result = store.update(&d.id, |d| d.complete(None, None)).await;
        assert!(matches!(result, Err(RecordError::InvalidTransition { .. })));
        assert_eq!(store.get(&d.id).await.unwrap().unwrap().status, RecordStatus::Cancelled);
    }

    #[tokio::test]
    async fn test_noop_update_keeps_timestamp() {
        let (store, _dir) = setup();
        let d = store.insert(donation(dec!(5))).await.unwrap();
        let (completed, changed) = store.update(&d.id, |d| d.complete(None, None)).await.unwrap();
        assert!(changed);

        let (again, changed) = store.update(&d.id, |d| d.complete(None, None)).await.unwrap();
        assert!(!changed);
        assert_eq!(again.updated_at, completed.updated_at);
        assert_eq!(
            store.get(&d.id).await.unwrap().unwrap().updated_at,
            completed.updated_at
        );
    }

    #[tokio::test]
    async fn test_update_unknown_id() {
        let (store, _dir) = setup();
        let result = store.update("missing", |_| Ok(())).await;
        assert!(matches!(result, Err(RecordError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_lookup_by_session_and_subscription() {
        let (store, _dir) = setup();
        let mut d = donation(dec!(15));
        d.stripe_session_id = Some("cs_test_1".into());
        d.stripe_subscription_id = Some("sub_1".into());
        store.insert(d.clone()).await.unwrap();

        assert_eq!(store.find_by_session("cs_test_1").await.unwrap().unwrap().id, d.id);
        assert_eq!(store.find_by_subscription("sub_1").await.unwrap().unwrap().id, d.id);
        assert!(store.find_by_session("cs_other").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_concurrent_inserts_are_not_lost() {
        let (store, _dir) = setup();
        let store = Arc::new(store);

        let handles: Vec<_> = (1..=20)
            .map(|i| {
                let store = store.clone();
                tokio::spawn(async move { store.insert(donation(i.into())).await })
            })
            .collect();
        for handle in handles {
            handle.await.unwrap().unwrap();
        }

        assert_eq!(store.list().await.unwrap().len(), 20);
    }
}
