//! Bill storage: a JSON array on disk, or in memory.

use std::collections::HashSet;
use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use fs2::FileExt;
use parking_lot::Mutex;

use super::{BillStore, StoreError};
use crate::domain::{Bill, BillIdentity};

/// `bills.json` guarded by an exclusive lock on `bills.lock`
pub struct JsonBillStore {
    path: PathBuf,
    lock_path: PathBuf,
}

impl JsonBillStore {
    pub fn new(path: impl Into<PathBuf>, lock_path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            lock_path: lock_path.into(),
        }
    }

    /// Store with the lock file next to the data file
    pub fn at(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let lock_path = path.with_extension("lock");
        Self::new(path, lock_path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run a read-modify-write under the file lock
    fn locked<T>(
        &self,
        op: impl FnOnce(&mut Vec<Bill>) -> T,
    ) -> Result<T, StoreError> {
        let lock = self.acquire()?;
        let mut bills = self.read()?;
        let before = bills.len();
        let out = op(&mut bills);
        if bills.len() != before {
            self.write(&bills)?;
        }
        drop(lock);
        Ok(out)
    }

    fn acquire(&self) -> Result<File, StoreError> {
        if let Some(dir) = self.lock_path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        let file = OpenOptions::new()
            .create(true)
            .truncate(false)
            .write(true)
            .open(&self.lock_path)?;
        file.lock_exclusive()
            .map_err(|_| StoreError::Lock(self.lock_path.display().to_string()))?;
        // Released when the file is dropped
        Ok(file)
    }

    fn read(&self) -> Result<Vec<Bill>, StoreError> {
        match std::fs::read_to_string(&self.path) {
            Ok(content) if content.trim().is_empty() => Ok(Vec::new()),
            Ok(content) => Ok(serde_json::from_str(&content)?),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(Vec::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, bills: &[Bill]) -> Result<(), StoreError> {
        let dir = self.path.parent().unwrap_or(Path::new("."));
        std::fs::create_dir_all(dir)?;
        let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
        serde_json::to_writer_pretty(&mut tmp, bills)?;
        tmp.flush()?;
        tmp.persist(&self.path).map_err(|e| e.error)?;
        Ok(())
    }
}

impl BillStore for JsonBillStore {
    fn add(&self, bill: Bill) -> Result<(), StoreError> {
        self.locked(|bills| bills.push(bill))?;
        Ok(())
    }

    fn delete_many(&self, identities: &[BillIdentity]) -> Result<usize, StoreError> {
        self.locked(|bills| remove_matching(bills, identities))
    }

    fn all(&self) -> Result<Vec<Bill>, StoreError> {
        let _lock = self.acquire()?;
        self.read()
    }

    fn replace_all(&self, replacement: Vec<Bill>) -> Result<(), StoreError> {
        let _lock = self.acquire()?;
        self.write(&replacement)
    }
}

/// Volatile store for tests and dry runs
#[derive(Default)]
pub struct MemoryBillStore {
    bills: Mutex<Vec<Bill>>,
}

impl MemoryBillStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl BillStore for MemoryBillStore {
    fn add(&self, bill: Bill) -> Result<(), StoreError> {
        self.bills.lock().push(bill);
        Ok(())
    }

    fn delete_many(&self, identities: &[BillIdentity]) -> Result<usize, StoreError> {
        Ok(remove_matching(&mut self.bills.lock(), identities))
    }

    fn all(&self) -> Result<Vec<Bill>, StoreError> {
        Ok(self.bills.lock().clone())
    }

    fn replace_all(&self, bills: Vec<Bill>) -> Result<(), StoreError> {
        *self.bills.lock() = bills;
        Ok(())
    }
}

fn remove_matching(bills: &mut Vec<Bill>, identities: &[BillIdentity]) -> usize {
    let targets: HashSet<&BillIdentity> = identities.iter().collect();
    let before = bills.len();
    bills.retain(|b| !targets.contains(&b.identity()));
    before - bills.len()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{parse_bill_time, BillKind};
    use chrono::Utc;
    use tempfile::TempDir;

    fn bill(amount: f64, category: &str) -> Bill {
        Bill {
            amount,
            kind: BillKind::Expense,
            asset_name: "微信".to_string(),
            category: category.to_string(),
            time: parse_bill_time("2024-05-01 12:30:00").unwrap(),
            memo: String::new(),
            icon: String::new(),
            captured_at: Utc::now(),
        }
    }

    #[test]
    fn test_json_store_add_and_list() {
        let temp = TempDir::new().unwrap();
        let store = JsonBillStore::at(temp.path().join("bills.json"));

        assert!(store.all().unwrap().is_empty());
        store.add(bill(10.0, "交通")).unwrap();
        store.add(bill(25.5, "餐饮/::/午餐")).unwrap();

        let all = JsonBillStore::at(temp.path().join("bills.json")).all().unwrap();
        assert_eq!(all.len(), 2);
        assert_eq!(all[1].category, "餐饮/::/午餐");
        assert!(temp.path().join("bills.lock").exists());
    }

    #[test]
    fn test_delete_many_by_identity() {
        let temp = TempDir::new().unwrap();
        let store = JsonBillStore::at(temp.path().join("bills.json"));
        let keep = bill(10.0, "交通");
        let gone = bill(25.5, "餐饮/::/午餐");
        store.add(keep.clone()).unwrap();
        store.add(gone.clone()).unwrap();

        assert_eq!(store.delete_many(&[gone.identity()]).unwrap(), 1);
        assert_eq!(store.delete_many(&[gone.identity()]).unwrap(), 0);
        assert_eq!(store.all().unwrap(), vec![keep]);
    }

    #[test]
    fn test_memory_store_replace_all() {
        let store = MemoryBillStore::new();
        store.add(bill(1.0, "交通")).unwrap();
        store.replace_all(vec![bill(2.0, "购物")]).unwrap();
        let all = store.all().unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].amount, 2.0);
    }
}
