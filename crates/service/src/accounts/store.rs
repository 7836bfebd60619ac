use std::sync::Arc;

use tracing::{debug, error, info, warn};

use super::domain::{encode_active, parse_account_key, Account, AccountInput, COUNTER_FIELD, COUNTER_KEY};
use crate::errors::ServiceError;
use crate::storage::HashStore;

/// Owns the account hashes and the `nextId` counter inside a [`HashStore`].
///
/// Holds no state of its own besides the backend handle, so one instance is
/// shared by every request handler.
#[derive(Clone)]
pub struct AccountStore {
    kv: Arc<dyn HashStore>,
}

impl AccountStore {
    pub fn new(kv: Arc<dyn HashStore>) -> Self {
        Self { kv }
    }

    /// Seed the counter if it is absent and return its current value.
    ///
    /// The seed is one past both the number of stored accounts and the
    /// highest id among them, so pre-existing records are never overwritten.
    pub async fn bootstrap(&self) -> Result<u64, ServiceError> {
        let ids: Vec<u64> = self
            .kv
            .keys()
            .await?
            .iter()
            .filter_map(|k| parse_account_key(k))
            .collect();
        let highest = ids.iter().copied().max().unwrap_or(0);
        let seed = (ids.len() as u64).max(highest) + 1;

        let seeded = self.kv.hset_nx(COUNTER_KEY, COUNTER_FIELD, &seed.to_string()).await?;
        let current = self
            .kv
            .hgetall(COUNTER_KEY)
            .await?
            .get(COUNTER_FIELD)
            .and_then(|v| v.parse::<u64>().ok())
            .ok_or_else(|| ServiceError::Corrupt {
                key: COUNTER_KEY.to_string(),
                reason: "counter is not a positive integer".into(),
            })?;
        if seeded {
            info!(event = "counter_seeded", next_id = current, accounts = ids.len(), "initialized id counter");
        } else {
            if current <= highest {
                warn!(event = "counter_behind", next_id = current, highest, "id counter is not above the highest stored id");
            }
            debug!(next_id = current, "id counter already present");
        }
        Ok(current)
    }

    /// Reserve a fresh identifier with a single atomic increment.
    pub async fn allocate_id(&self) -> Result<u64, ServiceError> {
        let next = self.kv.hincr_by(COUNTER_KEY, COUNTER_FIELD, 1).await?;
        match u64::try_from(next - 1) {
            Ok(id) if id > 0 => Ok(id),
            _ => Err(ServiceError::Storage("id counter was not initialized".into())),
        }
    }

    /// Validate, allocate an id and write the record. The write never
    /// replaces an existing hash: if the counter has fallen behind the stored
    /// ids the create fails instead of clobbering an account.
    pub async fn create(&self, input: AccountInput) -> Result<Account, ServiceError> {
        let fields = input.validate()?;
        let id = self.allocate_id().await?;
        let account = Account::new(id, fields);
        if !self.kv.hset_if_absent(&id.to_string(), &account.to_fields()).await? {
            error!(event = "id_collision", id, "allocated id already holds a record; id counter is behind");
            return Err(ServiceError::Storage(format!("allocated id {id} is already in use")));
        }
        info!(event = "account_created", id, "account created");
        Ok(account)
    }

    pub async fn get(&self, id: &str) -> Result<Account, ServiceError> {
        self.load(id).await?.ok_or_else(|| ServiceError::account_not_found(id))
    }

    /// All accounts ordered by id, optionally restricted to an exact name.
    ///
    /// An empty store lists as an empty vector, but a name that matches
    /// nothing is `NotFound`.
    pub async fn list(&self, name: Option<&str>) -> Result<Vec<Account>, ServiceError> {
        let mut ids: Vec<u64> = self
            .kv
            .keys()
            .await?
            .iter()
            .filter_map(|k| parse_account_key(k))
            .collect();
        ids.sort_unstable();

        let mut accounts = Vec::with_capacity(ids.len());
        for id in ids {
            let key = id.to_string();
            // 单条坏数据不影响整体列表
            match Account::from_fields(&key, &self.kv.hgetall(&key).await?) {
                Ok(Some(account)) => accounts.push(account),
                Ok(None) => {}
                Err(e) => warn!(event = "corrupt_record_skipped", key = %key, error = %e, "skipping unreadable account"),
            }
        }

        match name.filter(|n| !n.is_empty()) {
            None => Ok(accounts),
            Some(name) => {
                let matched: Vec<Account> = accounts.into_iter().filter(|a| a.name == name).collect();
                if matched.is_empty() {
                    return Err(ServiceError::name_not_found(name));
                }
                Ok(matched)
            }
        }
    }

    /// Overwrite name, balance and active; the id never changes.
    pub async fn update(&self, id: &str, input: AccountInput) -> Result<Account, ServiceError> {
        if id == COUNTER_KEY {
            return Err(ServiceError::account_not_found(id));
        }
        let fields = input.validate()?;
        let existing = self.get(id).await?;
        let account = Account::new(existing.id, fields);
        // deleted since the read: do not resurrect it
        if !self.kv.hset_if_exists(id, &account.to_fields()).await? {
            return Err(ServiceError::account_not_found(id));
        }
        info!(event = "account_updated", id = account.id, "account updated");
        Ok(account)
    }

    pub async fn deactivate(&self, id: &str) -> Result<Account, ServiceError> {
        let mut account = self.get(id).await?;
        if !self.kv.hset_if_exists(id, &[("active", encode_active(false).to_string())]).await? {
            return Err(ServiceError::account_not_found(id));
        }
        account.active = false;
        info!(event = "account_deactivated", id = account.id, "account deactivated");
        Ok(account)
    }

    /// Remove an account. Succeeds whether or not it existed; only the
    /// counter key is refused.
    pub async fn delete(&self, id: &str) -> Result<(), ServiceError> {
        if id == COUNTER_KEY {
            return Err(ServiceError::account_not_found(id));
        }
        if parse_account_key(id).is_some() {
            let existed = self.kv.del(id).await?;
            info!(event = "account_deleted", id, existed, "account delete");
        }
        Ok(())
    }

    async fn load(&self, id: &str) -> Result<Option<Account>, ServiceError> {
        if parse_account_key(id).is_none() {
            return Ok(None);
        }
        Account::from_fields(id, &self.kv.hgetall(id).await?)
    }
}
