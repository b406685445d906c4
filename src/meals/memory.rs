use std::collections::HashMap;

use async_trait::async_trait;
use time::Date;
use tokio::sync::RwLock;
use uuid::Uuid;

use super::model::MealLog;
use super::repo::{ensure_foods, DayBuckets, LogStore, NewMealLog};
use crate::clock::LocalDays;
use crate::error::StoreError;

/// In-process log store. Appends hold the write lock for the whole
/// assign/compute/persist step, so readers never see a half-built log.
pub struct MemoryLogStore {
    days: LocalDays,
    logs: RwLock<HashMap<Uuid, Vec<MealLog>>>,
}

impl MemoryLogStore {
    pub fn new(days: LocalDays) -> Self {
        Self {
            days,
            logs: RwLock::new(HashMap::new()),
        }
    }

    pub async fn count(&self, user_id: Uuid) -> usize {
        self.logs.read().await.get(&user_id).map_or(0, Vec::len)
    }
}

#[async_trait]
impl LogStore for MemoryLogStore {
    async fn append(&self, entry: NewMealLog) -> Result<MealLog, StoreError> {
        ensure_foods(&entry)?;
        let mut logs = self.logs.write().await;
        let log = MealLog::assemble(
            Uuid::new_v4(),
            entry.user_id,
            self.days.now(),
            entry.meal_type,
            entry.foods,
            entry.original_text,
        )?;
        logs.entry(entry.user_id).or_default().push(log.clone());
        Ok(log)
    }

    async fn query_range(
        &self,
        user_id: Uuid,
        from: Date,
        to: Date,
    ) -> Result<DayBuckets, StoreError> {
        let logs = self.logs.read().await;
        let mut buckets = DayBuckets::new();
        let Some(user_logs) = logs.get(&user_id) else {
            return Ok(buckets);
        };

        let mut selected: Vec<&MealLog> = user_logs
            .iter()
            .filter(|log| {
                let date = self.days.date_of(log.timestamp());
                date >= from && date <= to
            })
            .collect();
        // stable: equal timestamps keep append order
        selected.sort_by_key(|log| log.timestamp());

        for log in selected {
            buckets
                .entry(self.days.date_of(log.timestamp()))
                .or_default()
                .push(log.clone());
        }
        Ok(buckets)
    }
}
