use async_trait::async_trait;
use dashmap::DashMap;
use ulid::Ulid;

use crate::limits::MAX_RECORDS_PER_TARGET;
use crate::model::*;

use super::{Repository, StoreError};

/// DashMap-backed store. Records live in one vector per target, sorted by start.
pub struct MemoryStore {
    targets: DashMap<String, Vec<AliasRecord>>,
    /// Reverse lookup: record id → target
    record_to_target: DashMap<Ulid, String>,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            targets: DashMap::new(),
            record_to_target: DashMap::new(),
        }
    }

    pub fn record_count(&self) -> usize {
        self.record_to_target.len()
    }

    /// Storage-level constraints an insert must meet.
    pub fn check_insert(&self, record: &AliasRecord) -> Result<(), StoreError> {
        if self.record_to_target.contains_key(&record.id) {
            return Err(StoreError::AlreadyExists(record.id));
        }
        let count = self.targets.get(&record.target).map_or(0, |r| r.len());
        if count >= MAX_RECORDS_PER_TARGET {
            return Err(StoreError::LimitExceeded("too many records for target"));
        }
        Ok(())
    }

    /// Insert keeping the per-target vector sorted by start; equal starts keep insertion order.
    pub fn insert_record(&self, record: AliasRecord) -> Result<(), StoreError> {
        self.check_insert(&record)?;
        let mut records = self.targets.entry(record.target.clone()).or_default();
        let pos = records.partition_point(|r| r.interval.start <= record.interval.start);
        self.record_to_target.insert(record.id, record.target.clone());
        records.insert(pos, record);
        Ok(())
    }

    pub fn set_end(&self, id: Ulid, end: Option<Ms>) -> Result<(), StoreError> {
        let target = self
            .record_to_target
            .get(&id)
            .map(|e| e.value().clone())
            .ok_or(StoreError::NotFound(id))?;
        let mut records = self.targets.get_mut(&target).ok_or(StoreError::NotFound(id))?;
        let record = records
            .iter_mut()
            .find(|r| r.id == id)
            .ok_or(StoreError::NotFound(id))?;
        if let Some(end) = end
            && end <= record.interval.start
        {
            return Err(StoreError::InvalidEnd {
                id,
                start: record.interval.start,
                end,
            });
        }
        record.interval.end = end;
        Ok(())
    }

    /// Start of a record, if present. Used to pre-validate end changes before logging them.
    pub fn start_of(&self, id: &Ulid) -> Option<Ms> {
        let target = self.record_to_target.get(id)?.value().clone();
        let records = self.targets.get(&target)?;
        records.iter().find(|r| r.id == *id).map(|r| r.interval.start)
    }

    pub fn records_for_target(&self, target: &str) -> Vec<AliasRecord> {
        self.targets
            .get(target)
            .map(|e| e.value().clone())
            .unwrap_or_default()
    }

    pub fn records_for_key(&self, alias: &str, target: &str) -> Vec<AliasRecord> {
        self.targets
            .get(target)
            .map(|e| e.value().iter().filter(|r| r.alias == alias).cloned().collect())
            .unwrap_or_default()
    }

    pub fn apply_event(&self, event: &Event) -> Result<(), StoreError> {
        match event {
            Event::AliasCreated {
                id,
                alias,
                target,
                start,
                end,
            } => self.insert_record(AliasRecord {
                id: *id,
                alias: alias.clone(),
                target: target.clone(),
                interval: Interval {
                    start: *start,
                    end: *end,
                },
            }),
            Event::EndChanged { id, end } => self.set_end(*id, *end),
        }
    }

    /// The minimal event list that recreates the current state.
    pub fn snapshot_events(&self) -> Vec<Event> {
        let mut events = Vec::with_capacity(self.record_count());
        for entry in self.targets.iter() {
            events.extend(entry.value().iter().map(Event::created));
        }
        events
    }
}

#[async_trait]
impl Repository for MemoryStore {
    async fn insert(&self, record: AliasRecord) -> Result<(), StoreError> {
        self.insert_record(record)
    }

    async fn scan_by_key(&self, alias: &str, target: &str) -> Result<Vec<AliasRecord>, StoreError> {
        Ok(self.records_for_key(alias, target))
    }

    async fn scan_by_target(&self, target: &str) -> Result<Vec<AliasRecord>, StoreError> {
        Ok(self.records_for_target(target))
    }

    async fn update_end(&self, id: Ulid, end: Option<Ms>) -> Result<(), StoreError> {
        self.set_end(id, end)
    }
}
