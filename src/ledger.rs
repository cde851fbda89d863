//! Per-resource stock, capacity and production bookkeeping.

use std::collections::BTreeMap;

use serde::Serialize;
use tracing::debug;

use crate::catalog::ResourceType;

pub const DEFAULT_PRODUCTION_INTERVAL_SECS: f64 = 10.0;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResourceEntry {
    pub amount: i64,
    pub capacity: i64,
    pub rate: i64,
}

/// Emitted on every ledger mutation. `animate` is a display hint only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ResourceChange {
    pub resource: ResourceType,
    pub amount: i64,
    pub animate: bool,
}

#[derive(Debug, Clone)]
pub struct ResourceLedger {
    entries: BTreeMap<ResourceType, ResourceEntry>,
    interval_secs: f64,
    production_timer: f64,
    changes: Vec<ResourceChange>,
}

impl Default for ResourceLedger {
    fn default() -> Self {
        Self::new(DEFAULT_PRODUCTION_INTERVAL_SECS)
    }
}

impl ResourceLedger {
    pub fn new(interval_secs: f64) -> Self {
        let entries = ResourceType::ALL
            .iter()
            .map(|resource| (*resource, ResourceEntry::default()))
            .collect();
        Self {
            entries,
            interval_secs,
            production_timer: 0.0,
            changes: Vec::new(),
        }
    }

    /// Fills every resource to its starting capacity and zeroes rates.
    pub fn initialize(&mut self, starting_capacities: &BTreeMap<ResourceType, i64>) {
        for resource in ResourceType::ALL {
            let capacity = starting_capacities
                .get(&resource)
                .copied()
                .unwrap_or(0)
                .max(0);
            self.entries.insert(
                resource,
                ResourceEntry {
                    amount: capacity,
                    capacity,
                    rate: 0,
                },
            );
            self.notify(resource, false);
        }
        self.production_timer = 0.0;
    }

    pub fn adjust(&mut self, resource: ResourceType, delta: i64, animate: bool) {
        let entry = self.entry_mut(resource);
        entry.amount = entry
            .amount
            .saturating_add(delta)
            .clamp(0, entry.capacity);
        self.notify(resource, animate);
    }

    /// Advances the production timer. Produces at most once per call and only
    /// when a full interval has accumulated.
    pub fn tick(&mut self, elapsed_secs: f64) -> bool {
        if !elapsed_secs.is_finite() || elapsed_secs <= 0.0 {
            return false;
        }
        self.production_timer += elapsed_secs;
        if self.production_timer < self.interval_secs {
            return false;
        }
        self.production_timer = 0.0;

        let producing: Vec<(ResourceType, i64)> = self
            .entries
            .iter()
            .filter(|(_, entry)| entry.rate != 0 && entry.amount < entry.capacity)
            .map(|(resource, entry)| (*resource, entry.rate))
            .collect();
        for (resource, rate) in &producing {
            self.adjust(*resource, *rate, true);
        }
        debug!(resources = producing.len(), "production interval elapsed");
        true
    }

    pub fn change_capacity(&mut self, resource: ResourceType, delta: i64) {
        if delta == 0 {
            return;
        }
        let entry = self.entry_mut(resource);
        entry.capacity = entry.capacity.saturating_add(delta).max(0);
        if entry.amount > entry.capacity {
            entry.amount = entry.capacity;
            self.notify(resource, false);
        }
    }

    pub fn change_rate(&mut self, resource: ResourceType, delta: i64) {
        let entry = self.entry_mut(resource);
        entry.rate = entry.rate.saturating_add(delta);
    }

    /// Overwrites a capacity restored from a save. Amounts above it are clamped.
    pub fn set_capacity(&mut self, resource: ResourceType, capacity: i64) {
        let entry = self.entry_mut(resource);
        entry.capacity = capacity.max(0);
        entry.amount = entry.amount.min(entry.capacity);
    }

    pub fn set_rate(&mut self, resource: ResourceType, rate: i64) {
        self.entry_mut(resource).rate = rate;
    }

    /// Restores a stored amount, clamped to the current capacity.
    pub fn set_amount(&mut self, resource: ResourceType, amount: i64) {
        let entry = self.entry_mut(resource);
        entry.amount = amount.clamp(0, entry.capacity);
        self.notify(resource, false);
    }

    pub fn entry(&self, resource: ResourceType) -> ResourceEntry {
        self.entries.get(&resource).copied().unwrap_or_default()
    }

    pub fn amount(&self, resource: ResourceType) -> i64 {
        self.entry(resource).amount
    }

    pub fn capacity(&self, resource: ResourceType) -> i64 {
        self.entry(resource).capacity
    }

    pub fn rate(&self, resource: ResourceType) -> i64 {
        self.entry(resource).rate
    }

    pub fn amounts(&self) -> BTreeMap<ResourceType, i64> {
        self.project(|entry| entry.amount)
    }

    pub fn capacities(&self) -> BTreeMap<ResourceType, i64> {
        self.project(|entry| entry.capacity)
    }

    pub fn rates(&self) -> BTreeMap<ResourceType, i64> {
        self.project(|entry| entry.rate)
    }

    pub fn production_timer(&self) -> f64 {
        self.production_timer
    }

    pub fn interval_secs(&self) -> f64 {
        self.interval_secs
    }

    pub fn drain_changes(&mut self) -> Vec<ResourceChange> {
        std::mem::take(&mut self.changes)
    }

    fn project(&self, field: impl Fn(&ResourceEntry) -> i64) -> BTreeMap<ResourceType, i64> {
        self.entries
            .iter()
            .map(|(resource, entry)| (*resource, field(entry)))
            .collect()
    }

    fn entry_mut(&mut self, resource: ResourceType) -> &mut ResourceEntry {
        self.entries.entry(resource).or_default()
    }

    fn notify(&mut self, resource: ResourceType, animate: bool) {
        let amount = self.amount(resource);
        self.changes.push(ResourceChange {
            resource,
            amount,
            animate,
        });
    }
}
