use parking_lot::Mutex;
use std::sync::Arc;
use super::ExchangeHealth;

/// Ordered collection of health records, one lock per exchange.
///
/// Insertion order is the enumeration order routing relies on for ties.
#[derive(Debug, Default, Clone)]
pub struct HealthBook {
    entries: Vec<(String, Arc<Mutex<ExchangeHealth>>)>,
}

impl HealthBook {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replaces an existing record in place, keeping its position.
    pub fn insert(&mut self, health: ExchangeHealth) -> Arc<Mutex<ExchangeHealth>> {
        let id = health.exchange_id.clone();
        if let Some((_, existing)) = self.entries.iter().find(|(key, _)| *key == id) {
            *existing.lock() = health;
            return existing.clone();
        }

        let slot = Arc::new(Mutex::new(health));
        self.entries.push((id, slot.clone()));
        slot
    }

    pub fn get(&self, exchange: &str) -> Option<Arc<Mutex<ExchangeHealth>>> {
        self.entries
            .iter()
            .find(|(id, _)| id == exchange)
            .map(|(_, slot)| slot.clone())
    }

    pub fn snapshot(&self, exchange: &str) -> Option<ExchangeHealth> {
        self.get(exchange).map(|slot| slot.lock().clone())
    }

    pub fn snapshots(&self) -> Vec<ExchangeHealth> {
        self.entries.iter().map(|(_, slot)| slot.lock().clone()).collect()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(id, _)| id.as_str())
    }

    pub fn is_connected(&self, exchange: &str) -> bool {
        self.get(exchange).is_some_and(|slot| slot.lock().connected)
    }

    /// Connected exchanges with a success rate above one half.
    pub fn healthy_ids(&self) -> Vec<String> {
        self.entries
            .iter()
            .filter(|(_, slot)| slot.lock().is_healthy())
            .map(|(id, _)| id.clone())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
