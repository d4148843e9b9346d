//! In-memory embedding table.
//!
//! Maps topic ids to vectors and fixes the slot order the similarity index is
//! built in: entry `i` of the table is slot `i` of the index. Replacing a
//! vector keeps its slot; new ids always take the next slot. Nothing here is
//! persisted; the engine rebuilds it from the store on open.

use std::collections::HashMap;

use serde::Serialize;

#[derive(Debug, Clone)]
pub struct TableEntry {
    pub slot: usize,
    pub id: String,
    pub vector: Vec<f32>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize)]
pub struct TableUsage {
    pub count: usize,
    pub approx_memory_bytes: usize,
}

impl TableUsage {
    pub fn memory_size_mb(&self) -> f64 {
        self.approx_memory_bytes as f64 / 1024.0 / 1024.0
    }
}

/// What [`EmbeddingTable::put`] did with the vector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Placement {
    /// The id was new and took this (last) slot.
    Appended(usize),
    /// The id already had this slot; its vector was swapped in place.
    Replaced(usize),
}

impl Placement {
    pub fn slot(self) -> usize {
        match self {
            Self::Appended(slot) | Self::Replaced(slot) => slot,
        }
    }
}

#[derive(Debug, Default)]
pub struct EmbeddingTable {
    entries: Vec<TableEntry>,
    slots: HashMap<String, usize>,
}

impl EmbeddingTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&mut self, id: &str, vector: Vec<f32>) -> Placement {
        if let Some(&slot) = self.slots.get(id) {
            self.entries[slot].vector = vector;
            return Placement::Replaced(slot);
        }
        let slot = self.entries.len();
        self.entries.push(TableEntry {
            slot,
            id: id.to_string(),
            vector,
        });
        self.slots.insert(id.to_string(), slot);
        Placement::Appended(slot)
    }

    pub fn get(&self, id: &str) -> Option<&[f32]> {
        self.slots.get(id).map(|&slot| self.entries[slot].vector.as_slice())
    }

    pub fn id_for_slot(&self, slot: usize) -> Option<&str> {
        self.entries.get(slot).map(|e| e.id.as_str())
    }

    /// All entries in slot order.
    pub fn get_all(&self) -> &[TableEntry] {
        &self.entries
    }

    pub fn vectors(&self) -> impl Iterator<Item = &[f32]> {
        self.entries.iter().map(|e| e.vector.as_slice())
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Vector payload bytes plus a rough per-entry overhead for the id and map slot.
    pub fn usage_stats(&self) -> TableUsage {
        let approx_memory_bytes = self
            .entries
            .iter()
            .map(|e| {
                e.vector.len() * std::mem::size_of::<f32>()
                    + 2 * e.id.len()
                    + std::mem::size_of::<TableEntry>()
                    + std::mem::size_of::<(String, usize)>()
            })
            .sum();
        TableUsage {
            count: self.entries.len(),
            approx_memory_bytes,
        }
    }
}
