use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::content::{Catalog, ItemCategory, ItemDef};
use crate::error::{accepted, EntityKind, GameError, GameResult};
use crate::events::{EventQueue, GameEvent};

/// Flat `(item, quantity)` record, in first-acquired order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryEntry {
    pub item: String,
    pub quantity: u32,
}

/// Held items keyed by item id, bounded by a total-count capacity.
///
/// Every equipped item is held and equippable; dropping the last one unequips it.
#[derive(Debug)]
pub struct Inventory {
    catalog: Arc<Catalog>,
    capacity: u32,
    held: BTreeMap<String, u32>,
    entries: Vec<InventoryEntry>,
    equipped: BTreeSet<String>,
    events: EventQueue,
}

impl Inventory {
    pub fn new(catalog: Arc<Catalog>, capacity: u32) -> Self {
        Self {
            catalog,
            capacity,
            held: BTreeMap::new(),
            entries: Vec::new(),
            equipped: BTreeSet::new(),
            events: EventQueue::default(),
        }
    }

    pub fn add_item(&mut self, item: &str, quantity: u32) -> bool {
        accepted("add_item", self.try_add_item(item, quantity))
    }

    pub fn try_add_item(&mut self, item: &str, quantity: u32) -> GameResult<()> {
        self.item_def(item)?;
        if quantity == 0 {
            return Err(GameError::invalid_state("quantity must be at least 1"));
        }
        let held = self.total_item_count();
        if held.saturating_add(quantity) > self.capacity {
            self.events.push(GameEvent::InventoryFull {
                item: item.to_string(),
            });
            return Err(GameError::CapacityExceeded {
                item: item.to_string(),
                requested: quantity,
                held,
                capacity: self.capacity,
            });
        }

        *self.held.entry(item.to_string()).or_insert(0) += quantity;
        self.mirror(item);
        self.events.push(GameEvent::ItemAdded {
            item: item.to_string(),
            quantity,
        });
        Ok(())
    }

    pub fn remove_item(&mut self, item: &str, quantity: u32) -> bool {
        accepted("remove_item", self.try_remove_item(item, quantity))
    }

    pub fn try_remove_item(&mut self, item: &str, quantity: u32) -> GameResult<()> {
        if quantity == 0 {
            return Err(GameError::invalid_state("quantity must be at least 1"));
        }
        let Some(held) = self.held.get_mut(item) else {
            return Err(GameError::not_found(EntityKind::Item, item));
        };
        if quantity > *held {
            return Err(GameError::invalid_state(format!(
                "cannot remove {quantity} x '{item}', only {held} held"
            )));
        }

        *held -= quantity;
        if *held == 0 {
            self.held.remove(item);
        }
        self.mirror(item);
        self.events.push(GameEvent::ItemRemoved {
            item: item.to_string(),
            quantity,
        });
        if !self.held.contains_key(item) && self.equipped.remove(item) {
            self.events.push(GameEvent::ItemUnequipped {
                item: item.to_string(),
            });
        }
        Ok(())
    }

    pub fn equip_item(&mut self, item: &str) -> bool {
        accepted("equip_item", self.try_equip_item(item))
    }

    pub fn try_equip_item(&mut self, item: &str) -> GameResult<()> {
        if !self.item_def(item)?.equippable {
            return Err(GameError::invalid_state(format!("'{item}' cannot be equipped")));
        }
        if !self.has_item(item, 1) {
            return Err(GameError::invalid_state(format!("'{item}' is not held")));
        }
        if !self.equipped.insert(item.to_string()) {
            return Err(GameError::invalid_state(format!("'{item}' is already equipped")));
        }
        self.events.push(GameEvent::ItemEquipped {
            item: item.to_string(),
        });
        Ok(())
    }

    pub fn unequip_item(&mut self, item: &str) -> bool {
        accepted("unequip_item", self.try_unequip_item(item))
    }

    pub fn try_unequip_item(&mut self, item: &str) -> GameResult<()> {
        self.item_def(item)?;
        if !self.equipped.remove(item) {
            return Err(GameError::invalid_state(format!("'{item}' is not equipped")));
        }
        self.events.push(GameEvent::ItemUnequipped {
            item: item.to_string(),
        });
        Ok(())
    }

    pub fn is_equipped(&self, item: &str) -> bool {
        self.equipped.contains(item)
    }

    /// Equipped item ids in sorted order.
    pub fn equipped_items(&self) -> Vec<String> {
        self.equipped.iter().cloned().collect()
    }

    pub fn use_item(&mut self, item: &str) -> bool {
        accepted("use_item", self.try_use_item(item))
    }

    /// Consumable items are removed one at a time after the use is recorded.
    pub fn try_use_item(&mut self, item: &str) -> GameResult<()> {
        let def = self.item_def(item)?;
        let consumable = def.consumable;
        if !def.usable {
            return Err(GameError::invalid_state(format!("'{item}' cannot be used")));
        }
        if !self.has_item(item, 1) {
            return Err(GameError::invalid_state(format!("'{item}' is not held")));
        }

        self.events.push(GameEvent::ItemUsed {
            item: item.to_string(),
        });
        if consumable {
            self.try_remove_item(item, 1)?;
        }
        Ok(())
    }

    pub fn combine_items(&mut self, first: &str, second: &str) -> bool {
        accepted("combine_items", self.try_combine_items(first, second))
    }

    /// Consumes one of each input and adds the combination result.
    pub fn try_combine_items(&mut self, first: &str, second: &str) -> GameResult<String> {
        let first_def = self.item_def(first)?;
        let second_def = self.item_def(second)?;
        if first == second {
            return Err(GameError::invalid_state("an item cannot be combined with itself"));
        }
        let Some(result) = first_def
            .combination_with(second)
            .or_else(|| second_def.combination_with(first))
            .map(str::to_string)
        else {
            return Err(GameError::invalid_state(format!(
                "'{first}' and '{second}' do not combine"
            )));
        };
        for item in [first, second] {
            if !self.has_item(item, 1) {
                return Err(GameError::invalid_state(format!("'{item}' is not held")));
            }
        }
        self.item_def(&result)?;

        self.try_remove_item(first, 1)?;
        self.try_remove_item(second, 1)?;
        self.try_add_item(&result, 1)?;
        self.events.push(GameEvent::ItemsCombined {
            first: first.to_string(),
            second: second.to_string(),
            result: result.clone(),
        });
        Ok(result)
    }

    pub fn has_item(&self, item: &str, quantity: u32) -> bool {
        self.quantity(item) >= quantity.max(1)
    }

    pub fn quantity(&self, item: &str) -> u32 {
        self.held.get(item).copied().unwrap_or(0)
    }

    pub fn total_item_count(&self) -> u32 {
        self.held.values().sum()
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    /// Shrinking below the held count keeps existing items; only new additions are refused.
    pub fn set_capacity(&mut self, capacity: u32) {
        self.capacity = capacity;
    }

    pub fn items_by_category(&self, category: ItemCategory) -> Vec<InventoryEntry> {
        self.entries
            .iter()
            .filter(|entry| {
                self.catalog
                    .item(&entry.item)
                    .is_some_and(|def| def.category == category)
            })
            .cloned()
            .collect()
    }

    pub fn entries(&self) -> &[InventoryEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.held.is_empty()
    }

    pub fn clear(&mut self) {
        self.held.clear();
        self.entries.clear();
        self.equipped.clear();
    }

    /// Replaces all holdings without emitting events. Entries must already be validated.
    pub(crate) fn restore(&mut self, entries: &[InventoryEntry], equipped: &[String]) {
        self.clear();
        for entry in entries {
            *self.held.entry(entry.item.clone()).or_insert(0) += entry.quantity;
            self.mirror(&entry.item);
        }
        self.equipped.extend(equipped.iter().cloned());
    }

    pub(crate) fn drain_events_into(&mut self, out: &mut Vec<GameEvent>) {
        self.events.drain_into(out);
    }

    fn item_def(&self, item: &str) -> GameResult<&ItemDef> {
        self.catalog
            .item(item)
            .ok_or_else(|| GameError::not_found(EntityKind::Item, item))
    }

    fn mirror(&mut self, item: &str) {
        let quantity = self.quantity(item);
        match self.entries.iter().position(|entry| entry.item == item) {
            Some(index) if quantity == 0 => {
                self.entries.remove(index);
            }
            Some(index) => self.entries[index].quantity = quantity,
            None if quantity > 0 => self.entries.push(InventoryEntry {
                item: item.to_string(),
                quantity,
            }),
            None => {}
        }
    }
}
