use std::collections::HashMap;
use std::sync::Arc;

use crate::content::{Catalog, LocationDef};
use crate::error::{accepted, EntityKind, GameError, GameResult};
use crate::events::{EventQueue, GameEvent};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocationState {
    pub id: String,
    pub discovered: bool,
    /// Items still lying here; taking one removes it, dropping one adds it.
    pub items: Vec<String>,
}

/// Location discovery flags, adjacency checks and the player's position.
#[derive(Debug)]
pub struct MapRegistry {
    catalog: Arc<Catalog>,
    locations: Vec<LocationState>,
    index: HashMap<String, usize>,
    current: String,
    events: EventQueue,
}

impl MapRegistry {
    /// Starts at the first initially discovered location.
    pub fn new(catalog: Arc<Catalog>) -> Self {
        let locations = catalog
            .locations()
            .iter()
            .map(|def| LocationState {
                id: def.def_name.clone(),
                discovered: def.discovered,
                items: def.items.clone(),
            })
            .collect::<Vec<_>>();
        let index = locations
            .iter()
            .enumerate()
            .map(|(index, state)| (state.id.clone(), index))
            .collect();
        let current = catalog
            .locations()
            .iter()
            .find(|def| def.discovered)
            .or_else(|| catalog.locations().first())
            .map(|def| def.def_name.clone())
            .unwrap_or_default();

        Self {
            catalog,
            locations,
            index,
            current,
            events: EventQueue::default(),
        }
    }

    pub fn discover_location(&mut self, id: &str) -> bool {
        accepted("discover_location", self.try_discover_location(id))
    }

    pub fn try_discover_location(&mut self, id: &str) -> GameResult<()> {
        let state = self.state_mut(id)?;
        if state.discovered {
            return Err(GameError::invalid_state(format!(
                "location '{id}' is already discovered"
            )));
        }
        state.discovered = true;
        self.events.push(GameEvent::LocationDiscovered {
            location: id.to_string(),
        });
        Ok(())
    }

    pub fn change_location(&mut self, id: &str) -> bool {
        accepted("change_location", self.try_change_location(id))
    }

    pub fn try_change_location(&mut self, id: &str) -> GameResult<()> {
        let discovered = self.state(id)?.discovered;
        if id == self.current {
            return Err(GameError::invalid_state(format!("already at '{id}'")));
        }
        if !discovered {
            return Err(GameError::invalid_state(format!(
                "location '{id}' has not been discovered"
            )));
        }
        if !self.is_location_connected(id) {
            return Err(GameError::invalid_state(format!(
                "location '{id}' is not connected to '{}'",
                self.current
            )));
        }

        let from = std::mem::replace(&mut self.current, id.to_string());
        self.events.push(GameEvent::LocationChanged {
            from,
            to: id.to_string(),
        });
        Ok(())
    }

    /// Every neighbour of the current location, discovered or not.
    pub fn connected_locations(&self) -> Vec<&LocationDef> {
        self.current_location_def()
            .map(|def| {
                def.connections
                    .iter()
                    .filter_map(|id| self.catalog.location(id))
                    .collect()
            })
            .unwrap_or_default()
    }

    pub fn is_location_discovered(&self, id: &str) -> bool {
        self.state(id).is_ok_and(|state| state.discovered)
    }

    pub fn is_location_connected(&self, id: &str) -> bool {
        self.current_location_def()
            .is_some_and(|def| def.connections.iter().any(|connection| connection == id))
    }

    pub fn current_location(&self) -> &str {
        &self.current
    }

    pub fn current_location_def(&self) -> Option<&LocationDef> {
        self.catalog.location(&self.current)
    }

    pub fn discovered_locations(&self) -> Vec<&str> {
        self.locations
            .iter()
            .filter(|state| state.discovered)
            .map(|state| state.id.as_str())
            .collect()
    }

    pub fn items_here(&self) -> &[String] {
        self.state(&self.current)
            .map(|state| state.items.as_slice())
            .unwrap_or_default()
    }

    pub fn try_take_item(&mut self, item: &str) -> GameResult<()> {
        let current = self.current.clone();
        let state = self.state_mut(&current)?;
        let Some(position) = state.items.iter().position(|here| here == item) else {
            return Err(GameError::invalid_state(format!(
                "'{item}' is not at '{current}'"
            )));
        };
        state.items.remove(position);
        Ok(())
    }

    pub fn try_place_item(&mut self, item: &str) -> GameResult<()> {
        if self.catalog.item(item).is_none() {
            return Err(GameError::not_found(EntityKind::Item, item));
        }
        let current = self.current.clone();
        self.state_mut(&current)?.items.push(item.to_string());
        Ok(())
    }

    pub fn states(&self) -> &[LocationState] {
        &self.locations
    }

    /// Replaces every location's state and the current position without events.
    pub(crate) fn restore(&mut self, current: &str, states: Vec<LocationState>) {
        for state in states {
            if let Some(index) = self.index.get(&state.id) {
                self.locations[*index] = state;
            }
        }
        self.current = current.to_string();
    }

    pub(crate) fn drain_events_into(&mut self, out: &mut Vec<GameEvent>) {
        self.events.drain_into(out);
    }

    fn state(&self, id: &str) -> GameResult<&LocationState> {
        self.index
            .get(id)
            .and_then(|index| self.locations.get(*index))
            .ok_or_else(|| GameError::not_found(EntityKind::Location, id))
    }

    fn state_mut(&mut self, id: &str) -> GameResult<&mut LocationState> {
        self.index
            .get(id)
            .and_then(|index| self.locations.get_mut(*index))
            .ok_or_else(|| GameError::not_found(EntityKind::Location, id))
    }
}
