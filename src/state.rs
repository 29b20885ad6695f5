use serde::{Deserialize, Serialize};
use tui_dispatch_debug::debug::{ron_string, DebugSection, DebugState};

use crate::grid::{GridLayout, CARD_HEIGHT};
use crate::sprite::SpriteData;
use crate::trigger::{ScrollMetrics, ScrollTrigger};
use std::collections::{HashMap, HashSet};

/// Number of summaries requested per batch.
pub const PAGE_SIZE: u32 = 50;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct StatEntry {
    pub key: String,
    pub base_value: u16,
}

/// A fully resolved creature. Built once by the batch loader or the search
/// fallback and never mutated afterwards.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CreatureRecord {
    pub id: u32,
    pub canonical_name: String,
    pub display_name: String,
    pub description: Option<String>,
    pub categories: Vec<String>,
    pub statline: Vec<StatEntry>,
    pub sprite_url: String,
}

impl CreatureRecord {
    pub fn hp(&self) -> u16 {
        self.statline
            .iter()
            .find(|stat| stat.key == "hp")
            .map(|stat| stat.base_value)
            .unwrap_or(0)
    }

    pub fn primary_category(&self) -> &str {
        self.categories
            .first()
            .map(String::as_str)
            .unwrap_or("normal")
    }

    pub fn secondary_category(&self) -> Option<&str> {
        self.categories.get(1).map(String::as_str)
    }

    /// `prefix` is expected to be lowercased already.
    pub fn matches_prefix(&self, prefix: &str) -> bool {
        self.display_name.to_lowercase().starts_with(prefix)
    }
}

/// Upper-cases the first character and keeps the rest untouched.
pub fn capitalize(name: &str) -> String {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum LookupOutcome {
    Found(CreatureRecord),
    NoSprite,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum Placeholder {
    NotFound,
    Unknown,
}

impl Placeholder {
    pub fn label(&self) -> &'static str {
        match self {
            Placeholder::NotFound => "Pokémon non trouvé",
            Placeholder::Unknown => "Pokémon ???",
        }
    }
}

/// What the card grid currently shows.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ListView {
    /// Every record of the collection, in collection order.
    All,
    /// Collection indices, in collection order.
    Filtered(Vec<usize>),
    /// Cleared while a remote lookup is in flight.
    Pending,
    Placeholder(Placeholder),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum MoveDir {
    Left,
    Right,
    Up,
    Down,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchState {
    /// Offset of the next page to request.
    pub offset: u32,
    pub loading: bool,
    pub exhausted: bool,
    pub batches_loaded: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchState {
    /// The search bar has keyboard focus.
    pub active: bool,
    /// Input is accepted once the first batch has settled.
    pub enabled: bool,
    /// Raw text of the search bar.
    pub query: String,
    /// Last debounced value, trimmed and lowercased.
    pub applied: String,
    /// Bumped on every applied value; lookups carry the generation they
    /// were issued under.
    pub generation: u64,
    pub pending_lookup: Option<u64>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct GridState {
    /// Position in the rendered list.
    pub selected: usize,
    /// First visible card row.
    pub first_row: usize,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SpriteState {
    pub enabled: bool,
    pub cache: HashMap<u32, SpriteData>,
    pub pending: HashSet<u32>,
    pub failed: HashSet<u32>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AppState {
    pub terminal_size: (u16, u16),
    pub creatures: Vec<CreatureRecord>,
    pub view: ListView,
    pub batch: BatchState,
    pub search: SearchState,
    pub grid: GridState,
    pub trigger: ScrollTrigger,
    /// Collection index of the record shown in the detail overlay.
    pub overlay: Option<usize>,
    pub sprites: SpriteState,
    pub tick: u64,
}

impl Default for AppState {
    fn default() -> Self {
        Self::new(u32::from(CARD_HEIGHT), true)
    }
}

impl AppState {
    pub fn new(scroll_threshold: u32, sprites_enabled: bool) -> Self {
        Self {
            terminal_size: (80, 24),
            creatures: Vec::new(),
            view: ListView::All,
            batch: BatchState::default(),
            search: SearchState::default(),
            grid: GridState::default(),
            trigger: ScrollTrigger::new(scroll_threshold),
            overlay: None,
            sprites: SpriteState {
                enabled: sprites_enabled,
                ..SpriteState::default()
            },
            tick: 0,
        }
    }

    pub fn layout(&self) -> GridLayout {
        GridLayout::for_terminal(self.terminal_size.0, self.terminal_size.1)
    }

    /// Collection indices of the rendered cards, in display order.
    pub fn visible_indices(&self) -> Vec<usize> {
        match &self.view {
            ListView::All => (0..self.creatures.len()).collect(),
            ListView::Filtered(indices) => indices.clone(),
            ListView::Pending | ListView::Placeholder(_) => Vec::new(),
        }
    }

    pub fn rendered_count(&self) -> usize {
        match &self.view {
            ListView::All => self.creatures.len(),
            ListView::Filtered(indices) => indices.len(),
            ListView::Pending | ListView::Placeholder(_) => 0,
        }
    }

    /// Collection indices whose display name starts with `prefix`.
    pub fn prefix_matches(&self, prefix: &str) -> Vec<usize> {
        self.creatures
            .iter()
            .enumerate()
            .filter(|(_, record)| record.matches_prefix(prefix))
            .map(|(idx, _)| idx)
            .collect()
    }

    pub fn selected_collection_index(&self) -> Option<usize> {
        self.visible_indices().get(self.grid.selected).copied()
    }

    pub fn overlay_record(&self) -> Option<&CreatureRecord> {
        self.overlay.and_then(|index| self.creatures.get(index))
    }

    pub fn scroll_metrics(&self) -> ScrollMetrics {
        let layout = self.layout();
        ScrollMetrics {
            offset: layout.row_offset(self.grid.first_row),
            viewport: u32::from(layout.viewport_height),
            content: layout.content_height(self.rendered_count()),
        }
    }
}

impl DebugState for AppState {
    fn debug_sections(&self) -> Vec<DebugSection> {
        vec![
            DebugSection::new("Catalog")
                .entry("records", ron_string(&self.creatures.len()))
                .entry("rendered", ron_string(&self.rendered_count()))
                .entry("selected", ron_string(&self.grid.selected))
                .entry("first_row", ron_string(&self.grid.first_row))
                .entry("overlay", ron_string(&self.overlay)),
            DebugSection::new("Batch")
                .entry("offset", ron_string(&self.batch.offset))
                .entry("loading", ron_string(&self.batch.loading))
                .entry("exhausted", ron_string(&self.batch.exhausted))
                .entry("batches", ron_string(&self.batch.batches_loaded)),
            DebugSection::new("Search")
                .entry("query", ron_string(&self.search.query))
                .entry("applied", ron_string(&self.search.applied))
                .entry("active", ron_string(&self.search.active))
                .entry("generation", ron_string(&self.search.generation))
                .entry("pending_lookup", ron_string(&self.search.pending_lookup)),
            DebugSection::new("Status")
                .entry("sprites_cached", ron_string(&self.sprites.cache.len()))
                .entry("sprites_pending", ron_string(&self.sprites.pending.len())),
        ]
    }
}
