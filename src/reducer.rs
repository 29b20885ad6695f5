use tui_dispatch::DispatchResult;

use crate::action::Action;
use crate::effect::Effect;
use crate::state::{AppState, GridState, ListView, LookupOutcome, MoveDir, Placeholder, PAGE_SIZE};

pub fn reducer(state: &mut AppState, action: Action) -> DispatchResult<Effect> {
    match action {
        Action::Init => match request_batch(state) {
            Some(effect) => DispatchResult::changed_with(effect),
            None => DispatchResult::unchanged(),
        },

        Action::BatchRequest => match request_batch(state) {
            Some(effect) => DispatchResult::changed_with(effect),
            None => DispatchResult::unchanged(),
        },

        Action::BatchDidLoad {
            offset,
            records,
            has_more,
        } => {
            let start = state.creatures.len();
            state.creatures.extend(records);
            if let ListView::Filtered(indices) = &mut state.view {
                let prefix = state.search.applied.as_str();
                indices.extend(
                    (start..state.creatures.len())
                        .filter(|&index| state.creatures[index].matches_prefix(prefix)),
                );
            }
            state.batch.offset = state.batch.offset.max(offset + PAGE_SIZE);
            state.batch.loading = false;
            state.batch.exhausted = !has_more;
            state.batch.batches_loaded += 1;
            state.search.enabled = true;
            log::info!(
                "batch at {offset} added {} records ({} total)",
                state.creatures.len() - start,
                state.creatures.len()
            );
            DispatchResult::changed_with_many(sprite_effects(state))
        }

        Action::BatchDidError { offset, error } => {
            log::warn!("batch at {offset} failed: {error}");
            state.batch.loading = false;
            state.search.enabled = true;
            DispatchResult::changed()
        }

        Action::SearchStart => {
            if !state.search.enabled || state.search.active || state.overlay.is_some() {
                return DispatchResult::unchanged();
            }
            state.search.active = true;
            DispatchResult::changed()
        }

        Action::SearchInput(ch) => {
            if !state.search.active {
                return DispatchResult::unchanged();
            }
            state.search.query.push(ch);
            DispatchResult::changed_with(debounce_search(state))
        }

        Action::SearchBackspace => {
            if !state.search.active || state.search.query.pop().is_none() {
                return DispatchResult::unchanged();
            }
            DispatchResult::changed_with(debounce_search(state))
        }

        Action::SearchClear => {
            if !state.search.active && state.search.query.is_empty() {
                return DispatchResult::unchanged();
            }
            state.search.active = false;
            state.search.query.clear();
            DispatchResult::changed_with(debounce_search(state))
        }

        Action::SearchClose => {
            if !state.search.active {
                return DispatchResult::unchanged();
            }
            state.search.active = false;
            DispatchResult::changed()
        }

        Action::SearchApply(value) => apply_search(state, value),

        Action::LookupDidLoad {
            generation,
            outcome,
        } => {
            if !settle_lookup(state, generation) {
                return DispatchResult::unchanged();
            }
            match outcome {
                LookupOutcome::Found(record) => {
                    state.creatures.push(record);
                    state.view = ListView::Filtered(vec![state.creatures.len() - 1]);
                }
                LookupOutcome::NoSprite => {
                    state.view = ListView::Placeholder(Placeholder::NotFound);
                }
            }
            DispatchResult::changed_with_many(sprite_effects(state))
        }

        Action::LookupDidError { generation, error } => {
            if !settle_lookup(state, generation) {
                return DispatchResult::unchanged();
            }
            log::warn!("lookup for {:?} failed: {error}", state.search.applied);
            state.view = ListView::Placeholder(Placeholder::Unknown);
            DispatchResult::changed()
        }

        Action::GridMove(dir) => {
            if state.overlay.is_some() {
                return DispatchResult::unchanged();
            }
            let count = state.rendered_count();
            let layout = state.layout();
            let previous = state.grid.clone();
            if count > 0 {
                let next = move_selection(state.grid.selected, dir, layout.columns, count);
                state.grid.selected = next;
                state.grid.first_row = layout.reveal(state.grid.first_row, next);
            }
            let effects = viewport_effects(state);
            if previous == state.grid && effects.is_empty() {
                return DispatchResult::unchanged();
            }
            DispatchResult::changed_with_many(effects)
        }

        Action::GridScroll(delta) => {
            if state.overlay.is_some() {
                return DispatchResult::unchanged();
            }
            let previous = state.grid.clone();
            let layout = state.layout();
            let max_first = layout.max_first_row(state.rendered_count()) as i64;
            let next = (state.grid.first_row as i64 + i64::from(delta)).clamp(0, max_first);
            state.grid.first_row = next as usize;
            keep_selection_visible(state);
            let effects = viewport_effects(state);
            if previous == state.grid && effects.is_empty() {
                return DispatchResult::unchanged();
            }
            DispatchResult::changed_with_many(effects)
        }

        Action::OverlayOpen => {
            if state.overlay.is_some() || state.search.active {
                return DispatchResult::unchanged();
            }
            let Some(index) = state.selected_collection_index() else {
                return DispatchResult::unchanged();
            };
            state.overlay = Some(index);
            DispatchResult::changed_with_many(sprite_effects(state))
        }

        Action::OverlayClose => {
            if state.overlay.take().is_none() {
                return DispatchResult::unchanged();
            }
            DispatchResult::changed()
        }

        Action::SpriteDidLoad { id, sprite } => {
            state.sprites.pending.remove(&id);
            state.sprites.cache.insert(id, sprite);
            DispatchResult::changed()
        }

        Action::SpriteDidError { id, error } => {
            log::warn!("sprite for #{id} unavailable: {error}");
            state.sprites.pending.remove(&id);
            state.sprites.failed.insert(id);
            DispatchResult::changed()
        }

        Action::UiTerminalResize(width, height) => {
            if state.terminal_size == (width, height) {
                return DispatchResult::unchanged();
            }
            state.terminal_size = (width, height);
            let layout = state.layout();
            let max_first = layout.max_first_row(state.rendered_count());
            state.grid.first_row = state.grid.first_row.min(max_first);
            state.grid.first_row = layout.reveal(state.grid.first_row, state.grid.selected);
            DispatchResult::changed_with_many(viewport_effects(state))
        }

        Action::Tick => {
            state.tick = state.tick.wrapping_add(1);
            if state.batch.loading || state.search.pending_lookup.is_some() {
                DispatchResult::changed()
            } else {
                DispatchResult::unchanged()
            }
        }

        Action::Quit => DispatchResult::unchanged(),
    }
}

/// Single entry point for loading the next page. Returns `None` while a
/// batch is in flight or once the listing is exhausted.
fn request_batch(state: &mut AppState) -> Option<Effect> {
    if state.batch.loading || state.batch.exhausted {
        return None;
    }
    state.batch.loading = true;
    Some(Effect::LoadBatch {
        offset: state.batch.offset,
        limit: PAGE_SIZE,
    })
}

fn debounce_search(state: &AppState) -> Effect {
    Effect::DebounceSearch {
        value: state.search.query.trim().to_lowercase(),
    }
}

fn apply_search(state: &mut AppState, value: String) -> DispatchResult<Effect> {
    state.search.generation += 1;
    state.search.applied = value;
    state.grid = GridState::default();
    state.overlay = None;

    let mut effects = Vec::new();
    if state.search.pending_lookup.take().is_some() {
        effects.push(Effect::CancelLookup);
    }

    if state.search.applied.is_empty() {
        state.view = ListView::All;
    } else {
        let matches = state.prefix_matches(&state.search.applied);
        if matches.is_empty() {
            state.view = ListView::Pending;
            state.search.pending_lookup = Some(state.search.generation);
            effects.push(Effect::LookupCreature {
                query: state.search.applied.clone(),
                generation: state.search.generation,
            });
        } else {
            state.view = ListView::Filtered(matches);
        }
    }

    effects.extend(sprite_effects(state));
    DispatchResult::changed_with_many(effects)
}

/// Accepts a lookup completion only if it belongs to the current search.
fn settle_lookup(state: &mut AppState, generation: u64) -> bool {
    if state.search.generation != generation || state.search.pending_lookup != Some(generation) {
        log::debug!(
            "discarding lookup from generation {generation} (current {})",
            state.search.generation
        );
        return false;
    }
    state.search.pending_lookup = None;
    true
}

fn move_selection(selected: usize, dir: MoveDir, columns: usize, count: usize) -> usize {
    let last = count - 1;
    let selected = selected.min(last);
    match dir {
        MoveDir::Left => selected.saturating_sub(1),
        MoveDir::Right => (selected + 1).min(last),
        MoveDir::Up => selected.checked_sub(columns).unwrap_or(selected),
        MoveDir::Down => {
            if selected + columns <= last {
                selected + columns
            } else if last / columns > selected / columns {
                last
            } else {
                selected
            }
        }
    }
}

fn keep_selection_visible(state: &mut AppState) {
    let range = state
        .layout()
        .visible_range(state.grid.first_row, state.rendered_count());
    if range.is_empty() {
        return;
    }
    state.grid.selected = state.grid.selected.clamp(range.start, range.end - 1);
}

/// Re-evaluates the incremental trigger and requests sprites for whatever
/// is now on screen.
fn viewport_effects(state: &mut AppState) -> Vec<Effect> {
    let mut effects = Vec::new();
    let metrics = state.scroll_metrics();
    if state.trigger.evaluate(metrics, state.tick) {
        effects.extend(request_batch(state));
    }
    effects.extend(sprite_effects(state));
    effects
}

fn sprite_effects(state: &mut AppState) -> Vec<Effect> {
    if !state.sprites.enabled {
        return Vec::new();
    }
    let indices = state.visible_indices();
    let range = state
        .layout()
        .visible_range(state.grid.first_row, indices.len());
    let mut wanted = indices[range].to_vec();
    wanted.extend(state.overlay);

    let mut effects = Vec::new();
    for index in wanted {
        let Some(record) = state.creatures.get(index) else {
            continue;
        };
        let sprites = &mut state.sprites;
        if sprites.cache.contains_key(&record.id)
            || sprites.pending.contains(&record.id)
            || sprites.failed.contains(&record.id)
        {
            continue;
        }
        sprites.pending.insert(record.id);
        effects.push(Effect::LoadSprite {
            id: record.id,
            url: record.sprite_url.clone(),
        });
    }
    effects
}
