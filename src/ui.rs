use ratatui::{
    layout::{Alignment, Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span, Text},
    widgets::{Block, BorderType, Borders, Clear, Paragraph, Wrap},
    Frame,
};
use tui_dispatch::{Component, EventKind, HandlerResponse};
use tui_dispatch_components::style::BorderStyle;
use tui_dispatch_components::{
    BaseStyle, Padding, StatusBar, StatusBarHint, StatusBarItem, StatusBarProps, StatusBarSection,
    StatusBarStyle,
};

use crate::action::Action;
use crate::grid::{CARD_HEIGHT, CARD_WIDTH};
use crate::sprite::{self, SpriteData};
use crate::sprite_backend;
use crate::state::{AppState, ListView, MoveDir, Placeholder};
use crate::view::{self, CardView, StatBarView};

const BG_BASE: Color = Color::Rgb(12, 18, 28);
const BG_PANEL: Color = Color::Rgb(20, 32, 46);
const BG_HIGHLIGHT: Color = Color::Rgb(28, 92, 110);
const TEXT_MAIN: Color = Color::Rgb(232, 242, 244);
const TEXT_DIM: Color = Color::Rgb(176, 195, 207);
const ACCENT_TEAL: Color = Color::Rgb(72, 204, 184);
const ACCENT_GOLD: Color = Color::Rgb(228, 176, 88);
const STAT_STRONG: Color = Color::Rgb(231, 76, 60);
const STAT_NORMAL: Color = Color::Rgb(120, 132, 132);
const SPINNER: [&str; 4] = ["|", "/", "-", "\\"];

/// Rows reserved for the sprite inside a card.
const CARD_SPRITE_ROWS: u16 = 6;
const OVERLAY_SPRITE_ROWS: u16 = 10;
const OVERLAY_WIDTH: u16 = 64;
const OVERLAY_HEIGHT: u16 = 30;
/// Kitty image id of the overlay sprite; card slots use 1..=visible cards.
const OVERLAY_IMAGE_ID: u32 = 10_000;

/// Screen areas of the last frame, used for mouse routing.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct CatalogAreas {
    pub header: Rect,
    pub grid: Rect,
    pub overlay: Option<Rect>,
    pub footer: Rect,
}

pub struct CatalogUi {
    status_bar: StatusBar,
}

impl Default for CatalogUi {
    fn default() -> Self {
        Self::new()
    }
}

impl CatalogUi {
    pub fn new() -> Self {
        Self {
            status_bar: StatusBar::new(),
        }
    }

    pub fn render(&mut self, frame: &mut Frame, area: Rect, state: &AppState) -> CatalogAreas {
        render_catalog(frame, area, state, &mut self.status_bar)
    }

    pub fn handle_grid_event(
        &mut self,
        event: &EventKind,
        state: &AppState,
    ) -> HandlerResponse<Action> {
        handle_grid_event(event, state)
    }

    pub fn handle_search_event(
        &mut self,
        event: &EventKind,
        state: &AppState,
    ) -> HandlerResponse<Action> {
        handle_search_event(event, state)
    }

    pub fn handle_overlay_event(
        &mut self,
        event: &EventKind,
        state: &AppState,
    ) -> HandlerResponse<Action> {
        handle_overlay_event(event, state)
    }
}

pub fn render_catalog(
    frame: &mut Frame,
    area: Rect,
    state: &AppState,
    status_bar: &mut StatusBar,
) -> CatalogAreas {
    sprite_backend::clear_sprites();
    let base = Block::default().style(Style::default().bg(BG_BASE));
    frame.render_widget(base, area);
    let layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3),
            Constraint::Min(0),
            Constraint::Length(3),
        ])
        .split(area);

    render_header(frame, layout[0], state);
    render_grid(frame, layout[1], state);
    render_footer(frame, layout[2], state, status_bar);
    let overlay = render_overlay(frame, area, state);

    CatalogAreas {
        header: layout[0],
        grid: layout[1],
        overlay,
        footer: layout[2],
    }
}

pub fn handle_grid_event(event: &EventKind, state: &AppState) -> HandlerResponse<Action> {
    let page = state.layout().visible_rows() as i16;
    let actions = match event {
        EventKind::Key(key) => match key.code {
            crossterm::event::KeyCode::Left | crossterm::event::KeyCode::Char('h') => {
                vec![Action::GridMove(MoveDir::Left)]
            }
            crossterm::event::KeyCode::Right | crossterm::event::KeyCode::Char('l') => {
                vec![Action::GridMove(MoveDir::Right)]
            }
            crossterm::event::KeyCode::Up | crossterm::event::KeyCode::Char('k') => {
                vec![Action::GridMove(MoveDir::Up)]
            }
            crossterm::event::KeyCode::Down | crossterm::event::KeyCode::Char('j') => {
                vec![Action::GridMove(MoveDir::Down)]
            }
            crossterm::event::KeyCode::PageDown => vec![Action::GridScroll(page)],
            crossterm::event::KeyCode::PageUp => vec![Action::GridScroll(-page)],
            crossterm::event::KeyCode::Enter => vec![Action::OverlayOpen],
            _ => vec![],
        },
        EventKind::Scroll { delta, .. } => vec![Action::GridScroll(*delta as i16)],
        _ => vec![],
    };
    handler_response(actions)
}

pub fn handle_search_event(event: &EventKind, _state: &AppState) -> HandlerResponse<Action> {
    let actions = match event {
        EventKind::Key(key) => match key.code {
            crossterm::event::KeyCode::Esc => vec![Action::SearchClear],
            crossterm::event::KeyCode::Enter => vec![Action::SearchClose],
            crossterm::event::KeyCode::Backspace => vec![Action::SearchBackspace],
            crossterm::event::KeyCode::Char(ch) => vec![Action::SearchInput(ch)],
            _ => vec![],
        },
        _ => vec![],
    };
    handler_response(actions)
}

pub fn handle_overlay_event(event: &EventKind, _state: &AppState) -> HandlerResponse<Action> {
    let actions = match event {
        EventKind::Key(key) => match key.code {
            crossterm::event::KeyCode::Esc | crossterm::event::KeyCode::Enter => {
                vec![Action::OverlayClose]
            }
            _ => vec![],
        },
        _ => vec![],
    };
    handler_response(actions)
}

fn handler_response(actions: Vec<Action>) -> HandlerResponse<Action> {
    if actions.is_empty() {
        HandlerResponse::ignored()
    } else {
        HandlerResponse {
            actions,
            consumed: true,
            needs_render: false,
        }
    }
}

fn render_header(frame: &mut Frame, area: Rect, state: &AppState) {
    let title_style = Style::default()
        .fg(ACCENT_TEAL)
        .add_modifier(Modifier::BOLD);
    let search = if state.search.active {
        format!("/{}_", state.search.query)
    } else if state.search.query.is_empty() {
        "/".to_string()
    } else {
        format!("/{}", state.search.query)
    };
    let search_style = if state.search.enabled {
        Style::default().fg(ACCENT_TEAL)
    } else {
        Style::default().fg(TEXT_DIM)
    };
    let header_text = Text::from(vec![Line::from(vec![
        Span::styled("POKECARDS", title_style),
        Span::raw("  |  Recherche : "),
        Span::styled(search, search_style),
        Span::raw("  |  Cartes : "),
        Span::styled(
            format!("{}/{}", state.rendered_count(), state.creatures.len()),
            Style::default().fg(ACCENT_GOLD),
        ),
    ])]);

    let border = if state.search.active {
        Style::default().fg(ACCENT_TEAL)
    } else {
        Style::default().fg(TEXT_DIM)
    };
    let block = Block::default()
        .borders(Borders::ALL)
        .style(Style::default().bg(BG_PANEL).fg(TEXT_MAIN))
        .border_style(border);
    let paragraph = Paragraph::new(header_text)
        .block(block)
        .style(Style::default().fg(TEXT_MAIN));
    frame.render_widget(paragraph, area);
}

fn render_grid(frame: &mut Frame, area: Rect, state: &AppState) {
    if area.width == 0 || area.height == 0 {
        return;
    }
    match &state.view {
        ListView::Pending => {
            render_notice(frame, area, &format!("Recherche de \"{}\"...", state.search.applied));
            return;
        }
        ListView::Placeholder(placeholder) => {
            let rect = Rect::new(
                area.x,
                area.y,
                CARD_WIDTH.min(area.width),
                CARD_HEIGHT.min(area.height),
            );
            render_placeholder_card(frame, rect, *placeholder);
            return;
        }
        ListView::All | ListView::Filtered(_) => {}
    }

    let indices = state.visible_indices();
    if indices.is_empty() {
        let notice = if state.batch.loading {
            "Chargement des Pokémon..."
        } else {
            "Aucun Pokémon"
        };
        render_notice(frame, area, notice);
        return;
    }

    let layout = state.layout();
    let place_sprites = state.sprites.enabled && state.overlay.is_none();
    let range = layout.visible_range(state.grid.first_row, indices.len());
    for position in range.clone() {
        let Some(record) = state.creatures.get(indices[position]) else {
            continue;
        };
        let column = (position % layout.columns) as u16;
        let row = (layout.row_of(position) - state.grid.first_row) as u16;
        let Some(rect) = card_rect(area, column, row) else {
            continue;
        };
        let card = view::card_view(record);
        let sprite = state.sprites.cache.get(&record.id);
        let selected = position == state.grid.selected;
        if let Err(err) = render_card(
            frame,
            rect,
            &card,
            selected,
            CardSprite {
                data: sprite,
                placement_id: (position - range.start) as u32 + 1,
                place: place_sprites,
            },
        ) {
            log::warn!("skipping card for #{}: {err}", card.id);
        }
    }
}

fn card_rect(area: Rect, column: u16, row: u16) -> Option<Rect> {
    let x = area.x.checked_add(column.checked_mul(CARD_WIDTH)?)?;
    let y = area.y.checked_add(row.checked_mul(CARD_HEIGHT)?)?;
    let right = area.x.saturating_add(area.width);
    let bottom = area.y.saturating_add(area.height);
    if x >= right || y >= bottom {
        return None;
    }
    Some(Rect::new(
        x,
        y,
        CARD_WIDTH.min(right - x),
        CARD_HEIGHT.min(bottom - y),
    ))
}

struct CardSprite<'a> {
    data: Option<&'a SpriteData>,
    placement_id: u32,
    place: bool,
}

fn render_card(
    frame: &mut Frame,
    area: Rect,
    card: &CardView,
    selected: bool,
    sprite: CardSprite<'_>,
) -> Result<(), String> {
    let block = card_block(card, selected);
    let inner = block.inner(area);
    let sprite_area = Rect::new(
        inner.x,
        inner.y.saturating_add(1),
        inner.width,
        CARD_SPRITE_ROWS.min(inner.height.saturating_sub(1)),
    );
    let placement = match sprite.data {
        Some(data) if sprite.place && area.height == CARD_HEIGHT => {
            Some(sprite_placement(data, sprite_area, sprite.placement_id)?)
        }
        _ => None,
    };

    frame.render_widget(block, area);
    let mut lines = vec![category_line(card)];
    lines.extend(std::iter::repeat(Line::raw("")).take(usize::from(CARD_SPRITE_ROWS)));
    lines.extend(card.stats.iter().map(|stat| stat_line(stat, inner.width)));
    frame.render_widget(Paragraph::new(Text::from(lines)), inner);

    match placement {
        Some((x, y, sequence)) => sprite_backend::place_sprite(x, y, sequence),
        None => render_sprite_fallback(frame, sprite_area, card),
    }
    Ok(())
}

fn card_block(card: &CardView, selected: bool) -> Block<'static> {
    let primary = type_color(&card.primary);
    let mut title_style = Style::default().fg(TEXT_MAIN).add_modifier(Modifier::BOLD);
    if selected {
        title_style = title_style.bg(BG_HIGHLIGHT);
    }
    let border_color = card
        .secondary
        .as_deref()
        .map(type_color)
        .filter(|_| selected)
        .unwrap_or(primary);
    Block::default()
        .borders(Borders::ALL)
        .border_type(if selected {
            BorderType::Thick
        } else {
            BorderType::Rounded
        })
        .border_style(Style::default().fg(border_color))
        .title(Line::from(Span::styled(format!(" {} ", card.title), title_style)))
        .title(
            Line::from(Span::styled(
                format!(" HP {} ", card.hp),
                Style::default().fg(ACCENT_GOLD),
            ))
            .alignment(Alignment::Right),
        )
        .style(Style::default().bg(BG_PANEL))
}

fn category_line(card: &CardView) -> Line<'static> {
    let mut spans = vec![Span::styled(
        card.primary.to_ascii_uppercase(),
        Style::default()
            .fg(type_color(&card.primary))
            .add_modifier(Modifier::BOLD),
    )];
    if let Some(secondary) = card.secondary.as_deref() {
        spans.push(Span::styled(" / ", Style::default().fg(TEXT_DIM)));
        spans.push(Span::styled(
            secondary.to_ascii_uppercase(),
            Style::default()
                .fg(type_color(secondary))
                .add_modifier(Modifier::BOLD),
        ));
    }
    Line::from(spans)
}

fn stat_line(stat: &StatBarView, width: u16) -> Line<'static> {
    // label(3) + space + bar + space + value(3)
    let bar_width = width.saturating_sub(8);
    let filled = stat.filled_cells(bar_width);
    let fill_color = if stat.emphasized {
        STAT_STRONG
    } else {
        STAT_NORMAL
    };
    Line::from(vec![
        Span::styled(format!("{:<3} ", stat.label), Style::default().fg(TEXT_DIM)),
        Span::styled("█".repeat(usize::from(filled)), Style::default().fg(fill_color)),
        Span::styled(
            "░".repeat(usize::from(bar_width - filled)),
            Style::default().fg(BG_HIGHLIGHT),
        ),
        Span::styled(format!(" {:>3}", stat.value), Style::default().fg(TEXT_MAIN)),
    ])
}

fn sprite_placement(data: &SpriteData, area: Rect, id: u32) -> Result<(u16, u16, String), String> {
    let (cols, rows) = sprite::fit_cells(data, area.width, area.height);
    let sequence = sprite::kitty_sequence(data, cols, rows, id)?;
    let x = area.x.saturating_add(area.width.saturating_sub(cols) / 2);
    let y = area.y.saturating_add(area.height.saturating_sub(rows) / 2);
    Ok((x, y, sequence))
}

fn render_sprite_fallback(frame: &mut Frame, area: Rect, card: &CardView) {
    if area.height == 0 {
        return;
    }
    let text = format!("[{}]", card.alt);
    let middle = Rect::new(area.x, area.y + area.height / 2, area.width, 1);
    frame.render_widget(
        Paragraph::new(text)
            .alignment(Alignment::Center)
            .style(Style::default().fg(TEXT_DIM)),
        middle,
    );
}

fn render_placeholder_card(frame: &mut Frame, area: Rect, placeholder: Placeholder) {
    let block = Block::default()
        .borders(Borders::ALL)
        .border_type(BorderType::Rounded)
        .border_style(Style::default().fg(TEXT_DIM))
        .style(Style::default().bg(BG_PANEL));
    let inner = block.inner(area);
    frame.render_widget(block, area);
    let middle = Rect::new(inner.x, inner.y + inner.height / 2, inner.width, 1.min(inner.height));
    frame.render_widget(
        Paragraph::new(placeholder.label())
            .alignment(Alignment::Center)
            .style(Style::default().fg(TEXT_MAIN).add_modifier(Modifier::BOLD)),
        middle,
    );
}

fn render_notice(frame: &mut Frame, area: Rect, text: &str) {
    let middle = Rect::new(area.x, area.y + area.height / 2, area.width, 1);
    frame.render_widget(
        Paragraph::new(text.to_string())
            .alignment(Alignment::Center)
            .style(Style::default().fg(TEXT_DIM)),
        middle,
    );
}

fn render_overlay(frame: &mut Frame, area: Rect, state: &AppState) -> Option<Rect> {
    let record = state.overlay_record()?;
    let overlay = view::overlay_view(record);
    let rect = centered_rect(area, OVERLAY_WIDTH, OVERLAY_HEIGHT);
    frame.render_widget(Clear, rect);

    let block = card_block(&overlay.card, false)
        .border_type(BorderType::Double)
        .title_bottom(Line::from(" Esc: fermer ").alignment(Alignment::Center));
    let inner = block.inner(rect);
    frame.render_widget(block, rect);

    let sprite_rows = OVERLAY_SPRITE_ROWS.min(inner.height.saturating_sub(1));
    let sections = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(1),
            Constraint::Length(sprite_rows),
            Constraint::Length(overlay.card.stats.len() as u16 + 1),
            Constraint::Min(0),
        ])
        .split(inner);

    frame.render_widget(Paragraph::new(category_line(&overlay.card)), sections[0]);

    let sprite = state.sprites.cache.get(&record.id);
    let placed = match sprite {
        Some(data) if state.sprites.enabled => {
            match sprite_placement(data, sections[1], OVERLAY_IMAGE_ID) {
                Ok((x, y, sequence)) => {
                    sprite_backend::place_sprite(x, y, sequence);
                    true
                }
                Err(err) => {
                    log::warn!("overlay sprite for #{} not drawn: {err}", record.id);
                    false
                }
            }
        }
        _ => false,
    };
    if !placed {
        render_sprite_fallback(frame, sections[1], &overlay.card);
    }

    let stats: Vec<Line> = overlay
        .card
        .stats
        .iter()
        .map(|stat| stat_line(stat, sections[2].width))
        .collect();
    frame.render_widget(Paragraph::new(Text::from(stats)), sections[2]);

    frame.render_widget(
        Paragraph::new(overlay.description)
            .wrap(Wrap { trim: true })
            .style(Style::default().fg(TEXT_MAIN)),
        sections[3],
    );
    Some(rect)
}

fn centered_rect(area: Rect, width: u16, height: u16) -> Rect {
    let width = width.min(area.width.saturating_sub(2)).max(1.min(area.width));
    let height = height.min(area.height.saturating_sub(2)).max(1.min(area.height));
    Rect::new(
        area.x + area.width.saturating_sub(width) / 2,
        area.y + area.height.saturating_sub(height) / 2,
        width,
        height,
    )
}

fn render_footer(frame: &mut Frame, area: Rect, state: &AppState, status_bar: &mut StatusBar) {
    let spinner = SPINNER[(state.tick % SPINNER.len() as u64) as usize];
    let status = if state.batch.loading {
        format!("{spinner} Chargement du lot {}...", state.batch.batches_loaded + 1)
    } else if state.search.pending_lookup.is_some() {
        format!("{spinner} Recherche...")
    } else if state.batch.exhausted {
        "Tout est chargé".to_string()
    } else {
        String::new()
    };
    // borders, padding and the gap before the status item
    let status_width = status.chars().count();
    let available = usize::from(area.width)
        .saturating_sub(4)
        .saturating_sub(status_width + if status_width > 0 { 2 } else { 0 });
    let hints: Vec<StatusBarHint<'static>> = fit_hints(status_hints(state), available)
        .into_iter()
        .map(|(key, label)| StatusBarHint::new(key, label))
        .collect();
    let status_span = Span::styled(status.as_str(), Style::default().fg(ACCENT_GOLD));
    let status_items = [StatusBarItem::span(status_span)];

    let style = StatusBarStyle {
        base: BaseStyle {
            border: Some(BorderStyle {
                borders: Borders::ALL,
                style: Style::default().fg(TEXT_DIM),
                focused_style: Some(Style::default().fg(ACCENT_TEAL)),
            }),
            padding: Padding::xy(1, 0),
            bg: Some(BG_PANEL),
            fg: Some(TEXT_MAIN),
        },
        text: Style::default().fg(TEXT_DIM),
        hint_key: Style::default()
            .fg(ACCENT_TEAL)
            .add_modifier(Modifier::BOLD),
        hint_label: Style::default().fg(TEXT_DIM),
        separator: Style::default().fg(TEXT_DIM),
    };

    let props = StatusBarProps {
        left: StatusBarSection::hints(&hints).with_separator("  "),
        center: StatusBarSection::empty(),
        right: StatusBarSection::items(&status_items).with_separator("  "),
        style,
        is_focused: false,
    };
    Component::<Action>::render(status_bar, frame, area, props);
}

/// Key hints for the current focus, lowest priority second to last.
fn status_hints(state: &AppState) -> Vec<(&'static str, &'static str)> {
    if state.search.active {
        return vec![("Entrée", "Garder"), ("Esc", "Effacer"), ("Retour", "Suppr")];
    }
    if state.overlay.is_some() {
        return vec![("Esc", "Fermer"), ("q", "Quitter")];
    }
    let mut hints = vec![("hjkl", "Bouger"), ("Entrée", "Détails")];
    if state.search.enabled {
        hints.push(("/", "Chercher"));
    }
    hints.push(("PgUp/PgDn", "Défiler"));
    hints.push(("q", "Quitter"));
    hints
}

/// Drops hints from just before the last one until the rest fit in `available` columns.
fn fit_hints(
    mut hints: Vec<(&'static str, &'static str)>,
    available: usize,
) -> Vec<(&'static str, &'static str)> {
    let width = |hints: &[(&str, &str)]| -> usize {
        let cells: usize = hints
            .iter()
            .map(|(key, label)| key.chars().count() + label.chars().count() + 2)
            .sum();
        cells + 2 * hints.len().saturating_sub(1)
    };
    while hints.len() > 2 && width(&hints) > available {
        hints.remove(hints.len() - 2);
    }
    hints
}

fn type_color(name: &str) -> Color {
    match name {
        "fire" => Color::Rgb(240, 128, 48),
        "water" => Color::Rgb(104, 144, 240),
        "grass" => Color::Rgb(120, 200, 80),
        "electric" => Color::Rgb(248, 208, 48),
        "ice" => Color::Rgb(152, 216, 216),
        "fighting" => Color::Rgb(192, 48, 40),
        "poison" => Color::Rgb(160, 64, 160),
        "ground" => Color::Rgb(224, 192, 104),
        "flying" => Color::Rgb(168, 144, 240),
        "psychic" => Color::Rgb(248, 88, 136),
        "bug" => Color::Rgb(168, 184, 32),
        "rock" => Color::Rgb(184, 160, 56),
        "ghost" => Color::Rgb(112, 88, 152),
        "dragon" => Color::Rgb(112, 56, 248),
        "dark" => Color::Rgb(112, 88, 72),
        "steel" => Color::Rgb(184, 184, 208),
        "fairy" => Color::Rgb(238, 153, 172),
        _ => Color::Rgb(168, 168, 120),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn narrow_footer_keeps_first_and_last_hints() {
        let hints = vec![
            ("hjkl", "Bouger"),
            ("Entrée", "Détails"),
            ("PgUp/PgDn", "Défiler"),
            ("q", "Quitter"),
        ];
        assert_eq!(fit_hints(hints.clone(), 120), hints);
        assert_eq!(
            fit_hints(hints.clone(), 30),
            vec![("hjkl", "Bouger"), ("q", "Quitter")]
        );
        assert_eq!(fit_hints(hints, 0).len(), 2);
    }
}
