//! Display models derived from a `CreatureRecord`. The renderer only reads
//! these; nothing here touches the terminal.

use crate::state::CreatureRecord;

/// Base stat value that fills a bar completely.
pub const STAT_CEILING: f32 = 150.0;
/// Values above this are drawn emphasized.
pub const STAT_EMPHASIS: u16 = 100;
pub const MISSING_DESCRIPTION: &str = "Description non disponible";

/// Bar width in percent: linear up to the ceiling, clamped to `0..=100`.
pub fn stat_bar_percent(base_value: i32) -> f32 {
    if base_value <= 0 {
        return 0.0;
    }
    (base_value as f32 / STAT_CEILING * 100.0).min(100.0)
}

pub fn stat_label(key: &str) -> &str {
    match key {
        "attack" => "Atk",
        "defense" => "Def",
        "special-attack" => "SpA",
        "special-defense" => "SpD",
        "speed" => "Spe",
        other => other,
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct StatBarView {
    pub label: String,
    pub value: u16,
    pub width_percent: f32,
    pub emphasized: bool,
}

impl StatBarView {
    /// Filled cells out of `width`.
    pub fn filled_cells(&self, width: u16) -> u16 {
        ((f32::from(width) * self.width_percent / 100.0).round() as u16).min(width)
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct CardView {
    pub id: u32,
    pub title: String,
    pub hp: u16,
    /// Shown in place of the sprite when no image is available.
    pub alt: String,
    pub primary: String,
    pub secondary: Option<String>,
    /// Every stat except `hp`, in API order.
    pub stats: Vec<StatBarView>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct OverlayView {
    pub card: CardView,
    pub description: String,
}

pub fn card_view(record: &CreatureRecord) -> CardView {
    CardView {
        id: record.id,
        title: record.display_name.clone(),
        hp: record.hp(),
        alt: record.canonical_name.clone(),
        primary: record.primary_category().to_string(),
        secondary: record.secondary_category().map(str::to_string),
        stats: record
            .statline
            .iter()
            .filter(|stat| stat.key != "hp")
            .map(|stat| StatBarView {
                label: stat_label(&stat.key).to_string(),
                value: stat.base_value,
                width_percent: stat_bar_percent(i32::from(stat.base_value)),
                emphasized: stat.base_value > STAT_EMPHASIS,
            })
            .collect(),
    }
}

pub fn overlay_view(record: &CreatureRecord) -> OverlayView {
    OverlayView {
        card: card_view(record),
        description: record
            .description
            .clone()
            .filter(|text| !text.trim().is_empty())
            .unwrap_or_else(|| MISSING_DESCRIPTION.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::StatEntry;
    use pretty_assertions::assert_eq;

    fn stat(key: &str, base_value: u16) -> StatEntry {
        StatEntry {
            key: key.to_string(),
            base_value,
        }
    }

    fn charizard() -> CreatureRecord {
        CreatureRecord {
            id: 6,
            canonical_name: "charizard".to_string(),
            display_name: "Dracaufeu".to_string(),
            description: None,
            categories: vec!["fire".to_string(), "flying".to_string()],
            statline: vec![
                stat("hp", 78),
                stat("attack", 84),
                stat("special-attack", 109),
                stat("speed", 100),
                stat("accuracy", 0),
            ],
            sprite_url: "https://img/6.png".to_string(),
        }
    }

    #[test]
    fn stat_bars_scale_against_ceiling() {
        assert_eq!(stat_bar_percent(150), 100.0);
        assert_eq!(stat_bar_percent(255), 100.0);
        assert_eq!(stat_bar_percent(75), 50.0);
        assert_eq!(stat_bar_percent(0), 0.0);
        assert_eq!(stat_bar_percent(-5), 0.0);
    }

    #[test]
    fn card_excludes_hp_from_bars() {
        let card = card_view(&charizard());
        assert_eq!(card.hp, 78);
        let labels: Vec<&str> = card.stats.iter().map(|bar| bar.label.as_str()).collect();
        assert_eq!(labels, vec!["Atk", "SpA", "Spe", "accuracy"]);
        assert_eq!(card.primary, "fire");
        assert_eq!(card.secondary.as_deref(), Some("flying"));
        assert_eq!(card.alt, "charizard");
    }

    #[test]
    fn emphasis_starts_above_one_hundred() {
        let card = card_view(&charizard());
        let emphasized: Vec<bool> = card.stats.iter().map(|bar| bar.emphasized).collect();
        assert_eq!(emphasized, vec![false, true, false, false]);
    }

    #[test]
    fn filled_cells_round_and_clamp() {
        let bar = StatBarView {
            label: "Atk".to_string(),
            value: 75,
            width_percent: 50.0,
            emphasized: false,
        };
        assert_eq!(bar.filled_cells(10), 5);
        assert_eq!(bar.filled_cells(0), 0);
    }

    #[test]
    fn overlay_falls_back_when_description_missing() {
        let mut record = charizard();
        assert_eq!(overlay_view(&record).description, MISSING_DESCRIPTION);
        record.description = Some("Il crache du feu.".to_string());
        assert_eq!(overlay_view(&record).description, "Il crache du feu.");
    }
}
