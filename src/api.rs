use std::sync::Arc;

use async_trait::async_trait;
use serde::Deserialize;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::sprite::{self, SpriteData};
use crate::state::{capitalize, CreatureRecord, LookupOutcome, StatEntry};

pub const DEFAULT_API_BASE: &str = "https://pokeapi.co/api/v2";
pub const DEFAULT_LANGUAGE: &str = "fr";
const RESOLVE_CONCURRENCY: usize = 12;

#[derive(thiserror::Error, Debug)]
pub enum ApiError {
    #[error("request failed: {0}")]
    Request(String),
    #[error("unexpected status {status} for {url}")]
    Status { status: u16, url: String },
    #[error("response decode error: {0}")]
    Decode(String),
    #[error("invalid reference url: {0}")]
    InvalidReference(String),
    #[error("no sprite for {0}")]
    MissingSprite(String),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Summary {
    pub name: String,
    pub url: String,
}

#[derive(Clone, Debug, PartialEq)]
pub struct SummaryPage {
    pub results: Vec<Summary>,
    pub has_more: bool,
}

#[derive(Clone, Debug, PartialEq)]
pub struct CreatureDetail {
    pub id: u32,
    pub name: String,
    pub categories: Vec<String>,
    pub statline: Vec<StatEntry>,
    pub sprite_url: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct LocalizedInfo {
    pub display_name: Option<String>,
    pub description: Option<String>,
}

#[derive(Clone, Debug, PartialEq)]
pub struct BatchPage {
    pub records: Vec<CreatureRecord>,
    pub has_more: bool,
}

/// The creature-data provider. `PokeApiClient` talks to PokeAPI; tests
/// plug in an in-memory source.
#[async_trait]
pub trait CreatureSource: Send + Sync {
    async fn list_summaries(&self, offset: u32, limit: u32) -> Result<SummaryPage, ApiError>;

    /// `key` is a numeric id or a canonical name.
    async fn detail(&self, key: &str) -> Result<CreatureDetail, ApiError>;

    async fn localized_info(&self, id: u32, language: &str) -> Result<LocalizedInfo, ApiError>;

    async fn sprite_bytes(&self, url: &str) -> Result<Vec<u8>, ApiError>;
}

#[derive(Clone, Debug, Deserialize)]
struct NamedResource {
    name: String,
    url: String,
}

#[derive(Clone, Debug, Deserialize)]
struct ListResponse {
    next: Option<String>,
    results: Vec<NamedResource>,
}

#[derive(Clone, Debug, Deserialize)]
struct PokemonResponse {
    id: u32,
    name: String,
    types: Vec<PokemonTypeSlot>,
    stats: Vec<PokemonStatSlot>,
    sprites: serde_json::Value,
}

#[derive(Clone, Debug, Deserialize)]
struct PokemonTypeSlot {
    #[serde(rename = "type")]
    type_info: NamedResource,
}

#[derive(Clone, Debug, Deserialize)]
struct PokemonStatSlot {
    base_stat: u16,
    stat: NamedResource,
}

#[derive(Clone, Debug, Deserialize)]
struct SpeciesResponse {
    names: Vec<NameEntry>,
    #[serde(default)]
    flavor_text_entries: Vec<FlavorTextEntry>,
}

#[derive(Clone, Debug, Deserialize)]
struct NameEntry {
    name: String,
    language: NamedResource,
}

#[derive(Clone, Debug, Deserialize)]
struct FlavorTextEntry {
    flavor_text: String,
    language: NamedResource,
}

impl From<ListResponse> for SummaryPage {
    fn from(response: ListResponse) -> Self {
        SummaryPage {
            has_more: response.next.is_some(),
            results: response
                .results
                .into_iter()
                .map(|entry| Summary {
                    name: entry.name,
                    url: entry.url,
                })
                .collect(),
        }
    }
}

impl From<PokemonResponse> for CreatureDetail {
    fn from(response: PokemonResponse) -> Self {
        CreatureDetail {
            id: response.id,
            sprite_url: pointer_string(&response.sprites, "/front_default"),
            name: response.name,
            categories: response
                .types
                .into_iter()
                .map(|slot| slot.type_info.name)
                .collect(),
            statline: response
                .stats
                .into_iter()
                .map(|slot| StatEntry {
                    key: slot.stat.name,
                    base_value: slot.base_stat,
                })
                .collect(),
        }
    }
}

fn localized_from_species(species: &SpeciesResponse, language: &str) -> LocalizedInfo {
    LocalizedInfo {
        display_name: species
            .names
            .iter()
            .find(|entry| entry.language.name == language)
            .map(|entry| capitalize(&entry.name)),
        description: species
            .flavor_text_entries
            .iter()
            .find(|entry| entry.language.name == language)
            .map(|entry| sanitize_text(&entry.flavor_text)),
    }
}

pub struct PokeApiClient {
    client: reqwest::Client,
    base: String,
}

impl PokeApiClient {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base: base.into().trim_end_matches('/').to_string(),
        }
    }

    async fn get_bytes(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|err| ApiError::Request(err.to_string()))?;
        let status = response.status();
        if !status.is_success() {
            return Err(ApiError::Status {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }
        let bytes = response
            .bytes()
            .await
            .map_err(|err| ApiError::Request(err.to_string()))?;
        Ok(bytes.to_vec())
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, url: &str) -> Result<T, ApiError> {
        let bytes = self.get_bytes(url).await?;
        serde_json::from_slice(&bytes).map_err(|err| ApiError::Decode(err.to_string()))
    }
}

impl Default for PokeApiClient {
    fn default() -> Self {
        Self::new(DEFAULT_API_BASE)
    }
}

#[async_trait]
impl CreatureSource for PokeApiClient {
    async fn list_summaries(&self, offset: u32, limit: u32) -> Result<SummaryPage, ApiError> {
        let url = format!("{}/pokemon?offset={offset}&limit={limit}", self.base);
        let response: ListResponse = self.get_json(&url).await?;
        Ok(response.into())
    }

    async fn detail(&self, key: &str) -> Result<CreatureDetail, ApiError> {
        let url = format!("{}/pokemon/{}", self.base, urlencoding::encode(key));
        let response: PokemonResponse = self.get_json(&url).await?;
        Ok(response.into())
    }

    async fn localized_info(&self, id: u32, language: &str) -> Result<LocalizedInfo, ApiError> {
        let url = format!("{}/pokemon-species/{id}", self.base);
        let response: SpeciesResponse = self.get_json(&url).await?;
        Ok(localized_from_species(&response, language))
    }

    async fn sprite_bytes(&self, url: &str) -> Result<Vec<u8>, ApiError> {
        self.get_bytes(url).await
    }
}

/// Extracts the numeric id from a reference URL such as
/// `https://pokeapi.co/api/v2/pokemon/25/`.
pub fn reference_id(url: &str) -> Result<u32, ApiError> {
    url.trim_end_matches('/')
        .rsplit('/')
        .next()
        .and_then(|segment| segment.parse::<u32>().ok())
        .filter(|id| *id > 0)
        .ok_or_else(|| ApiError::InvalidReference(url.to_string()))
}

/// Resolves one creature: detail first, then the localized name and
/// description. A missing sprite is an error; a failed localization falls
/// back to the capitalized canonical name.
pub async fn resolve_creature(
    source: &dyn CreatureSource,
    key: &str,
    language: &str,
) -> Result<CreatureRecord, ApiError> {
    let detail = source.detail(key).await?;
    let Some(sprite_url) = detail.sprite_url.clone().filter(|url| !url.is_empty()) else {
        return Err(ApiError::MissingSprite(detail.name));
    };
    let localized = match source.localized_info(detail.id, language).await {
        Ok(info) => info,
        Err(err) => {
            log::warn!("localization for #{} unavailable: {err}", detail.id);
            LocalizedInfo::default()
        }
    };
    Ok(CreatureRecord {
        id: detail.id,
        display_name: localized
            .display_name
            .unwrap_or_else(|| capitalize(&detail.name)),
        canonical_name: detail.name.to_lowercase(),
        description: localized.description,
        categories: detail.categories,
        statline: detail.statline,
        sprite_url,
    })
}

/// Loads one page of summaries and resolves every entry concurrently.
///
/// Only the page request can fail the batch. Entries whose id, detail or
/// sprite cannot be resolved are logged and dropped; the rest come back in
/// page order once every resolution has settled.
pub async fn load_batch(
    source: Arc<dyn CreatureSource>,
    offset: u32,
    limit: u32,
    language: String,
) -> Result<BatchPage, ApiError> {
    let page = source.list_summaries(offset, limit).await?;

    let semaphore = Arc::new(Semaphore::new(RESOLVE_CONCURRENCY));
    let mut join_set = JoinSet::new();
    for (position, summary) in page.results.into_iter().enumerate() {
        let source = Arc::clone(&source);
        let semaphore = Arc::clone(&semaphore);
        let language = language.clone();
        join_set.spawn(async move {
            let result = match semaphore.acquire_owned().await {
                Ok(_permit) => match reference_id(&summary.url) {
                    Ok(id) => resolve_creature(source.as_ref(), &id.to_string(), &language).await,
                    Err(err) => Err(err),
                },
                Err(_) => Err(ApiError::Request("resolver pool closed".to_string())),
            };
            (position, summary.name, result)
        });
    }

    let mut resolved = Vec::new();
    while let Some(joined) = join_set.join_next().await {
        match joined {
            Ok((position, _, Ok(record))) => resolved.push((position, record)),
            Ok((_, name, Err(err))) => log::warn!("dropping {name} from batch at {offset}: {err}"),
            Err(err) => log::warn!("resolver task failed in batch at {offset}: {err}"),
        }
    }
    resolved.sort_by_key(|(position, _)| *position);

    Ok(BatchPage {
        records: resolved.into_iter().map(|(_, record)| record).collect(),
        has_more: page.has_more,
    })
}

/// Remote search fallback: `query` is tried as an id or canonical name.
pub async fn lookup_creature(
    source: &dyn CreatureSource,
    query: &str,
    language: &str,
) -> Result<LookupOutcome, ApiError> {
    match resolve_creature(source, query, language).await {
        Ok(record) => Ok(LookupOutcome::Found(record)),
        Err(ApiError::MissingSprite(_)) => Ok(LookupOutcome::NoSprite),
        Err(err) => Err(err),
    }
}

pub async fn load_sprite(source: &dyn CreatureSource, url: &str) -> Result<SpriteData, String> {
    let bytes = source.sprite_bytes(url).await.map_err(|err| err.to_string())?;
    sprite::decode_sprite(&bytes)
}

fn sanitize_text(text: &str) -> String {
    text.replace('\n', " ").replace('\u{000C}', " ")
}

fn pointer_string(value: &serde_json::Value, pointer: &str) -> Option<String> {
    value
        .pointer(pointer)
        .and_then(|val| val.as_str())
        .map(|s| s.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::{HashMap, HashSet};
    use std::sync::atomic::{AtomicUsize, Ordering};

    const PIKACHU_JSON: &str = r#"{
        "id": 25,
        "name": "pikachu",
        "types": [{"slot": 1, "type": {"name": "electric", "url": "https://pokeapi.co/api/v2/type/13/"}}],
        "stats": [
            {"base_stat": 35, "effort": 0, "stat": {"name": "hp", "url": "https://pokeapi.co/api/v2/stat/1/"}},
            {"base_stat": 55, "effort": 0, "stat": {"name": "attack", "url": "https://pokeapi.co/api/v2/stat/2/"}}
        ],
        "sprites": {"front_default": "https://img/25.png", "back_default": null}
    }"#;

    const SPECIES_JSON: &str = r#"{
        "names": [
            {"name": "Pikachu", "language": {"name": "en", "url": "x"}},
            {"name": "pikachu", "language": {"name": "fr", "url": "x"}}
        ],
        "flavor_text_entries": [
            {"flavor_text": "It keeps its tail\nraised.", "language": {"name": "en", "url": "x"}},
            {"flavor_text": "Il garde sa queue\nlevée.\u000cToujours.", "language": {"name": "fr", "url": "x"}}
        ]
    }"#;

    #[derive(Default)]
    struct FakeSource {
        summaries: Vec<Summary>,
        details: HashMap<String, CreatureDetail>,
        localized: HashMap<u32, LocalizedInfo>,
        failing_details: HashSet<String>,
        fail_listing: bool,
        detail_calls: AtomicUsize,
    }

    impl FakeSource {
        fn with_creature(mut self, id: u32, name: &str, sprite: bool, french: Option<&str>) -> Self {
            self.summaries.push(Summary {
                name: name.to_string(),
                url: format!("https://pokeapi.co/api/v2/pokemon/{id}/"),
            });
            self.details.insert(
                id.to_string(),
                CreatureDetail {
                    id,
                    name: name.to_string(),
                    categories: vec!["grass".to_string()],
                    statline: vec![StatEntry {
                        key: "hp".to_string(),
                        base_value: 45,
                    }],
                    sprite_url: sprite.then(|| format!("https://img/{id}.png")),
                },
            );
            if let Some(french) = french {
                self.localized.insert(
                    id,
                    LocalizedInfo {
                        display_name: Some(french.to_string()),
                        description: Some(format!("{french} description")),
                    },
                );
            }
            self
        }
    }

    #[async_trait]
    impl CreatureSource for FakeSource {
        async fn list_summaries(&self, offset: u32, limit: u32) -> Result<SummaryPage, ApiError> {
            if self.fail_listing {
                return Err(ApiError::Status {
                    status: 503,
                    url: "list".to_string(),
                });
            }
            let results: Vec<Summary> = self
                .summaries
                .iter()
                .skip(offset as usize)
                .take(limit as usize)
                .cloned()
                .collect();
            Ok(SummaryPage {
                has_more: (offset + limit) < self.summaries.len() as u32,
                results,
            })
        }

        async fn detail(&self, key: &str) -> Result<CreatureDetail, ApiError> {
            self.detail_calls.fetch_add(1, Ordering::SeqCst);
            if self.failing_details.contains(key) {
                return Err(ApiError::Request("connection reset".to_string()));
            }
            let by_name = self.details.values().find(|detail| detail.name == key);
            self.details
                .get(key)
                .or(by_name)
                .cloned()
                .ok_or_else(|| ApiError::Status {
                    status: 404,
                    url: key.to_string(),
                })
        }

        async fn localized_info(&self, id: u32, _language: &str) -> Result<LocalizedInfo, ApiError> {
            self.localized.get(&id).cloned().ok_or_else(|| ApiError::Status {
                status: 404,
                url: format!("species/{id}"),
            })
        }

        async fn sprite_bytes(&self, url: &str) -> Result<Vec<u8>, ApiError> {
            Err(ApiError::Request(format!("no bytes for {url}")))
        }
    }

    #[test]
    fn reference_id_reads_last_segment() {
        assert_eq!(
            reference_id("https://pokeapi.co/api/v2/pokemon/25/").unwrap(),
            25
        );
        assert_eq!(reference_id("https://pokeapi.co/api/v2/pokemon/151").unwrap(), 151);
        assert!(reference_id("https://pokeapi.co/api/v2/pokemon/").is_err());
        assert!(reference_id("https://pokeapi.co/api/v2/pokemon/0/").is_err());
    }

    #[test]
    fn parses_pokemon_detail() {
        let response: PokemonResponse = serde_json::from_str(PIKACHU_JSON).unwrap();
        let detail = CreatureDetail::from(response);
        assert_eq!(detail.id, 25);
        assert_eq!(detail.categories, vec!["electric".to_string()]);
        assert_eq!(detail.statline.len(), 2);
        assert_eq!(detail.statline[1].key, "attack");
        assert_eq!(detail.sprite_url.as_deref(), Some("https://img/25.png"));
    }

    #[test]
    fn null_sprite_parses_as_missing() {
        let json = PIKACHU_JSON.replace("\"https://img/25.png\"", "null");
        let response: PokemonResponse = serde_json::from_str(&json).unwrap();
        assert_eq!(CreatureDetail::from(response).sprite_url, None);
    }

    #[test]
    fn picks_requested_language_and_cleans_flavor_text() {
        let species: SpeciesResponse = serde_json::from_str(SPECIES_JSON).unwrap();
        let french = localized_from_species(&species, "fr");
        assert_eq!(french.display_name.as_deref(), Some("Pikachu"));
        assert_eq!(
            french.description.as_deref(),
            Some("Il garde sa queue levée. Toujours.")
        );
        assert_eq!(localized_from_species(&species, "ja"), LocalizedInfo::default());
    }

    #[test]
    fn list_page_reports_next_link() {
        let json = r#"{"count": 2, "next": null, "previous": null,
            "results": [{"name": "bulbasaur", "url": "https://pokeapi.co/api/v2/pokemon/1/"}]}"#;
        let response: ListResponse = serde_json::from_str(json).unwrap();
        let page = SummaryPage::from(response);
        assert!(!page.has_more);
        assert_eq!(page.results[0].name, "bulbasaur");
    }

    #[tokio::test]
    async fn batch_drops_unresolvable_entries_and_keeps_page_order() {
        let mut source = FakeSource::default()
            .with_creature(1, "bulbasaur", true, Some("Bulbizarre"))
            .with_creature(2, "ivysaur", false, Some("Herbizarre"))
            .with_creature(3, "venusaur", true, None)
            .with_creature(4, "charmander", true, Some("Salamèche"));
        source.failing_details.insert("4".to_string());
        source.summaries.push(Summary {
            name: "broken".to_string(),
            url: "https://pokeapi.co/api/v2/pokemon/".to_string(),
        });

        let page = load_batch(Arc::new(source), 0, 50, "fr".to_string())
            .await
            .unwrap();

        let names: Vec<&str> = page
            .records
            .iter()
            .map(|record| record.display_name.as_str())
            .collect();
        assert_eq!(names, vec!["Bulbizarre", "Venusaur"]);
        assert_eq!(page.records[0].description.as_deref(), Some("Bulbizarre description"));
        assert_eq!(page.records[1].description, None);
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn batch_fails_when_the_page_request_fails() {
        let source = FakeSource {
            fail_listing: true,
            ..FakeSource::default()
        };
        let result = load_batch(Arc::new(source), 50, 50, "fr".to_string()).await;
        assert!(matches!(result, Err(ApiError::Status { status: 503, .. })));
    }

    #[tokio::test]
    async fn batch_respects_offset_and_limit() {
        let mut source = FakeSource::default();
        for id in 1..=5 {
            source = source.with_creature(id, &format!("mon{id}"), true, None);
        }
        let source = Arc::new(source);
        let page = load_batch(source.clone(), 2, 2, "fr".to_string())
            .await
            .unwrap();
        let ids: Vec<u32> = page.records.iter().map(|record| record.id).collect();
        assert_eq!(ids, vec![3, 4]);
        assert!(page.has_more);
        assert_eq!(source.detail_calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn lookup_distinguishes_missing_sprite_from_errors() {
        let source = FakeSource::default()
            .with_creature(1, "bulbasaur", true, Some("Bulbizarre"))
            .with_creature(10001, "deoxys-attack", false, None);

        let found = lookup_creature(&source, "bulbasaur", "fr").await.unwrap();
        assert!(matches!(found, LookupOutcome::Found(ref record) if record.id == 1));

        let by_id = lookup_creature(&source, "1", "fr").await.unwrap();
        assert!(matches!(by_id, LookupOutcome::Found(ref record) if record.display_name == "Bulbizarre"));

        let no_sprite = lookup_creature(&source, "deoxys-attack", "fr").await.unwrap();
        assert_eq!(no_sprite, LookupOutcome::NoSprite);

        let missing = lookup_creature(&source, "zzz", "fr").await;
        assert!(matches!(missing, Err(ApiError::Status { status: 404, .. })));
    }
}
