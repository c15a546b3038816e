use serde::{Deserialize, Serialize};
use std::any::Any;
use std::collections::BTreeMap;
use std::sync::Arc;
use tvnab_common::{EntityId, IdSegment};

use crate::scheduler::Entity;

/// On-disk form of the shows file.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ShowsFile {
    #[serde(default)]
    pub shows: Vec<ShowRecord>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShowRecord {
    pub title: String,

    /// Alternative titles used when searching.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub aliases: Vec<String>,

    #[serde(default)]
    pub seasons: BTreeMap<u32, SeasonRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeasonRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(default)]
    pub episodes: BTreeMap<u32, EpisodeRecord>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EpisodeRecord {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

impl ShowRecord {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            aliases: Vec::new(),
            seasons: BTreeMap::new(),
        }
    }

    /// Add an episode, creating its season if needed.
    pub fn with_episode(mut self, season: u32, episode: u32, title: Option<&str>) -> Self {
        self.seasons.entry(season).or_default().episodes.insert(
            episode,
            EpisodeRecord {
                title: title.map(str::to_string),
            },
        );
        self
    }
}

/// A tracked show. Ids are `(title)`.
#[derive(Debug)]
pub struct Show {
    pub title: String,
    pub aliases: Vec<String>,
    pub seasons: BTreeMap<u32, Arc<Season>>,
}

/// Ids are `(show title, season number)`.
#[derive(Debug)]
pub struct Season {
    pub show_title: String,
    pub number: u32,
    pub title: Option<String>,
    pub episodes: BTreeMap<u32, Arc<Episode>>,
}

/// Ids are `(show title, season number, episode number)`.
#[derive(Debug)]
pub struct Episode {
    pub show_title: String,
    pub season: u32,
    pub number: u32,
    pub title: Option<String>,
}

impl Show {
    pub(crate) fn from_record(record: &ShowRecord) -> Self {
        let seasons = record
            .seasons
            .iter()
            .map(|(&number, season)| {
                let episodes = season
                    .episodes
                    .iter()
                    .map(|(&ep, episode)| {
                        let episode = Episode {
                            show_title: record.title.clone(),
                            season: number,
                            number: ep,
                            title: episode.title.clone(),
                        };
                        (ep, Arc::new(episode))
                    })
                    .collect();
                let season = Season {
                    show_title: record.title.clone(),
                    number,
                    title: season.title.clone(),
                    episodes,
                };
                (number, Arc::new(season))
            })
            .collect();

        Self {
            title: record.title.clone(),
            aliases: record.aliases.clone(),
            seasons,
        }
    }

    pub(crate) fn to_record(&self) -> ShowRecord {
        let seasons = self
            .seasons
            .iter()
            .map(|(&number, season)| {
                let episodes = season
                    .episodes
                    .iter()
                    .map(|(&ep, episode)| {
                        (
                            ep,
                            EpisodeRecord {
                                title: episode.title.clone(),
                            },
                        )
                    })
                    .collect();
                (
                    number,
                    SeasonRecord {
                        title: season.title.clone(),
                        episodes,
                    },
                )
            })
            .collect();

        ShowRecord {
            title: self.title.clone(),
            aliases: self.aliases.clone(),
            seasons,
        }
    }

    pub fn season(&self, number: u32) -> Option<&Arc<Season>> {
        self.seasons.get(&number)
    }

    pub fn episode_count(&self) -> usize {
        self.seasons.values().map(|s| s.episodes.len()).sum()
    }
}

impl Season {
    pub fn episode(&self, number: u32) -> Option<&Arc<Episode>> {
        self.episodes.get(&number)
    }
}

impl Entity for Show {
    fn id(&self) -> EntityId {
        EntityId::show(self.title.as_str())
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Entity for Season {
    fn id(&self) -> EntityId {
        EntityId::show(self.show_title.as_str()).child(self.number)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

impl Entity for Episode {
    fn id(&self) -> EntityId {
        EntityId::show(self.show_title.as_str())
            .child(self.season)
            .child(self.number)
    }

    fn as_any(&self) -> &dyn Any {
        self
    }
}

/// Season or episode number from an id segment. Numbers persisted as text
/// are accepted too.
pub(crate) fn segment_number(segment: &IdSegment) -> Option<u32> {
    match segment {
        IdSegment::Number(n) => Some(*n),
        IdSegment::Name(s) => s.parse().ok(),
    }
}
