//! Read-only content database: monster, technique, item, encounter and
//! translation records loaded once at startup from JSON files.
//!
//! Lookups by slug are total for validated content: every cross-reference
//! is checked at load time and a load failure is fatal, so the `Result`s
//! returned by the lookup methods only fire for slugs invented at runtime
//! (a content/config error the caller logs and skips).

use std::collections::HashMap;
use std::path::Path;

use bevy::prelude::*;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
    #[error("cannot read content file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("cannot parse content file {path}: {source}")]
    Parse {
        path: String,
        source: serde_json::Error,
    },
    #[error("no {table} record with slug '{slug}'")]
    MissingRecord { table: &'static str, slug: String },
    #[error("{table} '{slug}' references unknown {field} '{target}'")]
    DanglingReference {
        table: &'static str,
        slug: String,
        field: &'static str,
        target: String,
    },
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct MovesetEntry {
    pub technique: String,
    #[serde(default = "default_level_learned")]
    pub level_learned: u32,
}

fn default_level_learned() -> u32 {
    1
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct MonsterRecord {
    pub slug: String,
    #[serde(default)]
    pub name: String,
    /// Elemental types, at most two.
    #[serde(default)]
    pub types: Vec<String>,
    #[serde(default = "default_catch_rate")]
    pub catch_rate: f32,
    pub base_hp: u32,
    pub base_melee: u32,
    pub base_ranged: u32,
    pub base_dodge: u32,
    pub base_armour: u32,
    pub base_speed: u32,
    #[serde(default)]
    pub moveset: Vec<MovesetEntry>,
}

fn default_catch_rate() -> f32 {
    125.0
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct TechniqueRecord {
    pub slug: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub power: f32,
    /// Chance to hit in [0, 1].
    #[serde(default = "default_accuracy")]
    pub accuracy: f32,
    /// Strength of non-damage effects in [0, 1].
    #[serde(default)]
    pub potency: f32,
    /// Stat-selection category for the damage formula.
    #[serde(default)]
    pub range: String,
    /// Elemental types, at most two.
    #[serde(default)]
    pub types: Vec<String>,
    /// Ordered effect pipeline, applied in sequence on use.
    #[serde(default)]
    pub effects: Vec<String>,
    /// Turns before the technique can be used again.
    #[serde(default)]
    pub recharge_length: u32,
}

fn default_accuracy() -> f32 {
    1.0
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct ItemRecord {
    pub slug: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub power: f32,
    #[serde(default)]
    pub effects: Vec<String>,
    /// Capture-device strength scalar; 1.0 for a plain device.
    #[serde(default = "default_ball_modifier")]
    pub ball_modifier: f32,
}

fn default_ball_modifier() -> f32 {
    1.0
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct EncounterEntry {
    pub monster: String,
    /// Chance out of 100 that walking the trigger starts this encounter.
    pub encounter_rate: f32,
    /// Inclusive [min, max]; a single value means a fixed level.
    pub level_range: Vec<u32>,
}

#[derive(Clone, Debug, serde::Serialize, serde::Deserialize)]
pub struct EncounterRecord {
    pub slug: String,
    #[serde(default)]
    pub monsters: Vec<EncounterEntry>,
}

/// All immutable game content, constructed explicitly at startup and
/// threaded through as a resource; no ambient globals.
#[derive(Resource, Default)]
pub struct ContentDb {
    monsters: HashMap<String, MonsterRecord>,
    techniques: HashMap<String, TechniqueRecord>,
    items: HashMap<String, ItemRecord>,
    encounters: HashMap<String, EncounterRecord>,
    translations: HashMap<String, String>,
}

impl ContentDb {
    pub fn load(dir: &Path) -> Result<Self, DbError> {
        let monsters: Vec<MonsterRecord> = load_table(&dir.join("monsters.json"))?;
        let techniques: Vec<TechniqueRecord> = load_table(&dir.join("techniques.json"))?;
        let items: Vec<ItemRecord> = load_table(&dir.join("items.json"))?;
        let encounters: Vec<EncounterRecord> = load_table(&dir.join("encounters.json"))?;
        let translations: HashMap<String, String> =
            load_optional_map(&dir.join("translations.json"))?;

        let db = Self {
            monsters: index_by_slug(monsters, |r| r.slug.clone()),
            techniques: index_by_slug(techniques, |r| r.slug.clone()),
            items: index_by_slug(items, |r| r.slug.clone()),
            encounters: index_by_slug(encounters, |r| r.slug.clone()),
            translations,
        };
        db.validate()?;
        info!(
            "[Totem db] Loaded {} monsters, {} techniques, {} items, {} encounter tables",
            db.monsters.len(),
            db.techniques.len(),
            db.items.len(),
            db.encounters.len()
        );
        Ok(db)
    }

    /// Cross-reference check; run once after load so later lookups are
    /// total for shipped content.
    fn validate(&self) -> Result<(), DbError> {
        for monster in self.monsters.values() {
            for entry in &monster.moveset {
                if !self.techniques.contains_key(&entry.technique) {
                    return Err(DbError::DanglingReference {
                        table: "monster",
                        slug: monster.slug.clone(),
                        field: "technique",
                        target: entry.technique.clone(),
                    });
                }
            }
        }
        for encounter in self.encounters.values() {
            for entry in &encounter.monsters {
                if !self.monsters.contains_key(&entry.monster) {
                    return Err(DbError::DanglingReference {
                        table: "encounter",
                        slug: encounter.slug.clone(),
                        field: "monster",
                        target: entry.monster.clone(),
                    });
                }
            }
        }
        Ok(())
    }

    pub fn monster(&self, slug: &str) -> Result<&MonsterRecord, DbError> {
        self.monsters.get(slug).ok_or_else(|| DbError::MissingRecord {
            table: "monster",
            slug: slug.to_string(),
        })
    }

    pub fn technique(&self, slug: &str) -> Result<&TechniqueRecord, DbError> {
        self.techniques
            .get(slug)
            .ok_or_else(|| DbError::MissingRecord {
                table: "technique",
                slug: slug.to_string(),
            })
    }

    pub fn item(&self, slug: &str) -> Result<&ItemRecord, DbError> {
        self.items.get(slug).ok_or_else(|| DbError::MissingRecord {
            table: "item",
            slug: slug.to_string(),
        })
    }

    pub fn encounter(&self, slug: &str) -> Result<&EncounterRecord, DbError> {
        self.encounters
            .get(slug)
            .ok_or_else(|| DbError::MissingRecord {
                table: "encounter",
                slug: slug.to_string(),
            })
    }

    /// Resolve a translation msgid; unknown ids fall back to the id itself
    /// so untranslated content stays readable.
    pub fn translate<'a>(&'a self, msgid: &'a str) -> &'a str {
        self.translations.get(msgid).map(String::as_str).unwrap_or(msgid)
    }

    #[cfg(test)]
    pub fn for_tests(
        monsters: Vec<MonsterRecord>,
        techniques: Vec<TechniqueRecord>,
        items: Vec<ItemRecord>,
        encounters: Vec<EncounterRecord>,
    ) -> Self {
        let db = Self {
            monsters: index_by_slug(monsters, |r| r.slug.clone()),
            techniques: index_by_slug(techniques, |r| r.slug.clone()),
            items: index_by_slug(items, |r| r.slug.clone()),
            encounters: index_by_slug(encounters, |r| r.slug.clone()),
            translations: HashMap::new(),
        };
        db.validate().expect("test content must validate");
        db
    }
}

fn index_by_slug<T>(records: Vec<T>, slug: impl Fn(&T) -> String) -> HashMap<String, T> {
    records
        .into_iter()
        .map(|record| (slug(&record), record))
        .collect()
}

fn load_table<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Vec<T>, DbError> {
    let text = std::fs::read_to_string(path).map_err(|source| DbError::Io {
        path: path.display().to_string(),
        source,
    })?;
    serde_json::from_str(&text).map_err(|source| DbError::Parse {
        path: path.display().to_string(),
        source,
    })
}

fn load_optional_map(path: &Path) -> Result<HashMap<String, String>, DbError> {
    match std::fs::read_to_string(path) {
        Ok(text) => serde_json::from_str(&text).map_err(|source| DbError::Parse {
            path: path.display().to_string(),
            source,
        }),
        Err(_) => Ok(HashMap::new()),
    }
}


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookups_are_total_for_loaded_content() {
        let db = test_content::small_db();
        assert!(db.monster("rootling").is_ok());
        assert!(db.technique("ember").is_ok());
        assert!(db.item("potion").is_ok());
        assert!(db.encounter("tall_grass").is_ok());
        assert!(matches!(
            db.monster("ghost"),
            Err(DbError::MissingRecord { table: "monster", .. })
        ));
    }

    #[test]
    fn translate_falls_back_to_msgid() {
        let db = test_content::small_db();
        assert_eq!(db.translate("greeting_oak"), "greeting_oak");
    }
}
