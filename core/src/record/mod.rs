//! Creature records handled by the trade pipeline.
//!
//! Every supported record variant implements [`TradeRecord`]. The variant a
//! pool or queue works with is fixed by its type parameter, so decoding and
//! conversion happen through the variant's own `decode` rather than by
//! inspecting types at runtime.

mod layout;
pub mod species;
mod variants;

use std::fmt;
use std::str::FromStr;

use chrono::NaiveDate;
use serde::Deserialize;
use serde::Serialize;

pub use variants::Pb7;
pub use variants::Pk9;

/// Game context a record currently lives in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityContext {
    /// Let's Go Pikachu / Eevee.
    Gen7b,
    /// Sword / Shield.
    Gen8,
    /// Legends: Arceus.
    Gen8a,
    /// Brilliant Diamond / Shining Pearl.
    Gen8b,
    /// Scarlet / Violet.
    Gen9,
}

impl EntityContext {
    pub fn generation(self) -> u8 {
        match self {
            EntityContext::Gen7b => 7,
            EntityContext::Gen8 | EntityContext::Gen8a | EntityContext::Gen8b => 8,
            EntityContext::Gen9 => 9,
        }
    }

    pub(crate) fn to_byte(self) -> u8 {
        match self {
            EntityContext::Gen7b => 7,
            EntityContext::Gen8 => 8,
            EntityContext::Gen8a => 0x8a,
            EntityContext::Gen8b => 0x8b,
            EntityContext::Gen9 => 9,
        }
    }

    pub(crate) fn from_byte(value: u8) -> Option<Self> {
        match value {
            7 => Some(EntityContext::Gen7b),
            8 => Some(EntityContext::Gen8),
            0x8a => Some(EntityContext::Gen8a),
            0x8b => Some(EntityContext::Gen8b),
            9 => Some(EntityContext::Gen9),
            _ => None,
        }
    }
}

/// Language ids as stored in records.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
pub enum Language {
    Japanese = 1,
    #[default]
    English = 2,
    French = 3,
    Italian = 4,
    German = 5,
    Spanish = 7,
    Korean = 8,
    ChineseS = 9,
    ChineseT = 10,
}

impl Language {
    pub fn id(self) -> u8 {
        self as u8
    }

    pub fn from_id(id: u8) -> Option<Self> {
        match id {
            1 => Some(Language::Japanese),
            2 => Some(Language::English),
            3 => Some(Language::French),
            4 => Some(Language::Italian),
            5 => Some(Language::German),
            7 => Some(Language::Spanish),
            8 => Some(Language::Korean),
            9 => Some(Language::ChineseS),
            10 => Some(Language::ChineseT),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized language: {0}")]
pub struct UnknownLanguage(pub String);

impl FromStr for Language {
    type Err = UnknownLanguage;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lang = match s.trim().to_ascii_lowercase().as_str() {
            "japanese" | "jpn" | "ja" => Language::Japanese,
            "english" | "eng" | "en" => Language::English,
            "french" | "fre" | "fr" => Language::French,
            "italian" | "ita" | "it" => Language::Italian,
            "german" | "ger" | "de" => Language::German,
            "spanish" | "spa" | "es" => Language::Spanish,
            "korean" | "kor" | "ko" => Language::Korean,
            "chinese" | "chs" | "chinese_s" | "chineses" => Language::ChineseS,
            "cht" | "chinese_t" | "chineset" => Language::ChineseT,
            _ => return Err(UnknownLanguage(s.trim().to_string())),
        };
        Ok(lang)
    }
}

impl fmt::Display for Language {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TrainerIdentity {
    pub name: String,
    pub gender: u8,
}

/// Fields shared by every record variant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntityCore {
    /// Context the record currently belongs to.
    pub context: EntityContext,
    pub version: u8,
    pub species: u16,
    pub form: u8,
    pub is_egg: bool,
    pub was_egg: bool,
    pub is_nicknamed: bool,
    pub nickname: String,
    pub held_item: u16,
    /// Raw language id, see [`Language`].
    pub language: u8,
    /// Transferred from the mobile companion app.
    pub from_go: bool,
    /// Distribution lock: locked records can never be traded away.
    pub trade_locked: bool,
    pub home_tracker: u64,
    pub original_trainer: TrainerIdentity,
    pub handling_trainer: TrainerIdentity,
    /// Only persisted by variants implementing [`HasHandlingTrainerLanguage`].
    pub handling_language: u8,
    /// 0 = original trainer, 1 = handling trainer.
    pub current_handler: u8,
    pub met_date: Option<NaiveDate>,
    pub egg_met_date: Option<NaiveDate>,
}

impl EntityCore {
    pub fn new(context: EntityContext, species: u16) -> Self {
        Self {
            context,
            version: 0,
            species,
            form: 0,
            is_egg: false,
            was_egg: false,
            is_nicknamed: false,
            nickname: String::new(),
            held_item: 0,
            language: Language::English.id(),
            from_go: false,
            trade_locked: false,
            home_tracker: 0,
            original_trainer: TrainerIdentity::default(),
            handling_trainer: TrainerIdentity::default(),
            handling_language: 0,
            current_handler: 0,
            met_date: None,
            egg_met_date: None,
        }
    }

    pub fn generation(&self) -> u8 {
        self.context.generation()
    }

    pub fn has_tracker(&self) -> bool {
        self.home_tracker != 0
    }

    pub fn clear_nickname(&mut self) {
        self.is_nicknamed = false;
        self.nickname.clear();
    }
}

/// Records that store the language of their handling trainer.
pub trait HasHandlingTrainerLanguage {
    fn handling_trainer_language(&self) -> u8;
    fn set_handling_trainer_language(&mut self, language: u8);
}

/// A fixed-size creature record variant.
pub trait TradeRecord: Clone + fmt::Debug + Send + Sync + 'static {
    /// Byte length of the stored format. Corpus files are matched on this.
    const SIZE: usize;
    /// Context records of this variant live in.
    const CONTEXT: EntityContext;

    /// Decode a stored record, converting payloads from compatible contexts.
    fn decode(data: &[u8]) -> Option<Self>;
    fn encode(&self) -> Vec<u8>;

    fn core(&self) -> &EntityCore;
    fn core_mut(&mut self) -> &mut EntityCore;

    /// Whether this variant can carry a held item at all.
    fn supports_held_items(&self) -> bool {
        true
    }

    /// Capability query for the handling-trainer language field.
    fn handling_language_mut(&mut self) -> Option<&mut dyn HasHandlingTrainerLanguage> {
        None
    }

    /// Version assigned to generated eggs when the request did not pin one.
    fn default_egg_version(&self) -> Option<u8> {
        None
    }

    fn species(&self) -> u16 {
        self.core().species
    }

    fn can_be_traded(&self) -> bool {
        !self.core().trade_locked
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn language_parses_names_and_codes() {
        assert_eq!("English".parse::<Language>(), Ok(Language::English));
        assert_eq!(" ger ".parse::<Language>(), Ok(Language::German));
        assert_eq!("CHT".parse::<Language>(), Ok(Language::ChineseT));
        assert!("Klingon".parse::<Language>().is_err());
    }

    #[test]
    fn language_ids_round_trip() {
        for lang in [Language::Japanese, Language::Spanish, Language::ChineseT] {
            assert_eq!(Language::from_id(lang.id()), Some(lang));
        }
        assert_eq!(Language::from_id(6), None);
    }

    #[test]
    fn context_generation() {
        assert_eq!(EntityContext::Gen8b.generation(), 8);
        assert_eq!(EntityContext::Gen7b.generation(), 7);
        assert_eq!(EntityContext::from_byte(0x8a), Some(EntityContext::Gen8a));
    }
}
