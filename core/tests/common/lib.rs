use std::collections::HashMap;
use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use linktrade_core::AdmissionController;
use linktrade_core::TradeConfig;
use linktrade_core::oracle::CheckCategory;
use linktrade_core::oracle::CheckResult;
use linktrade_core::oracle::Legalization;
use linktrade_core::oracle::LegalityOracle;
use linktrade_core::oracle::LegalityReport;
use linktrade_core::oracle::TrainerProfile;
use linktrade_core::record::EntityContext;
use linktrade_core::record::EntityCore;
use linktrade_core::record::Language;
use linktrade_core::record::Pk9;
use linktrade_core::record::TradeRecord;
use linktrade_core::showdown::BuildSpec;

const SPECIES: &[(&str, u16)] = &[
    ("Bulbasaur", 1),
    ("Charmander", 4),
    ("Squirtle", 7),
    ("Pikachu", 25),
    ("Ditto", 132),
    ("Eevee", 133),
    ("Mewtwo", 150),
    ("Mew", 151),
    ("Kyurem", 646),
    ("Calyrex", 898),
];

/// Legality engine stand-in with scripted outcomes per species.
///
/// `analyze` fails a record when
/// - its nickname starts with `illegal` (encounter check), or
/// - a handling trainer other than the original trainer is set while the
///   original trainer is still the current handler (memory check).
#[derive(Default)]
pub struct ScriptedOracle {
    failing: HashMap<u16, Option<String>>,
    timing_out: HashSet<u16>,
    slow: HashMap<u16, Duration>,
    panicking: HashSet<u16>,
    encounter_context: Option<EntityContext>,
    crash_marker: Option<String>,
}

impl ScriptedOracle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Legalization of `species` fails with an optional hint.
    pub fn failing(mut self, species: &str, hint: Option<&str>) -> Self {
        self.failing
            .insert(species_id(species), hint.map(str::to_string));
        self
    }

    pub fn timing_out(mut self, species: &str) -> Self {
        self.timing_out.insert(species_id(species));
        self
    }

    /// Legalization of `species` blocks for `delay` before answering.
    pub fn slow(mut self, species: &str, delay: Duration) -> Self {
        self.slow.insert(species_id(species), delay);
        self
    }

    pub fn panicking(mut self, species: &str) -> Self {
        self.panicking.insert(species_id(species));
        self
    }

    /// Report every encounter as originating from `context`.
    pub fn encounter_context(mut self, context: EntityContext) -> Self {
        self.encounter_context = Some(context);
        self
    }

    /// Language detection panics on text containing `marker`. Detection runs
    /// inline, outside the guarded engine calls.
    pub fn crashing_detection(mut self, marker: &str) -> Self {
        self.crash_marker = Some(marker.to_string());
        self
    }

    pub fn into_arc(self) -> Arc<dyn LegalityOracle<Pk9>> {
        Arc::new(self)
    }
}

impl LegalityOracle<Pk9> for ScriptedOracle {
    fn species_id(&self, name: &str) -> Option<u16> {
        SPECIES
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, id)| *id)
    }

    fn species_name(&self, species: u16) -> String {
        SPECIES
            .iter()
            .find(|(_, id)| *id == species)
            .map(|(n, _)| (*n).to_string())
            .unwrap_or_else(|| format!("Species #{species}"))
    }

    fn legalize(&self, spec: &BuildSpec, trainer: &TrainerProfile) -> Legalization<Pk9> {
        if self.panicking.contains(&spec.species) {
            panic!("legality engine crashed on {}", spec.species_text);
        }
        if self.timing_out.contains(&spec.species) {
            return Legalization::Timeout;
        }
        if self.failing.contains_key(&spec.species) {
            return Legalization::Failed { attempt: None };
        }
        if let Some(delay) = self.slow.get(&spec.species) {
            std::thread::sleep(*delay);
        }
        let mut core = EntityCore::new(EntityContext::Gen9, spec.species);
        if !spec.nickname.is_empty() {
            core.nickname = spec.nickname.clone();
            core.is_nicknamed = true;
        }
        core.language = trainer.language.id();
        core.original_trainer.name = trainer.name.clone();
        core.met_date = NaiveDate::from_ymd_opt(2024, 5, 1);
        Legalization::Generated(Pk9::new(core))
    }

    fn analyze(&self, record: &Pk9) -> LegalityReport {
        let core = record.core();
        let mut results = vec![CheckResult::pass(CheckCategory::Encounter)];
        if core.nickname.to_ascii_lowercase().starts_with("illegal") {
            results.push(CheckResult::fail(
                CheckCategory::Encounter,
                "Unable to match an encounter from origin game.",
            ));
        }
        let handler = &core.handling_trainer;
        if core.current_handler == 0
            && !handler.name.is_empty()
            && handler.name != core.original_trainer.name
        {
            results.push(CheckResult::fail(
                CheckCategory::Memory,
                "Handling trainer memory present while original trainer is current handler.",
            ));
        }
        LegalityReport {
            results,
            encounter_context: self.encounter_context.unwrap_or(core.context),
        }
    }

    fn detect_language(&self, text: &str) -> Option<Language> {
        if let Some(marker) = &self.crash_marker
            && text.contains(marker.as_str())
        {
            panic!("language detection crashed on {marker}");
        }
        None
    }

    fn legalization_hint(
        &self,
        spec: &BuildSpec,
        _trainer: &TrainerProfile,
        _attempt: Option<&Pk9>,
    ) -> Option<String> {
        self.failing.get(&spec.species).cloned().flatten()
    }
}

fn species_id(name: &str) -> u16 {
    SPECIES
        .iter()
        .find(|(n, _)| n.eq_ignore_ascii_case(name))
        .map(|(_, id)| *id)
        .unwrap_or_else(|| panic!("unknown test species {name}"))
}

/// Configuration used by most tests: batches up to six, short timeout.
pub fn test_config() -> TradeConfig {
    let mut config = TradeConfig::default();
    config.trade.max_pkms_per_trade = 6;
    config.legality.timeout_secs = 2;
    config
}

pub fn controller(oracle: ScriptedOracle, config: TradeConfig) -> Arc<AdmissionController<Pk9>> {
    Arc::new(AdmissionController::new(oracle.into_arc(), config))
}

/// A legal Gen9 record of `species` with a fixed trainer.
pub fn pk9(species: &str) -> Pk9 {
    let mut core = EntityCore::new(EntityContext::Gen9, species_id(species));
    core.original_trainer.name = "Ash".to_string();
    core.met_date = NaiveDate::from_ymd_opt(2023, 11, 18);
    Pk9::new(core)
}

/// Write `record` to `dir/name` in its stored format.
pub fn write_record<R: TradeRecord>(dir: &Path, name: &str, record: &R) -> anyhow::Result<PathBuf> {
    let path = dir.join(name);
    std::fs::write(&path, record.encode())?;
    Ok(path)
}

/// Directory of distribution files, one per `(file name, species)`.
pub fn corpus_dir(files: &[(&str, &str)]) -> tempfile::TempDir {
    let dir = tempfile::tempdir().expect("corpus tempdir");
    for (name, species) in files {
        write_record(dir.path(), name, &pk9(species)).expect("write corpus file");
    }
    dir
}
