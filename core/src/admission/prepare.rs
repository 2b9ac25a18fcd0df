//! Turning one textual build specification into a trade-ready record.

use linktrade_utils_string::strip_code_fence;

use crate::config::LegalitySettings;
use crate::error::Rejection;
use crate::oracle::Legalization;
use crate::oracle::OracleRunner;
use crate::record::Language;
use crate::record::TradeRecord;
use crate::showdown::BuildSpec;
use crate::spam::AdNameFilter;

const SHINY_LOCK_HINT: &str = "Requested shiny value (ShinyType.";

#[derive(Debug, Clone)]
pub struct PreparedUnit<R> {
    pub record: R,
    pub spec: BuildSpec,
    /// The request set its own trainer details.
    pub ignore_auto_ot: bool,
}

/// A unit that did not produce a record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnitFailure {
    /// English species name, or `"Unknown"` when parsing failed.
    pub species: String,
    pub rejection: Rejection,
    /// Request lines as parsed, or the raw text when parsing failed.
    pub preview: String,
}

impl UnitFailure {
    /// Message shown to the user, without the hint.
    pub fn message(&self) -> String {
        match &self.rejection {
            Rejection::OracleGenerationFailure { species, .. } => {
                format!("Unable to create a legal {species} from that set.")
            }
            other => other.to_string(),
        }
    }

    pub fn hint(&self) -> Option<&str> {
        match &self.rejection {
            Rejection::OracleGenerationFailure { hint, .. } => hint.as_deref(),
            _ => None,
        }
    }
}

pub(crate) struct UnitPipeline<R: TradeRecord> {
    runner: OracleRunner<R>,
    legality: LegalitySettings,
    default_held_item: u16,
    spam: Option<AdNameFilter>,
}

impl<R: TradeRecord> UnitPipeline<R> {
    pub(crate) fn new(
        runner: OracleRunner<R>,
        legality: LegalitySettings,
        default_held_item: u16,
        spam: Option<AdNameFilter>,
    ) -> Self {
        Self {
            runner,
            legality,
            default_held_item,
            spam,
        }
    }

    /// Parse, legalize and post-process one build specification. With
    /// `strict`, unrecognized values on known lines fail the unit.
    pub(crate) async fn prepare(&self, text: &str, strict: bool) -> Result<PreparedUnit<R>, UnitFailure> {
        let text = strip_code_fence(text);
        let oracle = self.runner.oracle();
        let spec = BuildSpec::parse(&text, |name| oracle.species_id(name)).map_err(|err| UnitFailure {
            species: "Unknown".to_string(),
            rejection: Rejection::ParseFailure {
                reason: err.to_string(),
            },
            preview: text.clone(),
        })?;
        let species = oracle.species_name(spec.species);
        let preview = spec.text();
        let fail = |rejection: Rejection| UnitFailure {
            species: species.clone(),
            rejection,
            preview: preview.clone(),
        };

        if strict && !spec.invalid_lines().is_empty() {
            return Err(fail(Rejection::ParseFailure {
                reason: spec.invalid_lines().join("\n"),
            }));
        }

        let language = spec
            .language
            .or_else(|| oracle.detect_language(&text))
            .unwrap_or(self.legality.generate_language);
        let trainer = self.legality.trainer(language);
        let (outcome, spec, trainer) = self
            .runner
            .legalize(spec, trainer)
            .await
            .map_err(|err| fail(Rejection::from_oracle(err, &species)))?;

        let record = match outcome {
            Legalization::Generated(record) => record,
            Legalization::Timeout => {
                return Err(fail(Rejection::OracleTimeout {
                    species: species.clone(),
                }));
            }
            Legalization::VersionMismatch => return Err(fail(Rejection::OracleVersionMismatch)),
            Legalization::Failed { attempt } => {
                let hint = self
                    .runner
                    .hint(spec, trainer, attempt)
                    .await
                    .filter(|hint| !hint.is_empty())
                    .map(|hint| {
                        if hint.contains(SHINY_LOCK_HINT) {
                            format!("{species} cannot be shiny. Please try again.")
                        } else {
                            hint
                        }
                    });
                return Err(fail(Rejection::OracleGenerationFailure {
                    species: species.clone(),
                    hint,
                }));
            }
        };

        let (mut report, mut record) = self
            .runner
            .analyze(record)
            .await
            .map_err(|err| fail(Rejection::from_oracle(err, &species)))?;

        if spec.is_egg {
            make_egg(&mut record, spec.version_specified);
            (report, record) = self
                .runner
                .analyze(record)
                .await
                .map_err(|err| fail(Rejection::from_oracle(err, &species)))?;
        }

        if !report.valid() {
            return Err(fail(Rejection::PostLegalityInvalid {
                species: species.clone(),
                report: report.summary(),
            }));
        }

        self.finish(&mut record, &spec, language);

        if let Some(filter) = &self.spam
            && let Some(matched) = filter.find_ad(record.core())
        {
            return Err(fail(Rejection::DisallowedContent { matched }));
        }

        let ignore_auto_ot = spec.trainer_override;
        Ok(PreparedUnit {
            record,
            spec,
            ignore_auto_ot,
        })
    }

    fn finish(&self, record: &mut R, spec: &BuildSpec, language: Language) {
        let supports_items = record.supports_held_items();
        let core = record.core_mut();
        if !supports_items {
            core.held_item = 0;
        } else if core.held_item == 0 && !core.is_egg {
            core.held_item = self.default_held_item;
        }
        if core.was_egg {
            core.egg_met_date = core.met_date;
        }
        core.language = language.id();
        if spec.nickname.is_empty() && !core.nickname.is_empty() {
            core.clear_nickname();
        }
    }
}

/// Turn a generated record into an egg of its default game unless the
/// request pinned a version.
fn make_egg<R: TradeRecord>(record: &mut R, version_specified: bool) {
    let egg_version = record.default_egg_version();
    let core = record.core_mut();
    if !version_specified && let Some(version) = egg_version {
        core.version = version;
    }
    core.is_egg = true;
    core.was_egg = true;
    core.held_item = 0;
    core.clear_nickname();
    core.egg_met_date = core.met_date;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::oracle::CheckCategory;
    use crate::oracle::CheckResult;
    use crate::oracle::LegalityOracle;
    use crate::oracle::LegalityReport;
    use crate::oracle::TrainerProfile;
    use crate::record::EntityContext;
    use crate::record::EntityCore;
    use crate::record::Pb7;
    use crate::record::Pk9;
    use assert_matches::assert_matches;
    use pretty_assertions::assert_eq;
    use std::sync::Arc;
    use std::time::Duration;

    /// Knows Pikachu (25) and Mew (151). Mew never legalizes; eggs are only
    /// legal when stamped with the default egg version.
    struct TinyOracle;

    impl TinyOracle {
        fn build(spec: &BuildSpec, trainer: &TrainerProfile, context: EntityContext) -> EntityCore {
            let mut core = EntityCore::new(context, spec.species);
            core.nickname = if spec.nickname.is_empty() {
                "PIKACHU".to_string()
            } else {
                spec.nickname.clone()
            };
            core.is_nicknamed = true;
            core.held_item = 0;
            core.language = Language::English.id();
            core.original_trainer.name = trainer.name.clone();
            core.was_egg = spec.is_egg;
            core
        }
    }

    impl<R: TradeRecord> LegalityOracle<R> for TinyOracle
    where
        R: From<EntityCore>,
    {
        fn species_id(&self, name: &str) -> Option<u16> {
            match name.to_ascii_lowercase().as_str() {
                "pikachu" => Some(25),
                "mew" => Some(151),
                _ => None,
            }
        }

        fn species_name(&self, species: u16) -> String {
            match species {
                25 => "Pikachu".to_string(),
                151 => "Mew".to_string(),
                _ => "Unknown".to_string(),
            }
        }

        fn legalize(&self, spec: &BuildSpec, trainer: &TrainerProfile) -> Legalization<R> {
            if spec.species == 151 {
                return Legalization::Failed { attempt: None };
            }
            Legalization::Generated(R::from(Self::build(spec, trainer, R::CONTEXT)))
        }

        fn analyze(&self, record: &R) -> LegalityReport {
            let core = record.core();
            let result = if core.is_egg && core.version != 50 {
                CheckResult::fail(CheckCategory::Encounter, "Egg version mismatch.")
            } else {
                CheckResult::pass(CheckCategory::Encounter)
            };
            LegalityReport {
                results: vec![result],
                encounter_context: R::CONTEXT,
            }
        }

        fn legalization_hint(
            &self,
            _spec: &BuildSpec,
            _trainer: &TrainerProfile,
            _attempt: Option<&R>,
        ) -> Option<String> {
            Some("Requested shiny value (ShinyType.Always) is not possible.".to_string())
        }
    }

    impl From<EntityCore> for Pk9 {
        fn from(core: EntityCore) -> Self {
            Pk9::new(core)
        }
    }

    impl From<EntityCore> for Pb7 {
        fn from(core: EntityCore) -> Self {
            Pb7::new(core)
        }
    }

    fn pipeline<R: TradeRecord + From<EntityCore>>(spam: bool) -> UnitPipeline<R> {
        let runner = OracleRunner::new(Arc::new(TinyOracle), Duration::from_secs(5));
        UnitPipeline::new(
            runner,
            LegalitySettings::default(),
            4,
            spam.then(AdNameFilter::new),
        )
    }

    #[tokio::test]
    async fn generated_record_is_post_processed() {
        let unit = pipeline::<Pk9>(false)
            .prepare("Pikachu\nLanguage: French", true)
            .await
            .expect("prepared");
        let core = unit.record.core();
        assert_eq!(core.held_item, 4);
        assert_eq!(core.language, Language::French.id());
        assert!(!core.is_nicknamed);
        assert_eq!(core.nickname, "");
        assert!(!unit.ignore_auto_ot);
    }

    #[tokio::test]
    async fn variants_without_items_hold_nothing() {
        let unit = pipeline::<Pb7>(false)
            .prepare("Pikachu", true)
            .await
            .expect("prepared");
        assert_eq!(unit.record.core().held_item, 0);
    }

    #[tokio::test]
    async fn eggs_get_default_version_and_keep_no_item() {
        let unit = pipeline::<Pk9>(false)
            .prepare("Egg (Pikachu)", true)
            .await
            .expect("prepared");
        let core = unit.record.core();
        assert!(core.is_egg);
        assert_eq!(core.version, 50);
        assert_eq!(core.held_item, 0);
    }

    #[tokio::test]
    async fn pinned_egg_version_is_respected() {
        let failure = pipeline::<Pk9>(false)
            .prepare("Egg (Pikachu)\n.Version=51", true)
            .await
            .expect_err("version 51 egg is illegal here");
        assert_matches!(failure.rejection, Rejection::PostLegalityInvalid { .. });
    }

    #[tokio::test]
    async fn failed_generation_carries_rewritten_hint() {
        let failure = pipeline::<Pk9>(false)
            .prepare("Mew\nShiny: Yes", false)
            .await
            .expect_err("mew fails");
        assert_eq!(failure.species, "Mew");
        assert_eq!(failure.message(), "Unable to create a legal Mew from that set.");
        assert_eq!(failure.hint(), Some("Mew cannot be shiny. Please try again."));
        assert_eq!(failure.preview, "Mew\nShiny: Yes");
    }

    #[tokio::test]
    async fn unparseable_unit_reports_unknown_species() {
        let failure = pipeline::<Pk9>(false)
            .prepare("Agumon @ Leftovers", false)
            .await
            .expect_err("unknown species");
        assert_eq!(failure.species, "Unknown");
        assert_matches!(failure.rejection, Rejection::ParseFailure { .. });
    }

    #[tokio::test]
    async fn strict_mode_rejects_invalid_lines() {
        let pipeline = pipeline::<Pk9>(false);
        assert!(pipeline.prepare("Pikachu\nLanguage: Klingon", false).await.is_ok());
        let failure = pipeline
            .prepare("Pikachu\nLanguage: Klingon", true)
            .await
            .expect_err("strict");
        assert_matches!(failure.rejection, Rejection::ParseFailure { reason } if reason.contains("Klingon"));
    }

    #[tokio::test]
    async fn advert_nicknames_rejected_when_enabled() {
        let text = "CoolTV (Pikachu)";
        assert!(pipeline::<Pk9>(false).prepare(text, true).await.is_ok());
        let failure = pipeline::<Pk9>(true)
            .prepare(text, true)
            .await
            .expect_err("advert");
        assert_eq!(
            failure.rejection,
            Rejection::DisallowedContent {
                matched: "CoolTV".to_string()
            }
        );
    }
}
