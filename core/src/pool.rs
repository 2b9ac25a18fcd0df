//! Folder-backed pool of pre-vetted records for distribution and surprise
//! trades.
//!
//! Draws walk the corpus with a cursor so every entry is served exactly once
//! per pass. When the cursor wraps and shuffling is enabled the corpus is
//! reshuffled, so passes differ in order but never repeat an entry early.

use std::collections::HashMap;
use std::collections::HashSet;
use std::path::Path;
use std::path::PathBuf;
use std::sync::PoisonError;
use std::sync::RwLock;

use linktrade_utils_string::sanitize_key;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use regex_lite::Regex;
use tracing::info;
use tracing::warn;
use walkdir::WalkDir;

use crate::config::LegalitySettings;
use crate::config::PoolSettings;
use crate::error::PoolError;
use crate::oracle::OracleRunner;
use crate::record::TradeRecord;
use crate::record::species;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PoolEntry<R> {
    pub record: R,
    pub path: PathBuf,
    pub file_name: String,
    /// Sanitized file stem, unique within the corpus.
    pub key: String,
    pub trade_code: Option<u32>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SkipReason {
    Unreadable(String),
    /// Right size, but not a record this pool can hold.
    Undecodable,
    EmptySpecies,
    NotTradeable,
    Illegal(String),
    AnalysisFailed(String),
    /// Another file already claimed the same sanitized key.
    DuplicateKey(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedFile {
    pub path: PathBuf,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LoadSummary {
    pub accepted: usize,
    pub skipped: Vec<SkippedFile>,
}

struct Corpus<R> {
    entries: Vec<PoolEntry<R>>,
    keys: HashSet<String>,
    codes: HashMap<String, u32>,
    cursor: usize,
    rng: StdRng,
}

impl<R: TradeRecord> Corpus<R> {
    fn new(rng: StdRng) -> Self {
        Self {
            entries: Vec::new(),
            keys: HashSet::new(),
            codes: HashMap::new(),
            cursor: 0,
            rng,
        }
    }

    fn next(&mut self, shuffle: bool) -> Result<R, PoolError> {
        let len = self.entries.len();
        let Some(entry) = self.entries.get(self.cursor) else {
            return Err(PoolError::CorpusEmpty);
        };
        let choice = entry.record.clone();
        self.cursor = (self.cursor + 1) % len;
        if self.cursor == 0 && shuffle {
            self.entries.shuffle(&mut self.rng);
        }
        Ok(choice)
    }

    /// Append candidates in order, skipping keys already present.
    fn absorb(&mut self, candidates: Vec<PoolEntry<R>>, summary: &mut LoadSummary) {
        for entry in candidates {
            if !self.keys.insert(entry.key.clone()) {
                info!(
                    file = %entry.path.display(),
                    key = %entry.key,
                    "SKIPPED: file not added due to duplicate name"
                );
                summary.skipped.push(SkippedFile {
                    path: entry.path,
                    reason: SkipReason::DuplicateKey(entry.key),
                });
                continue;
            }
            if let (Some(code), Some(stem)) = (entry.trade_code, file_stem(&entry.file_name)) {
                self.codes.insert(stem, code);
            }
            self.entries.push(entry);
            summary.accepted += 1;
        }
    }
}

pub struct PokemonPool<R: TradeRecord> {
    corpus: RwLock<Corpus<R>>,
    runner: OracleRunner<R>,
    settings: PoolSettings,
    reset_home_tracker: bool,
    trade_code: Regex,
}

impl<R: TradeRecord> PokemonPool<R> {
    pub fn new(runner: OracleRunner<R>, settings: PoolSettings, legality: &LegalitySettings) -> Self {
        Self::with_rng(runner, settings, legality, StdRng::from_os_rng())
    }

    /// Pool with a deterministic shuffle order.
    pub fn with_seed(
        runner: OracleRunner<R>,
        settings: PoolSettings,
        legality: &LegalitySettings,
        seed: u64,
    ) -> Self {
        Self::with_rng(runner, settings, legality, StdRng::seed_from_u64(seed))
    }

    fn with_rng(
        runner: OracleRunner<R>,
        settings: PoolSettings,
        legality: &LegalitySettings,
        rng: StdRng,
    ) -> Self {
        #[allow(clippy::expect_used)]
        let trade_code = Regex::new(r"\b\d{8}\b").expect("trade code pattern compiles");
        Self {
            corpus: RwLock::new(Corpus::new(rng)),
            runner,
            settings,
            reset_home_tracker: legality.reset_home_tracker,
            trade_code,
        }
    }

    pub fn len(&self) -> usize {
        self.read(|c| c.entries.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Load every matching record under `path` into the pool. Returns true
    /// when at least one record was accepted.
    pub async fn load_folder(&self, path: &Path) -> bool {
        self.scan_folder(path)
            .await
            .is_some_and(|summary| summary.accepted > 0)
    }

    /// Like [`Self::load_folder`], reporting every skipped file. `None` when
    /// `path` is not a directory.
    pub async fn scan_folder(&self, path: &Path) -> Option<LoadSummary> {
        let (candidates, mut summary) = self.build_candidates(path).await?;
        {
            let mut corpus = self.corpus.write().unwrap_or_else(PoisonError::into_inner);
            corpus.absorb(candidates, &mut summary);
            warn_if_no_surprise(&corpus.entries);
        }
        Some(summary)
    }

    /// Replace the corpus with the contents of `path`. The old corpus stays
    /// in place when `path` is not a directory.
    pub async fn reload(&self, path: &Path) -> bool {
        let Some((candidates, mut summary)) = self.build_candidates(path).await else {
            return false;
        };
        let mut corpus = self.corpus.write().unwrap_or_else(PoisonError::into_inner);
        corpus.entries.clear();
        corpus.keys.clear();
        corpus.codes.clear();
        corpus.cursor = 0;
        corpus.absorb(candidates, &mut summary);
        warn_if_no_surprise(&corpus.entries);
        summary.accepted > 0
    }

    pub fn get_random_poke(&self) -> Result<R, PoolError> {
        let shuffle = self.settings.shuffled;
        self.corpus
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .next(shuffle)
    }

    /// Next record allowed in surprise trades (no legendaries, mythicals or
    /// fused forms).
    pub fn get_random_surprise(&self) -> Result<R, PoolError> {
        let shuffle = self.settings.shuffled;
        let mut corpus = self.corpus.write().unwrap_or_else(PoisonError::into_inner);
        if corpus.entries.is_empty() {
            return Err(PoolError::CorpusEmpty);
        }
        if !corpus.entries.iter().any(|e| surprise_eligible(&e.record)) {
            return Err(PoolError::CorpusExhausted);
        }
        // An eligible entry is reached within one pass.
        loop {
            let record = corpus.next(shuffle)?;
            if surprise_eligible(&record) {
                return Ok(record);
            }
        }
    }

    pub fn surprise_eligible_count(&self) -> usize {
        self.read(|c| {
            c.entries
                .iter()
                .filter(|e| surprise_eligible(&e.record))
                .count()
        })
    }

    /// Entry whose sanitized key matches `name` after sanitizing.
    pub fn find_by_name(&self, name: &str) -> Option<PoolEntry<R>> {
        let key = sanitize_key(name);
        self.read(|c| c.entries.iter().find(|e| e.key == key).cloned())
    }

    /// Trade code embedded in the file stem of a loaded record.
    pub fn trade_code_for(&self, file_stem: &str) -> Option<u32> {
        self.read(|c| c.codes.get(file_stem).copied())
    }

    fn read<T>(&self, f: impl FnOnce(&Corpus<R>) -> T) -> T {
        f(&self.corpus.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Decode and vet every candidate file without touching the corpus.
    async fn build_candidates(&self, path: &Path) -> Option<(Vec<PoolEntry<R>>, LoadSummary)> {
        if !path.is_dir() {
            return None;
        }
        let root = path.to_path_buf();
        let recursive = self.settings.recursive;
        let files = tokio::task::spawn_blocking(move || files_of_size(&root, recursive, R::SIZE))
            .await
            .unwrap_or_else(|err| {
                warn!("pool scan aborted: {err}");
                Vec::new()
            });

        let mut summary = LoadSummary::default();
        let mut candidates = Vec::new();
        for (path, data) in files {
            match self.vet(&path, data).await {
                Ok(entry) => candidates.push(entry),
                Err(reason) => {
                    info!(file = %path.display(), reason = ?reason, "SKIPPED: pool file rejected");
                    summary.skipped.push(SkippedFile { path, reason });
                }
            }
        }
        Some((candidates, summary))
    }

    async fn vet(
        &self,
        path: &Path,
        data: std::io::Result<Vec<u8>>,
    ) -> Result<PoolEntry<R>, SkipReason> {
        let data = data.map_err(|err| SkipReason::Unreadable(err.to_string()))?;
        let record = R::decode(&data).ok_or(SkipReason::Undecodable)?;
        if record.species() == 0 {
            return Err(SkipReason::EmptySpecies);
        }
        if !record.can_be_traded() {
            return Err(SkipReason::NotTradeable);
        }
        let (report, mut record) = self
            .runner
            .analyze(record)
            .await
            .map_err(|err| SkipReason::AnalysisFailed(err.to_string()))?;
        if !report.valid() {
            return Err(SkipReason::Illegal(report.summary()));
        }
        if self.reset_home_tracker {
            record.core_mut().home_tracker = 0;
        }

        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        let trade_code = self
            .trade_code
            .find(&stem)
            .and_then(|m| m.as_str().parse().ok());
        Ok(PoolEntry {
            record,
            path: path.to_path_buf(),
            file_name,
            key: sanitize_key(&stem),
            trade_code,
        })
    }
}

fn surprise_eligible<R: TradeRecord>(record: &R) -> bool {
    let core = record.core();
    !species::disallow_random_recipient(core.species, core.form, core.generation())
}

fn warn_if_no_surprise<R: TradeRecord>(entries: &[PoolEntry<R>]) {
    if !entries.iter().any(|e| surprise_eligible(&e.record)) {
        warn!(
            entries = entries.len(),
            "surprise trading will fail: no loaded record is eligible"
        );
    }
}

fn file_stem(file_name: &str) -> Option<String> {
    Path::new(file_name)
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
}

/// Files under `root` whose length is exactly `size`, in file-name order.
fn files_of_size(
    root: &Path,
    recursive: bool,
    size: usize,
) -> Vec<(PathBuf, std::io::Result<Vec<u8>>)> {
    let mut walker = WalkDir::new(root).min_depth(1).sort_by_file_name();
    if !recursive {
        walker = walker.max_depth(1);
    }
    walker
        .into_iter()
        .filter_map(Result::ok)
        .filter(|entry| entry.file_type().is_file())
        .filter(|entry| {
            entry
                .metadata()
                .is_ok_and(|meta| usize::try_from(meta.len()).is_ok_and(|len| len == size))
        })
        .map(|entry| {
            let path = entry.into_path();
            let data = std::fs::read(&path);
            (path, data)
        })
        .collect()
}
