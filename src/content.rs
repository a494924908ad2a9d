use clap::ValueEnum;
use include_dir::{include_dir, Dir};
use itertools::Itertools;
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};

static CONTENT_DIR: Dir = include_dir!("assets");

/// Shown when every content pool comes up empty.
pub const FALLBACK_TEXT: &str =
    "the quick brown fox jumps over the lazy dog while the typist races the clock";

/// Selectable test length.
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    ValueEnum,
    Serialize,
    Deserialize,
    strum_macros::Display,
)]
pub enum TestDuration {
    #[strum(serialize = "15s")]
    Short,
    #[strum(serialize = "30s")]
    Medium,
    #[strum(serialize = "60s")]
    Long,
    #[strum(serialize = "120s")]
    Marathon,
}

impl TestDuration {
    pub const ALL: [Self; 4] = [Self::Short, Self::Medium, Self::Long, Self::Marathon];

    pub fn secs(self) -> u64 {
        match self {
            Self::Short => 15,
            Self::Medium => 30,
            Self::Long => 60,
            Self::Marathon => 120,
        }
    }

    fn pool_stem(self) -> &'static str {
        match self {
            Self::Short => "15",
            Self::Medium => "30",
            Self::Long => "60",
            Self::Marathon => "120",
        }
    }
}

/// Kind of text the typist is asked to reproduce.
#[derive(
    Debug,
    Copy,
    Clone,
    PartialEq,
    Eq,
    ValueEnum,
    Serialize,
    Deserialize,
    strum_macros::Display,
)]
pub enum TextMode {
    #[strum(serialize = "text")]
    Normal,
    #[strum(serialize = "code")]
    Code,
}

impl TextMode {
    fn pool_prefix(self) -> &'static str {
        match self {
            Self::Normal => "normal",
            Self::Code => "code",
        }
    }
}

#[derive(Deserialize, Clone, Debug)]
struct TextPool {
    #[allow(dead_code)]
    name: String,
    texts: Vec<String>,
}

fn read_pool(file_name: &str) -> Option<TextPool> {
    let file = CONTENT_DIR.get_file(file_name)?;
    let raw = file.contents_utf8()?;
    serde_json::from_str(raw).ok()
}

fn pool_texts(pool: Option<TextPool>) -> Vec<String> {
    pool.map(|p| p.texts)
        .unwrap_or_default()
        .into_iter()
        .filter(|t| !t.is_empty())
        .unique()
        .collect()
}

/// Embedded candidate-text pools, keyed by duration and text mode.
pub struct ContentLibrary;

impl ContentLibrary {
    /// All candidate texts for the given selection.
    ///
    /// A missing or empty pool falls back to the same-mode 30-second pool;
    /// if that is empty too, the single static fallback text is returned, so
    /// the result is never empty.
    pub fn candidate_texts(
        duration: TestDuration,
        mode: TextMode,
        competitive: bool,
    ) -> Vec<String> {
        let primary = if competitive {
            read_pool("competitive.json")
        } else {
            read_pool(&format!(
                "{}_{}.json",
                mode.pool_prefix(),
                duration.pool_stem()
            ))
        };

        let mut texts = pool_texts(primary);
        if texts.is_empty() {
            texts = pool_texts(read_pool(&format!("{}_30.json", mode.pool_prefix())));
        }
        if texts.is_empty() {
            return vec![FALLBACK_TEXT.to_string()];
        }
        texts
    }

    /// Pick one target text uniformly at random for a new session.
    pub fn pick_text(duration: TestDuration, mode: TextMode, competitive: bool) -> String {
        Self::pick_text_with(duration, mode, competitive, &mut rand::thread_rng())
    }

    pub fn pick_text_with<R: Rng>(
        duration: TestDuration,
        mode: TextMode,
        competitive: bool,
        rng: &mut R,
    ) -> String {
        let texts = Self::candidate_texts(duration, mode, competitive);
        texts
            .choose(rng)
            .cloned()
            .unwrap_or_else(|| FALLBACK_TEXT.to_string())
    }
}
