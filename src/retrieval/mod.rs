//! Shortlist selection
//!
//! Scores every stored embedding against a query vector and picks the files
//! worth sending as context. Selection walks three tiers and stops at the
//! first one that yields candidates:
//!
//! 1. scores above `initial_threshold`
//! 2. scores above `fallback_threshold`
//! 3. the `top_n` closest files regardless of score
//!
//! Every tier is capped at `top_n`.

pub mod similarity;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::store::EmbeddingRecord;

pub use similarity::{cosine_similarity, SimilarityError};

pub const DEFAULT_INITIAL_THRESHOLD: f32 = 0.5;
pub const DEFAULT_FALLBACK_THRESHOLD: f32 = 0.3;
pub const DEFAULT_TOP_N: usize = 2;

/// Thresholds and size bound for shortlist selection
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectionPolicy {
    pub initial_threshold: f32,
    pub fallback_threshold: f32,
    pub top_n: usize,
}

impl Default for SelectionPolicy {
    fn default() -> Self {
        Self {
            initial_threshold: DEFAULT_INITIAL_THRESHOLD,
            fallback_threshold: DEFAULT_FALLBACK_THRESHOLD,
            top_n: DEFAULT_TOP_N,
        }
    }
}

/// A file path with its similarity to the query
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredCandidate {
    pub file_path: String,
    pub score: f32,
}

/// Which selection rule produced the shortlist
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    /// Above the initial threshold
    Initial,
    /// Above the fallback threshold
    Fallback,
    /// Closest files, no threshold
    Closest,
}

impl Tier {
    pub fn describe(&self) -> &'static str {
        match self {
            Tier::Initial => "above initial threshold",
            Tier::Fallback => "above fallback threshold",
            Tier::Closest => "closest matches",
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Shortlist {
    pub tier: Tier,
    pub candidates: Vec<ScoredCandidate>,
}

impl Shortlist {
    pub fn paths(&self) -> Vec<String> {
        self.candidates.iter().map(|c| c.file_path.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }
}

/// Score all records against `query`, best first.
///
/// Records of the wrong dimension are dropped. Records with a zero norm
/// score 0.0. Equal scores are ordered by file path.
pub fn rank(query: &[f32], records: &[EmbeddingRecord]) -> Vec<ScoredCandidate> {
    let mut ranked = Vec::with_capacity(records.len());

    for record in records {
        let score = match cosine_similarity(query, &record.vector) {
            Ok(score) => score,
            Err(e @ SimilarityError::DimensionMismatch { .. }) => {
                warn!("Skipping {}: {}", record.file_path, e);
                continue;
            }
            Err(SimilarityError::ZeroNorm) => {
                warn!("Zero-norm vector for {}, scoring as 0", record.file_path);
                0.0
            }
        };

        debug!("Similarity for {}: {:.4}", record.file_path, score);
        ranked.push(ScoredCandidate {
            file_path: record.file_path.clone(),
            score,
        });
    }

    sort_ranked(&mut ranked);
    ranked
}

/// Highest score first, ties by path. `-0.0` counts as `0.0`.
fn sort_ranked(ranked: &mut [ScoredCandidate]) {
    for candidate in ranked.iter_mut() {
        candidate.score += 0.0;
    }
    ranked.sort_by(|a, b| {
        b.score
            .total_cmp(&a.score)
            .then_with(|| a.file_path.cmp(&b.file_path))
    });
}

/// Pick the shortlist from an already ranked candidate list
pub fn select(ranked: Vec<ScoredCandidate>, policy: &SelectionPolicy) -> Shortlist {
    let tiers = [
        (Tier::Initial, policy.initial_threshold),
        (Tier::Fallback, policy.fallback_threshold),
    ];

    for (tier, threshold) in tiers {
        let passing = count_above(&ranked, threshold);
        if passing > 0 {
            let mut candidates = ranked;
            candidates.truncate(passing.min(policy.top_n));
            return Shortlist { tier, candidates };
        }
    }

    let mut candidates = ranked;
    candidates.truncate(policy.top_n);
    Shortlist {
        tier: Tier::Closest,
        candidates,
    }
}

/// Rank then select
pub fn shortlist(
    query: &[f32],
    records: &[EmbeddingRecord],
    policy: &SelectionPolicy,
) -> Shortlist {
    let shortlist = select(rank(query, records), policy);
    debug!(
        "Selected {} of {} files ({})",
        shortlist.len(),
        records.len(),
        shortlist.tier.describe()
    );
    shortlist
}

// `ranked` is sorted descending, so passing candidates form a prefix.
fn count_above(ranked: &[ScoredCandidate], threshold: f32) -> usize {
    ranked.iter().take_while(|c| c.score > threshold).count()
}
