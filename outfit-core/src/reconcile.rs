//! Count reconciliation: pair one attempt's detections with the expected
//! items that are still outstanding.
//!
//! The strategy depends only on how many detections survived suppression
//! compared with how many items are pending:
//!
//! * equal: every item greedily takes its best unused detection;
//! * more detections: all (detection, item) scores are boosted for garments,
//!   penalised for detail fragments, and the best pairs win;
//! * fewer detections: greedy matching, then small accessories may borrow
//!   the box of a related garment as a low-confidence stand-in.
//!
//! Every tie is broken by prompt order and then by detection order, so the
//! same detector output always reconciles the same way.

use std::cmp::Ordering;

use log::debug;
use outfit_utils::config::{DetectionSettings, ReconcileSettings};
use serde::{Deserialize, Serialize};

use crate::detection::{Detection, ExpectedItem, ItemId};
use crate::similarity::{DEFAULT_SIMILARITY_THRESHOLD, similarity};

/// Scoring parameters for reconciliation. The defaults were tuned by hand.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileConfig {
    /// Minimum raw similarity for a detection to satisfy an item.
    pub similarity_threshold: f32,
    /// Added to garment-labelled scores when detections outnumber items.
    pub garment_bonus: f32,
    /// Multiplies detail-only scores when detections outnumber items.
    pub detail_penalty: f32,
    /// Similarity recorded on fallback pairs.
    pub fallback_similarity: f32,
    pub enable_fallback: bool,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            garment_bonus: 0.5,
            detail_penalty: 0.3,
            fallback_similarity: 0.1,
            enable_fallback: true,
        }
    }
}

impl From<(&DetectionSettings, &ReconcileSettings)> for ReconcileConfig {
    fn from((detection, reconcile): (&DetectionSettings, &ReconcileSettings)) -> Self {
        Self {
            similarity_threshold: detection.similarity_threshold,
            garment_bonus: reconcile.garment_bonus,
            detail_penalty: reconcile.detail_penalty,
            fallback_similarity: reconcile.fallback_similarity,
            enable_fallback: reconcile.enable_fallback,
        }
    }
}

/// Which count relationship drove reconciliation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReconcileBranch {
    PerfectMatch,
    TooMany,
    TooFew,
}

impl ReconcileBranch {
    pub fn classify(pending: usize, detections: usize) -> Self {
        match detections.cmp(&pending) {
            Ordering::Equal => ReconcileBranch::PerfectMatch,
            Ordering::Greater => ReconcileBranch::TooMany,
            Ordering::Less => ReconcileBranch::TooFew,
        }
    }
}

/// A detection accepted as satisfying one expected item.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MatchedPair {
    pub item: ItemId,
    pub label: String,
    pub detection: Detection,
    pub similarity: f32,
    /// Set when the box was borrowed from a related detection.
    pub is_fallback: bool,
    /// 1-based detector attempt that produced the pair.
    pub attempt: u32,
}

/// Result of reconciling one attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct ReconcileOutcome {
    pub branch: ReconcileBranch,
    pub pairs: Vec<MatchedPair>,
    /// Pending items left unmatched, in prompt order.
    pub still_missing: Vec<ItemId>,
    /// Detections that satisfied no item.
    pub unused_detections: usize,
}

/// Pairs detections with pending expected items.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    config: ReconcileConfig,
}

impl Reconciler {
    pub fn new(config: ReconcileConfig) -> Self {
        Self { config }
    }

    /// Reconcile `detections` against the `pending` items.
    ///
    /// `anchors` are detections matched in earlier attempts; they are only
    /// consulted as fallback sources for small accessories. Pairs carry
    /// `attempt = 0`; the caller stamps the real attempt number.
    pub fn reconcile(
        &self,
        detections: &[Detection],
        pending: &[(ItemId, &ExpectedItem)],
        anchors: &[Detection],
    ) -> ReconcileOutcome {
        let branch = ReconcileBranch::classify(pending.len(), detections.len());
        let mut used = vec![false; detections.len()];

        let (mut pairs, unmatched) = match branch {
            ReconcileBranch::PerfectMatch | ReconcileBranch::TooFew => {
                self.match_greedy(detections, pending, &mut used)
            }
            ReconcileBranch::TooMany => self.match_boosted(detections, pending, &mut used),
        };

        let still_missing = if branch == ReconcileBranch::TooFew && self.config.enable_fallback {
            let mut missing = Vec::new();
            for (id, item) in unmatched {
                match self.synthesize_fallback(id, item, detections, anchors) {
                    Some(pair) => pairs.push(pair),
                    None => missing.push(id),
                }
            }
            missing
        } else {
            unmatched.into_iter().map(|(id, _)| id).collect()
        };

        let unused_detections = used.iter().filter(|u| !**u).count();
        if branch == ReconcileBranch::TooMany {
            for (detection, _) in detections.iter().zip(&used).filter(|(_, u)| !**u) {
                debug!(
                    "Discarding surplus detection '{}' ({:.2})",
                    detection.phrase, detection.score
                );
            }
        }

        ReconcileOutcome {
            branch,
            pairs,
            still_missing,
            unused_detections,
        }
    }

    /// Each item in prompt order takes its best-scoring unused detection.
    fn match_greedy<'a>(
        &self,
        detections: &[Detection],
        pending: &[(ItemId, &'a ExpectedItem)],
        used: &mut [bool],
    ) -> (Vec<MatchedPair>, Vec<(ItemId, &'a ExpectedItem)>) {
        let mut pairs = Vec::new();
        let mut unmatched = Vec::new();

        for &(id, item) in pending {
            let mut best: Option<(usize, f32)> = None;
            for (idx, detection) in detections.iter().enumerate() {
                if used[idx] {
                    continue;
                }
                let score = similarity(&detection.phrase, &item.label);
                if best.is_none_or(|(_, best_score)| score > best_score) {
                    best = Some((idx, score));
                }
            }

            match best {
                Some((idx, score)) if score >= self.config.similarity_threshold => {
                    used[idx] = true;
                    pairs.push(direct_pair(id, item, &detections[idx], score));
                }
                _ => unmatched.push((id, item)),
            }
        }

        (pairs, unmatched)
    }

    /// Rank every (detection, item) combination by boosted score and keep the
    /// best disjoint assignments, at most one per pending item.
    fn match_boosted<'a>(
        &self,
        detections: &[Detection],
        pending: &[(ItemId, &'a ExpectedItem)],
        used: &mut [bool],
    ) -> (Vec<MatchedPair>, Vec<(ItemId, &'a ExpectedItem)>) {
        struct Candidate {
            boosted: f32,
            raw: f32,
            item_pos: usize,
            det_idx: usize,
        }

        let mut candidates = Vec::with_capacity(pending.len() * detections.len());
        for (item_pos, (_, item)) in pending.iter().enumerate() {
            for (det_idx, detection) in detections.iter().enumerate() {
                let raw = similarity(&detection.phrase, &item.label);
                if raw < self.config.similarity_threshold {
                    continue;
                }
                let boosted = if detection.is_garment() {
                    raw + self.config.garment_bonus
                } else {
                    raw * self.config.detail_penalty
                };
                candidates.push(Candidate {
                    boosted,
                    raw,
                    item_pos,
                    det_idx,
                });
            }
        }
        // Stable: equal scores keep prompt order, then detection order.
        candidates.sort_by(|a, b| b.boosted.partial_cmp(&a.boosted).unwrap_or(Ordering::Equal));

        let mut item_taken = vec![false; pending.len()];
        let mut pairs = Vec::new();
        for candidate in candidates {
            if pairs.len() == pending.len() {
                break;
            }
            if item_taken[candidate.item_pos] || used[candidate.det_idx] {
                continue;
            }
            item_taken[candidate.item_pos] = true;
            used[candidate.det_idx] = true;
            let (id, item) = pending[candidate.item_pos];
            pairs.push(direct_pair(
                id,
                item,
                &detections[candidate.det_idx],
                candidate.raw,
            ));
        }

        // Report pairs in prompt order regardless of ranking order.
        pairs.sort_by_key(|pair| pair.item);
        let unmatched = pending
            .iter()
            .zip(&item_taken)
            .filter(|(_, taken)| !**taken)
            .map(|(entry, _)| *entry)
            .collect();
        (pairs, unmatched)
    }

    /// Borrow the box of the strongest related detection for a small accessory.
    fn synthesize_fallback(
        &self,
        id: ItemId,
        item: &ExpectedItem,
        detections: &[Detection],
        anchors: &[Detection],
    ) -> Option<MatchedPair> {
        let category = item.category().filter(|c| c.is_small_accessory())?;
        let related = category.fallback_anchors();

        let mut best: Option<&Detection> = None;
        for candidate in detections.iter().chain(anchors) {
            let Some(candidate_category) = candidate.category else {
                continue;
            };
            if !related.contains(&candidate_category) {
                continue;
            }
            if best.is_none_or(|b| candidate.score > b.score) {
                best = Some(candidate);
            }
        }

        let anchor = best?;
        debug!(
            "Using '{}' as a fallback stand-in for {} '{}'",
            anchor.phrase, id, item.label
        );
        Some(MatchedPair {
            item: id,
            label: item.label.clone(),
            detection: anchor.clone(),
            similarity: self.config.fallback_similarity,
            is_fallback: true,
            attempt: 0,
        })
    }
}

fn direct_pair(id: ItemId, item: &ExpectedItem, detection: &Detection, score: f32) -> MatchedPair {
    MatchedPair {
        item: id,
        label: item.label.clone(),
        detection: detection.clone(),
        similarity: score,
        is_fallback: false,
        attempt: 0,
    }
}
