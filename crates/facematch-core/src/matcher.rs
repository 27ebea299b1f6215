//! Nearest-neighbour matching of a probe embedding against registered
//! identities, with a strict rejection threshold.

use crate::error::RecognitionError;
use crate::types::{Decision, Embedding, Identity};

/// Strategy for comparing a probe embedding against a gallery of identities.
pub trait Matcher {
    fn compare(
        &self,
        probe: &Embedding,
        gallery: &[Identity],
        threshold: f32,
    ) -> Result<Decision, RecognitionError>;
}

/// Euclidean-distance matcher.
///
/// Scans the whole gallery (no early exit, no index), so the reported
/// distance is always the global minimum. Ties keep the earlier entry.
/// A probe is recognized only when `distance < threshold`.
#[derive(Debug, Clone, Copy, Default)]
pub struct EuclideanMatcher;

impl Matcher for EuclideanMatcher {
    fn compare(
        &self,
        probe: &Embedding,
        gallery: &[Identity],
        threshold: f32,
    ) -> Result<Decision, RecognitionError> {
        let mut best_dist = f32::INFINITY;
        let mut best_idx: Option<usize> = None;

        for (i, identity) in gallery.iter().enumerate() {
            if identity.embedding.len() != probe.len() {
                return Err(RecognitionError::InvalidEmbedding(format!(
                    "probe has {} dims but {:?} has {}",
                    probe.len(),
                    identity.name.as_str(),
                    identity.embedding.len()
                )));
            }

            let dist = probe.euclidean_distance(&identity.embedding);
            // NaN would never win a `<` comparison and silently skew the argmin.
            if dist.is_nan() {
                return Err(RecognitionError::InvalidEmbedding(format!(
                    "distance to {:?} is NaN",
                    identity.name.as_str()
                )));
            }

            if best_idx.is_none() || dist < best_dist {
                best_dist = dist;
                best_idx = Some(i);
            }
        }

        let decision = match best_idx {
            Some(idx) if best_dist < threshold => Decision::Recognized {
                name: gallery[idx].name.to_string(),
                distance: best_dist,
            },
            _ => Decision::Unknown { distance: best_dist },
        };

        tracing::debug!(
            candidates = gallery.len(),
            distance = best_dist,
            threshold,
            decision = ?decision.name(),
            "matched probe"
        );

        Ok(decision)
    }
}
