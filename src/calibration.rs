//! `ConfidenceCalibrator`: maps a fused score into a [`Confidence`] band
//! under the `balanced` profile (the only profile `load_config` accepts).
//!
//! Two promotion rules can lift medium into high after the base mapping:
//! a clear winner (top score beats the runner-up by a wide margin) and
//! attribute overlap (the top two results share enough query-relevant
//! tokens that the ranking is unambiguous even without a score gap).

use crate::models::Confidence;

const HIGH_THRESHOLD: f32 = 0.75;
const MEDIUM_THRESHOLD: f32 = 0.50;

const HIGH_BASE: f32 = 0.90;
const HIGH_SCALE: f32 = 0.05;
const HIGH_CAP: f32 = 0.99;

const MEDIUM_BASE: f32 = 0.60;
const MEDIUM_SCALE: f32 = 0.30;
const MEDIUM_CAP: f32 = 0.89;

const LOW_FLOOR: f32 = 0.10;

const CLEAR_WINNER_MARGIN: f32 = 0.15;
const ATTRIBUTE_OVERLAP_PROMOTE_THRESHOLD: usize = 2;

/// Band + calibrated probability-like score for one result.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Calibrated {
    pub confidence: Confidence,
    pub calibrated_score: f32,
}

/// Map a single fused score to its base band and calibrated score, ignoring
/// promotion rules (those need the full ranked list).
fn base_calibrate(fused_score: f32) -> Calibrated {
    if fused_score >= HIGH_THRESHOLD {
        let progress = (fused_score - HIGH_THRESHOLD) / (1.0 - HIGH_THRESHOLD);
        Calibrated {
            confidence: Confidence::High,
            calibrated_score: (HIGH_BASE + HIGH_SCALE * progress).min(HIGH_CAP),
        }
    } else if fused_score >= MEDIUM_THRESHOLD {
        let progress = (fused_score - MEDIUM_THRESHOLD) / (HIGH_THRESHOLD - MEDIUM_THRESHOLD);
        Calibrated {
            confidence: Confidence::Medium,
            calibrated_score: (MEDIUM_BASE + MEDIUM_SCALE * progress).min(MEDIUM_CAP),
        }
    } else {
        Calibrated {
            confidence: Confidence::Low,
            calibrated_score: fused_score.max(LOW_FLOOR),
        }
    }
}

/// Calibrate a ranked list of `(fused_score, keyword_overlap_tokens)` pairs,
/// applying clear-winner and attribute-overlap promotion to the top entry.
/// `overlap_tokens` is the count of query-relevant tokens the top two
/// results share — callers typically pass each result's matched keyword set.
pub fn calibrate_ranked(scored: &[(f32, usize)]) -> Vec<Calibrated> {
    let mut out: Vec<Calibrated> = scored.iter().map(|(s, _)| base_calibrate(*s)).collect();

    if scored.len() >= 2 {
        let (top_score, top_overlap) = scored[0];
        let (second_score, _) = scored[1];

        if out[0].confidence == Confidence::Medium {
            let clear_winner = top_score >= MEDIUM_THRESHOLD && (top_score - second_score) >= CLEAR_WINNER_MARGIN;
            let attribute_overlap = top_overlap >= ATTRIBUTE_OVERLAP_PROMOTE_THRESHOLD;
            if clear_winner || attribute_overlap {
                // Promoted scores sit just above the medium band: anchor the
                // high-band progress at the high threshold itself so a
                // promoted 0.50 doesn't read as confidently as a naturally
                // high-scoring 0.95 would.
                let progress = (top_score.max(HIGH_THRESHOLD) - HIGH_THRESHOLD) / (1.0 - HIGH_THRESHOLD);
                out[0] = Calibrated {
                    confidence: Confidence::High,
                    calibrated_score: (HIGH_BASE + HIGH_SCALE * progress).min(HIGH_CAP),
                };
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_base_bands() {
        assert_eq!(base_calibrate(0.9).confidence, Confidence::High);
        assert_eq!(base_calibrate(0.6).confidence, Confidence::Medium);
        assert_eq!(base_calibrate(0.1).confidence, Confidence::Low);
    }

    #[test]
    fn test_scores_are_bounded() {
        for raw in [0.0, 0.3, 0.5, 0.75, 1.0, 2.0] {
            let c = base_calibrate(raw);
            assert!(c.calibrated_score >= LOW_FLOOR);
            assert!(c.calibrated_score <= HIGH_CAP);
        }
    }

    #[test]
    fn test_clear_winner_promotes_medium_to_high() {
        let scored = vec![(0.70, 0), (0.40, 0)];
        let out = calibrate_ranked(&scored);
        assert_eq!(out[0].confidence, Confidence::High);
    }

    #[test]
    fn test_attribute_overlap_promotes_without_score_gap() {
        let scored = vec![(0.55, 2), (0.54, 0)];
        let out = calibrate_ranked(&scored);
        assert_eq!(out[0].confidence, Confidence::High);
    }

    #[test]
    fn test_no_promotion_without_gap_or_overlap() {
        let scored = vec![(0.55, 0), (0.54, 0)];
        let out = calibrate_ranked(&scored);
        assert_eq!(out[0].confidence, Confidence::Medium);
    }

    #[test]
    fn test_monotonic_within_band() {
        let lower = base_calibrate(0.76).calibrated_score;
        let higher = base_calibrate(0.95).calibrated_score;
        assert!(higher >= lower);
    }
}
