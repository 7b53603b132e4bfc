//! Component H: the classifier. Uses the feature pipeline (C) across many
//! classes and aggregates per-feature evidence with a confidence-factor
//! weighted Bayesian update (§4.8).

use tracing::instrument;

use crate::bucket::Find;
use crate::class::Class;
use crate::config::{APriori, EngineConfig};
use crate::error::{OsbfError, Result};
use crate::features::features;
use crate::tokenizer::tokenize;

/// Smallest probability mass any class is clamped to, per §4.8 step 6
/// (`OSBF_SMALLP = 10 * DBL_MIN`).
const SMALLP: f64 = 10.0 * f64::MIN_POSITIVE;

/// Upper bound on the number of classes a single call may classify
/// against (§7's `InvalidInput`: "too many classes").
const MAX_CLASSES: usize = 128;

/// Result of a classify call: posterior probability mass per class
/// (`ptc`, sums to 1) and each class's `learnings` snapshotted at entry
/// (`ptt`).
#[derive(Debug, Clone, PartialEq)]
pub struct ClassifyResult {
    pub ptc: Vec<f64>,
    pub ptt: Vec<u32>,
}

/// Classifies `text` against `classes`, each of which must be open at
/// least `ReadOnly`.
#[instrument(skip(classes, config, text, delims), fields(num_classes = classes.len()))]
pub fn classify(
    classes: &mut [&mut Class],
    config: &EngineConfig,
    text: &[u8],
    delims: &[u8],
) -> Result<ClassifyResult> {
    if text.is_empty() {
        return Err(OsbfError::InvalidInput("empty text".into()));
    }
    let m = classes.len();
    if m == 0 {
        return Err(OsbfError::InvalidInput("no classes provided".into()));
    }
    if m > MAX_CLASSES {
        return Err(OsbfError::InvalidInput(format!(
            "too many classes: {m} exceeds the limit of {MAX_CLASSES}"
        )));
    }

    for c in classes.iter_mut() {
        c.clear_flags();
    }

    let ptt: Vec<u32> = classes.iter().map(|c| c.header.learnings).collect();
    let local_learnings: Vec<f64> = ptt.iter().map(|&l| l.max(1) as f64).collect();

    let mut a = Vec::with_capacity(m);
    for c in classes.iter() {
        let v = match config.a_priori {
            APriori::Learnings => c.header.learnings as f64,
            APriori::Classifications => c.header.classifications as f64,
            APriori::Mistakes => c.header.false_negatives as f64,
            APriori::Instances => {
                if c.header.db_version < 6 {
                    return Err(OsbfError::InvalidInput(
                        "a_priori = instances requires a v6/v7-sourced class".into(),
                    ));
                }
                c.header.instances() as f64
            }
        };
        a.push(v);
    }
    let a_sum: f64 = a.iter().sum();
    let mut ptc: Vec<f64> = if a_sum > 0.0 {
        a.iter().map(|v| v / a_sum).collect()
    } else {
        vec![1.0 / m as f64; m]
    };

    let total_learnings: u64 = classes.iter().map(|c| c.header.learnings as u64).sum();
    let weights = crate::features::feature_weights(total_learnings);

    let token_hashes = tokenize(
        text,
        delims,
        config.limit_token_size,
        config.max_token_size,
        config.max_long_tokens,
    );
    let feats = features(&token_hashes);
    let mut any_scored = false;

    for feat in feats {
        let mut hit = vec![0u32; m];
        let mut already_seen = false;

        for (j, c) in classes.iter_mut().enumerate() {
            let mut table = c.table();
            if let Find::Found(i) = table.find(feat.h1, feat.h2) {
                if table.is_locked(i) {
                    already_seen = true;
                }
                hit[j] = table.buckets[i].count.get();
                table.set_lock(i);
            }
        }
        if already_seen {
            continue;
        }

        let p: Vec<f64> = (0..m).map(|j| hit[j] as f64 / local_learnings[j]).collect();
        let mut jmin = 0;
        let mut jmax = 0;
        for j in 0..m {
            if p[j] <= p[jmin] {
                jmin = j;
            }
            if p[j] >= p[jmax] {
                jmax = j;
            }
        }
        let p_min = p[jmin];
        let p_max = p[jmax];
        if p_max == p_min {
            continue;
        }
        if p_min > 0.0 && p_max / p_min < config.min_pmax_pmin_ratio {
            continue;
        }

        let lrn_min = local_learnings[jmin];
        let lrn_max = local_learnings[jmax];
        let (h_min, h_max) = if lrn_min < lrn_max {
            (hit[jmin] as f64 * (lrn_max / lrn_min), hit[jmax] as f64)
        } else if lrn_max < lrn_min {
            (hit[jmin] as f64, hit[jmax] as f64 * (lrn_min / lrn_max))
        } else {
            (hit[jmin] as f64, hit[jmax] as f64)
        };

        let s = h_max + h_min;
        if s == 0.0 {
            continue;
        }
        let delta = (h_max - h_min).abs();
        let w = weights[feat.k];
        let cfx = (0.8 + (lrn_min + lrn_max) / 20.0).min(1.0);
        let cf = cfx * ((delta * delta - config.k1 / s) / (s * s)).powi(2)
            / (1.0 + config.k3 / (s * w));

        any_scored = true;
        let inv_m = 1.0 / m as f64;
        for j in 0..m {
            ptc[j] *= inv_m + cf * (p[j] - inv_m);
            if ptc[j] < SMALLP {
                ptc[j] = SMALLP;
            }
        }
        renormalize(&mut ptc);
    }

    if !any_scored {
        renormalize(&mut ptc);
    }

    let sum: f64 = ptc.iter().sum();
    if !(0.999_999..=1.000_001).contains(&sum) {
        return Err(OsbfError::InvalidInput(
            "classifier probabilities failed the sum-to-1 sanity check".into(),
        ));
    }

    Ok(ClassifyResult { ptc, ptt })
}

fn renormalize(ptc: &mut [f64]) {
    let sum: f64 = ptc.iter().sum();
    if sum > 0.0 {
        for v in ptc.iter_mut() {
            *v /= sum;
        }
    }
}
