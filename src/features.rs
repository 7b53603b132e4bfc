//! Component C: the feature pipeline. Slides a window of `W` token hashes
//! and derives sparse-bigram `(h1, h2)` features at offsets `1..W`.

use crate::hash::{combine, WINDOW_SENTINEL};

/// Fixed sliding-window length.
pub const WINDOW_LEN: usize = 5;

/// One sparse-bigram feature, tagged with the window offset it was derived
/// at (`1..=WINDOW_LEN-1`) so callers can look up its weight.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Feature {
    pub h1: u32,
    pub h2: u32,
    pub k: usize,
}

/// Produces the sparse-bigram feature stream for a sequence of token
/// hashes. Primed with `WINDOW_SENTINEL` and padded with `WINDOW_LEN - 1`
/// more sentinel shifts at the end, so the final real token still
/// contributes its full set of bigrams.
pub fn features(token_hashes: &[u32]) -> Vec<Feature> {
    let mut window = [WINDOW_SENTINEL; WINDOW_LEN];
    let mut out = Vec::with_capacity(token_hashes.len() * (WINDOW_LEN - 1));

    let mut push_features = |window: &[u32; WINDOW_LEN], out: &mut Vec<Feature>| {
        for k in 1..WINDOW_LEN {
            let (h1, h2) = combine(window[0], window[k], k);
            out.push(Feature { h1, h2, k });
        }
    };

    let shift = |window: &mut [u32; WINDOW_LEN], next: u32| {
        for i in (1..WINDOW_LEN).rev() {
            window[i] = window[i - 1];
        }
        window[0] = next;
    };

    for &h in token_hashes {
        shift(&mut window, h);
        push_features(&window, &mut out);
    }
    for _ in 0..WINDOW_LEN - 1 {
        shift(&mut window, WINDOW_SENTINEL);
        push_features(&window, &mut out);
    }
    out
}

/// Default feature weights, indexed by window offset `k` (`1..=4`),
/// index `0` unused.
pub const DEFAULT_FEATURE_WEIGHT: [f64; 6] = [0.0, 3125.0, 256.0, 27.0, 4.0, 1.0];

/// Feature weight table for a given total-learnings figure across all
/// active classes, per §4.3.
///
/// `w[1..=4]` are recomputed as `x^x` with `x = exponent * (6 - k) / 5`,
/// only while the table has seen few enough learnings that
/// `exponent = (3 * total_learnings)^0.2` is still below 5. Once a class
/// has accumulated enough learnings to push the exponent to 5 or above,
/// the defaults are used for every offset.
pub fn feature_weights(total_learnings: u64) -> [f64; 6] {
    let mut w = DEFAULT_FEATURE_WEIGHT;
    let exponent = (3.0 * total_learnings as f64).powf(0.2);
    if exponent < 5.0 {
        for k in 1..=4usize {
            let x = exponent * (6 - k) as f64 / 5.0;
            w[k] = x.powf(x);
        }
    }
    w
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_token_produces_a_shift_per_token_plus_padding_worth_of_features() {
        // Every shift (the real token's, and each of the W-1 end-of-stream
        // padding shifts) emits W-1 features, per the reference hashpipe
        // loop: one real token still drives W-1 further padding shifts so
        // it contributes bigrams at every offset before it drops out of
        // the window.
        let feats = features(&[42]);
        assert_eq!(feats.len(), WINDOW_LEN * (WINDOW_LEN - 1));
    }

    #[test]
    fn n_tokens_scale_the_same_way() {
        let feats = features(&[1, 2, 3]);
        assert_eq!(feats.len(), (3 + WINDOW_LEN - 1) * (WINDOW_LEN - 1));
    }

    #[test]
    fn empty_token_stream_still_emits_padding_features() {
        // Even with no real tokens, the W-1 end-of-stream padding shifts
        // still run (over all-sentinel window contents).
        assert_eq!(features(&[]).len(), (WINDOW_LEN - 1) * (WINDOW_LEN - 1));
    }

    #[test]
    fn offsets_cover_one_through_window_len_minus_one() {
        let feats = features(&[7]);
        let mut ks: Vec<usize> = feats.iter().map(|f| f.k).collect();
        ks.sort_unstable();
        ks.dedup();
        assert_eq!(ks, vec![1, 2, 3, 4]);
    }

    #[test]
    fn high_learnings_uses_default_weight_table_throughout() {
        // exponent = (3 * 1_000_000)^0.2 is well above 5, so no override fires.
        assert_eq!(feature_weights(1_000_000), DEFAULT_FEATURE_WEIGHT);
    }

    #[test]
    fn low_learnings_overrides_w1_through_w4() {
        let w = feature_weights(10);
        assert_ne!(w[1], DEFAULT_FEATURE_WEIGHT[1]);
        assert_ne!(w[2], DEFAULT_FEATURE_WEIGHT[2]);
        assert_ne!(w[3], DEFAULT_FEATURE_WEIGHT[3]);
        assert_ne!(w[4], DEFAULT_FEATURE_WEIGHT[4]);
    }

    #[test]
    fn low_learnings_weights_decrease_with_offset() {
        let w = feature_weights(10);
        assert!(w[1] > w[2]);
        assert!(w[2] > w[3]);
        assert!(w[3] > w[4]);
    }
}
