//! Component G: the trainer. Uses the feature pipeline (C) and bucket
//! primitives (D) to increment or decrement a single class's counts.

use tracing::instrument;

use crate::bucket::{Find, MAX_COUNT};
use crate::class::Class;
use crate::config::{EngineConfig, Usage};
use crate::error::{OsbfError, Result};
use crate::features::features;
use crate::tokenizer::tokenize;

/// Per-call flags affecting which counters a train call touches (§4.7).
#[derive(Debug, Clone, Copy, Default)]
pub struct TrainFlags {
    /// Counts this call as extra, out-of-band training: bumps
    /// `extra_learnings` instead of `learnings`.
    pub extra_learning: bool,
    /// On a positive-sense call without `extra_learning`, also bumps
    /// `false_negatives` (the message being trained was previously
    /// misclassified as not belonging to this class).
    pub false_negative: bool,
}

/// Trains (`sense > 0`) or unlearns (`sense < 0`) `text` into `class`,
/// which must be open `WriteAll`.
#[instrument(skip(class, config, text, delims), fields(path = %class.path.display(), sense))]
pub fn train(
    class: &mut Class,
    config: &EngineConfig,
    text: &[u8],
    delims: &[u8],
    sense: i32,
    flags: TrainFlags,
) -> Result<()> {
    if !class.usage.is_writable() {
        return Err(OsbfError::Usage(class.usage));
    }

    class.clear_flags();
    let token_hashes = tokenize(
        text,
        delims,
        config.limit_token_size,
        config.max_token_size,
        config.max_long_tokens,
    );
    let feats = features(&token_hashes);
    let d_trig = class.displacement_trigger(config);

    let mut table = class.table();
    for feat in feats {
        match table.find(feat.h1, feat.h2) {
            Find::Full => return Err(OsbfError::FullTable),
            Find::Found(i) => {
                if !table.is_locked(i) {
                    table.update(i, sense as i64);
                }
            }
            Find::Insertable(i) => {
                if sense > 0 {
                    table.insert(
                        i,
                        feat.h1,
                        feat.h2,
                        sense as u32,
                        d_trig,
                        config.stop_after,
                        config.groom_locked,
                    );
                }
            }
        }
    }

    if sense > 0 {
        if flags.extra_learning {
            class.header.extra_learnings = class.header.extra_learnings.saturating_add(1);
        } else {
            class.header.learnings = (class.header.learnings + 1).min(MAX_COUNT);
            if flags.false_negative {
                class.header.false_negatives = class.header.false_negatives.saturating_add(1);
            }
        }
    } else {
        if flags.extra_learning {
            class.header.extra_learnings = class.header.extra_learnings.saturating_sub(1);
        } else {
            class.header.learnings = class.header.learnings.saturating_sub(1);
            if flags.false_negative {
                class.header.false_negatives = class.header.false_negatives.saturating_sub(1);
            }
        }
    }

    Ok(())
}
