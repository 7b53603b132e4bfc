//! Explicit configuration record threaded through the engine, trainer and
//! classifier, replacing the reference implementation's module-scope tunables.

/// Access level a class is opened with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Usage {
    ReadOnly,
    WriteHeader,
    WriteAll,
}

impl Usage {
    pub fn is_writable(self) -> bool {
        self >= Usage::WriteHeader
    }
}

/// Which header counter to use as a class's prior probability mass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum APriori {
    Learnings,
    /// `classifications + false_negatives - false_positives`. Requires a
    /// v6/v7-sourced class; raises `InvalidInput` against a v5 class.
    Instances,
    Classifications,
    Mistakes,
}

impl Default for APriori {
    fn default() -> Self {
        APriori::Learnings
    }
}

/// Tunables for the bucket table, microgroomer, tokenizer and classifier.
///
/// Mirrors the configuration keys in the external-interfaces table: every
/// field here corresponds to one recognized key.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Override of the displacement trigger `D_trig`. `0` means "compute
    /// automatically from `num_buckets` the first time it is needed".
    pub max_chain: u32,
    /// Max buckets evicted per microgroom pass.
    pub stop_after: u32,
    /// Whether grooming may evict a locked bucket when no unlocked minimum
    /// exists within the walked span.
    pub groom_locked: bool,

    pub k1: f64,
    pub k2: f64,
    pub k3: f64,

    pub limit_token_size: bool,
    pub max_token_size: u32,
    pub max_long_tokens: u32,

    pub p_r_scf: f64,
    pub a_priori: APriori,
    pub min_pmax_pmin_ratio: f64,

    /// Bucket count used by `create` when the caller does not specify one.
    pub default_num_buckets: u32,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            max_chain: 0,
            stop_after: 128,
            groom_locked: true,
            k1: 0.25,
            k2: 12.0,
            k3: 8.0,
            limit_token_size: true,
            max_token_size: 60,
            max_long_tokens: 1000,
            p_r_scf: 1.0,
            a_priori: APriori::Learnings,
            min_pmax_pmin_ratio: 1.0,
            default_num_buckets: 94_321,
        }
    }
}

impl EngineConfig {
    /// `D_trig` for a table of `num_buckets` buckets, honoring `max_chain`
    /// as an override. Callers cache the result for the lifetime of an open
    /// class rather than recomputing it on every insert.
    pub fn displacement_trigger(&self, num_buckets: u32) -> u32 {
        if self.max_chain != 0 {
            return self.max_chain;
        }
        let auto = 14.85 + 1.5e-4 * num_buckets as f64;
        29u32.max(auto.round() as u32)
    }
}
