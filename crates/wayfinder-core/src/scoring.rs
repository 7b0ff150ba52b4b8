use serde::{Deserialize, Serialize};

/// Allowed range of the prompt-length entropy weight.
pub const LENGTH_WEIGHT_RANGE: (f64, f64) = (0.1, 0.6);
/// Allowed range of the keyword entropy weight.
pub const KEYWORD_WEIGHT_RANGE: (f64, f64) = (0.2, 0.6);
/// Allowed range of the history entropy weight.
pub const HISTORY_WEIGHT_RANGE: (f64, f64) = (0.05, 0.4);
/// Allowed range of the visual-input entropy weight.
pub const VISUAL_WEIGHT_RANGE: (f64, f64) = (0.0, 0.3);

const RANGES: [(f64, f64); 4] = [
    LENGTH_WEIGHT_RANGE,
    KEYWORD_WEIGHT_RANGE,
    HISTORY_WEIGHT_RANGE,
    VISUAL_WEIGHT_RANGE,
];

/// Normalized complexity features of a task, each in `[0, 1]`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct EntropyFeatures {
    /// Prompt length, saturating at the scorer's length scale.
    pub length: f64,
    /// Density of complexity keywords.
    pub keyword: f64,
    /// Conversation history depth.
    pub history: f64,
    /// `1.0` when the task carries images.
    pub visual: f64,
}

impl EntropyFeatures {
    /// Features as an array in `[length, keyword, history, visual]` order.
    pub fn as_array(&self) -> [f64; 4] {
        [self.length, self.keyword, self.history, self.visual]
    }
}

/// Contribution of each feature to the entropy estimate. Sums to 1.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EntropyWeights {
    /// Weight of the length feature.
    pub length: f64,
    /// Weight of the keyword feature.
    pub keyword: f64,
    /// Weight of the history feature.
    pub history: f64,
    /// Weight of the visual feature.
    pub visual: f64,
}

impl Default for EntropyWeights {
    fn default() -> Self {
        Self {
            length: 0.3,
            keyword: 0.4,
            history: 0.2,
            visual: 0.1,
        }
    }
}

impl EntropyWeights {
    /// Weights as an array in `[length, keyword, history, visual]` order.
    pub fn as_array(&self) -> [f64; 4] {
        [self.length, self.keyword, self.history, self.visual]
    }

    fn from_array(values: [f64; 4]) -> Self {
        Self {
            length: values[0],
            keyword: values[1],
            history: values[2],
            visual: values[3],
        }
    }

    /// Sum of the four weights.
    pub fn sum(&self) -> f64 {
        self.as_array().iter().sum()
    }

    /// Weighted entropy estimate for `features`, clamped to `[0, 1]`.
    pub fn estimate(&self, features: &EntropyFeatures) -> f64 {
        let estimate: f64 = self
            .as_array()
            .iter()
            .zip(features.as_array())
            .map(|(w, f)| w * f)
            .sum();
        crate::clamp_finite(estimate, 0.0, 1.0)
    }

    /// Project onto the weights that sum to 1 with every weight inside its
    /// allowed range.
    ///
    /// Finds the shift `tau` such that `sum(clamp(w_i + tau)) == 1` by
    /// bisection, which keeps the relative order of the raw weights. Any
    /// non-finite weight resets the whole set to the defaults.
    pub fn projected(&self) -> Self {
        let raw = self.as_array();
        if raw.iter().any(|w| !w.is_finite()) {
            return Self::default();
        }

        let shifted = |tau: f64| -> [f64; 4] {
            let mut out = [0.0; 4];
            for (i, (w, (lo, hi))) in raw.iter().zip(RANGES).enumerate() {
                out[i] = (w + tau).clamp(lo, hi);
            }
            out
        };

        // At `low` every weight sits on its lower bound (sum 0.35), at `high`
        // on its upper bound (sum 1.9).
        let mut low = raw
            .iter()
            .zip(RANGES)
            .map(|(w, (lo, _))| lo - w)
            .fold(f64::INFINITY, f64::min);
        let mut high = raw
            .iter()
            .zip(RANGES)
            .map(|(w, (_, hi))| hi - w)
            .fold(f64::NEG_INFINITY, f64::max);

        for _ in 0..200 {
            let mid = 0.5 * (low + high);
            let total: f64 = shifted(mid).iter().sum();
            if total < 1.0 {
                low = mid;
            } else {
                high = mid;
            }
        }

        Self::from_array(shifted(0.5 * (low + high)))
    }

    /// Whether every weight lies within its allowed range.
    pub fn within_ranges(&self) -> bool {
        self.as_array()
            .iter()
            .zip(RANGES)
            .all(|(w, (lo, hi))| *w >= lo - 1e-12 && *w <= hi + 1e-12)
    }
}

/// Strategy that turns a task description into entropy features.
///
/// Lexical heuristics are placeholders for a learned model; implement this
/// trait to replace them.
pub trait ComplexityScorer: Send + Sync {
    /// Features for a task whose prompt text is available.
    fn features(&self, prompt: &str, history_len: usize, has_visual: bool) -> EntropyFeatures;

    /// Features for a recorded task where only the prompt length survives.
    fn recorded_features(
        &self,
        prompt_len: usize,
        history_len: usize,
        has_visual: bool,
    ) -> EntropyFeatures;
}

const DEFAULT_KEYWORDS: &[&str] = &[
    "analyze",
    "analysis",
    "compare",
    "design",
    "architecture",
    "implement",
    "optimize",
    "debug",
    "prove",
    "evaluate",
    "research",
    "explain",
    "refactor",
    "algorithm",
    "tradeoff",
    "strategy",
];

/// Default keyword-and-length scorer.
#[derive(Debug, Clone)]
pub struct LexicalScorer {
    keywords: Vec<String>,
    /// Prompt length (chars) at which the length feature saturates.
    pub length_scale: f64,
    /// Distinct keyword hits at which the keyword feature saturates.
    pub keyword_saturation: f64,
    /// History length at which the history feature saturates.
    pub history_scale: f64,
    /// Keyword feature assumed for recorded tasks that carry no text.
    pub keyword_proxy: f64,
}

impl LexicalScorer {
    /// Scorer with the built-in keyword list.
    pub fn new() -> Self {
        Self::with_keywords(DEFAULT_KEYWORDS.iter().map(|k| (*k).to_string()).collect())
    }

    /// Scorer with a custom keyword list (matched case-insensitively).
    pub fn with_keywords(keywords: Vec<String>) -> Self {
        Self {
            keywords: keywords.into_iter().map(|k| k.to_lowercase()).collect(),
            length_scale: 2000.0,
            keyword_saturation: 5.0,
            history_scale: 10.0,
            keyword_proxy: 0.5,
        }
    }

    /// Override the keyword proxy used for recorded tasks.
    pub fn with_keyword_proxy(mut self, proxy: f64) -> Self {
        self.keyword_proxy = crate::clamp_finite(proxy, 0.0, 1.0);
        self
    }

    fn ratio(value: f64, scale: f64) -> f64 {
        (value / scale.max(1.0)).min(1.0)
    }
}

impl Default for LexicalScorer {
    fn default() -> Self {
        Self::new()
    }
}

/// Tokenize text into lowercase words, filtering tokens with length <= 1.
fn tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !c.is_alphanumeric())
        .map(str::to_lowercase)
        .filter(|w| w.len() > 1)
        .collect()
}

impl ComplexityScorer for LexicalScorer {
    fn features(&self, prompt: &str, history_len: usize, has_visual: bool) -> EntropyFeatures {
        let tokens = tokenize(prompt);
        let hits = self
            .keywords
            .iter()
            .filter(|k| tokens.iter().any(|t| t == *k))
            .count();

        EntropyFeatures {
            length: Self::ratio(prompt.chars().count() as f64, self.length_scale),
            keyword: Self::ratio(hits as f64, self.keyword_saturation),
            history: Self::ratio(history_len as f64, self.history_scale),
            visual: if has_visual { 1.0 } else { 0.0 },
        }
    }

    fn recorded_features(
        &self,
        prompt_len: usize,
        history_len: usize,
        has_visual: bool,
    ) -> EntropyFeatures {
        EntropyFeatures {
            length: Self::ratio(prompt_len as f64, self.length_scale),
            keyword: self.keyword_proxy,
            history: Self::ratio(history_len as f64, self.history_scale),
            visual: if has_visual { 1.0 } else { 0.0 },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_weights_are_valid() {
        let weights = EntropyWeights::default();
        assert!((weights.sum() - 1.0).abs() < 1e-12);
        assert!(weights.within_ranges());
    }

    #[test]
    fn test_projection_restores_sum_and_ranges() {
        let weights = EntropyWeights {
            length: 0.9,
            keyword: 0.05,
            history: 0.7,
            visual: 0.5,
        }
        .projected();
        assert!((weights.sum() - 1.0).abs() < 1e-9);
        assert!(weights.within_ranges());
    }

    #[test]
    fn test_projection_keeps_valid_weights() {
        let weights = EntropyWeights::default();
        let projected = weights.projected();
        assert!((projected.length - weights.length).abs() < 1e-9);
        assert!((projected.visual - weights.visual).abs() < 1e-9);
    }

    #[test]
    fn test_projection_resets_non_finite() {
        let weights = EntropyWeights {
            length: f64::NAN,
            keyword: 0.4,
            history: 0.2,
            visual: 0.1,
        };
        assert_eq!(weights.projected(), EntropyWeights::default());
    }

    #[test]
    fn test_projection_handles_large_values() {
        let weights = EntropyWeights {
            length: 50.0,
            keyword: -20.0,
            history: 3.0,
            visual: 1e6,
        }
        .projected();
        assert!((weights.sum() - 1.0).abs() < 1e-9);
        assert!(weights.within_ranges());
    }

    #[test]
    fn test_lexical_features() {
        let scorer = LexicalScorer::new();
        let features = scorer.features("Analyze and compare the algorithm design", 5, true);
        assert!((features.keyword - 0.8).abs() < 1e-12);
        assert!((features.history - 0.5).abs() < 1e-12);
        assert_eq!(features.visual, 1.0);
        assert!(features.length > 0.0 && features.length < 0.1);
    }

    #[test]
    fn test_lexical_features_saturate() {
        let scorer = LexicalScorer::new();
        let prompt = "x".repeat(10_000);
        let features = scorer.features(&prompt, 500, false);
        assert_eq!(features.length, 1.0);
        assert_eq!(features.history, 1.0);
        assert_eq!(features.keyword, 0.0);
        assert_eq!(features.visual, 0.0);
    }

    #[test]
    fn test_recorded_features_use_proxy() {
        let scorer = LexicalScorer::new().with_keyword_proxy(0.25);
        let features = scorer.recorded_features(1000, 0, false);
        assert_eq!(features.keyword, 0.25);
        assert!((features.length - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_estimate_is_bounded() {
        let weights = EntropyWeights::default();
        let low = weights.estimate(&EntropyFeatures::default());
        let high = weights.estimate(&EntropyFeatures {
            length: 1.0,
            keyword: 1.0,
            history: 1.0,
            visual: 1.0,
        });
        assert_eq!(low, 0.0);
        assert!((high - 1.0).abs() < 1e-12);
    }
}
