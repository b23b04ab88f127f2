// src/narrative/verbalizer.rs
use log::debug;
use serde::Serialize;

/// Languages the narrative layer is written in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Locale {
    #[default]
    En,
    It,
}

impl Locale {
    /// Resolves tags like `en`, `IT`, `it-IT` or `en_GB` by their primary
    /// language subtag. Anything unrecognized falls back to English.
    pub fn from_tag(tag: &str) -> Self {
        let primary = tag
            .trim()
            .split(|c| c == '-' || c == '_')
            .next()
            .unwrap_or("")
            .to_ascii_lowercase();
        match primary.as_str() {
            "en" => Locale::En,
            "it" => Locale::It,
            _ => {
                debug!("Unsupported locale '{}', falling back to en", tag);
                Locale::default()
            }
        }
    }

    pub fn tag(&self) -> &'static str {
        match self {
            Locale::En => "en",
            Locale::It => "it",
        }
    }
}

/// Certainty bands, lowest first. The boundaries are fixed; only the wording
/// depends on the locale.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Tier {
    Uncertain,
    Possible,
    Probable,
    Likely,
    VeryLikely,
    AlmostCertain,
}

impl Tier {
    pub const ALL: [Tier; 6] = [
        Tier::Uncertain,
        Tier::Possible,
        Tier::Probable,
        Tier::Likely,
        Tier::VeryLikely,
        Tier::AlmostCertain,
    ];

    /// Buckets a probability. Total over all f64: above 1.0 counts as almost
    /// certain, below 0.0 and NaN as uncertain.
    pub fn from_confidence(confidence: f64) -> Self {
        if confidence >= 0.90 {
            Tier::AlmostCertain
        } else if confidence >= 0.80 {
            Tier::VeryLikely
        } else if confidence >= 0.70 {
            Tier::Likely
        } else if confidence >= 0.60 {
            Tier::Probable
        } else if confidence >= 0.50 {
            Tier::Possible
        } else {
            Tier::Uncertain
        }
    }

    pub fn label(&self, locale: Locale) -> &'static str {
        match locale {
            Locale::En => match self {
                Tier::AlmostCertain => "almost certain",
                Tier::VeryLikely => "very likely",
                Tier::Likely => "likely",
                Tier::Probable => "probable",
                Tier::Possible => "possible",
                Tier::Uncertain => "uncertain",
            },
            Locale::It => match self {
                Tier::AlmostCertain => "quasi certamente",
                Tier::VeryLikely => "molto probabilmente",
                Tier::Likely => "probabilmente",
                Tier::Probable => "abbastanza probabilmente",
                Tier::Possible => "forse",
                Tier::Uncertain => "potrebbe essere",
            },
        }
    }
}

/// Confidence in [0, 1] to a localized tier label.
pub fn verbalize(confidence: f64, locale_tag: &str) -> &'static str {
    Tier::from_confidence(confidence).label(Locale::from_tag(locale_tag))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_boundaries() {
        assert_eq!(Tier::from_confidence(0.90), Tier::AlmostCertain);
        assert_eq!(Tier::from_confidence(0.8999), Tier::VeryLikely);
        assert_eq!(Tier::from_confidence(0.80), Tier::VeryLikely);
        assert_eq!(Tier::from_confidence(0.7999), Tier::Likely);
        assert_eq!(Tier::from_confidence(0.70), Tier::Likely);
        assert_eq!(Tier::from_confidence(0.60), Tier::Probable);
        assert_eq!(Tier::from_confidence(0.50), Tier::Possible);
        assert_eq!(Tier::from_confidence(0.4999), Tier::Uncertain);
        assert_eq!(Tier::from_confidence(0.0), Tier::Uncertain);
        assert_eq!(Tier::from_confidence(1.0), Tier::AlmostCertain);
    }

    #[test]
    fn test_out_of_domain_inputs() {
        assert_eq!(Tier::from_confidence(1.5), Tier::AlmostCertain);
        assert_eq!(Tier::from_confidence(-0.1), Tier::Uncertain);
        assert_eq!(Tier::from_confidence(f64::NAN), Tier::Uncertain);
    }

    #[test]
    fn test_monotone_over_unit_interval() {
        let mut previous = Tier::Uncertain;
        for i in 0..=10_000 {
            let tier = Tier::from_confidence(i as f64 / 10_000.0);
            assert!(tier >= previous);
            previous = tier;
        }
        assert_eq!(previous, Tier::AlmostCertain);
    }

    #[test]
    fn test_verbalize_locales() {
        assert_eq!(verbalize(0.95, "en"), "almost certain");
        assert_eq!(verbalize(0.7, "en"), "likely");
        assert_eq!(verbalize(0.85, "it"), "molto probabilmente");
        assert_eq!(verbalize(0.85, "it-IT"), "molto probabilmente");
        assert_eq!(verbalize(0.55, "EN_gb"), "possible");
        assert_eq!(verbalize(0.55, "fr"), "possible");
        assert_eq!(verbalize(0.1, ""), "uncertain");
    }

    #[test]
    fn test_labels_are_distinct_per_locale() {
        for locale in [Locale::En, Locale::It] {
            let mut labels: Vec<&str> = Tier::ALL.iter().map(|t| t.label(locale)).collect();
            labels.sort_unstable();
            labels.dedup();
            assert_eq!(labels.len(), 6);
        }
    }
}
