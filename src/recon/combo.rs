//! Combo-SKU normalization: bundle SKUs such as `grease-3` or `toothpaste*2` are
//! rewritten to their single-unit SKU with the quantity scaled by the bundle size.

use regex::Regex;

use crate::error::PipelineError;
use crate::recon::profile::ComboPattern;

#[derive(Debug)]
struct CompiledPattern {
    regex: Regex,
    canonical: String,
}

/// Ordered pattern table. The first matching pattern decides; patterns are never combined.
#[derive(Debug, Default)]
pub struct ComboNormalizer {
    patterns: Vec<CompiledPattern>,
}

impl ComboNormalizer {
    pub fn new(patterns: &[ComboPattern]) -> Result<Self, PipelineError> {
        let patterns = patterns
            .iter()
            .map(|p| {
                Regex::new(&p.pattern)
                    .map(|regex| CompiledPattern {
                        regex,
                        canonical: p.canonical.clone(),
                    })
                    .map_err(|source| PipelineError::ComboPattern {
                        pattern: p.pattern.clone(),
                        source,
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { patterns })
    }

    pub fn is_empty(&self) -> bool {
        self.patterns.is_empty()
    }

    /// Returns the canonical SKU and scaled quantity when `sku` is a combo with a
    /// multiplier above one. Multiplier one, or no match, leaves the row alone.
    pub fn normalize(&self, sku: &str, quantity: u64) -> Option<(String, u64)> {
        let sku = sku.trim();
        if sku.is_empty() {
            return None;
        }

        let pattern = self.patterns.iter().find(|p| p.regex.is_match(sku))?;
        let caps = pattern.regex.captures(sku)?;
        let multiplier: u64 = caps.name("mult")?.as_str().parse().ok()?;
        if multiplier <= 1 {
            return None;
        }

        let mut canonical = String::new();
        caps.expand(&pattern.canonical, &mut canonical);
        Some((canonical, quantity.saturating_mul(multiplier)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recon::profile::RegionProfile;

    fn indonesia() -> ComboNormalizer {
        ComboNormalizer::new(&RegionProfile::indonesia().combo_patterns).unwrap()
    }

    #[test]
    fn dash_multiplier_scales_quantity() {
        assert_eq!(
            indonesia().normalize("foo-3", 2),
            Some(("foo-1".to_string(), 6))
        );
    }

    #[test]
    fn star_multiplier_scales_quantity() {
        assert_eq!(
            indonesia().normalize("toothpaste*2", 1),
            Some(("toothpaste*1".to_string(), 2))
        );
    }

    #[test]
    fn multiplier_one_is_untouched() {
        assert_eq!(indonesia().normalize("foo-1", 4), None);
    }

    #[test]
    fn normalizing_twice_is_a_no_op() {
        let normalizer = indonesia();
        let (sku, qty) = normalizer.normalize("grease-2", 3).unwrap();
        assert_eq!(normalizer.normalize(&sku, qty), None);
    }

    #[test]
    fn first_pattern_wins() {
        // Matches the dash pattern first; the star is part of the base.
        assert_eq!(
            indonesia().normalize("kit*2-3", 1),
            Some(("kit*2-1".to_string(), 3))
        );
    }

    #[test]
    fn plain_skus_are_untouched() {
        assert_eq!(indonesia().normalize("shampoo", 2), None);
        assert_eq!(indonesia().normalize("", 2), None);
    }

    #[test]
    fn invalid_pattern_is_reported() {
        let err = ComboNormalizer::new(&[ComboPattern {
            pattern: "(".to_string(),
            canonical: "x".to_string(),
        }])
        .unwrap_err();
        assert!(matches!(err, PipelineError::ComboPattern { .. }));
    }
}
