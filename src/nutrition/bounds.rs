//! Per-record nutrient bounds and their merge across records.

use serde::{Deserialize, Serialize};

use crate::{
    config::NutritionConfig,
    nutrition::database::{PrimaryNutrient, SecondaryNutrient},
};

/// A nutrient estimate: reference value and the range it may take.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NutrientBounds {
    pub value: f64,
    pub min: f64,
    pub max: f64,
}

/// Bounds of a primary-database field.
///
/// Missing bounds fall back to the value. The upper bound is capped unless `field` is the energy
/// field, and a missing value is the midpoint of the capped bounds. Returns `None` when nothing
/// numeric can be derived.
pub fn derive_primary(
    field: &str,
    nutrient: &PrimaryNutrient,
    config: &NutritionConfig,
) -> Option<NutrientBounds> {
    let min = nutrient.min.or(nutrient.value);
    let max = nutrient.max.or(nutrient.value).map(|max| config.cap(field, max));
    let value = match (nutrient.value, min, max) {
        (Some(value), _, _) => value,
        (None, Some(min), Some(max)) => (min + max) / 2.0,
        _ => return None,
    };
    Some(NutrientBounds {
        value,
        min: min.unwrap_or(value),
        max: max.unwrap_or(value),
    })
}

/// Bounds of a secondary-database field: `value ± 2·stdev` when the deviation is a finite
/// number, otherwise the value alone.
pub fn derive_secondary(
    field: &str,
    nutrient: &SecondaryNutrient,
    config: &NutritionConfig,
) -> Option<NutrientBounds> {
    let value = nutrient.value.filter(|v| v.is_finite())?;
    let (min, max) = match nutrient.stdev.filter(|s| s.is_finite()) {
        Some(stdev) => (value - 2.0 * stdev, value + 2.0 * stdev),
        None => (value, value),
    };
    Some(NutrientBounds {
        value,
        min,
        max: config.cap(field, max),
    })
}

/// Merge the bounds several records give for one field: mean of the values, lowest min and
/// highest max. A single contribution is returned unchanged.
pub fn merge_bounds(
    field: &str,
    contributions: &[NutrientBounds],
    config: &NutritionConfig,
) -> Option<NutrientBounds> {
    match contributions {
        [] => None,
        [single] => Some(*single),
        many => {
            let count = many.len() as f64;
            let value = many.iter().map(|b| b.value).sum::<f64>() / count;
            let min = many.iter().map(|b| b.min).fold(f64::INFINITY, f64::min);
            let max = many.iter().map(|b| b.max).fold(f64::NEG_INFINITY, f64::max);
            Some(NutrientBounds {
                value,
                min,
                max: config.cap(field, max),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn primary(value: Option<f64>, min: Option<f64>, max: Option<f64>) -> PrimaryNutrient {
        PrimaryNutrient { value, min, max }
    }

    fn bounds(value: f64, min: f64, max: f64) -> NutrientBounds {
        NutrientBounds { value, min, max }
    }

    #[test]
    fn primary_bounds_fall_back_to_value() {
        let config = NutritionConfig::default();
        assert_eq!(
            derive_primary("fat", &primary(Some(10.0), Some(8.0), Some(12.0)), &config),
            Some(bounds(10.0, 8.0, 12.0))
        );
        assert_eq!(
            derive_primary("fat", &primary(Some(10.0), None, None), &config),
            Some(bounds(10.0, 10.0, 10.0))
        );
    }

    #[test]
    fn primary_value_defaults_to_midpoint() {
        let config = NutritionConfig::default();
        assert_eq!(
            derive_primary("sugars", &primary(None, Some(2.0), Some(6.0)), &config),
            Some(bounds(4.0, 2.0, 6.0))
        );
        assert_eq!(derive_primary("sugars", &primary(None, None, None), &config), None);
    }

    #[test]
    fn midpoint_is_taken_after_capping() {
        let config = NutritionConfig::default();
        assert_eq!(
            derive_primary("fat", &primary(None, Some(90.0), Some(130.0)), &config),
            Some(bounds(95.0, 90.0, 100.0))
        );
        assert_eq!(
            derive_primary("energy-kcal", &primary(None, Some(90.0), Some(130.0)), &config),
            Some(bounds(110.0, 90.0, 130.0))
        );
    }

    #[test]
    fn primary_max_is_capped_except_energy() {
        let config = NutritionConfig::default();
        assert_eq!(
            derive_primary("fat", &primary(Some(99.0), None, Some(104.0)), &config)
                .unwrap()
                .max,
            100.0
        );
        assert_eq!(
            derive_primary("energy-kcal", &primary(Some(880.0), None, Some(900.0)), &config)
                .unwrap()
                .max,
            900.0
        );
    }

    #[test]
    fn secondary_bounds_use_two_deviations() {
        let config = NutritionConfig::default();
        let with_stdev = SecondaryNutrient {
            value: Some(5.0),
            stdev: Some(1.0),
        };
        assert_eq!(
            derive_secondary("fiber", &with_stdev, &config),
            Some(bounds(5.0, 3.0, 7.0))
        );

        for stdev in [Some(f64::NAN), None] {
            let nutrient = SecondaryNutrient {
                value: Some(5.0),
                stdev,
            };
            assert_eq!(
                derive_secondary("fiber", &nutrient, &config),
                Some(bounds(5.0, 5.0, 5.0))
            );
        }
    }

    #[test]
    fn merge_uses_mean_min_max() {
        let config = NutritionConfig::default();
        let merged = merge_bounds(
            "proteins",
            &[bounds(10.0, 8.0, 12.0), bounds(20.0, 18.0, 22.0)],
            &config,
        );
        assert_eq!(merged, Some(bounds(15.0, 8.0, 22.0)));
        assert_eq!(merge_bounds("proteins", &[], &config), None);
    }

    #[test]
    fn single_contribution_is_unchanged() {
        let config = NutritionConfig::default();
        assert_eq!(
            merge_bounds("proteins", &[bounds(10.0, 8.0, 12.0)], &config),
            Some(bounds(10.0, 8.0, 12.0))
        );
    }
}
