use crate::config::ConfigError;

/// Why a derived probability was pulled back into `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clamp {
    /// The target rate is unreachable: every eligible record gets selected.
    AboveOne,
    /// The target rate was negative or not a number.
    BelowZero,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DerivedProbability {
    /// `target_rate / eligible_fraction` before clamping.
    pub raw: f64,
    /// The per-record inclusion probability, always within `[0, 1]`.
    pub value: f64,
    pub clamp: Option<Clamp>,
}

/// Inflate `target_rate` by the share of the population that is eligible at all.
///
/// If only `eligible_fraction` of records can be selected, each of them must be
/// drawn with probability `target_rate / eligible_fraction` for the overall rate
/// to land on `target_rate`. Clamping is a warning, not an error.
pub fn derive_probability(
    target_rate: f64,
    eligible_fraction: f64,
) -> Result<DerivedProbability, ConfigError> {
    if !(eligible_fraction > 0.0 && eligible_fraction <= 1.0) {
        return Err(ConfigError::RateOutOfRange {
            name: "estimated_unprotected_ratio",
            value: eligible_fraction,
        });
    }

    let raw = target_rate / eligible_fraction;

    let derived = if raw > 1.0 {
        tracing::warn!(
            raw_probability = raw,
            "derived probability exceeds 100%, capping at 100%: every eligible record will be selected"
        );
        DerivedProbability {
            raw,
            value: 1.0,
            clamp: Some(Clamp::AboveOne),
        }
    } else if raw < 0.0 || raw.is_nan() {
        tracing::warn!(raw_probability = raw, "derived probability below 0%, setting to 0%");
        DerivedProbability {
            raw,
            value: 0.0,
            clamp: Some(Clamp::BelowZero),
        }
    } else {
        DerivedProbability {
            raw,
            value: raw,
            clamp: None,
        }
    };

    debug_assert!((0.0..=1.0).contains(&derived.value));
    Ok(derived)
}
