use tracing::debug;

use crate::hls::config::VariantPreference;
use crate::hls::playlist::Variant;

/// Picks the variant to download.
///
/// With a resolution preference an exact match wins. Failing that the
/// tallest variant not exceeding the requested height is used, and if none
/// fits, the tallest one overall. A bandwidth cap works the same way on
/// bandwidth. Without preferences the highest bandwidth variant is chosen.
///
/// Returns `None` only for an empty list.
pub fn select_variant<'a>(
    variants: &'a [Variant],
    preference: &VariantPreference,
) -> Option<&'a Variant> {
    if variants.is_empty() {
        return None;
    }

    if let Some(want) = preference.resolution {
        if let Some(exact) = variants.iter().find(|v| v.resolution == Some(want)) {
            debug!(resolution = %want, "Exact resolution match");
            return Some(exact);
        }

        let mut sorted: Vec<&Variant> = variants.iter().collect();
        sorted.sort_by_key(|v| (v.height(), v.bandwidth_or_zero()));

        let fitting = sorted
            .iter()
            .copied()
            .filter(|v| v.resolution.is_some_and(|r| r.height <= want.height))
            .last();
        return fitting.or_else(|| sorted.last().copied());
    }

    if let Some(cap) = preference.max_bandwidth {
        let fitting = variants
            .iter()
            .filter(|v| v.bandwidth_or_zero() <= cap)
            .max_by_key(|v| v.bandwidth_or_zero());
        return fitting.or_else(|| highest_bandwidth(variants));
    }

    highest_bandwidth(variants)
}

fn highest_bandwidth(variants: &[Variant]) -> Option<&Variant> {
    // max_by_key returns the last maximum; ties resolve to the later entry
    variants.iter().max_by_key(|v| v.bandwidth_or_zero())
}
