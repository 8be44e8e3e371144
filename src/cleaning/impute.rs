use super::NormalizedPosting;
use std::collections::HashMap;
use tracing::debug;

/// Median with interpolation for even-length input.
fn median(mut values: Vec<f64>) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_by(|a, b| a.partial_cmp(b).expect("salary spreads are finite"));
    let mid = values.len() / 2;
    if values.len() % 2 == 1 {
        Some(values[mid])
    } else {
        Some((values[mid - 1] + values[mid]) / 2.0)
    }
}

/// Learn the typical gap between salary bounds per source, from records where
/// both bounds are present.
pub fn learn_spreads(postings: &[NormalizedPosting]) -> HashMap<String, f64> {
    let mut by_source: HashMap<String, Vec<f64>> = HashMap::new();
    for posting in postings {
        if let (Some(min), Some(max)) = (posting.salary_min, posting.salary_max) {
            by_source
                .entry(posting.source.clone())
                .or_default()
                .push(max - min);
        }
    }

    by_source
        .into_iter()
        .filter_map(|(source, spreads)| median(spreads).map(|m| (source, m)))
        .collect()
}

/// Fill a missing `salary_max` from the source's learned spread. A learned
/// spread of exactly zero pins max to min; a source with no two-bounded
/// records falls back to `default_spread`. Records missing both bounds pass
/// through untouched. Returns the number of imputed records.
pub fn impute_missing_max(postings: &mut [NormalizedPosting], default_spread: f64) -> usize {
    let spreads = learn_spreads(postings);
    debug!(sources = spreads.len(), "learned salary spreads");

    let mut imputed = 0;
    for posting in postings.iter_mut() {
        let min = match (posting.salary_min, posting.salary_max) {
            (Some(min), None) => min,
            _ => continue,
        };
        let spread = spreads
            .get(&posting.source)
            .copied()
            .unwrap_or(default_spread);
        posting.salary_max = if spread == 0.0 {
            Some(min)
        } else {
            Some(min + spread)
        };
        imputed += 1;
    }

    imputed
}
