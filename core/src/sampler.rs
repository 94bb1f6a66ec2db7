//! Temporal stratification: bucket candidates by decade and select a fixed
//! total with proportional-with-remainder allocation.

use crate::filter;
use crate::record::{ImageRecord, DEFAULT_YEAR};
use std::collections::BTreeMap;

/// A record paired with its extracted acquisition year, if any.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub record: ImageRecord,
    pub year: Option<u32>,
}

/// Groups records into decade buckets, keyed ascending. Records without an
/// extractable year fall into the default year's decade; bucket order within
/// a decade preserves API list order.
pub fn bucket_by_decade(records: Vec<ImageRecord>) -> BTreeMap<u32, Vec<Candidate>> {
    let mut buckets: BTreeMap<u32, Vec<Candidate>> = BTreeMap::new();
    for record in records {
        let year = filter::extract_year(&record);
        let decade = filter::decade_of(year.unwrap_or(DEFAULT_YEAR));
        buckets.entry(decade).or_default().push(Candidate { record, year });
    }
    buckets
}

/// Selects up to `target` items across buckets: each bucket gets
/// `floor(target / buckets)`, the first `target % buckets` buckets in
/// ascending key order get one extra, and each contributes from the front of
/// its sequence. The result is truncated to `target`.
pub fn select_stratified<T>(buckets: BTreeMap<u32, Vec<T>>, target: usize) -> Vec<T> {
    if buckets.is_empty() || target == 0 {
        return Vec::new();
    }

    let bucket_count = buckets.len();
    let base = target / bucket_count;
    let remainder = target % bucket_count;

    let mut selected = Vec::new();
    for (index, (_, items)) in buckets.into_iter().enumerate() {
        let extra = usize::from(index < remainder);
        let take = (base + extra).min(items.len());
        selected.extend(items.into_iter().take(take));
    }

    selected.truncate(target);
    selected
}
