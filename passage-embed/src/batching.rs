//! Length-bucketed batch packing.
//!
//! The model server pads every text in a batch to the batch's longest
//! member, so mixing long and short texts wastes compute on padding.
//! Sorting by length descending and packing greedily keeps each batch's
//! waste below [`MAX_WASTE_RATIO`] unless [`MAX_BATCH_SIZE`] forces a cut
//! first.

/// Maximum number of texts per dispatched batch.
pub const MAX_BATCH_SIZE: usize = 50;

/// Maximum tolerated padding-waste ratio per batch.
pub const MAX_WASTE_RATIO: f64 = 0.10;

/// A packed batch: `(original index, text)` pairs, longest first.
pub type Batch = Vec<(usize, String)>;

/// Pack `texts` into batches. Output order within the returned batches is
/// length-descending; callers use the carried original indices to restore
/// input order after encoding.
pub fn pack_batches(texts: &[String]) -> Vec<Batch> {
    let mut indexed: Vec<(usize, &String)> = texts.iter().enumerate().collect();
    indexed.sort_by(|a, b| b.1.len().cmp(&a.1.len()).then(a.0.cmp(&b.0)));

    let mut batches: Vec<Batch> = Vec::new();
    let mut current: Batch = Vec::new();
    let mut current_sum = 0usize;

    for (idx, text) in indexed {
        if !current.is_empty() {
            // The first (longest) item fixes the padded width of the batch.
            let max_len = current[0].1.len().max(1);
            let size = current.len();
            let padded = max_len * (size + 1);
            let waste = (padded.saturating_sub(current_sum + text.len())) as f64 / padded as f64;
            if size >= MAX_BATCH_SIZE || waste > MAX_WASTE_RATIO {
                batches.push(std::mem::take(&mut current));
                current_sum = 0;
            }
        }
        current_sum += text.len();
        current.push((idx, text.clone()));
    }
    if !current.is_empty() {
        batches.push(current);
    }
    batches
}

/// Padding-waste ratio of a finished batch; 0.0 for empty or single-item
/// batches.
pub fn waste_ratio(batch: &Batch) -> f64 {
    if batch.len() < 2 {
        return 0.0;
    }
    let max_len = batch.iter().map(|(_, t)| t.len()).max().unwrap_or(0).max(1);
    let padded = max_len * batch.len();
    let used: usize = batch.iter().map(|(_, t)| t.len()).sum();
    (padded - used) as f64 / padded as f64
}
