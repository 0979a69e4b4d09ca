use crate::results::CanonicalResult;
use crate::voting::{Tally, TallyEntry};

pub fn compute_tally(options: &[String], canonical: &CanonicalResult) -> Tally {
    // Zero-vote sessions still need a usable denominator
    let denominator = canonical.total.max(1) as f64;

    // Start from the session's option list so unvoted options still show up
    let mut entries: Vec<TallyEntry> = options
        .iter()
        .map(|option| {
            let count = canonical.count(option);
            TallyEntry {
                option: option.clone(),
                count,
                percentage: round_one_decimal(count as f64 / denominator * 100.0),
            }
        })
        .collect();

    // Stable sort keeps session order among equal counts
    entries.sort_by(|a, b| b.count.cmp(&a.count));

    let (winner, is_tie) = match entries.as_slice() {
        [] => (None, false),
        [only] => (Some(only.option.clone()), false),
        [first, second, ..] => {
            if first.count > second.count {
                (Some(first.option.clone()), false)
            } else {
                (None, true)
            }
        }
    };

    Tally {
        entries,
        winner,
        is_tie,
        total: canonical.total,
    }
}

fn round_one_decimal(value: f64) -> f64 {
    (value * 10.0).round() / 10.0
}
