use crate::config::TimingConfig;
use crate::types::Interval;

/// Seamless timing pass over an ordered interval list.
///
/// For each adjacent pair `(i, i + 1)`:
/// 1. a gap of at most `bridge_threshold` is closed by extending `i`;
/// 2. an overlap is removed by pulling `i`'s end back to the next start;
/// 3. `i` is stretched to `min_duration` if it is shorter. The stretch may
///    overlap the next interval; that overlap is kept. If it instead leaves a
///    gap within the threshold, the gap is closed as in step 1 so a second
///    pass changes nothing.
///
/// The last interval only gets the minimum-duration check. Starts are never
/// moved. Pairs involving an interval without timestamps are skipped.
pub fn bridge_intervals<T: Interval>(mut items: Vec<T>, config: &TimingConfig) -> Vec<T> {
    if items.is_empty() {
        return items;
    }

    for idx in 0..items.len() - 1 {
        let Some((start, end)) = items[idx].bounds() else {
            continue;
        };
        let Some((next_start, _)) = items[idx + 1].bounds() else {
            continue;
        };
        let end = bridge_end(start, end, next_start, config);
        items[idx].set_end(end);
    }

    if let Some(last) = items.last_mut() {
        if let Some((start, end)) = last.bounds() {
            if end - start < config.min_duration {
                last.set_end(start + config.min_duration);
            }
        }
    }

    items
}

fn bridge_end(start: f64, end: f64, next_start: f64, config: &TimingConfig) -> f64 {
    let mut end = end;
    if next_start - end <= config.bridge_threshold {
        end = next_start;
    }
    if end > next_start {
        end = next_start;
    }
    if end - start < config.min_duration {
        end = start + config.min_duration;
        if end < next_start && next_start - end <= config.bridge_threshold {
            end = next_start;
        }
    }
    end
}
