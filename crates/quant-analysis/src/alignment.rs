use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};

use chrono::NaiveDate;
use pair_core::{PairKey, PriceSeries};

/// Two price series restricted to the dates they share.
///
/// `first` always belongs to `pair.first`, regardless of argument order.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedPair {
    pub pair: PairKey,
    pub dates: Vec<NaiveDate>,
    pub first: Vec<f64>,
    pub second: Vec<f64>,
}

impl AlignedPair {
    pub fn len(&self) -> usize {
        self.dates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.dates.is_empty()
    }

    pub fn start(&self) -> Option<NaiveDate> {
        self.dates.first().copied()
    }

    pub fn end(&self) -> Option<NaiveDate> {
        self.dates.last().copied()
    }

    /// Hash of the dates and both close columns. Equal data gives an equal
    /// digest within one process.
    pub fn digest(&self) -> u64 {
        let mut hasher = DefaultHasher::new();
        self.pair.hash(&mut hasher);
        self.dates.hash(&mut hasher);
        for (x, y) in self.first.iter().zip(&self.second) {
            x.to_bits().hash(&mut hasher);
            y.to_bits().hash(&mut hasher);
        }
        hasher.finish()
    }
}

/// Any number of series restricted to the dates present in all of them.
#[derive(Debug, Clone, PartialEq)]
pub struct AlignedPrices {
    pub symbols: Vec<String>,
    pub dates: Vec<NaiveDate>,
    /// One column per symbol, in `symbols` order.
    pub columns: Vec<Vec<f64>>,
}

pub struct SeriesAligner;

impl SeriesAligner {
    /// Inner join of two series on date. Linear merge; both inputs are already sorted.
    pub fn align_pair(a: &PriceSeries, b: &PriceSeries) -> AlignedPair {
        let pair = PairKey::new(a.symbol(), b.symbol());
        let (first, second) = if pair.first == a.symbol() { (a, b) } else { (b, a) };

        let (pa, pb) = (first.points(), second.points());
        let capacity = pa.len().min(pb.len());
        let mut dates = Vec::with_capacity(capacity);
        let mut xs = Vec::with_capacity(capacity);
        let mut ys = Vec::with_capacity(capacity);

        let (mut i, mut j) = (0, 0);
        while i < pa.len() && j < pb.len() {
            match pa[i].date.cmp(&pb[j].date) {
                std::cmp::Ordering::Less => i += 1,
                std::cmp::Ordering::Greater => j += 1,
                std::cmp::Ordering::Equal => {
                    dates.push(pa[i].date);
                    xs.push(pa[i].close);
                    ys.push(pb[j].close);
                    i += 1;
                    j += 1;
                }
            }
        }

        AlignedPair {
            pair,
            dates,
            first: xs,
            second: ys,
        }
    }

    /// Upper bound on the aligned length without building the aligned vectors:
    /// the fewer of the two series' observations inside their common date range.
    pub fn overlap_upper_bound(a: &PriceSeries, b: &PriceSeries) -> usize {
        let (Some(a0), Some(a1), Some(b0), Some(b1)) =
            (a.first_date(), a.last_date(), b.first_date(), b.last_date())
        else {
            return 0;
        };
        let start = a0.max(b0);
        let end = a1.min(b1);
        if end < start {
            return 0;
        }
        let count_in = |s: &PriceSeries| {
            let pts = s.points();
            let lo = pts.partition_point(|p| p.date < start);
            let hi = pts.partition_point(|p| p.date <= end);
            hi - lo
        };
        count_in(a).min(count_in(b))
    }

    /// Inner join of any number of series. Dates missing from any input are dropped.
    pub fn align(series: &[&PriceSeries]) -> AlignedPrices {
        let symbols: Vec<String> = series.iter().map(|s| s.symbol().to_string()).collect();
        if series.is_empty() {
            return AlignedPrices {
                symbols,
                dates: Vec::new(),
                columns: Vec::new(),
            };
        }

        let mut cursors = vec![0usize; series.len()];
        let mut dates = Vec::new();
        let mut columns: Vec<Vec<f64>> = vec![Vec::new(); series.len()];

        'outer: loop {
            // Latest date among the current heads; every other cursor must catch up to it.
            let mut target = None;
            for (k, s) in series.iter().enumerate() {
                let Some(p) = s.points().get(cursors[k]) else {
                    break 'outer;
                };
                target = Some(target.map_or(p.date, |t: NaiveDate| t.max(p.date)));
            }
            let Some(target) = target else { break };

            let mut all_match = true;
            for (k, s) in series.iter().enumerate() {
                let pts = s.points();
                while cursors[k] < pts.len() && pts[cursors[k]].date < target {
                    cursors[k] += 1;
                }
                match pts.get(cursors[k]) {
                    Some(p) if p.date == target => {}
                    Some(_) => all_match = false,
                    None => break 'outer,
                }
            }

            if all_match {
                dates.push(target);
                for (k, s) in series.iter().enumerate() {
                    columns[k].push(s.points()[cursors[k]].close);
                    cursors[k] += 1;
                }
            }
        }

        AlignedPrices {
            symbols,
            dates,
            columns,
        }
    }
}
