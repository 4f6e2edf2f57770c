//! Column packing for a single day.
//!
//! The day is quantized into fixed atoms; each occurrence covers a run of
//! atoms and is assigned the first column free across that run. Widths are
//! uniform within a cluster of transitively overlapping occurrences, so
//! concurrent occurrences tile the column width exactly and never collide.

use chrono::{DateTime, NaiveDate, NaiveTime, Utc};

use tempo_calendar::EventOccurrence;

/// Hour marks drawn down a day column.
pub const DAY_MARKS: usize = 24;

/// Quantization step for overlap detection, in minutes.
pub const SLOT_MINUTES: usize = 15;

/// Atoms in one day.
pub const ATOMS_PER_DAY: usize = DAY_MARKS * 60 / SLOT_MINUTES;

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Geometry for one occurrence, as percentages of the day column.
#[derive(Debug, Clone, PartialEq)]
pub struct Placement {
    pub top: f64,
    pub left: f64,
    pub width: f64,
    pub height: f64,
    /// How many atoms the occurrence spans; used to pick a compact or
    /// stacked label layout.
    pub atom_span: usize,
}

/// Fraction of its day that has elapsed at `timestamp` (for the
/// current-time indicator).
pub fn day_fraction(timestamp: DateTime<Utc>) -> f64 {
    let midnight = timestamp
        .date_naive()
        .and_time(NaiveTime::MIN)
        .and_utc();
    (timestamp - midnight).num_seconds() as f64 / SECONDS_PER_DAY
}

/// Compute non-overlapping geometry for all occurrences of `day`, one
/// result per input, in input order. Ties in start time keep input order.
///
/// Every occurrence must end after it starts; an occurrence running past
/// midnight is clipped to the end of the day.
pub fn place(day: NaiveDate, occurrences: &[EventOccurrence]) -> Vec<Placement> {
    let day_start = day.and_time(NaiveTime::MIN).and_utc();

    // Atom span covered by each occurrence, clipped to the day.
    let spans: Vec<(usize, usize)> = occurrences
        .iter()
        .map(|occurrence| {
            assert!(
                occurrence.data.end > occurrence.data.start,
                "occurrence must end after it starts"
            );
            let start_frac =
                (occurrence.data.start - day_start).num_seconds() as f64 / SECONDS_PER_DAY;
            let start_atom = ((start_frac * ATOMS_PER_DAY as f64).floor() as i64)
                .clamp(0, ATOMS_PER_DAY as i64 - 1) as usize;

            let end_atom = if occurrence.data.end.date_naive() > day {
                ATOMS_PER_DAY
            } else {
                let end_frac =
                    (occurrence.data.end - day_start).num_seconds() as f64 / SECONDS_PER_DAY;
                (((end_frac * ATOMS_PER_DAY as f64).ceil() as i64)
                    .clamp(start_atom as i64 + 1, ATOMS_PER_DAY as i64)) as usize
            };
            (start_atom, end_atom)
        })
        .collect();

    // Which occurrences cover each atom, in input order.
    let mut atoms: Vec<Vec<usize>> = vec![Vec::new(); ATOMS_PER_DAY];
    for (index, &(start, end)) in spans.iter().enumerate() {
        for atom in &mut atoms[start..end] {
            atom.push(index);
        }
    }

    // First column free across the occurrence's whole span.
    let mut columns = vec![0usize; spans.len()];
    for (index, &(start, end)) in spans.iter().enumerate() {
        let mut taken = [false; 64];
        for (other, &(other_start, other_end)) in spans.iter().enumerate().take(index) {
            if other_start < end && start < other_end {
                let column = columns[other];
                if column < taken.len() {
                    taken[column] = true;
                }
            }
        }
        columns[index] = taken.iter().position(|used| !used).unwrap_or(0);
    }

    // Widest point of each atom, counting assigned columns.
    let atom_width = |atom: &Vec<usize>| -> usize {
        atom.iter().map(|&index| columns[index] + 1).max().unwrap_or(0)
    };

    // Occurrences chained by shared atoms form a cluster; every member
    // shares the cluster's column count so the columns tile exactly.
    let mut cluster_of = vec![0usize; spans.len()];
    let mut cluster_fraction: Vec<usize> = Vec::new();
    let mut order: Vec<usize> = (0..spans.len()).collect();
    order.sort_by_key(|&index| (spans[index].0, index));
    let mut cluster_end = 0usize;
    for &index in &order {
        let (start, end) = spans[index];
        if cluster_fraction.is_empty() || start >= cluster_end {
            cluster_fraction.push(0);
            cluster_end = end;
        } else {
            cluster_end = cluster_end.max(end);
        }
        cluster_of[index] = cluster_fraction.len() - 1;
    }
    for (index, &(start, end)) in spans.iter().enumerate() {
        let widest = atoms[start..end].iter().map(atom_width).max().unwrap_or(0);
        let cluster = cluster_of[index];
        cluster_fraction[cluster] = cluster_fraction[cluster].max(widest);
    }

    spans
        .iter()
        .enumerate()
        .map(|(index, &(start, end))| {
            let fraction = cluster_fraction[cluster_of[index]].max(1);
            Placement {
                top: start as f64 / ATOMS_PER_DAY as f64 * 100.0,
                left: columns[index] as f64 / fraction as f64 * 100.0,
                width: 1.0 / fraction as f64 * 100.0,
                height: (end - start) as f64 / ATOMS_PER_DAY as f64 * 100.0,
                atom_span: end - start,
            }
        })
        .collect()
}
