//! Day-column geometry for Tempo.
//!
//! Turns the occurrences of a single day into non-overlapping rectangles
//! (percentages of the column's extent) for rendering.

pub mod day;

pub use day::{day_fraction, place, Placement, ATOMS_PER_DAY, DAY_MARKS, SLOT_MINUTES};
