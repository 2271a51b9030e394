//! Table calculation for Draftsmith.
//!
//! Tables in a template may carry labelled totals rows ("Total", "Average",
//! "Difference") in their first column, or labelled totals columns in their
//! last row. This crate finds those labels, computes the labelled cells from
//! the numeric cells along the other axis, and writes the results back in the
//! operands' number format.
//!
//! Processing is idempotent: running it twice leaves the document unchanged
//! after the first pass.

mod calculator;
mod detect;
mod number;
mod vocabulary;

pub use calculator::{
    CalculatorOptions, TableCalculator, TableOutcome, TableReport, compute, process_tables,
};
pub use detect::{Axis, CalculationTarget, CellComputation, Coord, Detection, TableCell, detect_targets};
pub use number::{FormatHint, NumberFormat, ParsedNumber, parse_number, render_number, vote_format};
pub use vocabulary::{LabelMatcher, Operation, Vocabulary, normalize_label};
