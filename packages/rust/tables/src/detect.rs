//! Finding calculation targets in a cell grid.
//!
//! A row whose first cell is a label is a totals row: each of its other cells
//! is computed from the cells of its column. A column whose last-row cell is
//! a label is a totals column: each of its other cells is computed from the
//! cells of its row. Where a totals row crosses a totals column, the row wins.

use std::collections::HashSet;

use serde::Serialize;

use draftsmith_shared::Table;

use crate::number::{FormatHint, NumberFormat, parse_number};
use crate::vocabulary::{LabelMatcher, Operation};

/// Zero-based `(row, col)`.
pub type Coord = (usize, usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Axis {
    Row,
    Column,
}

/// One cell, read for calculation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableCell {
    pub raw_text: String,
    pub row: usize,
    pub col: usize,
    /// `None` for non-numeric cells and for calculation labels.
    pub parsed_value: Option<f64>,
    pub format_hint: FormatHint,
    /// Full convention, for numeric cells.
    pub format: Option<NumberFormat>,
}

impl TableCell {
    pub fn read(table: &Table, row: usize, col: usize, is_label: bool) -> Self {
        let raw_text = table.cell(row, col).unwrap_or_default().to_string();
        let parsed = if is_label { None } else { parse_number(&raw_text) };
        Self {
            row,
            col,
            parsed_value: parsed.map(|p| p.value),
            format_hint: parsed.map_or(FormatHint::Plain, |p| p.format.hint),
            format: parsed.map(|p| p.format),
            raw_text,
        }
    }
}

/// A result cell and the cells it is computed from, in axis order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellComputation {
    pub result: Coord,
    pub operand_cells: Vec<Coord>,
}

/// A detected totals row or totals column.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CalculationTarget {
    pub axis: Axis,
    /// The label-carrying row (for [`Axis::Row`]) or column.
    pub index: usize,
    pub operation: Operation,
    pub label: Coord,
    pub computations: Vec<CellComputation>,
}

impl CalculationTarget {
    /// Whether any result cell has something to compute from.
    pub fn has_operand_axis(&self) -> bool {
        self.computations.iter().any(|c| !c.operand_cells.is_empty())
    }
}

/// Targets in execution order (columns first, so totals rows see the
/// freshly computed column cells), plus every label cell.
#[derive(Debug, Clone, Default)]
pub struct Detection {
    pub targets: Vec<CalculationTarget>,
    pub labels: HashSet<Coord>,
}

impl Detection {
    pub fn is_label(&self, cell: Coord) -> bool {
        self.labels.contains(&cell)
    }
}

/// Detect totals rows and columns in a rectangular table.
pub fn detect_targets(table: &Table, matcher: &dyn LabelMatcher) -> Detection {
    let rows = table.row_count();
    let cols = table.column_count();
    if rows == 0 || cols == 0 {
        return Detection::default();
    }
    let last_row = rows - 1;
    let text = |r: usize, c: usize| table.cell(r, c).unwrap_or_default();

    let row_labels: Vec<(usize, Operation)> = (0..rows)
        .filter_map(|r| matcher.matches(text(r, 0)).map(|op| (r, op)))
        .collect();
    let target_rows: HashSet<usize> = row_labels.iter().map(|(r, _)| *r).collect();

    // A first-column cell in the last row is already a row label if it
    // matches; it never doubles as a column label.
    let col_labels: Vec<(usize, Operation)> = (1..cols)
        .filter_map(|c| matcher.matches(text(last_row, c)).map(|op| (c, op)))
        .collect();
    let target_cols: HashSet<usize> = col_labels.iter().map(|(c, _)| *c).collect();

    let labels: HashSet<Coord> = row_labels
        .iter()
        .map(|(r, _)| (*r, 0))
        .chain(col_labels.iter().map(|(c, _)| (last_row, *c)))
        .collect();

    let mut targets = Vec::with_capacity(row_labels.len() + col_labels.len());

    for &(c, operation) in &col_labels {
        let computations = (0..last_row)
            .filter(|r| !target_rows.contains(r))
            .map(|r| CellComputation {
                result: (r, c),
                operand_cells: (1..cols)
                    .filter(|j| *j != c && !target_cols.contains(j))
                    .map(|j| (r, j))
                    .filter(|cell| !labels.contains(cell))
                    .collect(),
            })
            .collect();
        targets.push(CalculationTarget {
            axis: Axis::Column,
            index: c,
            operation,
            label: (last_row, c),
            computations,
        });
    }

    for &(r, operation) in &row_labels {
        let computations = (1..cols)
            .filter(|c| !labels.contains(&(r, *c)))
            .map(|c| CellComputation {
                result: (r, c),
                operand_cells: (0..rows)
                    .filter(|i| *i != r && !target_rows.contains(i))
                    .map(|i| (i, c))
                    .filter(|cell| !labels.contains(cell))
                    .collect(),
            })
            .collect();
        targets.push(CalculationTarget {
            axis: Axis::Row,
            index: r,
            operation,
            label: (r, 0),
            computations,
        });
    }

    Detection { targets, labels }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vocabulary::Vocabulary;

    fn detect(table: &Table) -> Detection {
        detect_targets(table, &Vocabulary::default())
    }

    #[test]
    fn totals_row_reads_columns_above() {
        let table = Table::from_rows([
            ["Item", "Amount"],
            ["A", "$100.00"],
            ["B", "$200.00"],
            ["Total", ""],
        ]);
        let detection = detect(&table);
        assert_eq!(detection.targets.len(), 1);

        let target = &detection.targets[0];
        assert_eq!(target.axis, Axis::Row);
        assert_eq!(target.index, 3);
        assert_eq!(target.operation, Operation::Sum);
        assert_eq!(
            target.computations,
            vec![CellComputation {
                result: (3, 1),
                operand_cells: vec![(0, 1), (1, 1), (2, 1)],
            }]
        );
    }

    #[test]
    fn totals_column_reads_rows() {
        let table = Table::from_rows([
            ["North", "10", "20", ""],
            ["South", "5", "5", ""],
            ["", "", "", "Total"],
        ]);
        let detection = detect(&table);
        assert_eq!(detection.targets.len(), 1);

        let target = &detection.targets[0];
        assert_eq!(target.axis, Axis::Column);
        assert_eq!(target.index, 3);
        assert_eq!(target.computations.len(), 2);
        assert_eq!(target.computations[0].result, (0, 3));
        assert_eq!(target.computations[0].operand_cells, vec![(0, 1), (0, 2)]);
    }

    #[test]
    fn other_target_rows_are_not_operands() {
        let table = Table::from_rows([
            ["A", "1"],
            ["B", "2"],
            ["Total", ""],
            ["Average", ""],
        ]);
        let detection = detect(&table);
        assert_eq!(detection.targets.len(), 2);
        for target in &detection.targets {
            assert_eq!(target.computations[0].operand_cells, vec![(0, 1), (1, 1)]);
        }
    }

    #[test]
    fn row_wins_at_intersection() {
        let table = Table::from_rows([
            ["A", "10", "20", ""],
            ["Total", "", "", ""],
            ["", "", "", "Mean"],
        ]);
        let detection = detect(&table);
        let column = detection
            .targets
            .iter()
            .find(|t| t.axis == Axis::Column)
            .expect("column target");
        let results: Vec<Coord> = column.computations.iter().map(|c| c.result).collect();
        assert_eq!(results, vec![(0, 3)]);

        let row = detection
            .targets
            .iter()
            .find(|t| t.axis == Axis::Row)
            .expect("row target");
        assert!(row.computations.iter().any(|c| c.result == (1, 3)));
        // Column targets run first.
        assert_eq!(detection.targets[0].axis, Axis::Column);
    }

    #[test]
    fn last_row_first_cell_is_only_a_row_label() {
        let table = Table::from_rows([["Item", "Q1"], ["A", "3"], ["Total", ""]]);
        let detection = detect(&table);
        assert!(detection.targets.iter().all(|t| t.axis == Axis::Row));
        assert!(detection.is_label((2, 0)));
    }

    #[test]
    fn lone_label_has_no_operand_axis() {
        let table = Table::from_rows([["Total"]]);
        let detection = detect(&table);
        assert_eq!(detection.targets.len(), 1);
        assert!(!detection.targets[0].has_operand_axis());
    }

    #[test]
    fn label_cells_read_as_non_numeric() {
        let table = Table::from_rows([["Total", "$5"]]);
        let label = TableCell::read(&table, 0, 0, true);
        assert_eq!(label.parsed_value, None);
        let cell = TableCell::read(&table, 0, 1, false);
        assert_eq!(cell.parsed_value, Some(5.0));
        assert_eq!(cell.format_hint, FormatHint::Currency);
        let missing = TableCell::read(&table, 3, 3, false);
        assert_eq!(missing.raw_text, "");
    }
}
