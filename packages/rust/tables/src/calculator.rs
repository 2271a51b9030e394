//! Table calculation: detect targets, compute, write results back.

use tracing::{debug, info, instrument, warn};

use draftsmith_shared::{Document, Result, StructuralWarning, Table, TablesConfig};

use crate::detect::{CalculationTarget, Detection, TableCell, detect_targets};
use crate::number::{parse_number, render_number, vote_format};
use crate::vocabulary::{LabelMatcher, Operation, Vocabulary};

/// Write policy for result cells.
#[derive(Debug, Clone)]
pub struct CalculatorOptions {
    /// Overwrite result cells that already hold a number.
    pub recompute: bool,
    /// Written when an average has nothing to average.
    pub undefined_marker: String,
}

impl Default for CalculatorOptions {
    fn default() -> Self {
        Self::from(&TablesConfig::default())
    }
}

impl From<&TablesConfig> for CalculatorOptions {
    fn from(config: &TablesConfig) -> Self {
        Self {
            recompute: config.recompute,
            undefined_marker: config.undefined_marker.clone(),
        }
    }
}

/// What happened to one table.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableOutcome {
    pub cells_modified: usize,
    /// The table was left untouched as malformed.
    pub skipped: bool,
    pub warnings: Vec<StructuralWarning>,
}

/// Totals across all tables of a document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TableReport {
    pub tables_processed: usize,
    pub tables_skipped: usize,
    pub cells_modified: usize,
    pub warnings: Vec<StructuralWarning>,
}

/// Computes labelled totals, differences and averages in tables.
pub struct TableCalculator {
    matcher: Box<dyn LabelMatcher>,
    options: CalculatorOptions,
}

impl Default for TableCalculator {
    fn default() -> Self {
        Self::new(Vocabulary::default(), CalculatorOptions::default())
    }
}

impl TableCalculator {
    pub fn new(matcher: impl LabelMatcher + 'static, options: CalculatorOptions) -> Self {
        Self {
            matcher: Box::new(matcher),
            options,
        }
    }

    /// Calculator with the configured vocabulary and write policy.
    pub fn from_config(config: &TablesConfig) -> Result<Self> {
        Ok(Self::new(
            Vocabulary::from_config(config)?,
            CalculatorOptions::from(config),
        ))
    }

    /// Process every table in reading order.
    ///
    /// A malformed table is skipped with a warning; the others are still
    /// processed.
    #[instrument(skip_all, fields(blocks = doc.len()))]
    pub fn process_document(&self, doc: &mut Document) -> TableReport {
        let mut report = TableReport::default();

        for (index, (id, table)) in doc.tables_mut().enumerate() {
            debug!(table = index, block = %id, "processing table");
            let outcome = self.process(table, index);

            report.tables_processed += 1;
            if outcome.skipped {
                report.tables_skipped += 1;
            }
            report.cells_modified += outcome.cells_modified;
            report.warnings.extend(outcome.warnings);
        }

        info!(
            tables = report.tables_processed,
            skipped = report.tables_skipped,
            cells_modified = report.cells_modified,
            "table calculation complete"
        );
        report
    }

    /// Process one table in place. `index` only labels warnings.
    pub fn process(&self, table: &mut Table, index: usize) -> TableOutcome {
        let mut outcome = TableOutcome::default();
        if table.row_count() == 0 {
            return outcome;
        }

        if !table.is_rectangular() {
            return skip(index, "rows have inconsistent cell counts".into());
        }

        let detection = detect_targets(table, self.matcher.as_ref());
        if let Some(target) = detection.targets.iter().find(|t| !t.has_operand_axis()) {
            let (row, col) = target.label;
            let label = table.cell(row, col).unwrap_or_default().trim();
            return skip(
                index,
                format!("'{label}' label at ({row}, {col}) has no cells to compute from"),
            );
        }

        for target in &detection.targets {
            debug!(
                table = index,
                axis = ?target.axis,
                at = target.index,
                operation = %target.operation,
                "calculation target"
            );
            self.apply(table, index, target, &detection, &mut outcome);
        }

        outcome
    }

    fn apply(
        &self,
        table: &mut Table,
        index: usize,
        target: &CalculationTarget,
        detection: &Detection,
        outcome: &mut TableOutcome,
    ) {
        for computation in &target.computations {
            let (row, col) = computation.result;
            let current = table.cell(row, col).unwrap_or_default().to_string();

            if !self.options.recompute && parse_number(&current).is_some() {
                debug!(table = index, row, col, "result cell already numeric; kept");
                continue;
            }

            let operands: Vec<TableCell> = computation
                .operand_cells
                .iter()
                .map(|&(r, c)| TableCell::read(table, r, c, detection.is_label((r, c))))
                .filter(|cell| cell.parsed_value.is_some())
                .collect();
            let values: Vec<f64> = operands.iter().filter_map(|c| c.parsed_value).collect();

            let rendered = match compute(target.operation, &values) {
                Some(value) => {
                    let format = vote_format(operands.iter().filter_map(|c| c.format.as_ref()));
                    render_number(value, &format)
                }
                None if target.operation == Operation::Average => {
                    self.options.undefined_marker.clone()
                }
                None => {
                    let warning = StructuralWarning::NoNumericOperands {
                        table: index,
                        row,
                        col,
                    };
                    warn!(%warning, "structural warning");
                    outcome.warnings.push(warning);
                    continue;
                }
            };

            if rendered != current {
                debug!(table = index, row, col, value = %rendered, "cell computed");
                table.set_cell(row, col, rendered);
                outcome.cells_modified += 1;
            }
        }
    }
}

fn skip(index: usize, reason: String) -> TableOutcome {
    let warning = StructuralWarning::MalformedTable {
        table: index,
        reason,
    };
    warn!(%warning, "structural warning");
    TableOutcome {
        cells_modified: 0,
        skipped: true,
        warnings: vec![warning],
    }
}

/// Apply an operation to numeric operands in axis order.
///
/// `None` when there is nothing to compute from.
pub fn compute(operation: Operation, values: &[f64]) -> Option<f64> {
    let (first, rest) = values.split_first()?;
    let value = match operation {
        Operation::Sum => values.iter().sum(),
        Operation::Difference => first - rest.iter().sum::<f64>(),
        Operation::Average => values.iter().sum::<f64>() / values.len() as f64,
    };
    Some(value)
}

/// Run the configured calculator over every table of a document.
pub fn process_tables(doc: &mut Document, config: &TablesConfig) -> Result<TableReport> {
    Ok(TableCalculator::from_config(config)?.process_document(doc))
}
