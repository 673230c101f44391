//! Two-row-per-record grid packing for the document list.
//!
//! Slot 0 of both rows is reserved for the selection/actions cells. Every other
//! visible column lands in the main row, spans both rows, or is deferred to the
//! sub row where it is packed greedily into the empty slots.

use std::collections::{BTreeMap, VecDeque};

use log::debug;

use crate::columns::{is_reserved, second_row_key};

/// A grid cell that renders one configured column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnCell {
    pub column_id: String,
    /// `0` marks a slot covered by the preceding deferred cell.
    pub col_span: usize,
    pub row_span: usize,
    /// Sub-row continuation of a main-row cell spanning both rows.
    pub is_spanning: bool,
}

impl ColumnCell {
    fn single(column_id: &str) -> Self {
        Self {
            column_id: column_id.to_string(),
            col_span: 1,
            row_span: 1,
            is_spanning: false,
        }
    }

    fn spanning_continuation(column_id: &str) -> Self {
        Self {
            column_id: column_id.to_string(),
            col_span: 1,
            row_span: 2,
            is_spanning: true,
        }
    }

    fn deferred(column_id: &str, col_span: usize) -> Self {
        Self {
            column_id: column_id.to_string(),
            col_span,
            row_span: 1,
            is_spanning: false,
        }
    }

    pub fn is_covered(&self) -> bool {
        self.col_span == 0
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LayoutCell {
    /// Selection checkbox plus row actions, main row slot 0.
    SelectActions,
    /// Actions-only cell, sub row slot 0.
    SubRowActions,
    Column(ColumnCell),
}

impl LayoutCell {
    pub fn column(&self) -> Option<&ColumnCell> {
        match self {
            Self::Column(cell) => Some(cell),
            _ => None,
        }
    }
}

/// Concrete two-row grid description.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableLayout {
    pub main_row: Vec<LayoutCell>,
    /// Same length as `main_row`; `None` is an empty reserved slot.
    pub sub_row: Vec<Option<LayoutCell>>,
    /// Parallel to `main_row`; may combine a main and a deferred header.
    pub header_labels: Vec<String>,
}

impl TableLayout {
    /// Returns `false` for empty slots, covered slots, and spanning
    /// continuations already rendered by the main row.
    pub fn should_render_sub_row_cell(&self, index: usize) -> bool {
        match self.sub_row.get(index) {
            Some(Some(LayoutCell::Column(cell))) => !cell.is_covered() && !cell.is_spanning,
            Some(Some(_)) => true,
            _ => false,
        }
    }

    pub fn column_count(&self) -> usize {
        self.main_row.len()
    }
}

/// Inputs of one layout pass.
pub struct LayoutRequest<'a> {
    /// Ordered visible columns; reserved ids are skipped.
    pub columns: &'a [String],
    /// Explicit `false` hides a column.
    pub visibility: &'a BTreeMap<String, bool>,
    /// `<id>` = span both rows, `<id>_secondRow` = show on second row.
    pub spanning: &'a BTreeMap<String, bool>,
    pub header_label: &'a dyn Fn(&str) -> String,
}

fn flag(spanning: &BTreeMap<String, bool>, key: &str) -> bool {
    spanning.get(key).copied().unwrap_or(false)
}

fn empty_run_len(sub_row: &[Option<LayoutCell>], start: usize) -> usize {
    sub_row[start..]
        .iter()
        .take_while(|slot| slot.is_none())
        .count()
}

fn place_deferred_columns(
    sub_row: &mut [Option<LayoutCell>],
    header_labels: &mut [String],
    mut deferred: VecDeque<String>,
    header_label: &dyn Fn(&str) -> String,
) {
    let mut index = 1;
    while index < sub_row.len() {
        if sub_row[index].is_some() {
            index += 1;
            continue;
        }
        let Some(column_id) = deferred.pop_front() else {
            break;
        };
        // the last deferred column absorbs the whole run of empty slots
        let col_span = if deferred.is_empty() {
            empty_run_len(sub_row, index)
        } else {
            1
        };
        sub_row[index] = Some(LayoutCell::Column(ColumnCell::deferred(&column_id, col_span)));
        for covered in index + 1..index + col_span {
            sub_row[covered] = Some(LayoutCell::Column(ColumnCell::deferred(&column_id, 0)));
        }
        if !header_labels[index].is_empty() {
            let deferred_header = header_label(column_id.as_str());
            header_labels[index] = format!("{} / {}", header_labels[index], deferred_header);
        }
        index += col_span;
    }

    if !deferred.is_empty() {
        debug!(
            "TableLayout: no sub row slot left for deferred columns {:?}",
            deferred
        );
    }
}

/// Composes the two-row grid for an ordered list of visible columns.
pub fn compose_table_layout(request: &LayoutRequest) -> TableLayout {
    let mut main_row = vec![LayoutCell::SelectActions];
    let mut sub_row = vec![Some(LayoutCell::SubRowActions)];
    let mut header_labels = vec![String::new()];
    let mut deferred = VecDeque::new();

    for column_id in request.columns {
        if is_reserved(column_id) || request.visibility.get(column_id) == Some(&false) {
            continue;
        }
        if flag(request.spanning, &second_row_key(column_id)) {
            deferred.push_back(column_id.clone());
            continue;
        }
        main_row.push(LayoutCell::Column(ColumnCell::single(column_id)));
        header_labels.push((request.header_label)(column_id.as_str()));
        if flag(request.spanning, column_id) {
            sub_row.push(Some(LayoutCell::Column(ColumnCell::spanning_continuation(
                column_id,
            ))));
        } else {
            sub_row.push(None);
        }
    }

    place_deferred_columns(
        &mut sub_row,
        &mut header_labels,
        deferred,
        request.header_label,
    );

    TableLayout {
        main_row,
        sub_row,
        header_labels,
    }
}
