/// Table structure reading and cell merging for Word documents.
///
/// Cells are addressed on the table grid: a cell occupies the grid columns
/// `[grid_col, grid_col + span)` of its row. Horizontal merges are written as
/// `w:gridSpan` and vertical merges as `w:vMerge` groups.
use super::Package;
use super::paragraph::paragraph_text;
use crate::common::error::{Error, Result};
use crate::common::xml::{XmlElement, XmlNode};
use serde::Serialize;
use smallvec::SmallVec;
use std::ops::RangeInclusive;
use tracing::{debug, info};

/// `w:tcPr` children in schema order.
const TCPR_ORDER: &[&str] = &[
    "w:cnfStyle",
    "w:tcW",
    "w:gridSpan",
    "w:hMerge",
    "w:vMerge",
    "w:tcBorders",
    "w:shd",
    "w:noWrap",
    "w:tcMar",
    "w:textDirection",
    "w:tcFitText",
    "w:vAlign",
    "w:hideMark",
];

/// Vertical merge state for table cells.
///
/// In OOXML, vertical merging uses the `<w:vMerge>` element:
/// - `restart`: Starts a new vertical merge (first cell in the merge)
/// - `continue`: Continues a vertical merge from the cell above (no `val` attribute or `val="continue"`)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum VMergeState {
    /// Starts a vertical merge (`<w:vMerge w:val="restart"/>`)
    Restart,
    /// Continues a vertical merge from above (`<w:vMerge/>` or `<w:vMerge w:val="continue"/>`)
    Continue,
}

/// One `w:tc` as seen on the grid.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CellShape {
    /// First grid column covered by the cell
    pub grid_col: usize,
    pub span: usize,
    pub v_merge: Option<VMergeState>,
    /// `w:tcW` in twentieths of a point, when given as `dxa`
    pub width_dxa: Option<u32>,
    pub text: String,
    #[serde(skip)]
    child_index: usize,
}

impl CellShape {
    /// Last grid column covered by the cell.
    #[inline]
    pub fn last_col(&self) -> usize {
        self.grid_col + self.span - 1
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RowShape {
    /// Grid columns skipped before the first cell (`w:gridBefore`)
    pub grid_before: usize,
    /// Grid columns left empty after the last cell (`w:gridAfter`)
    pub grid_after: usize,
    pub cells: Vec<CellShape>,
    #[serde(skip)]
    child_index: usize,
}

impl RowShape {
    /// Sum of the spans of the row's cells.
    pub fn span_total(&self) -> usize {
        self.cells.iter().map(|c| c.span).sum()
    }

    /// Grid columns the row accounts for, skipped ones included.
    pub fn grid_total(&self) -> usize {
        self.grid_before + self.span_total() + self.grid_after
    }

    /// The cell covering a grid column.
    pub fn cell_at(&self, col: usize) -> Option<&CellShape> {
        self.cells
            .iter()
            .find(|c| c.grid_col <= col && col <= c.last_col())
    }
}

/// Rows × grid columns of a `w:tbl`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TableShape {
    pub grid_cols: usize,
    pub rows: Vec<RowShape>,
}

impl TableShape {
    pub fn read(table: &XmlElement) -> Self {
        let mut rows = Vec::new();
        for (row_index, node) in table.children.iter().enumerate() {
            let Some(tr) = node.as_element().filter(|el| el.is("w:tr")) else {
                continue;
            };
            let grid_before = row_grid_skip(tr, "w:gridBefore");
            let mut cells = Vec::new();
            let mut grid_col = grid_before;
            for (cell_index, node) in tr.children.iter().enumerate() {
                let Some(tc) = node.as_element().filter(|el| el.is("w:tc")) else {
                    continue;
                };
                let span = grid_span(tc);
                cells.push(CellShape {
                    grid_col,
                    span,
                    v_merge: v_merge(tc),
                    width_dxa: width_dxa(tc),
                    text: cell_content_text(tc),
                    child_index: cell_index,
                });
                grid_col += span;
            }
            rows.push(RowShape {
                grid_before,
                grid_after: row_grid_skip(tr, "w:gridAfter"),
                cells,
                child_index: row_index,
            });
        }

        let declared = table
            .child("w:tblGrid")
            .map_or(0, |grid| grid.elements().filter(|el| el.is("w:gridCol")).count());
        let widest = rows.iter().map(RowShape::grid_total).max().unwrap_or(0);
        Self {
            grid_cols: if declared > 0 { declared } else { widest },
            rows,
        }
    }

    #[inline]
    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    /// Whether every row, skipped columns included, covers the whole grid.
    pub fn is_rectangular(&self) -> bool {
        self.rows.iter().all(|r| r.grid_total() == self.grid_cols)
    }
}

/// `w:trPr/w:gridBefore` or `w:gridAfter` of a row, 0 when absent.
fn row_grid_skip(tr: &XmlElement, name: &str) -> usize {
    tr.child("w:trPr")
        .and_then(|pr| pr.child(name))
        .and_then(|el| el.attr("w:val"))
        .and_then(|v| atoi_simd::parse::<u32>(v.trim().as_bytes()).ok())
        .map_or(0, |v| v as usize)
}

fn grid_span(tc: &XmlElement) -> usize {
    tc.child("w:tcPr")
        .and_then(|pr| pr.child("w:gridSpan"))
        .and_then(|el| el.attr("w:val"))
        .and_then(|v| atoi_simd::parse::<u32>(v.as_bytes()).ok())
        .map_or(1, |v| v.max(1) as usize)
}

fn v_merge(tc: &XmlElement) -> Option<VMergeState> {
    let el = tc.child("w:tcPr")?.child("w:vMerge")?;
    match el.attr("w:val") {
        Some("restart") => Some(VMergeState::Restart),
        _ => Some(VMergeState::Continue),
    }
}

fn width_dxa(tc: &XmlElement) -> Option<u32> {
    let w = tc.child("w:tcPr")?.child("w:tcW")?;
    if w.attr("w:type").unwrap_or("dxa") != "dxa" {
        return None;
    }
    atoi_simd::parse::<u32>(w.attr("w:w")?.as_bytes()).ok()
}

/// Text of a cell's paragraphs, one per line.
fn cell_content_text(tc: &XmlElement) -> String {
    tc.elements()
        .filter(|el| el.is("w:p"))
        .map(paragraph_text)
        .collect::<Vec<_>>()
        .join("\n")
}

fn has_content(tc: &XmlElement) -> bool {
    tc.elements()
        .any(|el| el.is("w:tbl") || (el.is("w:p") && !paragraph_text(el).is_empty()))
}

/// Set a `w:tcPr` child, keeping schema order.
fn set_tcpr_child(tc: &mut XmlElement, child: XmlElement) {
    if tc.child("w:tcPr").is_none() {
        tc.insert(0, XmlElement::new("w:tcPr"));
    }
    let Some(pr) = tc.child_mut("w:tcPr") else {
        return;
    };
    let name = child.name.clone();
    pr.remove_elements(|el| el.name == name);
    let rank = |n: &str| TCPR_ORDER.iter().position(|o| *o == n).unwrap_or(TCPR_ORDER.len());
    let own = rank(&name);
    let at = pr
        .children
        .iter()
        .position(|node| node.as_element().is_some_and(|el| rank(&el.name) > own))
        .unwrap_or(pr.children.len());
    pr.insert(at, child);
}

fn remove_tcpr_child(tc: &mut XmlElement, name: &str) {
    if let Some(pr) = tc.child_mut("w:tcPr") {
        pr.remove_elements(|el| el.is(name));
    }
}

/// Direct child indices of the body's top-level tables.
fn table_positions(body: &XmlElement) -> Vec<usize> {
    body.children
        .iter()
        .enumerate()
        .filter(|(_, node)| node.as_element().is_some_and(|el| el.is("w:tbl")))
        .map(|(i, _)| i)
        .collect()
}

fn table_at(body: &XmlElement, table_index: usize) -> Result<&XmlElement> {
    let positions = table_positions(body);
    positions
        .get(table_index)
        .and_then(|&i| body.children[i].as_element())
        .ok_or_else(|| {
            Error::NotFound(format!(
                "table {table_index}, document has {}",
                positions.len()
            ))
        })
}

fn table_at_mut(body: &mut XmlElement, table_index: usize) -> Result<&mut XmlElement> {
    let positions = table_positions(body);
    let count = positions.len();
    positions
        .get(table_index)
        .and_then(|&i| body.children[i].as_element_mut())
        .ok_or_else(|| Error::NotFound(format!("table {table_index}, document has {count}")))
}

/// Number of top-level tables in the document body.
pub fn table_count(package: &Package) -> Result<usize> {
    Ok(table_positions(package.body()?).len())
}

/// Shape of a top-level table.
pub fn table_shape(package: &Package, table_index: usize) -> Result<TableShape> {
    Ok(TableShape::read(table_at(package.body()?, table_index)?))
}

/// Text of the logical cell covering `(row, col)`.
///
/// A vertical-merge continuation reads as the cell that started the group.
pub fn cell_text(table: &XmlElement, row: usize, col: usize) -> Result<String> {
    let shape = TableShape::read(table);
    let mut r = row;
    loop {
        let cell = shape
            .rows
            .get(r)
            .and_then(|rs| rs.cell_at(col))
            .ok_or_else(|| Error::OutOfBounds(format!("no cell at row {r}, column {col}")))?;
        if cell.v_merge != Some(VMergeState::Continue) || r == 0 {
            return Ok(cell.text.clone());
        }
        r -= 1;
    }
}

/// The cell left in place of a merged range.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MergedCell {
    pub table_index: usize,
    pub row: usize,
    pub col: usize,
    pub row_span: usize,
    pub col_span: usize,
    pub text: String,
}

/// Per-row plan: the row's child index and the child indices of its target cells.
struct RowPlan {
    row: usize,
    cells: SmallVec<[usize; 8]>,
}

fn check_range(range: &RangeInclusive<usize>, axis: &str) -> Result<()> {
    if range.start() > range.end() {
        return Err(Error::InvalidRange(format!(
            "{axis} range {}..={} is reversed",
            range.start(),
            range.end()
        )));
    }
    Ok(())
}

/// Check a merge against the table shape and list the cells it touches.
fn plan_merge(
    shape: &TableShape,
    rows: &RangeInclusive<usize>,
    cols: &RangeInclusive<usize>,
) -> Result<Vec<RowPlan>> {
    check_range(rows, "row")?;
    check_range(cols, "column")?;
    let (r0, r1, c0, c1) = (*rows.start(), *rows.end(), *cols.start(), *cols.end());
    if r1 >= shape.row_count() {
        return Err(Error::OutOfBounds(format!(
            "row {r1}, table has {} rows",
            shape.row_count()
        )));
    }
    if c1 >= shape.grid_cols {
        return Err(Error::OutOfBounds(format!(
            "column {c1}, table has {} grid columns",
            shape.grid_cols
        )));
    }

    let mut plan = Vec::with_capacity(r1 - r0 + 1);
    for r in r0..=r1 {
        let row = &shape.rows[r];
        let first = row
            .cell_at(c0)
            .ok_or_else(|| Error::OutOfBounds(format!("row {r} has no cell at column {c0}")))?;
        let last = row
            .cell_at(c1)
            .ok_or_else(|| Error::OutOfBounds(format!("row {r} has no cell at column {c1}")))?;
        if first.grid_col != c0 || last.last_col() != c1 {
            return Err(Error::Overlap(format!(
                "a cell in row {r} straddles the edge of columns {c0}..={c1}"
            )));
        }
        let mut cells = SmallVec::new();
        for cell in row.cells.iter().filter(|c| c.grid_col >= c0 && c.last_col() <= c1) {
            if cell.span > 1 {
                return Err(Error::Overlap(format!(
                    "cell at row {r}, column {} is already merged horizontally",
                    cell.grid_col
                )));
            }
            if cell.v_merge.is_some() {
                return Err(Error::Overlap(format!(
                    "cell at row {r}, column {} is already in a vertical merge",
                    cell.grid_col
                )));
            }
            cells.push(cell.child_index);
        }
        plan.push(RowPlan {
            row: row.child_index,
            cells,
        });
    }
    Ok(plan)
}

fn cell_mut<'t>(table: &'t mut XmlElement, row: usize, cell: usize) -> Result<&'t mut XmlElement> {
    table
        .get_mut(&[row, cell])
        .ok_or_else(|| Error::CorruptPackage("table cell moved during merge".to_string()))
}

/// Merge the cells in `rows` × `cols` (inclusive) of one table element.
pub fn merge_cells(
    table: &mut XmlElement,
    rows: RangeInclusive<usize>,
    cols: RangeInclusive<usize>,
) -> Result<()> {
    let shape = TableShape::read(table);
    let plan = plan_merge(&shape, &rows, &cols)?;
    let row_span = plan.len();
    let col_span = cols.end() - cols.start() + 1;
    if row_span == 1 && col_span == 1 {
        return Ok(());
    }

    let widths: Option<u32> = rows
        .clone()
        .next()
        .map(|r| &shape.rows[r])
        .and_then(|row| {
            row.cells
                .iter()
                .filter(|c| cols.contains(&c.grid_col))
                .map(|c| c.width_dxa)
                .sum()
        });

    // Content of every other non-empty cell, row-major.
    let mut moved: Vec<XmlNode> = Vec::new();
    for (i, row) in plan.iter().enumerate() {
        for (j, &cell) in row.cells.iter().enumerate() {
            if i == 0 && j == 0 {
                continue;
            }
            let tc = cell_mut(table, row.row, cell)?;
            if !has_content(tc) {
                continue;
            }
            let (keep, take): (Vec<XmlNode>, Vec<XmlNode>) = std::mem::take(&mut tc.children)
                .into_iter()
                .partition(|node| node.as_element().is_some_and(|el| el.is("w:tcPr")));
            tc.children = keep;
            moved.extend(take);
        }
    }

    let span_attr = |el: XmlElement| {
        let mut buf = itoa::Buffer::new();
        el.with_attr("w:val", buf.format(col_span))
    };
    let apply_shape = |tc: &mut XmlElement| {
        if let Some(w) = widths {
            let mut buf = itoa::Buffer::new();
            set_tcpr_child(
                tc,
                XmlElement::new("w:tcW")
                    .with_attr("w:w", buf.format(w))
                    .with_attr("w:type", "dxa"),
            );
        }
        if col_span > 1 {
            set_tcpr_child(tc, span_attr(XmlElement::new("w:gridSpan")));
        } else {
            remove_tcpr_child(tc, "w:gridSpan");
        }
    };

    let owner_pos = (plan[0].row, plan[0].cells[0]);
    {
        let owner = cell_mut(table, owner_pos.0, owner_pos.1)?;
        if !moved.is_empty() {
            if !has_content(owner) {
                owner.remove_elements(|el| el.is("w:p"));
            }
            owner.children.extend(moved);
        }
        apply_shape(owner);
        if row_span > 1 {
            set_tcpr_child(owner, XmlElement::new("w:vMerge").with_attr("w:val", "restart"));
        }
    }

    for (i, row) in plan.iter().enumerate() {
        if i > 0 {
            let tc = cell_mut(table, row.row, row.cells[0])?;
            tc.remove_elements(|el| !el.is("w:tcPr"));
            tc.children.retain(|node| matches!(node, XmlNode::Element(_)));
            apply_shape(tc);
            set_tcpr_child(tc, XmlElement::new("w:vMerge"));
            tc.push(XmlElement::new("w:p"));
        }
        let tr = table
            .get_mut(&[row.row])
            .ok_or_else(|| Error::CorruptPackage("table row moved during merge".to_string()))?;
        for &cell in row.cells[1..].iter().rev() {
            tr.children.remove(cell);
        }
    }

    debug!(row_span, col_span, "merged table cells");
    Ok(())
}

/// Merge a rectangular range of cells in a top-level table.
///
/// # Examples
///
/// ```rust,no_run
/// use longan::ooxml::docx::{Package, table};
///
/// let mut pkg = Package::from_bytes(&std::fs::read("grid.docx")?)?;
/// let merged = table::merge_rectangular(&mut pkg, 0, 0..=1, 0..=2)?;
/// assert_eq!(merged.col_span, 3);
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub fn merge_rectangular(
    package: &mut Package,
    table_index: usize,
    rows: RangeInclusive<usize>,
    cols: RangeInclusive<usize>,
) -> Result<MergedCell> {
    check_range(&rows, "row")?;
    check_range(&cols, "column")?;
    let table = table_at_mut(package.body_mut()?, table_index)?;
    merge_cells(table, rows.clone(), cols.clone())?;
    let text = cell_text(table, *rows.start(), *cols.start())?;
    info!(
        table_index,
        rows = ?rows,
        cols = ?cols,
        "merged cells"
    );
    Ok(MergedCell {
        table_index,
        row: *rows.start(),
        col: *cols.start(),
        row_span: rows.end() - rows.start() + 1,
        col_span: cols.end() - cols.start() + 1,
        text,
    })
}

/// Merge cells `cols` of a single row.
pub fn merge_horizontal(
    package: &mut Package,
    table_index: usize,
    row: usize,
    cols: RangeInclusive<usize>,
) -> Result<MergedCell> {
    merge_rectangular(package, table_index, row..=row, cols)
}

/// Merge cells `rows` of a single column.
pub fn merge_vertical(
    package: &mut Package,
    table_index: usize,
    col: usize,
    rows: RangeInclusive<usize>,
) -> Result<MergedCell> {
    merge_rectangular(package, table_index, rows, col..=col)
}
