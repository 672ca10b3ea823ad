//! Table merge tools.
use super::{parse, to_value};
use crate::common::error::Result;
use crate::ooxml::docx::table::{self, MergedCell};
use crate::store::{PackageStore, Workspace};
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Deserialize)]
struct Merge {
    filename: String,
    table_index: usize,
    start_row: usize,
    start_col: usize,
    end_row: usize,
    end_col: usize,
    output_filename: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MergeHorizontal {
    filename: String,
    table_index: usize,
    row_index: usize,
    start_col: usize,
    end_col: usize,
    output_filename: Option<String>,
}

#[derive(Debug, Deserialize)]
struct MergeVertical {
    filename: String,
    table_index: usize,
    col_index: usize,
    start_row: usize,
    end_row: usize,
    output_filename: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Shape {
    filename: String,
    table_index: usize,
}

fn merged(cell: MergedCell, target: String) -> Result<Value> {
    Ok(json!({ "merged": to_value(cell)?, "target": target }))
}

pub(super) struct TableTools<'a, S> {
    pub(super) workspace: &'a Workspace<S>,
}

impl<S: PackageStore> TableTools<'_, S> {
    pub(super) async fn merge(&self, args: Value) -> Result<Value> {
        let a: Merge = parse(args)?;
        let saved = self
            .workspace
            .edit(&a.filename, a.output_filename.as_deref(), |package| {
                table::merge_rectangular(package, a.table_index, a.start_row..=a.end_row, a.start_col..=a.end_col)
            })
            .await?;
        merged(saved.value, saved.target)
    }

    pub(super) async fn merge_horizontal(&self, args: Value) -> Result<Value> {
        let a: MergeHorizontal = parse(args)?;
        let saved = self
            .workspace
            .edit(&a.filename, a.output_filename.as_deref(), |package| {
                table::merge_horizontal(package, a.table_index, a.row_index, a.start_col..=a.end_col)
            })
            .await?;
        merged(saved.value, saved.target)
    }

    pub(super) async fn merge_vertical(&self, args: Value) -> Result<Value> {
        let a: MergeVertical = parse(args)?;
        let saved = self
            .workspace
            .edit(&a.filename, a.output_filename.as_deref(), |package| {
                table::merge_vertical(package, a.table_index, a.col_index, a.start_row..=a.end_row)
            })
            .await?;
        merged(saved.value, saved.target)
    }

    pub(super) async fn shape(&self, args: Value) -> Result<Value> {
        let a: Shape = parse(args)?;
        let shape = self
            .workspace
            .read(&a.filename, |package| table::table_shape(package, a.table_index))
            .await?;
        to_value(shape)
    }
}
