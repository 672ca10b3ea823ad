//! Text search and replacement tools.
use super::parse;
use crate::common::error::Result;
use crate::ooxml::docx::RunFormat;
use crate::ooxml::docx::search::{self, SearchOptions};
use crate::store::{PackageStore, Workspace};
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Deserialize)]
struct Find {
    filename: String,
    text: String,
    #[serde(flatten)]
    options: SearchOptions,
}

#[derive(Debug, Deserialize)]
struct Replace {
    filename: String,
    find_text: String,
    replace_text: String,
    /// Formatting for the inserted text; the first replaced run's otherwise
    formatting: Option<RunFormat>,
    #[serde(flatten)]
    options: SearchOptions,
    output_filename: Option<String>,
}

pub(super) struct TextTools<'a, S> {
    pub(super) workspace: &'a Workspace<S>,
}

impl<S: PackageStore> TextTools<'_, S> {
    pub(super) async fn find(&self, args: Value) -> Result<Value> {
        let args: Find = parse(args)?;
        let matches = self
            .workspace
            .read(&args.filename, |package| {
                search::find_text(package.body()?, &args.text, args.options)
            })
            .await?;
        Ok(json!({ "count": matches.len(), "matches": matches }))
    }

    pub(super) async fn replace(&self, args: Value) -> Result<Value> {
        let args: Replace = parse(args)?;
        let saved = self
            .workspace
            .edit(&args.filename, args.output_filename.as_deref(), |package| {
                search::replace_text(
                    package.body_mut()?,
                    &args.find_text,
                    &args.replace_text,
                    args.formatting.as_ref(),
                    args.options,
                )
            })
            .await?;
        Ok(json!({ "replacements": saved.value, "target": saved.target }))
    }
}
