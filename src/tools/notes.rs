//! Footnote and endnote tools.
use super::{parse, to_value, yes};
use crate::common::error::{Error, Result};
use crate::ooxml::docx::NoteKind;
use crate::ooxml::docx::notes::{
    AnchorLocation, InsertOptions, NoteId, NoteManager, NoteSelector, list_notes, note_report,
};
use crate::store::{PackageStore, Workspace};
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Deserialize)]
struct AddAtParagraph {
    filename: String,
    paragraph_index: usize,
    #[serde(alias = "footnote_text", alias = "endnote_text")]
    text: String,
    /// Char offset in the paragraph; end of the paragraph when absent
    offset: Option<usize>,
    output_filename: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AddNearText {
    filename: String,
    search_text: String,
    #[serde(alias = "footnote_text", alias = "endnote_text")]
    text: String,
    #[serde(default = "yes")]
    validate_location: bool,
    #[serde(default)]
    auto_repair: bool,
    output_filename: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Delete {
    filename: String,
    #[serde(alias = "footnote_id", alias = "endnote_id")]
    note_id: Option<NoteId>,
    search_text: Option<String>,
    #[serde(default = "yes")]
    clean_orphans: bool,
    output_filename: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Inspect {
    filename: String,
    /// Both kinds when absent
    kind: Option<NoteKind>,
}

#[derive(Debug, Deserialize)]
struct Clean {
    filename: String,
    kind: Option<NoteKind>,
    output_filename: Option<String>,
}

fn kinds(kind: Option<NoteKind>) -> Vec<NoteKind> {
    kind.map_or_else(|| vec![NoteKind::Footnote, NoteKind::Endnote], |k| vec![k])
}

pub(super) struct NoteTools<'a, S> {
    pub(super) workspace: &'a Workspace<S>,
}

impl<S: PackageStore> NoteTools<'_, S> {
    pub(super) async fn add_at_paragraph(&self, kind: NoteKind, args: Value) -> Result<Value> {
        let args: AddAtParagraph = parse(args)?;
        let location = AnchorLocation::Paragraph {
            index: args.paragraph_index,
            offset: args.offset,
        };
        self.insert(kind, &args.filename, args.output_filename.as_deref(), location, &args.text, InsertOptions::default())
            .await
    }

    pub(super) async fn add_near_text(&self, kind: NoteKind, after: bool, args: Value) -> Result<Value> {
        let args: AddNearText = parse(args)?;
        let location = if after {
            AnchorLocation::AfterText(args.search_text)
        } else {
            AnchorLocation::BeforeText(args.search_text)
        };
        let options = InsertOptions {
            validate_location: args.validate_location,
            auto_repair: args.auto_repair,
        };
        self.insert(kind, &args.filename, args.output_filename.as_deref(), location, &args.text, options)
            .await
    }

    async fn insert(
        &self,
        kind: NoteKind,
        filename: &str,
        output: Option<&str>,
        location: AnchorLocation,
        text: &str,
        options: InsertOptions,
    ) -> Result<Value> {
        let saved = self
            .workspace
            .edit(filename, output, |package| {
                NoteManager::new(package, kind).insert(&location, text, options)
            })
            .await?;
        Ok(json!({
            "kind": kind,
            "note_id": saved.value,
            "target": saved.target,
        }))
    }

    pub(super) async fn delete(&self, kind: NoteKind, args: Value) -> Result<Value> {
        let args: Delete = parse(args)?;
        let selector = match (args.note_id, args.search_text) {
            (Some(id), None) => NoteSelector::Id(id),
            (None, Some(text)) => NoteSelector::Text(text),
            _ => {
                return Err(Error::InvalidArgument(format!(
                    "give exactly one of {}_id or search_text",
                    kind.label()
                )));
            },
        };
        let clean = args.clean_orphans;
        let saved = self
            .workspace
            .edit(&args.filename, args.output_filename.as_deref(), |package| {
                NoteManager::new(package, kind).remove(&selector, clean)
            })
            .await?;
        Ok(json!({
            "kind": kind,
            "removed": saved.value.removed,
            "cleaned_orphans": saved.value.cleaned_orphans,
            "target": saved.target,
        }))
    }

    pub(super) async fn validate(&self, args: Value) -> Result<Value> {
        let args: Inspect = parse(args)?;
        let reports = self
            .workspace
            .read(&args.filename, |package| {
                kinds(args.kind)
                    .into_iter()
                    .map(|kind| note_report(package, kind))
                    .collect::<Result<Vec<_>>>()
            })
            .await?;
        let consistent = reports.iter().all(|r| r.is_consistent());
        Ok(json!({ "consistent": consistent, "reports": reports }))
    }

    pub(super) async fn clean_orphans(&self, args: Value) -> Result<Value> {
        let args: Clean = parse(args)?;
        let saved = self
            .workspace
            .edit(&args.filename, args.output_filename.as_deref(), |package| {
                let mut cleaned = Vec::new();
                for kind in kinds(args.kind) {
                    let ids = NoteManager::new(package, kind).clean_orphans()?;
                    cleaned.push(json!({ "kind": kind, "removed": ids }));
                }
                Ok(cleaned)
            })
            .await?;
        Ok(json!({ "cleaned": saved.value, "target": saved.target }))
    }

    pub(super) async fn list(&self, args: Value) -> Result<Value> {
        let args: Inspect = parse(args)?;
        let listed = self
            .workspace
            .read(&args.filename, |package| {
                let mut listed = serde_json::Map::new();
                for kind in kinds(args.kind) {
                    listed.insert(kind.label().to_string(), to_value(list_notes(package, kind)?)?);
                }
                Ok(listed)
            })
            .await?;
        Ok(Value::Object(listed))
    }
}
