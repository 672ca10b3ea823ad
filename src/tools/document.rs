//! Whole-document tools.
use super::parse;
use crate::common::error::Result;
use crate::ooxml::docx::properties::document_info;
use crate::store::{PackageStore, Workspace};
use serde::Deserialize;
use serde_json::{Value, json};

#[derive(Debug, Deserialize)]
struct ReadArgs {
    filename: String,
}

#[derive(Debug, Deserialize)]
struct CopyArgs {
    source_filename: String,
    destination_filename: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListArgs {
    #[serde(default)]
    directory: String,
}

/// `dir/name.docx` -> `dir/name_copy.docx`
fn copy_name(id: &str) -> String {
    let file_start = id.rfind('/').map_or(0, |i| i + 1);
    match id[file_start..].rfind('.') {
        Some(dot) if dot > 0 => {
            let dot = file_start + dot;
            format!("{}_copy{}", &id[..dot], &id[dot..])
        },
        _ => format!("{id}_copy"),
    }
}

pub(super) struct DocumentTools<'a, S> {
    pub(super) workspace: &'a Workspace<S>,
}

impl<S: PackageStore> DocumentTools<'_, S> {
    pub(super) async fn text(&self, args: Value) -> Result<Value> {
        let args: ReadArgs = parse(args)?;
        let text = self
            .workspace
            .read(&args.filename, |package| package.document_text())
            .await?;
        Ok(json!({ "text": text }))
    }

    pub(super) async fn xml(&self, args: Value) -> Result<Value> {
        let args: ReadArgs = parse(args)?;
        let xml = self
            .workspace
            .read(&args.filename, |package| package.document_xml())
            .await?;
        Ok(json!({ "xml": xml }))
    }

    pub(super) async fn info(&self, args: Value) -> Result<Value> {
        let args: ReadArgs = parse(args)?;
        let info = self
            .workspace
            .read(&args.filename, document_info)
            .await?;
        super::to_value(info)
    }

    pub(super) async fn list(&self, args: Value) -> Result<Value> {
        let args: ListArgs = parse(args)?;
        let documents = self.workspace.list(&args.directory).await?;
        Ok(json!({ "count": documents.len(), "documents": documents }))
    }

    /// Byte-for-byte copy, encrypted packages included.
    pub(super) async fn copy(&self, args: Value) -> Result<Value> {
        let args: CopyArgs = parse(args)?;
        let destination = match args.destination_filename {
            Some(dest) => dest,
            None => copy_name(&self.workspace.normalize(&args.source_filename)),
        };
        let target = self
            .workspace
            .transform(&args.source_filename, Some(destination.as_str()), Ok)
            .await?;
        Ok(json!({ "target": target }))
    }
}

#[cfg(test)]
mod tests {
    use super::copy_name;

    #[test]
    fn test_copy_name() {
        assert_eq!(copy_name("report.docx"), "report_copy.docx");
        assert_eq!(copy_name("a.b/report.docx"), "a.b/report_copy.docx");
        assert_eq!(copy_name("notes"), "notes_copy");
        assert_eq!(copy_name("dir.v2/notes"), "dir.v2/notes_copy");
        assert_eq!(copy_name(".hidden"), ".hidden_copy");
    }
}
