use super::*;
use crate::config::{Config, StorageConfig};
use crate::ooxml::docx::fixtures::DocxBuilder;
use crate::store::LocalStore;
use serde_json::json;
use tempfile::TempDir;

fn tools(dir: &TempDir) -> Tools<LocalStore> {
    let mut config = Config::default();
    config.storage = StorageConfig {
        root: Some(dir.path().to_path_buf()),
        ..Default::default()
    };
    config.protection.spin_count = 1000;
    Tools::new(LocalStore::new(config.storage.root.clone()), &config)
}

fn seed(dir: &TempDir, name: &str, builder: DocxBuilder) -> Vec<u8> {
    let bytes = builder.build();
    std::fs::write(dir.path().join(name), &bytes).unwrap();
    bytes
}

fn ok(response: ToolResponse) -> Value {
    match response {
        ToolResponse::Ok { result } => result,
        ToolResponse::Error { kind, message } => panic!("{kind:?}: {message}"),
    }
}

#[tokio::test]
async fn test_every_listed_tool_dispatches() {
    let dir = TempDir::new().unwrap();
    let tools = tools(&dir);
    // Listing needs no arguments at all.
    for name in TOOL_NAMES.iter().filter(|name| **name != "list_available_documents") {
        let response = tools.call(name, json!({})).await;
        let ToolResponse::Error { kind, message } = response else {
            panic!("{name} accepted empty arguments");
        };
        assert_eq!(kind, ErrorKind::InvalidArgument, "{name}");
        assert!(!message.contains("unknown tool"), "{name}");
    }

    let response = tools.call("format_disk", json!({})).await;
    assert_eq!(response.error_kind(), Some(ErrorKind::InvalidArgument));
}

#[tokio::test]
async fn test_error_response_shape() {
    let dir = TempDir::new().unwrap();
    let tools = tools(&dir);
    let response = tools
        .call("get_document_text", json!({ "filename": "absent" }))
        .await;
    let value = serde_json::to_value(&response).unwrap();
    assert_eq!(value["status"], "error");
    assert_eq!(value["kind"], "NotFound");
    assert!(value["message"].as_str().unwrap().contains("absent.docx"));
}

#[tokio::test]
async fn test_footnote_lifecycle() {
    let dir = TempDir::new().unwrap();
    seed(
        &dir,
        "doc.docx",
        DocxBuilder::new()
            .with_styles()
            .paragraph("Revenue grew in 2024.")
            .paragraph("Costs were flat."),
    );
    let tools = tools(&dir);

    let added = ok(tools
        .call(
            "add_footnote_after_text",
            json!({ "filename": "doc", "search_text": "grew", "footnote_text": "Restated." }),
        )
        .await);
    let id = added["note_id"].as_i64().unwrap();
    assert_eq!(added["kind"], "footnote");
    assert_eq!(added["target"], "doc.docx");

    let at_end = ok(tools
        .call(
            "add_footnote_to_document",
            json!({ "filename": "doc", "paragraph_index": 1, "footnote_text": "Excludes one-offs." }),
        )
        .await);
    assert!(at_end["note_id"].as_i64().unwrap() > id);

    let report = ok(tools
        .call("validate_document_footnotes", json!({ "filename": "doc", "kind": "footnote" }))
        .await);
    assert_eq!(report["consistent"], true);
    assert_eq!(report["reports"][0]["anchor_ids"].as_array().unwrap().len(), 2);

    let listed = ok(tools.call("list_notes", json!({ "filename": "doc" })).await);
    let texts: Vec<_> = listed["footnote"]
        .as_array()
        .unwrap()
        .iter()
        .map(|n| n["text"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(texts, ["Restated.", "Excludes one-offs."]);
    assert_eq!(listed["endnote"], json!([]));

    let text = ok(tools.call("get_document_text", json!({ "filename": "doc" })).await);
    assert!(text["text"].as_str().unwrap().contains("Revenue grew in 2024."));

    let removed = ok(tools
        .call("delete_footnote_from_document", json!({ "filename": "doc", "footnote_id": id }))
        .await);
    assert_eq!(removed["removed"], json!([id]));

    let report = ok(tools
        .call("validate_document_footnotes", json!({ "filename": "doc" }))
        .await);
    assert_eq!(report["consistent"], true);
    assert_eq!(report["reports"][0]["body_ids"].as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn test_ambiguous_anchor_leaves_file_untouched() {
    let dir = TempDir::new().unwrap();
    let original = seed(
        &dir,
        "s.docx",
        DocxBuilder::new().paragraph("Section 1 intro").paragraph("See Section 1"),
    );
    let tools = tools(&dir);
    let response = tools
        .call(
            "add_endnote_after_text",
            json!({ "filename": "s", "search_text": "Section 1", "endnote_text": "x" }),
        )
        .await;
    assert_eq!(response.error_kind(), Some(ErrorKind::AmbiguousLocation));
    assert_eq!(std::fs::read(dir.path().join("s.docx")).unwrap(), original);

    // Without validation the first match wins.
    let added = ok(tools
        .call(
            "add_endnote_after_text",
            json!({
                "filename": "s",
                "search_text": "Section 1",
                "endnote_text": "x",
                "validate_location": false,
            }),
        )
        .await);
    assert_eq!(added["kind"], "endnote");
}

#[tokio::test]
async fn test_delete_needs_one_selector() {
    let dir = TempDir::new().unwrap();
    seed(&dir, "d.docx", DocxBuilder::new().paragraph("x"));
    let tools = tools(&dir);
    let both = tools
        .call(
            "delete_endnote_from_document",
            json!({ "filename": "d", "endnote_id": 1, "search_text": "x" }),
        )
        .await;
    assert_eq!(both.error_kind(), Some(ErrorKind::InvalidArgument));

    let missing = tools
        .call("delete_endnote_from_document", json!({ "filename": "d", "search_text": "x" }))
        .await;
    assert_eq!(missing.error_kind(), Some(ErrorKind::NotFound));
}

#[tokio::test]
async fn test_search_and_replace_to_output() {
    let dir = TempDir::new().unwrap();
    let original = seed(
        &dir,
        "r.docx",
        DocxBuilder::new().runs(&[("Hello ", false), ("World", true)]),
    );
    let tools = tools(&dir);

    let found = ok(tools
        .call("find_text_in_document", json!({ "filename": "r", "text": "world", "match_case": false }))
        .await);
    assert_eq!(found["count"], 1);
    assert_eq!(found["matches"][0]["start"], 6);

    let replaced = ok(tools
        .call(
            "search_and_replace",
            json!({
                "filename": "r",
                "find_text": "World",
                "replace_text": "Earth",
                "formatting": { "color": "FF0000" },
                "output_filename": "r2",
            }),
        )
        .await);
    assert_eq!(replaced["replacements"], 1);
    assert_eq!(replaced["target"], "r2.docx");
    assert_eq!(std::fs::read(dir.path().join("r.docx")).unwrap(), original);

    let xml = ok(tools.call("get_document_xml", json!({ "filename": "r2" })).await);
    let xml = xml["xml"].as_str().unwrap();
    assert!(xml.contains("Earth"));
    assert!(xml.contains("FF0000"));

    let bad = tools
        .call(
            "search_and_replace",
            json!({ "filename": "r", "find_text": "Hello", "replace_text": "Hi", "formatting": { "color": "#FF0000" } }),
        )
        .await;
    assert_eq!(bad.error_kind(), Some(ErrorKind::InvalidArgument));
}

#[tokio::test]
async fn test_replace_across_note_anchor_keeps_notes_consistent() {
    let dir = TempDir::new().unwrap();
    seed(
        &dir,
        "n.docx",
        DocxBuilder::new()
            .raw(r#"<w:p><w:r><w:t>Net margin</w:t><w:footnoteReference w:id="1"/><w:t xml:space="preserve"> rose.</w:t></w:r></w:p>"#)
            .with_footnotes(r#"<w:footnote w:id="1"><w:p><w:r><w:t>Adjusted.</w:t></w:r></w:p></w:footnote>"#),
    );
    let tools = tools(&dir);

    let before = ok(tools.call("validate_document_footnotes", json!({ "filename": "n" })).await);
    assert_eq!(before["consistent"], true);

    let replaced = ok(tools
        .call(
            "search_and_replace",
            json!({ "filename": "n", "find_text": "margin rose", "replace_text": "margins fell" }),
        )
        .await);
    assert_eq!(replaced["replacements"], 1);

    let after = ok(tools
        .call("validate_document_footnotes", json!({ "filename": "n", "kind": "footnote" }))
        .await);
    assert_eq!(after["consistent"], true);
    assert_eq!(after["reports"][0]["anchor_ids"], json!([1]));
    assert_eq!(after["reports"][0]["body_ids"], json!([1]));

    let text = ok(tools.call("get_document_text", json!({ "filename": "n" })).await);
    assert_eq!(text["text"], "Net margins fell.");
}

#[tokio::test]
async fn test_table_merges() {
    let dir = TempDir::new().unwrap();
    seed(
        &dir,
        "t.docx",
        DocxBuilder::new().table(&[&["a1", "b1", "c1"], &["a2", "b2", "c2"], &["a3", "b3", "c3"]]),
    );
    let tools = tools(&dir);

    let merged = ok(tools
        .call(
            "merge_table_cells",
            json!({ "filename": "t", "table_index": 0, "start_row": 0, "start_col": 0, "end_row": 1, "end_col": 1 }),
        )
        .await);
    assert_eq!(merged["merged"]["row_span"], 2);
    assert_eq!(merged["merged"]["text"], "a1\nb1\na2\nb2");

    let overlap = tools
        .call(
            "merge_table_cells_vertical",
            json!({ "filename": "t", "table_index": 0, "col_index": 1, "start_row": 1, "end_row": 2 }),
        )
        .await;
    assert_eq!(overlap.error_kind(), Some(ErrorKind::Overlap));

    ok(tools
        .call(
            "merge_table_cells_horizontal",
            json!({ "filename": "t", "table_index": 0, "row_index": 2, "start_col": 1, "end_col": 2 }),
        )
        .await);

    let shape = ok(tools.call("get_table_shape", json!({ "filename": "t", "table_index": 0 })).await);
    assert_eq!(shape["grid_cols"], 3);
    assert_eq!(shape["rows"][1]["cells"][0]["v_merge"], "continue");
    assert_eq!(shape["rows"][2]["cells"][1]["span"], 2);

    let missing = tools
        .call("get_table_shape", json!({ "filename": "t", "table_index": 4 }))
        .await;
    assert_eq!(missing.error_kind(), Some(ErrorKind::NotFound));
}

#[tokio::test]
async fn test_encryption_round_trip() {
    let dir = TempDir::new().unwrap();
    let original = seed(&dir, "e.docx", DocxBuilder::new().paragraph("secret"));
    let tools = tools(&dir);

    let status = ok(tools.call("get_protection_status", json!({ "filename": "e" })).await);
    assert_eq!(status["encrypted"], false);

    if !cfg!(feature = "encryption") {
        let response = tools
            .call("protect_document", json!({ "filename": "e", "password": "pw" }))
            .await;
        assert_eq!(response.error_kind(), Some(ErrorKind::FeatureDisabled));
        return;
    }

    ok(tools
        .call("protect_document", json!({ "filename": "e", "password": "pw" }))
        .await);
    let status = ok(tools.call("get_protection_status", json!({ "filename": "e" })).await);
    assert_eq!(status["encrypted"], true);

    let again = tools
        .call("protect_document", json!({ "filename": "e", "password": "pw" }))
        .await;
    assert_eq!(again.error_kind(), Some(ErrorKind::AlreadyProtected));
    let edit = tools
        .call("search_and_replace", json!({ "filename": "e", "find_text": "a", "replace_text": "b" }))
        .await;
    assert_eq!(edit.error_kind(), Some(ErrorKind::AlreadyProtected));

    let wrong = tools
        .call("unprotect_document", json!({ "filename": "e", "password": "nope" }))
        .await;
    assert_eq!(wrong.error_kind(), Some(ErrorKind::BadPassword));

    ok(tools
        .call("unprotect_document", json!({ "filename": "e", "password": "pw" }))
        .await);
    assert_eq!(std::fs::read(dir.path().join("e.docx")).unwrap(), original);

    let twice = tools
        .call("unprotect_document", json!({ "filename": "e", "password": "pw" }))
        .await;
    assert_eq!(twice.error_kind(), Some(ErrorKind::NotProtected));
}

#[tokio::test]
async fn test_restricted_editing() {
    let dir = TempDir::new().unwrap();
    seed(&dir, "x.docx", DocxBuilder::new().with_settings("<w:zoom w:percent=\"100\"/>").paragraph("x"));
    let tools = tools(&dir);

    ok(tools
        .call(
            "add_restricted_editing",
            json!({ "filename": "x", "restriction": "comments", "password": "letmein" }),
        )
        .await);
    let status = ok(tools.call("get_protection_status", json!({ "filename": "x" })).await);
    assert_eq!(status["restriction"]["kind"], "comments");
    assert_eq!(status["restriction"]["has_password"], true);

    let wrong = tools
        .call("remove_restricted_editing", json!({ "filename": "x", "password": "guess" }))
        .await;
    assert_eq!(wrong.error_kind(), Some(ErrorKind::BadPassword));

    ok(tools
        .call("remove_restricted_editing", json!({ "filename": "x", "password": "letmein" }))
        .await);
    let status = ok(tools.call("get_protection_status", json!({ "filename": "x" })).await);
    assert_eq!(status["restriction"], Value::Null);

    let none = tools
        .call("remove_restricted_editing", json!({ "filename": "x" }))
        .await;
    assert_eq!(none.error_kind(), Some(ErrorKind::NotProtected));
}

#[tokio::test]
async fn test_copy_document_default_name() {
    let dir = TempDir::new().unwrap();
    let original = seed(&dir, "plan.docx", DocxBuilder::new().paragraph("x"));
    let tools = tools(&dir);

    let copied = ok(tools.call("copy_document", json!({ "source_filename": "plan" })).await);
    assert_eq!(copied["target"], "plan_copy.docx");
    assert_eq!(std::fs::read(dir.path().join("plan_copy.docx")).unwrap(), original);

    let named = ok(tools
        .call("copy_document", json!({ "source_filename": "plan", "destination_filename": "archive/plan" }))
        .await);
    assert_eq!(named["target"], "archive/plan.docx");
}

#[tokio::test]
async fn test_document_info_and_listing() {
    let dir = TempDir::new().unwrap();
    seed(
        &dir,
        "report.docx",
        DocxBuilder::new()
            .with_core_properties("<dc:title>Annual report</dc:title><dc:creator>Finance</dc:creator>")
            .paragraph("Revenue grew strongly.")
            .table(&[&["a"]]),
    );
    seed(&dir, "memo.docx", DocxBuilder::new().paragraph("x"));
    std::fs::write(dir.path().join("readme.txt"), b"not a document").unwrap();
    let tools = tools(&dir);

    let info = ok(tools.call("get_document_info", json!({ "filename": "report" })).await);
    assert_eq!(info["title"], "Annual report");
    assert_eq!(info["creator"], "Finance");
    assert_eq!(info["paragraph_count"], 1);
    assert_eq!(info["table_count"], 1);
    assert_eq!(info["word_count"], 4);
    assert_eq!(info["footnote_count"], 0);

    let listed = ok(tools.call("list_available_documents", json!({})).await);
    assert_eq!(listed["count"], 2);
    assert_eq!(listed["documents"][0]["id"], "memo.docx");
    assert_eq!(listed["documents"][1]["id"], "report.docx");

    let missing = tools
        .call("list_available_documents", json!({ "directory": "absent" }))
        .await;
    assert_eq!(missing.error_kind(), Some(ErrorKind::NotFound));
}
