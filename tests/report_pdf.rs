mod test_support;

use serde_json::json;
use std::path::Path;
use test_support::{request_err, request_ok, select_workspace, spawn_sidecar, submit_diagnostic, temp_dir};

const SYSTEM_TTF: &str = "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf";

/// One A4 page with a filled header band, as a letterhead stand-in.
fn write_template(path: &Path) {
    use lopdf::content::{Content, Operation};
    use lopdf::{dictionary, Document, Object, Stream};

    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let content = Content {
        operations: vec![
            Operation::new("rg", vec![0.into(), 0.into(), 1.into()]),
            Operation::new("re", vec![0.into(), 780.into(), 595.into(), 62.into()]),
            Operation::new("f", vec![]),
        ],
    };
    let content_id = doc.add_object(Stream::new(
        dictionary! {},
        content.encode().expect("encode template content"),
    ));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => dictionary! {},
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
            "MediaBox" => vec![0.into(), 0.into(), 595.into(), 842.into()],
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.save(path).expect("save template");
}

/// BaseFont of every Type0 font in the document.
fn type0_fonts(doc: &lopdf::Document) -> Vec<String> {
    doc.objects
        .values()
        .filter_map(|o| o.as_dict().ok())
        .filter(|d| d.get(b"Subtype").and_then(|s| s.as_name()).ok() == Some(b"Type0".as_slice()))
        .filter_map(|d| d.get(b"BaseFont").and_then(|n| n.as_name()).ok())
        .map(|n| String::from_utf8_lossy(n).into_owned())
        .collect()
}

fn page_count(path: &Path) -> usize {
    let doc = lopdf::Document::load(path).expect("load generated pdf");
    doc.get_pages().len()
}

#[test]
fn stored_diagnostic_renders_to_pdf() {
    let workspace = temp_dir("quizd-report");
    let out_dir = workspace.join("reports");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();
    select_workspace(&mut stdin, &mut reader, &workspace);

    let _ = submit_diagnostic(
        &mut stdin,
        &mut reader,
        &test_support::READY_RATINGS,
        "Анна Петрова",
    );

    let out = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "reports.diagnosticPdf",
        json!({ "auditNumber": 1, "outDir": out_dir.to_string_lossy() }),
    );
    let file_name = out["fileName"].as_str().expect("file name");
    assert!(file_name.starts_with("Diagnostika_AI_Анна_Петрова_"));
    assert!(file_name.ends_with(".pdf"));
    assert_eq!(out["auditNumber"], 1);

    let path = out_dir.join(file_name);
    let bytes = std::fs::read(&path).expect("pdf written");
    assert!(bytes.starts_with(b"%PDF"));
    assert_eq!(out["byteLen"].as_u64(), Some(bytes.len() as u64));
    let pages = out["pageCount"].as_u64().expect("page count") as usize;
    assert!(pages >= 2, "summary plus analysis pages");
    assert_eq!(page_count(&path), pages);
    let doc = lopdf::Document::load(&path).expect("load");
    assert_eq!(type0_fonts(&doc), vec!["DejaVuSans".to_string()], "bundled Cyrillic font embedded");

    let code = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "reports.diagnosticPdf",
        json!({ "auditNumber": 42, "outDir": out_dir.to_string_lossy() }),
    );
    assert_eq!(code, "not_found");

    let code = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "reports.diagnosticPdf",
        json!({ "auditNumber": 1 }),
    );
    assert_eq!(code, "bad_params");

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn inline_results_render_onto_a_template() {
    let dir = temp_dir("quizd-report-template");
    let template = dir.join("letterhead.pdf");
    write_template(&template);

    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let results = json!({
        "auditNumber": 7,
        "completedAt": "2025-02-10T09:30:00+00:00",
        "categoryScores": { "data": 2, "processes": 1, "people": 2, "results": 2 },
        "contactInfo": { "name": "Иван", "company": "ООО Вектор", "email": "ivan@example.com" },
    });
    let out = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "reports.diagnosticPdf",
        json!({
            "results": results,
            "outDir": dir.to_string_lossy(),
            "templatePath": template.to_string_lossy(),
        }),
    );
    assert_eq!(out["auditNumber"], 7);
    let path = dir.join(out["fileName"].as_str().expect("file name"));
    let doc = lopdf::Document::load(&path).expect("load");
    let pages = doc.get_pages();
    assert_eq!(pages.len() as u64, out["pageCount"].as_u64().expect("pages"));
    for (_, id) in pages {
        let page = doc.get_dictionary(id).expect("page dict");
        let contents = page
            .get(b"Contents")
            .and_then(|c| c.as_array())
            .expect("contents array");
        assert!(contents.len() > 1, "template stream plus overlay");
    }

    let code = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "reports.diagnosticPdf",
        json!({ "results": { "auditNumber": 7 }, "outDir": dir.to_string_lossy() }),
    );
    assert_eq!(code, "bad_params");

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn missing_template_or_font_is_reported() {
    let dir = temp_dir("quizd-report-errors");
    let (mut child, mut stdin, mut reader) = spawn_sidecar();

    let results = json!({
        "auditNumber": 3,
        "categoryScores": { "data": 4, "processes": 4, "people": 4, "results": 4 },
    });
    let code = request_err(
        &mut stdin,
        &mut reader,
        "1",
        "reports.diagnosticPdf",
        json!({
            "results": results.clone(),
            "outDir": dir.to_string_lossy(),
            "templatePath": dir.join("missing.pdf").to_string_lossy(),
        }),
    );
    assert_eq!(code, "template_load_failed");

    let not_a_pdf = dir.join("broken.pdf");
    std::fs::write(&not_a_pdf, b"hello").expect("write");
    let code = request_err(
        &mut stdin,
        &mut reader,
        "2",
        "reports.diagnosticPdf",
        json!({
            "results": results.clone(),
            "outDir": dir.to_string_lossy(),
            "templatePath": not_a_pdf.to_string_lossy(),
        }),
    );
    assert_eq!(code, "template_load_failed");

    let code = request_err(
        &mut stdin,
        &mut reader,
        "3",
        "reports.diagnosticPdf",
        json!({
            "results": results.clone(),
            "outDir": dir.to_string_lossy(),
            "fontPath": dir.join("missing.ttf").to_string_lossy(),
        }),
    );
    assert_eq!(code, "font_load_failed");

    drop(stdin);
    let _ = child.wait();
}

#[test]
fn configured_font_replaces_the_bundled_one() {
    if !Path::new(SYSTEM_TTF).is_file() {
        eprintln!("skipping: {} not installed", SYSTEM_TTF);
        return;
    }
    let dir = temp_dir("quizd-report-font");
    let font = dir.join("Corporate-Sans.ttf");
    std::fs::copy(SYSTEM_TTF, &font).expect("copy font");
    let font_path = font.to_string_lossy().to_string();
    let (mut child, mut stdin, mut reader) =
        test_support::spawn_sidecar_with(&[("QUIZD_REPORT_FONT", font_path.as_str())]);

    let out = request_ok(
        &mut stdin,
        &mut reader,
        "1",
        "reports.diagnosticPdf",
        json!({
            "results": {
                "auditNumber": 12,
                "categoryScores": { "data": 5, "processes": 4, "people": 3, "results": 5 },
                "contactInfo": { "name": "Мария", "telegram": "@maria" },
            },
            "outDir": dir.to_string_lossy(),
        }),
    );
    let path = dir.join(out["fileName"].as_str().expect("file name"));
    let doc = lopdf::Document::load(&path).expect("load");
    assert_eq!(type0_fonts(&doc), vec!["Corporate-Sans".to_string()]);

    drop(stdin);
    let _ = child.wait();
}
