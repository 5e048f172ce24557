pub mod diagnostic;
pub mod font;
pub mod layout;
pub mod render;

use chrono::NaiveDate;
use serde::Serialize;
use std::path::{Path, PathBuf};

pub use diagnostic::DiagnosticReport;
pub use font::ReportFont;

#[derive(Debug, Clone, Serialize)]
pub struct ReportError {
    pub code: &'static str,
    pub message: String,
}

impl ReportError {
    pub fn new(code: &'static str, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct ReportOptions {
    pub out_dir: PathBuf,
    pub template: Option<PathBuf>,
    pub font: Option<PathBuf>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratedReport {
    pub path: PathBuf,
    pub file_name: String,
    pub page_count: usize,
    pub byte_len: usize,
}

/// `Diagnostika_AI_<name>_<YYYY-MM-DD>.pdf`; whitespace runs and path
/// separators in the name become `_`.
pub fn report_file_name(name: &str, date: NaiveDate) -> String {
    let mut cleaned = String::with_capacity(name.len());
    let mut in_gap = false;
    for ch in name.chars() {
        if ch.is_whitespace() || ch == '/' || ch == '\\' {
            if !in_gap {
                cleaned.push('_');
            }
            in_gap = true;
        } else {
            cleaned.push(ch);
            in_gap = false;
        }
    }
    format!("Diagnostika_AI_{}_{}.pdf", cleaned, date.format("%Y-%m-%d"))
}

/// Lays out and renders the report. Returns the PDF bytes and page count.
pub fn build_pdf(
    report: &DiagnosticReport,
    font: &mut ReportFont,
    template: Option<&[u8]>,
) -> Result<(Vec<u8>, usize), ReportError> {
    let pages = {
        let mut layout = layout::Layout::new(&*font);
        diagnostic::compose(&mut layout, report);
        layout.finish()
    };
    let bytes = render::render(&pages, font, template)?;
    Ok((bytes, pages.len()))
}

fn read_template(path: &Path) -> Result<Vec<u8>, ReportError> {
    std::fs::read(path)
        .map_err(|e| ReportError::new("template_load_failed", format!("{}: {}", path.display(), e)))
}

pub fn generate_diagnostic_pdf(
    report: &DiagnosticReport,
    opts: &ReportOptions,
) -> Result<GeneratedReport, ReportError> {
    let mut font = ReportFont::load_or_bundled(opts.font.as_deref())?;
    let template = match opts.template.as_deref() {
        Some(p) => Some(read_template(p)?),
        None => None,
    };
    let (bytes, page_count) = build_pdf(report, &mut font, template.as_deref())?;

    std::fs::create_dir_all(&opts.out_dir)
        .map_err(|e| ReportError::new("io_failed", e.to_string()))?;
    let file_name = report_file_name(&report.contact.name, report.generated_on);
    let path = opts.out_dir.join(&file_name);
    std::fs::write(&path, &bytes).map_err(|e| ReportError::new("io_failed", e.to_string()))?;
    log::info!(
        "diagnostic report written: {} ({} pages, {} bytes)",
        path.display(),
        page_count,
        bytes.len()
    );
    Ok(GeneratedReport {
        path,
        file_name,
        page_count,
        byte_len: bytes.len(),
    })
}
