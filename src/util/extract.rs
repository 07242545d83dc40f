use std::{fmt, fs, path::Path};

use anyhow::{anyhow, Context};
use docx_rs::{
    DocumentChild, InsertChild, Paragraph, ParagraphChild, Run, RunChild, Table, TableCellContent,
    TableChild, TableRowChild,
};

/// Upload formats the checker can read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DocumentFormat {
    Pdf,
    Docx,
}

impl DocumentFormat {
    /// Resolve the format from a file name's extension, ignoring case.
    pub fn from_file_name(name: &str) -> Option<Self> {
        let extension = Path::new(name).extension()?.to_str()?;
        match extension.to_ascii_lowercase().as_str() {
            "pdf" => Some(DocumentFormat::Pdf),
            "docx" => Some(DocumentFormat::Docx),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            DocumentFormat::Pdf => "pdf",
            DocumentFormat::Docx => "docx",
        }
    }
}

impl fmt::Display for DocumentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Turns a staged upload into plain text. Implementations block and are run
/// on the blocking pool.
pub trait TextExtractor: Send + Sync {
    fn extract(&self, path: &Path, format: DocumentFormat) -> anyhow::Result<String>;
}

/// Reads PDFs with `pdf-extract` and Word documents with `docx-rs`.
#[derive(Debug, Clone, Copy, Default)]
pub struct FileTextExtractor;

impl TextExtractor for FileTextExtractor {
    fn extract(&self, path: &Path, format: DocumentFormat) -> anyhow::Result<String> {
        match format {
            DocumentFormat::Pdf => extract_pdf(path),
            DocumentFormat::Docx => extract_docx(path),
        }
    }
}

fn extract_pdf(path: &Path) -> anyhow::Result<String> {
    let bytes = fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
    pdf_extract::extract_text_from_mem(&bytes).map_err(|err| anyhow!("invalid pdf: {err}"))
}

fn extract_docx(path: &Path) -> anyhow::Result<String> {
    let bytes = fs::read(path).with_context(|| format!("cannot read {}", path.display()))?;
    let docx = docx_rs::read_docx(&bytes).map_err(|err| anyhow!("invalid docx: {err:?}"))?;

    let mut lines = Vec::new();
    for child in &docx.document.children {
        match child {
            DocumentChild::Paragraph(para) => push_line(&mut lines, paragraph_text(para)),
            DocumentChild::Table(table) => table_lines(table, &mut lines),
            _ => {}
        }
    }

    Ok(lines.join("\n"))
}

fn push_line(lines: &mut Vec<String>, text: String) {
    if !text.trim().is_empty() {
        lines.push(text);
    }
}

/// Every cell paragraph becomes its own line, row by row. Nested tables are walked in place.
fn table_lines(table: &Table, lines: &mut Vec<String>) {
    for TableChild::TableRow(row) in &table.rows {
        for TableRowChild::TableCell(cell) in &row.cells {
            for content in &cell.children {
                match content {
                    TableCellContent::Paragraph(para) => push_line(lines, paragraph_text(para)),
                    TableCellContent::Table(nested) => table_lines(nested, lines),
                    _ => {}
                }
            }
        }
    }
}

// Runs inside one paragraph belong to the same line, so they join without a separator.
fn paragraph_text(para: &Paragraph) -> String {
    let mut text = String::new();
    paragraph_children_text(&para.children, &mut text);
    text
}

fn paragraph_children_text(children: &[ParagraphChild], text: &mut String) {
    for child in children {
        match child {
            ParagraphChild::Run(run) => run_text(run, text),
            ParagraphChild::Hyperlink(link) => paragraph_children_text(&link.children, text),
            ParagraphChild::Insert(insert) => {
                for insert_child in &insert.children {
                    if let InsertChild::Run(run) = insert_child {
                        run_text(run, text);
                    }
                }
            }
            _ => {}
        }
    }
}

fn run_text(run: &Run, text: &mut String) {
    for run_child in &run.children {
        match run_child {
            RunChild::Text(t) => text.push_str(&t.text),
            RunChild::Tab(_) => text.push('\t'),
            RunChild::Break(_) => text.push('\n'),
            _ => {}
        }
    }
}
