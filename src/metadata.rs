//! Document-level metadata attached to every chunk.
//!
//! Two sources:
//! - [`pdf_metadata`]: file facts plus the PDF Info dictionary, read via `lopdf`.
//! - [`legal_metadata`]: regex heuristics over the cleaned text (case number,
//!   court, dates, parties, judges, practice areas, document type).

use std::path::Path;

use chrono::{DateTime, Utc};
use lopdf::{Dictionary, Object};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};

const INFO_KEYS: &[(&str, &[u8])] = &[
    ("title", b"Title"),
    ("author", b"Author"),
    ("subject", b"Subject"),
    ("creator", b"Creator"),
    ("producer", b"Producer"),
    ("creation_date", b"CreationDate"),
];

/// File and PDF Info metadata for a loaded document.
pub fn pdf_metadata(path: &Path, pdf: &lopdf::Document) -> Map<String, Value> {
    let mut meta = Map::new();

    if let Some(name) = path.file_name() {
        meta.insert(
            "file_name".into(),
            Value::from(name.to_string_lossy().to_string()),
        );
    }
    meta.insert("page_count".into(), Value::from(pdf.get_pages().len()));

    if let Ok(fs_meta) = std::fs::metadata(path) {
        meta.insert("file_size".into(), Value::from(fs_meta.len()));
        if let Ok(modified) = fs_meta.modified() {
            let modified: DateTime<Utc> = modified.into();
            meta.insert("modified_at".into(), Value::from(modified.to_rfc3339()));
        }
    }

    if let Some(info) = info_dictionary(pdf) {
        for (key, pdf_key) in INFO_KEYS {
            let value = info.get(pdf_key).ok().and_then(|obj| resolve(pdf, obj));
            if let Some(Object::String(bytes, _)) = value {
                let text = decode_pdf_string(bytes);
                let text = text.trim();
                if !text.is_empty() {
                    meta.insert((*key).into(), Value::from(text));
                }
            }
        }
    }

    meta
}

fn info_dictionary(pdf: &lopdf::Document) -> Option<&Dictionary> {
    let info = pdf.trailer.get(b"Info").ok()?;
    resolve(pdf, info)?.as_dict().ok()
}

fn resolve<'a>(pdf: &'a lopdf::Document, obj: &'a Object) -> Option<&'a Object> {
    match obj {
        Object::Reference(id) => pdf.get_object(*id).ok(),
        other => Some(other),
    }
}

/// PDF text strings are UTF-16BE when they carry a BOM, PDFDocEncoding otherwise.
fn decode_pdf_string(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xFE, 0xFF]) {
        let units: Vec<u16> = rest
            .chunks_exact(2)
            .map(|pair| u16::from_be_bytes([pair[0], pair[1]]))
            .collect();
        return String::from_utf16_lossy(&units);
    }
    // PDFDocEncoding agrees with Latin-1 outside a handful of symbols.
    bytes.iter().map(|&b| b as char).collect()
}

static CASE_NUMBER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:case|civil\s+action|docket)\s+no\.?\s*:?\s*([A-Z0-9][A-Z0-9:-]*)")
        .unwrap()
});
static COURT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bIN THE[ \t]+([^\n]*?\bCOURT\b[^\n,]*)").unwrap());
static DATE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"\b(?:January|February|March|April|May|June|July|August|September|October|November|December)[ \t]+\d{1,2},?[ \t]+\d{4}\b",
    )
    .unwrap()
});
static PARTIES: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?m)^[ \t]*([^\n]+?)[ \t]+(?:[vV]\.|[vV][sS]\.|versus)[ \t]+([^\n,]+)").unwrap()
});
static JUDGE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\b(?:Judge|JUDGE)[ \t]+([A-Z][A-Za-z.'-]*(?:[ \t]+[A-Z][A-Za-z.'-]*){0,2})")
        .unwrap()
});

const LEGAL_AREAS: &[(&str, &[&str])] = &[
    ("contract", &["contract", "breach", "agreement", "terms"]),
    ("tort", &["negligence", "liability", "damages", "injury"]),
    ("criminal", &["criminal", "prosecution", "defendant", "guilty"]),
    ("family", &["divorce", "custody", "alimony", "marriage"]),
    (
        "corporate",
        &["corporation", "merger", "securities", "shareholder"],
    ),
    (
        "intellectual_property",
        &["patent", "trademark", "copyright", "infringement"],
    ),
    (
        "employment",
        &[
            "employment",
            "discrimination",
            "harassment",
            "wrongful termination",
        ],
    ),
    (
        "real_estate",
        &["property", "real estate", "zoning", "easement"],
    ),
];

const DOCUMENT_TYPES: &[(&str, &[&str])] = &[
    ("complaint", &["complaint"]),
    ("motion", &["motion"]),
    ("order", &["order"]),
    ("judgment", &["judgment", "judgement"]),
    ("brief", &["brief"]),
    ("opinion", &["opinion"]),
];

/// Heuristic case metadata. `legal_areas` and `document_type` are always
/// present; the other keys only when found.
pub fn legal_metadata(text: &str) -> Map<String, Value> {
    let mut meta = Map::new();

    if let Some(caps) = CASE_NUMBER.captures(text) {
        meta.insert("case_number".into(), Value::from(caps[1].trim()));
    }

    if let Some(caps) = COURT.captures(text) {
        meta.insert("court".into(), Value::from(caps[1].trim()));
    }

    let dates: Vec<&str> = DATE.find_iter(text).map(|m| m.as_str()).take(5).collect();
    if let Some(first) = dates.first() {
        meta.insert("primary_date".into(), Value::from(*first));
        meta.insert("dates_mentioned".into(), Value::from(dates.clone()));
    }

    if let Some(caps) = PARTIES.captures(text) {
        meta.insert("plaintiff".into(), Value::from(caps[1].trim()));
        meta.insert("defendant".into(), Value::from(caps[2].trim()));
    }

    let mut judges: Vec<String> = Vec::new();
    for caps in JUDGE.captures_iter(text) {
        let name = caps[1].trim().to_string();
        if !judges.contains(&name) {
            judges.push(name);
        }
        if judges.len() == 3 {
            break;
        }
    }
    if !judges.is_empty() {
        meta.insert("judges".into(), Value::from(judges));
    }

    let lower = text.to_lowercase();
    let areas: Vec<&str> = LEGAL_AREAS
        .iter()
        .filter(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(area, _)| *area)
        .collect();
    meta.insert("legal_areas".into(), Value::from(areas));

    let document_type = DOCUMENT_TYPES
        .iter()
        .find(|(_, keywords)| keywords.iter().any(|k| lower.contains(k)))
        .map(|(kind, _)| *kind)
        .unwrap_or("unknown");
    meta.insert("document_type".into(), Value::from(document_type));

    meta
}

#[cfg(test)]
mod tests {
    use super::*;

    const CAPTION: &str = "IN THE UNITED STATES DISTRICT COURT FOR THE DISTRICT OF OREGON\n\
Acme Corp. v. Widget Holdings LLC, Defendant\n\
Case No. 3:21-cv-00412\n\
Decided March 4, 2022, Judge Maria Lopez presiding.\n\
The complaint alleges breach of contract. Argued January 10, 2022.";

    #[test]
    fn extracts_caption_fields() {
        let meta = legal_metadata(CAPTION);
        assert_eq!(meta["case_number"], "3:21-cv-00412");
        assert_eq!(
            meta["court"],
            "UNITED STATES DISTRICT COURT FOR THE DISTRICT OF OREGON"
        );
        assert_eq!(meta["plaintiff"], "Acme Corp.");
        assert_eq!(meta["defendant"], "Widget Holdings LLC");
        assert_eq!(meta["primary_date"], "March 4, 2022");
        assert_eq!(meta["dates_mentioned"].as_array().unwrap().len(), 2);
        assert_eq!(meta["judges"][0], "Maria Lopez");
        assert_eq!(meta["document_type"], "complaint");
        let areas = meta["legal_areas"].as_array().unwrap();
        assert!(areas.contains(&Value::from("contract")));
    }

    #[test]
    fn plain_text_gets_defaults_only() {
        let meta = legal_metadata("nothing of note here");
        assert_eq!(meta["document_type"], "unknown");
        assert_eq!(meta["legal_areas"], Value::Array(vec![]));
        assert!(!meta.contains_key("case_number"));
        assert!(!meta.contains_key("judges"));
    }

    #[test]
    fn decodes_utf16_and_latin1() {
        assert_eq!(decode_pdf_string(&[0xFE, 0xFF, 0x00, 0x41, 0x00, 0xE9]), "Aé");
        assert_eq!(decode_pdf_string(b"Caf\xE9"), "Café");
    }

    fn pdf_with_info() -> Vec<u8> {
        let objects: [&[u8]; 4] = [
            b"1 0 obj << /Type /Catalog /Pages 2 0 R >> endobj\n",
            b"2 0 obj << /Type /Pages /Kids [3 0 R] /Count 1 >> endobj\n",
            b"3 0 obj << /Type /Page /Parent 2 0 R /MediaBox [0 0 612 792] >> endobj\n",
            b"4 0 obj << /Title (Smith v. Jones) /Author <FEFF004A0044> >> endobj\n",
        ];
        let mut out = b"%PDF-1.4\n".to_vec();
        let mut offsets = Vec::new();
        for obj in objects {
            offsets.push(out.len());
            out.extend_from_slice(obj);
        }
        let xref_start = out.len();
        out.extend_from_slice(b"xref\n0 5\n");
        out.extend_from_slice(format!("{:010} 65535 f \n", 0).as_bytes());
        for off in offsets {
            out.extend_from_slice(format!("{:010} 00000 n \n", off).as_bytes());
        }
        out.extend_from_slice(b"trailer << /Size 5 /Root 1 0 R /Info 4 0 R >>\nstartxref\n");
        out.extend_from_slice(format!("{}\n%%EOF\n", xref_start).as_bytes());
        out
    }

    #[test]
    fn reads_info_dictionary() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("smith.pdf");
        let bytes = pdf_with_info();
        std::fs::write(&path, &bytes).unwrap();

        let pdf = lopdf::Document::load_mem(&bytes).unwrap();
        let meta = pdf_metadata(&path, &pdf);
        assert_eq!(meta["file_name"], "smith.pdf");
        assert_eq!(meta["page_count"], 1);
        assert_eq!(meta["file_size"], bytes.len() as u64);
        assert_eq!(meta["title"], "Smith v. Jones");
        assert_eq!(meta["author"], "JD");
        assert!(meta.contains_key("modified_at"));
        assert!(!meta.contains_key("producer"));
    }
}
