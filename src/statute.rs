//! Structured statute titles (US Code style) in JSON or XML.
//!
//! Both formats reduce to the same tree: element names become object keys,
//! repeated children become arrays, attributes are kept under `@name` and
//! mixed text under `#text`. XML elements with children also carry their
//! full text in document order under `#content`, since the keyed tree
//! regroups siblings by name. The required path is `main.title.chapter`,
//! under an optional `uscDoc` (or `document`) root. `chapter` may be a
//! single object or an array.

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::{Map, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StatuteError {
    #[error("Invalid statute JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Invalid statute XML: {0}")]
    Xml(String),
    #[error("Does not have main as direct child")]
    MissingMain,
    #[error("Does not have chapter as direct child")]
    MissingChapter,
    #[error("Appendix documents are not supported")]
    Appendix,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Chapter {
    pub num: String,
    pub heading: String,
    /// Every text leaf of the chapter in document order, one per line.
    pub text: String,
}

impl Chapter {
    /// Section title used for chunk tagging: `"{num} {heading}"`.
    pub fn title(&self) -> String {
        format!("{} {}", self.num, self.heading).trim().to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Statute {
    pub title_number: String,
    pub title_heading: String,
    pub chapters: Vec<Chapter>,
}

pub fn parse_json(bytes: &[u8]) -> Result<Statute, StatuteError> {
    let root: Value = serde_json::from_slice(bytes)?;
    from_tree(&root)
}

pub fn parse_xml(bytes: &[u8]) -> Result<Statute, StatuteError> {
    let root = xml_to_tree(bytes)?;
    from_tree(&root)
}

fn from_tree(root: &Value) -> Result<Statute, StatuteError> {
    let doc = root
        .get("uscDoc")
        .or_else(|| root.get("document"))
        .unwrap_or(root);
    if root.get("appendix").is_some() || doc.get("appendix").is_some() {
        return Err(StatuteError::Appendix);
    }

    let main = doc.get("main").ok_or(StatuteError::MissingMain)?;
    let title = main.get("title").ok_or(StatuteError::MissingChapter)?;
    let chapters = title.get("chapter").ok_or(StatuteError::MissingChapter)?;

    let chapters = match chapters {
        Value::Array(items) => items.iter().map(chapter_from).collect(),
        single => vec![chapter_from(single)],
    };

    Ok(Statute {
        title_number: title.get("num").map(text_of).unwrap_or_default(),
        title_heading: title.get("heading").map(text_of).unwrap_or_default(),
        chapters,
    })
}

fn chapter_from(value: &Value) -> Chapter {
    let mut lines = Vec::new();
    collect_text(value, &mut lines);
    Chapter {
        num: value.get("num").map(text_of).unwrap_or_default(),
        heading: value.get("heading").map(text_of).unwrap_or_default(),
        text: lines.join("\n"),
    }
}

/// Flattened text of a node, whitespace-normalized to a single line.
fn text_of(value: &Value) -> String {
    let mut lines = Vec::new();
    collect_text(value, &mut lines);
    lines.join(" ").split_whitespace().collect::<Vec<_>>().join(" ")
}

fn collect_text(value: &Value, out: &mut Vec<String>) {
    match value {
        Value::String(s) => {
            let s = s.trim();
            if !s.is_empty() {
                out.push(s.to_string());
            }
        }
        Value::Number(n) => out.push(n.to_string()),
        Value::Array(items) => items.iter().for_each(|v| collect_text(v, out)),
        Value::Object(map) => {
            if let Some(Value::String(content)) = map.get(CONTENT_KEY) {
                out.extend(
                    content
                        .lines()
                        .map(str::trim)
                        .filter(|l| !l.is_empty())
                        .map(String::from),
                );
                return;
            }
            for (key, v) in map {
                if key.starts_with('@') {
                    continue;
                }
                collect_text(v, out);
            }
        }
        Value::Bool(_) | Value::Null => {}
    }
}

/// USLM elements that flow inside a line of text rather than starting one.
const INLINE_ELEMENTS: &[&str] = &[
    "ref", "date", "i", "b", "inline", "sup", "sub", "span", "term", "quotedText",
    "shortTitle", "del", "ins", "footnoteRef", "entity",
];

/// Key holding an element's text in document order, when it has child elements.
const CONTENT_KEY: &str = "#content";

struct Frame {
    name: String,
    children: Map<String, Value>,
    text: String,
    /// Own text and descendant text interleaved in document order.
    content: String,
    has_elements: bool,
}

impl Frame {
    fn open(e: &BytesStart<'_>) -> Result<Self, StatuteError> {
        let name = String::from_utf8_lossy(e.local_name().as_ref()).to_string();
        let mut children = Map::new();
        for attr in e.attributes() {
            let attr = attr.map_err(|err| StatuteError::Xml(err.to_string()))?;
            let key = String::from_utf8_lossy(attr.key.local_name().as_ref()).to_string();
            let value = attr
                .unescape_value()
                .map_err(|err| StatuteError::Xml(err.to_string()))?;
            children.insert(format!("@{}", key), Value::from(value.as_ref()));
        }
        Ok(Self {
            name,
            children,
            text: String::new(),
            content: String::new(),
            has_elements: false,
        })
    }

    fn push_text(&mut self, text: &str) {
        let text = text.trim();
        if text.is_empty() {
            return;
        }
        join_inline(&mut self.text, text);
        join_inline(&mut self.content, text);
    }

    fn push_child(&mut self, child: Closed) {
        self.has_elements = true;
        if INLINE_ELEMENTS.contains(&child.name.as_str()) {
            join_inline(&mut self.content, &child.content);
        } else if !child.content.is_empty() {
            let kept = self.content.trim_end().len();
            self.content.truncate(kept);
            if !self.content.is_empty() {
                self.content.push('\n');
            }
            self.content.push_str(&child.content);
            self.content.push('\n');
        }
        attach(&mut self.children, child.name, child.value);
    }

    fn close(self) -> Closed {
        let text = self.text.trim().to_string();
        let content = self.content.trim().to_string();
        if self.children.is_empty() {
            return Closed {
                name: self.name,
                value: Value::String(text),
                content,
            };
        }
        let mut children = self.children;
        if !text.is_empty() {
            children.insert("#text".into(), Value::String(text));
        }
        if self.has_elements {
            children.insert(CONTENT_KEY.into(), Value::String(content.clone()));
        }
        Closed {
            name: self.name,
            value: Value::Object(children),
            content,
        }
    }
}

struct Closed {
    name: String,
    value: Value,
    content: String,
}

/// Appends `text` on the current line, space separated.
fn join_inline(out: &mut String, text: &str) {
    if text.is_empty() {
        return;
    }
    if !out.is_empty() && !out.ends_with('\n') {
        out.push(' ');
    }
    out.push_str(text);
}

fn attach(parent: &mut Map<String, Value>, name: String, value: Value) {
    match parent.get_mut(&name) {
        Some(Value::Array(items)) => items.push(value),
        Some(existing) => {
            let first = existing.take();
            *existing = Value::Array(vec![first, value]);
        }
        None => {
            parent.insert(name, value);
        }
    }
}

fn xml_to_tree(bytes: &[u8]) -> Result<Value, StatuteError> {
    let mut reader = Reader::from_reader(bytes);
    reader.config_mut().trim_text(true);

    let mut stack: Vec<Frame> = Vec::new();
    let mut root = Map::new();
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => stack.push(Frame::open(&e)?),
            Ok(Event::Empty(e)) => {
                let closed = Frame::open(&e)?.close();
                match stack.last_mut() {
                    Some(parent) => parent.push_child(closed),
                    None => attach(&mut root, closed.name, closed.value),
                }
            }
            Ok(Event::End(_)) => {
                let closed = stack
                    .pop()
                    .ok_or_else(|| StatuteError::Xml("unbalanced end tag".into()))?
                    .close();
                match stack.last_mut() {
                    Some(parent) => parent.push_child(closed),
                    None => attach(&mut root, closed.name, closed.value),
                }
            }
            Ok(Event::Text(t)) => {
                if let Some(frame) = stack.last_mut() {
                    let text = t.unescape().map_err(|e| StatuteError::Xml(e.to_string()))?;
                    frame.push_text(&text);
                }
            }
            Ok(Event::CData(t)) => {
                if let Some(frame) = stack.last_mut() {
                    frame.push_text(&String::from_utf8_lossy(&t));
                }
            }
            Ok(Event::Eof) => break,
            Err(e) => return Err(StatuteError::Xml(e.to_string())),
            _ => {}
        }
        buf.clear();
    }

    if !stack.is_empty() {
        return Err(StatuteError::Xml("unexpected end of document".into()));
    }
    Ok(Value::Object(root))
}

#[cfg(test)]
mod tests {
    use super::*;

    const TITLE_JSON: &str = r#"{
      "uscDoc": {
        "meta": {"docNumber": "1"},
        "main": {
          "title": {
            "num": "Title 1",
            "heading": "GENERAL PROVISIONS",
            "chapter": [
              {
                "num": "CHAPTER 1",
                "heading": "RULES OF CONSTRUCTION",
                "section": [
                  {"@identifier": "/us/usc/t1/s1", "num": "§ 1.", "heading": "Words denoting number", "content": "Words importing the singular include the plural."},
                  {"num": "§ 2.", "heading": "County as including parish", "content": "The word county includes a parish."}
                ]
              },
              {"num": "CHAPTER 2", "heading": "ACTS AND RESOLUTIONS", "content": "Enacting clauses follow."}
            ]
          }
        }
      }
    }"#;

    #[test]
    fn parses_json_chapters_in_order() {
        let statute = parse_json(TITLE_JSON.as_bytes()).unwrap();
        assert_eq!(statute.title_number, "Title 1");
        assert_eq!(statute.title_heading, "GENERAL PROVISIONS");
        assert_eq!(statute.chapters.len(), 2);

        let first = &statute.chapters[0];
        assert_eq!(first.title(), "CHAPTER 1 RULES OF CONSTRUCTION");
        let plural = first.text.find("singular include the plural").unwrap();
        let parish = first.text.find("includes a parish").unwrap();
        assert!(plural < parish);
        assert!(!first.text.contains("/us/usc"));
    }

    #[test]
    fn single_chapter_object() {
        let src = r#"{"main": {"title": {"num": "5", "heading": "X", "chapter": {"num": "1", "heading": "Only", "content": "Body text."}}}}"#;
        let statute = parse_json(src.as_bytes()).unwrap();
        assert_eq!(statute.chapters.len(), 1);
        assert_eq!(statute.chapters[0].title(), "1 Only");
    }

    #[test]
    fn structural_errors() {
        let err = parse_json(br#"{"uscDoc": {"meta": {}}}"#).unwrap_err();
        assert_eq!(err.to_string(), "Does not have main as direct child");

        let err = parse_json(br#"{"uscDoc": {"main": {"title": {"num": "1"}}}}"#).unwrap_err();
        assert_eq!(err.to_string(), "Does not have chapter as direct child");

        let err = parse_json(br#"{"uscDoc": {"appendix": {"num": "5a"}}}"#).unwrap_err();
        assert_eq!(err.to_string(), "Appendix documents are not supported");

        assert!(matches!(
            parse_json(b"{not json"),
            Err(StatuteError::Json(_))
        ));
    }

    #[test]
    fn parses_xml() {
        let xml = r#"<?xml version="1.0"?>
<uscDoc xmlns="http://xml.house.gov/schemas/uslm/1.0">
  <main>
    <title identifier="/us/usc/t2">
      <num value="2">Title 2&#8212;</num>
      <heading>THE CONGRESS</heading>
      <chapter><num>CHAPTER 1</num><heading>ELECTION OF SENATORS</heading>
        <section><num>§ 1.</num><content>Senators shall be elected &amp; seated.</content></section>
      </chapter>
      <chapter><num>CHAPTER 2</num><heading>ORGANIZATION</heading><content><![CDATA[Members meet.]]></content></chapter>
    </title>
  </main>
</uscDoc>"#;
        let statute = parse_xml(xml.as_bytes()).unwrap();
        assert_eq!(statute.title_number, "Title 2\u{2014}");
        assert_eq!(statute.title_heading, "THE CONGRESS");
        assert_eq!(statute.chapters.len(), 2);
        assert!(statute.chapters[0].text.contains("elected & seated."));
        assert_eq!(statute.chapters[1].title(), "CHAPTER 2 ORGANIZATION");
        assert!(statute.chapters[1].text.contains("Members meet."));
    }

    fn chapter_xml(body: &str) -> String {
        format!(
            r#"<uscDoc><main><title><num>1</num><heading>T</heading>
<chapter><num>CHAPTER 1</num><heading>H</heading>{}</chapter>
</title></main></uscDoc>"#,
            body
        )
    }

    #[test]
    fn inline_references_stay_in_the_sentence() {
        let xml = chapter_xml(
            r#"<content>See <ref href="/us/usc/t1/s5">section 5</ref> of this title, effective <date date="1947-07-30">July 30, 1947</date>.</content>"#,
        );
        let statute = parse_xml(xml.as_bytes()).unwrap();
        let text = &statute.chapters[0].text;
        assert_eq!(
            text,
            "CHAPTER 1\nH\nSee section 5 of this title, effective July 30, 1947 ."
        );
        assert!(!text.contains("/us/usc"));
    }

    #[test]
    fn interleaved_siblings_keep_document_order() {
        let xml = chapter_xml(
            "<section>FIRST</section><note>SECOND</note><section>THIRD</section>",
        );
        let statute = parse_xml(xml.as_bytes()).unwrap();
        assert_eq!(statute.chapters[0].text, "CHAPTER 1\nH\nFIRST\nSECOND\nTHIRD");
    }

    #[test]
    fn malformed_xml() {
        assert!(matches!(
            parse_xml(b"<uscDoc><main></uscDoc>"),
            Err(StatuteError::Xml(_))
        ));
    }
}
