//! Owned element tree for converted `.opi` displays.
//!
//! Displays are plain XML without mixed content: an element carries either
//! text (possibly CDATA, as for embedded scripts) or child elements.
//! Comments and processing instructions are dropped on read.

use std::fs;
use std::path::Path;

use quick_xml::Reader;
use quick_xml::Writer;
use quick_xml::events::{BytesCData, BytesDecl, BytesEnd, BytesStart, BytesText, Event};

use crate::core::error::{Error, Result};
use crate::infra::utils::FsUtils;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Element {
    pub tag: String,
    pub attributes: Vec<(String, String)>,
    pub text: Option<String>,
    /// Write `text` back as a CDATA section
    pub cdata: bool,
    pub children: Vec<Element>,
}

impl Element {
    pub fn new(tag: impl Into<String>) -> Self {
        Self {
            tag: tag.into(),
            ..Self::default()
        }
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    pub fn with_cdata(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self.cdata = true;
        self
    }

    pub fn with_attribute(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.set_attribute(name, value);
        self
    }

    pub fn with_child(mut self, child: Element) -> Self {
        self.children.push(child);
        self
    }

    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }

    pub fn set_attribute(&mut self, name: impl Into<String>, value: impl Into<String>) {
        let name = name.into();
        let value = value.into();
        match self.attributes.iter_mut().find(|(k, _)| *k == name) {
            Some(slot) => slot.1 = value,
            None => self.attributes.push((name, value)),
        }
    }

    /// First descendant (depth-first) with the given tag.
    pub fn find(&self, tag: &str) -> Option<&Element> {
        self.children
            .iter()
            .find_map(|c| if c.tag == tag { Some(c) } else { c.find(tag) })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
    /// Emit `<?xml version="1.0" encoding="UTF-8"?>` on write
    pub declaration: bool,
    pub root: Element,
}

impl Document {
    pub fn new(root: Element) -> Self {
        Self {
            declaration: true,
            root,
        }
    }

    pub fn parse(xml: &str) -> Result<Self> {
        parse_document(xml).map_err(|e| Error::Document {
            path: "<memory>".into(),
            reason: e.to_string(),
        })
    }

    pub fn read(path: &Path) -> Result<Self> {
        let xml = fs::read_to_string(path)?;
        parse_document(&xml).map_err(|e| Error::Document {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
    }

    pub fn to_xml_string(&self) -> Result<String> {
        write_document(self).map_err(|e| Error::Document {
            path: "<memory>".into(),
            reason: e.to_string(),
        })
    }

    /// Serialize to `path`, replacing a read-only file if present.
    pub fn write(&self, path: &Path) -> Result<()> {
        let xml = write_document(self).map_err(|e| Error::Document {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })?;
        FsUtils::write_text(path, &xml)?;
        Ok(())
    }
}

fn parse_document(xml: &str) -> std::result::Result<Document, BoxError> {
    let mut reader = Reader::from_str(xml);

    let mut stack: Vec<Element> = Vec::new();
    let mut root: Option<Element> = None;
    let mut declaration = false;

    loop {
        match reader.read_event()? {
            Event::Start(start) => stack.push(element_from(&start)?),
            Event::Empty(start) => attach(&mut stack, &mut root, element_from(&start)?)?,
            Event::End(_) => {
                let mut done = stack.pop().ok_or("unbalanced end tag")?;
                drop_layout_text(&mut done);
                attach(&mut stack, &mut root, done)?;
            }
            Event::Text(text) => {
                if let Some(top) = stack.last_mut() {
                    let text = text.unescape()?;
                    // Indentation around a CDATA section
                    if top.cdata && is_blank(&text) {
                        continue;
                    }
                    top.text.get_or_insert_with(String::new).push_str(&text);
                }
            }
            Event::CData(data) => {
                if let Some(top) = stack.last_mut() {
                    if !top.cdata && top.text.as_deref().is_some_and(is_blank) {
                        top.text = None;
                    }
                    top.text
                        .get_or_insert_with(String::new)
                        .push_str(&String::from_utf8_lossy(&data));
                    top.cdata = true;
                }
            }
            Event::Decl(_) => declaration = true,
            Event::Eof => break,
            _ => {}
        }
    }

    if !stack.is_empty() {
        return Err("unexpected end of document".into());
    }
    let root = root.ok_or("document has no root element")?;
    Ok(Document { declaration, root })
}

fn is_blank(text: &str) -> bool {
    text.chars().all(char::is_whitespace)
}

/// Text of an element with children is layout between the child tags.
/// Leaf text is kept exactly as written.
fn drop_layout_text(element: &mut Element) {
    if element.children.is_empty() || element.cdata {
        return;
    }
    element.text = element
        .text
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string);
}

fn element_from(start: &BytesStart<'_>) -> std::result::Result<Element, BoxError> {
    let mut element = Element::new(String::from_utf8_lossy(start.name().as_ref()));
    for attr in start.attributes() {
        let attr = attr?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = attr.unescape_value()?.into_owned();
        element.attributes.push((key, value));
    }
    Ok(element)
}

fn attach(
    stack: &mut [Element],
    root: &mut Option<Element>,
    element: Element,
) -> std::result::Result<(), BoxError> {
    match stack.last_mut() {
        Some(parent) => parent.children.push(element),
        None if root.is_none() => *root = Some(element),
        None => return Err("more than one root element".into()),
    }
    Ok(())
}

fn write_document(doc: &Document) -> std::result::Result<String, BoxError> {
    let mut writer = Writer::new_with_indent(Vec::new(), b' ', 2);
    if doc.declaration {
        writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    }
    write_element(&mut writer, &doc.root)?;

    let mut xml = String::from_utf8(writer.into_inner())?;
    xml.push('\n');
    Ok(xml)
}

fn write_element(
    writer: &mut Writer<Vec<u8>>,
    element: &Element,
) -> std::result::Result<(), BoxError> {
    let mut start = BytesStart::new(element.tag.as_str());
    for (key, value) in &element.attributes {
        start.push_attribute((key.as_str(), value.as_str()));
    }

    if element.text.is_none() && element.children.is_empty() {
        writer.write_event(Event::Empty(start))?;
        return Ok(());
    }

    writer.write_event(Event::Start(start))?;
    if let Some(text) = &element.text {
        if element.cdata {
            writer.write_event(Event::CData(BytesCData::new(text.as_str())))?;
        } else {
            writer.write_event(Event::Text(BytesText::new(text)))?;
        }
    }
    for child in &element.children {
        write_element(writer, child)?;
    }
    writer.write_event(Event::End(BytesEnd::new(element.tag.as_str())))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    const DISPLAY: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<display typeId="org.csstudio.opibuilder.Display" version="1.0.0">
  <!-- generated -->
  <name>motor &amp; axis</name>
  <widget typeId="org.csstudio.opibuilder.widgets.linkingContainer" version="1.0.0">
    <opi_file>axis.opi</opi_file>
    <scriptText><![CDATA[widget.setPropertyValue("opi_file", "a.opi") && x < 1]]></scriptText>
    <empty/>
  </widget>
</display>
"#;

    #[test]
    fn parses_elements_text_and_cdata() {
        let doc = Document::parse(DISPLAY).unwrap();
        assert_eq!(doc.root.tag, "display");
        assert_eq!(doc.root.attribute("version"), Some("1.0.0"));
        assert_eq!(doc.root.children.len(), 2);
        assert_eq!(doc.root.children[0].text.as_deref(), Some("motor & axis"));

        let script = doc.root.find("scriptText").unwrap();
        assert!(script.cdata);
        assert!(script.text.as_deref().unwrap().contains("x < 1"));
        assert_eq!(doc.root.find("opi_file").unwrap().text.as_deref(), Some("axis.opi"));
    }

    #[test]
    fn writes_back_equivalent_tree() {
        let doc = Document::parse(DISPLAY).unwrap();
        let xml = doc.to_xml_string().unwrap();

        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>"));
        assert!(xml.contains("<![CDATA["));
        assert!(xml.contains("motor &amp; axis"));
        assert!(xml.contains("<empty/>"));
        assert_eq!(Document::parse(&xml).unwrap(), doc);
    }

    #[test]
    fn leaf_whitespace_survives_a_round_trip() {
        let xml = "<display>\n  <widget>\n    <text>  Motor  X </text>\n    \
                   <scriptText>\n    x = 1\n    if x:\n        y = 2\n</scriptText>\n    \
                   <blank> </blank>\n  </widget>\n</display>\n";
        let doc = Document::parse(xml).unwrap();

        let widget = &doc.root.children[0];
        assert_eq!(doc.root.text, None);
        assert_eq!(widget.text, None);
        assert_eq!(widget.find("text").unwrap().text.as_deref(), Some("  Motor  X "));
        assert_eq!(
            widget.find("scriptText").unwrap().text.as_deref(),
            Some("\n    x = 1\n    if x:\n        y = 2\n")
        );
        assert_eq!(widget.find("blank").unwrap().text.as_deref(), Some(" "));

        let again = Document::parse(&doc.to_xml_string().unwrap()).unwrap();
        assert_eq!(again, doc);
    }

    #[test]
    fn rejects_broken_xml() {
        assert!(matches!(Document::parse("<a><b></a>"), Err(Error::Document { .. })));
        assert!(matches!(Document::parse("<a>"), Err(Error::Document { .. })));
        assert!(matches!(Document::parse(""), Err(Error::Document { .. })));
    }

    #[test]
    fn declaration_is_kept_only_when_present() {
        let bare = Document::parse("<display><name>x</name></display>").unwrap();
        assert!(!bare.declaration);
        assert!(bare.to_xml_string().unwrap().starts_with("<display>"));

        let built = Document::new(Element::new("display").with_child(Element::new("name").with_text("x")));
        assert!(built.declaration);
        assert!(built.to_xml_string().unwrap().starts_with("<?xml"));
        assert_eq!(Document::parse(&built.to_xml_string().unwrap()).unwrap(), built);
    }

    #[test]
    fn attribute_updates_in_place() {
        let mut el = Element::new("widget").with_attribute("version", "1.0");
        el.set_attribute("version", "2.0");
        el.set_attribute("typeId", "x");
        assert_eq!(el.attributes.len(), 2);
        assert_eq!(el.attribute("version"), Some("2.0"));
    }
}
