//! Rewrites display references inside a converted document so they resolve
//! from the document's place in the mirrored project.

use std::sync::LazyLock;

use regex::Regex;
use tracing::trace;

use crate::core::document::{Document, Element};
use crate::core::path_index::PathIndex;

/// Elements whose whole text is a display or image path
pub const PATH_TAGS: [&str; 3] = ["path", "opi_file", "image_file"];

/// Element holding `executable arg arg...`
pub const COMMAND_TAG: &str = "command";

/// Element holding embedded script source
pub const SCRIPT_TAG: &str = "scriptText";

static OPI_FILE_CALL: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"setPropertyValue(?:InUIThread)?\(\s*["']opi_file["']\s*,\s*(?:"([^"]*)"|'([^']*)')"#)
        .unwrap()
});

/// Applies a [`PathIndex`] to every reference in a document.
pub struct ReferenceRewriter<'a> {
    index: &'a PathIndex,
    current_module: &'a str,
    use_relative_subpath: bool,
}

impl<'a> ReferenceRewriter<'a> {
    pub fn new(index: &'a PathIndex, current_module: &'a str, use_relative_subpath: bool) -> Self {
        Self {
            index,
            current_module,
            use_relative_subpath,
        }
    }

    /// Rewrite `doc` in place for a file `depth` levels below the project
    /// root. Returns the number of elements whose text changed.
    pub fn rewrite(&self, doc: &mut Document, depth: usize) -> usize {
        self.visit(&mut doc.root, depth)
    }

    fn visit(&self, element: &mut Element, depth: usize) -> usize {
        let mut changed = 0;

        if let Some(text) = element.text.as_deref() {
            let updated = match element.tag.as_str() {
                tag if PATH_TAGS.contains(&tag) => Some(self.path_text(text, depth)),
                COMMAND_TAG => Some(self.command(text, depth)),
                SCRIPT_TAG => self.script(text, depth),
                _ => None,
            };
            if let Some(updated) = updated.filter(|u| u != text) {
                trace!(tag = %element.tag, from = %text, to = %updated, "rewrote reference");
                element.text = Some(updated);
                changed += 1;
            }
        }

        for child in &mut element.children {
            changed += self.visit(child, depth);
        }
        changed
    }

    fn path(&self, filename: &str, depth: usize) -> String {
        self.index
            .update_opi_path(filename, depth, self.current_module, self.use_relative_subpath)
    }

    /// Surrounding whitespace is dropped only when the path is rewritten.
    fn path_text(&self, text: &str, depth: usize) -> String {
        let filename = text.trim();
        let updated = self.path(filename, depth);
        if updated == filename {
            text.to_string()
        } else {
            updated
        }
    }

    /// Only the executable is looked up; arguments are passed through.
    fn command(&self, text: &str, depth: usize) -> String {
        let trimmed = text.trim_start();
        let (program, rest) = match trimmed.find(char::is_whitespace) {
            Some(at) => trimmed.split_at(at),
            None => (trimmed, ""),
        };
        if program.is_empty() {
            return text.to_string();
        }
        let lead = &text[..text.len() - trimmed.len()];
        format!("{lead}{}{rest}", self.path(program, depth))
    }

    /// First `opi_file` literal only.
    fn script(&self, text: &str, depth: usize) -> Option<String> {
        let caps = OPI_FILE_CALL.captures(text)?;
        let literal = caps.get(1).or_else(|| caps.get(2))?;
        let updated = self.path(literal.as_str(), depth);

        let mut out = String::with_capacity(text.len() + updated.len());
        out.push_str(&text[..literal.start()]);
        out.push_str(&updated);
        out.push_str(&text[literal.end()..]);
        Some(out)
    }
}

/// Rewrite every reference in `doc`; see [`ReferenceRewriter`].
pub fn update_document(
    doc: &mut Document,
    depth: usize,
    index: &PathIndex,
    current_module: &str,
    use_relative_subpath: bool,
) -> usize {
    ReferenceRewriter::new(index, current_module, use_relative_subpath).rewrite(doc, depth)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::path_index::IndexEntry;

    fn index() -> PathIndex {
        [
            ("dummy.opi", IndexEntry::new("mod", "dir")),
            ("motor.opi", IndexEntry::new("motor", "motorApp/opi/opi")),
            ("motor.sh", IndexEntry::new("motor", "motorApp/opi/opi")),
            ("local.opi", IndexEntry::new("CS/CS-TI-IOC-01", "CS-TI-IOC-01App/opi/opi")),
            ("icon.opi", IndexEntry::new("motor", "motorApp/opi/opi")),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }

    fn display(children: Vec<Element>) -> Document {
        let mut widget = Element::new("widget");
        widget.children = children;
        Document::new(Element::new("display").with_child(widget))
    }

    fn text_of<'d>(doc: &'d Document, tag: &str) -> &'d str {
        doc.root.find(tag).and_then(|e| e.text.as_deref()).unwrap()
    }

    #[test]
    fn path_tags_go_through_the_index() {
        let mut doc = display(vec![
            Element::new("opi_file").with_text("motor.opi"),
            Element::new("image_file").with_text("icon-3.png"),
            Element::new("name").with_text("motor.opi"),
        ]);

        let changed = update_document(&mut doc, 2, &index(), "CS/CS-TI-IOC-01", false);

        assert_eq!(changed, 2);
        assert_eq!(text_of(&doc, "opi_file"), "../../motor/motor.opi");
        assert_eq!(text_of(&doc, "image_file"), "../../motor/icon-3.png");
        assert_eq!(text_of(&doc, "name"), "motor.opi");
    }

    #[test]
    fn own_module_references_stay_local() {
        let mut doc = display(vec![Element::new("path").with_text("local.opi")]);
        update_document(&mut doc, 2, &index(), "CS/CS-TI-IOC-01", false);
        assert_eq!(text_of(&doc, "path"), "./local.opi");
    }

    #[test]
    fn relative_subpath_is_kept_when_asked() {
        let mut doc = display(vec![Element::new("opi_file").with_text("dummy.opi")]);
        update_document(&mut doc, 1, &index(), "other", true);
        assert_eq!(text_of(&doc, "opi_file"), "../mod/dir/dummy.opi");
    }

    #[test]
    fn command_rewrites_only_the_executable() {
        let mut doc = display(vec![
            Element::new(COMMAND_TAG).with_text("motor.sh -m motor.opi P=BL01"),
        ]);
        let changed = update_document(&mut doc, 1, &index(), "ioc", false);
        assert_eq!(changed, 1);
        assert_eq!(text_of(&doc, COMMAND_TAG), "../motor/motor.sh -m motor.opi P=BL01");
    }

    #[test]
    fn script_rewrites_first_literal_only() {
        let script = concat!(
            "if x:\n",
            "    widget.setPropertyValue(\"opi_file\", \"motor.opi\")\n",
            "else:\n",
            "    widget.setPropertyValueInUIThread('opi_file', 'dummy.opi')\n",
        );
        let mut doc = display(vec![Element::new(SCRIPT_TAG).with_cdata(script)]);

        let changed = update_document(&mut doc, 1, &index(), "ioc", false);

        assert_eq!(changed, 1);
        let text = text_of(&doc, SCRIPT_TAG);
        assert!(text.contains("setPropertyValue(\"opi_file\", \"../motor/motor.opi\")"));
        assert!(text.contains("'dummy.opi'"));
        assert!(doc.root.find(SCRIPT_TAG).unwrap().cdata);
    }

    #[test]
    fn single_quoted_script_literal() {
        let script = "w.setPropertyValueInUIThread('opi_file', 'dummy.opi')";
        let mut doc = display(vec![Element::new(SCRIPT_TAG).with_cdata(script)]);
        update_document(&mut doc, 0, &index(), "ioc", false);
        assert_eq!(
            text_of(&doc, SCRIPT_TAG),
            "w.setPropertyValueInUIThread('opi_file', './mod/dummy.opi')"
        );
    }

    #[test]
    fn unknown_references_are_untouched() {
        let mut doc = display(vec![
            Element::new("opi_file").with_text("nowhere.opi"),
            Element::new(COMMAND_TAG).with_text("  "),
            Element::new(SCRIPT_TAG).with_text("print('no call here')"),
        ]);
        assert_eq!(update_document(&mut doc, 3, &index(), "ioc", false), 0);
        assert_eq!(text_of(&doc, "opi_file"), "nowhere.opi");
    }

    #[test]
    fn padding_is_kept_on_untracked_paths() {
        let mut doc = display(vec![
            Element::new("opi_file").with_text(" nowhere.opi\n"),
            Element::new(COMMAND_TAG).with_text("  xterm -e top"),
            Element::new("path").with_text("\n  motor.opi  "),
        ]);

        assert_eq!(update_document(&mut doc, 1, &index(), "ioc", false), 1);
        assert_eq!(text_of(&doc, "opi_file"), " nowhere.opi\n");
        assert_eq!(text_of(&doc, COMMAND_TAG), "  xterm -e top");
        assert_eq!(text_of(&doc, "path"), "../motor/motor.opi");
    }
}
