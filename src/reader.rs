//! Reading `.sqlog` files back: entries, the section tree they describe,
//! and a plain-text outline of it.

use crate::entry::{Entry, RecordEntry};
use crate::uniq_id::SectionID;
use anyhow::{Context, Result};
use std::collections::BTreeMap;
use std::path::Path;

pub fn read_entries<P: AsRef<Path>>(path: P) -> Result<Vec<Entry>> {
    let path = path.as_ref();
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read log file {}", path.display()))?;
    parse_entries(&text).with_context(|| format!("failed to parse log file {}", path.display()))
}

pub fn parse_entries(text: &str) -> Result<Vec<Entry>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(n, line)| Entry::from_json_line(line).with_context(|| format!("line {}", n + 1)))
        .collect()
}

#[derive(Debug, Clone)]
pub enum Item {
    Section(SectionID),
    Record(RecordEntry),
}

#[derive(Debug, Clone)]
pub struct SectionNode {
    pub id: SectionID,
    pub parent: Option<SectionID>,
    pub label: String,
    /// Final header once closed, the label before that.
    pub header: String,
    pub closed: bool,
    pub elapsed_ms: Option<u64>,
    /// Child sections and records in file order.
    pub items: Vec<Item>,
}

/// Sections of one log file, rebuilt from its entries. Building fails on
/// anything that breaks nesting: closing a section before its children,
/// closing twice, or writing into a section that isn't open.
#[derive(Debug, Clone, Default)]
pub struct SectionTree {
    pub sections: BTreeMap<SectionID, SectionNode>,
    /// Top level sections and records in file order.
    pub items: Vec<Item>,
}

impl SectionTree {
    pub fn build(entries: &[Entry]) -> Result<Self> {
        let mut tree = Self::default();
        for entry in entries {
            match entry {
                Entry::Open(open) => {
                    anyhow::ensure!(
                        !tree.sections.contains_key(&open.id),
                        "section {} opened twice",
                        open.id
                    );
                    tree.items_of(open.parent)?
                        .push(Item::Section(open.id));
                    tree.sections.insert(
                        open.id,
                        SectionNode {
                            id: open.id,
                            parent: open.parent,
                            label: open.label.clone(),
                            header: open.label.clone(),
                            closed: false,
                            elapsed_ms: None,
                            items: vec![],
                        },
                    );
                }
                Entry::Record(record) => {
                    tree.items_of(record.section)?
                        .push(Item::Record(record.clone()));
                }
                Entry::Close(close) => {
                    let node = tree
                        .sections
                        .get(&close.id)
                        .with_context(|| format!("section {} closed but never opened", close.id))?;
                    anyhow::ensure!(!node.closed, "section {} closed twice", close.id);
                    if let Some(open_child) = tree.open_children(node).next() {
                        anyhow::bail!(
                            "section {} closed while its child section {} is still open",
                            close.id,
                            open_child
                        );
                    }

                    if let Some(node) = tree.sections.get_mut(&close.id) {
                        node.closed = true;
                        node.header = close.header.clone();
                        node.elapsed_ms = close.elapsed_ms;
                    }
                }
            }
        }
        Ok(tree)
    }

    pub fn get(&self, id: SectionID) -> Option<&SectionNode> {
        self.sections.get(&id)
    }

    /// Sections that were opened but never closed, e.g. after a crash.
    pub fn unterminated(&self) -> Vec<SectionID> {
        self.sections
            .values()
            .filter(|node| !node.closed)
            .map(|node| node.id)
            .collect()
    }

    /// Records tagged with a reference to section `id` of this same file.
    pub fn records_referencing(&self, id: SectionID) -> Vec<&RecordEntry> {
        let mut result = vec![];
        let mut stack = vec![&self.items];
        while let Some(items) = stack.pop() {
            for item in items {
                match item {
                    Item::Record(record) => {
                        if record.refs.iter().any(|r| r.id == id && r.file.is_none()) {
                            result.push(record);
                        }
                    }
                    Item::Section(child) => {
                        if let Some(node) = self.sections.get(child) {
                            stack.push(&node.items);
                        }
                    }
                }
            }
        }
        result
    }

    /// Outline of the file, one row per section or record:
    ///
    /// ```text
    /// Common
    /// <b>Start</b>
    /// ├ <b>Task(0)</b><delim>work time: 0.0s
    /// │ ╰ INFO test: 0 ** 2 = 0 [Common]
    /// ╰ <b>Task(1)</b> [open]
    /// ```
    pub fn render(&self) -> String {
        let mut rows = vec![];
        for item in &self.items {
            rows.push(self.item_row(item));
            if let Item::Section(id) = item {
                if let Some(node) = self.sections.get(id) {
                    self.render_items(&node.items, "", &mut rows);
                }
            }
        }
        rows.join("\n")
    }

    fn render_items(&self, items: &[Item], prefix: &str, rows: &mut Vec<String>) {
        for (i, item) in items.iter().enumerate() {
            let is_last = i + 1 == items.len();
            let branch = if is_last { "╰ " } else { "├ " };
            rows.push(format!("{}{}{}", prefix, branch, self.item_row(item)));

            if let Item::Section(id) = item {
                if let Some(node) = self.sections.get(id) {
                    let child_prefix = format!("{}{}", prefix, if is_last { "  " } else { "│ " });
                    self.render_items(&node.items, &child_prefix, rows);
                }
            }
        }
    }

    fn item_row(&self, item: &Item) -> String {
        match item {
            Item::Record(record) => {
                let mut row = format!("{} {}: {}", record.level, record.logger, record.message);
                if !record.refs.is_empty() {
                    let refs = record
                        .refs
                        .iter()
                        .map(|r| r.label.as_str())
                        .collect::<Vec<_>>()
                        .join(", ");
                    row.push_str(&format!(" [{}]", refs));
                }
                row
            }
            Item::Section(id) => match self.sections.get(id) {
                Some(node) if node.closed => node.header.clone(),
                Some(node) => format!("{} [open]", node.header),
                None => format!("<missing section {}>", id),
            },
        }
    }

    fn items_of(&mut self, section: Option<SectionID>) -> Result<&mut Vec<Item>> {
        match section {
            None => Ok(&mut self.items),
            Some(id) => {
                let node = self
                    .sections
                    .get_mut(&id)
                    .with_context(|| format!("section {} is not open", id))?;
                anyhow::ensure!(!node.closed, "section {} is already closed", id);
                Ok(&mut node.items)
            }
        }
    }

    fn open_children<'a>(&'a self, node: &'a SectionNode) -> impl Iterator<Item = SectionID> + 'a {
        node.items.iter().filter_map(move |item| match item {
            Item::Section(id) => self.sections.get(id).filter(|c| !c.closed).map(|c| c.id),
            Item::Record(_) => None,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use k9::*;

    const LOG: &str = r#"
{"kind":"open","id":1,"label":"Common"}
{"kind":"open","id":2,"parent":1,"label":"<b>Start</b>"}
{"kind":"open","id":3,"parent":2,"label":"<b>Task(0)</b>"}
{"kind":"record","section":3,"level":"INFO","logger":"test","message":"0 ** 2 = 0","refs":[{"id":1,"label":"Common"}]}
{"kind":"close","id":3,"header":"<b>Task(0)</b><delim>work time: 0.0s"}
{"kind":"open","id":4,"parent":2,"label":"<b>Task(1)</b>"}
"#;

    #[test]
    fn builds_and_renders() -> Result<()> {
        let tree = SectionTree::build(&parse_entries(LOG)?)?;
        assert_equal!(tree.unterminated(), vec![1, 2, 4]);
        assert_equal!(tree.records_referencing(1).len(), 1);
        snapshot!(
            tree.render(),
            "
Common [open]
╰ <b>Start</b> [open]
  ├ <b>Task(0)</b><delim>work time: 0.0s
  │ ╰ INFO test: 0 ** 2 = 0 [Common]
  ╰ <b>Task(1)</b> [open]
"
        );
        Ok(())
    }

    #[test]
    fn rejects_bad_nesting() -> Result<()> {
        let parent_first = r#"
{"kind":"open","id":1,"label":"outer"}
{"kind":"open","id":2,"parent":1,"label":"inner"}
{"kind":"close","id":1,"header":"outer"}
"#;
        let err = SectionTree::build(&parse_entries(parent_first)?).unwrap_err();
        assert_equal!(
            err.to_string(),
            "section 1 closed while its child section 2 is still open".to_string()
        );

        let twice = r#"
{"kind":"open","id":1,"label":"outer"}
{"kind":"close","id":1,"header":"outer"}
{"kind":"close","id":1,"header":"outer"}
"#;
        assert!(SectionTree::build(&parse_entries(twice)?).is_err());

        let into_closed = r#"
{"kind":"open","id":1,"label":"outer"}
{"kind":"close","id":1,"header":"outer"}
{"kind":"record","section":1,"level":"INFO","logger":"root","message":"late"}
"#;
        assert!(SectionTree::build(&parse_entries(into_closed)?).is_err());
        Ok(())
    }

    #[test]
    fn reports_line_numbers() {
        let err = parse_entries("{\"kind\":\"open\",\"id\":1,\"label\":\"a\"}\nnot json").unwrap_err();
        assert_equal!(err.to_string(), "line 2".to_string());
    }
}
