//! Bibliography (BibTeX) catalog I/O.
//!
//! The catalog is read whole, annotated in memory and written back once.
//! Only entries whose annotations changed are re-rendered; every other byte
//! of the file (comments, `@string`/`@preamble` blocks, formatting of
//! untouched entries) is written back exactly as it was read.

use std::fs;
use std::path::Path;

use crate::error::SyncError;
use crate::util::{atomic_write_str, collapse_whitespace};

/// Separator between names in an `author` field.
pub const AUTHOR_SEPARATOR: &str = " and ";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BibField {
    pub name: String,
    /// Value exactly as written, delimiters included (`{...}`, `"..."`, bare).
    pub raw_value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BibEntry {
    pub entry_type: String,
    pub key: String,
    fields: Vec<BibField>,
    raw: String,
    dirty: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CatalogItem {
    Text(String),
    Entry(BibEntry),
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Catalog {
    items: Vec<CatalogItem>,
    /// Byte offset of an unterminated block; everything from there on is
    /// kept as text and never examined.
    unparsed_tail: Option<usize>,
}

// =============================================================================
// Entry
// =============================================================================

impl BibEntry {
    pub fn new(entry_type: &str, key: &str) -> Self {
        BibEntry {
            entry_type: entry_type.to_string(),
            key: key.to_string(),
            fields: Vec::new(),
            raw: String::new(),
            dirty: true,
        }
    }

    pub fn fields(&self) -> &[BibField] {
        &self.fields
    }

    pub fn is_modified(&self) -> bool {
        self.dirty
    }

    /// Field value with its outer delimiters removed. Names are case insensitive.
    pub fn field(&self, name: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.name.eq_ignore_ascii_case(name))
            .map(|f| strip_delimiters(&f.raw_value))
    }

    /// Replace (or add) a field. `raw_value` must carry its own delimiters.
    pub fn set_field(&mut self, name: &str, raw_value: String) {
        match self
            .fields
            .iter_mut()
            .find(|f| f.name.eq_ignore_ascii_case(name))
        {
            Some(field) => field.raw_value = raw_value,
            None => self.fields.push(BibField {
                name: name.to_string(),
                raw_value,
            }),
        }
        self.dirty = true;
    }

    /// Author strings, split on the literal `" and "`.
    pub fn authors(&self) -> Vec<String> {
        let Some(value) = self.field("author") else {
            return Vec::new();
        };
        let value = collapse_whitespace(value);
        if value.is_empty() {
            return Vec::new();
        }
        value.split(AUTHOR_SEPARATOR).map(str::to_string).collect()
    }

    /// Aliases in the annotation field, in order.
    pub fn annotations(&self, field: &str) -> Vec<String> {
        let Some(value) = self.field(field) else {
            return Vec::new();
        };
        value
            .replace(['{', '}'], "")
            .split(',')
            .map(str::trim)
            .filter(|a| !a.is_empty())
            .map(str::to_string)
            .collect()
    }

    pub fn set_annotations(&mut self, field: &str, aliases: &[String]) {
        self.set_field(field, format!("{{{}}}", aliases.join(", ")));
    }

    fn render(&self) -> String {
        let mut out = format!("@{}{{{},\n", self.entry_type, self.key);
        let body: Vec<String> = self
            .fields
            .iter()
            .map(|f| format!("  {} = {}", f.name, f.raw_value))
            .collect();
        out.push_str(&body.join(",\n"));
        out.push_str("\n}");
        out
    }
}

/// `{x}` → `x`, `"x"` → `x`, only when the delimiters enclose the whole value.
fn strip_delimiters(value: &str) -> &str {
    let bytes = value.as_bytes();
    if bytes.len() >= 2 {
        if bytes[0] == b'{' && find_close(bytes, 0) == Some(bytes.len() - 1) {
            return &value[1..value.len() - 1];
        }
        if bytes[0] == b'"' && find_closing_quote(bytes, 0) == Some(bytes.len() - 1) {
            return &value[1..value.len() - 1];
        }
    }
    value
}

// =============================================================================
// Parsing
// =============================================================================

/// Index of the delimiter closing the one at `open`, braces balanced.
fn find_close(bytes: &[u8], open: usize) -> Option<usize> {
    let closing = match bytes[open] {
        b'{' => b'}',
        b'(' => b')',
        _ => return None,
    };
    let mut depth = 0usize;
    for (idx, &b) in bytes.iter().enumerate().skip(open + 1) {
        match b {
            b'{' => depth += 1,
            b'}' if depth > 0 => depth -= 1,
            b'}' if closing == b'}' => return Some(idx),
            b')' if closing == b')' && depth == 0 => return Some(idx),
            _ => {}
        }
    }
    None
}

fn find_closing_quote(bytes: &[u8], open: usize) -> Option<usize> {
    let mut depth = 0usize;
    for (idx, &b) in bytes.iter().enumerate().skip(open + 1) {
        match b {
            b'{' => depth += 1,
            b'}' => depth = depth.saturating_sub(1),
            b'"' if depth == 0 => return Some(idx),
            _ => {}
        }
    }
    None
}

/// Split an entry body (`key, name = value, ...`) into key and fields.
fn parse_body(body: &str) -> (String, Vec<BibField>) {
    let bytes = body.as_bytes();
    let Some(comma) = body.find(',') else {
        return (body.trim().to_string(), Vec::new());
    };
    let key = body[..comma].trim().to_string();

    let mut fields = Vec::new();
    let mut i = comma + 1;
    while i < bytes.len() {
        if bytes[i].is_ascii_whitespace() || bytes[i] == b',' {
            i += 1;
            continue;
        }
        let Some(eq) = body[i..].find('=').map(|o| i + o) else {
            log::debug!("Ignoring trailing text in entry {}: {}", key, body[i..].trim());
            break;
        };
        let name = body[i..eq].trim().to_string();

        let mut j = eq + 1;
        let mut depth = 0usize;
        let mut in_quote = false;
        while j < bytes.len() {
            match bytes[j] {
                b'{' => depth += 1,
                b'}' => depth = depth.saturating_sub(1),
                b'"' if depth == 0 => in_quote = !in_quote,
                b',' if depth == 0 && !in_quote => break,
                _ => {}
            }
            j += 1;
        }

        if !name.is_empty() {
            fields.push(BibField {
                name,
                raw_value: body[eq + 1..j].trim().to_string(),
            });
        }
        i = j + 1;
    }

    (key, fields)
}

impl Catalog {
    pub fn parse(content: &str) -> Catalog {
        let bytes = content.as_bytes();
        let mut items = Vec::new();
        let mut text_start = 0;
        let mut pos = 0;
        let mut unparsed_tail = None;

        while let Some(offset) = content[pos..].find('@') {
            let at = pos + offset;

            let type_start = at + 1;
            let type_end = content[type_start..]
                .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_' || c == '-'))
                .map(|o| type_start + o)
                .unwrap_or(content.len());
            let entry_type = &content[type_start..type_end];
            let open = content[type_end..]
                .find(|c: char| !c.is_whitespace())
                .map(|o| type_end + o);

            let Some(open) = open.filter(|&o| !entry_type.is_empty() && matches!(bytes[o], b'{' | b'(')) else {
                pos = at + 1;
                continue;
            };
            let Some(close) = find_close(bytes, open) else {
                log::warn!(
                    "Unterminated @{} block at byte {}, rest of the catalog kept as text",
                    entry_type,
                    at
                );
                unparsed_tail = Some(at);
                break;
            };

            if text_start < at {
                items.push(CatalogItem::Text(content[text_start..at].to_string()));
            }
            let raw = &content[at..=close];
            match entry_type.to_ascii_lowercase().as_str() {
                "comment" | "preamble" | "string" => items.push(CatalogItem::Text(raw.to_string())),
                _ => {
                    let (key, fields) = parse_body(&content[open + 1..close]);
                    items.push(CatalogItem::Entry(BibEntry {
                        entry_type: entry_type.to_string(),
                        key,
                        fields,
                        raw: raw.to_string(),
                        dirty: false,
                    }));
                }
            }
            pos = close + 1;
            text_start = pos;
        }

        if text_start < content.len() {
            items.push(CatalogItem::Text(content[text_start..].to_string()));
        }
        Catalog {
            items,
            unparsed_tail,
        }
    }

    /// Read a catalog. A missing or unreadable file is fatal.
    pub fn load(path: &Path) -> Result<Catalog, SyncError> {
        let content = fs::read_to_string(path).map_err(|e| SyncError::store(path, e))?;
        Ok(Catalog::parse(&content))
    }

    pub fn save(&self, path: &Path) -> Result<(), SyncError> {
        atomic_write_str(path, &self.render()).map_err(|e| SyncError::store(path, e))
    }

    pub fn push(&mut self, entry: BibEntry) {
        if !self.items.is_empty() {
            self.items.push(CatalogItem::Text("\n\n".to_string()));
        }
        self.items.push(CatalogItem::Entry(entry));
    }

    pub fn entries(&self) -> impl Iterator<Item = &BibEntry> {
        self.items.iter().filter_map(|item| match item {
            CatalogItem::Entry(e) => Some(e),
            CatalogItem::Text(_) => None,
        })
    }

    pub fn entries_mut(&mut self) -> impl Iterator<Item = &mut BibEntry> {
        self.items.iter_mut().filter_map(|item| match item {
            CatalogItem::Entry(e) => Some(e),
            CatalogItem::Text(_) => None,
        })
    }

    pub fn is_modified(&self) -> bool {
        self.entries().any(BibEntry::is_modified)
    }

    /// Where parsing stopped early, if it did.
    pub fn unparsed_tail(&self) -> Option<usize> {
        self.unparsed_tail
    }

    pub fn render(&self) -> String {
        let mut out = String::new();
        for item in &self.items {
            match item {
                CatalogItem::Text(text) => out.push_str(text),
                CatalogItem::Entry(entry) if entry.dirty => out.push_str(&entry.render()),
                CatalogItem::Entry(entry) => out.push_str(&entry.raw),
            }
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"% Lab publications
@string{ieee = "IEEE Transactions"}

@article{doe2020,
    title   = {Sparse {Sampling} of Signals},
    author  = {Doe, Jane and
               Kumar, Ravi},
    journal = ieee # " on Signal Processing",
    year    = 2020,
    emails  = {jane_doe}
}

@InProceedings( rao2019 ,
  author = "S. Rao and Jane Doe",
  title = "A, B and C"
)
"#;

    #[test]
    fn test_parse_entries_and_text() {
        let catalog = Catalog::parse(SAMPLE);
        let entries: Vec<&BibEntry> = catalog.entries().collect();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key, "doe2020");
        assert_eq!(entries[0].entry_type, "article");
        assert_eq!(entries[1].key, "rao2019");
        assert_eq!(entries[1].entry_type, "InProceedings");
        assert_eq!(catalog.render(), SAMPLE);
    }

    #[test]
    fn test_field_values() {
        let catalog = Catalog::parse(SAMPLE);
        let entries: Vec<&BibEntry> = catalog.entries().collect();
        assert_eq!(entries[0].field("title"), Some("Sparse {Sampling} of Signals"));
        assert_eq!(entries[0].field("YEAR"), Some("2020"));
        assert_eq!(
            entries[0].field("journal"),
            Some(r#"ieee # " on Signal Processing""#)
        );
        assert_eq!(entries[1].field("title"), Some("A, B and C"));
        assert_eq!(entries[1].field("missing"), None);
    }

    #[test]
    fn test_authors_split_and_collapsed() {
        let catalog = Catalog::parse(SAMPLE);
        let entries: Vec<&BibEntry> = catalog.entries().collect();
        assert_eq!(entries[0].authors(), vec!["Doe, Jane", "Kumar, Ravi"]);
        assert_eq!(entries[1].authors(), vec!["S. Rao", "Jane Doe"]);
    }

    #[test]
    fn test_annotations() {
        let mut entry = BibEntry::new("article", "x");
        assert!(entry.annotations("emails").is_empty());
        entry.set_field("emails", "{ jane_doe,, {ravi_kumar} }".to_string());
        assert_eq!(entry.annotations("emails"), vec!["jane_doe", "ravi_kumar"]);

        entry.set_annotations("emails", &["a".to_string(), "b".to_string()]);
        assert_eq!(entry.field("emails"), Some("a, b"));
    }

    #[test]
    fn test_only_modified_entry_is_rerendered() {
        let mut catalog = Catalog::parse(SAMPLE);
        assert!(!catalog.is_modified());

        let entry = catalog.entries_mut().nth(1).unwrap();
        entry.set_annotations("emails", &["sunil_rao".to_string()]);
        assert!(catalog.is_modified());

        let rendered = catalog.render();
        let first_entry_end = SAMPLE.find("@InProceedings").unwrap();
        assert!(rendered.starts_with(&SAMPLE[..first_entry_end]));
        assert!(rendered.ends_with(
            "@InProceedings{rao2019,\n  author = \"S. Rao and Jane Doe\",\n  title = \"A, B and C\",\n  emails = {sunil_rao}\n}\n"
        ));
    }

    #[test]
    fn test_stray_at_sign_is_text() {
        let content = "Contact me @ the lab.\n@misc{k, note = {a@b.c}}\n";
        let catalog = Catalog::parse(content);
        assert_eq!(catalog.entries().count(), 1);
        assert_eq!(catalog.entries().next().unwrap().field("note"), Some("a@b.c"));
        assert_eq!(catalog.render(), content);
    }

    #[test]
    fn test_unterminated_entry_kept_verbatim() {
        let content = "@article{broken, title = {never closed\n";
        let catalog = Catalog::parse(content);
        assert_eq!(catalog.entries().count(), 0);
        assert_eq!(catalog.unparsed_tail(), Some(0));
        assert_eq!(catalog.render(), content);
    }

    #[test]
    fn test_entries_after_unterminated_block_are_not_parsed() {
        let content = "@article{ok,\n  author = {Doe, Jane}\n}\n\n@article{broken, title = {x\n\n@article{late,\n  author = {Roe, Bob}\n}\n";
        let catalog = Catalog::parse(content);
        let keys: Vec<&str> = catalog.entries().map(|e| e.key.as_str()).collect();
        assert_eq!(keys, vec!["ok"]);
        assert_eq!(catalog.unparsed_tail(), content.find("@article{broken"));
        assert_eq!(catalog.render(), content);
        assert_eq!(Catalog::parse(SAMPLE).unparsed_tail(), None);
    }

    #[test]
    fn test_load_missing_file_is_fatal() {
        let dir = tempfile::tempdir().expect("tempdir");
        let err = Catalog::load(&dir.path().join("papers.bib")).unwrap_err();
        assert!(err.is_fatal());
    }

    #[test]
    fn test_save_and_reload() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("papers.bib");
        let mut catalog = Catalog::default();
        let mut entry = BibEntry::new("misc", "k1");
        entry.set_field("author", "{Doe, Jane}".to_string());
        catalog.push(entry);
        catalog.save(&path).unwrap();

        let reloaded = Catalog::load(&path).unwrap();
        assert_eq!(reloaded.entries().next().unwrap().authors(), vec!["Doe, Jane"]);
    }
}
