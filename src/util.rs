use std::io::Write;
use std::path::Path;

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Write `content` to `path` through a sibling temp file and a rename, so a
/// reader never observes a half-written file.
pub fn atomic_write_str(path: &Path, content: &str) -> std::io::Result<()> {
    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    let mut tmp = tempfile::NamedTempFile::new_in(dir)?;
    tmp.write_all(content.as_bytes())?;
    tmp.as_file().sync_all()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// Fold accented letters to their base letter.
///
/// Example: "José Müller" → "Jose Muller". Letters without a decomposition
/// (ø, ß, ł) are left as they are.
pub fn fold_diacritics(value: &str) -> String {
    value.nfkd().filter(|c| !is_combining_mark(*c)).collect()
}

/// Collapse every whitespace run (including newlines) into one space and trim.
pub fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fold_diacritics() {
        assert_eq!(fold_diacritics("José"), "Jose");
        assert_eq!(fold_diacritics("Müller"), "Muller");
        assert_eq!(fold_diacritics("Ångström"), "Angstrom");
        assert_eq!(fold_diacritics("plain"), "plain");
    }

    #[test]
    fn test_fold_diacritics_keeps_undecomposable() {
        assert_eq!(fold_diacritics("Søren"), "Søren");
    }

    #[test]
    fn test_collapse_whitespace() {
        assert_eq!(collapse_whitespace("  Doe,\n   Jane  "), "Doe, Jane");
        assert_eq!(collapse_whitespace(""), "");
    }

    #[test]
    fn test_atomic_write_replaces_content() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("papers.bib");
        std::fs::write(&path, "old").unwrap();

        atomic_write_str(&path, "new content").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "new content");

        let leftovers = std::fs::read_dir(dir.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }
}
