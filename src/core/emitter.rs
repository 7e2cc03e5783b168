// src/core/emitter.rs
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use crate::error::{ExtractError, Result};
use super::parser::{IrDocument, TopLevelEntity};
use super::selector::SelectionResult;

/// Re-serializes the preamble plus the selected function bodies
pub struct Emitter {
    out: String,
}

impl Emitter {
    fn new() -> Self {
        Self { out: String::new() }
    }

    /// Build the reduced document
    ///
    /// Types, globals, declarations, attributes, metadata and comments are
    /// always kept verbatim, in document order; the selected definitions
    /// follow in document order, each set off by one blank line.
    pub fn render(doc: &IrDocument, selection: &SelectionResult) -> String {
        let mut emitter = Self::new();

        for entity in doc.entities() {
            match entity {
                TopLevelEntity::Other(range) => {
                    for line in doc.lines_in(*range) {
                        emitter.push_line(line);
                    }
                }
                TopLevelEntity::Declaration(decl) => emitter.push_line(doc.line(decl.line)),
                TopLevelEntity::Function(_) => {}
            }
        }

        for name in selection.in_document_order(doc) {
            if let Some(func) = doc.function(name) {
                emitter.separate();
                for line in doc.body(func) {
                    emitter.push_line(line);
                }
            }
        }

        emitter.out
    }

    fn push_line(&mut self, line: &str) {
        self.out.push_str(line);
        self.out.push('\n');
    }

    /// Blank line before a body unless the output is empty or already ends with one
    fn separate(&mut self) {
        if !self.out.is_empty() && !self.out.ends_with("\n\n") {
            self.out.push('\n');
        }
    }
}

/// Content written and synced to a temporary file next to its target, not yet visible
pub struct StagedFile {
    temp_file: NamedTempFile,
    target: PathBuf,
}

impl StagedFile {
    /// Stage `content` for `path`; the parent directory must already exist
    pub fn stage(path: &Path, content: &str) -> Result<Self> {
        let dir = target_dir(path);
        if !dir.is_dir() {
            return Err(ExtractError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                format!("output directory {} does not exist", dir.display()),
            )));
        }

        let mut temp_file = NamedTempFile::new_in(dir)?;
        temp_file.write_all(content.as_bytes())?;
        temp_file.as_file().sync_all()?;
        Ok(Self {
            temp_file,
            target: path.to_path_buf(),
        })
    }

    /// Atomically move the staged content into place
    pub fn commit(self) -> Result<()> {
        debug!("persisting {} -> {}", self.temp_file.path().display(), self.target.display());
        self.temp_file.persist(&self.target).map_err(|e| e.error)?;
        Ok(())
    }
}

fn target_dir(path: &Path) -> &Path {
    match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    }
}

/// Write `content` to `path` through a temporary file in the same directory
///
/// The target only ever holds the previous content or the complete new
/// content. The parent directory must already exist. A failed attempt is
/// retried once if the directory is still there.
pub fn write_file_atomic(path: &Path, content: &str) -> Result<()> {
    let write_once = || StagedFile::stage(path, content)?.commit();

    match write_once() {
        Ok(()) => Ok(()),
        Err(ExtractError::Io(e)) if target_dir(path).is_dir() => {
            warn!("writing {} failed ({}), retrying once", path.display(), e);
            write_once()
        }
        Err(e) => Err(e),
    }
}

#[cfg(test)]
mod tests {
    use assert_fs::prelude::*;
    use predicates::prelude::*;

    use super::*;

    const DOC: &str = r#"; ModuleID = 'm'
@g = global i32 0


define void @first() {
  ret void
}

declare void @ext()

define void @second() {
  call void @ext()
  ret void
}

define void @third() {
  ret void
}
!0 = !{}
"#;

    fn select(doc: &IrDocument, names: &[(&str, usize)]) -> SelectionResult {
        let mut selection = SelectionResult::default();
        for (name, depth) in names {
            assert!(doc.contains(name));
            selection.insert(name, *depth);
        }
        selection
    }

    #[test]
    fn test_preamble_then_bodies_in_document_order() {
        let doc = IrDocument::parse(DOC).unwrap();
        // Insertion order and depths differ from document order
        let selection = select(&doc, &[("third", 0), ("first", 2)]);
        let out = Emitter::render(&doc, &selection);

        let expected = "; ModuleID = 'm'\n@g = global i32 0\n\n\n\ndeclare void @ext()\n\n\n!0 = !{}\n\ndefine void @first() {\n  ret void\n}\n\ndefine void @third() {\n  ret void\n}\n";
        assert_eq!(out, expected);
        assert!(!out.contains("@second"));
    }

    #[test]
    fn test_empty_selection_keeps_preamble() {
        let doc = IrDocument::parse(DOC).unwrap();
        let out = Emitter::render(&doc, &SelectionResult::default());
        assert_eq!(
            out,
            "; ModuleID = 'm'\n@g = global i32 0\n\n\n\ndeclare void @ext()\n\n\n!0 = !{}\n"
        );
    }

    #[test]
    fn test_preamble_lines_are_kept_verbatim() {
        let text = "; header\n   \n\n\n@g = global i32 0   \n  !1 = !{}\ndefine void @f() {\n  ret void\n}\n";
        let doc = IrDocument::parse(text).unwrap();
        let mut selection = SelectionResult::default();
        selection.insert("f", 0);

        let out = Emitter::render(&doc, &selection);
        assert_eq!(
            out,
            "; header\n   \n\n\n@g = global i32 0   \n  !1 = !{}\n\ndefine void @f() {\n  ret void\n}\n"
        );
    }

    #[test]
    fn test_render_is_reparseable() {
        let doc = IrDocument::parse(DOC).unwrap();
        let selection = select(&doc, &[("second", 0)]);
        let reparsed = IrDocument::parse(&Emitter::render(&doc, &selection)).unwrap();
        assert_eq!(reparsed.function_count(), 1);
        assert!(reparsed.contains("second"));
    }

    #[test]
    fn test_write_file_atomic_replaces_content() {
        let temp = assert_fs::TempDir::new().unwrap();
        let target = temp.child("out.ll");
        target.write_str("old").unwrap();

        write_file_atomic(target.path(), "define void @f() {\n}\n").unwrap();
        target.assert(predicate::str::contains("@f"));

        let leftovers = std::fs::read_dir(temp.path()).unwrap().count();
        assert_eq!(leftovers, 1);
    }

    #[test]
    fn test_staged_file_is_invisible_until_commit() {
        let temp = assert_fs::TempDir::new().unwrap();
        let target = temp.child("report.json");

        let staged = StagedFile::stage(target.path(), "{}").unwrap();
        target.assert(predicate::path::missing());
        staged.commit().unwrap();
        target.assert("{}");

        drop(StagedFile::stage(&temp.path().join("dropped.json"), "{}").unwrap());
        assert_eq!(std::fs::read_dir(temp.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_write_into_missing_directory_is_io_error() {
        let temp = assert_fs::TempDir::new().unwrap();
        let target = temp.child("missing/out.ll");
        let err = write_file_atomic(target.path(), "x").unwrap_err();
        assert_eq!(err.kind(), "io");
        target.assert(predicate::path::missing());
    }
}
