//! Loading and saving documents.
//!
//! Documents live on disk as JSON. Saving writes a temp file next to the
//! destination and renames it into place, so a reader never sees a partial
//! file.

use std::path::{Path, PathBuf};

use tracing::{debug, info, instrument};

use draftsmith_shared::{Document, DraftsmithError, Result};

/// Read a document from `path`.
///
/// A file that exists but is not a valid document is
/// [`DraftsmithError::UnparseableDocument`].
#[instrument(skip_all, fields(path = %path.display()))]
pub fn load_document(path: &Path) -> Result<Document> {
    let content = std::fs::read_to_string(path).map_err(|e| DraftsmithError::io(path, e))?;
    let doc: Document = serde_json::from_str(&content)
        .map_err(|e| DraftsmithError::unparseable(format!("{}: {e}", path.display())))?;

    info!(blocks = doc.len(), "loaded document");
    Ok(doc)
}

/// Write `doc` to `path` atomically, stamping its modification time.
///
/// Parent directories are created as needed.
#[instrument(skip_all, fields(path = %path.display()))]
pub fn save_document(doc: &mut Document, path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
        _ => PathBuf::from("."),
    };
    std::fs::create_dir_all(&dir).map_err(|e| DraftsmithError::io(&dir, e))?;

    doc.metadata.modified_at = Some(chrono::Utc::now());
    let json = serde_json::to_string_pretty(doc)
        .map_err(|e| DraftsmithError::validation(format!("failed to serialize document: {e}")))?;

    let file_name = path
        .file_name()
        .ok_or_else(|| DraftsmithError::validation(format!("not a file path: {}", path.display())))?
        .to_string_lossy();
    let temp = dir.join(format!(".{file_name}.{}.tmp", uuid::Uuid::now_v7()));

    std::fs::write(&temp, json.as_bytes()).map_err(|e| DraftsmithError::io(&temp, e))?;
    if let Err(e) = std::fs::rename(&temp, path) {
        let _ = std::fs::remove_file(&temp);
        return Err(DraftsmithError::io(path, e));
    }

    debug!(bytes = json.len(), "wrote document");
    info!(blocks = doc.len(), "saved document");
    Ok(())
}

/// `<stem><suffix>.<ext>` next to `input`; `report.json` with `_generated`
/// becomes `report_generated.json`.
pub fn output_path_for(input: &Path, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = match input.extension() {
        Some(ext) => format!("{stem}{suffix}.{}", ext.to_string_lossy()),
        None => format!("{stem}{suffix}"),
    };
    input.with_file_name(name)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use draftsmith_shared::{BlockKind, Paragraph, Table};

    fn temp_dir() -> PathBuf {
        let dir = std::env::temp_dir().join(format!(
            "draftsmith-store-test-{}",
            uuid::Uuid::now_v7()
        ));
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    fn sample() -> Document {
        Document::from_kinds([
            BlockKind::Paragraph(Paragraph::new("Heading 1", "Budget")),
            BlockKind::Table(Table::from_rows([["A", "$1"], ["Total", ""]])),
        ])
    }

    #[test]
    fn save_then_load_preserves_blocks() {
        let tmp = temp_dir();
        let path = tmp.join("nested").join("doc.json");

        let mut doc = sample();
        save_document(&mut doc, &path).unwrap();
        assert!(doc.metadata.modified_at.is_some());

        let loaded = load_document(&path).unwrap();
        assert_eq!(loaded.len(), 2);
        assert_eq!(
            loaded.blocks()[0].as_paragraph().map(|p| p.text.as_str()),
            Some("Budget")
        );
        assert!(loaded.blocks()[1].as_table().is_some());

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn save_leaves_no_temp_files() {
        let tmp = temp_dir();
        let path = tmp.join("doc.json");
        save_document(&mut sample(), &path).unwrap();
        save_document(&mut sample(), &path).unwrap();

        let names: Vec<String> = std::fs::read_dir(&tmp)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["doc.json".to_string()]);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn failed_rename_keeps_existing_destination() {
        let tmp = temp_dir();
        // A non-empty directory at the destination makes the rename fail.
        let path = tmp.join("doc.json");
        std::fs::create_dir_all(&path).unwrap();
        std::fs::write(path.join("keep.txt"), "original").unwrap();

        let err = save_document(&mut sample(), &path).unwrap_err();
        assert!(matches!(err, DraftsmithError::Io { .. }));

        assert_eq!(std::fs::read_to_string(path.join("keep.txt")).unwrap(), "original");
        let names: Vec<String> = std::fs::read_dir(&tmp)
            .unwrap()
            .map(|e| e.unwrap().file_name().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["doc.json".to_string()]);

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn load_rejects_garbage() {
        let tmp = temp_dir();
        let path = tmp.join("broken.json");
        std::fs::write(&path, "{ not json").unwrap();

        let err = load_document(&path).unwrap_err();
        assert!(matches!(err, DraftsmithError::UnparseableDocument { .. }));

        let err = load_document(&tmp.join("missing.json")).unwrap_err();
        assert!(matches!(err, DraftsmithError::Io { .. }));

        let _ = std::fs::remove_dir_all(&tmp);
    }

    #[test]
    fn output_path_appends_suffix_to_stem() {
        assert_eq!(
            output_path_for(Path::new("/docs/report.json"), "_generated"),
            PathBuf::from("/docs/report_generated.json")
        );
        assert_eq!(
            output_path_for(Path::new("plan"), "_out"),
            PathBuf::from("plan_out")
        );
    }
}
