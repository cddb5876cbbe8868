use anyhow::{Context, Result};
use once_cell::sync::Lazy;
use regex::Regex;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

// @module: File, directory and object-key utilities

// @const: Characters not allowed in object keys or file stems
static UNSAFE_KEY_CHARS: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^A-Za-z0-9._-]+").expect("Invalid key character regex"));

// @struct: File operations utility
pub struct FileManager;

impl FileManager {
    // @checks: File existence
    pub fn file_exists<P: AsRef<Path>>(path: P) -> bool {
        path.as_ref().is_file()
    }

    /// Find files with a specific extension below a directory, sorted by path
    pub fn find_files<P: AsRef<Path>>(dir: P, extension: &str) -> Result<Vec<PathBuf>> {
        let extension = extension.trim_start_matches('.');
        let mut result = Vec::new();

        for entry in WalkDir::new(dir.as_ref()).follow_links(true) {
            let entry = entry.context("Failed to read directory entry")?;
            let path = entry.path();

            let matches = path
                .extension()
                .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension))
                .unwrap_or(false);
            if path.is_file() && matches {
                result.push(path.to_path_buf());
            }
        }

        result.sort();
        Ok(result)
    }

    // @writes: Content to a temp sibling, then renames it into place
    pub async fn write_atomic<P: AsRef<Path>>(path: P, content: &[u8]) -> Result<()> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .with_context(|| format!("Failed to create directory: {:?}", parent))?;
        }

        let file_name = path
            .file_name()
            .ok_or_else(|| anyhow::anyhow!("Path has no file name: {:?}", path))?;
        let tmp_path = path.with_file_name(format!(".{}.{}.tmp", file_name.to_string_lossy(), uuid::Uuid::new_v4()));

        tokio::fs::write(&tmp_path, content)
            .await
            .with_context(|| format!("Failed to write to file: {:?}", tmp_path))?;
        if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
            let _ = tokio::fs::remove_file(&tmp_path).await;
            return Err(e).with_context(|| format!("Failed to move {:?} into place", tmp_path));
        }

        Ok(())
    }

    // @returns: File stem reduced to key-safe characters, "book" when nothing is left
    pub fn sanitize_stem(name: &str) -> String {
        let stem = Path::new(name)
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let cleaned = Self::sanitize_component(&stem);

        if cleaned.is_empty() {
            "book".to_string()
        } else {
            cleaned
        }
    }

    // @returns: Name with unsafe character runs collapsed to '_', edges trimmed
    pub fn sanitize_component(name: &str) -> String {
        let cleaned = UNSAFE_KEY_CHARS.replace_all(name.trim(), "_");
        cleaned.trim_matches(|c| c == '_' || c == '.').to_string()
    }

    // @returns: Object key for an uploaded source file
    pub fn source_key(file_name: &str, unique_id: &str) -> String {
        format!("{}_{}.txt", Self::sanitize_stem(file_name), unique_id)
    }
}
