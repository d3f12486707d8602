/// Common file patterns used when collecting documents for ingestion.

use std::path::Path;

/// Default patterns to exclude from document collection.
///
/// Matched against path components below the documents directory, so the
/// directory itself may live anywhere (including under `data/`).
pub fn default_exclude_patterns() -> Vec<String> {
    vec![
        // Version control
        ".git".to_string(),
        ".svn".to_string(),
        ".hg".to_string(),

        // Editors and OS droppings
        ".vscode".to_string(),
        ".idea".to_string(),
        ".DS_Store".to_string(),
        "Thumbs.db".to_string(),

        // Temp/cache
        ".cache".to_string(),
        "__pycache__".to_string(),
        ".ipynb_checkpoints".to_string(),

        // Our own output
        "vectorstore".to_string(),
    ]
}

/// Check if a path should be skipped based on exclude patterns.
///
/// A path is excluded when any of its components contains a pattern, or
/// when it is a hidden file (leading `.`).
pub fn should_exclude(relative: &Path, exclude_patterns: &[String]) -> bool {
    relative.components().any(|component| {
        let Some(name) = component.as_os_str().to_str() else {
            return false;
        };
        (name.starts_with('.') && name.len() > 1 && name != "..")
            || exclude_patterns.iter().any(|pattern| name.contains(pattern.as_str()))
    })
}

/// Checks if a file has one of the configured extensions (case-insensitive).
pub fn has_extension(path: &Path, extensions: &[String]) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| extensions.iter().any(|e| e.eq_ignore_ascii_case(ext)))
        .unwrap_or(false)
}
