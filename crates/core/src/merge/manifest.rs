//! Concat-demuxer manifest: one `file '<path>'` line per clip.

use std::path::{Path, PathBuf};
use thiserror::Error;

/// Errors reading or writing a concat manifest.
#[derive(Debug, Error)]
pub enum ManifestError {
    #[error("line {line}: expected file '<path>', got {content:?}")]
    MalformedLine { line: usize, content: String },

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Quotes a path for the manifest, escaping embedded `'` as `'\''`.
fn quote(path: &Path) -> String {
    let raw = path.to_string_lossy();
    format!("'{}'", raw.replace('\'', r"'\''"))
}

/// Renders the manifest for `paths`, preserving order.
pub fn render_manifest(paths: &[PathBuf]) -> String {
    let mut out = String::new();
    for path in paths {
        out.push_str("file ");
        out.push_str(&quote(path));
        out.push('\n');
    }
    out
}

/// Parses a manifest back into its ordered path list.
///
/// Blank lines and `#` comments are skipped.
pub fn parse_manifest(text: &str) -> Result<Vec<PathBuf>, ManifestError> {
    let mut paths = Vec::new();
    for (index, line) in text.lines().enumerate() {
        let trimmed = line.trim();
        if trimmed.is_empty() || trimmed.starts_with('#') {
            continue;
        }
        let malformed = || ManifestError::MalformedLine {
            line: index + 1,
            content: line.to_string(),
        };
        let quoted = trimmed.strip_prefix("file ").ok_or_else(malformed)?;
        let path = unquote(quoted.trim_start()).ok_or_else(malformed)?;
        paths.push(PathBuf::from(path));
    }
    Ok(paths)
}

/// Reads a sequence of `'...'` segments joined by `\'`.
fn unquote(text: &str) -> Option<String> {
    let mut out = String::new();
    let mut chars = text.chars();
    let mut saw_segment = false;

    loop {
        match chars.next() {
            None => return saw_segment.then_some(out),
            Some('\'') => {
                loop {
                    match chars.next()? {
                        '\'' => break,
                        c => out.push(c),
                    }
                }
                saw_segment = true;
            }
            Some('\\') => {
                if chars.next()? != '\'' {
                    return None;
                }
                out.push('\'');
            }
            Some(_) => return None,
        }
    }
}

/// Writes the manifest for `paths` to `target`, creating its parent directory.
pub async fn write_manifest(target: &Path, paths: &[PathBuf]) -> Result<(), ManifestError> {
    if let Some(parent) = target.parent() {
        tokio::fs::create_dir_all(parent).await?;
    }
    tokio::fs::write(target, render_manifest(paths)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_render_preserves_order() {
        let paths = vec![
            PathBuf::from("/clips/p1.mov"),
            PathBuf::from("/clips/p2.mov"),
            PathBuf::from("/clips/p3.mov"),
        ];
        let text = render_manifest(&paths);
        let lines: Vec<_> = text.lines().collect();
        assert_eq!(
            lines,
            vec![
                "file '/clips/p1.mov'",
                "file '/clips/p2.mov'",
                "file '/clips/p3.mov'",
            ]
        );
        assert_eq!(parse_manifest(&text).unwrap(), paths);
    }

    #[test]
    fn test_embedded_quotes() {
        let paths = vec![PathBuf::from("/clips/it's here.mov"), PathBuf::from("/a/'b'")];
        let text = render_manifest(&paths);
        assert!(text.starts_with(r"file '/clips/it'\''s here.mov'"));
        assert_eq!(parse_manifest(&text).unwrap(), paths);
    }

    #[test]
    fn test_parse_skips_comments_and_rejects_garbage() {
        let parsed = parse_manifest("# generated\n\nfile '/a.mov'\n").unwrap();
        assert_eq!(parsed, vec![PathBuf::from("/a.mov")]);

        let err = parse_manifest("file '/a.mov'\nfile /b.mov\n").unwrap_err();
        assert!(matches!(err, ManifestError::MalformedLine { line: 2, .. }));
        assert!(parse_manifest("file '/unterminated").is_err());
        assert!(parse_manifest("duration 5").is_err());
    }

    #[tokio::test]
    async fn test_write_manifest_creates_parent() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("nested/merge.txt");
        let paths = vec![PathBuf::from("/a.mov"), PathBuf::from("/b.mov")];

        write_manifest(&target, &paths).await.unwrap();

        let text = tokio::fs::read_to_string(&target).await.unwrap();
        assert_eq!(parse_manifest(&text).unwrap(), paths);
    }
}
