//! Idempotent, signature-cached file writes.
//!
//! Generated sources carry a `// Signature: <sha256>` line computed over the
//! unsigned content. A rewrite compares that embedded signature against the
//! freshly computed hash instead of the file bytes, so a hand edit below the
//! header survives until the generated content itself changes. Data files
//! are unsigned and byte-compared.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use sha2::{Digest, Sha256};
use tracing::{debug, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    Created,
    Updated,
    Unchanged,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Signed,
    Unsigned,
}

/// Record of every path the writer touched or looked at.
#[derive(Debug, Default, Clone)]
pub struct Ledger {
    created: Vec<PathBuf>,
    changed: Vec<PathBuf>,
    removed: Vec<PathBuf>,
    probed: Vec<PathBuf>,
}

impl Ledger {
    pub fn created(&self) -> &[PathBuf] {
        &self.created
    }

    pub fn changed(&self) -> &[PathBuf] {
        &self.changed
    }

    pub fn removed(&self) -> &[PathBuf] {
        &self.removed
    }

    pub fn probed(&self) -> &[PathBuf] {
        &self.probed
    }
}

#[derive(Debug, Default)]
pub struct Writer {
    ledger: Ledger,
}

impl Writer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    pub fn exists(&mut self, path: &Path) -> bool {
        self.ledger.probed.push(path.to_path_buf());
        path.exists()
    }

    pub fn read(&mut self, path: &Path) -> io::Result<String> {
        self.ledger.probed.push(path.to_path_buf());
        fs::read_to_string(path)
    }

    /// Writes `content` to `path`, creating parent directories; reports
    /// whether anything actually changed on disk.
    pub fn write(&mut self, path: &Path, content: &str, mode: Mode) -> io::Result<WriteOutcome> {
        let existed = self.exists(path);
        match mode {
            Mode::Signed => {
                let signature = signature(content);
                if existed {
                    let current = self.read(path)?;
                    if embedded_signature(&current) == Some(signature.as_str()) {
                        debug!(path = %path.display(), "signature match, leaving in place");
                        return Ok(WriteOutcome::Unchanged);
                    }
                }
                let annotated = format!("// Signature: {signature}\n{content}");
                self.put(path, &annotated, existed)
            }
            Mode::Unsigned => {
                if existed {
                    let current = self.read(path)?;
                    if current == content {
                        return Ok(WriteOutcome::Unchanged);
                    }
                }
                self.put(path, content, existed)
            }
        }
    }

    /// Writes only when the file does not exist yet.
    pub fn create_once(&mut self, path: &Path, content: &str) -> io::Result<WriteOutcome> {
        if self.exists(path) {
            return Ok(WriteOutcome::Unchanged);
        }
        self.put(path, content, false)
    }

    pub fn remove_file(&mut self, path: &Path) -> io::Result<()> {
        fs::remove_file(path)?;
        self.ledger.removed.push(path.to_path_buf());
        info!(path = %path.display(), "removed");
        Ok(())
    }

    fn put(&mut self, path: &Path, data: &str, existed: bool) -> io::Result<WriteOutcome> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, data)?;
        if existed {
            self.ledger.changed.push(path.to_path_buf());
            info!(path = %path.display(), "updated");
            Ok(WriteOutcome::Updated)
        } else {
            self.ledger.created.push(path.to_path_buf());
            info!(path = %path.display(), "created");
            Ok(WriteOutcome::Created)
        }
    }
}

pub fn signature(content: &str) -> String {
    hex::encode(Sha256::digest(content.as_bytes()))
}

/// The hex digest embedded in a signed file, if any.
pub fn embedded_signature(file: &str) -> Option<&str> {
    file.lines()
        .find_map(|line| line.trim().strip_prefix("// Signature: "))
        .map(str::trim)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn signed_write_creates_then_stays_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out/index.ts");
        let mut writer = Writer::new();

        let outcome = writer.write(&path, "export default 1;\n", Mode::Signed).unwrap();
        assert_eq!(outcome, WriteOutcome::Created);
        let written = fs::read_to_string(&path).unwrap();
        assert!(written.starts_with("// Signature: "));
        assert!(written.ends_with("export default 1;\n"));

        let outcome = writer.write(&path, "export default 1;\n", Mode::Signed).unwrap();
        assert_eq!(outcome, WriteOutcome::Unchanged);
    }

    #[test]
    fn hand_edits_survive_while_the_signature_matches() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("index.ts");
        let mut writer = Writer::new();
        writer.write(&path, "export default 1;\n", Mode::Signed).unwrap();

        // Edit below the signature line.
        let mut edited = fs::read_to_string(&path).unwrap();
        edited.push_str("// local tweak\n");
        fs::write(&path, &edited).unwrap();

        let outcome = writer.write(&path, "export default 1;\n", Mode::Signed).unwrap();
        assert_eq!(outcome, WriteOutcome::Unchanged);
        assert!(fs::read_to_string(&path).unwrap().contains("// local tweak"));

        // New generated content replaces the file, edits and all.
        let outcome = writer.write(&path, "export default 2;\n", Mode::Signed).unwrap();
        assert_eq!(outcome, WriteOutcome::Updated);
        assert!(!fs::read_to_string(&path).unwrap().contains("// local tweak"));
    }

    #[test]
    fn unsigned_writes_compare_bytes() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("path.json");
        let mut writer = Writer::new();

        assert_eq!(
            writer.write(&path, "{}\n", Mode::Unsigned).unwrap(),
            WriteOutcome::Created
        );
        assert_eq!(
            writer.write(&path, "{}\n", Mode::Unsigned).unwrap(),
            WriteOutcome::Unchanged
        );
        assert_eq!(
            writer.write(&path, "{\"a\":1}\n", Mode::Unsigned).unwrap(),
            WriteOutcome::Updated
        );
        assert_eq!(fs::read_to_string(&path).unwrap(), "{\"a\":1}\n");
    }

    #[test]
    fn create_once_never_rewrites() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("extension.ts");
        let mut writer = Writer::new();

        assert_eq!(
            writer.create_once(&path, "original\n").unwrap(),
            WriteOutcome::Created
        );
        assert_eq!(
            writer.create_once(&path, "replacement\n").unwrap(),
            WriteOutcome::Unchanged
        );
        assert_eq!(fs::read_to_string(&path).unwrap(), "original\n");
    }

    #[test]
    fn ledger_records_every_touch() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("file.ts");
        let mut writer = Writer::new();

        writer.write(&path, "a\n", Mode::Signed).unwrap();
        writer.write(&path, "b\n", Mode::Signed).unwrap();
        writer.remove_file(&path).unwrap();

        assert_eq!(writer.ledger().created(), &[path.clone()]);
        assert_eq!(writer.ledger().changed(), &[path.clone()]);
        assert_eq!(writer.ledger().removed(), &[path.clone()]);
        assert!(!writer.ledger().probed().is_empty());
    }
}
