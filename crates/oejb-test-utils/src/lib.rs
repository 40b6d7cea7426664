//! Fixture builders shared by oejb tests.
//!
//! Everything here produces raw bytes (zip archives, class files) so the helpers
//! can be used from any crate's tests without pulling that crate's types in.

use std::io::{Cursor, Write};
use std::path::{Path, PathBuf};

use zip::write::FileOptions;

/// Builds a zip archive (jar/war/ear) in memory.
#[derive(Clone, Debug, Default)]
pub struct JarBuilder {
    entries: Vec<(String, Vec<u8>)>,
}

impl JarBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn entry(mut self, path: &str, bytes: impl Into<Vec<u8>>) -> Self {
        self.entries
            .push((path.trim_start_matches('/').to_owned(), bytes.into()));
        self
    }

    pub fn text(self, path: &str, text: &str) -> Self {
        self.entry(path, text.as_bytes().to_vec())
    }

    /// Adds a class file for `binary_name` under `prefix` (e.g. `WEB-INF/classes/`).
    pub fn class(self, prefix: &str, binary_name: &str, annotations: &[&str]) -> Self {
        let path = format!("{prefix}{}.class", binary_name.replace('.', "/"));
        self.entry(&path, class_file(binary_name, None, annotations))
    }

    /// Adds a nested archive built by `nested` at `path`.
    pub fn archive(self, path: &str, nested: JarBuilder) -> Self {
        self.entry(path, nested.build())
    }

    pub fn build(self) -> Vec<u8> {
        let mut zip = zip::ZipWriter::new(Cursor::new(Vec::new()));
        let options = FileOptions::<()>::default();
        for (path, bytes) in self.entries {
            zip.start_file(path, options.clone()).expect("start zip entry");
            zip.write_all(&bytes).expect("write zip entry");
        }
        zip.finish().expect("finish zip").into_inner()
    }

    /// Writes the archive to `dir/file_name` and returns the path.
    pub fn write(self, dir: &Path, file_name: &str) -> PathBuf {
        let path = dir.join(file_name);
        std::fs::write(&path, self.build()).expect("write archive fixture");
        path
    }
}

/// A minimal, valid class file for `binary_name` carrying the given
/// runtime-visible annotations (binary names, e.g. `jakarta.ejb.Stateless`).
pub fn class_file(binary_name: &str, super_name: Option<&str>, annotations: &[&str]) -> Vec<u8> {
    let internal = binary_name.replace('.', "/");
    let super_internal = super_name.unwrap_or("java.lang.Object").replace('.', "/");

    let mut pool: Vec<Vec<u8>> = vec![
        utf8(&internal),
        class_ref(1),
        utf8(&super_internal),
        class_ref(3),
        utf8("RuntimeVisibleAnnotations"),
    ];
    for annotation in annotations {
        pool.push(utf8(&format!("L{};", annotation.replace('.', "/"))));
    }

    let mut out = Vec::new();
    out.extend_from_slice(&0xCAFE_BABEu32.to_be_bytes());
    out.extend_from_slice(&0u16.to_be_bytes());
    out.extend_from_slice(&52u16.to_be_bytes());
    out.extend_from_slice(&(pool.len() as u16 + 1).to_be_bytes());
    for entry in &pool {
        out.extend_from_slice(entry);
    }
    out.extend_from_slice(&0x0021u16.to_be_bytes());
    out.extend_from_slice(&2u16.to_be_bytes());
    out.extend_from_slice(&4u16.to_be_bytes());
    // interfaces, fields, methods
    out.extend_from_slice(&[0, 0, 0, 0, 0, 0]);

    if annotations.is_empty() {
        out.extend_from_slice(&0u16.to_be_bytes());
    } else {
        out.extend_from_slice(&1u16.to_be_bytes());
        out.extend_from_slice(&5u16.to_be_bytes());
        let length = 2 + annotations.len() as u32 * 4;
        out.extend_from_slice(&length.to_be_bytes());
        out.extend_from_slice(&(annotations.len() as u16).to_be_bytes());
        for index in 0..annotations.len() {
            out.extend_from_slice(&(6 + index as u16).to_be_bytes());
            out.extend_from_slice(&0u16.to_be_bytes());
        }
    }
    out
}

fn utf8(text: &str) -> Vec<u8> {
    let mut out = vec![1];
    out.extend_from_slice(&(text.len() as u16).to_be_bytes());
    out.extend_from_slice(text.as_bytes());
    out
}

fn class_ref(name_index: u16) -> Vec<u8> {
    let mut out = vec![7];
    out.extend_from_slice(&name_index.to_be_bytes());
    out
}

/// A temporary directory that lives as long as the returned guard.
pub fn temp_dir() -> tempfile::TempDir {
    tempfile::tempdir().expect("create temp dir")
}
