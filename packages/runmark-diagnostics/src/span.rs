//! Source locations.

use std::fmt;
use std::path::Path;

use ariadne::Source;

/// Identifies a source file registered in a [`FileIdMap`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(u32);

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// A span of text in a source file.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Span {
    /// The byte offset of the first character in the span.
    pub start: u32,
    /// The byte offset of the first character after the span.
    pub end: u32,
    pub file_id: FileId,
}

impl fmt::Debug for Span {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}..{}", self.start, self.end)
    }
}

#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Spanned<T>(pub T, pub Span);

impl<T: fmt::Debug> fmt::Debug for Spanned<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}..{}) ", self.1.start, self.1.end)?;
        self.0.fmt(f)
    }
}

impl<T> std::ops::Deref for Spanned<T> {
    type Target = T;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

pub fn spanned<T>(span: Span, node: T) -> Spanned<T> {
    Spanned(node, span)
}

impl<T> Spanned<T> {
    /// Get the unspanned node.
    pub fn unspan(self) -> T {
        self.0
    }

    pub fn span(&self) -> Span {
        self.1
    }
}

/// A registered source file. The text is kept for rendering reports.
struct SourceFile {
    /// The path on disk, or a name such as `<repl>` for text that only exists in memory.
    name: String,
    source: Source,
}

/// Maps [`FileId`]s to the sources they were created for.
///
/// Implements [`ariadne::Cache`], so a report can be rendered straight from the map.
#[derive(Default)]
pub struct FileIdMap {
    files: Vec<SourceFile>,
}

impl FileIdMap {
    pub fn new() -> Self {
        Self::default()
    }

    fn push(&mut self, name: String, source: &str) -> FileId {
        let id = FileId(self.files.len() as u32);
        self.files.push(SourceFile {
            name,
            source: Source::from(source),
        });
        id
    }

    /// Register a file read from disk.
    pub fn insert_file(&mut self, path: &Path, source: &str) -> FileId {
        self.push(path.display().to_string(), source)
    }

    /// Register text that does not come from a file, e.g. a line typed at the prompt.
    pub fn create_virtual_file(&mut self, name: &str, source: String) -> FileId {
        self.push(name.to_string(), &source)
    }

    /// The name shown in diagnostics.
    pub fn name(&self, id: FileId) -> &str {
        &self.files[id.0 as usize].name
    }
}

impl fmt::Debug for FileIdMap {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list()
            .entries(self.files.iter().map(|file| &file.name))
            .finish()
    }
}

impl ariadne::Cache<FileId> for &FileIdMap {
    fn fetch(&mut self, id: &FileId) -> Result<&Source, Box<dyn fmt::Debug + '_>> {
        match self.files.get(id.0 as usize) {
            Some(file) => Ok(&file.source),
            None => Err(Box::new(format!("no source registered for file {id}"))),
        }
    }

    fn display<'b>(&self, id: &'b FileId) -> Option<Box<dyn fmt::Display + 'b>> {
        let name = self.files.get(id.0 as usize)?.name.clone();
        Some(Box::new(name))
    }
}
