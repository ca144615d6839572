//! Diagnostics for `runmark`.
//!
//! Errors are collected as [`ariadne`] reports while a file is parsed and printed once parsing is
//! done, against the sources registered in a [`FileIdMap`].

pub mod span;

use std::io;
use std::sync::{Arc, Mutex, MutexGuard};

pub use ariadne;

use ariadne::ReportKind;

use span::{FileId, FileIdMap, Span};


pub type Report = ariadne::Report<'static, Span>;
pub type ReportBuilder = ariadne::ReportBuilder<'static, Span>;
pub type Label = ariadne::Label<Span>;

impl ariadne::Span for Span {
    type SourceId = FileId;

    fn source(&self) -> &FileId {
        &self.file_id
    }

    fn start(&self) -> usize {
        self.start as usize
    }

    fn end(&self) -> usize {
        self.end as usize
    }
}

/// Start an error report with a single labelled span.
pub fn error_report(span: Span, message: impl ToString, label: impl ToString) -> ReportBuilder {
    Report::build(ReportKind::Error, span.file_id, span.start as usize)
        .with_message(message)
        .with_label(Label::new(span).with_message(label))
}

/// Collects reports. Clones share the same list, so a parser can own one while the caller keeps
/// another to print from.
#[derive(Debug, Default, Clone)]
pub struct Diagnostics {
    reports: Arc<Mutex<Vec<Report>>>,
}

impl Diagnostics {
    fn reports(&self) -> MutexGuard<'_, Vec<Report>> {
        self.reports
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    pub fn add(&self, report: ReportBuilder) {
        self.reports().push(report.finish());
    }

    /// Render every report into `w`. Returns `true` if there was nothing to render.
    pub fn write(&self, map: &FileIdMap, mut w: impl io::Write) -> io::Result<bool> {
        let reports = self.reports();
        for report in reports.iter() {
            report.write(map, &mut w)?;
        }
        Ok(reports.is_empty())
    }

    /// Render every report to `stderr`. Returns `true` if there was nothing to render.
    pub fn eprint(&self, map: &FileIdMap) -> bool {
        match self.write(map, io::stderr().lock()) {
            Ok(empty) => empty,
            Err(err) => {
                eprintln!("failed to print diagnostics: {err}");
                false
            }
        }
    }

    pub fn is_empty(&self) -> bool {
        self.reports().is_empty()
    }

    pub fn len(&self) -> usize {
        self.reports().len()
    }
}
