//! Diagnostic events written to the diagnostic log

use std::fmt;
use std::path::Path;

use oaimerge_core::FileError;

/// Kind of anomaly; the label is the first field of a log line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Category {
    LeaderMalformed,
    FixedFieldMissing,
    FixedFieldTooLong,
    FixedFieldTooShort,
    YearMiscoded,
    NoRuleMatched,
    FileFailed,
}

impl Category {
    pub fn label(self) -> &'static str {
        match self {
            Self::LeaderMalformed => "leader malformed",
            Self::FixedFieldMissing => "008 missing",
            Self::FixedFieldTooLong => "008 too long",
            Self::FixedFieldTooShort => "008 too short",
            Self::YearMiscoded => "year miscoded",
            Self::NoRuleMatched => "no rule matched",
            Self::FileFailed => "file failed",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// One anomaly: category, subject (record id or file path), offending value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiagnosticEvent {
    pub category: Category,
    pub subject: String,
    pub value: Option<String>,
}

impl DiagnosticEvent {
    pub fn new(category: Category, subject: &str, value: Option<&str>) -> Self {
        Self {
            category,
            subject: subject.to_string(),
            value: value.map(str::to_string),
        }
    }

    pub fn file_failed(path: &Path, err: &FileError) -> Self {
        Self {
            category: Category::FileFailed,
            subject: path.display().to_string(),
            value: Some(err.log_value()),
        }
    }
}

/// `category;subject[;value]`, always a single line
impl fmt::Display for DiagnosticEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{};{}", self.category, one_line(&self.subject))?;
        if let Some(value) = &self.value {
            write!(f, ";{}", one_line(value))?;
        }
        Ok(())
    }
}

fn one_line(s: &str) -> std::borrow::Cow<'_, str> {
    if s.contains(['\n', '\r']) {
        s.replace(['\n', '\r'], " ").into()
    } else {
        s.into()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn line_with_value() {
        let ev = DiagnosticEvent::new(
            Category::FixedFieldTooShort,
            "990001",
            Some("850101s1950"),
        );
        assert_eq!(ev.to_string(), "008 too short;990001;850101s1950");
    }

    #[test]
    fn line_without_value() {
        let ev = DiagnosticEvent::new(Category::FixedFieldMissing, "990002", None);
        assert_eq!(ev.to_string(), "008 missing;990002");
    }

    #[test]
    fn missing_id_keeps_field_position() {
        let ev = DiagnosticEvent::new(Category::LeaderMalformed, "", Some("short"));
        assert_eq!(ev.to_string(), "leader malformed;;short");
    }

    #[test]
    fn newlines_are_flattened() {
        let ev = DiagnosticEvent::new(Category::NoRuleMatched, "1", Some("a\nb"));
        assert_eq!(ev.to_string(), "no rule matched;1;a b");
    }

    #[test]
    fn file_failed_line() {
        let err = FileError::Parse("unexpected end of document".into());
        let ev = DiagnosticEvent::file_failed(Path::new("/data/h1.xml"), &err);
        assert_eq!(
            ev.to_string(),
            "file failed;/data/h1.xml;XML: unexpected end of document"
        );
    }
}
