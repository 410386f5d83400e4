//! OAI-PMH / MARCXML streaming parser using quick-xml
//!
//! Walks the harvest document event by event, copies each embedded MARC
//! record into its own buffer with namespace prefixes and declarations
//! stripped, and collects the leader and control fields on the way.

use std::borrow::Cow;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use oaimerge_core::FileError;
use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::name::{Namespace, ResolveResult};
use quick_xml::{NsReader, Writer};

use crate::eligibility::evaluate;
use crate::extract::{Extraction, Extractor};
use crate::record::CatalogRecord;

pub const OAI_NS: &[u8] = b"http://www.openarchives.org/OAI/2.0/";
pub const MARC_NS: &[u8] = b"http://www.loc.gov/MARC21/slim";

/// Namespace of an element, reduced to what the walker cares about
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Ns {
    Oai,
    Marc,
    Unbound,
    Other,
}

fn classify(ns: &ResolveResult) -> Ns {
    match ns {
        ResolveResult::Bound(Namespace(uri)) if *uri == OAI_NS => Ns::Oai,
        ResolveResult::Bound(Namespace(uri)) if *uri == MARC_NS => Ns::Marc,
        ResolveResult::Unbound => Ns::Unbound,
        _ => Ns::Other,
    }
}

/// Open elements outside of a captured record
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Scope {
    OaiRecord,
    Metadata,
    Other,
}

/// Where MARC records are expected in the document
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Layout {
    /// `oai:record/oai:metadata/marc:record`
    OaiEnvelope,
    /// `record` elements in the MARC namespace (or none) at any depth
    Bare,
}

impl Layout {
    fn is_record(self, ns: Ns, local: &[u8], parent: Option<Scope>) -> bool {
        if local != b"record" {
            return false;
        }
        match self {
            Self::OaiEnvelope => ns == Ns::Marc && parent == Some(Scope::Metadata),
            Self::Bare => matches!(ns, Ns::Marc | Ns::Unbound),
        }
    }

    fn scope_of(self, ns: Ns, local: &[u8], parent: Option<Scope>) -> Scope {
        match (ns, local, parent) {
            (Ns::Oai, b"record", _) => Scope::OaiRecord,
            (Ns::Oai, b"metadata", Some(Scope::OaiRecord)) => Scope::Metadata,
            _ => Scope::Other,
        }
    }
}

/// Which control value the text of the current element belongs to
enum Target {
    Leader,
    Control(String),
}

fn parse_error(e: quick_xml::Error, position: impl std::fmt::Display) -> FileError {
    FileError::Parse(format!("{e} (at byte {position})"))
}

/// Next event plus its resolved namespace, without holding a borrow on the reader.
fn next_resolved<'b, R: BufRead>(
    reader: &mut NsReader<R>,
    buf: &'b mut Vec<u8>,
) -> quick_xml::Result<(Ns, Event<'b>)> {
    let (ns, event) = reader.read_resolved_event_into(buf)?;
    Ok((classify(&ns), event))
}

/// Walk a document, handing every MARC record found to `on_record`.
///
/// Returns the number of records found. Any syntax error, or a document
/// that ends with open elements, fails the whole input.
pub(crate) fn scan_records<R: BufRead>(
    input: R,
    layout: Layout,
    mut on_record: impl FnMut(CatalogRecord, Vec<u8>),
) -> Result<usize, FileError> {
    let mut reader = NsReader::from_reader(input);
    let mut buf = Vec::new();
    let mut scopes: Vec<Scope> = Vec::new();
    let mut saw_root = false;
    let mut found = 0;

    loop {
        let (ns, event) = next_resolved(&mut reader, &mut buf)
            .map_err(|e| parse_error(e, reader.error_position()))?;

        match event {
            Event::Start(e) => {
                saw_root = true;
                let parent = scopes.last().copied();
                if layout.is_record(ns, e.local_name().as_ref(), parent) {
                    let (record, fragment) = capture_record(&mut reader, &e)?;
                    found += 1;
                    on_record(record, fragment);
                } else {
                    scopes.push(layout.scope_of(ns, e.local_name().as_ref(), parent));
                }
            }
            Event::Empty(e) => {
                saw_root = true;
                if layout.is_record(ns, e.local_name().as_ref(), scopes.last().copied()) {
                    let mut writer = Writer::new(Vec::new());
                    writer.write_event(Event::Empty(normalized(&e)))?;
                    found += 1;
                    on_record(CatalogRecord::default(), writer.into_inner());
                }
            }
            Event::End(_) => {
                scopes.pop();
            }
            Event::Decl(d) => check_encoding(&d)?,
            Event::Eof => break,
            _ => {}
        }
        buf.clear();
    }

    if !saw_root {
        // A transform that filtered out everything may print only a declaration
        return match layout {
            Layout::OaiEnvelope => Err(FileError::Parse("document has no root element".into())),
            Layout::Bare => Ok(0),
        };
    }
    if !scopes.is_empty() {
        return Err(FileError::Parse(format!(
            "unexpected end of document with {} unclosed elements",
            scopes.len()
        )));
    }
    Ok(found)
}

/// Copy one record subtree (the start tag is already consumed) into a fragment.
fn capture_record<R: BufRead>(
    reader: &mut NsReader<R>,
    start: &BytesStart,
) -> Result<(CatalogRecord, Vec<u8>), FileError> {
    let mut writer = Writer::new(Vec::new());
    writer.write_event(Event::Start(normalized(start)))?;

    let mut record = CatalogRecord::default();
    let mut current: Option<(Target, String)> = None;
    let mut depth = 1usize;
    let mut buf = Vec::new();

    loop {
        let event = reader
            .read_event_into(&mut buf)
            .map_err(|e| parse_error(e, reader.error_position()))?;

        match event {
            Event::Start(e) => {
                depth += 1;
                current = target_of(&e).map(|t| (t, String::new()));
                writer.write_event(Event::Start(normalized(&e)))?;
            }
            Event::Empty(e) => {
                if let Some(target) = target_of(&e) {
                    store(&mut record, target, String::new());
                }
                writer.write_event(Event::Empty(normalized(&e)))?;
            }
            Event::End(e) => {
                depth -= 1;
                if let Some((target, text)) = current.take() {
                    store(&mut record, target, text);
                }
                let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
                writer.write_event(Event::End(BytesEnd::new(name)))?;
                if depth == 0 {
                    break;
                }
            }
            Event::Text(t) => {
                if let Some((_, text)) = current.as_mut() {
                    text.push_str(&unescape_lossy(&t));
                }
                writer.write_event(Event::Text(t))?;
            }
            Event::CData(c) => {
                if let Some((_, text)) = current.as_mut() {
                    text.push_str(&String::from_utf8_lossy(&c));
                }
                writer.write_event(Event::CData(c))?;
            }
            Event::Eof => {
                return Err(FileError::Parse(
                    "unexpected end of document inside record".into(),
                ));
            }
            // comments, processing instructions
            _ => {}
        }
        buf.clear();
    }

    let fragment = writer.into_inner();
    if let Err(e) = std::str::from_utf8(&fragment) {
        return Err(FileError::Parse(format!("record is not valid UTF-8: {e}")));
    }
    Ok((record, fragment))
}

/// Fragments are copied byte for byte into a UTF-8 document.
fn check_encoding(decl: &BytesDecl) -> Result<(), FileError> {
    let Some(Ok(encoding)) = decl.encoding() else {
        return Ok(());
    };
    let supported = [&b"utf-8"[..], b"utf8", b"us-ascii"]
        .iter()
        .any(|e| encoding.eq_ignore_ascii_case(e));
    if supported {
        Ok(())
    } else {
        Err(FileError::Parse(format!(
            "unsupported encoding {}",
            String::from_utf8_lossy(&encoding)
        )))
    }
}

fn target_of(e: &BytesStart) -> Option<Target> {
    match e.local_name().as_ref() {
        b"leader" => Some(Target::Leader),
        b"controlfield" => {
            let tag = e.try_get_attribute("tag").ok().flatten()?;
            let tag = tag.unescape_value().ok()?.trim().to_string();
            Some(Target::Control(tag))
        }
        _ => None,
    }
}

fn store(record: &mut CatalogRecord, target: Target, text: String) {
    match target {
        Target::Leader => record.leader = text,
        Target::Control(tag) => record.add_controlfield(tag, text),
    }
}

fn unescape_lossy<'a>(t: &'a BytesText<'a>) -> Cow<'a, str> {
    match t.unescape() {
        Ok(text) => text,
        Err(_) => String::from_utf8_lossy(t).into_owned().into(),
    }
}

/// Start tag with the local name only, minus namespace declarations and
/// prefixed attributes such as `xsi:schemaLocation`.
fn normalized(e: &BytesStart) -> BytesStart<'static> {
    let name = String::from_utf8_lossy(e.local_name().as_ref()).into_owned();
    let mut out = BytesStart::new(name);
    for attr in e.attributes().with_checks(false).flatten() {
        if attr.key.as_namespace_binding().is_some() || attr.key.prefix().is_some() {
            continue;
        }
        let value: Cow<[u8]> = if attr.value.contains(&b'"') {
            String::from_utf8_lossy(&attr.value)
                .replace('"', "&quot;")
                .into_bytes()
                .into()
        } else {
            attr.value
        };
        out.push_attribute((attr.key.as_ref(), value.as_ref()));
    }
    out
}

/// Kept records of one OAI-PMH document, filtered by [`evaluate`].
pub fn extract_from_reader<R: BufRead>(input: R) -> Result<Extraction, FileError> {
    let mut fragments = Vec::new();
    let mut diagnostics = Vec::new();

    let records_seen = scan_records(input, Layout::OaiEnvelope, |record, fragment| {
        let decision = evaluate(&record);
        if decision.keep {
            fragments.push(fragment);
        }
        diagnostics.extend(decision.diagnostics);
    })?;

    Ok(Extraction {
        fragments,
        diagnostics,
        records_seen,
    })
}

/// Every MARC record in a document, normalized but not filtered.
pub(crate) fn normalize_records<R: BufRead>(input: R) -> Result<Vec<Vec<u8>>, FileError> {
    let mut fragments = Vec::new();
    scan_records(input, Layout::Bare, |_, fragment| fragments.push(fragment))?;
    Ok(fragments)
}

/// Built-in extractor: quick-xml streaming parse plus the eligibility filter.
#[derive(Debug, Default, Clone, Copy)]
pub struct NativeExtractor;

impl Extractor for NativeExtractor {
    fn name(&self) -> &'static str {
        "native"
    }

    fn extract(&self, path: &Path) -> Result<Extraction, FileError> {
        let file = File::open(path)?;
        extract_from_reader(BufReader::new(file))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::diagnostic::Category;

    pub(crate) const OLD_BOOK: &str = r#"<record xmlns="http://www.loc.gov/MARC21/slim" type="Bibliographic"><leader>00000nam a2200000 c 4500</leader><controlfield tag="001">990001</controlfield><controlfield tag="008">850101s1950    gw            000 0 ger d</controlfield><datafield tag="245" ind1="1" ind2="0"><subfield code="a">Alte Karten &amp; Pläne</subfield></datafield></record>"#;

    pub(crate) const NEW_BOOK: &str = r#"<record xmlns="http://www.loc.gov/MARC21/slim"><leader>00000nam a2200000 c 4500</leader><controlfield tag="001">990002</controlfield><controlfield tag="008">050101s2005    gw            000 0 ger d</controlfield></record>"#;

    /// OAI-PMH ListRecords response wrapping the given metadata payloads
    pub(crate) fn oai_document(payloads: &[&str]) -> String {
        let mut doc = String::from(
            r#"<?xml version="1.0" encoding="UTF-8"?>
<OAI-PMH xmlns="http://www.openarchives.org/OAI/2.0/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:schemaLocation="http://www.openarchives.org/OAI/2.0/ http://www.openarchives.org/OAI/2.0/OAI-PMH.xsd">
  <responseDate>2024-01-01T00:00:00Z</responseDate>
  <request verb="ListRecords" metadataPrefix="marc21">https://example.org/oai</request>
  <ListRecords>
"#,
        );
        for (i, payload) in payloads.iter().enumerate() {
            doc.push_str(&format!(
                "    <record>\n      <header><identifier>oai:example.org:{i}</identifier><datestamp>2024-01-01</datestamp></header>\n      <metadata>{payload}</metadata>\n    </record>\n"
            ));
        }
        doc.push_str("  </ListRecords>\n</OAI-PMH>\n");
        doc
    }

    fn extract(doc: &str) -> Extraction {
        extract_from_reader(doc.as_bytes()).unwrap()
    }

    fn fragment_str(ex: &Extraction, i: usize) -> &str {
        std::str::from_utf8(&ex.fragments[i]).unwrap()
    }

    #[test]
    fn keeps_old_drops_new() {
        let ex = extract(&oai_document(&[OLD_BOOK, NEW_BOOK]));
        assert_eq!(ex.records_seen, 2);
        assert_eq!(ex.fragments.len(), 1);
        assert!(fragment_str(&ex, 0).contains("990001"));
        assert!(ex.diagnostics.is_empty());
    }

    #[test]
    fn default_namespace_declaration_dropped() {
        let ex = extract(&oai_document(&[OLD_BOOK]));
        assert_eq!(
            fragment_str(&ex, 0),
            r#"<record type="Bibliographic"><leader>00000nam a2200000 c 4500</leader><controlfield tag="001">990001</controlfield><controlfield tag="008">850101s1950    gw            000 0 ger d</controlfield><datafield tag="245" ind1="1" ind2="0"><subfield code="a">Alte Karten &amp; Pläne</subfield></datafield></record>"#
        );
    }

    #[test]
    fn prefixes_and_schema_location_stripped() {
        let prefixed = r#"<marc:record xmlns:marc="http://www.loc.gov/MARC21/slim" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:schemaLocation="http://www.loc.gov/MARC21/slim http://www.loc.gov/standards/marcxml/schema/MARC21slim.xsd"><marc:leader>00000nem a2200000 c 4500</marc:leader><marc:controlfield tag="001">990003</marc:controlfield><marc:controlfield tag="008">850101s1994    gw            000 0 ger d</marc:controlfield></marc:record>"#;
        let ex = extract(&oai_document(&[prefixed]));
        assert_eq!(ex.fragments.len(), 1, "map from 1994 is within the map cutoff");
        assert_eq!(
            fragment_str(&ex, 0),
            r#"<record><leader>00000nem a2200000 c 4500</leader><controlfield tag="001">990003</controlfield><controlfield tag="008">850101s1994    gw            000 0 ger d</controlfield></record>"#
        );
    }

    #[test]
    fn non_marc_metadata_and_deleted_records_ignored() {
        let dc = r#"<oai_dc:dc xmlns:oai_dc="http://www.openarchives.org/OAI/2.0/oai_dc/"><record>not marc</record></oai_dc:dc>"#;
        let mut doc = oai_document(&[dc, OLD_BOOK]);
        doc = doc.replace(
            "  </ListRecords>",
            "    <record><header status=\"deleted\"><identifier>oai:example.org:x</identifier></header></record>\n  </ListRecords>",
        );
        let ex = extract(&doc);
        assert_eq!(ex.records_seen, 1);
        assert_eq!(ex.fragments.len(), 1);
    }

    #[test]
    fn marc_record_outside_metadata_ignored() {
        let doc = format!(
            r#"<OAI-PMH xmlns="http://www.openarchives.org/OAI/2.0/"><ListRecords>{OLD_BOOK}</ListRecords></OAI-PMH>"#
        );
        assert_eq!(extract(&doc).records_seen, 0);
    }

    #[test]
    fn anomalies_become_diagnostics() {
        let no_008 = r#"<record xmlns="http://www.loc.gov/MARC21/slim"><leader>00000nam a2200000 c 4500</leader><controlfield tag="001">990004</controlfield></record>"#;
        let bad_leader = r#"<record xmlns="http://www.loc.gov/MARC21/slim"><leader>00000nam</leader><controlfield tag="001">990005</controlfield><controlfield tag="008">850101s1950    gw            000 0 ger d</controlfield></record>"#;
        let ex = extract(&oai_document(&[no_008, bad_leader]));

        assert_eq!(ex.records_seen, 2);
        assert_eq!(ex.fragments.len(), 1);
        let lines: Vec<String> = ex.diagnostics.iter().map(ToString::to_string).collect();
        assert_eq!(
            lines,
            vec![
                "008 missing;990004".to_string(),
                "leader malformed;990005;00000nam".to_string(),
            ]
        );
    }

    #[test]
    fn empty_record_element_is_dropped_with_diagnostics() {
        let ex = extract(&oai_document(&[r#"<record xmlns="http://www.loc.gov/MARC21/slim"/>"#]));
        assert_eq!(ex.records_seen, 1);
        assert!(ex.fragments.is_empty());
        assert_eq!(ex.diagnostics[0].category, Category::LeaderMalformed);
        assert_eq!(ex.diagnostics[1].category, Category::FixedFieldMissing);
    }

    #[test]
    fn escaped_control_values_are_unescaped_for_filtering() {
        let rec = r#"<record xmlns="http://www.loc.gov/MARC21/slim"><leader>00000nam a2200000 c 4500</leader><controlfield tag="001">a&amp;b</controlfield><controlfield tag="008">850101s1950    gw            000 0 ger d</controlfield></record>"#;
        let ex = extract(&oai_document(&[rec]));
        assert!(fragment_str(&ex, 0).contains("<controlfield tag=\"001\">a&amp;b</controlfield>"));
    }

    #[test]
    fn empty_file_is_error() {
        assert!(matches!(
            extract_from_reader(&b""[..]),
            Err(FileError::Parse(_))
        ));
    }

    #[test]
    fn truncated_between_records_is_error() {
        let doc = oai_document(&[OLD_BOOK, OLD_BOOK]);
        let cut = &doc[..doc.rfind("<record>").unwrap()];
        assert!(matches!(
            extract_from_reader(cut.as_bytes()),
            Err(FileError::Parse(_))
        ));
    }

    #[test]
    fn truncated_inside_record_is_error() {
        let doc = oai_document(&[OLD_BOOK]);
        let cut = &doc[..doc.find("<datafield").unwrap()];
        assert!(extract_from_reader(cut.as_bytes()).is_err());
    }

    #[test]
    fn mismatched_end_tag_is_error() {
        let doc = oai_document(&[OLD_BOOK]).replace("</ListRecords>", "</Records>");
        assert!(extract_from_reader(doc.as_bytes()).is_err());
    }

    #[test]
    fn normalize_records_bare_stream() {
        let stream = format!(
            r#"<?xml version="1.0"?>{OLD_BOOK}<record xmlns="http://www.loc.gov/MARC21/slim" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance" xsi:schemaLocation="x y.xsd"><leader>00000nam a2200000 c 4500</leader></record>"#
        );
        let fragments = normalize_records(stream.as_bytes()).unwrap();
        assert_eq!(fragments.len(), 2);
        assert_eq!(
            std::str::from_utf8(&fragments[1]).unwrap(),
            "<record><leader>00000nam a2200000 c 4500</leader></record>"
        );
    }

    #[test]
    fn normalize_records_inside_collection() {
        let stream = format!(
            r#"<collection xmlns="http://www.loc.gov/MARC21/slim">{OLD_BOOK}{NEW_BOOK}</collection>"#
        );
        // no filtering on this path
        assert_eq!(normalize_records(stream.as_bytes()).unwrap().len(), 2);
    }

    #[test]
    fn normalize_records_declaration_only_is_empty() {
        let stream = "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n";
        assert!(normalize_records(stream.as_bytes()).unwrap().is_empty());
        // the harvest document itself still needs a root
        assert!(matches!(
            extract_from_reader(stream.as_bytes()),
            Err(FileError::Parse(_))
        ));
    }

    #[test]
    fn latin1_bytes_are_rejected() {
        let doc = oai_document(&[OLD_BOOK]);
        let at = doc.find('ä').unwrap();
        let mut bytes = doc.into_bytes();
        bytes.splice(at..at + 2, [0xE4]);
        match extract_from_reader(&bytes[..]) {
            Err(FileError::Parse(msg)) => assert!(msg.contains("UTF-8")),
            other => panic!("expected parse error, got {other:?}"),
        }
    }

    #[test]
    fn non_utf8_declaration_is_rejected() {
        let doc = oai_document(&[NEW_BOOK]).replace("encoding=\"UTF-8\"", "encoding=\"ISO-8859-1\"");
        match extract_from_reader(doc.as_bytes()) {
            Err(FileError::Parse(msg)) => assert!(msg.contains("ISO-8859-1")),
            other => panic!("expected parse error, got {other:?}"),
        }

        let lower = oai_document(&[OLD_BOOK]).replace("encoding=\"UTF-8\"", "encoding=\"utf-8\"");
        assert_eq!(extract_from_reader(lower.as_bytes()).unwrap().fragments.len(), 1);
    }

    #[test]
    fn native_extractor_reads_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("h.xml");
        std::fs::write(&path, oai_document(&[OLD_BOOK, NEW_BOOK])).unwrap();

        let ex = NativeExtractor.extract(&path).unwrap();
        assert_eq!(ex.fragments.len(), 1);
        assert!(matches!(
            NativeExtractor.extract(&dir.path().join("missing.xml")),
            Err(FileError::Io(_))
        ));
    }
}
