//! A deliberately minimal `<?xml...><data>...</data>` scanner (§4.3).
//!
//! Firehose XML is never validated against a schema here — the session only
//! needs to find record boundaries and pull one attribute out of the first
//! inner element, so this is a scanner, not a parser.

/// One extracted XML record: its raw bytes plus the tag and `value="..."`
/// attribute of its first inner element, if present.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct XmlRecord {
    pub raw: String,
    pub tag: String,
    pub value: Option<String>,
}

/// Scans `buf` for one complete `<?xml ...?><data>...</data>` record.
///
/// Returns `(record, bytes_consumed)` on success. Bytes preceding the
/// literal `<?xml` are reported as a separate discard count so the caller
/// can log them, per §4.3 step 1 ("discard any bytes before it, shifting
/// left").
pub fn extract_record(buf: &[u8]) -> ScanResult {
    let text = match std::str::from_utf8(buf) {
        Ok(t) => t,
        Err(_) => return ScanResult::Incomplete,
    };

    let Some(xml_start) = text.find("<?xml") else {
        return ScanResult::NoDelimiterYet {
            discard: buf.len(),
        };
    };

    if xml_start > 0 {
        return ScanResult::Discard(xml_start);
    }

    let Some(data_end_rel) = text.find("</data>") else {
        return ScanResult::Incomplete;
    };
    let consumed = data_end_rel + "</data>".len();
    let raw = text[..consumed].to_string();

    let (tag, value) = extract_first_element(&raw);

    ScanResult::Record {
        record: XmlRecord { raw, tag, value },
        consumed,
    }
}

pub enum ScanResult {
    /// No `<?xml` found in the buffer yet; caller should keep accumulating.
    /// All bytes examined are junk and may be dropped up to `discard`.
    NoDelimiterYet { discard: usize },
    /// Bytes before the `<?xml` marker should be discarded (and logged).
    Discard(usize),
    /// A `<?xml` marker was found but `</data>` hasn't arrived yet.
    Incomplete,
    /// A complete record was extracted.
    Record { record: XmlRecord, consumed: usize },
}

/// Finds the first inner element after `<data>` and pulls its tag name and
/// `value="..."` attribute, if any.
fn extract_first_element(raw: &str) -> (String, Option<String>) {
    let Some(data_start) = raw.find("<data>") else {
        return (String::new(), None);
    };
    let rest = &raw[data_start + "<data>".len()..];
    let Some(tag_start) = rest.find('<') else {
        return (String::new(), None);
    };
    let rest = &rest[tag_start + 1..];
    let tag_end = rest
        .find(|c: char| c.is_whitespace() || c == '>' || c == '/')
        .unwrap_or(rest.len());
    let tag = rest[..tag_end].to_string();

    let value = rest.find("value=\"").map(|v_start| {
        let after = &rest[v_start + "value=\"".len()..];
        let v_end = after.find('"').unwrap_or(after.len());
        after[..v_end].to_string()
    });

    (tag, value)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_a_response_record() {
        let input = br#"<?xml version="1.0"?><data><response value="ACK"/></data>"#;
        match extract_record(input) {
            ScanResult::Record { record, consumed } => {
                assert_eq!(record.tag, "response");
                assert_eq!(record.value.as_deref(), Some("ACK"));
                assert_eq!(consumed, input.len());
            }
            _ => panic!("expected a record"),
        }
    }

    #[test]
    fn extracts_a_log_record() {
        let input = br#"<?xml version="1.0"?><data><log value="starting download"/></data>"#;
        match extract_record(input) {
            ScanResult::Record { record, .. } => {
                assert_eq!(record.tag, "log");
                assert_eq!(record.value.as_deref(), Some("starting download"));
            }
            _ => panic!("expected a record"),
        }
    }

    #[test]
    fn discards_leading_junk() {
        let input = b"garbage<?xml version=\"1.0\"?><data></data>";
        match extract_record(input) {
            ScanResult::Discard(n) => assert_eq!(n, "garbage".len()),
            _ => panic!("expected a discard"),
        }
    }

    #[test]
    fn incomplete_record_waits_for_more_bytes() {
        let input = b"<?xml version=\"1.0\"?><data><log value=\"still going\"";
        assert!(matches!(extract_record(input), ScanResult::Incomplete));
    }

    #[test]
    fn no_delimiter_yet_reports_all_as_discardable() {
        let input = b"not xml at all";
        match extract_record(input) {
            ScanResult::NoDelimiterYet { discard } => assert_eq!(discard, input.len()),
            _ => panic!("expected NoDelimiterYet"),
        }
    }
}
