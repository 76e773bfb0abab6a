// ==========================================
// Product Feed Import - feed parser (Source Reader)
// ==========================================
// Turns a buffered feed body into a lazy sequence of flat records.
//
// XML:  one record per repeating item element.
//       direct child  <NAME>x</NAME>           -> NAME = "x" (CDATA included)
//       grandchild    <PARAM><VAL>x</VAL>       -> PARAM/VAL = "x"
//       repeated      <IMGURL>a</IMGURL><IMGURL>b -> IMGURL = "a|b"
//       item attrs    <SHOPITEM id="7">         -> @id = "7"
// CSV:  header row (or column_1..N) -> one record per row,
//       column-count mismatch is a per-record error.
// JSON: top-level array of objects (or an object holding one);
//       nested objects flattened with '/', arrays joined with '|'.
// ==========================================

use crate::domain::feed::{FormatOptions, DEFAULT_XML_ITEM_PATH};
use crate::domain::record::{RawRecord, RecordError};
use crate::domain::types::FeedFormat;
use crate::importer::error::{ImportError, ImportResult};
use quick_xml::escape::{resolve_html5_entity, resolve_predefined_entity, unescape_with};
use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;
use serde_json::Value;
use std::cmp::Reverse;
use std::collections::HashMap;
use tracing::debug;

/// Separator for multi-valued fields.
pub const MULTI_VALUE_SEPARATOR: char = '|';

const UTF8_BOM: &[u8] = b"\xEF\xBB\xBF";

/// One source item: a record, or a per-record error.
pub type SourceItem = Result<RawRecord, RecordError>;

/// Outer error is fatal to the whole read (malformed document).
pub type RecordIter<'a> = Box<dyn Iterator<Item = ImportResult<SourceItem>> + Send + 'a>;

pub fn strip_bom(body: &[u8]) -> &[u8] {
    body.strip_prefix(UTF8_BOM).unwrap_or(body)
}

/// Format suggested by the first significant byte, falling back to `requested`.
pub fn sniff_format(body: &[u8], requested: FeedFormat) -> FeedFormat {
    let first = strip_bom(body)
        .iter()
        .find(|b| !b.is_ascii_whitespace());
    match first {
        Some(b'<') => FeedFormat::Xml,
        Some(b'[') | Some(b'{') => FeedFormat::Json,
        _ => requested,
    }
}

/// Validates a CSV delimiter (single ASCII byte, not a quote or newline).
pub fn csv_delimiter(delimiter: char) -> ImportResult<u8> {
    u8::try_from(delimiter)
        .ok()
        .filter(|b| b.is_ascii() && !matches!(b, b'"' | b'\n' | b'\r'))
        .ok_or_else(|| {
            ImportError::InvalidMapping(format!(
                "CSV delimiter must be a single ASCII character, got {:?}",
                delimiter
            ))
        })
}

fn add_field(record: &mut RawRecord, key: String, value: &str) {
    let slot = record.entry(key).or_default();
    if value.is_empty() {
        return;
    }
    if !slot.is_empty() {
        slot.push(MULTI_VALUE_SEPARATOR);
    }
    slot.push_str(value);
}

// ==========================================
// FeedSource
// ==========================================
pub struct FeedSource {
    body: Vec<u8>,
    format: FeedFormat,
    options: FormatOptions,
    item_path: Option<String>,
    item_path_detected: bool,
    json_items: Vec<Value>,
}

impl FeedSource {
    /// Checks the top-level structure and resolves format and item path.
    ///
    /// # Errors
    /// - `FeedParseError` when the document is not the format it claims to be
    pub fn open(body: Vec<u8>, requested: FeedFormat, options: &FormatOptions) -> ImportResult<Self> {
        let format = sniff_format(&body, requested);
        if format != requested {
            debug!(requested = %requested, detected = %format, "feed format overridden by content");
        }

        let mut source = Self {
            body,
            format,
            options: options.clone(),
            item_path: None,
            item_path_detected: false,
            json_items: Vec::new(),
        };

        match format {
            FeedFormat::Xml => source.resolve_xml_item_path()?,
            FeedFormat::Csv => {
                csv_delimiter(options.csv_delimiter)?;
            }
            FeedFormat::Json => source.load_json_items()?,
        }

        Ok(source)
    }

    pub fn format(&self) -> FeedFormat {
        self.format
    }

    /// Item path actually used (configured or detected).
    pub fn item_path(&self) -> Option<&str> {
        self.item_path.as_deref()
    }

    /// True when the configured item path matched nothing and another was detected.
    pub fn item_path_detected(&self) -> bool {
        self.item_path_detected
    }

    pub fn records(&self) -> ImportResult<RecordIter<'_>> {
        match self.format {
            FeedFormat::Xml => {
                let path = self.item_path.as_deref().unwrap_or(DEFAULT_XML_ITEM_PATH);
                Ok(Box::new(XmlRecords::new(strip_bom(&self.body), path)))
            }
            FeedFormat::Csv => Ok(Box::new(CsvRecords::new(
                strip_bom(&self.body),
                &self.options,
            )?)),
            FeedFormat::Json => Ok(Box::new(
                self.json_items
                    .iter()
                    .enumerate()
                    .map(|(idx, item)| -> ImportResult<SourceItem> {
                        Ok(flatten_json_item(idx + 1, item))
                    }),
            )),
        }
    }

    /// Records starting at index `offset`; earlier ones are re-scanned and dropped.
    pub fn records_from(&self, offset: usize) -> ImportResult<RecordIter<'_>> {
        Ok(Box::new(self.records()?.skip(offset)))
    }

    /// Number of items (records plus per-record errors) in the feed.
    ///
    /// Scans the whole buffer without mapping anything, so a malformed
    /// document fails here before any record is applied.
    pub fn count(&self) -> ImportResult<u64> {
        let mut total = 0u64;
        for item in self.records()? {
            let _counted: SourceItem = item?;
            total += 1;
        }
        Ok(total)
    }

    fn resolve_xml_item_path(&mut self) -> ImportResult<()> {
        let body = strip_bom(&self.body);
        if !xml_has_root(body)? {
            return Err(ImportError::FeedParseError(
                "XML: document has no root element".to_string(),
            ));
        }

        let configured = self
            .options
            .item_path()
            .unwrap_or(DEFAULT_XML_ITEM_PATH)
            .to_string();

        let has_items = match XmlRecords::new(body, &configured).next() {
            Some(Ok(_)) => true,
            Some(Err(e)) => return Err(e),
            None => false,
        };

        if has_items {
            self.item_path = Some(configured);
            return Ok(());
        }

        match detect_item_path(body)? {
            Some(detected) => {
                debug!(configured = %configured, detected = %detected, "XML item path detected");
                self.item_path = Some(detected);
                self.item_path_detected = true;
            }
            None => self.item_path = Some(configured),
        }
        Ok(())
    }

    fn load_json_items(&mut self) -> ImportResult<()> {
        let mut value: Value = serde_json::from_slice(strip_bom(&self.body))?;

        if let Value::Array(items) = &mut value {
            self.json_items = std::mem::take(items);
            return Ok(());
        }

        let Value::Object(map) = &value else {
            return Err(ImportError::FeedParseError(
                "JSON: expected a top-level array of objects".to_string(),
            ));
        };

        let configured = self.options.item_path().map(str::to_string);
        let mut candidates: Vec<String> = configured.iter().cloned().collect();
        // fall back to the only array-valued key
        let arrays: Vec<&String> = map
            .iter()
            .filter(|(_, v)| v.is_array())
            .map(|(k, _)| k)
            .collect();
        if arrays.len() == 1 {
            candidates.push(arrays[0].clone());
        }

        for path in candidates {
            let pointer = format!("/{}", path.trim_matches('/'));
            if let Some(Value::Array(items)) = value.pointer_mut(&pointer).map(Value::take) {
                self.item_path_detected = configured.as_deref() != Some(path.as_str());
                self.item_path = Some(path);
                self.json_items = items;
                return Ok(());
            }
        }

        Err(ImportError::FeedParseError(
            "JSON: expected a top-level array of objects".to_string(),
        ))
    }
}

// ==========================================
// XML
// ==========================================
fn element_name(e: &BytesStart) -> String {
    String::from_utf8_lossy(e.name().as_ref()).into_owned()
}

fn resolve_entity(entity: &str) -> Option<&'static str> {
    resolve_predefined_entity(entity).or_else(|| resolve_html5_entity(entity))
}

/// Text of one field with XML and HTML entities resolved.
///
/// Invalid UTF-8 is replaced and an unknown entity leaves the text as
/// written; a bad field never fails the item or the document.
fn field_text(raw: &[u8]) -> String {
    let text = String::from_utf8_lossy(raw);
    match unescape_with(&text, resolve_entity) {
        Ok(value) => value.into_owned(),
        Err(e) => {
            debug!(error = %e, "field text kept unescaped");
            text.into_owned()
        }
    }
}

fn xml_has_root(body: &[u8]) -> ImportResult<bool> {
    let mut reader = Reader::from_reader(body);
    loop {
        match reader.read_event()? {
            Event::Start(_) | Event::Empty(_) => return Ok(true),
            Event::Eof => return Ok(false),
            _ => {}
        }
    }
}

struct Frame {
    path: String,
    text: String,
    has_children: bool,
}

struct XmlRecords<'a> {
    reader: Reader<&'a [u8]>,
    item_path: Vec<String>,
    stack: Vec<String>,
    done: bool,
}

impl<'a> XmlRecords<'a> {
    fn new(body: &'a [u8], item_path: &str) -> Self {
        Self {
            reader: Reader::from_reader(body),
            item_path: item_path
                .split('/')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(str::to_string)
                .collect(),
            stack: Vec::new(),
            done: false,
        }
    }

    fn at_item(&self) -> bool {
        !self.item_path.is_empty() && self.stack.ends_with(&self.item_path)
    }

    fn next_record(&mut self) -> ImportResult<Option<RawRecord>> {
        loop {
            match self.reader.read_event()? {
                Event::Start(e) => {
                    self.stack.push(element_name(&e));
                    if self.at_item() {
                        let mut record = item_attributes(&e)?;
                        self.read_item_body(&mut record)?;
                        self.stack.pop();
                        return Ok(Some(record));
                    }
                }
                Event::Empty(e) => {
                    self.stack.push(element_name(&e));
                    let is_item = self.at_item();
                    self.stack.pop();
                    if is_item {
                        return Ok(Some(item_attributes(&e)?));
                    }
                }
                Event::End(_) => {
                    self.stack.pop();
                }
                Event::Eof => {
                    if !self.stack.is_empty() {
                        return Err(unexpected_eof(&self.stack.join("/")));
                    }
                    return Ok(None);
                }
                _ => {}
            }
        }
    }

    fn read_item_body(&mut self, record: &mut RawRecord) -> ImportResult<()> {
        let mut frames: Vec<Frame> = Vec::new();
        loop {
            match self.reader.read_event()? {
                Event::Start(e) => {
                    let path = child_path(&mut frames, &element_name(&e));
                    frames.push(Frame {
                        path,
                        text: String::new(),
                        has_children: false,
                    });
                }
                Event::Empty(e) => {
                    let path = child_path(&mut frames, &element_name(&e));
                    add_field(record, path, "");
                }
                Event::Text(t) => {
                    if let Some(frame) = frames.last_mut() {
                        frame.text.push_str(&field_text(&t));
                    }
                }
                Event::CData(c) => {
                    if let Some(frame) = frames.last_mut() {
                        frame.text.push_str(&String::from_utf8_lossy(&c.into_inner()));
                    }
                }
                Event::End(_) => match frames.pop() {
                    Some(frame) => {
                        if !frame.has_children {
                            add_field(record, frame.path, frame.text.trim());
                        }
                    }
                    None => return Ok(()),
                },
                Event::Eof => return Err(unexpected_eof(&self.stack.join("/"))),
                _ => {}
            }
        }
    }
}

/// Path of a new child element; marks the parent as non-leaf.
fn child_path(frames: &mut [Frame], name: &str) -> String {
    match frames.last_mut() {
        Some(parent) => {
            parent.has_children = true;
            format!("{}/{}", parent.path, name)
        }
        None => name.to_string(),
    }
}

fn item_attributes(e: &BytesStart) -> ImportResult<RawRecord> {
    let mut record = RawRecord::new();
    for attr in e.attributes() {
        let attr = attr.map_err(quick_xml::Error::from)?;
        let key = String::from_utf8_lossy(attr.key.as_ref()).into_owned();
        let value = field_text(&attr.value);
        record.insert(format!("@{}", key), value.trim().to_string());
    }
    Ok(record)
}

fn unexpected_eof(open: &str) -> ImportError {
    ImportError::FeedParseError(format!("XML: unexpected end of document inside <{}>", open))
}

impl Iterator for XmlRecords<'_> {
    type Item = ImportResult<SourceItem>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.done {
            return None;
        }
        match self.next_record() {
            Ok(Some(record)) => Some(Ok(Ok(record))),
            Ok(None) => {
                self.done = true;
                None
            }
            Err(e) => {
                self.done = true;
                Some(Err(e))
            }
        }
    }
}

/// Guesses the repeating item element of an XML document.
///
/// Candidates are non-leaf elements below the root. Elements that repeat
/// beat single ones, then shallower beats deeper, then more frequent wins.
pub fn detect_item_path(body: &[u8]) -> ImportResult<Option<String>> {
    let mut reader = Reader::from_reader(strip_bom(body));
    let mut stack: Vec<(String, bool)> = Vec::new();
    // name -> (occurrences, shallowest depth)
    let mut stats: HashMap<String, (usize, usize)> = HashMap::new();

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                if let Some(parent) = stack.last_mut() {
                    parent.1 = true;
                }
                stack.push((element_name(&e), false));
            }
            Event::Empty(_) => {
                if let Some(parent) = stack.last_mut() {
                    parent.1 = true;
                }
            }
            Event::End(_) => {
                let depth = stack.len();
                if let Some((name, has_children)) = stack.pop() {
                    if has_children && depth > 1 {
                        let entry = stats.entry(name).or_insert((0, depth));
                        entry.0 += 1;
                        entry.1 = entry.1.min(depth);
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(stats
        .into_iter()
        .min_by_key(|(name, (count, depth))| {
            (*count < 2, *depth, Reverse(*count), name.clone())
        })
        .map(|(name, _)| name))
}

// ==========================================
// CSV
// ==========================================
struct CsvRecords<'a> {
    rows: csv::StringRecordsIntoIter<&'a [u8]>,
    headers: Option<Vec<String>>,
    index: usize,
}

impl<'a> CsvRecords<'a> {
    fn new(body: &'a [u8], options: &FormatOptions) -> ImportResult<Self> {
        let mut reader = csv::ReaderBuilder::new()
            .delimiter(csv_delimiter(options.csv_delimiter)?)
            .has_headers(options.csv_has_header)
            .flexible(true)
            .from_reader(body);

        let headers = if options.csv_has_header {
            Some(
                reader
                    .headers()?
                    .iter()
                    .map(|h| h.trim().to_string())
                    .collect(),
            )
        } else {
            None
        };

        Ok(Self {
            rows: reader.into_records(),
            headers,
            index: 0,
        })
    }
}

impl Iterator for CsvRecords<'_> {
    type Item = ImportResult<SourceItem>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let row = match self.rows.next()? {
                Ok(row) => row,
                Err(err) => {
                    self.index += 1;
                    if let csv::ErrorKind::Utf8 { .. } = err.kind() {
                        return Some(Ok(Err(RecordError::Malformed {
                            index: self.index,
                            message: err.to_string(),
                        })));
                    }
                    return Some(Err(err.into()));
                }
            };

            if row.iter().all(|v| v.trim().is_empty()) {
                continue;
            }
            self.index += 1;

            let headers = self.headers.get_or_insert_with(|| {
                (1..=row.len()).map(|i| format!("column_{}", i)).collect()
            });
            if row.len() != headers.len() {
                return Some(Ok(Err(RecordError::ColumnCountMismatch {
                    index: self.index,
                    expected: headers.len(),
                    found: row.len(),
                })));
            }

            let record = headers
                .iter()
                .zip(row.iter())
                .filter(|(name, _)| !name.is_empty())
                .map(|(name, value)| (name.clone(), value.trim().to_string()))
                .collect();
            return Some(Ok(Ok(record)));
        }
    }
}

// ==========================================
// JSON
// ==========================================
fn flatten_json_item(index: usize, item: &Value) -> SourceItem {
    match item {
        Value::Object(map) => {
            let mut record = RawRecord::new();
            for (key, value) in map {
                flatten_json_value(key.clone(), value, &mut record);
            }
            Ok(record)
        }
        other => Err(RecordError::Malformed {
            index,
            message: format!("expected an object, found {}", json_kind(other)),
        }),
    }
}

fn flatten_json_value(key: String, value: &Value, record: &mut RawRecord) {
    match value {
        Value::Null => add_field(record, key, ""),
        Value::String(s) => add_field(record, key, s.trim()),
        Value::Bool(_) | Value::Number(_) => add_field(record, key, &value.to_string()),
        Value::Array(items) => {
            if items.is_empty() {
                add_field(record, key.clone(), "");
            }
            for item in items {
                flatten_json_value(key.clone(), item, record);
            }
        }
        Value::Object(map) => {
            for (child, v) in map {
                flatten_json_value(format!("{}/{}", key, child), v, record);
            }
        }
    }
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn xml_options(path: &str) -> FormatOptions {
        FormatOptions {
            xml_item_path: Some(path.to_string()),
            ..FormatOptions::default()
        }
    }

    fn collect(source: &FeedSource) -> Vec<SourceItem> {
        source
            .records()
            .unwrap()
            .map(|item| item.unwrap())
            .collect()
    }

    const HEUREKA: &str = r#"<?xml version="1.0" encoding="utf-8"?>
<SHOP>
  <SHOPITEM id="7">
    <ITEM_ID>A1</ITEM_ID>
    <PRODUCTNAME><![CDATA[Blue Widget]]></PRODUCTNAME>
    <PRICE_VAT>19,99</PRICE_VAT>
    <IMGURL>https://cdn.example.com/1.jpg</IMGURL>
    <IMGURL_ALTERNATIVE>https://cdn.example.com/2.jpg</IMGURL_ALTERNATIVE>
    <IMGURL_ALTERNATIVE>https://cdn.example.com/3.jpg</IMGURL_ALTERNATIVE>
    <PARAM><PARAM_NAME>Color</PARAM_NAME><VAL>blue</VAL></PARAM>
    <EAN/>
  </SHOPITEM>
  <SHOPITEM>
    <ITEM_ID>A2</ITEM_ID>
    <PRODUCTNAME>Tom &amp; Jerry</PRODUCTNAME>
  </SHOPITEM>
</SHOP>"#;

    #[test]
    fn test_xml_record_shape() {
        let source =
            FeedSource::open(HEUREKA.as_bytes().to_vec(), FeedFormat::Xml, &xml_options("SHOPITEM"))
                .unwrap();
        let items = collect(&source);
        assert_eq!(items.len(), 2);

        let first = items[0].as_ref().unwrap();
        assert_eq!(first["@id"], "7");
        assert_eq!(first["PRODUCTNAME"], "Blue Widget");
        assert_eq!(first["PRICE_VAT"], "19,99");
        assert_eq!(
            first["IMGURL_ALTERNATIVE"],
            "https://cdn.example.com/2.jpg|https://cdn.example.com/3.jpg"
        );
        assert_eq!(first["PARAM/VAL"], "blue");
        assert_eq!(first["EAN"], "");
        assert!(!first.contains_key("PARAM"));

        let second = items[1].as_ref().unwrap();
        assert_eq!(second["PRODUCTNAME"], "Tom & Jerry");
        assert_eq!(source.count().unwrap(), 2);
    }

    #[test]
    fn test_xml_bad_field_text_is_kept() {
        let mut xml = b"<SHOP><SHOPITEM code=\"a&nbsp;b\"><NAME>Size&nbsp;XL &amp; more</NAME>\
                        <NOTE>&unknown; entity</NOTE></SHOPITEM>\
                        <SHOPITEM><NAME>Caf"
            .to_vec();
        xml.push(0xE9);
        xml.extend_from_slice(b"</NAME></SHOPITEM></SHOP>");

        let source = FeedSource::open(xml, FeedFormat::Xml, &xml_options("SHOPITEM")).unwrap();
        assert_eq!(source.count().unwrap(), 2);
        let items = collect(&source);

        let first = items[0].as_ref().unwrap();
        assert_eq!(first["NAME"], "Size\u{a0}XL & more");
        assert_eq!(first["@code"], "a\u{a0}b");
        assert_eq!(first["NOTE"], "&unknown; entity");

        let second = items[1].as_ref().unwrap();
        assert_eq!(second["NAME"], "Caf\u{fffd}");
    }

    #[test]
    fn test_xml_slash_item_path() {
        let source = FeedSource::open(
            HEUREKA.as_bytes().to_vec(),
            FeedFormat::Xml,
            &xml_options("SHOP/SHOPITEM"),
        )
        .unwrap();
        assert_eq!(source.count().unwrap(), 2);
        assert!(!source.item_path_detected());
    }

    #[test]
    fn test_xml_item_path_detection() {
        let xml = "\u{feff}<feed><meta><n>x</n></meta><products>\
                   <product><id>1</id></product>\
                   <product><id>2</id></product>\
                   <product><id>3</id></product>\
                   </products></feed>";
        let source =
            FeedSource::open(xml.as_bytes().to_vec(), FeedFormat::Xml, &xml_options("SHOPITEM"))
                .unwrap();
        assert_eq!(source.item_path(), Some("product"));
        assert!(source.item_path_detected());
        assert_eq!(source.count().unwrap(), 3);
    }

    #[test]
    fn test_xml_malformed_is_fatal() {
        let xml = "<SHOP><SHOPITEM><NAME>a</NAME></SHOPITEM><SHOPITEM><NAME>b</SHOP>";
        let result = FeedSource::open(xml.as_bytes().to_vec(), FeedFormat::Xml, &xml_options("SHOPITEM"))
            .and_then(|s| s.count());
        assert!(matches!(result, Err(ImportError::FeedParseError(_))));
    }

    #[test]
    fn test_records_from_offset() {
        let source =
            FeedSource::open(HEUREKA.as_bytes().to_vec(), FeedFormat::Xml, &xml_options("SHOPITEM"))
                .unwrap();
        let rest: Vec<_> = source.records_from(1).unwrap().collect();
        assert_eq!(rest.len(), 1);
        let record = rest[0].as_ref().unwrap().as_ref().unwrap();
        assert_eq!(record["ITEM_ID"], "A2");
    }

    #[test]
    fn test_csv_column_mismatch_is_per_record() {
        let csv = "\u{feff}ean; name ;price\n111;Widget;9,99\n\n222;Gadget\n333;Thing;1\n";
        let source = FeedSource::open(
            csv.as_bytes().to_vec(),
            FeedFormat::Csv,
            &FormatOptions::default(),
        )
        .unwrap();
        let items = collect(&source);
        assert_eq!(items.len(), 3);
        assert_eq!(items[0].as_ref().unwrap()["name"], "Widget");
        assert_eq!(
            items[1],
            Err(RecordError::ColumnCountMismatch {
                index: 2,
                expected: 3,
                found: 2
            })
        );
        assert_eq!(items[2].as_ref().unwrap()["ean"], "333");
    }

    #[test]
    fn test_csv_without_header() {
        let options = FormatOptions {
            csv_delimiter: ',',
            csv_has_header: false,
            ..FormatOptions::default()
        };
        let source =
            FeedSource::open(b"a,1\nb,2\n".to_vec(), FeedFormat::Csv, &options).unwrap();
        let items = collect(&source);
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].as_ref().unwrap()["column_1"], "b");
        assert_eq!(items[1].as_ref().unwrap()["column_2"], "2");
    }

    #[test]
    fn test_json_array_flattening() {
        let json = r#"[
            {"id": 1, "name": " Widget ", "price": 9.5, "tags": ["a", "b"],
             "brand": {"name": "Acme"}, "ean": null},
            "not an object"
        ]"#;
        let source = FeedSource::open(
            json.as_bytes().to_vec(),
            FeedFormat::Json,
            &FormatOptions::default(),
        )
        .unwrap();
        let items = collect(&source);
        let first = items[0].as_ref().unwrap();
        assert_eq!(first["id"], "1");
        assert_eq!(first["name"], "Widget");
        assert_eq!(first["price"], "9.5");
        assert_eq!(first["tags"], "a|b");
        assert_eq!(first["brand/name"], "Acme");
        assert_eq!(first["ean"], "");
        assert!(matches!(items[1], Err(RecordError::Malformed { index: 2, .. })));
    }

    #[test]
    fn test_json_object_with_item_path() {
        let json = r#"{"meta": {"count": 1}, "data": {"products": [{"sku": "X"}]}}"#;
        let options = FormatOptions {
            xml_item_path: Some("data/products".to_string()),
            ..FormatOptions::default()
        };
        let source = FeedSource::open(json.as_bytes().to_vec(), FeedFormat::Json, &options).unwrap();
        assert_eq!(source.item_path(), Some("data/products"));
        assert_eq!(source.count().unwrap(), 1);
    }

    #[test]
    fn test_json_scalar_top_level_is_parse_error() {
        let result = FeedSource::open(b"{\"a\": 1}".to_vec(), FeedFormat::Json, &FormatOptions::default());
        assert!(matches!(result, Err(ImportError::FeedParseError(_))));
    }

    #[test]
    fn test_sniff_overrides_requested_format() {
        assert_eq!(sniff_format(b"  <SHOP/>", FeedFormat::Csv), FeedFormat::Xml);
        assert_eq!(sniff_format(b"\xEF\xBB\xBF[{}]", FeedFormat::Xml), FeedFormat::Json);
        assert_eq!(sniff_format(b"ean;name", FeedFormat::Csv), FeedFormat::Csv);
    }

    #[test]
    fn test_invalid_delimiter() {
        assert!(csv_delimiter(';').is_ok());
        assert!(csv_delimiter('€').is_err());
        assert!(csv_delimiter('"').is_err());
    }
}
