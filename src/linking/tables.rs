//! Curated tables linking taxonomy ids to external references.
//!
//! All tables are CSV with a header row. Ids are normalized with
//! [`normalize_id`](crate::properties::normalize_id) on load, and rows with an empty id are
//! dropped.

use csv::{ReaderBuilder, StringRecord, Trim};
use regex::Regex;
use std::{collections::BTreeMap, fs::File, io::Read, path::Path};

use crate::{
    error::TaxomapError,
    properties::{normalize_id, proxy_kind_from_column, CodeSource, EnumSet, ProxyUse},
};

pub const ID_COLUMN: &str = "OFF_ID";

/// Column holding the reference code in the link table of `source`.
pub fn code_column(source: CodeSource) -> &'static str {
    match source {
        CodeSource::Primary => "CIQUAL_ID",
        CodeSource::Secondary => "FCEN_ID",
    }
}

fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(reader)
}

fn column_index(headers: &StringRecord, table: &str, column: &str) -> Result<usize, TaxomapError> {
    headers
        .iter()
        .position(|h| h.eq_ignore_ascii_case(column))
        .ok_or_else(|| TaxomapError::table(table, format!("missing column '{column}'")))
}

fn cell(record: &StringRecord, index: usize) -> Option<&str> {
    record.get(index).map(str::trim).filter(|v| !v.is_empty())
}

/// `(external_id, reference_code)` rows. One id may carry several codes; they are kept in row
/// order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkTable {
    source: Option<CodeSource>,
    links: BTreeMap<String, Vec<String>>,
}

impl LinkTable {
    pub fn new(source: CodeSource) -> Self {
        LinkTable {
            source: Some(source),
            links: BTreeMap::new(),
        }
    }

    pub fn source(&self) -> Option<CodeSource> {
        self.source
    }

    pub fn name(&self) -> String {
        match self.source {
            Some(source) => format!("{source} links"),
            None => "links".to_string(),
        }
    }

    pub fn insert(&mut self, id: &str, code: impl Into<String>) {
        self.links
            .entry(normalize_id(id))
            .or_default()
            .push(code.into());
    }

    pub fn from_reader<R: Read>(source: CodeSource, reader: R) -> Result<Self, TaxomapError> {
        let mut table = LinkTable::new(source);
        let name = table.name();
        let mut rdr = csv_reader(reader);
        let headers = rdr.headers()?.clone();
        let id_idx = column_index(&headers, &name, ID_COLUMN)?;
        let code_idx = column_index(&headers, &name, code_column(source))?;

        for record in rdr.records() {
            let record = record?;
            if let (Some(id), Some(code)) = (cell(&record, id_idx), cell(&record, code_idx)) {
                table.insert(id, code);
            }
        }
        tracing::debug!("Loaded {} ids from {}", table.len(), name);
        Ok(table)
    }

    pub fn from_path(source: CodeSource, path: impl AsRef<Path>) -> Result<Self, TaxomapError> {
        Self::from_reader(source, File::open(path)?)
    }

    pub fn codes(&self, id: &str) -> Option<&[String]> {
        self.links.get(id).map(Vec::as_slice)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &Vec<String>)> {
        self.links.iter()
    }

    pub fn len(&self) -> usize {
        self.links.len()
    }

    pub fn is_empty(&self) -> bool {
        self.links.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxyRow {
    pub id: String,
    pub reference: String,
    pub uses: EnumSet<ProxyUse>,
}

/// `(external_id, reference_external_id, proxy_kind)` rows, read by position. When an id
/// appears on several rows the first one applies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProxyTable {
    rows: BTreeMap<String, ProxyRow>,
}

impl ProxyTable {
    pub const NAME: &'static str = "proxies";

    pub fn insert(&mut self, row: ProxyRow) {
        self.rows.entry(row.id.clone()).or_insert(row);
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, TaxomapError> {
        let mut table = ProxyTable::default();
        let mut rdr = csv_reader(reader);
        for (line, record) in rdr.records().enumerate() {
            let record = record?;
            if record.len() < 2 {
                return Err(TaxomapError::table(
                    Self::NAME,
                    format!("row {} has {} columns, expected 3", line + 2, record.len()),
                ));
            }
            let (Some(id), Some(reference)) = (cell(&record, 0), cell(&record, 1)) else {
                continue;
            };
            table.insert(ProxyRow {
                id: normalize_id(id),
                reference: normalize_id(reference),
                uses: proxy_kind_from_column(record.get(2).unwrap_or_default()),
            });
        }
        tracing::debug!("Loaded {} proxy rows", table.len());
        Ok(table)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, TaxomapError> {
        Self::from_reader(File::open(path)?)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProxyRow> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// What the code column of a manual-entry row holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ManualValue {
    /// A secondary-database code.
    Code(String),
    /// Anything else: a description, a URL, a note.
    Text(String),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManualEntryRow {
    pub id: String,
    pub value: Option<ManualValue>,
    pub comment: Option<String>,
}

/// `(external_id, free_text_or_code, source_comment)` rows. First row per id applies.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ManualEntryTable {
    rows: BTreeMap<String, ManualEntryRow>,
}

impl ManualEntryTable {
    pub const NAME: &'static str = "manual entries";
    pub const CODE_COLUMN: &'static str = "CODE";
    pub const SOURCE_COLUMN: &'static str = "SOURCE";

    pub fn insert(&mut self, row: ManualEntryRow) {
        self.rows.entry(row.id.clone()).or_insert(row);
    }

    pub fn from_reader<R: Read>(reader: R) -> Result<Self, TaxomapError> {
        let code_pattern = Regex::new(r"^\d+$")?;
        let mut table = ManualEntryTable::default();
        let mut rdr = csv_reader(reader);
        let headers = rdr.headers()?.clone();
        let id_idx = column_index(&headers, Self::NAME, ID_COLUMN)?;
        let code_idx = column_index(&headers, Self::NAME, Self::CODE_COLUMN).ok();
        let source_idx = column_index(&headers, Self::NAME, Self::SOURCE_COLUMN).ok();

        for record in rdr.records() {
            let record = record?;
            let Some(id) = cell(&record, id_idx) else {
                continue;
            };
            let value = code_idx.and_then(|i| cell(&record, i)).map(|raw| {
                if code_pattern.is_match(raw) {
                    ManualValue::Code(raw.to_string())
                } else {
                    ManualValue::Text(raw.to_string())
                }
            });
            table.insert(ManualEntryRow {
                id: normalize_id(id),
                value,
                comment: source_idx.and_then(|i| cell(&record, i)).map(str::to_string),
            });
        }
        tracing::debug!("Loaded {} manual entries", table.len());
        Ok(table)
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, TaxomapError> {
        Self::from_reader(File::open(path)?)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ManualEntryRow> {
        self.rows.values()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Every curated table of a run. Absent optional tables are empty.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LinkTables {
    pub primary: LinkTable,
    pub secondary: LinkTable,
    pub proxies: ProxyTable,
    pub manual_entries: ManualEntryTable,
}

impl LinkTables {
    pub fn links(&self, source: CodeSource) -> &LinkTable {
        match source {
            CodeSource::Primary => &self.primary,
            CodeSource::Secondary => &self.secondary,
        }
    }
}
