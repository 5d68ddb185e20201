//! Spreadsheet export and import
//!
//! The workbook has five sheets with fixed columns:
//!
//! | Sheet      | Columns                                                          |
//! |------------|------------------------------------------------------------------|
//! | `Topics`   | id, title, description, category, created_by, created_at, archived_at, links |
//! | `Links`    | topic_id, position, label, url                                   |
//! | `Updates`  | id, topic_id, user, content, created_at                          |
//! | `Comments` | id, topic_id, user, content, created_at                          |
//! | `Meta`     | key, value                                                       |
//!
//! Timestamps are RFC 3339 with whole seconds. On import, `Links` is
//! authoritative; the JSON `links` column is only read when that sheet is
//! missing.

use std::collections::{BTreeMap, HashSet};
use std::io::Cursor;

use calamine::{open_workbook_from_rs, Data, Reader, Xlsx};
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use rust_xlsxwriter::{Format, Workbook};

use super::rfc3339_local;
use crate::models::{Entry, EntryKind, NewTopic, TopicBundle, TopicLink, User, ValidTopic};
use crate::storage::{StoreError, StoreResult};

pub const TOPICS: &str = "Topics";
pub const LINKS: &str = "Links";
pub const UPDATES: &str = "Updates";
pub const COMMENTS: &str = "Comments";
pub const META: &str = "Meta";

const TOPIC_COLUMNS: [&str; 8] = [
    "id",
    "title",
    "description",
    "category",
    "created_by",
    "created_at",
    "archived_at",
    "links",
];
const LINK_COLUMNS: [&str; 4] = ["topic_id", "position", "label", "url"];
const ENTRY_COLUMNS: [&str; 5] = ["id", "topic_id", "user", "content", "created_at"];
const META_COLUMNS: [&str; 2] = ["key", "value"];

/// A single cell value
#[derive(Debug, Clone, PartialEq)]
pub enum Cell {
    Int(i64),
    Text(String),
    Empty,
}

impl Cell {
    fn text(value: impl Into<String>) -> Self {
        Cell::Text(value.into())
    }

    fn optional(value: Option<&str>) -> Self {
        value.map_or(Cell::Empty, Cell::text)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct Sheet {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    fn new(name: &str, columns: &[&str]) -> Self {
        Self {
            name: name.to_string(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }
}

/// An in-memory workbook
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Spreadsheet {
    pub sheets: Vec<Sheet>,
}

impl Spreadsheet {
    pub fn sheet(&self, name: &str) -> Option<&Sheet> {
        self.sheets.iter().find(|s| s.name == name)
    }

    pub fn sheet_mut(&mut self, name: &str) -> Option<&mut Sheet> {
        self.sheets.iter_mut().find(|s| s.name == name)
    }
}

// ==================== Export ====================

/// Build the export sheets for `bundles` in the given order
pub fn build_sheets(bundles: &[TopicBundle], tz: Tz, exported_at: DateTime<Utc>) -> Spreadsheet {
    let mut topics = Sheet::new(TOPICS, &TOPIC_COLUMNS);
    let mut links = Sheet::new(LINKS, &LINK_COLUMNS);
    let mut updates = Sheet::new(UPDATES, &ENTRY_COLUMNS);
    let mut comments = Sheet::new(COMMENTS, &ENTRY_COLUMNS);

    for bundle in bundles {
        let topic = &bundle.topic;
        let links_json = serde_json::to_string(&topic.links).unwrap_or_else(|_| "[]".to_string());

        topics.rows.push(vec![
            Cell::Int(topic.id),
            Cell::text(&topic.title),
            Cell::optional(topic.description.as_deref()),
            Cell::optional(topic.category.as_deref()),
            Cell::text(topic.created_by.as_str()),
            Cell::text(rfc3339_local(topic.created_at, tz)),
            Cell::optional(topic.archived_at.map(|t| rfc3339_local(t, tz)).as_deref()),
            Cell::text(links_json),
        ]);

        for (position, link) in topic.links.iter().enumerate() {
            links.rows.push(vec![
                Cell::Int(topic.id),
                Cell::Int(position as i64),
                Cell::text(&link.label),
                Cell::text(&link.url),
            ]);
        }

        updates.rows.extend(bundle.updates.iter().map(|e| entry_row(e, tz)));
        comments.rows.extend(bundle.comments.iter().map(|e| entry_row(e, tz)));
    }

    let mut meta = Sheet::new(META, &META_COLUMNS);
    meta.rows = vec![
        vec![Cell::text("exported_at"), Cell::text(rfc3339_local(exported_at, tz))],
        vec![Cell::text("topics"), Cell::Int(topics.rows.len() as i64)],
        vec![Cell::text("links"), Cell::Int(links.rows.len() as i64)],
        vec![Cell::text("updates"), Cell::Int(updates.rows.len() as i64)],
        vec![Cell::text("comments"), Cell::Int(comments.rows.len() as i64)],
    ];

    Spreadsheet {
        sheets: vec![topics, links, updates, comments, meta],
    }
}

fn entry_row(entry: &Entry, tz: Tz) -> Vec<Cell> {
    vec![
        Cell::Int(entry.id),
        Cell::Int(entry.topic_id),
        Cell::text(entry.user.as_str()),
        Cell::text(&entry.content),
        Cell::text(rfc3339_local(entry.created_at, tz)),
    ]
}

/// Encode a spreadsheet as `.xlsx` bytes
pub fn write_xlsx(spreadsheet: &Spreadsheet) -> StoreResult<Vec<u8>> {
    let mut workbook = Workbook::new();
    let header = Format::new().set_bold();

    for sheet in &spreadsheet.sheets {
        let worksheet = workbook.add_worksheet();
        worksheet.set_name(&sheet.name)?;

        for (col, name) in sheet.columns.iter().enumerate() {
            worksheet.write_string_with_format(0, col as u16, name, &header)?;
        }
        worksheet.set_freeze_panes(1, 0)?;

        for (index, row) in sheet.rows.iter().enumerate() {
            let row_num = index as u32 + 1;
            for (col, cell) in row.iter().enumerate() {
                match cell {
                    Cell::Int(value) => {
                        worksheet.write_number(row_num, col as u16, *value as f64)?;
                    }
                    Cell::Text(value) => {
                        worksheet.write_string(row_num, col as u16, value)?;
                    }
                    Cell::Empty => {}
                }
            }
        }
    }

    Ok(workbook.save_to_buffer()?)
}

/// Decode `.xlsx` bytes; the first row of each sheet is its header
pub fn read_xlsx(bytes: &[u8]) -> StoreResult<Spreadsheet> {
    let mut workbook: Xlsx<_> = open_workbook_from_rs(Cursor::new(bytes))?;
    let mut sheets = Vec::new();

    for name in workbook.sheet_names() {
        let range = workbook.worksheet_range(&name)?;
        let mut rows = range.rows();

        let columns = rows
            .next()
            .map(|header| header.iter().map(|c| c.to_string().trim().to_string()).collect())
            .unwrap_or_default();
        let rows = rows
            .map(|row| row.iter().map(cell_from_data).collect::<Vec<_>>())
            .filter(|row| row.iter().any(|c| *c != Cell::Empty))
            .collect();

        sheets.push(Sheet { name, columns, rows });
    }

    Ok(Spreadsheet { sheets })
}

fn cell_from_data(data: &Data) -> Cell {
    match data {
        Data::Empty => Cell::Empty,
        Data::Int(v) => Cell::Int(*v),
        Data::Float(v) if v.fract() == 0.0 && v.abs() < 9.0e15 => Cell::Int(*v as i64),
        Data::String(s) if s.trim().is_empty() => Cell::Empty,
        Data::String(s) => Cell::Text(s.clone()),
        other => Cell::Text(other.to_string()),
    }
}

// ==================== Import ====================

/// A topic row ready to insert
#[derive(Debug, Clone)]
pub(crate) struct ImportedTopic {
    /// Id in the source file, used to remap links and entries
    pub source_id: i64,
    pub topic: ValidTopic,
    pub created_at: DateTime<Utc>,
    pub archived_at: Option<DateTime<Utc>>,
}

/// An update or comment row ready to insert
#[derive(Debug, Clone)]
pub(crate) struct ImportedEntry {
    pub kind: EntryKind,
    pub source_topic_id: i64,
    pub user: User,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Default)]
pub(crate) struct ImportBatch {
    pub topics: Vec<ImportedTopic>,
    pub entries: Vec<ImportedEntry>,
}

/// Validate every row of an exported workbook
///
/// Rows are checked with the same rules as interactive input. The first
/// bad row fails the whole batch with a message naming its sheet and row.
pub(crate) fn parse_import(spreadsheet: &Spreadsheet) -> StoreResult<ImportBatch> {
    let topic_sheet = SheetReader::new(spreadsheet, TOPICS, &TOPIC_COLUMNS[..7])?
        .ok_or_else(|| StoreError::validation(format!("missing sheet '{}'", TOPICS)))?;

    let mut links = match SheetReader::new(spreadsheet, LINKS, &LINK_COLUMNS)? {
        Some(sheet) => Some(read_links(&sheet)?),
        None => None,
    };

    let mut batch = ImportBatch::default();
    let mut seen = HashSet::new();
    let json_column = topic_sheet.optional_column("links");

    for row in topic_sheet.rows() {
        let source_id = row.int(0)?;
        if !seen.insert(source_id) {
            return Err(row.error(format!("duplicate id {}", source_id)));
        }

        let topic_links = match links.as_mut() {
            Some(by_topic) => by_topic.remove(&source_id).unwrap_or_default(),
            None => match json_column.and_then(|c| row.text_at(c)) {
                Some(json) => serde_json::from_str::<Vec<TopicLink>>(&json)
                    .map_err(|e| row.error(format!("invalid links JSON: {}", e)))?,
                None => Vec::new(),
            },
        };

        let new = NewTopic {
            title: row.text(1).unwrap_or_default(),
            description: row.text(2),
            category: row.text(3),
            author: Some(row.user(4)?),
            links: topic_links.into_iter().map(|l| (l.label, l.url)).collect(),
        };
        let topic = new.validate().map_err(|e| row.wrap(e))?;

        batch.topics.push(ImportedTopic {
            source_id,
            topic,
            created_at: row.timestamp(5)?,
            archived_at: row.optional_timestamp(6)?,
        });
    }

    if let Some(orphans) = links {
        if let Some(topic_id) = orphans.keys().next() {
            return Err(StoreError::validation(format!(
                "{}: links reference unknown topic_id {}",
                LINKS, topic_id
            )));
        }
    }

    for (name, kind) in [(UPDATES, EntryKind::Update), (COMMENTS, EntryKind::Comment)] {
        let Some(sheet) = SheetReader::new(spreadsheet, name, &ENTRY_COLUMNS)? else {
            continue;
        };
        for row in sheet.rows() {
            let source_topic_id = row.int(1)?;
            if !seen.contains(&source_topic_id) {
                return Err(row.error(format!("unknown topic_id {}", source_topic_id)));
            }
            let content = row
                .text(3)
                .ok_or_else(|| row.error(format!("{} content is required", kind)))?;

            batch.entries.push(ImportedEntry {
                kind,
                source_topic_id,
                user: row.user(2)?,
                content,
                created_at: row.timestamp(4)?,
            });
        }
    }

    Ok(batch)
}

/// Links grouped by source topic id, in position order
fn read_links(sheet: &SheetReader) -> StoreResult<BTreeMap<i64, Vec<TopicLink>>> {
    let mut positioned: BTreeMap<i64, Vec<(i64, TopicLink)>> = BTreeMap::new();

    for row in sheet.rows() {
        let topic_id = row.int(0)?;
        let position = row.int(1)?;
        let url = row.text(3).unwrap_or_default();
        let label = row.text(2).unwrap_or_default();
        let link = TopicLink::new(&url, &label).map_err(|e| row.wrap(e))?;
        positioned.entry(topic_id).or_default().push((position, link));
    }

    Ok(positioned
        .into_iter()
        .map(|(topic_id, mut links)| {
            links.sort_by_key(|(position, _)| *position);
            (topic_id, links.into_iter().map(|(_, link)| link).collect())
        })
        .collect())
}

/// Column-name based access to one sheet
struct SheetReader<'a> {
    sheet: &'a Sheet,
    /// Position of each required column, in request order
    positions: Vec<usize>,
}

impl<'a> SheetReader<'a> {
    /// `Ok(None)` if the sheet is absent; an error if a column is missing
    fn new(spreadsheet: &'a Spreadsheet, name: &str, required: &[&str]) -> StoreResult<Option<Self>> {
        let Some(sheet) = spreadsheet.sheet(name) else {
            return Ok(None);
        };

        let positions = required
            .iter()
            .map(|column| {
                sheet.columns.iter().position(|c| c == column).ok_or_else(|| {
                    StoreError::validation(format!("{}: missing column '{}'", name, column))
                })
            })
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(Some(Self { sheet, positions }))
    }

    fn optional_column(&self, column: &str) -> Option<usize> {
        self.sheet.columns.iter().position(|c| c == column)
    }

    fn rows(&self) -> impl Iterator<Item = RowReader<'_>> {
        self.sheet.rows.iter().enumerate().map(move |(index, cells)| RowReader {
            sheet: &self.sheet.name,
            // 1-based, after the header row
            number: index + 2,
            cells,
            positions: &self.positions,
        })
    }
}

static EMPTY: Cell = Cell::Empty;

struct RowReader<'a> {
    sheet: &'a str,
    number: usize,
    cells: &'a [Cell],
    positions: &'a [usize],
}

impl RowReader<'_> {
    fn error(&self, message: impl std::fmt::Display) -> StoreError {
        StoreError::validation(format!("{} row {}: {}", self.sheet, self.number, message))
    }

    /// Prefix a validation error with this row's location
    fn wrap(&self, err: StoreError) -> StoreError {
        match err {
            StoreError::Validation(message) => self.error(message),
            other => other,
        }
    }

    fn cell(&self, column: usize) -> &Cell {
        self.positions
            .get(column)
            .and_then(|&p| self.cells.get(p))
            .unwrap_or(&EMPTY)
    }

    fn text_at(&self, position: usize) -> Option<String> {
        match self.cells.get(position) {
            Some(Cell::Text(s)) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Some(Cell::Int(v)) => Some(v.to_string()),
            _ => None,
        }
    }

    /// Trimmed text of a required column, `None` when blank
    fn text(&self, column: usize) -> Option<String> {
        match self.cell(column) {
            Cell::Text(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
            Cell::Int(v) => Some(v.to_string()),
            _ => None,
        }
    }

    fn int(&self, column: usize) -> StoreResult<i64> {
        match self.cell(column) {
            Cell::Int(v) => Ok(*v),
            Cell::Text(s) => s
                .trim()
                .parse()
                .map_err(|_| self.error(format!("expected an integer, found '{}'", s))),
            Cell::Empty => Err(self.error("missing integer value")),
        }
    }

    fn user(&self, column: usize) -> StoreResult<User> {
        self.text(column)
            .ok_or_else(|| self.error("user is required"))?
            .parse()
            .map_err(|e| self.wrap(e))
    }

    fn timestamp(&self, column: usize) -> StoreResult<DateTime<Utc>> {
        self.optional_timestamp(column)?
            .ok_or_else(|| self.error("timestamp is required"))
    }

    fn optional_timestamp(&self, column: usize) -> StoreResult<Option<DateTime<Utc>>> {
        match self.text(column) {
            None => Ok(None),
            Some(value) => DateTime::parse_from_rfc3339(&value)
                .map(|ts| Some(ts.with_timezone(&Utc)))
                .map_err(|e| self.error(format!("invalid timestamp '{}': {}", value, e))),
        }
    }
}
