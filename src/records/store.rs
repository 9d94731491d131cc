use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::{AppError, Context, Result};

use super::{Record, Table};

/// Result of a single upsert, used for run summaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Inserted,
    Replaced,
    Unchanged,
}

/// One table: documents keyed by a numeric document id, plus a `guid` index.
#[derive(Debug, Default)]
struct TableData {
    docs: BTreeMap<u64, Record>,
    by_guid: HashMap<String, u64>,
}

impl TableData {
    fn next_id(&self) -> u64 {
        self.docs.keys().next_back().map_or(1, |last| last + 1)
    }

    fn upsert(&mut self, record: Record) -> UpsertOutcome {
        let existing = self
            .by_guid
            .get(record.guid())
            .and_then(|id| self.docs.get_mut(id));
        if let Some(slot) = existing {
            if *slot == record {
                return UpsertOutcome::Unchanged;
            }
            *slot = record;
            return UpsertOutcome::Replaced;
        }

        let id = self.next_id();
        self.by_guid.insert(record.guid().to_string(), id);
        self.docs.insert(id, record);
        UpsertOutcome::Inserted
    }
}

/// Flat two-table document store persisted as one pretty-printed JSON file.
///
/// The on-disk layout is `{ "<table>": { "<doc id>": { ...record } } }` with
/// sorted keys and four-space indentation, so successive runs diff cleanly.
#[derive(Debug)]
pub struct JsonStore {
    path: PathBuf,
    tables: BTreeMap<Table, TableData>,
    /// Tables found in the file that this crate does not manage; written back untouched.
    foreign: Map<String, Value>,
    dirty: bool,
}

impl JsonStore {
    /// Load the store at `path`, or start empty when the file does not exist yet.
    pub fn open<P: Into<PathBuf>>(path: P) -> Result<Self> {
        let path = path.into();
        let mut store = Self {
            path,
            tables: Table::ALL
                .into_iter()
                .map(|table| (table, TableData::default()))
                .collect(),
            foreign: Map::new(),
            dirty: false,
        };

        let contents = match fs::read_to_string(&store.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == io::ErrorKind::NotFound => {
                log::info!("Store {} not found, starting empty", store.path.display());
                return Ok(store);
            }
            Err(err) => {
                return Err(err)
                    .with_context(|| format!("failed to read store {}", store.path.display()))
                    .map_err(AppError::from);
            }
        };

        if contents.trim().is_empty() {
            return Ok(store);
        }

        store.load(&contents)?;
        Ok(store)
    }

    fn load(&mut self, contents: &str) -> Result<()> {
        let root: Value = serde_json::from_str(contents).map_err(|err| {
            AppError::schema(format!(
                "store {} is not valid JSON: {err}",
                self.path.display()
            ))
        })?;
        let Value::Object(root) = root else {
            return Err(AppError::schema(format!(
                "store {} must contain a JSON object",
                self.path.display()
            )));
        };

        for (name, docs) in root {
            let Some(table) = Table::ALL.into_iter().find(|table| table.name() == name) else {
                self.foreign.insert(name, docs);
                continue;
            };
            let Value::Object(docs) = docs else {
                return Err(AppError::schema(format!(
                    "table `{name}` in {} must be a JSON object",
                    self.path.display()
                )));
            };

            let mut collapsed = false;
            let data = self.table_mut(table);
            let mut parsed = BTreeMap::new();
            for (id, doc) in docs {
                let id: u64 = id.parse().map_err(|_| {
                    AppError::schema(format!("table `{name}` has non-numeric document id `{id}`"))
                })?;
                let record = Record::from_value(doc)
                    .map_err(|err| AppError::schema(format!("table `{name}` document {id}: {err}")))?;
                parsed.insert(id, record);
            }

            for (id, record) in parsed {
                if let Some(previous) = data.by_guid.insert(record.guid().to_string(), id) {
                    log::warn!(
                        "Table `{name}` holds guid {} twice (documents {previous} and {id}), keeping {id}",
                        record.guid()
                    );
                    data.docs.remove(&previous);
                    collapsed = true;
                }
                data.docs.insert(id, record);
            }
            // The file still holds the dropped duplicate until the next flush.
            if collapsed {
                self.dirty = true;
            }
        }

        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Insert `record`, or replace the record sharing its `guid` wholesale.
    pub fn upsert(&mut self, table: Table, record: Record) -> UpsertOutcome {
        let outcome = self.table_mut(table).upsert(record);
        if outcome != UpsertOutcome::Unchanged {
            self.dirty = true;
        }
        outcome
    }

    /// Every record in `table`, in document-id order.
    pub fn all(&self, table: Table) -> impl Iterator<Item = &Record> + '_ {
        self.table(table).into_iter().flat_map(|data| data.docs.values())
    }

    pub fn get(&self, table: Table, guid: &str) -> Option<&Record> {
        let data = self.table(table)?;
        data.by_guid.get(guid).and_then(|id| data.docs.get(id))
    }

    pub fn len(&self, table: Table) -> usize {
        self.table(table).map_or(0, |data| data.docs.len())
    }

    /// Distinct string values of `field` across `table`; records without it are skipped.
    pub fn distinct(&self, table: Table, field: &str) -> BTreeSet<String> {
        self.all(table)
            .filter_map(|record| record.str_field(field))
            .map(str::to_string)
            .collect()
    }

    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Write the store to disk if anything changed since the last flush.
    pub fn flush(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }

        let rendered = self.render()?;
        write_atomic(&self.path, &rendered)?;
        self.dirty = false;
        log::debug!("Store written to {}", self.path.display());
        Ok(())
    }

    fn render(&self) -> Result<Vec<u8>> {
        let mut root = self.foreign.clone();
        for (table, data) in &self.tables {
            let docs: Map<String, Value> = data
                .docs
                .iter()
                .map(|(id, record)| (id.to_string(), Value::from(record.clone())))
                .collect();
            root.insert(table.name().to_string(), Value::Object(docs));
        }

        let mut buf = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buf, formatter);
        Value::Object(root).serialize(&mut serializer)?;
        Ok(buf)
    }

    fn table(&self, table: Table) -> Option<&TableData> {
        self.tables.get(&table)
    }

    fn table_mut(&mut self, table: Table) -> &mut TableData {
        self.tables.entry(table).or_default()
    }
}

/// Write through a sibling temp file and rename it over `path`.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    let parent = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    fs::create_dir_all(parent)
        .with_context(|| format!("failed to create store directory {}", parent.display()))?;

    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .ok_or_else(|| AppError::message(format!("store path {} has no file name", path.display())))?;
    let tmp_path = parent.join(format!(".{file_name}.tmp.{}", std::process::id()));

    let written = fs::File::create(&tmp_path).and_then(|mut file| {
        file.write_all(contents)?;
        file.sync_all()
    });
    if let Err(err) = written {
        let _ = fs::remove_file(&tmp_path);
        return Err(err)
            .with_context(|| format!("failed to write {}", tmp_path.display()))
            .map_err(AppError::from);
    }

    if let Err(err) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(err)
            .with_context(|| format!("failed to replace store {}", path.display()))
            .map_err(AppError::from);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn record(value: Value) -> Record {
        Record::from_value(value).unwrap()
    }

    fn temp_store() -> (tempfile::TempDir, JsonStore) {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonStore::open(dir.path().join("database").join("db.json")).unwrap();
        (dir, store)
    }

    #[test]
    fn upsert_is_idempotent() {
        let (_dir, mut store) = temp_store();
        let trade = record(json!({ "guid": "t1", "symbol": "AAPL" }));

        assert_eq!(store.upsert(Table::Trades, trade.clone()), UpsertOutcome::Inserted);
        store.flush().unwrap();
        assert_eq!(store.upsert(Table::Trades, trade.clone()), UpsertOutcome::Unchanged);

        assert_eq!(store.len(Table::Trades), 1);
        assert_eq!(store.get(Table::Trades, "t1"), Some(&trade));
        assert!(!store.is_dirty());
    }

    #[test]
    fn upsert_replaces_instead_of_merging() {
        let (_dir, mut store) = temp_store();
        store.upsert(
            Table::Trades,
            record(json!({ "guid": "t1", "symbol": "AAPL", "note": "first" })),
        );
        let outcome = store.upsert(Table::Trades, record(json!({ "guid": "t1", "symbol": "AAPL" })));

        assert_eq!(outcome, UpsertOutcome::Replaced);
        let stored = store.get(Table::Trades, "t1").unwrap();
        assert_eq!(stored.get("note"), None);
        assert_eq!(store.len(Table::Trades), 1);
    }

    #[test]
    fn guids_stay_unique_per_table() {
        let (_dir, mut store) = temp_store();
        for guid in ["a", "b", "a", "c", "b", "a"] {
            store.upsert(Table::Users, record(json!({ "guid": guid, "username": guid })));
        }
        store.upsert(Table::Trades, record(json!({ "guid": "a", "symbol": "SPY" })));

        let guids: Vec<&str> = store.all(Table::Users).map(Record::guid).collect();
        assert_eq!(guids, vec!["a", "b", "c"]);
        assert_eq!(store.len(Table::Trades), 1);
    }

    #[test]
    fn distinct_skips_records_without_field() {
        let (_dir, mut store) = temp_store();
        store.upsert(Table::Trades, record(json!({ "guid": "1", "symbol": "TSLA" })));
        store.upsert(Table::Trades, record(json!({ "guid": "2", "symbol": "AAPL" })));
        store.upsert(Table::Trades, record(json!({ "guid": "3", "symbol": "TSLA" })));
        store.upsert(Table::Trades, record(json!({ "guid": "4" })));

        let symbols: Vec<String> = store.distinct(Table::Trades, "symbol").into_iter().collect();
        assert_eq!(symbols, vec!["AAPL".to_string(), "TSLA".to_string()]);
    }

    #[test]
    fn flush_writes_sorted_indented_layout() {
        let (_dir, mut store) = temp_store();
        store.upsert(Table::Users, record(json!({ "username": "bob", "guid": "u1" })));
        store.upsert(Table::Trades, record(json!({ "symbol": "AAPL", "guid": "t1" })));
        store.flush().unwrap();

        let written = fs::read_to_string(store.path()).unwrap();
        let expected = concat!(
            "{\n",
            "    \"trades\": {\n",
            "        \"1\": {\n",
            "            \"guid\": \"t1\",\n",
            "            \"symbol\": \"AAPL\"\n",
            "        }\n",
            "    },\n",
            "    \"users\": {\n",
            "        \"1\": {\n",
            "            \"guid\": \"u1\",\n",
            "            \"username\": \"bob\"\n",
            "        }\n",
            "    }\n",
            "}"
        );
        assert_eq!(written, expected);
    }

    #[test]
    fn reopening_restores_records_and_ids() {
        let (_dir, mut store) = temp_store();
        store.upsert(Table::Trades, record(json!({ "guid": "t1", "symbol": "AAPL" })));
        store.upsert(Table::Trades, record(json!({ "guid": "t2", "symbol": "TSLA" })));
        store.flush().unwrap();

        let mut reopened = JsonStore::open(store.path()).unwrap();
        assert_eq!(reopened.len(Table::Trades), 2);
        assert_eq!(
            reopened.upsert(Table::Trades, record(json!({ "guid": "t3", "symbol": "SPY" }))),
            UpsertOutcome::Inserted
        );
        reopened.flush().unwrap();

        let raw: Value = serde_json::from_str(&fs::read_to_string(store.path()).unwrap()).unwrap();
        assert_eq!(raw["trades"]["3"]["guid"], json!("t3"));
    }

    #[test]
    fn keeps_unmanaged_tables() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        fs::write(&path, r#"{ "_default": { "1": { "x": 1 } }, "users": {} }"#).unwrap();

        let mut store = JsonStore::open(&path).unwrap();
        store.upsert(Table::Users, record(json!({ "guid": "u1" })));
        store.flush().unwrap();

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["_default"]["1"]["x"], json!(1));
        assert_eq!(raw["users"]["1"]["guid"], json!("u1"));
    }

    #[test]
    fn duplicate_guids_collapse_and_are_written_back() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        fs::write(
            &path,
            r#"{ "users": { "1": { "guid": "u1", "username": "old" }, "2": { "guid": "u1", "username": "new" } } }"#,
        )
        .unwrap();

        let mut store = JsonStore::open(&path).unwrap();
        assert!(store.is_dirty());
        assert_eq!(store.len(Table::Users), 1);
        assert_eq!(
            store.get(Table::Users, "u1").and_then(|user| user.str_field("username")),
            Some("new")
        );

        store.flush().unwrap();
        assert!(!store.is_dirty());

        let raw: Value = serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let users = raw["users"].as_object().unwrap();
        assert_eq!(users.len(), 1);
        assert_eq!(users["2"]["username"], json!("new"));
    }

    #[test]
    fn rejects_corrupt_store_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("db.json");
        fs::write(&path, r#"{ "trades": { "1": { "symbol": "AAPL" } } }"#).unwrap();

        let err = JsonStore::open(&path).expect_err("record without guid should fail");
        assert!(matches!(err, AppError::Schema(_)), "unexpected error: {err}");
    }

    #[test]
    fn flush_without_changes_does_not_create_file() {
        let (_dir, mut store) = temp_store();
        store.flush().unwrap();
        assert!(!store.path().exists());
    }
}
