use std::{
    collections::{BTreeMap, HashMap},
    fs,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use log::{debug, info};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{LightIdentity, LightMetadata, LightState};
use crate::{Error, Result};

/// Name of the snapshot document inside the storage directory
pub const SNAPSHOT_FILE: &str = "snapshots.json";

/// One entry of a light's metadata history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataRecord {
    /// Internal row id of the light
    pub light: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub metadata: LightMetadata,
}

/// One entry of a light's state history
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StateRecord {
    /// Internal row id of the light
    pub light: Uuid,
    pub recorded_at: DateTime<Utc>,
    pub state: LightState,
}

/// Latest known identity, metadata and state of one light
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Snapshot {
    pub row_id: Uuid,
    pub identity: LightIdentity,
    pub metadata: MetadataRecord,
    pub state: StateRecord,
}

/// Every record the store holds for one light, in the order recorded
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LightHistory {
    pub row_id: Uuid,
    pub identity: LightIdentity,
    pub metadata: Vec<MetadataRecord>,
    pub states: Vec<StateRecord>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
struct Document {
    identities: BTreeMap<Uuid, LightIdentity>,
    metadata: Vec<MetadataRecord>,
    states: Vec<StateRecord>,
}

impl Document {
    fn is_empty(&self) -> bool {
        self.identities.is_empty() && self.metadata.is_empty() && self.states.is_empty()
    }

    // Records are only ever appended, so the last one is the latest even
    // when the clock was set back between cycles.
    fn latest_metadata(&self, light: &Uuid) -> Option<&MetadataRecord> {
        self.metadata.iter().rev().find(|r| &r.light == light)
    }

    fn latest_state(&self, light: &Uuid) -> Option<&StateRecord> {
        self.states.iter().rev().find(|r| &r.light == light)
    }
}

/// Append-only history of light identities, metadata and states,
/// kept in `snapshots.json` inside the storage directory
///
/// Reads go straight to the loaded document. Writes are only possible
/// through a [Transaction], which rewrites the file once on commit.
///
pub struct Storage {
    doc: Document,
    file_path: PathBuf,
}

impl Storage {
    /// Open (or create) the store in the given directory
    ///
    /// Fails if the directory can't be created or the existing document
    /// can't be read or decoded.
    pub fn open(dir: &Path) -> Result<Self> {
        fs::create_dir_all(dir).map_err(|e| Error::storage("create", dir, e))?;
        let file_path = dir.join(SNAPSHOT_FILE);

        let doc = match fs::read_to_string(&file_path) {
            Ok(content) => serde_json::from_str(&content).map_err(Error::JsonLoad)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                info!("Starting new store at {:?}", file_path);
                Document::default()
            }
            Err(e) => return Err(Error::storage("read", &file_path, e)),
        };

        Ok(Storage { doc, file_path })
    }

    /// Latest metadata and state for every known light, by unique id
    pub fn get_all_latest(&self) -> HashMap<String, Snapshot> {
        let mut latest = HashMap::new();
        for (row_id, identity) in &self.doc.identities {
            if let Some(snapshot) = self.snapshot(row_id, identity) {
                latest.insert(identity.unique_id.clone(), snapshot);
            }
        }
        latest
    }

    fn snapshot(&self, row_id: &Uuid, identity: &LightIdentity) -> Option<Snapshot> {
        match (
            self.doc.latest_metadata(row_id),
            self.doc.latest_state(row_id),
        ) {
            (Some(metadata), Some(state)) => Some(Snapshot {
                row_id: *row_id,
                identity: identity.clone(),
                metadata: metadata.clone(),
                state: state.clone(),
            }),
            _ => {
                debug!("light {} has no complete snapshot", identity.unique_id);
                None
            }
        }
    }

    /// Full history of a light, by unique id
    pub fn history(&self, unique_id: &str) -> Option<LightHistory> {
        let (row_id, identity) = self
            .doc
            .identities
            .iter()
            .find(|(_, identity)| identity.unique_id == unique_id)?;

        Some(LightHistory {
            row_id: *row_id,
            identity: identity.clone(),
            metadata: self
                .doc
                .metadata
                .iter()
                .filter(|r| &r.light == row_id)
                .cloned()
                .collect(),
            states: self
                .doc
                .states
                .iter()
                .filter(|r| &r.light == row_id)
                .cloned()
                .collect(),
        })
    }

    /// Find a light by unique id, or by the index or name it last had
    ///
    /// Names are compared case-insensitively.
    pub fn find(&self, query: &str) -> Result<LightHistory> {
        if let Some(history) = self.history(query) {
            return Ok(history);
        }

        let query_lower = query.to_lowercase();
        self.get_all_latest()
            .into_values()
            .find(|snapshot| {
                snapshot.metadata.metadata.index == query
                    || snapshot.metadata.metadata.name.to_lowercase() == query_lower
            })
            .and_then(|snapshot| self.history(&snapshot.identity.unique_id))
            .ok_or_else(|| Error::LightNotFound(query.to_string()))
    }

    /// Start staging records for one cycle
    pub fn begin(&mut self) -> Transaction<'_> {
        Transaction {
            storage: self,
            pending: Document::default(),
        }
    }

    /// Write the document to disk through a temporary file
    fn write(&self, doc: &Document) -> Result<()> {
        let contents = serde_json::to_string(doc).map_err(Error::JsonDump)?;
        let tmp_path = self.file_path.with_extension("json.tmp");
        fs::write(&tmp_path, contents).map_err(|e| Error::storage("write", &tmp_path, e))?;
        fs::rename(&tmp_path, &self.file_path)
            .map_err(|e| Error::storage("rename", &self.file_path, e))
    }
}

/// Records staged for a single cycle
///
/// Nothing reaches the [Storage] until [Transaction::commit]; dropping
/// the transaction discards everything staged.
pub struct Transaction<'a> {
    storage: &'a mut Storage,
    pending: Document,
}

impl<'a> Transaction<'a> {
    /// Stage a newly seen light
    ///
    /// # Returns
    ///   the internal row id to attach metadata and state records to
    ///
    pub fn insert_identity(&mut self, identity: LightIdentity) -> Uuid {
        let mut id = Uuid::new_v4();
        while self.known(&id) {
            id = Uuid::new_v4();
        }
        self.pending.identities.insert(id, identity);
        id
    }

    /// Stage a metadata record for a known (or staged) light
    pub fn insert_metadata(
        &mut self,
        light: Uuid,
        recorded_at: DateTime<Utc>,
        metadata: LightMetadata,
    ) -> Result<()> {
        self.require(&light)?;
        self.pending.metadata.push(MetadataRecord {
            light,
            recorded_at,
            metadata,
        });
        Ok(())
    }

    /// Stage a state record for a known (or staged) light
    pub fn insert_state(
        &mut self,
        light: Uuid,
        recorded_at: DateTime<Utc>,
        state: LightState,
    ) -> Result<()> {
        self.require(&light)?;
        self.pending.states.push(StateRecord {
            light,
            recorded_at,
            state,
        });
        Ok(())
    }

    /// Number of staged identities, metadata records and state records
    pub fn staged(&self) -> (usize, usize, usize) {
        (
            self.pending.identities.len(),
            self.pending.metadata.len(),
            self.pending.states.len(),
        )
    }

    /// Append everything staged and persist it in one write
    pub fn commit(self) -> Result<()> {
        if self.pending.is_empty() {
            debug!("nothing to commit");
            return Ok(());
        }

        let mut doc = self.storage.doc.clone();
        doc.identities.extend(self.pending.identities);
        doc.metadata.extend(self.pending.metadata);
        doc.states.extend(self.pending.states);

        self.storage.write(&doc)?;
        self.storage.doc = doc;
        Ok(())
    }

    fn known(&self, id: &Uuid) -> bool {
        self.storage.doc.identities.contains_key(id) || self.pending.identities.contains_key(id)
    }

    fn require(&self, id: &Uuid) -> Result<()> {
        if self.known(id) {
            Ok(())
        } else {
            Err(Error::LightNotFound(id.to_string()))
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::env;

    use chrono::{Duration, TimeZone};

    use super::*;
    use crate::models::ColorMode;

    /// Fresh, unique directory under the system temp dir
    pub(crate) fn temp_dir(label: &str) -> PathBuf {
        env::temp_dir().join(format!("hue-restore-{label}-{}", Uuid::new_v4()))
    }

    fn identity(unique_id: &str) -> LightIdentity {
        LightIdentity {
            unique_id: unique_id.to_string(),
            model_id: "LCT015".to_string(),
            light_type: "Extended color light".to_string(),
        }
    }

    fn metadata(index: &str, name: &str) -> LightMetadata {
        LightMetadata {
            index: index.to_string(),
            name: name.to_string(),
            sw_version: "1.50.2".to_string(),
        }
    }

    fn state(ct: u16) -> LightState {
        LightState {
            reachable: true,
            on: true,
            colormode: Some(ColorMode::Ct),
            ct: Some(ct),
            bri: Some(200),
            ..Default::default()
        }
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn commit_persists_and_latest_wins() {
        let dir = temp_dir("storage");
        let mut storage = Storage::open(&dir).unwrap();
        assert!(storage.get_all_latest().is_empty());

        let mut tx = storage.begin();
        let id = tx.insert_identity(identity("a-0b"));
        tx.insert_metadata(id, t0(), metadata("1", "Desk")).unwrap();
        tx.insert_state(id, t0(), state(300)).unwrap();
        tx.insert_state(id, t0() + Duration::minutes(5), state(250))
            .unwrap();
        assert_eq!(tx.staged(), (1, 1, 2));
        tx.commit().unwrap();

        let reopened = Storage::open(&dir).unwrap();
        let latest = reopened.get_all_latest();
        let snapshot = &latest["a-0b"];
        assert_eq!(snapshot.row_id, id);
        assert_eq!(snapshot.state.state.ct, Some(250));
        assert_eq!(snapshot.metadata.metadata.name, "Desk");

        let history = reopened.history("a-0b").unwrap();
        assert_eq!(history.states.len(), 2);
        assert_eq!(history.metadata.len(), 1);

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn latest_follows_insertion_after_clock_change() {
        let dir = temp_dir("clock");
        let mut storage = Storage::open(&dir).unwrap();

        let mut tx = storage.begin();
        let id = tx.insert_identity(identity("a-0b"));
        tx.insert_metadata(id, t0(), metadata("1", "Desk")).unwrap();
        tx.insert_state(id, t0(), state(300)).unwrap();
        tx.commit().unwrap();

        // the clock jumped back an hour before the next cycle
        let earlier = t0() - Duration::hours(1);
        let mut tx = storage.begin();
        tx.insert_metadata(id, earlier, metadata("1", "Study")).unwrap();
        tx.insert_state(id, earlier, state(250)).unwrap();
        tx.commit().unwrap();

        let latest = Storage::open(&dir).unwrap().get_all_latest();
        assert_eq!(latest["a-0b"].state.state.ct, Some(250));
        assert_eq!(latest["a-0b"].state.recorded_at, earlier);
        assert_eq!(latest["a-0b"].metadata.metadata.name, "Study");

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn dropped_transaction_leaves_no_trace() {
        let dir = temp_dir("rollback");
        let mut storage = Storage::open(&dir).unwrap();

        {
            let mut tx = storage.begin();
            let id = tx.insert_identity(identity("a-0b"));
            tx.insert_metadata(id, t0(), metadata("1", "Desk")).unwrap();
            tx.insert_state(id, t0(), state(300)).unwrap();
        }

        assert!(storage.get_all_latest().is_empty());
        assert!(!dir.join(SNAPSHOT_FILE).exists());
        assert!(Storage::open(&dir).unwrap().get_all_latest().is_empty());

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn records_need_a_known_light() {
        let dir = temp_dir("unknown");
        let mut storage = Storage::open(&dir).unwrap();
        let mut tx = storage.begin();
        let stranger = Uuid::new_v4();
        assert_eq!(
            tx.insert_state(stranger, t0(), state(300)).unwrap_err(),
            Error::LightNotFound(stranger.to_string())
        );
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn find_by_id_index_or_name() {
        let dir = temp_dir("find");
        let mut storage = Storage::open(&dir).unwrap();
        let mut tx = storage.begin();
        let id = tx.insert_identity(identity("a-0b"));
        tx.insert_metadata(id, t0(), metadata("1", "Desk")).unwrap();
        tx.insert_metadata(id, t0() + Duration::hours(1), metadata("4", "Office"))
            .unwrap();
        tx.insert_state(id, t0(), state(300)).unwrap();
        tx.commit().unwrap();

        assert_eq!(storage.find("a-0b").unwrap().row_id, id);
        assert_eq!(storage.find("4").unwrap().row_id, id);
        assert_eq!(storage.find("office").unwrap().row_id, id);
        assert_eq!(
            storage.find("Desk").unwrap_err(),
            Error::LightNotFound("Desk".to_string())
        );

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn corrupt_document_is_fatal() {
        let dir = temp_dir("corrupt");
        fs::create_dir_all(&dir).unwrap();
        fs::write(dir.join(SNAPSHOT_FILE), "{not json").unwrap();
        assert!(matches!(Storage::open(&dir), Err(Error::JsonLoad(_))));
        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn unusable_directory_is_fatal() {
        let dir = temp_dir("blocked");
        fs::create_dir_all(&dir).unwrap();
        let file = dir.join("plain-file");
        fs::write(&file, "").unwrap();
        assert!(matches!(
            Storage::open(&file.join("store")),
            Err(Error::Storage { .. })
        ));
        fs::remove_dir_all(&dir).unwrap();
    }
}
