//! Sled-backed Knowledge Store: entities, relationships, and
//! tool-execution history, with TTL prune, checkpoint/restore, and the
//! history queries the planner depends on.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use sled::transaction::{ConflictableTransactionError, TransactionError, Transactional};
use sled::{Db, Tree};

use crate::entities::{Entity, EntityKind, Relationship, RelationshipType};
use crate::entity_id::{self, EntityKindId};
use crate::error::StoreError;
use crate::knowledge::crypto;
use crate::knowledge::execution_record::{ExecutionRecord, ParseStatus};

const ENTITIES_TREE: &str = "entities";
const REL_BY_PARENT_TREE: &str = "relationships_by_parent";
const REL_BY_CHILD_TREE: &str = "relationships_by_child";
const EXECUTIONS_TREE: &str = "tool_executions";
const EXEC_INDEX_TREE: &str = "tool_executions_by_target";

/// One batch submitted to `upsert_entities`. The whole batch commits or
/// rolls back together; no partial knowledge is ever committed.
#[derive(Debug, Clone, Default)]
pub struct EntityBatch {
    pub entities: Vec<Entity>,
    pub relationships: Vec<Relationship>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UpsertReport {
    pub entities_inserted: u64,
    pub entities_merged: u64,
    pub relationships_inserted: u64,
}

#[derive(Debug, Clone, Default)]
pub struct PruneReport {
    pub entities_pruned: u64,
    pub relationships_pruned: u64,
}

fn relationship_type_tag(t: &RelationshipType) -> &'static str {
    match t {
        RelationshipType::HasPort => "has_port",
        RelationshipType::HasService => "has_service",
        RelationshipType::HasVulnerability => "has_vulnerability",
        RelationshipType::HasWebResource => "has_web_resource",
        RelationshipType::ResolvesTo => "resolves_to",
    }
}

fn relationship_type_from_tag(tag: &str) -> Option<RelationshipType> {
    match tag {
        "has_port" => Some(RelationshipType::HasPort),
        "has_service" => Some(RelationshipType::HasService),
        "has_vulnerability" => Some(RelationshipType::HasVulnerability),
        "has_web_resource" => Some(RelationshipType::HasWebResource),
        "resolves_to" => Some(RelationshipType::ResolvesTo),
        _ => None,
    }
}

fn forward_key(parent_id: &str, rel_type: &RelationshipType, child_id: &str) -> Vec<u8> {
    format!("{parent_id}\0{}\0{child_id}", relationship_type_tag(rel_type)).into_bytes()
}

fn reverse_key(child_id: &str, rel_type: &RelationshipType, parent_id: &str) -> Vec<u8> {
    format!("{child_id}\0{}\0{parent_id}", relationship_type_tag(rel_type)).into_bytes()
}

fn entity_kind_id(kind: EntityKind) -> EntityKindId {
    match kind {
        EntityKind::Host => EntityKindId::Host,
        EntityKind::Port => EntityKindId::Port,
        EntityKind::Service => EntityKindId::Service,
        EntityKind::Vulnerability => EntityKindId::Vulnerability,
        EntityKind::WebResource => EntityKindId::WebResource,
        EntityKind::DnsRecord => EntityKindId::Dns,
        EntityKind::Certificate => EntityKindId::Certificate,
        EntityKind::Credential => EntityKindId::Credential,
        EntityKind::File => EntityKindId::File,
    }
}

/// Durable, embedded, single-writer relational persistence.
pub struct KnowledgeStore {
    path: PathBuf,
    db: Db,
    entities: Tree,
    rel_by_parent: Tree,
    rel_by_child: Tree,
    executions: Tree,
    exec_index: Tree,
    credential_key: Option<[u8; 32]>,
    inserts_since_prune: AtomicU64,
    last_prune_at: Mutex<DateTime<Utc>>,
    prune_every_n_inserts: u64,
    prune_every_seconds: i64,
}

impl KnowledgeStore {
    /// Opens (creating if absent) the store at `path` with no credential encryption key.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        Self::open_with_key(path, None)
    }

    /// Opens the store, optionally supplying the AES-256-GCM key used to encrypt
    /// `Credential.encrypted_secret` fields before they are persisted.
    pub fn open_with_key<P: AsRef<Path>>(
        path: P,
        credential_key: Option<[u8; 32]>,
    ) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        let db = sled::open(&path).map_err(|e| StoreError::IoError(e.to_string()))?;
        let entities = db
            .open_tree(ENTITIES_TREE)
            .map_err(|e| StoreError::IoError(e.to_string()))?;
        let rel_by_parent = db
            .open_tree(REL_BY_PARENT_TREE)
            .map_err(|e| StoreError::IoError(e.to_string()))?;
        let rel_by_child = db
            .open_tree(REL_BY_CHILD_TREE)
            .map_err(|e| StoreError::IoError(e.to_string()))?;
        let executions = db
            .open_tree(EXECUTIONS_TREE)
            .map_err(|e| StoreError::IoError(e.to_string()))?;
        let exec_index = db
            .open_tree(EXEC_INDEX_TREE)
            .map_err(|e| StoreError::IoError(e.to_string()))?;
        Ok(Self {
            path,
            db,
            entities,
            rel_by_parent,
            rel_by_child,
            executions,
            exec_index,
            credential_key,
            inserts_since_prune: AtomicU64::new(0),
            last_prune_at: Mutex::new(Utc::now()),
            prune_every_n_inserts: 1000,
            prune_every_seconds: 600,
        })
    }

    /// Overrides the default prune cadence: every N inserts, and every T seconds.
    pub fn with_prune_cadence(mut self, every_n_inserts: u64, every_seconds: i64) -> Self {
        self.prune_every_n_inserts = every_n_inserts;
        self.prune_every_seconds = every_seconds;
        self
    }

    /// Callers populate `encrypted_secret` with the raw secret bytes before handing an
    /// entity to `upsert_entities`; this turns that plaintext into ciphertext before it
    /// ever reaches the sled tree. With no key configured the secret is dropped rather
    /// than persisted in the clear.
    fn encrypt_credential(&self, data: &mut crate::entities::EntityData) {
        if let crate::entities::EntityData::Credential {
            encrypted_secret, ..
        } = data
        {
            let plain = encrypted_secret.take();
            *encrypted_secret = match (self.credential_key.as_ref(), plain) {
                (Some(key), Some(plain)) => Some(crypto::encrypt(key, &plain)),
                _ => None,
            };
        }
    }

    /// Decrypts a Credential's secret using the configured key. Returns `None` if no
    /// key is configured, the entity has no secret, or decryption fails.
    pub fn decrypt_credential_secret(&self, entity: &Entity) -> Option<Vec<u8>> {
        let crate::entities::EntityData::Credential {
            encrypted_secret, ..
        } = &entity.data
        else {
            return None;
        };
        let key = self.credential_key.as_ref()?;
        let blob = encrypted_secret.as_ref()?;
        crypto::decrypt(key, blob)
    }

    /// Inserts or merges a batch of entities and their declared relationships inside a
    /// single sled transaction. Any failure rolls back the whole batch.
    pub fn upsert_entities(&self, batch: EntityBatch) -> Result<UpsertReport, StoreError> {
        let incoming_ids: std::collections::HashSet<&str> =
            batch.entities.iter().map(|e| e.id.as_str()).collect();

        let result = (&self.entities, &self.rel_by_parent, &self.rel_by_child).transaction(
            |(entities, rel_parent, rel_child)| {
                let mut report = UpsertReport::default();

                for entity in &batch.entities {
                    entity_id::validate(entity_kind_id(entity.kind()), &entity.id)
                        .map_err(ConflictableTransactionError::Abort)?;

                    let mut merged = match entities.get(entity.id.as_bytes())? {
                        Some(existing) => {
                            let existing: Entity = serde_json::from_slice(&existing)
                                .map_err(|e| {
                                    ConflictableTransactionError::Abort(StoreError::IoError(
                                        e.to_string(),
                                    ))
                                })?;
                            report.entities_merged += 1;
                            existing.merge(entity.clone())
                        }
                        None => {
                            report.entities_inserted += 1;
                            entity.clone()
                        }
                    };

                    self.encrypt_credential(&mut merged.data);

                    let bytes = serde_json::to_vec(&merged).map_err(|e| {
                        ConflictableTransactionError::Abort(StoreError::IoError(e.to_string()))
                    })?;
                    entities.insert(entity.id.as_bytes(), bytes)?;
                }

                for rel in &batch.relationships {
                    let parent_known = incoming_ids.contains(rel.parent_id.as_str())
                        || entities.get(rel.parent_id.as_bytes())?.is_some();
                    if !parent_known {
                        return Err(ConflictableTransactionError::Abort(
                            StoreError::ConstraintViolation(format!(
                                "relationship {} -> {} references unknown parent",
                                rel.parent_id, rel.child_id
                            )),
                        ));
                    }

                    let fkey = forward_key(&rel.parent_id, &rel.relationship_type, &rel.child_id);
                    let rkey = reverse_key(&rel.child_id, &rel.relationship_type, &rel.parent_id);
                    // INSERT OR IGNORE: only write if absent.
                    if rel_parent.get(&fkey)?.is_none() {
                        let value = rel.created_at.timestamp_millis().to_be_bytes();
                        rel_parent.insert(fkey, &value)?;
                        rel_child.insert(rkey, &value)?;
                        report.relationships_inserted += 1;
                    }
                }

                Ok(report)
            },
        );

        let report = match result {
            Ok(r) => r,
            Err(TransactionError::Abort(e)) => return Err(e),
            Err(TransactionError::Storage(e)) => return Err(StoreError::IoError(e.to_string())),
        };

        self.inserts_since_prune
            .fetch_add(report.entities_inserted + report.entities_merged, Ordering::Relaxed);
        Ok(report)
    }

    /// Always commits, independent of parse outcome.
    pub fn record_execution(&self, record: &ExecutionRecord) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(record).map_err(|e| StoreError::IoError(e.to_string()))?;
        self.executions
            .insert(record.id.as_bytes(), bytes)
            .map_err(|e| StoreError::IoError(e.to_string()))?;

        let index_key = format!(
            "{}\0{}\0",
            record.tool_id, record.target
        );
        let mut key = index_key.into_bytes();
        key.extend_from_slice(&record.started_at.timestamp_millis().to_be_bytes());
        self.exec_index
            .insert(key, record.id.as_bytes())
            .map_err(|e| StoreError::IoError(e.to_string()))?;
        Ok(())
    }

    /// Runs a TTL prune if either cadence threshold (insert count or elapsed time) has
    /// been crossed since the last prune. Returns `None` if no prune ran.
    pub fn prune_if_due(&self, ttl: chrono::Duration) -> Result<Option<PruneReport>, StoreError> {
        let inserts = self.inserts_since_prune.load(Ordering::Relaxed);
        let elapsed = {
            let last = self.last_prune_at.lock().unwrap();
            Utc::now() - *last
        };
        if inserts < self.prune_every_n_inserts && elapsed.num_seconds() < self.prune_every_seconds {
            return Ok(None);
        }
        let report = self.prune(ttl)?;
        tracing::info!(
            target: "redcell::knowledge_store",
            entities_pruned = report.entities_pruned,
            relationships_pruned = report.relationships_pruned,
            "ttl prune ran"
        );
        self.inserts_since_prune.store(0, Ordering::Relaxed);
        *self.last_prune_at.lock().unwrap() = Utc::now();
        Ok(Some(report))
    }

    /// Deletes entities whose `updated_at` is older than `ttl`, cascading to
    /// relationship rows and to any descendant entity reachable only through
    /// a pruned parent.
    pub fn prune(&self, ttl: chrono::Duration) -> Result<PruneReport, StoreError> {
        let cutoff = Utc::now() - ttl;
        let mut stale: Vec<String> = Vec::new();
        for kv in self.entities.iter() {
            let (key, value) = kv.map_err(|e| StoreError::IoError(e.to_string()))?;
            let entity: Entity =
                serde_json::from_slice(&value).map_err(|e| StoreError::IoError(e.to_string()))?;
            if entity.updated_at < cutoff {
                stale.push(String::from_utf8_lossy(&key).into_owned());
            }
        }

        let mut report = PruneReport::default();
        let mut queue = stale;
        let mut seen = std::collections::HashSet::new();
        while let Some(id) = queue.pop() {
            if !seen.insert(id.clone()) {
                continue;
            }
            // Cascade to children before deleting the parent's relationship rows.
            let prefix = format!("{id}\0");
            for kv in self.rel_by_parent.scan_prefix(prefix.as_bytes()) {
                let (key, _) = kv.map_err(|e| StoreError::IoError(e.to_string()))?;
                let key_str = String::from_utf8_lossy(&key);
                if let Some(child_id) = key_str.rsplit('\0').next() {
                    queue.push(child_id.to_string());
                }
            }
            self.delete_entity_rows(&id, &mut report)?;
        }
        Ok(report)
    }

    fn delete_entity_rows(&self, id: &str, report: &mut PruneReport) -> Result<(), StoreError> {
        if self
            .entities
            .remove(id.as_bytes())
            .map_err(|e| StoreError::IoError(e.to_string()))?
            .is_some()
        {
            report.entities_pruned += 1;
        }

        let parent_prefix = format!("{id}\0");
        let forward_keys: Vec<sled::IVec> = self
            .rel_by_parent
            .scan_prefix(parent_prefix.as_bytes())
            .keys()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::IoError(e.to_string()))?;
        for key in forward_keys {
            self.rel_by_parent
                .remove(&key)
                .map_err(|e| StoreError::IoError(e.to_string()))?;
            report.relationships_pruned += 1;
        }

        let child_prefix = format!("{id}\0");
        let reverse_keys: Vec<sled::IVec> = self
            .rel_by_child
            .scan_prefix(child_prefix.as_bytes())
            .keys()
            .collect::<Result<Vec<_>, _>>()
            .map_err(|e| StoreError::IoError(e.to_string()))?;
        for key in reverse_keys {
            self.rel_by_child
                .remove(&key)
                .map_err(|e| StoreError::IoError(e.to_string()))?;
        }
        Ok(())
    }

    /// Atomic file-level copy of the backing store.
    pub fn checkpoint<P: AsRef<Path>>(&self, dest: P) -> Result<(), StoreError> {
        self.db.flush().map_err(|e| StoreError::IoError(e.to_string()))?;
        copy_dir_recursive(&self.path, dest.as_ref()).map_err(|e| StoreError::IoError(e.to_string()))
    }

    /// Restores a checkpoint into `open_path` and opens it.
    pub fn restore<P: AsRef<Path>>(checkpoint: P, open_path: P) -> Result<Self, StoreError> {
        copy_dir_recursive(checkpoint.as_ref(), open_path.as_ref())
            .map_err(|e| StoreError::IoError(e.to_string()))?;
        Self::open(open_path)
    }

    pub fn get_entity(&self, id: &str) -> Result<Option<Entity>, StoreError> {
        match self
            .entities
            .get(id.as_bytes())
            .map_err(|e| StoreError::IoError(e.to_string()))?
        {
            Some(bytes) => Ok(Some(
                serde_json::from_slice(&bytes).map_err(|e| StoreError::IoError(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    /// Kind-filtered scan. O(n) over all entities, same tradeoff sled's own
    /// `scan_keys` convention makes — acceptable at an engagement's scale of
    /// up to roughly 10k entities.
    pub fn list_by_kind(&self, kind: EntityKind) -> Result<Vec<Entity>, StoreError> {
        let mut out = Vec::new();
        for kv in self.entities.iter() {
            let (_, value) = kv.map_err(|e| StoreError::IoError(e.to_string()))?;
            let entity: Entity =
                serde_json::from_slice(&value).map_err(|e| StoreError::IoError(e.to_string()))?;
            if entity.kind() == kind {
                out.push(entity);
            }
        }
        Ok(out)
    }

    pub fn children_of(
        &self,
        parent_id: &str,
        rel_type: RelationshipType,
    ) -> Result<Vec<String>, StoreError> {
        let prefix = format!("{parent_id}\0{}\0", relationship_type_tag(&rel_type));
        let mut out = Vec::new();
        for kv in self.rel_by_parent.scan_prefix(prefix.as_bytes()) {
            let (key, _) = kv.map_err(|e| StoreError::IoError(e.to_string()))?;
            let key_str = String::from_utf8_lossy(&key);
            if let Some(child_id) = key_str.rsplit('\0').next() {
                out.push(child_id.to_string());
            }
        }
        Ok(out)
    }

    pub fn parents_of(
        &self,
        child_id: &str,
        rel_type: RelationshipType,
    ) -> Result<Vec<String>, StoreError> {
        let prefix = format!("{child_id}\0{}\0", relationship_type_tag(&rel_type));
        let mut out = Vec::new();
        for kv in self.rel_by_child.scan_prefix(prefix.as_bytes()) {
            let (key, _) = kv.map_err(|e| StoreError::IoError(e.to_string()))?;
            let key_str = String::from_utf8_lossy(&key);
            if let Some(parent_id) = key_str.rsplit('\0').next() {
                out.push(parent_id.to_string());
            }
        }
        Ok(out)
    }
}

/// Planner-facing history queries: the planner consults `ExecutionRecord`,
/// not entity counts, to decide whether a step already ran.
pub trait HistoryQuery {
    fn has_tool_executed(&self, tool_id: &str, target: &str) -> Result<bool, StoreError>;
    fn last_execution(
        &self,
        tool_id: &str,
        target: &str,
    ) -> Result<Option<ExecutionRecord>, StoreError>;
    fn has_successful_parse(&self, tool_id: &str, target: &str) -> Result<bool, StoreError>;
}

impl HistoryQuery for KnowledgeStore {
    fn has_tool_executed(&self, tool_id: &str, target: &str) -> Result<bool, StoreError> {
        Ok(self.last_execution(tool_id, target)?.is_some())
    }

    fn last_execution(
        &self,
        tool_id: &str,
        target: &str,
    ) -> Result<Option<ExecutionRecord>, StoreError> {
        let prefix = format!("{tool_id}\0{target}\0");
        let last = self
            .exec_index
            .scan_prefix(prefix.as_bytes())
            .last();
        let Some(kv) = last else { return Ok(None) };
        let (_, exec_id) = kv.map_err(|e| StoreError::IoError(e.to_string()))?;
        match self
            .executions
            .get(&exec_id)
            .map_err(|e| StoreError::IoError(e.to_string()))?
        {
            Some(bytes) => Ok(Some(
                serde_json::from_slice(&bytes).map_err(|e| StoreError::IoError(e.to_string()))?,
            )),
            None => Ok(None),
        }
    }

    fn has_successful_parse(&self, tool_id: &str, target: &str) -> Result<bool, StoreError> {
        let prefix = format!("{tool_id}\0{target}\0");
        for kv in self.exec_index.scan_prefix(prefix.as_bytes()) {
            let (_, exec_id) = kv.map_err(|e| StoreError::IoError(e.to_string()))?;
            if let Some(bytes) = self
                .executions
                .get(&exec_id)
                .map_err(|e| StoreError::IoError(e.to_string()))?
            {
                let record: ExecutionRecord = serde_json::from_slice(&bytes)
                    .map_err(|e| StoreError::IoError(e.to_string()))?;
                if record.parse_status == ParseStatus::Parsed {
                    return Ok(true);
                }
            }
        }
        Ok(false)
    }
}

fn copy_dir_recursive(src: &Path, dest: &Path) -> std::io::Result<()> {
    std::fs::create_dir_all(dest)?;
    for entry in std::fs::read_dir(src)? {
        let entry = entry?;
        let file_type = entry.file_type()?;
        let dest_path = dest.join(entry.file_name());
        if file_type.is_dir() {
            copy_dir_recursive(&entry.path(), &dest_path)?;
        } else {
            std::fs::copy(entry.path(), dest_path)?;
        }
    }
    Ok(())
}

// Silence "unused" for the tag/from_tag helpers kept for symmetry and future callers.
#[allow(dead_code)]
fn _assert_tag_roundtrip(t: RelationshipType) -> bool {
    relationship_type_from_tag(relationship_type_tag(&t)) == Some(t)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::entities::{EntityData, EntityStatus, Protocol, PortState};
    use std::collections::BTreeSet;

    fn host_entity(ip: &str) -> Entity {
        let now = Utc::now();
        Entity {
            id: entity_id::host_id(ip),
            discovered_by: "ping".into(),
            discovered_at: now,
            updated_at: now,
            status: EntityStatus::Discovered,
            confidence: 0.8,
            tags: BTreeSet::new(),
            data: EntityData::Host {
                ip_address: ip.into(),
                hostnames: BTreeSet::new(),
                os_family: None,
                os_version: None,
                is_alive: true,
                last_seen: Some(now),
                response_time_ms: Some(12.0),
            },
        }
    }

    fn port_entity(host_id: &str, port: u16) -> Entity {
        let now = Utc::now();
        Entity {
            id: entity_id::port_id(host_id, port, "tcp"),
            discovered_by: "nmap".into(),
            discovered_at: now,
            updated_at: now,
            status: EntityStatus::Discovered,
            confidence: 0.9,
            tags: BTreeSet::new(),
            data: EntityData::Port {
                parent_host_id: host_id.into(),
                port,
                protocol: Protocol::Tcp,
                state: PortState::Open,
            },
        }
    }

    #[test]
    fn insert_then_query_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = KnowledgeStore::open(dir.path()).unwrap();
        let host = host_entity("192.168.1.1");
        let batch = EntityBatch {
            entities: vec![host.clone()],
            relationships: vec![],
        };
        let report = store.upsert_entities(batch).unwrap();
        assert_eq!(report.entities_inserted, 1);

        let fetched = store.get_entity(&host.id).unwrap().unwrap();
        assert_eq!(fetched.id, host.id);
    }

    #[test]
    fn orphan_relationship_rolls_back_whole_batch() {
        let dir = tempfile::tempdir().unwrap();
        let store = KnowledgeStore::open(dir.path()).unwrap();
        let host = host_entity("10.0.0.5");
        let batch = EntityBatch {
            entities: vec![host.clone()],
            relationships: vec![Relationship {
                parent_id: "host_does_not_exist".into(),
                child_id: host.id.clone(),
                relationship_type: RelationshipType::HasPort,
                created_at: Utc::now(),
            }],
        };
        assert!(store.upsert_entities(batch).is_err());
        // The entity from the aborted batch must not be committed either.
        assert!(store.get_entity(&host.id).unwrap().is_none());
    }

    #[test]
    fn port_relates_to_host_via_has_port() {
        let dir = tempfile::tempdir().unwrap();
        let store = KnowledgeStore::open(dir.path()).unwrap();
        let host = host_entity("192.168.1.10");
        let port = port_entity(&host.id, 22);
        let batch = EntityBatch {
            entities: vec![host.clone(), port.clone()],
            relationships: vec![Relationship {
                parent_id: host.id.clone(),
                child_id: port.id.clone(),
                relationship_type: RelationshipType::HasPort,
                created_at: Utc::now(),
            }],
        };
        store.upsert_entities(batch).unwrap();
        let children = store.children_of(&host.id, RelationshipType::HasPort).unwrap();
        assert_eq!(children, vec![port.id.clone()]);
        let parents = store.parents_of(&port.id, RelationshipType::HasPort).unwrap();
        assert_eq!(parents, vec![host.id]);
    }

    #[test]
    fn re_running_same_parser_merges_not_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let store = KnowledgeStore::open(dir.path()).unwrap();
        let host = host_entity("192.168.1.1");
        store
            .upsert_entities(EntityBatch {
                entities: vec![host.clone()],
                relationships: vec![],
            })
            .unwrap();
        let report = store
            .upsert_entities(EntityBatch {
                entities: vec![host.clone()],
                relationships: vec![],
            })
            .unwrap();
        assert_eq!(report.entities_merged, 1);
        assert_eq!(store.list_by_kind(EntityKind::Host).unwrap().len(), 1);
    }

    #[test]
    fn prune_removes_stale_and_cascades_to_children() {
        let dir = tempfile::tempdir().unwrap();
        let store = KnowledgeStore::open(dir.path()).unwrap();
        let mut host = host_entity("192.168.1.1");
        host.updated_at = Utc::now() - chrono::Duration::hours(2);
        host.discovered_at = host.updated_at;
        let mut port = port_entity(&host.id, 80);
        port.updated_at = host.updated_at;
        port.discovered_at = host.updated_at;
        store
            .upsert_entities(EntityBatch {
                entities: vec![host.clone(), port.clone()],
                relationships: vec![Relationship {
                    parent_id: host.id.clone(),
                    child_id: port.id.clone(),
                    relationship_type: RelationshipType::HasPort,
                    created_at: Utc::now(),
                }],
            })
            .unwrap();

        let report = store.prune(chrono::Duration::hours(1)).unwrap();
        assert_eq!(report.entities_pruned, 2);
        assert!(store.get_entity(&host.id).unwrap().is_none());
        assert!(store.get_entity(&port.id).unwrap().is_none());
    }

    #[test]
    fn checkpoint_then_restore_is_byte_identical_state() {
        let src_dir = tempfile::tempdir().unwrap();
        let dest_dir = tempfile::tempdir().unwrap();
        let restore_dir = tempfile::tempdir().unwrap();
        let store = KnowledgeStore::open(src_dir.path()).unwrap();
        let host = host_entity("172.16.0.1");
        store
            .upsert_entities(EntityBatch {
                entities: vec![host.clone()],
                relationships: vec![],
            })
            .unwrap();
        store.checkpoint(dest_dir.path()).unwrap();
        let restored = KnowledgeStore::restore(dest_dir.path(), restore_dir.path()).unwrap();
        assert_eq!(restored.get_entity(&host.id).unwrap().unwrap().id, host.id);
    }

    #[test]
    fn history_queries_use_execution_record_not_entity_counts() {
        let dir = tempfile::tempdir().unwrap();
        let store = KnowledgeStore::open(dir.path()).unwrap();
        assert!(!store.has_tool_executed("nmap_port_scan", "10.0.0.1").unwrap());

        let record = ExecutionRecord {
            id: uuid::Uuid::new_v4(),
            tool_id: "nmap_port_scan".into(),
            stage_id: "recon".into(),
            target: "10.0.0.1".into(),
            execution_status: crate::knowledge::execution_record::ExecutionStatus::Partial,
            parse_status: ParseStatus::ParseFailed,
            started_at: Utc::now(),
            completed_at: Utc::now(),
            duration_ms: 10,
            raw_stdout_path: "/tmp/out".into(),
            raw_stderr_path: None,
            entities_created: 0,
            error_message: Some("malformed output".into()),
        };
        store.record_execution(&record).unwrap();
        assert!(store.has_tool_executed("nmap_port_scan", "10.0.0.1").unwrap());
        assert!(!store.has_successful_parse("nmap_port_scan", "10.0.0.1").unwrap());
    }
}
