//! Persistence – a JSON key-value store with the per-user CV and conversation
//! libraries on top.
//!
//! Values are wrapped in a versioned envelope `{ "schemaVersion": N, "data":
//! ... }`. Version 1 is the bare, unversioned payload older builds wrote; it
//! is migrated on read. Envelopes from a newer build are refused rather than
//! misread.

use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

use crate::chat::ConversationState;
use crate::error::StoreError;
use crate::resume::Resume;
use crate::templates::TemplateKind;

/// Schema version written by this build.
pub const SCHEMA_VERSION: u32 = 2;

/// Minimal key-value collaborator: `get` / `set` / `remove` of JSON values.
pub trait KeyValueStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError>;
    fn set(&self, key: &str, value: Value) -> Result<(), StoreError>;
    fn remove(&self, key: &str) -> Result<(), StoreError>;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for &T {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }
}

/// In-process store.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Value>>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        Ok(lock(&self.entries).get(key).cloned())
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        lock(&self.entries).insert(key.to_string(), value);
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        lock(&self.entries).remove(key);
        Ok(())
    }
}

fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// One pretty-printed JSON file per key inside a directory.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", file_stem(key)))
    }
}

/// Reversible file name for a key: ASCII letters, digits and `-` are kept,
/// every other byte (including `_` itself) becomes `_XX` in hex.
fn file_stem(key: &str) -> String {
    let mut stem = String::with_capacity(key.len());
    for byte in key.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' {
            stem.push(char::from(byte));
        } else {
            stem.push_str(&format!("_{byte:02X}"));
        }
    }
    stem
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<Value>, StoreError> {
        let path = self.path_for(key);
        if !path.exists() {
            return Ok(None);
        }
        let text = fs::read_to_string(&path)?;
        Ok(Some(serde_json::from_str(&text)?))
    }

    fn set(&self, key: &str, value: Value) -> Result<(), StoreError> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        // Write-then-rename so a crash never leaves a half-written file.
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, serde_json::to_string_pretty(&value)?)?;
        fs::rename(&tmp, &path)?;
        log::debug!("Stored '{key}' at {}", path.display());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.path_for(key);
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}

/// Wrap `data` in the current envelope.
pub fn wrap(data: Value) -> Value {
    json!({ "schemaVersion": SCHEMA_VERSION, "data": data })
}

/// Unwrap an envelope, migrating unversioned payloads.
pub fn unwrap(stored: Value) -> Result<Value, StoreError> {
    let Some(raw) = stored.get("schemaVersion") else {
        log::debug!("Migrating unversioned payload to schema {SCHEMA_VERSION}");
        return Ok(stored);
    };
    let unsupported = || StoreError::UnsupportedVersion {
        found: raw.to_string(),
        supported: SCHEMA_VERSION,
    };
    let version = raw
        .as_u64()
        .and_then(|v| u32::try_from(v).ok())
        .ok_or_else(unsupported)?;
    if version > SCHEMA_VERSION {
        return Err(unsupported());
    }
    Ok(stored.get("data").cloned().unwrap_or(Value::Null))
}

/// A saved CV with its metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CvItem {
    pub id: String,
    pub title: String,
    pub template: TemplateKind,
    pub data: Resume,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default)]
    pub downloads: u32,
}

fn cv_title(resume: &Resume) -> String {
    let name = resume.personal_info.full_name();
    if name.is_empty() {
        "Untitled - CV".to_string()
    } else {
        format!("{name} - CV")
    }
}

/// The CVs of one user, kept under `user-cvs:{user}`.
pub struct CvLibrary<S> {
    store: S,
    user: String,
}

impl<S: KeyValueStore> CvLibrary<S> {
    pub fn new(store: S, user: impl Into<String>) -> Self {
        Self {
            store,
            user: user.into(),
        }
    }

    fn key(&self) -> String {
        format!("user-cvs:{}", self.user)
    }

    fn draft_key(&self) -> String {
        format!("cv-draft:{}", self.user)
    }

    /// All saved CVs, oldest first.
    pub fn list(&self) -> Result<Vec<CvItem>, StoreError> {
        match self.store.get(&self.key())? {
            Some(stored) => {
                let mut items: Vec<CvItem> = serde_json::from_value(unwrap(stored)?)?;
                for item in &mut items {
                    item.data.normalize();
                }
                Ok(items)
            }
            None => Ok(Vec::new()),
        }
    }

    fn save_all(&self, items: &[CvItem]) -> Result<(), StoreError> {
        self.store.set(&self.key(), wrap(serde_json::to_value(items)?))
    }

    pub fn get(&self, id: &str) -> Result<Option<CvItem>, StoreError> {
        Ok(self.list()?.into_iter().find(|cv| cv.id == id))
    }

    /// Save a new CV; returns its id.
    pub fn create(&self, resume: &Resume, thumbnail: Option<String>) -> Result<String, StoreError> {
        let now = Utc::now();
        let item = CvItem {
            id: Uuid::new_v4().to_string(),
            title: cv_title(resume),
            template: resume.selected_template,
            data: resume.clone(),
            created_at: now,
            updated_at: now,
            thumbnail,
            downloads: 0,
        };
        let id = item.id.clone();
        let mut items = self.list()?;
        items.push(item);
        self.save_all(&items)?;
        log::info!("Created CV {id} for '{}'", self.user);
        Ok(id)
    }

    /// Replace the data of a saved CV. Returns false for unknown ids.
    pub fn update(
        &self,
        id: &str,
        resume: &Resume,
        thumbnail: Option<String>,
    ) -> Result<bool, StoreError> {
        let mut items = self.list()?;
        let Some(item) = items.iter_mut().find(|cv| cv.id == id) else {
            return Ok(false);
        };
        item.data = resume.clone();
        item.title = cv_title(resume);
        item.template = resume.selected_template;
        item.updated_at = Utc::now();
        if thumbnail.is_some() {
            item.thumbnail = thumbnail;
        }
        self.save_all(&items)?;
        Ok(true)
    }

    /// Returns false for unknown ids.
    pub fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let mut items = self.list()?;
        let before = items.len();
        items.retain(|cv| cv.id != id);
        if items.len() == before {
            return Ok(false);
        }
        self.save_all(&items)?;
        Ok(true)
    }

    /// Copy a CV under a new id with " (Copy)" appended to its title.
    pub fn duplicate(&self, id: &str) -> Result<Option<String>, StoreError> {
        let mut items = self.list()?;
        let Some(original) = items.iter().find(|cv| cv.id == id).cloned() else {
            return Ok(None);
        };
        let now = Utc::now();
        let copy = CvItem {
            id: Uuid::new_v4().to_string(),
            title: format!("{} (Copy)", original.title),
            created_at: now,
            updated_at: now,
            downloads: 0,
            ..original
        };
        let new_id = copy.id.clone();
        items.push(copy);
        self.save_all(&items)?;
        Ok(Some(new_id))
    }

    /// Bump the download counter of a CV.
    pub fn record_download(&self, id: &str) -> Result<(), StoreError> {
        let mut items = self.list()?;
        if let Some(item) = items.iter_mut().find(|cv| cv.id == id) {
            item.downloads += 1;
            self.save_all(&items)?;
        }
        Ok(())
    }

    /// The in-progress document, if one was saved.
    pub fn load_draft(&self) -> Result<Option<Resume>, StoreError> {
        match self.store.get(&self.draft_key())? {
            Some(stored) => {
                let mut resume: Resume = serde_json::from_value(unwrap(stored)?)?;
                resume.normalize();
                Ok(Some(resume))
            }
            None => Ok(None),
        }
    }

    pub fn save_draft(&self, resume: &Resume) -> Result<(), StoreError> {
        self.store
            .set(&self.draft_key(), wrap(serde_json::to_value(resume)?))
    }

    pub fn clear_draft(&self) -> Result<(), StoreError> {
        self.store.remove(&self.draft_key())
    }
}

/// A chat session kept for later, with the full conversation state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavedConversation {
    pub id: String,
    pub title: String,
    pub state: ConversationState,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

fn conversation_title(state: &ConversationState) -> String {
    let name = state.draft.personal_info.full_name();
    if name.is_empty() {
        "Untitled conversation".to_string()
    } else {
        format!("{name} - Conversation")
    }
}

/// Saved chat sessions of one user, kept under `conversations-{user}`.
pub struct ConversationLibrary<S> {
    store: S,
    user: String,
}

impl<S: KeyValueStore> ConversationLibrary<S> {
    pub fn new(store: S, user: impl Into<String>) -> Self {
        Self {
            store,
            user: user.into(),
        }
    }

    fn key(&self) -> String {
        format!("conversations-{}", self.user)
    }

    /// All saved conversations, oldest first.
    pub fn list(&self) -> Result<Vec<SavedConversation>, StoreError> {
        let Some(stored) = self.store.get(&self.key())? else {
            return Ok(Vec::new());
        };
        let mut items: Vec<SavedConversation> = serde_json::from_value(unwrap(stored)?)?;
        for item in &mut items {
            item.state.draft.normalize();
            item.state.refresh();
        }
        Ok(items)
    }

    fn save_all(&self, items: &[SavedConversation]) -> Result<(), StoreError> {
        self.store.set(&self.key(), wrap(serde_json::to_value(items)?))
    }

    pub fn load(&self, id: &str) -> Result<Option<SavedConversation>, StoreError> {
        Ok(self.list()?.into_iter().find(|c| c.id == id))
    }

    /// Store a new conversation; returns its id.
    pub fn save(&self, state: &ConversationState) -> Result<String, StoreError> {
        let now = Utc::now();
        let item = SavedConversation {
            id: Uuid::new_v4().to_string(),
            title: conversation_title(state),
            state: state.clone(),
            created_at: now,
            updated_at: now,
        };
        let id = item.id.clone();
        let mut items = self.list()?;
        items.push(item);
        self.save_all(&items)?;
        log::info!("Saved conversation {id} for '{}'", self.user);
        Ok(id)
    }

    /// Replace the state of a saved conversation. Returns false for unknown ids.
    pub fn update(&self, id: &str, state: &ConversationState) -> Result<bool, StoreError> {
        let mut items = self.list()?;
        let Some(item) = items.iter_mut().find(|c| c.id == id) else {
            return Ok(false);
        };
        item.title = conversation_title(state);
        item.state = state.clone();
        item.updated_at = Utc::now();
        self.save_all(&items)?;
        Ok(true)
    }

    /// Returns false for unknown ids.
    pub fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let mut items = self.list()?;
        let before = items.len();
        items.retain(|c| c.id != id);
        if items.len() == before {
            return Ok(false);
        }
        self.save_all(&items)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resume(first: &str) -> Resume {
        let mut r = Resume::default();
        r.personal_info.first_name = first.into();
        r.personal_info.last_name = "Lee".into();
        r
    }

    #[test]
    fn create_list_update_delete() {
        let lib = CvLibrary::new(MemoryStore::default(), "u1");
        let id = lib.create(&resume("Ann"), None).unwrap();
        let items = lib.list().unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].title, "Ann Lee - CV");

        assert!(lib.update(&id, &resume("Bo"), None).unwrap());
        assert_eq!(lib.get(&id).unwrap().unwrap().title, "Bo Lee - CV");
        assert!(!lib.update("nope", &resume("X"), None).unwrap());

        assert!(lib.delete(&id).unwrap());
        assert!(!lib.delete(&id).unwrap());
        assert!(lib.list().unwrap().is_empty());
    }

    #[test]
    fn duplicate_appends_copy() {
        let lib = CvLibrary::new(MemoryStore::default(), "u1");
        let id = lib.create(&resume("Ann"), Some("data:image/png;base64,AA".into())).unwrap();
        lib.record_download(&id).unwrap();
        let copy_id = lib.duplicate(&id).unwrap().unwrap();
        assert_ne!(copy_id, id);
        let copy = lib.get(&copy_id).unwrap().unwrap();
        assert_eq!(copy.title, "Ann Lee - CV (Copy)");
        assert_eq!(copy.downloads, 0);
        assert_eq!(copy.thumbnail.as_deref(), Some("data:image/png;base64,AA"));
        assert_eq!(lib.get(&id).unwrap().unwrap().downloads, 1);
        assert!(lib.duplicate("missing").unwrap().is_none());
    }

    #[test]
    fn users_are_isolated() {
        let store = MemoryStore::default();
        CvLibrary::new(&store, "a").create(&resume("Ann"), None).unwrap();
        assert!(CvLibrary::new(&store, "b").list().unwrap().is_empty());
    }

    #[test]
    fn unversioned_payload_is_migrated() {
        let store = MemoryStore::default();
        let legacy = json!([{
            "id": "1700000000000",
            "title": "Ann Lee - CV",
            "template": "classic",
            "data": { "personalInfo": { "firstName": "Ann", "lastName": "Lee" } },
            "createdAt": "2024-01-01T00:00:00Z",
            "updatedAt": "2024-01-01T00:00:00Z"
        }]);
        store.set("user-cvs:u1", legacy).unwrap();
        let lib = CvLibrary::new(&store, "u1");
        let items = lib.list().unwrap();
        assert_eq!(items[0].template, TemplateKind::Classic);

        lib.record_download("1700000000000").unwrap();
        let stored = store.get("user-cvs:u1").unwrap().unwrap();
        assert_eq!(stored["schemaVersion"], json!(SCHEMA_VERSION));
    }

    #[test]
    fn newer_schema_is_refused() {
        let store = MemoryStore::default();
        store
            .set("cv-draft:u1", json!({ "schemaVersion": 99, "data": {} }))
            .unwrap();
        let err = CvLibrary::new(&store, "u1").load_draft().unwrap_err();
        assert!(matches!(
            err,
            StoreError::UnsupportedVersion { ref found, .. } if found == "99"
        ));
    }

    #[test]
    fn oversized_schema_version_is_refused() {
        // 2^32 + 1 would read as version 1 if narrowed.
        for version in [json!(4_294_967_297u64), json!(-1), json!("2")] {
            let store = MemoryStore::default();
            store
                .set("cv-draft:u1", json!({ "schemaVersion": version, "data": {} }))
                .unwrap();
            let err = CvLibrary::new(&store, "u1").load_draft().unwrap_err();
            assert!(
                matches!(err, StoreError::UnsupportedVersion { .. }),
                "{version} was accepted"
            );
        }
    }

    #[test]
    fn file_store_round_trips_drafts() {
        let dir = tempfile::tempdir().unwrap();
        let lib = CvLibrary::new(FileStore::new(dir.path()), "ann@example.com");
        assert!(lib.load_draft().unwrap().is_none());
        lib.save_draft(&resume("Ann")).unwrap();
        assert_eq!(lib.load_draft().unwrap(), Some(resume("Ann")));
        assert!(dir.path().join("cv-draft_3Aann_40example_2Ecom.json").exists());
        lib.clear_draft().unwrap();
        assert!(lib.load_draft().unwrap().is_none());
    }

    #[test]
    fn corrupt_draft_is_an_error_not_absent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let lib = CvLibrary::new(&store, "u1");
        lib.save_draft(&resume("Ann")).unwrap();
        std::fs::write(store.path_for("cv-draft:u1"), "{ not json").unwrap();
        assert!(matches!(lib.load_draft(), Err(StoreError::Json(_))));
    }

    #[test]
    fn file_store_keeps_similar_users_apart() {
        let dir = tempfile::tempdir().unwrap();
        let dotted = CvLibrary::new(FileStore::new(dir.path()), "ann.lee@example.com");
        let underscored = CvLibrary::new(FileStore::new(dir.path()), "ann_lee@example_com");
        dotted.create(&resume("Ann"), None).unwrap();
        underscored.save_draft(&resume("Bo")).unwrap();

        assert!(underscored.list().unwrap().is_empty());
        assert!(dotted.load_draft().unwrap().is_none());
        assert_eq!(dotted.list().unwrap().len(), 1);
        assert_eq!(underscored.load_draft().unwrap(), Some(resume("Bo")));
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 2);
    }

    #[test]
    fn conversations_save_load_update_delete() {
        let store = MemoryStore::default();
        let convos = ConversationLibrary::new(&store, "u1");
        let mut state = ConversationState::start();
        let id = convos.save(&state).unwrap();
        assert_eq!(convos.load(&id).unwrap().unwrap().title, "Untitled conversation");

        state.draft = resume("Ann");
        state.messages.push(crate::llm::Message::user("I'm Ann Lee"));
        assert!(convos.update(&id, &state).unwrap());
        let saved = convos.load(&id).unwrap().unwrap();
        assert_eq!(saved.title, "Ann Lee - Conversation");
        assert_eq!(saved.state.messages.len(), 2);
        assert_eq!(saved.state.current_step, crate::chat::Step::Contact);
        assert!(saved.updated_at >= saved.created_at);
        assert!(!convos.update("missing", &state).unwrap());

        let stored = store.get("conversations-u1").unwrap().unwrap();
        assert_eq!(stored["schemaVersion"], json!(SCHEMA_VERSION));
        assert!(CvLibrary::new(&store, "u1").list().unwrap().is_empty());

        assert!(convos.delete(&id).unwrap());
        assert!(!convos.delete(&id).unwrap());
        assert!(convos.list().unwrap().is_empty());
    }

    #[test]
    fn file_stems_are_distinct() {
        assert_eq!(file_stem("user-cvs:a.b"), "user-cvs_3Aa_2Eb");
        assert_ne!(file_stem("a_b"), file_stem("a.b"));
        assert_ne!(file_stem("a_2Eb"), file_stem("a.b"));
        assert_eq!(file_stem("é"), "_C3_A9");
    }
}
