//! Dated notes of one grow space at a time.
//!
//! `Unloaded → Loaded`; selecting a date only moves the draft within the
//! loaded mapping, while saves and deletes write through to the store first
//! and update the mapping once the write succeeds.

use std::collections::BTreeMap;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::error::{GrowError, GrowResult, StoreError};
use crate::models::{NoteDate, NoteDocument};
use crate::store::{to_fields, Collection, Filter, RecordStore};

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedNotes {
    pub grow_space_id: String,
    pub notes: BTreeMap<NoteDate, String>,
    pub selected: Option<NoteDate>,
    pub draft: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum NotesState {
    Unloaded,
    Loaded(LoadedNotes),
}

fn store_failure(op: &'static str, collection: &Collection, key: &str, err: StoreError) -> GrowError {
    warn!(op, %collection, key, error = %err, "notes store operation failed");
    GrowError::Store(err)
}

pub struct NotesManager {
    store: Arc<dyn RecordStore>,
    state: NotesState,
}

impl NotesManager {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self {
            store,
            state: NotesState::Unloaded,
        }
    }

    pub fn state(&self) -> &NotesState {
        &self.state
    }

    pub fn grow_space_id(&self) -> Option<&str> {
        match &self.state {
            NotesState::Loaded(loaded) => Some(loaded.grow_space_id.as_str()),
            NotesState::Unloaded => None,
        }
    }

    pub fn notes(&self) -> GrowResult<&BTreeMap<NoteDate, String>> {
        Ok(&self.loaded()?.notes)
    }

    pub fn note(&self, date: NoteDate) -> Option<&str> {
        match &self.state {
            NotesState::Loaded(loaded) => loaded.notes.get(&date).map(String::as_str),
            NotesState::Unloaded => None,
        }
    }

    pub fn has_note(&self, date: NoteDate) -> bool {
        self.note(date).is_some()
    }

    pub fn selected(&self) -> Option<NoteDate> {
        self.loaded().ok().and_then(|loaded| loaded.selected)
    }

    pub fn draft(&self) -> &str {
        match &self.state {
            NotesState::Loaded(loaded) => loaded.draft.as_str(),
            NotesState::Unloaded => "",
        }
    }

    /// Load every note of `grow_space_id`, replacing whatever was loaded
    /// before. On failure the previous state is kept.
    pub async fn load_notes(&mut self, grow_space_id: &str) -> GrowResult<&BTreeMap<NoteDate, String>> {
        let collection = Collection::notes(grow_space_id);
        let records = self
            .store
            .query(&collection, &Filter::All)
            .await
            .map_err(|e| store_failure("load", &collection, "*", e))?;

        let mut notes = BTreeMap::new();
        for record in records {
            let Ok(date) = record.id.parse::<NoteDate>() else {
                warn!(grow_space_id, key = %record.id, "skipping note with unparseable date");
                continue;
            };
            let key = record.id.clone();
            let body: NoteDocument = record
                .decode()
                .map_err(|e| store_failure("load", &collection, &key, e))?;
            notes.insert(date, body.note);
        }
        debug!(grow_space_id, count = notes.len(), "notes loaded");

        self.state = NotesState::Loaded(LoadedNotes {
            grow_space_id: grow_space_id.to_string(),
            notes,
            selected: None,
            draft: String::new(),
        });
        Ok(self.notes()?)
    }

    /// Make `date` active and surface its note, if any, as the draft.
    pub fn select_date(&mut self, date: NoteDate) -> GrowResult<&str> {
        let loaded = self.loaded_mut()?;
        loaded.draft = loaded.notes.get(&date).cloned().unwrap_or_default();
        loaded.selected = Some(date);
        Ok(loaded.draft.as_str())
    }

    pub fn update_draft(&mut self, text: impl Into<String>) -> GrowResult<()> {
        self.loaded_mut()?.draft = text.into();
        Ok(())
    }

    /// Write `text` under `date`, overwriting any existing note. An empty
    /// text is stored as an empty note.
    pub async fn save_note(&mut self, date: NoteDate, text: impl Into<String>) -> GrowResult<()> {
        let text = text.into();
        let loaded = self.loaded()?;
        let collection = Collection::notes(loaded.grow_space_id.as_str());
        let key = date.key();

        let fields = to_fields(&NoteDocument { note: text.clone() })
            .map_err(|e| store_failure("save", &collection, &key, e))?;
        self.store
            .set(&collection, &key, fields)
            .await
            .map_err(|e| store_failure("save", &collection, &key, e))?;

        debug!(%collection, %key, "note saved");
        self.loaded_mut()?.notes.insert(date, text);
        Ok(())
    }

    /// Save the draft under the selected date, then clear the draft.
    pub async fn save_draft(&mut self) -> GrowResult<NoteDate> {
        let loaded = self.loaded()?;
        let date = loaded
            .selected
            .ok_or_else(|| GrowError::Validation("no date selected".into()))?;
        let text = loaded.draft.clone();

        self.save_note(date, text).await?;
        self.loaded_mut()?.draft.clear();
        Ok(date)
    }

    /// Remove the note under `date`. A missing note counts as removed.
    pub async fn delete_note(&mut self, date: NoteDate) -> GrowResult<()> {
        let loaded = self.loaded()?;
        let collection = Collection::notes(loaded.grow_space_id.as_str());
        let key = date.key();

        match self.store.delete(&collection, &key).await {
            Ok(()) => debug!(%collection, %key, "note deleted"),
            Err(StoreError::NotFound(_)) => debug!(%collection, %key, "note already absent"),
            Err(e) => return Err(store_failure("delete", &collection, &key, e)),
        }

        let loaded = self.loaded_mut()?;
        loaded.notes.remove(&date);
        if loaded.selected == Some(date) {
            loaded.draft.clear();
        }
        Ok(())
    }

    fn loaded(&self) -> GrowResult<&LoadedNotes> {
        match &self.state {
            NotesState::Loaded(loaded) => Ok(loaded),
            NotesState::Unloaded => Err(GrowError::NotesNotLoaded),
        }
    }

    fn loaded_mut(&mut self) -> GrowResult<&mut LoadedNotes> {
        match &mut self.state {
            NotesState::Loaded(loaded) => Ok(loaded),
            NotesState::Unloaded => Err(GrowError::NotesNotLoaded),
        }
    }
}
