//! Grow space manager: the signed-in user's grow spaces, mirrored from the
//! record store, plus one exclusive edit session.
//!
//! Edits are staged in an [`EditBuffer`] and written by `commit_edit` as a
//! single document update. The live records are never touched until that
//! write succeeds.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::error::{GrowError, GrowResult, StoreError};
use crate::models::{DimensionKey, EditBuffer, FieldUpdate, GrowSpace, NewGrowSpace, Plant, PlantUpdate};
use crate::session::SessionProvider;
use crate::store::{to_fields, Collection, Filter, RecordStore};

pub const OWNER_FIELD: &str = "userId";

/// The record being edited and its uncommitted copy.
#[derive(Debug, Clone, PartialEq)]
pub struct EditSession {
    pub id: String,
    pub buffer: EditBuffer,
}

pub struct GrowSpaceManager {
    store: Arc<dyn RecordStore>,
    session: Arc<dyn SessionProvider>,
    spaces: Vec<GrowSpace>,
    editing: Option<EditSession>,
}

fn store_failure(op: &'static str, id: &str, err: StoreError) -> GrowError {
    warn!(op, id, error = %err, "grow space store operation failed");
    GrowError::Store(err)
}

fn missing(op: &'static str, id: &str) -> GrowError {
    store_failure(op, id, StoreError::NotFound(format!("{}/{id}", Collection::GrowSpaces)))
}

impl GrowSpaceManager {
    pub fn new(store: Arc<dyn RecordStore>, session: Arc<dyn SessionProvider>) -> Self {
        Self {
            store,
            session,
            spaces: Vec::new(),
            editing: None,
        }
    }

    pub fn spaces(&self) -> &[GrowSpace] {
        &self.spaces
    }

    pub fn space(&self, id: &str) -> Option<&GrowSpace> {
        self.spaces.iter().find(|space| space.id == id)
    }

    pub fn editing(&self) -> Option<&EditSession> {
        self.editing.as_ref()
    }

    /// Replace the in-memory set with every grow space owned by `user_id`.
    /// On failure the current set is kept.
    pub async fn load_for_user(&mut self, user_id: &str) -> GrowResult<&[GrowSpace]> {
        let records = self
            .store
            .query(&Collection::GrowSpaces, &Filter::field_eq(OWNER_FIELD, user_id))
            .await
            .map_err(|e| store_failure("load", user_id, e))?;

        let mut spaces = Vec::with_capacity(records.len());
        for record in records {
            let id = record.id.clone();
            let mut space: GrowSpace = record.decode().map_err(|e| store_failure("load", &id, e))?;
            space.id = id;
            spaces.push(space);
        }

        debug!(user_id, count = spaces.len(), "grow spaces loaded");
        self.spaces = spaces;

        let stale = self
            .editing
            .as_ref()
            .is_some_and(|session| self.space(&session.id).is_none());
        if stale {
            if let Some(session) = self.editing.take() {
                debug!(discarded = %session.id, "edited record no longer loaded");
            }
        }
        Ok(self.spaces.as_slice())
    }

    /// Follow the session: load the signed-in user's spaces, or drop
    /// everything when nobody is signed in.
    pub async fn reload(&mut self) -> GrowResult<&[GrowSpace]> {
        match self.session.current_user_id() {
            Some(user_id) => self.load_for_user(&user_id).await,
            None => {
                self.spaces.clear();
                self.editing = None;
                Ok(self.spaces.as_slice())
            }
        }
    }

    pub async fn create(&mut self, fields: NewGrowSpace) -> GrowResult<&GrowSpace> {
        let owner_id = self.session.current_user_id().ok_or(GrowError::Unauthenticated)?;
        let mut space = fields.validate(&owner_id)?;

        let id = self
            .store
            .create(
                &Collection::GrowSpaces,
                to_fields(&space).map_err(|e| store_failure("create", &space.name, e))?,
            )
            .await
            .map_err(|e| store_failure("create", &space.name, e))?;
        info!(%id, name = %space.name, "grow space created");

        space.id = id;
        self.spaces.push(space);
        Ok(&self.spaces[self.spaces.len() - 1])
    }

    /// Fetch the stored copy of `id`, bypassing the in-memory set.
    pub async fn fetch(&self, id: &str) -> GrowResult<GrowSpace> {
        let record = self
            .store
            .get(&Collection::GrowSpaces, id)
            .await
            .map_err(|e| store_failure("get", id, e))?
            .ok_or_else(|| missing("get", id))?;
        let mut space: GrowSpace = record.decode().map_err(|e| store_failure("get", id, e))?;
        space.id = id.to_string();
        Ok(space)
    }

    /// Start editing `id`. Any uncommitted edit of another record is dropped.
    pub fn begin_edit(&mut self, id: &str) -> GrowResult<&EditBuffer> {
        let index = self.owned_index("edit", id)?;
        let buffer = EditBuffer::from_space(&self.spaces[index]);
        if let Some(previous) = &self.editing {
            if previous.id != id {
                debug!(discarded = %previous.id, "discarding unsaved edit");
            }
        }
        let session = self.editing.insert(EditSession {
            id: id.to_string(),
            buffer,
        });
        Ok(&session.buffer)
    }

    pub fn cancel_edit(&mut self) -> Option<EditSession> {
        self.editing.take()
    }

    pub fn update_edit_field(&mut self, update: FieldUpdate) -> GrowResult<()> {
        self.scratch()?.apply(update);
        Ok(())
    }

    pub fn update_dimension(&mut self, key: DimensionKey, value: impl Into<String>) -> GrowResult<()> {
        self.scratch()?.dimensions.set(key, value.into());
        Ok(())
    }

    pub fn add_plant_to_scratch(&mut self, plant: Plant) -> GrowResult<()> {
        self.scratch()?.plants.push(plant);
        Ok(())
    }

    /// Remove the plant at `index`. Out of range is a no-op returning `None`.
    pub fn remove_plant_from_scratch(&mut self, index: usize) -> GrowResult<Option<Plant>> {
        let plants = &mut self.scratch()?.plants;
        if index < plants.len() {
            Ok(Some(plants.remove(index)))
        } else {
            Ok(None)
        }
    }

    /// Change one field of the plant at `index`. Returns false when out of range.
    pub fn update_plant_in_scratch(&mut self, index: usize, update: PlantUpdate) -> GrowResult<bool> {
        match self.scratch()?.plants.get_mut(index) {
            Some(plant) => {
                plant.apply(update);
                Ok(true)
            }
            None => Ok(false),
        }
    }

    /// Write the scratch buffer for `id` as one update holding only the
    /// fields that differ from the live record; nothing is written when no
    /// field changed. If the commit fails, the edit session stays open for a
    /// retry.
    pub async fn commit_edit(&mut self, id: &str) -> GrowResult<&GrowSpace> {
        let buffer = match &self.editing {
            Some(session) if session.id == id => &session.buffer,
            _ => return Err(GrowError::NotEditing(id.to_string())),
        };
        let index = self.owned_index("commit", id)?;

        let encode = |buffer: &EditBuffer| to_fields(buffer).map_err(|e| store_failure("commit", id, e));
        let live = encode(&EditBuffer::from_space(&self.spaces[index]))?;
        let mut changed = encode(buffer)?;
        changed.retain(|field, value| live.get(field) != Some(value));

        if changed.is_empty() {
            debug!(%id, "no field changed, skipping write");
        } else {
            self.store
                .update(&Collection::GrowSpaces, id, changed)
                .await
                .map_err(|e| store_failure("commit", id, e))?;
        }

        let Some(session) = self.editing.take() else {
            return Err(GrowError::NotEditing(id.to_string()));
        };
        session.buffer.apply_to(&mut self.spaces[index]);
        info!(%id, plants = self.spaces[index].plants.len(), "grow space updated");
        Ok(&self.spaces[index])
    }

    /// Delete `id` from the store and from memory. Irreversible.
    pub async fn delete(&mut self, id: &str) -> GrowResult<()> {
        self.owned_index("delete", id)?;
        self.store
            .delete(&Collection::GrowSpaces, id)
            .await
            .map_err(|e| store_failure("delete", id, e))?;

        self.spaces.retain(|space| space.id != id);
        if self.editing.as_ref().is_some_and(|session| session.id == id) {
            self.editing = None;
        }
        info!(%id, "grow space deleted");
        Ok(())
    }

    fn scratch(&mut self) -> GrowResult<&mut EditBuffer> {
        self.editing
            .as_mut()
            .map(|session| &mut session.buffer)
            .ok_or(GrowError::NoEditSession)
    }

    /// Look up `id` among the acting user's spaces. Records of any other
    /// owner are reported as not found.
    fn owned_index(&self, op: &'static str, id: &str) -> GrowResult<usize> {
        let user_id = self.session.current_user_id().ok_or(GrowError::Unauthenticated)?;
        self.spaces
            .iter()
            .position(|space| space.id == id && space.owner_id == user_id)
            .ok_or_else(|| missing(op, id))
    }
}
