//! In-memory collection for tests and embedding shells.

use super::{Collection, CollectionError, NewNote, Note, NoteId, Result};
use quiz_core::DuplicateKey;
use std::collections::{BTreeMap, HashMap, HashSet};

#[derive(Debug, Clone)]
struct StoredNote {
    note: Note,
    fingerprint: DuplicateKey,
}

/// Collection backed by ordinary maps.
///
/// Note types registered with [`InMemoryCollection::with_note_type`] have
/// their field names enforced, which is how tests provoke write rejections.
#[derive(Debug, Default)]
pub struct InMemoryCollection {
    notes: BTreeMap<NoteId, StoredNote>,
    schemas: HashMap<String, Vec<String>>,
    next_id: i64,
}

impl InMemoryCollection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Restrict `note_type` to exactly these field names.
    pub fn with_note_type<I, S>(mut self, note_type: impl Into<String>, fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.schemas
            .insert(note_type.into(), fields.into_iter().map(Into::into).collect());
        self
    }

    pub fn get(&self, id: NoteId) -> Option<&Note> {
        self.notes.get(&id).map(|stored| &stored.note)
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn notes(&self) -> impl Iterator<Item = &Note> {
        self.notes.values().map(|stored| &stored.note)
    }

    fn validate(&self, note: &NewNote) -> Result<()> {
        let mut seen = HashSet::new();
        for field in &note.fields {
            if field.name.trim().is_empty() {
                return Err(CollectionError::InvalidField {
                    field: field.name.clone(),
                    reason: "field name is empty".to_string(),
                });
            }
            if !seen.insert(field.name.as_str()) {
                return Err(CollectionError::InvalidField {
                    field: field.name.clone(),
                    reason: "field appears twice".to_string(),
                });
            }
        }

        if let Some(schema) = self.schemas.get(&note.note_type) {
            if let Some(field) = note.fields.iter().find(|f| !schema.contains(&f.name)) {
                return Err(CollectionError::InvalidField {
                    field: field.name.clone(),
                    reason: format!("not a field of note type {}", note.note_type),
                });
            }
        }

        Ok(())
    }
}

fn has_tag(note: &Note, tag: &str) -> bool {
    if tag.is_empty() {
        return true;
    }
    let child_prefix = format!("{}::", tag.to_lowercase());
    note.tags.iter().any(|t| {
        let t = t.to_lowercase();
        t == tag.to_lowercase() || t.starts_with(&child_prefix)
    })
}

impl Collection for InMemoryCollection {
    fn exists(&self, fingerprint: &DuplicateKey) -> Result<bool> {
        Ok(self
            .notes
            .values()
            .any(|stored| &stored.fingerprint == fingerprint))
    }

    fn create_note(&mut self, note: NewNote) -> Result<NoteId> {
        self.validate(&note)?;

        self.next_id += 1;
        let id = NoteId(self.next_id);
        let stored = StoredNote {
            note: Note {
                id,
                note_type: note.note_type,
                deck: note.deck,
                fields: note.fields,
                tags: note.tags,
            },
            fingerprint: note.fingerprint,
        };
        self.notes.insert(id, stored);
        Ok(id)
    }

    fn list_notes_by_tag(&self, tag: &str) -> Result<Vec<Note>> {
        Ok(self
            .notes
            .values()
            .filter(|stored| has_tag(&stored.note, tag))
            .map(|stored| stored.note.clone())
            .collect())
    }

    fn is_empty(&self) -> Result<bool> {
        Ok(self.notes.is_empty())
    }

    fn patch_field(&mut self, id: NoteId, field: &str, value: &str) -> Result<()> {
        let stored = self
            .notes
            .get_mut(&id)
            .ok_or(CollectionError::NotFound { id })?;
        let target = stored
            .note
            .fields
            .iter_mut()
            .find(|f| f.name == field)
            .ok_or_else(|| CollectionError::UnknownField {
                id,
                field: field.to_string(),
            })?;
        target.value = value.to_string();
        Ok(())
    }

    fn delete_note(&mut self, id: NoteId) -> Result<()> {
        self.notes
            .remove(&id)
            .map(|_| ())
            .ok_or(CollectionError::NotFound { id })
    }
}
