use std::collections::BTreeMap;
use std::convert::Infallible;
use std::sync::{Arc, RwLock};

use super::controller::{FormController, FormId, FormResult, read_lock, write_lock};
use crate::value::{FieldValue, UpdateAction};

/// Where in-progress form values are parked between sessions. Implementors
/// may serialize the snapshot however they like; the map is fully
/// serde-serializable.
pub trait FormDraftStore: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    fn save(&self, form_id: FormId, values: &BTreeMap<String, FieldValue>)
    -> Result<(), Self::Error>;
    fn load(&self, form_id: FormId) -> Result<Option<BTreeMap<String, FieldValue>>, Self::Error>;
    fn clear(&self, form_id: FormId) -> Result<(), Self::Error>;
}

#[derive(Clone, Default)]
pub struct InMemoryDraftStore {
    state: Arc<RwLock<BTreeMap<FormId, BTreeMap<String, FieldValue>>>>,
}

impl InMemoryDraftStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl FormDraftStore for InMemoryDraftStore {
    type Error = Infallible;

    fn save(
        &self,
        form_id: FormId,
        values: &BTreeMap<String, FieldValue>,
    ) -> Result<(), Self::Error> {
        let mut state = match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.insert(form_id, values.clone());
        Ok(())
    }

    fn load(&self, form_id: FormId) -> Result<Option<BTreeMap<String, FieldValue>>, Self::Error> {
        let state = match self.state.read() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Ok(state.get(&form_id).cloned())
    }

    fn clear(&self, form_id: FormId) -> Result<(), Self::Error> {
        let mut state = match self.state.write() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        state.remove(&form_id);
        Ok(())
    }
}

impl FormController {
    pub fn save_draft<S>(&self, store: &S) -> FormResult<bool>
    where
        S: FormDraftStore,
    {
        let (id, values) = {
            let state = read_lock(&self.state, "saving draft")?;
            (state.id, state.values.clone())
        };
        Ok(store.save(id, &values).is_ok())
    }

    /// Restores a saved snapshot wholesale: registered fields pick up their
    /// restored value as a user edit (so required-ness applies) and the whole
    /// form is revalidated. Returns false when the store has nothing.
    pub fn load_draft<S>(&self, store: &S) -> FormResult<bool>
    where
        S: FormDraftStore,
    {
        let id = self.form_id()?;
        let Ok(Some(draft)) = store.load(id) else {
            return Ok(false);
        };
        {
            let mut state = write_lock(&self.state, "loading draft")?;
            for (name, registration) in state.fields.iter_mut() {
                if let Some(value) = draft.get(name) {
                    registration.current_value = value.clone();
                    registration.is_updated = true;
                }
            }
            state.values = draft;
        }
        self.validate(UpdateAction::Change)?;
        Ok(true)
    }

    pub fn clear_draft<S>(&self, store: &S) -> FormResult<bool>
    where
        S: FormDraftStore,
    {
        let id = self.form_id()?;
        Ok(store.clear(id).is_ok())
    }
}
