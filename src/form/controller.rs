use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::debug;

use super::field::FieldHandle;
use super::validation::{self, FieldSnapshot, ValidateHook, ValidationError};
use crate::bus::{BusEvent, Dispatcher, EventKind, SubscriptionId};
use crate::value::{FieldValue, UpdateAction};

static FORM_ID_ALLOCATOR: AtomicU64 = AtomicU64::new(1);

#[derive(Clone, Copy, Debug, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct FormId(pub u64);

impl FormId {
    pub fn next() -> Self {
        Self(FORM_ID_ALLOCATOR.fetch_add(1, Ordering::SeqCst))
    }
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum FormError {
    StatePoisoned(&'static str),
}

impl Display for FormError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            FormError::StatePoisoned(context) => {
                write!(f, "form state lock poisoned while {context}")
            }
        }
    }
}

impl std::error::Error for FormError {}

pub type FormResult<T> = Result<T, FormError>;

/// Payload of the host's update listener, assembled after validation ran.
#[derive(Clone, Debug)]
pub struct FormUpdate {
    pub action: UpdateAction,
    pub name: String,
    pub valid: bool,
    pub value: FieldValue,
    pub values: BTreeMap<String, FieldValue>,
}

pub(super) struct FieldRegistration {
    pub(super) handle: FieldHandle,
    pub(super) current_value: FieldValue,
    pub(super) is_updated: bool,
}

pub(super) struct FormState {
    pub(super) id: FormId,
    pub(super) values: BTreeMap<String, FieldValue>,
    pub(super) errors: BTreeMap<String, Vec<ValidationError>>,
    pub(super) fields: BTreeMap<String, FieldRegistration>,
}

type UpdateCallback = Arc<dyn Fn(FormUpdate) + Send + Sync>;
type SubmitCallback = Arc<dyn Fn(BTreeMap<String, FieldValue>) + Send + Sync>;
type ResetCallback = Arc<dyn Fn() + Send + Sync>;

/// Mediator owning the canonical value and error maps for a set of named
/// fields. Fields register themselves, report edits upward, and receive
/// seeded values and blur/close commands back; picker broadcasts fold in
/// through the injected dispatcher once the controller is mounted.
#[derive(Clone)]
pub struct FormController {
    bus: Dispatcher,
    blur_on_submit: bool,
    pub(super) state: Arc<RwLock<FormState>>,
    listeners: Arc<RwLock<Vec<SubscriptionId>>>,
    on_update: Option<UpdateCallback>,
    on_submit: Option<SubmitCallback>,
    on_reset: Option<ResetCallback>,
    on_validate: Option<Arc<ValidateHook>>,
}

impl FormController {
    pub fn new(bus: Dispatcher) -> Self {
        Self {
            bus,
            blur_on_submit: false,
            state: Arc::new(RwLock::new(FormState {
                id: FormId::next(),
                values: BTreeMap::new(),
                errors: BTreeMap::new(),
                fields: BTreeMap::new(),
            })),
            listeners: Arc::new(RwLock::new(Vec::new())),
            on_update: None,
            on_submit: None,
            on_reset: None,
            on_validate: None,
        }
    }

    /// Externally supplied initial values, seeded into fields as they
    /// register.
    pub fn values(self, values: BTreeMap<String, FieldValue>) -> FormResult<Self> {
        {
            let mut state = write_lock(&self.state, "seeding initial values")?;
            state.values = values;
        }
        Ok(self)
    }

    pub fn blur_on_submit(mut self, value: bool) -> Self {
        self.blur_on_submit = value;
        self
    }

    pub fn on_update(mut self, callback: impl Fn(FormUpdate) + Send + Sync + 'static) -> Self {
        self.on_update = Some(Arc::new(callback));
        self
    }

    pub fn on_submit(
        mut self,
        callback: impl Fn(BTreeMap<String, FieldValue>) + Send + Sync + 'static,
    ) -> Self {
        self.on_submit = Some(Arc::new(callback));
        self
    }

    pub fn on_reset(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_reset = Some(Arc::new(callback));
        self
    }

    pub fn on_validate(
        mut self,
        callback: impl Fn(&BTreeMap<String, FieldSnapshot>) -> BTreeMap<String, Vec<ValidationError>>
        + Send
        + Sync
        + 'static,
    ) -> Self {
        self.on_validate = Some(Arc::new(callback));
        self
    }

    pub fn form_id(&self) -> FormResult<FormId> {
        Ok(read_lock(&self.state, "reading form id")?.id)
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.bus
    }

    /// Subscribes the controller's global picker listeners. Every `mount`
    /// must be paired with an `unmount` when the form leaves the screen.
    pub fn mount(&self) -> FormResult<()> {
        let change_controller = self.clone();
        let change_id = self
            .bus
            .subscribe(EventKind::PickerChange, None, move |event| {
                if let BusEvent::PickerChange { name, value } = event {
                    let _ = change_controller.update(UpdateAction::Change, name, value.clone());
                }
            });
        let close_controller = self.clone();
        let close_id = self
            .bus
            .subscribe(EventKind::PickerClose, None, move |event| {
                if let BusEvent::PickerClose { name } = event {
                    let _ = close_controller.close_field(name);
                }
            });
        let mut listeners = write_lock(&self.listeners, "recording form listeners")?;
        listeners.push(change_id);
        listeners.push(close_id);
        Ok(())
    }

    pub fn unmount(&self) -> FormResult<()> {
        let ids = {
            let mut listeners = write_lock(&self.listeners, "clearing form listeners")?;
            std::mem::take(&mut *listeners)
        };
        for id in ids {
            self.bus.unsubscribe(id);
        }
        Ok(())
    }

    /// Registers a field. The first registration for a name wins; later ones
    /// are ignored and do not reseed. A handle without a name is silently
    /// dropped.
    pub fn add_field(&self, handle: FieldHandle) -> FormResult<()> {
        if handle.name().is_empty() {
            return Ok(());
        }
        let name = handle.name().to_string();
        let seed = {
            let mut state = write_lock(&self.state, "registering field")?;
            if state.fields.contains_key(&name) {
                return Ok(());
            }
            let seed = state.values.get(&name).cloned();
            state.fields.insert(
                name.clone(),
                FieldRegistration {
                    handle: handle.clone(),
                    current_value: seed.clone().unwrap_or_default(),
                    is_updated: false,
                },
            );
            seed
        };
        debug!("registered field {name:?}");
        if let Some(value) = seed {
            handle.receive(value.clone());
            self.update(UpdateAction::Init, &name, value)?;
        }
        Ok(())
    }

    /// Drops a registration and its value/error entries. The inverse of
    /// `add_field`, for fields leaving the screen before the form does.
    pub fn remove_field(&self, name: &str) -> FormResult<bool> {
        let mut state = write_lock(&self.state, "removing field")?;
        let removed = state.fields.remove(name).is_some();
        if removed {
            state.values.remove(name);
            state.errors.remove(name);
        }
        Ok(removed)
    }

    /// Applies a field's new value and recomputes validation before
    /// returning; callers never observe a half-updated values/errors pair.
    /// The host update listener fires for every non-init action, whether or
    /// not the name is registered.
    pub fn update(&self, action: UpdateAction, name: &str, value: FieldValue) -> FormResult<()> {
        if name.is_empty() {
            return Ok(());
        }
        {
            let mut guard = write_lock(&self.state, "applying field update")?;
            let state = &mut *guard;
            if let Some(registration) = state.fields.get_mut(name) {
                registration.current_value = value.clone();
                if action != UpdateAction::Init {
                    registration.is_updated = true;
                }
                state.values.insert(name.to_string(), value.clone());
            }
        }
        self.validate(action)?;
        if action != UpdateAction::Init {
            if let Some(on_update) = &self.on_update {
                let (valid, values) = {
                    let state = read_lock(&self.state, "snapshotting update payload")?;
                    (form_is_valid(&state), state.values.clone())
                };
                on_update(FormUpdate {
                    action,
                    name: name.to_string(),
                    valid,
                    value,
                    values,
                });
            }
        }
        Ok(())
    }

    /// Split-ownership rendition of an external values change: differing
    /// entries run through `update` as changes, nothing is pushed down into
    /// fields.
    pub fn replace_values(&self, values: BTreeMap<String, FieldValue>) -> FormResult<()> {
        let changed = {
            let state = read_lock(&self.state, "diffing replacement values")?;
            values
                .into_iter()
                .filter(|(name, value)| state.values.get(name) != Some(value))
                .collect::<Vec<_>>()
        };
        for (name, value) in changed {
            self.update(UpdateAction::Change, &name, value)?;
        }
        Ok(())
    }

    /// Evaluates every registration's rules against the current values, lets
    /// the host validate hook contribute extra errors, and rewrites the error
    /// map. Fields that come out clean lose their entry entirely.
    pub fn validate(&self, action: UpdateAction) -> FormResult<()> {
        let snapshots = self.field_snapshots()?;
        let extra = self
            .on_validate
            .as_ref()
            .map(|hook| hook(&snapshots))
            .unwrap_or_default();

        let mut errors_by_name = BTreeMap::new();
        for (name, snapshot) in &snapshots {
            let mut errors = validation::evaluate(
                name,
                &snapshot.rules,
                &snapshot.value,
                snapshot.is_updated,
                action,
            );
            if let Some(extra_errors) = extra.get(name) {
                errors.extend(extra_errors.iter().cloned());
            }
            errors_by_name.insert(name.clone(), errors);
        }

        let mut state = write_lock(&self.state, "applying validation result")?;
        for (name, errors) in errors_by_name {
            if errors.is_empty() {
                state.errors.remove(&name);
            } else {
                state.errors.insert(name, errors);
            }
        }
        Ok(())
    }

    /// Dismisses the keyboard, forces full validation, and, when the form is
    /// valid, blurs every field (awaiting any asynchronous completions)
    /// before handing a snapshot of the values to the submit callback. An
    /// invalid form makes this a silent no-op.
    pub async fn submit(&self) -> FormResult<()> {
        self.bus.publish(BusEvent::KeyboardDismiss);
        self.validate(UpdateAction::Submit)?;
        if !self.is_form_valid()? {
            debug!("submission blocked; error map is non-empty");
            return Ok(());
        }

        if self.blur_on_submit {
            // Blur hooks run outside the state lock; they may call back in.
            let handles = {
                let state = read_lock(&self.state, "collecting field handles")?;
                state
                    .fields
                    .values()
                    .map(|registration| registration.handle.clone())
                    .collect::<Vec<_>>()
            };
            let completions = handles
                .iter()
                .filter_map(|handle| handle.blur())
                .collect::<Vec<_>>();
            // Synchronous blurs returned no completion; the rest settle here.
            for completion in completions {
                completion.await;
            }
        }

        let values = read_lock(&self.state, "snapshotting submitted values")?
            .values
            .clone();
        debug!("submitting {} value(s)", values.len());
        if let Some(on_submit) = &self.on_submit {
            on_submit(values);
        }
        if let Some(on_reset) = &self.on_reset {
            on_reset();
        }
        Ok(())
    }

    pub fn is_form_valid(&self) -> FormResult<bool> {
        let state = read_lock(&self.state, "reading form validity")?;
        Ok(form_is_valid(&state))
    }

    /// A missing entry and an empty entry both mean "valid".
    pub fn is_field_valid(&self, name: &str) -> FormResult<bool> {
        let state = read_lock(&self.state, "reading field validity")?;
        Ok(state.errors.get(name).is_none_or(Vec::is_empty))
    }

    pub fn value_of(&self, name: &str) -> FormResult<Option<FieldValue>> {
        Ok(read_lock(&self.state, "reading field value")?
            .values
            .get(name)
            .cloned())
    }

    pub fn current_values(&self) -> FormResult<BTreeMap<String, FieldValue>> {
        Ok(read_lock(&self.state, "snapshotting values")?
            .values
            .clone())
    }

    pub fn errors(&self) -> FormResult<BTreeMap<String, Vec<ValidationError>>> {
        Ok(read_lock(&self.state, "snapshotting errors")?
            .errors
            .clone())
    }

    pub fn field_errors(&self, name: &str) -> FormResult<Vec<ValidationError>> {
        Ok(read_lock(&self.state, "reading field errors")?
            .errors
            .get(name)
            .cloned()
            .unwrap_or_default())
    }

    pub fn display_error(&self, name: &str) -> FormResult<Option<String>> {
        Ok(self
            .field_errors(name)?
            .first()
            .map(|error| error.message.clone()))
    }

    pub fn field_snapshots(&self) -> FormResult<BTreeMap<String, FieldSnapshot>> {
        let state = read_lock(&self.state, "snapshotting registrations")?;
        Ok(state
            .fields
            .iter()
            .map(|(name, registration)| {
                (
                    name.clone(),
                    FieldSnapshot {
                        name: name.clone(),
                        rules: registration.handle.rules().to_vec(),
                        value: registration.current_value.clone(),
                        is_updated: registration.is_updated,
                    },
                )
            })
            .collect())
    }

    fn close_field(&self, name: &str) -> FormResult<()> {
        let handle = {
            let state = read_lock(&self.state, "finding field to close")?;
            state
                .fields
                .get(name)
                .map(|registration| registration.handle.clone())
        };
        if let Some(handle) = handle {
            handle.close();
        }
        Ok(())
    }
}

fn form_is_valid(state: &FormState) -> bool {
    state.errors.values().all(Vec::is_empty)
}

pub(crate) fn read_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockReadGuard<'a, T>> {
    lock.read().map_err(|_| FormError::StatePoisoned(context))
}

pub(crate) fn write_lock<'a, T>(
    lock: &'a RwLock<T>,
    context: &'static str,
) -> FormResult<RwLockWriteGuard<'a, T>> {
    lock.write().map_err(|_| FormError::StatePoisoned(context))
}
