use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, RwLock};

use super::controller::{FormController, FormResult, read_lock, write_lock};
use super::validation::ValidationRule;
use crate::value::{FieldValue, UpdateAction};

/// Completion token a blur hook may hand back; submission awaits every one of
/// them before invoking the submit callback.
pub type BlurCompletion = Pin<Box<dyn Future<Output = ()> + Send>>;

type ReceiveHook = Arc<dyn Fn(FieldValue) + Send + Sync>;
type BlurHook = Arc<dyn Fn() -> Option<BlurCompletion> + Send + Sync>;
type CloseHook = Arc<dyn Fn() + Send + Sync>;

/// What a field hands the controller at registration: its name, declared
/// rules, and the hooks the controller drives back down through.
#[derive(Clone)]
pub struct FieldHandle {
    name: String,
    rules: Vec<ValidationRule>,
    receive: Option<ReceiveHook>,
    blur: Option<BlurHook>,
    close: Option<CloseHook>,
}

impl FieldHandle {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rules: Vec::new(),
            receive: None,
            blur: None,
            close: None,
        }
    }

    pub fn rule(mut self, rule: ValidationRule) -> Self {
        if !self.rules.contains(&rule) {
            self.rules.push(rule);
        }
        self
    }

    pub fn required(self, value: bool) -> Self {
        if value {
            self.rule(ValidationRule::Required)
        } else {
            self
        }
    }

    pub fn on_receive(mut self, hook: impl Fn(FieldValue) + Send + Sync + 'static) -> Self {
        self.receive = Some(Arc::new(hook));
        self
    }

    pub fn on_blur(
        mut self,
        hook: impl Fn() -> Option<BlurCompletion> + Send + Sync + 'static,
    ) -> Self {
        self.blur = Some(Arc::new(hook));
        self
    }

    pub fn on_close(mut self, hook: impl Fn() + Send + Sync + 'static) -> Self {
        self.close = Some(Arc::new(hook));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn rules(&self) -> &[ValidationRule] {
        &self.rules
    }

    pub(crate) fn receive(&self, value: FieldValue) {
        if let Some(hook) = &self.receive {
            hook(value);
        }
    }

    pub(crate) fn blur(&self) -> Option<BlurCompletion> {
        self.blur.as_ref().and_then(|hook| hook())
    }

    pub(crate) fn close(&self) {
        if let Some(hook) = &self.close {
            hook();
        }
    }
}

type UpdateCallback = Arc<dyn Fn(&FieldValue) + Send + Sync>;
type FocusCallback = Arc<dyn Fn() + Send + Sync>;
type SubmitEditingCallback = Arc<dyn Fn(Option<&FieldValue>) + Send + Sync>;

struct BindingState {
    value: FieldValue,
    is_focused: bool,
    has_submit: bool,
}

/// Shared core of every concrete field adapter: owns the display value (the
/// controller is only seeded into it at registration), forwards user edits
/// upward, and accepts the controller's focus/blur/close commands.
#[derive(Clone)]
pub struct FieldBinding {
    name: String,
    default_value: FieldValue,
    rules: Vec<ValidationRule>,
    form: FormController,
    state: Arc<RwLock<BindingState>>,
    on_update: Option<UpdateCallback>,
    on_focus: Option<FocusCallback>,
    on_blur: Option<FocusCallback>,
    on_submit_editing: Option<SubmitEditingCallback>,
}

impl FieldBinding {
    pub fn new(name: impl Into<String>, form: FormController) -> Self {
        Self {
            name: name.into(),
            default_value: FieldValue::Null,
            rules: Vec::new(),
            form,
            state: Arc::new(RwLock::new(BindingState {
                value: FieldValue::Null,
                is_focused: false,
                has_submit: false,
            })),
            on_update: None,
            on_focus: None,
            on_blur: None,
            on_submit_editing: None,
        }
    }

    pub fn default_value(mut self, value: impl Into<FieldValue>) -> Self {
        self.default_value = value.into();
        self
    }

    pub fn rule(mut self, rule: ValidationRule) -> Self {
        if !self.rules.contains(&rule) {
            self.rules.push(rule);
        }
        self
    }

    pub fn required(self, value: bool) -> Self {
        if value {
            self.rule(ValidationRule::Required)
        } else {
            self
        }
    }

    pub fn on_update(mut self, callback: impl Fn(&FieldValue) + Send + Sync + 'static) -> Self {
        self.on_update = Some(Arc::new(callback));
        self
    }

    pub fn on_focus(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_focus = Some(Arc::new(callback));
        self
    }

    pub fn on_blur(mut self, callback: impl Fn() + Send + Sync + 'static) -> Self {
        self.on_blur = Some(Arc::new(callback));
        self
    }

    pub fn on_submit_editing(
        mut self,
        callback: impl Fn(Option<&FieldValue>) + Send + Sync + 'static,
    ) -> Self {
        self.on_submit_editing = Some(Arc::new(callback));
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn form(&self) -> &FormController {
        &self.form
    }

    /// Registers with the controller. Registration is idempotent against
    /// duplicate names and a no-op for an empty name, both on the controller
    /// side.
    pub fn register(&self) -> FormResult<()> {
        let mut handle = FieldHandle::new(self.name.clone());
        for rule in &self.rules {
            handle = handle.rule(*rule);
        }
        let receive_binding = self.clone();
        let blur_binding = self.clone();
        let close_binding = self.clone();
        handle = handle
            .on_receive(move |value| {
                let _ = receive_binding.receive_value(value);
            })
            .on_blur(move || {
                let _ = blur_binding.blur();
                None
            })
            .on_close(move || close_binding.close());
        self.form.add_field(handle)
    }

    /// User edit path: records the value locally, forwards it to the
    /// controller as a change, then notifies the caller. Goes quiet once
    /// editing was submit-ended.
    pub fn report_change(&self, value: impl Into<FieldValue>) -> FormResult<()> {
        let value = value.into();
        {
            let mut state = write_lock(&self.state, "recording field edit")?;
            if state.has_submit {
                return Ok(());
            }
            state.value = value.clone();
        }
        self.form
            .update(UpdateAction::Change, &self.name, value.clone())?;
        if let Some(on_update) = &self.on_update {
            on_update(&value);
        }
        Ok(())
    }

    /// Push-down path: registration seeding and optimistic picker updates
    /// land here. Does not mark the field updated and does not notify the
    /// caller's update listener.
    pub fn receive_value(&self, value: FieldValue) -> FormResult<()> {
        let mut state = write_lock(&self.state, "receiving seeded value")?;
        state.value = value;
        Ok(())
    }

    pub fn focus(&self) -> FormResult<()> {
        {
            let mut state = write_lock(&self.state, "focusing field")?;
            state.is_focused = true;
        }
        if let Some(on_focus) = &self.on_focus {
            on_focus();
        }
        Ok(())
    }

    pub fn blur(&self) -> FormResult<()> {
        {
            let mut state = write_lock(&self.state, "blurring field")?;
            state.is_focused = false;
        }
        if let Some(on_blur) = &self.on_blur {
            on_blur();
        }
        Ok(())
    }

    /// Editing finished with an explicit submission gesture; latches the
    /// field so later edits stop reporting.
    pub fn submit_editing(&self, value: Option<FieldValue>) -> FormResult<()> {
        {
            let mut state = write_lock(&self.state, "latching submit")?;
            state.has_submit = true;
        }
        self.blur()?;
        if let Some(on_submit_editing) = &self.on_submit_editing {
            on_submit_editing(value.as_ref());
        }
        Ok(())
    }

    /// Interaction ended without asserting a final value, e.g. a picker was
    /// dismissed. The last reported change stays authoritative.
    pub fn close(&self) {
        if let Some(on_submit_editing) = &self.on_submit_editing {
            on_submit_editing(None);
        }
    }

    pub fn is_focused(&self) -> FormResult<bool> {
        Ok(read_lock(&self.state, "reading focus flag")?.is_focused)
    }

    pub fn has_submit(&self) -> FormResult<bool> {
        Ok(read_lock(&self.state, "reading submit latch")?.has_submit)
    }

    /// Display value: the locally owned value, falling back to the
    /// controller's map and then the configured default.
    pub fn value(&self) -> FormResult<FieldValue> {
        let local = read_lock(&self.state, "reading display value")?.value.clone();
        if local != FieldValue::Null {
            return Ok(local);
        }
        if let Some(value) = self.form.value_of(&self.name)? {
            if value != FieldValue::Null {
                return Ok(value);
            }
        }
        Ok(self.default_value.clone())
    }

    pub fn is_valid(&self) -> FormResult<bool> {
        self.form.is_field_valid(&self.name)
    }

    pub fn error(&self) -> FormResult<Option<String>> {
        self.form.display_error(&self.name)
    }
}
