use std::sync::{Arc, RwLock};

use crate::bus::{BusEvent, Dispatcher, EventKind, SubscriptionId};
use crate::form::{FieldBinding, FormController, FormResult, write_lock};
use crate::picker::PickerRequest;
use crate::value::{FieldValue, SelectOption};

type ChangeCallback = Arc<dyn Fn(&FieldValue) + Send + Sync>;

/// Tap-to-pick field backed by the singleton option picker. Opening publishes
/// a request seeded with the current value; while the picker is up the field
/// mirrors its live selections optimistically (the form commits them through
/// its own global listener).
#[derive(Clone)]
pub struct SelectAdapter {
    binding: FieldBinding,
    bus: Dispatcher,
    label: String,
    placeholder: String,
    list: Vec<SelectOption>,
    disabled: bool,
    on_change: Option<ChangeCallback>,
    listeners: Arc<RwLock<Vec<SubscriptionId>>>,
}

impl SelectAdapter {
    pub fn new(name: impl Into<String>, form: FormController, bus: Dispatcher) -> Self {
        Self {
            binding: FieldBinding::new(name, form),
            bus,
            label: String::new(),
            placeholder: "Select...".to_string(),
            list: Vec::new(),
            disabled: false,
            on_change: None,
            listeners: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn required(mut self, value: bool) -> Self {
        self.binding = self.binding.required(value);
        self
    }

    pub fn label(mut self, value: impl Into<String>) -> Self {
        self.label = value.into();
        self
    }

    pub fn placeholder(mut self, value: impl Into<String>) -> Self {
        self.placeholder = value.into();
        self
    }

    pub fn list(mut self, value: Vec<SelectOption>) -> Self {
        self.list = value;
        self
    }

    pub fn disabled(mut self, value: bool) -> Self {
        self.disabled = value;
        self
    }

    pub fn on_change(mut self, callback: impl Fn(&FieldValue) + Send + Sync + 'static) -> Self {
        self.on_change = Some(Arc::new(callback));
        self
    }

    pub fn on_submit_editing(
        mut self,
        callback: impl Fn(Option<&FieldValue>) + Send + Sync + 'static,
    ) -> Self {
        self.binding = self.binding.on_submit_editing(callback);
        self
    }

    /// Registers with the form and subscribes to this field's picker events.
    pub fn mount(&self) -> FormResult<()> {
        let name = self.binding.name().to_string();

        let change_adapter = self.clone();
        let change_id =
            self.bus
                .subscribe(EventKind::PickerChange, Some(&name), move |event| {
                    if let BusEvent::PickerChange { value, .. } = event {
                        let _ = change_adapter.handle_picker_change(value);
                    }
                });
        let close_adapter = self.clone();
        let close_id = self
            .bus
            .subscribe(EventKind::PickerClose, Some(&name), move |_| {
                close_adapter.binding.close();
            });
        {
            let mut listeners = write_lock(&self.listeners, "recording field listeners")?;
            listeners.push(change_id);
            listeners.push(close_id);
        }

        self.binding.register()
    }

    pub fn unmount(&self) -> FormResult<()> {
        let ids = {
            let mut listeners = write_lock(&self.listeners, "clearing field listeners")?;
            std::mem::take(&mut *listeners)
        };
        for id in ids {
            self.bus.unsubscribe(id);
        }
        Ok(())
    }

    /// Summons the picker, seeded with the currently displayed value.
    pub fn open(&self) -> FormResult<()> {
        if self.disabled {
            return Ok(());
        }
        let seed = self
            .binding
            .value()?
            .as_text()
            .unwrap_or_default()
            .to_string();
        self.bus.publish(BusEvent::PickerOpen(
            PickerRequest::new(self.binding.name())
                .label(self.label.clone())
                .list(self.list.clone())
                .value(seed),
        ));
        Ok(())
    }

    pub fn focus(&self) -> FormResult<()> {
        self.binding.focus()?;
        self.open()
    }

    pub fn blur(&self) -> FormResult<()> {
        self.binding.blur()?;
        self.binding.close();
        Ok(())
    }

    /// Resolves the displayed label for the current value, falling back to
    /// the placeholder.
    pub fn selected_label(&self) -> FormResult<String> {
        let value = self.binding.value()?;
        let selected = value.as_text().unwrap_or_default();
        Ok(self
            .list
            .iter()
            .find(|option| option.value == selected)
            .map(|option| option.label.clone())
            .unwrap_or_else(|| self.placeholder.clone()))
    }

    pub fn is_valid(&self) -> FormResult<bool> {
        self.binding.is_valid()
    }

    pub fn error(&self) -> FormResult<Option<String>> {
        self.binding.error()
    }

    pub fn binding(&self) -> &FieldBinding {
        &self.binding
    }

    fn handle_picker_change(&self, value: &FieldValue) -> FormResult<()> {
        self.binding.receive_value(value.clone())?;
        if let Some(on_change) = &self.on_change {
            on_change(value);
        }
        Ok(())
    }
}
