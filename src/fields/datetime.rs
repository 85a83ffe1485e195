use std::sync::{Arc, RwLock};

use chrono::{DateTime, FixedOffset, Offset, Timelike, Utc};

use crate::bus::{BusEvent, Dispatcher, EventKind, SubscriptionId};
use crate::form::{FieldBinding, FormController, FormResult, ValidationRule, write_lock};
use crate::picker::{DateTimeRequest, PickerMode};
use crate::value::FieldValue;

type ChangeCallback = Arc<dyn Fn(i64) + Send + Sync>;

/// Tap-to-pick date/time field backed by the singleton date/time picker.
/// Values are epoch milliseconds throughout; opening commits the (normalized)
/// seed value immediately, matching the way the widget always displays
/// whatever the picker would start from.
#[derive(Clone)]
pub struct DateTimeAdapter {
    binding: FieldBinding,
    bus: Dispatcher,
    label: String,
    placeholder: String,
    format: String,
    minimum: Option<i64>,
    minute_interval: u32,
    mode: PickerMode,
    timezone_offset_minutes: i32,
    on_change: Option<ChangeCallback>,
    listeners: Arc<RwLock<Vec<SubscriptionId>>>,
}

impl DateTimeAdapter {
    pub fn new(name: impl Into<String>, form: FormController, bus: Dispatcher) -> Self {
        Self {
            binding: FieldBinding::new(name, form).rule(ValidationRule::DateTime),
            bus,
            label: String::new(),
            placeholder: String::new(),
            format: "%-m/%-d/%y %-I:%M %P".to_string(),
            minimum: None,
            minute_interval: 1,
            mode: PickerMode::default(),
            timezone_offset_minutes: 0,
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

    /// chrono format string used by `display_text`.
    pub fn format(mut self, value: impl Into<String>) -> Self {
        self.format = value.into();
        self
    }

    pub fn minimum(mut self, value: i64) -> Self {
        self.minimum = Some(value);
        self
    }

    pub fn minute_interval(mut self, value: u32) -> Self {
        self.minute_interval = value.max(1);
        self
    }

    pub fn mode(mut self, value: PickerMode) -> Self {
        self.mode = value;
        self
    }

    pub fn timezone_offset_minutes(mut self, value: i32) -> Self {
        self.timezone_offset_minutes = value;
        self
    }

    pub fn on_change(mut self, callback: impl Fn(i64) + Send + Sync + 'static) -> Self {
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

    pub fn mount(&self) -> FormResult<()> {
        let name = self.binding.name().to_string();

        // The field's own open broadcast doubles as its first commit; the
        // named delivery lands here before the global one reaches the picker.
        let open_adapter = self.clone();
        let open_id = self
            .bus
            .subscribe(EventKind::DateTimeOpen, Some(&name), move |event| {
                if let BusEvent::DateTimeOpen(request) = event {
                    let _ = open_adapter.commit(request.value);
                }
            });
        let change_adapter = self.clone();
        let change_id =
            self.bus
                .subscribe(EventKind::PickerChange, Some(&name), move |event| {
                    if let BusEvent::PickerChange { value, .. } = event {
                        if let Some(timestamp) = value.as_timestamp() {
                            let _ = change_adapter.handle_picker_change(timestamp);
                        }
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
            listeners.extend([open_id, change_id, close_id]);
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

    /// Summons the picker with a normalized seed: the displayed value when
    /// there is one, otherwise now; date-only mode starts at midnight, the
    /// others at a whole minute.
    pub fn open(&self) -> FormResult<()> {
        let seed = match self.binding.value()?.as_timestamp() {
            Some(timestamp) => timestamp,
            None => Utc::now().timestamp_millis(),
        };
        let seed = normalize_seed(seed, self.mode);

        let mut request = DateTimeRequest::new(self.binding.name(), seed)
            .label(self.label.clone())
            .minute_interval(self.minute_interval)
            .mode(self.mode)
            .timezone_offset_minutes(self.timezone_offset_minutes);
        if let Some(minimum) = self.minimum {
            request = request.minimum(minimum);
        }
        self.bus.publish(BusEvent::DateTimeOpen(request));
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

    /// Formats the displayed value in the configured timezone, falling back
    /// to the placeholder.
    pub fn display_text(&self) -> FormResult<String> {
        let Some(timestamp) = self.binding.value()?.as_timestamp() else {
            return Ok(self.placeholder.clone());
        };
        let Some(datetime) = DateTime::from_timestamp_millis(timestamp) else {
            return Ok(self.placeholder.clone());
        };
        let offset =
            FixedOffset::east_opt(self.timezone_offset_minutes * 60).unwrap_or_else(|| Utc.fix());
        Ok(datetime
            .with_timezone(&offset)
            .format(&self.format)
            .to_string())
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

    fn commit(&self, timestamp: i64) -> FormResult<()> {
        let timestamp = crate::picker::truncate_to_minute(timestamp);
        self.binding.report_change(timestamp)?;
        if let Some(on_change) = &self.on_change {
            on_change(timestamp);
        }
        Ok(())
    }

    fn handle_picker_change(&self, timestamp: i64) -> FormResult<()> {
        let timestamp = crate::picker::truncate_to_minute(timestamp);
        self.binding
            .receive_value(FieldValue::Timestamp(timestamp))?;
        if let Some(on_change) = &self.on_change {
            on_change(timestamp);
        }
        Ok(())
    }
}

fn normalize_seed(timestamp: i64, mode: PickerMode) -> i64 {
    match mode {
        PickerMode::Date => midnight_of(timestamp),
        PickerMode::Time | PickerMode::DateTime => crate::picker::truncate_to_minute(timestamp),
    }
}

fn midnight_of(timestamp: i64) -> i64 {
    DateTime::from_timestamp_millis(timestamp)
        .and_then(|datetime| datetime.with_hour(0))
        .and_then(|datetime| datetime.with_minute(0))
        .and_then(|datetime| datetime.with_second(0))
        .and_then(|datetime| datetime.with_nanosecond(0))
        .map(|datetime| datetime.timestamp_millis())
        .unwrap_or(timestamp)
}
