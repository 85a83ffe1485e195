mod datetime;
mod select;

use serde::{Deserialize, Serialize};

use crate::value::SelectOption;

pub use datetime::DateTimePicker;
pub(crate) use datetime::truncate_to_minute;
pub use select::SelectPicker;

/// Broadcast payload a field publishes to summon the option picker.
#[derive(Clone, Debug, Default, Deserialize, PartialEq, Serialize)]
pub struct PickerRequest {
    pub name: String,
    pub label: String,
    pub list: Vec<SelectOption>,
    pub value: String,
}

impl PickerRequest {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn label(mut self, value: impl Into<String>) -> Self {
        self.label = value.into();
        self
    }

    pub fn list(mut self, value: Vec<SelectOption>) -> Self {
        self.list = value;
        self
    }

    pub fn value(mut self, value: impl Into<String>) -> Self {
        self.value = value.into();
        self
    }
}

#[derive(Clone, Copy, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub enum PickerMode {
    Date,
    Time,
    #[default]
    DateTime,
}

/// Broadcast payload a field publishes to summon the date/time picker. The
/// value and minimum are epoch milliseconds; the timezone rides along as a
/// UTC offset in minutes.
#[derive(Clone, Debug, Deserialize, PartialEq, Serialize)]
pub struct DateTimeRequest {
    pub name: String,
    pub label: String,
    pub value: i64,
    pub minimum: Option<i64>,
    pub minute_interval: u32,
    pub mode: PickerMode,
    pub timezone_offset_minutes: i32,
}

impl DateTimeRequest {
    pub fn new(name: impl Into<String>, value: i64) -> Self {
        Self {
            name: name.into(),
            label: String::new(),
            value,
            minimum: None,
            minute_interval: 1,
            mode: PickerMode::default(),
            timezone_offset_minutes: 0,
        }
    }

    pub fn label(mut self, value: impl Into<String>) -> Self {
        self.label = value.into();
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
}
