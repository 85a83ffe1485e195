use std::sync::{Arc, RwLock};

use chrono::{DateTime, Timelike};
use log::debug;

use super::{DateTimeRequest, PickerMode};
use crate::bus::{BusEvent, Dispatcher, EventKind, SubscriptionId};
use crate::form::{FormResult, read_lock, write_lock};

struct DateTimePickerState {
    visible: bool,
    name: String,
    label: String,
    value: i64,
    minimum: Option<i64>,
    minute_interval: u32,
    mode: PickerMode,
    timezone_offset_minutes: i32,
}

/// Singleton overlay for picking a date, a time, or both. Summoned with a
/// `DateTimeOpen` broadcast; selections stream out live as `PickerChange`
/// events and the final value is truncated to whole minutes on dismissal.
#[derive(Clone)]
pub struct DateTimePicker {
    bus: Dispatcher,
    state: Arc<RwLock<DateTimePickerState>>,
    listeners: Arc<RwLock<Vec<SubscriptionId>>>,
}

impl DateTimePicker {
    pub fn new(bus: Dispatcher) -> Self {
        Self {
            bus,
            state: Arc::new(RwLock::new(DateTimePickerState {
                visible: false,
                name: String::new(),
                label: String::new(),
                value: 0,
                minimum: None,
                minute_interval: 1,
                mode: PickerMode::default(),
                timezone_offset_minutes: 0,
            })),
            listeners: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn mount(&self) -> FormResult<()> {
        let picker = self.clone();
        let id = self
            .bus
            .subscribe(EventKind::DateTimeOpen, None, move |event| {
                if let BusEvent::DateTimeOpen(request) = event {
                    let _ = picker.open(request.clone());
                }
            });
        write_lock(&self.listeners, "recording picker listener")?.push(id);
        Ok(())
    }

    pub fn unmount(&self) -> FormResult<()> {
        let ids = {
            let mut listeners = write_lock(&self.listeners, "clearing picker listeners")?;
            std::mem::take(&mut *listeners)
        };
        for id in ids {
            self.bus.unsubscribe(id);
        }
        Ok(())
    }

    pub fn open(&self, request: DateTimeRequest) -> FormResult<()> {
        self.bus.publish(BusEvent::KeyboardDismiss);
        debug!(
            "opening datetime picker for {:?} ({:?})",
            request.name, request.mode
        );
        let mut state = write_lock(&self.state, "opening datetime picker")?;
        state.name = request.name;
        state.label = request.label;
        state.value = clamp_to_minimum(request.value, request.minimum);
        state.minimum = request.minimum;
        state.minute_interval = request.minute_interval.max(1);
        state.mode = request.mode;
        state.timezone_offset_minutes = request.timezone_offset_minutes;
        state.visible = true;
        Ok(())
    }

    /// A wheel tick while the overlay is up. Values below the requested
    /// minimum are clamped before broadcasting.
    pub fn change(&self, timestamp: i64) -> FormResult<()> {
        let (name, value) = {
            let mut state = write_lock(&self.state, "recording datetime selection")?;
            let value = clamp_to_minimum(timestamp, state.minimum);
            state.value = value;
            (state.name.clone(), value)
        };
        self.bus.publish(BusEvent::PickerChange {
            name,
            value: value.into(),
        });
        Ok(())
    }

    /// Dismissal: the selection is truncated to a whole minute, re-broadcast
    /// as the authoritative value, then closure is announced.
    pub fn close(&self) -> FormResult<()> {
        let (name, value) = {
            let mut state = write_lock(&self.state, "closing datetime picker")?;
            let value = truncate_to_minute(state.value);
            state.value = value;
            let name = std::mem::take(&mut state.name);
            state.label.clear();
            state.visible = false;
            (name, value)
        };
        self.bus.publish(BusEvent::PickerChange {
            name: name.clone(),
            value: value.into(),
        });
        self.bus.publish(BusEvent::PickerClose { name });
        Ok(())
    }

    pub fn is_visible(&self) -> FormResult<bool> {
        Ok(read_lock(&self.state, "reading picker visibility")?.visible)
    }

    pub fn selection(&self) -> FormResult<i64> {
        Ok(read_lock(&self.state, "reading picker selection")?.value)
    }

    pub fn mode(&self) -> FormResult<PickerMode> {
        Ok(read_lock(&self.state, "reading picker mode")?.mode)
    }

    pub fn minute_interval(&self) -> FormResult<u32> {
        Ok(read_lock(&self.state, "reading minute interval")?.minute_interval)
    }

    pub fn label(&self) -> FormResult<String> {
        Ok(read_lock(&self.state, "reading picker label")?.label.clone())
    }

    pub fn timezone_offset_minutes(&self) -> FormResult<i32> {
        Ok(read_lock(&self.state, "reading timezone offset")?.timezone_offset_minutes)
    }
}

fn clamp_to_minimum(timestamp: i64, minimum: Option<i64>) -> i64 {
    match minimum {
        Some(minimum) => timestamp.max(minimum),
        None => timestamp,
    }
}

/// Seconds and sub-second precision never survive the picker.
pub(crate) fn truncate_to_minute(timestamp: i64) -> i64 {
    DateTime::from_timestamp_millis(timestamp)
        .and_then(|datetime| datetime.with_second(0))
        .and_then(|datetime| datetime.with_nanosecond(0))
        .map(|datetime| datetime.timestamp_millis())
        .unwrap_or_else(|| timestamp - timestamp.rem_euclid(60_000))
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::value::FieldValue;

    // 2018-01-01T00:00:00Z
    const NEW_YEAR: i64 = 1_514_764_800_000;

    #[test]
    fn truncation_drops_seconds_and_millis() {
        assert_eq!(truncate_to_minute(NEW_YEAR + 42_500), NEW_YEAR);
        assert_eq!(truncate_to_minute(NEW_YEAR), NEW_YEAR);
    }

    #[test]
    fn open_clamps_seed_below_minimum() {
        let picker = DateTimePicker::new(Dispatcher::new());
        picker
            .open(DateTimeRequest::new("starts", NEW_YEAR - 60_000).minimum(NEW_YEAR))
            .expect("open picker");
        assert_eq!(picker.selection().expect("selection"), NEW_YEAR);
        assert!(picker.is_visible().expect("visibility"));
    }

    #[test]
    fn change_clamps_and_broadcasts_named_event() {
        let bus = Dispatcher::new();
        let picker = DateTimePicker::new(bus.clone());
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = seen.clone();
            bus.subscribe(EventKind::PickerChange, Some("starts"), move |event| {
                if let BusEvent::PickerChange { value, .. } = event {
                    seen.lock().expect("seen lock").push(value.clone());
                }
            });
        }

        picker
            .open(DateTimeRequest::new("starts", NEW_YEAR).minimum(NEW_YEAR))
            .expect("open picker");
        picker.change(NEW_YEAR - 120_000).expect("change selection");

        assert_eq!(
            seen.lock().expect("seen lock").clone(),
            vec![FieldValue::Timestamp(NEW_YEAR)]
        );
    }

    #[test]
    fn close_truncates_then_announces_change_before_close() {
        let bus = Dispatcher::new();
        let picker = DateTimePicker::new(bus.clone());
        picker.mount().expect("mount picker");
        let events = Arc::new(Mutex::new(Vec::new()));
        for kind in [EventKind::PickerChange, EventKind::PickerClose] {
            let events = events.clone();
            bus.subscribe(kind, Some("starts"), move |event| {
                let entry = match event {
                    BusEvent::PickerChange { value, .. } => format!("change:{value:?}"),
                    BusEvent::PickerClose { .. } => "close".to_string(),
                    other => format!("{other:?}"),
                };
                events.lock().expect("events lock").push(entry);
            });
        }

        bus.publish(BusEvent::DateTimeOpen(DateTimeRequest::new(
            "starts",
            NEW_YEAR + 42_500,
        )));
        picker.close().expect("close picker");

        assert_eq!(
            events.lock().expect("events lock").clone(),
            vec![format!("change:Timestamp({NEW_YEAR})"), "close".to_string()]
        );
        assert!(!picker.is_visible().expect("visibility"));

        picker.unmount().expect("unmount picker");
        assert_eq!(bus.subscription_count(), 2);
    }
}
