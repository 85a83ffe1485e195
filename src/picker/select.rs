use std::sync::{Arc, RwLock};

use log::debug;

use super::PickerRequest;
use crate::bus::{BusEvent, Dispatcher, EventKind, SubscriptionId};
use crate::form::{FormResult, read_lock, write_lock};
use crate::value::SelectOption;

struct SelectPickerState {
    visible: bool,
    name: String,
    label: String,
    list: Vec<SelectOption>,
    selected: String,
}

/// Singleton overlay for picking one option from a list. Any field can summon
/// it with a `PickerOpen` broadcast; while visible it streams every selection
/// as a live `PickerChange` keyed by the requesting field's name.
#[derive(Clone)]
pub struct SelectPicker {
    bus: Dispatcher,
    state: Arc<RwLock<SelectPickerState>>,
    listeners: Arc<RwLock<Vec<SubscriptionId>>>,
}

impl SelectPicker {
    pub fn new(bus: Dispatcher) -> Self {
        Self {
            bus,
            state: Arc::new(RwLock::new(SelectPickerState {
                visible: false,
                name: String::new(),
                label: String::new(),
                list: Vec::new(),
                selected: String::new(),
            })),
            listeners: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn mount(&self) -> FormResult<()> {
        let picker = self.clone();
        let id = self.bus.subscribe(EventKind::PickerOpen, None, move |event| {
            if let BusEvent::PickerOpen(request) = event {
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

    /// Shows the picker seeded from the request. An empty option list is a
    /// degenerate configuration; the picker stays hidden.
    pub fn open(&self, request: PickerRequest) -> FormResult<()> {
        if request.list.is_empty() {
            debug!("ignoring picker request for {:?}: empty list", request.name);
            let mut state = write_lock(&self.state, "suppressing empty picker request")?;
            state.visible = false;
            return Ok(());
        }

        self.bus.publish(BusEvent::KeyboardDismiss);

        let mut selected = request.value;
        if selected.is_empty() {
            if let Some(first) = request.list.first() {
                selected = first.value.clone();
            }
        }

        let mut state = write_lock(&self.state, "opening select picker")?;
        state.name = request.name;
        state.label = request.label;
        state.list = request.list;
        state.selected = selected;
        state.visible = true;
        Ok(())
    }

    /// A selection tick while the wheel is up: broadcast immediately, keyed
    /// by the requesting field.
    pub fn change(&self, value: impl Into<String>) -> FormResult<()> {
        let value = value.into();
        let name = {
            let mut state = write_lock(&self.state, "recording picker selection")?;
            state.selected = value.clone();
            state.name.clone()
        };
        self.bus.publish(BusEvent::PickerChange {
            name,
            value: value.into(),
        });
        Ok(())
    }

    /// Dismissal: the final selection is re-broadcast, then closure is
    /// announced, then the overlay resets to hidden.
    pub fn close(&self) -> FormResult<()> {
        let (name, selected) = {
            let mut state = write_lock(&self.state, "closing select picker")?;
            let name = std::mem::take(&mut state.name);
            state.label.clear();
            state.visible = false;
            (name, state.selected.clone())
        };
        self.bus.publish(BusEvent::PickerChange {
            name: name.clone(),
            value: selected.into(),
        });
        self.bus.publish(BusEvent::PickerClose { name });
        Ok(())
    }

    pub fn is_visible(&self) -> FormResult<bool> {
        Ok(read_lock(&self.state, "reading picker visibility")?.visible)
    }

    pub fn selection(&self) -> FormResult<String> {
        Ok(read_lock(&self.state, "reading picker selection")?
            .selected
            .clone())
    }

    pub fn label(&self) -> FormResult<String> {
        Ok(read_lock(&self.state, "reading picker label")?.label.clone())
    }

    pub fn options(&self) -> FormResult<Vec<SelectOption>> {
        Ok(read_lock(&self.state, "reading picker options")?.list.clone())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::value::FieldValue;

    fn request(options: &[(&str, &str)]) -> PickerRequest {
        PickerRequest::new("flavor").label("Flavor").list(
            options
                .iter()
                .map(|(label, value)| SelectOption::new(*label, *value))
                .collect(),
        )
    }

    #[test]
    fn empty_list_leaves_picker_hidden() {
        let bus = Dispatcher::new();
        let picker = SelectPicker::new(bus.clone());
        picker.mount().expect("mount picker");

        bus.publish(BusEvent::PickerOpen(request(&[])));
        assert!(!picker.is_visible().expect("visibility"));

        picker.unmount().expect("unmount picker");
    }

    #[test]
    fn open_seeds_first_option_when_request_has_no_value() {
        let bus = Dispatcher::new();
        let picker = SelectPicker::new(bus.clone());
        picker.mount().expect("mount picker");

        bus.publish(BusEvent::PickerOpen(request(&[
            ("Vanilla", "vanilla"),
            ("Mint", "mint"),
        ])));
        assert!(picker.is_visible().expect("visibility"));
        assert_eq!(picker.selection().expect("selection"), "vanilla");

        picker.unmount().expect("unmount picker");
    }

    #[test]
    fn open_keeps_requested_value_over_first_option() {
        let picker = SelectPicker::new(Dispatcher::new());
        picker
            .open(request(&[("Vanilla", "vanilla"), ("Mint", "mint")]).value("mint"))
            .expect("open picker");
        assert_eq!(picker.selection().expect("selection"), "mint");
    }

    #[test]
    fn change_broadcasts_live_and_close_reannounces_final_value() {
        let bus = Dispatcher::new();
        let picker = SelectPicker::new(bus.clone());
        let events = Arc::new(Mutex::new(Vec::new()));
        for kind in [EventKind::PickerChange, EventKind::PickerClose] {
            let events = events.clone();
            bus.subscribe(kind, Some("flavor"), move |event| {
                let entry = match event {
                    BusEvent::PickerChange { value, .. } => match value {
                        FieldValue::Text(text) => format!("change:{text}"),
                        other => format!("change:{other:?}"),
                    },
                    BusEvent::PickerClose { .. } => "close".to_string(),
                    other => format!("{other:?}"),
                };
                events.lock().expect("events lock").push(entry);
            });
        }

        picker
            .open(request(&[("Vanilla", "vanilla"), ("Mint", "mint")]))
            .expect("open picker");
        picker.change("mint").expect("change selection");
        picker.close().expect("close picker");

        assert_eq!(
            events.lock().expect("events lock").clone(),
            vec!["change:mint", "change:mint", "close"]
        );
        assert!(!picker.is_visible().expect("visibility"));
    }

    #[test]
    fn open_dismisses_keyboard() {
        let bus = Dispatcher::new();
        let picker = SelectPicker::new(bus.clone());
        let dismissed = Arc::new(Mutex::new(0usize));
        {
            let dismissed = dismissed.clone();
            bus.subscribe(EventKind::KeyboardDismiss, None, move |_| {
                *dismissed.lock().expect("dismiss lock") += 1;
            });
        }

        picker
            .open(request(&[("Vanilla", "vanilla")]))
            .expect("open picker");
        assert_eq!(*dismissed.lock().expect("dismiss lock"), 1);

        picker.open(request(&[])).expect("open with empty list");
        assert_eq!(*dismissed.lock().expect("dismiss lock"), 1);
    }
}
