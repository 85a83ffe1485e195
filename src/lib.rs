pub mod bus;
pub mod fields;
pub mod form;
pub mod picker;
pub mod value;

pub use bus::{BusEvent, Dispatcher, EventKind, SubscriptionId};
pub use fields::{DateTimeAdapter, SelectAdapter, TagAdapter, TextAdapter};
pub use form::{
    BlurCompletion, FieldBinding, FieldHandle, FieldSnapshot, FormController, FormDraftStore,
    FormError, FormId, FormResult, FormUpdate, InMemoryDraftStore, ValidationError, ValidationRule,
};
pub use picker::{DateTimePicker, DateTimeRequest, PickerMode, PickerRequest, SelectPicker};
pub use value::{FieldValue, SelectOption, UpdateAction};
