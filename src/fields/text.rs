use crate::form::{FieldBinding, FormController, FormResult, ValidationRule};
use crate::value::FieldValue;

/// Plain text entry wired into a form. Owns the text it displays and reports
/// every keystroke's result upward as a change.
#[derive(Clone)]
pub struct TextAdapter {
    binding: FieldBinding,
    placeholder: String,
    max_length: Option<usize>,
    disabled: bool,
}

impl TextAdapter {
    pub fn new(name: impl Into<String>, form: FormController) -> Self {
        Self {
            binding: FieldBinding::new(name, form).rule(ValidationRule::Text),
            placeholder: String::new(),
            max_length: None,
            disabled: false,
        }
    }

    pub fn required(mut self, value: bool) -> Self {
        self.binding = self.binding.required(value);
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.binding = self.binding.default_value(value.into());
        self
    }

    pub fn placeholder(mut self, value: impl Into<String>) -> Self {
        self.placeholder = value.into();
        self
    }

    pub fn max_length(mut self, value: usize) -> Self {
        self.max_length = Some(value);
        self
    }

    pub fn disabled(mut self, value: bool) -> Self {
        self.disabled = value;
        self
    }

    pub fn on_update(mut self, callback: impl Fn(&FieldValue) + Send + Sync + 'static) -> Self {
        self.binding = self.binding.on_update(callback);
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
        self.binding.register()
    }

    /// The user typed. Clamps to the configured maximum length by character
    /// count before reporting.
    pub fn input(&self, text: impl Into<String>) -> FormResult<()> {
        if self.disabled {
            return Ok(());
        }
        let mut text = text.into();
        if let Some(limit) = self.max_length {
            if text.chars().count() > limit {
                text = text.chars().take(limit).collect();
            }
        }
        self.binding.report_change(text)
    }

    /// Return-key gesture: latches the field and ends editing with the final
    /// text.
    pub fn submit_editing(&self, text: impl Into<String>) -> FormResult<()> {
        self.binding
            .submit_editing(Some(FieldValue::from(text.into())))
    }

    pub fn focus(&self) -> FormResult<()> {
        self.binding.focus()
    }

    pub fn blur(&self) -> FormResult<()> {
        self.binding.blur()
    }

    pub fn text(&self) -> FormResult<String> {
        Ok(match self.binding.value()? {
            FieldValue::Text(text) => text,
            _ => String::new(),
        })
    }

    pub fn placeholder_text(&self) -> &str {
        &self.placeholder
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
}
