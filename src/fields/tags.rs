use std::sync::{Arc, RwLock};

use crate::form::{FieldBinding, FormController, FormResult, read_lock, write_lock};
use crate::value::{FieldValue, SelectOption};

type TagsCallback = Arc<dyn Fn(&[SelectOption]) + Send + Sync>;

struct TagState {
    query: String,
    selected: Vec<SelectOption>,
}

/// Tag entry field: a search box over a catalog of known tags plus the set
/// the user has picked. Selected tags flow upward as a list value; unknown
/// queries become fresh tags.
#[derive(Clone)]
pub struct TagAdapter {
    binding: FieldBinding,
    catalog: Vec<SelectOption>,
    limit: usize,
    state: Arc<RwLock<TagState>>,
    on_update: Option<TagsCallback>,
}

impl TagAdapter {
    pub fn new(name: impl Into<String>, form: FormController) -> Self {
        Self {
            binding: FieldBinding::new(name, form),
            catalog: Vec::new(),
            limit: 0,
            state: Arc::new(RwLock::new(TagState {
                query: String::new(),
                selected: Vec::new(),
            })),
            on_update: None,
        }
    }

    pub fn required(mut self, value: bool) -> Self {
        self.binding = self.binding.required(value);
        self
    }

    pub fn catalog(mut self, value: Vec<SelectOption>) -> Self {
        self.catalog = value;
        self
    }

    /// Maximum number of selected tags; zero means unlimited.
    pub fn limit(mut self, value: usize) -> Self {
        self.limit = value;
        self
    }

    pub fn on_update(mut self, callback: impl Fn(&[SelectOption]) + Send + Sync + 'static) -> Self {
        self.on_update = Some(Arc::new(callback));
        self
    }

    pub fn mount(&self) -> FormResult<()> {
        self.binding.register()
    }

    pub fn search(&self, query: impl Into<String>) -> FormResult<()> {
        let mut state = write_lock(&self.state, "recording tag search")?;
        state.query = query.into();
        Ok(())
    }

    pub fn query(&self) -> FormResult<String> {
        Ok(read_lock(&self.state, "reading tag search")?.query.clone())
    }

    /// Return key in the search box: normalize the query, resolve it to an
    /// existing or fresh tag, select it, and clear the search.
    pub fn submit_editing(&self) -> FormResult<()> {
        let query = {
            let state = read_lock(&self.state, "reading submitted query")?;
            format_tag(&state.query)
        };
        if let Some(tag) = self.resolve(&query)? {
            self.add_tag(tag)?;
        }
        self.search("")
    }

    pub fn add_tag(&self, tag: SelectOption) -> FormResult<()> {
        let selected = {
            let mut state = write_lock(&self.state, "selecting tag")?;
            if self.limit > 0 && state.selected.len() >= self.limit {
                return Ok(());
            }
            if state
                .selected
                .iter()
                .any(|existing| existing.label == tag.label)
            {
                return Ok(());
            }
            state.selected.push(tag);
            state.selected.clone()
        };
        self.report(selected)
    }

    pub fn remove_tag(&self, label: &str) -> FormResult<()> {
        let selected = {
            let mut state = write_lock(&self.state, "deselecting tag")?;
            state.selected.retain(|tag| tag.label != label);
            state.selected.clone()
        };
        self.report(selected)
    }

    pub fn selected_tags(&self) -> FormResult<Vec<SelectOption>> {
        Ok(read_lock(&self.state, "reading selected tags")?
            .selected
            .clone())
    }

    /// Catalog entries matching the query that are not already selected.
    pub fn available_tags(&self) -> FormResult<Vec<SelectOption>> {
        let state = read_lock(&self.state, "reading available tags")?;
        Ok(self
            .catalog
            .iter()
            .filter(|tag| {
                tag.label.contains(&state.query)
                    && !state
                        .selected
                        .iter()
                        .any(|existing| existing.label == tag.label)
            })
            .cloned()
            .collect())
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

    fn resolve(&self, query: &str) -> FormResult<Option<SelectOption>> {
        if query.is_empty() {
            return Ok(None);
        }
        let state = read_lock(&self.state, "resolving tag query")?;
        let already_selected = state
            .selected
            .iter()
            .any(|existing| existing.label == query);
        if already_selected {
            return Ok(None);
        }
        let existing = self
            .catalog
            .iter()
            .find(|tag| tag.label.eq_ignore_ascii_case(query))
            .cloned();
        Ok(Some(
            existing.unwrap_or_else(|| SelectOption::new(query, "")),
        ))
    }

    fn report(&self, selected: Vec<SelectOption>) -> FormResult<()> {
        self.binding
            .report_change(FieldValue::List(selected.clone()))?;
        if let Some(on_update) = &self.on_update {
            on_update(&selected);
        }
        Ok(())
    }
}

/// Tag labels are hash-free lower-camel-case with no whitespace:
/// `"# Red Wine"` becomes `"redWine"`.
pub fn format_tag(raw: &str) -> String {
    let cleaned = raw.replace('#', "");
    let cleaned = cleaned.trim();
    let mut formatted = String::new();
    let mut word_start = false;
    for ch in cleaned.chars() {
        if ch.is_whitespace() {
            word_start = true;
            continue;
        }
        if formatted.is_empty() {
            formatted.extend(ch.to_lowercase());
        } else if word_start {
            formatted.extend(ch.to_uppercase());
        } else {
            formatted.push(ch);
        }
        word_start = false;
    }
    formatted
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use super::*;
    use crate::bus::Dispatcher;

    fn catalog() -> Vec<SelectOption> {
        vec![
            SelectOption::new("redWine", "1"),
            SelectOption::new("whiteWine", "2"),
            SelectOption::new("cider", "3"),
        ]
    }

    fn field() -> (FormController, TagAdapter) {
        let form = FormController::new(Dispatcher::new());
        let field = TagAdapter::new("drinks", form.clone()).catalog(catalog());
        field.mount().expect("mount field");
        (form, field)
    }

    #[test]
    fn format_tag_normalizes_to_lower_camel_case() {
        assert_eq!(format_tag("# Red Wine"), "redWine");
        assert_eq!(format_tag("CIDER"), "cIDER");
        assert_eq!(format_tag("  sparkling water "), "sparklingWater");
        assert_eq!(format_tag("#"), "");
    }

    #[test]
    fn submit_editing_selects_an_existing_tag_case_insensitively() {
        let (form, field) = field();
        field.search("red wine").expect("search");
        field.submit_editing().expect("submit editing");

        let selected = field.selected_tags().expect("selected");
        assert_eq!(selected, vec![SelectOption::new("redWine", "1")]);
        assert_eq!(field.query().expect("query"), "");
        assert_eq!(
            form.value_of("drinks").expect("value"),
            Some(FieldValue::List(selected))
        );
    }

    #[test]
    fn unknown_query_becomes_a_fresh_tag() {
        let (_, field) = field();
        field.search("mead").expect("search");
        field.submit_editing().expect("submit editing");
        assert_eq!(
            field.selected_tags().expect("selected"),
            vec![SelectOption::new("mead", "")]
        );
    }

    #[test]
    fn selected_tags_leave_the_available_list() {
        let (_, field) = field();
        field
            .add_tag(SelectOption::new("cider", "3"))
            .expect("add tag");

        let available = field.available_tags().expect("available");
        assert_eq!(
            available,
            vec![
                SelectOption::new("redWine", "1"),
                SelectOption::new("whiteWine", "2"),
            ]
        );

        field.search("Wine").expect("search");
        let available = field.available_tags().expect("available");
        assert_eq!(
            available,
            vec![
                SelectOption::new("redWine", "1"),
                SelectOption::new("whiteWine", "2"),
            ]
        );
    }

    #[test]
    fn remove_tag_restores_availability_and_reports() {
        let (form, field) = field();
        field
            .add_tag(SelectOption::new("cider", "3"))
            .expect("add tag");
        field.remove_tag("cider").expect("remove tag");

        assert!(field.selected_tags().expect("selected").is_empty());
        assert_eq!(field.available_tags().expect("available").len(), 3);
        assert_eq!(
            form.value_of("drinks").expect("value"),
            Some(FieldValue::List(Vec::new()))
        );
    }

    #[test]
    fn limit_caps_selection_and_duplicates_are_ignored() {
        let (_, field) = {
            let form = FormController::new(Dispatcher::new());
            let field = TagAdapter::new("drinks", form.clone())
                .catalog(catalog())
                .limit(1);
            field.mount().expect("mount field");
            (form, field)
        };

        field
            .add_tag(SelectOption::new("cider", "3"))
            .expect("add tag");
        field
            .add_tag(SelectOption::new("cider", "3"))
            .expect("duplicate add");
        field
            .add_tag(SelectOption::new("redWine", "1"))
            .expect("add over limit");

        assert_eq!(field.selected_tags().expect("selected").len(), 1);
    }

    #[test]
    fn tag_changes_invoke_the_update_listener() {
        let form = FormController::new(Dispatcher::new());
        let seen = Arc::new(Mutex::new(Vec::new()));
        let field = {
            let seen = seen.clone();
            TagAdapter::new("drinks", form)
                .catalog(catalog())
                .on_update(move |tags| {
                    seen.lock().expect("seen lock").push(tags.len());
                })
        };
        field.mount().expect("mount field");

        field
            .add_tag(SelectOption::new("cider", "3"))
            .expect("add tag");
        field.remove_tag("cider").expect("remove tag");
        assert_eq!(seen.lock().expect("seen lock").clone(), vec![1, 0]);
    }
}
