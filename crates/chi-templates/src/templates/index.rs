use std::collections::HashMap;

/// Name to template lookup for one template category.
///
/// An index is derived from, but never synchronized with, the sequence of templates in a
/// [`TemplateCollection`](super::TemplateCollection). Merging into the collection leaves the
/// index untouched; callers that need lookups to reflect a merge have to repopulate it, for
/// example with [`TemplateCollection::reindex`](super::TemplateCollection::reindex).
///
/// Entries are owned copies: [`TemplateIndex::get`] returns the template as it was when
/// [`TemplateIndex::set`] was called, later edits to the collection are not visible through it.
///
/// The [`Default`] index is *uninitialized*: it never contains anything and [`TemplateIndex::set`]
/// is a no-op. [`TemplateIndex::new`] (or ensuring the index on its collection) creates an
/// initialized, empty index.
#[derive(Clone, Debug)]
pub struct TemplateIndex<T> {
    templates: Option<HashMap<String, T>>,
}

impl<T> Default for TemplateIndex<T> {
    fn default() -> Self {
        Self { templates: None }
    }
}

impl<T> TemplateIndex<T> {
    pub fn new() -> Self {
        Self {
            templates: Some(HashMap::new()),
        }
    }

    pub fn is_initialized(&self) -> bool {
        self.templates.is_some()
    }

    pub fn has(&self, name: &str) -> bool {
        self.templates
            .as_ref()
            .is_some_and(|templates| templates.contains_key(name))
    }

    pub fn get(&self, name: &str) -> Option<&T> {
        self.templates.as_ref()?.get(name)
    }

    /// Inserts or replaces the entry for `name`. Does nothing if the index is uninitialized.
    pub fn set(&mut self, name: impl Into<String>, template: T) {
        if let Some(templates) = &mut self.templates {
            templates.insert(name.into(), template);
        }
    }

    /// Calls `f` once for every indexed template, in no particular order
    pub fn walk(&self, mut f: impl FnMut(&T)) {
        for template in self.templates.iter().flat_map(HashMap::values) {
            f(template);
        }
    }

    pub fn len(&self) -> usize {
        self.templates.as_ref().map_or(0, HashMap::len)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
