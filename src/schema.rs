//! Content type, taxonomy and embed-tag registration.
//!
//! Definitions are plain data; [`Registry`] collects them once at startup
//! (see [`crate::site::Site::init`]).
use serde::Serialize;
use std::collections::BTreeMap;
use thiserror::Error;

pub const FAQ_TYPE: &str = "faq";
pub const FAQ_CATEGORY_TAXONOMY: &str = "faq_category";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RegistryError {
    #[error("content type {0:?} is already registered")]
    DuplicateContentType(String),
    #[error("taxonomy {0:?} is already registered")]
    DuplicateTaxonomy(String),
    #[error("embed tag {0:?} is already registered")]
    DuplicateEmbed(String),
    #[error("taxonomy {taxonomy:?} refers to unknown content type {content_type:?}")]
    UnknownContentType {
        taxonomy: String,
        content_type: String,
    },
    #[error("asset {0:?} is already enqueued")]
    DuplicateAsset(String),
    #[error("asset {asset:?} depends on unknown asset {dependency:?}")]
    UnknownDependency { asset: String, dependency: String },
    #[error("asset dependency cycle through {0:?}")]
    DependencyCycle(String),
}

/// Admin-facing strings for a content type or taxonomy.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Labels {
    pub name: &'static str,
    pub singular_name: &'static str,
    pub add_new_item: &'static str,
    pub edit_item: &'static str,
    pub search_items: &'static str,
    pub all_items: &'static str,
    pub not_found: &'static str,
    pub menu_name: &'static str,
    /// Entries specific to one kind of schema, e.g. `not_found_in_trash`.
    pub extra: BTreeMap<&'static str, &'static str>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Supports {
    Title,
    Editor,
    PageAttributes,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ContentTypeSchema {
    pub name: &'static str,
    pub labels: Labels,
    pub public: bool,
    pub hierarchical: bool,
    pub show_in_rest: bool,
    pub supports: Vec<Supports>,
    pub menu_icon: &'static str,
    pub taxonomies: Vec<&'static str>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TaxonomySchema {
    pub name: &'static str,
    pub object_type: &'static str,
    pub labels: Labels,
    pub hierarchical: bool,
    pub show_ui: bool,
    pub show_admin_column: bool,
    pub show_in_rest: bool,
    pub rewrite_slug: &'static str,
}

/// The FAQ content type: title, body and a user-editable order.
pub fn faq_content_type() -> ContentTypeSchema {
    ContentTypeSchema {
        name: FAQ_TYPE,
        labels: Labels {
            name: "FAQs",
            singular_name: "FAQ",
            add_new_item: "Add New FAQ",
            edit_item: "Edit FAQ",
            search_items: "Search FAQs",
            all_items: "All FAQs",
            not_found: "No FAQs found",
            menu_name: "FAQs",
            extra: BTreeMap::from([
                ("add_new", "Add New FAQ"),
                ("new_item", "New FAQ"),
                ("view_item", "View FAQ"),
                ("not_found_in_trash", "No FAQs found in Trash"),
            ]),
        },
        public: true,
        hierarchical: false,
        show_in_rest: true,
        supports: vec![Supports::Title, Supports::Editor, Supports::PageAttributes],
        menu_icon: "dashicons-editor-help",
        taxonomies: vec![FAQ_CATEGORY_TAXONOMY],
    }
}

/// Hierarchical FAQ categories.
pub fn faq_category_taxonomy() -> TaxonomySchema {
    TaxonomySchema {
        name: FAQ_CATEGORY_TAXONOMY,
        object_type: FAQ_TYPE,
        labels: Labels {
            name: "FAQ Categories",
            singular_name: "FAQ Category",
            add_new_item: "Add New FAQ Category",
            edit_item: "Edit FAQ Category",
            search_items: "Search FAQ Categories",
            all_items: "All FAQ Categories",
            not_found: "No FAQ Categories found",
            menu_name: "Categories",
            extra: BTreeMap::from([
                ("parent_item", "Parent FAQ Category"),
                ("parent_item_colon", "Parent FAQ Category:"),
                ("update_item", "Update FAQ Category"),
                ("new_item_name", "New FAQ Category Name"),
            ]),
        },
        hierarchical: true,
        show_ui: true,
        show_admin_column: true,
        show_in_rest: true,
        rewrite_slug: "faq-category",
    }
}

/// Schemas and embed tags known to the site.
#[derive(Debug, Default, Clone)]
pub struct Registry {
    content_types: BTreeMap<&'static str, ContentTypeSchema>,
    taxonomies: BTreeMap<&'static str, TaxonomySchema>,
    embeds: Vec<&'static str>,
}

impl Registry {
    pub fn register_content_type(
        &mut self,
        schema: ContentTypeSchema,
    ) -> Result<(), RegistryError> {
        if self.content_types.contains_key(schema.name) {
            return Err(RegistryError::DuplicateContentType(schema.name.to_string()));
        }
        self.content_types.insert(schema.name, schema);
        Ok(())
    }

    /// Register a taxonomy. Its content type must already be registered.
    pub fn register_taxonomy(&mut self, schema: TaxonomySchema) -> Result<(), RegistryError> {
        if self.taxonomies.contains_key(schema.name) {
            return Err(RegistryError::DuplicateTaxonomy(schema.name.to_string()));
        }
        if !self.content_types.contains_key(schema.object_type) {
            return Err(RegistryError::UnknownContentType {
                taxonomy: schema.name.to_string(),
                content_type: schema.object_type.to_string(),
            });
        }
        self.taxonomies.insert(schema.name, schema);
        Ok(())
    }

    pub fn register_embed(&mut self, tag: &'static str) -> Result<(), RegistryError> {
        if self.embeds.contains(&tag) {
            return Err(RegistryError::DuplicateEmbed(tag.to_string()));
        }
        self.embeds.push(tag);
        Ok(())
    }

    pub fn content_type(&self, name: &str) -> Option<&ContentTypeSchema> {
        self.content_types.get(name)
    }

    pub fn taxonomy(&self, name: &str) -> Option<&TaxonomySchema> {
        self.taxonomies.get(name)
    }

    pub fn embeds(&self) -> &[&'static str] {
        &self.embeds
    }
}
