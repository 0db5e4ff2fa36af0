//! Field links: references from a content type to a site or list field.

use super::collection::Collection;
use super::entity::Entity;
use super::EntityKind;
use crate::batch::Batch;
use crate::{Error, ErrorContext, Result};
use serde::{Deserialize, Serialize};

/// Entity kind of a field link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldLink;

/// Properties of a field link as sent to the service.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct FieldLinkProperties {
    pub field_internal_name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    pub hidden: bool,
    pub required: bool,
    pub read_only: bool,
    pub show_in_display_form: bool,
}

impl Default for FieldLinkProperties {
    fn default() -> Self {
        Self {
            field_internal_name: String::new(),
            display_name: None,
            hidden: false,
            required: false,
            read_only: false,
            show_in_display_form: true,
        }
    }
}

impl EntityKind for FieldLink {
    type Properties = FieldLinkProperties;

    const ENTITY_TYPE: &'static str = "SP.FieldLink";
    const COLLECTION_SEGMENT: &'static str = "FieldLinks";

    fn key(properties: &FieldLinkProperties) -> Option<&str> {
        Some(properties.field_internal_name.as_str()).filter(|s| !s.is_empty())
    }

    fn validate(properties: &FieldLinkProperties) -> Result<()> {
        if properties.field_internal_name.is_empty() {
            return Err(Error::invalid_argument(
                "field internal name must not be empty",
                ErrorContext::new()
                    .with_field_path("field_internal_name")
                    .with_source("field_link_collection"),
            ));
        }
        Ok(())
    }
}

/// Optional settings for a new field link.
///
/// Defaults: no display name, not hidden, not required, not read-only, shown
/// in the display form.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldLinkOptions {
    pub display_name: Option<String>,
    pub hidden: bool,
    pub required: bool,
    pub read_only: bool,
    pub show_in_display_form: bool,
}

impl Default for FieldLinkOptions {
    fn default() -> Self {
        Self {
            display_name: None,
            hidden: false,
            required: false,
            read_only: false,
            show_in_display_form: true,
        }
    }
}

impl FieldLinkOptions {
    pub fn new() -> Self {
        Self::default()
    }
    pub fn display_name(mut self, name: impl Into<String>) -> Self {
        self.display_name = Some(name.into());
        self
    }
    pub fn hidden(mut self, hidden: bool) -> Self {
        self.hidden = hidden;
        self
    }
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }
    pub fn read_only(mut self, read_only: bool) -> Self {
        self.read_only = read_only;
        self
    }
    pub fn show_in_display_form(mut self, show: bool) -> Self {
        self.show_in_display_form = show;
        self
    }

    fn into_properties(self, field_internal_name: String) -> FieldLinkProperties {
        FieldLinkProperties {
            field_internal_name,
            display_name: self.display_name,
            hidden: self.hidden,
            required: self.required,
            read_only: self.read_only,
            show_in_display_form: self.show_in_display_form,
        }
    }
}

/// Field links of one content type.
pub type FieldLinkCollection = Collection<FieldLink>;

impl Collection<FieldLink> {
    /// Add a field link and wait until the service has created it.
    ///
    /// ```rust,no_run
    /// # async fn demo(ct: &sp_model::model::ContentType) -> sp_model::Result<()> {
    /// use sp_model::model::FieldLinkOptions;
    ///
    /// let link = ct
    ///     .field_links()
    ///     .add("Status", FieldLinkOptions::new().required(true))
    ///     .await?;
    /// assert!(link.is_committed());
    /// # Ok(())
    /// # }
    /// ```
    pub async fn add(
        &self,
        field_internal_name: impl Into<String>,
        options: FieldLinkOptions,
    ) -> Result<Entity<FieldLink>> {
        self.add_new(options.into_properties(field_internal_name.into()))
            .await
    }

    /// Queue a field link into `batch`. The link stays `Pending` until the
    /// caller executes the batch.
    pub fn add_batch(
        &self,
        batch: &Batch,
        field_internal_name: impl Into<String>,
        options: FieldLinkOptions,
    ) -> Result<Entity<FieldLink>> {
        self.enqueue_new(batch, options.into_properties(field_internal_name.into()))
    }

    /// Queue a field link into the context's current batch.
    pub fn add_batch_current(
        &self,
        field_internal_name: impl Into<String>,
        options: FieldLinkOptions,
    ) -> Result<Entity<FieldLink>> {
        self.enqueue_new_current(options.into_properties(field_internal_name.into()))
    }
}

impl Entity<FieldLink> {
    pub fn field_internal_name(&self) -> String {
        self.with_properties(|p| p.field_internal_name.clone())
    }
    pub fn display_name(&self) -> Option<String> {
        self.with_properties(|p| p.display_name.clone())
    }
    pub fn hidden(&self) -> bool {
        self.with_properties(|p| p.hidden)
    }
    pub fn required(&self) -> bool {
        self.with_properties(|p| p.required)
    }
    pub fn read_only(&self) -> bool {
        self.with_properties(|p| p.read_only)
    }
    pub fn show_in_display_form(&self) -> bool {
        self.with_properties(|p| p.show_in_display_form)
    }

    /// Set the internal name. Once set to a non-empty value it cannot change.
    pub fn set_field_internal_name(&self, name: impl Into<String>) -> Result<()> {
        let name = name.into();
        self.update(|p| {
            if !p.field_internal_name.is_empty() && p.field_internal_name != name {
                return Err(Error::invalid_state(
                    "field internal name is immutable once set",
                    ErrorContext::new()
                        .with_field_path("field_internal_name")
                        .with_details(format!("current value '{}'", p.field_internal_name))
                        .with_source("field_link"),
                ));
            }
            p.field_internal_name = name;
            Ok(())
        })?
    }
    pub fn set_display_name(&self, name: Option<String>) -> Result<()> {
        self.update(|p| p.display_name = name)
    }
    pub fn set_hidden(&self, hidden: bool) -> Result<()> {
        self.update(|p| p.hidden = hidden)
    }
    pub fn set_required(&self, required: bool) -> Result<()> {
        self.update(|p| p.required = required)
    }
    pub fn set_read_only(&self, read_only: bool) -> Result<()> {
        self.update(|p| p.read_only = read_only)
    }
    pub fn set_show_in_display_form(&self, show: bool) -> Result<()> {
        self.update(|p| p.show_in_display_form = show)
    }
}
