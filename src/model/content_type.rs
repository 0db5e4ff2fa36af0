use super::field_link::FieldLinkCollection;
use super::ParentRef;
use crate::context::ClientContext;

/// A content type; owns its field-link collection.
#[derive(Debug)]
pub struct ContentType {
    id: String,
    field_links: FieldLinkCollection,
}

impl ContentType {
    /// Site content type (`_api/web/contenttypes('<id>')`).
    pub fn new(context: ClientContext, id: impl Into<String>) -> Self {
        let id = id.into();
        let path = format!("_api/web/contenttypes('{}')", id);
        Self::at(context, id, path)
    }

    /// Content type attached to a list (`_api/web/lists(guid'<list>')/contenttypes('<id>')`).
    pub fn in_list(context: ClientContext, list_id: &str, id: impl Into<String>) -> Self {
        let id = id.into();
        let path = format!("_api/web/lists(guid'{}')/contenttypes('{}')", list_id, id);
        Self::at(context, id, path)
    }

    fn at(context: ClientContext, id: String, path: String) -> Self {
        let parent = ParentRef::new("SP.ContentType", path);
        Self {
            id,
            field_links: FieldLinkCollection::new(parent, context),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn path(&self) -> &str {
        &self.field_links.parent().path
    }

    pub fn field_links(&self) -> &FieldLinkCollection {
        &self.field_links
    }
}
