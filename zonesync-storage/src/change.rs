use zonesync_model::LocalObject;

/// A change notification for one record type.
#[derive(Debug, Clone, PartialEq)]
pub enum CollectionChange {
    /// Delivered once on subscription with the current contents.
    Initial(Vec<LocalObject>),
    /// Delivered after each committed write that touched the record type.
    ///
    /// `deletions` index into the collection as it was before the write;
    /// `insertions` and `modifications` index into `results`.
    Update {
        results: Vec<LocalObject>,
        deletions: Vec<usize>,
        insertions: Vec<usize>,
        modifications: Vec<usize>,
    },
}

impl CollectionChange {
    /// The collection contents carried by this notification.
    pub fn results(&self) -> &[LocalObject] {
        match self {
            Self::Initial(results) | Self::Update { results, .. } => results,
        }
    }
}
