use crate::short_id::{OwnerId, ShortId};

/// A request to soft-delete some of one owner's URLs.
///
/// Lives only as long as it takes the deletion pipeline to fold it into a
/// store call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeleteTask {
    pub owner: OwnerId,
    pub short_ids: Vec<ShortId>,
}

impl DeleteTask {
    pub fn new(owner: OwnerId, short_ids: Vec<ShortId>) -> Self {
        Self { owner, short_ids }
    }
}
