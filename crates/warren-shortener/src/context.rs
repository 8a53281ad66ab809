use crate::error::Result;
use warren_core::OwnerId;

/// Per-request facts the service needs, passed explicitly to every call.
///
/// Identity is established by whatever sits in front of the service; by
/// the time a context exists the owner is trusted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestContext {
    owner: OwnerId,
}

impl RequestContext {
    pub fn new(owner: OwnerId) -> Self {
        Self { owner }
    }

    /// Builds a context from a raw owner string, rejecting an empty one.
    pub fn for_owner(owner: impl Into<String>) -> Result<Self> {
        Ok(Self::new(OwnerId::new(owner)?))
    }

    pub fn owner(&self) -> &OwnerId {
        &self.owner
    }
}
