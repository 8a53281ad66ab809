pub mod random;
pub mod seq;

use warren_core::ShortId;

/// Trait for generating short ids.
///
/// Implementations are pure generators that don't interact with storage.
/// A generated id that happens to be taken surfaces from the store as
/// `DuplicateShortId`; nothing retries it.
pub trait Generator: Send + Sync + 'static {
    fn generate(&self) -> ShortId;
}

impl<G: Generator + ?Sized> Generator for Box<G> {
    fn generate(&self) -> ShortId {
        self.as_ref().generate()
    }
}
