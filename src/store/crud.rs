use async_trait::async_trait;

use super::StoreError;

/// Basic persistence operations over entity `T` identified by `I`.
#[async_trait]
pub trait Crud<T, I>: Send + Sync
where
  T: Send + 'static,
  I: Send + 'static,
{
  /// Persist a new entity and return the identifier the store assigned.
  async fn create(&self, item: T) -> Result<I, StoreError>;

  async fn read_one(&self, id: I) -> Result<T, StoreError>;

  /// Listing of all entities. Implementations may return a projection.
  async fn read_many(&self) -> Result<Vec<T>, StoreError>;

  /// Replace the stored entity matching the identifier embedded in `item`.
  async fn update(&self, item: T) -> Result<(), StoreError>;

  /// Remove by identifier. Removing an absent entity is not an error; the
  /// number of entities actually removed is returned.
  async fn delete(&self, id: I) -> Result<u64, StoreError>;
}
