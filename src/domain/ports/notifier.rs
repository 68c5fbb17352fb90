//! Change notification port.

use crate::domain::models::GraphUpdate;

/// Fire-and-forget publication of node changes.
///
/// Implementations must not block and must not fail the caller.
pub trait ChangeNotifier: Send + Sync {
    fn publish(&self, update: GraphUpdate);
}
