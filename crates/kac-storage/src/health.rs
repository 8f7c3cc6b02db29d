//! Storage health check

use opendal::Operator;

/// Verify the storage backend is reachable by listing the root
pub async fn check_health(op: &Operator) -> opendal::Result<()> {
    // A root listing is the lightest call every service supports
    op.list("/").await.map(|_| ())
}
