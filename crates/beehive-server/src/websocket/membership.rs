//! Group membership notifications.
//!
//! The transport calls these after a connection actually enters or leaves a
//! broadcast group; repeated joins of the same group do not notify twice.

use async_trait::async_trait;

/// Receiver of group join/leave notifications from the transport.
#[async_trait]
pub trait MembershipObserver: Send + Sync {
    /// `member_id` was added to `group_id`.
    async fn member_joined(&self, group_id: &str, member_id: &str);

    /// `member_id` was removed from `group_id`.
    async fn member_left(&self, group_id: &str, member_id: &str);
}
