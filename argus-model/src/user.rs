//! Notification recipients.

use serde::{Deserialize, Serialize};

/// A user eligible to receive violation notifications for the cameras
/// mapped to them through `user_cctv_map`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub id: i32,
    pub username: String,
    pub full_name: String,
    pub email: String,
}
