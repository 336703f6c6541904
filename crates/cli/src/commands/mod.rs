pub mod chats;
pub mod feedback;
pub mod fetch;
pub mod search;

use periscope_core::message::UserId;

/// The acting user for CLI storage operations.
pub fn local_user() -> UserId {
    match std::env::var("PERISCOPE_USER_ID") {
        Ok(id) if !id.is_empty() => UserId(id),
        _ => UserId::from("local"),
    }
}
