pub mod line;

/// Check if a sender is allowed based on the allow list.
pub fn is_allowed(sender_id: &str, allow_from: &[String]) -> bool {
    if allow_from.is_empty() {
        return true;
    }
    allow_from.iter().any(|id| id == sender_id)
}
