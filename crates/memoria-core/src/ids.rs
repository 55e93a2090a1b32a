use uuid::Uuid;

/// Time-sortable id for new rows (profiles, events, jobs, ...).
pub fn new_id() -> String {
    Uuid::now_v7().to_string()
}
