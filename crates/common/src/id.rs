use uuid::Uuid;

/// Random id for records created by this workspace. Hyphen-free so ids stay
/// double-click selectable in logs and dashboards.
pub fn generate() -> String {
    Uuid::new_v4().simple().to_string()
}
