use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Schedulable resource. Master data owned by the administrative
/// collaborator; the scheduling core only references it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Doctor {
    pub id: Uuid,
    pub name: String,
    pub facility_id: Uuid,
    pub department: String,
}
