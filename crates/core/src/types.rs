/// All server-side primary keys are 64-bit integers.
pub type DbId = i64;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// The user acting through this client instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: DbId,
    pub role: crate::roles::ActorRole,
}

impl Actor {
    pub fn student(user_id: DbId) -> Self {
        Self {
            user_id,
            role: crate::roles::ActorRole::Student,
        }
    }

    pub fn mentor(user_id: DbId) -> Self {
        Self {
            user_id,
            role: crate::roles::ActorRole::Mentor,
        }
    }
}
