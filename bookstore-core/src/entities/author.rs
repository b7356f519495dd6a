use serde::{Deserialize, Serialize};

/// A book author. Names are unique; writes go through the upsert in the
/// store so two books naming the same author share one row.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Author {
    pub id: i64,
    pub name: String,
}
