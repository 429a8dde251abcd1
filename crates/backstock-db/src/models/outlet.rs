//! Outlet directory model.
//!
//! Outlets are matched by exact canonical name first, then by alias. All
//! matching happens on the uppercased, whitespace-normalized form.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgExecutor};
use uuid::Uuid;

use backstock_core::text::normalize_name;

/// A retail outlet.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Outlet {
    /// Unique identifier.
    pub id: Uuid,
    /// Canonical (uppercased) outlet name.
    pub outlet_name: String,
    /// City, if known.
    pub city: Option<String>,
    /// State, if known.
    pub state: Option<String>,
    /// Whether the outlet is operating.
    pub is_active: bool,
    /// When the row was created.
    pub created_at: DateTime<Utc>,
    /// When the row was last updated.
    pub updated_at: DateTime<Utc>,
}

/// An alternative spelling that resolves to an outlet.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct OutletAlias {
    /// Unique identifier.
    pub id: Uuid,
    /// The outlet this alias resolves to.
    pub outlet_id: Uuid,
    /// Canonical (uppercased) alias text.
    pub alias_name: String,
    /// When the alias was created.
    pub created_at: DateTime<Utc>,
}

/// Input for creating an outlet.
#[derive(Debug, Clone)]
pub struct NewOutlet {
    pub outlet_name: String,
    pub city: Option<String>,
    pub state: Option<String>,
}

impl Outlet {
    /// Create a new outlet. The name is stored in canonical form.
    pub async fn create<'e, E>(executor: E, input: NewOutlet) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            INSERT INTO outlets (outlet_name, city, state)
            VALUES ($1, $2, $3)
            RETURNING id, outlet_name, city, state, is_active, created_at, updated_at
            ",
        )
        .bind(normalize_name(&input.outlet_name))
        .bind(input.city)
        .bind(input.state)
        .fetch_one(executor)
        .await
    }

    /// Get an outlet by ID.
    pub async fn get<'e, E>(executor: E, id: Uuid) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            SELECT id, outlet_name, city, state, is_active, created_at, updated_at
            FROM outlets
            WHERE id = $1
            ",
        )
        .bind(id)
        .fetch_optional(executor)
        .await
    }

    /// Find an outlet by exact canonical name.
    pub async fn find_by_name<'e, E>(executor: E, name: &str) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            SELECT id, outlet_name, city, state, is_active, created_at, updated_at
            FROM outlets
            WHERE upper(outlet_name) = $1
            ",
        )
        .bind(normalize_name(name))
        .fetch_optional(executor)
        .await
    }

    /// Find an outlet through an alias.
    pub async fn find_by_alias<'e, E>(executor: E, name: &str) -> Result<Option<Self>, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            SELECT o.id, o.outlet_name, o.city, o.state, o.is_active, o.created_at, o.updated_at
            FROM outlets o
            JOIN outlet_aliases a ON a.outlet_id = o.id
            WHERE upper(a.alias_name) = $1
            ",
        )
        .bind(normalize_name(name))
        .fetch_optional(executor)
        .await
    }

    /// Resolve a free-text outlet name: exact canonical match first, then alias.
    pub async fn resolve(pool: &sqlx::PgPool, name: &str) -> Result<Option<Self>, sqlx::Error> {
        if let Some(outlet) = Self::find_by_name(pool, name).await? {
            return Ok(Some(outlet));
        }
        Self::find_by_alias(pool, name).await
    }
}

impl OutletAlias {
    /// Attach an alias to an outlet.
    pub async fn create<'e, E>(
        executor: E,
        outlet_id: Uuid,
        alias_name: &str,
    ) -> Result<Self, sqlx::Error>
    where
        E: PgExecutor<'e>,
    {
        sqlx::query_as::<_, Self>(
            r"
            INSERT INTO outlet_aliases (outlet_id, alias_name)
            VALUES ($1, $2)
            RETURNING id, outlet_id, alias_name, created_at
            ",
        )
        .bind(outlet_id)
        .bind(normalize_name(alias_name))
        .fetch_one(executor)
        .await
    }
}
