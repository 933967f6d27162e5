//! Project lookup over the shared database
//!
//! The read path only needs owner+name resolution and the size figure for
//! the eligibility gate. Keeping the table current (GitHub sync) is an
//! external concern.

use sqlx::SqlitePool;

use karat_common::Result;

/// One project row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    pub owner: String,
    pub name: String,
    pub size: i64,
}

#[derive(Clone)]
pub struct ProjectStore {
    pool: SqlitePool,
}

impl ProjectStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub async fn find(&self, owner: &str, name: &str) -> Result<Option<Project>> {
        let row: Option<(String, String, i64)> = sqlx::query_as(
            "SELECT owner, name, size FROM projects WHERE owner = ? AND name = ?",
        )
        .bind(owner)
        .bind(name)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(owner, name, size)| Project { owner, name, size }))
    }

    pub async fn upsert(&self, project: &Project) -> Result<()> {
        sqlx::query(
            "INSERT INTO projects (owner, name, size) VALUES (?, ?, ?)
             ON CONFLICT(owner, name) DO UPDATE SET size = excluded.size",
        )
        .bind(&project.owner)
        .bind(&project.name)
        .bind(project.size)
        .execute(&self.pool)
        .await?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use karat_common::db;

    #[tokio::test]
    async fn find_absent_project_returns_none() {
        let pool = db::connect_memory().await.unwrap();
        db::init_schema(&pool).await.unwrap();
        let store = ProjectStore::new(pool);

        assert_eq!(store.find("nobody", "nothing").await.unwrap(), None);
    }

    #[tokio::test]
    async fn upsert_then_find() {
        let pool = db::connect_memory().await.unwrap();
        db::init_schema(&pool).await.unwrap();
        let store = ProjectStore::new(pool);

        let project = Project {
            owner: "octocat".to_string(),
            name: "hello".to_string(),
            size: 1234,
        };
        store.upsert(&project).await.unwrap();
        assert_eq!(store.find("octocat", "hello").await.unwrap(), Some(project));

        let updated = Project {
            owner: "octocat".to_string(),
            name: "hello".to_string(),
            size: 9999,
        };
        store.upsert(&updated).await.unwrap();
        assert_eq!(
            store.find("octocat", "hello").await.unwrap().unwrap().size,
            9999
        );
    }
}
