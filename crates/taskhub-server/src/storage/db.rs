//! SQLite database layer (embedded, no external dependencies)
//!
//! The relational repository behind the cache-aside layer. Every write
//! commits before returning; the cache is invalidated by the service layer
//! afterwards.

use std::str::FromStr;
use std::sync::Arc;

use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use taskhub_core::{
    NewProject, Project, ProjectPatch, ProjectStatus, Result, TaskhubError, User, UserPatch,
};

fn db(e: sqlx::Error) -> TaskhubError {
    TaskhubError::database(e)
}

pub struct Database {
    pool: Arc<SqlitePool>,
}

impl Database {
    pub async fn open(database_path: &str) -> Result<Self> {
        tracing::info!("Opening SQLite database at: {}", database_path);

        if let Some(parent) = std::path::Path::new(database_path).parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(TaskhubError::database)?;
        }

        let options = SqliteConnectOptions::new()
            .filename(database_path)
            .create_if_missing(true)
            .journal_mode(sqlx::sqlite::SqliteJournalMode::Wal)
            .synchronous(sqlx::sqlite::SqliteSynchronous::Normal)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(5)
            .connect_with(options)
            .await
            .map_err(db)?;

        Self::run_migrations(&pool).await?;

        tracing::info!("Database initialization complete");

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Private in-memory database, used by tests. A single connection keeps
    /// the whole pool on one SQLite memory instance.
    pub async fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")
            .map_err(db)?
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .map_err(db)?;

        Self::run_migrations(&pool).await?;

        Ok(Self {
            pool: Arc::new(pool),
        })
    }

    /// Liveness probe, returns the engine version string.
    pub async fn ping(&self) -> Result<String> {
        sqlx::query_scalar("SELECT sqlite_version()")
            .fetch_one(&*self.pool)
            .await
            .map_err(db)
    }

    async fn run_migrations(pool: &SqlitePool) -> Result<()> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS users (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                username TEXT UNIQUE NOT NULL,
                email TEXT UNIQUE NOT NULL,
                password_hash TEXT NOT NULL,
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
        )
        .execute(pool)
        .await
        .map_err(db)?;

        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS projects (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT UNIQUE NOT NULL,
                status TEXT NOT NULL DEFAULT 'NEW',
                create_time DATETIME DEFAULT CURRENT_TIMESTAMP,
                start_time DATETIME,
                end_time DATETIME,
                description TEXT,
                person_in_charge INTEGER NOT NULL
                    REFERENCES users (id) ON DELETE CASCADE
            )
            "#,
        )
        .execute(pool)
        .await
        .map_err(db)?;

        Ok(())
    }

    // User operations

    pub async fn create_user(
        &self,
        username: &str,
        email: &str,
        password_hash: &str,
    ) -> Result<User> {
        let result = sqlx::query(
            r#"
            INSERT INTO users (username, email, password_hash)
            VALUES (?1, ?2, ?3)
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(password_hash)
        .execute(&*self.pool)
        .await
        .map_err(db)?;

        let id = result.last_insert_rowid();
        self.get_user_by_id(id)
            .await?
            .ok_or_else(|| TaskhubError::database("inserted user row not readable"))
    }

    pub async fn get_user_by_id(&self, id: i64) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, username, email, created_at FROM users WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(db)?;

        match row {
            Some(row) => {
                let projects = self.list_projects_by_user(row.id).await?;
                Ok(Some(row.into_user(projects)))
            }
            None => Ok(None),
        }
    }

    /// Bulk lookup by id. Ids with no matching row are simply absent from
    /// the result; order follows ascending id, not the input.
    pub async fn list_users_by_ids(&self, ids: &[i64]) -> Result<Vec<User>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");

        let sql = format!(
            "SELECT id, username, email, created_at FROM users \
             WHERE id IN ({placeholders}) ORDER BY id"
        );
        let mut query = sqlx::query_as::<_, UserRow>(&sql);
        for id in ids {
            query = query.bind(*id);
        }
        let rows = query.fetch_all(&*self.pool).await.map_err(db)?;

        let sql = format!(
            "SELECT id, name, status, create_time, start_time, end_time, \
                    description, person_in_charge \
             FROM projects WHERE person_in_charge IN ({placeholders}) ORDER BY id"
        );
        let mut query = sqlx::query_as::<_, ProjectRow>(&sql);
        for id in ids {
            query = query.bind(*id);
        }
        let mut by_owner = std::collections::HashMap::<i64, Vec<Project>>::new();
        for row in query.fetch_all(&*self.pool).await.map_err(db)? {
            let project: Project = row.into();
            by_owner
                .entry(project.person_in_charge)
                .or_default()
                .push(project);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let projects = by_owner.remove(&row.id).unwrap_or_default();
                row.into_user(projects)
            })
            .collect())
    }

    pub async fn list_users(&self) -> Result<Vec<User>> {
        let rows: Vec<UserRow> = sqlx::query_as(
            r#"
            SELECT id, username, email, created_at FROM users ORDER BY id
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(db)?;

        // One aggregate query instead of a lookup per user
        let mut by_owner = std::collections::HashMap::<i64, Vec<Project>>::new();
        for project in self.list_projects().await? {
            by_owner
                .entry(project.person_in_charge)
                .or_default()
                .push(project);
        }

        Ok(rows
            .into_iter()
            .map(|row| {
                let projects = by_owner.remove(&row.id).unwrap_or_default();
                row.into_user(projects)
            })
            .collect())
    }

    pub async fn get_user_by_username(&self, username: &str) -> Result<Option<User>> {
        let row: Option<UserRow> = sqlx::query_as(
            r#"
            SELECT id, username, email, created_at FROM users WHERE username = ?1
            "#,
        )
        .bind(username)
        .fetch_optional(&*self.pool)
        .await
        .map_err(db)?;

        match row {
            Some(row) => {
                let projects = self.list_projects_by_user(row.id).await?;
                Ok(Some(row.into_user(projects)))
            }
            None => Ok(None),
        }
    }

    /// Credentials lookup for login: `(user_id, password_hash)`.
    pub async fn get_user_credentials(&self, username: &str) -> Result<Option<(i64, String)>> {
        sqlx::query_as(
            r#"
            SELECT id, password_hash FROM users WHERE username = ?1
            "#,
        )
        .bind(username)
        .fetch_optional(&*self.pool)
        .await
        .map_err(db)
    }

    pub async fn user_id_by_username(&self, username: &str) -> Result<Option<i64>> {
        sqlx::query_scalar(
            r#"
            SELECT id FROM users WHERE username = ?1
            "#,
        )
        .bind(username)
        .fetch_optional(&*self.pool)
        .await
        .map_err(db)
    }

    pub async fn user_id_by_email(&self, email: &str) -> Result<Option<i64>> {
        sqlx::query_scalar(
            r#"
            SELECT id FROM users WHERE email = ?1
            "#,
        )
        .bind(email)
        .fetch_optional(&*self.pool)
        .await
        .map_err(db)
    }

    pub async fn update_user(&self, id: i64, patch: &UserPatch) -> Result<Option<User>> {
        let Some(current) = self.get_user_by_id(id).await? else {
            return Ok(None);
        };

        let username = patch.username.as_deref().unwrap_or(&current.username);
        let email = patch.email.as_deref().unwrap_or(&current.email);

        sqlx::query(
            r#"
            UPDATE users SET username = ?1, email = ?2 WHERE id = ?3
            "#,
        )
        .bind(username)
        .bind(email)
        .bind(id)
        .execute(&*self.pool)
        .await
        .map_err(db)?;

        self.get_user_by_id(id).await
    }

    /// Deletes a user, cascading to its projects. Returns the deleted
    /// snapshot, or `None` if the id did not exist.
    pub async fn delete_user(&self, id: i64) -> Result<Option<User>> {
        let Some(user) = self.get_user_by_id(id).await? else {
            return Ok(None);
        };

        sqlx::query(
            r#"
            DELETE FROM users WHERE id = ?1
            "#,
        )
        .bind(id)
        .execute(&*self.pool)
        .await
        .map_err(db)?;

        Ok(Some(user))
    }

    /// Inserts the whole batch in one transaction; a failed row rolls every
    /// row back, so either all users exist afterwards or none do.
    pub async fn create_users(&self, batch: &[NewUserRecord]) -> Result<Vec<User>> {
        let mut tx = self.pool.begin().await.map_err(db)?;
        let mut ids = Vec::with_capacity(batch.len());

        for record in batch {
            let result = sqlx::query(
                r#"
                INSERT INTO users (username, email, password_hash)
                VALUES (?1, ?2, ?3)
                "#,
            )
            .bind(&record.username)
            .bind(&record.email)
            .bind(&record.password_hash)
            .execute(&mut *tx)
            .await
            .map_err(db)?;
            ids.push(result.last_insert_rowid());
        }

        tx.commit().await.map_err(db)?;
        self.list_users_by_ids(&ids).await
    }

    pub async fn count_users(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM users")
            .fetch_one(&*self.pool)
            .await
            .map_err(db)
    }

    // Project operations

    pub async fn create_project(&self, project: &NewProject) -> Result<Project> {
        let result = sqlx::query(
            r#"
            INSERT INTO projects (name, status, start_time, end_time, description, person_in_charge)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            "#,
        )
        .bind(&project.name)
        .bind(project.status.as_str())
        .bind(project.start_time)
        .bind(project.end_time)
        .bind(&project.description)
        .bind(project.person_in_charge)
        .execute(&*self.pool)
        .await
        .map_err(db)?;

        let id = result.last_insert_rowid();
        self.get_project(id)
            .await?
            .ok_or_else(|| TaskhubError::database("inserted project row not readable"))
    }

    pub async fn get_project(&self, id: i64) -> Result<Option<Project>> {
        let row: Option<ProjectRow> = sqlx::query_as(
            r#"
            SELECT id, name, status, create_time, start_time, end_time,
                   description, person_in_charge
            FROM projects WHERE id = ?1
            "#,
        )
        .bind(id)
        .fetch_optional(&*self.pool)
        .await
        .map_err(db)?;

        Ok(row.map(|r| r.into()))
    }

    pub async fn list_projects(&self) -> Result<Vec<Project>> {
        let rows: Vec<ProjectRow> = sqlx::query_as(
            r#"
            SELECT id, name, status, create_time, start_time, end_time,
                   description, person_in_charge
            FROM projects ORDER BY id
            "#,
        )
        .fetch_all(&*self.pool)
        .await
        .map_err(db)?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    /// Transactional bulk insert, same all-or-nothing contract as
    /// [`Database::create_users`].
    pub async fn create_projects(&self, batch: &[NewProject]) -> Result<Vec<Project>> {
        let mut tx = self.pool.begin().await.map_err(db)?;
        let mut ids = Vec::with_capacity(batch.len());

        for project in batch {
            let result = sqlx::query(
                r#"
                INSERT INTO projects (name, status, start_time, end_time, description, person_in_charge)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
            )
            .bind(&project.name)
            .bind(project.status.as_str())
            .bind(project.start_time)
            .bind(project.end_time)
            .bind(&project.description)
            .bind(project.person_in_charge)
            .execute(&mut *tx)
            .await
            .map_err(db)?;
            ids.push(result.last_insert_rowid());
        }

        tx.commit().await.map_err(db)?;
        self.list_projects_by_ids(&ids).await
    }

    pub async fn list_projects_by_ids(&self, ids: &[i64]) -> Result<Vec<Project>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let placeholders = vec!["?"; ids.len()].join(", ");
        let sql = format!(
            "SELECT id, name, status, create_time, start_time, end_time, \
                    description, person_in_charge \
             FROM projects WHERE id IN ({placeholders}) ORDER BY id"
        );
        let mut query = sqlx::query_as::<_, ProjectRow>(&sql);
        for id in ids {
            query = query.bind(*id);
        }
        let rows = query.fetch_all(&*self.pool).await.map_err(db)?;
        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    pub async fn list_projects_by_user(&self, user_id: i64) -> Result<Vec<Project>> {
        let rows: Vec<ProjectRow> = sqlx::query_as(
            r#"
            SELECT id, name, status, create_time, start_time, end_time,
                   description, person_in_charge
            FROM projects WHERE person_in_charge = ?1 ORDER BY id
            "#,
        )
        .bind(user_id)
        .fetch_all(&*self.pool)
        .await
        .map_err(db)?;

        Ok(rows.into_iter().map(|r| r.into()).collect())
    }

    pub async fn update_project(&self, id: i64, patch: &ProjectPatch) -> Result<Option<Project>> {
        let Some(current) = self.get_project(id).await? else {
            return Ok(None);
        };

        let name = patch.name.as_deref().unwrap_or(&current.name);
        let status = patch.status.unwrap_or(current.status);
        let start_time = patch.start_time.or(current.start_time);
        let end_time = patch.end_time.or(current.end_time);
        let description = patch.description.clone().or(current.description);

        sqlx::query(
            r#"
            UPDATE projects
            SET name = ?1, status = ?2, start_time = ?3, end_time = ?4, description = ?5
            WHERE id = ?6
            "#,
        )
        .bind(name)
        .bind(status.as_str())
        .bind(start_time)
        .bind(end_time)
        .bind(description)
        .bind(id)
        .execute(&*self.pool)
        .await
        .map_err(db)?;

        self.get_project(id).await
    }

    pub async fn delete_project(&self, id: i64) -> Result<Option<Project>> {
        let Some(project) = self.get_project(id).await? else {
            return Ok(None);
        };

        sqlx::query(
            r#"
            DELETE FROM projects WHERE id = ?1
            "#,
        )
        .bind(id)
        .execute(&*self.pool)
        .await
        .map_err(db)?;

        Ok(Some(project))
    }

    pub async fn count_projects(&self) -> Result<i64> {
        sqlx::query_scalar("SELECT COUNT(*) FROM projects")
            .fetch_one(&*self.pool)
            .await
            .map_err(db)
    }
}

/// One row of a bulk user insert, password already hashed.
#[derive(Debug)]
pub struct NewUserRecord {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

// Helper structs for sqlx query_as

#[derive(sqlx::FromRow)]
struct UserRow {
    id: i64,
    username: String,
    email: String,
    created_at: chrono::DateTime<chrono::Utc>,
}

impl UserRow {
    fn into_user(self, projects: Vec<Project>) -> User {
        User {
            id: self.id,
            username: self.username,
            email: self.email,
            created_at: self.created_at,
            projects,
        }
    }
}

#[derive(sqlx::FromRow)]
struct ProjectRow {
    id: i64,
    name: String,
    status: String,
    create_time: chrono::DateTime<chrono::Utc>,
    start_time: Option<chrono::DateTime<chrono::Utc>>,
    end_time: Option<chrono::DateTime<chrono::Utc>>,
    description: Option<String>,
    person_in_charge: i64,
}

impl From<ProjectRow> for Project {
    fn from(r: ProjectRow) -> Self {
        Project {
            id: r.id,
            name: r.name,
            status: ProjectStatus::parse(&r.status),
            create_time: r.create_time,
            start_time: r.start_time,
            end_time: r.end_time,
            description: r.description,
            person_in_charge: r.person_in_charge,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskhub_core::ProjectStatus;

    async fn seed_user(db: &Database, name: &str) -> User {
        db.create_user(name, &format!("{name}@example.com"), "hash")
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_user_crud() {
        let db = Database::open_in_memory().await.unwrap();

        let user = seed_user(&db, "alice").await;
        assert_eq!(user.username, "alice");
        assert!(user.projects.is_empty());

        let fetched = db.get_user_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(fetched, user);

        let patch = UserPatch {
            email: Some("new@example.com".to_string()),
            ..Default::default()
        };
        let updated = db.update_user(user.id, &patch).await.unwrap().unwrap();
        assert_eq!(updated.email, "new@example.com");
        assert_eq!(updated.username, "alice");

        let deleted = db.delete_user(user.id).await.unwrap().unwrap();
        assert_eq!(deleted.id, user.id);
        assert!(db.get_user_by_id(user.id).await.unwrap().is_none());
        assert!(db.delete_user(user.id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_user_embeds_projects() {
        let db = Database::open_in_memory().await.unwrap();
        let user = seed_user(&db, "bob").await;

        db.create_project(&NewProject {
            name: "apollo".to_string(),
            status: ProjectStatus::New,
            start_time: None,
            end_time: None,
            description: None,
            person_in_charge: user.id,
        })
        .await
        .unwrap();

        let fetched = db.get_user_by_id(user.id).await.unwrap().unwrap();
        assert_eq!(fetched.projects.len(), 1);
        assert_eq!(fetched.projects[0].name, "apollo");

        let all = db.list_users().await.unwrap();
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].projects.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_user_cascades_projects() {
        let db = Database::open_in_memory().await.unwrap();
        let user = seed_user(&db, "carol").await;

        let project = db
            .create_project(&NewProject {
                name: "gemini".to_string(),
                status: ProjectStatus::InProgress,
                start_time: None,
                end_time: None,
                description: Some("second project".to_string()),
                person_in_charge: user.id,
            })
            .await
            .unwrap();

        db.delete_user(user.id).await.unwrap();
        assert!(db.get_project(project.id).await.unwrap().is_none());
        assert_eq!(db.count_projects().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_project_update_patch_semantics() {
        let db = Database::open_in_memory().await.unwrap();
        let user = seed_user(&db, "dave").await;

        let project = db
            .create_project(&NewProject {
                name: "mercury".to_string(),
                status: ProjectStatus::New,
                start_time: None,
                end_time: None,
                description: Some("original".to_string()),
                person_in_charge: user.id,
            })
            .await
            .unwrap();

        let patch = ProjectPatch {
            status: Some(ProjectStatus::Completed),
            ..Default::default()
        };
        let updated = db
            .update_project(project.id, &patch)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(updated.status, ProjectStatus::Completed);
        // Unset fields keep their values
        assert_eq!(updated.name, "mercury");
        assert_eq!(updated.description.as_deref(), Some("original"));
        assert_eq!(updated.person_in_charge, user.id);
    }

    #[tokio::test]
    async fn test_bulk_create_users_and_lookup_by_ids() {
        let db = Database::open_in_memory().await.unwrap();

        let record = |name: &str| NewUserRecord {
            username: name.to_string(),
            email: format!("{name}@example.com"),
            password_hash: "hash".to_string(),
        };
        let created = db
            .create_users(&[record("alice"), record("bob")])
            .await
            .unwrap();
        assert_eq!(created.len(), 2);

        db.create_project(&NewProject {
            name: "apollo".to_string(),
            status: ProjectStatus::New,
            start_time: None,
            end_time: None,
            description: None,
            person_in_charge: created[0].id,
        })
        .await
        .unwrap();

        // Missing ids are absent, present ones embed their projects
        let fetched = db
            .list_users_by_ids(&[created[0].id, created[1].id, 999])
            .await
            .unwrap();
        assert_eq!(fetched.len(), 2);
        assert_eq!(fetched[0].projects.len(), 1);
        assert!(fetched[1].projects.is_empty());

        assert!(db.list_users_by_ids(&[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_bulk_create_rolls_back_on_conflict() {
        let db = Database::open_in_memory().await.unwrap();
        seed_user(&db, "erin").await;

        let batch = [
            NewUserRecord {
                username: "frank".to_string(),
                email: "frank@example.com".to_string(),
                password_hash: "hash".to_string(),
            },
            NewUserRecord {
                username: "erin".to_string(),
                email: "erin2@example.com".to_string(),
                password_hash: "hash".to_string(),
            },
        ];
        assert!(matches!(
            db.create_users(&batch).await,
            Err(TaskhubError::Database(_))
        ));

        // The whole batch rolled back, including the clean first row
        assert_eq!(db.count_users().await.unwrap(), 1);
        assert!(db.get_user_by_username("frank").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_unique_username_rejected() {
        let db = Database::open_in_memory().await.unwrap();
        seed_user(&db, "erin").await;

        let duplicate = db.create_user("erin", "other@example.com", "hash").await;
        assert!(matches!(duplicate, Err(TaskhubError::Database(_))));
    }
}
