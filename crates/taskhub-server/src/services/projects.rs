//! Project service: relational CRUD wrapped in the cache-aside layer
//!
//! Project writes fan out to the owning user's cache keys, because user
//! snapshots embed their project lists.

use std::sync::Arc;

use taskhub_core::{EntityKind, NewProject, Project, ProjectPatch, Result, TaskhubError};
use tracing::info;

use crate::services::cache::{EntityCache, WriteTouch};
use crate::services::WriteOutcome;
use crate::storage::Database;

pub struct ProjectService {
    db: Arc<Database>,
    cache: Arc<EntityCache>,
}

impl ProjectService {
    pub fn new(db: Arc<Database>, cache: Arc<EntityCache>) -> Self {
        Self { db, cache }
    }

    pub async fn get_by_id(&self, id: i64) -> Result<Project> {
        let db = Arc::clone(&self.db);
        self.cache
            .read_entity(EntityKind::Project, id, move || async move {
                db.get_project(id).await
            })
            .await?
            .ok_or(TaskhubError::not_found(EntityKind::Project, id))
    }

    pub async fn list_all(&self) -> Result<Vec<Project>> {
        let db = Arc::clone(&self.db);
        self.cache
            .read_list(EntityKind::Project, move || async move {
                db.list_projects().await
            })
            .await
    }

    pub async fn create(&self, data: NewProject) -> Result<WriteOutcome<Project>> {
        validate_project_name(&data.name)?;

        // The owner must exist before the FK write
        if self
            .db
            .get_user_by_id(data.person_in_charge)
            .await?
            .is_none()
        {
            return Err(TaskhubError::not_found(
                EntityKind::User,
                data.person_in_charge,
            ));
        }

        let project = self.db.create_project(&data).await?;
        info!(
            "created project {} ({}) owned by user {}",
            project.name, project.id, project.person_in_charge
        );

        let cache_degraded = self
            .cache
            .invalidate(&WriteTouch::project(project.id, project.person_in_charge))
            .await;
        Ok(WriteOutcome {
            entity: project,
            cache_degraded,
        })
    }

    /// Creates the whole batch or none of it. Every owner must exist and
    /// names must be unique within the batch before any insert runs.
    pub async fn create_many(
        &self,
        batch: Vec<NewProject>,
    ) -> Result<WriteOutcome<Vec<Project>>> {
        let mut names = std::collections::HashSet::new();
        for data in &batch {
            validate_project_name(&data.name)?;
            if !names.insert(data.name.clone()) {
                return Err(TaskhubError::Validation(format!(
                    "duplicate project name in batch: {}",
                    data.name
                )));
            }
            if self
                .db
                .get_user_by_id(data.person_in_charge)
                .await?
                .is_none()
            {
                return Err(TaskhubError::not_found(
                    EntityKind::User,
                    data.person_in_charge,
                ));
            }
        }

        let projects = self.db.create_projects(&batch).await?;
        info!("created {} projects in bulk", projects.len());

        let mut cache_degraded = false;
        for project in &projects {
            cache_degraded |= self
                .cache
                .invalidate(&WriteTouch::project(project.id, project.person_in_charge))
                .await;
        }
        Ok(WriteOutcome {
            entity: projects,
            cache_degraded,
        })
    }

    pub async fn update(&self, id: i64, patch: ProjectPatch) -> Result<WriteOutcome<Project>> {
        if let Some(name) = &patch.name {
            validate_project_name(name)?;
        }

        let project = self
            .db
            .update_project(id, &patch)
            .await?
            .ok_or(TaskhubError::not_found(EntityKind::Project, id))?;

        let cache_degraded = self
            .cache
            .invalidate(&WriteTouch::project(id, project.person_in_charge))
            .await;
        Ok(WriteOutcome {
            entity: project,
            cache_degraded,
        })
    }

    pub async fn delete(&self, id: i64) -> Result<WriteOutcome<Project>> {
        let project = self
            .db
            .delete_project(id)
            .await?
            .ok_or(TaskhubError::not_found(EntityKind::Project, id))?;
        info!("deleted project {} ({})", project.name, project.id);

        let cache_degraded = self
            .cache
            .invalidate(&WriteTouch::project(id, project.person_in_charge))
            .await;
        Ok(WriteOutcome {
            entity: project,
            cache_degraded,
        })
    }
}

fn validate_project_name(name: &str) -> Result<()> {
    if name.len() < 3 || name.len() > 30 {
        return Err(TaskhubError::Validation(
            "project name must be 3..=30 characters".to_string(),
        ));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::cache::DEFAULT_ENTITY_TTL;
    use crate::services::users::UserService;
    use crate::storage::MemoryCache;
    use taskhub_core::ports::CacheStore;
    use taskhub_core::{keys, NewUser, ProjectStatus};

    struct Fixture {
        users: UserService,
        projects: ProjectService,
        store: Arc<dyn CacheStore>,
    }

    async fn fixture() -> Fixture {
        let db = Arc::new(Database::open_in_memory().await.unwrap());
        let store: Arc<dyn CacheStore> = Arc::new(MemoryCache::new());
        let cache = Arc::new(EntityCache::new(store.clone(), DEFAULT_ENTITY_TTL));
        Fixture {
            users: UserService::new(db.clone(), cache.clone()),
            projects: ProjectService::new(db, cache),
            store,
        }
    }

    fn new_project(name: &str, owner: i64) -> NewProject {
        NewProject {
            name: name.to_string(),
            status: ProjectStatus::New,
            start_time: None,
            end_time: None,
            description: None,
            person_in_charge: owner,
        }
    }

    async fn seed_owner(fx: &Fixture) -> i64 {
        fx.users
            .create(NewUser {
                username: "owner".to_string(),
                email: "owner@example.com".to_string(),
                password: "hunter22".to_string(),
            })
            .await
            .unwrap()
            .entity
            .id
    }

    #[tokio::test]
    async fn test_create_invalidates_owner_snapshot() {
        let fx = fixture().await;
        let owner = seed_owner(&fx).await;

        // Prime the owner's cache entry (no projects yet)
        let cached = fx.users.get_by_id(owner).await.unwrap();
        assert!(cached.projects.is_empty());
        assert!(fx
            .store
            .get(&keys::entity(EntityKind::User, owner))
            .await
            .unwrap()
            .is_some());

        fx.projects
            .create(new_project("apollo", owner))
            .await
            .unwrap();

        // The stale owner snapshot is gone, not patched in place
        assert!(fx
            .store
            .get(&keys::entity(EntityKind::User, owner))
            .await
            .unwrap()
            .is_none());
        let fresh = fx.users.get_by_id(owner).await.unwrap();
        assert_eq!(fresh.projects.len(), 1);
    }

    #[tokio::test]
    async fn test_create_requires_existing_owner() {
        let fx = fixture().await;
        assert!(matches!(
            fx.projects.create(new_project("orphan", 999)).await,
            Err(TaskhubError::EntityNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_update_then_read_never_returns_stale() {
        let fx = fixture().await;
        let owner = seed_owner(&fx).await;
        let project = fx
            .projects
            .create(new_project("gemini", owner))
            .await
            .unwrap()
            .entity;

        // Force a cache hit before updating
        fx.projects.get_by_id(project.id).await.unwrap();

        let patch = ProjectPatch {
            status: Some(ProjectStatus::Completed),
            ..Default::default()
        };
        fx.projects.update(project.id, patch).await.unwrap();

        let fetched = fx.projects.get_by_id(project.id).await.unwrap();
        assert_eq!(fetched.status, ProjectStatus::Completed);
    }

    #[tokio::test]
    async fn test_delete_invalidates_aggregates() {
        let fx = fixture().await;
        let owner = seed_owner(&fx).await;
        let project = fx
            .projects
            .create(new_project("mercury", owner))
            .await
            .unwrap()
            .entity;

        fx.projects.list_all().await.unwrap();
        fx.users.get_by_id(owner).await.unwrap();

        fx.projects.delete(project.id).await.unwrap();

        assert!(fx
            .store
            .get(&keys::list(EntityKind::Project))
            .await
            .unwrap()
            .is_none());
        assert!(fx
            .store
            .get(&keys::entity(EntityKind::User, owner))
            .await
            .unwrap()
            .is_none());
        assert!(matches!(
            fx.projects.get_by_id(project.id).await,
            Err(TaskhubError::EntityNotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_create_many_invalidates_each_owner_snapshot() {
        let fx = fixture().await;
        let owner = seed_owner(&fx).await;

        // Prime the owner snapshot and the project aggregate
        fx.users.get_by_id(owner).await.unwrap();
        fx.projects.list_all().await.unwrap();

        let outcome = fx
            .projects
            .create_many(vec![
                new_project("apollo", owner),
                new_project("gemini", owner),
            ])
            .await
            .unwrap();
        assert_eq!(outcome.entity.len(), 2);
        assert!(!outcome.cache_degraded);

        assert!(fx
            .store
            .get(&keys::entity(EntityKind::User, owner))
            .await
            .unwrap()
            .is_none());
        assert!(fx
            .store
            .get(&keys::list(EntityKind::Project))
            .await
            .unwrap()
            .is_none());
        assert_eq!(fx.users.get_by_id(owner).await.unwrap().projects.len(), 2);
    }

    #[tokio::test]
    async fn test_create_many_rejects_bad_batch_before_writing() {
        let fx = fixture().await;
        let owner = seed_owner(&fx).await;

        assert!(matches!(
            fx.projects
                .create_many(vec![
                    new_project("apollo", owner),
                    new_project("orphan", 999),
                ])
                .await,
            Err(TaskhubError::EntityNotFound { .. })
        ));
        assert!(matches!(
            fx.projects
                .create_many(vec![
                    new_project("apollo", owner),
                    new_project("apollo", owner),
                ])
                .await,
            Err(TaskhubError::Validation(_))
        ));

        // Nothing from either batch landed
        assert!(fx.projects.list_all().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_name_validation() {
        let fx = fixture().await;
        let owner = seed_owner(&fx).await;
        assert!(matches!(
            fx.projects.create(new_project("ab", owner)).await,
            Err(TaskhubError::Validation(_))
        ));
    }
}
