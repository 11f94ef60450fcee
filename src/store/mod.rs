//! Persistence for users, milestones and scheduled tasks.
//!
//! [`GoalStore`] is the seam the HTTP layer talks to. [`SupabaseClient`]
//! backs it with PostgREST in production; [`MemoryStore`] keeps everything
//! in process for tests and local development.

mod memory;
mod supabase;
mod types;

pub use memory::MemoryStore;
pub use supabase::SupabaseClient;
pub use types::{DbMilestone, DbTask, DbUser, NewMilestone, NewTask, NewUser};

use async_trait::async_trait;

use crate::schedule::TaskId;

#[async_trait]
pub trait GoalStore: Send + Sync {
    async fn find_user_by_token(&self, token: &str) -> anyhow::Result<Option<DbUser>>;

    async fn get_user(&self, user_id: &str) -> anyhow::Result<Option<DbUser>>;

    async fn create_user(&self, user: &NewUser) -> anyhow::Result<DbUser>;

    /// Overwrite the user's current goal and status.
    async fn update_user_progress(
        &self,
        user_id: &str,
        goal: &str,
        status: &str,
    ) -> anyhow::Result<()>;

    async fn list_milestones(&self, user_id: &str) -> anyhow::Result<Vec<DbMilestone>>;

    /// Drop the user's milestones and insert `milestones` in their place.
    async fn replace_milestones(
        &self,
        user_id: &str,
        milestones: &[NewMilestone],
    ) -> anyhow::Result<Vec<DbMilestone>>;

    async fn list_tasks(&self, user_id: &str) -> anyhow::Result<Vec<DbTask>>;

    /// Drop the user's tasks and insert `tasks` in their place.
    async fn replace_tasks(&self, user_id: &str, tasks: &[NewTask])
        -> anyhow::Result<Vec<DbTask>>;

    /// Returns whether a task was removed.
    async fn delete_task(&self, user_id: &str, task_id: TaskId) -> anyhow::Result<bool>;
}
