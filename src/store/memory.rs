//! In-process store used by tests and by `DEV_MODE` without Supabase.

use async_trait::async_trait;
use tokio::sync::RwLock;

use super::types::{DbMilestone, DbTask, DbUser, NewMilestone, NewTask, NewUser};
use super::GoalStore;
use crate::schedule::TaskId;

#[derive(Default)]
struct Tables {
    users: Vec<DbUser>,
    milestones: Vec<DbMilestone>,
    tasks: Vec<DbTask>,
    next_id: i64,
}

impl Tables {
    fn allocate_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }
}

#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl GoalStore for MemoryStore {
    async fn find_user_by_token(&self, token: &str) -> anyhow::Result<Option<DbUser>> {
        let tables = self.tables.read().await;
        Ok(tables
            .users
            .iter()
            .find(|u| u.token.as_deref() == Some(token))
            .cloned())
    }

    async fn get_user(&self, user_id: &str) -> anyhow::Result<Option<DbUser>> {
        let tables = self.tables.read().await;
        Ok(tables.users.iter().find(|u| u.user_id == user_id).cloned())
    }

    async fn create_user(&self, user: &NewUser) -> anyhow::Result<DbUser> {
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|u| u.user_id == user.user_id) {
            anyhow::bail!("Failed to create user: {} already exists", user.user_id);
        }
        let row = DbUser {
            user_id: user.user_id.clone(),
            email: user.email.clone(),
            token: user.token.clone(),
            goal: None,
            status: None,
        };
        tables.users.push(row.clone());
        Ok(row)
    }

    async fn update_user_progress(
        &self,
        user_id: &str,
        goal: &str,
        status: &str,
    ) -> anyhow::Result<()> {
        let mut tables = self.tables.write().await;
        if let Some(user) = tables.users.iter_mut().find(|u| u.user_id == user_id) {
            user.goal = Some(goal.to_string());
            user.status = Some(status.to_string());
        }
        Ok(())
    }

    async fn list_milestones(&self, user_id: &str) -> anyhow::Result<Vec<DbMilestone>> {
        let tables = self.tables.read().await;
        Ok(tables
            .milestones
            .iter()
            .filter(|m| m.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn replace_milestones(
        &self,
        user_id: &str,
        milestones: &[NewMilestone],
    ) -> anyhow::Result<Vec<DbMilestone>> {
        let mut tables = self.tables.write().await;
        tables.milestones.retain(|m| m.user_id != user_id);
        let mut saved = Vec::with_capacity(milestones.len());
        for milestone in milestones {
            let row = DbMilestone {
                id: tables.allocate_id(),
                user_id: user_id.to_string(),
                title: milestone.title.clone(),
                description: milestone.description.clone(),
            };
            tables.milestones.push(row.clone());
            saved.push(row);
        }
        Ok(saved)
    }

    async fn list_tasks(&self, user_id: &str) -> anyhow::Result<Vec<DbTask>> {
        let tables = self.tables.read().await;
        Ok(tables
            .tasks
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }

    async fn replace_tasks(
        &self,
        user_id: &str,
        tasks: &[NewTask],
    ) -> anyhow::Result<Vec<DbTask>> {
        let mut tables = self.tables.write().await;
        tables.tasks.retain(|t| t.user_id != user_id);
        let mut saved = Vec::with_capacity(tasks.len());
        for task in tasks {
            let row = DbTask {
                id: tables.allocate_id(),
                user_id: user_id.to_string(),
                name: task.name.clone(),
                start_timestamptz: task.start_timestamptz.clone(),
                end_timestamptz: task.end_timestamptz.clone(),
                recurrence: task.recurrence.clone(),
            };
            tables.tasks.push(row.clone());
            saved.push(row);
        }
        Ok(saved)
    }

    async fn delete_task(&self, user_id: &str, task_id: TaskId) -> anyhow::Result<bool> {
        let mut tables = self.tables.write().await;
        let before = tables.tasks.len();
        tables
            .tasks
            .retain(|t| !(t.id == task_id && t.user_id == user_id));
        Ok(tables.tasks.len() < before)
    }
}
