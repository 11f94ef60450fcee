//! Supabase client for the PostgREST API.

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder};
use serde::de::DeserializeOwned;
use serde::Serialize;

use super::types::{DbMilestone, DbTask, DbUser, NewMilestone, NewTask, NewUser, OwnedRow};
use super::GoalStore;
use crate::schedule::TaskId;

/// Supabase client for database operations.
pub struct SupabaseClient {
    client: Client,
    url: String,
    service_role_key: String,
}

impl SupabaseClient {
    pub fn new(url: &str, service_role_key: &str) -> Self {
        Self {
            client: Client::new(),
            url: url.trim_end_matches('/').to_string(),
            service_role_key: service_role_key.to_string(),
        }
    }

    /// Get the PostgREST URL.
    fn rest_url(&self) -> String {
        format!("{}/rest/v1", self.url)
    }

    /// A request against `table` with the service-role headers and the
    /// given query string.
    fn request(&self, method: Method, table: &str, query: &str) -> RequestBuilder {
        let url = if query.is_empty() {
            format!("{}/{}", self.rest_url(), table)
        } else {
            format!("{}/{}?{}", self.rest_url(), table, query)
        };
        self.client
            .request(method, url)
            .header("apikey", &self.service_role_key)
            .header("Authorization", format!("Bearer {}", self.service_role_key))
    }

    async fn fetch<T: DeserializeOwned>(&self, what: &str, req: RequestBuilder) -> anyhow::Result<T> {
        let resp = req.send().await?;
        let status = resp.status();
        let text = resp.text().await?;

        if !status.is_success() {
            anyhow::bail!("Failed to {}: {} - {}", what, status, text);
        }

        Ok(serde_json::from_str(&text)?)
    }

    async fn insert<B: Serialize + ?Sized, T: DeserializeOwned>(
        &self,
        table: &str,
        body: &B,
    ) -> anyhow::Result<Vec<T>> {
        let req = self
            .request(Method::POST, table, "")
            .header("Content-Type", "application/json")
            .header("Prefer", "return=representation")
            .json(body);
        self.fetch(&format!("insert into {}", table), req).await
    }

    async fn delete_where(&self, table: &str, query: &str) -> anyhow::Result<usize> {
        let req = self
            .request(Method::DELETE, table, query)
            .header("Prefer", "return=representation");
        let rows: Vec<serde_json::Value> = self.fetch(&format!("delete from {}", table), req).await?;
        Ok(rows.len())
    }
}

/// `column=eq.value` with the value percent-encoded.
fn eq(column: &str, value: &str) -> String {
    format!("{}=eq.{}", column, urlencoding::encode(value))
}

#[async_trait]
impl GoalStore for SupabaseClient {
    async fn find_user_by_token(&self, token: &str) -> anyhow::Result<Option<DbUser>> {
        let req = self.request(Method::GET, "users", &eq("token", token));
        let users: Vec<DbUser> = self.fetch("look up user", req).await?;
        Ok(users.into_iter().next())
    }

    async fn get_user(&self, user_id: &str) -> anyhow::Result<Option<DbUser>> {
        let req = self.request(Method::GET, "users", &eq("user_id", user_id));
        let users: Vec<DbUser> = self.fetch("get user", req).await?;
        Ok(users.into_iter().next())
    }

    async fn create_user(&self, user: &NewUser) -> anyhow::Result<DbUser> {
        let users: Vec<DbUser> = self.insert("users", user).await?;
        users
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("No user returned"))
    }

    async fn update_user_progress(
        &self,
        user_id: &str,
        goal: &str,
        status: &str,
    ) -> anyhow::Result<()> {
        let body = serde_json::json!({ "goal": goal, "status": status });
        let resp = self
            .request(Method::PATCH, "users", &eq("user_id", user_id))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await?;

        if !resp.status().is_success() {
            let text = resp.text().await?;
            anyhow::bail!("Failed to update user: {}", text);
        }

        Ok(())
    }

    async fn list_milestones(&self, user_id: &str) -> anyhow::Result<Vec<DbMilestone>> {
        let query = format!("{}&order=id", eq("user_id", user_id));
        let req = self.request(Method::GET, "milestones", &query);
        self.fetch("list milestones", req).await
    }

    async fn replace_milestones(
        &self,
        user_id: &str,
        milestones: &[NewMilestone],
    ) -> anyhow::Result<Vec<DbMilestone>> {
        self.delete_where("milestones", &eq("user_id", user_id)).await?;
        if milestones.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<_> = milestones
            .iter()
            .map(|row| OwnedRow { user_id, row })
            .collect();
        self.insert("milestones", &rows).await
    }

    async fn list_tasks(&self, user_id: &str) -> anyhow::Result<Vec<DbTask>> {
        let query = format!("{}&order=id", eq("user_id", user_id));
        let req = self.request(Method::GET, "tasks", &query);
        self.fetch("list tasks", req).await
    }

    async fn replace_tasks(
        &self,
        user_id: &str,
        tasks: &[NewTask],
    ) -> anyhow::Result<Vec<DbTask>> {
        self.delete_where("tasks", &eq("user_id", user_id)).await?;
        if tasks.is_empty() {
            return Ok(Vec::new());
        }
        let rows: Vec<_> = tasks.iter().map(|row| OwnedRow { user_id, row }).collect();
        self.insert("tasks", &rows).await
    }

    async fn delete_task(&self, user_id: &str, task_id: TaskId) -> anyhow::Result<bool> {
        let query = format!("id=eq.{}&{}", task_id, eq("user_id", user_id));
        Ok(self.delete_where("tasks", &query).await? > 0)
    }
}
