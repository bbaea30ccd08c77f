//! Typed backend resources
//!
//! Thin wrappers over `RequestPipeline`; all authorization handling happens
//! there. List endpoints return the first page's `results`.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::models::{
    Comment, CommentBody, InviteReceipt, ListBody, NewProject, NewTask, Paginated,
    ProfileUpdate, Project, ProjectUpdate, Task, TaskUpdate, Team, TeamInvite, User,
};
use crate::pipeline::RequestPipeline;
use crate::request::ApiRequest;

#[derive(Clone)]
pub struct TaskboardApi {
    pipeline: Arc<RequestPipeline>,
}

/// Task creation payload; the backend wants the project id in the body too.
#[derive(Serialize)]
struct TaskPayload<'a> {
    project: u64,
    #[serde(flatten)]
    task: &'a NewTask,
}

#[derive(Serialize)]
struct PasswordChange<'a> {
    old_password: &'a str,
    new_password: &'a str,
}

#[derive(Deserialize)]
struct Detail {
    #[serde(default)]
    detail: String,
}

impl TaskboardApi {
    pub fn new(pipeline: Arc<RequestPipeline>) -> Self {
        Self { pipeline }
    }

    pub fn pipeline(&self) -> &Arc<RequestPipeline> {
        &self.pipeline
    }

    pub async fn fetch_projects(&self) -> Result<Vec<Project>> {
        self.list("/projects/").await
    }

    pub async fn fetch_project(&self, id: u64) -> Result<Project> {
        self.fetch(ApiRequest::get(format!("/projects/{id}/"))).await
    }

    pub async fn create_project(&self, project: &NewProject) -> Result<Project> {
        self.fetch(ApiRequest::post("/projects/").json(project)?).await
    }

    pub async fn update_project(&self, id: u64, update: &ProjectUpdate) -> Result<Project> {
        self.fetch(ApiRequest::patch(format!("/projects/{id}/")).json(update)?)
            .await
    }

    pub async fn fetch_teams(&self) -> Result<Vec<Team>> {
        self.list("/teams/").await
    }

    /// Invite `invite.email` to a team; the backend creates a pending
    /// membership and mails the invitee.
    pub async fn invite_member(&self, team_id: u64, invite: &TeamInvite) -> Result<InviteReceipt> {
        self.fetch(ApiRequest::post(format!("/teams/{team_id}/invite-member/")).json(invite)?)
            .await
    }

    pub async fn fetch_project_tasks(&self, project_id: u64) -> Result<Vec<Task>> {
        self.list(&format!("/projects/{project_id}/tasks/")).await
    }

    pub async fn create_task(&self, project_id: u64, task: &NewTask) -> Result<Task> {
        let payload = TaskPayload {
            project: project_id,
            task,
        };
        self.fetch(ApiRequest::post(format!("/projects/{project_id}/tasks/")).json(&payload)?)
            .await
    }

    pub async fn update_task(&self, project_id: u64, task_id: u64, update: &TaskUpdate) -> Result<Task> {
        self.fetch(
            ApiRequest::patch(format!("/projects/{project_id}/tasks/{task_id}/")).json(update)?,
        )
        .await
    }

    pub async fn delete_task(&self, project_id: u64, task_id: u64) -> Result<()> {
        self.pipeline
            .send(&ApiRequest::delete(format!(
                "/projects/{project_id}/tasks/{task_id}/"
            )))
            .await?;
        Ok(())
    }

    /// Top-level comments of a task, newest first, replies nested.
    pub async fn fetch_comments(&self, project_id: u64, task_id: u64) -> Result<Vec<Comment>> {
        let body: ListBody<Comment> = self
            .fetch(ApiRequest::get(comments_path(project_id, task_id)))
            .await?;
        Ok(body.into_items())
    }

    pub async fn create_comment(
        &self,
        project_id: u64,
        task_id: u64,
        comment: &CommentBody,
    ) -> Result<CommentBody> {
        self.fetch(ApiRequest::post(comments_path(project_id, task_id)).json(comment)?)
            .await
    }

    pub async fn update_comment(
        &self,
        project_id: u64,
        task_id: u64,
        comment_id: u64,
        text: &str,
    ) -> Result<CommentBody> {
        let path = format!("{}{comment_id}/", comments_path(project_id, task_id));
        self.fetch(ApiRequest::patch(path).json(&serde_json::json!({ "text": text }))?)
            .await
    }

    pub async fn delete_comment(&self, project_id: u64, task_id: u64, comment_id: u64) -> Result<()> {
        let path = format!("{}{comment_id}/", comments_path(project_id, task_id));
        self.pipeline.send(&ApiRequest::delete(path)).await?;
        Ok(())
    }

    /// Tasks assigned to the logged-in user, across projects.
    pub async fn fetch_my_tasks(&self) -> Result<Vec<Task>> {
        self.list("/my-tasks/").await
    }

    pub async fn current_user(&self) -> Result<User> {
        self.fetch(ApiRequest::get("/users/me/")).await
    }

    pub async fn update_profile(&self, update: &ProfileUpdate) -> Result<User> {
        self.fetch(ApiRequest::patch("/users/update-profile/").json(update)?)
            .await
    }

    /// Change the logged-in user's password. Returns the backend's message.
    ///
    /// A wrong old password comes back as `RequestError::Api` with status 400.
    pub async fn change_password(&self, old_password: &str, new_password: &str) -> Result<String> {
        let payload = PasswordChange {
            old_password,
            new_password,
        };
        let reply: Detail = self
            .fetch(ApiRequest::post("/users/change-password/").json(&payload)?)
            .await?;
        Ok(reply.detail)
    }

    async fn fetch<T: DeserializeOwned>(&self, request: ApiRequest) -> Result<T> {
        self.pipeline.send(&request).await?.json()
    }

    async fn list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>> {
        let page: Paginated<T> = self.fetch(ApiRequest::get(path)).await?;
        Ok(page.results)
    }
}

fn comments_path(project_id: u64, task_id: u64) -> String {
    format!("/projects/{project_id}/tasks/{task_id}/comments/")
}
