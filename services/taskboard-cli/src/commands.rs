//! Subcommand handlers
//!
//! Each handler returns the text to print on stdout; errors go back to
//! `main` and are reported there.

use std::fmt::Write as _;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use common::Secret;
use taskboard_client::models::{Project, Task, Team, User};
use taskboard_client::{LoginRedirect, TaskTimer, TaskboardApi, TimerState};
use taskboard_session::{SessionManager, SessionState};
use tracing::info;

use crate::cli::{Command, TimerAction};

/// Prompts for a new login when the pipeline ends the session.
#[derive(Debug, Default)]
pub struct CliRedirect;

impl LoginRedirect for CliRedirect {
    fn redirect_to_login(&self, reason: &str) {
        eprintln!("session ended ({reason}); run `taskboard login` to sign in again");
    }
}

/// Everything a command can touch.
pub struct App {
    pub session: Arc<SessionManager>,
    pub api: TaskboardApi,
    pub timer: TaskTimer,
    pub default_email: Option<String>,
    pub password: Option<Secret<String>>,
}

impl App {
    pub async fn run(&self, command: Command) -> Result<String> {
        match command {
            Command::Login { email } => self.login(email).await,
            Command::Logout => {
                self.session.logout();
                Ok("Logged out.".to_string())
            }
            Command::Status => Ok(self.status()),
            Command::Token => self.token().await,
            Command::Projects => {
                let projects = self.api.fetch_projects().await?;
                Ok(render_projects(&projects))
            }
            Command::Tasks { project } => {
                let tasks = match project {
                    Some(id) => self.api.fetch_project_tasks(id).await?,
                    None => self.api.fetch_my_tasks().await?,
                };
                Ok(render_tasks(&tasks))
            }
            Command::Teams => {
                let teams = self.api.fetch_teams().await?;
                Ok(render_teams(&teams))
            }
            Command::Me => {
                let user = self.api.current_user().await?;
                Ok(render_user(&user))
            }
            Command::Timer { action } => self.timer(action),
        }
    }

    async fn login(&self, email: Option<String>) -> Result<String> {
        let email = email
            .or_else(|| self.default_email.clone())
            .ok_or_else(|| anyhow!("no email given: pass --email or set auth.email"))?;
        let password = self.password.as_ref().ok_or_else(|| {
            anyhow!("no password: set TASKBOARD_PASSWORD or auth.password_file")
        })?;

        self.session
            .login(&email, password.expose())
            .await
            .with_context(|| format!("login failed for {email}"))?;
        info!("logged in");
        Ok(format!("Logged in as {email}."))
    }

    fn status(&self) -> String {
        render_status(
            self.session.state(),
            self.session.is_authenticated(),
            self.session.claims().and_then(|c| c.subject()),
            self.session.access_expires_in(),
        )
    }

    async fn token(&self) -> Result<String> {
        match self.session.ensure_fresh_token().await {
            Ok(token) => Ok(token),
            Err(e) => {
                self.session.logout();
                Err(e).context("no usable session; run `taskboard login`")
            }
        }
    }

    fn timer(&self, action: TimerAction) -> Result<String> {
        let state = match action {
            TimerAction::Start { task_id } => self.timer.start(&task_id)?,
            TimerAction::Stop => self.timer.stop()?,
            TimerAction::Reset => self.timer.reset()?,
            TimerAction::Status => self.timer.state(),
        };
        Ok(render_timer(&state, self.timer.elapsed_secs()))
    }
}

/// Seconds as `HH:MM:SS`. Hours are not capped at 24.
pub fn format_elapsed(secs: u64) -> String {
    format!("{:02}:{:02}:{:02}", secs / 3600, (secs % 3600) / 60, secs % 60)
}

fn render_status(
    state: SessionState,
    authenticated: bool,
    subject: Option<String>,
    expires_in: Option<Duration>,
) -> String {
    let mut out = format!("session: {}\n", state.label());
    let _ = writeln!(out, "authenticated: {}", if authenticated { "yes" } else { "no" });
    if let Some(subject) = subject {
        let _ = writeln!(out, "user: {subject}");
    }
    match expires_in {
        Some(left) if left > Duration::ZERO => {
            let _ = writeln!(out, "access token expires in: {}", format_elapsed(left.as_secs()));
        }
        Some(_) => out.push_str("access token: expired\n"),
        None => {}
    }
    out.trim_end().to_string()
}

fn render_projects(projects: &[Project]) -> String {
    if projects.is_empty() {
        return "No projects.".to_string();
    }
    let mut out = format!("{:<6} {:<30} {:<20} {:>5}\n", "ID", "NAME", "TEAM", "TASKS");
    for p in projects {
        let _ = writeln!(
            out,
            "{:<6} {:<30} {:<20} {:>5}",
            p.id,
            p.name,
            p.team.name,
            p.tasks.len()
        );
    }
    out.trim_end().to_string()
}

fn render_tasks(tasks: &[Task]) -> String {
    if tasks.is_empty() {
        return "No tasks.".to_string();
    }
    let mut out = format!(
        "{:<6} {:<12} {:<8} {:<12} {}\n",
        "ID", "STATUS", "PRIORITY", "DUE", "TITLE"
    );
    for t in tasks {
        let due = t
            .due_date
            .as_deref()
            .map(|d| d.get(..10).unwrap_or(d))
            .unwrap_or("-");
        let _ = writeln!(
            out,
            "{:<6} {:<12} {:<8} {:<12} {}",
            t.id,
            t.status.label(),
            t.priority.label(),
            due,
            t.title
        );
    }
    out.trim_end().to_string()
}

fn render_teams(teams: &[Team]) -> String {
    if teams.is_empty() {
        return "No teams.".to_string();
    }
    let mut out = format!("{:<6} {:<30} {:>7}\n", "ID", "NAME", "MEMBERS");
    for t in teams {
        let admin = if t.is_admin { " (admin)" } else { "" };
        let _ = writeln!(
            out,
            "{:<6} {:<30} {:>7}{admin}",
            t.id,
            t.name,
            t.members.len()
        );
    }
    out.trim_end().to_string()
}

fn render_user(user: &User) -> String {
    format!("{} <{}>", user.display_name(), user.email)
}

fn render_timer(state: &TimerState, elapsed: u64) -> String {
    match &state.task_id {
        None => "Timer idle.".to_string(),
        Some(task) => {
            let status = if state.running { "running" } else { "stopped" };
            format!("task {task}: {status} {}", format_elapsed(elapsed))
        }
    }
}

#[cfg(test)]
mod tests {
    use taskboard_auth::testing::access_token;
    use taskboard_auth::{AuthEndpoints, ManualClock, MemoryStore, TokenPair, TokenStore};
    use taskboard_client::RequestPipeline;
    use taskboard_client::models::{Priority, TaskStatus};

    use super::*;

    const NOW: u64 = 1_700_000_000;

    fn app(pair: Option<TokenPair>) -> (App, Arc<ManualClock>) {
        let clock = Arc::new(ManualClock::new(NOW * 1000));
        let storage = Arc::new(MemoryStore::new());
        let store = TokenStore::new(storage.clone());
        if let Some(pair) = pair {
            store.set(&pair).unwrap();
        }
        // Nothing listens here; these tests never reach the network.
        let base = "http://127.0.0.1:9/api";
        let http = reqwest::Client::new();
        let session = Arc::new(
            SessionManager::new(store, AuthEndpoints::new(http.clone(), base))
                .with_clock(clock.clone()),
        );
        let pipeline = RequestPipeline::new(http, base, session.clone());
        let app = App {
            session,
            api: TaskboardApi::new(Arc::new(pipeline)),
            timer: TaskTimer::new(storage, clock.clone()),
            default_email: None,
            password: None,
        };
        (app, clock)
    }

    fn task(id: u64, title: &str, due: Option<&str>) -> Task {
        Task {
            id,
            title: title.into(),
            description: String::new(),
            status: TaskStatus::InProgress,
            priority: Priority::High,
            due_date: due.map(Into::into),
            assigned_to: None,
            created_by: None,
            project: None,
            created_at: None,
        }
    }

    #[test]
    fn format_elapsed_pads_and_rolls_over() {
        assert_eq!(format_elapsed(0), "00:00:00");
        assert_eq!(format_elapsed(59), "00:00:59");
        assert_eq!(format_elapsed(3_661), "01:01:01");
        assert_eq!(format_elapsed(100 * 3600), "100:00:00");
    }

    #[test]
    fn tasks_table_trims_due_dates() {
        let out = render_tasks(&[
            task(1, "Design", Some("2030-01-01T00:00:00Z")),
            task(2, "Build", None),
        ]);
        let lines: Vec<_> = out.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("ID"));
        assert!(lines[1].contains("in_progress"));
        assert!(lines[1].contains("2030-01-01 "));
        assert!(!lines[1].contains("T00:00"));
        assert!(lines[2].contains(" - "));
        assert!(lines[2].ends_with("Build"));
    }

    #[test]
    fn empty_lists_say_so() {
        assert_eq!(render_tasks(&[]), "No tasks.");
        assert_eq!(render_projects(&[]), "No projects.");
        assert_eq!(render_teams(&[]), "No teams.");
    }

    #[test]
    fn status_for_anonymous_session() {
        let (app, _) = app(None);
        assert_eq!(app.status(), "session: anonymous\nauthenticated: no");
    }

    #[test]
    fn status_for_live_session() {
        let (app, clock) = app(Some(TokenPair {
            access: access_token(7, NOW as i64 + 125, "s"),
            refresh: "R1".into(),
        }));

        let out = app.status();
        assert!(out.contains("session: authenticated"), "got: {out}");
        assert!(out.contains("authenticated: yes"));
        assert!(out.contains("user: 7"));
        assert!(out.contains("expires in: 00:02:05"));

        clock.advance(Duration::from_secs(600));
        let out = app.status();
        assert!(out.contains("authenticated: no"), "got: {out}");
        assert!(out.contains("access token: expired"));
    }

    #[tokio::test]
    async fn logout_clears_the_session() {
        let (app, _) = app(Some(TokenPair {
            access: access_token(7, NOW as i64 + 300, "s"),
            refresh: "R1".into(),
        }));

        assert_eq!(app.run(Command::Logout).await.unwrap(), "Logged out.");
        assert!(app.session.tokens().is_none());
        assert_eq!(app.session.state(), SessionState::Anonymous);
    }

    #[tokio::test]
    async fn token_returns_fresh_access_token_without_network() {
        let access = access_token(7, NOW as i64 + 300, "s");
        let (app, _) = app(Some(TokenPair {
            access: access.clone(),
            refresh: "R1".into(),
        }));

        assert_eq!(app.run(Command::Token).await.unwrap(), access);
    }

    #[tokio::test]
    async fn token_without_session_fails() {
        let (app, _) = app(None);
        let err = app.run(Command::Token).await.unwrap_err();
        assert!(err.to_string().contains("taskboard login"), "got: {err}");
    }

    #[tokio::test]
    async fn login_requires_email_and_password() {
        let (mut app, _) = app(None);

        let err = app.run(Command::Login { email: None }).await.unwrap_err();
        assert!(err.to_string().contains("--email"), "got: {err}");

        app.default_email = Some("ada@example.com".into());
        let err = app.run(Command::Login { email: None }).await.unwrap_err();
        assert!(err.to_string().contains("TASKBOARD_PASSWORD"), "got: {err}");
    }

    #[tokio::test]
    async fn timer_commands_report_elapsed_time() {
        let (app, clock) = app(None);

        assert_eq!(
            app.run(Command::Timer {
                action: TimerAction::Status
            })
            .await
            .unwrap(),
            "Timer idle."
        );

        app.run(Command::Timer {
            action: TimerAction::Start {
                task_id: "42".into(),
            },
        })
        .await
        .unwrap();
        clock.advance(Duration::from_secs(65));

        let out = app
            .run(Command::Timer {
                action: TimerAction::Stop,
            })
            .await
            .unwrap();
        assert_eq!(out, "task 42: stopped 00:01:05");

        let out = app
            .run(Command::Timer {
                action: TimerAction::Reset,
            })
            .await
            .unwrap();
        assert_eq!(out, "Timer idle.");
    }
}
