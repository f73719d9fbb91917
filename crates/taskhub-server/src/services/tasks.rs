//! Background task runner
//!
//! A small in-process replacement for an external task queue: an unbounded
//! job channel drained by a worker, plus a periodic report task. Jobs are
//! fire-and-forget; a failed send is logged, never retried into the request
//! path.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use taskhub_core::ports::Mailer;
use taskhub_core::Result;
use tokio::sync::mpsc;
use tracing::{info, warn};

use crate::storage::Database;

#[derive(Debug)]
pub enum Job {
    WelcomeEmail { to: String, username: String },
}

pub struct TaskRunner {
    tx: mpsc::UnboundedSender<Job>,
}

impl TaskRunner {
    pub fn start(mailer: Arc<dyn Mailer>, db: Arc<Database>, report_interval: Duration) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Job>();

        tokio::spawn(async move {
            while let Some(job) = rx.recv().await {
                match job {
                    Job::WelcomeEmail { to, username } => {
                        let body = format!("Hi {username}, your Taskhub account is ready.");
                        if let Err(e) = mailer.send(&to, "Welcome to Taskhub", &body).await {
                            warn!("welcome email to {to} failed: {e}");
                        }
                    }
                }
            }
        });

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(report_interval);
            interval.tick().await; // first tick fires immediately
            loop {
                interval.tick().await;
                let users = db.count_users().await.unwrap_or(-1);
                let projects = db.count_projects().await.unwrap_or(-1);
                info!("periodic report: {users} users, {projects} projects");
            }
        });

        Self { tx }
    }

    pub fn enqueue(&self, job: Job) {
        if self.tx.send(job).is_err() {
            warn!("task worker stopped, job dropped");
        }
    }
}

/// Mailer that writes to the log instead of SMTP. Stands in for a real
/// delivery backend behind the same port.
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<()> {
        info!("mail to={to} subject={subject:?} body={body:?}");
        Ok(())
    }
}
