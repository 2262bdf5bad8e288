//! Listing bugs waiting for triage on Launchpad.

use erreur::{ensure, Context, Result};
use reqwest::blocking::Client;
use serde::Deserialize;

pub const DEFAULT_STATUSES: &[&str] = &["New"];

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct BugTask {
    /// Like `Bug #1724025 in openstack-ansible: "invalid regular expression"`
    pub title: String,
    pub web_link: String,
    #[serde(default)]
    pub status: Option<String>,
}

#[derive(Debug, Deserialize)]
struct Collection {
    entries: Vec<BugTask>,
    #[serde(default)]
    next_collection_link: Option<String>,
}

/// Anonymous, read-only access to the Launchpad web service.
#[derive(Debug, Clone)]
pub struct LaunchpadClient {
    api: String,
    http: Client,
}

impl LaunchpadClient {
    pub fn new(api: &str) -> Result<Self> {
        let http = Client::builder()
            .user_agent(crate::USER_AGENT)
            .build()
            .context("build HTTP client")?;
        Ok(LaunchpadClient {
            api: api.trim_end_matches('/').to_string(),
            http,
        })
    }

    /// All of `project`'s bug tasks in one of `statuses`, following
    /// pagination to the end.
    pub fn search_tasks(
        &self,
        project: &str,
        statuses: &[&str],
        order_by: &str,
    ) -> Result<Vec<BugTask>> {
        let mut query = vec![("ws.op", "searchTasks"), ("order_by", order_by)];
        query.extend(statuses.iter().map(|status| ("status", *status)));

        let url = format!("{}/{}", self.api, project);
        let mut page: Collection = self.get(self.http.get(&url).query(&query))?;
        let mut tasks = std::mem::take(&mut page.entries);

        while let Some(next) = page.next_collection_link.take() {
            log::debug!("fetching next page `{}`", next);
            page = self.get(self.http.get(&next))?;
            tasks.append(&mut page.entries);
        }

        log::info!("found {} bug tasks for `{}`", tasks.len(), project);
        Ok(tasks)
    }

    fn get(&self, request: reqwest::blocking::RequestBuilder) -> Result<Collection> {
        let response = request
            .header("Accept", "application/json")
            .send()
            .context("query Launchpad")?;
        ensure!(
            response.status().is_success(),
            "Launchpad answered {} for `{}`",
            response.status(),
            response.url()
        );
        response.json().context("decode Launchpad bug task collection")
    }
}

/// Drop the `Bug #… in project` part of a task title.
pub fn bug_name(title: &str) -> String {
    title.split(':').skip(1).collect()
}

pub fn format_task(task: &BugTask) -> String {
    format!("#link {}\n\t{}", task.web_link, bug_name(&task.title))
}
