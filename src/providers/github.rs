use crate::core::cache::ResponseCache;
use crate::core::error::WidgetError;
use crate::core::http::call_with_deadline;
use crate::core::models::{ContributionDay, Contributions};
use crate::core::settings::{GithubSettings, Secrets};
use crate::providers::WidgetSource;
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::header::AUTHORIZATION;
use reqwest::Client;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::time::Duration;

const UPSTREAM: &str = "github";

const CONTRIBUTIONS_QUERY: &str = r#"
query($username: String!) {
  user(login: $username) {
    contributionsCollection {
      contributionCalendar {
        totalContributions
        weeks {
          contributionDays {
            contributionCount
            date
          }
        }
      }
    }
  }
}
"#;

#[derive(Debug, Deserialize)]
struct GraphqlResponse {
    data: Option<GraphqlData>,
    errors: Option<Vec<GraphqlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphqlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct GraphqlData {
    user: Option<GraphqlUser>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphqlUser {
    contributions_collection: Option<ContributionsCollection>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ContributionsCollection {
    contribution_calendar: Option<ContributionCalendar>,
}

#[derive(Debug, Deserialize)]
struct ContributionCalendar {
    weeks: Vec<Week>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Week {
    contribution_days: Vec<Day>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Day {
    contribution_count: u32,
    date: NaiveDate,
}

/// Flattens calendar weeks into one list, unique per date and sorted.
pub fn flatten_weeks<W>(weeks: W) -> Contributions
where
    W: IntoIterator,
    W::Item: IntoIterator<Item = ContributionDay>,
{
    let by_date: BTreeMap<NaiveDate, u32> = weeks
        .into_iter()
        .flatten()
        .map(|day| (day.date, day.count))
        .collect();

    Contributions {
        contributions: by_date
            .into_iter()
            .map(|(date, count)| ContributionDay { date, count })
            .collect(),
    }
}

pub struct GithubClient {
    client: Client,
    graphql_url: String,
    username: String,
    token: Option<String>,
    timeout: Duration,
    ttl: Duration,
    cache: ResponseCache<Contributions>,
}

impl GithubClient {
    pub fn new(client: Client, settings: &GithubSettings, secrets: &Secrets) -> Self {
        Self {
            client,
            graphql_url: settings.graphql_url.clone(),
            username: settings.username.clone(),
            token: secrets.github_token.clone(),
            timeout: settings.timeout(),
            ttl: settings.cache_ttl(),
            cache: ResponseCache::new(),
        }
    }

    pub fn cache_ttl(&self) -> Duration {
        self.ttl
    }

    pub async fn fetch_contributions(&self) -> Result<Contributions, WidgetError> {
        if let Some(cached) = self.cache.get(&self.username).await {
            return Ok(cached);
        }

        let token = self
            .token
            .as_deref()
            .ok_or(WidgetError::Config("GITHUB_TOKEN"))?;

        let request = self
            .client
            .post(&self.graphql_url)
            .header(AUTHORIZATION, format!("Bearer {token}"))
            .json(&serde_json::json!({
                "query": CONTRIBUTIONS_QUERY,
                "variables": { "username": self.username },
            }));

        let response = call_with_deadline(request, self.timeout)
            .await
            .into_result(UPSTREAM)?;

        let body: GraphqlResponse = response.json().await.map_err(|e| WidgetError::Payload {
            upstream: UPSTREAM,
            reason: e.to_string(),
        })?;

        let contributions = contributions_from(body)?;
        tracing::debug!(
            days = contributions.contributions.len(),
            username = %self.username,
            "Fetched GitHub contributions"
        );

        self.cache
            .put(&self.username, contributions.clone(), self.ttl)
            .await;
        Ok(contributions)
    }
}

fn contributions_from(body: GraphqlResponse) -> Result<Contributions, WidgetError> {
    if let Some(first) = body.errors.as_ref().and_then(|errors| errors.first()) {
        return Err(WidgetError::Payload {
            upstream: UPSTREAM,
            reason: first.message.clone(),
        });
    }

    let calendar = body
        .data
        .and_then(|d| d.user)
        .and_then(|u| u.contributions_collection)
        .and_then(|c| c.contribution_calendar)
        .ok_or_else(|| WidgetError::Payload {
            upstream: UPSTREAM,
            reason: "no contribution data found".to_string(),
        })?;

    Ok(flatten_weeks(calendar.weeks.into_iter().map(|week| {
        week.contribution_days
            .into_iter()
            .map(|day| ContributionDay {
                date: day.date,
                count: day.contribution_count,
            })
    })))
}

#[async_trait]
impl WidgetSource for GithubClient {
    type Output = Contributions;

    fn name(&self) -> &'static str {
        "GitHub"
    }

    async fn fetch(&self) -> Result<Contributions, WidgetError> {
        self.fetch_contributions().await
    }

    fn has_credentials(&self) -> bool {
        self.token.is_some()
    }

    fn credential_hint(&self) -> &'static str {
        "Set GITHUB_TOKEN to a token with read:user scope"
    }
}
