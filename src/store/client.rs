use std::collections::hash_map::DefaultHasher;
use std::hash::{Hash, Hasher};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::debug;
use uuid::Uuid;

use super::error::StoreError;
use super::types::{
    LogInsert, TIMER_SELECT, TeamInsert, TimerRow, WORKSTATION_SELECT, WorkstationRow,
};
use super::{ChangeFilter, RowStore, Table};
use crate::model::{NewTimer, ProductionLog, ProductionTimer, TimerPatch, Workstation};

const REST_PATH: &str = "rest/v1";

/// HTTP client for the backend's row API (PostgREST dialect).
pub struct RestRowStore {
    api_key: String,
    client: Client,
    base_url: String,
}

impl RestRowStore {
    pub fn new(base_url: String, api_key: String) -> Result<Self, StoreError> {
        Self::with_timeouts(
            base_url,
            api_key,
            Duration::from_secs(10),
            Duration::from_secs(30),
        )
    }

    pub fn with_timeouts(
        base_url: String,
        api_key: String,
        connect_timeout: Duration,
        request_timeout: Duration,
    ) -> Result<Self, StoreError> {
        let client = Client::builder()
            .connect_timeout(connect_timeout)
            .timeout(request_timeout)
            .build()?;
        Ok(Self {
            api_key,
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    fn table_url(&self, table: Table) -> String {
        format!("{}/{REST_PATH}/{table}", self.base_url)
    }

    fn request(&self, method: Method, table: Table) -> RequestBuilder {
        self.client
            .request(method, self.table_url(table))
            .header("apikey", &self.api_key)
            .bearer_auth(&self.api_key)
    }

    async fn send(&self, req: RequestBuilder) -> Result<Response, StoreError> {
        let response = req.send().await?;
        let status = response.status();

        if status == StatusCode::TOO_MANY_REQUESTS {
            let retry_after = response
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
                .map(|secs| secs.saturating_mul(1000))
                .unwrap_or(1000);
            return Err(StoreError::RateLimited {
                retry_after_ms: retry_after,
            });
        }

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(StoreError::Api {
                status: status.as_u16(),
                message,
            });
        }

        Ok(response)
    }

    async fn select<T: DeserializeOwned>(
        &self,
        table: Table,
        params: &[(&str, String)],
    ) -> Result<Vec<T>, StoreError> {
        debug!(%table, "select");
        let response = self
            .send(self.request(Method::GET, table).query(params))
            .await?;
        let body = response.text().await?;
        serde_json::from_str(&body).map_err(|e| StoreError::Decode(format!("{table}: {e}")))
    }

    async fn insert<B: Serialize + ?Sized>(
        &self,
        table: Table,
        body: &B,
    ) -> Result<(), StoreError> {
        debug!(%table, "insert");
        self.send(
            self.request(Method::POST, table)
                .header("Prefer", "return=minimal")
                .json(body),
        )
        .await?;
        Ok(())
    }
}

const TIMER_REVISION_SELECT: &str =
    "id,workstation_id,production_order_id,status,start_time,end_time,efficiency";

/// Columns whose change should wake up a watcher of `table`.
fn watched_columns(table: Table) -> Vec<(&'static str, String)> {
    match table {
        Table::Workstations => vec![("select", "id,name".into()), ("order", "id".into())],
        Table::ProductionOrders => vec![
            ("select", "id,status,total_quantity".into()),
            ("order", "id".into()),
        ],
        Table::ProductionTimers => vec![
            ("select", TIMER_REVISION_SELECT.into()),
            ("status", "neq.stopped".into()),
            ("order", "id".into()),
        ],
        // Logs are append-only: the newest id plus the row count is enough.
        Table::ProductionLogs => vec![
            ("select", "id".into()),
            ("order", "id.desc".into()),
            ("limit", "1".into()),
        ],
        Table::ProductionTimerEmployees => vec![
            ("select", "production_timer_id,employee_id".into()),
            ("order", "production_timer_id,employee_id".into()),
        ],
        Table::NonConformities => vec![("select", "id,status".into()), ("order", "id".into())],
    }
}

fn fingerprint(content_range: &str, body: &str) -> String {
    let mut hasher = DefaultHasher::new();
    body.hash(&mut hasher);
    format!("{content_range}#{:016x}", hasher.finish())
}

#[async_trait]
impl RowStore for RestRowStore {
    async fn list_workstations(&self) -> Result<Vec<Workstation>, StoreError> {
        let rows: Vec<WorkstationRow> = self
            .select(Table::Workstations, &[("select", WORKSTATION_SELECT.into())])
            .await?;
        Ok(rows.into_iter().map(Workstation::from).collect())
    }

    async fn list_active_timers(&self) -> Result<Vec<ProductionTimer>, StoreError> {
        let rows: Vec<TimerRow> = self
            .select(
                Table::ProductionTimers,
                &[
                    ("select", TIMER_SELECT.into()),
                    ("status", "in.(in_progress,paused)".into()),
                    ("order", "start_time".into()),
                ],
            )
            .await?;
        Ok(rows.into_iter().map(ProductionTimer::from).collect())
    }

    async fn fetch_timer(&self, id: Uuid) -> Result<Option<ProductionTimer>, StoreError> {
        let rows: Vec<TimerRow> = self
            .select(
                Table::ProductionTimers,
                &[("select", TIMER_SELECT.into()), ("id", format!("eq.{id}"))],
            )
            .await?;
        Ok(rows.into_iter().next().map(ProductionTimer::from))
    }

    async fn insert_timer(&self, timer: &NewTimer) -> Result<(), StoreError> {
        self.insert(Table::ProductionTimers, timer).await
    }

    async fn update_timer(&self, id: Uuid, patch: &TimerPatch) -> Result<(), StoreError> {
        debug!(%id, status = %patch.status.as_str(), "update timer");
        self.send(
            self.request(Method::PATCH, Table::ProductionTimers)
                .query(&[("id", format!("eq.{id}"))])
                .header("Prefer", "return=minimal")
                .json(patch),
        )
        .await?;
        Ok(())
    }

    async fn insert_log(&self, log: &ProductionLog) -> Result<(), StoreError> {
        let body = LogInsert {
            production_timer_id: log.timer_id,
            produced_units: log.produced_units,
            created_at: log.logged_at,
        };
        self.insert(Table::ProductionLogs, &body).await
    }

    async fn add_team_member(&self, timer_id: Uuid, employee_id: Uuid) -> Result<(), StoreError> {
        let body = TeamInsert {
            production_timer_id: timer_id,
            employee_id,
        };
        self.insert(Table::ProductionTimerEmployees, &body).await
    }

    async fn remove_team_member(
        &self,
        timer_id: Uuid,
        employee_id: Uuid,
    ) -> Result<(), StoreError> {
        self.send(
            self.request(Method::DELETE, Table::ProductionTimerEmployees)
                .query(&[
                    ("production_timer_id", format!("eq.{timer_id}")),
                    ("employee_id", format!("eq.{employee_id}")),
                ]),
        )
        .await?;
        Ok(())
    }

    async fn table_revision(
        &self,
        table: Table,
        filter: Option<&ChangeFilter>,
    ) -> Result<String, StoreError> {
        let mut params: Vec<(&str, String)> = watched_columns(table);
        if let Some(f) = filter {
            params.push((f.column.as_str(), format!("eq.{}", f.value)));
        }
        let response = self
            .send(
                self.request(Method::GET, table)
                    .header("Prefer", "count=exact")
                    .query(&params),
            )
            .await?;
        let content_range = response
            .headers()
            .get("content-range")
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let body = response.text().await?;
        Ok(fingerprint(&content_range, &body))
    }
}
