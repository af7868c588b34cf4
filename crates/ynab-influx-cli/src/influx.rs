//! InfluxDB 1.x HTTP API: InfluxQL over `/query`, line protocol over `/write`.

use crate::config::Config;
use anyhow::{Context, Result, bail};
use chrono::{DateTime, Utc};
use reqwest::{Method, RequestBuilder, Url};
use serde::Deserialize;
use std::collections::BTreeMap;
use tracing::{debug, info, warn};
use ynab_influx::point::{FieldValue, Point};
use ynab_influx::points::TRANSACTIONS;
use ynab_influx::reconcile::StoredTransaction;
use ynab_influx::sync::PointStore;

pub struct InfluxClient {
    http: reqwest::Client,
    base_url: String,
    database: String,
    credentials: Option<(String, String)>,
    selected: Option<String>,
}

impl InfluxClient {
    pub fn new(config: &Config) -> Self {
        let credentials = (!config.influx_user.is_empty())
            .then(|| (config.influx_user.clone(), config.influx_password.clone()));
        InfluxClient {
            http: reqwest::Client::new(),
            base_url: config.influx_url(),
            database: config.influx_database.clone(),
            credentials,
            selected: None,
        }
    }

    fn request(&self, method: Method, path: &str, params: &[(&str, &str)]) -> Result<RequestBuilder> {
        let mut url = Url::parse(&format!("{}/{path}", self.base_url))
            .with_context(|| format!("Invalid InfluxDB address: {}", self.base_url))?;
        url.query_pairs_mut().extend_pairs(params);
        debug!("{method} {}/{path}", self.base_url);

        let request = self.http.request(method, url);
        Ok(match &self.credentials {
            Some((user, password)) => request.basic_auth(user, Some(password)),
            None => request,
        })
    }

    fn selected_database(&self) -> Result<&str> {
        match &self.selected {
            Some(database) => Ok(database.as_str()),
            None => bail!("No InfluxDB database selected"),
        }
    }

    async fn send(request: RequestBuilder) -> Result<String> {
        let response = request
            .send()
            .await
            .context("Failed to reach InfluxDB")?;
        let status = response.status();
        let body = response
            .text()
            .await
            .context("Failed to read the InfluxDB response")?;
        if !status.is_success() {
            bail!("InfluxDB request failed with {status}: {}", error_message(&body));
        }
        Ok(body)
    }

    async fn query(&self, method: Method, query: &str, database: Option<&str>) -> Result<Vec<Series>> {
        let mut params = vec![("q", query)];
        if let Some(database) = database {
            params.push(("db", database));
        }
        let body = Self::send(self.request(method, "query", &params)?)
            .await
            .with_context(|| format!("InfluxDB query failed: {query}"))?;
        parse_query_response(&body).with_context(|| format!("InfluxDB query failed: {query}"))
    }

    pub async fn list_databases(&self) -> Result<Vec<String>> {
        let series = self.query(Method::GET, "SHOW DATABASES", None).await?;
        Ok(series
            .into_iter()
            .flat_map(|series| series.values)
            .filter_map(|row| row.into_iter().next())
            .filter_map(|name| name.as_str().map(ToOwned::to_owned))
            .collect())
    }

    pub async fn create_database(&self, name: &str) -> Result<()> {
        let query = format!("CREATE DATABASE {}", quote_identifier(name));
        self.query(Method::POST, &query, None).await?;
        Ok(())
    }
}

impl PointStore for InfluxClient {
    async fn prepare(&mut self) -> Result<()> {
        let databases = self.list_databases().await?;
        if !databases.iter().any(|name| *name == self.database) {
            info!("Creating InfluxDB database {}", self.database);
            self.create_database(&self.database).await?;
        }
        self.selected = Some(self.database.clone());
        Ok(())
    }

    async fn stored_transactions(&self) -> Result<Vec<StoredTransaction>> {
        let database = self.selected_database()?;
        let query = format!(
            "SELECT * FROM {}.\"autogen\".{}",
            quote_identifier(database),
            quote_identifier(TRANSACTIONS)
        );
        let series = self.query(Method::GET, &query, Some(database)).await?;
        stored_transactions(series)
    }

    async fn delete_transaction(&self, id: &str) -> Result<()> {
        let database = self.selected_database()?;
        let query = format!(
            "DELETE FROM {} WHERE \"id\"={}",
            quote_identifier(TRANSACTIONS),
            quote_literal(id)
        );
        self.query(Method::POST, &query, Some(database)).await?;
        Ok(())
    }

    async fn write_points(&self, points: &[Point]) -> Result<()> {
        let database = self.selected_database()?;
        let body = encode_batch(points);
        if body.is_empty() {
            return Ok(());
        }

        let request = self
            .request(Method::POST, "write", &[("db", database), ("precision", "s")])?
            .body(body);
        Self::send(request)
            .await
            .with_context(|| format!("Failed to write {} points to InfluxDB", points.len()))?;
        info!("Wrote {} points to {database}", points.len());
        Ok(())
    }
}

fn encode_batch(points: &[Point]) -> String {
    let mut lines = Vec::with_capacity(points.len());
    for point in points {
        match point.to_line() {
            Some(line) => lines.push(line),
            None => warn!(
                "Skipping {} point without fields: {:?}",
                point.measurement, point.tags
            ),
        }
    }
    lines.join("\n")
}

fn quote_identifier(name: &str) -> String {
    format!("\"{}\"", name.replace('\\', "\\\\").replace('"', "\\\""))
}

fn quote_literal(value: &str) -> String {
    format!("'{}'", value.replace('\\', "\\\\").replace('\'', "\\'"))
}

fn error_message(body: &str) -> String {
    #[derive(Deserialize)]
    struct ErrorBody {
        error: String,
    }

    match serde_json::from_str::<ErrorBody>(body) {
        Ok(ErrorBody { error }) => error,
        Err(_) => body.trim().to_owned(),
    }
}

#[derive(Debug, Deserialize)]
struct QueryResponse {
    #[serde(default)]
    results: Vec<StatementResult>,
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StatementResult {
    #[serde(default)]
    series: Vec<Series>,
    error: Option<String>,
    #[serde(default)]
    partial: bool,
}

#[derive(Debug, Deserialize)]
struct Series {
    #[serde(default)]
    columns: Vec<String>,
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
    #[serde(default)]
    partial: bool,
}

fn parse_query_response(body: &str) -> Result<Vec<Series>> {
    let response: QueryResponse =
        serde_json::from_str(body).context("Failed to decode InfluxDB query response")?;
    if let Some(error) = response.error {
        bail!("{error}");
    }

    let mut series = Vec::new();
    for result in response.results {
        if let Some(error) = result.error {
            bail!("{error}");
        }
        if result.partial || result.series.iter().any(|series| series.partial) {
            warn!("InfluxDB returned a partial result, some stored points are missing");
        }
        series.extend(result.series);
    }
    Ok(series)
}

fn stored_transactions(series: Vec<Series>) -> Result<Vec<StoredTransaction>> {
    let mut stored = Vec::new();
    for series in series {
        for row in series.values {
            let mut time = None;
            let mut values = BTreeMap::new();
            for (column, value) in series.columns.iter().zip(row) {
                if column == "time" {
                    let text = value.as_str().unwrap_or_default();
                    let parsed = DateTime::parse_from_rfc3339(text)
                        .with_context(|| format!("Failed to decode stored point time '{value}'"))?;
                    time = Some(parsed.with_timezone(&Utc));
                } else if let Some(value) = field_value(value) {
                    values.insert(column.clone(), value);
                }
            }

            let Some(FieldValue::String(id)) = values.get("id").cloned() else {
                warn!("Ignoring stored transaction point without an id");
                continue;
            };
            stored.push(StoredTransaction { id, time, values });
        }
    }
    Ok(stored)
}

fn field_value(value: serde_json::Value) -> Option<FieldValue> {
    use serde_json::Value;

    match value {
        Value::String(text) => Some(FieldValue::String(text)),
        Value::Bool(flag) => Some(FieldValue::Boolean(flag)),
        Value::Number(number) => match number.as_i64() {
            Some(integer) => Some(FieldValue::Integer(integer)),
            None => number.as_f64().map(FieldValue::Float),
        },
        Value::Null | Value::Array(_) | Value::Object(_) => None,
    }
}
