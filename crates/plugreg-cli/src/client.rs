//! Web API backend for [`RecordStore`].
//!
//! Lookups travel as `_<attribute>_value` in filters and responses, and as
//! `<navigation>@odata.bind` references in write payloads.

use std::time::Duration;

use async_trait::async_trait;
use plugreg_storage::{
    Attributes, Condition, Query, Record, RecordId, RecordKind, RecordStore, StoreError,
};
use serde_json::{Value, json};

pub struct WebApiStore {
    http: reqwest::Client,
    api_url: String,
    token: String,
}

impl WebApiStore {
    /// `base_url` is the environment root; requests go to
    /// `<base_url>/api/data/v<api_version>/`.
    pub fn new(
        base_url: &str,
        api_version: &str,
        token: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, StoreError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::internal(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            api_url: format!(
                "{}/api/data/v{}",
                base_url.trim_end_matches('/'),
                api_version
            ),
            token: token.into(),
        })
    }

    fn collection_url(&self, kind: RecordKind) -> String {
        format!("{}/{}", self.api_url, kind.entity_set())
    }

    fn record_url(&self, kind: RecordKind, id: RecordId) -> String {
        format!("{}/{}({})", self.api_url, kind.entity_set(), id)
    }

    fn request(&self, method: reqwest::Method, url: &str) -> reqwest::RequestBuilder {
        self.http
            .request(method, url)
            .bearer_auth(&self.token)
            .header("Accept", "application/json")
            .header("OData-MaxVersion", "4.0")
            .header("OData-Version", "4.0")
    }

    async fn send(&self, req: reqwest::RequestBuilder) -> Result<reqwest::Response, StoreError> {
        req.send()
            .await
            .map_err(|e| StoreError::connection_error(e.to_string()))
    }
}

#[async_trait]
impl RecordStore for WebApiStore {
    async fn retrieve(&self, query: &Query) -> Result<Vec<Record>, StoreError> {
        let url = self.collection_url(query.kind);
        let params = query_params(query);
        tracing::debug!(kind = %query.kind, filter = ?params, "GET");

        let resp = self
            .send(self.request(reqwest::Method::GET, &url).query(&params))
            .await?;
        let body = handle_response(resp).await?;
        let rows = body
            .get("value")
            .and_then(Value::as_array)
            .ok_or_else(|| StoreError::internal("retrieve response has no value array"))?;
        rows.iter().map(|row| record_from_row(query.kind, row)).collect()
    }

    async fn create(&self, kind: RecordKind, attributes: &Attributes) -> Result<RecordId, StoreError> {
        let url = self.collection_url(kind);
        let payload = to_payload(kind, attributes, false);
        let resp = self
            .send(self.request(reqwest::Method::POST, &url).json(&payload))
            .await?;

        let entity_id = resp
            .headers()
            .get("OData-EntityId")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        handle_response(resp).await?;

        let id = entity_id
            .as_deref()
            .and_then(parse_entity_id)
            .ok_or_else(|| StoreError::internal(format!("create of {kind} returned no OData-EntityId")))?;
        tracing::debug!(kind = %kind, id = %id, "Created record");
        Ok(id)
    }

    async fn update(
        &self,
        kind: RecordKind,
        id: RecordId,
        attributes: &Attributes,
    ) -> Result<(), StoreError> {
        let url = self.record_url(kind, id);
        let payload = to_payload(kind, attributes, true);
        let resp = self
            .send(
                self.request(reqwest::Method::PATCH, &url)
                    .header("If-Match", "*")
                    .json(&payload),
            )
            .await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StoreError::not_found(kind, id.to_string()));
        }
        handle_response(resp).await.map(|_| ())
    }

    async fn delete(&self, kind: RecordKind, id: RecordId) -> Result<(), StoreError> {
        let url = self.record_url(kind, id);
        let resp = self.send(self.request(reqwest::Method::DELETE, &url)).await?;
        if resp.status() == reqwest::StatusCode::NOT_FOUND {
            return Err(StoreError::not_found(kind, id.to_string()));
        }
        handle_response(resp).await.map(|_| ())
    }

    async fn add_solution_component(
        &self,
        solution: &str,
        kind: RecordKind,
        id: RecordId,
    ) -> Result<(), StoreError> {
        let component_type = kind.solution_component_type().ok_or_else(|| {
            StoreError::invalid_record(format!("{kind} cannot be a solution component"))
        })?;
        let url = format!("{}/AddSolutionComponent", self.api_url);
        let payload = json!({
            "ComponentId": id.to_string(),
            "ComponentType": component_type,
            "SolutionUniqueName": solution,
            "AddRequiredComponents": false,
            "DoNotIncludeSubcomponents": false,
        });
        let resp = self
            .send(self.request(reqwest::Method::POST, &url).json(&payload))
            .await?;
        handle_response(resp).await.map(|_| ())
    }

    fn backend_name(&self) -> &'static str {
        "webapi"
    }
}

fn query_params(query: &Query) -> Vec<(&'static str, String)> {
    let mut params = Vec::new();
    if let Some(columns) = &query.columns {
        let mut select: Vec<String> = vec![query.kind.primary_id().to_string()];
        for column in columns {
            select.push(select_column(query.kind, column));
        }
        params.push(("$select", select.join(",")));
    }
    if !query.conditions.is_empty() {
        let filter: Vec<String> = query
            .conditions
            .iter()
            .map(|c| filter_clause(query.kind, c))
            .collect();
        params.push(("$filter", filter.join(" and ")));
    }
    if let Some(top) = query.top {
        params.push(("$top", top.to_string()));
    }
    params
}

fn select_column(kind: RecordKind, attribute: &str) -> String {
    if kind.lookup(attribute).is_some() {
        format!("_{attribute}_value")
    } else {
        attribute.to_string()
    }
}

fn filter_clause(kind: RecordKind, condition: &Condition) -> String {
    let attribute = select_column(kind, &condition.attribute);
    let value = match &condition.value {
        Value::Null => "null".to_string(),
        // Lookup ids are unquoted guids.
        Value::String(s) if kind.lookup(&condition.attribute).is_some() => s.clone(),
        Value::String(s) => format!("'{}'", s.replace('\'', "''")),
        other => other.to_string(),
    };
    format!("{attribute} eq {value}")
}

/// Translates lookups into `@odata.bind` references. Null lookups are left
/// out of creates and cleared on updates.
fn to_payload(kind: RecordKind, attributes: &Attributes, is_update: bool) -> Value {
    let mut payload = serde_json::Map::new();
    for (attribute, value) in attributes {
        match kind.lookup(attribute) {
            Some(lookup) => {
                let bind = format!("{}@odata.bind", lookup.navigation);
                match value.as_str() {
                    Some(id) => {
                        payload.insert(
                            bind,
                            Value::String(format!("/{}({})", lookup.target.entity_set(), id)),
                        );
                    }
                    None if is_update => {
                        payload.insert(bind, Value::Null);
                    }
                    None => {}
                }
            }
            None => {
                payload.insert(attribute.clone(), value.clone());
            }
        }
    }
    Value::Object(payload)
}

fn record_from_row(kind: RecordKind, row: &Value) -> Result<Record, StoreError> {
    let object = row
        .as_object()
        .ok_or_else(|| StoreError::internal(format!("{kind} row is not an object")))?;
    let id = object
        .get(kind.primary_id())
        .and_then(Value::as_str)
        .and_then(|s| s.parse::<RecordId>().ok())
        .ok_or_else(|| StoreError::internal(format!("{kind} row has no {}", kind.primary_id())))?;

    let mut attributes = Attributes::new();
    for (key, value) in object {
        if key.contains('@') {
            continue;
        }
        let attribute = key
            .strip_prefix('_')
            .and_then(|k| k.strip_suffix("_value"))
            .unwrap_or(key);
        attributes.insert(attribute.to_string(), value.clone());
    }
    Ok(Record::new(kind, id, attributes))
}

/// Extracts the id from `.../pluginassemblies(<guid>)`.
fn parse_entity_id(entity_id: &str) -> Option<RecordId> {
    let start = entity_id.rfind('(')?;
    let end = entity_id.rfind(')')?;
    entity_id.get(start + 1..end)?.parse().ok()
}

async fn handle_response(resp: reqwest::Response) -> Result<Value, StoreError> {
    let status = resp.status();
    let body = resp.text().await.unwrap_or_default();

    if !status.is_success() {
        let message = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|json| {
                json.get("error")
                    .and_then(|e| e.get("message"))
                    .and_then(Value::as_str)
                    .map(str::to_string)
            })
            .unwrap_or(body);
        return Err(StoreError::rejected(status.as_u16(), message));
    }

    if body.is_empty() {
        return Ok(Value::Null);
    }
    serde_json::from_str(&body)
        .map_err(|e| StoreError::internal(format!("failed to parse response JSON: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn store(server: &MockServer) -> WebApiStore {
        WebApiStore::new(&server.uri(), "9.2", "token", Duration::from_secs(5)).unwrap()
    }

    fn attrs(value: Value) -> Attributes {
        value.as_object().cloned().unwrap()
    }

    #[test]
    fn test_filter_quotes_strings_and_leaves_lookups_bare() {
        let id: RecordId = "6f9619ff-8b86-d011-b42d-00c04fc964ff".parse().unwrap();
        let query = Query::new(RecordKind::PluginType)
            .with_lookup("pluginassemblyid", id)
            .with_eq("typename", "Contoso.O'Brien")
            .select(["typename"]);
        let params = query_params(&query);
        assert_eq!(
            params,
            vec![
                ("$select", "plugintypeid,typename".to_string()),
                (
                    "$filter",
                    format!("_pluginassemblyid_value eq {id} and typename eq 'Contoso.O''Brien'")
                ),
            ]
        );
    }

    #[test]
    fn test_payload_binds_lookups() {
        let plugin_type: RecordId = "6f9619ff-8b86-d011-b42d-00c04fc964ff".parse().unwrap();
        let attributes = attrs(json!({
            "name": "Update of account",
            "stage": 40,
            "plugintypeid": plugin_type.to_string(),
            "impersonatinguserid": null,
        }));

        let created = to_payload(RecordKind::Step, &attributes, false);
        assert_eq!(
            created["eventhandler_plugintype@odata.bind"],
            json!(format!("/plugintypes({plugin_type})"))
        );
        assert!(created.get("impersonatinguserid@odata.bind").is_none());
        assert!(created.get("plugintypeid").is_none());

        let updated = to_payload(RecordKind::Step, &attributes, true);
        assert_eq!(updated["impersonatinguserid@odata.bind"], Value::Null);
    }

    #[test]
    fn test_entity_id_parsing() {
        let id = parse_entity_id(
            "https://contoso.crm.dynamics.com/api/data/v9.2/pluginassemblies(6f9619ff-8b86-d011-b42d-00c04fc964ff)",
        );
        assert_eq!(id.unwrap().to_string(), "6f9619ff-8b86-d011-b42d-00c04fc964ff");
        assert!(parse_entity_id("no id here").is_none());
    }

    #[tokio::test]
    async fn test_retrieve_maps_lookup_columns_back() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/api/data/v9.2/plugintypes"))
            .and(query_param("$filter", "typename eq 'AccountPlugin'"))
            .and(header("Authorization", "Bearer token"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "@odata.context": "...",
                "value": [{
                    "@odata.etag": "W/\"1\"",
                    "plugintypeid": "6f9619ff-8b86-d011-b42d-00c04fc964ff",
                    "typename": "AccountPlugin",
                    "_pluginassemblyid_value": "7f9619ff-8b86-d011-b42d-00c04fc964ff"
                }]
            })))
            .mount(&server)
            .await;

        let records = store(&server)
            .retrieve(&Query::new(RecordKind::PluginType).with_eq("typename", "AccountPlugin"))
            .await
            .unwrap();

        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get_str("typename"), Some("AccountPlugin"));
        assert_eq!(
            records[0].get_id("pluginassemblyid").map(|id| id.to_string()),
            Some("7f9619ff-8b86-d011-b42d-00c04fc964ff".to_string())
        );
        assert!(records[0].get("@odata.etag").is_none());
    }

    #[tokio::test]
    async fn test_create_reads_entity_id_header() {
        let server = MockServer::start().await;
        let entity_id = format!(
            "{}/api/data/v9.2/pluginassemblies(6f9619ff-8b86-d011-b42d-00c04fc964ff)",
            server.uri()
        );
        Mock::given(method("POST"))
            .and(path("/api/data/v9.2/pluginassemblies"))
            .and(body_json(json!({"name": "Contoso.Plugins"})))
            .respond_with(ResponseTemplate::new(204).insert_header("OData-EntityId", entity_id.as_str()))
            .expect(1)
            .mount(&server)
            .await;

        let id = store(&server)
            .create(
                RecordKind::PluginAssembly,
                &attrs(json!({"name": "Contoso.Plugins"})),
            )
            .await
            .unwrap();
        assert_eq!(id.to_string(), "6f9619ff-8b86-d011-b42d-00c04fc964ff");
    }

    #[tokio::test]
    async fn test_rejection_carries_platform_message() {
        let server = MockServer::start().await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(400).set_body_json(json!({
                "error": {"code": "0x80040216", "message": "The object you tried to delete is associated with another object"}
            })))
            .mount(&server)
            .await;

        let err = store(&server)
            .delete(RecordKind::PluginType, RecordId::new())
            .await
            .unwrap_err();
        match err {
            StoreError::Rejected { status, message } => {
                assert_eq!(status, 400);
                assert!(message.contains("associated with another object"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn test_add_solution_component_action() {
        let server = MockServer::start().await;
        let id = RecordId::new();
        Mock::given(method("POST"))
            .and(path("/api/data/v9.2/AddSolutionComponent"))
            .and(body_json(json!({
                "ComponentId": id.to_string(),
                "ComponentType": 92,
                "SolutionUniqueName": "Contoso",
                "AddRequiredComponents": false,
                "DoNotIncludeSubcomponents": false,
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"id": id.to_string()})))
            .expect(1)
            .mount(&server)
            .await;

        store(&server)
            .add_solution_component("Contoso", RecordKind::Step, id)
            .await
            .unwrap();

        let err = store(&server)
            .add_solution_component("Contoso", RecordKind::SdkMessage, id)
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::InvalidRecord { .. }));
    }

    #[tokio::test]
    async fn test_unreachable_host_is_connection_error() {
        let store = WebApiStore::new("http://127.0.0.1:1", "9.2", "t", Duration::from_secs(2)).unwrap();
        let err = store
            .retrieve(&Query::new(RecordKind::SdkMessage))
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::ConnectionError { .. }));
    }
}
