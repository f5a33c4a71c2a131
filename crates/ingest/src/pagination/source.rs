//! Page sources.

use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use super::model::Page;
use crate::client::{ClientError, GraphClient, GraphQuery, GraphResponse};

/// Something that yields one page per cursor.
#[async_trait]
pub trait PageSource: Send {
    /// Fetch the page after `cursor` (`None` for the first page).
    async fn fetch_page(&mut self, cursor: Option<&str>) -> Result<Page, ClientError>;
}

/// Read the connection at `connection` (dotted path under `data`).
///
/// A missing or null connection is an empty page: the stream is exhausted.
pub fn extract_page(response: &GraphResponse, connection: &str) -> Result<Page, ClientError> {
    match response.data_at(connection) {
        None => {
            debug!(connection, "Connection missing from response; treating as empty page");
            Ok(Page::default())
        }
        Some(value) => {
            serde_json::from_value(value.clone()).map_err(|e| ClientError::Decode(e.to_string()))
        }
    }
}

/// A paginated GraphQL query bound to a request client.
///
/// The cursor is passed in the variable named by `cursor_variable`
/// (`nextCursor` by default) next to any fixed variables.
pub struct ConnectionQuery<'a> {
    client: &'a mut GraphClient,
    query: String,
    connection: String,
    cursor_variable: String,
    variables: Map<String, Value>,
}

impl<'a> ConnectionQuery<'a> {
    pub fn new(client: &'a mut GraphClient, query: impl Into<String>) -> Self {
        Self {
            client,
            query: query.into(),
            connection: "projects".to_string(),
            cursor_variable: "nextCursor".to_string(),
            variables: Map::new(),
        }
    }

    pub fn connection(mut self, path: impl Into<String>) -> Self {
        self.connection = path.into();
        self
    }

    pub fn cursor_variable(mut self, name: impl Into<String>) -> Self {
        self.cursor_variable = name.into();
        self
    }

    pub fn variable(mut self, name: impl Into<String>, value: Value) -> Self {
        self.variables.insert(name.into(), value);
        self
    }

    fn build(&self, cursor: Option<&str>) -> GraphQuery {
        let mut variables = self.variables.clone();
        variables.insert(
            self.cursor_variable.clone(),
            cursor.map_or(Value::Null, |c| Value::String(c.to_owned())),
        );
        GraphQuery::new(self.query.clone(), Value::Object(variables))
    }
}

#[async_trait]
impl<'a> PageSource for ConnectionQuery<'a> {
    async fn fetch_page(&mut self, cursor: Option<&str>) -> Result<Page, ClientError> {
        let query = self.build(cursor);
        let response = self.client.request(&query).await?;
        extract_page(&response, &self.connection)
    }
}
