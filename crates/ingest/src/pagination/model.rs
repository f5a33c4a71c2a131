//! Wire types of the paginated `projects` connection.

use serde::{Deserialize, Deserializer, Serialize};

/// One page of a connection: `{edges, pageInfo, totalCount?}`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub page_info: PageInfo,
    #[serde(default)]
    pub total_count: Option<u64>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    #[serde(default)]
    pub has_next_page: Option<bool>,
    #[serde(default)]
    pub end_cursor: Option<String>,
}

impl PageInfo {
    /// A missing `hasNextPage`, or a next page without a cursor, ends the stream.
    pub fn next_cursor(&self) -> Option<&str> {
        if self.has_next_page.unwrap_or(false) {
            self.end_cursor.as_deref()
        } else {
            None
        }
    }
}

/// One paginated record.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    #[serde(default)]
    pub cursor: Option<String>,
    #[serde(default)]
    pub node: Option<ProjectNode>,
}

impl Edge {
    pub fn new(node: ProjectNode) -> Self {
        Self {
            cursor: None,
            node: Some(node),
        }
    }

    /// Server-assigned identifier, if the edge carries one.
    pub fn id(&self) -> Option<&str> {
        self.node
            .as_ref()
            .and_then(|node| node.id.as_deref())
            .filter(|id| !id.is_empty())
    }
}

/// A project as the endpoint returns it. Every field is optional: queries
/// select different subsets.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProjectNode {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub category: Option<Category>,
    #[serde(default)]
    pub creator: Option<CreatorNode>,
    #[serde(default)]
    pub backers_count: Option<u64>,
    #[serde(default)]
    pub percent_funded: Option<f64>,
    #[serde(default)]
    pub pledged: Option<Money>,
    #[serde(default)]
    pub goal: Option<Money>,
    /// Unix seconds.
    #[serde(default)]
    pub deadline_at: Option<i64>,
    /// Unix seconds.
    #[serde(default)]
    pub launched_at: Option<i64>,
    #[serde(default)]
    pub is_launched: Option<bool>,
    #[serde(default)]
    pub is_project_we_love: Option<bool>,
    #[serde(default)]
    pub is_project_of_the_day: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatorNode {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(default)]
    pub launched_projects: Option<Count>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Count {
    #[serde(default)]
    pub total_count: Option<u64>,
}

/// Money amount in a given currency. The endpoint sends amounts as decimal
/// strings; numbers are accepted too.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Money {
    #[serde(default, deserialize_with = "lenient_f64")]
    pub amount: Option<f64>,
    #[serde(default)]
    pub currency: Option<String>,
}

fn lenient_f64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Option<f64>, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(f64),
        Text(String),
    }

    Ok(match Option::<Raw>::deserialize(deserializer)? {
        Some(Raw::Number(n)) => Some(n),
        Some(Raw::Text(s)) => s.trim().parse().ok(),
        None => None,
    })
}
