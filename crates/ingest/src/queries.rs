//! Built-in GraphQL documents.
//!
//! Each paginated query takes its cursor in `$nextCursor` and exposes the
//! `projects` connection.

/// Discovery walk over live projects, ordered by the site's magic sort.
pub const DISCOVER_QUERY: &str = r#"query DiscoverProjects($nextCursor: String) {
  projects(first: 25, after: $nextCursor, state: LIVE, sort: MAGIC) {
    totalCount
    edges {
      cursor
      node {
        ...ProjectFields
      }
    }
    pageInfo {
      hasNextPage
      endCursor
    }
  }
}
"#;

/// Newest projects first, for incremental updates.
pub const NEWEST_QUERY: &str = r#"query NewestProjects($nextCursor: String) {
  projects(first: 25, after: $nextCursor, sort: NEWEST) {
    totalCount
    edges {
      cursor
      node {
        ...ProjectFields
      }
    }
    pageInfo {
      hasNextPage
      endCursor
    }
  }
}
"#;

/// Fields merged into the record store.
pub const PROJECT_FIELDS: &str = r#"fragment ProjectFields on Project {
  id
  name
  slug
  url
  description
  state
  currency
  category { name }
  creator { name url }
  backersCount
  percentFunded
  pledged { amount currency }
  goal { amount currency }
  deadlineAt
  launchedAt
  isLaunched
  isProjectWeLove
  isProjectOfTheDay
}
"#;

/// Creator history and collaborators of one project.
pub const ENRICH_QUERY: &str = r#"query EnrichProject($slug: String!) {
  project(slug: $slug) {
    id
    creator {
      name
      launchedProjects { totalCount }
    }
    collaborators {
      edges { node { name } }
    }
  }
}
"#;

/// Attach [`PROJECT_FIELDS`] to a query that spreads `...ProjectFields`.
pub fn with_project_fields(query: &str) -> String {
    if query.contains("...ProjectFields") && !query.contains("fragment ProjectFields") {
        format!("{query}\n{PROJECT_FIELDS}")
    } else {
        query.to_string()
    }
}
