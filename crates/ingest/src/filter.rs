//! Selection of currently running projects.

use crate::store::ProjectMap;

/// Records that are launched and whose deadline lies after `now` (unix seconds).
pub fn active_projects(projects: &ProjectMap, now: i64) -> ProjectMap {
    projects
        .iter()
        .filter(|(_, record)| record.is_active(now))
        .map(|(id, record)| (id.clone(), record.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::currency::StaticRates;
    use crate::pagination::{Edge, ProjectNode};
    use crate::store::merge_batch;
    use chrono::Utc;

    fn edge(id: &str, launched: bool, deadline: Option<i64>) -> Edge {
        Edge::new(ProjectNode {
            id: Some(id.to_string()),
            is_launched: Some(launched),
            deadline_at: deadline,
            ..Default::default()
        })
    }

    #[test]
    fn test_keeps_only_live_projects() {
        let edges = vec![
            edge("live", true, Some(2_000)),
            edge("ended", true, Some(500)),
            edge("draft", false, Some(2_000)),
            edge("undated", true, None),
        ];
        let (store, _) = merge_batch(&ProjectMap::new(), &edges, Utc::now(), &StaticRates::empty());

        let active = active_projects(&store, 1_000);
        assert_eq!(active.keys().collect::<Vec<_>>(), vec!["live"]);
    }
}
