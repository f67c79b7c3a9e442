//! Note graph
//!
//! Vertices are live notes. Edges come from wiki-links (directed) and from
//! notes sharing a tag or a folder (unordered pairs, each emitted once).

use crate::config;
use crate::database::{EdgeKind, GraphData, GraphEdge, Repository};
use crate::error::Result;
use std::collections::{BTreeMap, BTreeSet};

/// Every unordered pair within each group, smaller id first
fn pair_edges<'a>(groups: impl IntoIterator<Item = &'a Vec<String>>, kind: EdgeKind) -> Vec<GraphEdge> {
    let mut seen = BTreeSet::new();
    let mut edges = Vec::new();

    for members in groups {
        for (i, a) in members.iter().enumerate() {
            for b in &members[i + 1..] {
                let pair = if a <= b { (a, b) } else { (b, a) };
                if pair.0 != pair.1 && seen.insert(pair) {
                    edges.push(GraphEdge {
                        source: pair.0.clone(),
                        target: pair.1.clone(),
                        kind,
                    });
                }
            }
        }
    }

    edges
}

/// Service for the note graph view
#[derive(Clone)]
pub struct GraphService {
    repo: Repository,
}

impl GraphService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    pub async fn graph(&self) -> Result<GraphData> {
        let mut conn = self.repo.acquire().await?;

        let mut nodes = Repository::graph_nodes(&mut conn).await?;
        if nodes.is_empty() {
            return Ok(GraphData::default());
        }

        let links = Repository::live_links(&mut conn).await?;
        let tag_pairs = Repository::live_note_tag_pairs(&mut conn).await?;

        let mut edges: Vec<GraphEdge> = links
            .into_iter()
            .map(|link| GraphEdge {
                source: link.source_id,
                target: link.target_id,
                kind: EdgeKind::Link,
            })
            .collect();

        let mut by_tag: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for (note_id, tag_id) in tag_pairs {
            by_tag.entry(tag_id).or_default().push(note_id);
        }
        edges.extend(pair_edges(by_tag.values(), EdgeKind::Tag));

        let mut by_folder: BTreeMap<String, Vec<String>> = BTreeMap::new();
        for node in &nodes {
            if let Some(folder_id) = &node.folder_id {
                by_folder.entry(folder_id.clone()).or_default().push(node.id.clone());
            }
        }
        edges.extend(pair_edges(by_folder.values(), EdgeKind::Folder));

        for node in &mut nodes {
            if node.title.is_empty() {
                node.title = config::UNTITLED_LABEL.to_string();
            }
        }

        tracing::debug!("Built graph with {} nodes and {} edges", nodes.len(), edges.len());

        Ok(GraphData { nodes, edges })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::database::{memory_pool, CreateNoteRequest};
    use crate::services::NotesService;

    fn ids(names: &[&str]) -> Vec<String> {
        names.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_pair_edges_dedup_across_groups() {
        let groups = vec![ids(&["b", "a", "c"]), ids(&["a", "b"])];
        let edges = pair_edges(&groups, EdgeKind::Tag);

        let pairs: Vec<(&str, &str)> = edges
            .iter()
            .map(|e| (e.source.as_str(), e.target.as_str()))
            .collect();
        assert_eq!(pairs, vec![("a", "b"), ("b", "c"), ("a", "c")]);
        assert!(edges.iter().all(|e| e.kind == EdgeKind::Tag));
    }

    #[tokio::test]
    async fn test_empty_graph() {
        let service = GraphService::new(Repository::new(memory_pool().await));
        let graph = service.graph().await.unwrap();
        assert!(graph.nodes.is_empty());
        assert!(graph.edges.is_empty());
    }

    #[tokio::test]
    async fn test_graph_edges() {
        let repo = Repository::new(memory_pool().await);
        let notes = NotesService::new(repo.clone());

        let mut tx = repo.begin_write().await.unwrap();
        let folder = Repository::create_folder(&mut tx, "Work", None).await.unwrap();
        let tag = Repository::create_tag(&mut tx, "urgent", None).await.unwrap();
        tx.commit().await.unwrap();

        let target = notes
            .create_note(CreateNoteRequest {
                title: "Target".into(),
                folder_id: Some(folder.id.clone()),
                ..Default::default()
            })
            .await
            .unwrap();
        let source = notes
            .create_note(CreateNoteRequest {
                content: "see [[Target]]".into(),
                folder_id: Some(folder.id.clone()),
                ..Default::default()
            })
            .await
            .unwrap();
        let trashed = notes
            .create_note(CreateNoteRequest {
                title: "Gone".into(),
                ..Default::default()
            })
            .await
            .unwrap();

        for id in [&target.id, &source.id, &trashed.id] {
            notes.add_tag(id, &tag.id).await.unwrap();
        }
        notes.trash_note(&trashed.id, false).await.unwrap();

        let graph = GraphService::new(repo).graph().await.unwrap();

        assert_eq!(graph.nodes.len(), 2);
        let untitled = graph.nodes.iter().find(|n| n.id == source.id).unwrap();
        assert_eq!(untitled.title, "Untitled");

        let kinds: Vec<EdgeKind> = graph.edges.iter().map(|e| e.kind).collect();
        assert_eq!(kinds, vec![EdgeKind::Link, EdgeKind::Tag, EdgeKind::Folder]);

        assert_eq!(graph.edges[0].source, source.id);
        assert_eq!(graph.edges[0].target, target.id);
        assert!(graph.edges.iter().all(|e| e.source != trashed.id && e.target != trashed.id));

        let json = serde_json::to_value(&graph.edges[0]).unwrap();
        assert_eq!(json["type"], "link");
    }
}
