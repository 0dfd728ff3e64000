use std::sync::Arc;

use tracing::trace;

use super::super::domain::{ModeFlags, TreeVersionId};
use super::super::favorite::FavoriteId;
use super::{contracted_view, filtered_view, ProjectedTree, ProjectionInput};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ViewKind {
    Filtered,
    Contracted,
}

/// Exact input tuple a projection was computed from.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ProjectionKey {
    pub tree_version: TreeVersionId,
    pub tree_revision: u64,
    pub favorite: Option<(FavoriteId, u64)>,
    pub contract_revision: u64,
    pub flags: ModeFlags,
    pub keyword: Option<String>,
}

impl ProjectionKey {
    pub fn of(input: &ProjectionInput<'_>) -> Self {
        Self {
            tree_version: input.tree.version_id,
            tree_revision: input.tree.revision,
            favorite: input
                .favorite
                .map(|favorite| (favorite.id, favorite.revision)),
            contract_revision: input.contract.revision,
            flags: input.flags,
            keyword: input.keyword.map(str::to_string),
        }
    }
}

/// Single-entry memo per view kind; a different key recomputes and replaces the entry.
#[derive(Debug, Default)]
pub struct ProjectionCache {
    filtered: Option<(ProjectionKey, Arc<ProjectedTree>)>,
    contracted: Option<(ProjectionKey, Arc<ProjectedTree>)>,
    computed: u64,
}

impl ProjectionCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn view(&mut self, kind: ViewKind, input: &ProjectionInput<'_>) -> Arc<ProjectedTree> {
        let key = ProjectionKey::of(input);
        let slot = match kind {
            ViewKind::Filtered => &mut self.filtered,
            ViewKind::Contracted => &mut self.contracted,
        };

        if let Some((cached_key, projected)) = slot.as_ref() {
            if *cached_key == key {
                trace!(?kind, "projection cache hit");
                return Arc::clone(projected);
            }
        }

        let projected = Arc::new(match kind {
            ViewKind::Filtered => filtered_view(input),
            ViewKind::Contracted => contracted_view(input),
        });
        *slot = Some((key, Arc::clone(&projected)));
        self.computed += 1;
        projected
    }

    /// Number of projections actually computed, cache hits excluded.
    pub fn computed(&self) -> u64 {
        self.computed
    }
}
