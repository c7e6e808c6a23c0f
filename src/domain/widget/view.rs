//! Widget views and their per-view substate.

use serde::{Deserialize, Serialize};

/// Which view is active, without substate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ViewKind {
    Home,
    Chat,
    Stores,
    Catalog,
}

/// The active view together with its substate.
///
/// Entering a view always starts with empty substate.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum View {
    #[default]
    Home,
    Chat,
    Stores { selected_store: Option<String> },
    Catalog { selected_category: Option<String> },
}

impl View {
    pub fn kind(&self) -> ViewKind {
        match self {
            View::Home => ViewKind::Home,
            View::Chat => ViewKind::Chat,
            View::Stores { .. } => ViewKind::Stores,
            View::Catalog { .. } => ViewKind::Catalog,
        }
    }

    /// Fresh view of the given kind.
    pub fn enter(kind: ViewKind) -> Self {
        match kind {
            ViewKind::Home => View::Home,
            ViewKind::Chat => View::Chat,
            ViewKind::Stores => View::Stores {
                selected_store: None,
            },
            ViewKind::Catalog => View::Catalog {
                selected_category: None,
            },
        }
    }
}

impl From<ViewKind> for View {
    fn from(kind: ViewKind) -> Self {
        View::enter(kind)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_view_is_home() {
        assert_eq!(View::default(), View::Home);
    }

    #[test]
    fn entering_a_view_starts_with_empty_substate() {
        assert_eq!(
            View::enter(ViewKind::Stores),
            View::Stores {
                selected_store: None
            }
        );
        assert_eq!(View::enter(ViewKind::Catalog).kind(), ViewKind::Catalog);
    }

    #[test]
    fn kind_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&ViewKind::Catalog).unwrap(), "\"catalog\"");
    }
}
