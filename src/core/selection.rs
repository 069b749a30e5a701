//! Selected complaint and the detail panel built from it.

use serde::{Deserialize, Serialize};

use crate::complaint::ComplaintRef;
use crate::proximity::{nearby_indices, NearbyQuery};

pub const EMPTY_HINT: &str = "Click a marker to view complaint details";

/// At most one selected complaint. Independent of marker rebuilds: a
/// selection keeps pointing into the snapshot it was made from.
#[derive(Debug, Clone, Default)]
pub struct SelectionState {
    current: Option<ComplaintRef>,
}

impl SelectionState {
    pub fn select(&mut self, complaint: ComplaintRef) {
        self.current = Some(complaint);
    }

    pub fn clear(&mut self) {
        self.current = None;
    }

    pub fn current(&self) -> Option<&ComplaintRef> {
        self.current.as_ref()
    }

    /// The panel is shown whenever something is selected.
    pub fn is_open(&self) -> bool {
        self.current.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SourceLink {
    pub label: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NearbyEntry {
    /// Slot in the snapshot the selection came from.
    pub index: usize,
    pub issue_type: String,
    pub description: String,
    pub category: String,
    pub date: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ComplaintDetail {
    pub index: usize,
    pub issue_type: String,
    pub color: String,
    pub location: String,
    pub description: String,
    pub category: String,
    pub date_reported: String,
    pub source: String,
    pub source_links: Vec<SourceLink>,
    pub coordinates: String,
    pub nearby_open: bool,
    pub nearby: Vec<NearbyEntry>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum PanelView {
    Empty { hint: String },
    Detail(ComplaintDetail),
}

/// Sidebar state: the selection plus the collapsible nearby list.
#[derive(Debug, Clone)]
pub struct DetailPanel {
    selection: SelectionState,
    nearby_open: bool,
    query: NearbyQuery,
}

impl Default for DetailPanel {
    fn default() -> Self {
        Self::new(NearbyQuery::default())
    }
}

impl DetailPanel {
    pub fn new(query: NearbyQuery) -> Self {
        Self {
            selection: SelectionState::default(),
            nearby_open: true,
            query,
        }
    }

    pub fn select(&mut self, complaint: ComplaintRef) {
        self.selection.select(complaint);
    }

    pub fn close(&mut self) {
        self.selection.clear();
    }

    pub fn selection(&self) -> &SelectionState {
        &self.selection
    }

    pub fn toggle_nearby(&mut self) -> bool {
        self.nearby_open = !self.nearby_open;
        self.nearby_open
    }

    /// Neighbors of the current selection within its own snapshot.
    pub fn nearby(&self) -> Vec<ComplaintRef> {
        let Some(current) = self.selection.current() else {
            return Vec::new();
        };
        let set = current.snapshot();
        nearby_indices(&set[current.index()], set, self.query)
            .into_iter()
            .filter_map(|i| ComplaintRef::new(set.clone(), i))
            .collect()
    }

    /// Make the `n`-th nearby entry the selection. Returns false when there
    /// is no such entry.
    pub fn select_nearby(&mut self, n: usize) -> bool {
        match self.nearby().into_iter().nth(n) {
            Some(next) => {
                self.selection.select(next);
                self.nearby_open = true;
                true
            }
            None => false,
        }
    }

    pub fn render(&self) -> PanelView {
        let Some(c) = self.selection.current() else {
            return PanelView::Empty {
                hint: EMPTY_HINT.to_string(),
            };
        };

        let multiple = c.source_links.len() > 1;
        let source_links = c
            .source_links
            .iter()
            .enumerate()
            .map(|(i, url)| SourceLink {
                label: if multiple {
                    format!("View Source {}", i + 1)
                } else {
                    "View Source".to_string()
                },
                url: url.clone(),
            })
            .collect();

        let nearby = if self.nearby_open {
            self.nearby()
                .into_iter()
                .map(|n| NearbyEntry {
                    index: n.index(),
                    issue_type: n.issue_type.to_string(),
                    description: n.description.clone(),
                    category: n.category.clone(),
                    date: n.date.short_form(),
                })
                .collect()
        } else {
            Vec::new()
        };

        PanelView::Detail(ComplaintDetail {
            index: c.index(),
            issue_type: c.issue_type.to_string(),
            color: c.color().to_string(),
            location: c.location.clone(),
            description: c.description.clone(),
            category: c.category.clone(),
            date_reported: c.date.long_form(),
            source: c.source.clone(),
            source_links,
            coordinates: c.coordinates.to_string(),
            nearby_open: self.nearby_open,
            nearby,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::complaint::{sample, Complaint};
    use std::sync::Arc;

    fn set() -> Arc<[Complaint]> {
        let mut first = sample("Illegal Dumping", 37.43, -122.17);
        first.source_links = vec![
            "https://example.org/1".to_string(),
            "https://example.org/2".to_string(),
        ];
        vec![
            first,
            sample("Air Quality", 37.4301, -122.1701),
            sample("Trash Accumulation", 37.5, -122.3),
        ]
        .into()
    }

    fn detail(view: PanelView) -> ComplaintDetail {
        match view {
            PanelView::Detail(d) => d,
            PanelView::Empty { .. } => panic!("expected detail view"),
        }
    }

    #[test]
    fn empty_panel_shows_hint() {
        let panel = DetailPanel::default();
        assert_eq!(
            panel.render(),
            PanelView::Empty {
                hint: EMPTY_HINT.to_string()
            }
        );
        assert!(panel.nearby().is_empty());
    }

    #[test]
    fn detail_formats_dates_links_and_coordinates() {
        let set = set();
        let mut panel = DetailPanel::default();
        panel.select(ComplaintRef::new(set, 0).unwrap());
        assert!(panel.selection().is_open());

        let d = detail(panel.render());
        assert_eq!(d.issue_type, "Illegal Dumping");
        assert_eq!(d.date_reported, "January 15, 2024");
        assert_eq!(d.coordinates, "37.430000, -122.170000");
        assert_eq!(d.source_links[0].label, "View Source 1");
        assert_eq!(d.source_links[1].label, "View Source 2");
        assert_eq!(d.nearby.len(), 1);
        assert_eq!(d.nearby[0].index, 1);
        assert_eq!(d.nearby[0].date, "1/15/2024");
    }

    #[test]
    fn single_link_is_unnumbered() {
        let mut c = sample("Air Quality", 0.0, 0.0);
        c.source_links = vec!["https://example.org".to_string()];
        let set: Arc<[Complaint]> = vec![c].into();
        let mut panel = DetailPanel::default();
        panel.select(ComplaintRef::new(set, 0).unwrap());
        assert_eq!(detail(panel.render()).source_links[0].label, "View Source");
    }

    #[test]
    fn nearby_section_toggles_and_navigates() {
        let set = set();
        let mut panel = DetailPanel::default();
        panel.select(ComplaintRef::new(set.clone(), 0).unwrap());

        assert!(!panel.toggle_nearby());
        assert!(detail(panel.render()).nearby.is_empty());
        assert!(panel.toggle_nearby());

        assert!(panel.select_nearby(0));
        let current = panel.selection().current().unwrap();
        assert!(current.is(&set[1]));
        assert!(!panel.select_nearby(5));

        panel.close();
        assert!(!panel.selection().is_open());
    }
}
