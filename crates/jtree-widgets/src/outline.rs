#![forbid(unsafe_code)]

//! Outline rendering of a jurisdiction forest.
//!
//! Roots sit at the left margin; deeper levels are drawn with guide
//! characters. Only visible nodes are listed: a node's children appear
//! when it is expanded, or a status row when its fetch is pending or
//! failed.
//!
//! # Example
//!
//! ```
//! use jtree_core::{Forest, Jurisdiction};
//! use jtree_widgets::{Outline, OutlineGuides};
//!
//! let forest = Forest::from_roots(vec![Jurisdiction::new(1, "USA")]).unwrap();
//! let rows = Outline::new().with_guides(OutlineGuides::Ascii).rows(&forest);
//! assert_eq!(Outline::new().with_guides(OutlineGuides::Ascii).render_row(&rows[0]), "+ [ ] USA");
//! ```

use jtree_core::{Forest, NodePath};
use jtree_runtime::{DisplayConfig, GuideStyle, SelectorSnapshot, SelectorStatus};
#[cfg(feature = "tracing")]
use web_time::Instant;

/// Shown while roots load.
pub const LOADING_ROOTS: &str = "Loading...";
/// Shown when roots could not be loaded.
pub const ROOTS_FAILED: &str = "Error loading jurisdictions";
/// Status row under a node whose children are being fetched.
pub const LOADING_CHILDREN: &str = "Loading sub-jurisdictions...";
/// Status row under a node whose fetch failed.
pub const CHILDREN_FAILED: &str = "Error loading sub-jurisdictions";

/// Guide character styles.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutlineGuides {
    /// ASCII guides: `|`, `+--`, `` `-- ``.
    Ascii,
    /// Unicode box-drawing characters (default).
    #[default]
    Unicode,
    /// Unicode with a rounded last-item corner.
    Rounded,
}

impl OutlineGuides {
    /// Vertical continuation (ancestor has siblings below).
    #[must_use]
    pub const fn vertical(&self) -> &str {
        match self {
            Self::Ascii => "|   ",
            Self::Unicode | Self::Rounded => "\u{2502}   ",
        }
    }

    /// Branch guide (item has siblings below).
    #[must_use]
    pub const fn branch(&self) -> &str {
        match self {
            Self::Ascii => "+-- ",
            Self::Unicode | Self::Rounded => "\u{251C}\u{2500}\u{2500} ",
        }
    }

    /// Last-item guide.
    #[must_use]
    pub const fn last(&self) -> &str {
        match self {
            Self::Ascii => "`-- ",
            Self::Unicode => "\u{2514}\u{2500}\u{2500} ",
            Self::Rounded => "\u{2570}\u{2500}\u{2500} ",
        }
    }

    #[must_use]
    pub const fn space(&self) -> &str {
        "    "
    }

    /// Width in columns of each guide segment.
    #[inline]
    #[must_use]
    pub fn width(&self) -> usize {
        4
    }

    const fn disclosure(&self, disclosure: Disclosure) -> &str {
        match (self, disclosure) {
            (_, Disclosure::Leaf) => " ",
            (Self::Ascii, Disclosure::Expanded) => "-",
            (Self::Ascii, Disclosure::Collapsed) => "+",
            (_, Disclosure::Expanded) => "\u{25BE}",
            (_, Disclosure::Collapsed) => "\u{25B8}",
        }
    }
}

impl From<GuideStyle> for OutlineGuides {
    fn from(style: GuideStyle) -> Self {
        match style {
            GuideStyle::Ascii => Self::Ascii,
            GuideStyle::Unicode => Self::Unicode,
            GuideStyle::Rounded => Self::Rounded,
        }
    }
}

/// Expansion marker of a node row.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disclosure {
    Expanded,
    Collapsed,
    /// Children fetched and empty.
    Leaf,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NodeRow {
    pub path: NodePath,
    pub name: String,
    pub checked: bool,
    pub disclosure: Disclosure,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RowKind {
    Node(NodeRow),
    Loading,
    LoadError,
}

/// One line of the outline.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutlineRow {
    /// 0 for roots. Status rows sit one level below their node.
    pub depth: usize,
    /// Guide characters preceding the content.
    pub guide: String,
    pub kind: RowKind,
}

/// Footer text when nothing is selected, unless configured otherwise.
pub const NOTHING_SELECTED: &str = "none";

/// Renders forests and snapshots as outlines.
#[derive(Debug, Clone)]
pub struct Outline {
    guides: OutlineGuides,
    not_found: String,
}

impl Default for Outline {
    fn default() -> Self {
        Self {
            guides: OutlineGuides::default(),
            not_found: NOTHING_SELECTED.to_string(),
        }
    }
}

impl Outline {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Guides and "not found" text taken from the selector's display settings.
    #[must_use]
    pub fn from_display(display: &DisplayConfig) -> Self {
        Self::new()
            .with_guides(display.guides.into())
            .with_not_found(display.not_found.clone())
    }

    /// Footer text shown when nothing is selected.
    #[must_use]
    pub fn with_not_found(mut self, text: impl Into<String>) -> Self {
        self.not_found = text.into();
        self
    }

    #[must_use]
    pub fn with_guides(mut self, guides: OutlineGuides) -> Self {
        self.guides = guides;
        self
    }

    #[must_use]
    pub fn guides(&self) -> OutlineGuides {
        self.guides
    }

    /// Visible rows in display order.
    #[must_use]
    pub fn rows(&self, forest: &Forest) -> Vec<OutlineRow> {
        let mut rows = Vec::new();
        let mut is_last = Vec::with_capacity(8);
        for root in forest.roots() {
            self.push_node(forest, &root, &mut is_last, &mut rows);
        }
        rows
    }

    /// One row as text, without a trailing newline.
    #[must_use]
    pub fn render_row(&self, row: &OutlineRow) -> String {
        let content = match &row.kind {
            RowKind::Node(node) => format!(
                "{} [{}] {}",
                self.guides.disclosure(node.disclosure),
                if node.checked { 'x' } else { ' ' },
                node.name
            ),
            RowKind::Loading => LOADING_CHILDREN.to_string(),
            RowKind::LoadError => CHILDREN_FAILED.to_string(),
        };
        format!("{}{}", row.guide, content)
    }

    /// The whole snapshot: status or rows, the latest notice, then the
    /// `Selected:` footer.
    #[must_use]
    pub fn render(&self, snapshot: &SelectorSnapshot) -> String {
        #[cfg(feature = "tracing")]
        let render_start = Instant::now();
        #[cfg(feature = "tracing")]
        let render_span = tracing::debug_span!(
            "outline.render",
            nodes = snapshot.forest.len(),
            rows = tracing::field::Empty,
            render_duration_us = tracing::field::Empty,
        );
        #[cfg(feature = "tracing")]
        let _render_guard = render_span.enter();

        let mut lines = match &snapshot.status {
            SelectorStatus::LoadingRoots => vec![LOADING_ROOTS.to_string()],
            SelectorStatus::Failed(_) => vec![ROOTS_FAILED.to_string()],
            SelectorStatus::Ready => self
                .rows(&snapshot.forest)
                .iter()
                .map(|row| self.render_row(row))
                .collect(),
        };

        #[cfg(feature = "tracing")]
        render_span.record("rows", lines.len() as u64);

        if snapshot.status == SelectorStatus::Ready {
            lines.push(String::new());
            if let Some(notice) = &snapshot.notice {
                lines.push(notice.clone());
            }
            lines.push(format!(
                "Selected: {}",
                snapshot.breadcrumb_or(&self.not_found)
            ));
        }

        #[cfg(feature = "tracing")]
        render_span.record(
            "render_duration_us",
            render_start.elapsed().as_micros() as u64,
        );

        let mut out = lines.join("\n");
        out.push('\n');
        out
    }

    fn guide(&self, is_last: &[bool]) -> String {
        let Some((own, ancestors)) = is_last.split_last() else {
            return String::new();
        };
        let mut guide = String::with_capacity(self.guides.width() * is_last.len());
        for &last in ancestors {
            guide.push_str(if last {
                self.guides.space()
            } else {
                self.guides.vertical()
            });
        }
        guide.push_str(if *own {
            self.guides.last()
        } else {
            self.guides.branch()
        });
        guide
    }

    fn push_node(
        &self,
        forest: &Forest,
        path: &NodePath,
        is_last: &mut Vec<bool>,
        rows: &mut Vec<OutlineRow>,
    ) {
        let Some(node) = forest.get(path) else {
            return;
        };
        let disclosure = if node.is_fetched_leaf() {
            Disclosure::Leaf
        } else if node.is_expanded() {
            Disclosure::Expanded
        } else {
            Disclosure::Collapsed
        };
        rows.push(OutlineRow {
            depth: path.depth(),
            guide: self.guide(is_last),
            kind: RowKind::Node(NodeRow {
                path: path.clone(),
                name: node.name().to_string(),
                checked: node.is_checked(),
                disclosure,
            }),
        });

        if !node.is_expanded() {
            return;
        }
        let status = if node.is_loading_children() {
            Some(RowKind::Loading)
        } else if node.has_load_error() {
            Some(RowKind::LoadError)
        } else {
            None
        };
        if let Some(kind) = status {
            is_last.push(true);
            rows.push(OutlineRow {
                depth: path.depth() + 1,
                guide: self.guide(is_last),
                kind,
            });
            is_last.pop();
            return;
        }

        let children = forest.children_of(path).unwrap_or_default();
        let count = children.len();
        for (i, child) in children.iter().enumerate() {
            is_last.push(i + 1 == count);
            self.push_node(forest, child, is_last, rows);
            is_last.pop();
        }
    }
}
