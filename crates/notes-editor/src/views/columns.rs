use serde::Serialize;

use manos_notes_core::{ElementNode, Path};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ColumnsRender {
    pub path: Path,
    /// Number of blocks in each column.
    pub blocks: Vec<usize>,
}

/// Layout-only view of a two-column block; its content renders as ordinary
/// blocks.
pub fn render_columns(path: &[usize], block: &ElementNode) -> ColumnsRender {
    ColumnsRender {
        path: path.to_vec(),
        blocks: block.children.iter().map(|c| c.children().len()).collect(),
    }
}
