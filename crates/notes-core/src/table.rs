use crate::core::{Attrs, Document, Editor, ElementNode, Node, Point, Selection};
use crate::editing::{CommandError, apply_command, insert_block_tx, text_focus};
use crate::normalize::table_cell;
use crate::ops::{Op, Path, Transaction};
use crate::schema::NodeKind;
use crate::tree::{ancestor_element_path, child_path, element_at_path, first_text_point_in};

pub fn table_row(cols: usize) -> Node {
    Node::element(
        NodeKind::TableRow,
        Attrs::default(),
        (0..cols.max(1)).map(|_| table_cell()).collect(),
    )
}

pub fn table(rows: usize, cols: usize) -> Node {
    Node::element(
        NodeKind::Table,
        Attrs::default(),
        (0..rows.max(1)).map(|_| table_row(cols)).collect(),
    )
}

/// Where the caret sits inside a table.
struct TableCursor<'a> {
    table_path: Path,
    table: &'a ElementNode,
    row_ix: usize,
    cell_ix: usize,
}

impl TableCursor<'_> {
    fn rows(&self) -> usize {
        self.table.children.len()
    }

    fn cols(&self) -> usize {
        self.table
            .children
            .first()
            .map(|row| row.children().len())
            .unwrap_or(0)
            .max(1)
    }

    fn cell_path(&self, row_ix: usize, cell_ix: usize) -> Path {
        child_path(&child_path(&self.table_path, row_ix), cell_ix)
    }

    fn caret_in(&self, row_ix: usize, cell_ix: usize) -> Selection {
        let mut path = self.cell_path(row_ix, cell_ix);
        path.extend([0, 0]);
        Selection::collapsed(Point::new(path, 0))
    }

    /// Replace the whole table with an empty paragraph.
    fn delete_all(&self, source: &str) -> Transaction {
        Transaction::new(vec![
            Op::RemoveNode {
                path: self.table_path.clone(),
            },
            Op::InsertNode {
                path: self.table_path.clone(),
                node: Node::paragraph(""),
            },
        ])
        .selection_after(Selection::collapsed(Point::new(child_path(&self.table_path, 0), 0)))
        .source(source.to_string())
    }
}

fn table_cursor(editor: &Editor) -> Result<TableCursor<'_>, String> {
    let focus = text_focus(editor)?;
    let doc = editor.doc();
    let cell_path = ancestor_element_path(doc, &focus.path, NodeKind::TableCell).ok_or("Not in a table")?;
    let (cell_ix, row_path) = cell_path
        .split_last()
        .ok_or_else(|| "Invalid table cell path".to_string())?;
    let (row_ix, table_path) = row_path
        .split_last()
        .ok_or_else(|| "Invalid table row path".to_string())?;
    let table = element_at_path(doc, table_path)
        .filter(|el| el.kind == NodeKind::Table)
        .ok_or("Invalid table")?;
    Ok(TableCursor {
        table_path: table_path.to_vec(),
        table,
        row_ix: *row_ix,
        cell_ix: *cell_ix,
    })
}

pub(crate) fn insert_table_tx(editor: &Editor, rows: usize, cols: usize) -> Result<Transaction, String> {
    insert_block_tx(editor, table(rows, cols), "command:table.insert").map(|(tx, _)| tx)
}

fn insert_row_tx(editor: &Editor, below: bool) -> Result<Transaction, String> {
    let cursor = table_cursor(editor)?;
    let at = if below { cursor.row_ix + 1 } else { cursor.row_ix };
    Ok(Transaction::new(vec![Op::InsertNode {
        path: child_path(&cursor.table_path, at),
        node: table_row(cursor.cols()),
    }])
    .selection_after(cursor.caret_in(at, cursor.cell_ix.min(cursor.cols() - 1)))
    .source(if below {
        "command:table.insert_row_below"
    } else {
        "command:table.insert_row_above"
    }))
}

pub(crate) fn insert_row_below_tx(editor: &Editor) -> Result<Transaction, String> {
    insert_row_tx(editor, true)
}

fn insert_col_tx(editor: &Editor, right: bool) -> Result<Transaction, String> {
    let cursor = table_cursor(editor)?;
    let at = if right { cursor.cell_ix + 1 } else { cursor.cell_ix };
    let ops = cursor
        .table
        .children
        .iter()
        .enumerate()
        .map(|(row_ix, row)| Op::InsertNode {
            path: cursor.cell_path(row_ix, at.min(row.children().len())),
            node: table_cell(),
        })
        .collect();
    Ok(Transaction::new(ops)
        .selection_after(cursor.caret_in(cursor.row_ix, at))
        .source(if right {
            "command:table.insert_col_right"
        } else {
            "command:table.insert_col_left"
        }))
}

fn delete_row_tx(editor: &Editor) -> Result<Transaction, String> {
    let cursor = table_cursor(editor)?;
    if cursor.rows() <= 1 {
        return Ok(cursor.delete_all("command:table.delete_row"));
    }
    let target_row = cursor.row_ix.min(cursor.rows() - 2);
    Ok(Transaction::new(vec![Op::RemoveNode {
        path: child_path(&cursor.table_path, cursor.row_ix),
    }])
    .selection_after(cursor.caret_in(target_row, cursor.cell_ix.min(cursor.cols() - 1)))
    .source("command:table.delete_row"))
}

fn delete_col_tx(editor: &Editor) -> Result<Transaction, String> {
    let cursor = table_cursor(editor)?;
    if cursor.cols() <= 1 {
        return Ok(cursor.delete_all("command:table.delete_col"));
    }
    let ops = cursor
        .table
        .children
        .iter()
        .enumerate()
        .filter(|(_, row)| cursor.cell_ix < row.children().len())
        .map(|(row_ix, _)| Op::RemoveNode {
            path: cursor.cell_path(row_ix, cursor.cell_ix),
        })
        .collect();
    let target_col = cursor.cell_ix.min(cursor.cols() - 2);
    Ok(Transaction::new(ops)
        .selection_after(cursor.caret_in(cursor.row_ix, target_col))
        .source("command:table.delete_col"))
}

fn delete_table_tx(editor: &Editor) -> Result<Transaction, String> {
    table_cursor(editor).map(|cursor| cursor.delete_all("command:table.delete_table"))
}

/// Caret position in the next (or previous) cell in reading order, or
/// `None` past the table's edge.
pub fn table_cell_point(doc: &Document, cell_path: &[usize], forward: bool) -> Option<Point> {
    let (&cell_ix, row_path) = cell_path.split_last()?;
    let (&row_ix, table_path) = row_path.split_last()?;
    let table = element_at_path(doc, table_path)?;
    let cols = |row: usize| table.children.get(row).map(|r| r.children().len()).unwrap_or(0);

    let (row, cell) = if forward {
        if cell_ix + 1 < cols(row_ix) {
            (row_ix, cell_ix + 1)
        } else if row_ix + 1 < table.children.len() {
            (row_ix + 1, 0)
        } else {
            return None;
        }
    } else if cell_ix > 0 {
        (row_ix, cell_ix - 1)
    } else if row_ix > 0 {
        (row_ix - 1, cols(row_ix - 1).checked_sub(1)?)
    } else {
        return None;
    };

    let target = child_path(&child_path(table_path, row), cell);
    first_text_point_in(doc, &target)
}

impl Editor {
    pub fn insert_table(&mut self, rows: usize, cols: usize) -> Result<(), CommandError> {
        let tx = insert_table_tx(self, rows, cols);
        apply_command(self, "insert table", tx)
    }

    pub fn insert_table_row_above(&mut self) -> Result<(), CommandError> {
        let tx = insert_row_tx(self, false);
        apply_command(self, "insert row above", tx)
    }

    pub fn insert_table_row_below(&mut self) -> Result<(), CommandError> {
        let tx = insert_row_tx(self, true);
        apply_command(self, "insert row below", tx)
    }

    pub fn insert_table_col_left(&mut self) -> Result<(), CommandError> {
        let tx = insert_col_tx(self, false);
        apply_command(self, "insert column left", tx)
    }

    pub fn insert_table_col_right(&mut self) -> Result<(), CommandError> {
        let tx = insert_col_tx(self, true);
        apply_command(self, "insert column right", tx)
    }

    pub fn delete_table_row(&mut self) -> Result<(), CommandError> {
        let tx = delete_row_tx(self);
        apply_command(self, "delete row", tx)
    }

    pub fn delete_table_col(&mut self) -> Result<(), CommandError> {
        let tx = delete_col_tx(self);
        apply_command(self, "delete column", tx)
    }

    pub fn delete_table(&mut self) -> Result<(), CommandError> {
        let tx = delete_table_tx(self);
        apply_command(self, "delete table", tx)
    }

    /// Whether any endpoint of the selection sits inside a table.
    pub fn in_table(&self) -> bool {
        let doc = self.doc();
        let inside = |p: &Point| ancestor_element_path(doc, &p.path, NodeKind::Table).is_some();
        match self.selection() {
            Selection::Text { anchor, focus } => inside(anchor) || inside(focus),
            Selection::Node { path } => ancestor_element_path(doc, path, NodeKind::Table).is_some(),
        }
    }
}
