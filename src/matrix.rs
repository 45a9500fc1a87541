//! Two-dimensional coefficient storage.
//!
//! Bands and code blocks share a small matrix capability: element access plus
//! the two dimensions. `IntGrid` owns its storage; `GridWindow` is a borrowed
//! rectangular view into a parent buffer and is how code blocks alias band
//! storage without copying it. Window offsets are always applied when
//! touching the parent.

use crate::error::{CodecError, Result};

/// Integer matrix capability shared by owned grids and windowed views.
pub trait IntMat {
    fn rows(&self) -> usize;
    fn cols(&self) -> usize;
    fn get(&self, row: usize, col: usize) -> i32;
    fn set(&mut self, row: usize, col: usize, value: i32);
}

/// Owning row-major integer matrix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IntGrid {
    rows: usize,
    cols: usize,
    data: Vec<i32>,
}

impl IntGrid {
    pub fn zeroed(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0; rows * cols],
        }
    }

    pub fn from_vec(rows: usize, cols: usize, data: Vec<i32>) -> Result<Self> {
        if data.len() != rows * cols {
            return Err(CodecError::SizeMismatch {
                expected_rows: rows,
                expected_cols: cols,
                rows: data.len() / cols.max(1),
                cols,
            });
        }
        Ok(Self { rows, cols, data })
    }

    pub fn as_slice(&self) -> &[i32] {
        &self.data
    }

    /// Borrow a rectangular window. The window aliases this grid's storage;
    /// writes through it land in the parent.
    pub fn window(
        &mut self,
        row_off: usize,
        col_off: usize,
        rows: usize,
        cols: usize,
    ) -> Result<GridWindow<'_>> {
        GridWindow::new(&mut self.data, self.cols, self.rows, row_off, col_off, rows, cols)
    }
}

impl IntMat for IntGrid {
    fn rows(&self) -> usize {
        self.rows
    }

    fn cols(&self) -> usize {
        self.cols
    }

    fn get(&self, row: usize, col: usize) -> i32 {
        assert!(row < self.rows && col < self.cols, "IntGrid index out of bounds");
        self.data[row * self.cols + col]
    }

    fn set(&mut self, row: usize, col: usize, value: i32) {
        assert!(row < self.rows && col < self.cols, "IntGrid index out of bounds");
        self.data[row * self.cols + col] = value;
    }
}

/// Borrowed rectangular view into a parent buffer.
///
/// `(row_off, col_off)` locate the window in the parent; `stride` is the
/// parent's row length. The lifetime ties the view to the enclosing coding
/// operation, so a block can never outlive the band that backs it.
#[derive(Debug)]
pub struct GridWindow<'a> {
    data: &'a mut [i32],
    stride: usize,
    row_off: usize,
    col_off: usize,
    rows: usize,
    cols: usize,
}

impl<'a> GridWindow<'a> {
    pub fn new(
        data: &'a mut [i32],
        stride: usize,
        parent_rows: usize,
        row_off: usize,
        col_off: usize,
        rows: usize,
        cols: usize,
    ) -> Result<Self> {
        let parent_cols = stride;
        if row_off + rows > parent_rows || col_off + cols > parent_cols {
            return Err(CodecError::WindowOutOfBounds {
                row_off,
                col_off,
                rows,
                cols,
                parent_rows,
                parent_cols,
            });
        }
        Ok(Self {
            data,
            stride,
            row_off,
            col_off,
            rows,
            cols,
        })
    }

    pub fn row_off(&self) -> usize {
        self.row_off
    }

    pub fn col_off(&self) -> usize {
        self.col_off
    }
}

impl IntMat for GridWindow<'_> {
    fn rows(&self) -> usize {
        self.rows
    }

    fn cols(&self) -> usize {
        self.cols
    }

    fn get(&self, row: usize, col: usize) -> i32 {
        assert!(row < self.rows && col < self.cols, "GridWindow index out of bounds");
        self.data[(self.row_off + row) * self.stride + self.col_off + col]
    }

    fn set(&mut self, row: usize, col: usize, value: i32) {
        assert!(row < self.rows && col < self.cols, "GridWindow index out of bounds");
        self.data[(self.row_off + row) * self.stride + self.col_off + col] = value;
    }
}

/// Owning row-major float matrix used for wavelet coefficients.
#[derive(Debug, Clone, PartialEq)]
pub struct FloatGrid {
    rows: usize,
    cols: usize,
    data: Vec<f32>,
}

impl FloatGrid {
    pub fn zeroed(rows: usize, cols: usize) -> Self {
        Self {
            rows,
            cols,
            data: vec![0.0; rows * cols],
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, row: usize, col: usize) -> f32 {
        assert!(row < self.rows && col < self.cols, "FloatGrid index out of bounds");
        self.data[row * self.cols + col]
    }

    pub fn set(&mut self, row: usize, col: usize, value: f32) {
        assert!(row < self.rows && col < self.cols, "FloatGrid index out of bounds");
        self.data[row * self.cols + col] = value;
    }

    pub fn row(&self, row: usize) -> &[f32] {
        &self.data[row * self.cols..(row + 1) * self.cols]
    }

    pub fn row_mut(&mut self, row: usize) -> &mut [f32] {
        &mut self.data[row * self.cols..(row + 1) * self.cols]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn window_respects_offsets() {
        let mut grid = IntGrid::zeroed(4, 6);
        {
            let mut win = grid.window(1, 2, 2, 3).unwrap();
            assert_eq!(win.rows(), 2);
            assert_eq!(win.cols(), 3);
            win.set(0, 0, 7);
            win.set(1, 2, -9);
        }
        assert_eq!(grid.get(1, 2), 7);
        assert_eq!(grid.get(2, 4), -9);
        assert_eq!(grid.get(0, 0), 0);
    }

    #[test]
    fn window_out_of_bounds_is_rejected() {
        let mut grid = IntGrid::zeroed(4, 4);
        assert!(matches!(
            grid.window(2, 2, 3, 1),
            Err(CodecError::WindowOutOfBounds { .. })
        ));
    }

    #[test]
    fn from_vec_checks_len() {
        assert!(IntGrid::from_vec(2, 3, vec![0; 5]).is_err());
        assert!(IntGrid::from_vec(2, 3, vec![0; 6]).is_ok());
    }
}
