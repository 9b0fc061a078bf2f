//! 3x3 neighborhood access with edge replication

use super::RasterElement;
use ndarray::ArrayView2;

/// The eight neighbors and center of a cell, row-major:
///
/// ```text
/// a b c
/// d e f
/// g h i
/// ```
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Window3x3 {
    pub values: [f64; 9],
}

impl Window3x3 {
    /// Gather the window around (row, col). Positions that fall outside the
    /// grid take the value of the nearest edge cell.
    pub fn replicate_edges<T: RasterElement>(data: &ArrayView2<'_, T>, row: usize, col: usize) -> Self {
        let (rows, cols) = data.dim();
        let clamp_r = |r: isize| r.clamp(0, rows as isize - 1) as usize;
        let clamp_c = |c: isize| c.clamp(0, cols as isize - 1) as usize;

        let mut values = [f64::NAN; 9];
        let mut k = 0;
        for dr in -1isize..=1 {
            for dc in -1isize..=1 {
                let r = clamp_r(row as isize + dr);
                let c = clamp_c(col as isize + dc);
                values[k] = RasterElement::to_f64(data[(r, c)]).unwrap_or(f64::NAN);
                k += 1;
            }
        }
        Self { values }
    }

    pub fn center(&self) -> f64 {
        self.values[4]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn test_interior_window() {
        let data = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0], [7.0, 8.0, 9.0]];
        let w = Window3x3::replicate_edges(&data.view(), 1, 1);
        assert_eq!(w.values, [1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
    }

    #[test]
    fn test_corner_replicates() {
        let data = array![[1u8, 2], [3, 4]];
        let w = Window3x3::replicate_edges(&data.view(), 0, 0);
        assert_eq!(w.values, [1.0, 1.0, 2.0, 1.0, 1.0, 2.0, 3.0, 3.0, 4.0]);
        assert_eq!(w.center(), 1.0);
    }
}
