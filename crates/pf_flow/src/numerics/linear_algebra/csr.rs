// crates/pf_flow/src/numerics/linear_algebra/csr.rs

//! 压缩稀疏行（CSR）矩阵
//!
//! 行对应本地拥有的自由度，列覆盖拥有与影子自由度。组装阶段用
//! [`CsrBuilder`] 逐项累加，完成后一次性压缩成 [`CsrMatrix`]。

use std::collections::BTreeMap;

// =============================================================================
// 稀疏模式
// =============================================================================

/// 稀疏模式：行指针与有序列索引
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CsrPattern {
    n_rows: usize,
    n_cols: usize,
    row_ptr: Vec<usize>,
    col_idx: Vec<usize>,
}

impl CsrPattern {
    /// 行数
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    /// 列数
    #[inline]
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// 非零元数量
    #[inline]
    pub fn nnz(&self) -> usize {
        self.col_idx.len()
    }

    /// 第 row 行的列索引
    #[inline]
    pub fn row_indices(&self, row: usize) -> &[usize] {
        &self.col_idx[self.row_ptr[row]..self.row_ptr[row + 1]]
    }

    /// (row, col) 在值数组中的位置
    pub fn find_index(&self, row: usize, col: usize) -> Option<usize> {
        let start = self.row_ptr[row];
        self.row_indices(row)
            .binary_search(&col)
            .ok()
            .map(|local| start + local)
    }
}

// =============================================================================
// CSR 矩阵
// =============================================================================

/// CSR 格式稀疏矩阵
#[derive(Debug, Clone, PartialEq)]
pub struct CsrMatrix {
    pattern: CsrPattern,
    values: Vec<f64>,
}

impl CsrMatrix {
    /// 行数
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.pattern.n_rows
    }

    /// 列数
    #[inline]
    pub fn n_cols(&self) -> usize {
        self.pattern.n_cols
    }

    /// 是否为方阵
    #[inline]
    pub fn is_square(&self) -> bool {
        self.n_rows() == self.n_cols()
    }

    /// 非零元数量
    #[inline]
    pub fn nnz(&self) -> usize {
        self.values.len()
    }

    /// 稀疏模式
    #[inline]
    pub fn pattern(&self) -> &CsrPattern {
        &self.pattern
    }

    /// (row, col) 的值，不存在时为 0
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.pattern
            .find_index(row, col)
            .map_or(0.0, |idx| self.values[idx])
    }

    /// 累加到已存在的位置，位置不存在时返回 false
    #[inline]
    pub fn add(&mut self, row: usize, col: usize, value: f64) -> bool {
        match self.pattern.find_index(row, col) {
            Some(idx) => {
                self.values[idx] += value;
                true
            }
            None => false,
        }
    }

    /// 第 row 行的 (列, 值)
    pub fn row_entries(&self, row: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        let range = self.pattern.row_ptr[row]..self.pattern.row_ptr[row + 1];
        self.pattern.col_idx[range.clone()]
            .iter()
            .copied()
            .zip(self.values[range].iter().copied())
    }

    /// 只保留前 `n_cols` 列（拥有自由度块），其余列的元素丢弃
    pub fn leading_columns(&self, n_cols: usize) -> CsrMatrix {
        let n_cols = n_cols.min(self.n_cols());
        let mut row_ptr = Vec::with_capacity(self.n_rows() + 1);
        let mut col_idx = Vec::with_capacity(self.nnz());
        let mut values = Vec::with_capacity(self.nnz());

        row_ptr.push(0);
        for row in 0..self.n_rows() {
            for (col, v) in self.row_entries(row).filter(|&(col, _)| col < n_cols) {
                col_idx.push(col);
                values.push(v);
            }
            row_ptr.push(col_idx.len());
        }

        CsrMatrix {
            pattern: CsrPattern {
                n_rows: self.n_rows(),
                n_cols,
                row_ptr,
                col_idx,
            },
            values,
        }
    }

    /// 对角元
    #[inline]
    pub fn diagonal_value(&self, row: usize) -> Option<f64> {
        self.pattern.find_index(row, row).map(|idx| self.values[idx])
    }

    /// y = A x
    ///
    /// # Panics
    /// - `x.len() != n_cols` 或 `y.len() != n_rows`
    pub fn mul_vec(&self, x: &[f64], y: &mut [f64]) {
        assert_eq!(x.len(), self.n_cols(), "x 长度必须等于矩阵列数");
        assert_eq!(y.len(), self.n_rows(), "y 长度必须等于矩阵行数");

        for (row, out) in y.iter_mut().enumerate() {
            *out = self.row_entries(row).map(|(col, v)| v * x[col]).sum();
        }
    }

    /// 行的绝对值和的最大值
    pub fn norm_inf(&self) -> f64 {
        (0..self.n_rows())
            .map(|row| self.row_entries(row).map(|(_, v)| v.abs()).sum::<f64>())
            .fold(0.0, f64::max)
    }
}

// =============================================================================
// 构建器
// =============================================================================

/// 逐项累加的 CSR 构建器
#[derive(Debug, Clone)]
pub struct CsrBuilder {
    n_cols: usize,
    rows: Vec<BTreeMap<usize, f64>>,
}

impl CsrBuilder {
    /// 创建构建器
    pub fn new(n_rows: usize, n_cols: usize) -> Self {
        Self {
            n_cols,
            rows: vec![BTreeMap::new(); n_rows],
        }
    }

    /// 方阵构建器
    #[inline]
    pub fn new_square(n: usize) -> Self {
        Self::new(n, n)
    }

    /// 行数
    #[inline]
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    /// 列数
    #[inline]
    pub fn n_cols(&self) -> usize {
        self.n_cols
    }

    /// 覆盖 (row, col)
    ///
    /// # Panics
    /// - 行或列越界
    pub fn set(&mut self, row: usize, col: usize, value: f64) {
        assert!(col < self.n_cols, "列索引越界");
        self.rows[row].insert(col, value);
    }

    /// 累加到 (row, col)
    ///
    /// # Panics
    /// - 行或列越界
    pub fn add(&mut self, row: usize, col: usize, value: f64) {
        assert!(col < self.n_cols, "列索引越界");
        *self.rows[row].entry(col).or_insert(0.0) += value;
    }

    /// 当前值
    #[inline]
    pub fn get(&self, row: usize, col: usize) -> f64 {
        self.rows[row].get(&col).copied().unwrap_or(0.0)
    }

    /// 非零元数量
    pub fn nnz(&self) -> usize {
        self.rows.iter().map(BTreeMap::len).sum()
    }

    /// 压缩成 CSR 矩阵
    pub fn build(self) -> CsrMatrix {
        let n_rows = self.rows.len();
        let nnz = self.nnz();
        let mut row_ptr = Vec::with_capacity(n_rows + 1);
        let mut col_idx = Vec::with_capacity(nnz);
        let mut values = Vec::with_capacity(nnz);

        row_ptr.push(0);
        for row in self.rows {
            for (col, v) in row {
                col_idx.push(col);
                values.push(v);
            }
            row_ptr.push(col_idx.len());
        }

        CsrMatrix {
            pattern: CsrPattern {
                n_rows,
                n_cols: self.n_cols,
                row_ptr,
                col_idx,
            },
            values,
        }
    }
}
