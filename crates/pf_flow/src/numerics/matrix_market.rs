// crates/pf_flow/src/numerics/matrix_market.rs

//! Matrix Market 格式导出
//!
//! 诊断级别 ≥ 3 时，每次 Newton 迭代把雅可比与残差写入
//! `matrix_<time>_<iter>.mtx` / `rhs_<time>_<iter>.mtx`。

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use super::linear_algebra::CsrMatrix;
use crate::error::FlowResult;

/// 按时间与迭代号生成的文件名对
pub fn dump_file_names(dir: &Path, time: f64, iteration: usize) -> (PathBuf, PathBuf) {
    (
        dir.join(format!("matrix_{time:.6}_{iteration}.mtx")),
        dir.join(format!("rhs_{time:.6}_{iteration}.mtx")),
    )
}

/// 写稀疏矩阵（coordinate 格式，1 起始下标）
pub fn write_matrix(path: &Path, matrix: &CsrMatrix) -> FlowResult<()> {
    let mut w = BufWriter::new(File::create(path)?);
    writeln!(w, "%%MatrixMarket matrix coordinate real general")?;
    writeln!(w, "{} {} {}", matrix.n_rows(), matrix.n_cols(), matrix.nnz())?;
    for row in 0..matrix.n_rows() {
        for (col, v) in matrix.row_entries(row) {
            writeln!(w, "{} {} {:.17e}", row + 1, col + 1, v)?;
        }
    }
    w.flush()?;
    Ok(())
}

/// 写稠密向量（array 格式）
pub fn write_vector(path: &Path, values: &[f64]) -> FlowResult<()> {
    let mut w = BufWriter::new(File::create(path)?);
    writeln!(w, "%%MatrixMarket matrix array real general")?;
    writeln!(w, "{} 1", values.len())?;
    for v in values {
        writeln!(w, "{v:.17e}")?;
    }
    w.flush()?;
    Ok(())
}

/// 写一次迭代的线性系统，返回两个文件路径
pub fn dump_system(
    dir: &Path,
    time: f64,
    iteration: usize,
    matrix: &CsrMatrix,
    rhs: &[f64],
) -> FlowResult<(PathBuf, PathBuf)> {
    fs::create_dir_all(dir)?;
    let (matrix_path, rhs_path) = dump_file_names(dir, time, iteration);
    write_matrix(&matrix_path, matrix)?;
    write_vector(&rhs_path, rhs)?;
    Ok((matrix_path, rhs_path))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::numerics::linear_algebra::CsrBuilder;

    #[test]
    fn test_file_names() {
        let (m, r) = dump_file_names(Path::new("out"), 1.5, 3);
        assert_eq!(m, Path::new("out").join("matrix_1.500000_3.mtx"));
        assert_eq!(r, Path::new("out").join("rhs_1.500000_3.mtx"));
    }

    #[test]
    fn test_dump_system() {
        let dir = tempfile::tempdir().unwrap();
        let mut b = CsrBuilder::new_square(2);
        b.add(0, 0, 2.0);
        b.add(1, 0, -1.0);
        let (m, r) = dump_system(dir.path(), 0.0, 1, &b.build(), &[1.0, -2.0]).unwrap();

        let text = fs::read_to_string(m).unwrap();
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines[1], "2 2 2");
        assert!(lines[2].starts_with("1 1 2."));
        assert!(lines[3].starts_with("2 1 -1."));

        let rhs = fs::read_to_string(r).unwrap();
        assert_eq!(rhs.lines().nth(1), Some("2 1"));
        assert_eq!(rhs.lines().count(), 4);
    }
}
