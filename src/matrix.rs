use rand::Rng;

/// 行優先で値を保持する密行列。
///
/// 行数・列数は生成時に固定され、以後変わることはありません。
#[derive(Debug, Clone, PartialEq)]
pub struct Matrix {
    data: Vec<f64>,
    rows: usize,
    cols: usize,
}

impl Matrix {
    /// すべての要素が0の `rows × cols` 行列を作成します。
    pub fn new(rows: usize, cols: usize) -> Self {
        Self {
            data: vec![0.0; rows * cols],
            rows,
            cols,
        }
    }

    /// 行ごとのベクトルから行列を作成します。
    ///
    /// すべての行が同じ長さでなければなりません。
    pub fn from_rows(rows: &[Vec<f64>]) -> Self {
        let cols = rows.first().map_or(0, Vec::len);
        assert!(
            rows.iter().all(|row| row.len() == cols),
            "all rows must have {} columns",
            cols
        );
        Self {
            data: rows.iter().flatten().copied().collect(),
            rows: rows.len(),
            cols,
        }
    }

    pub fn rows(&self) -> usize {
        self.rows
    }

    pub fn cols(&self) -> usize {
        self.cols
    }

    pub fn get(&self, i: usize, j: usize) -> f64 {
        self.data[self.index(i, j)]
    }

    pub fn set(&mut self, i: usize, j: usize, value: f64) {
        let idx = self.index(i, j);
        self.data[idx] = value;
    }

    /// 第 `i` 行をスライスとして返します。
    pub fn row(&self, i: usize) -> &[f64] {
        &self.data[i * self.cols..(i + 1) * self.cols]
    }

    /// すべての要素を `[-scale, scale]` の一様乱数で埋めます。
    pub fn random_init<R: Rng>(&mut self, scale: f64, rng: &mut R) {
        for value in self.data.iter_mut() {
            *value = rng.random_range(-scale..=scale);
        }
    }

    /// 行列とベクトルの積 `W·x` を計算します。
    ///
    /// # Panics
    ///
    /// `x.len()` が列数と一致しない場合。
    pub fn multiply(&self, x: &[f64]) -> Vec<f64> {
        assert_eq!(
            x.len(),
            self.cols,
            "matrix-vector product needs {} inputs",
            self.cols
        );
        (0..self.rows)
            .map(|i| self.row(i).iter().zip(x).map(|(w, v)| w * v).sum())
            .collect()
    }

    fn index(&self, i: usize, j: usize) -> usize {
        assert!(
            i < self.rows && j < self.cols,
            "index ({}, {}) out of bounds for {}x{} matrix",
            i,
            j,
            self.rows,
            self.cols
        );
        i * self.cols + j
    }
}
