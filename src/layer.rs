use crate::matrix::Matrix;
use rand::Rng;

/// 重みの初期化範囲 `[-WEIGHT_SCALE, WEIGHT_SCALE]`
pub const WEIGHT_SCALE: f64 = 0.5;
/// バイアスの初期化範囲 `[-BIAS_SCALE, BIAS_SCALE]`
pub const BIAS_SCALE: f64 = 0.1;

/// 全結合層の活性化関数。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activation {
    /// 恒等写像（出力層）
    Identity,
    /// 双曲線正接（隠れ層）
    Tanh,
}

impl Activation {
    fn apply(self, z: &mut [f64]) {
        match self {
            Activation::Identity => {}
            Activation::Tanh => z.iter_mut().for_each(|v| *v = v.tanh()),
        }
    }
}

/// アフィン変換と活性化関数からなる全結合層。
///
/// 重み行列は `output_size × input_size` です。学習で書き換えられるのは重みだけで、
/// バイアスは生成後に変更されません。
#[derive(Debug, Clone)]
pub struct DenseLayer {
    weights: Matrix,
    bias: Vec<f64>,
    activation: Activation,
}

impl DenseLayer {
    /// 小さな一様乱数で初期化した層を作成します。
    pub fn new<R: Rng>(
        input_size: usize,
        output_size: usize,
        activation: Activation,
        rng: &mut R,
    ) -> Self {
        let mut weights = Matrix::new(output_size, input_size);
        weights.random_init(WEIGHT_SCALE, rng);
        let bias = (0..output_size)
            .map(|_| rng.random_range(-BIAS_SCALE..=BIAS_SCALE))
            .collect();
        Self {
            weights,
            bias,
            activation,
        }
    }

    /// 重みとバイアスを直接指定して層を作成します。
    pub fn from_parts(weights: Matrix, bias: Vec<f64>, activation: Activation) -> Self {
        assert_eq!(
            bias.len(),
            weights.rows(),
            "bias length must equal the layer's output size"
        );
        Self {
            weights,
            bias,
            activation,
        }
    }

    pub fn input_size(&self) -> usize {
        self.weights.cols()
    }

    pub fn output_size(&self) -> usize {
        self.weights.rows()
    }

    pub fn activation(&self) -> Activation {
        self.activation
    }

    pub fn weights(&self) -> &Matrix {
        &self.weights
    }

    pub fn weights_mut(&mut self) -> &mut Matrix {
        &mut self.weights
    }

    pub fn bias(&self) -> &[f64] {
        &self.bias
    }

    /// 層の順伝播 `act(W·x + b)` を計算します。
    ///
    /// # Panics
    ///
    /// `x.len()` が `input_size` と一致しない場合。
    pub fn forward(&self, x: &[f64]) -> Vec<f64> {
        let mut z = self.weights.multiply(x);
        for (zi, bi) in z.iter_mut().zip(&self.bias) {
            *zi += bi;
        }
        self.activation.apply(&mut z);
        z
    }
}
