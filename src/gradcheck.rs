//! 差分微分と自動微分の突き合わせ
//!
//! 学習済みの重みを `burn` の `Linear` 層に写し、座標に関する1階微分を自動微分で計算して、
//! 中心差分で求めた値との差を調べます。

use crate::layer::Activation;
use crate::model::Model;
use crate::pinn::{DEFAULT_STEP, compute_derivatives};
use crate::training::Trainer;
use anyhow::{Result, anyhow};
use burn::backend::{Autodiff, NdArray};
use burn::module::Param;
use burn::nn::{Linear, Tanh};
use burn::tensor::backend::{AutodiffBackend, Backend};
use burn::tensor::{Tensor, TensorData};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::time::Instant;

type MyBackend = Autodiff<NdArray<f64>>;

/// 1点における `[[u_x, u_y], [v_x, v_y], [p_x, p_y]]`
pub type Jacobian = [[f64; 2]; 3];

/// `Model` と同じ重みを持つ `burn` 版のネットワーク。
#[derive(Debug)]
pub struct ReferenceModel<B: Backend> {
    linears: Vec<Linear<B>>,
    activations: Vec<Activation>,
    activation: Tanh,
}

impl<B: Backend> ReferenceModel<B> {
    /// `Model` の重みとバイアスを写したネットワークを作成します。
    pub fn from_model(model: &Model, device: &B::Device) -> Self {
        let mut linears = Vec::with_capacity(model.layers().len());
        let mut activations = Vec::with_capacity(model.layers().len());
        for layer in model.layers() {
            let w = layer.weights();
            // burnのLinearは [d_input, d_output] の形の重みを持つため転置して写す
            let mut values = Vec::with_capacity(w.rows() * w.cols());
            for j in 0..w.cols() {
                for i in 0..w.rows() {
                    values.push(w.get(i, j));
                }
            }
            let weight =
                Tensor::<B, 2>::from_data(TensorData::new(values, [w.cols(), w.rows()]), device);
            let bias = Tensor::<B, 1>::from_data(
                TensorData::new(layer.bias().to_vec(), [layer.output_size()]),
                device,
            );
            linears.push(Linear {
                weight: Param::from_tensor(weight),
                bias: Some(Param::from_tensor(bias)),
            });
            activations.push(layer.activation());
        }
        Self {
            linears,
            activations,
            activation: Tanh::new(),
        }
    }

    /// `[n, 2]` の座標から `[n, 3]` の `(u, v, p)` を計算します。
    pub fn forward(&self, input: Tensor<B, 2>) -> Tensor<B, 2> {
        let mut x = input;
        for (linear, act) in self.linears.iter().zip(&self.activations) {
            x = linear.forward(x);
            if *act == Activation::Tanh {
                x = self.activation.forward(x);
            }
        }
        x
    }
}

impl<B: AutodiffBackend> ReferenceModel<B> {
    /// 各点における出力の座標微分を自動微分で計算します。
    ///
    /// 各出力行は同じ行の入力にしか依存しないため、出力列の総和を逆伝播すれば
    /// 点ごとの勾配がそのまま得られます。
    pub fn first_derivatives(
        &self,
        points: &[(f64, f64)],
        device: &B::Device,
    ) -> Result<Vec<Jacobian>> {
        let n = points.len();
        let flat: Vec<f64> = points.iter().flat_map(|&(x, y)| [x, y]).collect();
        let mut jacobians = vec![[[0.0; 2]; 3]; n];
        if n == 0 {
            return Ok(jacobians);
        }

        for k in 0..3 {
            let coords = Tensor::<B, 2>::from_data(TensorData::new(flat.clone(), [n, 2]), device)
                .require_grad();
            let out = self.forward(coords.clone());
            let grads = out.slice([0..n, k..k + 1]).sum().backward();
            let coord_grads = coords
                .grad(&grads)
                .ok_or_else(|| anyhow!("座標に対する勾配が得られませんでした"))?;
            let values = coord_grads
                .into_data()
                .convert::<f64>()
                .to_vec::<f64>()
                .map_err(|e| anyhow!("勾配テンソルを読み出せません: {e:?}"))?;
            for (i, jacobian) in jacobians.iter_mut().enumerate() {
                jacobian[k] = [values[2 * i], values[2 * i + 1]];
            }
        }
        Ok(jacobians)
    }
}

/// 中心差分で求めた1階微分を `Jacobian` の形にまとめます。
pub fn finite_difference_jacobian(model: &Model, x: f64, y: f64) -> Jacobian {
    let d = compute_derivatives(model, x, y, DEFAULT_STEP);
    [[d.u_x, d.u_y], [d.v_x, d.v_y], [d.p_x, d.p_y]]
}

/// `check` サブコマンドの設定。
#[derive(Debug, Clone)]
pub struct CheckConfig {
    pub seed: u64,
    pub points: usize,
    /// 比較の前に行う学習エポック数
    pub epochs: usize,
    pub reynolds: f64,
    pub steps_per_epoch: usize,
    /// 許容する最大誤差
    pub tolerance: f64,
}

impl Default for CheckConfig {
    fn default() -> Self {
        Self {
            seed: 42,
            points: 32,
            epochs: 0,
            reynolds: 100.0,
            steps_per_epoch: 10,
            tolerance: 1e-6,
        }
    }
}

/// 突き合わせの結果。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CheckReport {
    pub points: usize,
    pub max_abs_error: f64,
}

/// 2つのヤコビアン列の要素ごとの差の最大値
pub fn max_abs_error(a: &[Jacobian], b: &[Jacobian]) -> f64 {
    a.iter()
        .zip(b)
        .flat_map(|(ja, jb)| {
            ja.iter()
                .flatten()
                .zip(jb.iter().flatten())
                .map(|(x, y)| (x - y).abs())
        })
        .fold(0.0, f64::max)
}

/// `check`サブコマンドを実行します。
pub fn run(config: &CheckConfig) -> Result<CheckReport> {
    let device = Default::default();
    let start = Instant::now();

    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut model = Model::new(&mut rng);
    let mut trainer = Trainer::new(rng);
    for _ in 0..config.epochs {
        trainer.train(&mut model, config.reynolds, config.steps_per_epoch);
    }

    let mut points = Vec::with_capacity(config.points);
    while points.len() < config.points {
        if let Some(p) = trainer.sample_point() {
            points.push(p);
        }
    }

    let reference = ReferenceModel::<MyBackend>::from_model(&model, &device);
    let exact = reference.first_derivatives(&points, &device)?;
    let approx: Vec<Jacobian> = points
        .iter()
        .map(|&(x, y)| finite_difference_jacobian(&model, x, y))
        .collect();

    for ((x, y), (e, a)) in points.iter().zip(exact.iter().zip(&approx)) {
        tracing::debug!(
            "({:.3}, {:.3}) autodiff = {:?}, 差分 = {:?}",
            x,
            y,
            e,
            a
        );
    }

    let report = CheckReport {
        points: points.len(),
        max_abs_error: max_abs_error(&exact, &approx),
    };
    tracing::info!(
        "{}点で比較しました。最大誤差: {:.3e} ({:.2?})",
        report.points,
        report.max_abs_error,
        start.elapsed()
    );
    if report.max_abs_error > config.tolerance {
        tracing::warn!(
            "差分微分の誤差が許容値 {:.1e} を超えています",
            config.tolerance
        );
    }
    Ok(report)
}
