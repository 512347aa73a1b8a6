use crate::layer::{Activation, DenseLayer};
use rand::Rng;

/// 隠れ層のユニット数
pub const N_HIDDEN: usize = 32;
/// 隠れ層の数
pub const N_HIDDEN_LAYERS: usize = 3;

/// ある点における流れ場の値 (u, v, p)。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlowSample {
    pub u: f64,
    pub v: f64,
    pub p: f64,
}

impl FlowSample {
    /// 速度の大きさ `sqrt(u² + v²)`
    pub fn speed(&self) -> f64 {
        self.u.hypot(self.v)
    }
}

/// PINNの本体となるニューラルネットワークモデル。
///
/// 座標(x, y)を入力とし、その点における速度(u, v)と圧力pを予測する多層パーセプトロン（MLP）です。
/// 構造は 2 → 32 → 32 → 32 → 3 で固定され、学習で変化するのは重みの値だけです。
#[derive(Debug, Clone)]
pub struct Model {
    layers: Vec<DenseLayer>,
}

impl Model {
    /// 新しいモデルを初期化します。
    pub fn new<R: Rng>(rng: &mut R) -> Self {
        let mut layers = Vec::with_capacity(N_HIDDEN_LAYERS + 1);
        layers.push(DenseLayer::new(2, N_HIDDEN, Activation::Tanh, rng));
        for _ in 1..N_HIDDEN_LAYERS {
            layers.push(DenseLayer::new(N_HIDDEN, N_HIDDEN, Activation::Tanh, rng));
        }
        layers.push(DenseLayer::new(N_HIDDEN, 3, Activation::Identity, rng));
        Self { layers }
    }

    /// 任意の層の並びからモデルを組み立てます。
    ///
    /// # Panics
    ///
    /// 入力が2次元・出力が3次元でない場合、または隣接する層の次元が合わない場合。
    pub fn from_layers(layers: Vec<DenseLayer>) -> Self {
        assert!(!layers.is_empty(), "a model needs at least one layer");
        assert_eq!(layers[0].input_size(), 2, "the first layer must take (x, y)");
        assert_eq!(
            layers[layers.len() - 1].output_size(),
            3,
            "the last layer must produce (u, v, p)"
        );
        for pair in layers.windows(2) {
            assert_eq!(
                pair[0].output_size(),
                pair[1].input_size(),
                "adjacent layers must agree on their width"
            );
        }
        Self { layers }
    }

    pub fn layers(&self) -> &[DenseLayer] {
        &self.layers
    }

    pub fn last_layer(&self) -> &DenseLayer {
        &self.layers[self.layers.len() - 1]
    }

    /// 学習で更新する出力層への可変参照を返します。
    pub fn last_layer_mut(&mut self) -> &mut DenseLayer {
        let last = self.layers.len() - 1;
        &mut self.layers[last]
    }

    /// モデルの順伝播を実行し、`[u, v, p]` を返します。
    pub fn forward(&self, x: f64, y: f64) -> [f64; 3] {
        let mut out = vec![x, y];
        for layer in &self.layers {
            out = layer.forward(&out);
        }
        [out[0], out[1], out[2]]
    }

    /// 外部から利用する唯一の評価関数です。
    pub fn evaluate(&self, x: f64, y: f64) -> FlowSample {
        let [u, v, p] = self.forward(x, y);
        FlowSample { u, v, p }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matrix::Matrix;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn default_architecture() {
        let model = Model::new(&mut StdRng::seed_from_u64(0));
        let shapes: Vec<_> = model
            .layers()
            .iter()
            .map(|l| (l.input_size(), l.output_size(), l.activation()))
            .collect();
        assert_eq!(
            shapes,
            vec![
                (2, 32, Activation::Tanh),
                (32, 32, Activation::Tanh),
                (32, 32, Activation::Tanh),
                (32, 3, Activation::Identity),
            ]
        );
    }

    #[test]
    fn forward_is_deterministic_for_fixed_weights() {
        let model = Model::new(&mut StdRng::seed_from_u64(5));
        assert_eq!(model.forward(1.2, -0.3), model.forward(1.2, -0.3));
        let s = model.evaluate(1.2, -0.3);
        assert_eq!([s.u, s.v, s.p], model.forward(1.2, -0.3));
    }

    #[test]
    fn single_linear_layer_passes_coordinates_through() {
        let layer = DenseLayer::from_parts(
            Matrix::from_rows(&[vec![1.0, 0.0], vec![0.0, 1.0], vec![0.0, 0.0]]),
            vec![0.0; 3],
            Activation::Identity,
        );
        let model = Model::from_layers(vec![layer]);
        assert_eq!(model.forward(0.75, -2.0), [0.75, -2.0, 0.0]);
        assert_eq!(model.evaluate(3.0, 4.0).speed(), 5.0);
    }

    #[test]
    #[should_panic(expected = "(u, v, p)")]
    fn from_layers_rejects_wrong_output_width() {
        let mut rng = StdRng::seed_from_u64(1);
        Model::from_layers(vec![DenseLayer::new(2, 4, Activation::Identity, &mut rng)]);
    }
}
