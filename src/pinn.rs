use crate::model::Model;

/// 中心差分の既定の刻み幅
pub const DEFAULT_STEP: f64 = 1e-4;

/// ある点におけるモデル出力とその空間微分。
///
/// 評価点ごとに作られ、損失の計算が終われば捨てられます。
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct Derivatives {
    pub u: f64,
    pub v: f64,
    pub p: f64,
    pub u_x: f64,
    pub u_y: f64,
    pub v_x: f64,
    pub v_y: f64,
    pub p_x: f64,
    pub p_y: f64,
    pub u_xx: f64,
    pub u_yy: f64,
    pub v_xx: f64,
    pub v_yy: f64,
}

/// Navier–Stokes方程式の3つの残差。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Residuals {
    pub continuity: f64,
    pub momentum_x: f64,
    pub momentum_y: f64,
}

impl Residuals {
    pub fn sum_of_squares(&self) -> f64 {
        self.continuity * self.continuity
            + self.momentum_x * self.momentum_x
            + self.momentum_y * self.momentum_y
    }
}

/// 中心差分でモデル出力の1階・2階微分を計算します。
///
/// `(x, y)`, `(x±h, y)`, `(x, y±h)` の5点でモデルを評価します。
/// pの2階微分は方程式に現れないため計算しません。
pub fn compute_derivatives(model: &Model, x: f64, y: f64, h: f64) -> Derivatives {
    let [u, v, p] = model.forward(x, y);
    let xp = model.forward(x + h, y);
    let xm = model.forward(x - h, y);
    let yp = model.forward(x, y + h);
    let ym = model.forward(x, y - h);

    let first = |plus: f64, minus: f64| (plus - minus) / (2.0 * h);
    let second = |plus: f64, center: f64, minus: f64| (plus - 2.0 * center + minus) / (h * h);

    Derivatives {
        u,
        v,
        p,
        u_x: first(xp[0], xm[0]),
        v_x: first(xp[1], xm[1]),
        p_x: first(xp[2], xm[2]),
        u_y: first(yp[0], ym[0]),
        v_y: first(yp[1], ym[1]),
        p_y: first(yp[2], ym[2]),
        u_xx: second(xp[0], u, xm[0]),
        u_yy: second(yp[0], u, ym[0]),
        v_xx: second(xp[1], v, xm[1]),
        v_yy: second(yp[1], v, ym[1]),
    }
}

/// 定常非圧縮Navier–Stokes方程式の残差を計算します。
///
/// 動粘性係数は `nu = 1/re` です。
pub fn residuals(model: &Model, x: f64, y: f64, re: f64) -> Residuals {
    let d = compute_derivatives(model, x, y, DEFAULT_STEP);
    let nu = 1.0 / re;
    Residuals {
        continuity: d.u_x + d.v_y,
        momentum_x: d.u * d.u_x + d.v * d.u_y + d.p_x - nu * (d.u_xx + d.u_yy),
        momentum_y: d.u * d.v_x + d.v * d.v_y + d.p_y - nu * (d.v_xx + d.v_yy),
    }
}

/// 物理損失を計算します。
///
/// 連続の式とx・y方向の運動量方程式の残差（0になるべき値）の二乗和を返します。
pub fn physics_loss(model: &Model, x: f64, y: f64, re: f64) -> f64 {
    residuals(model, x, y, re).sum_of_squares()
}

/// Dirichlet境界条件の損失 `(u - u_true)² + (v - v_true)²` を計算します。
pub fn boundary_loss(model: &Model, x: f64, y: f64, u_true: f64, v_true: f64) -> f64 {
    let s = model.evaluate(x, y);
    (s.u - u_true).powi(2) + (s.v - v_true).powi(2)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layer::{Activation, DenseLayer};
    use crate::matrix::Matrix;
    use approx::assert_abs_diff_eq;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    fn linear_model(rows: &[Vec<f64>], bias: Vec<f64>) -> Model {
        Model::from_layers(vec![DenseLayer::from_parts(
            Matrix::from_rows(rows),
            bias,
            Activation::Identity,
        )])
    }

    fn zero_model() -> Model {
        linear_model(&[vec![0.0; 2], vec![0.0; 2], vec![0.0; 2]], vec![0.0; 3])
    }

    #[test]
    fn derivatives_of_identity_map() {
        // u = x, v = y, p = 0
        let model = linear_model(&[vec![1.0, 0.0], vec![0.0, 1.0], vec![0.0, 0.0]], vec![0.0; 3]);
        let d = compute_derivatives(&model, 0.8, -0.4, DEFAULT_STEP);
        assert_abs_diff_eq!(d.u, 0.8);
        assert_abs_diff_eq!(d.v, -0.4);
        assert_abs_diff_eq!(d.u_x, 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(d.u_y, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(d.v_x, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(d.v_y, 1.0, epsilon = 1e-6);
        assert_abs_diff_eq!(d.p_x, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(d.p_y, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(d.u_xx, 0.0, epsilon = 1e-3);
        assert_abs_diff_eq!(d.v_yy, 0.0, epsilon = 1e-3);
    }

    #[test]
    fn derivatives_of_tanh_layer_match_analytic() {
        // u = tanh(x), v = tanh(2y), p = tanh(x + y)
        let model = Model::from_layers(vec![DenseLayer::from_parts(
            Matrix::from_rows(&[vec![1.0, 0.0], vec![0.0, 2.0], vec![1.0, 1.0]]),
            vec![0.0; 3],
            Activation::Tanh,
        )]);
        let (x, y) = (0.3, -0.2);
        let d = compute_derivatives(&model, x, y, DEFAULT_STEP);
        let sech2 = |z: f64| 1.0 - z.tanh().powi(2);
        assert_abs_diff_eq!(d.u_x, sech2(x), epsilon = 1e-6);
        assert_abs_diff_eq!(d.v_y, 2.0 * sech2(2.0 * y), epsilon = 1e-6);
        assert_abs_diff_eq!(d.p_x, sech2(x + y), epsilon = 1e-6);
        assert_abs_diff_eq!(d.p_y, sech2(x + y), epsilon = 1e-6);
        // d²/dx² tanh(x) = -2 tanh(x) sech²(x)
        assert_abs_diff_eq!(d.u_xx, -2.0 * x.tanh() * sech2(x), epsilon = 1e-4);
        assert_abs_diff_eq!(d.u_yy, 0.0, epsilon = 1e-4);
    }

    #[test]
    fn zero_network_has_zero_physics_loss() {
        let model = zero_model();
        assert_eq!(physics_loss(&model, 1.5, 0.7, 100.0), 0.0);
    }

    #[test]
    fn residuals_of_known_field() {
        // u = x, v = -y は連続の式を満たすが、u·u_x = x が残る
        let model = linear_model(&[vec![1.0, 0.0], vec![0.0, -1.0], vec![0.0, 0.0]], vec![0.0; 3]);
        let r = residuals(&model, 2.0, 0.5, 100.0);
        assert_abs_diff_eq!(r.continuity, 0.0, epsilon = 1e-6);
        assert_abs_diff_eq!(r.momentum_x, 2.0, epsilon = 1e-4);
        assert_abs_diff_eq!(r.momentum_y, 0.5, epsilon = 1e-4);
        assert_abs_diff_eq!(
            physics_loss(&model, 2.0, 0.5, 100.0),
            4.25,
            epsilon = 1e-3
        );
    }

    #[test]
    fn physics_loss_is_non_negative() {
        let mut rng = StdRng::seed_from_u64(21);
        let model = Model::new(&mut rng);
        for k in 0..20 {
            let (x, y) = (-1.0 + 0.2 * k as f64, 0.9 - 0.09 * k as f64);
            let loss = physics_loss(&model, x, y, 100.0);
            assert!(loss.is_finite() && loss >= 0.0);
        }
    }

    #[test]
    fn boundary_loss_is_squared_velocity_error() {
        let model = linear_model(&[vec![1.0, 0.0], vec![0.0, 1.0], vec![0.0, 0.0]], vec![0.0; 3]);
        assert_abs_diff_eq!(boundary_loss(&model, 0.5, 2.0, 1.0, 0.0), 0.25 + 4.0);
        assert_eq!(boundary_loss(&zero_model(), 0.5, 2.0, 0.0, 0.0), 0.0);
    }
}
