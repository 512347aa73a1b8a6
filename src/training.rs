use crate::flow_field;
use crate::model::Model;
use crate::pinn::{boundary_loss, physics_loss};
use crate::{FINAL_FIELD_FILENAME, LOSS_GRAPH_FILENAME, SPEED_PLOT_FILENAME, snapshot_filename};
use anyhow::{Context, Result};
use plotters::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

/// 出力層の重み更新に使う学習率
pub const LEARNING_RATE: f64 = 1e-3;
/// 重み更新に掛ける固定の減衰係数
pub const UPDATE_DAMPING: f64 = 0.1;
/// 重み勾配を差分で求めるときの刻み幅
pub const WEIGHT_STEP: f64 = 1e-4;
/// 更新対象とする出力層の列数の上限
pub const MAX_UPDATED_COLUMNS: usize = 5;
/// 境界損失の重み
pub const BOUNDARY_WEIGHT: f64 = 5.0;
/// 円柱表面の境界損失に掛ける重み
pub const CYLINDER_WEIGHT: f64 = 10.0;
/// 境界条件を課す帯の半幅
pub const BAND_WIDTH: f64 = 0.1;
/// 円柱の半径
pub const CYLINDER_RADIUS: f64 = 0.5;

/// 計算領域 x ∈ [-1, 3], y ∈ [-1, 1]
pub const X_RANGE: (f64, f64) = (-1.0, 3.0);
pub const Y_RANGE: (f64, f64) = (-1.0, 1.0);

/// 点 (x, y) が円柱の内部にあるかどうか。
pub fn inside_cylinder(x: f64, y: f64) -> bool {
    x * x + y * y < CYLINDER_RADIUS * CYLINDER_RADIUS
}

/// 1回の `train` 呼び出しで集計した損失。
///
/// いずれの平均も、棄却された点を含めた要求ステップ数で割っています。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EpochStats {
    /// 物理損失と重み付き境界損失の和の平均
    pub loss: f64,
    /// 物理損失の平均
    pub physics_loss: f64,
    /// 境界損失（`BOUNDARY_WEIGHT` 倍済み）の平均
    pub boundary_loss: f64,
    /// 円柱の外で採用された点の数
    pub accepted: usize,
}

/// 出力層の一部の重みだけを差分勾配で更新する学習器。
///
/// 乱数列を自身で保持するため、シードを固定すれば学習は再現可能です。
#[derive(Debug, Clone)]
pub struct Trainer<R: Rng = StdRng> {
    rng: R,
    learning_rate: f64,
}

impl Trainer<StdRng> {
    /// シードを固定した学習器を作成します。
    pub fn seeded(seed: u64) -> Self {
        Self::new(StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> Trainer<R> {
    pub fn new(rng: R) -> Self {
        Self {
            rng,
            learning_rate: LEARNING_RATE,
        }
    }

    pub fn learning_rate(&self) -> f64 {
        self.learning_rate
    }

    /// 計算領域から一様に点を1つ引きます。円柱の内部なら `None` を返します。
    pub fn sample_point(&mut self) -> Option<(f64, f64)> {
        let x = self.rng.random_range(X_RANGE.0..X_RANGE.1);
        let y = self.rng.random_range(Y_RANGE.0..Y_RANGE.1);
        if inside_cylinder(x, y) {
            None
        } else {
            Some((x, y))
        }
    }

    /// `n_steps` 点をサンプリングして学習し、1点あたりの平均損失を返します。
    pub fn train(&mut self, model: &mut Model, re: f64, n_steps: usize) -> f64 {
        self.train_epoch(model, re, n_steps).loss
    }

    /// `train` と同じ処理を行い、損失の内訳も返します。
    ///
    /// # Panics
    ///
    /// `n_steps` が0の場合。
    pub fn train_epoch(&mut self, model: &mut Model, re: f64, n_steps: usize) -> EpochStats {
        assert!(n_steps > 0, "a training pass needs at least one step");

        let mut total_loss = 0.0;
        let mut total_physics = 0.0;
        let mut total_boundary = 0.0;
        let mut accepted = 0;

        for _ in 0..n_steps {
            let Some((x, y)) = self.sample_point() else {
                continue;
            };
            accepted += 1;

            let p_loss = physics_loss(model, x, y, re);
            let b_loss = boundary_penalty(model, x, y);
            total_loss += p_loss + b_loss * BOUNDARY_WEIGHT;
            total_physics += p_loss;
            total_boundary += b_loss * BOUNDARY_WEIGHT;

            self.update_weights(model, x, y, re);
        }

        let n = n_steps as f64;
        EpochStats {
            loss: total_loss / n,
            physics_loss: total_physics / n,
            boundary_loss: total_boundary / n,
            accepted,
        }
    }

    /// 出力層の先頭 `min(5, cols)` 列の重みを、物理損失の中心差分勾配で更新します。
    ///
    /// 境界損失は勾配に含めません。他の層の重みとバイアスは変更しません。
    pub fn update_weights(&self, model: &mut Model, x: f64, y: f64, re: f64) {
        let (rows, cols) = {
            let w = model.last_layer().weights();
            (w.rows(), w.cols().min(MAX_UPDATED_COLUMNS))
        };

        for i in 0..rows {
            for j in 0..cols {
                let original = model.last_layer().weights().get(i, j);

                model.last_layer_mut().weights_mut().set(i, j, original + WEIGHT_STEP);
                let loss_plus = physics_loss(model, x, y, re);

                model.last_layer_mut().weights_mut().set(i, j, original - WEIGHT_STEP);
                let loss_minus = physics_loss(model, x, y, re);

                let grad = (loss_plus - loss_minus) / (2.0 * WEIGHT_STEP);
                let updated = original - self.learning_rate * grad * UPDATE_DAMPING;
                model.last_layer_mut().weights_mut().set(i, j, updated);
            }
        }
    }
}

/// 点 (x, y) が属する境界帯の損失を合計します（重み `BOUNDARY_WEIGHT` は掛けない）。
///
/// 流入口 `|x+1| < 0.1` では u=1, v=0、円柱表面 `|r-0.5| < 0.1` では滑りなし条件
/// u=v=0（10倍）、上下壁 `||y|-1| < 0.1` では v=0 を課します。各帯は独立に加算されます。
pub fn boundary_penalty(model: &Model, x: f64, y: f64) -> f64 {
    let mut b_loss = 0.0;

    if (x - X_RANGE.0).abs() < BAND_WIDTH {
        b_loss += boundary_loss(model, x, y, 1.0, 0.0);
    }

    let r = x.hypot(y);
    if (r - CYLINDER_RADIUS).abs() < BAND_WIDTH {
        b_loss += boundary_loss(model, x, y, 0.0, 0.0) * CYLINDER_WEIGHT;
    }

    if (y.abs() - Y_RANGE.1).abs() < BAND_WIDTH {
        let v = model.evaluate(x, y).v;
        b_loss += v * v;
    }

    b_loss
}

/// `train` サブコマンドの設定。
#[derive(Debug, Clone)]
pub struct TrainConfig {
    pub reynolds: f64,
    pub epochs: usize,
    pub steps_per_epoch: usize,
    pub log_interval: usize,
    pub snapshot_interval: usize,
    pub seed: Option<u64>,
    pub output_dir: PathBuf,
}

impl Default for TrainConfig {
    fn default() -> Self {
        Self {
            reynolds: 100.0,
            epochs: 1000,
            steps_per_epoch: 10,
            log_interval: 100,
            snapshot_interval: 200,
            seed: None,
            output_dir: PathBuf::from("."),
        }
    }
}

/// 学習終了後にモデルを評価する代表点
pub const PROBE_POINTS: [(f64, f64); 5] = [
    (-0.5, 0.0),
    (0.5, 0.0),
    (0.0, 0.6),
    (1.0, 0.0),
    (2.0, 0.0),
];

/// `train`サブコマンドを実行します。
///
/// 学習中は一定間隔で流れ場をCSVに書き出し、終了後に最終的な流れ場、
/// 速度分布の図、損失グラフを保存します。
pub fn run(config: &TrainConfig) -> Result<()> {
    fs::create_dir_all(&config.output_dir).with_context(|| {
        format!(
            "出力ディレクトリ '{}' を作成できません",
            config.output_dir.display()
        )
    })?;

    let mut rng = match config.seed {
        Some(seed) => StdRng::seed_from_u64(seed),
        None => StdRng::from_os_rng(),
    };
    let mut model = Model::new(&mut rng);
    let mut trainer = Trainer::new(rng);

    let mut total_loss_history = Vec::new();
    let mut phys_loss_history = Vec::new();
    let training_start = Instant::now();

    tracing::info!(
        "学習を開始します (円柱周りの流れ) - Re = {}, エポック数 = {}",
        config.reynolds,
        config.epochs
    );

    for epoch in 0..config.epochs {
        let stats = trainer.train_epoch(&mut model, config.reynolds, config.steps_per_epoch);

        if epoch % config.log_interval.max(1) == 0 {
            total_loss_history.push(stats.loss);
            phys_loss_history.push(stats.physics_loss);
            tracing::info!(
                "[Epoch {:4}] Loss: {:.4e}, Physics Loss: {:.4e}, 採用点: {}/{}",
                epoch,
                stats.loss,
                stats.physics_loss,
                stats.accepted,
                config.steps_per_epoch
            );

            if epoch % config.snapshot_interval.max(1) == 0 {
                let path = config.output_dir.join(snapshot_filename(epoch));
                flow_field::export(&model, &path)?;
            }
        }
    }

    let training_duration = training_start.elapsed();
    tracing::info!("学習が完了しました。");
    tracing::info!("=> 学習時間: {:.2?}", training_duration);

    // --- 結果の保存と描画 ---
    let rows = flow_field::sample_grid(&model);
    let final_path = config.output_dir.join(FINAL_FIELD_FILENAME);
    flow_field::write_file(&rows, &final_path)?;
    tracing::info!("=> 流れ場を '{}' に保存しました。", final_path.display());

    let speed_path = config.output_dir.join(SPEED_PLOT_FILENAME);
    match flow_field::plot_speed(&rows, &speed_path) {
        Ok(()) => tracing::info!("=> 速度分布を '{}' に保存しました。", speed_path.display()),
        Err(e) => tracing::warn!("速度分布の描画に失敗しました: {e:#}"),
    }

    let graph_path = config.output_dir.join(LOSS_GRAPH_FILENAME);
    match plot_loss_history(&total_loss_history, &phys_loss_history, &graph_path) {
        Ok(()) => tracing::info!("=> 損失グラフを '{}' に保存しました。", graph_path.display()),
        Err(e) => tracing::warn!("グラフの描画に失敗しました: {e:#}"),
    }

    tracing::info!("代表点における流れ場:");
    tracing::info!("x\ty\tu\tv\tp");
    for (x, y) in PROBE_POINTS {
        let s = model.evaluate(x, y);
        tracing::info!("{:.3}\t{:.3}\t{:.3}\t{:.3}\t{:.3}", x, y, s.u, s.v, s.p);
    }

    Ok(())
}

/// 学習過程の損失をグラフとしてPNGファイルに出力します。
fn plot_loss_history(
    total_loss_hist: &[f64],
    phys_loss_hist: &[f64],
    path: &std::path::Path,
) -> Result<()> {
    // 損失が0になる点もあるため、対数を取る前に下限を設ける
    let log10 = |v: f64| v.max(1e-12).log10();
    let all = total_loss_hist.iter().chain(phys_loss_hist).map(|&v| log10(v));
    let (min_log_loss, max_log_loss) = all.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    });
    if !min_log_loss.is_finite() {
        anyhow::bail!("損失履歴が空です");
    }

    let root = BitMapBackend::new(path, (800, 600)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Loss History", ("sans-serif", 40).into_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(
            0..total_loss_hist.len(),
            (min_log_loss - 0.5)..(max_log_loss + 0.5),
        )?;
    chart
        .configure_mesh()
        .y_desc("Loss (log10 scale)")
        .x_desc("Log intervals")
        .draw()?;
    chart
        .draw_series(LineSeries::new(
            total_loss_hist
                .iter()
                .enumerate()
                .map(|(i, &val)| (i, log10(val))),
            &RED,
        ))?
        .label("Total Loss")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &RED));
    chart
        .draw_series(LineSeries::new(
            phys_loss_hist
                .iter()
                .enumerate()
                .map(|(i, &val)| (i, log10(val))),
            &BLUE,
        ))?
        .label("Physics Loss")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], &BLUE));
    chart
        .configure_series_labels()
        .background_style(&WHITE.mix(0.8))
        .border_style(&BLACK)
        .draw()?;
    root.present()?;
    Ok(())
}
