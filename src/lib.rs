//! # 物理情報ニューラルネットワーク (PINN) ライブラリ
//!
//! 円柱周りの2次元定常非圧縮流れ (u, v, p) を、小さな全結合ネットワークで近似します。
//! Navier–Stokes方程式の残差を中心差分で評価し、境界条件の罰則項と合わせて損失とします。
//! 重みの更新は出力層の一部だけを対象にした差分勾配による簡易的なものです。

pub mod cli;
pub mod flow_field;
pub mod gradcheck;
pub mod layer;
pub mod matrix;
pub mod model;
pub mod pinn;
pub mod training;

pub use model::{FlowSample, Model};
pub use training::Trainer;

/// 学習終了時の流れ場を保存するファイル名
pub const FINAL_FIELD_FILENAME: &str = "flow_field_final.csv";
/// 速度分布の図のファイル名
pub const SPEED_PLOT_FILENAME: &str = "flow_field_speed.png";
/// 損失グラフのファイル名
pub const LOSS_GRAPH_FILENAME: &str = "loss_graph.png";

/// 学習途中の流れ場を保存するファイル名
pub fn snapshot_filename(epoch: usize) -> String {
    format!("flow_field_epoch_{}.csv", epoch)
}
