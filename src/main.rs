//! # 物理情報ニューラルネットワーク (PINN) サンプルプログラム
//!
//! 円柱周りの2次元定常流れを、Navier–Stokes方程式の残差を損失とする
//! 小さなネットワークで近似するサンプルです。
//!
//! `clap` クレートを利用して、コマンドラインから`train`（学習）と`check`（微分の検証）の
//! 機能を個別に実行できます。
//!
//! ## 使い方
//!
//! ### 学習
//! ```bash
//! cargo run --release -- train --reynolds 100 --epochs 1000
//! ```
//!
//! ### 微分の検証
//! ```bash
//! cargo run --release -- check --points 32
//! ```

use clap::Parser;
use cylinder_pinn::cli::{Cli, Commands};
use cylinder_pinn::{gradcheck, training};
use tracing_subscriber::EnvFilter;

/// プログラムのエントリーポイント。
///
/// コマンドライン引数を解析し、`train`または`check`の処理に振り分けます。
fn main() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("cylinder_pinn=info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Train(args) => training::run(&args.into())?,
        Commands::Check(args) => {
            gradcheck::run(&args.into())?;
        }
    }
    Ok(())
}
