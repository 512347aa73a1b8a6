use crate::gradcheck::CheckConfig;
use crate::training::TrainConfig;
use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// clapでコマンドラインの構造を定義します。
#[derive(Parser, Debug)]
#[command(author, version, about = "A Physics-Informed Neural Network (PINN) for steady flow around a cylinder", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

/// 実行するサブコマンドを定義します（train または check）。
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// PINNモデルを学習し、流れ場と損失グラフをファイルに保存します
    Train(TrainArgs),
    /// 差分で求めた微分を自動微分の結果と比較します
    Check(CheckArgs),
}

#[derive(Args, Debug)]
pub struct TrainArgs {
    /// レイノルズ数
    #[arg(long, default_value_t = 100.0)]
    pub reynolds: f64,

    /// エポック数
    #[arg(long, default_value_t = 1000)]
    pub epochs: usize,

    /// 1エポックでサンプリングする点の数（1以上）
    #[arg(
        long,
        default_value_t = 10,
        value_parser = clap::builder::RangedU64ValueParser::<usize>::new().range(1..)
    )]
    pub steps_per_epoch: usize,

    /// 損失を表示する間隔（エポック）
    #[arg(long, default_value_t = 100)]
    pub log_interval: usize,

    /// 流れ場を保存する間隔（エポック）
    #[arg(long, default_value_t = 200)]
    pub snapshot_interval: usize,

    /// 乱数のシード（省略時はOSの乱数）
    #[arg(long)]
    pub seed: Option<u64>,

    /// 出力先のディレクトリ
    #[arg(long, default_value = ".")]
    pub output_dir: PathBuf,
}

#[derive(Args, Debug)]
pub struct CheckArgs {
    /// 乱数のシード
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// 比較する点の数
    #[arg(long, default_value_t = 32)]
    pub points: usize,

    /// 比較の前に行う学習エポック数
    #[arg(long, default_value_t = 0)]
    pub epochs: usize,

    /// レイノルズ数
    #[arg(long, default_value_t = 100.0)]
    pub reynolds: f64,

    /// 許容する最大誤差
    #[arg(long, default_value_t = 1e-6)]
    pub tolerance: f64,
}

impl From<TrainArgs> for TrainConfig {
    fn from(args: TrainArgs) -> Self {
        Self {
            reynolds: args.reynolds,
            epochs: args.epochs,
            steps_per_epoch: args.steps_per_epoch,
            log_interval: args.log_interval,
            snapshot_interval: args.snapshot_interval,
            seed: args.seed,
            output_dir: args.output_dir,
        }
    }
}

impl From<CheckArgs> for CheckConfig {
    fn from(args: CheckArgs) -> Self {
        Self {
            seed: args.seed,
            points: args.points,
            epochs: args.epochs,
            reynolds: args.reynolds,
            tolerance: args.tolerance,
            ..Self::default()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn train_defaults() {
        let cli = Cli::try_parse_from(["cylinder-pinn", "train"]).unwrap();
        let Commands::Train(args) = cli.command else {
            panic!("expected train");
        };
        let config = TrainConfig::from(args);
        let default = TrainConfig::default();
        assert_eq!(config.reynolds, default.reynolds);
        assert_eq!(config.epochs, default.epochs);
        assert_eq!(config.steps_per_epoch, default.steps_per_epoch);
        assert_eq!(config.seed, None);
    }

    #[test]
    fn check_flags() {
        let cli = Cli::try_parse_from(["cylinder-pinn", "check", "--points", "4", "--seed", "9"])
            .unwrap();
        let Commands::Check(args) = cli.command else {
            panic!("expected check");
        };
        let config = CheckConfig::from(args);
        assert_eq!((config.points, config.seed), (4, 9));
    }

    #[test]
    fn zero_steps_per_epoch_is_a_usage_error() {
        let err = Cli::try_parse_from(["cylinder-pinn", "train", "--steps-per-epoch", "0"])
            .unwrap_err();
        assert_eq!(err.kind(), clap::error::ErrorKind::ValueValidation);

        let cli =
            Cli::try_parse_from(["cylinder-pinn", "train", "--steps-per-epoch", "3"]).unwrap();
        let Commands::Train(args) = cli.command else {
            panic!("expected train");
        };
        assert_eq!(args.steps_per_epoch, 3);
    }
}
