//! 学習済みモデルの流れ場を格子上で評価し、CSVと図に書き出します。

use crate::model::Model;
use crate::training::{CYLINDER_RADIUS, X_RANGE, Y_RANGE, inside_cylinder};
use anyhow::{Context, Result};
use plotters::prelude::*;
use std::fs::File;
use std::io::Write;
use std::path::Path;

/// x方向の格子点数
pub const NX: usize = 60;
/// y方向の格子点数
pub const NY: usize = 30;

/// CSVの1行分の値。
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct GridRow {
    pub x: f64,
    pub y: f64,
    pub u: f64,
    pub v: f64,
    pub p: f64,
    pub speed: f64,
}

/// 1点を評価します。円柱の内部はモデルを呼ばずにすべて0とします。
pub fn grid_row(model: &Model, x: f64, y: f64) -> GridRow {
    if inside_cylinder(x, y) {
        return GridRow {
            x,
            y,
            u: 0.0,
            v: 0.0,
            p: 0.0,
            speed: 0.0,
        };
    }
    let s = model.evaluate(x, y);
    GridRow {
        x,
        y,
        u: s.u,
        v: s.v,
        p: s.p,
        speed: s.speed(),
    }
}

/// `NX × NY` の格子で流れ場を評価します。並びはyが外側、xが内側です。
pub fn sample_grid(model: &Model) -> Vec<GridRow> {
    let (x0, x1) = X_RANGE;
    let (y0, y1) = Y_RANGE;
    let mut rows = Vec::with_capacity(NX * NY);
    for i in 0..NY {
        let y = y0 + (i as f64 / (NY - 1) as f64) * (y1 - y0);
        for j in 0..NX {
            let x = x0 + (j as f64 / (NX - 1) as f64) * (x1 - x0);
            rows.push(grid_row(model, x, y));
        }
    }
    rows
}

/// ヘッダ `x,y,u,v,p,speed` 付きのCSVとして書き出します。
pub fn write_csv<W: Write>(rows: &[GridRow], writer: W) -> Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    wtr.write_record(["x", "y", "u", "v", "p", "speed"])?;
    for row in rows {
        wtr.write_record([
            row.x.to_string(),
            row.y.to_string(),
            row.u.to_string(),
            row.v.to_string(),
            row.p.to_string(),
            row.speed.to_string(),
        ])?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn write_file(rows: &[GridRow], path: &Path) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("'{}' を作成できません", path.display()))?;
    write_csv(rows, file)
        .with_context(|| format!("'{}' への書き込みに失敗しました", path.display()))
}

/// 格子上の流れ場を評価してファイルに保存します。
pub fn export(model: &Model, path: &Path) -> Result<()> {
    write_file(&sample_grid(model), path)?;
    tracing::info!("=> 流れ場を '{}' に保存しました。", path.display());
    Ok(())
}

/// 速度の大きさをヒートマップとしてPNGファイルに出力します。
pub fn plot_speed(rows: &[GridRow], path: &Path) -> Result<()> {
    let max_speed = rows.iter().map(|r| r.speed).fold(0.0, f64::max).max(1e-12);
    let dx = (X_RANGE.1 - X_RANGE.0) / (NX - 1) as f64;
    let dy = (Y_RANGE.1 - Y_RANGE.0) / (NY - 1) as f64;

    let root = BitMapBackend::new(path, (1200, 640)).into_drawing_area();
    root.fill(&WHITE)?;
    let mut chart = ChartBuilder::on(&root)
        .caption("Flow Around Cylinder - PINN Solution", ("sans-serif", 30).into_font())
        .margin(10)
        .x_label_area_size(40)
        .y_label_area_size(50)
        .build_cartesian_2d(X_RANGE.0..X_RANGE.1, Y_RANGE.0..Y_RANGE.1)?;
    chart
        .configure_mesh()
        .disable_mesh()
        .x_desc("x")
        .y_desc("y")
        .draw()?;

    // 速い所ほど赤、遅い所ほど青
    chart.draw_series(rows.iter().map(|r| {
        let hue = (1.0 - r.speed / max_speed) * 240.0 / 360.0;
        Rectangle::new(
            [
                (r.x - dx / 2.0, r.y - dy / 2.0),
                (r.x + dx / 2.0, r.y + dy / 2.0),
            ],
            HSLColor(hue, 0.9, 0.5).filled(),
        )
    }))?;

    let cylinder: Vec<(f64, f64)> = (0..64)
        .map(|k| {
            let theta = k as f64 / 64.0 * std::f64::consts::TAU;
            (CYLINDER_RADIUS * theta.cos(), CYLINDER_RADIUS * theta.sin())
        })
        .collect();
    chart.draw_series(std::iter::once(Polygon::new(cylinder, BLACK.filled())))?;

    root.present()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;

    #[test]
    fn origin_row_is_zero_regardless_of_weights() {
        let model = Model::new(&mut StdRng::seed_from_u64(4));
        let row = grid_row(&model, 0.0, 0.0);
        assert_eq!((row.u, row.v, row.p, row.speed), (0.0, 0.0, 0.0, 0.0));

        let mut buf = Vec::new();
        write_csv(&[row], &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        assert_eq!(text, "x,y,u,v,p,speed\n0,0,0,0,0,0\n");
    }

    #[test]
    fn grid_is_row_major_by_y_then_x() {
        let model = Model::new(&mut StdRng::seed_from_u64(4));
        let rows = sample_grid(&model);
        assert_eq!(rows.len(), NX * NY);
        assert_eq!((rows[0].x, rows[0].y), (-1.0, -1.0));
        assert_eq!((rows[NX - 1].x, rows[NX - 1].y), (3.0, -1.0));
        assert_eq!(rows[NX].y, rows[NX + 1].y);
        assert_eq!((rows[NX * NY - 1].x, rows[NX * NY - 1].y), (3.0, 1.0));
    }

    #[test]
    fn rows_outside_cylinder_match_model() {
        let model = Model::new(&mut StdRng::seed_from_u64(4));
        for row in sample_grid(&model) {
            if inside_cylinder(row.x, row.y) {
                assert_eq!(row.speed, 0.0);
            } else {
                let s = model.evaluate(row.x, row.y);
                assert_eq!((row.u, row.v, row.p), (s.u, s.v, s.p));
                assert!((row.speed - (s.u * s.u + s.v * s.v).sqrt()).abs() < 1e-12);
            }
        }
    }

    #[test]
    fn csv_has_header_and_one_line_per_point() {
        let model = Model::new(&mut StdRng::seed_from_u64(2));
        let mut buf = Vec::new();
        write_csv(&sample_grid(&model), &mut buf).unwrap();
        let text = String::from_utf8(buf).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("x,y,u,v,p,speed"));
        assert_eq!(lines.clone().count(), NX * NY);
        assert!(lines.all(|l| l.split(',').count() == 6));
    }
}
