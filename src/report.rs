//! Training artifacts
//!
//! Renders the row-normalized confusion-matrix heatmap and the accuracy
//! curves as PNGs, and exports the epoch history as CSV. File stems follow
//! the model name so runs with different backbones never collide.

use std::path::Path;

use anyhow::{Context, Result};
use plotters::prelude::*;
use plotters::style::text_anchor::{HPos, Pos, VPos};
use tracing::info;

use crate::metrics::ConfusionMatrix;
use crate::training::EpochRecord;

const HEATMAP_SIZE: (u32, u32) = (640, 600);
const CURVES_SIZE: (u32, u32) = (900, 600);

/// Deepest heatmap shade, matching a blues colormap endpoint
const BLUE_DARK: (u8, u8, u8) = (8, 48, 107);

/// Render the row-normalized confusion matrix as a heatmap PNG.
///
/// Cells fade from white toward dark blue with the normalized value. Each
/// cell is annotated with its value truncated to two decimals, drawn black
/// on light cells and white on dark ones.
pub fn render_confusion_matrix(matrix: &ConfusionMatrix, path: &Path) -> Result<()> {
    let normalized = matrix.row_normalized();
    let n = matrix.num_classes();

    let root = BitMapBackend::new(path, HEATMAP_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let (width, height) = HEATMAP_SIZE;
    let left = 90i32;
    let top = 50i32;
    let right = width as i32 - 40;
    let bottom = height as i32 - 90;
    let cell_w = (right - left) / n as i32;
    let cell_h = (bottom - top) / n as i32;

    let title_style = ("sans-serif", 24).into_font().color(&BLACK);
    root.draw_text(
        "Confusion matrix",
        &title_style.pos(Pos::new(HPos::Center, VPos::Top)),
        ((left + right) / 2, 12),
    )?;

    let label_style = ("sans-serif", 18).into_font().color(&BLACK);
    let cell_style = ("sans-serif", 16).into_font();

    for (row, values) in normalized.iter().enumerate() {
        for (col, &value) in values.iter().enumerate() {
            let x0 = left + col as i32 * cell_w;
            let y0 = top + row as i32 * cell_h;
            let shade = heat_color(value);
            root.draw(&Rectangle::new(
                [(x0, y0), (x0 + cell_w, y0 + cell_h)],
                shade.filled(),
            ))?;

            let text_color = if value < 0.5 { BLACK } else { WHITE };
            root.draw_text(
                &format!("{:.2}", truncate_hundredths(value)),
                &cell_style
                    .clone()
                    .color(&text_color)
                    .pos(Pos::new(HPos::Center, VPos::Center)),
                (x0 + cell_w / 2, y0 + cell_h / 2),
            )?;
        }
    }

    // Tick labels are the grade indices, matching the matrix ordering
    for i in 0..n {
        let center_x = left + i as i32 * cell_w + cell_w / 2;
        let center_y = top + i as i32 * cell_h + cell_h / 2;
        root.draw_text(
            &i.to_string(),
            &label_style
                .clone()
                .pos(Pos::new(HPos::Center, VPos::Top)),
            (center_x, bottom + 8),
        )?;
        root.draw_text(
            &i.to_string(),
            &label_style
                .clone()
                .pos(Pos::new(HPos::Right, VPos::Center)),
            (left - 10, center_y),
        )?;
    }

    root.draw_text(
        "Predicted label",
        &label_style
            .clone()
            .pos(Pos::new(HPos::Center, VPos::Top)),
        ((left + right) / 2, bottom + 40),
    )?;
    root.draw_text(
        "True label",
        &label_style
            .clone()
            .transform(FontTransform::Rotate270)
            .pos(Pos::new(HPos::Center, VPos::Center)),
        (24, (top + bottom) / 2),
    )?;

    root.present()
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!("Wrote confusion matrix to {}", path.display());
    Ok(())
}

/// Render train and test accuracy over epochs as a line chart PNG
pub fn render_accuracy_curves(
    history: &[EpochRecord],
    model_name: &str,
    path: &Path,
) -> Result<()> {
    let root = BitMapBackend::new(path, CURVES_SIZE).into_drawing_area();
    root.fill(&WHITE)?;

    let x_max = (history.len() as f64).max(2.0);
    let mut chart = ChartBuilder::on(&root)
        .caption(
            format!("Result Comparison({model_name})"),
            ("sans-serif", 24),
        )
        .margin(15)
        .x_label_area_size(45)
        .y_label_area_size(55)
        .build_cartesian_2d(1f64..x_max, 0f64..100f64)?;

    chart
        .configure_mesh()
        .x_desc("Epochs")
        .y_desc("Accuracy(%)")
        .draw()?;

    chart
        .draw_series(LineSeries::new(
            history
                .iter()
                .map(|r| (r.epoch as f64, r.train_accuracy)),
            &BLUE,
        ))?
        .label("Train")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], BLUE));

    chart
        .draw_series(LineSeries::new(
            history.iter().map(|r| (r.epoch as f64, r.test_accuracy)),
            &RED,
        ))?
        .label("Test")
        .legend(|(x, y)| PathElement::new(vec![(x, y), (x + 20, y)], RED));

    chart
        .configure_series_labels()
        .background_style(WHITE.mix(0.8))
        .border_style(BLACK)
        .draw()?;

    root.present()
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!("Wrote accuracy curves to {}", path.display());
    Ok(())
}

/// Export the epoch history as CSV, epochs numbered from 1
pub fn write_history_csv(history: &[EpochRecord], path: &Path) -> Result<()> {
    let mut writer = csv::Writer::from_path(path)
        .with_context(|| format!("failed to create {}", path.display()))?;
    writer.write_record([
        "epoch",
        "train_loss",
        "train_accuracy",
        "test_loss",
        "test_accuracy",
    ])?;
    for record in history {
        writer.write_record([
            record.epoch.to_string(),
            format!("{:.6}", record.train_loss),
            format!("{:.6}", record.train_accuracy),
            format!("{:.6}", record.test_loss),
            format!("{:.6}", record.test_accuracy),
        ])?;
    }
    writer.flush()?;
    info!("Wrote training history to {}", path.display());
    Ok(())
}

/// White-to-blue heat shade for a normalized value in [0, 1]
fn heat_color(value: f64) -> RGBColor {
    let v = value.clamp(0.0, 1.0);
    let lerp = |from: u8, to: u8| (from as f64 + (to as f64 - from as f64) * v).round() as u8;
    RGBColor(
        lerp(255, BLUE_DARK.0),
        lerp(255, BLUE_DARK.1),
        lerp(255, BLUE_DARK.2),
    )
}

/// Truncate toward zero at two decimal places
fn truncate_hundredths(value: f64) -> f64 {
    (value * 100.0).floor() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    fn temp_file(name: &str) -> PathBuf {
        std::env::temp_dir().join(format!("retina_report_{}_{}", std::process::id(), name))
    }

    fn sample_history() -> Vec<EpochRecord> {
        (1..=3)
            .map(|epoch| EpochRecord {
                epoch,
                train_loss: 1.0 / epoch as f64,
                train_accuracy: 60.0 + epoch as f64,
                test_loss: 1.2 / epoch as f64,
                test_accuracy: 58.0 + epoch as f64,
            })
            .collect()
    }

    #[test]
    fn test_truncate_hundredths() {
        assert_eq!(truncate_hundredths(0.987654), 0.98);
        assert_eq!(truncate_hundredths(0.5), 0.5);
        assert_eq!(truncate_hundredths(0.999), 0.99);
        assert_eq!(truncate_hundredths(0.0), 0.0);
    }

    #[test]
    fn test_heat_color_endpoints() {
        assert_eq!(heat_color(0.0), RGBColor(255, 255, 255));
        assert_eq!(heat_color(1.0), RGBColor(8, 48, 107));
    }

    #[test]
    fn test_write_history_csv() {
        let path = temp_file("history.csv");
        write_history_csv(&sample_history(), &path).unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        let mut lines = content.lines();
        assert_eq!(
            lines.next().unwrap(),
            "epoch,train_loss,train_accuracy,test_loss,test_accuracy"
        );
        assert!(lines.next().unwrap().starts_with("1,"));
        assert_eq!(content.lines().count(), 4);
    }

    #[test]
    fn test_render_confusion_matrix_writes_png() {
        let matrix = ConfusionMatrix::from_predictions(&[0, 1, 2, 3, 4, 0], &[0, 1, 2, 3, 4, 1]);
        let path = temp_file("cm.png");
        render_confusion_matrix(&matrix, &path).unwrap();
        assert!(path.exists());
        assert!(std::fs::metadata(&path).unwrap().len() > 0);
    }

    #[test]
    fn test_render_accuracy_curves_writes_png() {
        let path = temp_file("acc.png");
        render_accuracy_curves(&sample_history(), "ResNet18", &path).unwrap();
        assert!(path.exists());
    }
}
