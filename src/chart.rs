//! Inline SVG charts for the dashboard pages.

use plotters::coord::ranged1d::SegmentValue;
use plotters::prelude::*;

use crate::datasets::Series;
use crate::error::DashError;

const LABEL_WIDTH: usize = 22;

#[derive(Debug, Clone)]
pub struct ChartOptions {
    pub title: String,
    pub x_label: String,
    pub y_label: String,
    pub width: u32,
    pub height: u32,
}

impl ChartOptions {
    pub fn new(title: impl Into<String>, x_label: &str, y_label: &str) -> Self {
        Self {
            title: title.into(),
            x_label: x_label.to_string(),
            y_label: y_label.to_string(),
            ..Self::default()
        }
    }

    pub fn size(mut self, width: u32, height: u32) -> Self {
        self.width = width;
        self.height = height;
        self
    }
}

impl Default for ChartOptions {
    fn default() -> Self {
        Self {
            title: String::new(),
            x_label: String::new(),
            y_label: String::new(),
            width: 900,
            height: 480,
        }
    }
}

fn chart_error(err: impl std::fmt::Display) -> DashError {
    DashError::Chart(err.to_string())
}

fn short_label(label: &str) -> String {
    if label.chars().count() <= LABEL_WIDTH {
        return label.to_string();
    }
    let mut short = label.chars().take(LABEL_WIDTH - 1).collect::<String>();
    short.push('…');
    short
}

fn value_ceiling(max: u64) -> u64 {
    max + max / 10 + 1
}

/// One colored vertical bar per category, in the given order.
pub fn bar_chart(options: &ChartOptions, bars: &[(String, u64)]) -> Result<String, DashError> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (options.width, options.height))
            .into_drawing_area();
        root.fill(&WHITE).map_err(chart_error)?;

        let max = bars.iter().map(|(_, value)| *value).max().unwrap_or(0);
        let mut chart = ChartBuilder::on(&root)
            .caption(&options.title, ("sans-serif", 20))
            .margin(10)
            .x_label_area_size(70)
            .y_label_area_size(70)
            .build_cartesian_2d((0..bars.len().max(1)).into_segmented(), 0..value_ceiling(max))
            .map_err(chart_error)?;

        let category = |value: &SegmentValue<usize>| match value {
            SegmentValue::CenterOf(index) => bars
                .get(*index)
                .map(|(label, _)| short_label(label))
                .unwrap_or_default(),
            _ => String::new(),
        };
        chart
            .configure_mesh()
            .disable_x_mesh()
            .x_labels(bars.len().max(1))
            .x_label_formatter(&category)
            .x_desc(&options.x_label)
            .y_desc(&options.y_label)
            .draw()
            .map_err(chart_error)?;

        chart
            .draw_series(bars.iter().enumerate().map(|(index, (_, value))| {
                Rectangle::new(
                    [
                        (SegmentValue::Exact(index), 0),
                        (SegmentValue::Exact(index + 1), *value),
                    ],
                    Palette99::pick(index).filled(),
                )
            }))
            .map_err(chart_error)?;

        root.present().map_err(chart_error)?;
    }
    Ok(svg)
}

/// Horizontal bars, first category on top.
pub fn horizontal_bar_chart(
    options: &ChartOptions,
    bars: &[(String, u64)],
) -> Result<String, DashError> {
    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (options.width, options.height))
            .into_drawing_area();
        root.fill(&WHITE).map_err(chart_error)?;

        let slots = bars.len().max(1);
        let max = bars.iter().map(|(_, value)| *value).max().unwrap_or(0);
        let mut chart = ChartBuilder::on(&root)
            .caption(&options.title, ("sans-serif", 20))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(170)
            .build_cartesian_2d(0..value_ceiling(max), (0..slots).into_segmented())
            .map_err(chart_error)?;

        let category = |value: &SegmentValue<usize>| match value {
            SegmentValue::CenterOf(slot) if *slot < slots => bars
                .get(slots - 1 - slot)
                .map(|(label, _)| short_label(label))
                .unwrap_or_default(),
            _ => String::new(),
        };
        chart
            .configure_mesh()
            .disable_y_mesh()
            .y_labels(slots)
            .y_label_formatter(&category)
            .x_desc(&options.x_label)
            .y_desc(&options.y_label)
            .draw()
            .map_err(chart_error)?;

        chart
            .draw_series(bars.iter().enumerate().map(|(index, (_, value))| {
                let slot = slots - 1 - index;
                Rectangle::new(
                    [
                        (0, SegmentValue::Exact(slot)),
                        (*value, SegmentValue::Exact(slot + 1)),
                    ],
                    Palette99::pick(index).filled(),
                )
            }))
            .map_err(chart_error)?;

        root.present().map_err(chart_error)?;
    }
    Ok(svg)
}

/// One line with point markers per series over collection years.
pub fn line_chart(options: &ChartOptions, series: &[Series]) -> Result<String, DashError> {
    let points = series.iter().flat_map(|line| line.points.iter());
    let (min_year, max_year, max_value) = points.fold(
        (i32::MAX, i32::MIN, 0u64),
        |(lo, hi, top), (year, value)| (lo.min(*year), hi.max(*year), top.max(*value)),
    );
    let (min_year, max_year) = if min_year > max_year {
        (0, 1)
    } else {
        (min_year, max_year + 1)
    };

    let mut svg = String::new();
    {
        let root = SVGBackend::with_string(&mut svg, (options.width, options.height))
            .into_drawing_area();
        root.fill(&WHITE).map_err(chart_error)?;

        let mut chart = ChartBuilder::on(&root)
            .caption(&options.title, ("sans-serif", 20))
            .margin(10)
            .x_label_area_size(40)
            .y_label_area_size(70)
            .build_cartesian_2d(min_year..max_year, 0..value_ceiling(max_value))
            .map_err(chart_error)?;

        chart
            .configure_mesh()
            .x_labels(12)
            .x_desc(&options.x_label)
            .y_desc(&options.y_label)
            .draw()
            .map_err(chart_error)?;

        for (index, line) in series.iter().enumerate() {
            let color = Palette99::pick(index).to_rgba();
            chart
                .draw_series(LineSeries::new(
                    line.points.iter().copied(),
                    color.stroke_width(2),
                ))
                .map_err(chart_error)?
                .label(short_label(&line.name))
                .legend(move |(x, y)| {
                    PathElement::new(vec![(x, y), (x + 20, y)], color.stroke_width(2))
                });
            chart
                .draw_series(
                    line.points
                        .iter()
                        .map(|point| Circle::new(*point, 3, color.filled())),
                )
                .map_err(chart_error)?;
        }

        if !series.is_empty() {
            chart
                .configure_series_labels()
                .position(SeriesLabelPosition::UpperLeft)
                .background_style(WHITE.mix(0.8))
                .border_style(BLACK)
                .draw()
                .map_err(chart_error)?;
        }

        root.present().map_err(chart_error)?;
    }
    Ok(svg)
}
