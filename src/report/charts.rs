//! Minimal SVG line charts for the report.

use chrono::{DateTime, Utc};

use crate::config::PLOT;
use crate::utils::{TimeUtils, maths_utils};

/// A dashed horizontal reference line (e.g. a CI bound).
#[derive(Debug, Clone)]
pub struct HorizontalGuide {
    pub value: f64,
    pub label: String,
}

/// Vertical extent of the plot, padded a little so lines never touch the frame.
fn value_extent(values: &[f64], guides: &[HorizontalGuide], include_zero: bool) -> Option<(f64, f64)> {
    let mut all: Vec<f64> = values.to_vec();
    all.extend(guides.iter().map(|g| g.value));
    if include_zero {
        all.push(0.0);
    }
    let (mut min_v, mut max_v) = maths_utils::finite_extent(&all)?;
    if (max_v - min_v).abs() < f64::EPSILON {
        let adjust = if min_v.abs() > f64::EPSILON { min_v.abs() * 0.05 } else { 1e-3 };
        min_v -= adjust;
        max_v += adjust;
    } else {
        let pad = (max_v - min_v) * 0.05;
        min_v -= pad;
        max_v += pad;
    }
    Some((min_v, max_v))
}

fn scale_value(value: f64, min_v: f64, max_v: f64, height: f64) -> f64 {
    let inner_height = height - 2.0 * PLOT.padding;
    let norm = (value - min_v) / (max_v - min_v);
    PLOT.padding + (1.0 - norm) * inner_height
}

fn x_positions(len: usize, width: f64) -> Vec<f64> {
    match len {
        0 => Vec::new(),
        1 => vec![width / 2.0],
        _ => {
            let inner_width = width - 2.0 * PLOT.padding;
            (0..len)
                .map(|i| PLOT.padding + inner_width * (i as f64 / (len - 1) as f64))
                .collect()
        }
    }
}

fn svg_header(title: &str) -> String {
    format!(
        r##"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}"><style>text{{font-family:Arial,sans-serif;font-size:10px;fill:#666}}</style><rect width="100%" height="100%" fill="white" /><text x="{x:.2}" y="18" text-anchor="middle" font-size="12" fill="#333">{title}</text>"##,
        w = PLOT.width,
        h = PLOT.height,
        x = PLOT.width as f64 / 2.0,
        title = escape_xml(title)
    )
}

fn svg_footer() -> &'static str {
    "</svg>"
}

pub fn escape_xml(text: &str) -> String {
    text.replace('&', "&amp;")
        .replace('<', "&lt;")
        .replace('>', "&gt;")
        .replace('"', "&quot;")
        .replace('\'', "&#39;")
}

fn polyline(xs: &[f64], values: &[f64], min_v: f64, max_v: f64, height: f64, color: &str) -> String {
    let coords = xs
        .iter()
        .zip(values)
        .filter(|(_, v)| v.is_finite())
        .map(|(x, v)| format!("{:.2},{:.2}", x, scale_value(*v, min_v, max_v, height)))
        .collect::<Vec<_>>()
        .join(" ");
    format!(
        r##"<polyline fill="none" stroke="{color}" stroke-width="{width}" points="{coords}" />"##,
        color = color,
        width = PLOT.line_width,
        coords = coords
    )
}

fn horizontal_line(svg: &mut String, y: f64, width: f64, color: &str, dash: &str) {
    svg.push_str(&format!(
        r##"<line x1="{x1:.2}" y1="{y:.2}" x2="{x2:.2}" y2="{y:.2}" stroke="{color}" stroke-width="1" stroke-dasharray="{dash}" />"##,
        x1 = PLOT.padding,
        x2 = width - PLOT.padding,
        y = y,
        color = color,
        dash = dash
    ));
}

fn y_axis_labels(svg: &mut String, min_v: f64, max_v: f64, height: f64, as_percent: bool) {
    for step in 0..=4 {
        let value = min_v + (max_v - min_v) * step as f64 / 4.0;
        let y = scale_value(value, min_v, max_v, height);
        let label = if as_percent {
            format!("{:.2}%", value * 100.0)
        } else {
            format!("{:.2}", value)
        };
        svg.push_str(&format!(
            r##"<text x="{x:.2}" y="{y:.2}" text-anchor="end">{label}</text>"##,
            x = PLOT.padding - 4.0,
            y = y + 3.0,
            label = label
        ));
    }
}

fn x_axis_labels(svg: &mut String, xs: &[f64], labels: &[String], height: f64) {
    let axis_y = height - PLOT.padding + 5.0;
    // at most ~8 labels
    let stride = (xs.len() / 8).max(1);
    for (idx, (x, label)) in xs.iter().zip(labels).enumerate() {
        if idx % stride != 0 {
            continue;
        }
        svg.push_str(&format!(
            r##"<line x1="{x:.2}" y1="{y1:.2}" x2="{x:.2}" y2="{y2:.2}" stroke="{grid}" stroke-width="0.5" />"##,
            x = x,
            y1 = PLOT.padding,
            y2 = height - PLOT.padding,
            grid = PLOT.grid_color
        ));
        svg.push_str(&format!(
            r##"<text x="{x:.2}" y="{y:.2}" text-anchor="middle">{label}</text>"##,
            x = x,
            y = axis_y + 12.0,
            label = escape_xml(label)
        ));
    }
}

/// Line chart over event offsets 0..n (hours after the event bar).
/// Each guide is drawn as a dashed horizontal line.
pub fn offset_chart(title: &str, values: &[f64], color: &str, guides: &[HorizontalGuide]) -> Option<String> {
    let width = PLOT.width as f64;
    let height = PLOT.height as f64;
    let (min_v, max_v) = value_extent(values, guides, true)?;
    let xs = x_positions(values.len(), width);

    let mut svg = svg_header(title);
    let labels: Vec<String> = (0..values.len()).map(|k| format!("+{}h", k)).collect();
    x_axis_labels(&mut svg, &xs, &labels, height);
    y_axis_labels(&mut svg, min_v, max_v, height, true);
    horizontal_line(&mut svg, scale_value(0.0, min_v, max_v, height), width, "#bbbbbb", "2 2");

    for guide in guides {
        let y = scale_value(guide.value, min_v, max_v, height);
        horizontal_line(&mut svg, y, width, PLOT.ci_color, "4 3");
        svg.push_str(&format!(
            r##"<text x="{x:.2}" y="{y:.2}" text-anchor="end" fill="{color}" font-size="9">{label}</text>"##,
            x = width - PLOT.padding,
            y = y - 4.0,
            color = PLOT.ci_color,
            label = escape_xml(&guide.label)
        ));
    }

    svg.push_str(&polyline(&xs, values, min_v, max_v, height, color));
    svg.push_str(svg_footer());
    Some(svg)
}

/// Price path around an event with a vertical marker at the event time.
pub fn price_chart(title: &str, points: &[(DateTime<Utc>, f64)], event_ts: DateTime<Utc>) -> Option<String> {
    let (Some(first), Some(last)) = (points.first(), points.last()) else {
        return None;
    };
    let width = PLOT.width as f64;
    let height = PLOT.height as f64;
    let prices: Vec<f64> = points.iter().map(|(_, p)| *p).collect();
    let (min_v, max_v) = value_extent(&prices, &[], false)?;

    // x follows time, so gaps would show as straight segments
    let span_ms = (last.0 - first.0).num_milliseconds().max(1) as f64;
    let inner_width = width - 2.0 * PLOT.padding;
    let x_of = |ts: DateTime<Utc>| {
        PLOT.padding + inner_width * ((ts - first.0).num_milliseconds() as f64 / span_ms)
    };
    let xs: Vec<f64> = points.iter().map(|(ts, _)| x_of(*ts)).collect();

    let mut svg = svg_header(title);
    let labels: Vec<String> = points
        .iter()
        .map(|(ts, _)| ts.format(TimeUtils::SHORT_TIME_FORMAT).to_string())
        .collect();
    x_axis_labels(&mut svg, &xs, &labels, height);
    y_axis_labels(&mut svg, min_v, max_v, height, false);
    svg.push_str(&polyline(&xs, &prices, min_v, max_v, height, PLOT.price_color));

    if event_ts >= first.0 && event_ts <= last.0 {
        let x = x_of(event_ts);
        svg.push_str(&format!(
            r##"<line x1="{x:.2}" y1="{y1:.2}" x2="{x:.2}" y2="{y2:.2}" stroke="{color}" stroke-width="1.5" stroke-dasharray="4 3" />"##,
            x = x,
            y1 = PLOT.padding,
            y2 = height - PLOT.padding,
            color = PLOT.event_marker_color
        ));
        svg.push_str(&format!(
            r##"<text x="{x:.2}" y="{y:.2}" text-anchor="start" fill="{color}">t0</text>"##,
            x = x + 3.0,
            y = PLOT.padding + 10.0,
            color = PLOT.event_marker_color
        ));
    }

    svg.push_str(svg_footer());
    Some(svg)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_offset_chart_draws_guides() {
        let guides = vec![
            HorizontalGuide {
                value: -0.02,
                label: "2.5%".to_string(),
            },
            HorizontalGuide {
                value: 0.03,
                label: "97.5%".to_string(),
            },
        ];
        let svg = offset_chart("Mean CAR <BTC>", &[0.0, 0.01, 0.015], "#af4b64", &guides).unwrap();
        assert!(svg.starts_with("<svg"));
        assert!(svg.ends_with("</svg>"));
        assert_eq!(svg.matches("stroke-dasharray=\"4 3\"").count(), 2);
        assert!(svg.contains("Mean CAR &lt;BTC&gt;"));
        assert!(svg.contains("<polyline"));
    }

    #[test]
    fn test_offset_chart_needs_finite_values() {
        assert!(offset_chart("x", &[f64::NAN], "#000", &[]).is_some()); // zero is included
        assert!(value_extent(&[f64::NAN], &[], false).is_none());
    }

    #[test]
    fn test_price_chart_marks_event() {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let points: Vec<_> = (0..10)
            .map(|h| (start + Duration::hours(h), 100.0 + h as f64))
            .collect();
        let svg = price_chart("BTC-USD", &points, start + Duration::hours(5)).unwrap();
        assert!(svg.contains(">t0<"));
        let outside = price_chart("BTC-USD", &points, start + Duration::hours(50)).unwrap();
        assert!(!outside.contains(">t0<"));
        assert!(price_chart("BTC-USD", &[], start).is_none());
    }
}
