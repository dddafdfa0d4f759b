//! Chart rendering configuration

pub struct PlotConfig {
    pub width: i32,
    pub height: i32,
    pub padding: f64,
    pub ar_color: &'static str,
    pub car_color: &'static str,
    pub price_color: &'static str,
    pub ci_color: &'static str,
    pub event_marker_color: &'static str,
    pub grid_color: &'static str,
    /// Hours of price shown either side of an event
    pub price_context_hours: i64,
    pub line_width: f64,
}

// 7:4 aspect ratio
pub const PLOT: PlotConfig = PlotConfig {
    width: 672,
    height: 384,
    padding: 44.0,
    ar_color: "#348dc1",
    car_color: "#af4b64",
    price_color: "#4c4c4c",
    ci_color: "#8c8c8c",
    event_marker_color: "#ff9933",
    grid_color: "#e5e5e5",
    price_context_hours: 48,
    line_width: 1.5,
};
