//! Input and output locations

pub struct PersistenceConfig {
    /// Event file read in default mode
    pub default_events_csv: &'static str,
    /// Root directory for report output
    pub report_dir: &'static str,
    /// Chart images, relative to the report directory
    pub figures_subdir: &'static str,
    pub html_filename: &'static str,
    pub json_filename: &'static str,
}

pub const PERSISTENCE: PersistenceConfig = PersistenceConfig {
    default_events_csv: "data_raw/events_sample.csv",
    report_dir: "reports",
    figures_subdir: "figures",
    html_filename: "event_study.html",
    json_filename: "results.json",
};
