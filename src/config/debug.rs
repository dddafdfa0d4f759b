//! Debugging feature flags.
//!
//! Toggle individual diagnostics here; keep them `false` by default so runs
//! stay quiet. All of them are further gated by `cfg(debug_assertions)`.

pub struct DebugFlags {
    /// Emit per-event AR/CAR summaries as they are computed.
    pub print_event_windows: bool,
    /// Emit per-page progress while paging klines from Binance.
    pub print_fetch_pages: bool,
    /// Emit every rejected event row, not only the count.
    pub print_rejected_rows: bool,
}

pub const DEBUG_FLAGS: DebugFlags = DebugFlags {
    print_event_windows: false,
    print_fetch_pages: false,
    print_rejected_rows: false,
};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flags_are_off() {
        assert!(!DEBUG_FLAGS.print_event_windows);
        assert!(!DEBUG_FLAGS.print_fetch_pages);
        assert!(!DEBUG_FLAGS.print_rejected_rows);
    }
}
