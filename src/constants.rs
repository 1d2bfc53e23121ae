/// Constants controlling daily rotation behavior.
pub mod rotation {
    /// Default smallest batch size drawn for a day's window.
    pub const DEFAULT_MIN_BATCH: u64 = 10;
    /// Default largest batch size drawn for a day's window.
    pub const DEFAULT_MAX_BATCH: u64 = 15;
    /// chrono format string producing `DayId` values (e.g. `20240102`).
    pub const DAY_FORMAT: &str = "%Y%m%d";
}

/// Constants used by state-store backends and the transaction loop.
pub mod state {
    /// Singleton document key for the shared rotation record.
    pub const STATE_DOC_KEY: &str = "daily_window";
    /// Maximum transaction body executions before aborting on repeated conflict.
    pub const TX_MAX_ATTEMPTS: usize = 8;
    /// Default filename for SQLite-backed state stores.
    pub const DEFAULT_STORE_FILENAME: &str = "rotation_state.db";
}
