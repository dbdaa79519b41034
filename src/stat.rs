use tracing::info;

#[derive(Debug, Clone, Default)]
pub struct Stats {
    pub flowtime: f64,
    pub time_seconds: f64,
    pub low_level_expanded: usize,
    pub high_level_expanded: usize,
}

impl Stats {
    pub(crate) fn print(&self) {
        info!(
            "Flowtime {:.6} Time(seconds) {:.3} High level expanded nodes: {:?} Low level expanded nodes: {:?}",
            self.flowtime, self.time_seconds, self.high_level_expanded, self.low_level_expanded
        );
    }
}
