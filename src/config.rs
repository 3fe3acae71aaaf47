use std::path::PathBuf;

/// Engine configuration, constructed explicitly at process start and handed
/// to `Engine::open`. No module-level globals.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Path of the write-ahead log file.
    pub wal_path: PathBuf,
    /// Compact the WAL once this many appends have accumulated.
    pub compact_threshold: u64,
    /// Prometheus exporter port; `None` disables the exporter.
    pub metrics_port: Option<u16>,
}

impl EngineConfig {
    pub fn new(wal_path: impl Into<PathBuf>) -> Self {
        Self {
            wal_path: wal_path.into(),
            compact_threshold: 1000,
            metrics_port: None,
        }
    }

    /// Read configuration from `RESERVA_*` environment variables.
    /// Unset variables fall back to defaults; the data directory is created
    /// if missing.
    pub fn from_env() -> std::io::Result<Self> {
        let data_dir = std::env::var("RESERVA_DATA_DIR").unwrap_or_else(|_| "./data".into());
        std::fs::create_dir_all(&data_dir)?;

        let compact_threshold: u64 = std::env::var("RESERVA_COMPACT_THRESHOLD")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(1000);
        let metrics_port: Option<u16> = std::env::var("RESERVA_METRICS_PORT")
            .ok()
            .and_then(|s| s.parse().ok());

        Ok(Self {
            wal_path: PathBuf::from(data_dir).join("reserva.wal"),
            compact_threshold,
            metrics_port,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let cfg = EngineConfig::new("/tmp/r.wal");
        assert_eq!(cfg.wal_path, PathBuf::from("/tmp/r.wal"));
        assert_eq!(cfg.compact_threshold, 1000);
        assert!(cfg.metrics_port.is_none());
    }
}
