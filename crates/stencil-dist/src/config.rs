use crate::error::DistError;

/// Parallelism of one run: how many workers, and how many threads each.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(default))]
pub struct ParallelConfig {
    /// Number of cooperating workers, each owning a row partition.
    pub worker_count: usize,
    /// Number of threads each worker convolves its rows with.
    pub threads_per_worker: usize,
}

impl ParallelConfig {
    /// Create a new configuration.
    pub fn new(worker_count: usize, threads_per_worker: usize) -> Self {
        Self {
            worker_count,
            threads_per_worker,
        }
    }

    /// Check that both counts are positive.
    pub fn validate(&self) -> Result<(), DistError> {
        if self.worker_count == 0 {
            return Err(DistError::InvalidParameter(
                "worker count must be > 0".to_string(),
            ));
        }
        if self.threads_per_worker == 0 {
            return Err(DistError::InvalidParameter(
                "threads per worker must be > 0".to_string(),
            ));
        }
        Ok(())
    }
}

impl Default for ParallelConfig {
    /// A single worker using every available core.
    fn default() -> Self {
        let threads = std::thread::available_parallelism()
            .map(|n| n.get())
            .unwrap_or(1);
        Self::new(1, threads)
    }
}

/// Where a run executes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
#[cfg_attr(feature = "serde", serde(rename_all = "snake_case"))]
pub enum Backend {
    /// Whole image on the calling thread.
    Serial,
    /// Whole image on a local pool of `threads_per_worker` threads.
    Threaded,
    /// Row partitions over `worker_count` workers.
    #[default]
    Distributed,
}

impl Backend {
    /// The backend name.
    pub fn name(&self) -> &'static str {
        match self {
            Backend::Serial => "serial",
            Backend::Threaded => "threaded",
            Backend::Distributed => "distributed",
        }
    }
}

impl std::fmt::Display for Backend {
    fn fmt(&self, f: &mut std::fmt::Formatter) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

impl std::str::FromStr for Backend {
    type Err = DistError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "serial" => Ok(Backend::Serial),
            "threaded" | "openmp" => Ok(Backend::Threaded),
            "distributed" | "hybrid" => Ok(Backend::Distributed),
            _ => Err(DistError::InvalidParameter(format!("unknown backend: {s}"))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate() {
        assert!(ParallelConfig::new(2, 4).validate().is_ok());
        assert!(matches!(
            ParallelConfig::new(0, 4).validate(),
            Err(DistError::InvalidParameter(_))
        ));
        assert!(matches!(
            ParallelConfig::new(3, 0).validate(),
            Err(DistError::InvalidParameter(_))
        ));
    }

    #[test]
    fn test_default() {
        let config = ParallelConfig::default();
        assert_eq!(config.worker_count, 1);
        assert!(config.threads_per_worker >= 1);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_backend_from_str() -> Result<(), DistError> {
        assert_eq!("serial".parse::<Backend>()?, Backend::Serial);
        assert_eq!("Threaded".parse::<Backend>()?, Backend::Threaded);
        assert_eq!("hybrid".parse::<Backend>()?, Backend::Distributed);
        assert!("mpi".parse::<Backend>().is_err());
        assert_eq!(Backend::default().to_string(), "distributed");
        Ok(())
    }

    #[cfg(feature = "serde")]
    #[test]
    fn test_serde_config() -> Result<(), serde_json::Error> {
        let config: ParallelConfig = serde_json::from_str(r#"{"worker_count": 5}"#)?;
        assert_eq!(config.worker_count, 5);
        assert_eq!(
            config.threads_per_worker,
            ParallelConfig::default().threads_per_worker
        );
        let backend: Backend = serde_json::from_str(r#""threaded""#)?;
        assert_eq!(backend, Backend::Threaded);
        Ok(())
    }
}
