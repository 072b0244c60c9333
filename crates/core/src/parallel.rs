//! Row-wise work distribution
//!
//! Rows are independent; results always come back in row order no matter
//! which worker finished first.

use crate::param::ParamValue;
use crate::{CoreError, Result};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Requested degree of parallelism
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "ParamValue", into = "ParamValue")]
pub enum NJobs {
    /// Single-threaded
    #[default]
    Serial,
    /// A pool of this many threads
    Threads(usize),
    /// One thread per available core
    AllCores,
    /// Accelerated FFT backend, falling back to [`NJobs::Serial`]
    Cuda,
}

impl NJobs {
    /// Interpret an integer job count. Negative values count back from the
    /// number of cores (`-1` is all of them).
    pub fn from_count(n: i64) -> Result<Self> {
        match n {
            0 => Err(CoreError::value(
                "n_jobs must be a non-zero integer or 'cuda', got 0",
            )),
            1 => Ok(Self::Serial),
            -1 => Ok(Self::AllCores),
            n if n > 1 => Ok(Self::Threads(n as usize)),
            n => {
                let cores = available_cores() as i64;
                Ok(Self::Threads((cores + 1 + n).max(1) as usize))
            }
        }
    }

    /// Number of worker threads for CPU work
    pub fn threads(&self) -> usize {
        match self {
            Self::Serial | Self::Cuda => 1,
            Self::Threads(n) => (*n).max(1),
            Self::AllCores => available_cores(),
        }
    }

    pub fn is_cuda(&self) -> bool {
        matches!(self, Self::Cuda)
    }
}

fn available_cores() -> usize {
    std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(1)
}

impl FromStr for NJobs {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("cuda") {
            return Ok(Self::Cuda);
        }
        match trimmed.parse::<i64>() {
            Ok(n) => Self::from_count(n),
            Err(_) => Err(CoreError::value(format!(
                "Invalid value for the 'n_jobs' parameter. Allowed values are an integer or 'cuda', but got '{}' instead.",
                s
            ))),
        }
    }
}

impl TryFrom<ParamValue> for NJobs {
    type Error = CoreError;

    fn try_from(value: ParamValue) -> Result<Self> {
        match value {
            ParamValue::Int(n) => Self::from_count(n),
            ParamValue::Str(s) => s.parse(),
            other => Err(CoreError::type_error(format!(
                "n_jobs must be an int or str, got {} ({})",
                other.type_name(),
                other
            ))),
        }
    }
}

impl From<NJobs> for ParamValue {
    fn from(n_jobs: NJobs) -> Self {
        match n_jobs {
            NJobs::Serial => ParamValue::Int(1),
            NJobs::Threads(n) => ParamValue::Int(n as i64),
            NJobs::AllCores => ParamValue::Int(-1),
            NJobs::Cuda => ParamValue::Str("cuda".to_string()),
        }
    }
}

impl fmt::Display for NJobs {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Serial => write!(f, "1"),
            Self::Threads(n) => write!(f, "{}", n),
            Self::AllCores => write!(f, "-1"),
            Self::Cuda => write!(f, "cuda"),
        }
    }
}

/// Apply `f` to every index in `0..n_items` and collect results in order.
///
/// With more than one thread the work runs on a dedicated rayon pool that
/// lives for the duration of the call.
pub fn map_rows<T, F>(n_items: usize, n_jobs: NJobs, f: F) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(usize) -> Result<T> + Send + Sync,
{
    let threads = n_jobs.threads().min(n_items.max(1));
    if threads <= 1 {
        return (0..n_items).map(f).collect();
    }

    tracing::debug!("Distributing {} rows over {} threads", n_items, threads);
    let pool = rayon::ThreadPoolBuilder::new()
        .num_threads(threads)
        .build()
        .map_err(|e| CoreError::config(format!("Could not build worker pool: {}", e)))?;
    pool.install(|| (0..n_items).into_par_iter().map(&f).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn test_parse_n_jobs() {
        assert_eq!("cuda".parse::<NJobs>().unwrap(), NJobs::Cuda);
        assert_eq!("4".parse::<NJobs>().unwrap(), NJobs::Threads(4));
        assert_eq!("1".parse::<NJobs>().unwrap(), NJobs::Serial);
        assert_eq!("-1".parse::<NJobs>().unwrap(), NJobs::AllCores);
        let err = "blah".parse::<NJobs>().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Value);
        assert!(err.to_string().contains("'n_jobs' parameter"));
    }

    #[test]
    fn test_n_jobs_type_errors() {
        let err = NJobs::try_from(ParamValue::Float(1.5)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
        let err = NJobs::try_from(ParamValue::Bool(true)).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Type);
        assert_eq!(
            NJobs::try_from(ParamValue::Int(2)).unwrap(),
            NJobs::Threads(2)
        );
        assert_eq!(NJobs::from_count(0).unwrap_err().kind(), ErrorKind::Value);
    }

    #[test]
    fn test_map_rows_preserves_order() {
        let serial = map_rows(100, NJobs::Serial, |i| Ok(i * i)).unwrap();
        let pooled = map_rows(100, NJobs::Threads(4), |i| Ok(i * i)).unwrap();
        assert_eq!(serial, pooled);
        assert_eq!(pooled[7], 49);
    }

    #[test]
    fn test_map_rows_propagates_errors() {
        let result = map_rows(10, NJobs::Threads(2), |i| {
            if i == 5 {
                Err(CoreError::value("bad row"))
            } else {
                Ok(i)
            }
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_cuda_runs_serially() {
        assert_eq!(NJobs::Cuda.threads(), 1);
        let out = map_rows(3, NJobs::Cuda, |i| Ok(i + 1)).unwrap();
        assert_eq!(out, vec![1, 2, 3]);
    }
}
