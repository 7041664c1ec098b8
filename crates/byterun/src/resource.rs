//! Host-imposed execution limits.
//!
//! The engine calls into a [`ResourceTracker`] once per decoded instruction (`on_step`) and once
//! per frame push (`check_recursion_depth`). Hosts that need cancellation or budgets implement the
//! trait, or use [`LimitedTracker`] configured through [`ResourceLimits`].

use std::{
    fmt,
    time::{Duration, Instant},
};

/// Default maximum call-stack depth.
pub const DEFAULT_MAX_RECURSION_DEPTH: usize = 1000;

/// Reason a tracker refused to let execution continue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ResourceError {
    /// The call stack would exceed `limit` frames.
    Recursion { limit: usize, depth: usize },
    /// The step budget is used up.
    Steps { limit: u64, steps: u64 },
    /// The wall-clock budget is used up.
    Time { limit: Duration, elapsed: Duration },
    /// The host asked for termination.
    Cancelled(String),
}

impl fmt::Display for ResourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Recursion { limit, depth } => {
                write!(f, "recursion limit exceeded: depth {depth} > limit {limit}")
            }
            Self::Steps { limit, steps } => write!(f, "step limit exceeded: {steps} > {limit}"),
            Self::Time { limit, elapsed } => write!(f, "time limit exceeded: {elapsed:?} > {limit:?}"),
            Self::Cancelled(reason) => write!(f, "execution cancelled: {reason}"),
        }
    }
}

impl std::error::Error for ResourceError {}

/// Hook polled by the engine between instruction cycles.
pub trait ResourceTracker {
    /// Called before every instruction with the total number of instructions decoded so far
    /// (including this one). Returning an error stops execution between cycles.
    fn on_step(&mut self, steps: u64) -> Result<(), ResourceError>;

    /// Called before a new frame is pushed; `depth` is the call-stack depth including the new frame.
    fn check_recursion_depth(&self, depth: usize) -> Result<(), ResourceError>;
}

/// Configuration for [`LimitedTracker`].
///
/// All limits are optional; `max_recursion_depth` defaults to [`DEFAULT_MAX_RECURSION_DEPTH`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceLimits {
    max_recursion_depth: Option<usize>,
    max_steps: Option<u64>,
    max_duration: Option<Duration>,
}

impl Default for ResourceLimits {
    fn default() -> Self {
        Self {
            max_recursion_depth: Some(DEFAULT_MAX_RECURSION_DEPTH),
            max_steps: None,
            max_duration: None,
        }
    }
}

impl ResourceLimits {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the maximum call-stack depth; `None` disables the check.
    #[must_use]
    pub fn max_recursion_depth(mut self, depth: Option<usize>) -> Self {
        self.max_recursion_depth = depth;
        self
    }

    #[must_use]
    pub fn max_steps(mut self, steps: u64) -> Self {
        self.max_steps = Some(steps);
        self
    }

    #[must_use]
    pub fn max_duration(mut self, duration: Duration) -> Self {
        self.max_duration = Some(duration);
        self
    }
}

/// Tracker that only enforces the default recursion depth.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoLimitTracker;

impl ResourceTracker for NoLimitTracker {
    #[inline]
    fn on_step(&mut self, _steps: u64) -> Result<(), ResourceError> {
        Ok(())
    }

    fn check_recursion_depth(&self, depth: usize) -> Result<(), ResourceError> {
        if depth > DEFAULT_MAX_RECURSION_DEPTH {
            Err(ResourceError::Recursion {
                limit: DEFAULT_MAX_RECURSION_DEPTH,
                depth,
            })
        } else {
            Ok(())
        }
    }
}

/// Tracker enforcing a [`ResourceLimits`] configuration.
///
/// The clock starts at construction.
#[derive(Debug, Clone)]
pub struct LimitedTracker {
    limits: ResourceLimits,
    started: Instant,
}

/// How often (in steps) the wall clock is read.
const TIME_CHECK_INTERVAL: u64 = 64;

impl LimitedTracker {
    #[must_use]
    pub fn new(limits: ResourceLimits) -> Self {
        Self {
            limits,
            started: Instant::now(),
        }
    }

    #[must_use]
    pub fn limits(&self) -> &ResourceLimits {
        &self.limits
    }
}

impl ResourceTracker for LimitedTracker {
    fn on_step(&mut self, steps: u64) -> Result<(), ResourceError> {
        if let Some(limit) = self.limits.max_steps {
            if steps > limit {
                return Err(ResourceError::Steps { limit, steps });
            }
        }
        if let Some(limit) = self.limits.max_duration {
            if steps % TIME_CHECK_INTERVAL == 0 {
                let elapsed = self.started.elapsed();
                if elapsed > limit {
                    return Err(ResourceError::Time { limit, elapsed });
                }
            }
        }
        Ok(())
    }

    fn check_recursion_depth(&self, depth: usize) -> Result<(), ResourceError> {
        match self.limits.max_recursion_depth {
            Some(limit) if depth > limit => Err(ResourceError::Recursion { limit, depth }),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn step_limit_is_inclusive() {
        let mut tracker = LimitedTracker::new(ResourceLimits::new().max_steps(3));
        assert!(tracker.on_step(3).is_ok());
        assert_eq!(tracker.on_step(4), Err(ResourceError::Steps { limit: 3, steps: 4 }));
    }

    #[test]
    fn recursion_limit_can_be_disabled() {
        let tracker = LimitedTracker::new(ResourceLimits::new().max_recursion_depth(None));
        assert!(tracker.check_recursion_depth(1_000_000).is_ok());
        assert!(NoLimitTracker.check_recursion_depth(DEFAULT_MAX_RECURSION_DEPTH + 1).is_err());
    }
}
