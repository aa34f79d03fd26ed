use std::io::Write;
use std::time::Duration;

use tokio::time::{sleep, Instant};

/// Where an observer draws its projection.
pub trait Surface: Send + 'static {
    /// Whether the host mount point exists yet.
    fn is_mounted(&self) -> bool;
    /// Replaces everything previously painted with `content`.
    fn paint(&mut self, content: &str);
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MountPolicy {
    pub attempts: u32,
    pub interval: Duration,
    pub ceiling: Duration,
}

impl Default for MountPolicy {
    fn default() -> Self {
        Self {
            attempts: 40,
            interval: Duration::from_millis(250),
            ceiling: Duration::from_secs(10),
        }
    }
}

/// Polls until the surface is mounted. Gives up after `attempts` checks or
/// once `ceiling` has passed, whichever comes first.
pub async fn wait_for_mount<S: Surface>(surface: &S, policy: MountPolicy) -> bool {
    let deadline = Instant::now() + policy.ceiling;
    for attempt in 1..=policy.attempts {
        if surface.is_mounted() {
            return true;
        }
        if attempt == policy.attempts || Instant::now() + policy.interval > deadline {
            break;
        }
        sleep(policy.interval).await;
    }
    false
}

/// Terminal surface. Always mounted; reprints only when the content changes.
#[derive(Debug, Default)]
pub struct StdoutSurface {
    last: Option<String>,
}

impl StdoutSurface {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Surface for StdoutSurface {
    fn is_mounted(&self) -> bool {
        true
    }

    fn paint(&mut self, content: &str) {
        if self.last.as_deref() == Some(content) {
            return;
        }
        let mut out = std::io::stdout().lock();
        let _ = writeln!(out, "{}\n{content}", "-".repeat(48));
        let _ = out.flush();
        self.last = Some(content.to_string());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{
        atomic::{AtomicU32, Ordering},
        Arc,
    };

    struct LateSurface {
        checks: Arc<AtomicU32>,
        mounted_after: u32,
    }

    impl Surface for LateSurface {
        fn is_mounted(&self) -> bool {
            self.checks.fetch_add(1, Ordering::SeqCst) + 1 >= self.mounted_after
        }

        fn paint(&mut self, _content: &str) {}
    }

    fn late(mounted_after: u32) -> (LateSurface, Arc<AtomicU32>) {
        let checks = Arc::new(AtomicU32::new(0));
        (
            LateSurface {
                checks: checks.clone(),
                mounted_after,
            },
            checks,
        )
    }

    #[tokio::test(start_paused = true)]
    async fn mount_appearing_late_is_found() {
        let (surface, checks) = late(5);
        assert!(wait_for_mount(&surface, MountPolicy::default()).await);
        assert_eq!(checks.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_attempts() {
        let (surface, checks) = late(u32::MAX);
        let policy = MountPolicy {
            attempts: 3,
            interval: Duration::from_millis(100),
            ceiling: Duration::from_secs(60),
        };
        assert!(!wait_for_mount(&surface, policy).await);
        assert_eq!(checks.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_at_ceiling() {
        let (surface, checks) = late(u32::MAX);
        let policy = MountPolicy {
            attempts: 1_000,
            interval: Duration::from_millis(250),
            ceiling: Duration::from_secs(1),
        };
        let started = Instant::now();
        assert!(!wait_for_mount(&surface, policy).await);
        assert!(started.elapsed() < Duration::from_millis(1_100));
        assert!((4..=5).contains(&checks.load(Ordering::SeqCst)));
    }
}
