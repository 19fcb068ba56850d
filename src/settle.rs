use std::time::Duration;

/// Wait budgets for the phases between mounting and capturing. The values
/// are upper bounds, not fixed delays: each phase ends early once the
/// surface reports quiescence, and exhausting a budget is best-effort
/// (logged, never fatal).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlePolicy {
    /// First layout pass after mount.
    pub layout_budget: Duration,
    /// Math typesetting and font activation.
    pub typeset_budget: Duration,
    /// Paint wait after the surface becomes visible.
    pub reveal_paint: Duration,
    /// Paint wait after a section's images settle.
    pub image_paint: Duration,
    /// Final wait immediately before each capture.
    pub pre_capture: Duration,
    /// Quiescence poll tick.
    pub poll_interval: Duration,
    /// Consecutive unchanged revision reads that count as quiet.
    pub quiet_polls: u32,
}

impl Default for SettlePolicy {
    fn default() -> Self {
        Self {
            layout_budget: Duration::from_millis(500),
            typeset_budget: Duration::from_millis(2000),
            reveal_paint: Duration::from_millis(1000),
            image_paint: Duration::from_millis(500),
            pre_capture: Duration::from_millis(1000),
            poll_interval: Duration::from_millis(50),
            quiet_polls: 3,
        }
    }
}

impl SettlePolicy {
    /// Zero-wait policy for tests and already-settled surfaces.
    pub fn instant() -> Self {
        Self {
            layout_budget: Duration::ZERO,
            typeset_budget: Duration::ZERO,
            reveal_paint: Duration::ZERO,
            image_paint: Duration::ZERO,
            pre_capture: Duration::ZERO,
            poll_interval: Duration::ZERO,
            quiet_polls: 1,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    Quiet,
    BudgetExhausted,
}

/// Poll `revision` every `poll_interval` until it holds still for
/// `quiet_polls` consecutive reads, or `budget` elapses.
pub(crate) async fn wait_quiescent<F>(
    policy: &SettlePolicy,
    budget: Duration,
    mut revision: F,
) -> SettleOutcome
where
    F: FnMut() -> u64,
{
    if budget.is_zero() {
        return SettleOutcome::Quiet;
    }
    let started = tokio::time::Instant::now();
    let mut last = revision();
    let mut quiet = 0u32;
    loop {
        if quiet >= policy.quiet_polls {
            return SettleOutcome::Quiet;
        }
        if started.elapsed() >= budget {
            return SettleOutcome::BudgetExhausted;
        }
        tokio::time::sleep(policy.poll_interval.max(Duration::from_millis(1))).await;
        let current = revision();
        if current == last {
            quiet += 1;
        } else {
            quiet = 0;
            last = current;
        }
    }
}
