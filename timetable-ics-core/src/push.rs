//! Staggered delivery of deep links to an external calendar.
//!
//! Planning is pure: [`PushPlan`] assigns each link a delay. Delivery is a
//! queue of [`PendingOpen`] actions drained by one [`Scheduler`] task that
//! hands each link to a [`LinkOpener`]. A failed open is logged and dropped.

use std::time::Duration;

use async_trait::async_trait;
use tokio::{sync::mpsc, time::Instant};

use crate::{Error, Result, links::CalendarLink};

/// Gap between consecutive opens so the host does not block them.
pub const DEFAULT_STAGGER: Duration = Duration::from_millis(300);

/// 待打开的链接
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingOpen {
    pub link: CalendarLink,
    /// 相对第一个动作的延迟
    pub delay: Duration,
}

/// Ordered open actions, `index * stagger` apart.
#[derive(Debug, Clone, Default)]
pub struct PushPlan {
    actions: Vec<PendingOpen>,
}

impl PushPlan {
    pub fn new(links: Vec<CalendarLink>, stagger: Duration) -> Self {
        let actions = links
            .into_iter()
            .zip(0u32..)
            .map(|(link, index)| PendingOpen {
                link,
                delay: stagger * index,
            })
            .collect();
        Self { actions }
    }

    pub fn actions(&self) -> &[PendingOpen] {
        &self.actions
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }
}

/// Something that can open a link, e.g. a browser tab.
#[async_trait]
pub trait LinkOpener: Send + Sync {
    async fn open(&self, link: &CalendarLink) -> Result<()>;
}

/// Producer side of the push queue.
#[derive(Debug, Clone)]
pub struct PushQueue {
    tx: mpsc::UnboundedSender<PendingOpen>,
}

impl PushQueue {
    pub fn enqueue(&self, action: PendingOpen) -> Result<()> {
        self.tx
            .send(action)
            .map_err(|_| Error::Config("push scheduler has stopped".to_string()))
    }

    /// 将计划中的全部动作入队
    pub fn enqueue_plan(&self, plan: PushPlan) -> Result<usize> {
        let count = plan.len();
        for action in plan.actions {
            self.enqueue(action)?;
        }
        Ok(count)
    }
}

/// 推送结果统计
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PushReport {
    pub opened: usize,
    pub failed: usize,
}

/// Single consumer of the push queue.
pub struct Scheduler<O> {
    rx: mpsc::UnboundedReceiver<PendingOpen>,
    opener: O,
}

/// Create a connected queue and scheduler.
pub fn channel<O: LinkOpener>(opener: O) -> (PushQueue, Scheduler<O>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (PushQueue { tx }, Scheduler { rx, opener })
}

impl<O: LinkOpener> Scheduler<O> {
    /// Drain the queue until every [`PushQueue`] handle is dropped.
    ///
    /// Delays are measured from the first action received.
    pub async fn run(mut self) -> PushReport {
        let mut report = PushReport::default();
        let mut origin: Option<Instant> = None;

        while let Some(action) = self.rx.recv().await {
            let origin = *origin.get_or_insert_with(Instant::now);
            tokio::time::sleep_until(origin + action.delay).await;

            match self.opener.open(&action.link).await {
                Ok(()) => {
                    tracing::debug!("Opened calendar link for {}", action.link.summary);
                    report.opened += 1;
                }
                Err(e) => {
                    tracing::warn!(
                        "Failed to open calendar link for {}: {}",
                        action.link.summary,
                        e
                    );
                    report.failed += 1;
                }
            }
        }

        report
    }
}
