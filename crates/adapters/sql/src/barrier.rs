//! 清理周期屏障
//!
//! 读操作在查询前等待当前正在进行的清理周期结束。屏障不是互斥锁：
//! 没有清理在运行时读操作立即通过，多个读操作可以并发；
//! 等待只针对开始等待时正在运行的那一个周期，之后开始的新周期不会延长等待。

use tokio::sync::watch;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct CycleState {
    /// 已开始的周期数
    cycle: u64,
    running: bool,
}

/// 版本化的清理屏障，每个存储实例独立持有
#[derive(Debug)]
pub struct SweepBarrier {
    state: watch::Sender<CycleState>,
}

impl SweepBarrier {
    pub fn new() -> Self {
        let (state, _) = watch::channel(CycleState::default());
        Self { state }
    }

    /// 标记新周期开始；返回的 guard 被 drop 时标记周期结束
    ///
    /// 周期必须串行开始，调用方负责保证同一时刻只有一个 guard 存活。
    pub fn begin(&self) -> CycleGuard<'_> {
        self.state.send_modify(|state| {
            state.cycle += 1;
            state.running = true;
        });
        CycleGuard { barrier: self }
    }

    /// 等待当前周期（如有）结束
    pub async fn wait(&self) {
        let mut rx = self.state.subscribe();
        let observed = *rx.borrow_and_update();
        if !observed.running {
            return;
        }

        // Sender 由 self 持有，等待期间不会被 drop
        let _ = rx
            .wait_for(|state| !state.running || state.cycle != observed.cycle)
            .await;
    }

    /// 是否有周期正在运行
    pub fn is_running(&self) -> bool {
        self.state.borrow().running
    }

    /// 已开始的周期总数
    pub fn cycles_started(&self) -> u64 {
        self.state.borrow().cycle
    }
}

impl Default for SweepBarrier {
    fn default() -> Self {
        Self::new()
    }
}

/// 清理周期 guard
#[must_use = "dropping the guard ends the sweep cycle immediately"]
#[derive(Debug)]
pub struct CycleGuard<'a> {
    barrier: &'a SweepBarrier,
}

impl Drop for CycleGuard<'_> {
    fn drop(&mut self) {
        self.barrier.state.send_modify(|state| state.running = false);
    }
}
