use crate::error::{GraphError, GraphResult};
use crate::time::EngineTime;
use std::time::Duration;

/// Supplies the engine with "what time is it, and what's the next time
/// worth stopping at" — the one seam between deterministic back-test
/// replay and wall-clock real-time execution. `GraphEngine::run` is
/// written once against this trait and never branches on which mode
/// it's in.
pub trait ExecutionContext {
    fn current_engine_time(&self) -> EngineTime;

    /// Forces `current_engine_time` to `at` without waiting for anything,
    /// used by `GraphEngine::run` to snap the clock to `end_time` when a
    /// `request_stop` cuts a run short — the loop is about to exit either
    /// way, so there's no next tick left to advance towards normally.
    fn force_time(&mut self, at: EngineTime);

    /// How far wall-clock now has drifted from the wall-clock instant
    /// last associated with `current_engine_time`. Always zero for a
    /// real-time context once it has caught up; meaningful for back-test
    /// replay, where engine time can run far ahead of or behind the
    /// clock on the wall.
    fn engine_lag(&self) -> Duration;

    /// Advances past the current tick towards `proposed` (the
    /// scheduler's earliest pending wake-up, if any), never past
    /// `end_time`. Returns the new current time, or `None` if there's
    /// nothing left to evaluate before `end_time`.
    ///
    /// A back-test context advances immediately to `proposed`. A
    /// real-time context blocks until either wall-clock catches up to
    /// `proposed` or a push source reports pending data, whichever comes
    /// first.
    fn advance(&mut self, proposed: Option<EngineTime>, end_time: EngineTime) -> GraphResult<Option<EngineTime>>;

    /// Whether a push source has signalled data since the last time this
    /// was checked. Checking also resets the flag (it's drain-on-read),
    /// matching the single `evaluate_graph` call per tick that consumes
    /// it.
    fn take_pending_push(&mut self) -> bool;

    /// Registers a channel the context should treat as a push-data
    /// signal. A context that can't support push sources (back-test)
    /// returns `PushSourceNotSupported`.
    fn register_push_notifier(&mut self, notifier: crossbeam::channel::Receiver<()>) -> GraphResult<()>;
}

/// Deterministic replay: engine time jumps directly from one scheduled
/// tick to the next with no relation to wall-clock time, and push
/// sources are rejected outright (there is no "later" for a human to
/// push data into).
#[derive(Debug)]
pub struct BackTestExecutionContext {
    time: EngineTime,
    /// Wall-clock instant sampled the last time `time` was written.
    /// Refreshed on every write so `engine_lag` always answers "how long
    /// has wall-clock moved on since we last touched engine time",
    /// regardless of how far engine time itself has jumped.
    wall_anchor: EngineTime,
}

impl Default for BackTestExecutionContext {
    fn default() -> Self {
        Self::new(EngineTime::MIN_DT)
    }
}

impl BackTestExecutionContext {
    pub fn new(start_time: EngineTime) -> Self {
        Self {
            time: start_time,
            wall_anchor: EngineTime::now(),
        }
    }
}

impl ExecutionContext for BackTestExecutionContext {
    fn current_engine_time(&self) -> EngineTime {
        self.time
    }

    fn force_time(&mut self, at: EngineTime) {
        self.time = at;
        self.wall_anchor = EngineTime::now();
    }

    fn engine_lag(&self) -> Duration {
        (EngineTime::now() - self.wall_anchor).into()
    }

    fn advance(&mut self, proposed: Option<EngineTime>, end_time: EngineTime) -> GraphResult<Option<EngineTime>> {
        match proposed {
            Some(t) if t <= end_time => {
                self.time = t;
                self.wall_anchor = EngineTime::now();
                Ok(Some(self.time))
            }
            _ => Ok(None),
        }
    }

    fn take_pending_push(&mut self) -> bool {
        false
    }

    fn register_push_notifier(&mut self, _notifier: crossbeam::channel::Receiver<()>) -> GraphResult<()> {
        Err(GraphError::PushSourceNotSupported)
    }
}

/// Wall-clock execution: engine time tracks real time, woken either by a
/// scheduled node's deadline elapsing or by a push source's notifier
/// firing, via `crossbeam::select!` so neither starves the other.
///
/// `max_lag` bounds how far behind wall-clock the reported engine time
/// is allowed to drift before a warning is logged — evaluation itself is
/// never throttled to "catch up" more slowly, since replaying at a
/// capped rate would just manufacture more lag later.
pub struct RealTimeExecutionContext {
    time: EngineTime,
    notifier: Option<crossbeam::channel::Receiver<()>>,
    max_lag: Duration,
}

impl RealTimeExecutionContext {
    pub fn new(max_lag: Duration) -> Self {
        Self {
            time: EngineTime::now(),
            notifier: None,
            max_lag,
        }
    }
}

impl ExecutionContext for RealTimeExecutionContext {
    fn current_engine_time(&self) -> EngineTime {
        self.time
    }

    fn force_time(&mut self, at: EngineTime) {
        self.time = at;
    }

    fn engine_lag(&self) -> Duration {
        (EngineTime::now() - self.time).into()
    }

    fn advance(&mut self, proposed: Option<EngineTime>, end_time: EngineTime) -> GraphResult<Option<EngineTime>> {
        loop {
            let wall_now = EngineTime::now();
            if wall_now >= end_time {
                return Ok(None);
            }
            let target = match proposed {
                Some(p) => p.min(end_time),
                None => end_time,
            };
            if wall_now >= target {
                if wall_now - target > self.max_lag.into() {
                    log::warn!("real-time engine clock is lagging wall-clock by more than {:?}", self.max_lag);
                }
                self.time = wall_now;
                return Ok(Some(self.time));
            }

            let wait: Duration = (target - wall_now).into();
            match &self.notifier {
                Some(rx) => {
                    crossbeam::channel::select! {
                        recv(rx) -> msg => {
                            msg.ok();
                            self.time = EngineTime::now();
                            return Ok(Some(self.time));
                        }
                        default(wait) => continue,
                    }
                }
                None => {
                    std::thread::sleep(wait);
                    continue;
                }
            }
        }
    }

    fn take_pending_push(&mut self) -> bool {
        match &self.notifier {
            Some(rx) => {
                let mut any = false;
                while rx.try_recv().is_ok() {
                    any = true;
                }
                any
            }
            None => false,
        }
    }

    fn register_push_notifier(&mut self, notifier: crossbeam::channel::Receiver<()>) -> GraphResult<()> {
        self.notifier = Some(notifier);
        Ok(())
    }
}
