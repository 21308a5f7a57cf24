//! Session runner: one thread owns the session and serializes all access
//!
//! Timer ticks and host commands are multiplexed with `crossbeam_channel::select!`
//! so settle timers, external settle reports and purchases never interleave.
//! Every command carries its own bounded(1) reply channel. Session events are
//! forwarded to an unbounded channel exposed by [`RunnerHandle::events`].

use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use crossbeam_channel::{bounded, select, tick, unbounded, Receiver, Sender};
use thiserror::Error;

use crate::cycle::{CycleId, SettleOutcome};
use crate::die::DieId;
use crate::error::{DiceError, DiceResult};
use crate::events::{ChannelObserver, DiceEvent};
use crate::session::{DiceSession, SessionSnapshot, UnlockReceipt, UpgradeReceipt};

/// Runner failures
#[derive(Error, Debug)]
pub enum RunnerError {
    #[error("session runner is not running")]
    Disconnected,

    #[error("failed to start session thread: {0}")]
    Spawn(#[from] std::io::Error),

    #[error(transparent)]
    Dice(#[from] DiceError),
}

enum Command {
    RollAll(Sender<DiceResult<CycleId>>),
    Report(DieId, u8, Sender<SettleOutcome>),
    SoftReset(Sender<()>),
    ApplyPayout(Sender<i64>),
    AddRolls(u32, Sender<DiceResult<u32>>),
    Deposit(i64, Sender<i64>),
    Unlock(Sender<DiceResult<UnlockReceipt>>),
    Upgrade(usize, Sender<DiceResult<UpgradeReceipt>>),
    Snapshot(Sender<SessionSnapshot>),
    Shutdown(Sender<DiceSession>),
}

/// Moves a [`DiceSession`] onto its own thread
pub struct SessionRunner;

impl SessionRunner {
    /// Start the session thread; settle timers advance every `tick_interval`
    pub fn spawn(mut session: DiceSession, tick_interval: Duration) -> Result<RunnerHandle, RunnerError> {
        let (event_tx, event_rx) = unbounded();
        session.subscribe(ChannelObserver::new(event_tx));

        let (command_tx, command_rx) = unbounded();
        let thread = thread::Builder::new()
            .name("rf-dice-session".into())
            .spawn(move || run(session, command_rx, tick_interval))?;

        log::debug!("session runner started ({:?} ticks)", tick_interval);

        Ok(RunnerHandle {
            commands: command_tx,
            events: event_rx,
            thread: Some(thread),
        })
    }
}

fn run(mut session: DiceSession, commands: Receiver<Command>, tick_interval: Duration) {
    let ticker = tick(tick_interval);
    let mut last_tick = Instant::now();

    loop {
        select! {
            recv(ticker) -> at => {
                if let Ok(at) = at {
                    let dt_ms = u64::try_from(at.duration_since(last_tick).as_millis()).unwrap_or(u64::MAX);
                    last_tick = at;
                    session.tick(dt_ms);
                }
            }
            recv(commands) -> command => match command {
                Ok(Command::Shutdown(reply)) => {
                    log::debug!("session runner stopping");
                    let _ = reply.send(session);
                    return;
                }
                Ok(command) => dispatch(&mut session, command),
                // every handle is gone
                Err(_) => return,
            },
        }
    }
}

fn dispatch(session: &mut DiceSession, command: Command) {
    // a requester that gave up on its reply is not an error
    match command {
        Command::RollAll(reply) => {
            let _ = reply.send(session.roll_all());
        }
        Command::Report(die, face, reply) => {
            let _ = reply.send(session.report_settle(die, face));
        }
        Command::SoftReset(reply) => {
            session.soft_reset();
            let _ = reply.send(());
        }
        Command::ApplyPayout(reply) => {
            let _ = reply.send(session.apply_last_payout());
        }
        Command::AddRolls(amount, reply) => {
            let _ = reply.send(session.add_rolls(amount));
        }
        Command::Deposit(amount, reply) => {
            let _ = reply.send(session.deposit(amount));
        }
        Command::Unlock(reply) => {
            let _ = reply.send(session.try_unlock_next_die());
        }
        Command::Upgrade(index, reply) => {
            let _ = reply.send(session.try_upgrade_die(index));
        }
        Command::Snapshot(reply) => {
            let _ = reply.send(session.snapshot());
        }
        Command::Shutdown(_) => {}
    }
}

/// Host side of a running session
pub struct RunnerHandle {
    commands: Sender<Command>,
    events: Receiver<DiceEvent>,
    thread: Option<JoinHandle<()>>,
}

impl RunnerHandle {
    fn request<T>(&self, command: impl FnOnce(Sender<T>) -> Command) -> Result<T, RunnerError> {
        let (tx, rx) = bounded(1);
        self.commands
            .send(command(tx))
            .map_err(|_| RunnerError::Disconnected)?;
        rx.recv().map_err(|_| RunnerError::Disconnected)
    }

    pub fn roll_all(&self) -> Result<CycleId, RunnerError> {
        Ok(self.request(Command::RollAll)??)
    }

    pub fn report_settle(&self, die: DieId, face: u8) -> Result<SettleOutcome, RunnerError> {
        self.request(|tx| Command::Report(die, face, tx))
    }

    pub fn soft_reset(&self) -> Result<(), RunnerError> {
        self.request(Command::SoftReset)
    }

    pub fn apply_last_payout(&self) -> Result<i64, RunnerError> {
        self.request(Command::ApplyPayout)
    }

    pub fn add_rolls(&self, amount: u32) -> Result<u32, RunnerError> {
        Ok(self.request(|tx| Command::AddRolls(amount, tx))??)
    }

    pub fn deposit(&self, amount: i64) -> Result<i64, RunnerError> {
        self.request(|tx| Command::Deposit(amount, tx))
    }

    pub fn try_unlock_next_die(&self) -> Result<UnlockReceipt, RunnerError> {
        Ok(self.request(Command::Unlock)??)
    }

    pub fn try_upgrade_die(&self, index: usize) -> Result<UpgradeReceipt, RunnerError> {
        Ok(self.request(|tx| Command::Upgrade(index, tx))??)
    }

    pub fn snapshot(&self) -> Result<SessionSnapshot, RunnerError> {
        self.request(Command::Snapshot)
    }

    /// Session events, in emission order
    pub fn events(&self) -> &Receiver<DiceEvent> {
        &self.events
    }

    /// Stop the thread and take the session back
    pub fn shutdown(mut self) -> Option<DiceSession> {
        let session = self.request(Command::Shutdown).ok();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
        session
    }
}

impl Drop for RunnerHandle {
    fn drop(&mut self) {
        if let Some(thread) = self.thread.take() {
            let (tx, _rx) = bounded(1);
            let _ = self.commands.send(Command::Shutdown(tx));
            let _ = thread.join();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DiceConfig;

    const WAIT: Duration = Duration::from_secs(5);

    fn wait_for_payout(handle: &RunnerHandle) -> (i64, i64) {
        loop {
            match handle.events().recv_timeout(WAIT) {
                Ok(DiceEvent::PayoutComputed { payout, sum, .. }) => return (payout, sum),
                Ok(_) => continue,
                Err(err) => panic!("no payout event: {err}"),
            }
        }
    }

    #[test]
    fn test_runner_settles_on_ticks() {
        let session = DiceSession::with_seed(DiceConfig::studio(), 3).unwrap();
        let handle = SessionRunner::spawn(session, Duration::from_millis(2)).unwrap();

        handle.roll_all().unwrap();
        let (payout, sum) = wait_for_payout(&handle);
        assert!((1..=6).contains(&sum));
        assert_eq!(payout, sum);

        let snapshot = handle.snapshot().unwrap();
        assert!(!snapshot.rolling);
        assert_eq!(snapshot.balance, payout);

        let session = handle.shutdown().unwrap();
        assert_eq!(session.stats().cycles_completed, 1);
    }

    #[test]
    fn test_runner_serializes_reports_and_purchases() {
        // ticks far apart so only explicit reports settle dice
        let session = DiceSession::with_seed(DiceConfig::classic(), 3).unwrap();
        let handle = SessionRunner::spawn(session, Duration::from_secs(3600)).unwrap();

        handle.roll_all().unwrap();
        assert!(matches!(
            handle.roll_all(),
            Err(RunnerError::Dice(DiceError::Busy))
        ));
        assert!(matches!(
            handle.try_unlock_next_die(),
            Err(RunnerError::Dice(DiceError::Busy))
        ));

        let outcome = handle.report_settle(DieId(0), 5).unwrap();
        assert!(matches!(outcome, SettleOutcome::Completed(_)));
        assert_eq!(handle.apply_last_payout().unwrap(), 5);
        assert!(matches!(
            handle.try_unlock_next_die(),
            Err(RunnerError::Dice(DiceError::InsufficientFunds { cost: 15, balance: 5 }))
        ));
        assert_eq!(handle.deposit(10).unwrap(), 15);
        assert_eq!(handle.try_unlock_next_die().unwrap().die, DieId(1));
    }

    #[test]
    fn test_runner_soft_reset_and_rolls() {
        let session = DiceSession::with_seed(DiceConfig::classic(), 3).unwrap();
        let handle = SessionRunner::spawn(session, Duration::from_secs(3600)).unwrap();

        handle.roll_all().unwrap();
        handle.soft_reset().unwrap();
        assert_eq!(handle.snapshot().unwrap().rolls_left, 3);
        assert!(matches!(
            handle.add_rolls(0),
            Err(RunnerError::Dice(DiceError::InvalidAmount))
        ));
        assert_eq!(handle.add_rolls(2).unwrap(), 5);
        assert!(handle.roll_all().is_ok());
    }

    #[test]
    fn test_dropped_handle_stops_thread() {
        let session = DiceSession::with_seed(DiceConfig::classic(), 3).unwrap();
        let handle = SessionRunner::spawn(session, Duration::from_millis(10)).unwrap();
        let events = handle.events().clone();
        drop(handle);
        // the observer's sender went down with the session
        assert!(events.recv_timeout(WAIT).is_err());
    }
}
