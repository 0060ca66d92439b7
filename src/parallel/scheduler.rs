use std::collections::VecDeque;
use std::thread;
use std::time::Duration;

use crossbeam::channel::{Select, TryRecvError};
use tracing::{debug, info, warn};

use crate::core::error::{Error, ErrorKind, Result};
use crate::core::stats::Progress;
use crate::core::types::hash_word;
use crate::index::filename::FilenameSet;
use crate::index::token::TokenSet;
use crate::parallel::protocol::{encode_path, parse_record, LineBuffer, Record};
use crate::parallel::worker::WorkerLink;

/// Pause taken on a tick that neither assigned nor processed anything.
const IDLE_SLEEP: Duration = Duration::from_millis(1);

/// Counters from one scheduler run.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ScheduleOutcome {
    pub assigned: usize,
    pub indexed: usize,
    pub skipped: usize,
    pub ticks: u64,
}

struct Slot<L> {
    link: L,
    assigned: Option<String>,
    lines: LineBuffer,
    // Records for the current file, committed on DONE.
    pending: Vec<(String, u64)>,
}

/// Feeds queued paths to a pool of tokenizer workers and interns their
/// replies. Each worker holds at most one path at a time.
pub struct Scheduler<L: WorkerLink> {
    slots: Vec<Slot<L>>,
    queue: VecDeque<String>,
    tick_timeout: Duration,
    outcome: ScheduleOutcome,
}

impl<L: WorkerLink> Scheduler<L> {
    pub fn new(links: Vec<L>, tick_timeout: Duration) -> Self {
        let slots = links
            .into_iter()
            .map(|link| Slot { link, assigned: None, lines: LineBuffer::new(), pending: Vec::new() })
            .collect();
        Scheduler { slots, queue: VecDeque::new(), tick_timeout, outcome: ScheduleOutcome::default() }
    }

    pub fn enqueue(&mut self, path: String) {
        self.queue.push_back(path);
    }

    pub fn worker_count(&self) -> usize {
        self.slots.len()
    }

    pub fn busy_workers(&self) -> usize {
        self.slots.iter().filter(|s| s.assigned.is_some()).count()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    /// No file left to assign and no worker holding one.
    pub fn is_finished(&self) -> bool {
        self.queue.is_empty() && self.busy_workers() == 0
    }

    pub fn outcome(&self) -> ScheduleOutcome {
        self.outcome
    }

    /// Tick until every queued file has been tokenized.
    pub fn run(&mut self, tokens: &mut TokenSet, names: &mut FilenameSet) -> Result<ScheduleOutcome> {
        if self.slots.is_empty() && !self.queue.is_empty() {
            return Err(Error::new(ErrorKind::InvalidArgument, "no workers to schedule on".to_string()));
        }
        let mut progress = Progress::new(self.queue.len() + self.busy_workers());
        while !self.is_finished() {
            self.tick(tokens, names)?;
            if let Some(line) = progress.advance(self.outcome.indexed + self.outcome.skipped) {
                info!("{}", line);
            }
        }
        debug!(outcome = ?self.outcome, "scheduler finished");
        Ok(self.outcome)
    }

    /// One scheduling round: hand out paths, then drain whatever the busy
    /// workers have sent. Returns whether anything happened.
    pub fn tick(&mut self, tokens: &mut TokenSet, names: &mut FilenameSet) -> Result<bool> {
        self.outcome.ticks += 1;
        let mut active = self.assign()?;

        if self.busy_workers() > 0 {
            self.wait_ready();
            for i in 0..self.slots.len() {
                if self.slots[i].assigned.is_some() {
                    active |= self.drain(i, tokens, names)?;
                }
            }
        }

        if !active {
            thread::sleep(IDLE_SLEEP);
        }
        Ok(active)
    }

    fn assign(&mut self) -> Result<bool> {
        let mut assigned = false;
        for slot in self.slots.iter_mut().filter(|s| s.assigned.is_none()) {
            let Some(path) = self.queue.pop_front() else {
                break;
            };
            slot.link.send(&encode_path(&path)?)?;
            slot.assigned = Some(path);
            self.outcome.assigned += 1;
            assigned = true;
        }
        Ok(assigned)
    }

    /// Block until a busy worker's channel is readable, or the tick timeout.
    fn wait_ready(&self) {
        let mut select = Select::new();
        for slot in self.slots.iter().filter(|s| s.assigned.is_some()) {
            select.recv(slot.link.receiver());
        }
        let _ = select.ready_timeout(self.tick_timeout);
    }

    fn drain(&mut self, i: usize, tokens: &mut TokenSet, names: &mut FilenameSet) -> Result<bool> {
        let mut active = false;
        loop {
            let chunk = match self.slots[i].link.receiver().try_recv() {
                Ok(chunk) => chunk,
                Err(TryRecvError::Empty) => return Ok(active),
                Err(TryRecvError::Disconnected) => {
                    let path = self.slots[i].assigned.take().unwrap_or_default();
                    return Err(Error::new(
                        ErrorKind::Subprocess,
                        format!("worker {} went away while tokenizing {}", i, path),
                    ));
                }
            };
            active = true;

            let slot = &mut self.slots[i];
            slot.lines.push(&chunk)?;
            while let Some(line) = slot.lines.next_line()? {
                let Some(path) = slot.assigned.as_deref() else {
                    return Err(Error::protocol(format!("worker {} sent {:?} while idle", i, line)));
                };
                match parse_record(line)? {
                    Record::Token { text, count } => slot.pending.push((text.to_string(), count)),
                    Record::Skip => {
                        debug!(path, "skipped");
                        slot.pending.clear();
                        slot.assigned = None;
                        self.outcome.skipped += 1;
                    }
                    Record::Done => {
                        let file_hash = hash_word(path);
                        for (text, count) in slot.pending.drain(..) {
                            tokens.record(&text, count, file_hash);
                        }
                        names.fname_add(path);
                        slot.assigned = None;
                        self.outcome.indexed += 1;
                    }
                }
            }
        }
    }

    /// Send every worker the shutdown sentinel and wait for it to exit.
    pub fn shutdown(mut self) -> Result<()> {
        let mut first_err = None;
        for slot in &mut self.slots {
            if let Some(path) = slot.assigned.take() {
                warn!(path = %path, "shutting down with a file still assigned");
            }
            if let Err(e) = slot.link.shutdown() {
                first_err.get_or_insert(e);
            }
        }
        first_err.map_or(Ok(()), Err)
    }
}
