use std::path::Path;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use crossbeam::channel::{unbounded, Receiver, RecvTimeoutError, Sender};
use tracing::{debug, trace};

use crate::analysis::tokenizer::FileTokenizer;
use crate::core::error::{Error, ErrorKind, Result};
use crate::parallel::protocol::{encode_sentinel, encode_token, LineBuffer, DONE, SHUTDOWN, SKIP};

/// Largest chunk a worker sends at once; replies span several chunks the
/// way pipe reads would.
const CHUNK_LEN: usize = 4096;

/// The scheduler's end of a duplex byte channel to one tokenizer.
pub trait WorkerLink {
    /// Write raw protocol bytes to the worker.
    fn send(&mut self, bytes: &[u8]) -> Result<()>;

    /// Byte chunks coming back from the worker.
    fn receiver(&self) -> &Receiver<Vec<u8>>;

    /// Ask the worker to exit and wait for it.
    fn shutdown(&mut self) -> Result<()>;
}

/// A tokenizer running on its own thread.
pub struct ThreadWorker {
    id: usize,
    requests: Sender<Vec<u8>>,
    replies: Receiver<Vec<u8>>,
    handle: Option<JoinHandle<()>>,
}

impl ThreadWorker {
    pub fn spawn(id: usize, tokenizer: FileTokenizer, idle_timeout: Duration) -> Result<Self> {
        let (requests, inbox) = unbounded::<Vec<u8>>();
        let (outbox, replies) = unbounded::<Vec<u8>>();

        let handle = thread::Builder::new()
            .name(format!("gln-worker-{}", id))
            .spawn(move || worker_loop(id, tokenizer, idle_timeout, inbox, outbox))
            .map_err(|e| Error::new(ErrorKind::Subprocess, format!("spawn worker {}: {}", id, e)))?;

        Ok(ThreadWorker { id, requests, replies, handle: Some(handle) })
    }

    pub fn id(&self) -> usize {
        self.id
    }
}

impl WorkerLink for ThreadWorker {
    fn send(&mut self, bytes: &[u8]) -> Result<()> {
        self.requests.send(bytes.to_vec())?;
        Ok(())
    }

    fn receiver(&self) -> &Receiver<Vec<u8>> {
        &self.replies
    }

    fn shutdown(&mut self) -> Result<()> {
        // A worker that already idled out has dropped its inbox.
        let _ = self.requests.send(SHUTDOWN.to_vec());
        if let Some(handle) = self.handle.take() {
            handle
                .join()
                .map_err(|_| Error::new(ErrorKind::Subprocess, format!("worker {} panicked", self.id)))?;
        }
        Ok(())
    }
}

/// Spawn `count` tokenizer threads.
pub fn spawn_pool(count: usize, tokenizer: &FileTokenizer, idle_timeout: Duration) -> Result<Vec<ThreadWorker>> {
    (0..count)
        .map(|id| ThreadWorker::spawn(id, tokenizer.clone(), idle_timeout))
        .collect()
}

fn worker_loop(
    id: usize,
    tokenizer: FileTokenizer,
    idle_timeout: Duration,
    inbox: Receiver<Vec<u8>>,
    outbox: Sender<Vec<u8>>,
) {
    let mut lines = LineBuffer::new();
    loop {
        let chunk = match inbox.recv_timeout(idle_timeout) {
            Ok(chunk) => chunk,
            Err(RecvTimeoutError::Timeout) => {
                debug!(worker = id, "idle timeout, exiting");
                return;
            }
            Err(RecvTimeoutError::Disconnected) => return,
        };
        if lines.push(&chunk).is_err() {
            return;
        }

        loop {
            let path = match lines.next_line() {
                Ok(Some(line)) if line == DONE => return,
                Ok(Some(line)) => line.to_string(),
                Ok(None) => break,
                Err(_) => return,
            };
            let reply = tokenize_reply(&tokenizer, &path);
            trace!(worker = id, path = %path, bytes = reply.len(), "tokenized");
            for part in reply.chunks(CHUNK_LEN) {
                if outbox.send(part.to_vec()).is_err() {
                    return;
                }
            }
        }
    }
}

/// Full protocol reply for one path.
pub fn tokenize_reply(tokenizer: &FileTokenizer, path: &str) -> Vec<u8> {
    let mut reply = Vec::new();
    match tokenizer.tokenize_file(Path::new(path)) {
        Some(counts) => {
            for (token, count) in &counts {
                encode_token(&mut reply, token, *count);
            }
            encode_sentinel(&mut reply, DONE);
        }
        None => encode_sentinel(&mut reply, SKIP),
    }
    reply
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parallel::protocol::encode_path;
    use std::io::Write;
    use tempfile::NamedTempFile;

    fn collect_reply(worker: &ThreadWorker) -> String {
        let mut out = Vec::new();
        while !out.ends_with(b" DONE\n") && !out.ends_with(b" SKIP\n") {
            out.extend(worker.receiver().recv_timeout(Duration::from_secs(5)).unwrap());
        }
        String::from_utf8(out).unwrap()
    }

    #[test]
    fn tokenizes_over_the_channel() {
        let mut file = NamedTempFile::new().unwrap();
        file.write_all(b"alpha beta alpha").unwrap();
        let path = file.path().to_str().unwrap().to_string();

        let mut worker = ThreadWorker::spawn(0, FileTokenizer::default(), Duration::from_secs(5)).unwrap();
        assert_eq!(worker.id(), 0);
        worker.send(&encode_path(&path).unwrap()).unwrap();
        assert_eq!(collect_reply(&worker), "alpha 2\nbeta 1\n DONE\n");

        worker.send(&encode_path("/nonexistent/glean").unwrap()).unwrap();
        assert_eq!(collect_reply(&worker), " SKIP\n");
        worker.shutdown().unwrap();
    }

    #[test]
    fn idle_worker_exits_on_its_own() {
        let mut worker = ThreadWorker::spawn(1, FileTokenizer::default(), Duration::from_millis(20)).unwrap();
        thread::sleep(Duration::from_millis(100));
        assert!(worker.send(b"/tmp/x\n").is_err());
        worker.shutdown().unwrap();
    }
}
