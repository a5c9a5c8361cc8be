//! Background classification thread.

use crate::grammar::HighlightRules;
use crate::parser::SyntaxTree;
use crate::query::classify;
use highlight_core::{QueryJob, StyleRange};
use std::io;
use std::sync::Arc;
use std::sync::mpsc::{self, Receiver, Sender, TryRecvError};
use std::thread;
use std::time::Instant;

/// One query job together with everything needed to run it off the owner thread.
pub(crate) struct ClassifyRequest {
    pub job: QueryJob,
    pub syntax: SyntaxTree,
    pub rules: Arc<HighlightRules>,
}

impl ClassifyRequest {
    /// Run the job on the calling thread.
    pub fn run(self) -> ClassifyResult {
        let styles = classify(&self.syntax, &self.rules, self.job.range);
        ClassifyResult {
            job: self.job,
            styles,
        }
    }
}

/// Output of a [`ClassifyRequest`].
pub(crate) struct ClassifyResult {
    pub job: QueryJob,
    pub styles: Vec<StyleRange>,
}

pub(crate) enum Received {
    Result(ClassifyResult),
    Empty,
    Disconnected,
}

/// Handle to the classification thread.
///
/// Dropping the handle closes the request channel; the thread finishes the job it is running
/// and exits. It is never joined.
pub(crate) struct ClassifyWorker {
    requests: Sender<ClassifyRequest>,
    results: Receiver<ClassifyResult>,
}

impl ClassifyWorker {
    pub fn spawn() -> io::Result<Self> {
        let (request_tx, request_rx) = mpsc::channel();
        let (result_tx, result_rx) = mpsc::channel();

        thread::Builder::new()
            .name("highlight-worker".to_string())
            .spawn(move || classify_loop(request_rx, result_tx))?;

        Ok(Self {
            requests: request_tx,
            results: result_rx,
        })
    }

    /// Hand `request` to the thread. Gives it back if the thread has exited.
    pub fn submit(&self, request: ClassifyRequest) -> Result<(), ClassifyRequest> {
        self.requests.send(request).map_err(|err| err.0)
    }

    pub fn try_recv(&self) -> Received {
        match self.results.try_recv() {
            Ok(result) => Received::Result(result),
            Err(TryRecvError::Empty) => Received::Empty,
            Err(TryRecvError::Disconnected) => Received::Disconnected,
        }
    }
}

fn classify_loop(rx: Receiver<ClassifyRequest>, tx: Sender<ClassifyResult>) {
    for request in rx {
        let started = Instant::now();
        let result = request.run();
        log::trace!(
            "job {} ({}..{}) classified into {} range(s) in {:?}",
            result.job.id,
            result.job.range.start,
            result.job.range.end,
            result.styles.len(),
            started.elapsed()
        );
        if tx.send(result).is_err() {
            break;
        }
    }
    log::debug!("highlight worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grammar::{Grammar, GrammarConfig, StyleMap};
    use crate::parser::ParserAdapter;
    use highlight_core::{ByteRange, DocumentSnapshot};
    use std::time::Duration;

    fn request(id: u64, range: ByteRange) -> ClassifyRequest {
        let config = GrammarConfig::new(
            "rust",
            tree_sitter_rust::LANGUAGE.into(),
            r#""let" @keyword"#,
        );
        let grammar = Arc::new(Grammar::new(&config).unwrap());
        let mut adapter = ParserAdapter::new(&grammar).unwrap();
        let syntax = adapter
            .reparse(&[], &DocumentSnapshot::from_text(1, "let x = 1;"))
            .unwrap()
            .syntax;
        let rules = HighlightRules::new(grammar, &StyleMap::new().with_styles([("keyword", 7)]));
        ClassifyRequest {
            job: QueryJob {
                id,
                epoch: 0,
                revision: 1,
                range,
            },
            syntax,
            rules: Arc::new(rules),
        }
    }

    fn wait_for(worker: &ClassifyWorker) -> ClassifyResult {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            match worker.try_recv() {
                Received::Result(result) => return result,
                Received::Empty if Instant::now() < deadline => {
                    thread::sleep(Duration::from_millis(1));
                }
                Received::Empty => panic!("worker did not answer in time"),
                Received::Disconnected => panic!("worker exited"),
            }
        }
    }

    #[test]
    fn test_results_come_back_in_submission_order() {
        let worker = ClassifyWorker::spawn().unwrap();
        assert!(worker.submit(request(1, ByteRange::new(0, 3))).is_ok());
        assert!(worker.submit(request(2, ByteRange::new(3, 10))).is_ok());

        let first = wait_for(&worker);
        assert_eq!(first.job.id, 1);
        assert_eq!(first.styles, vec![StyleRange::styled(0..3, 7)]);

        let second = wait_for(&worker);
        assert_eq!(second.job.id, 2);
        assert_eq!(second.styles, vec![StyleRange::unclassified(3..10)]);
    }

    #[test]
    fn test_run_inline_matches_worker() {
        let worker = ClassifyWorker::spawn().unwrap();
        let inline = request(1, ByteRange::new(0, 10)).run();
        assert!(worker.submit(request(1, ByteRange::new(0, 10))).is_ok());
        assert_eq!(wait_for(&worker).styles, inline.styles);
    }
}
