use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use chrono::Local;
use thiserror::Error;

use crate::identity::User;
use crate::scores::{
    LeaderboardEntry, ScoreRecord, ScoreStore, SqliteScoreStore, LEADERBOARD_SIZE,
};
use crate::session::{FinalReport, TestSettings};

/// Attempts shorter than this never auto-submit; they are noise, not scores.
pub const MIN_AUTO_SUBMIT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum SubmitError {
    #[error("sign in required to submit a score")]
    AuthRequired,
    #[error("a submission is already in flight")]
    InFlight,
    #[error("score store unavailable: {0}")]
    Store(#[from] rusqlite::Error),
}

/// What a finished test brings to the submission service.
#[derive(Debug, Clone, Copy)]
pub struct Attempt {
    pub wpm: u32,
    pub accuracy: f64,
    pub duration_secs: u64,
    pub characters_typed: usize,
    pub correct_chars: usize,
    pub incorrect_chars: usize,
    pub competitive: bool,
    pub elapsed: Duration,
}

impl Attempt {
    pub fn from_report(report: &FinalReport, settings: TestSettings) -> Self {
        Self {
            wpm: report.wpm,
            accuracy: report.accuracy,
            duration_secs: settings.duration.secs(),
            characters_typed: report.characters_typed,
            correct_chars: report.character_stats.correct,
            incorrect_chars: report.character_stats.incorrect,
            competitive: settings.competitive,
            elapsed: report.elapsed,
        }
    }

    fn to_record(self, user: &User) -> ScoreRecord {
        ScoreRecord {
            user_id: user.id.clone(),
            username: user.display_name.clone(),
            wpm: self.wpm,
            accuracy: self.accuracy,
            test_duration_secs: self.duration_secs,
            characters_typed: self.characters_typed,
            correct_chars: self.correct_chars,
            incorrect_chars: self.incorrect_chars,
            competitive: self.competitive,
            updated_at: Local::now(),
        }
    }
}

#[derive(Debug)]
pub enum SubmissionOutcome {
    /// New personal best stored; a fresh top-N rides along for the reveal.
    Improved {
        record: ScoreRecord,
        leaderboard: Vec<LeaderboardEntry>,
    },
    /// The stored best stands; nothing was written and the session stays
    /// unsubmitted so a later attempt can retry.
    NotImproved { existing: ScoreRecord },
}

/// Delivered back to the event loop when a submission worker finishes.
/// Consumers must drop updates whose epoch no longer matches the session.
#[derive(Debug)]
pub struct SubmissionUpdate {
    pub epoch: u64,
    pub result: Result<SubmissionOutcome, SubmitError>,
}

/// Fetch-compare-upsert against the store. The monotonic best-score rule
/// lives here; the store itself is last-writer-wins.
pub fn reconcile(
    store: &dyn ScoreStore,
    candidate: ScoreRecord,
) -> Result<SubmissionOutcome, SubmitError> {
    let existing = store.best_score(&candidate.user_id)?;
    if candidate.improves_on(existing.as_ref()) {
        store.upsert_best_score(&candidate)?;
        let leaderboard = store.top_scores(LEADERBOARD_SIZE)?;
        Ok(SubmissionOutcome::Improved {
            record: candidate,
            leaderboard,
        })
    } else {
        Ok(SubmissionOutcome::NotImproved {
            existing: existing.expect("no improvement implies an existing record"),
        })
    }
}

/// Runs submissions on a worker thread, one at a time.
///
/// Each worker opens its own store connection, so the event loop never
/// blocks on the database. Results come back through the caller's callback
/// tagged with the session epoch.
#[derive(Debug, Clone)]
pub struct ScoreSubmitter {
    db_path: PathBuf,
    in_flight: Arc<AtomicBool>,
}

impl ScoreSubmitter {
    pub fn new(db_path: PathBuf) -> Self {
        Self {
            db_path,
            in_flight: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Manual submission: a missing identity is the caller's problem to
    /// surface (sign-in prompt), and double submission is an error.
    pub fn submit(
        &self,
        user: Option<User>,
        attempt: Attempt,
        epoch: u64,
        on_done: impl FnOnce(SubmissionUpdate) + Send + 'static,
    ) -> Result<(), SubmitError> {
        let user = user.ok_or(SubmitError::AuthRequired)?;
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return Err(SubmitError::InFlight);
        }
        self.spawn_worker(user, attempt, epoch, on_done);
        Ok(())
    }

    /// Automatic submission on natural completion: quietly skips without an
    /// identity, for short attempts, and while another submission runs.
    pub fn submit_auto(
        &self,
        user: Option<User>,
        attempt: Attempt,
        epoch: u64,
        on_done: impl FnOnce(SubmissionUpdate) + Send + 'static,
    ) {
        let Some(user) = user else { return };
        if attempt.elapsed < MIN_AUTO_SUBMIT {
            return;
        }
        if self.in_flight.swap(true, Ordering::SeqCst) {
            return;
        }
        self.spawn_worker(user, attempt, epoch, on_done);
    }

    fn spawn_worker(
        &self,
        user: User,
        attempt: Attempt,
        epoch: u64,
        on_done: impl FnOnce(SubmissionUpdate) + Send + 'static,
    ) {
        let db_path = self.db_path.clone();
        let in_flight = Arc::clone(&self.in_flight);

        thread::spawn(move || {
            let result = SqliteScoreStore::open(&db_path)
                .map_err(SubmitError::from)
                .and_then(|store| reconcile(&store, attempt.to_record(&user)));
            in_flight.store(false, Ordering::SeqCst);
            on_done(SubmissionUpdate { epoch, result });
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use std::sync::mpsc;

    fn attempt(wpm: u32, accuracy: f64) -> Attempt {
        Attempt {
            wpm,
            accuracy,
            duration_secs: 30,
            characters_typed: 150,
            correct_chars: 148,
            incorrect_chars: 2,
            competitive: false,
            elapsed: Duration::from_secs(30),
        }
    }

    fn user(name: &str) -> User {
        User {
            id: name.to_lowercase(),
            display_name: name.to_string(),
        }
    }

    #[test]
    fn first_submission_always_improves() {
        let store = SqliteScoreStore::in_memory().unwrap();
        let outcome = reconcile(&store, attempt(60, 95.0).to_record(&user("Ada"))).unwrap();
        assert_matches!(outcome, SubmissionOutcome::Improved { .. });
        assert_eq!(store.best_score("ada").unwrap().unwrap().wpm, 60);
    }

    #[test]
    fn worse_attempt_leaves_the_record_alone() {
        let store = SqliteScoreStore::in_memory().unwrap();
        reconcile(&store, attempt(90, 99.0).to_record(&user("Ada"))).unwrap();

        let outcome = reconcile(&store, attempt(80, 95.0).to_record(&user("Ada"))).unwrap();
        assert_matches!(outcome, SubmissionOutcome::NotImproved { existing } if existing.wpm == 90);

        let stored = store.best_score("ada").unwrap().unwrap();
        assert_eq!((stored.wpm, stored.accuracy), (90, 99.0));
    }

    #[test]
    fn equal_wpm_better_accuracy_improves() {
        let store = SqliteScoreStore::in_memory().unwrap();
        reconcile(&store, attempt(90, 95.0).to_record(&user("Ada"))).unwrap();

        let outcome = reconcile(&store, attempt(90, 97.0).to_record(&user("Ada"))).unwrap();
        assert_matches!(outcome, SubmissionOutcome::Improved { .. });
        assert_eq!(store.best_score("ada").unwrap().unwrap().accuracy, 97.0);
    }

    #[test]
    fn stored_best_is_the_running_maximum_in_any_order() {
        let store = SqliteScoreStore::in_memory().unwrap();
        for (wpm, acc) in [(70, 90.0), (95, 92.0), (60, 99.0), (95, 91.0), (88, 97.0)] {
            reconcile(&store, attempt(wpm, acc).to_record(&user("Ada"))).unwrap();
        }

        let stored = store.best_score("ada").unwrap().unwrap();
        assert_eq!((stored.wpm, stored.accuracy), (95, 92.0));
    }

    #[test]
    fn improvement_refreshes_the_leaderboard_payload() {
        let store = SqliteScoreStore::in_memory().unwrap();
        reconcile(&store, attempt(50, 90.0).to_record(&user("Lin"))).unwrap();

        let outcome = reconcile(&store, attempt(75, 96.0).to_record(&user("Ada"))).unwrap();
        let SubmissionOutcome::Improved { leaderboard, .. } = outcome else {
            panic!("expected improvement");
        };
        assert_eq!(leaderboard.len(), 2);
        assert_eq!(leaderboard[0].username, "Ada");
    }

    #[test]
    fn manual_submission_without_identity_is_refused() {
        let submitter = ScoreSubmitter::new(PathBuf::from("unused.db"));
        let result = submitter.submit(None, attempt(60, 95.0), 0, |_| {});
        assert_matches!(result, Err(SubmitError::AuthRequired));
    }

    #[test]
    fn auto_submission_without_identity_is_a_silent_noop() {
        let dir = tempfile::tempdir().unwrap();
        let submitter = ScoreSubmitter::new(dir.path().join("scores.db"));
        submitter.submit_auto(None, attempt(60, 95.0), 0, |_| {
            panic!("must not run without identity")
        });
        assert!(!submitter.is_in_flight());
    }

    #[test]
    fn auto_submission_filters_degenerate_attempts() {
        let dir = tempfile::tempdir().unwrap();
        let submitter = ScoreSubmitter::new(dir.path().join("scores.db"));
        let mut short = attempt(60, 95.0);
        short.elapsed = Duration::from_secs(5);
        submitter.submit_auto(Some(user("Ada")), short, 0, |_| {
            panic!("short attempts must not submit")
        });
        assert!(!submitter.is_in_flight());
    }

    #[test]
    fn worker_reports_back_with_the_epoch() {
        let dir = tempfile::tempdir().unwrap();
        let submitter = ScoreSubmitter::new(dir.path().join("scores.db"));
        let (tx, rx) = mpsc::channel();

        submitter
            .submit(Some(user("Ada")), attempt(60, 95.0), 7, move |update| {
                tx.send(update).unwrap();
            })
            .unwrap();

        let update = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(update.epoch, 7);
        assert_matches!(update.result, Ok(SubmissionOutcome::Improved { .. }));
        assert!(!submitter.is_in_flight());
    }

    #[test]
    fn single_flight_clears_after_completion() {
        let dir = tempfile::tempdir().unwrap();
        let submitter = ScoreSubmitter::new(dir.path().join("scores.db"));
        let (tx, rx) = mpsc::channel();

        let tx1 = tx.clone();
        submitter
            .submit(Some(user("Ada")), attempt(60, 95.0), 1, move |u| {
                tx1.send(u).unwrap();
            })
            .unwrap();
        rx.recv_timeout(Duration::from_secs(5)).unwrap();

        // The flag is released, so the next submission goes through.
        submitter
            .submit(Some(user("Ada")), attempt(65, 95.0), 2, move |u| {
                tx.send(u).unwrap();
            })
            .unwrap();
        let second = rx.recv_timeout(Duration::from_secs(5)).unwrap();
        assert_eq!(second.epoch, 2);
    }
}
