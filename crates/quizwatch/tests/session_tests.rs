use quizwatch::harness::SimHost;
use quizwatch::session::{allowed_transitions, validate_transition, FeedbackEnd, QuizSession, SessionPhase, Verdict};
use quizwatch::{ComponentId, ComponentRef, ObserverConfig, Presenter, QuizItem, RenderHint};
use parking_lot::Mutex;
use proptest::prelude::*;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Default)]
struct Screen {
    log: Mutex<Vec<String>>,
}

impl Presenter for Screen {
    fn display_item(&self, item: &QuizItem) {
        self.log.lock().push(format!("display {}", item.tag));
    }
    fn acknowledge_correct(&self, _item: &QuizItem) {
        self.log.lock().push("ack".into());
    }
    fn reveal_correct(&self, _item: &QuizItem, blink_on: bool) {
        self.log.lock().push(format!("blink {blink_on}"));
    }
    fn clear(&self) {
        self.log.lock().push("clear".into());
    }
}

fn item() -> QuizItem {
    QuizItem {
        tag: "cut_color".into(),
        prompt: "Which colour?".into(),
        answers: vec!["red".into(), "blue".into(), "white".into(), "black".into()],
        correct_index: 3,
        hint: RenderHint::Grid,
    }
}

fn owner() -> ComponentRef {
    ComponentRef::new(ComponentId(4), "wires")
}

#[test]
fn test_idle_transitions() {
    assert!(validate_transition(SessionPhase::Idle, SessionPhase::Displaying).is_ok());

    // Invalid
    assert!(validate_transition(SessionPhase::Idle, SessionPhase::Correct).is_err());
    assert!(validate_transition(SessionPhase::Idle, SessionPhase::Wrong).is_err());
}

#[test]
fn test_feedback_transitions() {
    assert!(validate_transition(SessionPhase::Correct, SessionPhase::Idle).is_ok());
    assert!(validate_transition(SessionPhase::Wrong, SessionPhase::Idle).is_ok());

    assert!(validate_transition(SessionPhase::Wrong, SessionPhase::Displaying).is_err());
    assert!(validate_transition(SessionPhase::Correct, SessionPhase::Wrong).is_err());
}

#[tokio::test(start_paused = true)]
async fn correct_choice_acknowledges_then_idles() {
    let host = SimHost::default();
    let screen = Screen::default();
    let abort = CancellationToken::new();
    let config = ObserverConfig::new();
    let mut session = QuizSession::new();

    session.present(owner(), item()).unwrap();
    let verdict = session.choose(3).unwrap();
    assert_eq!(verdict, Verdict::Correct);

    let started = tokio::time::Instant::now();
    let end = session
        .play_feedback(verdict, &config, &host, &screen, &abort)
        .await
        .unwrap();
    assert_eq!(end, FeedbackEnd::Completed);
    assert!(started.elapsed() >= config.correct_ack());
    assert_eq!(session.phase(), SessionPhase::Idle);
    assert_eq!(host.penalties(), 0);
    assert_eq!(*screen.log.lock(), vec!["ack".to_string(), "clear".to_string()]);
}

#[tokio::test(start_paused = true)]
async fn wrong_choice_penalizes_once_and_blinks() {
    let host = SimHost::default();
    let screen = Screen::default();
    let abort = CancellationToken::new();
    let config = ObserverConfig::new().with_blinks(4, Duration::from_millis(100));
    let mut session = QuizSession::new();

    session.present(owner(), item()).unwrap();
    let verdict = session.choose(0).unwrap();
    assert_eq!(verdict, Verdict::Wrong { chosen: 0, correct: 3 });
    // Further choices during the reveal are ignored
    assert!(session.choose(3).is_none());

    session
        .play_feedback(verdict, &config, &host, &screen, &abort)
        .await
        .unwrap();
    assert_eq!(host.penalties(), 1);
    assert_eq!(host.penalized(), vec![owner()]);
    assert_eq!(
        *screen.log.lock(),
        vec!["blink true", "blink false", "blink true", "blink false", "clear"]
    );
    assert!(session.is_idle());
}

#[tokio::test(start_paused = true)]
async fn reveal_survives_until_whole_session_abort() {
    let host = SimHost::default();
    let screen = Screen::default();
    let abort = CancellationToken::new();
    let config = ObserverConfig::new().with_blinks(10, Duration::from_millis(100));
    let mut session = QuizSession::new();
    session.present(owner(), item()).unwrap();
    let verdict = session.choose(1).unwrap();

    let trigger = abort.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(350)).await;
        trigger.cancel();
    });
    let end = session
        .play_feedback(verdict, &config, &host, &screen, &abort)
        .await
        .unwrap();

    assert_eq!(end, FeedbackEnd::Aborted);
    assert_eq!(host.penalties(), 1);
    assert_eq!(screen.log.lock().len(), 4);
    assert!(session.is_idle());
}

fn any_phase() -> impl Strategy<Value = SessionPhase> {
    prop_oneof![
        Just(SessionPhase::Idle),
        Just(SessionPhase::Displaying),
        Just(SessionPhase::Correct),
        Just(SessionPhase::Wrong),
    ]
}

proptest! {
    #[test]
    fn prop_all_transitions_are_subset_of_allowed(from in any_phase(), to in any_phase()) {
        let res = validate_transition(from, to);
        let allowed = allowed_transitions(from);

        if res.is_ok() {
            assert!(allowed.contains(&to));
        } else {
            assert!(!allowed.contains(&to));
        }
    }

    #[test]
    fn prop_choices_only_count_while_displaying(choices in proptest::collection::vec(0usize..6, 1..20)) {
        let mut session = QuizSession::new();
        session.present(owner(), item()).unwrap();
        let mut verdicts = 0;
        for index in choices {
            if session.choose(index).is_some() {
                verdicts += 1;
            }
        }
        prop_assert!(verdicts <= 1);
        prop_assert_eq!(session.served(), 1);
    }
}
