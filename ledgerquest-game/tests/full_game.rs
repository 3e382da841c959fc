use ledgerquest_game::{
    CommandError, EngineConfig, FinanceEngine, GameData, Grade, MemoryRecordStore, NoticeBuffer,
    Outcome, RecordHistory, RoundPhase, ScriptedRandom, Severity, StaticIdentity,
};

const STOLEN_BIKE: usize = 3;

fn scripted_engine(rng: ScriptedRandom) -> (FinanceEngine, NoticeBuffer) {
    let notices = NoticeBuffer::new();
    let engine = FinanceEngine::new(
        EngineConfig::default(),
        GameData::load_default().unwrap(),
        Box::new(rng),
    )
    .unwrap()
    .with_notifier(notices.clone());
    (engine, notices)
}

fn answer_correctly(engine: &mut FinanceEngine) {
    let answers: Vec<(String, String)> = engine
        .session()
        .quiz
        .questions
        .iter()
        .map(|q| (q.id.clone(), q.correct_option_id.clone()))
        .collect();
    for (question, option) in answers {
        engine.answer_quiz(&question, &option).unwrap();
    }
}

#[test]
fn concert_bike_and_quiz_round_carries_into_round_two() {
    let (mut engine, notices) = scripted_engine(
        ScriptedRandom::new()
            .with_quizzes([vec![0, 1], vec![2, 3]])
            .with_events([STOLEN_BIKE]),
    );

    engine.start_game().unwrap();
    assert_eq!(engine.session().round, 1);
    assert_eq!(engine.session().balance, 18_000);

    engine.purchase_optional("concert").unwrap();
    assert_eq!(engine.session().balance, 9_300);

    match engine.draw_event().unwrap() {
        Outcome::EventDrawn {
            event,
            draws_remaining,
            ..
        } => {
            assert_eq!(event.id, "stolen_bike");
            assert_eq!(draws_remaining, 1);
        }
        other => panic!("expected an event draw, got {other:?}"),
    }
    assert_eq!(engine.session().balance, 7_800);

    engine.answer_quiz("q1", "q1o2").unwrap();
    engine.answer_quiz("q2", "q2o2").unwrap();
    let graded = engine.submit_quiz().unwrap();
    assert!(matches!(
        graded,
        Outcome::QuizGraded {
            correct: 2,
            reward: 2_000,
            ..
        }
    ));
    assert_eq!(engine.session().balance, 9_800);
    assert_eq!(engine.session().cumulative_correct, 2);
    assert_eq!(notices.last().unwrap().title, "Quiz results");

    engine.advance_round().unwrap();
    let session = engine.session();
    assert_eq!(session.round, 2);
    assert_eq!(session.balance, 27_800);
    assert_eq!(session.event_draws_remaining, 2);
    assert!(session.optional_purchases.is_empty());
    assert!(session.last_drawn_event.is_none());
    let ids: Vec<&str> = session.quiz.questions.iter().map(|q| q.id.as_str()).collect();
    assert_eq!(ids, vec!["q3", "q4"]);
    assert_eq!(session.ledger_total, session.balance);
}

#[test]
fn log_entries_are_tagged_and_newest_first() {
    let (mut engine, _) = scripted_engine(ScriptedRandom::new().with_events([STOLEN_BIKE]));
    engine.start_game().unwrap();
    engine.draw_event().unwrap();
    let entries: Vec<&str> = engine.session().log.entries().collect();
    assert_eq!(
        entries[0],
        "[Round 1] Effect: Your bike was stolen, so you take taxis to work. You lose 1,500!"
    );
    assert_eq!(entries[1], "[Round 1] You drew: Stolen bike");
    assert_eq!(
        entries.last().copied(),
        Some("[Round 1] A new money challenge begins. Get ready!")
    );
}

#[test]
fn log_keeps_fifteen_most_recent_entries() {
    let (mut engine, _) = scripted_engine(ScriptedRandom::new());
    engine.start_game().unwrap();
    for _ in 0..20 {
        engine.invest("etf").unwrap();
    }
    let session = engine.session();
    assert_eq!(session.log.len(), 15);
    assert_eq!(session.log.latest(), Some("[Round 1] You looked into Invest in an ETF."));
}

#[test]
fn complete_game_is_graded_and_recorded_for_user() {
    let store = MemoryRecordStore::new();
    let (engine, notices) = scripted_engine(ScriptedRandom::new());
    let mut engine = engine
        .with_identity(StaticIdentity::signed_in("learner"))
        .with_persistence(store.clone());

    engine.start_game().unwrap();
    // Round 1: miss both questions.
    let wrong: Vec<(String, String)> = engine
        .session()
        .quiz
        .questions
        .iter()
        .map(|q| {
            let miss = q
                .options
                .iter()
                .find(|o| o.id != q.correct_option_id)
                .unwrap()
                .id
                .clone();
            (q.id.clone(), miss)
        })
        .collect();
    for (q, o) in wrong {
        engine.answer_quiz(&q, &o).unwrap();
    }
    engine.submit_quiz().unwrap();
    engine.advance_round().unwrap();

    // Rounds 2 and 3: answer correctly.
    answer_correctly(&mut engine);
    engine.submit_quiz().unwrap();
    engine.advance_round().unwrap();
    answer_correctly(&mut engine);
    engine.submit_quiz().unwrap();
    let outcome = engine.advance_round().unwrap();

    // 3 x 18,000 + 4 x 1,000 = 58,000 with 4 correct: not S, but A.
    assert_eq!(
        outcome,
        Outcome::GameFinished {
            grade: Grade::A,
            balance: 58_000,
            correct_answers: 4,
            save_queued: true,
        }
    );
    let session = engine.session();
    assert_eq!(session.phase, RoundPhase::Over);
    assert_eq!(session.missed_questions().count(), 2);
    assert!(session.missed_questions().all(|q| q.round == 1));
    assert_eq!(
        session.log.latest(),
        Some("[Round 3] Game over! Your final grade is: A (Excellent)")
    );

    engine.wait_for_saves();
    let history = store.records_for_user("learner").unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].final_balance, 58_000);
    assert_eq!(history[0].total_correct, 4);
    assert_eq!(history[0].total_questions, 6);
    assert!(
        notices
            .snapshot()
            .iter()
            .all(|n| n.severity == Severity::Info)
    );

    assert_eq!(engine.invest("course"), Err(CommandError::GameOver));
    engine.start_game().unwrap();
    assert_eq!(engine.session().round, 1);
    assert_eq!(engine.session().balance, 18_000);
}

#[test]
fn seeded_games_replay_identically() {
    let play = |seed: u64| {
        let mut engine = FinanceEngine::seeded(seed)
            .unwrap()
            .with_notifier(NoticeBuffer::new());
        engine.start_game().unwrap();
        engine.invest("insurance").unwrap();
        while !engine.session().is_over {
            while engine.draw_event().is_ok() {}
            answer_correctly(&mut engine);
            engine.submit_quiz().unwrap();
            engine.advance_round().unwrap();
        }
        engine.snapshot()
    };
    assert_eq!(play(2024), play(2024));
}
