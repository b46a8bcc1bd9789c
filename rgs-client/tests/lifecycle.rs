//! Session and round lifecycle scenarios against the in-process RGS.

use std::sync::Arc;
use std::time::Duration;

use rgs_client::core::hash::hash_server_seed;
use rgs_client::game::bonus::FeatureActivated;
use rgs_client::game::grid::{uniform_multipliers, GRID_COLS, GRID_ROWS};
use rgs_client::game::spin::ModifierFlags;
use rgs_client::network::protocol::SessionRequest;
use rgs_client::network::{Backend, LocalRgs, LocalRgsConfig, RgsTransport};
use rgs_client::round::{Resumed, RoundSettlement};
use rgs_client::{
    to_fixed, Amount, BetConfig, ClientConfig, PendingOutcome, RetryPolicy, RgsError, RoundExecutor,
    RoundRequest, Session, SessionManager, SessionMode, VisibleState, MONETARY_SCALE,
};

const UNIT: i64 = MONETARY_SCALE;

fn fast_config() -> ClientConfig {
    ClientConfig::default().with_retry_policy(RetryPolicy {
        initial_backoff: Duration::ZERO,
        ..Default::default()
    })
}

async fn local_session(config: LocalRgsConfig) -> (Arc<LocalRgs>, SessionManager, Session) {
    let rgs = Arc::new(LocalRgs::new(config));
    let manager = SessionManager::with_backend(Backend::Local(rgs.clone()), fast_config());
    let session = manager.create_session().await.unwrap();
    (rgs, manager, session)
}

async fn play(session: &mut Session, request: RoundRequest) -> (PendingOutcome, RoundSettlement) {
    let mut executor = RoundExecutor::new(session);
    let outcome = executor.submit_round(request).await.unwrap();
    let mut visible = VisibleState::begin(&outcome);
    for index in 0..outcome.event_count() {
        let acked = executor.acknowledge_event(index).await.unwrap();
        visible.apply(&acked).unwrap();
    }
    let settlement = executor.end_round().await.unwrap();
    assert_eq!(visible.balance, settlement.balance);
    (outcome, settlement)
}

async fn play_free_spins(session: &mut Session, wager: Amount) -> u32 {
    let mut played = 0;
    while session.free_spins_remaining > 0 {
        play(session, RoundRequest::free_spin(wager, format!("free-{}", played))).await;
        played += 1;
    }
    played
}

#[tokio::test]
async fn test_minimal_wager_round_and_idempotent_end() {
    let (_rgs, _manager, mut session) = local_session(LocalRgsConfig {
        bet_config: BetConfig::new(100, 100 * UNIT, 100),
        ..Default::default()
    })
    .await;
    let start = session.balance;
    assert_eq!(session.nonce, 0);

    let mut executor = RoundExecutor::new(&mut session);
    let request = RoundRequest::base(100, "client-seed").with_modifiers(ModifierFlags {
        scatter_boost: false,
        wild_boost: false,
    });
    let outcome = executor.submit_round(request).await.unwrap();
    assert!(outcome.event_count() > 0);
    assert_eq!(outcome.debited, 100);

    for index in 0..outcome.event_count() {
        executor.acknowledge_event(index).await.unwrap();
    }
    let first = executor.end_round().await.unwrap();
    assert_eq!(first.round_id.as_deref(), Some(outcome.round_id.as_str()));
    assert_eq!(first.balance, start - 100 + outcome.outcome.total_win);

    let second = executor.end_round().await.unwrap();
    assert_eq!(second.round_id, None);
    assert_eq!(second.credited, 0);
    assert_eq!(second.balance, first.balance);
}

#[tokio::test]
async fn test_wager_limits() {
    let (_rgs, _manager, mut session) = local_session(LocalRgsConfig::default()).await;
    let config = session.bet_config.clone();

    for wager in [config.min_bet, config.min_bet + config.step_bet, config.default_bet, config.max_bet] {
        play(&mut session, RoundRequest::base(wager, "limits")).await;
        play_free_spins(&mut session, wager).await;
    }

    for wager in [config.min_bet - config.step_bet, config.max_bet + config.step_bet, config.min_bet + 1] {
        let err = RoundExecutor::new(&mut session)
            .submit_round(RoundRequest::base(wager, "limits"))
            .await
            .unwrap_err();
        assert!(matches!(err, RgsError::InvalidWager(_)), "wager {}: {:?}", wager, err);
        assert!(err.is_user_correctable());
    }
}

#[tokio::test]
async fn test_acknowledgements_are_strictly_ordered() {
    let (_rgs, _manager, mut session) = local_session(LocalRgsConfig::default()).await;
    let mut executor = RoundExecutor::new(&mut session);
    let outcome = executor.submit_round(RoundRequest::base(UNIT, "order")).await.unwrap();

    executor.acknowledge_event(0).await.unwrap();
    let err = executor.acknowledge_event(2).await.unwrap_err();
    assert!(matches!(err, RgsError::OutOfOrderAcknowledgement(_)));
    assert!(err.is_protocol_violation());

    let err = executor.acknowledge_event(0).await.unwrap_err();
    assert!(matches!(err, RgsError::OutOfOrderAcknowledgement(_)));

    for index in 1..outcome.event_count() {
        executor.acknowledge_event(index).await.unwrap();
    }
    let err = executor.acknowledge_event(outcome.event_count()).await.unwrap_err();
    assert!(matches!(err, RgsError::OutOfOrderAcknowledgement(_)));
    executor.end_round().await.unwrap();
}

#[tokio::test]
async fn test_one_round_in_flight() {
    let (rgs, _manager, mut session) = local_session(LocalRgsConfig::default()).await;
    let session_id = session.id.clone();
    let mut executor = RoundExecutor::new(&mut session);
    let outcome = executor.submit_round(RoundRequest::base(UNIT, "first")).await.unwrap();

    let err = executor.submit_round(RoundRequest::base(UNIT, "second")).await.unwrap_err();
    assert!(matches!(err, RgsError::RoundInProgress(_)));
    let err = executor.end_round().await.unwrap_err();
    assert!(matches!(err, RgsError::EventsPending(_)));

    // The server enforces the same rule for other clients of the session.
    let snapshot = rgs.get_session(&SessionRequest { session_id }).await.unwrap();
    assert_eq!(snapshot.active_round_id.as_deref(), Some(outcome.round_id.as_str()));

    for index in 0..outcome.event_count() {
        executor.acknowledge_event(index).await.unwrap();
    }
    executor.end_round().await.unwrap();
    play_free_spins(&mut session, UNIT).await;
    RoundExecutor::new(&mut session)
        .submit_round(RoundRequest::base(UNIT, "third"))
        .await
        .unwrap();
}

#[tokio::test]
async fn test_rotation_reveals_committed_seed() {
    let (_rgs, manager, mut session) = local_session(LocalRgsConfig::default()).await;
    let commitment = session.commitment.server_seed_hash.clone();
    for n in 0..3 {
        play(&mut session, RoundRequest::base(UNIT, format!("rotate-{}", n))).await;
        play_free_spins(&mut session, UNIT).await;
    }
    let served = session.served_rounds().len();
    assert!(served >= 3);
    assert_eq!(session.nonce, served as u64);

    let rotation = manager.rotate_seed(&mut session).await.unwrap();
    assert_eq!(hash_server_seed(&rotation.revealed_server_seed), commitment);
    assert_eq!(rotation.rounds.len(), served);
    assert!(rotation.report.is_valid());

    assert_eq!(session.nonce, 0);
    assert_eq!(session.commitment.server_seed_hash, rotation.new_server_seed_hash);
    assert!(session.served_rounds().is_empty());

    let (outcome, _) = play(&mut session, RoundRequest::base(UNIT, "after")).await;
    assert_eq!(outcome.nonce, 0);
}

#[tokio::test]
async fn test_corrupted_reveal_is_trust_critical() {
    let (rgs, manager, mut session) = local_session(LocalRgsConfig::default()).await;
    play(&mut session, RoundRequest::base(UNIT, "corrupt")).await;

    rgs.corrupt_next_reveal();
    let err = manager.rotate_seed(&mut session).await.unwrap_err();
    assert!(matches!(err, RgsError::FairnessVerificationMismatch(_)));
    assert!(err.is_trust_critical());
    assert!(session.fairness_violation().is_some());
}

#[tokio::test]
async fn test_rotation_refused_mid_round() {
    let (_rgs, manager, mut session) = local_session(LocalRgsConfig::default()).await;
    RoundExecutor::new(&mut session)
        .submit_round(RoundRequest::base(UNIT, "mid"))
        .await
        .unwrap();
    let err = manager.rotate_seed(&mut session).await.unwrap_err();
    assert!(matches!(err, RgsError::RoundInProgress(_)));
}

#[tokio::test]
async fn test_trigger_spin_needs_confirmation() {
    let (rgs, manager, mut session) = local_session(LocalRgsConfig::default()).await;
    let start = session.balance;

    let mut executor = RoundExecutor::new(&mut session);
    let trigger = executor.bonus_trigger_spin("free_spins_8", UNIT, "trigger").await.unwrap();
    assert_eq!(trigger.free_spins_triggered, 8);
    assert_eq!(trigger.scatter_count, 3);
    assert_eq!(trigger.cost, 100 * UNIT);
    assert_eq!(executor.session().free_spins_remaining, 0);

    for index in 0..trigger.outcome.event_count() {
        executor.acknowledge_event(index).await.unwrap();
    }
    executor.end_round().await.unwrap();
    assert_eq!(executor.session().free_spins_remaining, 0);
    assert_eq!(executor.session().pending_free_spins, Some(8));

    let snapshot = rgs
        .get_session(&SessionRequest { session_id: executor.session().id.clone() })
        .await
        .unwrap();
    assert_eq!(snapshot.free_spins_remaining, 0);

    let err = executor.submit_round(RoundRequest::base(UNIT, "blocked")).await.unwrap_err();
    assert!(matches!(err, RgsError::InvalidRequest(_)));

    assert_eq!(executor.activate_free_spins().await.unwrap(), 8);
    assert_eq!(session.free_spins_remaining, 8);
    assert_eq!(session.balance, start - 100 * UNIT);

    manager.refresh_session(&mut session).await.unwrap();
    assert_eq!(session.free_spins_remaining, 8);
    assert!(session.pending_free_spins.is_none());

    assert!(play_free_spins(&mut session, UNIT).await >= 8);
}

#[tokio::test]
async fn test_enhanced_purchase_presets_grid() {
    let (_rgs, manager, mut session) = local_session(LocalRgsConfig::default()).await;
    let purchase = RoundExecutor::new(&mut session)
        .buy_bonus("free_spins_12", UNIT, "enhanced")
        .await
        .unwrap();
    assert_eq!(purchase.feature, FeatureActivated::FreeSpinsEnhanced);
    assert_eq!(purchase.cost, 200 * UNIT);

    assert_eq!(session.free_spins_remaining, 12);
    let grid = session.multipliers.unwrap();
    for row in 0..GRID_ROWS {
        for col in 0..GRID_COLS {
            assert_eq!(grid[row][col], 2);
        }
    }

    // Same on the server
    manager.refresh_session(&mut session).await.unwrap();
    assert_eq!(session.free_spins_remaining, 12);
    assert_eq!(session.multipliers, Some(uniform_multipliers(2)));

    let (outcome, _) = play(&mut session, RoundRequest::free_spin(UNIT, "first-free")).await;
    assert!(outcome.outcome.is_free_spin);
    assert_eq!(outcome.debited, 0);
    assert_eq!(outcome.starting_multipliers, uniform_multipliers(2));
}

#[tokio::test]
async fn test_unknown_bonus() {
    let (_rgs, _manager, mut session) = local_session(LocalRgsConfig::default()).await;
    let err = RoundExecutor::new(&mut session)
        .buy_bonus("no_such_bonus", UNIT, "x")
        .await
        .unwrap_err();
    assert!(matches!(err, RgsError::BonusNotFound(_)));
    assert!(session.is_idle());
}

#[tokio::test]
async fn test_lost_response_is_not_charged_twice() {
    let (rgs, manager, mut session) = local_session(LocalRgsConfig::default()).await;
    let start = session.balance;

    rgs.drop_next_response();
    let (outcome, settlement) = play(&mut session, RoundRequest::base(UNIT, "retry")).await;
    assert_eq!(outcome.balance_after_debit, start - UNIT);
    assert_eq!(settlement.balance, start - UNIT + outcome.outcome.total_win);

    let rotation = manager.rotate_seed(&mut session).await.unwrap();
    assert_eq!(rotation.rounds.len(), 1);
}

#[tokio::test]
async fn test_lost_ack_reply_does_not_lock_the_session() {
    let rgs = Arc::new(LocalRgs::default());
    let config = ClientConfig::default().with_retry_policy(RetryPolicy::none());
    let manager = SessionManager::with_backend(Backend::Local(rgs.clone()), config);
    let mut session = manager.create_session().await.unwrap();
    let start = session.balance;

    let mut executor = RoundExecutor::new(&mut session);
    let outcome = executor.submit_round(RoundRequest::base(UNIT, "lost-ack")).await.unwrap();

    rgs.drop_next_response();
    let err = executor.acknowledge_event(0).await.unwrap_err();
    assert!(err.is_retryable());

    // The server counted event 0; acknowledging it again is accepted.
    let mut visible = VisibleState::begin(&outcome);
    for index in 0..outcome.event_count() {
        let acked = executor.acknowledge_event(index).await.unwrap();
        visible.apply(&acked).unwrap();
    }
    let settlement = executor.end_round().await.unwrap();
    assert_eq!(settlement.round_id.as_deref(), Some(outcome.round_id.as_str()));
    assert_eq!(settlement.balance, start - UNIT + outcome.outcome.total_win);
    assert_eq!(visible.balance, settlement.balance);
    assert!(session.is_idle());
}

#[tokio::test]
async fn test_lost_end_round_reply_still_reports_credit() {
    let (rgs, _manager, mut session) = local_session(LocalRgsConfig::default()).await;

    for n in 0..200 {
        let start = session.balance;
        let credited_before = session.stats.total_credited;
        let mut executor = RoundExecutor::new(&mut session);
        let outcome = executor.submit_round(RoundRequest::base(UNIT, format!("win-{}", n))).await.unwrap();
        for index in 0..outcome.event_count() {
            executor.acknowledge_event(index).await.unwrap();
        }

        if outcome.outcome.total_win == 0 {
            executor.end_round().await.unwrap();
            play_free_spins(&mut session, UNIT).await;
            continue;
        }

        // Closed and credited server-side; the retry finds nothing open.
        rgs.drop_next_response();
        let settlement = executor.end_round().await.unwrap();
        assert_eq!(settlement.round_id.as_deref(), Some(outcome.round_id.as_str()));
        assert_eq!(settlement.credited, outcome.outcome.total_win);
        assert_eq!(settlement.balance, start - UNIT + outcome.outcome.total_win);
        assert_eq!(session.stats.total_credited, credited_before + outcome.outcome.total_win);
        return;
    }
    panic!("no winning round");
}

#[tokio::test]
async fn test_bet_history_spans_rotations() {
    let (_rgs, manager, mut session) = local_session(LocalRgsConfig::default()).await;
    let (first, _) = play(&mut session, RoundRequest::base(UNIT, "h-0")).await;
    play_free_spins(&mut session, UNIT).await;
    manager.rotate_seed(&mut session).await.unwrap();
    let (second, _) = play(&mut session, RoundRequest::base(UNIT, "h-1")).await;

    let page = manager.bet_history(&session, 100).await.unwrap();
    assert_eq!(page.total_bets, page.history.len());
    assert_eq!(page.history.first().map(|r| r.round_id.clone()), Some(second.round_id));
    assert_eq!(page.history.last().map(|r| r.round_id.clone()), Some(first.round_id));

    let page = manager.bet_history(&session, 1).await.unwrap();
    assert_eq!(page.history.len(), 1);
}

#[tokio::test]
async fn test_lost_purchase_resumed_with_same_key() {
    let rgs = Arc::new(LocalRgs::default());
    let config = ClientConfig::default().with_retry_policy(RetryPolicy::none());
    let manager = SessionManager::with_backend(Backend::Local(rgs.clone()), config);
    let mut session = manager.create_session().await.unwrap();
    let start = session.balance;

    rgs.drop_next_response();
    let err = RoundExecutor::new(&mut session)
        .buy_bonus("wolf_burst", UNIT, "burst")
        .await
        .unwrap_err();
    assert!(err.is_retryable());
    assert!(!session.is_idle());

    let err = RoundExecutor::new(&mut session)
        .submit_round(RoundRequest::base(UNIT, "blocked"))
        .await
        .unwrap_err();
    assert!(matches!(err, RgsError::RoundInProgress(_)));

    let resumed = RoundExecutor::new(&mut session).resume_submit().await.unwrap();
    let Resumed::Purchase(purchase) = resumed else {
        panic!("expected a purchase");
    };
    assert_eq!(purchase.balance, start - 10 * UNIT);
    assert!(session.is_idle());
    assert_eq!(session.armed_feature, Some(FeatureActivated::WolfBurst));
    assert!(session.armed_detail.as_ref().is_some_and(|f| f.wild_positions.len() >= 3));

    manager.refresh_balance(&mut session).await.unwrap();
    assert_eq!(session.balance, start - 10 * UNIT);
}

#[tokio::test]
async fn test_demo_fallback_when_primary_unreachable() {
    let primary = Arc::new(LocalRgs::default());
    primary.set_offline(true);
    let manager = SessionManager::with_backend(Backend::Local(primary.clone()), fast_config());

    let mut session = manager.create_session().await.unwrap();
    assert_eq!(session.mode, SessionMode::Demo);
    assert!(session.is_demo());
    assert_eq!(session.balance, manager.config().demo_balance);
    assert_eq!(primary.session_count().await, 0);

    play(&mut session, RoundRequest::base(UNIT, "demo")).await;
}

#[tokio::test]
async fn test_catalog_outage_does_not_block_play() {
    let (rgs, manager, mut session) = local_session(LocalRgsConfig::default()).await;
    assert!(manager.bonus_options(&session).await.is_some());

    rgs.set_catalog_offline(true);
    assert!(manager.bonus_options(&session).await.is_none());
    assert!(manager.jackpot_info(&session).await.is_none());

    play(&mut session, RoundRequest::base(UNIT, "outage")).await;
    let fresh = manager.create_session().await.unwrap();
    assert_eq!(fresh.mode, SessionMode::Live);
}

#[tokio::test]
async fn test_full_session_audits_clean() {
    let (_rgs, manager, mut session) = local_session(LocalRgsConfig::default()).await;

    RoundExecutor::new(&mut session)
        .buy_bonus("max_multi_start", UNIT, "multi")
        .await
        .unwrap();
    let (boosted, _) = play(&mut session, RoundRequest::base(UNIT, "multi-round")).await;
    assert_ne!(boosted.starting_multipliers, uniform_multipliers(1));
    assert!(session.armed_feature.is_none());
    play_free_spins(&mut session, UNIT).await;

    let boost = ModifierFlags { scatter_boost: true, wild_boost: true };
    let (outcome, _) = play(&mut session, RoundRequest::base(UNIT, "boosted").with_modifiers(boost)).await;
    assert_eq!(outcome.debited, 10 * UNIT);
    play_free_spins(&mut session, UNIT).await;

    let mut executor = RoundExecutor::new(&mut session);
    let trigger = executor.bonus_trigger_spin("free_spins_12", UNIT, "trigger").await.unwrap();
    for index in 0..trigger.outcome.event_count() {
        executor.acknowledge_event(index).await.unwrap();
    }
    executor.end_round().await.unwrap();
    assert_eq!(executor.activate_free_spins().await.unwrap(), 12);
    play_free_spins(&mut session, UNIT).await;

    let served = session.served_rounds().len();
    let rotation = manager.rotate_seed(&mut session).await.unwrap();
    assert_eq!(rotation.rounds.len(), served);
    assert!(rotation.report.is_valid());
}

#[test]
fn test_fixed_point_conversion() {
    assert_eq!(to_fixed(1.00).unwrap(), 1_000_000);
    assert_eq!(to_fixed(0.1).unwrap(), 100_000);
}
