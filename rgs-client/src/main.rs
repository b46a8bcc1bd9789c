//! RGS Client
//!
//! Demo walkthrough: plays a few rounds, a bonus trigger and purchase, then
//! rotates the seed and audits everything played under it.
//! Points at `RGS_BASE_URL` when set, otherwise plays in demo mode.

use anyhow::Context;
use tracing::{debug, error, info, warn};
use tracing_subscriber::{EnvFilter, FmtSubscriber};

use rgs_client::{
    core::money::format_amount,
    network::protocol::RoundInputs,
    game::spin::RoundMode,
    proof::verify::outcome_digest,
    round::executor::RoundSettlement,
    session::manager::DEFAULT_HISTORY_LIMIT,
    verify_round, ClientConfig, RoundExecutor, RoundRequest, Session, SessionManager, VisibleState,
    VERSION,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize logging
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let subscriber = FmtSubscriber::builder().with_env_filter(filter).finish();
    tracing::subscriber::set_global_default(subscriber).context("failed to set tracing subscriber")?;

    info!("RGS Client v{}", VERSION);

    let config = ClientConfig::from_env();
    match &config.base_url {
        Some(url) => info!("RGS: {}", url),
        None => info!("RGS: none configured, demo mode"),
    }

    let manager = SessionManager::new(config)?;
    let mut session = manager.create_session().await?;
    info!(
        "Session {} ({:?}), balance {} {}",
        session.id,
        session.mode,
        format_amount(session.balance),
        session.bet_config.currency
    );

    // Auxiliary data never blocks play
    if let Some(game) = manager.game_info(&session).await {
        info!(
            "{} v{}: {}x{} grid, clusters of {}+",
            game.name, game.version, game.grid_rows, game.grid_cols, game.min_cluster_size
        );
    }
    match manager.bonus_options(&session).await {
        Some(options) => {
            for option in options {
                info!("Bonus {}: {} ({}x)", option.id, option.name, option.cost_multiplier);
            }
        }
        None => warn!("Playing without the bonus catalog"),
    }
    if let Some(tiers) = manager.jackpot_info(&session).await {
        for tier in tiers {
            info!("Jackpot {}: {}", tier.name, format_amount(tier.amount));
        }
    }

    demo_rounds(&mut session).await?;

    // Rotate and audit
    info!("=== Rotating Seed ===");
    match manager.rotate_seed(&mut session).await {
        Ok(rotation) => {
            info!(
                "Revealed {} for commitment {}",
                rotation.revealed_server_seed, rotation.previous_commitment.server_seed_hash
            );
            info!("{} rounds verified", rotation.report.rounds.len());

            // Spot-check plain base rounds with the standalone helper
            for record in &rotation.rounds {
                let RoundInputs::Spin { mode: RoundMode::Base, feature: None, modifiers, .. } = &record.inputs else {
                    continue;
                };
                if modifiers.any() {
                    continue;
                }
                let outcome = verify_round(&rotation.revealed_server_seed, &record.client_seed, record.nonce, record.wager)?;
                if outcome_digest(&outcome.events) == record.outcome_digest {
                    debug!("Round {} recomputed", record.round_id);
                } else {
                    warn!("Round {} does not recompute", record.round_id);
                }
            }
        }
        Err(err) if err.is_trust_critical() => {
            error!("FAIRNESS CHECK FAILED: {}", err);
            return Err(err.into());
        }
        Err(err) => return Err(err.into()),
    }

    let history = manager.bet_history(&session, DEFAULT_HISTORY_LIMIT).await?;
    info!("=== Last {} of {} Bets ===", history.history.len(), history.total_bets);
    for record in &history.history {
        info!(
            "{} nonce {}: wager {}, won {}",
            record.round_id,
            record.nonce,
            format_amount(record.wager),
            format_amount(record.total_win)
        );
    }

    let stats = session.stats;
    info!("=== Session Summary ===");
    info!("Rounds: {}", stats.rounds_played);
    info!("Debited: {}", format_amount(stats.total_debited));
    info!("Credited: {}", format_amount(stats.total_credited));
    info!("Tumbles: {}, max multiplier x{}", stats.total_tumbles, stats.max_multiplier);
    info!("Final balance: {}", format_amount(session.balance));

    Ok(())
}

async fn demo_rounds(session: &mut Session) -> anyhow::Result<()> {
    let wager = session.bet_config.default_bet;

    info!("=== Base Rounds ===");
    for n in 0..5 {
        play_round(session, RoundRequest::base(wager, format!("demo-{}", n))).await?;
    }

    info!("=== Trigger Spin ===");
    {
        let mut executor = RoundExecutor::new(session);
        let trigger = executor.bonus_trigger_spin("free_spins_8", wager, "demo-trigger").await?;
        info!(
            "{} scatters landed, {} free spins on confirmation (cost {})",
            trigger.scatter_count,
            trigger.free_spins_triggered,
            format_amount(trigger.cost)
        );
        for index in 0..trigger.outcome.event_count() {
            executor.acknowledge_event(index).await?;
        }
        executor.end_round().await?;
        let spins = executor.activate_free_spins().await?;
        info!("Activated {} free spins", spins);
    }

    let mut n = 0;
    while session.free_spins_remaining > 0 {
        play_round(session, RoundRequest::free_spin(wager, format!("free-{}", n))).await?;
        n += 1;
    }

    info!("=== Bonus Purchase ===");
    let purchase = RoundExecutor::new(session).buy_bonus("wolf_burst", wager, "demo-buy").await?;
    info!("Bought {} for {}", purchase.feature.as_str(), format_amount(purchase.cost));
    play_round(session, RoundRequest::base(wager, "demo-burst")).await?;

    Ok(())
}

/// Submit, play back, and end one round.
async fn play_round(session: &mut Session, request: RoundRequest) -> anyhow::Result<RoundSettlement> {
    let mut executor = RoundExecutor::new(session);
    let outcome = executor.submit_round(request).await?;

    // Only acknowledged events reach the visible state
    let mut visible = VisibleState::begin(&outcome);
    for index in 0..outcome.event_count() {
        let acked = executor.acknowledge_event(index).await?;
        visible.apply(&acked)?;
        debug!("  event {} {}", index, acked.event.kind());
    }

    let settlement = executor.end_round().await?;
    info!(
        "Round {} nonce {}: {} tumbles, pays {}, balance {}",
        outcome.round_id,
        outcome.nonce,
        outcome.tumble_count(),
        outcome.outcome.payout_multiplier,
        format_amount(settlement.balance)
    );
    if visible.balance != settlement.balance {
        warn!(
            "Visible balance {} differs from settled {}",
            format_amount(visible.balance),
            format_amount(settlement.balance)
        );
    }
    Ok(settlement)
}
