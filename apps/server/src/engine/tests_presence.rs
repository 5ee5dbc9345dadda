use crate::engine::events::Event;
use crate::engine::state::{Phase, PlayerStatus};
use crate::engine::test_support::TestHarness;
use crate::engine::timers::{TaskKind, TimerTask};
use crate::engine::{Command, Inbound};
use crate::lobby::ConnectionId;
use uuid::Uuid;

fn new_conn() -> ConnectionId {
    ConnectionId(Uuid::new_v4())
}

#[test]
fn losing_an_active_seat_pauses_the_table() {
    let mut h = TestHarness::new();
    let conns = h.start_game(4);

    h.engine.handle(Inbound::ConnectionLost(conns[2]));

    let session = h.session();
    assert!(session.paused);
    assert_eq!(session.players[2].status, PlayerStatus::Disconnected);
    assert_eq!(session.paused_for, vec!["p3".to_string()]);
    assert!(session.pause_deadline.is_some());
    assert!(session.turn_deadline.is_none(), "turn timer cancelled");
    assert!(h
        .timers
        .pending()
        .iter()
        .any(|t| matches!(t.task.kind, TaskKind::GraceExpiry { .. })));
    assert!(h
        .events
        .log_lines()
        .iter()
        .any(|l| l.contains("p3 has disconnected. The game is paused.")));
}

#[test]
fn player_actions_are_rejected_while_paused() {
    let mut h = TestHarness::new();
    let conns = h.start_game(4);
    h.engine.handle(Inbound::ConnectionLost(conns[2]));

    // Seat 1 is the acting bidder but the table is paused.
    h.command(conns[1], Command::SubmitBid { bid: 2 });
    assert_eq!(h.session().players[1].bid, None);
    assert!(h
        .events
        .sent_to(conns[1])
        .iter()
        .any(|e| matches!(e, Event::Announce { message } if message.contains("paused"))));
}

#[test]
fn reconnect_by_stable_id_restores_the_seat_and_reissues_the_prompt() {
    let mut h = TestHarness::new();
    let conns = h.start_game(4);
    // The acting bidder drops.
    h.engine.handle(Inbound::ConnectionLost(conns[1]));
    let player_id = h.session().players[1].player_id;
    h.events.clear();

    let fresh = new_conn();
    h.command(
        fresh,
        Command::Join {
            name: "whatever".into(),
            player_id: Some(player_id),
        },
    );

    let session = h.session();
    assert!(!session.paused);
    assert_eq!(session.players[1].status, PlayerStatus::Active);
    assert_eq!(session.players[1].connection, Some(fresh));
    assert_eq!(session.bidding_seat, Some(1), "turn was not skipped");
    assert!(session.turn_deadline.is_some(), "turn timer re-armed");
    assert!(h
        .events
        .sent_to(fresh)
        .iter()
        .any(|e| matches!(e, Event::BidPrompt { max_bid: 13 })));
    assert!(h
        .events
        .sent_to(fresh)
        .iter()
        .any(|e| matches!(e, Event::JoinAccepted { .. })));
    // The grace-period removal is dead.
    assert!(!h
        .timers
        .pending()
        .iter()
        .any(|t| matches!(t.task.kind, TaskKind::GraceExpiry { .. })));
}

#[test]
fn reconnect_falls_back_to_case_insensitive_name_match() {
    let mut h = TestHarness::new();
    let conns = h.start_game(3);
    h.engine.handle(Inbound::ConnectionLost(conns[2]));

    let fresh = new_conn();
    h.command(
        fresh,
        Command::Join {
            name: "  P3 ".into(),
            player_id: None,
        },
    );

    let session = h.session();
    assert_eq!(session.players[2].status, PlayerStatus::Active);
    assert_eq!(session.players[2].connection, Some(fresh));
    assert!(!session.paused);
}

#[test]
fn unmatched_join_during_a_game_is_turned_away() {
    let mut h = TestHarness::new();
    let _conns = h.start_game(3);
    let fresh = new_conn();
    h.command(
        fresh,
        Command::Join {
            name: "stranger".into(),
            player_id: None,
        },
    );
    assert!(h
        .events
        .sent_to(fresh)
        .iter()
        .any(|e| matches!(e, Event::Announce { message } if message.contains("already in progress"))));
    assert_eq!(h.session().active_count(), 3);
}

#[test]
fn pause_holds_until_everyone_is_back() {
    let mut h = TestHarness::new();
    let conns = h.start_game(4);
    h.engine.handle(Inbound::ConnectionLost(conns[2]));
    h.engine.handle(Inbound::ConnectionLost(conns[3]));
    assert_eq!(h.session().paused_for.len(), 2);

    let fresh = new_conn();
    let pid = h.session().players[2].player_id;
    h.command(
        fresh,
        Command::Join {
            name: "p3".into(),
            player_id: Some(pid),
        },
    );

    let session = h.session();
    assert!(session.paused, "still waiting on p4");
    assert_eq!(session.paused_for, vec!["p4".to_string()]);
    assert_eq!(session.players[2].status, PlayerStatus::Active);
}

#[test]
fn grace_expiry_removes_the_seat_and_the_game_moves_on() {
    let mut h = TestHarness::new();
    let conns = h.start_game(4);
    // Acting bidder drops and never returns.
    h.engine.handle(Inbound::ConnectionLost(conns[1]));
    assert!(h.fire(|k| matches!(k, TaskKind::GraceExpiry { .. })));

    let session = h.session();
    assert_eq!(session.players[1].status, PlayerStatus::Removed);
    assert!(!session.paused);
    // Bidding passed to the next Active seat.
    assert_eq!(session.bidding_seat, Some(2));
    assert_eq!(session.phase, Phase::Bidding);
    assert!(h
        .events
        .log_lines()
        .iter()
        .any(|l| l.contains("p2 failed to reconnect and has been removed.")));
}

#[test]
fn removing_the_host_transfers_privilege_to_the_first_active_seat() {
    let mut h = TestHarness::new();
    let conns = h.start_game(4);
    h.engine.handle(Inbound::ConnectionLost(conns[0]));
    assert!(h.fire(|k| matches!(k, TaskKind::GraceExpiry { .. })));

    let session = h.session();
    assert!(!session.players[0].is_host);
    assert!(session.players[1].is_host);
    assert!(h
        .events
        .log_lines()
        .iter()
        .any(|l| l.contains("Host privileges transferred to p2.")));
}

#[test]
fn dropping_below_two_active_seats_tears_down_to_the_lobby() {
    let mut h = TestHarness::new();
    let conns = h.start_game(3);
    h.engine.handle(Inbound::ConnectionLost(conns[1]));
    h.engine.handle(Inbound::ConnectionLost(conns[2]));
    // First removal leaves a single Active seat, which folds the table.
    assert!(h.fire(|k| matches!(k, TaskKind::GraceExpiry { .. })));

    assert!(h.engine.session().is_none());
    let roster = h.engine.lobby().roster();
    assert_eq!(roster.len(), 2, "the removed seat does not come back");
    assert!(roster.iter().all(|p| p.name != "p3"));
    assert!(roster[0].is_host && roster[0].is_ready);
    assert_eq!(roster[0].name, "p1");
    assert!(!roster[1].is_ready);
    assert!(h.timers.pending().is_empty(), "teardown cancels everything");
}

#[test]
fn mark_afk_requires_host_and_a_timed_out_seat() {
    let mut h = TestHarness::new();
    let conns = h.start_game(4);

    // Not timed out yet.
    h.command(conns[0], Command::MarkAfk { seat: 1 });
    assert_eq!(h.session().players[1].status, PlayerStatus::Active);

    // Time the bidder out, then a non-host tries.
    assert!(h.fire(|k| matches!(k, TaskKind::TurnDeadline { .. })));
    assert!(h.session().players[1].inactive);
    h.command(conns[2], Command::MarkAfk { seat: 1 });
    assert_eq!(h.session().players[1].status, PlayerStatus::Active);

    // The host can.
    h.command(conns[0], Command::MarkAfk { seat: 1 });
    let session = h.session();
    assert_eq!(session.players[1].status, PlayerStatus::Disconnected);
    assert!(session.paused);
    assert!(h
        .events
        .sent_to(conns[1])
        .iter()
        .any(|e| matches!(e, Event::MarkedAfk)));
    assert!(h
        .timers
        .pending()
        .iter()
        .any(|t| matches!(t.task.kind, TaskKind::GraceExpiry { .. })));
}

#[test]
fn i_am_back_lifts_an_afk_mark_on_the_same_connection() {
    let mut h = TestHarness::new();
    let conns = h.start_game(4);
    assert!(h.fire(|k| matches!(k, TaskKind::TurnDeadline { .. })));
    h.command(conns[0], Command::MarkAfk { seat: 1 });
    assert!(h.session().paused);

    h.command(conns[1], Command::IAmBack);
    let session = h.session();
    assert_eq!(session.players[1].status, PlayerStatus::Active);
    assert!(!session.paused);
    assert_eq!(session.bidding_seat, Some(1), "turn was not skipped");
    assert!(!h
        .timers
        .pending()
        .iter()
        .any(|t| matches!(t.task.kind, TaskKind::GraceExpiry { .. })));
}

#[test]
fn stale_grace_timer_from_a_previous_session_is_ignored() {
    let mut h = TestHarness::new();
    let conns = h.start_game(4);
    h.engine.handle(Inbound::ConnectionLost(conns[2]));
    let stale = h
        .timers
        .take_latest(|k| matches!(k, TaskKind::GraceExpiry { .. }))
        .unwrap();

    // The host resets everything and a brand-new game begins: new epoch.
    h.command(conns[0], Command::HardReset);
    let conns2 = h.start_game(4);
    let before = h.session().active_count();

    h.engine.handle(Inbound::Timer(stale));
    assert_eq!(h.session().active_count(), before, "stale removal dropped");
    for p in &h.session().players {
        assert_eq!(p.status, PlayerStatus::Active);
    }
    drop(conns2);
}

#[test]
fn stale_timer_with_no_session_is_ignored() {
    let mut h = TestHarness::new();
    let conns = h.start_game(2);
    let epoch = h.session().epoch;
    h.command(conns[0], Command::EndGame);
    // Fires into the void; nothing to corrupt, nothing to panic.
    h.engine.handle(Inbound::Timer(TimerTask {
        epoch,
        kind: TaskKind::TrickAdvance,
    }));
    assert!(h.engine.session().is_none());
}

#[test]
fn lobby_disconnect_just_marks_the_roster() {
    let mut h = TestHarness::new();
    let conns = h.join_ready(3);
    h.engine.handle(Inbound::ConnectionLost(conns[1]));
    assert!(!h.engine.lobby().roster()[1].connected);
    assert_eq!(h.engine.lobby().ready_players().len(), 2);
}

#[test]
fn reconnect_during_trick_review_resumes_the_review_clock() {
    let mut h = TestHarness::new();
    let conns = h.start_game(4);
    {
        let session = h.engine.session_mut();
        session.phase = Phase::TrickReview;
        session.bidding_seat = None;
        session.last_completed_trick = Some(crate::engine::state::CompletedTrick {
            plays: Vec::new(),
            winner_seat: 2,
        });
    }
    h.engine.handle(Inbound::ConnectionLost(conns[3]));
    let pid = h.session().players[3].player_id;

    // The review advance that was armed earlier self-checks the pause.
    h.engine.handle(Inbound::Timer(TimerTask {
        epoch: h.session().epoch,
        kind: TaskKind::TrickAdvance,
    }));
    assert_eq!(h.session().phase, Phase::TrickReview);

    let fresh = new_conn();
    h.command(
        fresh,
        Command::Join {
            name: "p4".into(),
            player_id: Some(pid),
        },
    );
    assert!(!h.session().paused);
    assert!(h
        .timers
        .pending()
        .iter()
        .any(|t| matches!(t.task.kind, TaskKind::TrickAdvance)));

    assert!(h.fire(|k| matches!(k, TaskKind::TrickAdvance)));
    assert_eq!(h.session().phase, Phase::Playing);
    assert_eq!(h.session().acting_seat, Some(2), "review winner leads");
}
