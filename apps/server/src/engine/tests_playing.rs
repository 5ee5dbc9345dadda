use crate::domain::{try_parse_cards, Card, Trump};
use crate::engine::events::Event;
use crate::engine::state::Phase;
use crate::engine::test_support::TestHarness;
use crate::engine::timers::TaskKind;
use crate::engine::Command;
use crate::lobby::ConnectionId;

fn card(token: &str) -> Card {
    token.parse().unwrap()
}

/// Put a started 4-player game directly into the Playing phase with fixed
/// hands, bids of 1 each, and seat 0 to act.
fn rig_playing(h: &mut TestHarness, hands: &[&[&str]], trump: Trump) {
    let session = h.engine.session_mut();
    session.phase = Phase::Playing;
    session.trump = trump;
    session.cards_to_deal = hands[0].len() as u8;
    session.bidding_seat = None;
    session.acting_seat = Some(0);
    session.lead_suit = None;
    session.current_trick.clear();
    session.current_winning_seat = None;
    for (seat, tokens) in hands.iter().enumerate() {
        session.players[seat].hand = try_parse_cards(tokens.iter().copied()).unwrap();
        session.players[seat].bid = Some(1);
        session.players[seat].tricks_won = 0;
    }
    h.events.clear();
}

fn playing_harness(hands: &[&[&str]], trump: Trump) -> (TestHarness, Vec<ConnectionId>) {
    let mut h = TestHarness::new();
    let conns = h.start_game(hands.len());
    rig_playing(&mut h, hands, trump);
    (h, conns)
}

#[test]
fn suit_follow_violation_is_rejected_without_mutation() {
    let (mut h, conns) = playing_harness(
        &[&["5H", "2C"], &["KH", "3C"], &["2S", "4C"], &["9C", "9D"]],
        Trump::Spades,
    );

    h.command(conns[0], Command::PlayCard { card: card("5H") });
    // Seat 1 holds a heart and must follow the heart lead.
    h.command(conns[1], Command::PlayCard { card: card("3C") });

    let session = h.session();
    assert_eq!(session.current_trick.len(), 1);
    assert_eq!(session.players[1].hand.len(), 2);
    assert!(h
        .events
        .sent_to(conns[1])
        .iter()
        .any(|e| matches!(e, Event::Announce { message } if message.contains("must play a Hearts"))));
}

#[test]
fn playing_a_card_you_do_not_hold_is_rejected() {
    let (mut h, conns) = playing_harness(
        &[&["5H", "2C"], &["KH", "3C"], &["2S", "4C"], &["9C", "9D"]],
        Trump::Spades,
    );
    h.command(conns[0], Command::PlayCard { card: card("AS") });
    assert!(h.session().current_trick.is_empty());
    assert_eq!(h.session().players[0].hand.len(), 2);
}

#[test]
fn out_of_turn_play_is_rejected() {
    let (mut h, conns) = playing_harness(
        &[&["5H", "2C"], &["KH", "3C"], &["2S", "4C"], &["9C", "9D"]],
        Trump::Spades,
    );
    h.command(conns[2], Command::PlayCard { card: card("2S") });
    assert!(h.session().current_trick.is_empty());
}

#[test]
fn the_running_winner_is_reevaluated_after_every_play() {
    let (mut h, conns) = playing_harness(
        &[&["5H", "2C"], &["KH", "3C"], &["2S", "4C"], &["9C", "9D"]],
        Trump::Spades,
    );

    h.command(conns[0], Command::PlayCard { card: card("5H") });
    assert_eq!(h.session().current_winning_seat, Some(0));
    assert_eq!(h.session().lead_suit, Some(crate::domain::Suit::Hearts));

    h.command(conns[1], Command::PlayCard { card: card("KH") });
    assert_eq!(h.session().current_winning_seat, Some(1));

    // The lone trump takes over and holds against an off-suit card.
    h.command(conns[2], Command::PlayCard { card: card("2S") });
    assert_eq!(h.session().current_winning_seat, Some(2));
}

#[test]
fn trick_resolves_at_active_count_and_review_leads_into_the_next_trick() {
    let (mut h, conns) = playing_harness(
        &[&["5H", "2C"], &["KH", "3C"], &["2S", "4C"], &["9C", "9D"]],
        Trump::Spades,
    );

    h.command(conns[0], Command::PlayCard { card: card("5H") });
    h.command(conns[1], Command::PlayCard { card: card("KH") });
    h.command(conns[2], Command::PlayCard { card: card("2S") });
    h.command(conns[3], Command::PlayCard { card: card("9C") });

    let session = h.session();
    assert_eq!(session.phase, Phase::TrickReview);
    assert_eq!(session.players[2].tricks_won, 1);
    let last = session.last_completed_trick.as_ref().unwrap();
    assert_eq!(last.winner_seat, 2);
    assert_eq!(last.plays.len(), 4);
    assert!(session.review_deadline.is_some());
    assert!(h
        .events
        .broadcasts()
        .iter()
        .any(|e| matches!(e, Event::TrickWon { winner_name } if winner_name == "p3")));

    assert!(h.fire(|k| matches!(k, TaskKind::TrickAdvance)));
    let session = h.session();
    assert_eq!(session.phase, Phase::Playing);
    assert_eq!(session.acting_seat, Some(2), "trick winner leads");
    assert!(session.current_trick.is_empty());
    assert_eq!(session.lead_suit, None);
    assert!(session.review_deadline.is_none());
}

#[test]
fn final_trick_schedules_round_end_instead_of_review() {
    let (mut h, conns) = playing_harness(
        &[&["5H"], &["KH"], &["2S"], &["9C"]],
        Trump::Spades,
    );

    h.command(conns[0], Command::PlayCard { card: card("5H") });
    h.command(conns[1], Command::PlayCard { card: card("KH") });
    h.command(conns[2], Command::PlayCard { card: card("2S") });
    h.command(conns[3], Command::PlayCard { card: card("9C") });

    let session = h.session();
    assert_eq!(session.phase, Phase::Playing, "stays in Playing until scored");
    assert!(session.round_end_pending());
    assert!(h
        .timers
        .pending()
        .iter()
        .any(|t| matches!(t.task.kind, TaskKind::RoundEnd)));
    assert!(!h
        .timers
        .pending()
        .iter()
        .any(|t| matches!(t.task.kind, TaskKind::TrickAdvance)));
}

#[test]
fn trick_review_advance_is_a_noop_outside_review() {
    let (mut h, conns) = playing_harness(
        &[&["5H", "2C"], &["KH", "3C"], &["2S", "4C"], &["9C", "9D"]],
        Trump::Spades,
    );
    h.command(conns[0], Command::PlayCard { card: card("5H") });

    // Forge a review-advance for the live epoch while still mid-trick.
    let epoch = h.session().epoch;
    h.engine.handle(crate::engine::Inbound::Timer(
        crate::engine::timers::TimerTask {
            epoch,
            kind: TaskKind::TrickAdvance,
        },
    ));
    assert_eq!(h.session().phase, Phase::Playing);
    assert_eq!(h.session().current_trick.len(), 1);
}

#[test]
fn rearrange_hand_accepts_permutations_only() {
    let (mut h, conns) = playing_harness(
        &[&["5H", "2C", "AD"], &["KH", "3C", "KD"], &["2S", "4C", "QD"], &["9C", "9D", "JD"]],
        Trump::Spades,
    );

    let reordered = try_parse_cards(["AD", "5H", "2C"]).unwrap();
    h.command(conns[0], Command::RearrangeHand { hand: reordered.clone() });
    assert_eq!(h.session().players[0].hand, reordered);

    // Dropping a card (length mismatch) is rejected as a no-op.
    let short = try_parse_cards(["AD", "5H"]).unwrap();
    h.command(conns[0], Command::RearrangeHand { hand: short });
    assert_eq!(h.session().players[0].hand, reordered);

    // Same length but different cards is rejected too.
    let swapped = try_parse_cards(["AD", "5H", "AS"]).unwrap();
    h.command(conns[0], Command::RearrangeHand { hand: swapped });
    assert_eq!(h.session().players[0].hand, reordered);
}
