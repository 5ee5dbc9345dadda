use crate::engine::events::Event;
use crate::engine::state::Phase;
use crate::engine::test_support::TestHarness;
use crate::engine::Command;

#[test]
fn bidding_starts_left_of_dealer_and_proceeds_in_seat_order() {
    let mut h = TestHarness::new();
    let conns = h.start_game(4);

    // Round 1: dealer is seat 0, so seat 1 opens the bidding.
    assert_eq!(h.session().phase, Phase::Bidding);
    assert_eq!(h.session().dealer_seat, 0);
    assert_eq!(h.session().bidding_seat, Some(1));
    assert!(h
        .events
        .sent_to(conns[1])
        .iter()
        .any(|e| matches!(e, Event::BidPrompt { max_bid: 13 })));

    h.command(conns[1], Command::SubmitBid { bid: 2 });
    assert_eq!(h.session().bidding_seat, Some(2));
    assert_eq!(h.session().players[1].bid, Some(2));
    assert!(h
        .events
        .sent_to(conns[2])
        .iter()
        .any(|e| matches!(e, Event::BidPrompt { max_bid: 13 })));
}

#[test]
fn completing_the_wrap_flips_to_playing_with_first_bidder_leading() {
    let mut h = TestHarness::new();
    let conns = h.start_game(4);

    h.command(conns[1], Command::SubmitBid { bid: 1 });
    h.command(conns[2], Command::SubmitBid { bid: 2 });
    h.command(conns[3], Command::SubmitBid { bid: 3 });
    // Dealer bids last; 1+2+3+0 != 13 so 0 is fine.
    h.command(conns[0], Command::SubmitBid { bid: 0 });

    let session = h.session();
    assert_eq!(session.phase, Phase::Playing);
    assert_eq!(session.bidding_seat, None);
    assert_eq!(session.acting_seat, Some(1));
    assert!(h
        .events
        .log_lines()
        .iter()
        .any(|l| l.contains("Bidding complete. p2 starts.")));
}

#[test]
fn out_of_range_bid_is_rejected_without_mutation() {
    let mut h = TestHarness::new();
    let conns = h.start_game(4);

    h.command(conns[1], Command::SubmitBid { bid: 14 });
    assert_eq!(h.session().players[1].bid, None);
    assert_eq!(h.session().bidding_seat, Some(1));
    assert!(h
        .events
        .sent_to(conns[1])
        .iter()
        .any(|e| matches!(e, Event::InvalidBid { .. })));

    h.command(conns[1], Command::SubmitBid { bid: -1 });
    assert_eq!(h.session().players[1].bid, None);
}

#[test]
fn out_of_turn_bid_is_rejected() {
    let mut h = TestHarness::new();
    let conns = h.start_game(4);

    h.command(conns[3], Command::SubmitBid { bid: 1 });
    assert_eq!(h.session().players[3].bid, None);
    assert_eq!(h.session().bidding_seat, Some(1));
    assert!(h
        .events
        .sent_to(conns[3])
        .iter()
        .any(|e| matches!(e, Event::Announce { .. })));
}

#[test]
fn hook_rule_blocks_the_last_bidder_from_evening_the_book() {
    let mut h = TestHarness::new();
    let conns = h.start_game(4);
    // Shrink the round for easy arithmetic: 5 cards, prior bids summing
    // to 3.
    h.engine.session_mut().cards_to_deal = 5;

    h.command(conns[1], Command::SubmitBid { bid: 1 });
    h.command(conns[2], Command::SubmitBid { bid: 2 });
    h.command(conns[3], Command::SubmitBid { bid: 0 });

    // Seat 0 closes the wrap: 3 + 2 == 5 must be refused.
    h.command(conns[0], Command::SubmitBid { bid: 2 });
    assert_eq!(h.session().phase, Phase::Bidding);
    assert_eq!(h.session().players[0].bid, None);
    let invalid = h
        .events
        .sent_to(conns[0])
        .iter()
        .any(|e| matches!(e, Event::InvalidBid { message } if message.contains("Total bid cannot be 5")));
    assert!(invalid);

    // 3 + 1 != 5 is allowed and completes the bidding.
    h.command(conns[0], Command::SubmitBid { bid: 1 });
    assert_eq!(h.session().phase, Phase::Playing);
}

#[test]
fn hook_rule_allows_overshooting_the_book() {
    let mut h = TestHarness::new();
    let conns = h.start_game(4);
    h.engine.session_mut().cards_to_deal = 5;

    h.command(conns[1], Command::SubmitBid { bid: 1 });
    h.command(conns[2], Command::SubmitBid { bid: 2 });
    h.command(conns[3], Command::SubmitBid { bid: 0 });
    h.command(conns[0], Command::SubmitBid { bid: 3 });
    assert_eq!(h.session().phase, Phase::Playing);
    assert_eq!(h.session().players[0].bid, Some(3));
}

#[test]
fn bid_from_an_unseated_connection_is_rejected() {
    let mut h = TestHarness::new();
    let _conns = h.start_game(3);
    let stranger = crate::lobby::ConnectionId(uuid::Uuid::new_v4());
    h.command(stranger, Command::SubmitBid { bid: 1 });
    assert!(h
        .events
        .sent_to(stranger)
        .iter()
        .any(|e| matches!(e, Event::Announce { .. })));
    assert_eq!(h.session().players.iter().filter(|p| p.bid.is_some()).count(), 0);
}
