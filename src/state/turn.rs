//! Turn rotation and targeting.
//!
//! Players are arranged in a ring in join order. Turns move clockwise around
//! the ring, skipping eliminated players, and every player targets the next
//! live player to their right. In a 2-player session this degenerates into
//! strict alternation with each player targeting the other.
//!
//! ```text
//!   3 players          B eliminated
//!
//!     A ──▶ B            A ─────┐
//!     ▲     │            ▲      ▼
//!     └─ C ◀┘            └───── C
//! ```

use super::player::{Player, UserId};

/// Index of a player in join order.
fn seat_of(players: &[Player], user_id: &str) -> Option<usize> {
    players.iter().position(|p| p.user_id == user_id)
}

/// First live player at or after `start`, walking the ring once.
fn live_from(players: &[Player], start: usize) -> Option<&Player> {
    let n = players.len();
    (0..n)
        .map(|offset| &players[(start + offset) % n])
        .find(|p| !p.is_eliminated())
}

/// Number of players still in the game.
pub fn remaining(players: &[Player]) -> usize {
    players.iter().filter(|p| !p.is_eliminated()).count()
}

/// The player who opens the game: the first live player in join order.
pub fn first_turn(players: &[Player]) -> Option<UserId> {
    live_from(players, 0).map(|p| p.user_id.clone())
}

/// Whose turn follows `current`.
///
/// Returns `None` only if nobody else is left to play.
pub fn next_turn(players: &[Player], current: &str) -> Option<UserId> {
    let seat = seat_of(players, current)?;
    live_from(players, seat + 1)
        .filter(|p| p.user_id != current)
        .map(|p| p.user_id.clone())
}

/// Point every player at the next player to their right.
pub fn assign_targets(players: &mut [Player]) {
    let n = players.len();
    let targets: Vec<Option<UserId>> = (0..n)
        .map(|i| {
            live_from(players, i + 1)
                .filter(|t| t.user_id != players[i].user_id)
                .map(|t| t.user_id.clone())
        })
        .collect();
    for (player, target) in players.iter_mut().zip(targets) {
        player.target_id = target;
    }
}

/// Remove `victim` from the ring.
///
/// Whoever was targeting the victim inherits the victim's own target, so the
/// remaining players still form a single cycle. Returns the ids that were
/// retargeted.
pub fn eliminate(players: &mut [Player], victim: &str, order: u8) -> Vec<UserId> {
    let Some(seat) = seat_of(players, victim) else {
        return Vec::new();
    };
    players[seat].eliminate(order);
    let inherited = players[seat].target_id.clone();

    let mut retargeted = Vec::new();
    for player in players.iter_mut() {
        if player.is_eliminated() || player.target_id.as_deref() != Some(victim) {
            continue;
        }
        player.target_id = inherited
            .clone()
            .filter(|target| *target != player.user_id);
        retargeted.push(player.user_id.clone());
    }
    retargeted
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ring(ids: &[&str]) -> Vec<Player> {
        let mut players: Vec<Player> = ids.iter().map(|id| Player::new(id.to_string())).collect();
        assign_targets(&mut players);
        players
    }

    fn targets(players: &[Player]) -> Vec<Option<&str>> {
        players.iter().map(|p| p.target_id.as_deref()).collect()
    }

    #[test]
    fn test_two_player_alternation() {
        let players = ring(&["a", "b"]);

        assert_eq!(first_turn(&players).as_deref(), Some("a"));
        assert_eq!(next_turn(&players, "a").as_deref(), Some("b"));
        assert_eq!(next_turn(&players, "b").as_deref(), Some("a"));
        assert_eq!(targets(&players), vec![Some("b"), Some("a")]);
    }

    #[test]
    fn test_three_player_rotation() {
        let players = ring(&["a", "b", "c"]);

        assert_eq!(next_turn(&players, "a").as_deref(), Some("b"));
        assert_eq!(next_turn(&players, "b").as_deref(), Some("c"));
        assert_eq!(next_turn(&players, "c").as_deref(), Some("a"));
        assert_eq!(targets(&players), vec![Some("b"), Some("c"), Some("a")]);
    }

    #[test]
    fn test_elimination_retargets_and_skips() {
        let mut players = ring(&["a", "b", "c"]);

        let retargeted = eliminate(&mut players, "b", 0);
        assert_eq!(retargeted, vec!["a".to_string()]);
        assert_eq!(remaining(&players), 2);

        // a inherits b's target; b keeps its stale target but no longer plays
        assert_eq!(players[0].target_id.as_deref(), Some("c"));
        assert_eq!(players[2].target_id.as_deref(), Some("a"));
        assert_eq!(next_turn(&players, "a").as_deref(), Some("c"));
        assert_eq!(next_turn(&players, "c").as_deref(), Some("a"));
    }

    #[test]
    fn test_last_player_has_no_next_turn() {
        let mut players = ring(&["a", "b", "c"]);
        eliminate(&mut players, "b", 0);
        eliminate(&mut players, "c", 1);

        assert_eq!(remaining(&players), 1);
        assert_eq!(next_turn(&players, "a"), None);
        assert_eq!(players[0].target_id, None);
    }

    #[test]
    fn test_first_turn_skips_eliminated() {
        let mut players = ring(&["a", "b", "c"]);
        eliminate(&mut players, "a", 0);
        assert_eq!(first_turn(&players).as_deref(), Some("b"));
    }

    #[test]
    fn test_unknown_player() {
        let mut players = ring(&["a", "b"]);
        assert_eq!(next_turn(&players, "zed"), None);
        assert!(eliminate(&mut players, "zed", 0).is_empty());
    }
}
