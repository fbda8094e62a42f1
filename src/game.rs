// SPDX-License-Identifier: MPL-2.0

//! # SunCatch Minigame
//!
//! A 3×3 grid where one card is turned face up at a time. Catching a sun
//! scores, catching a cloud costs. Reach 100 points before the 30 second
//! clock runs out.
//!
//! This module is the rules only. The caller owns the clocks: call
//! [`SunCatchGame::tick`] once a second and [`SunCatchGame::reveal_next`]
//! every [`REVEAL_INTERVAL_MS`] while [`SunCatchGame::is_playing`].

use rand::Rng;

/// Number of cards on the board.
pub const GRID_SIZE: usize = 9;
/// Round length in seconds.
pub const ROUND_SECONDS: u32 = 30;
/// Score that wins the round.
pub const WIN_SCORE: u32 = 100;
pub const SUN_POINTS: u32 = 10;
pub const CLOUD_PENALTY: u32 = 5;
/// Chance that a revealed card is a sun.
pub const SUN_PROBABILITY: f64 = 0.7;
/// Milliseconds a card stays face up.
pub const REVEAL_INTERVAL_MS: u64 = 600;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CardKind {
    Sun,
    Cloud,
}

/// The card currently face up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RevealedCard {
    pub index: usize,
    pub kind: CardKind,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GameStatus {
    Idle,
    Playing,
    /// Reached the winning score
    Won,
    /// Clock ran out first
    TimeUp,
}

/// Result of clicking a cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClickResult {
    /// Not the face-up card, or no round running
    Ignored,
    CaughtSun,
    CaughtCloud,
}

#[derive(Debug, Clone)]
pub struct SunCatchGame {
    score: u32,
    time_left: u32,
    status: GameStatus,
    current: Option<RevealedCard>,
}

impl Default for SunCatchGame {
    fn default() -> Self {
        Self::new()
    }
}

impl SunCatchGame {
    pub fn new() -> Self {
        Self {
            score: 0,
            time_left: ROUND_SECONDS,
            status: GameStatus::Idle,
            current: None,
        }
    }

    pub fn score(&self) -> u32 {
        self.score
    }

    pub fn time_left(&self) -> u32 {
        self.time_left
    }

    pub fn status(&self) -> GameStatus {
        self.status
    }

    pub fn current_card(&self) -> Option<RevealedCard> {
        self.current
    }

    pub fn is_playing(&self) -> bool {
        self.status == GameStatus::Playing
    }

    /// Start a round. Pressing start during a round resets instead.
    pub fn start(&mut self) {
        if self.is_playing() {
            self.reset();
            return;
        }
        *self = Self {
            status: GameStatus::Playing,
            ..Self::new()
        };
        log::debug!("SunCatch round started");
    }

    pub fn reset(&mut self) {
        *self = Self::new();
    }

    /// Advance the clock by one second.
    pub fn tick(&mut self) {
        if !self.is_playing() {
            return;
        }
        self.time_left = self.time_left.saturating_sub(1);
        if self.time_left == 0 {
            self.end(GameStatus::TimeUp);
        }
    }

    /// Hide the current card and turn up a random one.
    pub fn reveal_next<R: Rng + ?Sized>(&mut self, rng: &mut R) -> Option<RevealedCard> {
        if !self.is_playing() {
            return None;
        }
        let index = rng.gen_range(0..GRID_SIZE);
        let kind = if rng.gen_bool(SUN_PROBABILITY) {
            CardKind::Sun
        } else {
            CardKind::Cloud
        };
        self.current = Some(RevealedCard { index, kind });
        self.current
    }

    /// Click cell `index`. Only the face-up card counts, and only once.
    pub fn click(&mut self, index: usize) -> ClickResult {
        if !self.is_playing() {
            return ClickResult::Ignored;
        }
        let Some(card) = self.current.filter(|c| c.index == index) else {
            return ClickResult::Ignored;
        };
        self.current = None;

        match card.kind {
            CardKind::Sun => {
                self.score += SUN_POINTS;
                if self.score >= WIN_SCORE {
                    self.end(GameStatus::Won);
                }
                ClickResult::CaughtSun
            }
            CardKind::Cloud => {
                self.score = self.score.saturating_sub(CLOUD_PENALTY);
                ClickResult::CaughtCloud
            }
        }
    }

    fn end(&mut self, status: GameStatus) {
        self.status = status;
        self.current = None;
        log::debug!("SunCatch round over: {:?} with {} points", status, self.score);
    }

    /// Seconds played in the current or last round.
    pub fn elapsed(&self) -> u32 {
        ROUND_SECONDS - self.time_left
    }

    /// Score as a fraction of the winning score, capped at 1.
    pub fn progress(&self) -> f64 {
        (f64::from(self.score) / f64::from(WIN_SCORE)).min(1.0)
    }
}

/// Format seconds as `mm:ss`.
pub fn format_clock(seconds: u32) -> String {
    format!("{:02}:{:02}", seconds / 60, seconds % 60)
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    fn playing_with(card: RevealedCard) -> SunCatchGame {
        let mut game = SunCatchGame::new();
        game.start();
        game.current = Some(card);
        game
    }

    #[test]
    fn test_new_game_is_idle() {
        let game = SunCatchGame::new();
        assert_eq!(game.status(), GameStatus::Idle);
        assert_eq!(game.time_left(), ROUND_SECONDS);
        assert_eq!(format_clock(game.time_left()), "00:30");
    }

    #[test]
    fn test_sun_scores_and_is_consumed() {
        let mut game = playing_with(RevealedCard { index: 4, kind: CardKind::Sun });

        assert_eq!(game.click(4), ClickResult::CaughtSun);
        assert_eq!(game.score(), 10);
        assert_eq!(game.click(4), ClickResult::Ignored);
        assert_eq!(game.score(), 10);
    }

    #[test]
    fn test_cloud_penalty_floors_at_zero() {
        let mut game = playing_with(RevealedCard { index: 0, kind: CardKind::Cloud });
        assert_eq!(game.click(0), ClickResult::CaughtCloud);
        assert_eq!(game.score(), 0);
    }

    #[test]
    fn test_wrong_cell_is_ignored() {
        let mut game = playing_with(RevealedCard { index: 2, kind: CardKind::Sun });
        assert_eq!(game.click(3), ClickResult::Ignored);
        assert!(game.current_card().is_some());
    }

    #[test]
    fn test_reaching_win_score_ends_round() {
        let mut game = SunCatchGame::new();
        game.start();
        for _ in 0..10 {
            game.current = Some(RevealedCard { index: 1, kind: CardKind::Sun });
            game.click(1);
        }
        assert_eq!(game.status(), GameStatus::Won);
        assert_eq!(game.progress(), 1.0);
        assert_eq!(game.click(1), ClickResult::Ignored);
    }

    #[test]
    fn test_clock_runs_out() {
        let mut game = SunCatchGame::new();
        game.start();
        for _ in 0..ROUND_SECONDS {
            game.tick();
        }
        assert_eq!(game.status(), GameStatus::TimeUp);
        assert_eq!(game.elapsed(), ROUND_SECONDS);
        assert_eq!(format_clock(game.elapsed()), "00:30");

        game.tick();
        assert_eq!(game.time_left(), 0);
    }

    #[test]
    fn test_start_while_playing_resets() {
        let mut game = playing_with(RevealedCard { index: 1, kind: CardKind::Sun });
        game.click(1);
        game.start();
        assert_eq!(game.status(), GameStatus::Idle);
        assert_eq!(game.score(), 0);
    }

    #[test]
    fn test_reveal_only_while_playing() {
        let mut rng = StdRng::seed_from_u64(1);
        let mut game = SunCatchGame::new();
        assert!(game.reveal_next(&mut rng).is_none());

        game.start();
        let mut suns = 0;
        for _ in 0..1000 {
            let card = game.reveal_next(&mut rng).unwrap();
            assert!(card.index < GRID_SIZE);
            if card.kind == CardKind::Sun {
                suns += 1;
            }
        }
        assert!((600..800).contains(&suns), "sun ratio off: {suns}");
    }
}
