//! The per-game session state machine.
//!
//! A `GameSession` is created when the user picks a hazard category and
//! destroyed when they leave for the menu. It owns all ephemeral game state
//! (score, question counter, answer history, bonus XP); persistent
//! progression lives in `progress::PlayerProfile` and is only touched at
//! game end by the orchestration layer.
//!
//! All methods are synchronous; content fetching happens outside and the
//! results are handed in (`begin`, `advance`).

use serde::Serialize;
use tracing::debug;

use crate::domain::{AnsweredQuestion, HazardCategory, Question, Scenario, TimerSetting};
use crate::error::GameError;

/// Score swing per answer, clamped into [0, 100] afterwards.
const CORRECT_DELTA: i32 = 5;
const INCORRECT_DELTA: i32 = -20;
/// Bonus XP for a fast correct answer (more than half the timer left).
const SPEED_BONUS_XP: u32 = 15;
/// Base XP per correct answer, granted at game end.
const BASE_XP_PER_CORRECT: u32 = 20;
/// Seconds that must remain on the clock for a quick-thinker unlock.
const QUICK_THINKER_SECS: u16 = 10;

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GamePhase {
    Loading,
    Game,
    GameOver,
    Error,
}

impl GamePhase {
    pub fn name(self) -> &'static str {
        match self {
            GamePhase::Loading => "loading",
            GamePhase::Game => "game",
            GamePhase::GameOver => "game_over",
            GamePhase::Error => "error",
        }
    }
}

/// Result of one answer submission.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AnswerOutcome {
    pub correct: bool,
    pub correct_choice_index: usize,
    pub feedback: String,
    pub safety_score: i32,
    pub streak: u32,
    pub speed_bonus_xp: u32,
    /// Correct with an active timer and comfortably ahead of the clock.
    pub quick_thinker: bool,
}

/// Result of ending the game. XP is computed here; applying it to the
/// ledger is the caller's job.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GameOutcome {
    pub safety_score: i32,
    pub correct_count: u32,
    pub base_xp: u32,
    pub bonus_xp: u32,
    pub total_xp: u32,
    pub perfect: bool,
    pub passed: bool,
    pub grade: &'static str,
}

#[derive(Clone, Debug)]
pub struct GameSession {
    pub id: String,
    pub category: HazardCategory,
    pub timer: TimerSetting,
    pub phase: GamePhase,
    pub scenario: Option<Scenario>,
    pub safety_score: i32,
    pub question_count: u32,
    pub history: Vec<AnsweredQuestion>,
    pub bonus_xp: u32,
    pub streak: u32,
    pub best_streak: u32,
    pub answered: bool,
    pub last_choice: Option<usize>,
    pub time_remaining: Option<u16>,
    pub error: Option<String>,
}

impl GameSession {
    pub fn new(id: String, category: HazardCategory, timer: TimerSetting) -> Self {
        Self {
            id,
            category,
            timer,
            phase: GamePhase::Loading,
            scenario: None,
            safety_score: 100,
            question_count: 1,
            history: Vec::new(),
            bonus_xp: 0,
            streak: 0,
            best_streak: 0,
            answered: false,
            last_choice: None,
            time_remaining: timer.duration(),
            error: None,
        }
    }

    /// First scenario arrived; enter the answer/feedback loop.
    pub fn begin(&mut self, scenario: Scenario) -> Result<(), GameError> {
        if self.phase != GamePhase::Loading {
            return Err(GameError::WrongPhase(self.phase.name()));
        }
        self.scenario = Some(scenario);
        self.phase = GamePhase::Game;
        Ok(())
    }

    /// A content fetch failed mid-session. Ephemeral state is kept until the
    /// user leaves, so the error screen can offer a way back to the menu.
    pub fn fail(&mut self, message: impl Into<String>) {
        self.error = Some(message.into());
        self.phase = GamePhase::Error;
    }

    fn current_question(&self) -> Result<&Question, GameError> {
        self.scenario
            .as_ref()
            .map(|s| &s.question)
            .ok_or(GameError::WrongPhase(GamePhase::Loading.name()))
    }

    /// Submit the first answer to the current question. Later submissions
    /// for the same question are rejected. `reported_remaining` is the
    /// client's view of the countdown; it is clamped to the configured
    /// duration before any bonus is computed.
    pub fn submit_answer(
        &mut self,
        choice_index: usize,
        reported_remaining: Option<u16>,
    ) -> Result<AnswerOutcome, GameError> {
        if self.phase != GamePhase::Game {
            return Err(GameError::WrongPhase(self.phase.name()));
        }
        if self.answered {
            return Err(GameError::AlreadyAnswered);
        }

        let (correct, correct_index, record, feedback) = {
            let q = self.current_question()?;
            if choice_index >= q.choices.len() {
                return Err(GameError::InvalidChoice(choice_index));
            }
            let correct = choice_index == q.correct_choice_index;
            let record = AnsweredQuestion {
                question: q.question.clone(),
                user_choice: q.choices[choice_index].clone(),
                correct_choice: q.choices[q.correct_choice_index].clone(),
                is_correct: correct,
            };
            (correct, q.correct_choice_index, record, q.feedback[choice_index].clone())
        };

        self.safety_score =
            (self.safety_score + if correct { CORRECT_DELTA } else { INCORRECT_DELTA }).clamp(0, 100);

        let remaining = match self.timer.duration() {
            Some(d) => reported_remaining.map(|t| t.min(d)),
            None => None,
        };
        self.time_remaining = remaining;

        let mut speed_bonus_xp = 0;
        let mut quick_thinker = false;
        if correct {
            if let (Some(d), Some(t)) = (self.timer.duration(), remaining) {
                if u32::from(t) * 2 > u32::from(d) {
                    speed_bonus_xp = SPEED_BONUS_XP;
                    self.bonus_xp += SPEED_BONUS_XP;
                }
                quick_thinker = t > QUICK_THINKER_SECS;
            }
            self.streak += 1;
            self.best_streak = self.best_streak.max(self.streak);
        } else {
            self.streak = 0;
        }

        self.history.push(record);
        self.answered = true;
        self.last_choice = Some(choice_index);

        debug!(target: "session", id = %self.id, question = self.question_count, correct, score = self.safety_score, streak = self.streak, "Answer recorded");

        Ok(AnswerOutcome {
            correct,
            correct_choice_index: correct_index,
            feedback,
            safety_score: self.safety_score,
            streak: self.streak,
            speed_bonus_xp,
            quick_thinker,
        })
    }

    /// Deterministic forced choice when the countdown hits zero: the first
    /// index that is not the correct one, or 0 if every choice is correct.
    pub fn timeout_choice(&self) -> Result<usize, GameError> {
        if self.phase != GamePhase::Game {
            return Err(GameError::WrongPhase(self.phase.name()));
        }
        if self.answered {
            return Err(GameError::AlreadyAnswered);
        }
        if self.timer.duration().is_none() {
            return Err(GameError::NoTimer);
        }
        let q = self.current_question()?;
        Ok((0..q.choices.len())
            .find(|&i| i != q.correct_choice_index)
            .unwrap_or(0))
    }

    /// Natural-language context for the next-question request, built from
    /// the answer just given.
    pub fn next_context(&self) -> Result<String, GameError> {
        if self.phase != GamePhase::Game {
            return Err(GameError::WrongPhase(self.phase.name()));
        }
        let (q, choice) = match (self.scenario.as_ref(), self.last_choice) {
            (Some(s), Some(c)) if self.answered => (&s.question, c),
            _ => return Err(GameError::NotAnswered),
        };
        let verdict = if choice == q.correct_choice_index {
            "That was the correct choice"
        } else {
            "That was the wrong choice"
        };
        Ok(format!(
            "The previous question was: \"{}\". My choice was: \"{}\". {}. The feedback given was: \"{}\".",
            q.question, q.choices[choice], verdict, q.feedback[choice]
        ))
    }

    /// Swap in the next question. The scenario image is kept for the whole
    /// session; only the question payload changes.
    pub fn advance(&mut self, question: Question) -> Result<(), GameError> {
        if self.phase != GamePhase::Game {
            return Err(GameError::WrongPhase(self.phase.name()));
        }
        if !self.answered {
            return Err(GameError::NotAnswered);
        }
        match self.scenario.as_mut() {
            Some(s) => s.question = question,
            None => return Err(GameError::WrongPhase(GamePhase::Loading.name())),
        }
        self.question_count += 1;
        self.answered = false;
        self.last_choice = None;
        self.time_remaining = self.timer.duration();
        Ok(())
    }

    /// End the game and compute the XP award.
    pub fn finish(&mut self) -> Result<GameOutcome, GameError> {
        if self.phase != GamePhase::Game {
            return Err(GameError::WrongPhase(self.phase.name()));
        }
        self.phase = GamePhase::GameOver;

        let correct_count = self.history.iter().filter(|h| h.is_correct).count() as u32;
        let base_xp = BASE_XP_PER_CORRECT * correct_count;
        let total_xp = base_xp + self.bonus_xp;

        debug!(target: "session", id = %self.id, score = self.safety_score, correct_count, base_xp, bonus_xp = self.bonus_xp, "Game finished");

        Ok(GameOutcome {
            safety_score: self.safety_score,
            correct_count,
            base_xp,
            bonus_xp: self.bonus_xp,
            total_xp,
            perfect: self.safety_score == 100,
            passed: self.safety_score > 60,
            grade: grade(self.safety_score),
        })
    }
}

/// Letter grade shown on the game-over screen.
pub fn grade(score: i32) -> &'static str {
    match score {
        s if s >= 90 => "A+",
        s if s >= 80 => "A",
        s if s >= 70 => "B",
        s if s >= 60 => "C",
        _ => "D",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(correct: usize) -> Question {
        Question {
            question: "Floodwater is rising on your street. What do you do?".into(),
            choices: vec![
                "Move valuables and people upstairs".into(),
                "Drive through the water".into(),
                "Wait and see".into(),
            ],
            correct_choice_index: correct,
            feedback: vec![
                "Higher ground keeps you out of the current.".into(),
                "Most flood deaths happen in vehicles.".into(),
                "Water can rise faster than you can react.".into(),
            ],
        }
    }

    fn session(timer: TimerSetting) -> GameSession {
        let mut s = GameSession::new("s1".into(), HazardCategory::FloodResponse, timer);
        s.begin(Scenario { image_url: "img".into(), question: question(0) })
            .unwrap();
        s
    }

    fn answer_and_advance(s: &mut GameSession, choice: usize, next_correct: usize) {
        s.submit_answer(choice, None).unwrap();
        s.advance(question(next_correct)).unwrap();
    }

    #[test]
    fn score_is_clamped_low_after_many_wrong_answers() {
        let mut s = session(TimerSetting::Off);
        for _ in 0..21 {
            s.submit_answer(1, None).unwrap();
            s.advance(question(0)).unwrap();
        }
        assert_eq!(s.safety_score, 0);
    }

    #[test]
    fn score_is_clamped_high() {
        let mut s = session(TimerSetting::Off);
        answer_and_advance(&mut s, 0, 0);
        assert_eq!(s.safety_score, 100);
    }

    #[test]
    fn untimed_three_question_game_scores_ninety_and_forty_xp() {
        // One wrong answer then two correct: 100→80→85→90, base XP 40, no bonus.
        let mut s = session(TimerSetting::Off);
        answer_and_advance(&mut s, 1, 0);
        assert_eq!(s.safety_score, 80);
        answer_and_advance(&mut s, 0, 0);
        assert_eq!(s.safety_score, 85);
        s.submit_answer(0, None).unwrap();
        assert_eq!(s.safety_score, 90);

        let out = s.finish().unwrap();
        assert_eq!(out.safety_score, 90);
        assert_eq!(out.correct_count, 2);
        assert_eq!(out.base_xp, 40);
        assert_eq!(out.bonus_xp, 0);
        assert_eq!(out.total_xp, 40);
        assert_eq!(out.grade, "A+");
        assert!(out.passed);
        assert!(!out.perfect);
    }

    #[test]
    fn only_the_first_answer_counts() {
        let mut s = session(TimerSetting::Off);
        s.submit_answer(1, None).unwrap();
        assert_eq!(s.submit_answer(0, None), Err(GameError::AlreadyAnswered));
        assert_eq!(s.history.len(), 1);
        assert_eq!(s.safety_score, 80);
    }

    #[test]
    fn answer_requires_valid_choice_index() {
        let mut s = session(TimerSetting::Off);
        assert_eq!(s.submit_answer(3, None), Err(GameError::InvalidChoice(3)));
        assert!(s.history.is_empty());
    }

    #[test]
    fn advance_requires_an_answer_first() {
        let mut s = session(TimerSetting::Off);
        assert_eq!(s.advance(question(0)), Err(GameError::NotAnswered));
    }

    #[test]
    fn advance_resets_per_question_state() {
        let mut s = session(TimerSetting::Seconds15);
        s.submit_answer(0, Some(3)).unwrap();
        s.advance(question(2)).unwrap();
        assert_eq!(s.question_count, 2);
        assert!(!s.answered);
        assert_eq!(s.last_choice, None);
        assert_eq!(s.time_remaining, Some(15));
    }

    #[test]
    fn timeout_picks_first_non_correct_choice() {
        let mut s = session(TimerSetting::Seconds15);
        s.scenario.as_mut().unwrap().question = question(1);
        assert_eq!(s.timeout_choice().unwrap(), 0);
        s.scenario.as_mut().unwrap().question = question(0);
        assert_eq!(s.timeout_choice().unwrap(), 1);
    }

    #[test]
    fn timeout_requires_a_timer() {
        let s = session(TimerSetting::Off);
        assert_eq!(s.timeout_choice(), Err(GameError::NoTimer));
    }

    #[test]
    fn speed_bonus_needs_more_than_half_the_clock() {
        // 15s timer: 8 remaining earns the bonus, 7 does not.
        let mut s = session(TimerSetting::Seconds15);
        let out = s.submit_answer(0, Some(8)).unwrap();
        assert_eq!(out.speed_bonus_xp, 15);
        assert_eq!(s.bonus_xp, 15);

        s.advance(question(0)).unwrap();
        let out = s.submit_answer(0, Some(7)).unwrap();
        assert_eq!(out.speed_bonus_xp, 0);
        assert_eq!(s.bonus_xp, 15);
    }

    #[test]
    fn speed_bonus_never_applies_without_a_timer() {
        let mut s = session(TimerSetting::Off);
        let out = s.submit_answer(0, Some(14)).unwrap();
        assert_eq!(out.speed_bonus_xp, 0);
        assert!(!out.quick_thinker);
    }

    #[test]
    fn reported_time_is_clamped_to_the_duration() {
        let mut s = session(TimerSetting::Seconds15);
        s.submit_answer(0, Some(600)).unwrap();
        assert_eq!(s.time_remaining, Some(15));
    }

    #[test]
    fn quick_thinker_flag_needs_over_ten_seconds() {
        let mut s = session(TimerSetting::Seconds20);
        let out = s.submit_answer(0, Some(11)).unwrap();
        assert!(out.quick_thinker);

        let mut s = session(TimerSetting::Seconds20);
        let out = s.submit_answer(0, Some(10)).unwrap();
        assert!(!out.quick_thinker);
    }

    #[test]
    fn streak_rises_and_resets() {
        let mut s = session(TimerSetting::Off);
        answer_and_advance(&mut s, 0, 0);
        answer_and_advance(&mut s, 0, 0);
        assert_eq!(s.streak, 2);
        answer_and_advance(&mut s, 1, 0);
        assert_eq!(s.streak, 0);
        assert_eq!(s.best_streak, 2);
    }

    #[test]
    fn perfect_game_is_flagged() {
        let mut s = session(TimerSetting::Off);
        s.submit_answer(0, None).unwrap();
        let out = s.finish().unwrap();
        assert_eq!(out.safety_score, 100);
        assert!(out.perfect);
    }

    #[test]
    fn finish_twice_is_rejected() {
        let mut s = session(TimerSetting::Off);
        s.submit_answer(0, None).unwrap();
        s.finish().unwrap();
        assert_eq!(s.finish(), Err(GameError::WrongPhase("game_over")));
    }

    #[test]
    fn fresh_session_resets_ephemeral_state() {
        let s = GameSession::new("s2".into(), HazardCategory::UrbanFire, TimerSetting::Off);
        assert_eq!(s.safety_score, 100);
        assert_eq!(s.question_count, 1);
        assert!(s.history.is_empty());
        assert_eq!(s.bonus_xp, 0);
        assert_eq!(s.phase, GamePhase::Loading);
    }

    #[test]
    fn next_context_mentions_choice_and_verdict() {
        let mut s = session(TimerSetting::Off);
        s.submit_answer(1, None).unwrap();
        let ctx = s.next_context().unwrap();
        assert!(ctx.contains("Drive through the water"));
        assert!(ctx.contains("wrong choice"));
        assert!(ctx.contains("Most flood deaths happen in vehicles."));
    }

    #[test]
    fn fetch_failure_moves_to_error_phase() {
        let mut s = session(TimerSetting::Off);
        s.submit_answer(0, None).unwrap();
        s.fail("model unavailable");
        assert_eq!(s.phase, GamePhase::Error);
        assert_eq!(s.advance(question(0)), Err(GameError::WrongPhase("error")));
    }
}
