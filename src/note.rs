use std::fmt;
use std::ops::RangeInclusive;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};

use crate::parser::ParseError;

/// Diatonic note names (solfège), in scale order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum NoteName {
    Do,
    Re,
    Mi,
    Fa,
    Sol,
    La,
    Si,
}

impl NoteName {
    /// The fixed cyclic order used for staff position lookups
    pub const ALL: [NoteName; 7] = [
        NoteName::Do,
        NoteName::Re,
        NoteName::Mi,
        NoteName::Fa,
        NoteName::Sol,
        NoteName::La,
        NoteName::Si,
    ];

    pub fn solfege_name(self) -> &'static str {
        match self {
            NoteName::Do => "Do",
            NoteName::Re => "Re",
            NoteName::Mi => "Mi",
            NoteName::Fa => "Fa",
            NoteName::Sol => "Sol",
            NoteName::La => "La",
            NoteName::Si => "Si",
        }
    }

    /// Letter notation alias (Do = C ... Si = B)
    pub fn letter_name(self) -> &'static str {
        match self {
            NoteName::Do => "C",
            NoteName::Re => "D",
            NoteName::Mi => "E",
            NoteName::Fa => "F",
            NoteName::Sol => "G",
            NoteName::La => "A",
            NoteName::Si => "B",
        }
    }

    pub fn display_name(self, notation: NoteNotation) -> &'static str {
        match notation {
            NoteNotation::Solfege => self.solfege_name(),
            NoteNotation::Letter => self.letter_name(),
        }
    }

    /// MIDI note number within an octave (Do=0, Si=11)
    pub fn semitone(self) -> u8 {
        match self {
            NoteName::Do => 0,
            NoteName::Re => 2,
            NoteName::Mi => 4,
            NoteName::Fa => 5,
            NoteName::Sol => 7,
            NoteName::La => 9,
            NoteName::Si => 11,
        }
    }

    /// Convert to MIDI note number given an octave (0-8)
    /// Middle C (Do4) = MIDI 60
    pub fn to_midi(self, octave: u8) -> u8 {
        (octave + 1) * 12 + self.semitone()
    }

    /// Frequency in Hz (La4 = 440 Hz)
    pub fn to_freq(self, octave: u8) -> f64 {
        let midi = self.to_midi(octave) as f64;
        440.0 * 2.0_f64.powf((midi - 69.0) / 12.0)
    }
}

impl fmt::Display for NoteName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.solfege_name())
    }
}

/// How note names are shown to the player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NoteNotation {
    #[default]
    Solfege,
    Letter,
}

/// Clef setting as chosen by the player
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClefType {
    #[default]
    Treble,
    Bass,
    Random,
}

impl ClefType {
    /// Materialize the setting into a concrete clef. `Random` flips a fair coin.
    pub fn resolve<R: Rng + ?Sized>(self, rng: &mut R) -> Clef {
        match self {
            ClefType::Treble => Clef::Treble,
            ClefType::Bass => Clef::Bass,
            ClefType::Random => {
                if rng.gen_bool(0.5) {
                    Clef::Treble
                } else {
                    Clef::Bass
                }
            }
        }
    }
}

/// A resolved clef: the one actually drawn on the staff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Clef {
    Treble,
    Bass,
}

impl Clef {
    /// Index into `NoteName::ALL` of the note on the middle line
    /// (Si/B4 for treble, Re/D3 for bass).
    pub fn base_index(self) -> i32 {
        match self {
            Clef::Treble => 6,
            Clef::Bass => 1,
        }
    }

    fn base_octave(self) -> i32 {
        match self {
            Clef::Treble => 4,
            Clef::Bass => 3,
        }
    }

    /// Octave of the pitch sitting at `position` on this clef's staff
    pub fn octave_for_position(self, position: i32) -> u8 {
        let octave = self.base_octave() + (self.base_index() + position).div_euclid(7);
        octave.clamp(0, 8) as u8
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Clef::Treble => "Treble (Sol)",
            Clef::Bass => "Bass (Fa)",
        }
    }
}

/// Name of the note at a staff position, counted in half-line steps from
/// the middle line. Defined for every integer position.
pub fn note_name_for_position(position: i32, clef: Clef) -> NoteName {
    let idx = (clef.base_index() + position).rem_euclid(7);
    NoteName::ALL[idx as usize]
}

/// Difficulty levels 1 through 5
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum Difficulty {
    Beginner,
    #[default]
    Easy,
    Medium,
    Hard,
    Expert,
}

impl Difficulty {
    pub const ALL: [Difficulty; 5] = [
        Difficulty::Beginner,
        Difficulty::Easy,
        Difficulty::Medium,
        Difficulty::Hard,
        Difficulty::Expert,
    ];

    pub fn level(self) -> u8 {
        match self {
            Difficulty::Beginner => 1,
            Difficulty::Easy => 2,
            Difficulty::Medium => 3,
            Difficulty::Hard => 4,
            Difficulty::Expert => 5,
        }
    }

    /// Staff positions reachable at this level, symmetric around the middle line.
    /// Each level contains every lower level's range.
    pub fn note_range(self) -> RangeInclusive<i32> {
        let k = match self {
            Difficulty::Beginner => 4, // staff lines only
            Difficulty::Easy => 5,     // lines and spaces
            Difficulty::Medium => 7,   // +1 ledger line
            Difficulty::Hard => 9,     // +2 ledger lines
            Difficulty::Expert => 11,  // +3 ledger lines
        };
        -k..=k
    }

    pub fn display_name(self) -> &'static str {
        match self {
            Difficulty::Beginner => "Beginner",
            Difficulty::Easy => "Easy",
            Difficulty::Medium => "Medium",
            Difficulty::Hard => "Hard",
            Difficulty::Expert => "Expert",
        }
    }
}

impl TryFrom<u8> for Difficulty {
    type Error = ParseError;

    fn try_from(level: u8) -> Result<Self, Self::Error> {
        Difficulty::ALL
            .into_iter()
            .find(|d| d.level() == level)
            .ok_or_else(|| ParseError::new(level.to_string(), "difficulty must be 1-5"))
    }
}

impl From<Difficulty> for u8 {
    fn from(d: Difficulty) -> u8 {
        d.level()
    }
}

/// Opaque identity of a generated note; two notes with the same
/// position and name are still distinct notes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct NoteId(u64);

impl NoteId {
    fn next() -> Self {
        static NEXT: AtomicU64 = AtomicU64::new(1);
        NoteId(NEXT.fetch_add(1, Ordering::Relaxed))
    }
}

/// A note placed on the staff
#[derive(Debug, Clone)]
pub struct MusicNote {
    pub id: NoteId,
    /// 0 = middle line, positive = up, negative = down
    pub position: i32,
    pub name: NoteName,
}

impl MusicNote {
    pub fn new(position: i32, clef: Clef) -> Self {
        Self {
            id: NoteId::next(),
            position,
            name: note_name_for_position(position, clef),
        }
    }
}

impl PartialEq for MusicNote {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for MusicNote {}

/// Notes per round
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub enum RoundLength {
    #[default]
    Short,
    Medium,
    Long,
}

impl RoundLength {
    pub fn count(self) -> usize {
        match self {
            RoundLength::Short => 4,
            RoundLength::Medium => 8,
            RoundLength::Long => 12,
        }
    }
}

impl TryFrom<u8> for RoundLength {
    type Error = ParseError;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        match n {
            4 => Ok(RoundLength::Short),
            8 => Ok(RoundLength::Medium),
            12 => Ok(RoundLength::Long),
            _ => Err(ParseError::new(n.to_string(), "round length must be 4, 8 or 12")),
        }
    }
}

impl From<RoundLength> for u8 {
    fn from(r: RoundLength) -> u8 {
        r.count() as u8
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum GameMode {
    #[default]
    #[serde(rename = "practice")]
    Practice,
    #[serde(rename = "timed")]
    TimedChallenge,
    #[serde(rename = "streak")]
    Streak,
}

impl GameMode {
    pub fn display_name(self) -> &'static str {
        match self {
            GameMode::Practice => "Practice",
            GameMode::TimedChallenge => "Timed",
            GameMode::Streak => "Streak",
        }
    }

    pub fn description(self) -> &'static str {
        match self {
            GameMode::Practice => "Practice at your own pace",
            GameMode::TimedChallenge => "How many in 60 seconds?",
            GameMode::Streak => "Don't miss a single note!",
        }
    }
}

/// Metronome tempo choices
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub enum MetronomeSpeed {
    Slow,
    #[default]
    Moderate,
    Medium,
    Fast,
}

impl MetronomeSpeed {
    pub fn bpm(self) -> u32 {
        match self {
            MetronomeSpeed::Slow => 60,
            MetronomeSpeed::Moderate => 90,
            MetronomeSpeed::Medium => 120,
            MetronomeSpeed::Fast => 150,
        }
    }

    /// Time between beats
    pub fn interval(self) -> Duration {
        Duration::from_secs_f64(60.0 / self.bpm() as f64)
    }
}

impl TryFrom<u32> for MetronomeSpeed {
    type Error = ParseError;

    fn try_from(bpm: u32) -> Result<Self, Self::Error> {
        match bpm {
            60 => Ok(MetronomeSpeed::Slow),
            90 => Ok(MetronomeSpeed::Moderate),
            120 => Ok(MetronomeSpeed::Medium),
            150 => Ok(MetronomeSpeed::Fast),
            _ => Err(ParseError::new(
                bpm.to_string(),
                "metronome bpm must be 60, 90, 120 or 150",
            )),
        }
    }
}

impl From<MetronomeSpeed> for u32 {
    fn from(s: MetronomeSpeed) -> u32 {
        s.bpm()
    }
}

/// Outcome of the last answer, as shown by the feedback indicator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnswerResult {
    #[default]
    Pending,
    Correct,
    Incorrect,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    #[test]
    fn test_middle_c_midi() {
        assert_eq!(NoteName::Do.to_midi(4), 60);
    }

    #[test]
    fn test_a4_frequency() {
        let freq = NoteName::La.to_freq(4);
        assert!((freq - 440.0).abs() < 0.01);
    }

    #[test]
    fn test_middle_line_names() {
        assert_eq!(note_name_for_position(0, Clef::Treble), NoteName::Si);
        assert_eq!(note_name_for_position(0, Clef::Bass), NoteName::Re);
        assert_eq!(note_name_for_position(-6, Clef::Treble), NoteName::Do);
        assert_eq!(note_name_for_position(-1, Clef::Treble), NoteName::La);
    }

    #[test]
    fn test_negative_positions_wrap() {
        assert_eq!(note_name_for_position(-7, Clef::Treble), NoteName::Si);
        assert_eq!(note_name_for_position(-13, Clef::Treble), NoteName::Do);
        assert_eq!(note_name_for_position(-2, Clef::Bass), NoteName::Si);
    }

    #[test]
    fn test_position_period_is_seven() {
        for clef in [Clef::Treble, Clef::Bass] {
            for p in -30..30 {
                assert_eq!(
                    note_name_for_position(p, clef),
                    note_name_for_position(p + 7, clef)
                );
            }
        }
    }

    #[test]
    fn test_bass_is_treble_shifted() {
        // Base indices 1 (bass) and 6 (treble): bass(p) = treble(p - 5) = treble(p + 2)
        for p in -20..20 {
            let bass = note_name_for_position(p, Clef::Bass);
            assert_eq!(bass, note_name_for_position(p - 5, Clef::Treble));
            assert_eq!(bass, note_name_for_position(p + 2, Clef::Treble));
        }
    }

    #[test]
    fn test_ranges_nest() {
        for (i, lo) in Difficulty::ALL.iter().enumerate() {
            let lo_range = lo.note_range();
            assert_eq!(*lo_range.start(), -*lo_range.end());
            for hi in &Difficulty::ALL[i..] {
                let hi_range = hi.note_range();
                assert!(hi_range.start() <= lo_range.start());
                assert!(hi_range.end() >= lo_range.end());
            }
        }
    }

    #[test]
    fn test_range_table() {
        assert_eq!(Difficulty::Beginner.note_range(), -4..=4);
        assert_eq!(Difficulty::Expert.note_range(), -11..=11);
    }

    #[test]
    fn test_octave_for_position() {
        assert_eq!(Clef::Treble.octave_for_position(0), 4); // B4
        assert_eq!(Clef::Treble.octave_for_position(1), 5); // C5
        assert_eq!(Clef::Treble.octave_for_position(-6), 4); // C4
        assert_eq!(Clef::Treble.octave_for_position(-7), 3); // B3
        assert_eq!(Clef::Bass.octave_for_position(0), 3); // D3
        assert_eq!(Clef::Bass.octave_for_position(-2), 2); // B2
    }

    #[test]
    fn test_numeric_conversions_reject_unknown_values() {
        assert_eq!(Difficulty::try_from(3).ok(), Some(Difficulty::Medium));
        assert!(Difficulty::try_from(0).is_err());
        assert!(Difficulty::try_from(6).is_err());
        assert_eq!(RoundLength::try_from(12).ok(), Some(RoundLength::Long));
        assert!(RoundLength::try_from(5).is_err());
        assert_eq!(MetronomeSpeed::try_from(150).ok(), Some(MetronomeSpeed::Fast));
        assert!(MetronomeSpeed::try_from(100).is_err());
    }

    #[test]
    fn test_metronome_interval() {
        assert_eq!(MetronomeSpeed::Slow.interval(), Duration::from_secs(1));
        assert_eq!(MetronomeSpeed::Medium.interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_notes_compare_by_identity() {
        let a = MusicNote::new(2, Clef::Treble);
        let b = MusicNote::new(2, Clef::Treble);
        assert_eq!(a.name, b.name);
        assert_ne!(a, b);
        assert_eq!(a, a.clone());
    }

    #[test]
    fn test_random_clef_resolves_to_both() {
        let mut rng = SmallRng::seed_from_u64(7);
        let resolved: Vec<Clef> = (0..64).map(|_| ClefType::Random.resolve(&mut rng)).collect();
        assert!(resolved.contains(&Clef::Treble));
        assert!(resolved.contains(&Clef::Bass));
        assert_eq!(ClefType::Bass.resolve(&mut rng), Clef::Bass);
    }

    #[test]
    fn test_display_names() {
        assert_eq!(NoteName::Sol.display_name(NoteNotation::Solfege), "Sol");
        assert_eq!(NoteName::Sol.display_name(NoteNotation::Letter), "G");
        assert_eq!(NoteName::Si.to_string(), "Si");
    }
}
