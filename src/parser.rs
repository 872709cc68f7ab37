use std::str::FromStr;

use crate::note::*;

/// Map a keyboard character to the answer it stands for.
/// Home row `a s d f g h j` and digits `1`-`7` both run Do..Si.
pub fn char_to_note(c: char) -> Option<NoteName> {
    match c.to_ascii_lowercase() {
        'a' | '1' => Some(NoteName::Do),
        's' | '2' => Some(NoteName::Re),
        'd' | '3' => Some(NoteName::Mi),
        'f' | '4' => Some(NoteName::Fa),
        'g' | '5' => Some(NoteName::Sol),
        'h' | '6' => Some(NoteName::La),
        'j' | '7' => Some(NoteName::Si),
        _ => None,
    }
}

/// Rejected user input, with the offending text
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseError {
    pub input: String,
    pub message: String,
}

impl ParseError {
    pub fn new(input: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            input: input.into(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for ParseError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'{}': {}", self.input, self.message)
    }
}

impl std::error::Error for ParseError {}

/// Accepts solfège ("sol", "So") or letter ("G") names, case-insensitive
impl FromStr for NoteName {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let name = match trimmed.to_ascii_lowercase().as_str() {
            "do" | "ut" | "c" => NoteName::Do,
            "re" | "d" => NoteName::Re,
            "mi" | "e" => NoteName::Mi,
            "fa" | "f" => NoteName::Fa,
            "sol" | "so" | "g" => NoteName::Sol,
            "la" | "a" => NoteName::La,
            "si" | "ti" | "b" => NoteName::Si,
            _ => return Err(ParseError::new(trimmed, "unknown note name")),
        };
        Ok(name)
    }
}

impl FromStr for GameMode {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "practice" => Ok(GameMode::Practice),
            "timed" | "timed-challenge" | "challenge" => Ok(GameMode::TimedChallenge),
            "streak" => Ok(GameMode::Streak),
            _ => Err(ParseError::new(s, "expected practice, timed or streak")),
        }
    }
}

impl FromStr for ClefType {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "treble" | "sol" | "g" => Ok(ClefType::Treble),
            "bass" | "fa" | "f" => Ok(ClefType::Bass),
            "random" => Ok(ClefType::Random),
            _ => Err(ParseError::new(s, "expected treble, bass or random")),
        }
    }
}

impl FromStr for NoteNotation {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "solfege" | "solfège" => Ok(NoteNotation::Solfege),
            "letter" | "letters" => Ok(NoteNotation::Letter),
            _ => Err(ParseError::new(s, "expected solfege or letter")),
        }
    }
}

fn parse_number<T: FromStr>(s: &str, what: &str) -> Result<T, ParseError> {
    s.trim()
        .parse()
        .map_err(|_| ParseError::new(s, format!("{} must be a number", what)))
}

impl FromStr for Difficulty {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Difficulty::try_from(parse_number::<u8>(s, "difficulty")?)
    }
}

impl FromStr for RoundLength {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        RoundLength::try_from(parse_number::<u8>(s, "round length")?)
    }
}

impl FromStr for MetronomeSpeed {
    type Err = ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        MetronomeSpeed::try_from(parse_number::<u32>(s, "bpm")?)
    }
}

/// Parse a comma or whitespace separated list such as `"do, re, sol"`.
/// Duplicates collapse; order of first appearance is kept.
pub fn parse_note_list(input: &str) -> Result<Vec<NoteName>, ParseError> {
    let mut notes = Vec::new();
    for token in input
        .split(|c: char| c == ',' || c.is_whitespace())
        .filter(|t| !t.is_empty())
    {
        let note: NoteName = token.parse()?;
        if !notes.contains(&note) {
            notes.push(note);
        }
    }
    Ok(notes)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_char_mapping() {
        assert_eq!(char_to_note('a'), Some(NoteName::Do));
        assert_eq!(char_to_note('J'), Some(NoteName::Si));
        assert_eq!(char_to_note('5'), Some(NoteName::Sol));
        assert_eq!(char_to_note('z'), None);
        assert_eq!(char_to_note('8'), None);
    }

    #[test]
    fn test_note_names_both_notations() {
        assert_eq!("sol".parse::<NoteName>(), Ok(NoteName::Sol));
        assert_eq!("G".parse::<NoteName>(), Ok(NoteName::Sol));
        assert_eq!(" Si ".parse::<NoteName>(), Ok(NoteName::Si));
        assert_eq!("b".parse::<NoteName>(), Ok(NoteName::Si));
        assert!("h".parse::<NoteName>().is_err());
    }

    #[test]
    fn test_note_list() {
        let notes = parse_note_list("do, mi sol,do").unwrap();
        assert_eq!(notes, vec![NoteName::Do, NoteName::Mi, NoteName::Sol]);
        assert!(parse_note_list("").unwrap().is_empty());
    }

    #[test]
    fn test_note_list_reports_bad_token() {
        let err = parse_note_list("do, xx").unwrap_err();
        assert_eq!(err.input, "xx");
    }

    #[test]
    fn test_modes_and_clefs() {
        assert_eq!("Timed".parse::<GameMode>(), Ok(GameMode::TimedChallenge));
        assert_eq!("streak".parse::<GameMode>(), Ok(GameMode::Streak));
        assert!("survival".parse::<GameMode>().is_err());
        assert_eq!("BASS".parse::<ClefType>(), Ok(ClefType::Bass));
        assert_eq!("random".parse::<ClefType>(), Ok(ClefType::Random));
        assert_eq!("letter".parse::<NoteNotation>(), Ok(NoteNotation::Letter));
    }

    #[test]
    fn test_numeric_settings() {
        assert_eq!("4".parse::<Difficulty>(), Ok(Difficulty::Hard));
        assert!("0".parse::<Difficulty>().is_err());
        assert!("hard".parse::<Difficulty>().is_err());
        assert_eq!(" 8".parse::<RoundLength>(), Ok(RoundLength::Medium));
        assert_eq!("60".parse::<MetronomeSpeed>(), Ok(MetronomeSpeed::Slow));
        assert!("61".parse::<MetronomeSpeed>().is_err());
    }
}
