//! Random note selection for a round.
//!
//! Generation never fails: an allowed-note filter that matches nothing
//! reachable at the given difficulty and clef is ignored for that draw.

use rand::Rng;
use rand::seq::SliceRandom;

use crate::note::{Clef, Difficulty, MusicNote, NoteName, note_name_for_position};

/// Pick one note within the difficulty's range, restricted to `allowed`
/// when that leaves at least one reachable position.
pub fn generate_note<R: Rng + ?Sized>(
    rng: &mut R,
    difficulty: Difficulty,
    clef: Clef,
    allowed: Option<&[NoteName]>,
) -> MusicNote {
    let range = difficulty.note_range();

    if let Some(allowed) = allowed.filter(|a| !a.is_empty()) {
        let valid: Vec<i32> = range
            .clone()
            .filter(|&pos| allowed.contains(&note_name_for_position(pos, clef)))
            .collect();

        if let Some(&position) = valid.choose(rng) {
            return MusicNote::new(position, clef);
        }
        log::debug!(
            "allowed notes {:?} unreachable at {:?}/{:?}, drawing from full range",
            allowed,
            difficulty,
            clef
        );
    }

    MusicNote::new(rng.gen_range(range), clef)
}

/// Draw `count` independent notes; repeats are allowed.
pub fn generate_notes<R: Rng + ?Sized>(
    rng: &mut R,
    count: usize,
    difficulty: Difficulty,
    clef: Clef,
    allowed: Option<&[NoteName]>,
) -> Vec<MusicNote> {
    (0..count)
        .map(|_| generate_note(rng, difficulty, clef, allowed))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::SmallRng;

    #[test]
    fn test_unfiltered_notes_stay_in_range() {
        let mut rng = SmallRng::seed_from_u64(1);
        for difficulty in Difficulty::ALL {
            let range = difficulty.note_range();
            for note in generate_notes(&mut rng, 200, difficulty, Clef::Bass, None) {
                assert!(range.contains(&note.position));
                assert_eq!(note.name, note_name_for_position(note.position, Clef::Bass));
            }
        }
    }

    #[test]
    fn test_filter_is_honored_when_reachable() {
        let mut rng = SmallRng::seed_from_u64(2);
        let allowed = [NoteName::Do, NoteName::Sol];
        for clef in [Clef::Treble, Clef::Bass] {
            for difficulty in Difficulty::ALL {
                for _ in 0..100 {
                    let note = generate_note(&mut rng, difficulty, clef, Some(&allowed));
                    assert!(allowed.contains(&note.name), "{:?} not allowed", note.name);
                }
            }
        }
    }

    #[test]
    fn test_filter_single_note() {
        let mut rng = SmallRng::seed_from_u64(3);
        let notes = generate_notes(&mut rng, 50, Difficulty::Expert, Clef::Treble, Some(&[NoteName::Fa]));
        assert_eq!(notes.len(), 50);
        assert!(notes.iter().all(|n| n.name == NoteName::Fa));
    }

    #[test]
    fn test_every_note_reachable_from_beginner_range() {
        // Nine consecutive positions cover all seven names, so the
        // fallback can only fire for an empty filter.
        let mut rng = SmallRng::seed_from_u64(4);
        for clef in [Clef::Treble, Clef::Bass] {
            for name in NoteName::ALL {
                let note = generate_note(&mut rng, Difficulty::Beginner, clef, Some(&[name]));
                assert_eq!(note.name, name);
            }
        }
    }

    #[test]
    fn test_empty_filter_means_no_filter() {
        let mut rng = SmallRng::seed_from_u64(5);
        let range = Difficulty::Easy.note_range();
        let notes = generate_notes(&mut rng, 100, Difficulty::Easy, Clef::Treble, Some(&[]));
        assert!(notes.iter().all(|n| range.contains(&n.position)));
        let distinct: std::collections::HashSet<NoteName> = notes.iter().map(|n| n.name).collect();
        assert!(distinct.len() > 1);
    }

    #[test]
    fn test_notes_are_distinct_instances() {
        let mut rng = SmallRng::seed_from_u64(6);
        let notes = generate_notes(&mut rng, 4, Difficulty::Beginner, Clef::Treble, Some(&[NoteName::Mi]));
        assert_ne!(notes[0], notes[1]);
        assert_eq!(notes[0].name, notes[1].name);
    }
}
