//! Practice statistics: per-day and per-note counters with derived views.
//!
//! Both collections are written through to a key-value store after every
//! change. Records keep first-seen order, which is also the order they are
//! stored in.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use std::time::Instant;

use chrono::{Local, NaiveDate};
use directories::ProjectDirs;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::engine::AnswerRecorder;
use crate::error::{Error, Result};
use crate::note::NoteName;

const DAILY_STATS_KEY: &str = "dailyStats";
const NOTE_STATS_KEY: &str = "noteStats";

/// Notes need this many attempts before they rank as weak or strong
const MIN_ATTEMPTS_FOR_RANKING: u32 = 5;
const RANKED_NOTES: usize = 3;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DailyStats {
    pub date: NaiveDate,
    pub total_notes: u32,
    pub correct_notes: u32,
    pub practice_time_seconds: u64,
}

impl DailyStats {
    fn empty(date: NaiveDate) -> Self {
        Self {
            date,
            total_notes: 0,
            correct_notes: 0,
            practice_time_seconds: 0,
        }
    }

    /// Percentage, 0 when nothing was answered
    pub fn accuracy(&self) -> f64 {
        percentage(self.correct_notes, self.total_notes)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NoteStats {
    pub note_name: NoteName,
    pub total_attempts: u32,
    pub correct_attempts: u32,
}

impl NoteStats {
    pub fn accuracy(&self) -> f64 {
        percentage(self.correct_attempts, self.total_attempts)
    }
}

fn percentage(part: u32, whole: u32) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64 * 100.0
    }
}

/// Key-value persistence for serialized stats blobs
pub trait StatsStore {
    /// `Ok(None)` when nothing has been stored under `key`
    fn load(&self, key: &str) -> Result<Option<String>>;
    fn save(&mut self, key: &str, blob: &str) -> Result<()>;
}

impl<T: StatsStore + ?Sized> StatsStore for Box<T> {
    fn load(&self, key: &str) -> Result<Option<String>> {
        (**self).load(key)
    }

    fn save(&mut self, key: &str, blob: &str) -> Result<()> {
        (**self).save(key, blob)
    }
}

/// One JSON file per key inside a directory
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Store under the platform data directory
    pub fn open_default() -> Result<Self> {
        ProjectDirs::from("", "", "staffdrill")
            .map(|dirs| Self::new(dirs.data_dir()))
            .ok_or_else(|| Error::Config("Could not determine data directory".to_string()))
    }

    pub fn dir(&self) -> &PathBuf {
        &self.dir
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl StatsStore for JsonFileStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        let path = self.path(key);
        if !path.exists() {
            return Ok(None);
        }
        Ok(Some(fs::read_to_string(path)?))
    }

    /// Written beside the target and renamed over it, so a crash leaves
    /// either the old blob or the new one.
    fn save(&mut self, key: &str, blob: &str) -> Result<()> {
        fs::create_dir_all(&self.dir)?;
        let path = self.path(key);
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, blob)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// In-memory store, for tests and for running without a data directory
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    blobs: HashMap<String, String>,
}

impl StatsStore for MemoryStore {
    fn load(&self, key: &str) -> Result<Option<String>> {
        Ok(self.blobs.get(key).cloned())
    }

    fn save(&mut self, key: &str, blob: &str) -> Result<()> {
        self.blobs.insert(key.to_string(), blob.to_string());
        Ok(())
    }
}

fn today() -> NaiveDate {
    Local::now().date_naive()
}

/// Missing or unreadable data counts as no history.
fn load_records<T: DeserializeOwned, S: StatsStore>(store: &S, key: &str) -> Vec<T> {
    let blob = match store.load(key) {
        Ok(Some(blob)) => blob,
        Ok(None) => return Vec::new(),
        Err(e) => {
            log::warn!("failed to read {}: {}", key, e);
            return Vec::new();
        }
    };
    serde_json::from_str(&blob).unwrap_or_else(|e| {
        log::warn!("discarding unreadable {}: {}", key, e);
        Vec::new()
    })
}

pub struct StatsAggregator<S: StatsStore> {
    store: S,
    daily: Vec<DailyStats>,
    notes: Vec<NoteStats>,
    session_start: Option<Instant>,
}

impl<S: StatsStore> StatsAggregator<S> {
    /// Restore whatever history `store` holds
    pub fn load(store: S) -> Self {
        let daily: Vec<DailyStats> = load_records(&store, DAILY_STATS_KEY);
        let notes: Vec<NoteStats> = load_records(&store, NOTE_STATS_KEY);
        log::debug!("loaded {} days, {} notes of stats", daily.len(), notes.len());
        Self {
            store,
            daily,
            notes,
            session_start: None,
        }
    }

    #[cfg(test)]
    pub fn daily_stats(&self) -> &[DailyStats] {
        &self.daily
    }

    #[cfg(test)]
    pub fn note_stats(&self) -> &[NoteStats] {
        &self.notes
    }

    #[cfg(test)]
    pub fn store(&self) -> &S {
        &self.store
    }

    // ---- recording ----

    pub fn record_answer(&mut self, note: NoteName, correct: bool) {
        self.record_answer_on(today(), note, correct);
    }

    pub fn record_answer_on(&mut self, date: NaiveDate, note: NoteName, correct: bool) {
        let day = self.day_mut(date);
        day.total_notes += 1;
        if correct {
            day.correct_notes += 1;
        }

        let idx = match self.notes.iter().position(|n| n.note_name == note) {
            Some(idx) => idx,
            None => {
                self.notes.push(NoteStats {
                    note_name: note,
                    total_attempts: 0,
                    correct_attempts: 0,
                });
                self.notes.len() - 1
            }
        };
        self.notes[idx].total_attempts += 1;
        if correct {
            self.notes[idx].correct_attempts += 1;
        }

        self.persist();
    }

    pub fn start_session(&mut self) {
        self.session_start = Some(Instant::now());
    }

    /// Credit the time since `start_session` to today. No-op without a start.
    pub fn end_session(&mut self) {
        let Some(start) = self.session_start.take() else {
            return;
        };
        let seconds = start.elapsed().as_secs();
        log::info!("practice session lasted {}s", seconds);
        self.add_practice_time_on(today(), seconds);
    }

    pub fn add_practice_time_on(&mut self, date: NaiveDate, seconds: u64) {
        self.day_mut(date).practice_time_seconds += seconds;
        self.persist();
    }

    pub fn reset_all_stats(&mut self) {
        self.daily.clear();
        self.notes.clear();
        self.persist();
    }

    fn day_mut(&mut self, date: NaiveDate) -> &mut DailyStats {
        let idx = match self.daily.iter().position(|d| d.date == date) {
            Some(idx) => idx,
            None => {
                self.daily.push(DailyStats::empty(date));
                self.daily.len() - 1
            }
        };
        &mut self.daily[idx]
    }

    fn persist(&mut self) {
        if let Err(e) = self.try_persist() {
            log::warn!("failed to save stats: {}", e);
        }
    }

    fn try_persist(&mut self) -> Result<()> {
        let daily = serde_json::to_string_pretty(&self.daily)?;
        let notes = serde_json::to_string_pretty(&self.notes)?;
        self.store.save(DAILY_STATS_KEY, &daily)?;
        self.store.save(NOTE_STATS_KEY, &notes)?;
        Ok(())
    }

    // ---- derived views ----

    pub fn today_stats(&self) -> Option<&DailyStats> {
        self.stats_on(today())
    }

    pub fn stats_on(&self, date: NaiveDate) -> Option<&DailyStats> {
        self.daily.iter().find(|d| d.date == date)
    }

    pub fn last_7_days_stats(&self) -> Vec<DailyStats> {
        self.last_7_days_from(today())
    }

    /// Seven consecutive days ending at `today`, oldest first; days
    /// without data come back zeroed.
    pub fn last_7_days_from(&self, today: NaiveDate) -> Vec<DailyStats> {
        (0..7)
            .rev()
            .map(|days_ago| {
                let date = today - chrono::Duration::days(days_ago);
                self.stats_on(date)
                    .cloned()
                    .unwrap_or_else(|| DailyStats::empty(date))
            })
            .collect()
    }

    pub fn total_notes_all_time(&self) -> u32 {
        self.daily.iter().map(|d| d.total_notes).sum()
    }

    pub fn total_correct_all_time(&self) -> u32 {
        self.daily.iter().map(|d| d.correct_notes).sum()
    }

    pub fn overall_accuracy(&self) -> f64 {
        percentage(self.total_correct_all_time(), self.total_notes_all_time())
    }

    /// Seconds
    pub fn total_practice_time(&self) -> u64 {
        self.daily.iter().map(|d| d.practice_time_seconds).sum()
    }

    /// Up to three least accurate notes with enough attempts
    pub fn weak_notes(&self) -> Vec<NoteStats> {
        self.ranked(|a, b| a.accuracy().total_cmp(&b.accuracy()))
    }

    /// Up to three most accurate notes with enough attempts
    pub fn strong_notes(&self) -> Vec<NoteStats> {
        self.ranked(|a, b| b.accuracy().total_cmp(&a.accuracy()))
    }

    fn ranked(
        &self,
        order: impl FnMut(&NoteStats, &NoteStats) -> std::cmp::Ordering,
    ) -> Vec<NoteStats> {
        let mut eligible: Vec<NoteStats> = self
            .notes
            .iter()
            .filter(|n| n.total_attempts >= MIN_ATTEMPTS_FOR_RANKING)
            .cloned()
            .collect();
        // stable: ties keep first-seen order
        eligible.sort_by(order);
        eligible.truncate(RANKED_NOTES);
        eligible
    }
}

impl<S: StatsStore> AnswerRecorder for StatsAggregator<S> {
    fn record_answer(&mut self, note: NoteName, correct: bool) {
        StatsAggregator::record_answer(self, note, correct);
    }
}
