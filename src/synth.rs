use cpal::traits::{DeviceTrait, HostTrait, StreamTrait};
use std::cell::Cell;
use std::sync::mpsc;

use crate::engine::AudioSink;
use crate::error::{Error, Result};
use crate::note::NoteName;

const TONE_SECS: f64 = 0.6;
const TONE_GAIN: f64 = 0.3;
const CLICK_SECS: f64 = 0.05;
const CLICK_FREQ: f64 = 1000.0;
const CLICK_GAIN: f64 = 0.5;

/// A command sent to the audio thread
enum AudioCommand {
    /// Sine tone with a linear fade-out
    Tone { freq: f64 },
    /// Short decaying metronome click
    Click,
    /// Silence everything
    Stop,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum VoiceKind {
    Tone,
    Click,
}

/// One sounding voice inside the callback
#[derive(Debug)]
struct Voice {
    kind: VoiceKind,
    freq: f64,
    sample: usize,
    length: usize,
}

impl Voice {
    fn new(kind: VoiceKind, freq: f64, secs: f64, sample_rate: f64) -> Self {
        Self {
            kind,
            freq,
            sample: 0,
            length: (secs * sample_rate) as usize,
        }
    }

    fn finished(&self) -> bool {
        self.sample >= self.length
    }

    fn next_sample(&mut self, sample_rate: f64) -> f64 {
        if self.finished() {
            return 0.0;
        }
        let t = self.sample as f64 / sample_rate;
        let remaining = 1.0 - self.sample as f64 / self.length as f64;
        let wave = (t * self.freq * 2.0 * std::f64::consts::PI).sin();
        self.sample += 1;
        match self.kind {
            VoiceKind::Tone => wave * remaining * TONE_GAIN,
            VoiceKind::Click => wave * remaining * remaining * CLICK_GAIN,
        }
    }
}

/// Sum every voice for one frame and drop the ones that ended
fn mix_frame(voices: &mut Vec<Voice>, sample_rate: f64) -> f32 {
    let value: f64 = voices.iter_mut().map(|v| v.next_sample(sample_rate)).sum();
    voices.retain(|v| !v.finished());
    value.clamp(-1.0, 1.0) as f32
}

/// Default output device, fed note tones and clicks over a channel.
/// Playback failures are logged and never reach the caller.
pub struct AudioEngine {
    cmd_tx: mpsc::Sender<AudioCommand>,
    muted: Cell<bool>,
    _stream: cpal::Stream,
}

impl AudioEngine {
    pub fn new() -> Result<Self> {
        let host = cpal::default_host();
        let device = host
            .default_output_device()
            .ok_or_else(|| Error::Audio("no output audio device available".to_string()))?;

        let config = device
            .default_output_config()
            .map_err(|e| Error::Audio(format!("failed to get default output config: {}", e)))?;

        let sample_rate = config.sample_rate() as f64;
        let channels = (config.channels() as usize).max(1);

        let (cmd_tx, cmd_rx) = mpsc::channel::<AudioCommand>();
        let mut voices: Vec<Voice> = Vec::new();

        let stream = device
            .build_output_stream(
                &config.into(),
                move |data: &mut [f32], _: &cpal::OutputCallbackInfo| {
                    // Check for new commands (non-blocking)
                    while let Ok(cmd) = cmd_rx.try_recv() {
                        match cmd {
                            AudioCommand::Tone { freq } => {
                                voices.push(Voice::new(VoiceKind::Tone, freq, TONE_SECS, sample_rate))
                            }
                            AudioCommand::Click => voices.push(Voice::new(
                                VoiceKind::Click,
                                CLICK_FREQ,
                                CLICK_SECS,
                                sample_rate,
                            )),
                            AudioCommand::Stop => voices.clear(),
                        }
                    }

                    for frame in data.chunks_mut(channels) {
                        let value = mix_frame(&mut voices, sample_rate);
                        for sample in frame.iter_mut() {
                            *sample = value;
                        }
                    }
                },
                move |err| {
                    log::warn!("audio stream error: {}", err);
                },
                None,
            )
            .map_err(|e| Error::Audio(format!("failed to build output stream: {}", e)))?;

        stream
            .play()
            .map_err(|e| Error::Audio(format!("failed to play stream: {}", e)))?;

        log::debug!("audio output at {} Hz, {} channels", sample_rate, channels);
        Ok(Self {
            cmd_tx,
            muted: Cell::new(false),
            _stream: stream,
        })
    }

    pub fn set_muted(&self, muted: bool) {
        self.muted.set(muted);
        if muted {
            self.send(AudioCommand::Stop);
        }
    }

    pub fn is_muted(&self) -> bool {
        self.muted.get()
    }

    fn send(&self, cmd: AudioCommand) {
        if self.cmd_tx.send(cmd).is_err() {
            log::warn!("audio thread disconnected");
        }
    }
}

impl AudioSink for AudioEngine {
    fn play_note(&self, note: NoteName, octave: u8) {
        if self.is_muted() {
            return;
        }
        self.send(AudioCommand::Tone {
            freq: note.to_freq(octave),
        });
    }

    fn play_metronome_tick(&self) {
        if self.is_muted() {
            return;
        }
        self.send(AudioCommand::Click);
    }
}

/// Stand-in when no audio device could be opened
pub struct Silence;

impl AudioSink for Silence {
    fn play_note(&self, _note: NoteName, _octave: u8) {}

    fn play_metronome_tick(&self) {}
}
