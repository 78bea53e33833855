//! Application context
//!
//! A [`Session`] owns one [`Transport`] and the synchronizers that follow it,
//! wires them together on construction and unwires them on teardown. Whoever
//! hosts the player (the CLI, a GUI shell, a test) creates one session and
//! passes it around instead of reaching for shared globals.

use std::cell::RefCell;
use std::rc::Rc;
use std::thread;

use crate::config::PlayerConfig;
use crate::error::PlayerError;
use crate::keyboard::Keyboard;
use crate::midi::{MidiSource, ParsedMidi};
use crate::playback::{AudioClock, SynthBackend, Timer, Transport};
use crate::song::SongData;
use crate::sync::{
    attach, attach_controls, ChordSync, ChordView, Controls, ControlsSync, ControlsView, KeyboardSync, KeyboardView,
    LyricSync, LyricView, Subscription,
};
use crate::timeline::Timeline;

/// Display targets for a session. The keyboard is optional.
pub struct Views {
    pub lyrics: Box<dyn LyricView>,
    pub chords: Box<dyn ChordView>,
    pub keyboard: Option<Box<dyn KeyboardView>>,
    pub controls: Box<dyn ControlsView>,
}

pub struct Session {
    config: PlayerConfig,
    transport: Rc<Transport>,
    timer: Rc<dyn Timer>,
    lyrics: Rc<RefCell<LyricSync<Box<dyn LyricView>>>>,
    chords: Rc<RefCell<ChordSync<Box<dyn ChordView>>>>,
    keyboard: Option<Rc<RefCell<KeyboardSync<Box<dyn KeyboardView>>>>>,
    controls: Rc<RefCell<ControlsSync<Box<dyn ControlsView>>>>,
    subscriptions: Vec<Subscription>,
}

impl Session {
    /// Build the transport from `config` and attach every synchronizer.
    ///
    /// # Errors
    /// [`PlayerError::ConfigError`] if the configuration does not validate.
    pub fn new(
        config: PlayerConfig,
        clock: Rc<dyn AudioClock>,
        timer: Rc<dyn Timer>,
        backend: Box<dyn SynthBackend>,
        views: Views,
    ) -> Result<Self, PlayerError> {
        config.validate()?;

        let transport = Rc::new(Transport::new(clock, timer.clone(), backend).with_tick_interval(config.tick_interval()));
        transport.set_playback_rate(config.playback_rate)?;

        let keyboard_range = Keyboard::new(config.chord_octave, config.keyboard_octaves);
        let lyrics = Rc::new(RefCell::new(LyricSync::new(Timeline::default(), config.lyric_policy, views.lyrics)));
        let chords = Rc::new(RefCell::new(ChordSync::new(Timeline::default(), views.chords)));
        let keyboard = views
            .keyboard
            .map(|view| Rc::new(RefCell::new(KeyboardSync::new(Timeline::default(), keyboard_range, view))));
        let controls = Rc::new(RefCell::new(ControlsSync::new(views.controls)));

        let bus = transport.events();
        let mut subscriptions = vec![
            attach(bus, lyrics.clone()),
            attach(bus, chords.clone()),
            attach_controls(bus, controls.clone()),
        ];
        if let Some(keyboard) = &keyboard {
            subscriptions.push(attach(bus, keyboard.clone()));
        }
        log::debug!("Session ready with {} subscriptions", subscriptions.len());

        Ok(Self {
            config,
            transport,
            timer,
            lyrics,
            chords,
            keyboard,
            controls,
            subscriptions,
        })
    }

    /// Load a MIDI source together with its lyrics and chords.
    ///
    /// On failure the previous song and its song data stay in place.
    pub fn load_song(&self, source: impl Into<MidiSource>, song: SongData) -> Result<Rc<ParsedMidi>, PlayerError> {
        let midi = self.transport.load_midi(source)?;
        self.install(song);
        Ok(midi)
    }

    /// Like [`Session::load_song`] for an already decoded song.
    pub fn load_parsed_song(&self, midi: ParsedMidi, song: SongData) -> Result<Rc<ParsedMidi>, PlayerError> {
        let midi = self.transport.load_parsed(midi)?;
        self.install(song);
        Ok(midi)
    }

    fn install(&self, song: SongData) {
        log::info!(
            "Song data: {} lyric lines, {} chords",
            song.lyrics.len(),
            song.chords.len()
        );
        if let Some(keyboard) = &self.keyboard {
            keyboard.borrow_mut().set_chords(song.chords.clone());
        }
        self.chords.borrow_mut().set_chords(song.chords);
        self.lyrics.borrow_mut().set_lyrics(song.lyrics);
    }

    /// Drive the timer in real time until playback pauses, stops or ends.
    pub fn run(&self) {
        while let Some(interval) = self.timer.interval() {
            thread::sleep(interval);
            self.transport.tick();
        }
    }

    pub fn transport(&self) -> &Rc<Transport> {
        &self.transport
    }

    pub fn config(&self) -> &PlayerConfig {
        &self.config
    }

    pub fn active_lyric(&self) -> Option<usize> {
        self.lyrics.borrow().active()
    }

    pub fn active_chord(&self) -> Option<usize> {
        self.chords.borrow().active()
    }

    pub fn controls(&self) -> Controls {
        self.controls.borrow().controls()
    }

    /// Detach every synchronizer and release the transport's song.
    pub fn teardown(&mut self) {
        if self.subscriptions.is_empty() {
            return;
        }
        let bus = self.transport.events();
        for subscription in self.subscriptions.drain(..) {
            subscription.detach(bus);
        }
        self.transport.dispose();
        log::debug!("Session torn down");
    }
}

impl Drop for Session {
    fn drop(&mut self) {
        self.teardown();
    }
}
