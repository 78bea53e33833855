//! # Error Types
//!
//! This module defines all error types for the karaoke playback core.
//!
//! ## Error Types
//! - `LoadError` - The MIDI source could not be read or parsed
//! - `InvalidArgument` - A call was rejected (rate or seek time out of range)
//! - `AudioDeviceError` - The synthesis backend or audio clock is unavailable
//! - `SongDataError` - Malformed lyric/chord input, with line information
//! - `InvalidSongData` - A lyric/chord entry that cannot be placed on the timeline
//! - `ConfigError` - Unreadable or malformed player configuration
//!
//! Errors from the transport are also published on the `error` event, so the
//! enum is `Clone` and can travel inside an [`ErrorEvent`](crate::playback::ErrorEvent).
//!
//! ## Usage
//! ```rust
//! use kplay::PlayerError;
//!
//! let err = PlayerError::InvalidArgument("playback rate 3 is outside [0.5, 2.0]".to_string());
//! match err {
//!     PlayerError::InvalidArgument(message) => eprintln!("rejected: {}", message),
//!     other => eprintln!("Error: {}", other),
//! }
//! ```

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum PlayerError {
    /// The MIDI source could not be fetched or parsed.
    ///
    /// Fatal to the load call only; a previously loaded song stays intact.
    ///
    /// # Example
    /// ```
    /// # use kplay::PlayerError;
    /// let err = PlayerError::LoadError("unexpected end of file".to_string());
    /// assert_eq!(err.to_string(), "Failed to load MIDI: unexpected end of file");
    /// ```
    #[error("Failed to load MIDI: {0}")]
    LoadError(String),

    /// An argument was out of range. The call is rejected and state is unchanged.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    /// The audio backend is unavailable. Playback halts as if stopped.
    #[error("Audio device error: {0}")]
    AudioDeviceError(String),

    /// Lyric or chord data could not be parsed.
    ///
    /// # Example
    /// ```
    /// # use kplay::PlayerError;
    /// let err = PlayerError::SongDataError {
    ///     line: 3,
    ///     message: "chord entry has no name".to_string(),
    /// };
    /// assert_eq!(err.to_string(), "Song data error at line 3: chord entry has no name");
    /// ```
    #[error("Song data error at line {line}: {message}")]
    SongDataError { line: usize, message: String },

    /// Song data was well-formed but an entry is unusable (no text, no start,
    /// or a span that ends before it starts).
    #[error("Invalid song data: {0}")]
    InvalidSongData(String),

    #[error("Invalid configuration: {0}")]
    ConfigError(String),
}
