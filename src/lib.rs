pub mod console_display;
pub mod controller;
pub mod data_logger;
pub mod dsp;
pub mod frame_assembler;
pub mod key_estimator;
pub mod note_history;
pub mod note_mapper;
pub mod pitch_estimator;
pub mod presenter;
pub mod settings;
pub mod simulator;
pub mod text_presenter;
pub mod types;
pub mod wav_player;

#[cfg(feature = "audio")]
pub mod audio_input;
