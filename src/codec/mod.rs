//! Sample conversion and WAV file support

pub mod convert;
pub mod wav;

pub use convert::{decode_sample, normalize, ChannelSelect};
pub use wav::{decode_wav, read_wav_file, wav_spec, wave_format, RecordReport, WavRecorder};
