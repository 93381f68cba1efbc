//! PCM decoding. Any supported container/codec combination is decoded to a
//! mono `f32` sample buffer at the file's native sample rate; callers
//! resample to the fixed analysis rate (§4.3) with [`resample_to`].

use std::fs::File;
use std::path::Path;
use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::DecoderOptions;
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum DecodeError {
    #[error("io error reading {path}: {source}")]
    Io {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("unrecognized format for {0}")]
    UnrecognizedFormat(String),
    #[error("no audio track in {0}")]
    NoAudioTrack(String),
    #[error("decode error: {0}")]
    Decode(String),
}

pub struct DecodedAudio {
    pub samples: Vec<f32>,
    pub sample_rate: u32,
}

/// Decode an audio file to mono `f32` PCM at its native sample rate.
pub fn load_audio(path: &Path) -> Result<DecodedAudio, DecodeError> {
    let file = File::open(path).map_err(|source| DecodeError::Io {
        path: path.display().to_string(),
        source,
    })?;
    let mss = MediaSourceStream::new(Box::new(file), Default::default());

    let mut hint = Hint::new();
    if let Some(ext) = path.extension().and_then(|e| e.to_str()) {
        hint.with_extension(ext);
    }

    let probed = symphonia::default::get_probe()
        .format(&hint, mss, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(|_| DecodeError::UnrecognizedFormat(path.display().to_string()))?;

    let mut format = probed.format;
    let track = format
        .tracks()
        .iter()
        .find(|t| t.codec_params.sample_rate.is_some())
        .ok_or_else(|| DecodeError::NoAudioTrack(path.display().to_string()))?;
    let track_id = track.id;
    let sample_rate = track
        .codec_params
        .sample_rate
        .ok_or_else(|| DecodeError::NoAudioTrack(path.display().to_string()))?;

    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(|e| DecodeError::Decode(e.to_string()))?;

    let mut samples = Vec::new();
    loop {
        let packet = match format.next_packet() {
            Ok(p) => p,
            Err(SymphoniaError::IoError(ref e))
                if e.kind() == std::io::ErrorKind::UnexpectedEof =>
            {
                break
            }
            Err(e) => return Err(DecodeError::Decode(e.to_string())),
        };
        if packet.track_id() != track_id {
            continue;
        }
        match decoder.decode(&packet) {
            Ok(buf) => push_downmixed(buf, &mut samples),
            Err(SymphoniaError::DecodeError(_)) => continue,
            Err(e) => return Err(DecodeError::Decode(e.to_string())),
        }
    }

    log::debug!(
        "decoded {} ({} samples @ {} Hz)",
        path.display(),
        samples.len(),
        sample_rate
    );

    Ok(DecodedAudio { samples, sample_rate })
}

/// Downmix an arbitrary-format decoded buffer to mono by channel averaging,
/// appending to `out`. Copies through a `SampleBuffer<f32>` (the format's
/// sample type is erased by `copy_interleaved_ref`, matching the decode
/// pattern this pack's own symphonia-based decoder uses) rather than
/// matching on `AudioBufferRef` variants by hand.
fn push_downmixed(buf: symphonia::core::audio::AudioBufferRef, out: &mut Vec<f32>) {
    let spec = *buf.spec();
    let channels = spec.channels.count().max(1);
    let duration = buf.capacity() as u64;

    let mut sample_buf = SampleBuffer::<f32>::new(duration, spec);
    sample_buf.copy_interleaved_ref(buf);
    let interleaved = sample_buf.samples();

    out.reserve(interleaved.len() / channels);
    for frame in interleaved.chunks(channels) {
        out.push(frame.iter().sum::<f32>() / channels as f32);
    }
}

/// Linear-interpolation resample to `target_rate`. Good enough for onset
/// detection and tempo/key estimation; not intended for audible playback.
pub fn resample_to(samples: &[f32], orig_rate: u32, target_rate: u32) -> Vec<f32> {
    if orig_rate == target_rate || samples.is_empty() {
        return samples.to_vec();
    }
    let ratio = target_rate as f64 / orig_rate as f64;
    let out_len = ((samples.len() as f64) * ratio).round() as usize;
    let mut out = Vec::with_capacity(out_len);
    for i in 0..out_len {
        let src_pos = i as f64 / ratio;
        let idx = src_pos.floor() as usize;
        let frac = (src_pos - idx as f64) as f32;
        let a = samples[idx.min(samples.len() - 1)];
        let b = samples[(idx + 1).min(samples.len() - 1)];
        out.push(a + (b - a) * frac);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn resample_identity_when_rates_match() {
        let samples = vec![0.0, 1.0, 0.5];
        assert_eq!(resample_to(&samples, 44100, 44100), samples);
    }

    #[test]
    fn resample_halves_length_for_half_rate() {
        let samples: Vec<f32> = (0..1000).map(|i| (i as f32 / 1000.0).sin()).collect();
        let out = resample_to(&samples, 44100, 22050);
        assert!((out.len() as i64 - 500).abs() <= 1);
    }
}
