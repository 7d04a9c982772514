use std::io::{Cursor, ErrorKind};

use symphonia::core::audio::SampleBuffer;
use symphonia::core::codecs::{DecoderOptions, CODEC_TYPE_NULL};
use symphonia::core::errors::Error as SymphoniaError;
use symphonia::core::formats::FormatOptions;
use symphonia::core::io::MediaSourceStream;
use symphonia::core::meta::MetadataOptions;
use symphonia::core::probe::Hint;
use tts_job_domain::{AudioCodecPort, DecodedAudio, DomainError, SampleEncoding};

/// Reads WAV (`hound`) and MP3 (`symphonia`) reference audio, picking the
/// decoder from the container signature. Output is always mono PCM16 WAV.
#[derive(Debug, Default, Clone, Copy)]
pub struct AudioFileCodec;

impl AudioFileCodec {
    pub fn new() -> Self {
        Self
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Container {
    Wav,
    Mp3,
}

impl Container {
    fn sniff(bytes: &[u8]) -> Option<Self> {
        if bytes.starts_with(b"RIFF") {
            return Some(Self::Wav);
        }
        // ID3v2 tag, or a bare MPEG audio frame sync.
        let frame_sync = bytes.len() >= 2 && bytes[0] == 0xFF && bytes[1] & 0xE0 == 0xE0;
        if bytes.starts_with(b"ID3") || frame_sync {
            return Some(Self::Mp3);
        }
        None
    }
}

impl AudioCodecPort for AudioFileCodec {
    fn decode(&self, bytes: &[u8]) -> Result<DecodedAudio, DomainError> {
        match Container::sniff(bytes) {
            Some(Container::Wav) => decode_wav(bytes),
            Some(Container::Mp3) => decode_mp3(bytes),
            None => Err(DomainError::audio_decode_error(
                "unrecognised audio container, expected WAV or MP3",
            )),
        }
    }

    fn encode_wav(&self, samples: &[f32], sample_rate_hz: u32) -> Result<Vec<u8>, DomainError> {
        if sample_rate_hz == 0 {
            return Err(DomainError::audio_encode_error("sample rate must be greater than zero"));
        }

        let spec = hound::WavSpec {
            channels: 1,
            sample_rate: sample_rate_hz,
            bits_per_sample: 16,
            sample_format: hound::SampleFormat::Int,
        };
        let encode_error = |err: hound::Error| DomainError::audio_encode_error(&err.to_string());

        let mut buffer = Cursor::new(Vec::with_capacity(44 + samples.len() * 2));
        {
            let mut writer = hound::WavWriter::new(&mut buffer, spec).map_err(encode_error)?;
            for &sample in samples {
                writer.write_sample(to_pcm16(sample)).map_err(encode_error)?;
            }
            writer.finalize().map_err(encode_error)?;
        }
        Ok(buffer.into_inner())
    }
}

fn decode_wav(bytes: &[u8]) -> Result<DecodedAudio, DomainError> {
    let mut reader = hound::WavReader::new(Cursor::new(bytes))
        .map_err(|err| DomainError::audio_decode_error(&err.to_string()))?;
    let spec = reader.spec();
    if spec.channels == 0 {
        return Err(DomainError::audio_decode_error("WAV header declares no channels"));
    }

    let (interleaved, encoding) = match spec.sample_format {
        hound::SampleFormat::Float => {
            let samples = reader
                .samples::<f32>()
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| DomainError::audio_decode_error(&err.to_string()))?;
            (samples, SampleEncoding::Float)
        }
        hound::SampleFormat::Int => {
            let bits = u32::from(spec.bits_per_sample.clamp(1, 32));
            let scale = (1u64 << (bits - 1)) as f32;
            let samples = reader
                .samples::<i32>()
                .map(|sample| sample.map(|value| value as f32 / scale))
                .collect::<Result<Vec<_>, _>>()
                .map_err(|err| DomainError::audio_decode_error(&err.to_string()))?;
            (samples, SampleEncoding::Int)
        }
    };

    Ok(DecodedAudio {
        samples: downmix(&interleaved, spec.channels),
        sample_rate_hz: spec.sample_rate,
        channels: spec.channels,
        bits_per_sample: spec.bits_per_sample,
        encoding,
    })
}

fn decode_mp3(bytes: &[u8]) -> Result<DecodedAudio, DomainError> {
    let decode_error = |err: SymphoniaError| DomainError::audio_decode_error(&err.to_string());

    let source = MediaSourceStream::new(Box::new(Cursor::new(bytes.to_vec())), Default::default());
    let mut hint = Hint::new();
    hint.with_extension("mp3");
    let detected = symphonia::default::get_probe()
        .format(&hint, source, &FormatOptions::default(), &MetadataOptions::default())
        .map_err(decode_error)?;
    let mut format = detected.format;

    let track = format
        .tracks()
        .iter()
        .find(|track| track.codec_params.codec != CODEC_TYPE_NULL)
        .ok_or_else(|| DomainError::audio_decode_error("MP3 stream has no audio track"))?;
    let track_id = track.id;
    let mut decoder = symphonia::default::get_codecs()
        .make(&track.codec_params, &DecoderOptions::default())
        .map_err(decode_error)?;

    let mut sample_rate_hz = track.codec_params.sample_rate.unwrap_or(0);
    let mut channels = track
        .codec_params
        .channels
        .map(|channels| channels.count() as u16)
        .unwrap_or(0);
    let mut interleaved = Vec::new();

    loop {
        let packet = match format.next_packet() {
            Ok(packet) => packet,
            Err(SymphoniaError::IoError(err)) if err.kind() == ErrorKind::UnexpectedEof => break,
            Err(SymphoniaError::ResetRequired) => break,
            Err(err) => return Err(decode_error(err)),
        };
        if packet.track_id() != track_id {
            continue;
        }

        match decoder.decode(&packet) {
            Ok(decoded) => {
                let spec = *decoded.spec();
                sample_rate_hz = spec.rate;
                channels = spec.channels.count() as u16;
                let mut buffer = SampleBuffer::<f32>::new(decoded.capacity() as u64, spec);
                buffer.copy_interleaved_ref(decoded);
                interleaved.extend_from_slice(buffer.samples());
            }
            // Corrupt frames are skipped, matching common MP3 player behaviour.
            Err(SymphoniaError::DecodeError(reason)) => {
                tracing::debug!(reason, "skipping undecodable MP3 frame");
            }
            Err(err) => return Err(decode_error(err)),
        }
    }

    if channels == 0 || interleaved.is_empty() {
        return Err(DomainError::audio_decode_error("MP3 stream contains no audio frames"));
    }

    Ok(DecodedAudio {
        samples: downmix(&interleaved, channels),
        sample_rate_hz,
        channels,
        bits_per_sample: 32,
        encoding: SampleEncoding::Float,
    })
}

fn downmix(interleaved: &[f32], channels: u16) -> Vec<f32> {
    if channels == 1 {
        return interleaved.to_vec();
    }
    let channels = usize::from(channels);
    interleaved
        .chunks_exact(channels)
        .map(|frame| frame.iter().sum::<f32>() / channels as f32)
        .collect()
}

fn to_pcm16(sample: f32) -> i16 {
    let sample = sample.clamp(-1.0, 1.0);
    if sample >= 0.0 {
        (sample * 32767.0).round() as i16
    } else {
        (sample * 32768.0).round() as i16
    }
}
