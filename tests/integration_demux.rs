//! Integration tests for parsing synthetic MP4 files end to end.

mod common;

use assert_matches::assert_matches;
use common::fixture::*;
use common::{sample_clip, video_sample, CLIP_SAMPLES};
use nalcast::trace::trace_samples;
use nalcast_media::{parse, Container, Error, FourCc, ParseOptions};

#[test]
fn test_every_video_sample_resolves_to_its_bytes() {
    let container = parse(sample_clip()).unwrap();
    let video = container.track(1).unwrap();

    assert_eq!(video.sample_count().unwrap(), CLIP_SAMPLES as u32);
    for i in 0..CLIP_SAMPLES {
        let data = video.sample_data(i as u32).unwrap();
        assert_eq!(&data[..], &video_sample(i)[..], "sample {}", i);

        let units = video.sample_nal_units(i as u32).unwrap();
        assert_eq!(units.len(), 2);
        assert_eq!(&units[0][..], &[0x09, 0xF0]);
        assert_eq!(units[1][2], i);
    }
}

#[test]
fn test_chunk_mapping_reconstructs_sample_index() {
    let container = parse(sample_clip()).unwrap();
    let video = container.track(1).unwrap();

    // Chunks 0..3 hold two samples, the rest one.
    let per_chunk = |chunk: u32| if chunk < 3 { 2 } else { 1 };
    for sample in 0..CLIP_SAMPLES as u32 {
        let position = video.sample_to_chunk(sample).unwrap();
        assert!(position.offset_within_chunk < per_chunk(position.chunk_index));
        let before: u32 = (0..position.chunk_index).map(per_chunk).sum();
        assert_eq!(before + position.offset_within_chunk, sample);
    }
}

#[test]
fn test_offsets_stay_inside_the_file() {
    let bytes = sample_clip();
    let file_len = bytes.len() as u64;
    let container = parse(bytes).unwrap();

    for track in container.tracks().values() {
        for sample in 0..track.sample_count().unwrap() {
            let end = track.sample_to_offset(sample).unwrap() + track.sample_to_size(sample, 1).unwrap();
            assert!(end <= file_len);
        }
    }
}

#[test]
fn test_time_mapping_matches_duration() {
    let paranoid = ParseOptions {
        paranoid: true,
        strict_reserved: true,
    };
    let container = Container::parse(sample_clip(), paranoid).unwrap();
    let video = container.track(1).unwrap();

    assert_eq!(video.total_time().unwrap(), CLIP_SAMPLES as u64 * 40);
    assert_eq!(video.time_to_sample(0).unwrap(), 0);
    let mut last = 0;
    for time in (0..video.total_time().unwrap()).step_by(7) {
        let sample = video.time_to_sample(time).unwrap();
        assert!(sample >= last);
        last = sample;
    }
    assert_eq!(last, CLIP_SAMPLES as u32 - 1);
}

#[test]
fn test_interleaved_trace() {
    let container = parse(sample_clip()).unwrap();
    let entries = trace_samples(&container, &[1, 2], 1000).unwrap();

    assert_eq!(entries.len(), CLIP_SAMPLES as usize + 6);
    assert!(entries.windows(2).all(|w| w[0].offset < w[1].offset));
    let order: Vec<u32> = entries.iter().take(5).map(|e| e.track_id).collect();
    assert_eq!(order, vec![1, 1, 2, 1, 1]);
}

#[test]
fn test_failure_names_box_and_offset() {
    let mut avcc = write_avcc(&[&[0x67]], &[&[0x68]]);
    // Two-byte NAL length prefixes.
    avcc[12] = 0xFD;
    let stsd = write_stsd(&[write_avc1(320, 240, &[avcc])]);
    let file = [
        write_ftyp(),
        write_container_box(b"moov", &[write_container_box(b"stbl", &[stsd])]),
    ]
    .concat();

    let err = parse(file).unwrap_err();
    let avcc_offset = 24 + 8 + 8 + (8 + 8) + (8 + 78);
    assert_matches!(
        &err,
        Error::InBox { box_type, offset, .. } if *box_type == FourCc::AVCC && *offset == avcc_offset
    );
    assert_matches!(err.root_cause(), Error::Unsupported(_));
    assert!(err.to_string().contains("avcC"));
}

#[test]
fn test_truncated_file_fails() {
    let mut bytes = sample_clip();
    bytes.truncate(bytes.len() - 10);
    assert!(parse(bytes).is_err());
}

#[test]
fn test_trailing_zero_padding_is_ignored() {
    let mut bytes = sample_clip();
    bytes.extend_from_slice(&[0; 16]);
    let container = parse(bytes).unwrap();
    assert_eq!(container.tracks().len(), 2);
}
