//! Stream reader tests against sequences written to disk.

use std::path::Path;

use vol_format::header::ComponentFlags;
use vol_format::writer::{write_single_file, write_vologram};
use vol_format::{
    decode, DecodedFrame, Error, FrameBuilder, KeyframeKind, ReadMode, StreamHeader,
    StreamReader, VologramPaths,
};

fn quad(z: f32) -> Vec<[f32; 3]> {
    vec![[0.0, 0.0, z], [1.0, 0.0, z], [1.0, 1.0, z], [0.0, 1.0, z]]
}

fn frames(count: u32, keyframes: &[u32]) -> Vec<FrameBuilder> {
    (0..count)
        .map(|i| {
            if keyframes.contains(&i) {
                FrameBuilder::keyframe(
                    quad(i as f32),
                    vec![0, 1, 2, 0, 2, 3],
                    vec![[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 1.0]],
                )
            } else {
                FrameBuilder::tracked(quad(i as f32))
            }
        })
        .collect()
}

fn write(dir: &Path, version: u32, count: u32, keyframes: &[u32]) -> VologramPaths {
    write_vologram(dir, &StreamHeader::new(version, 0), None, &frames(count, keyframes)).unwrap()
}

fn open(paths: &VologramPaths, mode: ReadMode) -> StreamReader {
    StreamReader::open(&paths.header, &paths.sequence, mode).unwrap()
}

#[test]
fn test_open_builds_index() {
    let dir = tempfile::tempdir().unwrap();
    let paths = write(dir.path(), 12, 10, &[0, 5]);
    let reader = open(&paths, ReadMode::Streaming);

    assert_eq!(reader.frame_count(), 10);
    assert_eq!(reader.frame_index().len(), 10);
    assert_eq!(reader.frame_index().keyframes(), &[0, 5]);
    assert_eq!(reader.frame_index().nearest_keyframe(7), Some(5));
    assert_eq!(reader.next_frame_index(), 0);
    assert!(reader.audio().is_none());
}

#[test]
fn test_sequential_and_random_reads_agree() {
    for mode in [ReadMode::Streaming, ReadMode::Preloaded] {
        let dir = tempfile::tempdir().unwrap();
        let paths = write(dir.path(), 12, 6, &[0, 3]);
        let mut reader = open(&paths, mode);

        let sequential: Vec<_> = (0..6).map(|_| reader.read_next_frame().unwrap()).collect();
        assert_eq!(reader.next_frame_index(), 6);

        for i in [4u32, 0, 5, 3] {
            let block = reader.read_frame(i).unwrap();
            assert_eq!(block, sequential[i as usize]);
            assert_eq!(reader.next_frame_index(), i + 1);
        }
    }
}

#[test]
fn test_read_past_end_is_out_of_range() {
    let dir = tempfile::tempdir().unwrap();
    let paths = write(dir.path(), 12, 3, &[0]);
    let mut reader = open(&paths, ReadMode::Streaming);

    assert!(matches!(
        reader.read_frame(3),
        Err(Error::FrameOutOfRange {
            frame: 3,
            frame_count: 3
        })
    ));
    reader.seek(2).unwrap();
    reader.read_next_frame().unwrap();
    assert!(matches!(
        reader.read_next_frame(),
        Err(Error::FrameOutOfRange { .. })
    ));
}

#[test]
fn test_close_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    let paths = write(dir.path(), 12, 3, &[0]);
    let mut reader = open(&paths, ReadMode::Preloaded);

    reader.close();
    reader.close();
    assert!(!reader.is_open());
    assert!(matches!(reader.read_frame(0), Err(Error::Closed)));
}

#[test]
fn test_decode_sequence_carries_topology() {
    let dir = tempfile::tempdir().unwrap();
    let paths = write(dir.path(), 10, 4, &[0]);
    let mut reader = open(&paths, ReadMode::Streaming);

    let mut prev: Option<DecodedFrame> = None;
    for i in 0..4 {
        let block = reader.read_next_frame().unwrap();
        let frame = decode(&block, prev.as_ref()).unwrap();
        assert_eq!(frame.positions[0], [0.0, 0.0, i as f32]);
        assert_eq!(&*frame.indices, &[0, 1, 2, 0, 2, 3]);
        prev = Some(frame);
    }
}

#[test]
fn test_v11_normals_and_texture() {
    let dir = tempfile::tempdir().unwrap();
    let mut header = StreamHeader::new(11, 0);
    header.components |= ComponentFlags::NORMALS | ComponentFlags::TEXTURE;
    let normals = vec![[0.0, 0.0, 1.0]; 4];
    let frames = vec![
        FrameBuilder::keyframe(quad(0.0), vec![0, 1, 2], vec![[0.0, 0.0]; 4])
            .with_normals(normals.clone())
            .with_texture(vec![7; 16]),
        FrameBuilder::tracked(quad(1.0)).with_normals(normals.clone()),
    ];
    let paths = write_vologram(dir.path(), &header, None, &frames).unwrap();
    let mut reader = open(&paths, ReadMode::Streaming);
    assert!(reader.header().has_normals());

    let key = decode(&reader.read_frame(0).unwrap(), None).unwrap();
    assert_eq!(key.normals.as_deref(), Some(&normals[..]));
    assert_eq!(key.texture.as_deref(), Some(&[7u8; 16][..]));

    // Tracked frame writes an empty texture section; the keyframe's texture is kept
    let tracked = decode(&reader.read_frame(1).unwrap(), Some(&key)).unwrap();
    assert_eq!(tracked.texture, key.texture);
    assert_eq!(tracked.positions[0], [0.0, 0.0, 1.0]);
}

#[test]
fn test_last_tracked_frame_carries_topology() {
    let dir = tempfile::tempdir().unwrap();
    let mut all = frames(3, &[0]);
    all[2] = FrameBuilder::keyframe(quad(2.0), vec![3, 2, 1], vec![[0.0, 0.0]; 4])
        .with_kind(KeyframeKind::LastTracked);
    let paths = write_vologram(dir.path(), &StreamHeader::new(12, 0), None, &all).unwrap();
    let mut reader = open(&paths, ReadMode::Streaming);

    assert!(reader.frame_index().is_keyframe(2));
    let block = reader.read_frame(2).unwrap();
    assert_eq!(block.kind, KeyframeKind::LastTracked);
    let frame = decode(&block, None).unwrap();
    assert_eq!(&*frame.indices, &[3, 2, 1]);
}

#[test]
fn test_first_frame_must_be_keyframe() {
    let dir = tempfile::tempdir().unwrap();
    let paths = write(dir.path(), 12, 3, &[1]);
    let err = StreamReader::open(&paths.header, &paths.sequence, ReadMode::Streaming).unwrap_err();
    assert!(matches!(err, Error::OpenFailed(ref msg) if msg.contains("frame 0")));
}

#[test]
fn test_truncated_sequence_fails_open() {
    let dir = tempfile::tempdir().unwrap();
    let paths = write(dir.path(), 12, 3, &[0]);
    let bytes = std::fs::read(&paths.sequence).unwrap();
    std::fs::write(&paths.sequence, &bytes[..bytes.len() - 10]).unwrap();

    let err = StreamReader::open(&paths.header, &paths.sequence, ReadMode::Streaming).unwrap_err();
    assert!(matches!(err, Error::OpenFailed(_)));
}

#[test]
fn test_misnumbered_frame_fails_open() {
    let dir = tempfile::tempdir().unwrap();
    let paths = write(dir.path(), 12, 2, &[0]);
    let mut bytes = std::fs::read(&paths.sequence).unwrap();
    bytes[0] = 9;
    std::fs::write(&paths.sequence, &bytes).unwrap();

    let err = StreamReader::open(&paths.header, &paths.sequence, ReadMode::Preloaded).unwrap_err();
    assert!(err.to_string().contains("frame_number was 9"));
}

#[test]
fn test_missing_sequence_file() {
    let dir = tempfile::tempdir().unwrap();
    let paths = write(dir.path(), 12, 2, &[0]);
    std::fs::remove_file(&paths.sequence).unwrap();
    assert!(matches!(
        StreamReader::open(&paths.header, &paths.sequence, ReadMode::Streaming),
        Err(Error::OpenFailed(_))
    ));
}

#[test]
fn test_single_file_with_audio() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clip.vols");
    let mut header = StreamHeader::new(13, 0);
    header.fps = 24.0;
    let audio = b"RIFF-audio-bytes".to_vec();
    write_single_file(&path, &header, Some(&audio), &frames(4, &[0, 2])).unwrap();

    for mode in [ReadMode::Streaming, ReadMode::Preloaded] {
        let mut reader = StreamReader::open_single(&path, mode).unwrap();
        assert_eq!(reader.header().fps, 24.0);
        assert_eq!(reader.audio(), Some(&audio[..]));
        assert_eq!(reader.frame_index().keyframes(), &[0, 2]);

        let block = reader.read_frame(3).unwrap();
        assert_eq!(block.frame_index, 3);
        assert!(!block.is_keyframe());
    }
}

#[test]
fn test_single_file_rejects_legacy_header() {
    let dir = tempfile::tempdir().unwrap();
    let paths = write(dir.path(), 12, 2, &[0]);
    assert!(matches!(
        StreamReader::open_single(&paths.header, ReadMode::Streaming),
        Err(Error::OpenFailed(_))
    ));
}

#[test]
fn test_split_v13_reads_audio_from_header() {
    let dir = tempfile::tempdir().unwrap();
    let paths = write_vologram(dir.path(), &StreamHeader::new(13, 0), Some(&[1, 2, 3]), &frames(2, &[0]))
        .unwrap();
    let reader = open(&paths, ReadMode::Streaming);
    assert_eq!(reader.audio(), Some(&[1u8, 2, 3][..]));
}

#[test]
fn test_oversized_audio_chunk_fails_open() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("clip.vols");
    write_single_file(&path, &StreamHeader::new(13, 0), Some(&b"pcm"[..]), &frames(2, &[0])).unwrap();

    // Audio size word sits right after the fixed header
    let mut bytes = std::fs::read(&path).unwrap();
    bytes[44..48].copy_from_slice(&u32::MAX.to_le_bytes());
    std::fs::write(&path, &bytes).unwrap();

    for mode in [ReadMode::Streaming, ReadMode::Preloaded] {
        assert!(matches!(
            StreamReader::open_single(&path, mode),
            Err(Error::OpenFailed(_))
        ));
    }
}
