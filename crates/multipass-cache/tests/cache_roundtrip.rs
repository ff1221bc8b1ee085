//! End-to-end cache lifecycle tests: write a cache file, read it back,
//! rewind for another pass, with and without gzip endpoints.

use bytes::Bytes;
use multipass_cache::{
    BlobLabelCodec, CacheCompression, CacheConfig, Error, ExampleReader, ExampleWriter,
};
use multipass_core::{Example, Feature, Namespace};
use tempfile::TempDir;

const MASK_24BIT: u64 = (1 << 24) - 1;

fn sample_examples(count: u64) -> Vec<Example> {
    (0..count)
        .map(|i| {
            let mut ex = Example::new();
            ex.label = Bytes::from(i.to_le_bytes().to_vec());
            ex.tag = if i % 3 == 0 {
                Bytes::from(format!("tag-{i}"))
            } else {
                Bytes::new()
            };
            ex.newline = i % 10 == 9;
            ex.namespaces.push(Namespace::with_features(
                b'a',
                (0..5)
                    .map(|j| Feature::new((i * 31 + j * 7) & MASK_24BIT, 1.0))
                    .collect(),
            ));
            ex.namespaces.push(Namespace::with_features(
                b'b',
                vec![
                    Feature::new(i & MASK_24BIT, -1.0),
                    Feature::new((i + 1000) & MASK_24BIT, (i as f32) * 0.125),
                ],
            ));
            ex
        })
        .collect()
}

fn write_cache(path: &std::path::Path, config: &CacheConfig, examples: &[Example]) -> u32 {
    let mut writer = ExampleWriter::create(path, config, BlobLabelCodec, MASK_24BIT).unwrap();
    for ex in examples {
        writer.write_example(ex).unwrap();
    }
    assert_eq!(writer.examples_written(), examples.len() as u64);
    writer.flush().unwrap();
    let flushed_sum = writer.checksum();
    let final_sum = writer.close().unwrap();
    assert_eq!(final_sum, flushed_sum, "close flushes nothing new here");
    final_sum
}

// ---------------------------------------------------------------
// Plain file round trip
// ---------------------------------------------------------------

#[test]
fn file_cache_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("examples.cache");
    let config = CacheConfig::default();

    let originals = sample_examples(50);
    write_cache(&path, &config, &originals);

    let mut reader = ExampleReader::open(&path, &config, BlobLabelCodec).unwrap();
    let mut ex = Example::new();
    for (i, original) in originals.iter().enumerate() {
        assert!(reader.read_example(&mut ex).unwrap(), "example {i}");
        assert_eq!(ex.label, original.label, "label of example {i}");
        assert_eq!(ex.tag, original.tag, "tag of example {i}");
        assert_eq!(ex.newline, original.newline, "newline of example {i}");
        assert_eq!(ex.namespaces, original.namespaces, "namespaces of {i}");
    }
    assert!(!reader.read_example(&mut ex).unwrap(), "clean end of cache");
    assert_eq!(reader.examples_read(), 50);
}

#[test]
fn second_pass_via_rewind() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("examples.cache");
    let config = CacheConfig::default();

    let originals = sample_examples(20);
    write_cache(&path, &config, &originals);

    let mut reader = ExampleReader::open(&path, &config, BlobLabelCodec).unwrap();
    assert!(reader.supports_rewind());

    let mut ex = Example::new();
    for pass in 0..3 {
        if pass > 0 {
            reader.rewind().unwrap();
        }
        for (i, original) in originals.iter().enumerate() {
            assert!(
                reader.read_example(&mut ex).unwrap(),
                "pass {pass} example {i}"
            );
            assert_eq!(ex.namespaces, original.namespaces, "pass {pass} ex {i}");
        }
        assert!(!reader.read_example(&mut ex).unwrap());
        assert_eq!(reader.examples_read(), 20);
    }
}

// ---------------------------------------------------------------
// Gzip endpoints
// ---------------------------------------------------------------

#[test]
fn gzip_cache_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("examples.cache.gz");
    let config = CacheConfig {
        compression: CacheCompression::Gzip,
        ..Default::default()
    };

    let originals = sample_examples(50);
    write_cache(&path, &config, &originals);

    let mut reader = ExampleReader::open(&path, &config, BlobLabelCodec).unwrap();
    let mut ex = Example::new();
    for original in &originals {
        assert!(reader.read_example(&mut ex).unwrap());
        assert_eq!(ex.namespaces, original.namespaces);
    }
    assert!(!reader.read_example(&mut ex).unwrap());

    // Gzip endpoints rewind by reopening the underlying file
    reader.rewind().unwrap();
    assert!(reader.read_example(&mut ex).unwrap());
    assert_eq!(ex.namespaces, originals[0].namespaces);
}

// ---------------------------------------------------------------
// Checksum agreement between writer and reader
// ---------------------------------------------------------------

#[test]
fn checksum_agrees_across_write_and_read() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("examples.cache");
    let config = CacheConfig {
        verify_checksum: true,
        ..Default::default()
    };

    let originals = sample_examples(30);
    let written_sum = write_cache(&path, &config, &originals);
    assert_ne!(written_sum, 0);

    let mut reader = ExampleReader::open(&path, &config, BlobLabelCodec).unwrap();
    let mut ex = Example::new();
    while reader.read_example(&mut ex).unwrap() {}
    assert_eq!(reader.checksum(), written_sum);
}

#[test]
fn checksum_differs_for_different_content() {
    let dir = TempDir::new().unwrap();
    let config = CacheConfig {
        verify_checksum: true,
        ..Default::default()
    };

    let sum_a = write_cache(
        &dir.path().join("a.cache"),
        &config,
        &sample_examples(10),
    );
    let sum_b = write_cache(
        &dir.path().join("b.cache"),
        &config,
        &sample_examples(11),
    );
    assert_ne!(sum_a, sum_b);
}

// ---------------------------------------------------------------
// Small arena: records much larger than the buffer capacity
// ---------------------------------------------------------------

#[test]
fn records_larger_than_buffer_capacity() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("examples.cache");
    let config = CacheConfig {
        buffer_capacity: 64,
        ..Default::default()
    };

    let mut big = Example::new();
    big.tag = Bytes::from(vec![b't'; 500]);
    big.namespaces.push(Namespace::with_features(
        0,
        (0..300).map(|j| Feature::new(j * 3, 0.5 + j as f32)).collect(),
    ));

    let mut writer = ExampleWriter::create(&path, &config, BlobLabelCodec, u64::MAX).unwrap();
    writer.write_example(&big).unwrap();
    writer.write_example(&big).unwrap();
    writer.close().unwrap();

    let mut reader = ExampleReader::open(&path, &config, BlobLabelCodec).unwrap();
    let mut ex = Example::new();
    for _ in 0..2 {
        assert!(reader.read_example(&mut ex).unwrap());
        assert_eq!(ex.tag, big.tag);
        assert_eq!(ex.namespaces, big.namespaces);
    }
    assert!(!reader.read_example(&mut ex).unwrap());
}

// ---------------------------------------------------------------
// Corruption on disk
// ---------------------------------------------------------------

#[test]
fn truncated_file_mid_record_errors() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("examples.cache");
    let config = CacheConfig::default();

    write_cache(&path, &config, &sample_examples(5));

    // Chop the tail off the file, landing inside the final record
    let full_len = std::fs::metadata(&path).unwrap().len();
    let file = std::fs::OpenOptions::new().write(true).open(&path).unwrap();
    file.set_len(full_len - 3).unwrap();

    let mut reader = ExampleReader::open(&path, &config, BlobLabelCodec).unwrap();
    let mut ex = Example::new();
    let mut outcome = Ok(true);
    while matches!(outcome, Ok(true)) {
        outcome = reader.read_example(&mut ex);
    }
    assert!(
        matches!(outcome, Err(Error::CacheTruncated(_))),
        "cut mid-record must surface as truncation, got {outcome:?}"
    );
}

#[test]
fn file_of_wrong_format_is_rejected_at_open() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("not-a-cache.bin");
    std::fs::write(&path, b"these are not cache bytes").unwrap();

    let err = ExampleReader::open(&path, &CacheConfig::default(), BlobLabelCodec).unwrap_err();
    assert!(matches!(err, Error::SignatureMismatch(_)));
}
