#![no_main]

use libfuzzer_sys::fuzz_target;
use multipass_cache::{BlobLabelCodec, ByteSource, ExampleReader, MemorySource, StreamBuffer};
use multipass_core::varint::{decode_varint_u64, zigzag_decode};
use multipass_core::Example;

fuzz_target!(|data: &[u8]| {
    // Fuzz the untrusted decode surface. Arbitrary bytes must produce a
    // decoded example, a clean EOF, or an error - never a panic.

    // Varint + zigzag decoding
    if !data.is_empty() {
        let mut cursor = data;
        if let Ok(v) = decode_varint_u64(&mut cursor) {
            let _ = zigzag_decode(v);
        }
    }

    // Full record decoding over a memory endpoint
    let buf = StreamBuffer::for_reading(vec![
        Box::new(MemorySource::new(data.to_vec())) as Box<dyn ByteSource>
    ]);
    let mut reader = ExampleReader::new(buf, BlobLabelCodec);
    let mut example = Example::new();
    loop {
        match reader.read_example(&mut example) {
            Ok(true) => continue,
            Ok(false) | Err(_) => break,
        }
    }
});
