#![no_main]

use libfuzzer_sys::fuzz_target;
use syncwatch_client::SseDecoder;

// Whole-buffer and split decoding must agree, whatever the bytes.
fuzz_target!(|data: &[u8]| {
    let whole = SseDecoder::new().feed(data);

    let split_at = data.first().map_or(0, |b| *b as usize % (data.len() + 1));
    let mut decoder = SseDecoder::new();
    let mut split = decoder.feed(&data[..split_at]);
    split.extend(decoder.feed(&data[split_at..]));

    assert_eq!(whole, split);
});
