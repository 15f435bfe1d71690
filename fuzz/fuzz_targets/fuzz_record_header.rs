#![no_main]
use libfuzzer_sys::fuzz_target;
use tlsrec_record::{Alert, RecordHeader, RecordLayer};
use tlsrec_types::{MAXIMUM_CIPHERTEXT_EXPANSION, MAXIMUM_FRAGMENT_LENGTH};

fuzz_target!(|data: &[u8]| {
    let _ = RecordHeader::parse(data, MAXIMUM_FRAGMENT_LENGTH + MAXIMUM_CIPHERTEXT_EXPANSION);
    let _ = Alert::decode(data);

    let layer = RecordLayer::default();
    if let Ok((record, consumed)) = layer.parse_record(data) {
        assert!(consumed <= data.len());
        let bytes = layer.serialize_record(&record).unwrap();
        assert_eq!(&bytes[..], &data[..consumed]);
    }
});
