#![no_main]
use escapement_core::{decode_record, encode_record};
use libfuzzer_sys::fuzz_target;

fuzz_target!(|data: &[u8]| {
    // Arbitrary blobs either fail to decode or yield a record that survives
    // another save/load cycle.
    if let Ok(record) = decode_record(data, None) {
        let again = encode_record(&record).expect("decoded record encodes");
        let back = decode_record(&again, Some(record.buckets.len())).expect("re-encoded record decodes");
        assert_eq!(back.clock_bias, record.clock_bias);
        assert_eq!(back.manual_adjust, record.manual_adjust);
        assert_eq!(back.confirmed_count(), record.confirmed_count());
    }
});
