#![no_main]
use libfuzzer_sys::fuzz_target;
use tlsrec_record::{CipherSuite, CipherSuiteParams, RecordLayer, TlsError, TrafficKeys};

const SUITES: [CipherSuite; 5] = [
    CipherSuite::TLS_RSA_WITH_RC4_128_SHA,
    CipherSuite::TLS_RSA_WITH_AES_128_CBC_SHA,
    CipherSuite::TLS_RSA_WITH_AES_256_CBC_SHA256,
    CipherSuite::TLS_RSA_WITH_AES_128_GCM_SHA256,
    CipherSuite::TLS_ECDHE_RSA_WITH_CHACHA20_POLY1305_SHA256,
];

fuzz_target!(|data: &[u8]| {
    let Some((&selector, record)) = data.split_first() else {
        return;
    };
    let suite = SUITES[selector as usize % SUITES.len()];
    let Ok(params) = CipherSuiteParams::from_suite(suite, false) else {
        return;
    };
    let keys = TrafficKeys::new(
        &vec![0x42; params.mac_key_len()],
        &vec![0x24; params.key_len()],
        &vec![0x18; params.fixed_iv_len()],
    );

    let mut layer = RecordLayer::default();
    if layer.activate_read_decryption(suite, &keys).is_err() {
        return;
    }
    match layer.open_record(record) {
        Ok((_, plaintext, consumed)) => {
            assert!(consumed <= record.len());
            assert!(plaintext.len() <= 16384);
            assert_eq!(layer.read_sequence_number(), 1);
        }
        Err(TlsError::CryptographicFailure | TlsError::RecordDecodeError(_)) => {
            assert_eq!(layer.read_sequence_number(), 0);
        }
        Err(e) => panic!("unexpected error: {e:?}"),
    }
});
