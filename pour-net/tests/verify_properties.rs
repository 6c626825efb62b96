// pour-net/tests/verify_properties.rs
use pour_common::{Checksum, FormulaRecord, HashAlgorithm, InstallDirective};
use pour_net::verify;
use proptest::prelude::*;

fn record_with(checksum: Checksum) -> FormulaRecord {
    FormulaRecord::new(
        "instaunit",
        "https://github.com/instaunit/instaunit",
        "https://github.com/instaunit/instaunit/releases/download/1.1/instaunit-1.1-darwin-amd64.tgz",
        checksum,
        None,
        InstallDirective::direct_copy("bin/instaunit", None).unwrap(),
    )
    .unwrap()
}

fn algorithm() -> impl Strategy<Value = HashAlgorithm> {
    prop_oneof![Just(HashAlgorithm::Sha256), Just(HashAlgorithm::Sha512)]
}

proptest! {
    #[test]
    fn declared_bytes_always_verify(
        bytes in proptest::collection::vec(any::<u8>(), 0..1024),
        algorithm in algorithm(),
    ) {
        let record = record_with(Checksum::of_bytes(algorithm, &bytes));
        prop_assert!(verify(&record, &bytes).is_ok());
    }

    #[test]
    fn digest_case_does_not_matter(
        bytes in proptest::collection::vec(any::<u8>(), 0..256),
        algorithm in algorithm(),
    ) {
        let upper = algorithm.digest(&bytes).to_uppercase();
        let record = record_with(Checksum::new(algorithm, &upper).unwrap());
        prop_assert!(verify(&record, &bytes).is_ok());
    }

    #[test]
    fn any_single_byte_change_is_caught(
        bytes in proptest::collection::vec(any::<u8>(), 1..1024),
        index in any::<prop::sample::Index>(),
        delta in 1u8..=255,
        algorithm in algorithm(),
    ) {
        let record = record_with(Checksum::of_bytes(algorithm, &bytes));
        let mut corrupted = bytes.clone();
        let i = index.index(corrupted.len());
        corrupted[i] ^= delta;

        let err = verify(&record, &corrupted).unwrap_err();
        prop_assert_eq!(err.expected.as_str(), record.checksum().digest());
        prop_assert_eq!(err.actual, algorithm.digest(&corrupted));
    }
}
