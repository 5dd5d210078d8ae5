use std::time::{Duration, Instant};

use garry_pow::difficulty::work_hash;
use garry_pow::{
    AuxBindings, Blake3Hasher, CancelToken, ContentEntry, Difficulty, Entropy, HashKind, Miner,
    PowError, Sha256Hasher, WorkHasher, decode_list_response, sort_by_recency_descending, verify,
};

#[test]
fn hello_at_difficulty_one_with_fixed_seed() {
    let miner = Miner::new().entropy(Entropy::Seeded(*b"0123456789abcdef"));
    let sol = miner
        .solve(b"hello", &AuxBindings::None, Difficulty::new(1).unwrap(), &CancelToken::new())
        .unwrap();

    assert_eq!(sol.work_hash[0], 0x00);
    assert_eq!(sol.load_hash, Sha256Hasher.digest(&[b"hello".as_slice()]));
    assert_eq!(work_hash(&Sha256Hasher, &sol.load_hash, &sol.nonce), sol.work_hash);
}

#[test]
fn high_difficulty_is_cancelled_by_deadline() {
    let miner = Miner::new();
    let token = CancelToken::new().with_timeout(Duration::from_millis(100));
    let started = Instant::now();

    let res = miner.solve(b"hello", &AuxBindings::None, Difficulty::new(8).unwrap(), &token);

    assert!(matches!(res, Err(PowError::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(2), "took {:?}", started.elapsed());
}

#[test]
fn explicit_cancel_from_another_thread() {
    let miner = Miner::new().workers(2);
    let token = CancelToken::new();
    let canceller = token.clone();
    let handle = std::thread::spawn(move || {
        std::thread::sleep(Duration::from_millis(50));
        canceller.cancel();
    });

    let started = Instant::now();
    let res = miner.solve(b"x", &AuxBindings::None, Difficulty::new(8).unwrap(), &token);
    handle.join().unwrap();

    assert!(matches!(res, Err(PowError::Cancelled)));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[test]
fn blake3_miner_verifies_only_with_blake3() {
    let miner = Miner::with_hasher(Blake3Hasher).entropy(Entropy::Seeded([5; 16]));
    let d = Difficulty::new(1).unwrap();
    let sol = miner.solve(b"hello", &AuxBindings::tagged("t"), d, &CancelToken::new()).unwrap();

    assert!(verify(&Blake3Hasher, &sol.load_hash, &sol.nonce, &sol.work_hash, d));
    assert!(verify(&HashKind::Blake3, &sol.load_hash, &sol.nonce, &sol.work_hash, d));
    assert!(!verify(&Sha256Hasher, &sol.load_hash, &sol.nonce, &sol.work_hash, d));
}

#[test]
fn invalid_difficulty_never_reaches_the_miner() {
    assert!(matches!(Difficulty::new(33), Err(PowError::InvalidDifficulty(_))));
    assert!(matches!("-3".parse::<Difficulty>(), Err(PowError::InvalidDifficulty(_))));
    assert!(matches!("".parse::<Difficulty>(), Err(PowError::InvalidDifficulty(_))));
}

#[test]
fn equal_timestamps_keep_input_order() {
    let body = br#"[{"val":"a","added":5},{"val":"b","added":5},{"val":"c","added":9}]"#;
    let sorted = sort_by_recency_descending(decode_list_response(body).unwrap());
    let vals: Vec<&str> = sorted.iter().map(|e: &ContentEntry| e.val.as_str()).collect();
    assert_eq!(vals, ["c", "a", "b"]);
}

#[test]
fn not_json_is_malformed() {
    assert!(matches!(decode_list_response(b"{not json"), Err(PowError::MalformedResponse(_))));
}
