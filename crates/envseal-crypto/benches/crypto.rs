use envseal_crypto::{
    decrypt, encrypt, generate_key, EnvelopeBuilder, KeyProtection, OsEntropy, PlaintextFile,
};

const RSA2048_PUB: &str = include_str!("../tests/fixtures/rsa2048.pub.pem");

fn make_data(size: usize) -> Vec<u8> {
    (0..size)
        .map(|i| (i.wrapping_mul(7) ^ (i >> 3)) as u8)
        .collect()
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_encrypt(bencher: divan::Bencher, size: usize) {
    let key = generate_key(&OsEntropy).unwrap();
    let data = make_data(size);
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| encrypt(&OsEntropy, divan::black_box(&key), divan::black_box(&data)).unwrap());
}

#[divan::bench(args = [1024, 65536, 1048576])]
fn bench_decrypt(bencher: divan::Bencher, size: usize) {
    let key = generate_key(&OsEntropy).unwrap();
    let data = make_data(size);
    let sealed = encrypt(&OsEntropy, &key, &data).unwrap();
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .bench(|| {
            decrypt(
                divan::black_box(&key),
                divan::black_box(&sealed.nonce),
                divan::black_box(&sealed.ciphertext),
            )
            .unwrap()
        });
}

#[divan::bench(args = [1024, 1048576])]
fn bench_build_wrapped_envelope(bencher: divan::Bencher, size: usize) {
    let builder = EnvelopeBuilder::new();
    let data = make_data(size);
    bencher
        .counter(divan::counter::BytesCount::new(size))
        .with_inputs(|| PlaintextFile::from_bytes(data.clone()))
        .bench_values(|file| {
            builder
                .build_envelope(file, None, KeyProtection::Recipient(RSA2048_PUB))
                .unwrap()
        });
}

fn main() {
    divan::main();
}
