use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use radius_codec::auth::{decrypt_user_password, encrypt_user_password, generate_request_authenticator};
use radius_codec::{AuthPacket, Dictionary, IdAllocator, MemoryDictionary, Packet};
use std::sync::Arc;

const SECRET: &[u8] = b"testing123";

fn dictionary() -> Arc<dyn Dictionary> {
    Arc::new(MemoryDictionary::rfc2865())
}

fn create_test_packet(dict: &Arc<dyn Dictionary>, num_attributes: usize) -> AuthPacket {
    let mut packet = AuthPacket::new(SECRET, Arc::clone(dict));
    packet
        .add_attribute("User-Name", "testuser")
        .expect("Failed to add User-Name");
    packet.set_user_password(b"testpassword");
    packet
        .add_attribute("Service-Type", "Framed-User")
        .expect("Failed to add Service-Type");

    // Add additional attributes to test scaling
    for i in 0..num_attributes {
        packet
            .add_attribute("Reply-Message", format!("attribute_{}", i))
            .expect("Failed to add Reply-Message");
    }

    packet
}

fn bench_packet_encode(c: &mut Criterion) {
    let mut group = c.benchmark_group("packet_encode");
    let dict = dictionary();
    let ids = IdAllocator::new(0);

    for num_attrs in [0, 5, 10, 20].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(num_attrs),
            num_attrs,
            |b, &num_attrs| {
                let mut packet = create_test_packet(&dict, num_attrs);
                b.iter(|| packet.encode_request(&ids).expect("Failed to encode packet"));
            },
        );
    }

    group.finish();
}

fn bench_packet_decode(c: &mut Criterion) {
    let mut group = c.benchmark_group("packet_decode");
    let dict = dictionary();
    let ids = IdAllocator::new(0);

    for num_attrs in [0, 5, 10, 20].iter() {
        group.bench_with_input(
            BenchmarkId::from_parameter(num_attrs),
            num_attrs,
            |b, &num_attrs| {
                let encoded = create_test_packet(&dict, num_attrs)
                    .encode_request(&ids)
                    .expect("Failed to encode");
                b.iter(|| {
                    Packet::decode(black_box(&encoded), SECRET, Arc::clone(&dict))
                        .expect("Failed to decode packet")
                });
            },
        );
    }

    group.finish();
}

fn bench_password_hiding(c: &mut Criterion) {
    let mut group = c.benchmark_group("password_hiding");

    let passwords = vec![
        ("short", "test"),
        ("medium", "testpassword123"),
        ("long", "this_is_a_very_long_password_to_test_performance"),
    ];

    for (name, password) in passwords.iter() {
        let req_auth = generate_request_authenticator();
        group.bench_with_input(BenchmarkId::new("encrypt", name), password, |b, &password| {
            b.iter(|| {
                encrypt_user_password(black_box(password.as_bytes()), black_box(SECRET), black_box(&req_auth))
            });
        });

        let encrypted = encrypt_user_password(password.as_bytes(), SECRET, &req_auth);
        group.bench_with_input(BenchmarkId::new("decrypt", name), &encrypted, |b, encrypted| {
            b.iter(|| {
                decrypt_user_password(black_box(encrypted), black_box(SECRET), black_box(&req_auth))
                    .expect("Failed to decrypt password")
            });
        });
    }

    group.finish();
}

fn bench_full_request_cycle(c: &mut Criterion) {
    let dict = dictionary();
    let ids = IdAllocator::new(0);

    c.bench_function("full_request_reply_cycle", |b| {
        b.iter(|| {
            let mut request = create_test_packet(&dict, 0);
            let encoded = request.encode_request(&ids).expect("Failed to encode");

            let mut received =
                AuthPacket::decode(&encoded, SECRET, Arc::clone(&dict)).expect("Failed to decode");
            received.decrypt_attributes().expect("Failed to decrypt");
            let reply = received.create_reply().encode_reply().expect("Failed to encode reply");

            let answer = Packet::decode(&reply, SECRET, Arc::clone(&dict)).expect("Failed to decode reply");
            black_box(request.verify_reply(&answer, Some(&reply)))
        });
    });
}

criterion_group!(
    benches,
    bench_packet_encode,
    bench_packet_decode,
    bench_password_hiding,
    bench_full_request_cycle
);
criterion_main!(benches);
