use std::hint::black_box;
use bencher::{TestCase, TestFile};
use criterion::{criterion_group, criterion_main, BatchSize, BenchmarkId, Criterion, Throughput};
use micro_sip::codec::MessageDecoder;
use micro_sip::protocol::SipMessage;
use tokio_util::bytes::BytesMut;
use tokio_util::codec::Decoder;

static INVITE: TestFile = TestFile::new("invite.txt", include_str!("../resources/message/invite.txt"));
static LARGE_REGISTER: TestFile = TestFile::new("register_large.txt", include_str!("../resources/message/register_large.txt"));

fn create_test_cases() -> Vec<TestCase> {
    vec![TestCase::new("invite", INVITE), TestCase::new("large_register", LARGE_REGISTER)]
}

fn benchmark_datagram_parse(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("datagram_parse");

    for case in create_test_cases() {
        let wire = case.file().wire();
        group.throughput(Throughput::Bytes(wire.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(case.name()), &wire, |b, wire| {
            b.iter(|| {
                let message = SipMessage::parse(wire.clone(), true).expect("input should be valid sip message");
                black_box(message);
            });
        });
    }

    group.finish();
}

fn benchmark_stream_decoder(criterion: &mut Criterion) {
    let mut group = criterion.benchmark_group("stream_decoder");

    for case in create_test_cases() {
        let wire = case.file().wire();
        group.throughput(Throughput::Bytes(wire.len() as u64));
        group.bench_with_input(BenchmarkId::from_parameter(case.name()), &wire, |b, wire| {
            let mut decoder = MessageDecoder::new();
            b.iter_batched_ref(
                || BytesMut::from(&wire[..]),
                |bytes_mut| {
                    let message = decoder.decode(bytes_mut).expect("input should be valid sip message").unwrap();
                    black_box(message);
                },
                BatchSize::SmallInput,
            );
        });
    }

    group.finish();
}

criterion_group!(decoder, benchmark_datagram_parse, benchmark_stream_decoder);
criterion_main!(decoder);
