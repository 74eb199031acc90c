use bytes::Bytes;
use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use socketioxide_core::{
    PayloadValue, Sid,
    packet::{ConnectPacket, Packet},
    parser::{EncodedPacket, Parse},
};
use socketioxide_parser_common::CommonParser;

fn encode(packet: Packet) -> EncodedPacket {
    CommonParser.encode(black_box(packet))
}

fn data() -> Vec<PayloadValue> {
    vec![PayloadValue::from(serde_json::json!({ "foo": "bar", "arr": [1, 2, 3] }))]
}

fn bin_data() -> Vec<PayloadValue> {
    const BINARY: Bytes = Bytes::from_static(&[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]);
    vec![data().remove(0), BINARY.into()]
}

fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser_common/encode_packet");

    let connect = PayloadValue::from_serialize(&ConnectPacket { sid: Sid::new() }).unwrap();

    for ns in ["/", "/custom_nsp"] {
        group.bench_function(format!("Encode packet connect on {ns}"), |b| {
            b.iter_batched(
                || Packet::connect(ns, Some(connect.clone())),
                encode,
                BatchSize::SmallInput,
            )
        });

        group.bench_function(format!("Encode packet event on {ns}"), |b| {
            b.iter_batched(
                || Packet::event(ns, "event", data()),
                encode,
                BatchSize::SmallInput,
            )
        });

        group.bench_function(format!("Encode packet event with ack on {ns}"), |b| {
            b.iter_batched(
                || {
                    let mut packet = Packet::event(ns, "event", data());
                    packet.inner.set_ack_id(0);
                    packet
                },
                encode,
                BatchSize::SmallInput,
            )
        });

        group.bench_function(format!("Encode packet ack on {ns}"), |b| {
            b.iter_batched(
                || Packet::ack(ns, data(), 0),
                encode,
                BatchSize::SmallInput,
            )
        });

        group.bench_function(format!("Encode packet binary event on {ns}"), |b| {
            b.iter_batched(
                || Packet::event(ns, "event", bin_data()),
                encode,
                BatchSize::SmallInput,
            )
        });

        group.bench_function(format!("Encode packet binary ack on {ns}"), |b| {
            b.iter_batched(
                || Packet::ack(ns, bin_data(), 0),
                encode,
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
