use bytes::Bytes;
use criterion::{BatchSize, Criterion, black_box, criterion_group, criterion_main};
use socketioxide_core::{
    PayloadValue, Sid, Str,
    packet::{ConnectPacket, Packet},
    parser::{Parse, ParserState},
};
use socketioxide_parser_common::CommonParser;

fn encode(packet: Packet) -> Str {
    CommonParser.encode(packet).data
}
fn decode(value: Str) -> Option<Packet> {
    CommonParser
        .decode_str(&Default::default(), black_box(value))
        .ok()
}

fn data() -> Vec<PayloadValue> {
    vec![PayloadValue::from(serde_json::json!({ "foo": "bar", "arr": [1, 2, 3] }))]
}

fn criterion_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("parser_common/decode_packet");
    let connect = PayloadValue::from_serialize(&ConnectPacket { sid: Sid::new() }).unwrap();

    for ns in ["/", "/custom_nsp"] {
        group.bench_function(format!("Decode packet connect on {ns}"), |b| {
            b.iter_batched(
                || encode(Packet::connect(ns, Some(connect.clone()))),
                decode,
                BatchSize::SmallInput,
            )
        });

        group.bench_function(format!("Decode packet event on {ns}"), |b| {
            b.iter_batched(
                || encode(Packet::event(ns, "event", data())),
                decode,
                BatchSize::SmallInput,
            )
        });

        group.bench_function(format!("Decode packet ack on {ns}"), |b| {
            b.iter_batched(
                || encode(Packet::ack(ns, data(), 0)),
                decode,
                BatchSize::SmallInput,
            )
        });

        group.bench_function(format!("Decode packet binary event on {ns}"), |b| {
            b.iter_batched(
                || {
                    let mut args = data();
                    args.push(Bytes::from_static(&[0, 1, 2, 3, 4, 5, 6, 7, 8, 9]).into());
                    CommonParser.encode(Packet::event(ns, "event", args))
                },
                |encoded| {
                    let state = ParserState::default();
                    CommonParser.decode_str(&state, black_box(encoded.data)).ok();
                    for bin in encoded.attachments {
                        CommonParser.decode_bin(&state, black_box(bin)).ok();
                    }
                },
                BatchSize::SmallInput,
            )
        });
    }

    group.finish();
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
