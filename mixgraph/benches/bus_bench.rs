//! Benchmarks for event bus throughput.

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use mixgraph::core::State;
use mixgraph::events::{Event, EventBus, EventKind, EventMask, Origin, PollEvents, Timeout};

fn filled_bus(n: u64) -> EventBus {
    let bus = EventBus::new();
    for i in 0..n {
        let origin = Origin::Stage(format!("stage{}", i % 6));
        if i % 2 == 0 {
            bus.post(Event::state_changed(origin, State::Idle, State::Paused, None));
        } else {
            bus.post(Event::warning(origin, "late frame", None));
        }
    }
    bus.post(Event::end_of_stream(Origin::Graph("bench".into())));
    bus
}

fn bus_benchmark(c: &mut Criterion) {
    c.bench_function("post_and_poll", |b| {
        let bus = EventBus::new();
        let mut monitor = bus.monitor();
        b.iter(|| {
            bus.post(Event::end_of_stream(Origin::Graph("bench".into())));
            black_box(monitor.poll(Timeout::Immediate, EventMask::ALL))
        });
    });

    c.bench_function("filtered_poll_1k", |b| {
        b.iter_batched(
            || filled_bus(1_000),
            |bus| {
                let mut monitor = bus.monitor();
                black_box(monitor.poll(Timeout::Immediate, EventKind::EndOfStream.into()))
            },
            BatchSize::SmallInput,
        );
    });
}

criterion_group!(benches, bus_benchmark);
criterion_main!(benches);
