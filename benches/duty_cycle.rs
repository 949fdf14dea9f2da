use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use std::hint::black_box;
use std::time::{Duration, Instant};

use reflex::prelude::*;

fn build_agent(publications: usize) -> BaseAgent<MemTransport> {
    let mut transport = MemTransport::with_ring_frames(1024);
    let mut cfg = AgentConfig::for_agent("bench", 1);
    cfg.pub_data.push(EndpointConfig::new("mem:bench-data", 1));
    cfg.heartbeat_period_ns = 1_000_000;

    let mut agent = BaseAgent::new(cfg, transport.clone()).unwrap();
    agent.set_clock(CachedClock::manual(0));

    for i in 0..publications {
        let name = format!("P{i}");
        agent
            .define_property(&name, Value::Int(0), Access::READ_WRITE)
            .unwrap();
        agent
            .register_publication(
                &name,
                1,
                PublishStrategy::Periodic {
                    interval_ns: 100_000,
                },
            )
            .unwrap();
    }

    agent.on_start().unwrap();
    agent.dispatch_named(sym::PLAY);

    // keep the data ring drained by a no-op consumer inside the loop
    let mut sink = transport.add_subscription("mem:bench-data", 1).unwrap();
    agent
        .register_poller(
            "drain_bench_data",
            1_000,
            poller_fn(move |_: &mut BaseAgent<MemTransport>| sink.poll(&mut |_, _| {}, 64)),
        )
        .unwrap();
    agent
}

fn run_cycles(agent: &mut BaseAgent<MemTransport>, cycles: u64) -> Duration {
    let start = Instant::now();
    for _ in 0..cycles {
        agent.clock_mut().advance(10_000);
        black_box(agent.do_work());
    }
    start.elapsed()
}

pub fn bench_duty_cycle(c: &mut Criterion) {
    let mut group = c.benchmark_group("agent_duty_cycle");

    for &publications in &[0usize, 8, 64] {
        group.bench_function(BenchmarkId::from_parameter(publications), |b| {
            b.iter_custom(|iters| {
                let mut agent = build_agent(publications);
                // warm pass so steady state is what gets measured
                run_cycles(&mut agent, 1_000);
                let elapsed = run_cycles(&mut agent, iters);
                agent.on_close();
                elapsed
            });
        });
    }

    group.finish();
}

criterion_group! {
    name = benches;
    config = Criterion::default()
        .warm_up_time(Duration::from_millis(500))
        .measurement_time(Duration::from_secs(3))
        .sample_size(20);
    targets = bench_duty_cycle
}
criterion_main!(benches);
