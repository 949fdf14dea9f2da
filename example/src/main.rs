//! Loopback demo: one agent driven entirely over its control stream.
//!
//! Control messages are seeded into the in-process transport before the
//! runner starts; the agent plays, publishes a periodic property, answers a
//! state request, and exits. Everything it published is then printed as
//! JSON lines.

use anyhow::Result;
use reflex::codec::{self, Header};
use reflex::prelude::*;
use reflex::transport::mem::MemSubscription;
use serde_json::json;

fn send_control(
    transport: &mut MemTransport,
    key: &str,
    value: Value,
    correlation_id: i64,
) -> Result<()> {
    let mut table = SymbolTable::new();
    let k = table.intern(key);
    let header = Header {
        timestamp_ns: reflex::clock::epoch_nanos(),
        correlation_id,
    };
    let mut buf = vec![0u8; codec::encoded_len("demo", k, &value, &table)];
    codec::encode_into(&mut buf, &header, "demo", k, &value, &table)?;

    let mut publication = transport.add_publication("mem:control", 1)?;
    anyhow::ensure!(
        publication.offer(&[&buf]) == OfferResult::Success,
        "control ring full"
    );
    Ok(())
}

fn value_json(value: &Value, table: &SymbolTable) -> serde_json::Value {
    match value {
        Value::Nothing => json!(null),
        Value::Int(v) => json!(v),
        Value::Float(v) => json!(v),
        Value::Bool(v) => json!(v),
        Value::Symbol(s) => json!(table.name(*s)),
        Value::Str(s) => json!(s),
        Value::Tuple(items) => {
            json!(items.iter().map(|v| value_json(v, table)).collect::<Vec<_>>())
        }
        Value::ArrayInt(v) => json!(v),
        Value::ArrayFloat(v) => json!(v),
        Value::TensorInt(t) => json!({ "dims": t.dims, "data": t.data }),
        Value::TensorFloat(t) => json!({ "dims": t.dims, "data": t.data }),
    }
}

fn print_stream(label: &str, sub: &mut MemSubscription) {
    let mut asm = FragmentAssembler::with_capacity(16 * 1024);
    let mut table = SymbolTable::new();
    loop {
        let polled = sub.poll(
            &mut |data, flags| {
                asm.on_frame(data, flags, &mut |msg| match codec::decode(msg, &mut table) {
                    Ok(m) => println!(
                        "{}",
                        json!({
                            "stream": label,
                            "key": table.name(m.key),
                            "value": value_json(&m.value, &table),
                            "timestamp_ns": m.timestamp_ns,
                            "correlation_id": m.correlation_id,
                        })
                    ),
                    Err(e) => tracing::warn!(error = %e, "undecodable message"),
                })
            },
            64,
        );
        if polled == 0 {
            break;
        }
    }
}

fn main() -> Result<()> {
    let _guard = LoggerConfig::from_env().init()?;

    let mut transport = MemTransport::new();
    let mut cfg = AgentConfig::for_agent("demo-agent", 42);
    cfg.pub_data.push(EndpointConfig::new("mem:data", 1));
    cfg.heartbeat_period_ns = 50_000_000; // 50 ms for a short demo

    let mut status_sub = transport.add_subscription("mem:status", 1)?;
    let mut data_sub = transport.add_subscription("mem:data", 1)?;

    let mut agent = BaseAgent::new(cfg, transport.clone())?;
    agent.define_property("Gain", Value::Float(1.0), Access::READ_WRITE)?;
    agent.define_property("Temperature", Value::Float(20.0), Access::READABLE)?;
    agent.register_publication(
        "Temperature",
        1,
        PublishStrategy::Periodic {
            interval_ns: 20_000_000,
        },
    )?;

    // a custom poller nudges the sensor so OnUpdate-style consumers see
    // fresh timestamps
    let mut tick = 0u64;
    agent.register_poller(
        "sensor_sim",
        40,
        poller_fn(move |a: &mut BaseAgent<MemTransport>| {
            tick += 1;
            if tick % 1_000 == 0 {
                let key = a.intern("Temperature");
                let reading = 20.0 + (tick as f64 / 1_000.0) * 0.25;
                if a.set_property(key, Value::Float(reading)).is_err() {
                    return 0;
                }
                return 1;
            }
            0
        }),
    )?;

    // script the whole session up front; the control adapter consumes one
    // message per cycle
    send_control(&mut transport, "Play", Value::Nothing, 1)?;
    send_control(&mut transport, "Gain", Value::Float(2.5), 2)?;
    send_control(&mut transport, "Gain", Value::Nothing, 3)?;
    send_control(&mut transport, "State", Value::Nothing, 4)?;
    send_control(&mut transport, "Properties", Value::Nothing, 5)?;

    // let it spin briefly, then ask it to exit
    let ticker = std::time::Instant::now();
    agent.register_poller(
        "demo_deadline",
        900,
        poller_fn(move |a: &mut BaseAgent<MemTransport>| {
            if ticker.elapsed().as_millis() > 200 {
                a.dispatch_named(sym::EXIT);
            }
            0
        }),
    )?;

    run(&mut agent, &RunnerConfig::default())?;

    print_stream("status", &mut status_sub);
    print_stream("data", &mut data_sub);
    Ok(())
}
