#![allow(dead_code)] // each test binary uses a different slice of this module

use reflex::codec::{self, Header};
use reflex::prelude::*;
use reflex::transport::mem::MemSubscription;

/// One decoded outbound message: key name, value (symbols resolved to
/// strings), header timestamp, correlation id.
pub type Decoded = (String, Value, i64, i64);

pub struct Fixture {
    pub agent: BaseAgent<MemTransport>,
    pub transport: MemTransport,
    pub status: MemSubscription,
}

pub fn fixture_with(configure: impl FnOnce(&mut AgentConfig)) -> Fixture {
    let mut transport = MemTransport::new();
    let mut cfg = AgentConfig::for_agent("test-agent", 7);
    configure(&mut cfg);

    let mut agent = BaseAgent::new(cfg, transport.clone()).unwrap();
    agent.set_clock(CachedClock::manual(0));
    let status = transport.add_subscription("mem:status", 1).unwrap();
    Fixture {
        agent,
        transport,
        status,
    }
}

pub fn fixture(pub_streams: usize) -> Fixture {
    fixture_with(|cfg| {
        for i in 1..=pub_streams {
            cfg.pub_data
                .push(EndpointConfig::new(format!("mem:data{i}"), 1));
        }
    })
}

fn resolve(value: Value, table: &SymbolTable) -> Value {
    match value {
        Value::Symbol(s) => Value::Str(table.name(s).to_string()),
        Value::Tuple(items) => {
            Value::Tuple(items.into_iter().map(|v| resolve(v, table)).collect())
        }
        other => other,
    }
}

/// Drain and decode every complete message on a subscription.
pub fn drain(sub: &mut MemSubscription) -> Vec<Decoded> {
    let mut asm = FragmentAssembler::with_capacity(16 * 1024);
    let mut table = SymbolTable::new();
    let mut out: Vec<Decoded> = Vec::new();
    loop {
        let polled = sub.poll(
            &mut |data, flags| {
                asm.on_frame(data, flags, &mut |msg| {
                    let m = codec::decode(msg, &mut table).unwrap();
                    let key = table.name(m.key).to_string();
                    let value = resolve(m.value, &table);
                    out.push((key, value, m.timestamp_ns, m.correlation_id));
                })
            },
            64,
        );
        if polled == 0 {
            break;
        }
    }
    out
}

pub fn keyed<'a>(messages: &'a [Decoded], key: &str) -> Vec<&'a Decoded> {
    messages.iter().filter(|(k, ..)| k == key).collect()
}

/// Encode and push one message onto a loopback stream (e.g. the agent's
/// control stream).
pub fn send(
    transport: &mut MemTransport,
    uri: &str,
    stream_id: i32,
    key: &str,
    value: Value,
    timestamp_ns: i64,
    correlation_id: i64,
) {
    let mut table = SymbolTable::new();
    let k = table.intern(key);
    let header = Header {
        timestamp_ns,
        correlation_id,
    };
    let mut buf = vec![0u8; codec::encoded_len("", k, &value, &table)];
    codec::encode_into(&mut buf, &header, "", k, &value, &table).unwrap();

    let mut publication = transport.add_publication(uri, stream_id).unwrap();
    assert_eq!(publication.offer(&[&buf]), OfferResult::Success);
}

/// Run `cycles` duty cycles, advancing the manual clock by `step_ns`
/// before each one.
pub fn run_cycles(agent: &mut BaseAgent<MemTransport>, cycles: usize, step_ns: i64) {
    for _ in 0..cycles {
        agent.clock_mut().advance(step_ns);
        agent.do_work();
    }
}
