//! Fixtures shared by the engine and listener tests.

use crate::config::EngineConfig;
use crate::engine::FlowEngine;
use async_trait::async_trait;
use chatflow_conversation::event::MESSENGER_EVENTS;
use chatflow_conversation::{AppEvent, InMemoryRepository};
use chatflow_mediator::{Dispatcher, DispatcherConfig, EventName, Listener};
use serde_json::{Value as JsonValue, json};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc::{UnboundedReceiver, UnboundedSender, unbounded_channel};
use tokio::time::timeout;

pub(crate) type Delivery = (EventName, AppEvent);

/// Captures everything the engine emits towards the messenger.
struct Recorder {
    tx: UnboundedSender<Delivery>,
}

#[async_trait]
impl Listener<AppEvent> for Recorder {
    async fn listen(&self, name: EventName, payload: AppEvent) {
        let _ = self.tx.send((name, payload));
    }
}

pub(crate) struct Outbox {
    rx: UnboundedReceiver<Delivery>,
}

impl Outbox {
    /// Waits for exactly `count` deliveries.
    pub(crate) async fn take(&mut self, count: usize) -> Vec<Delivery> {
        let mut deliveries = Vec::with_capacity(count);
        for _ in 0..count {
            let delivery = timeout(Duration::from_secs(1), self.rx.recv())
                .await
                .expect("delivery within timeout")
                .expect("outbox open");
            deliveries.push(delivery);
        }
        deliveries
    }

    /// Asserts nothing else arrives shortly.
    pub(crate) async fn assert_quiet(&mut self) {
        if let Ok(Some(extra)) = timeout(Duration::from_millis(50), self.rx.recv()).await {
            panic!("unexpected delivery: {extra:?}");
        }
    }
}

pub(crate) struct Harness {
    pub(crate) engine: Arc<FlowEngine<InMemoryRepository>>,
    pub(crate) repository: Arc<InMemoryRepository>,
    pub(crate) dispatcher: Arc<Dispatcher<AppEvent>>,
    pub(crate) outbox: Outbox,
}

impl Harness {
    /// Engine with default flow "main", a hop limit of 16 and `flows` loaded.
    pub(crate) fn new(flows: &[(&str, JsonValue)]) -> Self {
        Self::with_config(
            EngineConfig {
                default_flow: "main".into(),
                max_hops: 16,
                ..EngineConfig::default()
            },
            flows,
        )
    }

    pub(crate) fn with_config(config: EngineConfig, flows: &[(&str, JsonValue)]) -> Self {
        let dispatcher = Arc::new(Dispatcher::new(DispatcherConfig::default()));
        let (tx, rx) = unbounded_channel();
        dispatcher
            .register(Arc::new(Recorder { tx }), MESSENGER_EVENTS)
            .expect("messenger events free");

        let repository = Arc::new(InMemoryRepository::new());
        let engine = Arc::new(FlowEngine::new(
            config,
            Arc::clone(&repository),
            Arc::clone(&dispatcher),
        ));
        for (flow, definition) in flows {
            engine
                .load_flow((*flow).into(), &definition.to_string())
                .expect("valid flow");
        }

        Self {
            engine,
            repository,
            dispatcher,
            outbox: Outbox { rx },
        }
    }
}

pub(crate) fn text(value: &str) -> JsonValue {
    json!({"handler": "show", "params": {"type": "text", "value": value}})
}

pub(crate) fn goto(step: &str, kind: &str) -> JsonValue {
    json!({"handler": "goto", "params": {"step": step, "type": kind}})
}

pub(crate) fn buttons(options: &[(&str, JsonValue)]) -> JsonValue {
    let options: Vec<_> = options
        .iter()
        .map(|(label, instructions)| json!({"value": label, "params": instructions}))
        .collect();
    json!({"handler": "buttons", "params": options})
}
