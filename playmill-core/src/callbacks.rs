use playmill_plugins::callback::{CallbackPlugin, EventType};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Arc;

/// Dispatches lifecycle events to the plugins that registered interest in
/// them. The engine keeps two of these: one for playbook-level events and
/// one for runner-level (per-host) events.
#[derive(Default)]
pub struct CallbackRegistry {
    callbacks: HashMap<EventType, Vec<Arc<dyn CallbackPlugin>>>,
}

impl CallbackRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, callback: Arc<dyn CallbackPlugin>) {
        for event in callback.get_interested_events() {
            self.callbacks
                .entry(event)
                .or_insert_with(Vec::new)
                .push(callback.clone());
        }
    }

    pub fn emit(&self, event: EventType, data: Option<Value>) {
        if let Some(callbacks) = self.callbacks.get(&event) {
            for callback in callbacks {
                callback.on_event(&event, data.as_ref());
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recorder {
        seen: Mutex<Vec<EventType>>,
    }

    impl CallbackPlugin for Recorder {
        fn get_interested_events(&self) -> Vec<EventType> {
            vec![EventType::PlaybookOnStart, EventType::RunnerOnOk]
        }

        fn on_event(&self, event: &EventType, _data: Option<&Value>) {
            self.seen.lock().unwrap().push(event.clone());
        }
    }

    #[test]
    fn only_registered_events_are_delivered() {
        let recorder = Arc::new(Recorder {
            seen: Mutex::new(Vec::new()),
        });
        let mut registry = CallbackRegistry::new();
        registry.register(recorder.clone());

        registry.emit(EventType::PlaybookOnStart, None);
        registry.emit(EventType::PlaybookOnPlayStart, None);
        registry.emit(EventType::RunnerOnOk, None);

        let seen = recorder.seen.lock().unwrap();
        assert_eq!(
            *seen,
            vec![EventType::PlaybookOnStart, EventType::RunnerOnOk]
        );
    }
}
