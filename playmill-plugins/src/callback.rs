use serde_json::Value;

#[derive(Hash, Eq, PartialEq, Debug, Clone)]
pub enum EventType {
    RunnerOnOk,
    RunnerOnFailed,
    RunnerOnSkipped,
    RunnerOnUnreachable,
    PlaybookOnStart,
    PlaybookOnPlayStart,
    PlaybookOnSetupPrimary,
    PlaybookOnSetupSecondary,
    PlaybookOnTaskStart,
    PlaybookOnHandlerTaskStart,
    PlaybookOnNotify,
    PlaybookOnStats,
}

pub trait CallbackPlugin: Send + Sync {
    /// The list of events the plugin is interested in handling.
    fn get_interested_events(&self) -> Vec<EventType>;

    /// Called when an event triggers that the plugin has registered for.
    fn on_event(&self, event: &EventType, data: Option<&Value>);
}
