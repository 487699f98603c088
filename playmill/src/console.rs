use playmill_plugins::callback::{CallbackPlugin, EventType};
use serde_json::Value;

fn field<'a>(data: Option<&'a Value>, key: &str) -> &'a str {
    data.and_then(|d| d.get(key)).and_then(Value::as_str).unwrap_or("?")
}

fn result_msg(data: Option<&Value>) -> String {
    data.and_then(|d| d.get("result"))
        .map(|r| r.to_string())
        .unwrap_or_default()
}

/// Prints run progress to stdout, one line per host event.
pub struct ConsoleOutput;

impl CallbackPlugin for ConsoleOutput {
    fn get_interested_events(&self) -> Vec<EventType> {
        vec![
            EventType::PlaybookOnPlayStart,
            EventType::PlaybookOnSetupPrimary,
            EventType::PlaybookOnSetupSecondary,
            EventType::PlaybookOnTaskStart,
            EventType::PlaybookOnHandlerTaskStart,
            EventType::PlaybookOnNotify,
            EventType::PlaybookOnStats,
            EventType::RunnerOnOk,
            EventType::RunnerOnFailed,
            EventType::RunnerOnSkipped,
            EventType::RunnerOnUnreachable,
        ]
    }

    fn on_event(&self, event: &EventType, data: Option<&Value>) {
        match event {
            EventType::PlaybookOnPlayStart => {
                println!("\nPLAY [{}] {}", field(data, "play"), "*".repeat(40));
            }
            EventType::PlaybookOnSetupPrimary => {
                println!("\nSETUP PHASE {}", "*".repeat(40));
            }
            EventType::PlaybookOnSetupSecondary => {
                println!("\nVARIABLE IMPORT PHASE {}", "*".repeat(30));
            }
            EventType::PlaybookOnTaskStart => {
                println!("\nTASK: [{}] {}", field(data, "task"), "*".repeat(40));
            }
            EventType::PlaybookOnHandlerTaskStart => {
                println!("\nNOTIFIED: [{}] {}", field(data, "task"), "*".repeat(36));
            }
            EventType::PlaybookOnNotify => {
                log::debug!(
                    "host {} notified handler {}",
                    field(data, "host"),
                    field(data, "handler")
                );
            }
            EventType::RunnerOnOk => {
                let changed = data
                    .and_then(|d| d.get("result"))
                    .and_then(|r| r.get("changed"))
                    .and_then(Value::as_bool)
                    .unwrap_or(false);
                if changed {
                    println!("changed: [{}]", field(data, "host"));
                } else {
                    println!("ok: [{}]", field(data, "host"));
                }
            }
            EventType::RunnerOnFailed => {
                println!("failed: [{}] => {}", field(data, "host"), result_msg(data));
            }
            EventType::RunnerOnSkipped => {
                println!("skipping: [{}]", field(data, "host"));
            }
            EventType::RunnerOnUnreachable => {
                println!("fatal: [{}] => {}", field(data, "host"), result_msg(data));
            }
            EventType::PlaybookOnStats => {
                println!("\nPLAY RECAP {}", "*".repeat(40));
                if let Some(Value::Object(summaries)) = data {
                    for (host, summary) in summaries {
                        println!(
                            "{host:<26}: ok={} changed={} unreachable={} failed={} skipped={}",
                            summary.get("ok").and_then(Value::as_u64).unwrap_or(0),
                            summary.get("changed").and_then(Value::as_u64).unwrap_or(0),
                            summary.get("unreachable").and_then(Value::as_u64).unwrap_or(0),
                            summary.get("failures").and_then(Value::as_u64).unwrap_or(0),
                            summary.get("skipped").and_then(Value::as_u64).unwrap_or(0),
                        );
                    }
                }
            }
            _ => {}
        }
    }
}
