// ABOUTME: Terminal-facing thread observer: mirrors processor progress to stdout.
// ABOUTME: Streams chunks as they arrive and flushes after every write.

use parley_core::{AvailableTask, Message, ThreadObserver};
use std::io::Write;

pub struct ConsoleObserver;

impl ConsoleObserver {
    fn flush() {
        let _ = std::io::stdout().flush();
    }
}

impl ThreadObserver for ConsoleObserver {
    fn on_bot_message_start(&self, message: &Message, is_streaming: bool) {
        if is_streaming {
            // Chunks follow via appends; open the line and wait
            print!("{}", message.text);
        } else {
            println!("{}", message.text);
        }
        Self::flush();
    }

    fn on_bot_message_append(&self, _message_id: &str, chunk: &str) {
        print!("{}", chunk);
        Self::flush();
    }

    fn on_bot_message_complete(&self, _message: &Message) {
        println!();
        Self::flush();
    }

    fn on_available_tasks_added(&self, _message_id: &str, tasks: &[AvailableTask]) {
        for task in tasks {
            println!("  [{}]", task.name);
        }
        Self::flush();
    }

    fn on_error(&self, message: &Message, _error: &anyhow::Error) {
        eprintln!("{}", message.text);
    }
}
