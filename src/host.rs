use nucleus_core::commands::{CommandOutcome, Dispatcher};
use nucleus_core::services::scheduler::MainThreadQueue;
use nucleus_core::services::{Permissions, Subject, SubjectId, SubjectRef};
use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, info};

const TICK: Duration = Duration::from_millis(50);

pub struct ConsoleSubject;

impl Subject for ConsoleSubject {
    fn id(&self) -> SubjectId {
        SubjectId::Console
    }

    fn name(&self) -> &str {
        "Console"
    }

    fn send_message(&self, message: &str) {
        println!("{}", message);
    }
}

/// The console host has no players, and the console may do anything.
pub struct ConsolePermissions;

impl Permissions for ConsolePermissions {
    fn has_permission(&self, _subject: &dyn Subject, _node: &str) -> anyhow::Result<bool> {
        Ok(true)
    }

    fn level(&self, _subject: &dyn Subject) -> anyhow::Result<i32> {
        Ok(i32::MAX)
    }
}

enum Message {
    Line(String),
    Shutdown,
}

/// Reads command lines from stdin and runs them on the main thread,
/// draining scheduled main-thread work between lines.
pub struct Host {
    dispatcher: Dispatcher,
    main_thread: MainThreadQueue,
    receiver: Receiver<Message>,
    console: SubjectRef,
}

impl Host {
    pub fn new(dispatcher: Dispatcher, main_thread: MainThreadQueue) -> anyhow::Result<Host> {
        let (sender, receiver) = mpsc::channel();

        let ctrl_handler_sender = sender.clone();
        ctrlc::set_handler(move || {
            let _ = ctrl_handler_sender.send(Message::Shutdown);
        })?;

        thread::Builder::new()
            .name("Console input".to_string())
            .spawn(move || {
                for line in std::io::stdin().lock().lines() {
                    let Ok(line) = line else {
                        break;
                    };
                    if sender.send(Message::Line(line)).is_err() {
                        return;
                    }
                }
                let _ = sender.send(Message::Shutdown);
            })?;

        Ok(Host {
            dispatcher,
            main_thread,
            receiver,
            console: Arc::new(ConsoleSubject),
        })
    }

    pub fn run(self) {
        let start_time = Instant::now();
        info!(
            "Done! {} root aliases available, type 'stop' to exit",
            self.dispatcher.root_aliases().len()
        );

        loop {
            self.main_thread.run_pending_timeout(TICK);
            match self.receiver.try_recv() {
                Ok(Message::Line(line)) if line.trim() == "stop" => break,
                Ok(Message::Line(line)) => self.handle_line(&line),
                Ok(Message::Shutdown) | Err(TryRecvError::Disconnected) => break,
                Err(TryRecvError::Empty) => {}
            }
        }

        info!("Shutting down after {:?}", start_time.elapsed());
    }

    fn handle_line(&self, line: &str) {
        if let Some(partial) = line.strip_suffix('\t') {
            let suggestions = self.dispatcher.complete(&self.console, partial);
            self.console.send_message(&suggestions.join("  "));
            return;
        }
        match self.dispatcher.dispatch(&self.console, line) {
            CommandOutcome::WillContinue => debug!("/{} continues in the background", line.trim()),
            CommandOutcome::Success | CommandOutcome::Fail(_) => {}
        }
    }
}
