use std::time::Duration;

use crossterm::event::{Event, EventStream, KeyEvent, KeyEventKind};
use futures::StreamExt;
use tokio::sync::mpsc;

use crate::sync::SyncEvent;

#[derive(Debug)]
pub enum AppEvent {
    Key(KeyEvent),
    Sync(SyncEvent),
    Tick,
}

pub async fn event_loop(mut sync_rx: mpsc::Receiver<SyncEvent>, event_tx: mpsc::Sender<AppEvent>) {
    let mut key_stream = EventStream::new();
    let mut tick_interval = tokio::time::interval(Duration::from_millis(250));

    loop {
        let event = tokio::select! {
            Some(Ok(Event::Key(key))) = key_stream.next() => {
                if key.kind != KeyEventKind::Press {
                    continue;
                }
                AppEvent::Key(key)
            }
            Some(event) = sync_rx.recv() => {
                AppEvent::Sync(event)
            }
            _ = tick_interval.tick() => {
                AppEvent::Tick
            }
        };

        if event_tx.send(event).await.is_err() {
            break;
        }
    }
}
